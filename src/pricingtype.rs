use std::time::{Duration, Instant};

use crate::col::Column;
use crate::constraint::ConsId;
use crate::mastercons::{MasterConsId, MasterConsStore};
use crate::model::Model;
use crate::params::{FarkasSettings, ReducedCostSettings};
use crate::variable::VarId;

/// A restartable clock accumulating the time spent in a pricing phase.
#[derive(Debug, Default)]
pub struct Stopwatch {
    elapsed: Duration,
    started: Option<Instant>,
}

impl Stopwatch {
    /// Starts the clock; a running clock keeps running.
    pub fn start(&mut self) {
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
    }

    /// Stops the clock and accumulates the elapsed time.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
    }

    /// Returns the accumulated time.
    pub fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.elapsed + started.elapsed(),
            None => self.elapsed,
        }
    }

    /// Resets the clock to zero.
    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.started = None;
    }
}

/// Strategy fixing where dual information comes from and how aggressively a
/// pricing phase may generate columns.
///
/// Reduced-cost pricing reads LP duals and original objectives; Farkas
/// pricing reads Farkas multipliers and prices against a zero objective.
pub trait PricingType {
    /// Returns the dual value of a master constraint.
    fn cons_dual(&self, model: &Model, cons: ConsId) -> f64;

    /// Returns the dual value of the `i`-th lifted original cut.
    fn row_dual(&self, model: &Model, i: usize) -> f64;

    /// Returns the dual value of an extended master constraint.
    fn mastercons_dual(&self, model: &Model, store: &MasterConsStore, id: MasterConsId) -> f64;

    /// Returns the dual value of the `i`-th linking constraint.
    fn linking_dual(&self, model: &Model, i: usize) -> f64;

    /// Returns the dual value of a block's convexity constraint.
    fn conv_dual(&self, model: &Model, block: usize) -> f64;

    /// Returns the effective pricing objective of a pricing variable.
    fn var_obj(&self, model: &Model, var: VarId) -> f64;

    /// Returns the maximal number of pricing rounds.
    fn max_rounds(&self) -> u64;

    /// Returns the maximal number of columns per pricing round.
    fn max_cols_round(&self, model: &Model) -> usize;

    /// Returns the maximal number of columns per pricing problem.
    fn max_cols_prob(&self, model: &Model) -> usize;

    /// Returns the maximal number of successfully solved pricing problems
    /// until the pricing loop is aborted.
    fn max_successful_probs(&self) -> usize;

    /// Returns the maximal fraction of pricing problems that are solved once
    /// variables have been found.
    fn rel_max_probs(&self, model: &Model) -> f64;

    /// Returns the maximal fraction of successfully solved pricing problems
    /// until the pricing loop is aborted.
    fn rel_max_successful_probs(&self) -> f64;

    /// Returns the number of times this pricing phase was invoked.
    fn calls(&self) -> u64;

    /// Counts an invocation of this pricing phase.
    fn inc_calls(&mut self);

    /// Resets the invocation counter.
    fn reset_calls(&mut self);

    /// Starts the phase's clock.
    fn start_clock(&mut self);

    /// Stops the phase's clock.
    fn stop_clock(&mut self);

    /// Returns the accumulated time of the phase.
    fn clock_time(&self) -> Duration;
}

/// Reduced-cost pricing: LP duals, original objectives, root-node overrides.
#[derive(Debug, Default)]
pub struct ReducedCostPricing {
    /// Limits of reduced-cost pricing.
    pub settings: ReducedCostSettings,
    calls: u64,
    clock: Stopwatch,
}

impl ReducedCostPricing {
    /// Creates reduced-cost pricing with the given settings.
    pub fn new(settings: ReducedCostSettings) -> Self {
        ReducedCostPricing {
            settings,
            calls: 0,
            clock: Stopwatch::default(),
        }
    }
}

impl PricingType for ReducedCostPricing {
    fn cons_dual(&self, model: &Model, cons: ConsId) -> f64 {
        model.cons(cons).dual()
    }

    fn row_dual(&self, model: &Model, i: usize) -> f64 {
        model.original_cut_master_row(i).dual()
    }

    fn mastercons_dual(&self, model: &Model, store: &MasterConsStore, id: MasterConsId) -> f64 {
        store.dual(model, id)
    }

    fn linking_dual(&self, model: &Model, i: usize) -> f64 {
        model.linking_cons(i).dual()
    }

    fn conv_dual(&self, model: &Model, block: usize) -> f64 {
        model.conv_dual(block)
    }

    fn var_obj(&self, model: &Model, var: VarId) -> f64 {
        let origvar = match model.orig_var_of(var) {
            Some(origvar) => origvar,
            None => return 0.0,
        };
        match model.var(origvar).kind() {
            crate::variable::VarKind::Original { linking: true, .. } => 0.0,
            _ => model.var(origvar).obj(),
        }
    }

    fn max_rounds(&self) -> u64 {
        self.settings.max_rounds
    }

    fn max_cols_round(&self, model: &Model) -> usize {
        if model.is_root_node() {
            self.settings.max_cols_round_root
        } else {
            self.settings.max_cols_round
        }
    }

    fn max_cols_prob(&self, model: &Model) -> usize {
        if model.is_root_node() {
            self.settings.max_cols_prob_root
        } else {
            self.settings.max_cols_prob
        }
    }

    fn max_successful_probs(&self) -> usize {
        self.settings.max_successful_probs
    }

    fn rel_max_probs(&self, model: &Model) -> f64 {
        if model.is_root_node() {
            self.settings.rel_max_probs_root
        } else {
            self.settings.rel_max_probs
        }
    }

    fn rel_max_successful_probs(&self) -> f64 {
        self.settings.rel_max_successful_probs
    }

    fn calls(&self) -> u64 {
        self.calls
    }

    fn inc_calls(&mut self) {
        self.calls += 1;
    }

    fn reset_calls(&mut self) {
        self.calls = 0;
    }

    fn start_clock(&mut self) {
        self.clock.start();
    }

    fn stop_clock(&mut self) {
        self.clock.stop();
    }

    fn clock_time(&self) -> Duration {
        self.clock.elapsed()
    }
}

/// Farkas pricing: Farkas multipliers and a zero pricing objective, used to
/// restore feasibility of the restricted master LP.
#[derive(Debug, Default)]
pub struct FarkasPricing {
    /// Limits of Farkas pricing.
    pub settings: FarkasSettings,
    calls: u64,
    clock: Stopwatch,
}

impl FarkasPricing {
    /// Creates Farkas pricing with the given settings.
    pub fn new(settings: FarkasSettings) -> Self {
        FarkasPricing {
            settings,
            calls: 0,
            clock: Stopwatch::default(),
        }
    }
}

impl PricingType for FarkasPricing {
    fn cons_dual(&self, model: &Model, cons: ConsId) -> f64 {
        model.cons(cons).farkas_dual()
    }

    fn row_dual(&self, model: &Model, i: usize) -> f64 {
        model.original_cut_master_row(i).farkas_dual()
    }

    fn mastercons_dual(&self, model: &Model, store: &MasterConsStore, id: MasterConsId) -> f64 {
        store.farkas_dual(model, id)
    }

    fn linking_dual(&self, model: &Model, i: usize) -> f64 {
        model.linking_cons(i).farkas_dual()
    }

    fn conv_dual(&self, model: &Model, block: usize) -> f64 {
        model.conv_farkas(block)
    }

    fn var_obj(&self, _model: &Model, _var: VarId) -> f64 {
        0.0
    }

    fn max_rounds(&self) -> u64 {
        u64::MAX
    }

    fn max_cols_round(&self, _model: &Model) -> usize {
        self.settings.max_cols_round
    }

    fn max_cols_prob(&self, _model: &Model) -> usize {
        self.settings.max_cols_prob
    }

    fn max_successful_probs(&self) -> usize {
        usize::MAX
    }

    fn rel_max_probs(&self, _model: &Model) -> f64 {
        self.settings.rel_max_probs
    }

    fn rel_max_successful_probs(&self) -> f64 {
        1.0
    }

    fn calls(&self) -> u64 {
        self.calls
    }

    fn inc_calls(&mut self) {
        self.calls += 1;
    }

    fn reset_calls(&mut self) {
        self.calls = 0;
    }

    fn start_clock(&mut self) {
        self.clock.start();
    }

    fn stop_clock(&mut self) {
        self.clock.stop();
    }

    fn clock_time(&self) -> Duration {
        self.clock.elapsed()
    }
}

/// Computes the reduced cost of a column under the pricing type's duals.
///
/// The coefficient caches of the column must be up to date; extended master
/// constraints contribute through the column's inferred coefficient values.
pub fn compute_redcost(
    model: &Model,
    store: &MasterConsStore,
    pricing: &dyn PricingType,
    col: &Column,
) -> f64 {
    let mut redcost = 0.0;

    for (i, &var) in col.vars().iter().enumerate() {
        redcost += pricing.var_obj(model, var) * col.vals()[i];
    }

    for (i, &var) in col.inferred_vars().iter().enumerate() {
        if let Some(mc) = model.var(var).inferred_mastercons() {
            redcost -= pricing.mastercons_dual(model, store, mc) * col.inferred_vals()[i];
        }
    }

    for (i, &coef) in col.master_coefs().iter().enumerate() {
        if coef != 0.0 {
            redcost -= pricing.cons_dual(model, model.master_cons_id(i)) * coef;
        }
    }

    for (i, &coef) in col.original_cut_coefs().iter().enumerate() {
        if coef != 0.0 && model.original_cut_master_row(i).is_in_lp() {
            redcost -= pricing.row_dual(model, i) * coef;
        }
    }

    for i in 0..model.n_linking_conss() {
        let link = model.linking_cons(i);
        if link.block() == col.block() {
            let val = col.sol_val(link.pricingvar());
            if val != 0.0 {
                redcost -= pricing.linking_dual(model, i) * val;
            }
        }
    }

    if !col.is_ray() {
        redcost -= pricing.conv_dual(model, col.block());
    }

    redcost
}
