//! Dual variable smoothing with an optional subgradient combination.
//!
//! This is a dynamic alpha-schedule stabilization (based on subgradient
//! information), optionally combined with a subgradient method, following
//!
//! Pessoa, A., Sadykov, R., Uchoa, E., & Vanderbeck, F. (2013). In-Out
//! Separation and Column Generation Stabilization by Dual Price Smoothing.
//! In Experimental Algorithms (pp. 354-365). Springer Berlin Heidelberg.
//!
//! Pessoa, A., Sadykov, R., Uchoa, E., & Vanderbeck, F. (2016). Automation
//! and combination of linear-programming based stabilization techniques in
//! column generation.

use tracing::debug;

use crate::col::Column;
use crate::mastercons::{MasterConsId, MasterConsStore};
use crate::model::Model;
use crate::pricingtype::PricingType;
use crate::retcode::Result;
use crate::variable::VarKind;

/// Smoothing state: the stability center per dual group, the matching
/// subgradient, and the alpha/beta schedule counters.
#[derive(Debug)]
pub struct Stabilization {
    stabcenter_cons: Vec<f64>,
    stabcenter_cuts: Vec<f64>,
    stabcenter_linking: Vec<f64>,
    stabcenter_conv: Vec<f64>,
    /// Active extended master constraints with their center duals.
    mastercons_ids: Vec<MasterConsId>,
    stabcenter_mastercons: Vec<f64>,
    subgradient_cons: Vec<f64>,
    subgradient_cuts: Vec<f64>,
    subgradient_linking: Vec<f64>,
    subgradient_mastercons: Vec<f64>,
    alpha: f64,
    alphabar: f64,
    beta: f64,
    hybridfactor: f64,
    hybridascent: bool,
    dualdiffnorm: f64,
    subgradientnorm: f64,
    subgradientproduct: f64,
    k: u32,
    t: u32,
    node: i64,
    hasstabilitycenter: bool,
    stabcenterbound: f64,
    inmispricingschedule: bool,
}

impl Stabilization {
    /// Creates a stabilization instance; with `hybridascent` the smoothed
    /// duals are combined with a subgradient direction.
    pub fn new(hybridascent: bool) -> Self {
        Stabilization {
            stabcenter_cons: Vec::new(),
            stabcenter_cuts: Vec::new(),
            stabcenter_linking: Vec::new(),
            stabcenter_conv: Vec::new(),
            mastercons_ids: Vec::new(),
            stabcenter_mastercons: Vec::new(),
            subgradient_cons: Vec::new(),
            subgradient_cuts: Vec::new(),
            subgradient_linking: Vec::new(),
            subgradient_mastercons: Vec::new(),
            alpha: 0.8,
            alphabar: 0.8,
            beta: 0.0,
            hybridfactor: 0.0,
            hybridascent,
            dualdiffnorm: 0.0,
            subgradientnorm: 0.0,
            subgradientproduct: 0.0,
            k: 0,
            t: 0,
            node: -1,
            hasstabilitycenter: false,
            stabcenterbound: f64::NEG_INFINITY,
            inmispricingschedule: false,
        }
    }

    /// Returns the current smoothing weight.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Returns the smoothing weight of the mispricing schedule.
    pub fn alphabar(&self) -> f64 {
        self.alphabar
    }

    /// Returns whether a stability center has been stored.
    pub fn has_stability_center(&self) -> bool {
        self.hasstabilitycenter
    }

    /// Returns whether duals are currently smoothed at all.
    pub fn is_stabilized(&self, model: &Model) -> bool {
        if self.inmispricingschedule {
            model.is_gt(self.alphabar, 0.0)
        } else {
            model.is_gt(self.alpha, 0.0)
        }
    }

    /// Returns whether the mispricing schedule is active.
    pub fn is_in_mispricing_schedule(&self) -> bool {
        self.inmispricingschedule
    }

    /// Enables the mispricing schedule.
    pub fn activate_mispricing_schedule(&mut self) {
        self.inmispricingschedule = true;
    }

    /// Disables the mispricing schedule and resets its counter.
    pub fn deactivate_mispricing_schedule(&mut self) {
        self.inmispricingschedule = false;
        self.k = 0;
    }

    /* array bookkeeping */

    fn update_cons_arrays(&mut self, model: &Model) {
        let nconss = model.n_master_conss();
        if self.stabcenter_cons.len() < nconss {
            self.stabcenter_cons.resize(nconss, 0.0);
        }
        if self.hybridascent && self.subgradient_cons.len() < nconss {
            self.subgradient_cons.resize(nconss, 0.0);
        }
    }

    fn update_cut_arrays(&mut self, model: &Model) {
        let ncuts = model.n_original_cuts();
        if self.stabcenter_cuts.len() < ncuts {
            self.stabcenter_cuts.resize(ncuts, 0.0);
        }
        if self.hybridascent && self.subgradient_cuts.len() < ncuts {
            self.subgradient_cuts.resize(ncuts, 0.0);
        }
    }

    fn update_mastercons_arrays(&mut self, model: &Model, store: &MasterConsStore) {
        let active = store.active_branch_conss(model);
        // the active set can change between rounds even at the same size;
        // keep the center value of constraints that stayed active
        let mut centers = vec![0.0; active.len()];
        let mut subgradients = vec![0.0; active.len()];
        for (i, id) in active.iter().enumerate() {
            if let Some(pos) = self.mastercons_ids.iter().position(|m| m == id) {
                centers[i] = self.stabcenter_mastercons[pos];
                if pos < self.subgradient_mastercons.len() {
                    subgradients[i] = self.subgradient_mastercons[pos];
                }
            }
        }
        self.mastercons_ids = active;
        self.stabcenter_mastercons = centers;
        self.subgradient_mastercons = subgradients;
    }

    fn update_linking_arrays(&mut self, model: &Model) {
        let nlinking = model.n_linking_conss();
        if self.stabcenter_linking.len() < nlinking {
            self.stabcenter_linking.resize(nlinking, 0.0);
        }
        if self.subgradient_linking.len() < nlinking {
            self.subgradient_linking.resize(nlinking, 0.0);
        }
    }

    fn update_conv_arrays(&mut self, model: &Model) {
        if self.stabcenter_conv.len() < model.n_blocks() {
            self.stabcenter_conv.resize(model.n_blocks(), 0.0);
        }
    }

    /* dual projection */

    /// Combines the stability center with the current dual value.
    ///
    /// In the mispricing schedule the weight is `alphabar` and the
    /// subgradient share is switched off. With hybrid ascent the dual is
    /// moved along the subgradient direction and projected back to sign
    /// feasibility.
    fn compute_dual(
        &self,
        model: &Model,
        center: f64,
        current: f64,
        subgradient: f64,
        lhs: f64,
        rhs: f64,
    ) -> f64 {
        let usedalpha = if self.inmispricingschedule {
            self.alphabar
        } else {
            self.alpha
        };
        let usedbeta = if self.inmispricingschedule {
            0.0
        } else {
            self.beta
        };

        if self.hasstabilitycenter && (model.is_zero(usedbeta) || model.is_zero(usedalpha)) {
            usedalpha * center + (1.0 - usedalpha) * current
        } else if self.hasstabilitycenter && model.is_positive(usedbeta) {
            let mut dual = center
                + self.hybridfactor
                    * (self.beta
                        * (center + subgradient * self.dualdiffnorm / self.subgradientnorm)
                        + (1.0 - self.beta) * current
                        - center);

            // make sure the dual solution has the correct sign
            if model.is_infinity(rhs) {
                dual = dual.max(0.0);
            } else if model.is_infinity(-lhs) {
                dual = dual.min(0.0);
            }
            dual
        } else {
            current
        }
    }

    /// Returns the smoothed dual of the `i`-th master constraint.
    pub fn cons_get_dual(
        &mut self,
        model: &Model,
        pricing: &dyn PricingType,
        i: usize,
    ) -> f64 {
        debug_assert!(i < model.n_master_conss());
        self.update_cons_arrays(model);

        let subgradient = if self.hybridascent && self.hasstabilitycenter {
            self.subgradient_cons[i]
        } else {
            0.0
        };
        let cons = model.master_cons_at(i);
        self.compute_dual(
            model,
            self.stabcenter_cons[i],
            pricing.cons_dual(model, model.master_cons_id(i)),
            subgradient,
            cons.lhs(),
            cons.rhs(),
        )
    }

    /// Returns the smoothed dual of the `i`-th lifted original cut.
    pub fn row_get_dual(
        &mut self,
        model: &Model,
        pricing: &dyn PricingType,
        i: usize,
    ) -> f64 {
        debug_assert!(i < model.n_original_cuts());
        self.update_cut_arrays(model);

        let subgradient = if self.hybridascent && self.hasstabilitycenter {
            self.subgradient_cuts[i]
        } else {
            0.0
        };
        let row = model.original_cut_master_row(i);
        self.compute_dual(
            model,
            self.stabcenter_cuts[i],
            pricing.row_dual(model, i),
            subgradient,
            row.lhs(),
            row.rhs(),
        )
    }

    /// Returns the smoothed dual of an extended master constraint.
    pub fn mastercons_get_dual(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        pricing: &dyn PricingType,
        id: MasterConsId,
    ) -> f64 {
        self.update_mastercons_arrays(model, store);

        let center = self
            .mastercons_ids
            .iter()
            .position(|m| *m == id)
            .map(|pos| self.stabcenter_mastercons[pos])
            .unwrap_or(0.0);

        self.compute_dual(
            model,
            center,
            pricing.mastercons_dual(model, store, id),
            0.0,
            store.lhs(model, id),
            store.rhs(model, id),
        )
    }

    /// Returns the smoothed dual of the `i`-th linking constraint.
    pub fn linking_get_dual(
        &mut self,
        model: &Model,
        pricing: &dyn PricingType,
        i: usize,
    ) -> f64 {
        debug_assert!(i < model.n_linking_conss());
        self.update_linking_arrays(model);

        let subgradient = if self.hybridascent && self.hasstabilitycenter {
            self.subgradient_linking[i]
        } else {
            0.0
        };
        self.compute_dual(
            model,
            self.stabcenter_linking[i],
            pricing.linking_dual(model, i),
            subgradient,
            0.0,
            0.0,
        )
    }

    /// Returns the smoothed dual of a block's convexity constraint.
    pub fn conv_get_dual(
        &mut self,
        model: &Model,
        pricing: &dyn PricingType,
        block: usize,
    ) -> f64 {
        self.update_conv_arrays(model);

        let k = model.n_identical_blocks(block) as f64;
        self.compute_dual(
            model,
            self.stabcenter_conv[block],
            pricing.conv_dual(model, block),
            0.0,
            k,
            k,
        )
    }

    /* center update */

    /// Moves the stability center to the current (smoothed) duals if the
    /// Lagrangian bound improved; convexity centers take `dualsolconv`
    /// directly. With hybrid ascent the subgradient is refreshed from the
    /// given pricing columns.
    pub fn update_stability_center(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        pricing: &dyn PricingType,
        lowerbound: f64,
        dualsolconv: &[f64],
        pricingcols: &[Option<&Column>],
    ) -> Result<()> {
        debug!(lowerbound, "updating stability center");

        // in case the bound is not improving and we have a center, do nothing
        if model.is_le(lowerbound, self.stabcenterbound) && self.hasstabilitycenter {
            debug!("no bound increase");
            return Ok(());
        }

        self.update_cons_arrays(model);
        self.update_cut_arrays(model);
        self.update_mastercons_arrays(model, store);
        self.update_linking_arrays(model);
        self.update_conv_arrays(model);

        let newcons: Vec<f64> = (0..model.n_master_conss())
            .map(|i| self.cons_get_dual(model, pricing, i))
            .collect();
        self.stabcenter_cons[..newcons.len()].copy_from_slice(&newcons);

        let newcuts: Vec<f64> = (0..model.n_original_cuts())
            .map(|i| self.row_get_dual(model, pricing, i))
            .collect();
        self.stabcenter_cuts[..newcuts.len()].copy_from_slice(&newcuts);

        let newlinking: Vec<f64> = (0..model.n_linking_conss())
            .map(|i| self.linking_get_dual(model, pricing, i))
            .collect();
        self.stabcenter_linking[..newlinking.len()].copy_from_slice(&newlinking);

        for block in 0..model.n_blocks() {
            if !model.is_block_relevant(block) {
                continue;
            }
            self.stabcenter_conv[block] = dualsolconv[block];
        }

        let ids = self.mastercons_ids.clone();
        let newmastercons: Vec<f64> = ids
            .iter()
            .map(|&id| self.mastercons_get_dual(model, store, pricing, id))
            .collect();
        self.stabcenter_mastercons[..newmastercons.len()].copy_from_slice(&newmastercons);

        if self.hybridascent {
            self.calculate_subgradient(model, store, pricingcols);
        }

        self.hasstabilitycenter = true;
        self.stabcenterbound = lowerbound;
        Ok(())
    }

    /* alpha schedule */

    /// Bumps the in-node iteration counter and steers alpha by the last
    /// subgradient product: a negative product increases alpha towards 0.9,
    /// otherwise alpha decreases.
    pub fn update_alpha(&mut self, model: &Model) {
        self.t += 1;

        // There is a sign error in the stabilization paper: if the scalar
        // product is positive, the angle is less than 90 degrees and we want
        // to decrease alpha.
        if model.is_negative(self.subgradientproduct) {
            self.increase_alpha();
        } else {
            self.decrease_alpha();
        }
    }

    fn increase_alpha(&mut self) {
        // to avoid numerical problems, assure alpha <= 0.9
        self.alpha = 0.9f64.min(self.alpha + (1.0 - self.alpha) * 0.1);
        debug!(alpha = self.alpha, "alpha increased");
    }

    fn decrease_alpha(&mut self) {
        self.alpha = 0.0f64.max(self.alpha - 0.1);
        debug!(alpha = self.alpha, "alpha decreased");
    }

    /// Bumps the mispricing counter and relaxes the smoothing weight of the
    /// mispricing schedule.
    pub fn update_alpha_misprice(&mut self) {
        self.k += 1;
        self.alphabar = 0.0f64.max(1.0 - f64::from(self.k) * (1.0 - self.alpha));
        debug!(
            alphabar = self.alphabar,
            k = self.k,
            t = self.t,
            "alphabar updated in mispricing schedule"
        );
    }

    /// Resets the in-node state when the focus node changed.
    pub fn update_node(&mut self, model: &Model) {
        if self.node != model.current_node() {
            self.node = model.current_node();
            self.k = 0;
            self.t = 1;
            self.alpha = 0.8;
            self.hasstabilitycenter = false;
            self.stabcenterbound = f64::NEG_INFINITY;
            self.inmispricingschedule = false;
        }
    }

    /* hybrid smoothing */

    /// Refreshes the norms, beta and the hybrid factor for the next
    /// projection. Must be called before new dual projections of a round.
    pub fn update_hybrid(&mut self, model: &Model, store: &MasterConsStore, pricing: &dyn PricingType) {
        if self.hasstabilitycenter && self.hybridascent && !self.inmispricingschedule {
            self.update_cons_arrays(model);
            self.update_cut_arrays(model);
            self.update_mastercons_arrays(model, store);
            self.update_linking_arrays(model);

            if model.is_positive(self.alpha) {
                self.calculate_dualdiffnorm(model, store, pricing);
                self.calculate_beta(model, store, pricing);
                self.calculate_hybridfactor(model, store, pricing);
            }
        }
    }

    fn calculate_dualdiffnorm(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        pricing: &dyn PricingType,
    ) {
        let mut dualdiffnorm = 0.0;

        for i in 0..model.n_master_conss() {
            let diff = self.stabcenter_cons[i] - pricing.cons_dual(model, model.master_cons_id(i));
            if model.is_positive(diff * diff) {
                dualdiffnorm += diff * diff;
            }
        }
        for i in 0..model.n_original_cuts() {
            let diff = self.stabcenter_cuts[i] - pricing.row_dual(model, i);
            if model.is_positive(diff * diff) {
                dualdiffnorm += diff * diff;
            }
        }
        for (pos, &id) in self.mastercons_ids.iter().enumerate() {
            let diff =
                self.stabcenter_mastercons[pos] - pricing.mastercons_dual(model, store, id);
            if model.is_positive(diff * diff) {
                dualdiffnorm += diff * diff;
            }
        }
        for i in 0..model.n_linking_conss() {
            let diff = self.stabcenter_linking[i] - pricing.linking_dual(model, i);
            if model.is_positive(diff * diff) {
                dualdiffnorm += diff * diff;
            }
        }

        self.dualdiffnorm = dualdiffnorm.sqrt();
        debug!(dualdiffnorm = self.dualdiffnorm, "updated dualdiffnorm");
    }

    fn calculate_beta(&mut self, model: &Model, store: &MasterConsStore, pricing: &dyn PricingType) {
        let mut beta = 0.0;

        for i in 0..model.n_master_conss() {
            let dualdiff = (pricing.cons_dual(model, model.master_cons_id(i)) - self.stabcenter_cons[i]).abs();
            let product = dualdiff * self.subgradient_cons[i].abs();
            if model.is_positive(product) {
                beta += product;
            }
        }
        for i in 0..model.n_original_cuts() {
            let dualdiff = (pricing.row_dual(model, i) - self.stabcenter_cuts[i]).abs();
            let product = dualdiff * self.subgradient_cuts[i].abs();
            if model.is_positive(product) {
                beta += product;
            }
        }
        for (pos, &id) in self.mastercons_ids.iter().enumerate() {
            let dualdiff = (pricing.mastercons_dual(model, store, id)
                - self.stabcenter_mastercons[pos])
                .abs();
            let product = dualdiff * self.subgradient_mastercons[pos].abs();
            if model.is_positive(product) {
                beta += product;
            }
        }
        for i in 0..model.n_linking_conss() {
            let dualdiff = (pricing.linking_dual(model, i) - self.stabcenter_linking[i]).abs();
            let product = dualdiff * self.subgradient_linking[i].abs();
            if model.is_positive(product) {
                beta += product;
            }
        }

        if model.is_positive(self.subgradientnorm) {
            beta /= self.subgradientnorm * self.dualdiffnorm;
        } else {
            beta = 0.0;
        }
        self.beta = beta;
        debug!(beta = self.beta, "updated beta");

        debug_assert!(
            model.is_positive(self.beta) || model.is_zero(self.subgradientnorm)
        );
        debug_assert!(model.is_le(self.beta, 1.0));
    }

    fn calculate_hybridfactor(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        pricing: &dyn PricingType,
    ) {
        let mut divisornorm = 0.0;

        for i in 0..model.n_master_conss() {
            let divisor = (self.beta - 1.0) * self.stabcenter_cons[i]
                + self.beta * (self.subgradient_cons[i] * self.dualdiffnorm / self.subgradientnorm)
                + (1.0 - self.beta) * pricing.cons_dual(model, model.master_cons_id(i));
            if model.is_positive(divisor * divisor) {
                divisornorm += divisor * divisor;
            }
        }
        for i in 0..model.n_original_cuts() {
            let divisor = (self.beta - 1.0) * self.stabcenter_cuts[i]
                + self.beta * (self.subgradient_cuts[i] * self.dualdiffnorm / self.subgradientnorm)
                + (1.0 - self.beta) * pricing.row_dual(model, i);
            if model.is_positive(divisor * divisor) {
                divisornorm += divisor * divisor;
            }
        }
        for (pos, &id) in self.mastercons_ids.iter().enumerate() {
            let divisor = (self.beta - 1.0) * self.stabcenter_mastercons[pos]
                + self.beta
                    * (self.subgradient_mastercons[pos] * self.dualdiffnorm
                        / self.subgradientnorm)
                + (1.0 - self.beta) * pricing.mastercons_dual(model, store, id);
            if model.is_positive(divisor * divisor) {
                divisornorm += divisor * divisor;
            }
        }
        for i in 0..model.n_linking_conss() {
            let divisor = (self.beta - 1.0) * self.stabcenter_linking[i]
                + self.beta
                    * (self.subgradient_linking[i] * self.dualdiffnorm / self.subgradientnorm)
                + (1.0 - self.beta) * pricing.linking_dual(model, i);
            if model.is_positive(divisor * divisor) {
                divisornorm += divisor * divisor;
            }
        }

        let divisornorm = divisornorm.sqrt();
        self.hybridfactor = ((1.0 - self.alpha) * self.dualdiffnorm) / divisornorm;
        debug!(hybridfactor = self.hybridfactor, "updated hybridfactor");
        debug_assert!(model.is_positive(self.hybridfactor));
    }

    /* subgradient */

    /// Value a constraint coefficient contributes to an activity: the master
    /// LP value for variables kept in the master, the pricing solution value
    /// for block variables.
    fn orig_var_activity(
        &self,
        model: &Model,
        origvar: crate::variable::VarId,
        pricingcols: &[Option<&Column>],
    ) -> f64 {
        let var = model.var(origvar);
        match var.kind() {
            VarKind::Original { block, .. } if *block < 0 => model
                .master_copy_of(origvar)
                .map(|mv| model.sol_val(mv))
                .unwrap_or(0.0),
            VarKind::Original { block, .. } => {
                let block = *block as usize;
                if !model.is_block_relevant(block) {
                    return 0.0;
                }
                match (model.pricing_var_of(origvar), pricingcols[block]) {
                    (Some(pricingvar), Some(col)) => col.sol_val(pricingvar),
                    _ => 0.0,
                }
            }
            _ => 0.0,
        }
    }

    /// Evaluates the subgradient of the stability center: per group the
    /// infeasibility of the center dual's binding side against the activity
    /// of the current primal and pricing solutions. The Euclidean norm is
    /// cached.
    pub fn calculate_subgradient(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        pricingcols: &[Option<&Column>],
    ) {
        self.subgradientnorm = 0.0;

        for i in 0..model.n_master_conss() {
            let origcons = model.orig_master_cons(i);
            let dual = self.stabcenter_cons[i];

            let mut activity = 0.0;
            for &(origvar, val) in origcons.coefs() {
                activity += val * self.orig_var_activity(model, origvar, pricingcols);
            }

            let infeasibility = if model.is_feas_positive(dual) {
                origcons.lhs() - activity
            } else if model.is_feas_negative(dual) {
                origcons.rhs() - activity
            } else {
                0.0
            };

            self.subgradient_cons[i] = infeasibility;
            if model.is_positive(infeasibility * infeasibility) {
                self.subgradientnorm += infeasibility * infeasibility;
            }
        }

        for i in 0..model.n_original_cuts() {
            let origrow = model.original_cut_orig_row(i);
            let dual = self.stabcenter_cuts[i];

            let mut activity = 0.0;
            for &(origvar, val) in origrow.coefs() {
                activity += val * self.orig_var_activity(model, origvar, pricingcols);
            }

            let infeasibility = if model.is_feas_positive(dual) {
                origrow.lhs() - activity
            } else if model.is_feas_negative(dual) {
                origrow.rhs() - activity
            } else {
                0.0
            };

            self.subgradient_cuts[i] = infeasibility;
            if model.is_positive(infeasibility * infeasibility) {
                self.subgradientnorm += infeasibility * infeasibility;
            }
        }

        let ids = self.mastercons_ids.clone();
        for (pos, &id) in ids.iter().enumerate() {
            let dual = self.stabcenter_mastercons[pos];

            let mut activity = 0.0;
            for &(var, val) in store.coefs(model, id) {
                // only linking and static master variables
                if model.var(var).block() >= 0 {
                    continue;
                }
                activity += val * model.sol_val(var);
            }
            for m in store.mastercons(id).pricing_mods() {
                if let Some(col) = pricingcols[m.block()] {
                    activity += col.sol_val(m.coef_var());
                }
            }

            let infeasibility = if model.is_feas_positive(dual) {
                store.lhs(model, id) - activity
            } else if model.is_feas_negative(dual) {
                store.rhs(model, id) - activity
            } else {
                0.0
            };

            self.subgradient_mastercons[pos] = infeasibility;
            if model.is_positive(infeasibility * infeasibility) {
                self.subgradientnorm += infeasibility * infeasibility;
            }
        }

        for i in 0..model.n_linking_conss() {
            let link = model.linking_cons(i);
            let masterval = model.sol_val(link.mastervar());
            let pricingval = pricingcols[link.block()]
                .map(|col| col.sol_val(link.pricingvar()))
                .unwrap_or(0.0);
            let infeasibility = masterval - pricingval;

            self.subgradient_linking[i] = infeasibility;
            if model.is_positive(infeasibility * infeasibility) {
                self.subgradientnorm += infeasibility * infeasibility;
            }
        }

        self.subgradientnorm = self.subgradientnorm.sqrt();
        debug!(subgradientnorm = self.subgradientnorm, "updated subgradient");
    }

    /// Recomputes the scalar product of the direction from the stability
    /// center to the current duals with the subgradient of the pricing
    /// columns. Drives the alpha schedule.
    pub fn update_subgradient_product(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        pricing: &dyn PricingType,
        pricingcols: &[Option<&Column>],
    ) {
        self.update_cons_arrays(model);
        self.update_cut_arrays(model);
        self.update_mastercons_arrays(model, store);
        self.update_linking_arrays(model);

        let mut gradientproduct = 0.0;

        for i in 0..model.n_master_conss() {
            let origcons = model.orig_master_cons(i);
            let dual = pricing.cons_dual(model, model.master_cons_id(i));
            let stabdual = self.cons_get_dual(model, pricing, i);

            let side = if model.is_feas_positive(stabdual) {
                origcons.lhs()
            } else if model.is_feas_negative(stabdual) {
                origcons.rhs()
            } else {
                continue;
            };

            for &(origvar, val) in origcons.coefs() {
                let activity = self.orig_var_activity(model, origvar, pricingcols);
                gradientproduct -= (dual - self.stabcenter_cons[i]) * val * activity;
            }
            gradientproduct += (dual - self.stabcenter_cons[i]) * side;
        }

        for i in 0..model.n_original_cuts() {
            let origrow = model.original_cut_orig_row(i);
            let dual = pricing.row_dual(model, i);
            let stabdual = self.row_get_dual(model, pricing, i);

            let side = if model.is_feas_positive(stabdual) {
                origrow.lhs()
            } else if model.is_feas_negative(stabdual) {
                origrow.rhs()
            } else {
                continue;
            };

            for &(origvar, val) in origrow.coefs() {
                let activity = self.orig_var_activity(model, origvar, pricingcols);
                gradientproduct -= (dual - self.stabcenter_cuts[i]) * val * activity;
            }
            gradientproduct += (dual - self.stabcenter_cuts[i]) * side;
        }

        let ids = self.mastercons_ids.clone();
        for (pos, &id) in ids.iter().enumerate() {
            let dual = pricing.mastercons_dual(model, store, id);
            let center = self.stabcenter_mastercons[pos];
            let stabdual = self.mastercons_get_dual(model, store, pricing, id);

            let side = if model.is_feas_positive(stabdual) {
                store.lhs(model, id)
            } else if model.is_feas_negative(stabdual) {
                store.rhs(model, id)
            } else {
                continue;
            };

            for &(var, val) in store.coefs(model, id) {
                if model.var(var).block() >= 0 {
                    continue;
                }
                gradientproduct -= (dual - center) * val * model.sol_val(var);
            }
            for m in store.mastercons(id).pricing_mods() {
                if let Some(col) = pricingcols[m.block()] {
                    gradientproduct -= (dual - center) * col.sol_val(m.coef_var());
                }
            }
            gradientproduct += (dual - center) * side;
        }

        for i in 0..model.n_linking_conss() {
            let link = model.linking_cons(i);
            let dual = pricing.linking_dual(model, i) - self.stabcenter_linking[i];
            let stabdual = self.linking_get_dual(model, pricing, i);
            if model.is_feas_zero(stabdual) {
                continue;
            }

            let masterval = model.sol_val(link.mastervar());
            let pricingval = pricingcols[link.block()]
                .map(|col| col.sol_val(link.pricingvar()))
                .unwrap_or(0.0);
            gradientproduct -= dual * (masterval - pricingval);
        }

        debug!(gradientproduct, "updated subgradient product");
        self.subgradientproduct = gradientproduct;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricingtype::ReducedCostPricing;
    use crate::testing;
    use approx::assert_relative_eq;

    #[test]
    fn projection_without_center_is_the_identity() {
        let (mut model, fix) = testing::two_block_model();
        let mut stab = Stabilization::new(false);
        let pricing = ReducedCostPricing::default();

        model.set_cons_dual(fix.conss[0], 3.5);
        model.set_cons_dual(fix.conss[1], -1.25);
        assert_eq!(stab.cons_get_dual(&model, &pricing, 0), 3.5);
        assert_eq!(stab.cons_get_dual(&model, &pricing, 1), -1.25);
    }

    #[test]
    fn projection_blends_center_and_current() {
        let (mut model, fix) = testing::two_block_model();
        let mut stab = Stabilization::new(false);
        let pricing = ReducedCostPricing::default();

        model.set_cons_dual(fix.conss[0], 1.0);
        let dualsolconv = vec![0.0; model.n_blocks()];
        let store = MasterConsStore::new();
        stab.update_stability_center(&model, &store, &pricing, 10.0, &dualsolconv, &[None, None])
            .unwrap();
        assert!(stab.has_stability_center());

        model.set_cons_dual(fix.conss[0], 0.0);
        // alpha = 0.8: 0.8*1 + 0.2*0
        assert_relative_eq!(stab.cons_get_dual(&model, &pricing, 0), 0.8);
    }

    #[test]
    fn center_only_moves_on_bound_increase() {
        let (mut model, fix) = testing::two_block_model();
        let mut stab = Stabilization::new(false);
        let pricing = ReducedCostPricing::default();
        let store = MasterConsStore::new();
        let dualsolconv = vec![0.0; model.n_blocks()];

        model.set_cons_dual(fix.conss[0], 1.0);
        stab.update_stability_center(&model, &store, &pricing, 10.0, &dualsolconv, &[None, None])
            .unwrap();
        assert_relative_eq!(stab.stabcenter_cons[0], 1.0);

        model.set_cons_dual(fix.conss[0], 5.0);
        stab.update_stability_center(&model, &store, &pricing, 9.0, &dualsolconv, &[None, None])
            .unwrap();
        assert_relative_eq!(stab.stabcenter_cons[0], 1.0);

        stab.update_stability_center(&model, &store, &pricing, 11.0, &dualsolconv, &[None, None])
            .unwrap();
        // new center is the smoothed dual 0.8*1 + 0.2*5
        assert_relative_eq!(stab.stabcenter_cons[0], 1.8);
    }

    #[test]
    fn alpha_schedule() {
        // the concrete walk: alpha 0.8, positive product decreases to 0.7,
        // negative product increases to 0.73, three mispricings end at 0.19
        let (model, _fix) = testing::two_block_model();
        let mut stab = Stabilization::new(false);
        stab.hasstabilitycenter = true;
        stab.t = 0;

        stab.subgradientproduct = 0.5;
        stab.update_alpha(&model);
        assert_relative_eq!(stab.alpha(), 0.7);
        assert_eq!(stab.t, 1);

        stab.subgradientproduct = -0.5;
        stab.update_alpha(&model);
        assert_relative_eq!(stab.alpha(), 0.73);
        assert_eq!(stab.t, 2);

        stab.activate_mispricing_schedule();
        stab.update_alpha_misprice();
        stab.update_alpha_misprice();
        stab.update_alpha_misprice();
        assert_relative_eq!(stab.alphabar(), 1.0 - 3.0 * (1.0 - 0.73), epsilon = 1e-12);
        assert_eq!(stab.t, 2);

        stab.deactivate_mispricing_schedule();
        assert_eq!(stab.k, 0);
        assert!(!stab.is_in_mispricing_schedule());
    }

    #[test]
    fn is_stabilized_checks_the_active_weight() {
        let (model, _fix) = testing::two_block_model();
        let mut stab = Stabilization::new(false);
        assert!(stab.is_stabilized(&model));

        stab.alpha = 0.0;
        assert!(!stab.is_stabilized(&model));

        stab.activate_mispricing_schedule();
        stab.alphabar = 0.2;
        assert!(stab.is_stabilized(&model));
        stab.alphabar = 0.0;
        assert!(!stab.is_stabilized(&model));
    }

    #[test]
    fn mispricing_uses_alphabar() {
        let (mut model, fix) = testing::two_block_model();
        let mut stab = Stabilization::new(false);
        let pricing = ReducedCostPricing::default();
        let store = MasterConsStore::new();
        let dualsolconv = vec![0.0; model.n_blocks()];

        model.set_cons_dual(fix.conss[0], 1.0);
        stab.update_stability_center(&model, &store, &pricing, 1.0, &dualsolconv, &[None, None])
            .unwrap();
        model.set_cons_dual(fix.conss[0], 0.0);

        stab.activate_mispricing_schedule();
        stab.update_alpha_misprice();
        // alphabar = 1 - 1*(1-0.8) = 0.8 on the first misprice
        assert_relative_eq!(stab.cons_get_dual(&model, &pricing, 0), 0.8);
        stab.update_alpha_misprice();
        // alphabar = 1 - 2*0.2 = 0.6
        assert_relative_eq!(stab.cons_get_dual(&model, &pricing, 0), 0.6);
    }

    #[test]
    fn node_change_resets_in_node_state() {
        let (mut model, _fix) = testing::two_block_model();
        let mut stab = Stabilization::new(false);

        stab.update_node(&model);
        stab.hasstabilitycenter = true;
        stab.alpha = 0.3;
        stab.k = 4;
        stab.inmispricingschedule = true;

        model.focus_node(7);
        stab.update_node(&model);
        assert!(!stab.has_stability_center());
        assert_relative_eq!(stab.alpha(), 0.8);
        assert_eq!(stab.k, 0);
        assert_eq!(stab.t, 1);
        assert!(!stab.is_in_mispricing_schedule());
        assert_eq!(stab.stabcenterbound, f64::NEG_INFINITY);
    }

    #[test]
    fn hybrid_projection_is_sign_feasible() {
        let (mut model, fix) = testing::two_block_model();
        let mut stab = Stabilization::new(true);
        stab.hasstabilitycenter = true;
        stab.beta = 0.5;
        stab.hybridfactor = 1.0;
        stab.dualdiffnorm = 1.0;
        stab.subgradientnorm = 1.0;
        stab.update_cons_arrays(&model);
        stab.stabcenter_cons[0] = -4.0;
        stab.subgradient_cons[0] = -10.0;

        let pricing = ReducedCostPricing::default();
        model.set_cons_dual(fix.conss[0], -3.0);

        // cons 0 has rhs infinity, the projected dual must be >= 0
        let dual = stab.cons_get_dual(&model, &pricing, 0);
        assert!(dual >= 0.0);

        // cons 1 has lhs -infinity, the projected dual must be <= 0
        stab.stabcenter_cons[1] = 4.0;
        stab.subgradient_cons[1] = 10.0;
        model.set_cons_dual(fix.conss[1], 3.0);
        let dual = stab.cons_get_dual(&model, &pricing, 1);
        assert!(dual <= 0.0);
    }

    #[test]
    fn subgradient_of_linking_constraints_is_master_minus_pricing() {
        let (mut model, fix) = testing::two_block_model();
        model.set_var_linking(fix.orig[0]);
        let mv = model.add_static_master_var(fix.orig[0], true);
        model.add_linking_cons("link", mv, fix.pricing[0], 0);
        model.set_sol_val(mv, 2.5);

        let mut stab = Stabilization::new(true);
        stab.update_cons_arrays(&model);
        stab.update_cut_arrays(&model);
        stab.update_linking_arrays(&model);

        let col = Column::new(&model, 0, &[(fix.pricing[0], 1.0)], false, 0.0);
        let store = MasterConsStore::new();
        let cols: Vec<Option<&Column>> = vec![Some(&col), None];
        stab.calculate_subgradient(&model, &store, &cols);

        assert_relative_eq!(stab.subgradient_linking[0], 1.5);
        assert_relative_eq!(stab.subgradientnorm, 1.5);
    }

    #[test]
    fn subgradient_product_drives_alpha() {
        let (mut model, fix) = testing::two_block_model();
        let mut stab = Stabilization::new(false);
        let pricing = ReducedCostPricing::default();
        let store = MasterConsStore::new();
        let dualsolconv = vec![0.0; model.n_blocks()];

        model.set_cons_dual(fix.conss[0], 1.0);
        stab.update_stability_center(&model, &store, &pricing, 1.0, &dualsolconv, &[None, None])
            .unwrap();

        // current duals move up; pricing solution satisfies the constraint
        model.set_cons_dual(fix.conss[0], 2.0);
        let col = Column::new(
            &model,
            0,
            &[(fix.pricing[0], 3.0), (fix.pricing[1], 3.0)],
            false,
            0.0,
        );
        let col1 = Column::new(&model, 1, &[(fix.pricing[3], 3.0)], false, 0.0);
        let cols: Vec<Option<&Column>> = vec![Some(&col), Some(&col1)];
        stab.update_subgradient_product(&model, &store, &pricing, &cols);

        // activity 9 exceeds the lhs 2: product (dual diff) * (2 - 9) < 0
        assert!(stab.subgradientproduct < 0.0);

        let before = stab.alpha();
        stab.update_alpha(&model);
        assert!(stab.alpha() > before);
    }

    proptest::proptest! {
        #[test]
        fn alpha_stays_within_bounds(steps in proptest::collection::vec(0u8..3, 1..60)) {
            let (model, _fix) = testing::two_block_model();
            let mut stab = Stabilization::new(false);
            stab.hasstabilitycenter = true;

            for step in steps {
                match step {
                    0 => {
                        stab.subgradientproduct = 1.0;
                        stab.update_alpha(&model);
                    }
                    1 => {
                        stab.subgradientproduct = -1.0;
                        stab.update_alpha(&model);
                    }
                    _ => stab.update_alpha_misprice(),
                }
                proptest::prop_assert!(stab.alpha() >= 0.0 && stab.alpha() <= 0.9);
                proptest::prop_assert!(stab.alphabar() >= 0.0 && stab.alphabar() <= 1.0);
            }
        }
    }
}
