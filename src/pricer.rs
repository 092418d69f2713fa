use tracing::debug;

use crate::branchrule::BranchRule;
use crate::col::Column;
use crate::colpool::ColPool;
use crate::mastercons::MasterConsStore;
use crate::model::Model;
use crate::params::{
    ColPoolSettings, FarkasSettings, PriceStoreSettings, ReducedCostSettings,
    StabilizationSettings,
};
use crate::pricestore::PriceStore;
use crate::pricingtype::{compute_redcost, FarkasPricing, PricingType, ReducedCostPricing};
use crate::retcode::Result;
use crate::solution::PricingSolution;
use crate::stabilization::Stabilization;
use crate::variable::VarId;

/// An enum representing the possible states of a `PricerResult`.
#[derive(Debug, PartialEq, Eq)]
pub enum PricerResultState {
    /// The pricer did not run.
    DidNotRun,
    /// The pricer added new columns with negative reduced cost.
    FoundColumns,
    /// The pricer did not find any columns with negative reduced cost
    /// (i.e. the current LP solution is optimal).
    NoColumns,
    /// The pricer wants to perform early branching.
    StopEarly,
}

/// A struct representing the result of a pricing round.
#[derive(Debug)]
pub struct PricerResult {
    /// The state of the pricer result.
    pub state: PricerResultState,
    /// A calculated lower bound on the objective value of the current node.
    pub lower_bound: Option<f64>,
}

/// The pricing controller: owns the column pool, the price store, the two
/// pricing types, the optional stabilization and the extended master
/// constraints, and sequences one pricing round.
///
/// Subproblem solves stay external; the controller consumes their solutions.
pub struct Pricer {
    /// Cache of columns for later reuse.
    pub colpool: ColPool,
    /// Staging buffer for the current round.
    pub pricestore: PriceStore,
    /// Reduced-cost pricing phase.
    pub redcost: ReducedCostPricing,
    /// Farkas pricing phase.
    pub farkas: FarkasPricing,
    /// Dual smoothing, if enabled.
    pub stabilization: Option<Stabilization>,
    /// All extended master constraints of the solve.
    pub mastercons: MasterConsStore,
}

impl Default for Pricer {
    fn default() -> Self {
        Pricer::new(
            ColPoolSettings::default(),
            PriceStoreSettings::default(),
            ReducedCostSettings::default(),
            FarkasSettings::default(),
            StabilizationSettings::default(),
        )
    }
}

impl Pricer {
    /// Creates the pricing controller from its settings.
    pub fn new(
        colpool: ColPoolSettings,
        pricestore: PriceStoreSettings,
        redcost: ReducedCostSettings,
        farkas: FarkasSettings,
        stabilization: StabilizationSettings,
    ) -> Self {
        Pricer {
            colpool: ColPool::new(colpool.age_limit),
            pricestore: PriceStore::new(pricestore),
            redcost: ReducedCostPricing::new(redcost),
            farkas: FarkasPricing::new(farkas),
            stabilization: Some(Stabilization::new(stabilization.hybrid_ascent)),
            mastercons: MasterConsStore::new(),
        }
    }

    /// Creates a controller without stabilization.
    pub fn without_stabilization(mut self) -> Self {
        self.stabilization = None;
        self
    }

    /// Propagates the (possibly smoothed) duals of all active extended
    /// master constraints into the pricing problems. Called once per round
    /// before the subproblem solves.
    pub fn update_mastercons_duals(&mut self, model: &mut Model, farkasmode: bool) -> Result<()> {
        let mut active = self.mastercons.active_branch_conss(model);
        active.extend(self.mastercons.active_cuts(model));

        let mut duals = Vec::with_capacity(active.len());
        for &id in &active {
            let dual = if farkasmode {
                self.farkas.mastercons_dual(model, &self.mastercons, id)
            } else if let Some(stab) = self.stabilization.as_mut() {
                stab.mastercons_get_dual(model, &self.mastercons, &self.redcost, id)
            } else {
                self.redcost.mastercons_dual(model, &self.mastercons, id)
            };
            duals.push(dual);
        }
        for (&id, &dual) in active.iter().zip(duals.iter()) {
            self.mastercons.update_dual(model, id, dual);
        }
        Ok(())
    }

    /// Turns a pricing solution into a finished column: cleaned entries,
    /// coefficient caches, cut adjustments, norm and reduced cost.
    pub fn make_col(
        &self,
        model: &Model,
        pricing: &dyn PricingType,
        sol: &PricingSolution,
    ) -> Result<Column> {
        let mut col = Column::from_solution(model, sol, 0.0);
        col.compute_master_coefs(model);

        let cuts = self.mastercons.active_cuts(model);
        for &cut in &cuts {
            self.mastercons.cg_adjust_column(model, cut, &mut col)?;
        }
        if !cuts.is_empty() {
            let coefs: Vec<f64> = cuts
                .iter()
                .map(|&cut| {
                    self.mastercons
                        .mastercons(cut)
                        .pricing_mod(col.block())
                        .map(|m| col.sol_val(m.coef_var()))
                        .unwrap_or(0.0)
                })
                .collect();
            col.append_separator_cut_coefs(&coefs);
        }

        col.compute_norm(model);
        let redcost = compute_redcost(model, &self.mastercons, pricing, &col);
        col.update_redcost(model, redcost, false);
        Ok(col)
    }

    /// Performs one pricing round over externally solved subproblem
    /// solutions: re-costs and prices the pool, offers the new columns to
    /// pool and store, applies the store's selection to the master, and fans
    /// the new master variables out to the branch rules.
    pub fn pricing_round(
        &mut self,
        model: &mut Model,
        rules: &mut [&mut dyn BranchRule],
        sols: &[PricingSolution],
        farkasmode: bool,
    ) -> Result<PricerResult> {
        if farkasmode {
            self.farkas.inc_calls();
            self.farkas.start_clock();
            self.pricestore.start_farkas();
            self.colpool.set_farkas(true);
        } else {
            self.redcost.inc_calls();
            self.redcost.start_clock();
        }

        self.colpool.update_node(model);
        if let Some(stab) = self.stabilization.as_mut() {
            stab.update_node(model);
        }
        self.update_mastercons_duals(model, farkasmode)?;

        let pricing: &dyn PricingType = if farkasmode { &self.farkas } else { &self.redcost };

        // reuse pooled columns before the fresh solutions are considered
        self.colpool.update_redcost(model, &self.mastercons, pricing);
        let npoolcols = self
            .colpool
            .price(model, &self.mastercons, &mut self.pricestore)?;
        debug!(npoolcols, "columns taken from the pool");

        let maxcolsround = pricing.max_cols_round(model);
        let maxcolsprob = pricing.max_cols_prob(model);
        let mut noffered = 0usize;
        let mut perprob = vec![0usize; model.n_blocks()];

        for sol in sols {
            if noffered >= maxcolsround {
                debug!(maxcolsround, "column limit of the round reached");
                break;
            }
            if perprob[sol.block] >= maxcolsprob {
                continue;
            }

            let col = self.make_col(model, pricing, sol)?;
            if !col.is_ray() {
                // keep a copy for later rounds; duplicates are dropped
                let _ = self.colpool.add_col(model, col.clone())?;
            }
            self.pricestore
                .add_col(model, &self.mastercons, col, false)?;
            noffered += 1;
            perprob[sol.block] += 1;
        }

        let added = self.pricestore.apply_cols(model)?;
        for &var in &added {
            self.notify_new_col(model, rules, var)?;
        }

        if farkasmode {
            self.pricestore.end_farkas();
            self.colpool.set_farkas(false);
            self.farkas.stop_clock();
        } else {
            self.redcost.stop_clock();
        }

        let state = if added.is_empty() {
            PricerResultState::NoColumns
        } else {
            PricerResultState::FoundColumns
        };
        Ok(PricerResult {
            state,
            lower_bound: None,
        })
    }

    /// Fans a freshly created master variable out to the branch rules so
    /// that every ancestor extended master constraint picks it up.
    pub fn notify_new_col(
        &self,
        model: &mut Model,
        rules: &mut [&mut dyn BranchRule],
        mastervar: VarId,
    ) -> Result<()> {
        for rule in rules.iter_mut() {
            rule.new_col(model, &self.mastercons, mastervar)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch_compbnd::CompBndBranching;
    use crate::branchrule::BranchingResult;
    use crate::testing;

    #[test]
    fn round_applies_negative_columns_and_pools_them() {
        let (mut model, fix) = testing::two_block_model();
        let mut pricer = Pricer::default().without_stabilization();

        model.set_cons_dual(fix.conss[0], 10.0);
        let nvars = model.n_vars();

        let sol = PricingSolution::new(0, false, -18.0, vec![(fix.pricing[0], 2.0)]);
        let result = pricer
            .pricing_round(&mut model, &mut [], &[sol], false)
            .unwrap();

        assert_eq!(result.state, PricerResultState::FoundColumns);
        assert_eq!(model.n_vars(), nvars + 1);
        assert!(pricer.pricestore.is_empty());
        // the pool kept a copy for later rounds
        assert_eq!(pricer.colpool.len(), 1);
        assert_eq!(pricer.redcost.calls(), 1);
    }

    #[test]
    fn nonnegative_columns_stay_out_of_the_master() {
        let (mut model, fix) = testing::two_block_model();
        let mut pricer = Pricer::default().without_stabilization();

        // no duals: reduced cost equals the objective, positive
        let nvars = model.n_vars();
        let sol = PricingSolution::new(0, false, 2.0, vec![(fix.pricing[0], 2.0)]);
        let result = pricer
            .pricing_round(&mut model, &mut [], &[sol], false)
            .unwrap();

        assert_eq!(result.state, PricerResultState::NoColumns);
        assert_eq!(model.n_vars(), nvars);
        assert_eq!(pricer.colpool.len(), 1);
    }

    #[test]
    fn farkas_round_forces_columns_in() {
        let (mut model, fix) = testing::two_block_model();
        let mut pricer = Pricer::default().without_stabilization();

        let nvars = model.n_vars();
        let sol = PricingSolution::new(0, false, 0.0, vec![(fix.pricing[0], 1.0)]);
        let result = pricer
            .pricing_round(&mut model, &mut [], &[sol], true)
            .unwrap();

        assert_eq!(result.state, PricerResultState::FoundColumns);
        assert_eq!(model.n_vars(), nvars + 1);
        assert_eq!(pricer.farkas.calls(), 1);
        assert_eq!(pricer.redcost.calls(), 0);
    }

    #[test]
    fn per_problem_column_limit_is_respected() {
        let (mut model, fix) = testing::two_block_model();
        let mut pricer = Pricer::default().without_stabilization();
        pricer.redcost.settings.max_cols_prob = 1;
        pricer.redcost.settings.max_cols_prob_root = 1;

        model.set_cons_dual(fix.conss[0], 10.0);

        let sols = vec![
            PricingSolution::new(0, false, -18.0, vec![(fix.pricing[0], 2.0)]),
            PricingSolution::new(0, false, -8.0, vec![(fix.pricing[0], 1.0)]),
        ];
        pricer
            .pricing_round(&mut model, &mut [], &sols, false)
            .unwrap();

        // only the first solution of the block was offered
        assert_eq!(pricer.pricestore.n_cols_found(), 1);
    }

    #[test]
    fn pool_duplicates_are_dropped_across_rounds() {
        let (mut model, fix) = testing::two_block_model();
        let mut pricer = Pricer::default().without_stabilization();

        let sol = PricingSolution::new(0, false, 2.0, vec![(fix.pricing[0], 2.0)]);
        pricer
            .pricing_round(&mut model, &mut [], &[sol.clone()], false)
            .unwrap();
        pricer
            .pricing_round(&mut model, &mut [], &[sol], false)
            .unwrap();

        assert_eq!(pricer.colpool.len(), 1);
    }

    #[test]
    fn new_master_variables_reach_active_branch_constraints() {
        let (mut model, fix) = testing::two_block_model();
        let mut pricer = Pricer::default().without_stabilization();

        // set up a component-bound branching with an active child
        testing::add_master_var(&mut model, 0, &[(fix.orig[0], 1.0)], 0.5);
        testing::add_master_var(&mut model, 0, &[(fix.orig[0], 3.0)], 0.5);
        let mut rule = CompBndBranching::default();
        assert_eq!(
            rule.execute_lp(&mut model, &mut pricer.mastercons).unwrap(),
            BranchingResult::Branched
        );
        let child = rule.children()[0];
        rule.activate_node(&mut model, &pricer.mastercons, child)
            .unwrap();
        let mc = rule.node_data(child).mastercons().unwrap();
        let seq = rule.node_data(child).seq().to_vec();
        assert_eq!(seq[0].bound, 2);

        // price a column inside the polytope (x0 = 1 <= 2)
        model.set_cons_dual(fix.conss[0], 10.0);
        let sol = PricingSolution::new(0, false, -9.0, vec![(fix.pricing[0], 1.0)]);
        let mut rules: Vec<&mut dyn BranchRule> = vec![&mut rule];
        let result = pricer
            .pricing_round(&mut model, &mut rules, &[sol], false)
            .unwrap();
        assert_eq!(result.state, PricerResultState::FoundColumns);

        // the new master variable entered the child's master constraint
        let coefs = pricer.mastercons.coefs(&model, mc);
        let newvar = crate::variable::VarId(model.n_vars() - 1);
        assert!(coefs.iter().any(|&(v, c)| v == newvar && c == 1.0));
    }
}
