use tracing::debug;

use crate::col::Column;
use crate::constraint::{ConsId, PricingCons};
use crate::model::Model;
use crate::retcode::{Result, Retcode};
use crate::row::RowId;
use crate::variable::VarId;

/// Identity of an extended master constraint in its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MasterConsId(pub(crate) usize);

/// Master-side object an extended master constraint is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterConsSide {
    /// Backed by a constraint created by a branching rule.
    Cons(ConsId),
    /// Backed by a row created by a separator.
    Row(RowId),
}

/// The modifications an extended master constraint injects into one block's
/// pricing problem to keep pricing tractable.
#[derive(Debug, Clone)]
pub struct PricingModification {
    pub(crate) block: usize,
    /// Inferred variable whose solution value in a column equals the
    /// column's coefficient in the extended master constraint. Carries the
    /// negated dual of the constraint as its objective.
    pub(crate) coefvar: VarId,
    /// Additional inferred variables with zero objective.
    pub(crate) additional_vars: Vec<VarId>,
    /// Additional constraints binding the coefficient variable and the
    /// additional variables.
    pub(crate) additional_conss: Vec<PricingCons>,
}

impl PricingModification {
    /// Returns the block of the pricing modification.
    pub fn block(&self) -> usize {
        self.block
    }

    /// Returns the coefficient variable.
    pub fn coef_var(&self) -> VarId {
        self.coefvar
    }

    /// Returns the additional inferred variables.
    pub fn additional_vars(&self) -> &[VarId] {
        &self.additional_vars
    }

    /// Returns the additional pricing constraints.
    pub fn additional_conss(&self) -> &[PricingCons] {
        &self.additional_conss
    }

    /// Returns whether the given variable is this modification's coefficient
    /// variable.
    pub fn is_coef_var(&self, var: VarId) -> bool {
        self.coefvar == var
    }
}

/// Data of a Chvátal–Gomory master cut: the weights of the aggregated master
/// constraints and their indices.
#[derive(Debug, Clone)]
pub struct CgCutPayload {
    pub(crate) weights: Vec<f64>,
    pub(crate) cons_indices: Vec<usize>,
}

impl CgCutPayload {
    /// Creates the payload of a Chvátal–Gomory cut.
    pub fn new(weights: Vec<f64>, cons_indices: Vec<usize>) -> Self {
        debug_assert_eq!(weights.len(), cons_indices.len());
        CgCutPayload {
            weights,
            cons_indices,
        }
    }
}

/// Rule-specific data attached to an extended master constraint.
#[derive(Debug, Clone)]
pub enum MasterConsPayload {
    /// Created by Vanderbeck generic branching.
    GenericBranch(crate::branch_generic::GenericBranchPayload),
    /// Created by component-bound branching.
    CompBnd(crate::branch_compbnd::CompBndPayload),
    /// A Chvátal–Gomory cut separated in the master.
    ChvatalGomory(CgCutPayload),
}

impl MasterConsPayload {
    fn is_branch(&self) -> bool {
        matches!(
            self,
            MasterConsPayload::GenericBranch(_) | MasterConsPayload::CompBnd(_)
        )
    }
}

/// A master row or constraint paired with per-block pricing modifications.
#[derive(Debug, Clone)]
pub struct ExtendedMasterCons {
    pub(crate) side: MasterConsSide,
    pub(crate) pricing_mods: Vec<PricingModification>,
    pub(crate) payload: MasterConsPayload,
}

impl ExtendedMasterCons {
    /// Returns the master-side object backing the constraint.
    pub fn side(&self) -> MasterConsSide {
        self.side
    }

    /// Returns the pricing modifications of the constraint.
    pub fn pricing_mods(&self) -> &[PricingModification] {
        &self.pricing_mods
    }

    /// Returns the rule-specific payload.
    pub fn payload(&self) -> &MasterConsPayload {
        &self.payload
    }

    /// Returns the pricing modification for a block, if one exists.
    pub fn pricing_mod(&self, block: usize) -> Option<&PricingModification> {
        self.pricing_mods.iter().find(|m| m.block == block)
    }

    /// Returns whether the given variable is a coefficient variable of one
    /// of the pricing modifications.
    pub fn is_coef_var(&self, var: VarId) -> bool {
        self.pricing_mods.iter().any(|m| m.is_coef_var(var))
    }
}

/// Arena owning all extended master constraints of a solve.
///
/// Pricing modifications are owned by their constraint; inferred pricing
/// variables carry a [`MasterConsId`] back-reference that is resolved through
/// this store, avoiding ownership cycles.
#[derive(Debug, Default)]
pub struct MasterConsStore {
    emcs: Vec<ExtendedMasterCons>,
}

impl MasterConsStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MasterConsStore { emcs: Vec::new() }
    }

    /// Returns the number of extended master constraints ever created.
    pub fn len(&self) -> usize {
        self.emcs.len()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.emcs.is_empty()
    }

    /// Returns an extended master constraint.
    pub fn mastercons(&self, id: MasterConsId) -> &ExtendedMasterCons {
        &self.emcs[id.0]
    }

    /// Creates a pricing modification, checking that the coefficient
    /// variable is an inferred coefficient variable with zero current
    /// objective and that the additional variables are inferred with zero
    /// objective.
    pub fn create_pricing_modification(
        &self,
        model: &Model,
        block: usize,
        coefvar: VarId,
        additional_vars: Vec<VarId>,
        additional_conss: Vec<PricingCons>,
    ) -> Result<PricingModification> {
        if block >= model.n_blocks() || !model.is_block_relevant(block) {
            return Err(Retcode::invalid_data(format!(
                "block {} is not a relevant pricing problem",
                block
            )));
        }
        if !model.var(coefvar).is_coef_var() || !model.is_zero(model.var(coefvar).obj()) {
            return Err(Retcode::invalid_data(format!(
                "<{}> is not a zero-objective inferred coefficient variable",
                model.var(coefvar).name()
            )));
        }
        for &var in &additional_vars {
            if var == coefvar
                || !model.var(var).is_inferred_pricing()
                || !model.is_zero(model.var(var).obj())
            {
                return Err(Retcode::invalid_data(format!(
                    "<{}> is not a valid additional inferred variable",
                    model.var(var).name()
                )));
            }
        }
        Ok(PricingModification {
            block,
            coefvar,
            additional_vars,
            additional_conss,
        })
    }

    fn insert(
        &mut self,
        model: &mut Model,
        side: MasterConsSide,
        pricing_mods: Vec<PricingModification>,
        payload: MasterConsPayload,
    ) -> Result<MasterConsId> {
        let mut seen = vec![false; model.n_blocks()];
        for m in &pricing_mods {
            if seen[m.block] {
                return Err(Retcode::invalid_data(format!(
                    "duplicate pricing modification for block {}",
                    m.block
                )));
            }
            seen[m.block] = true;
        }

        let id = MasterConsId(self.emcs.len());
        for m in &pricing_mods {
            model.set_inferred_var_mastercons(m.coefvar, id);
            for &var in &m.additional_vars {
                model.set_inferred_var_mastercons(var, id);
            }
        }
        self.emcs.push(ExtendedMasterCons {
            side,
            pricing_mods,
            payload,
        });
        Ok(id)
    }

    /// Creates an extended master constraint backed by a master constraint,
    /// taking ownership of the pricing modifications.
    pub fn create_from_cons(
        &mut self,
        model: &mut Model,
        cons: ConsId,
        pricing_mods: Vec<PricingModification>,
        payload: MasterConsPayload,
    ) -> Result<MasterConsId> {
        self.insert(model, MasterConsSide::Cons(cons), pricing_mods, payload)
    }

    /// Creates an extended master constraint backed by a master row, taking
    /// ownership of the pricing modifications.
    pub fn create_from_row(
        &mut self,
        model: &mut Model,
        row: RowId,
        pricing_mods: Vec<PricingModification>,
        payload: MasterConsPayload,
    ) -> Result<MasterConsId> {
        self.insert(model, MasterConsSide::Row(row), pricing_mods, payload)
    }

    /// Returns whether the backing constraint or row is part of the current
    /// master LP.
    pub fn is_active(&self, model: &Model, id: MasterConsId) -> bool {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(cons) => model.cons(cons).is_active(),
            MasterConsSide::Row(row) => model.row(row).is_in_lp(),
        }
    }

    /// Returns the left-hand side of the extended master constraint.
    pub fn lhs(&self, model: &Model, id: MasterConsId) -> f64 {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(cons) => model.cons(cons).lhs(),
            MasterConsSide::Row(row) => model.row(row).lhs(),
        }
    }

    /// Returns the right-hand side of the extended master constraint.
    pub fn rhs(&self, model: &Model, id: MasterConsId) -> f64 {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(cons) => model.cons(cons).rhs(),
            MasterConsSide::Row(row) => model.row(row).rhs(),
        }
    }

    /// Returns the constant of the extended master constraint; always 0 for
    /// constraint-backed ones.
    pub fn constant(&self, model: &Model, id: MasterConsId) -> f64 {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(_) => 0.0,
            MasterConsSide::Row(row) => model.row(row).constant(),
        }
    }

    /// Returns the name of the extended master constraint.
    pub fn name<'a>(&self, model: &'a Model, id: MasterConsId) -> &'a str {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(cons) => model.cons(cons).name(),
            MasterConsSide::Row(row) => model.row(row).name(),
        }
    }

    /// Returns the nonzero coefficients of the backing constraint or row.
    pub fn coefs<'a>(&self, model: &'a Model, id: MasterConsId) -> &'a [(VarId, f64)] {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(cons) => model.cons(cons).coefs(),
            MasterConsSide::Row(row) => model.row(row).coefs(),
        }
    }

    /// Returns the dual value of the backing constraint or row.
    pub fn dual(&self, model: &Model, id: MasterConsId) -> f64 {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(cons) => model.cons(cons).dual(),
            MasterConsSide::Row(row) => model.row(row).dual(),
        }
    }

    /// Returns the Farkas multiplier of the backing constraint or row.
    pub fn farkas_dual(&self, model: &Model, id: MasterConsId) -> f64 {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(cons) => model.cons(cons).farkas_dual(),
            MasterConsSide::Row(row) => model.row(row).farkas_dual(),
        }
    }

    /// Adds a master variable with its coefficient to the backing constraint
    /// or row.
    pub fn add_master_var(
        &self,
        model: &mut Model,
        id: MasterConsId,
        var: VarId,
        coef: f64,
    ) {
        match self.emcs[id.0].side {
            MasterConsSide::Cons(cons) => model.cons_mut(cons).add_coef(var, coef),
            MasterConsSide::Row(row) => model.row_mut(row).add_coef(var, coef),
        }
    }

    /// Registers the pricing modifications in their pricing problems: first
    /// the coefficient variable, then the additional variables, then the
    /// additional constraints.
    pub fn apply(&self, model: &mut Model, id: MasterConsId) -> Result<()> {
        for m in &self.emcs[id.0].pricing_mods {
            model.register_pricing_var(m.block, m.coefvar);
            for &var in &m.additional_vars {
                model.register_pricing_var(m.block, var);
            }
            for cons in &m.additional_conss {
                model.add_pricing_cons(m.block, cons.clone());
            }
        }
        Ok(())
    }

    /// Removes the pricing modifications from their pricing problems again,
    /// constraints first, then variables.
    pub fn undo(&self, model: &mut Model, id: MasterConsId) -> Result<()> {
        for m in &self.emcs[id.0].pricing_mods {
            for cons in &m.additional_conss {
                model.del_pricing_cons(m.block, cons.id)?;
            }
            for &var in m.additional_vars.iter().rev() {
                model.deregister_pricing_var(m.block, var)?;
            }
            model.deregister_pricing_var(m.block, m.coefvar)?;
        }
        Ok(())
    }

    /// Propagates the constraint's dual value into the pricing problems by
    /// setting each coefficient variable's objective to the negated dual.
    /// Called once per pricing round before the subproblem solves.
    ///
    /// Chvátal–Gomory duals are theoretically non-positive; a numerically
    /// positive value is corrected to zero before it reaches the objective.
    pub fn update_dual(&self, model: &mut Model, id: MasterConsId, dual: f64) {
        let emc = &self.emcs[id.0];
        let obj = match emc.payload {
            MasterConsPayload::ChvatalGomory(_) if dual >= 0.0 => 0.0,
            _ => -dual,
        };
        for m in &emc.pricing_mods {
            model.chg_var_obj(m.coefvar, obj);
        }
    }

    /// Computes the coefficient a column solution would have in the extended
    /// master constraint.
    pub fn coefficient(
        &self,
        model: &Model,
        id: MasterConsId,
        solvars: &[VarId],
        solvals: &[f64],
        probnr: usize,
    ) -> Result<f64> {
        let emc = &self.emcs[id.0];
        match &emc.payload {
            MasterConsPayload::GenericBranch(data) => Ok(
                crate::branch_generic::mastercons_coef(model, data, solvars, solvals, probnr),
            ),
            MasterConsPayload::CompBnd(data) => Ok(crate::branch_compbnd::mastercons_coef(
                model, data, solvars, solvals, probnr,
            )),
            MasterConsPayload::ChvatalGomory(_) => {
                self.cg_coefficient_fresh(model, id, solvars, solvals, probnr)
            }
        }
    }

    /// Chvátal–Gomory coefficient of a column with cached master
    /// coefficients: `floor(sum_i w_i * mastercoef[i])`.
    pub fn cg_coefficient_from_col(
        &self,
        model: &Model,
        id: MasterConsId,
        col: &Column,
    ) -> Result<f64> {
        let emc = &self.emcs[id.0];
        let data = match &emc.payload {
            MasterConsPayload::ChvatalGomory(data) => data,
            _ => return Err(Retcode::NotImplemented("coefficient of a non-cut payload")),
        };
        debug_assert!(col.initialized_coefs());
        let mut coef = 0.0;
        for (i, &w) in data.weights.iter().enumerate() {
            coef += w * col.master_coefs()[data.cons_indices[i]];
        }
        Ok(model.floor(coef))
    }

    /// Chvátal–Gomory coefficient of a fresh column without cached master
    /// coefficients, evaluated through the pricing constraint of the cut's
    /// pricing modification: `floor(sum_j a_j * x_j)`.
    fn cg_coefficient_fresh(
        &self,
        model: &Model,
        id: MasterConsId,
        solvars: &[VarId],
        solvals: &[f64],
        probnr: usize,
    ) -> Result<f64> {
        let emc = &self.emcs[id.0];
        let m = match emc.pricing_mod(probnr) {
            Some(m) => m,
            None => {
                debug!(probnr, "no pricing modification, coefficient 0");
                return Ok(0.0);
            }
        };
        let cons = m
            .additional_conss
            .first()
            .ok_or(Retcode::NotImplemented("cut without a pricing constraint"))?;

        let mut coef = 0.0;
        for &(var, conscoef) in cons.coefs() {
            if model.var(var).is_inferred_pricing() {
                continue;
            }
            if let Some(pos) = solvars.iter().position(|&v| v == var) {
                coef += conscoef * solvals[pos];
            }
        }
        Ok(model.floor(coef))
    }

    /// Adapts a column so that it respects the cut's pricing modification:
    /// the computed coefficient value is spliced into the column's inferred
    /// arrays, keeping them sorted by variable identity.
    pub fn cg_adjust_column(
        &self,
        model: &Model,
        id: MasterConsId,
        col: &mut Column,
    ) -> Result<()> {
        if !self.is_active(model, id) {
            return Ok(());
        }
        let m = match self.emcs[id.0].pricing_mod(col.block()) {
            Some(m) => m,
            None => return Ok(()),
        };
        let coefvar = m.coefvar;

        let coefval = if col.initialized_coefs() {
            self.cg_coefficient_from_col(model, id, col)?
        } else {
            let vars = col.vars.clone();
            let vals = col.vals.clone();
            self.cg_coefficient_fresh(model, id, &vars, &vals, col.block())?
        };

        if model.is_zero(coefval) {
            return Ok(());
        }

        match col.inferred_vars.binary_search(&coefvar) {
            Ok(pos) => col.inferred_vals[pos] = coefval,
            Err(pos) => {
                col.inferred_vars.insert(pos, coefvar);
                col.inferred_vals.insert(pos, coefval);
            }
        }
        Ok(())
    }

    /// Returns the active branch-rule extended master constraints.
    pub fn active_branch_conss(&self, model: &Model) -> Vec<MasterConsId> {
        (0..self.emcs.len())
            .map(MasterConsId)
            .filter(|&id| self.emcs[id.0].payload.is_branch() && self.is_active(model, id))
            .collect()
    }

    /// Returns the active separator-cut extended master constraints.
    pub fn active_cuts(&self, model: &Model) -> Vec<MasterConsId> {
        (0..self.emcs.len())
            .map(MasterConsId)
            .filter(|&id| {
                matches!(self.emcs[id.0].payload, MasterConsPayload::ChvatalGomory(_))
                    && self.is_active(model, id)
            })
            .collect()
    }
}
