use crate::constraint::{ConsId, Constraint, PricingCons};
use crate::retcode::{Result, Retcode};
use crate::row::{Row, RowId};
use crate::variable::{VarId, VarKind, VarType, Variable};

/// Default epsilon for equality of LP values.
const DEFAULT_EPSILON: f64 = 1e-9;
/// Default feasibility tolerance.
const DEFAULT_FEASTOL: f64 = 1e-6;
/// Default dual feasibility tolerance.
const DEFAULT_DUALFEASTOL: f64 = 1e-7;
/// Value treated as infinity.
const DEFAULT_INFINITY: f64 = 1e20;
/// Default limit on the size of a single grown array.
const DEFAULT_MEM_LIMIT: usize = 1 << 30;

/// A block of the decomposition.
#[derive(Debug, Clone)]
pub struct Block {
    /// Whether this block is solved as a pricing problem. Blocks that are
    /// identical to another block are not relevant; their representative is.
    pub(crate) relevant: bool,
    /// Number of identical blocks this (relevant) block represents.
    pub(crate) n_identical: usize,
    /// Representative block of this block's identical family.
    pub(crate) representative: usize,
}

/// A constraint linking the master copy of a linking variable to its pricing
/// copy in one block.
#[derive(Debug, Clone)]
pub struct LinkingCons {
    pub(crate) name: String,
    pub(crate) mastervar: VarId,
    pub(crate) pricingvar: VarId,
    pub(crate) block: usize,
    pub(crate) dual: f64,
    pub(crate) farkas: f64,
}

impl LinkingCons {
    /// Returns the master copy of the linking variable.
    pub fn mastervar(&self) -> VarId {
        self.mastervar
    }

    /// Returns the pricing copy of the linking variable.
    pub fn pricingvar(&self) -> VarId {
        self.pricingvar
    }

    /// Returns the block of the pricing copy.
    pub fn block(&self) -> usize {
        self.block
    }

    /// Returns the dual value of the linking constraint.
    pub fn dual(&self) -> f64 {
        self.dual
    }

    /// Returns the Farkas multiplier of the linking constraint.
    pub fn farkas_dual(&self) -> f64 {
        self.farkas
    }
}

/// One block's pricing problem: its variable set and constraint set.
///
/// Extended master constraints register inferred variables and additional
/// constraints here and remove them again when they are deactivated.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingProblem {
    pub(crate) vars: Vec<VarId>,
    pub(crate) conss: Vec<PricingCons>,
}

impl PricingProblem {
    /// Returns the variables of the pricing problem.
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// Returns the constraints of the pricing problem.
    pub fn conss(&self) -> &[PricingCons] {
        &self.conss
    }
}

/// In-memory facade of the host solver.
///
/// Everything the column-generation core consumes from the engine lives here:
/// the interned variables, the master constraints with their original-problem
/// twins, lifted cuts, linking and convexity information, the pricing problem
/// contents, LP values and the numerics the engine would normally provide.
pub struct Model {
    vars: Vec<Variable>,
    sol: Vec<f64>,
    rows: Vec<Row>,
    conss: Vec<Constraint>,
    masterconss: Vec<ConsId>,
    origmasterconss: Vec<Constraint>,
    originalcut_master: Vec<RowId>,
    originalcut_orig: Vec<RowId>,
    separatorcuts: Vec<RowId>,
    linkingconss: Vec<LinkingCons>,
    convduals: Vec<f64>,
    convfarkas: Vec<f64>,
    blocks: Vec<Block>,
    pricingprobs: Vec<PricingProblem>,
    node: i64,
    next_pricing_cons_id: usize,
    eps: f64,
    feastol: f64,
    dualfeastol: f64,
    infinity: f64,
    mem_limit: usize,
}

impl Default for Model {
    fn default() -> Self {
        Model::new()
    }
}

impl Model {
    /// Creates an empty model without blocks.
    pub fn new() -> Self {
        Model {
            vars: Vec::new(),
            sol: Vec::new(),
            rows: Vec::new(),
            conss: Vec::new(),
            masterconss: Vec::new(),
            origmasterconss: Vec::new(),
            originalcut_master: Vec::new(),
            originalcut_orig: Vec::new(),
            separatorcuts: Vec::new(),
            linkingconss: Vec::new(),
            convduals: Vec::new(),
            convfarkas: Vec::new(),
            blocks: Vec::new(),
            pricingprobs: Vec::new(),
            node: 1,
            next_pricing_cons_id: 0,
            eps: DEFAULT_EPSILON,
            feastol: DEFAULT_FEASTOL,
            dualfeastol: DEFAULT_DUALFEASTOL,
            infinity: DEFAULT_INFINITY,
            mem_limit: DEFAULT_MEM_LIMIT,
        }
    }

    /* blocks */

    /// Adds a relevant block representing `n_identical` identical blocks and
    /// returns its index.
    pub fn add_block(&mut self, n_identical: usize) -> usize {
        let block = self.blocks.len();
        self.blocks.push(Block {
            relevant: true,
            n_identical,
            representative: block,
        });
        self.pricingprobs.push(PricingProblem {
            vars: Vec::new(),
            conss: Vec::new(),
        });
        self.convduals.push(0.0);
        self.convfarkas.push(0.0);
        block
    }

    /// Adds a block that is identical to `representative` and returns its
    /// index. The block is not relevant and carries no own pricing problem
    /// content.
    pub fn add_identical_block(&mut self, representative: usize) -> usize {
        let block = self.blocks.len();
        self.blocks.push(Block {
            relevant: false,
            n_identical: 0,
            representative,
        });
        self.pricingprobs.push(PricingProblem {
            vars: Vec::new(),
            conss: Vec::new(),
        });
        self.convduals.push(0.0);
        self.convfarkas.push(0.0);
        block
    }

    /// Returns the number of blocks (pricing problems).
    pub fn n_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Returns whether a block is solved as a pricing problem.
    pub fn is_block_relevant(&self, block: usize) -> bool {
        self.blocks[block].relevant
    }

    /// Returns the number of identical blocks a relevant block represents.
    pub fn n_identical_blocks(&self, block: usize) -> usize {
        self.blocks[block].n_identical
    }

    /// Returns the representative of a block's identical family.
    pub fn block_representative(&self, block: usize) -> usize {
        self.blocks[block].representative
    }

    /// Returns a block's pricing problem.
    pub fn pricing_prob(&self, block: usize) -> &PricingProblem {
        &self.pricingprobs[block]
    }

    /* variables */

    fn push_var(&mut self, var: Variable) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(var);
        self.sol.push(0.0);
        id
    }

    /// Returns the variable with the given id.
    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0]
    }

    /// Returns the number of variables known to the model.
    pub fn n_vars(&self) -> usize {
        self.vars.len()
    }

    /// Adds an original variable.
    pub fn add_original_var(
        &mut self,
        name: &str,
        obj: f64,
        lb: f64,
        ub: f64,
        vartype: VarType,
        block: i32,
    ) -> VarId {
        self.push_var(Variable {
            name: name.into(),
            obj,
            lb,
            ub,
            vartype,
            kind: VarKind::Original {
                block,
                linking: false,
                pricingvar: None,
                mastervar: None,
            },
        })
    }

    /// Marks an original variable as linking.
    pub fn set_var_linking(&mut self, var: VarId) {
        if let VarKind::Original { linking, .. } = &mut self.vars[var.0].kind {
            *linking = true;
        }
    }

    /// Adds the pricing copy of an original variable in its block.
    pub fn add_pricing_var(&mut self, origvar: VarId, block: usize) -> VarId {
        let (name, lb, ub, vartype) = {
            let ov = &self.vars[origvar.0];
            (format!("pr{}_{}", block, ov.name), ov.lb, ov.ub, ov.vartype)
        };
        let id = self.push_var(Variable {
            name,
            obj: 0.0,
            lb,
            ub,
            vartype,
            kind: VarKind::Pricing { origvar, block },
        });
        if let VarKind::Original { pricingvar, .. } = &mut self.vars[origvar.0].kind {
            *pricingvar = Some(id);
        }
        self.pricingprobs[block].vars.push(id);
        id
    }

    /// Creates an inferred pricing variable without registering it in the
    /// pricing problem; registration happens when the inferring extended
    /// master constraint is applied.
    pub fn create_inferred_pricing_var(
        &mut self,
        name: &str,
        lb: f64,
        ub: f64,
        coefvar: bool,
        vartype: VarType,
        block: usize,
    ) -> VarId {
        self.push_var(Variable {
            name: name.into(),
            obj: 0.0,
            lb,
            ub,
            vartype,
            kind: VarKind::InferredPricing {
                block,
                mastercons: None,
                coefvar,
            },
        })
    }

    /// Adds a static master variable (a direct copy of an original variable).
    pub fn add_static_master_var(
        &mut self,
        origvar: VarId,
        linking: bool,
    ) -> VarId {
        let (name, obj, lb, ub, vartype) = {
            let ov = &self.vars[origvar.0];
            (format!("m_{}", ov.name), ov.obj, ov.lb, ov.ub, ov.vartype)
        };
        let id = self.push_var(Variable {
            name,
            obj,
            lb,
            ub,
            vartype,
            kind: VarKind::Master {
                block: -1,
                linking,
                origvals: vec![(origvar, 1.0)],
            },
        });
        if let VarKind::Original { mastervar, .. } = &mut self.vars[origvar.0].kind {
            *mastervar = Some(id);
        }
        id
    }

    /// Returns the master copy of an original variable kept in the master.
    pub fn master_copy_of(&self, origvar: VarId) -> Option<VarId> {
        match &self.vars[origvar.0].kind {
            VarKind::Original { mastervar, .. } => *mastervar,
            _ => None,
        }
    }

    /// Adds a master variable with explicit generator values. Prefer
    /// [`add_master_var_from_col`](Model::add_master_var_from_col) for
    /// columns produced by pricing.
    pub fn add_master_var_raw(
        &mut self,
        name: &str,
        obj: f64,
        block: i32,
        origvals: Vec<(VarId, f64)>,
    ) -> VarId {
        self.push_var(Variable {
            name: name.into(),
            obj,
            lb: 0.0,
            ub: self.infinity,
            vartype: VarType::Continuous,
            kind: VarKind::Master {
                block,
                linking: false,
                origvals,
            },
        })
    }

    /// Creates a master variable from a column.
    ///
    /// The objective is taken from the original objectives of the column's
    /// pricing variables, the generator values from the column itself, and
    /// the cached master and cut coefficients are installed into the master
    /// constraints and rows. Extended-master-constraint coefficients are not
    /// installed here; the new-column event fan-out of the branch rules does
    /// that.
    pub fn add_master_var_from_col(&mut self, col: &crate::col::Column) -> VarId {
        let mut obj = 0.0;
        let mut origvals = Vec::with_capacity(col.vars().len());
        for (i, &pricingvar) in col.vars().iter().enumerate() {
            let val = col.vals()[i];
            if let Some(origvar) = self.orig_var_of(pricingvar) {
                let ov = &self.vars[origvar.0];
                let linking = matches!(ov.kind, VarKind::Original { linking: true, .. });
                if !linking {
                    obj += ov.obj * val;
                }
                origvals.push((origvar, val));
            }
        }

        let block = col.block() as i32;
        let var = self.push_var(Variable {
            name: format!("p_{}_{}", col.block(), self.vars.len()),
            obj,
            lb: 0.0,
            ub: self.infinity,
            vartype: VarType::Continuous,
            kind: VarKind::Master {
                block,
                linking: false,
                origvals,
            },
        });

        for (i, &coef) in col.master_coefs().iter().enumerate() {
            if coef != 0.0 {
                let cid = self.masterconss[i];
                self.conss[cid.0].add_coef(var, coef);
            }
        }
        for (i, &coef) in col.original_cut_coefs().iter().enumerate() {
            if coef != 0.0 {
                let row = self.originalcut_master[i];
                self.rows[row.0].add_coef(var, coef);
            }
        }
        for (i, &coef) in col.separator_cut_coefs().iter().enumerate() {
            if coef != 0.0 {
                if let Some(&row) = self.separatorcuts.get(i) {
                    self.rows[row.0].add_coef(var, coef);
                }
            }
        }

        var
    }

    /// Returns the pricing copy of an original variable.
    pub fn pricing_var_of(&self, origvar: VarId) -> Option<VarId> {
        match &self.vars[origvar.0].kind {
            VarKind::Original { pricingvar, .. } => *pricingvar,
            _ => None,
        }
    }

    /// Returns the original variable of a pricing variable.
    pub fn orig_var_of(&self, pricingvar: VarId) -> Option<VarId> {
        match &self.vars[pricingvar.0].kind {
            VarKind::Pricing { origvar, .. } => Some(*origvar),
            _ => None,
        }
    }

    /// Returns whether a master variable belongs to the given block,
    /// considering identical-block aggregation.
    pub fn is_master_var_in_block(&self, mastervar: VarId, block: usize) -> bool {
        match &self.vars[mastervar.0].kind {
            VarKind::Master { block: b, .. } if *b >= 0 => {
                self.blocks[*b as usize].representative == self.blocks[block].representative
            }
            _ => false,
        }
    }

    /// Returns the value of an original variable in the column generating the
    /// given master variable, or 0 if absent.
    pub fn generator_entry(&self, mastervar: VarId, origvar: VarId) -> f64 {
        match &self.vars[mastervar.0].kind {
            VarKind::Master { origvals, .. } => origvals
                .iter()
                .find(|(v, _)| *v == origvar)
                .map(|(_, val)| *val)
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Returns all master variables.
    pub fn master_vars(&self) -> Vec<VarId> {
        (0..self.vars.len())
            .map(VarId)
            .filter(|v| self.vars[v.0].is_master())
            .collect()
    }

    /// Changes the global bounds of a variable.
    pub fn chg_var_bounds_global(&mut self, var: VarId, lb: f64, ub: f64) {
        self.vars[var.0].lb = lb;
        self.vars[var.0].ub = ub;
    }

    /// Changes the objective coefficient of a variable.
    pub fn chg_var_obj(&mut self, var: VarId, obj: f64) {
        self.vars[var.0].obj = obj;
    }

    /// Installs the back-reference from an inferred pricing variable to the
    /// extended master constraint that inferred it.
    pub(crate) fn set_inferred_var_mastercons(
        &mut self,
        var: VarId,
        mastercons: crate::mastercons::MasterConsId,
    ) {
        if let VarKind::InferredPricing { mastercons: mc, .. } = &mut self.vars[var.0].kind {
            *mc = Some(mastercons);
        }
    }

    /* pricing problem mutation */

    /// Registers a variable in a block's pricing problem.
    pub fn register_pricing_var(&mut self, block: usize, var: VarId) {
        self.pricingprobs[block].vars.push(var);
    }

    /// Removes a variable from a block's pricing problem.
    pub fn deregister_pricing_var(&mut self, block: usize, var: VarId) -> Result<()> {
        let prob = &mut self.pricingprobs[block];
        match prob.vars.iter().position(|v| *v == var) {
            Some(pos) => {
                prob.vars.remove(pos);
                Ok(())
            }
            None => Err(Retcode::invalid_data(format!(
                "variable <{}> is not registered in pricing problem {}",
                self.vars[var.0].name, block
            ))),
        }
    }

    /// Creates a pricing constraint without adding it to any problem.
    pub fn create_pricing_cons(
        &mut self,
        name: &str,
        coefs: Vec<(VarId, f64)>,
        lhs: f64,
        rhs: f64,
    ) -> PricingCons {
        let id = self.next_pricing_cons_id;
        self.next_pricing_cons_id += 1;
        PricingCons {
            id,
            name: name.into(),
            coefs,
            lhs,
            rhs,
        }
    }

    /// Adds a pricing constraint to a block's pricing problem.
    pub fn add_pricing_cons(&mut self, block: usize, cons: PricingCons) {
        self.pricingprobs[block].conss.push(cons);
    }

    /// Removes a pricing constraint from a block's pricing problem.
    pub fn del_pricing_cons(&mut self, block: usize, id: usize) -> Result<()> {
        let prob = &mut self.pricingprobs[block];
        match prob.conss.iter().position(|c| c.id == id) {
            Some(pos) => {
                prob.conss.remove(pos);
                Ok(())
            }
            None => Err(Retcode::invalid_data(format!(
                "pricing constraint {} is not part of pricing problem {}",
                id, block
            ))),
        }
    }

    /* master constraints, cuts, linking, convexity */

    fn push_cons(&mut self, cons: Constraint) -> ConsId {
        let id = ConsId(self.conss.len());
        self.conss.push(cons);
        id
    }

    /// Adds a master constraint together with its original-problem twin and
    /// returns its id. Both constraints describe the same restriction, the
    /// first over master variables, the second over original variables.
    pub fn add_master_cons(&mut self, cons: Constraint, orig: Constraint) -> ConsId {
        let id = self.push_cons(cons);
        self.masterconss.push(id);
        self.origmasterconss.push(orig);
        id
    }

    /// Adds a constraint created by a branching rule. Branching constraints
    /// do not belong to the structural master constraints.
    pub fn add_branch_cons(&mut self, cons: Constraint) -> ConsId {
        self.push_cons(cons)
    }

    /// Returns a constraint by its id.
    pub fn cons(&self, id: ConsId) -> &Constraint {
        &self.conss[id.0]
    }

    /// Returns a mutable constraint by its id.
    pub fn cons_mut(&mut self, id: ConsId) -> &mut Constraint {
        &mut self.conss[id.0]
    }

    /// Returns the number of structural master constraints.
    pub fn n_master_conss(&self) -> usize {
        self.masterconss.len()
    }

    /// Returns the id of the `i`-th structural master constraint.
    pub fn master_cons_id(&self, i: usize) -> ConsId {
        self.masterconss[i]
    }

    /// Returns the `i`-th structural master constraint.
    pub fn master_cons_at(&self, i: usize) -> &Constraint {
        &self.conss[self.masterconss[i].0]
    }

    /// Returns the original-problem twin of the `i`-th master constraint.
    pub fn orig_master_cons(&self, i: usize) -> &Constraint {
        &self.origmasterconss[i]
    }

    /// Marks a constraint as active or inactive at the current node.
    pub fn set_cons_active(&mut self, id: ConsId, active: bool) {
        self.conss[id.0].active = active;
    }

    /// Adds a freestanding LP row and returns its id.
    pub fn add_row(&mut self, row: Row) -> RowId {
        let id = RowId(self.rows.len());
        self.rows.push(row);
        id
    }

    /// Returns a row.
    pub fn row(&self, id: RowId) -> &Row {
        &self.rows[id.0]
    }

    /// Returns a mutable row.
    pub fn row_mut(&mut self, id: RowId) -> &mut Row {
        &mut self.rows[id.0]
    }

    /// Adds a lifted original cut: the master-side row and the row over the
    /// original variables it was lifted from.
    pub fn add_original_cut(&mut self, masterrow: Row, origrow: Row) -> usize {
        let m = self.add_row(masterrow);
        let o = self.add_row(origrow);
        self.originalcut_master.push(m);
        self.originalcut_orig.push(o);
        self.originalcut_master.len() - 1
    }

    /// Returns the number of lifted original cuts.
    pub fn n_original_cuts(&self) -> usize {
        self.originalcut_master.len()
    }

    /// Returns the master-side row of a lifted original cut.
    pub fn original_cut_master_row(&self, i: usize) -> &Row {
        &self.rows[self.originalcut_master[i].0]
    }

    /// Returns the original-side row of a lifted original cut.
    pub fn original_cut_orig_row(&self, i: usize) -> &Row {
        &self.rows[self.originalcut_orig[i].0]
    }

    /// Registers a row as an active separator master cut.
    pub fn add_separator_cut(&mut self, row: Row) -> RowId {
        let id = self.add_row(row);
        self.separatorcuts.push(id);
        id
    }

    /// Returns the active separator master-cut rows.
    pub fn separator_cuts(&self) -> &[RowId] {
        &self.separatorcuts
    }

    /// Adds a linking constraint between the master copy and one block's
    /// pricing copy of a linking variable.
    pub fn add_linking_cons(
        &mut self,
        name: &str,
        mastervar: VarId,
        pricingvar: VarId,
        block: usize,
    ) -> usize {
        self.linkingconss.push(LinkingCons {
            name: name.into(),
            mastervar,
            pricingvar,
            block,
            dual: 0.0,
            farkas: 0.0,
        });
        self.linkingconss.len() - 1
    }

    /// Returns the number of linking constraints.
    pub fn n_linking_conss(&self) -> usize {
        self.linkingconss.len()
    }

    /// Returns a linking constraint.
    pub fn linking_cons(&self, i: usize) -> &LinkingCons {
        &self.linkingconss[i]
    }

    /* LP values */

    /// Sets the LP solution value of a variable.
    pub fn set_sol_val(&mut self, var: VarId, val: f64) {
        self.sol[var.0] = val;
    }

    /// Returns the LP solution value of a variable.
    pub fn sol_val(&self, var: VarId) -> f64 {
        self.sol[var.0]
    }

    /// Sets the dual value of a master constraint.
    pub fn set_cons_dual(&mut self, id: ConsId, dual: f64) {
        self.conss[id.0].dual = dual;
    }

    /// Sets the Farkas multiplier of a master constraint.
    pub fn set_cons_farkas(&mut self, id: ConsId, farkas: f64) {
        self.conss[id.0].farkas = farkas;
    }

    /// Sets the dual value of a row.
    pub fn set_row_dual(&mut self, id: RowId, dual: f64) {
        self.rows[id.0].dual = dual;
    }

    /// Sets the Farkas multiplier of a row.
    pub fn set_row_farkas(&mut self, id: RowId, farkas: f64) {
        self.rows[id.0].farkas = farkas;
    }

    /// Sets the dual value of a linking constraint.
    pub fn set_linking_dual(&mut self, i: usize, dual: f64) {
        self.linkingconss[i].dual = dual;
    }

    /// Sets the dual value of a block's convexity constraint.
    pub fn set_conv_dual(&mut self, block: usize, dual: f64) {
        self.convduals[block] = dual;
    }

    /// Returns the dual value of a block's convexity constraint.
    pub fn conv_dual(&self, block: usize) -> f64 {
        self.convduals[block]
    }

    /// Sets the Farkas multiplier of a block's convexity constraint.
    pub fn set_conv_farkas(&mut self, block: usize, farkas: f64) {
        self.convfarkas[block] = farkas;
    }

    /// Returns the Farkas multiplier of a block's convexity constraint.
    pub fn conv_farkas(&self, block: usize) -> f64 {
        self.convfarkas[block]
    }

    /// Returns the fractional master variables of the current LP solution.
    pub fn lp_branch_cands(&self) -> Vec<VarId> {
        (0..self.vars.len())
            .map(VarId)
            .filter(|v| {
                self.vars[v.0].is_master() && !self.is_feas_integral(self.sol[v.0])
            })
            .collect()
    }

    /* node bookkeeping */

    /// Returns the number of the current branch-and-bound node.
    pub fn current_node(&self) -> i64 {
        self.node
    }

    /// Focuses a branch-and-bound node.
    pub fn focus_node(&mut self, node: i64) {
        self.node = node;
    }

    /// Returns whether the current node is the root node.
    pub fn is_root_node(&self) -> bool {
        self.node <= 1
    }

    /* numerics */

    /// Returns the epsilon used for equality of LP values.
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Returns the value treated as infinity.
    pub fn infinity(&self) -> f64 {
        self.infinity
    }

    /// Returns whether a value is infinite in the host's sense.
    pub fn is_infinity(&self, val: f64) -> bool {
        val >= self.infinity
    }

    /// Returns whether a value is zero within epsilon.
    pub fn is_zero(&self, val: f64) -> bool {
        val.abs() < self.eps
    }

    /// Returns whether two values are equal within epsilon.
    pub fn is_eq(&self, a: f64, b: f64) -> bool {
        (a - b).abs() < self.eps
    }

    /// Returns whether `a < b` with epsilon slack.
    pub fn is_lt(&self, a: f64, b: f64) -> bool {
        a < b - self.eps
    }

    /// Returns whether `a <= b` with epsilon slack.
    pub fn is_le(&self, a: f64, b: f64) -> bool {
        a <= b + self.eps
    }

    /// Returns whether `a > b` with epsilon slack.
    pub fn is_gt(&self, a: f64, b: f64) -> bool {
        a > b + self.eps
    }

    /// Returns whether `a >= b` with epsilon slack.
    pub fn is_ge(&self, a: f64, b: f64) -> bool {
        a >= b - self.eps
    }

    /// Returns whether a value is positive beyond epsilon.
    pub fn is_positive(&self, val: f64) -> bool {
        val > self.eps
    }

    /// Returns whether a value is negative beyond epsilon.
    pub fn is_negative(&self, val: f64) -> bool {
        val < -self.eps
    }

    /// Returns whether a value is positive beyond the feasibility tolerance.
    pub fn is_feas_positive(&self, val: f64) -> bool {
        val > self.feastol
    }

    /// Returns whether a value is negative beyond the feasibility tolerance.
    pub fn is_feas_negative(&self, val: f64) -> bool {
        val < -self.feastol
    }

    /// Returns whether a value is zero within the feasibility tolerance.
    pub fn is_feas_zero(&self, val: f64) -> bool {
        val.abs() <= self.feastol
    }

    /// Returns whether a value is integral within the feasibility tolerance.
    pub fn is_feas_integral(&self, val: f64) -> bool {
        (val - val.round()).abs() <= self.feastol
    }

    /// Returns whether a reduced cost is negative beyond the dual
    /// feasibility tolerance.
    pub fn is_dualfeas_negative(&self, val: f64) -> bool {
        val < -self.dualfeastol
    }

    /// Rounds a value to the nearest integer.
    pub fn round(&self, val: f64) -> f64 {
        val.round()
    }

    /// Returns `floor(val)` with feasibility tolerance.
    pub fn floor(&self, val: f64) -> f64 {
        (val + self.feastol).floor()
    }

    /// Returns `ceil(val)` with feasibility tolerance.
    pub fn ceil(&self, val: f64) -> f64 {
        (val - self.feastol).ceil()
    }

    /// Returns the fractional part of a value with feasibility tolerance.
    pub fn frac(&self, val: f64) -> f64 {
        val - self.floor(val)
    }

    /// Calculates the size an array should grow to in order to store at
    /// least `num` entries, mirroring the host's 1.2-factor growth policy.
    pub fn calc_grow_size(&self, num: usize) -> Result<usize> {
        if num > self.mem_limit {
            return Err(Retcode::CapacityReached {
                requested: num,
                limit: self.mem_limit,
            });
        }
        let mut size = 4usize;
        while size < num {
            size = size + size / 5 + 1;
        }
        Ok(size.min(self.mem_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grow_size_is_monotone() {
        let model = Model::new();
        let mut last = 0;
        for num in [1, 4, 5, 17, 100, 12345] {
            let size = model.calc_grow_size(num).unwrap();
            assert!(size >= num);
            assert!(size >= last);
            last = size;
        }
    }

    #[test]
    fn grow_size_past_limit_fails() {
        let model = Model::new();
        assert!(matches!(
            model.calc_grow_size(usize::MAX),
            Err(Retcode::CapacityReached { .. })
        ));
    }

    #[test]
    fn numerics() {
        let model = Model::new();
        assert!(model.is_eq(1.0, 1.0 + 1e-10));
        assert!(!model.is_eq(1.0, 1.0 + 1e-8));
        assert!(model.is_feas_integral(2.9999999));
        assert!(!model.is_feas_integral(2.5));
        assert_eq!(model.floor(2.9999999), 3.0);
        assert_eq!(model.ceil(2.0000001), 2.0);
        assert!(model.is_dualfeas_negative(-1e-6));
        assert!(!model.is_dualfeas_negative(-1e-8));
    }

    #[test]
    fn pricing_var_links_back_to_orig() {
        let mut model = Model::new();
        let block = model.add_block(2);
        let x = model.add_original_var("x", 3.0, 0.0, 5.0, VarType::Integer, block as i32);
        let px = model.add_pricing_var(x, block);
        assert_eq!(model.pricing_var_of(x), Some(px));
        assert_eq!(model.orig_var_of(px), Some(x));
        assert_eq!(model.pricing_prob(block).vars(), &[px]);
        assert_eq!(model.n_identical_blocks(block), 2);
    }

    #[test]
    fn identical_blocks_share_a_representative() {
        let mut model = Model::new();
        let rep = model.add_block(3);
        let twin = model.add_identical_block(rep);
        assert!(model.is_block_relevant(rep));
        assert!(!model.is_block_relevant(twin));
        assert_eq!(model.block_representative(twin), rep);
    }

    #[test]
    fn deregister_of_unknown_var_is_invalid_data() {
        let mut model = Model::new();
        let block = model.add_block(1);
        let g = model.create_inferred_pricing_var("g", 0.0, 1.0, true, VarType::Binary, block);
        assert!(model.deregister_pricing_var(block, g).is_err());
        model.register_pricing_var(block, g);
        assert!(model.deregister_pricing_var(block, g).is_ok());
    }
}
