//! Vanderbeck's generic branching scheme.
//!
//! At a node with a fractional master solution, the rule recursively
//! separates a component bound sequence whose fractional weight allows a
//! partition of the block's columns, and creates one child per prefix of the
//! sequence plus one for the full sequence. Each child carries an extended
//! master constraint whose pricing modification forces the coefficient
//! variable to one exactly when the pricing solution lies in the sequence's
//! polytope.

use tracing::debug;

use crate::branchrule::{generator_entry_sol, init_index_set, BranchRule, BranchingResult};
use crate::constraint::Constraint;
use crate::mastercons::{
    MasterConsId, MasterConsPayload, MasterConsSide, MasterConsStore, PricingModification,
};
use crate::model::Model;
use crate::retcode::Result;
use crate::variable::{VarId, VarKind, VarType};

/// Sense of a component bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompSense {
    /// The component is bounded from below: `v >= bound`.
    Ge,
    /// The component is strictly bounded from above: `v < bound`.
    Lt,
}

impl CompSense {
    /// Returns the opposite sense.
    pub fn flipped(self) -> CompSense {
        match self {
            CompSense::Ge => CompSense::Lt,
            CompSense::Lt => CompSense::Ge,
        }
    }
}

/// A single component bound `(variable, sense, bound)` restricting an
/// original integral variable inside one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentBound {
    /// The restricted original variable (or master variable for direct
    /// branching).
    pub component: VarId,
    /// Sense of the restriction.
    pub sense: CompSense,
    /// Bound value.
    pub bound: f64,
}

/// Data a generic-branching extended master constraint carries: the inducing
/// component bound sequence, its block and the master-side left-hand side.
#[derive(Debug, Clone)]
pub struct GenericBranchPayload {
    /// Block of the sequence, `-3` for direct master variable branching.
    pub block: i32,
    /// The component bound sequence.
    pub seq: Vec<ComponentBound>,
    /// Left-hand side of the master constraint.
    pub lhs: f64,
}

/// Returns whether a raw column solution satisfies every bound of the
/// sequence.
fn sol_in_seq(
    model: &Model,
    seq: &[ComponentBound],
    solvars: &[VarId],
    solvals: &[f64],
) -> bool {
    for b in seq {
        let entry = generator_entry_sol(model, solvars, solvals, b.component);
        match b.sense {
            CompSense::Ge => {
                if model.is_lt(entry, b.bound) {
                    return false;
                }
            }
            CompSense::Lt => {
                if model.is_ge(entry, b.bound) {
                    return false;
                }
            }
        }
    }
    true
}

/// Returns whether a master variable's generator satisfies every bound of
/// the sequence.
fn mastervar_in_seq(model: &Model, seq: &[ComponentBound], mastervar: VarId) -> bool {
    for b in seq {
        let entry = model.generator_entry(mastervar, b.component);
        match b.sense {
            CompSense::Ge => {
                if model.is_lt(entry, b.bound) {
                    return false;
                }
            }
            CompSense::Lt => {
                if model.is_ge(entry, b.bound) {
                    return false;
                }
            }
        }
    }
    true
}

/// Coefficient of a raw column solution in a generic-branching extended
/// master constraint: one if the solution lies in the sequence's polytope.
pub(crate) fn mastercons_coef(
    model: &Model,
    data: &GenericBranchPayload,
    solvars: &[VarId],
    solvals: &[f64],
    probnr: usize,
) -> f64 {
    if data.block < 0 || probnr as i32 != data.block {
        return 0.0;
    }
    if sol_in_seq(model, &data.seq, solvars, solvals) {
        1.0
    } else {
        0.0
    }
}

/// Coefficient of an existing master variable in a generic branching
/// constraint.
fn mastervar_coef(model: &Model, data: &GenericBranchData, mastervar: VarId) -> f64 {
    let varblock = model.var(mastervar).block();
    if data.block == -3 || varblock < 0 || varblock != data.block {
        return 0.0;
    }
    if mastervar_in_seq(model, &data.seq, mastervar) {
        1.0
    } else {
        0.0
    }
}

/// Branching data stored at one child node.
#[derive(Debug, Clone)]
pub struct GenericBranchData {
    /// Block the branching restriction belongs to, `-3` for direct master
    /// variable branching.
    pub(crate) block: i32,
    /// The component bound sequence inducing the constraint.
    pub(crate) seq: Vec<ComponentBound>,
    /// Left-hand side of the master constraint.
    pub(crate) lhs: f64,
    /// The extended master constraint enforcing the restriction.
    pub(crate) mastercons: Option<MasterConsId>,
}

impl GenericBranchData {
    /// Returns the component bound sequence.
    pub fn seq(&self) -> &[ComponentBound] {
        &self.seq
    }

    /// Returns the block of the restriction.
    pub fn block(&self) -> i32 {
        self.block
    }

    /// Returns the left-hand side of the master constraint.
    pub fn lhs(&self) -> f64 {
        self.lhs
    }

    /// Returns the extended master constraint.
    pub fn mastercons(&self) -> Option<MasterConsId> {
        self.mastercons
    }
}

struct GenericNode {
    parent: Option<usize>,
    children: Vec<usize>,
    data: GenericBranchData,
}

/// Vanderbeck's generic branching rule.
#[derive(Default)]
pub struct GenericBranching {
    nodes: Vec<GenericNode>,
    roots: Vec<usize>,
    cur: Option<usize>,
}

impl GenericBranching {
    /// Creates the branching rule with an empty tree.
    pub fn new() -> Self {
        GenericBranching {
            nodes: Vec::new(),
            roots: Vec::new(),
            cur: None,
        }
    }

    /// Returns the number of branch records created so far.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the branching data of a node.
    pub fn node_data(&self, node: usize) -> &GenericBranchData {
        &self.nodes[node].data
    }

    /// Returns the children of the active node, or the root children.
    pub fn children(&self) -> &[usize] {
        match self.cur {
            Some(n) => &self.nodes[n].children,
            None => &self.roots,
        }
    }

    /// Activates a child node: its master constraint joins the LP and the
    /// pricing modifications are applied.
    pub fn activate_node(
        &mut self,
        model: &mut Model,
        store: &MasterConsStore,
        node: usize,
    ) -> Result<()> {
        if let Some(mc) = self.nodes[node].data.mastercons {
            if let MasterConsSide::Cons(cons) = store.mastercons(mc).side() {
                model.set_cons_active(cons, true);
            }
            store.apply(model, mc)?;
        }
        self.cur = Some(node);
        Ok(())
    }

    /// Deactivates the active node, undoing its pricing modifications, and
    /// moves back to its parent.
    pub fn deactivate_node(&mut self, model: &mut Model, store: &MasterConsStore) -> Result<()> {
        if let Some(node) = self.cur {
            if let Some(mc) = self.nodes[node].data.mastercons {
                store.undo(model, mc)?;
                if let MasterConsSide::Cons(cons) = store.mastercons(mc).side() {
                    model.set_cons_active(cons, false);
                }
            }
            self.cur = self.nodes[node].parent;
        }
        Ok(())
    }

    /* separation */

    /// Median of the component values; if the median equals the minimum the
    /// rounded-up mean is used instead.
    fn get_median(model: &Model, values: &mut [f64], min: f64) -> f64 {
        debug_assert!(!values.is_empty());
        values.sort_by(|a, b| a.total_cmp(b));
        let idx = if values.len() % 2 == 1 {
            values.len() / 2
        } else {
            values.len() / 2 - 1
        };
        let mut median = values[idx];

        if model.is_eq(median, min) {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            median = model.ceil(mean);
        }
        median
    }

    fn compute_alpha(
        model: &Model,
        f: &[VarId],
        sense: CompSense,
        value: f64,
        origvar: VarId,
    ) -> f64 {
        let mut alpha = 0.0;
        for &mv in f {
            let entry = model.generator_entry(mv, origvar);
            let satisfied = match sense {
                CompSense::Ge => model.is_ge(entry, value),
                CompSense::Lt => model.is_lt(entry, value),
            };
            if satisfied {
                alpha += model.sol_val(mv);
            }
        }
        alpha
    }

    /// Chooses the discriminating component with maximal value range and its
    /// median; components whose median hits their minimum are discarded.
    fn partition(
        model: &Model,
        j: &mut Vec<VarId>,
        priority: &mut Vec<i64>,
        f: &[VarId],
    ) -> Option<(VarId, f64)> {
        loop {
            if j.is_empty() {
                return None;
            }
            let mut best = 0;
            for pos in 1..j.len() {
                if priority[pos] > priority[best] {
                    best = pos;
                }
            }
            let origvar = j[best];

            let mut min = f64::INFINITY;
            let mut compvalues: Vec<f64> = f
                .iter()
                .map(|&mv| {
                    let v = model.generator_entry(mv, origvar);
                    if v < min {
                        min = v;
                    }
                    v
                })
                .collect();
            let median = Self::get_median(model, &mut compvalues, min);

            if model.is_eq(median, min) {
                j.swap_remove(best);
                priority.swap_remove(best);
                continue;
            }
            return Some((origvar, median));
        }
    }

    /// Root-like separation: finds component bound sequences with fractional
    /// weight and records them.
    fn separate(
        &self,
        model: &Model,
        f: &[VarId],
        indexset: &[VarId],
        s: &[ComponentBound],
        record: &mut Vec<Vec<ComponentBound>>,
    ) {
        if f.is_empty() || indexset.is_empty() {
            debug!("nothing to separate, no fractional columns");
            return;
        }

        let muf: f64 = f.iter().map(|&mv| model.sol_val(mv)).sum();
        debug!(
            fsize = f.len(),
            ssize = s.len(),
            indexsetsize = indexset.len(),
            muf,
            "separate"
        );

        let mut alpha = vec![0.0; indexset.len()];
        let mut found = false;

        for (k, &origvar) in indexset.iter().enumerate() {
            if !model.var(origvar).var_type().is_integral() {
                continue;
            }

            let mut min = f64::INFINITY;
            let mut compvalues: Vec<f64> = f
                .iter()
                .map(|&mv| {
                    let v = model.generator_entry(mv, origvar);
                    if v < min {
                        min = v;
                    }
                    v
                })
                .collect();
            let median = Self::get_median(model, &mut compvalues, min);

            alpha[k] = Self::compute_alpha(model, f, CompSense::Ge, median, origvar);

            if !model.is_feas_integral(alpha[k]) {
                debug!(k, alpha = alpha[k], "found fractional alpha");
                found = true;
                let mut copys = s.to_vec();
                copys.push(ComponentBound {
                    component: origvar,
                    sense: CompSense::Ge,
                    bound: median,
                });
                record.push(copys);
            }
        }

        if found {
            return;
        }

        // discriminating components: those whose alpha separates F
        let mut j: Vec<VarId> = Vec::new();
        for (k, &origvar) in indexset.iter().enumerate() {
            if model.is_gt(alpha[k], 0.0) && model.is_lt(alpha[k], muf) {
                j.push(origvar);
            }
        }
        if j.is_empty() {
            return;
        }

        // max-min priority
        let mut priority: Vec<i64> = j
            .iter()
            .map(|&origvar| {
                let mut maxcomp = i64::MIN;
                let mut mincomp = i64::MAX;
                for &mv in f {
                    let entry = model.generator_entry(mv, origvar).round() as i64;
                    maxcomp = maxcomp.max(entry);
                    mincomp = mincomp.min(entry);
                }
                maxcomp - mincomp
            })
            .collect();

        let (origvar, median) = match Self::partition(model, &mut j, &mut priority, f) {
            Some(pair) => pair,
            None => return,
        };

        let mut upper: Vec<VarId> = Vec::new();
        let mut lower: Vec<VarId> = Vec::new();
        for &mv in f {
            if model.is_ge(model.generator_entry(mv, origvar), median) {
                upper.push(mv);
            } else {
                lower.push(mv);
            }
        }

        if !lower.is_empty() {
            let mut lowers = s.to_vec();
            lowers.push(ComponentBound {
                component: origvar,
                sense: CompSense::Lt,
                bound: median,
            });
            self.separate(model, &lower, &j, &lowers, record);
        }
        if !upper.is_empty() {
            let mut uppers = s.to_vec();
            uppers.push(ComponentBound {
                component: origvar,
                sense: CompSense::Ge,
                bound: median,
            });
            self.separate(model, &upper, &j, &uppers, record);
        }
    }

    /// Non-root separation: consults the ancestor sequences `c` at depth `p`
    /// before falling back to [`separate`](GenericBranching::separate).
    #[allow(clippy::too_many_arguments)]
    fn explore(
        &self,
        model: &Model,
        c: &[Vec<ComponentBound>],
        p: usize,
        f: &[VarId],
        indexset: &[VarId],
        s: &[ComponentBound],
        record: &mut Vec<Vec<ComponentBound>>,
    ) {
        if c.is_empty() || f.is_empty() || indexset.is_empty() {
            self.separate(model, f, indexset, s, record);
            return;
        }

        // find the bound shared by every sequence of length >= p
        let k = match c.iter().position(|seq| seq.len() >= p) {
            Some(k) => k,
            None => {
                debug!(p, "no sequence bounded at this depth");
                self.separate(model, f, indexset, s, record);
                return;
            }
        };
        let bound = c[k][p - 1];
        debug!(p, ?bound, "explore");

        let alpha = Self::compute_alpha(model, f, bound.sense, bound.bound, bound.component);
        let muf: f64 = f.iter().map(|&mv| model.sol_val(mv)).sum();

        if !model.is_feas_integral(alpha) {
            debug!(alpha, "fractional alpha in explore");
            let mut copys = s.to_vec();
            copys.push(bound);
            record.push(copys);
            return;
        }

        let mut uppers = s.to_vec();
        uppers.push(ComponentBound {
            sense: CompSense::Ge,
            ..bound
        });
        let mut lowers = s.to_vec();
        lowers.push(ComponentBound {
            sense: CompSense::Lt,
            ..bound
        });

        let mut fupper: Vec<VarId> = Vec::new();
        let mut flower: Vec<VarId> = Vec::new();
        for &mv in f {
            if model.is_ge(model.generator_entry(mv, bound.component), bound.bound) {
                fupper.push(mv);
            } else {
                flower.push(mv);
            }
        }

        let cupper: Vec<Vec<ComponentBound>> = c
            .iter()
            .filter(|seq| seq.len() >= p && seq[p - 1].sense == CompSense::Ge)
            .cloned()
            .collect();
        let clower: Vec<Vec<ComponentBound>> = c
            .iter()
            .filter(|seq| seq.len() >= p && seq[p - 1].sense == CompSense::Lt)
            .cloned()
            .collect();

        // an empty side with all the weight on the other is not explored
        let skiplower = model.is_le(alpha, 0.0) && !fupper.is_empty();
        let skipupper = model.is_eq(alpha, muf) && !flower.is_empty();

        if !fupper.is_empty() && !skipupper {
            self.explore(model, &cupper, p + 1, &fupper, indexset, &uppers, record);
        }
        if !flower.is_empty() && !skiplower {
            self.explore(model, &clower, p + 1, &flower, indexset, &lowers, record);
        }
    }

    /// Chooses the recorded sequence to branch on: all candidates share
    /// priority one, ties break towards the shortest sequence.
    fn choose_s(record: &mut Vec<Vec<ComponentBound>>) -> Vec<ComponentBound> {
        debug_assert!(!record.is_empty());
        let mut best = 0;
        for i in 1..record.len() {
            if record[i].len() < record[best].len() {
                best = i;
            }
        }
        record.swap_remove(best)
    }

    /* child creation */

    /// Builds the pricing modification forcing the coefficient variable to
    /// one exactly when the pricing assignment lies in the sequence's
    /// polytope.
    fn build_pricing_modification(
        model: &mut Model,
        store: &MasterConsStore,
        block: usize,
        seq: &[ComponentBound],
        name: &str,
    ) -> Result<PricingModification> {
        let coefvar = model.create_inferred_pricing_var(
            &format!("g({})", name),
            0.0,
            1.0,
            true,
            VarType::Binary,
            block,
        );

        let mut additionalvars = Vec::with_capacity(seq.len());
        for j in 0..seq.len() {
            let y = model.create_inferred_pricing_var(
                &format!("y({},{})", name, j),
                0.0,
                1.0,
                false,
                VarType::Binary,
                block,
            );
            additionalvars.push(y);
        }

        let mut additionalconss = Vec::new();

        // g >= 1 + sum y_j - m
        let mut coefs = vec![(coefvar, 1.0)];
        for &y in &additionalvars {
            coefs.push((y, -1.0));
        }
        additionalconss.push(model.create_pricing_cons(
            &format!("c(g({}))", name),
            coefs,
            1.0 - seq.len() as f64,
            f64::INFINITY,
        ));

        // g <= y_j
        for (j, &y) in additionalvars.iter().enumerate() {
            additionalconss.push(model.create_pricing_cons(
                &format!("c(g({}),{})", name, j),
                vec![(y, 1.0), (coefvar, -1.0)],
                0.0,
                f64::INFINITY,
            ));
        }

        // y_j = 1 exactly when bound j holds; fractional bounds act on
        // integral variables through their rounded-up value
        for (j, b) in seq.iter().enumerate() {
            let pricingvar = model
                .pricing_var_of(b.component)
                .ok_or_else(|| crate::retcode::Retcode::invalid_data("component without pricing copy"))?;
            let lb = model.var(b.component).lb();
            let ub = model.var(b.component).ub();
            let bb = model.ceil(b.bound);
            let y = additionalvars[j];

            match b.sense {
                CompSense::Ge => {
                    // y = 1 -> x >= bb
                    additionalconss.push(model.create_pricing_cons(
                        &format!("c(y({},{})lb)", name, j),
                        vec![(pricingvar, 1.0), (y, lb - bb)],
                        lb,
                        f64::INFINITY,
                    ));
                    // x >= bb -> y = 1
                    additionalconss.push(model.create_pricing_cons(
                        &format!("c(y({},{})ub)", name, j),
                        vec![(pricingvar, 1.0), (y, bb - 1.0 - ub)],
                        f64::NEG_INFINITY,
                        bb - 1.0,
                    ));
                }
                CompSense::Lt => {
                    // y = 1 -> x <= bb - 1
                    additionalconss.push(model.create_pricing_cons(
                        &format!("c(y({},{})ub)", name, j),
                        vec![(pricingvar, 1.0), (y, ub - (bb - 1.0))],
                        f64::NEG_INFINITY,
                        ub,
                    ));
                    // x <= bb - 1 -> y = 1
                    additionalconss.push(model.create_pricing_cons(
                        &format!("c(y({},{})lb)", name, j),
                        vec![(pricingvar, 1.0), (y, bb - lb)],
                        bb,
                        f64::INFINITY,
                    ));
                }
            }
        }

        store.create_pricing_modification(model, block, coefvar, additionalvars, additionalconss)
    }

    /// Checks the children of all ancestors for a twin of the candidate
    /// child: same block, same sequence pattern and the same left-hand side.
    fn prune_by_dominance(
        &self,
        model: &Model,
        lhs: f64,
        seq: &[ComponentBound],
        block: i32,
    ) -> bool {
        let mut chains: Vec<&[usize]> = Vec::new();
        let mut anc = self.cur;
        while let Some(a) = anc {
            chains.push(&self.nodes[a].children);
            anc = self.nodes[a].parent;
        }
        chains.push(&self.roots);

        for children in chains {
            for &child in children {
                let data = &self.nodes[child].data;
                if data.block != block
                    || data.seq.len() != seq.len()
                    || !model.is_eq(data.lhs, lhs)
                {
                    continue;
                }
                let same = data.seq.iter().zip(seq).all(|(a, b)| {
                    a.component == b.component
                        && a.sense == b.sense
                        && model.is_eq(a.bound, b.bound)
                });
                if same {
                    debug!("child pruned");
                    return true;
                }
            }
        }
        false
    }

    /// For the chosen sequence `s`, creates the `|s|+1` Vanderbeck child
    /// nodes with their extended master constraints.
    fn create_child_nodes(
        &mut self,
        model: &mut Model,
        store: &mut MasterConsStore,
        s: &[ComponentBound],
        blocknr: usize,
    ) -> Result<BranchingResult> {
        debug_assert!(!s.is_empty());
        let identical = model.n_identical_blocks(blocknr) as f64;
        debug!(
            blocknr,
            identical,
            nchildren = s.len() + 1,
            "creating Vanderbeck child nodes"
        );

        let mastervars = model.master_vars();
        let mut working: Vec<VarId> = mastervars
            .iter()
            .copied()
            .filter(|&mv| model.is_master_var_in_block(mv, blocknr))
            .collect();

        let mut pl = identical;
        let mut lhssum = 0.0;
        let mut nchildren = 0;

        for p in 0..=s.len() {
            let mut childseq: Vec<ComponentBound> = Vec::with_capacity((p + 1).min(s.len()));
            if p == s.len() {
                childseq.extend_from_slice(s);
            } else {
                for (k, b) in s.iter().enumerate().take(p + 1) {
                    let mut bound = *b;
                    if k >= p {
                        bound.sense = bound.sense.flipped();
                    }
                    childseq.push(bound);
                }
            }

            let lhs = if p == s.len() {
                pl
            } else {
                // restrict the working set by the p-th bound and take the
                // rounded-up weight
                let mut mu = 0.0;
                working.retain(|&mv| {
                    let entry = model.generator_entry(mv, s[p].component);
                    let satisfied = match s[p].sense {
                        CompSense::Ge => model.is_ge(entry, s[p].bound),
                        CompSense::Lt => model.is_lt(entry, s[p].bound),
                    };
                    if satisfied {
                        mu += model.sol_val(mv);
                    }
                    satisfied
                });
                let l = model.ceil(mu);
                let lhs = pl - l + 1.0;
                pl = l;
                lhs
            };
            debug_assert!(model.is_feas_integral(lhs));
            lhssum += lhs;

            if self.prune_by_dominance(model, lhs, &childseq, blocknr as i32) {
                continue;
            }

            let name = format!("node({},{}) >= {}", blocknr, p + 1, lhs);
            let cons = model.add_branch_cons(Constraint::new(&name, lhs, f64::INFINITY));
            model.set_cons_active(cons, false);

            let modification =
                Self::build_pricing_modification(model, store, blocknr, &childseq, &name)?;
            let mastercons = store.create_from_cons(
                model,
                cons,
                vec![modification],
                MasterConsPayload::GenericBranch(GenericBranchPayload {
                    block: blocknr as i32,
                    seq: childseq.clone(),
                    lhs,
                }),
            )?;

            let data = GenericBranchData {
                block: blocknr as i32,
                seq: childseq,
                lhs,
                mastercons: Some(mastercons),
            };
            for &mv in &mastervars {
                let coef = mastervar_coef(model, &data, mv);
                if !model.is_zero(coef) {
                    store.add_master_var(model, mastercons, mv, coef);
                }
            }

            let node = self.nodes.len();
            self.nodes.push(GenericNode {
                parent: self.cur,
                children: Vec::new(),
                data,
            });
            match self.cur {
                Some(parent) => self.nodes[parent].children.push(node),
                None => self.roots.push(node),
            }
            nchildren += 1;
        }

        debug_assert!(model.is_eq(lhssum, identical + s.len() as f64));

        if nchildren == 0 {
            debug!("node cut off, all children have been pruned");
            Ok(BranchingResult::CutOff)
        } else {
            Ok(BranchingResult::Branched)
        }
    }

    /// Creates two children branching directly on a static master variable.
    fn branch_directly_on_mastervar(
        &mut self,
        model: &mut Model,
        store: &mut MasterConsStore,
        mastervar: VarId,
    ) -> Result<BranchingResult> {
        let bound = model.ceil(model.sol_val(mastervar));
        debug!(?mastervar, bound, "branching directly on master variable");

        for (sense, lhs, rhs, side) in [
            (CompSense::Ge, bound, f64::INFINITY, bound),
            (CompSense::Lt, f64::NEG_INFINITY, bound - 1.0, bound - 1.0),
        ] {
            let name = format!("directchild(1,{})", bound);
            let mut cons = Constraint::new(&name, lhs, rhs);
            cons.add_coef(mastervar, 1.0);
            let cons = model.add_branch_cons(cons);
            model.set_cons_active(cons, false);

            let mastercons = store.create_from_cons(
                model,
                cons,
                Vec::new(),
                MasterConsPayload::GenericBranch(GenericBranchPayload {
                    block: -3,
                    seq: vec![ComponentBound {
                        component: mastervar,
                        sense,
                        bound,
                    }],
                    lhs: side,
                }),
            )?;

            let node = self.nodes.len();
            self.nodes.push(GenericNode {
                parent: self.cur,
                children: Vec::new(),
                data: GenericBranchData {
                    block: -3,
                    seq: vec![ComponentBound {
                        component: mastervar,
                        sense,
                        bound,
                    }],
                    lhs: side,
                    mastercons: Some(mastercons),
                },
            });
            match self.cur {
                Some(parent) => self.nodes[parent].children.push(node),
                None => self.roots.push(node),
            }
        }
        Ok(BranchingResult::Branched)
    }

    /// Collects the distinct ancestor sequences of the given block along the
    /// active chain.
    fn collect_ancestor_seqs(&self, model: &Model, blocknr: usize) -> Vec<Vec<ComponentBound>> {
        let mut c: Vec<Vec<ComponentBound>> = Vec::new();
        let mut anc = self.cur;
        while let Some(a) = anc {
            let data = &self.nodes[a].data;
            if data.block == blocknr as i32 && !data.seq.is_empty() {
                let known = c.iter().any(|seq| {
                    seq.len() == data.seq.len()
                        && seq.iter().zip(&data.seq).all(|(x, y)| {
                            x.component == y.component
                                && x.sense == y.sense
                                && model.is_eq(x.bound, y.bound)
                        })
                });
                if !known {
                    c.push(data.seq.clone());
                }
            }
            anc = self.nodes[a].parent;
        }
        c
    }

    /* induced lexicographic ordering */

    /// Lexicographic comparison of two master variables over the integral
    /// original variables; larger generators come first.
    fn lexicographic_cmp(model: &Model, mv1: VarId, mv2: VarId) -> std::cmp::Ordering {
        for i in 0..model.n_vars() {
            let var = VarId(i);
            match model.var(var).kind() {
                VarKind::Original { .. } if model.var(var).var_type().is_integral() => {}
                _ => continue,
            }
            let e1 = model.generator_entry(mv1, var);
            let e2 = model.generator_entry(mv2, var);
            if model.is_gt(e1, e2) {
                return std::cmp::Ordering::Less;
            }
            if model.is_lt(e1, e2) {
                return std::cmp::Ordering::Greater;
            }
        }
        std::cmp::Ordering::Equal
    }

    /// Comparison induced by the ancestor sequences: both variables descend
    /// through the subset of `c` they satisfy until a sequence separates
    /// them, falling back to the lexicographic order.
    fn ilo_cmp(
        model: &Model,
        mv1: VarId,
        mv2: VarId,
        c: &[Vec<ComponentBound>],
        p: usize,
    ) -> std::cmp::Ordering {
        if c.len() <= 1 {
            return Self::lexicographic_cmp(model, mv1, mv2);
        }

        let k = match c.iter().position(|seq| seq.len() >= p) {
            Some(k) => k,
            None => return Self::lexicographic_cmp(model, mv1, mv2),
        };
        let bound = c[k][p - 1];

        let e1 = model.generator_entry(mv1, bound.component);
        let e2 = model.generator_entry(mv2, bound.component);

        if model.is_ge(e1, bound.bound) && model.is_ge(e2, bound.bound) {
            let upper: Vec<Vec<ComponentBound>> = c
                .iter()
                .filter(|seq| seq.len() >= p && seq[p - 1].sense == CompSense::Ge)
                .cloned()
                .collect();
            return Self::ilo_cmp(model, mv1, mv2, &upper, p + 1);
        }
        if model.is_lt(e1, bound.bound) && model.is_lt(e2, bound.bound) {
            let lower: Vec<Vec<ComponentBound>> = c
                .iter()
                .filter(|seq| seq.len() >= p && seq[p - 1].sense == CompSense::Lt)
                .cloned()
                .collect();
            return Self::ilo_cmp(model, mv1, mv2, &lower, p + 1);
        }
        if model.is_gt(e1, e2) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Less
        }
    }

    /// Sorts a block's master variables by the order induced by the ancestor
    /// sequences; used as bookkeeping when a block yields no sequence.
    fn induced_lexicographic_sort(
        model: &Model,
        strips: &mut [VarId],
        c: &[Vec<ComponentBound>],
    ) {
        if c.is_empty() {
            strips.sort_by(|&a, &b| Self::lexicographic_cmp(model, a, b));
        } else {
            strips.sort_by(|&a, &b| Self::ilo_cmp(model, a, b, c, 1));
        }
    }
}

impl BranchRule for GenericBranching {
    fn execute_lp(
        &mut self,
        model: &mut Model,
        store: &mut MasterConsStore,
    ) -> Result<BranchingResult> {
        // the scheme only works on purely integral problems
        for i in 0..model.n_vars() {
            let var = model.var(VarId(i));
            if var.is_original() && !var.var_type().is_integral() {
                debug!("generic branching only without continuous variables");
                return Ok(BranchingResult::DidNotRun);
            }
        }

        let branchcands = model.lp_branch_cands();
        if branchcands.is_empty() {
            return Ok(BranchingResult::DidNotFind);
        }

        let mut checkedblocks: Vec<usize> = Vec::new();
        let mut checkedstrips: Vec<Vec<VarId>> = Vec::new();

        loop {
            // pick the block of the first candidate in an unchecked block;
            // static master copies trigger direct branching
            let mut blocknr: i32 = -2;
            let mut directvar = None;
            'outer: for &cand in &branchcands {
                if model.var(cand).block() == -1 {
                    blocknr = -1;
                    directvar = Some(cand);
                    break;
                }
                for j in 0..model.n_blocks() {
                    if checkedblocks.contains(&j) {
                        continue;
                    }
                    if model.is_master_var_in_block(cand, j) {
                        blocknr = j as i32;
                        break 'outer;
                    }
                }
            }

            if blocknr == -1 {
                let mastervar = match directvar {
                    Some(mastervar) => mastervar,
                    None => return Ok(BranchingResult::DidNotFind),
                };
                return self.branch_directly_on_mastervar(model, store, mastervar);
            }
            if blocknr < 0 {
                debug!("no block with fractional columns left");
                return Ok(BranchingResult::DidNotFind);
            }
            let blocknr = blocknr as usize;
            debug!(blocknr, "branching in block");

            let f: Vec<VarId> = branchcands
                .iter()
                .copied()
                .filter(|&mv| model.is_master_var_in_block(mv, blocknr))
                .collect();
            let indexset = init_index_set(model, &f);
            let c = self.collect_ancestor_seqs(model, blocknr);

            let mut record: Vec<Vec<ComponentBound>> = Vec::new();
            if c.is_empty() {
                self.separate(model, &f, &indexset, &[], &mut record);
            } else {
                self.explore(model, &c, 1, &f, &indexset, &[], &mut record);
            }

            if record.is_empty() {
                checkedblocks.push(blocknr);
                let mut strips: Vec<VarId> = model
                    .master_vars()
                    .into_iter()
                    .filter(|&mv| model.is_master_var_in_block(mv, blocknr))
                    .collect();
                Self::induced_lexicographic_sort(model, &mut strips, &c);
                checkedstrips.push(strips);
                continue;
            }

            let s = Self::choose_s(&mut record);
            debug!(ssize = s.len(), "chose S");
            return self.create_child_nodes(model, store, &s, blocknr);
        }
    }

    fn new_col(
        &mut self,
        model: &mut Model,
        store: &MasterConsStore,
        mastervar: VarId,
    ) -> Result<()> {
        let varblock = model.var(mastervar).block();
        let islinking = matches!(
            model.var(mastervar).kind(),
            VarKind::Master { linking: true, .. }
        );

        let mut anc = self.cur;
        while let Some(node) = anc {
            anc = self.nodes[node].parent;
            let data = &self.nodes[node].data;
            let mastercons = match data.mastercons {
                Some(mc) if !data.seq.is_empty() => mc,
                _ => continue,
            };
            if (data.block != varblock && varblock != -1) || (varblock == -1 && !islinking) {
                continue;
            }
            let coef = mastervar_coef(model, data, mastervar);
            if !model.is_zero(coef) {
                store.add_master_var(model, mastercons, mastervar, coef);
            }
        }
        Ok(())
    }
}
