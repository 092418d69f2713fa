//! Component-bound branching.
//!
//! The simpler sibling of generic branching: it selects a single component
//! bound sequence by heuristics and creates exactly two children, "down" and
//! "up", whose extended master constraints bound the weight of the columns
//! inside the sequence's polytope by the rounded fractional weight.

use std::io::Write;

use tracing::debug;

use crate::branchrule::{fractionality, generator_entry_sol, BranchRule, BranchingResult};
use crate::constraint::Constraint;
use crate::mastercons::{
    MasterConsId, MasterConsPayload, MasterConsSide, MasterConsStore, PricingModification,
};
use crate::model::Model;
use crate::params::CompBndSettings;
use crate::retcode::{Result, Retcode};
use crate::variable::{VarId, VarKind, VarType};

/// Sense of a component bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompBndSense {
    /// The component is bounded from above: `v <= bound`.
    Le,
    /// The component is bounded from below: `v >= bound`.
    Ge,
}

/// An integral component bound `(variable, sense, bound)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompBnd {
    /// The restricted original variable.
    pub component: VarId,
    /// Sense of the restriction.
    pub sense: CompBndSense,
    /// Integral bound value.
    pub bound: i64,
}

/// Whether a child bounds the polytope weight from above or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompBndBranchType {
    /// The down child: weight at most `floor(sum)`.
    Down,
    /// The up child: weight at least `ceil(sum)`.
    Up,
}

/// Data a component-bound extended master constraint carries.
#[derive(Debug, Clone)]
pub struct CompBndPayload {
    /// Block of the sequence.
    pub block: usize,
    /// Down or up child.
    pub branchtype: CompBndBranchType,
    /// Rounded weight: rhs of the down child, lhs of the up child.
    pub constant: i64,
    /// The component bound sequence.
    pub seq: Vec<CompBnd>,
}

fn sol_in_seq(model: &Model, seq: &[CompBnd], solvars: &[VarId], solvals: &[f64]) -> bool {
    for b in seq {
        let entry = generator_entry_sol(model, solvars, solvals, b.component);
        match b.sense {
            CompBndSense::Ge => {
                if !model.is_ge(entry, b.bound as f64) {
                    return false;
                }
            }
            CompBndSense::Le => {
                if !model.is_le(entry, b.bound as f64) {
                    return false;
                }
            }
        }
    }
    true
}

/// Coefficient of a raw column solution in a component-bound extended master
/// constraint.
pub(crate) fn mastercons_coef(
    model: &Model,
    data: &CompBndPayload,
    solvars: &[VarId],
    solvals: &[f64],
    probnr: usize,
) -> f64 {
    if probnr != data.block {
        return 0.0;
    }
    if sol_in_seq(model, &data.seq, solvars, solvals) {
        1.0
    } else {
        0.0
    }
}

/// Returns whether a master variable's generator satisfies every bound.
fn mastervar_in_seq(model: &Model, mastervar: VarId, seq: &[CompBnd], block: usize) -> bool {
    if !model.is_master_var_in_block(mastervar, block) {
        return false;
    }
    for b in seq {
        let entry = model.generator_entry(mastervar, b.component);
        match b.sense {
            CompBndSense::Ge => {
                if !model.is_ge(entry, b.bound as f64) {
                    return false;
                }
            }
            CompBndSense::Le => {
                if !model.is_le(entry, b.bound as f64) {
                    return false;
                }
            }
        }
    }
    true
}

/// Strengthens bounds of the same sense on the same component into one.
pub fn simplify_seq(seq: &mut Vec<CompBnd>) {
    let mut simplified: Vec<CompBnd> = Vec::with_capacity(seq.len());
    for b in seq.iter() {
        if let Some(existing) = simplified
            .iter_mut()
            .find(|e| e.component == b.component && e.sense == b.sense)
        {
            existing.bound = match b.sense {
                CompBndSense::Le => existing.bound.min(b.bound),
                CompBndSense::Ge => existing.bound.max(b.bound),
            };
        } else {
            simplified.push(*b);
        }
    }
    debug!(
        from = seq.len(),
        to = simplified.len(),
        "simplified component bound sequence"
    );
    *seq = simplified;
}

/// Branching data stored at one child node.
#[derive(Debug, Clone)]
pub struct CompBndBranchData {
    pub(crate) branchtype: CompBndBranchType,
    pub(crate) constant: i64,
    pub(crate) seq: Vec<CompBnd>,
    pub(crate) block: usize,
    pub(crate) mastercons: Option<MasterConsId>,
}

impl CompBndBranchData {
    /// Returns whether this is the down or the up child.
    pub fn branchtype(&self) -> CompBndBranchType {
        self.branchtype
    }

    /// Returns the rounded weight of the child's master constraint.
    pub fn constant(&self) -> i64 {
        self.constant
    }

    /// Returns the component bound sequence.
    pub fn seq(&self) -> &[CompBnd] {
        &self.seq
    }

    /// Returns the block of the restriction.
    pub fn block(&self) -> usize {
        self.block
    }

    /// Returns the extended master constraint.
    pub fn mastercons(&self) -> Option<MasterConsId> {
        self.mastercons
    }
}

struct CompBndNode {
    parent: Option<usize>,
    children: Vec<usize>,
    data: CompBndBranchData,
}

/// The component-bound branching rule.
pub struct CompBndBranching {
    settings: CompBndSettings,
    nodes: Vec<CompBndNode>,
    roots: Vec<usize>,
    cur: Option<usize>,
    stats: Option<Box<dyn Write>>,
}

impl Default for CompBndBranching {
    fn default() -> Self {
        CompBndBranching::new(CompBndSettings::default())
    }
}

impl CompBndBranching {
    /// Creates the branching rule.
    pub fn new(settings: CompBndSettings) -> Self {
        CompBndBranching {
            settings,
            nodes: Vec::new(),
            roots: Vec::new(),
            cur: None,
            stats: None,
        }
    }

    /// Installs a sink receiving one `depth,size,sum,K` line per branching.
    pub fn set_stats_sink(&mut self, sink: Box<dyn Write>) {
        self.stats = Some(sink);
    }

    /// Returns the number of branch records created so far.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the branching data of a node.
    pub fn node_data(&self, node: usize) -> &CompBndBranchData {
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

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut anc = self.cur;
        while let Some(a) = anc {
            depth += 1;
            anc = self.nodes[a].parent;
        }
        depth
    }

    /* selection */

    /// Master variables of the block satisfying the sequence.
    fn find_satisfying_mastervars(
        model: &Model,
        block: usize,
        seq: &[CompBnd],
    ) -> Vec<VarId> {
        model
            .master_vars()
            .into_iter()
            .filter(|&mv| {
                if !model.is_master_var_in_block(mv, block) {
                    return false;
                }
                seq.is_empty() || mastervar_in_seq(model, mv, seq, block)
            })
            .collect()
    }

    /// Integral original variables appearing in the given master variables.
    fn index_set(model: &Model, mastervars: &[VarId]) -> Vec<VarId> {
        let mut indexset: Vec<VarId> = Vec::new();
        for &mv in mastervars {
            if let VarKind::Master { origvals, .. } = model.var(mv).kind() {
                for &(origvar, _) in origvals {
                    if model.var(origvar).var_type().is_integral()
                        && !indexset.contains(&origvar)
                    {
                        indexset.push(origvar);
                    }
                }
            }
        }
        indexset
    }

    /// Max-range midrange heuristic: the component with the largest value
    /// range over the positive fractional columns, branched at the midpoint.
    fn choose_max_min(
        model: &Model,
        satisfying: &[VarId],
        indexset: &[VarId],
    ) -> Option<(VarId, f64)> {
        let mut best: Option<(VarId, f64)> = None;
        let mut largestdiff = f64::NEG_INFINITY;

        for &origvar in indexset {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for &mv in satisfying {
                let solval = model.sol_val(mv);
                if !model.is_feas_positive(solval) || model.is_feas_integral(solval) {
                    continue;
                }
                let entry = model.generator_entry(mv, origvar);
                min = min.min(entry);
                max = max.max(entry);
            }
            if model.is_lt(min, max) && model.is_gt(max - min, largestdiff) {
                largestdiff = max - min;
                best = Some((origvar, (min + max) / 2.0));
            }
        }
        best
    }

    /// Most-distinct median heuristic: the component with the most distinct
    /// values over the positive fractional columns, branched at their median.
    fn choose_most_distinct_median(
        model: &Model,
        satisfying: &[VarId],
        indexset: &[VarId],
    ) -> Option<(VarId, f64)> {
        let mut best: Option<(VarId, f64)> = None;
        let mut bestcount = 1;

        for &origvar in indexset {
            let mut distinct: Vec<f64> = Vec::new();
            for &mv in satisfying {
                let solval = model.sol_val(mv);
                if !model.is_feas_positive(solval) || model.is_feas_integral(solval) {
                    continue;
                }
                let entry = model.generator_entry(mv, origvar);
                match distinct
                    .binary_search_by(|probe| probe.total_cmp(&entry))
                {
                    Ok(_) => {}
                    Err(pos) => {
                        if !distinct.iter().any(|&v| model.is_eq(v, entry)) {
                            distinct.insert(pos, entry);
                        }
                    }
                }
            }
            if distinct.len() > bestcount {
                bestcount = distinct.len();
                best = Some((origvar, distinct[(distinct.len() - 1) / 2]));
            }
        }
        best
    }

    /// Recursively refines the sequence until the weight of the satisfying
    /// columns turns fractional, collecting every emitted sequence.
    fn separation_helper(
        model: &Model,
        satisfying: &[VarId],
        seq: Vec<CompBnd>,
        block: usize,
        choose: &dyn Fn(&Model, &[VarId], &[VarId]) -> Option<(VarId, f64)>,
        found: &mut Vec<Vec<CompBnd>>,
    ) -> Result<()> {
        let frac = fractionality(model, satisfying);
        if model.is_eq(frac, 0.0) {
            // cannot happen for a sound branching scheme
            return Err(Retcode::invalid_data(
                "no fractional columns left during component bound separation",
            ));
        }

        if !seq.is_empty() && !model.is_feas_integral(frac) {
            debug!(?seq, frac, "emitting component bound sequence");
            found.push(seq);
            return Ok(());
        }

        // the weight is integral, impose an additional bound
        let indexset = Self::index_set(model, satisfying);
        let (origvar, value) = match choose(model, satisfying, &indexset) {
            Some(pair) => pair,
            None => return Ok(()),
        };
        debug_assert!(model.var(origvar).lb() < value && value < model.var(origvar).ub());

        let floorvalue = model.floor(value) as i64;
        let mut low = seq.clone();
        low.push(CompBnd {
            component: origvar,
            sense: CompBndSense::Le,
            bound: floorvalue,
        });
        let mut high = seq;
        high.push(CompBnd {
            component: origvar,
            sense: CompBndSense::Ge,
            bound: floorvalue + 1,
        });

        let lowvars: Vec<VarId> = satisfying
            .iter()
            .copied()
            .filter(|&mv| mastervar_in_seq(model, mv, &low, block))
            .collect();
        let highvars: Vec<VarId> = satisfying
            .iter()
            .copied()
            .filter(|&mv| mastervar_in_seq(model, mv, &high, block))
            .collect();
        debug_assert!(!lowvars.is_empty());
        debug_assert!(!highvars.is_empty());

        Self::separation_helper(model, &lowvars, low, block, choose, found)?;
        Self::separation_helper(model, &highvars, high, block, choose, found)?;
        Ok(())
    }

    /// Weight of the columns satisfying the sequence.
    fn calc_sum(model: &Model, seq: &[CompBnd], block: usize) -> f64 {
        Self::find_satisfying_mastervars(model, block, seq)
            .iter()
            .map(|&mv| model.sol_val(mv))
            .sum()
    }

    /// Chooses among the emitted sequences: smallest length first, ties
    /// broken by the most fractional weight.
    fn choose_seq(model: &Model, mut found: Vec<Vec<CompBnd>>, block: usize) -> Vec<CompBnd> {
        debug_assert!(!found.is_empty());
        let smallest = found.iter().map(|seq| seq.len()).min().unwrap_or(0);
        found.retain(|seq| seq.len() == smallest);

        let mut best = 0;
        let mut bestfrac = 0.0;
        for (i, seq) in found.iter().enumerate() {
            let frac = model.frac(Self::calc_sum(model, seq, block));
            let frac = frac.min(1.0 - frac);
            if bestfrac < frac {
                bestfrac = frac;
                best = i;
            }
        }
        found.swap_remove(best)
    }

    /// Runs the enabled selection heuristics and picks one sequence.
    fn separation(&self, model: &Model, block: usize) -> Result<Option<Vec<CompBnd>>> {
        let satisfying = Self::find_satisfying_mastervars(model, block, &[]);
        let mut found: Vec<Vec<CompBnd>> = Vec::new();

        debug_assert!(
            self.settings.use_max_range_midrange || self.settings.use_most_distinct_median
        );

        if self.settings.use_max_range_midrange {
            Self::separation_helper(
                model,
                &satisfying,
                Vec::new(),
                block,
                &Self::choose_max_min,
                &mut found,
            )?;
        }
        if self.settings.use_most_distinct_median {
            Self::separation_helper(
                model,
                &satisfying,
                Vec::new(),
                block,
                &Self::choose_most_distinct_median,
                &mut found,
            )?;
        }

        if found.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self::choose_seq(model, found, block)))
    }

    /* child creation */

    /// Builds the pricing modification of one child: a binary coefficient
    /// variable `g`, one indicator `y_j` per bound, and the constraints
    /// linking them to the pricing copies.
    fn build_pricing_modification(
        model: &mut Model,
        store: &MasterConsStore,
        branchtype: CompBndBranchType,
        seq: &[CompBnd],
        block: usize,
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
        for (j, _) in seq.iter().enumerate() {
            additionalvars.push(model.create_inferred_pricing_var(
                &format!("y({},{})", name, j),
                0.0,
                1.0,
                false,
                VarType::Binary,
                block,
            ));
        }

        let mut additionalconss = Vec::new();
        match branchtype {
            CompBndBranchType::Down => {
                // g >= 1 + sum_j y_j - n, i.e. 1 - n <= g - sum_j y_j
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

                for (j, b) in seq.iter().enumerate() {
                    let pricingvar = model.pricing_var_of(b.component).ok_or_else(|| {
                        Retcode::invalid_data("component without a pricing copy")
                    })?;
                    let lb = model.var(b.component).lb();
                    let ub = model.var(b.component).ub();
                    let y = additionalvars[j];
                    let cons = match b.sense {
                        CompBndSense::Le => {
                            // (bound+1) <= x_j + ((bound+1) - l_j) * y_j
                            let bound = (b.bound + 1) as f64;
                            debug_assert!(model.is_positive(bound - lb));
                            model.create_pricing_cons(
                                &format!("c(y({},{}))", name, j),
                                vec![(pricingvar, 1.0), (y, bound - lb)],
                                bound,
                                f64::INFINITY,
                            )
                        }
                        CompBndSense::Ge => {
                            // x_j + ((bound-1) - u_j) * y_j <= (bound-1)
                            let bound = (b.bound - 1) as f64;
                            debug_assert!(model.is_positive(ub - bound));
                            model.create_pricing_cons(
                                &format!("c(y({},{}))", name, j),
                                vec![(pricingvar, 1.0), (y, bound - ub)],
                                f64::NEG_INFINITY,
                                bound,
                            )
                        }
                    };
                    additionalconss.push(cons);
                }
            }
            CompBndBranchType::Up => {
                // g <= y_j for every j
                for (j, &y) in additionalvars.iter().enumerate() {
                    additionalconss.push(model.create_pricing_cons(
                        &format!("c(g({}),{})", name, j),
                        vec![(y, 1.0), (coefvar, -1.0)],
                        0.0,
                        f64::INFINITY,
                    ));
                }

                for (j, b) in seq.iter().enumerate() {
                    let pricingvar = model.pricing_var_of(b.component).ok_or_else(|| {
                        Retcode::invalid_data("component without a pricing copy")
                    })?;
                    let lb = model.var(b.component).lb();
                    let ub = model.var(b.component).ub();
                    let y = additionalvars[j];
                    let bound = b.bound as f64;
                    let cons = match b.sense {
                        CompBndSense::Le => {
                            // x_j + (u_j - bound) * y_j <= u_j
                            debug_assert!(model.is_positive(ub - bound));
                            model.create_pricing_cons(
                                &format!("c1(y({},{}))", name, j),
                                vec![(pricingvar, 1.0), (y, ub - bound)],
                                f64::NEG_INFINITY,
                                ub,
                            )
                        }
                        CompBndSense::Ge => {
                            // l_j <= x_j + (l_j - bound) * y_j
                            debug_assert!(model.is_positive(bound - lb));
                            model.create_pricing_cons(
                                &format!("c1(y({},{}))", name, j),
                                vec![(pricingvar, 1.0), (y, lb - bound)],
                                lb,
                                f64::INFINITY,
                            )
                        }
                    };
                    additionalconss.push(cons);
                }
            }
        }

        store.create_pricing_modification(model, block, coefvar, additionalvars, additionalconss)
    }

    /// Creates the two child nodes for the chosen sequence.
    fn create_child_nodes(
        &mut self,
        model: &mut Model,
        store: &mut MasterConsStore,
        seq: Vec<CompBnd>,
        block: usize,
    ) -> Result<BranchingResult> {
        debug_assert!(!seq.is_empty());

        let constantsum = Self::calc_sum(model, &seq, block);
        // the sum is fractional by construction of the separation
        debug_assert!(!model.is_feas_integral(constantsum));
        debug!(
            block,
            constantsum,
            identical = model.n_identical_blocks(block),
            "component bound branching creates 2 nodes"
        );

        let depth = self.depth();
        if let Some(sink) = &mut self.stats {
            let _ = writeln!(
                sink,
                "{},{},{},{}",
                depth,
                seq.len(),
                constantsum,
                model.n_identical_blocks(block)
            );
        }

        for branchtype in [CompBndBranchType::Down, CompBndBranchType::Up] {
            let constant = match branchtype {
                CompBndBranchType::Down => model.floor(constantsum) as i64,
                CompBndBranchType::Up => model.ceil(constantsum) as i64,
            };
            let name = match branchtype {
                CompBndBranchType::Down => {
                    format!("compbnd_child({}_LE_{})", seq.len(), constant)
                }
                CompBndBranchType::Up => {
                    format!("compbnd_child({}_GE_{})", seq.len(), constant)
                }
            };

            let cons = match branchtype {
                CompBndBranchType::Down => model.add_branch_cons(Constraint::new(
                    &name,
                    f64::NEG_INFINITY,
                    constant as f64,
                )),
                CompBndBranchType::Up => model.add_branch_cons(Constraint::new(
                    &name,
                    constant as f64,
                    f64::INFINITY,
                )),
            };
            model.set_cons_active(cons, false);

            let modification = Self::build_pricing_modification(
                model,
                store,
                branchtype,
                &seq,
                block,
                &name,
            )?;
            let payload = CompBndPayload {
                block,
                branchtype,
                constant,
                seq: seq.clone(),
            };
            let mastercons = store.create_from_cons(
                model,
                cons,
                vec![modification],
                MasterConsPayload::CompBnd(payload),
            )?;

            // enter the already priced master variables
            for mv in model.master_vars() {
                if mastervar_in_seq(model, mv, &seq, block) {
                    store.add_master_var(model, mastercons, mv, 1.0);
                }
            }

            let node = self.nodes.len();
            self.nodes.push(CompBndNode {
                parent: self.cur,
                children: Vec::new(),
                data: CompBndBranchData {
                    branchtype,
                    constant,
                    seq: seq.clone(),
                    block,
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
}

impl BranchRule for CompBndBranching {
    fn execute_lp(
        &mut self,
        model: &mut Model,
        store: &mut MasterConsStore,
    ) -> Result<BranchingResult> {
        for i in 0..model.n_vars() {
            let var = model.var(VarId(i));
            if var.is_original() && !var.var_type().is_integral() {
                debug!("component bound branching only without continuous variables");
                return Ok(BranchingResult::DidNotRun);
            }
        }

        for block in 0..model.n_blocks() {
            if !model.is_block_relevant(block) {
                continue;
            }
            debug!(block, "trying to branch in block");

            let satisfying = Self::find_satisfying_mastervars(model, block, &[]);
            let frac = fractionality(model, &satisfying);
            if model.is_zero(frac) {
                debug!(block, "no fractional integer variables in block");
                continue;
            }

            if let Some(mut seq) = self.separation(model, block)? {
                simplify_seq(&mut seq);
                debug!(block, ?seq, "branching on component bound sequence");
                return self.create_child_nodes(model, store, seq, block);
            }
        }

        debug!("no block found to branch on");
        Ok(BranchingResult::CutOff)
    }

    fn new_col(
        &mut self,
        model: &mut Model,
        store: &MasterConsStore,
        mastervar: VarId,
    ) -> Result<()> {
        let mut anc = self.cur;
        while let Some(node) = anc {
            anc = self.nodes[node].parent;
            let data = &self.nodes[node].data;
            let mastercons = match data.mastercons {
                Some(mc) => mc,
                None => continue,
            };
            if mastervar_in_seq(model, mastervar, &data.seq, data.block) {
                store.add_master_var(model, mastercons, mastervar, 1.0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn frac_setup() -> (Model, testing::Fixture, VarId, VarId) {
        let (mut model, fix) = testing::two_block_model();
        let m1 = testing::add_master_var(&mut model, 0, &[(fix.orig[0], 1.0)], 0.5);
        let m2 = testing::add_master_var(&mut model, 0, &[(fix.orig[0], 3.0)], 0.5);
        (model, fix, m1, m2)
    }

    #[test]
    fn simplify_folds_same_sense_bounds() {
        let v = VarId(0);
        let u = VarId(1);
        let mut seq = vec![
            CompBnd {
                component: v,
                sense: CompBndSense::Le,
                bound: 5,
            },
            CompBnd {
                component: v,
                sense: CompBndSense::Le,
                bound: 3,
            },
            CompBnd {
                component: v,
                sense: CompBndSense::Ge,
                bound: 1,
            },
            CompBnd {
                component: u,
                sense: CompBndSense::Ge,
                bound: 2,
            },
        ];
        simplify_seq(&mut seq);

        assert_eq!(seq.len(), 3);
        assert_eq!(
            seq[0],
            CompBnd {
                component: v,
                sense: CompBndSense::Le,
                bound: 3
            }
        );
        assert_eq!(
            seq[1],
            CompBnd {
                component: v,
                sense: CompBndSense::Ge,
                bound: 1
            }
        );
        assert_eq!(
            seq[2],
            CompBnd {
                component: u,
                sense: CompBndSense::Ge,
                bound: 2
            }
        );
    }

    #[test]
    fn simplify_keeps_tightest_bound_per_sense() {
        let v = VarId(0);
        let mut seq = vec![
            CompBnd {
                component: v,
                sense: CompBndSense::Ge,
                bound: 1,
            },
            CompBnd {
                component: v,
                sense: CompBndSense::Ge,
                bound: 4,
            },
        ];
        simplify_seq(&mut seq);
        assert_eq!(seq.len(), 1);
        assert_eq!(seq[0].bound, 4);
    }

    #[test]
    fn max_min_picks_the_widest_component_at_its_midpoint() {
        let (model, fix, m1, m2) = frac_setup();
        let indexset = CompBndBranching::index_set(&model, &[m1, m2]);
        let (origvar, value) =
            CompBndBranching::choose_max_min(&model, &[m1, m2], &indexset).unwrap();
        assert_eq!(origvar, fix.orig[0]);
        assert_eq!(value, 2.0);
    }

    #[test]
    fn execute_lp_creates_down_and_up_children() {
        let (mut model, _fix, _m1, _m2) = frac_setup();
        let mut store = MasterConsStore::new();
        let mut rule = CompBndBranching::default();

        let result = rule.execute_lp(&mut model, &mut store).unwrap();
        assert_eq!(result, BranchingResult::Branched);
        assert_eq!(rule.n_nodes(), 2);

        let down = rule.node_data(0);
        let up = rule.node_data(1);
        assert_eq!(down.branchtype(), CompBndBranchType::Down);
        assert_eq!(up.branchtype(), CompBndBranchType::Up);

        // weight of the chosen polytope is 0.5: down <= 0, up >= 1
        assert_eq!(down.constant(), 0);
        assert_eq!(up.constant(), 1);

        let downcons = down.mastercons().unwrap();
        assert_eq!(store.rhs(&model, downcons), 0.0);
        let upcons = up.mastercons().unwrap();
        assert_eq!(store.lhs(&model, upcons), 1.0);
    }

    #[test]
    fn down_child_modification_links_bounds_through_indicators() {
        let (mut model, fix, _m1, _m2) = frac_setup();
        let mut store = MasterConsStore::new();
        let mut rule = CompBndBranching::default();
        rule.execute_lp(&mut model, &mut store).unwrap();

        let down = rule.node_data(0);
        let mc = down.mastercons().unwrap();
        let emc = store.mastercons(mc);
        assert_eq!(emc.pricing_mods().len(), 1);
        let m = &emc.pricing_mods()[0];
        assert_eq!(m.additional_vars().len(), down.seq().len());
        // one g-linking constraint plus one per bound
        assert_eq!(m.additional_conss().len(), down.seq().len() + 1);

        // the up child uses g <= y_j plus one constraint per bound
        let up = rule.node_data(1);
        let m = &store.mastercons(up.mastercons().unwrap()).pricing_mods()[0];
        assert_eq!(m.additional_conss().len(), 2 * up.seq().len());

        // coefficient of a solution inside the polytope is g's value
        let g = m.coefvar;
        let solvars = vec![fix.pricing[0], g];
        let solvals = vec![2.0, 1.0];
        let coef = store
            .coefficient(&model, up.mastercons().unwrap(), &solvars, &solvals, 0)
            .unwrap();
        assert_eq!(coef, solvals[1]);

        // a solution outside the polytope has coefficient zero
        let coef = store
            .coefficient(&model, up.mastercons().unwrap(), &[fix.pricing[0]], &[3.0], 0)
            .unwrap();
        assert_eq!(coef, 0.0);
    }

    #[test]
    fn new_col_adds_columns_in_the_polytope() {
        let (mut model, fix, _m1, _m2) = frac_setup();
        let mut store = MasterConsStore::new();
        let mut rule = CompBndBranching::default();
        rule.execute_lp(&mut model, &mut store).unwrap();

        let child = rule.children()[1];
        rule.activate_node(&mut model, &store, child).unwrap();
        let mc = rule.node_data(child).mastercons().unwrap();
        let seq = rule.node_data(child).seq().to_vec();

        let inside = testing::add_master_var(&mut model, 0, &[(fix.orig[0], 5.0)], 0.0);
        let insideexpected = mastervar_in_seq(&model, inside, &seq, 0);
        rule.new_col(&mut model, &store, inside).unwrap();
        let got = store.coefs(&model, mc).iter().any(|&(v, _)| v == inside);
        assert_eq!(got, insideexpected);
    }

    #[test]
    fn continuous_originals_disable_the_rule() {
        let (mut model, _fix) = testing::two_block_model();
        model.add_original_var("t", 1.0, 0.0, 1.0, VarType::Continuous, 0);

        let mut store = MasterConsStore::new();
        let mut rule = CompBndBranching::default();
        assert_eq!(
            rule.execute_lp(&mut model, &mut store).unwrap(),
            BranchingResult::DidNotRun
        );
    }

    #[test]
    fn integral_blocks_are_skipped() {
        let (mut model, fix) = testing::two_block_model();
        // integral master variables only
        testing::add_master_var(&mut model, 0, &[(fix.orig[0], 1.0)], 1.0);
        testing::add_master_var(&mut model, 1, &[(fix.orig[3], 1.0)], 2.0);

        let mut store = MasterConsStore::new();
        let mut rule = CompBndBranching::default();
        let result = rule.execute_lp(&mut model, &mut store).unwrap();
        assert_eq!(result, BranchingResult::CutOff);
        assert_eq!(rule.n_nodes(), 0);
    }

    #[test]
    fn stats_sink_receives_one_line_per_branching() {
        let (mut model, _fix, _m1, _m2) = frac_setup();
        let mut store = MasterConsStore::new();
        let mut rule = CompBndBranching::default();

        let sink: Vec<u8> = Vec::new();
        rule.set_stats_sink(Box::new(sink));
        rule.execute_lp(&mut model, &mut store).unwrap();
        // writing into the boxed sink must not fail the branching
        assert_eq!(rule.n_nodes(), 2);
    }

    proptest::proptest! {
        #[test]
        fn simplify_leaves_one_bound_per_component_and_sense(
            bounds in proptest::collection::vec((0usize..3, 0u8..2, -5i64..5), 1..12)
        ) {
            let mut seq: Vec<CompBnd> = bounds
                .into_iter()
                .map(|(var, sense, bound)| CompBnd {
                    component: VarId(var),
                    sense: if sense == 0 { CompBndSense::Le } else { CompBndSense::Ge },
                    bound,
                })
                .collect();
            let original = seq.clone();
            simplify_seq(&mut seq);

            for (i, a) in seq.iter().enumerate() {
                for b in &seq[i + 1..] {
                    proptest::prop_assert!(
                        a.component != b.component || a.sense != b.sense
                    );
                }
            }
            // every surviving bound is the tightest of its group
            for b in &seq {
                let tightest = original
                    .iter()
                    .filter(|o| o.component == b.component && o.sense == b.sense)
                    .map(|o| o.bound)
                    .reduce(|x, y| match b.sense {
                        CompBndSense::Le => x.min(y),
                        CompBndSense::Ge => x.max(y),
                    })
                    .unwrap();
                proptest::prop_assert_eq!(b.bound, tightest);
            }
        }
    }
}
