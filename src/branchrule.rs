use crate::mastercons::MasterConsStore;
use crate::model::Model;
use crate::retcode::Result;
use crate::variable::{VarId, VarKind};

/// The result of a branching rule execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchingResult {
    /// The branching rule did not run, e.g. because the problem contains
    /// continuous variables.
    DidNotRun,
    /// The branching rule ran but found nothing to branch on.
    DidNotFind,
    /// Child nodes were created.
    Branched,
    /// Every child was pruned by the dominance check; the node can be cut
    /// off.
    CutOff,
}

/// Callbacks a branching rule exposes to the pricing controller and the
/// branch-and-bound machinery.
pub trait BranchRule {
    /// Executes the rule on the current fractional LP solution.
    fn execute_lp(
        &mut self,
        model: &mut Model,
        store: &mut MasterConsStore,
    ) -> Result<BranchingResult>;

    /// Reacts to a master variable created anywhere in the subtree: walks
    /// the active branch chain and enters the variable into every ancestor
    /// extended master constraint with a nonzero coefficient.
    fn new_col(
        &mut self,
        model: &mut Model,
        store: &MasterConsStore,
        mastervar: VarId,
    ) -> Result<()>;
}

/// Returns the value of an original variable in a column solution given as
/// raw `(var, value)` arrays; the arrays may carry the original variable
/// itself or its pricing copy.
pub fn generator_entry_sol(
    model: &Model,
    solvars: &[VarId],
    solvals: &[f64],
    origvar: VarId,
) -> f64 {
    let pricingvar = model.pricing_var_of(origvar);
    for (i, &var) in solvars.iter().enumerate() {
        if var == origvar || Some(var) == pricingvar {
            return solvals[i];
        }
    }
    0.0
}

/// Returns the total fractionality of the LP values of the given master
/// variables.
pub fn fractionality(model: &Model, vars: &[VarId]) -> f64 {
    vars.iter()
        .map(|&v| model.frac(model.sol_val(v)))
        .sum()
}

/// Collects the integral original variables appearing in the generators of
/// the given master variables; the index set of the separation procedures.
pub fn init_index_set(model: &Model, mastervars: &[VarId]) -> Vec<VarId> {
    let mut indexset: Vec<VarId> = Vec::new();
    for &mv in mastervars {
        if let VarKind::Master { origvals, .. } = model.var(mv).kind() {
            for &(origvar, _) in origvals {
                if !model.var(origvar).var_type().is_integral() {
                    continue;
                }
                if !indexset.contains(&origvar) {
                    indexset.push(origvar);
                }
            }
        }
    }
    indexset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn generator_entries_resolve_pricing_copies() {
        let (model, fix) = testing::two_block_model();
        let solvars = vec![fix.pricing[0], fix.pricing[1]];
        let solvals = vec![2.0, 3.0];

        assert_eq!(
            generator_entry_sol(&model, &solvars, &solvals, fix.orig[0]),
            2.0
        );
        assert_eq!(
            generator_entry_sol(&model, &solvars, &solvals, fix.orig[2]),
            0.0
        );

        // original variables themselves are found as well
        let solvars = vec![fix.orig[1]];
        let solvals = vec![4.0];
        assert_eq!(
            generator_entry_sol(&model, &solvars, &solvals, fix.orig[1]),
            4.0
        );
    }

    #[test]
    fn index_set_is_the_union_of_generators() {
        let (mut model, fix) = testing::two_block_model();
        let m1 = testing::add_master_var(&mut model, 0, &[(fix.orig[0], 1.0)], 0.5);
        let m2 = testing::add_master_var(
            &mut model,
            0,
            &[(fix.orig[0], 2.0), (fix.orig[1], 1.0)],
            0.5,
        );

        let indexset = init_index_set(&model, &[m1, m2]);
        assert_eq!(indexset, vec![fix.orig[0], fix.orig[1]]);
    }

    #[test]
    fn fractionality_sums_fractional_parts() {
        let (mut model, fix) = testing::two_block_model();
        let m1 = testing::add_master_var(&mut model, 0, &[(fix.orig[0], 1.0)], 0.5);
        let m2 = testing::add_master_var(&mut model, 0, &[(fix.orig[1], 1.0)], 1.25);

        let frac = fractionality(&model, &[m1, m2]);
        assert!((frac - 0.75).abs() < 1e-9);
    }
}
