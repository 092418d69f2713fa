//! Shared fixtures for the crate's tests.

use crate::constraint::{ConsId, Constraint};
use crate::model::Model;
use crate::row::Row;
use crate::variable::{VarId, VarKind, VarType};

/// Handles into the model built by [`two_block_model`].
pub(crate) struct Fixture {
    /// Original variables; indices 0..3 live in block 0, 3..5 in block 1.
    pub orig: Vec<VarId>,
    /// Pricing copies aligned with `orig`.
    pub pricing: Vec<VarId>,
    /// Master constraints.
    pub conss: Vec<ConsId>,
}

/// Builds a small decomposed model: two blocks, five integer original
/// variables with pricing copies, and two master constraints.
pub(crate) fn two_block_model() -> (Model, Fixture) {
    let mut model = Model::new();
    let b0 = model.add_block(1);
    let b1 = model.add_block(1);

    let mut orig = Vec::new();
    let mut pricing = Vec::new();
    for (i, block) in [(0, b0), (1, b0), (2, b0), (3, b1), (4, b1)] {
        let x = model.add_original_var(
            &format!("x{}", i),
            1.0,
            0.0,
            10.0,
            VarType::Integer,
            block as i32,
        );
        let p = model.add_pricing_var(x, block);
        orig.push(x);
        pricing.push(p);
    }

    let mut orig0 = Constraint::new("demand", 2.0, f64::INFINITY);
    orig0.add_coef(orig[0], 1.0);
    orig0.add_coef(orig[1], 1.0);
    orig0.add_coef(orig[3], 1.0);
    let c0 = model.add_master_cons(Constraint::new("m_demand", 2.0, f64::INFINITY), orig0);

    let mut orig1 = Constraint::new("capacity", f64::NEG_INFINITY, 5.0);
    orig1.add_coef(orig[2], 1.0);
    orig1.add_coef(orig[4], 1.0);
    let c1 = model.add_master_cons(
        Constraint::new("m_capacity", f64::NEG_INFINITY, 5.0),
        orig1,
    );

    (
        model,
        Fixture {
            orig,
            pricing,
            conss: vec![c0, c1],
        },
    )
}

/// Adds a lifted original cut given by coefficients over original variables.
pub(crate) fn add_original_cut(
    model: &mut Model,
    coefs: &[(VarId, f64)],
    lhs: f64,
    rhs: f64,
) -> usize {
    let masterrow = Row::new("mastercut", lhs, rhs);
    let mut origrow = Row::new("origcut", lhs, rhs);
    for &(var, coef) in coefs {
        origrow.add_coef(var, coef);
    }
    model.add_original_cut(masterrow, origrow)
}

/// Adds a master variable generated by the column with the given original
/// values and sets its LP solution value.
pub(crate) fn add_master_var(
    model: &mut Model,
    block: i32,
    origvals: &[(VarId, f64)],
    solval: f64,
) -> VarId {
    let var = model.add_master_var_raw(
        &format!("mv{}", model.n_vars()),
        0.0,
        block,
        origvals.to_vec(),
    );
    model.set_sol_val(var, solval);
    var
}

/// Returns the kind-checked original values of a master variable.
#[allow(dead_code)]
pub(crate) fn origvals_of(model: &Model, var: VarId) -> Vec<(VarId, f64)> {
    match model.var(var).kind() {
        VarKind::Master { origvals, .. } => origvals.clone(),
        _ => Vec::new(),
    }
}
