use crate::variable::VarId;

/// A raw solution of a pricing subproblem, as handed over by the host.
///
/// The variable/value list may be unsorted and may contain zeros; turning it
/// into a [`Column`](crate::col::Column) cleans it up.
#[derive(Debug, Clone)]
pub struct PricingSolution {
    /// Block (pricing problem) the solution belongs to.
    pub block: usize,
    /// Whether the solution is an unbounded ray instead of an extreme point.
    pub isray: bool,
    /// Objective value of the pricing problem for this solution.
    pub objval: f64,
    /// Nonzero variable assignments of the solution.
    pub vals: Vec<(VarId, f64)>,
}

impl PricingSolution {
    /// Creates a pricing solution from a raw assignment.
    pub fn new(block: usize, isray: bool, objval: f64, vals: Vec<(VarId, f64)>) -> Self {
        PricingSolution {
            block,
            isray,
            objval,
            vals,
        }
    }
}
