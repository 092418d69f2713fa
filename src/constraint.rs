use crate::variable::VarId;

/// Identity of a linear constraint in the master problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsId(pub(crate) usize);

impl ConsId {
    /// Returns the index of the constraint.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A linear constraint `lhs <= sum coefs <= rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub(crate) name: String,
    pub(crate) coefs: Vec<(VarId, f64)>,
    pub(crate) lhs: f64,
    pub(crate) rhs: f64,
    pub(crate) dual: f64,
    pub(crate) farkas: f64,
    pub(crate) active: bool,
}

impl Constraint {
    /// Creates a constraint with the given sides and no coefficients yet.
    pub fn new(name: impl Into<String>, lhs: f64, rhs: f64) -> Self {
        Constraint {
            name: name.into(),
            coefs: Vec::new(),
            lhs,
            rhs,
            dual: 0.0,
            farkas: 0.0,
            active: true,
        }
    }

    /// Returns the name of the constraint.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the left-hand side of the constraint.
    pub fn lhs(&self) -> f64 {
        self.lhs
    }

    /// Returns the right-hand side of the constraint.
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Returns the dual value of the constraint in the last LP.
    pub fn dual(&self) -> f64 {
        self.dual
    }

    /// Returns the Farkas multiplier of the constraint.
    pub fn farkas_dual(&self) -> f64 {
        self.farkas
    }

    /// Returns whether the constraint is active at the current node.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the nonzero coefficients of the constraint.
    pub fn coefs(&self) -> &[(VarId, f64)] {
        &self.coefs
    }

    /// Adds a coefficient for a variable, accumulating if one is present.
    pub fn add_coef(&mut self, var: VarId, coef: f64) {
        if let Some(entry) = self.coefs.iter_mut().find(|(v, _)| *v == var) {
            entry.1 += coef;
        } else {
            self.coefs.push((var, coef));
        }
    }

    /// Returns the coefficient of a variable in the constraint.
    pub fn coef_of(&self, var: VarId) -> f64 {
        self.coefs
            .iter()
            .find(|(v, _)| *v == var)
            .map(|(_, c)| *c)
            .unwrap_or(0.0)
    }
}

/// A linear constraint living in a pricing problem.
///
/// Pricing constraints carry their own identity so that the constraints an
/// extended master constraint injected can be removed again on undo.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingCons {
    pub(crate) id: usize,
    pub(crate) name: String,
    pub(crate) coefs: Vec<(VarId, f64)>,
    pub(crate) lhs: f64,
    pub(crate) rhs: f64,
}

impl PricingCons {
    /// Returns the name of the constraint.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the left-hand side of the constraint.
    pub fn lhs(&self) -> f64 {
        self.lhs
    }

    /// Returns the right-hand side of the constraint.
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Returns the nonzero coefficients of the constraint.
    pub fn coefs(&self) -> &[(VarId, f64)] {
        &self.coefs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulating_coefficients() {
        let mut cons = Constraint::new("conv", 1.0, 1.0);
        cons.add_coef(VarId(0), 1.0);
        cons.add_coef(VarId(1), 2.0);
        cons.add_coef(VarId(0), 0.5);
        assert_eq!(cons.coefs().len(), 2);
        assert_eq!(cons.coef_of(VarId(0)), 1.5);
        assert_eq!(cons.coef_of(VarId(2)), 0.0);
    }
}
