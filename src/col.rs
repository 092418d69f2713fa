use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::mastercons::MasterConsStore;
use crate::model::Model;
use crate::solution::PricingSolution;
use crate::variable::{VarId, VarKind};

/// Grid used to bucket values for hashing; coarser than the comparison
/// epsilon so that equal columns land in the same bucket.
const HASH_BUCKET: f64 = 1e-6;

/// A column: a candidate master variable described by the nonzero assignment
/// of one pricing problem's solution.
///
/// After creation a column is immutable except for its caches (master and cut
/// coefficients), its reduced cost and its age.
#[derive(Debug, Clone)]
pub struct Column {
    pub(crate) block: usize,
    pub(crate) isray: bool,
    pub(crate) vars: Vec<VarId>,
    pub(crate) vals: Vec<f64>,
    pub(crate) inferred_vars: Vec<VarId>,
    pub(crate) inferred_vals: Vec<f64>,
    /// Positions in `vars` whose original variable is linking.
    pub(crate) linkvars: Vec<usize>,
    pub(crate) master_coefs: Vec<f64>,
    pub(crate) original_cut_coefs: Vec<f64>,
    pub(crate) separator_cut_coefs: Vec<f64>,
    pub(crate) redcost: f64,
    pub(crate) norm: f64,
    pub(crate) age: u32,
    /// Slot of the column in its owning pool, if pooled.
    pub(crate) pos: Option<usize>,
    pub(crate) initialized_coefs: bool,
}

impl Column {
    /// Creates a column from a raw `(var, value)` assignment.
    ///
    /// Near-integral values of integral variables are snapped, zeros are
    /// dropped, and the entries are partitioned into pricing variables and
    /// inferred coefficient variables, each sorted by variable identity.
    pub fn new(
        model: &Model,
        block: usize,
        entries: &[(VarId, f64)],
        isray: bool,
        redcost: f64,
    ) -> Self {
        let mut vars: Vec<(VarId, f64)> = Vec::with_capacity(entries.len());
        let mut inferred: Vec<(VarId, f64)> = Vec::new();

        for &(var, raw) in entries {
            let v = model.var(var);
            let mut val = raw;
            if v.var_type().is_integral() && model.is_feas_integral(val) {
                val = model.round(val);
            }
            if model.is_zero(val) {
                continue;
            }
            match v.kind() {
                VarKind::InferredPricing { coefvar: true, .. } => inferred.push((var, val)),
                VarKind::Pricing { .. } => vars.push((var, val)),
                _ => {}
            }
        }

        vars.sort_by_key(|(v, _)| *v);
        inferred.sort_by_key(|(v, _)| *v);

        debug_assert!(vars.windows(2).all(|w| w[0].0 < w[1].0));
        debug_assert!(inferred.windows(2).all(|w| w[0].0 < w[1].0));

        let (vars, vals) = vars.into_iter().unzip();
        let (inferred_vars, inferred_vals) = inferred.into_iter().unzip();

        Column {
            block,
            isray,
            vars,
            vals,
            inferred_vars,
            inferred_vals,
            linkvars: Vec::new(),
            master_coefs: Vec::new(),
            original_cut_coefs: Vec::new(),
            separator_cut_coefs: Vec::new(),
            redcost,
            norm: 0.0,
            age: 0,
            pos: None,
            initialized_coefs: false,
        }
    }

    /// Creates a column from a pricing subproblem solution.
    pub fn from_solution(model: &Model, sol: &PricingSolution, redcost: f64) -> Self {
        Column::new(model, sol.block, &sol.vals, sol.isray, redcost)
    }

    /// Returns the pricing problem index of the column.
    pub fn block(&self) -> usize {
        self.block
    }

    /// Returns whether the column is a ray.
    pub fn is_ray(&self) -> bool {
        self.isray
    }

    /// Returns the pricing variables of the column.
    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    /// Returns the values belonging to [`vars`](Column::vars).
    pub fn vals(&self) -> &[f64] {
        &self.vals
    }

    /// Returns the inferred coefficient pricing variables of the column.
    pub fn inferred_vars(&self) -> &[VarId] {
        &self.inferred_vars
    }

    /// Returns the values belonging to [`inferred_vars`](Column::inferred_vars).
    pub fn inferred_vals(&self) -> &[f64] {
        &self.inferred_vals
    }

    /// Returns the reduced cost of the column.
    pub fn redcost(&self) -> f64 {
        self.redcost
    }

    /// Returns the age of the column.
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Returns the cached norm of the column.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    /// Returns the cached master coefficients of the column.
    pub fn master_coefs(&self) -> &[f64] {
        &self.master_coefs
    }

    /// Returns the cached coefficients against the lifted original cuts.
    pub fn original_cut_coefs(&self) -> &[f64] {
        &self.original_cut_coefs
    }

    /// Returns the cached coefficients against the active separator cuts.
    pub fn separator_cut_coefs(&self) -> &[f64] {
        &self.separator_cut_coefs
    }

    /// Returns whether the master coefficients have been initialized.
    pub fn initialized_coefs(&self) -> bool {
        self.initialized_coefs
    }

    /// Returns the solution value of a variable in the column, 0 if the
    /// variable does not appear. `O(log n)` on the sorted arrays.
    pub fn sol_val(&self, var: VarId) -> f64 {
        if let Ok(pos) = self.vars.binary_search(&var) {
            return self.vals[pos];
        }
        if let Ok(pos) = self.inferred_vars.binary_search(&var) {
            return self.inferred_vals[pos];
        }
        0.0
    }

    /// Compares two columns for equality: same block, same ray flag and the
    /// same sorted variable/value arrays under the given epsilon.
    pub fn eq_with(&self, other: &Column, eps: f64) -> bool {
        if self.block != other.block
            || self.isray != other.isray
            || self.vars.len() != other.vars.len()
            || self.inferred_vars.len() != other.inferred_vars.len()
        {
            return false;
        }
        for i in 0..self.vars.len() {
            if self.vars[i] != other.vars[i] || (self.vals[i] - other.vals[i]).abs() >= eps {
                return false;
            }
        }
        for i in 0..self.inferred_vars.len() {
            if self.inferred_vars[i] != other.inferred_vars[i]
                || (self.inferred_vals[i] - other.inferred_vals[i]).abs() >= eps
            {
                return false;
            }
        }
        true
    }

    /// Returns a hash key consistent with [`eq_with`](Column::eq_with):
    /// block, length, ray flag, minimal/maximal variable identity and the
    /// bucketed first/last values enter the key.
    pub fn hash_key(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.block.hash(&mut hasher);
        self.vars.len().hash(&mut hasher);
        self.isray.hash(&mut hasher);
        if let (Some(first), Some(last)) = (self.vars.first(), self.vars.last()) {
            first.hash(&mut hasher);
            last.hash(&mut hasher);
            bucket(self.vals[0]).hash(&mut hasher);
            bucket(self.vals[self.vals.len() - 1]).hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Updates the reduced cost; with `grow_old`, ages the column by one if
    /// the reduced cost is non-negative and resets the age otherwise.
    pub fn update_redcost(&mut self, model: &Model, redcost: f64, grow_old: bool) {
        self.redcost = redcost;
        if !grow_old {
            return;
        }
        if !model.is_negative(redcost) {
            self.age += 1;
        } else {
            self.age = 0;
        }
    }

    /// Returns whether the column's age exceeds the age limit; a limit of
    /// `-1` disables aging.
    pub fn is_aged(&self, age_limit: i64) -> bool {
        age_limit >= 0 && i64::from(self.age) > age_limit
    }

    /// Stores the master coefficients of the column. One-time write.
    pub fn set_master_coefs(&mut self, coefs: Vec<f64>) {
        debug_assert!(self.master_coefs.is_empty());
        self.master_coefs = coefs;
    }

    /// Stores the positions of linking variables in the column.
    pub fn set_linkvars(&mut self, linkvars: Vec<usize>) {
        debug_assert!(self.linkvars.is_empty());
        self.linkvars = linkvars;
    }

    /// Appends coefficients against newly lifted original cuts. Append-only.
    pub fn append_original_cut_coefs(&mut self, coefs: &[f64]) {
        self.original_cut_coefs.extend_from_slice(coefs);
    }

    /// Appends coefficients against newly separated master cuts. Append-only.
    pub fn append_separator_cut_coefs(&mut self, coefs: &[f64]) {
        self.separator_cut_coefs.extend_from_slice(coefs);
    }

    /// Marks the master coefficients as initialized.
    pub fn set_initialized_coefs(&mut self) {
        debug_assert!(!self.initialized_coefs);
        self.initialized_coefs = true;
    }

    /// Computes the master coefficients, linking positions and original-cut
    /// coefficients of the column against the current master problem.
    ///
    /// The first call initializes the coefficients; later calls only append
    /// coefficients for cuts separated since, so the pass is idempotent for
    /// an unchanged master.
    pub fn compute_master_coefs(&mut self, model: &Model) {
        if !self.initialized_coefs {
            let mut coefs = vec![0.0; model.n_master_conss()];
            for (i, coef) in coefs.iter_mut().enumerate() {
                let orig = model.orig_master_cons(i);
                for &(origvar, conscoef) in orig.coefs() {
                    if model.var(origvar).block() != self.block as i32 {
                        continue;
                    }
                    if let Some(pricingvar) = model.pricing_var_of(origvar) {
                        *coef += conscoef * self.sol_val(pricingvar);
                    }
                }
            }
            self.set_master_coefs(coefs);

            let mut linkvars = Vec::new();
            for (pos, &var) in self.vars.iter().enumerate() {
                if let Some(origvar) = model.orig_var_of(var) {
                    if let VarKind::Original { linking: true, .. } = model.var(origvar).kind() {
                        linkvars.push(pos);
                    }
                }
            }
            self.set_linkvars(linkvars);
            self.set_initialized_coefs();
        }

        // coefficients for cuts lifted after the last call
        let known = self.original_cut_coefs.len();
        let mut newcoefs = Vec::new();
        for i in known..model.n_original_cuts() {
            let origrow = model.original_cut_orig_row(i);
            let mut coef = 0.0;
            for &(origvar, rowcoef) in origrow.coefs() {
                if model.var(origvar).block() != self.block as i32 {
                    continue;
                }
                if let Some(pricingvar) = model.pricing_var_of(origvar) {
                    coef += rowcoef * self.sol_val(pricingvar);
                }
            }
            newcoefs.push(coef);
        }
        self.append_original_cut_coefs(&newcoefs);
    }

    /// Recomputes the norm of the column over its master coefficients, cut
    /// coefficients, inferred coefficients, linking positions and the
    /// convexity entry. Call after the coefficient caches are settled.
    pub fn compute_norm(&mut self, model: &Model) {
        let mut sqnorm = 0.0;
        for &coef in &self.master_coefs {
            if !model.is_zero(coef) {
                sqnorm += coef * coef;
            }
        }
        for &coef in &self.original_cut_coefs {
            if !model.is_zero(coef) {
                sqnorm += coef * coef;
            }
        }
        for &coef in &self.separator_cut_coefs {
            if !model.is_zero(coef) {
                sqnorm += coef * coef;
            }
        }
        for &val in &self.inferred_vals {
            sqnorm += val * val;
        }
        for &pos in &self.linkvars {
            let val = self.vals[pos];
            if !model.is_zero(val) {
                sqnorm += val * val;
            }
        }
        // convexity entry
        sqnorm += 1.0;
        self.norm = sqnorm.sqrt();
    }

    /// Computes the parallelism of the column to the dual objective.
    pub fn compute_dual_obj_para(&self, model: &Model, store: &MasterConsStore) -> f64 {
        let mut para = 0.0;
        let mut dualobjnorm = 0.0;

        for (i, &coef) in self.master_coefs.iter().enumerate() {
            let cons = model.master_cons_at(i);
            let (lhs, rhs) = (cons.lhs(), cons.rhs());
            if !model.is_infinity(-lhs) {
                dualobjnorm += lhs * lhs;
                if model.is_positive(coef) {
                    para += coef * lhs;
                }
            } else if !model.is_infinity(rhs) {
                dualobjnorm += rhs * rhs;
                if model.is_negative(coef) {
                    para += coef * rhs;
                }
            }
        }

        for (i, &coef) in self.original_cut_coefs.iter().enumerate() {
            let row = model.original_cut_master_row(i);
            if !row.is_in_lp() {
                continue;
            }
            let (lhs, rhs) = (row.lhs(), row.rhs());
            if !model.is_infinity(-lhs) {
                dualobjnorm += lhs * lhs;
                if model.is_positive(coef) {
                    para += coef * lhs;
                }
            } else if !model.is_infinity(rhs) {
                dualobjnorm += rhs * rhs;
                if model.is_negative(coef) {
                    para += coef * rhs;
                }
            }
        }

        for (i, &var) in self.inferred_vars.iter().enumerate() {
            let coef = self.inferred_vals[i];
            if let Some(mc) = model.var(var).inferred_mastercons() {
                let lhs = store.lhs(model, mc);
                let rhs = store.rhs(model, mc);
                if !model.is_infinity(-lhs) {
                    dualobjnorm += lhs * lhs;
                    if model.is_positive(coef) {
                        para += coef * lhs;
                    }
                } else if !model.is_infinity(rhs) {
                    dualobjnorm += rhs * rhs;
                    if model.is_positive(coef) {
                        para += coef * rhs;
                    }
                }
            }
        }

        for block in 0..model.n_blocks() {
            let k = model.n_identical_blocks(block) as f64;
            dualobjnorm += k * k;
        }
        let k = model.n_identical_blocks(self.block) as f64;
        para += k * k;

        let dualobjnorm = dualobjnorm.sqrt();
        debug_assert!(model.is_positive(dualobjnorm));
        debug_assert!(model.is_positive(self.norm));

        para / (dualobjnorm * self.norm)
    }

    /// Computes the orthogonality of two columns over their coefficient
    /// caches, inferred coefficients and linking positions.
    pub fn orth(model: &Model, col1: &Column, col2: &Column) -> f64 {
        let mut para = 0.0;
        let mut norm1 = 0.0;
        let mut norm2 = 0.0;

        let n = col1.master_coefs.len().min(col2.master_coefs.len());
        for i in 0..n {
            let (a, b) = (col1.master_coefs[i], col2.master_coefs[i]);
            if model.is_positive(a * b) {
                para += a * b;
            }
            if model.is_positive(a) {
                norm1 += a * a;
            }
            if model.is_positive(b) {
                norm2 += b * b;
            }
        }

        let n = col1
            .original_cut_coefs
            .len()
            .min(col2.original_cut_coefs.len());
        for i in 0..n {
            let (a, b) = (col1.original_cut_coefs[i], col2.original_cut_coefs[i]);
            if model.is_positive(a * b) {
                para += a * b;
            }
            if model.is_positive(a) {
                norm1 += a * a;
            }
            if model.is_positive(b) {
                norm2 += b * b;
            }
        }

        let n = col1
            .separator_cut_coefs
            .len()
            .min(col2.separator_cut_coefs.len());
        for i in 0..n {
            let (a, b) = (col1.separator_cut_coefs[i], col2.separator_cut_coefs[i]);
            if model.is_positive(a * b) {
                para += a * b;
            }
            if model.is_positive(a) {
                norm1 += a * a;
            }
            if model.is_positive(b) {
                norm2 += b * b;
            }
        }

        // merge walk over the sorted inferred arrays
        let (mut i, mut j) = (0, 0);
        while i < col1.inferred_vars.len() || j < col2.inferred_vars.len() {
            if i < col1.inferred_vars.len()
                && j < col2.inferred_vars.len()
                && col1.inferred_vars[i] == col2.inferred_vars[j]
            {
                let (a, b) = (col1.inferred_vals[i], col2.inferred_vals[j]);
                if model.is_positive(a * b) {
                    para += a * b;
                }
                if model.is_positive(a) {
                    norm1 += a * a;
                }
                if model.is_positive(b) {
                    norm2 += b * b;
                }
                i += 1;
                j += 1;
            } else if i < col1.inferred_vars.len()
                && (j >= col2.inferred_vars.len()
                    || col1.inferred_vars[i] < col2.inferred_vars[j])
            {
                if model.is_positive(col1.inferred_vals[i]) {
                    norm1 += col1.inferred_vals[i] * col1.inferred_vals[i];
                }
                i += 1;
            } else {
                if model.is_positive(col2.inferred_vals[j]) {
                    norm2 += col2.inferred_vals[j] * col2.inferred_vals[j];
                }
                j += 1;
            }
        }

        for &p1 in &col1.linkvars {
            let (var1, val1) = (col1.vars[p1], col1.vals[p1]);
            norm1 += val1 * val1;
            for &p2 in &col2.linkvars {
                if col2.vars[p2] == var1 {
                    para += val1 * col2.vals[p2];
                    break;
                }
            }
        }
        for &p2 in &col2.linkvars {
            let val2 = col2.vals[p2];
            norm2 += val2 * val2;
        }

        let norm1 = norm1.sqrt();
        let norm2 = norm2.sqrt();
        if !model.is_positive(norm1) || !model.is_positive(norm2) {
            return 1.0;
        }

        1.0 - para / (norm1 * norm2)
    }

    /// Compares two columns by non-decreasing reduced cost.
    pub fn cmp_redcost(a: &Column, b: &Column) -> Ordering {
        a.redcost.partial_cmp(&b.redcost).unwrap_or(Ordering::Equal)
    }

    /// Compares two columns by non-increasing age.
    pub fn cmp_age(a: &Column, b: &Column) -> Ordering {
        b.age.cmp(&a.age)
    }
}

fn bucket(val: f64) -> i64 {
    (val / HASH_BUCKET).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn construction_sorts_snaps_and_drops() {
        let (model, fix) = testing::two_block_model();
        let entries = vec![
            (fix.pricing[1], 2.0000000001),
            (fix.pricing[0], 1.0),
            (fix.pricing[2], 1e-12),
        ];
        let col = Column::new(&model, 0, &entries, false, -1.0);
        assert_eq!(col.vars(), &[fix.pricing[0], fix.pricing[1]]);
        assert_eq!(col.vals(), &[1.0, 2.0]);
        assert!(col.inferred_vars().is_empty());
        assert!(!col.is_ray());
        assert_eq!(col.sol_val(fix.pricing[2]), 0.0);
        assert_eq!(col.sol_val(fix.pricing[1]), 2.0);
    }

    #[test]
    fn equality_and_hash_are_consistent() {
        let (model, fix) = testing::two_block_model();
        let a = Column::new(
            &model,
            0,
            &[(fix.pricing[0], 1.0), (fix.pricing[1], 1.0)],
            false,
            -1.0,
        );
        let b = Column::new(
            &model,
            0,
            &[(fix.pricing[1], 1.0 + 1e-12), (fix.pricing[0], 1.0)],
            false,
            0.5,
        );
        let c = Column::new(&model, 0, &[(fix.pricing[0], 1.0)], false, -1.0);

        assert!(a.eq_with(&b, model.eps()));
        assert_eq!(a.hash_key(), b.hash_key());
        assert!(!a.eq_with(&c, model.eps()));
    }

    #[test]
    fn aging_follows_reduced_cost() {
        let (model, fix) = testing::two_block_model();
        let mut col = Column::new(&model, 0, &[(fix.pricing[0], 1.0)], false, 0.0);
        col.update_redcost(&model, 0.1, true);
        col.update_redcost(&model, 0.2, true);
        assert_eq!(col.age(), 2);
        col.update_redcost(&model, -0.5, true);
        assert_eq!(col.age(), 0);
        col.update_redcost(&model, 0.3, false);
        assert_eq!(col.age(), 0);
        assert!(!col.is_aged(-1));
        assert!(!col.is_aged(0));
        col.update_redcost(&model, 0.3, true);
        assert!(col.is_aged(0));
        assert!(!col.is_aged(2));
    }

    #[test]
    fn norm_includes_convexity_entry() {
        let (model, fix) = testing::two_block_model();
        let mut col = Column::new(&model, 0, &[(fix.pricing[0], 1.0)], false, 0.0);
        col.set_master_coefs(vec![3.0, 0.0]);
        col.set_initialized_coefs();
        col.compute_norm(&model);
        // sqrt(3^2 + 1)
        assert!((col.norm() - 10.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn orthogonality_of_identical_and_disjoint_columns() {
        let (model, fix) = testing::two_block_model();
        let mut a = Column::new(&model, 0, &[(fix.pricing[0], 1.0)], false, 0.0);
        a.set_master_coefs(vec![1.0, 0.0]);
        a.set_initialized_coefs();
        let mut b = a.clone();
        let mut c = Column::new(&model, 0, &[(fix.pricing[1], 1.0)], false, 0.0);
        c.set_master_coefs(vec![0.0, 1.0]);
        c.set_initialized_coefs();

        a.compute_norm(&model);
        b.compute_norm(&model);
        c.compute_norm(&model);

        assert!(Column::orth(&model, &a, &b).abs() < 1e-9);
        assert!((Column::orth(&model, &a, &c) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn comparators_order_by_redcost_and_age() {
        let (model, fix) = testing::two_block_model();
        let mut a = Column::new(&model, 0, &[(fix.pricing[0], 1.0)], false, -2.0);
        let mut b = Column::new(&model, 0, &[(fix.pricing[1], 1.0)], false, -5.0);
        a.update_redcost(&model, 1.0, true);
        a.update_redcost(&model, 1.0, true);
        b.update_redcost(&model, -5.0, true);

        let mut cols = vec![a.clone(), b.clone()];
        cols.sort_by(Column::cmp_redcost);
        assert_eq!(cols[0].redcost(), -5.0);

        cols.sort_by(Column::cmp_age);
        assert_eq!(cols[0].age(), 2);
    }

    #[test]
    fn dual_obj_parallelism_is_normalized() {
        let (model, fix) = testing::two_block_model();
        let store = crate::mastercons::MasterConsStore::new();

        let mut col = Column::new(&model, 0, &[(fix.pricing[0], 2.0)], false, 0.0);
        col.set_master_coefs(vec![2.0, 0.0]);
        col.set_initialized_coefs();
        col.compute_norm(&model);

        let para = col.compute_dual_obj_para(&model, &store);
        // sides entering the norm: demand lhs 2, capacity rhs 5, one
        // convexity entry per block; the column is parallel to the demand
        // side and its own convexity entry
        let expected = 5.0 / (31.0_f64.sqrt() * col.norm());
        assert!((para - expected).abs() < 1e-12);
    }

    #[test]
    fn master_coefs_are_computed_once_and_cuts_appended() {
        let (mut model, fix) = testing::two_block_model();
        let mut col = Column::new(
            &model,
            0,
            &[(fix.pricing[0], 2.0), (fix.pricing[1], 1.0)],
            false,
            0.0,
        );
        col.compute_master_coefs(&model);
        assert!(col.initialized_coefs());
        // cons0: x0 + x1 >= 2 restricted to block 0 entries
        assert_eq!(col.master_coefs()[0], 3.0);
        assert!(col.original_cut_coefs().is_empty());

        testing::add_original_cut(&mut model, &[(fix.orig[0], 1.0)], 1.0, f64::INFINITY);
        col.compute_master_coefs(&model);
        assert_eq!(col.original_cut_coefs(), &[2.0]);

        // idempotent for an unchanged master
        col.compute_master_coefs(&model);
        assert_eq!(col.master_coefs()[0], 3.0);
        assert_eq!(col.original_cut_coefs(), &[2.0]);
    }
}
