use tracing::debug;

use crate::col::Column;
use crate::mastercons::MasterConsStore;
use crate::model::Model;
use crate::params::PriceStoreSettings;
use crate::retcode::{Result, Retcode};
use crate::variable::VarId;

/// Per-round staging buffer deciding which columns enter the master LP.
///
/// Columns are committed in order of a composite score of reduced cost,
/// mutual orthogonality and (optionally) objective parallelism. Forced
/// columns occupy a prefix of the arrays and bypass all filtering.
#[derive(Debug)]
pub struct PriceStore {
    settings: PriceStoreSettings,
    cols: Vec<Column>,
    objparals: Vec<f64>,
    orthos: Vec<f64>,
    scores: Vec<f64>,
    nforced: usize,
    infarkas: bool,
    forcecols: bool,
    n_cols_found: u64,
    n_cols_found_round: u64,
    n_cols_applied: u64,
}

impl PriceStore {
    /// Creates an empty price store.
    pub fn new(settings: PriceStoreSettings) -> Self {
        PriceStore {
            settings,
            cols: Vec::new(),
            objparals: Vec::new(),
            orthos: Vec::new(),
            scores: Vec::new(),
            nforced: 0,
            infarkas: false,
            forcecols: false,
            n_cols_found: 0,
            n_cols_found_round: 0,
            n_cols_applied: 0,
        }
    }

    /// Returns the number of columns in the store.
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Returns the number of forced columns in the store.
    pub fn n_forced(&self) -> usize {
        self.nforced
    }

    /// Returns the columns in the store.
    pub fn cols(&self) -> &[Column] {
        &self.cols
    }

    /// Returns the total number of columns offered to the store.
    pub fn n_cols_found(&self) -> u64 {
        self.n_cols_found
    }

    /// Returns the number of columns offered in the current round.
    pub fn n_cols_found_round(&self) -> u64 {
        self.n_cols_found_round
    }

    /// Returns the total number of columns applied to the master.
    pub fn n_cols_applied(&self) -> u64 {
        self.n_cols_applied
    }

    /// Informs the store that Farkas pricing starts.
    pub fn start_farkas(&mut self) {
        debug_assert!(self.cols.is_empty());
        self.infarkas = true;
    }

    /// Informs the store that Farkas pricing is finished.
    pub fn end_farkas(&mut self) {
        debug_assert!(self.cols.is_empty());
        self.infarkas = false;
    }

    /// Informs the store that the following columns should enter the master
    /// in any case.
    pub fn start_force_cols(&mut self) {
        debug_assert!(!self.forcecols);
        self.forcecols = true;
    }

    /// Informs the store that columns are no longer forced.
    pub fn end_force_cols(&mut self) {
        debug_assert!(self.forcecols);
        self.forcecols = false;
    }

    fn ensure_cols_mem(&mut self, model: &Model, num: usize) -> Result<()> {
        if num > self.cols.capacity() {
            let newsize = model.calc_grow_size(num)?;
            let extra = newsize - self.cols.len();
            self.cols.reserve_exact(extra);
            self.objparals.reserve_exact(extra);
            self.orthos.reserve_exact(extra);
            self.scores.reserve_exact(extra);
        }
        Ok(())
    }

    /// Adds a column to the store. In Farkas or force mode, and with
    /// `force`, the column is marked forced: it gets an infinite score and
    /// is placed into the forced prefix.
    pub fn add_col(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        col: Column,
        force: bool,
    ) -> Result<()> {
        if col.pos.is_some() {
            return Err(Retcode::invalid_data("column is still owned by a pool"));
        }
        let forced = force || self.infarkas || self.forcecols;

        self.n_cols_found += 1;
        self.n_cols_found_round += 1;
        self.ensure_cols_mem(model, self.cols.len() + 1)?;

        let (score, objparal) = if forced {
            (f64::INFINITY, 1.0)
        } else {
            // the parallelism to the dual objective is constant throughout
            // the filtering; no need to calculate it while its weight is zero
            let objparal = if self.settings.w_obj > 0.0 {
                col.compute_dual_obj_para(model, store)
            } else {
                0.0
            };
            (
                self.settings.w_redcost * -col.redcost()
                    + self.settings.w_obj * objparal
                    + self.settings.w_ortho,
                objparal,
            )
        };

        debug!(
            ncols = self.cols.len(),
            forced, "adding col to the price store"
        );

        self.cols.push(col);
        self.objparals.push(objparal);
        self.orthos.push(1.0);
        self.scores.push(score);

        if forced {
            // make room at the start of the arrays by moving the first
            // non-forced entry to the tail
            let tail = self.cols.len() - 1;
            let pos = self.nforced;
            self.cols.swap(pos, tail);
            self.objparals.swap(pos, tail);
            self.orthos.swap(pos, tail);
            self.scores.swap(pos, tail);
            self.nforced += 1;
        }
        Ok(())
    }

    /// Removes a non-forced column, swapping the last entry into its slot.
    fn del_at(&mut self, pos: usize) -> Column {
        debug_assert!(self.nforced <= pos && pos < self.cols.len());
        self.objparals.swap_remove(pos);
        self.orthos.swap_remove(pos);
        self.scores.swap_remove(pos);
        self.cols.swap_remove(pos)
    }

    fn compute_score(&mut self, pos: usize) {
        let efficacy = -self.cols[pos].redcost();
        self.scores[pos] = self.settings.w_redcost * efficacy
            + self.settings.w_obj * self.objparals[pos]
            + self.settings.w_ortho;
        self.orthos[pos] = 1.0;
    }

    fn best_col(&self) -> Option<usize> {
        let mut best = None;
        let mut bestscore = f64::NEG_INFINITY;
        for pos in self.nforced..self.cols.len() {
            debug_assert!(self.scores[pos].is_finite());
            if self.scores[pos] > bestscore {
                bestscore = self.scores[pos];
                best = Some(pos);
            }
        }
        best
    }

    /// Commits a column to the master and rescores the remaining non-forced
    /// entries against it; entries falling below the minimal orthogonality
    /// are dropped.
    fn apply_col(
        &mut self,
        model: &mut Model,
        col: &Column,
        minortho: f64,
        added: &mut Vec<VarId>,
    ) {
        let var = model.add_master_var_from_col(col);
        added.push(var);
        self.n_cols_applied += 1;

        let mut pos = self.nforced;
        while pos < self.cols.len() {
            let thisortho = Column::orth(model, col, &self.cols[pos]);
            if thisortho < self.orthos[pos] {
                if thisortho < minortho {
                    debug!(pos, thisortho, "deleting parallel col");
                    let _ = self.del_at(pos);
                    continue;
                }
                self.orthos[pos] = thisortho;
                self.scores[pos] = self.settings.w_redcost * -self.cols[pos].redcost()
                    + self.settings.w_obj * self.objparals[pos]
                    + self.settings.w_ortho * thisortho;
            }
            pos += 1;
        }
    }

    /// Applies the stored columns to the master LP in descending score order
    /// and clears the store. Returns the master variables that were created.
    pub fn apply_cols(&mut self, model: &mut Model) -> Result<Vec<VarId>> {
        debug!(ncols = self.cols.len(), "applying cols");
        let maxcols = if self.infarkas {
            self.settings.max_cols_farkas
        } else if model.is_root_node() {
            self.settings.max_cols_root
        } else {
            self.settings.max_cols
        };
        let minortho = self.settings.min_col_ortho.max(model.eps());
        let mut added = Vec::new();

        // fresh scores and orthogonalities for the current LP solution
        for pos in self.nforced..self.cols.len() {
            self.compute_score(pos);
        }

        for pos in 0..self.nforced {
            debug_assert!(self.scores[pos].is_infinite());
            let col = self.cols[pos].clone();
            debug!(pos, "applying forced col");
            self.apply_col(model, &col, minortho, &mut added);
        }

        while added.len() < maxcols && self.cols.len() > self.nforced {
            let bestpos = match self.best_col() {
                Some(pos) => pos,
                None => break,
            };
            let col = self.del_at(bestpos);

            // do not add non-violated columns
            if self.infarkas || model.is_dualfeas_negative(col.redcost()) {
                self.apply_col(model, &col, minortho, &mut added);
            }
        }

        self.clear_cols();
        Ok(added)
    }

    /// Clears the store without applying the columns.
    pub fn clear_cols(&mut self) {
        debug!(ncols = self.cols.len(), "clearing the price store");
        self.cols.clear();
        self.objparals.clear();
        self.orthos.clear();
        self.scores.clear();
        self.nforced = 0;
        self.n_cols_found_round = 0;

        // after constructing the initial LP the potentially large arrays are
        // released
        if self.infarkas {
            self.cols = Vec::new();
            self.objparals = Vec::new();
            self.orthos = Vec::new();
            self.scores = Vec::new();
        }
    }

    /// Removes every non-forced column whose reduced cost is not strictly
    /// dual-feasibly negative.
    pub fn remove_inefficacious(&mut self, model: &Model) {
        let mut cnt = 0;
        let mut pos = self.nforced;
        while pos < self.cols.len() {
            if !model.is_dualfeas_negative(self.cols[pos].redcost()) {
                let _ = self.del_at(pos);
                cnt += 1;
            } else {
                pos += 1;
            }
        }
        debug!(cnt, "removed inefficacious cols");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn col_with(
        model: &Model,
        entries: &[(crate::variable::VarId, f64)],
        mastercoefs: Vec<f64>,
        redcost: f64,
    ) -> Column {
        let mut col = Column::new(model, 0, entries, false, redcost);
        col.set_master_coefs(mastercoefs);
        col.set_initialized_coefs();
        col.compute_norm(model);
        col
    }

    #[test]
    fn apply_commits_in_descending_score_order() {
        // three mutually orthogonal columns with redcosts -3, -2, -1
        let (mut model, fix) = testing::two_block_model();
        let mut store = PriceStore::new(PriceStoreSettings::default());
        let emcs = MasterConsStore::new();
        let nvars = model.n_vars();

        let a = col_with(&model, &[(fix.pricing[0], 1.0)], vec![1.0, 0.0], -3.0);
        let b = col_with(&model, &[(fix.pricing[1], 1.0)], vec![0.0, 1.0], -2.0);
        let c = col_with(&model, &[(fix.pricing[2], 2.0)], vec![0.0, 0.0], -1.0);

        store.add_col(&model, &emcs, c.clone(), false).unwrap();
        store.add_col(&model, &emcs, a.clone(), false).unwrap();
        store.add_col(&model, &emcs, b.clone(), false).unwrap();
        assert_eq!(store.n_cols_found_round(), 3);

        let added = store.apply_cols(&mut model).unwrap();
        assert_eq!(added.len(), 3);
        assert!(store.is_empty());
        assert_eq!(model.n_vars(), nvars + 3);
        assert_eq!(store.n_cols_applied(), 3);

        // commit order follows the score, i.e. the reduced costs
        assert_eq!(model.generator_entry(added[0], fix.orig[0]), 1.0);
        assert_eq!(model.generator_entry(added[1], fix.orig[1]), 1.0);
        assert_eq!(model.generator_entry(added[2], fix.orig[2]), 2.0);
    }

    #[test]
    fn forced_cols_occupy_the_prefix_and_skip_filtering() {
        let (mut model, fix) = testing::two_block_model();
        let mut store = PriceStore::new(PriceStoreSettings::default());
        let emcs = MasterConsStore::new();

        let plain = col_with(&model, &[(fix.pricing[0], 1.0)], vec![1.0, 0.0], -1.0);
        let forced = col_with(&model, &[(fix.pricing[1], 1.0)], vec![0.0, 1.0], 5.0);

        store.add_col(&model, &emcs, plain, false).unwrap();
        store.add_col(&model, &emcs, forced, true).unwrap();

        assert_eq!(store.n_forced(), 1);
        assert!(store.scores[0].is_infinite());
        assert!(store.scores[1].is_finite());

        // the forced column enters the master despite its positive redcost
        let added = store.apply_cols(&mut model).unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(model.generator_entry(added[0], fix.orig[1]), 1.0);
    }

    #[test]
    fn parallel_columns_are_filtered() {
        let (mut model, fix) = testing::two_block_model();
        let mut settings = PriceStoreSettings::default();
        settings.min_col_ortho = 0.5;
        let mut store = PriceStore::new(settings);
        let emcs = MasterConsStore::new();

        let a = col_with(&model, &[(fix.pricing[0], 1.0)], vec![1.0, 0.0], -3.0);
        // same support as a, only scaled: orthogonality 0
        let b = col_with(&model, &[(fix.pricing[0], 2.0)], vec![2.0, 0.0], -2.0);

        store.add_col(&model, &emcs, a, false).unwrap();
        store.add_col(&model, &emcs, b, false).unwrap();

        let added = store.apply_cols(&mut model).unwrap();
        assert_eq!(added.len(), 1);
    }

    #[test]
    fn objective_parallelism_enters_the_score() {
        // score by parallelism alone: the column aligned with the dual
        // objective wins although it was added last
        let (mut model, fix) = testing::two_block_model();
        let mut settings = PriceStoreSettings::default();
        settings.w_redcost = 0.0;
        settings.w_ortho = 0.0;
        settings.w_obj = 1.0;
        let mut store = PriceStore::new(settings);
        let emcs = MasterConsStore::new();

        let aligned = col_with(&model, &[(fix.pricing[0], 2.0)], vec![2.0, 0.0], -1.0);
        let askew = col_with(&model, &[(fix.pricing[1], 1.0)], vec![0.0, 0.0], -1.0);

        store.add_col(&model, &emcs, askew, false).unwrap();
        store.add_col(&model, &emcs, aligned, false).unwrap();

        assert!(store.objparals[1] > store.objparals[0]);
        assert!(store.objparals[0] > 0.0);

        let added = store.apply_cols(&mut model).unwrap();
        assert_eq!(added.len(), 2);
        assert_eq!(model.generator_entry(added[0], fix.orig[0]), 2.0);
        assert_eq!(model.generator_entry(added[1], fix.orig[1]), 1.0);
    }

    #[test]
    fn max_cols_bounds_the_number_of_applied_columns() {
        let (mut model, fix) = testing::two_block_model();
        let mut settings = PriceStoreSettings::default();
        settings.max_cols = 1;
        settings.max_cols_root = 1;
        let mut store = PriceStore::new(settings);
        let emcs = MasterConsStore::new();

        let a = col_with(&model, &[(fix.pricing[0], 1.0)], vec![1.0, 0.0], -3.0);
        let b = col_with(&model, &[(fix.pricing[1], 1.0)], vec![0.0, 1.0], -2.0);
        store.add_col(&model, &emcs, a, false).unwrap();
        store.add_col(&model, &emcs, b, false).unwrap();

        let added = store.apply_cols(&mut model).unwrap();
        assert_eq!(added.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn remove_inefficacious_drops_nonnegative_entries() {
        let (model, fix) = testing::two_block_model();
        let mut store = PriceStore::new(PriceStoreSettings::default());
        let emcs = MasterConsStore::new();

        let neg = col_with(&model, &[(fix.pricing[0], 1.0)], vec![1.0, 0.0], -1.0);
        let pos = col_with(&model, &[(fix.pricing[1], 1.0)], vec![0.0, 1.0], 0.5);
        store.add_col(&model, &emcs, neg, false).unwrap();
        store.add_col(&model, &emcs, pos, false).unwrap();

        store.remove_inefficacious(&model);
        assert_eq!(store.len(), 1);
        assert!(store.cols()[0].redcost() < 0.0);
    }

    #[test]
    fn farkas_round_trip_resets_counters_and_capacity() {
        let (mut model, fix) = testing::two_block_model();
        let mut store = PriceStore::new(PriceStoreSettings::default());
        let emcs = MasterConsStore::new();

        store.start_farkas();
        let col = col_with(&model, &[(fix.pricing[0], 1.0)], vec![1.0, 0.0], 0.0);
        // in Farkas mode every column is forced
        store.add_col(&model, &emcs, col, false).unwrap();
        assert_eq!(store.n_forced(), 1);

        let added = store.apply_cols(&mut model).unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(store.len(), 0);
        assert_eq!(store.cols.capacity(), 0);
        assert_eq!(store.n_cols_found_round(), 0);
        store.end_farkas();

        store.start_farkas();
        store.end_farkas();
        assert_eq!(store.n_cols_found(), 1);
    }
}
