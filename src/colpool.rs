use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::col::Column;
use crate::mastercons::MasterConsStore;
use crate::model::Model;
use crate::pricestore::PriceStore;
use crate::pricingtype::{compute_redcost, PricingType, Stopwatch};
use crate::retcode::{Result, Retcode};

/// Deduplicating cache of priced columns, valid at a single branch-and-bound
/// node.
///
/// Membership is `O(1)` against column equality via a hash index; columns age
/// whenever a pricing pass finds them non-negative and are evicted past the
/// age limit.
#[derive(Debug)]
pub struct ColPool {
    cols: Vec<Column>,
    hash_index: HashMap<u64, Vec<usize>>,
    node: i64,
    age_limit: i64,
    infarkas: bool,
    max_n_cols: usize,
    n_calls: u64,
    n_cols_found: u64,
    clock: Stopwatch,
}

impl ColPool {
    /// Creates an empty pool with the given age limit (`-1` disables aging).
    pub fn new(age_limit: i64) -> Self {
        debug_assert!(age_limit >= -1);
        ColPool {
            cols: Vec::new(),
            hash_index: HashMap::new(),
            node: -1,
            age_limit,
            infarkas: false,
            max_n_cols: 0,
            n_calls: 0,
            n_cols_found: 0,
            clock: Stopwatch::default(),
        }
    }

    /// Returns the number of columns in the pool.
    pub fn len(&self) -> usize {
        self.cols.len()
    }

    /// Returns whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }

    /// Returns the columns in the pool.
    pub fn cols(&self) -> &[Column] {
        &self.cols
    }

    /// Returns the maximum number of columns the pool held at the same time.
    pub fn max_n_cols(&self) -> usize {
        self.max_n_cols
    }

    /// Returns how often the pool was priced.
    pub fn n_calls(&self) -> u64 {
        self.n_calls
    }

    /// Returns the number of columns handed to the price store by the last
    /// pricing pass.
    pub fn n_cols_found(&self) -> u64 {
        self.n_cols_found
    }

    /// Returns the time spent pricing the pool.
    pub fn time(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Returns the node the pool is valid for, `-1` before first use.
    pub fn node(&self) -> i64 {
        self.node
    }

    /// Switches Farkas mode on or off.
    pub fn set_farkas(&mut self, infarkas: bool) {
        self.infarkas = infarkas;
    }

    /// Returns whether the pool is in Farkas mode.
    pub fn in_farkas(&self) -> bool {
        self.infarkas
    }

    /// Removes and drops every column.
    pub fn clear(&mut self) {
        debug!(ncols = self.cols.len(), "clearing col pool");
        for col in &mut self.cols {
            col.pos = None;
        }
        self.cols.clear();
        self.hash_index.clear();
    }

    /// Returns whether an equal column is in the pool.
    pub fn contains(&self, model: &Model, col: &Column) -> bool {
        self.find(model, col).is_some()
    }

    fn find(&self, model: &Model, col: &Column) -> Option<usize> {
        let key = col.hash_key();
        self.hash_index.get(&key).and_then(|bucket| {
            bucket
                .iter()
                .copied()
                .find(|&pos| self.cols[pos].eq_with(col, model.eps()))
        })
    }

    fn ensure_cols_mem(&mut self, model: &Model, num: usize) -> Result<()> {
        if num > self.cols.capacity() {
            let newsize = model.calc_grow_size(num)?;
            self.cols.reserve_exact(newsize - self.cols.len());
        }
        Ok(())
    }

    /// Adds a column if no equal column is present. Returns the column back
    /// to the caller if it was a duplicate.
    pub fn add_col(&mut self, model: &Model, col: Column) -> Result<Option<Column>> {
        if self.find(model, &col).is_some() {
            return Ok(Some(col));
        }
        self.add_new_col(model, col)?;
        Ok(None)
    }

    /// Adds a column without a duplicate check; the caller guarantees
    /// uniqueness and that the column is not pooled elsewhere.
    pub fn add_new_col(&mut self, model: &Model, mut col: Column) -> Result<()> {
        if col.pos.is_some() {
            return Err(Retcode::invalid_data("column is already part of a pool"));
        }
        let pos = self.cols.len();
        self.ensure_cols_mem(model, pos + 1)?;
        col.pos = Some(pos);
        self.hash_index.entry(col.hash_key()).or_default().push(pos);
        self.cols.push(col);
        self.max_n_cols = self.max_n_cols.max(self.cols.len());
        Ok(())
    }

    /// Removes the column at the given slot, keeping the array dense and the
    /// hash index in sync.
    fn del_at(&mut self, pos: usize) -> Column {
        let last = self.cols.len() - 1;
        let key = self.cols[pos].hash_key();
        if let Some(bucket) = self.hash_index.get_mut(&key) {
            bucket.retain(|&p| p != pos);
            if bucket.is_empty() {
                self.hash_index.remove(&key);
            }
        }

        let mut col = self.cols.swap_remove(pos);
        col.pos = None;

        if pos != last {
            // repair the moved column's slot in the array and the index
            let movedkey = self.cols[pos].hash_key();
            if let Some(bucket) = self.hash_index.get_mut(&movedkey) {
                for p in bucket.iter_mut() {
                    if *p == last {
                        *p = pos;
                    }
                }
            }
            self.cols[pos].pos = Some(pos);
        }
        col
    }

    /// Removes a column equal to the given one from the pool and returns it.
    pub fn del_col(&mut self, model: &Model, col: &Column) -> Result<Column> {
        match self.find(model, col) {
            Some(pos) => Ok(self.del_at(pos)),
            None => Err(Retcode::invalid_data(
                "column does not exist in the col pool",
            )),
        }
    }

    /// Adopts the current node; on a node change the pool is cleared first.
    pub fn update_node(&mut self, model: &Model) {
        if self.node < 0 {
            self.node = model.current_node();
        } else if self.node != model.current_node() {
            self.clear();
            self.node = model.current_node();
        }
    }

    /// Recomputes the master coefficients and reduced cost of every stored
    /// column against the current duals. Columns do not age in this pass.
    pub fn update_redcost(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        pricing: &dyn PricingType,
    ) {
        for col in &mut self.cols {
            col.compute_master_coefs(model);
            col.compute_norm(model);
            let redcost = compute_redcost(model, store, pricing, col);
            col.update_redcost(model, redcost, false);
        }
    }

    /// Prices the pool: columns with strictly dual-feasibly negative reduced
    /// cost move to the price store, all others age and fall out of the pool
    /// past the age limit. Returns the number of columns found.
    pub fn price(
        &mut self,
        model: &Model,
        store: &MasterConsStore,
        pricestore: &mut PriceStore,
    ) -> Result<usize> {
        self.n_calls += 1;
        self.clock.start();
        let mut nfound = 0usize;

        for pos in (0..self.cols.len()).rev() {
            debug_assert_eq!(self.cols[pos].pos, Some(pos));
            let redcost = self.cols[pos].redcost();

            if model.is_dualfeas_negative(redcost) {
                debug!(pos, redcost, "moving col from the pool to the price store");
                let mut col = self.del_at(pos);
                col.age = 0;
                pricestore.add_col(model, store, col, false)?;
                nfound += 1;
            } else {
                self.cols[pos].age += 1;
                if self.cols[pos].is_aged(self.age_limit) {
                    let _ = self.del_at(pos);
                }
            }
        }

        self.n_cols_found = nfound as u64;
        self.clock.stop();
        Ok(nfound)
    }

    /// Drops every column whose pricing-variable values violate the current
    /// global bounds of the corresponding original variables.
    pub fn propagate_global_bounds(&mut self, model: &Model) {
        for pos in (0..self.cols.len()).rev() {
            let violated = {
                let col = &self.cols[pos];
                col.vars().iter().enumerate().any(|(i, &var)| {
                    let val = col.vals()[i];
                    match model.orig_var_of(var) {
                        Some(origvar) => {
                            let ov = model.var(origvar);
                            model.is_lt(val, ov.lb()) || model.is_gt(val, ov.ub())
                        }
                        None => false,
                    }
                })
            };
            if violated {
                let _ = self.del_at(pos);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PriceStoreSettings;
    use crate::pricingtype::ReducedCostPricing;
    use crate::testing;

    fn unit_col(model: &Model, vars: &[(crate::variable::VarId, f64)]) -> Column {
        Column::new(model, 0, vars, false, 0.0)
    }

    #[test]
    fn pool_deduplicates_and_ages() {
        // scenario: equal columns collapse, aging evicts past the limit
        let (mut model, fix) = testing::two_block_model();
        let mut pool = ColPool::new(2);
        let emcs = MasterConsStore::new();
        let pricing = ReducedCostPricing::default();
        let mut pricestore = PriceStore::new(PriceStoreSettings::default());

        let c1 = unit_col(&model, &[(fix.pricing[0], 1.0), (fix.pricing[1], 1.0)]);
        let c2 = unit_col(&model, &[(fix.pricing[0], 1.0), (fix.pricing[1], 1.0)]);
        let c3 = unit_col(&model, &[(fix.pricing[0], 1.0)]);

        assert!(pool.add_col(&model, c1).unwrap().is_none());
        assert!(pool.add_col(&model, c2).unwrap().is_some());
        assert_eq!(pool.len(), 1);
        assert!(pool.add_col(&model, c3).unwrap().is_none());
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.max_n_cols(), 2);

        // non-negative reduced cost: survive two passes, evicted on third
        model.set_cons_dual(fix.conss[0], -1.0);
        pool.update_redcost(&model, &emcs, &pricing);
        assert!(pool.cols().iter().all(|c| c.redcost() > 0.0));

        pool.price(&model, &emcs, &mut pricestore).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(pool.cols().iter().all(|c| c.age() == 1));
        pool.price(&model, &emcs, &mut pricestore).unwrap();
        assert_eq!(pool.len(), 2);
        pool.price(&model, &emcs, &mut pricestore).unwrap();
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.n_calls(), 3);
    }

    #[test]
    fn price_moves_negative_columns_to_the_store() {
        let (mut model, fix) = testing::two_block_model();
        let mut pool = ColPool::new(2);
        let emcs = MasterConsStore::new();
        let pricing = ReducedCostPricing::default();
        let mut pricestore = PriceStore::new(PriceStoreSettings::default());

        let col = unit_col(&model, &[(fix.pricing[0], 2.0)]);
        pool.add_col(&model, col).unwrap();

        // dual high enough to make the column attractive
        model.set_cons_dual(fix.conss[0], 10.0);
        pool.update_redcost(&model, &emcs, &pricing);
        let nfound = pool.price(&model, &emcs, &mut pricestore).unwrap();

        assert_eq!(nfound, 1);
        assert_eq!(pool.n_cols_found(), 1);
        assert!(pool.is_empty());
        assert_eq!(pricestore.len(), 1);
    }

    #[test]
    fn positions_stay_dense_after_deletes() {
        let (model, fix) = testing::two_block_model();
        let mut pool = ColPool::new(-1);

        let cols: Vec<Column> = (1..=4)
            .map(|i| unit_col(&model, &[(fix.pricing[0], i as f64)]))
            .collect();
        let probe = cols[1].clone();
        for col in cols {
            pool.add_col(&model, col).unwrap();
        }

        pool.del_col(&model, &probe).unwrap();
        assert_eq!(pool.len(), 3);
        for (i, col) in pool.cols().iter().enumerate() {
            assert_eq!(col.pos, Some(i));
        }
        assert!(!pool.contains(&model, &probe));

        // deleting it again is invalid data
        assert!(matches!(
            pool.del_col(&model, &probe),
            Err(Retcode::InvalidData(_))
        ));
    }

    #[test]
    fn node_change_clears_the_pool() {
        let (mut model, fix) = testing::two_block_model();
        let mut pool = ColPool::new(-1);

        pool.update_node(&model);
        assert_eq!(pool.node(), 1);
        pool.add_col(&model, unit_col(&model, &[(fix.pricing[0], 1.0)]))
            .unwrap();

        pool.update_node(&model);
        assert_eq!(pool.len(), 1);

        model.focus_node(5);
        pool.update_node(&model);
        assert_eq!(pool.node(), 5);
        assert!(pool.is_empty());
    }

    #[test]
    fn bound_propagation_drops_infeasible_columns() {
        let (mut model, fix) = testing::two_block_model();
        let mut pool = ColPool::new(-1);

        pool.add_col(&model, unit_col(&model, &[(fix.pricing[0], 7.0)]))
            .unwrap();
        pool.add_col(&model, unit_col(&model, &[(fix.pricing[0], 2.0)]))
            .unwrap();

        model.chg_var_bounds_global(fix.orig[0], 0.0, 5.0);
        pool.propagate_global_bounds(&model);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.cols()[0].vals(), &[2.0]);
    }

    #[test]
    fn add_new_col_rejects_pooled_columns() {
        let (model, fix) = testing::two_block_model();
        let mut pool = ColPool::new(-1);
        let mut other = ColPool::new(-1);

        let col = unit_col(&model, &[(fix.pricing[0], 1.0)]);
        pool.add_col(&model, col.clone()).unwrap();
        let pooled = pool.del_col(&model, &col).unwrap();
        other.add_new_col(&model, pooled).unwrap();

        let mut stillpooled = unit_col(&model, &[(fix.pricing[1], 1.0)]);
        stillpooled.pos = Some(3);
        assert!(other.add_new_col(&model, stillpooled).is_err());
    }

    #[test]
    fn randomized_dedup_never_stores_duplicates() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let (model, fix) = testing::two_block_model();
        let mut pool = ColPool::new(-1);
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..200 {
            let val = rng.gen_range(1..=5) as f64;
            let withsecond = rng.gen_bool(0.5);
            let mut entries = vec![(fix.pricing[0], val)];
            if withsecond {
                entries.push((fix.pricing[1], 1.0));
            }
            let col = Column::new(&model, 0, &entries, false, 0.0);
            pool.add_col(&model, col).unwrap();
        }

        // 5 values times 2 shapes at most
        assert!(pool.len() <= 10);
        for i in 0..pool.len() {
            for j in i + 1..pool.len() {
                assert!(!pool.cols()[i].eq_with(&pool.cols()[j], model.eps()));
            }
        }
    }
}
