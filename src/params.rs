//! Settings of the column-generation core with their documented defaults.

/// Settings of the column pool.
#[derive(Debug, Clone)]
pub struct ColPoolSettings {
    /// Maximum age a column can reach before it is deleted from the pool;
    /// `-1` disables aging.
    pub age_limit: i64,
}

impl Default for ColPoolSettings {
    fn default() -> Self {
        ColPoolSettings { age_limit: 100 }
    }
}

/// Settings of the price store.
#[derive(Debug, Clone)]
pub struct PriceStoreSettings {
    /// Weight of the reduced cost in the column score.
    pub w_redcost: f64,
    /// Weight of the orthogonality in the column score.
    pub w_ortho: f64,
    /// Weight of the objective parallelism in the column score.
    pub w_obj: f64,
    /// Minimal orthogonality a column must keep against already committed
    /// columns; clamped to epsilon from below.
    pub min_col_ortho: f64,
    /// Maximal number of columns added to the master per round.
    pub max_cols: usize,
    /// Maximal number of columns added per round at the root node.
    pub max_cols_root: usize,
    /// Maximal number of columns added per round in Farkas pricing.
    pub max_cols_farkas: usize,
}

impl Default for PriceStoreSettings {
    fn default() -> Self {
        PriceStoreSettings {
            w_redcost: 0.5,
            w_ortho: 0.5,
            w_obj: 0.0,
            min_col_ortho: 0.0,
            max_cols: 25,
            max_cols_root: 25,
            max_cols_farkas: 10,
        }
    }
}

/// Settings of reduced-cost pricing.
#[derive(Debug, Clone)]
pub struct ReducedCostSettings {
    /// Maximal number of reduced-cost pricing rounds per node.
    pub max_rounds: u64,
    /// Maximal number of columns per pricing round.
    pub max_cols_round: usize,
    /// Maximal number of columns per pricing round at the root node.
    pub max_cols_round_root: usize,
    /// Maximal number of columns generated per pricing problem.
    pub max_cols_prob: usize,
    /// Maximal number of columns generated per pricing problem at the root.
    pub max_cols_prob_root: usize,
    /// Maximal number of successfully solved pricing problems until the
    /// pricing loop is aborted.
    pub max_successful_probs: usize,
    /// Maximal fraction of pricing problems solved once variables were found.
    pub rel_max_probs: f64,
    /// Maximal fraction of pricing problems solved at the root node once
    /// variables were found.
    pub rel_max_probs_root: f64,
    /// Maximal fraction of successfully solved pricing problems until the
    /// pricing loop is aborted.
    pub rel_max_successful_probs: f64,
}

impl Default for ReducedCostSettings {
    fn default() -> Self {
        ReducedCostSettings {
            max_rounds: u64::MAX,
            max_cols_round: 100,
            max_cols_round_root: 100,
            max_cols_prob: 10,
            max_cols_prob_root: 10,
            max_successful_probs: usize::MAX,
            rel_max_probs: 1.0,
            rel_max_probs_root: 1.0,
            rel_max_successful_probs: 1.0,
        }
    }
}

/// Settings of Farkas pricing.
#[derive(Debug, Clone)]
pub struct FarkasSettings {
    /// Maximal number of columns per Farkas pricing round.
    pub max_cols_round: usize,
    /// Maximal number of columns generated per pricing problem.
    pub max_cols_prob: usize,
    /// Maximal fraction of pricing problems solved once variables were found.
    pub rel_max_probs: f64,
}

impl Default for FarkasSettings {
    fn default() -> Self {
        FarkasSettings {
            max_cols_round: 10,
            max_cols_prob: 10,
            rel_max_probs: 1.0,
        }
    }
}

/// Settings of the dual-smoothing stabilization.
#[derive(Debug, Clone, Default)]
pub struct StabilizationSettings {
    /// Whether to combine smoothing with subgradient ascent.
    pub hybrid_ascent: bool,
}

/// Settings of component-bound branching.
#[derive(Debug, Clone)]
pub struct CompBndSettings {
    /// Whether the max-range midrange heuristic selects component bounds.
    pub use_max_range_midrange: bool,
    /// Whether the most-distinct median heuristic selects component bounds.
    pub use_most_distinct_median: bool,
}

impl Default for CompBndSettings {
    fn default() -> Self {
        CompBndSettings {
            use_max_range_midrange: true,
            use_most_distinct_median: true,
        }
    }
}
