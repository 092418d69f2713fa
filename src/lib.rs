//! Column-generation core for Dantzig-Wolfe branch-and-price.
//!
//! The crate provides the pieces a branch-and-price solver needs between the
//! master LP and the pricing subproblems: a deduplicating [`ColPool`], a
//! score-based [`PriceStore`], the reduced-cost/Farkas [`PricingType`]
//! policies, dual smoothing [`Stabilization`], extended master constraints
//! with their pricing modifications, and the two branching rules that
//! generate them ([`GenericBranching`] and [`CompBndBranching`]).
//!
//! The LP/MIP engine itself stays external; [`Model`] is the in-memory
//! facade of everything the core consumes from it.

pub mod branch_compbnd;
pub mod branch_generic;
pub mod branchrule;
pub mod col;
pub mod colpool;
pub mod constraint;
pub mod mastercons;
pub mod model;
pub mod params;
pub mod pricer;
pub mod pricestore;
pub mod pricingtype;
pub mod retcode;
pub mod row;
pub mod solution;
pub mod stabilization;
pub mod variable;

#[cfg(test)]
pub(crate) mod testing;

pub use branch_compbnd::{CompBnd, CompBndBranchType, CompBndBranching, CompBndSense};
pub use branch_generic::{CompSense, ComponentBound, GenericBranching};
pub use branchrule::{BranchRule, BranchingResult};
pub use col::Column;
pub use colpool::ColPool;
pub use constraint::{ConsId, Constraint, PricingCons};
pub use mastercons::{
    ExtendedMasterCons, MasterConsId, MasterConsPayload, MasterConsSide, MasterConsStore,
    PricingModification,
};
pub use model::{Model, PricingProblem};
pub use params::{
    ColPoolSettings, CompBndSettings, FarkasSettings, PriceStoreSettings, ReducedCostSettings,
    StabilizationSettings,
};
pub use pricer::{Pricer, PricerResult, PricerResultState};
pub use pricestore::PriceStore;
pub use pricingtype::{FarkasPricing, PricingType, ReducedCostPricing};
pub use retcode::{Result, Retcode};
pub use row::{Row, RowId};
pub use solution::PricingSolution;
pub use stabilization::Stabilization;
pub use variable::{VarId, VarKind, VarType, Variable};
