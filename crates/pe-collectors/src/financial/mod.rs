//! Public-market financial collectors (§4.5).

mod public_comps;
mod valuation_estimator;

pub use public_comps::PublicCompsCollector;
pub use valuation_estimator::ValuationEstimatorCollector;
