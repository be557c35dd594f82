//! Exchange rates module - domain model and repository trait.

mod rates_model;
mod rates_traits;

pub use rates_model::{PairKey, Rate};
pub use rates_traits::RateRepositoryTrait;
