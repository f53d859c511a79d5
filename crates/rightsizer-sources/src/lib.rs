//! External collaborators for the rightsizer pipelines.
//!
//! Everything remote lives behind a trait so the pipelines never know what
//! is actually on the wire: a paginated recommendation feed
//! (`RecommendationSource` + the lazy `RecommendationFeed` reader), a
//! batched instance-tag service (`TagService`), and a price-list service
//! (`PriceService`). HTTP implementations are provided for all three;
//! tests substitute in-memory impls.

mod pricing;
mod recommendations;
mod retry;
mod tags;

pub use pricing::*;
pub use recommendations::*;
pub use retry::*;
pub use tags::*;
