//! Stage A (enrichment) and Stage B (validation) pipelines.
//!
//! Stage A: recommendation feed → tag enricher → exclusion filter → price
//! enricher → report emitter. Stage B: report reader → allow-list matcher →
//! AI fallback resolver → discount calculator → enriched report emitter.
//! Stage B only ever consumes paths accepted by the trigger guard in
//! [`report`], which is what keeps its own output from re-triggering it.

mod allowlist;
mod discount;
mod exclusion;
mod fallback;
mod price_enrich;
mod prompt;
mod report;
mod stage_a;
mod stage_b;
mod tag_enrich;

pub use allowlist::*;
pub use discount::*;
pub use exclusion::*;
pub use fallback::*;
pub use price_enrich::*;
pub use prompt::*;
pub use report::*;
pub use stage_a::*;
pub use stage_b::*;
pub use tag_enrich::*;
