//! Title-to-image resolution.
//!
//! - Query normalisation and the biased search URL (`query`)
//! - HTML extraction of candidate links and image sources (`extract`)
//! - The staged resolver and its error taxonomy (`pipeline`)
//! - Destination file naming (`store`)
//!
//! Network access goes through [`marquee_http::Fetcher`], so the whole
//! pipeline runs against stubs in tests.

pub mod extract;
pub mod pipeline;
pub mod query;
pub mod store;

pub use pipeline::{PipelineError, ResolvedImage, Resolver, Stage};
pub use query::Query;
