//! Document-index adapters: Elasticsearch over REST, and an in-process index
//! for tests and offline runs. `schema` holds the create-index bodies.
pub mod elastic;
pub mod memory;
pub mod schema;

pub use elastic::ElasticIndex;
pub use memory::{token_overlap_scorer, MemoryIndex};
