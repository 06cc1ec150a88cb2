//! Search-and-summary services: the search orchestrator, the summary cache
//! with its reaction state machine, index sync jobs, and the composition
//! root that wires them to concrete adapters.
pub mod context;
pub mod jobs;
pub mod orchestrator;
pub mod reaction;
pub mod summary_cache;
pub mod sync;

pub use context::AppContext;
pub use jobs::JobRegistry;
pub use orchestrator::{SearchOrchestrator, NO_RESULTS_SUMMARY};
pub use summary_cache::{is_affirmative, SummaryCacheManager};
pub use sync::{read_records, IndexSync, SyncReport};
