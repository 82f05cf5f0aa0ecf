pub mod card;
pub mod handlers;
pub mod ingest;
pub mod seed;

pub use card::{lookup_card, project_card};
pub use handlers::{ApiError, AppState, router};
pub use ingest::{ImportRequest, IngestError, PoemLocks, Synchronizer};
pub use seed::{SeedReport, import_corpus};
