pub mod auth_service;
pub mod cache_coordinator;
pub mod mutation_service;
pub mod paged_collection;
pub mod permission_service;
pub mod query_service;
pub mod session_service;
pub mod state_machine;

pub use auth_service::AuthService;
pub use cache_coordinator::*;
pub use mutation_service::{spawn_detached, MutationService, Viewer};
pub use paged_collection::{CollectionView, Cursor, PagedCollectionSync};
pub use permission_service::*;
pub use query_service::{QueryService, RecordCache};
pub use session_service::{Session, TeardownCallback};
pub use state_machine::*;
