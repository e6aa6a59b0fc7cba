pub mod clock;
pub mod page_fetcher;
pub mod remote_gateway;
pub mod session_store;
pub mod task_spawner;

pub use clock::Clock;
pub use page_fetcher::PageFetcher;
pub use remote_gateway::{HttpMethod, RemoteGateway};
pub use session_store::{SessionStore, SESSION_TOKEN_KEY};
pub use task_spawner::TaskSpawner;
