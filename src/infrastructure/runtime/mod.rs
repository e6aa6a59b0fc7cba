pub mod clock;
pub mod tokio;
