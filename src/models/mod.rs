pub mod member;
pub mod page;
pub mod project;
pub mod task;
pub mod team;
pub mod user;

pub use member::*;
pub use page::*;
pub use project::*;
pub use task::*;
pub use team::*;
pub use user::*;

/// Server-assigned identifier shared by users, projects, teams and tasks.
pub type EntityId = i64;

/// Anything that can live in a paged collection. The key must be stable across
/// pages so repeated records collapse onto a single entry.
pub trait Identifiable {
    fn key(&self) -> EntityId;
}
