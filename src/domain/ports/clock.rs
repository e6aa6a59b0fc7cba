use chrono::{DateTime, Utc};

/// Source of wall-clock time. Overdue derivation and cache freshness read it so
/// tests can pin "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
