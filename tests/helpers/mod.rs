#![allow(unused_imports)]
pub mod fetcher_helpers;
pub mod fixtures;
pub mod gateway_helpers;

pub use fetcher_helpers::*;
pub use fixtures::*;
pub use gateway_helpers::*;
