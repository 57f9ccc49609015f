// src/ops/mod.rs

pub mod fetch;
pub mod login;

pub use fetch::{FetchOperation, FetchParams};
pub use login::{LoginKind, LoginOperation};
