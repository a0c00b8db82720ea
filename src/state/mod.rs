//! State shared across a fetch run
//!
//! This module provides the terminal outcomes of a request cycle and the
//! resources shared between concurrent workers.
//!
//! # Components
//!
//! - `Outcome`: How a request cycle ended (succeeded, failed, exhausted, stopped)
//! - `CookiePool`: Thread-safe bag of cookies used to personalize requests
//! - `Cookie`: A single `name=value` pair carried in the `Cookie` header

mod cookie_pool;
mod outcome;

// Re-export main types
pub use cookie_pool::{Cookie, CookiePool};
pub use outcome::Outcome;
