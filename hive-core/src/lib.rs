//! Contribution, credit ledger and moderation workflow for InterfaceHive.
//!
//! [`Engine`] owns the rules. Storage sits behind [`store::Store`], with a
//! diesel-backed Postgres implementation for the service and an in-memory
//! one for tests.

pub mod models;
pub mod policy;
pub mod services;
pub mod store;
pub mod validation;

pub use services::Engine;
