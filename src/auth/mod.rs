//! Caller identity
//!
//! The `auth` namespace of rules is the caller identity document. Relations
//! on it are materialized through an `AuthResolver` before a rule is
//! compiled or evaluated.

mod resolver;

pub use resolver::{materialize_auth, AuthResolver, StaticAuthResolver, StoreAuthResolver};
