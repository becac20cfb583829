//! The authenticating reverse-proxy filter pipeline.
//!
//! This crate is "the core" described by the surrounding proxy: a chain of
//! filters that normalizes a request's URL, verifies a bearer identity
//! against an external OIDC provider (refreshing it transparently when
//! expired), consults cached authorization decisions, evaluates
//! per-resource admission rules, and injects identity headers toward the
//! upstream. It does not itself terminate TLS, listen on a socket, or
//! forward to the upstream — those are the binary crate's job.

pub mod cookie;
pub mod ctx;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod normalization;
pub mod pipeline;
pub mod provider;
pub mod resource;
pub mod store;

pub use ctx::{ClaimValue, FilterOutcome, Identity, RequestScope};
pub use error::GatewayError;
pub use filter::{Filter, FilterChain};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use resource::{ClaimMatch, Resource};
