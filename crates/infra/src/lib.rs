//! `congrega-infra` — adapters behind the session ports.
//!
//! HTTP-backed authorization gateway and SQLite-backed durable stores. The
//! policy (timeouts, fallback, freshness) lives in `congrega-session`; this
//! crate only maps transports and storage media.

pub mod authz_http;
pub mod storage;

pub use authz_http::HttpAuthzGateway;
pub use storage::SqliteStateStore;
