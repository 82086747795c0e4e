//! `congrega-auth` — pure tenant-scoping policy.
//!
//! This crate is intentionally decoupled from transport and storage: it holds
//! the data shapes the authorization backend produces and the policy that
//! turns them into the single effective (igreja, filial) scope.

pub mod access;
pub mod profile;
pub mod roles;
pub mod scope;

pub use access::AccessRestriction;
pub use profile::{Filial, Profile};
pub use roles::Role;
pub use scope::{EffectiveScope, FilialOverride, effective_scope};
