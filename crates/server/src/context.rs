//! Request-scoped identity.
//!
//! Auth middleware inserts these newtypes into the request extensions;
//! handlers extract them with `Extension`. The wrapper types are the
//! typed-key defense: no other crate can collide with them the way a bare
//! string key could.

use uuid::Uuid;

/// Tenant resolved from an SDK API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectId(pub Uuid);

/// Dashboard user resolved from a verified JWT `sub` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);
