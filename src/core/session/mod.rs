//! Session resolution.
//!
//! The relay never issues sessions. The surrounding application creates a
//! realtime session with the upstream provider, then hands the browser an
//! opaque session identifier. When the browser connects, the relay asks a
//! [`SessionResolver`] for the short-lived upstream credential bound to that
//! identifier.
//!
//! Two resolvers ship with the crate:
//!
//! - [`InMemorySessionStore`] - sessions pushed in by the application through
//!   the registration endpoint, expiring after a TTL
//! - [`HttpSessionResolver`] - sessions looked up on demand from the
//!   application's own HTTP API

mod http;
mod memory;
mod resolver;

pub use http::{HttpSessionResolver, SessionRecord};
pub use memory::{DEFAULT_SESSION_TTL, InMemorySessionStore};
pub use resolver::{
    MAX_SESSION_ID_LEN, ResolveError, ResolvedSession, SessionResolver, UpstreamCredential,
    validate_session_id,
};
