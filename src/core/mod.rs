pub mod relay;
pub mod session;

pub use relay::{
    Bridge, ClientEvent, ClientHandle, ClientRoute, Frame, RelayConfig, RelayMetrics,
    SessionSummary, UpstreamConnector, WebSocketConnector,
};
pub use session::{
    HttpSessionResolver, InMemorySessionStore, ResolveError, ResolvedSession, SessionResolver,
};
