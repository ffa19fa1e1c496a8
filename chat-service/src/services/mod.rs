pub mod providers;
pub mod session;
pub mod tunnel;

pub use session::{SessionError, SessionInitError, SessionManager};
pub use tunnel::{start_tunnel_if_configured, NgrokTunnel, Tunnel, TunnelProvider};
