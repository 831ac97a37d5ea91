//! WebSocket Gateway
//!
//! Real-time communication via WebSocket connections.

pub mod fanout;
pub mod gateway;
pub mod handler;
pub mod messages;
pub mod relay;
pub mod session;

pub use fanout::{BusEvent, DistributedEvent, FanoutEngine, Relay};
pub use gateway::{ConnectedSession, Gateway, GatewayError};
pub use handler::{dispatch_frame, ws_handler};
pub use messages::{ClientEvent, ServerEvent};
pub use session::{SessionHandle, SessionId, SessionState};
