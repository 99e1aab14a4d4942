//! QUIC transport for WTCP-Q: binds the protocol's three logical streams
//! (control, telemetry, emergency) onto real `quinn` bidirectional streams,
//! opened and accepted in a fixed, matching order by client and server.

pub mod connect;
pub mod error;
pub mod listen;
pub mod tls;
pub mod transport;

pub use connect::connect;
pub use error::QuicError;
pub use listen::{accept, bind};
pub use transport::QuicTransport;
