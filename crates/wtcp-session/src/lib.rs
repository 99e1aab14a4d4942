//! Client and server session engines: AUTH handshake, telemetry/control
//! orchestration, and sink persistence, driven over an abstract [`Transport`]
//! so the protocol logic can run without a real QUIC connection.

pub mod client;
pub mod config;
pub mod error;
pub mod id;
pub mod server;
pub mod transport;

pub use client::{ClientHandle, ClientSession};
pub use config::{ControlParams, SessionTimings, SharedControlParams};
pub use error::SessionError;
pub use id::SessionIdAllocator;
pub use server::{ServerHandle, ServerSession};
pub use transport::{ChannelTransport, Transport};
