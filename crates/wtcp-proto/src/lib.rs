//! Session state machines and stream routing for WTCP-Q, built on the
//! wire types from `wtcp-codec`.

pub mod error;
pub mod fsm;
pub mod stream_router;

pub use error::ProtoError;
pub use fsm::{ClientFsm, ClientInput, ClientState, ServerFsm, ServerInput, ServerState};
pub use stream_router::{CONTROL_STREAM, EMERGENCY_STREAM, TELEMETRY_STREAM, stream_for, validate_inbound};
