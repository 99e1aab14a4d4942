//! Wire format for WTCP-Q: PDU framing, per-type payload layouts and the
//! CONTROL TLV stream.

pub mod control;
pub mod error;
pub mod pdu;
pub mod pdu_type;
pub mod record;
pub mod stream_codec;

pub use control::ControlTlv;
pub use error::CodecError;
pub use pdu::{CURRENT_VERSION, HEADER_LEN, Pdu, Payload};
pub use pdu_type::PduType;
pub use record::{EmergencyRecord, TelemetryRecord};
pub use stream_codec::PduCodec;
