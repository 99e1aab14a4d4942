use num_enum::{FromPrimitive, IntoPrimitive};

/// Wire discriminator carried in every PDU header.
///
/// `Other` catches any byte the current protocol version doesn't assign,
/// so decoding an unrecognised type never panics — it falls through to
/// [`crate::error::CodecError::UnknownType`].
#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
	AuthRequest = 0x01,
	AuthResponse = 0x02,
	Telemetry = 0x03,
	Control = 0x04,
	Emergency = 0x05,
	Sleep = 0x06,
	Wake = 0x07,
	Terminate = 0x08,
	#[num_enum(catch_all)]
	Other(u8),
}

impl PduType {
	pub fn is_known(self) -> bool {
		!matches!(self, PduType::Other(_))
	}
}
