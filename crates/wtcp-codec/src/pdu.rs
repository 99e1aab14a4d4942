use bytes::{Buf, BufMut, BytesMut};
use snafu::ensure;

use crate::{
	control::{ControlTlv, decode_control, encode_control},
	error::{CodecError, FrameTooLargeSnafu, InvalidPayloadLengthSnafu, TruncatedHeaderSnafu, TruncatedPayloadSnafu, UnknownTypeSnafu, UnsupportedVersionSnafu},
	pdu_type::PduType,
	record::{EmergencyRecord, TelemetryRecord},
};

pub const HEADER_LEN: usize = 8;
pub const CURRENT_VERSION: u8 = 1;
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// The decoded body of a PDU, tagged by its own [`PduType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	AuthRequest { device_uuid: [u8; 16], sampling_rate: u32, geofence_radius: f32 },
	AuthResponse { status: u8, assigned_session_id: u32 },
	Telemetry(TelemetryRecord),
	Control(Vec<ControlTlv>),
	Emergency(EmergencyRecord),
	Sleep { wake: bool },
	Wake,
	Terminate,
}

impl Payload {
	pub fn pdu_type(&self) -> PduType {
		match self {
			Payload::AuthRequest { .. } => PduType::AuthRequest,
			Payload::AuthResponse { .. } => PduType::AuthResponse,
			Payload::Telemetry(_) => PduType::Telemetry,
			Payload::Control(_) => PduType::Control,
			Payload::Emergency(_) => PduType::Emergency,
			Payload::Sleep { .. } => PduType::Sleep,
			Payload::Wake => PduType::Wake,
			Payload::Terminate => PduType::Terminate,
		}
	}
}

/// A single framed WTCP-Q message: 8 byte header plus a type-tagged payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
	pub version: u8,
	pub session_id: u32,
	pub payload: Payload,
}

impl Pdu {
	pub fn new(session_id: u32, payload: Payload) -> Self {
		Self { version: CURRENT_VERSION, session_id, payload }
	}

	/// Encode the full wire frame (header + payload).
	pub fn encode(&self) -> Result<BytesMut, CodecError> {
		let mut payload_buf = BytesMut::new();
		encode_payload(&self.payload, &mut payload_buf);

		let length = HEADER_LEN + payload_buf.len();
		ensure!(length <= MAX_FRAME_LEN, FrameTooLargeSnafu { length });

		let mut buf = BytesMut::with_capacity(length);
		buf.put_u16(length as u16);
		buf.put_u8(self.payload.pdu_type().into());
		buf.put_u8(self.version);
		buf.put_u32(self.session_id);
		buf.extend_from_slice(&payload_buf);
		Ok(buf)
	}

	/// Decode a single PDU from the front of `data`.
	///
	/// On success returns the parsed PDU and the number of bytes it
	/// occupied, so the caller can continue framing from `data[consumed..]`.
	/// Truncation failures never consume anything — the caller should wait
	/// for more bytes and retry with the same slice extended.
	pub fn decode(data: &[u8]) -> Result<(Pdu, usize), CodecError> {
		if data.len() < HEADER_LEN {
			return TruncatedHeaderSnafu { need: HEADER_LEN, have: data.len() }.fail();
		}

		let length = u16::from_be_bytes([data[0], data[1]]) as usize;
		let type_byte = data[2];
		let version = data[3];
		let session_id = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

		if length < HEADER_LEN {
			return TruncatedHeaderSnafu { need: HEADER_LEN, have: length }.fail();
		}
		if data.len() < length {
			return TruncatedPayloadSnafu { need: length, have: data.len() }.fail();
		}

		let pdu_type = PduType::from(type_byte);
		if !pdu_type.is_known() {
			return UnknownTypeSnafu { value: type_byte, frame_len: length }.fail();
		}
		if version != CURRENT_VERSION {
			return UnsupportedVersionSnafu { version, frame_len: length }.fail();
		}

		let payload_bytes = &data[HEADER_LEN..length];
		let payload = decode_payload(pdu_type, payload_bytes, length)?;
		Ok((Pdu { version, session_id, payload }, length))
	}
}

fn encode_payload(payload: &Payload, dst: &mut BytesMut) {
	match payload {
		Payload::AuthRequest { device_uuid, sampling_rate, geofence_radius } => {
			dst.reserve(24);
			dst.put_slice(device_uuid);
			dst.put_u32(*sampling_rate);
			dst.put_f32(*geofence_radius);
		}
		Payload::AuthResponse { status, assigned_session_id } => {
			dst.reserve(5);
			dst.put_u8(*status);
			dst.put_u32(*assigned_session_id);
		}
		Payload::Telemetry(record) => {
			dst.reserve(20);
			dst.put_u64(record.timestamp);
			dst.put_f32(record.latitude);
			dst.put_f32(record.longitude);
			dst.put_u16(record.activity);
			dst.put_u8(record.battery);
			dst.put_u8(record.diag_flags);
		}
		Payload::Control(tlvs) => encode_control(tlvs, dst),
		Payload::Emergency(record) => {
			let detail_bytes = record.details.as_bytes();
			dst.reserve(10 + detail_bytes.len());
			dst.put_u64(record.timestamp);
			dst.put_u8(record.alert_code);
			dst.put_u8(detail_bytes.len() as u8);
			dst.put_slice(detail_bytes);
		}
		Payload::Sleep { wake } => dst.put_u8(if *wake { 1 } else { 0 }),
		Payload::Wake | Payload::Terminate => {}
	}
}

fn decode_payload(pdu_type: PduType, payload: &[u8], frame_len: usize) -> Result<Payload, CodecError> {
	let expect_len = |expected: usize| -> Result<(), CodecError> {
		if payload.len() != expected {
			return InvalidPayloadLengthSnafu { pdu_type, expected, actual: payload.len(), frame_len }.fail();
		}
		Ok(())
	};

	Ok(match pdu_type {
		PduType::AuthRequest => {
			expect_len(24)?;
			let mut device_uuid = [0u8; 16];
			device_uuid.copy_from_slice(&payload[0..16]);
			Payload::AuthRequest {
				device_uuid,
				sampling_rate: u32::from_be_bytes(payload[16..20].try_into().unwrap()),
				geofence_radius: f32::from_be_bytes(payload[20..24].try_into().unwrap()),
			}
		}
		PduType::AuthResponse => {
			expect_len(5)?;
			Payload::AuthResponse {
				status: payload[0],
				assigned_session_id: u32::from_be_bytes(payload[1..5].try_into().unwrap()),
			}
		}
		PduType::Telemetry => {
			expect_len(20)?;
			Payload::Telemetry(TelemetryRecord {
				timestamp: u64::from_be_bytes(payload[0..8].try_into().unwrap()),
				latitude: f32::from_be_bytes(payload[8..12].try_into().unwrap()),
				longitude: f32::from_be_bytes(payload[12..16].try_into().unwrap()),
				activity: u16::from_be_bytes(payload[16..18].try_into().unwrap()),
				battery: payload[18],
				diag_flags: payload[19],
			})
		}
		PduType::Control => Payload::Control(decode_control(payload, frame_len)?),
		PduType::Emergency => {
			if payload.len() < 10 {
				return InvalidPayloadLengthSnafu { pdu_type, expected: 10usize, actual: payload.len(), frame_len }.fail();
			}
			let timestamp = u64::from_be_bytes(payload[0..8].try_into().unwrap());
			let alert_code = payload[8];
			let detail_len = payload[9] as usize;
			if payload.len() != 10 + detail_len {
				return InvalidPayloadLengthSnafu { pdu_type, expected: 10 + detail_len, actual: payload.len(), frame_len }.fail();
			}
			let details = String::from_utf8_lossy(&payload[10..10 + detail_len]).into_owned();
			Payload::Emergency(EmergencyRecord { timestamp, alert_code, details })
		}
		PduType::Sleep => {
			expect_len(1)?;
			Payload::Sleep { wake: payload[0] != 0 }
		}
		PduType::Wake => {
			expect_len(0)?;
			Payload::Wake
		}
		PduType::Terminate => {
			expect_len(0)?;
			Payload::Terminate
		}
		PduType::Other(_) => unreachable!("caller already rejects unknown types"),
	})
}
