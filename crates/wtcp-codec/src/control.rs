use bytes::{BufMut, BytesMut};

use crate::error::{CodecError, MalformedControlSnafu};

const TAG_SAMPLING_RATE: u8 = 0x01;
const TAG_GEOFENCE_RADIUS: u8 = 0x02;

/// One entry of a CONTROL PDU's TLV stream.
///
/// Tags this build doesn't recognise are kept as [`ControlTlv::Unknown`]
/// rather than dropped, so a decode-then-encode pass reproduces the original
/// stream byte for byte.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlTlv {
	SamplingRate(u32),
	GeofenceRadius(f32),
	Unknown { tag: u8, value: Vec<u8> },
}

pub fn encode_control(tlvs: &[ControlTlv], dst: &mut BytesMut) {
	for tlv in tlvs {
		match tlv {
			ControlTlv::SamplingRate(rate) => {
				dst.put_u8(TAG_SAMPLING_RATE);
				dst.put_u8(4);
				dst.put_u32(*rate);
			}
			ControlTlv::GeofenceRadius(radius) => {
				dst.put_u8(TAG_GEOFENCE_RADIUS);
				dst.put_u8(4);
				dst.put_f32(*radius);
			}
			ControlTlv::Unknown { tag, value } => {
				dst.put_u8(*tag);
				dst.put_u8(value.len() as u8);
				dst.put_slice(value);
			}
		}
	}
}

pub fn decode_control(payload: &[u8], frame_len: usize) -> Result<Vec<ControlTlv>, CodecError> {
	let mut tlvs = Vec::new();
	let mut i = 0;
	while i < payload.len() {
		if i + 2 > payload.len() {
			return MalformedControlSnafu { reason: "truncated TLV tag/length", frame_len }.fail();
		}
		let tag = payload[i];
		let len = payload[i + 1] as usize;
		i += 2;
		if i + len > payload.len() {
			return MalformedControlSnafu { reason: "truncated TLV value", frame_len }.fail();
		}
		let value = &payload[i..i + len];
		i += len;

		match tag {
			TAG_SAMPLING_RATE => {
				if len != 4 {
					return MalformedControlSnafu { reason: "sampling_rate TLV must be 4 bytes", frame_len }.fail();
				}
				tlvs.push(ControlTlv::SamplingRate(u32::from_be_bytes(value.try_into().unwrap())));
			}
			TAG_GEOFENCE_RADIUS => {
				if len != 4 {
					return MalformedControlSnafu { reason: "geofence_radius TLV must be 4 bytes", frame_len }.fail();
				}
				tlvs.push(ControlTlv::GeofenceRadius(f32::from_be_bytes(value.try_into().unwrap())));
			}
			other => tlvs.push(ControlTlv::Unknown { tag: other, value: value.to_vec() }),
		}
	}
	Ok(tlvs)
}

#[cfg(test)]
mod tests {
	use bytes::BytesMut;

	use super::*;

	#[test]
	fn round_trips_known_tags() {
		let tlvs = vec![ControlTlv::SamplingRate(5), ControlTlv::GeofenceRadius(12.5)];
		let mut buf = BytesMut::new();
		encode_control(&tlvs, &mut buf);
		let decoded = decode_control(&buf, buf.len()).unwrap();
		assert_eq!(decoded, tlvs);
	}

	#[test]
	fn skips_unknown_tag_by_length() {
		let mut payload = vec![0x7F, 3, 9, 9, 9];
		encode_control(&[ControlTlv::SamplingRate(7)], &mut BytesMut::new());
		let mut buf = BytesMut::new();
		encode_control(&[ControlTlv::SamplingRate(7)], &mut buf);
		payload.extend_from_slice(&buf);
		let decoded = decode_control(&payload, payload.len()).unwrap();
		assert_eq!(decoded, vec![ControlTlv::Unknown { tag: 0x7F, value: vec![9, 9, 9] }, ControlTlv::SamplingRate(7)]);
	}

	#[test]
	fn truncated_tlv_value_is_malformed() {
		let payload = [0x01, 4, 0, 0];
		let err = decode_control(&payload, payload.len()).unwrap_err();
		assert!(matches!(err, CodecError::MalformedControl { .. }));
	}
}
