use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};
use crate::message::WireMessage;

/// Frame header: magic (2) + length (4) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Magic bytes: "WB" (0x57 0x42).
pub const MAGIC: [u8; 2] = [0x57, 0x42];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Encode one payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬─────────────────────────┐
/// │ Magic (2B)   │ Length    │ Payload                 │
/// │ 0x57 0x42    │ (4B LE)   │ (Length bytes of JSON)  │
/// │ "WB"         │           │                         │
/// └──────────────┴───────────┴─────────────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Decode one payload from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..2] != MAGIC {
        return Err(FrameError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;

    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    Ok(Some(src.split_to(payload_len).freeze()))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// `tokio_util` codec turning a byte stream into [`WireMessage`]s.
#[derive(Debug, Clone, Default)]
pub struct WireCodec {
    config: FrameConfig,
}

impl WireCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Encode `message` into one complete frame.
    ///
    /// Fails with [`FrameError::PayloadTooLarge`] before anything is
    /// written if the payload exceeds the configured limit.
    pub fn frame(&self, message: &WireMessage) -> Result<Bytes> {
        let payload = self.payload(message)?;
        let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        encode_frame(&payload, &mut dst)?;
        Ok(dst.freeze())
    }

    fn payload(&self, message: &WireMessage) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(message)?;
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }
        Ok(payload)
    }
}

impl Decoder for WireCodec {
    type Item = WireMessage;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<WireMessage>> {
        match decode_frame(src, self.config.max_payload_size)? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<WireMessage> for WireCodec {
    type Error = FrameError;

    fn encode(&mut self, item: WireMessage, dst: &mut BytesMut) -> Result<()> {
        let payload = self.payload(&item)?;
        encode_frame(&payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x57, 0x42, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0x49, 0x50, 0x00, 0x00, 0x00, 0x00][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[test]
    fn test_decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&MAGIC);
        buf.put_u32_le(1024 * 1024 * 32);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_multiple_frames_in_one_buffer() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf).unwrap();
        encode_frame(b"second", &mut buf).unwrap();

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(f1.as_ref(), b"first");
        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(f2.as_ref(), b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn codec_writes_json_array_payload() {
        let mut codec = WireCodec::default();
        let mut buf = BytesMut::new();
        let msg = WireMessage::Call {
            name: "add".to_string(),
            id: 3,
            args: vec![json!(1), json!(2)],
        };
        codec.encode(msg, &mut buf).unwrap();

        let payload = decode_frame(&mut buf.clone(), DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(payload.as_ref(), br#"["call","add",3,[1,2]]"#);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.id(), 3);
        assert_eq!(decoded.name(), "add");
    }

    #[test]
    fn codec_rejects_oversized_message() {
        let mut codec = WireCodec::new(FrameConfig {
            max_payload_size: 16,
        });
        let mut buf = BytesMut::new();
        let msg = WireMessage::Return {
            name: "echo".to_string(),
            id: 2,
            result: json!("a string that is far too long for the limit"),
        };
        let err = codec.encode(msg, &mut buf).expect_err("encode should fail");
        assert!(matches!(err, FrameError::PayloadTooLarge { max: 16, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn frame_matches_encoder_output() {
        let msg = WireMessage::Call {
            name: "add".to_string(),
            id: 5,
            args: vec![json!(1)],
        };
        let mut codec = WireCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(msg.clone(), &mut buf).unwrap();
        assert_eq!(codec.frame(&msg).unwrap(), buf.freeze());

        let small = WireCodec::new(FrameConfig {
            max_payload_size: 8,
        });
        assert!(matches!(
            small.frame(&msg),
            Err(FrameError::PayloadTooLarge { max: 8, .. })
        ));
    }

    #[test]
    fn codec_rejects_non_message_payload() {
        let mut codec = WireCodec::default();
        let mut buf = BytesMut::new();
        encode_frame(br#"{"op":"call"}"#, &mut buf).unwrap();
        assert!(matches!(codec.decode(&mut buf), Err(FrameError::Json(_))));
    }
}
