//! Length-prefix framing for backend envelopes.
//!
//! A frame is a 4-byte big-endian payload length followed by the payload.
//! Payloads are JSON-encoded [`BackendRequest`](crate::BackendRequest) and
//! [`BackendResponse`](crate::BackendResponse) envelopes.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Error;

/// Maximum payload size. Result chunks from a wide grouped query can get
/// large, so this is more generous than a typical RPC limit.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Prefix `payload` with its length.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidMessage(format!(
            "payload size {} exceeds maximum {}",
            payload.len(),
            MAX_MESSAGE_SIZE
        )));
    }

    let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Borrow the payload of a complete frame. Trailing bytes are ignored.
pub fn extract_payload(frame: &[u8]) -> Result<&[u8], Error> {
    let Some(header) = frame.get(..LENGTH_PREFIX_SIZE) else {
        return Err(Error::InvalidMessage("frame too short".to_string()));
    };

    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    prefix.copy_from_slice(header);
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidMessage(format!(
            "frame length {} exceeds maximum {}",
            len, MAX_MESSAGE_SIZE
        )));
    }

    frame
        .get(LENGTH_PREFIX_SIZE..LENGTH_PREFIX_SIZE + len)
        .ok_or_else(|| {
            Error::InvalidMessage(format!(
                "frame incomplete: have {}, need {}",
                frame.len(),
                LENGTH_PREFIX_SIZE + len
            ))
        })
}

/// Serialize `message` as JSON and frame it.
pub fn encode_message<T: Serialize>(message: &T) -> Result<Vec<u8>, Error> {
    let payload = serde_json::to_vec(message)?;
    encode_frame(&payload)
}

/// Unframe and deserialize a JSON message.
pub fn decode_message<T: DeserializeOwned>(frame: &[u8]) -> Result<T, Error> {
    let payload = extract_payload(frame)?;
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttributeSource, BackendRequest, QueryRequest};

    #[test]
    fn test_encode_frame_prefix() {
        let frame = encode_frame(b"hello").unwrap();
        assert_eq!(&frame[..4], &[0, 0, 0, 5]);
        assert_eq!(&frame[4..], b"hello");
    }

    #[test]
    fn test_encode_frame_too_large() {
        let payload = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(encode_frame(&payload).is_err());
    }

    #[test]
    fn test_extract_payload_ignores_trailing_bytes() {
        let frame = [0, 0, 0, 2, 1, 2, 3, 4, 5];
        assert_eq!(extract_payload(&frame).unwrap(), &[1, 2]);
    }

    #[test]
    fn test_extract_payload_incomplete() {
        assert!(extract_payload(&[0, 0, 0]).is_err());
        assert!(extract_payload(&[0, 0, 0, 5, 1, 2]).is_err());
    }

    #[test]
    fn test_message_envelope() {
        let request = BackendRequest::new(
            7,
            AttributeSource::Qs,
            "tenant-1",
            QueryRequest::default().with_limit(10),
        );
        let frame = encode_message(&request).unwrap();
        let decoded: BackendRequest = decode_message(&frame).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_decode_garbage() {
        let frame = encode_frame(b"not json").unwrap();
        let result: Result<BackendRequest, _> = decode_message(&frame);
        assert!(matches!(result, Err(Error::Deserialization(_))));
    }
}
