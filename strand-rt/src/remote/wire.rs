//! Wire protocol: typed frames behind a length-prefixed transport.
//!
//! Each frame on the wire is a fixed 4-byte header carrying a zigzag varint
//! body length, followed by the borsh-encoded [`Frame`]. A zero-length body
//! is a valid keepalive and is skipped by the decoder. A length above
//! [`PACKET_SIZE_LIMIT`] or an undecodable body is a fatal protocol error;
//! the connection is closed.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use borsh::{BorshDeserialize, BorshSerialize};
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

// Layer 3: Internal module imports
use crate::error::ActorError;
use crate::message::value::{Value, ValueKind};

/// Maximum encoded body size.
pub const PACKET_SIZE_LIMIT: usize = 1024 * 1024;

/// Fixed header size in bytes.
pub const PACKET_HEADER_SIZE: usize = 4;

/// Whether a frame travels toward the serving side or back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Direction {
    Request,
    Response,
}

/// Request/response discriminator used for logging and dispatch checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Auth,
    GetName,
    SendName,
    AskName,
}

/// Body of a wire frame.
///
/// The tag is implicit in the variant; an unknown tag on the wire fails
/// decoding and is treated as `PacketInvalid`.
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum FrameBody {
    /// Handshake request; must be the first frame on every connection.
    AuthRequest {
        from_node_id: u32,
        to_node_id: u32,
        password: String,
    },
    /// Handshake verdict.
    AuthResponse { is_auth: bool },
    /// Resolve a name on the serving node.
    GetNameRequest { name: String },
    GetNameResponse { has: bool, actor_id: u32 },
    /// One-way delivery to a named actor.
    SendNameRequest {
        from_id: u32,
        from_name: String,
        to_name: String,
        send_data: Value,
    },
    SendNameResponse {
        has_error: bool,
        error_message: String,
    },
    /// Request/answer exchange with a named actor. `answer_template` is the
    /// tag of the reply the asker expects.
    AskNameRequest {
        from_id: u32,
        from_name: String,
        to_name: String,
        ask_data: Value,
        answer_template: ValueKind,
    },
    AskNameResponse {
        has_error: bool,
        error_message: String,
        answer_data: Value,
    },
}

impl FrameBody {
    /// The discriminator of this body.
    pub fn kind(&self) -> FrameKind {
        match self {
            FrameBody::AuthRequest { .. } | FrameBody::AuthResponse { .. } => FrameKind::Auth,
            FrameBody::GetNameRequest { .. } | FrameBody::GetNameResponse { .. } => {
                FrameKind::GetName
            }
            FrameBody::SendNameRequest { .. } | FrameBody::SendNameResponse { .. } => {
                FrameKind::SendName
            }
            FrameBody::AskNameRequest { .. } | FrameBody::AskNameResponse { .. } => {
                FrameKind::AskName
            }
        }
    }
}

/// One wire message.
///
/// `sequence_id` correlates a response to its request; it is allocated per
/// outbound connection, nonzero and monotonic, with at most one in-flight
/// request per id.
#[derive(Debug, Clone, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct Frame {
    pub sequence_id: u64,
    pub direction: Direction,
    pub body: FrameBody,
}

impl Frame {
    pub fn request(sequence_id: u64, body: FrameBody) -> Self {
        Self {
            sequence_id,
            direction: Direction::Request,
            body,
        }
    }

    pub fn response(sequence_id: u64, body: FrameBody) -> Self {
        Self {
            sequence_id,
            direction: Direction::Response,
            body,
        }
    }
}

// Zigzag varint helpers for the fixed-size header. The header always spans
// four bytes; the varint occupies a prefix and the remainder is zero.

fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

fn put_varint_header(value: i64) -> [u8; PACKET_HEADER_SIZE] {
    let mut header = [0u8; PACKET_HEADER_SIZE];
    let mut ux = zigzag_encode(value);
    let mut i = 0;
    while ux >= 0x80 {
        header[i] = (ux as u8) | 0x80;
        ux >>= 7;
        i += 1;
    }
    header[i] = ux as u8;
    header
}

fn read_varint_header(header: &[u8]) -> Result<i64, ActorError> {
    let mut ux: u64 = 0;
    for (i, byte) in header.iter().take(PACKET_HEADER_SIZE).enumerate() {
        ux |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(zigzag_decode(ux));
        }
    }
    Err(ActorError::PacketInvalid)
}

/// Codec for the framed transport.
///
/// Stateless: partial frames simply stay in the read accumulator until the
/// remaining bytes arrive.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ActorError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), ActorError> {
        let body = borsh::to_vec(&frame)?;
        if body.len() > PACKET_SIZE_LIMIT {
            return Err(ActorError::PacketInvalid);
        }
        dst.reserve(PACKET_HEADER_SIZE + body.len());
        dst.put_slice(&put_varint_header(body.len() as i64));
        dst.put_slice(&body);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ActorError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ActorError> {
        loop {
            if src.len() < PACKET_HEADER_SIZE {
                return Ok(None);
            }
            let size = read_varint_header(&src[..PACKET_HEADER_SIZE])?;
            if size < 0 || size as usize > PACKET_SIZE_LIMIT {
                return Err(ActorError::PacketInvalid);
            }
            let size = size as usize;
            if src.len() < PACKET_HEADER_SIZE + size {
                src.reserve(PACKET_HEADER_SIZE + size - src.len());
                return Ok(None);
            }
            src.advance(PACKET_HEADER_SIZE);
            let body = src.split_to(size);
            if size == 0 {
                trace!("skipping empty keepalive frame");
                continue;
            }
            let frame = Frame::try_from_slice(&body).map_err(|_| ActorError::PacketInvalid)?;
            return Ok(Some(frame));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample_frame(sequence_id: u64) -> Frame {
        Frame::request(
            sequence_id,
            FrameBody::SendNameRequest {
                from_id: 3,
                from_name: "caller".to_string(),
                to_name: "svc".to_string(),
                send_data: Value::from("payload"),
            },
        )
    }

    #[test]
    fn varint_header_round_trips() {
        for value in [0i64, 1, 127, 128, 300, 1024, PACKET_SIZE_LIMIT as i64] {
            let header = put_varint_header(value);
            assert_eq!(read_varint_header(&header).unwrap(), value);
        }
    }

    #[test]
    fn header_that_never_terminates_is_invalid() {
        let header = [0xff, 0xff, 0xff, 0xff];
        assert!(matches!(
            read_varint_header(&header),
            Err(ActorError::PacketInvalid)
        ));
    }

    #[test]
    fn encode_decode_round_trips() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        let frame = sample_frame(42);
        codec.encode(frame.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().expect("one frame");
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_feeds_keep_state_in_the_accumulator() {
        let mut codec = FrameCodec::new();
        let mut encoded = BytesMut::new();
        let frame = sample_frame(7);
        codec.encode(frame.clone(), &mut encoded).unwrap();

        let mut buf = BytesMut::new();
        for chunk in encoded.chunks(3) {
            let before = codec.decode(&mut buf).unwrap();
            assert!(before.is_none() || buf.is_empty());
            buf.extend_from_slice(chunk);
        }
        let decoded = codec.decode(&mut buf).unwrap().expect("completed frame");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn multiple_frames_decode_in_order() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        for sequence_id in 1..=3 {
            codec.encode(sample_frame(sequence_id), &mut buf).unwrap();
        }
        for sequence_id in 1..=3 {
            let frame = codec.decode(&mut buf).unwrap().expect("frame");
            assert_eq!(frame.sequence_id, sequence_id);
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn empty_frames_are_skipped() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&put_varint_header(0));
        codec.encode(sample_frame(9), &mut buf).unwrap();
        let frame = codec.decode(&mut buf).unwrap().expect("frame after keepalive");
        assert_eq!(frame.sequence_id, 9);
    }

    #[test]
    fn oversize_length_is_fatal() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&put_varint_header((PACKET_SIZE_LIMIT + 1) as i64));
        buf.put_slice(&[0u8; 16]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ActorError::PacketInvalid)
        ));
    }

    #[test]
    fn negative_length_is_fatal() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&put_varint_header(-1));
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ActorError::PacketInvalid)
        ));
    }

    #[test]
    fn undecodable_body_is_fatal() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&put_varint_header(4));
        buf.put_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ActorError::PacketInvalid)
        ));
    }

    #[test]
    fn frame_kinds() {
        assert_eq!(
            FrameBody::AuthResponse { is_auth: true }.kind(),
            FrameKind::Auth
        );
        assert_eq!(
            FrameBody::GetNameRequest {
                name: "x".to_string()
            }
            .kind(),
            FrameKind::GetName
        );
        assert_eq!(sample_frame(1).body.kind(), FrameKind::SendName);
    }
}
