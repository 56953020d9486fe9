//! Binary packet codec.
//!
//! Wire format (little-endian):
//! ```text
//! ┌──────────────┬────────────────┬──────────┬──────────┬──────────────┐
//! │ Signature 2B │ Request id 2B  │ Type 1B  │ Size 1B  │ Payload (N B)│
//! │ 0xDABA       │ echoed in reply│ wire id  │ N        │              │
//! └──────────────┴────────────────┴──────────┴──────────┴──────────────┘
//! ```
//!
//! Replies reuse the header with `type` set to `RESPONSE_STRING` or
//! `RESPONSE_BINARY`.  Change notifications use request id 0 and the
//! changed parameter's wire id as the type.
//!
//! [`PacketDecoder`] reassembles packets from a byte stream: a single
//! socket read may hold part of a header, part of a payload, or several
//! packets back to back.

use core::fmt;

use crate::registry::PacketType;

/// Fixed first two bytes of every packet.
pub const PACKET_SIGNATURE: u16 = 0xDABA;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 6;

/// The size field is one byte.
pub const MAX_PAYLOAD_SIZE: usize = u8::MAX as usize;

/// Largest encodable packet.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

/// An encoded outbound packet.
pub type Frame = heapless::Vec<u8, MAX_FRAME_SIZE>;

// ═══════════════════════════════════════════════════════════════
//  Header / packet
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub signature: u16,
    pub request_id: u16,
    /// Raw wire id; may name no known [`PacketType`].
    pub packet_type: u8,
    pub size: u8,
}

impl PacketHeader {
    fn read(raw: &[u8; HEADER_SIZE]) -> Self {
        Self {
            signature: u16::from_le_bytes([raw[0], raw[1]]),
            request_id: u16::from_le_bytes([raw[2], raw[3]]),
            packet_type: raw[4],
            size: raw[5],
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let sig = self.signature.to_le_bytes();
        let id = self.request_id.to_le_bytes();
        [sig[0], sig[1], id[0], id[1], self.packet_type, self.size]
    }
}

/// A validated view over one request buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub header: PacketHeader,
    pub payload: &'a [u8],
}

impl Packet<'_> {
    pub fn request_id(&self) -> u16 {
        self.header.request_id
    }

    pub fn packet_type(&self) -> Option<PacketType> {
        PacketType::from_u8(self.header.packet_type)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Responses
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    Ok = 0,
    BadRequest = 1,
    BadCommand = 2,
    TooManyRequest = 3,
    PacketLengthExceeded = 4,
    InternalError = 5,
}

impl ResponseCode {
    /// Fixed human-readable label sent in string replies.
    pub fn code_string(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "BAD REQUEST",
            Self::BadCommand => "BAD COMMAND",
            Self::TooManyRequest => "TOO MANY REQUESTS",
            Self::PacketLengthExceeded => "PACKET LENGTH EXCEEDED",
            Self::InternalError => "INTERNAL ERROR",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code_string())
    }
}

/// Outcome of handling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'a> {
    Code(ResponseCode),
    Text(&'a str),
    Binary(&'a [u8]),
}

impl Response<'_> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Code(ResponseCode::Ok))
    }
}

impl From<ResponseCode> for Response<'_> {
    fn from(code: ResponseCode) -> Self {
        Self::Code(code)
    }
}

/// Why [`parse`] refused a buffer, with the request id to echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    pub request_id: u16,
    pub code: ResponseCode,
}

// ═══════════════════════════════════════════════════════════════
//  Parse / encode
// ═══════════════════════════════════════════════════════════════

/// Validate `buf` as exactly one packet.
///
/// * shorter than a header          → `PACKET_LENGTH_EXCEEDED` (request id 0)
/// * signature mismatch             → `BAD_REQUEST`
/// * `size + HEADER_SIZE != buf.len()` → `BAD_REQUEST`
pub fn parse(buf: &[u8]) -> Result<Packet<'_>, Rejected> {
    let Some((raw, payload)) = buf.split_first_chunk::<HEADER_SIZE>() else {
        return Err(Rejected {
            request_id: 0,
            code: ResponseCode::PacketLengthExceeded,
        });
    };
    let header = PacketHeader::read(raw);

    if header.signature != PACKET_SIGNATURE || usize::from(header.size) != payload.len() {
        return Err(Rejected {
            request_id: header.request_id,
            code: ResponseCode::BadRequest,
        });
    }

    Ok(Packet { header, payload })
}

fn build_frame(request_id: u16, packet_type: u8, payload: &[u8]) -> Option<Frame> {
    let header = PacketHeader {
        signature: PACKET_SIGNATURE,
        request_id,
        packet_type,
        size: u8::try_from(payload.len()).ok()?,
    };
    let mut frame = Frame::new();
    frame.extend_from_slice(&header.to_bytes()).ok()?;
    frame.extend_from_slice(payload).ok()?;
    Some(frame)
}

fn internal_error_frame(request_id: u16) -> Frame {
    build_frame(
        request_id,
        PacketType::ResponseString as u8,
        ResponseCode::InternalError.code_string().as_bytes(),
    )
    .unwrap_or_default()
}

/// Encode the reply to `request_id`.  A body that does not fit the
/// one-byte size field becomes `INTERNAL_ERROR`.
pub fn encode_response(request_id: u16, response: &Response<'_>) -> Frame {
    let string = PacketType::ResponseString as u8;
    let frame = match response {
        Response::Code(code) => build_frame(request_id, string, code.code_string().as_bytes()),
        Response::Text(text) => build_frame(request_id, string, text.as_bytes()),
        Response::Binary(bytes) => build_frame(request_id, PacketType::ResponseBinary as u8, bytes),
    };
    frame.unwrap_or_else(|| internal_error_frame(request_id))
}

/// Encode a change notification for `wire_id` carrying `payload`.
pub fn encode_notification(wire_id: PacketType, payload: &[u8]) -> Option<Frame> {
    build_frame(0, wire_id as u8, payload)
}

// ═══════════════════════════════════════════════════════════════
//  Streaming decoder
// ═══════════════════════════════════════════════════════════════

enum DecoderState {
    /// Waiting for header bytes.
    ReadingHeader { collected: usize },
    /// Header received, reading `expected` payload bytes.
    ReadingPayload { expected: usize, collected: usize },
}

/// Reassembles whole packets (header + payload) from a byte stream.
///
/// The decoder only frames; validation is left to [`parse`] so a bad
/// signature still gets a proper `BAD_REQUEST` reply.
pub struct PacketDecoder {
    state: DecoderState,
    buf: [u8; MAX_FRAME_SIZE],
}

impl PacketDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingHeader { collected: 0 },
            buf: [0; MAX_FRAME_SIZE],
        }
    }

    /// Feed stream bytes, calling `emit` for every completed packet.
    pub fn feed(&mut self, data: &[u8], mut emit: impl FnMut(&[u8])) {
        let mut offset = 0;

        while offset < data.len() {
            match &mut self.state {
                DecoderState::ReadingHeader { collected } => {
                    let to_copy = (HEADER_SIZE - *collected).min(data.len() - offset);
                    self.buf[*collected..*collected + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == HEADER_SIZE {
                        let expected = usize::from(self.buf[HEADER_SIZE - 1]);
                        if expected == 0 {
                            emit(&self.buf[..HEADER_SIZE]);
                            self.state = DecoderState::ReadingHeader { collected: 0 };
                        } else {
                            self.state = DecoderState::ReadingPayload { expected, collected: 0 };
                        }
                    }
                }

                DecoderState::ReadingPayload { expected, collected } => {
                    let to_copy = (*expected - *collected).min(data.len() - offset);
                    let start = HEADER_SIZE + *collected;
                    self.buf[start..start + to_copy]
                        .copy_from_slice(&data[offset..offset + to_copy]);
                    *collected += to_copy;
                    offset += to_copy;

                    if *collected == *expected {
                        let len = HEADER_SIZE + *expected;
                        self.state = DecoderState::ReadingHeader { collected: 0 };
                        emit(&self.buf[..len]);
                    }
                }
            }
        }
    }

    /// Drop any partial packet (e.g. after a reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader { collected: 0 };
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}
