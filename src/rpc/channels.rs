//! Bounded inbound request queue.
//!
//! Network callbacks never touch the config directly: they copy each
//! request into this queue and the main loop drains it on its next tick.
//! Uses an `embassy-sync` channel so the producer may run on another
//! task (e.g. the ESP-IDF HTTP/WS worker) without extra locking.
//!
//! ```text
//! ┌──────────────┐   Request   ┌──────────────┐
//! │  WS / socket │────────────▶│  Main loop   │
//! │  callback    │  (≤ 10)     │  (consumer)  │
//! └──────────────┘             └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use super::codec::ResponseCode;

/// Queue depth.
pub const WS_MAX_PACKET_QUEUE: usize = 10;

/// Largest request accepted into the queue.
pub const WS_MAX_PACKET_SIZE: usize = 260;

/// One queued request.
pub struct Request {
    pub client_id: u32,
    pub data: Vec<u8, WS_MAX_PACKET_SIZE>,
}

/// FIFO of raw requests awaiting dispatch.
pub struct RequestQueue {
    channel: Channel<CriticalSectionRawMutex, Request, WS_MAX_PACKET_QUEUE>,
}

impl RequestQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Copy `data` into the queue.
    ///
    /// Empty or oversized buffers are refused with `PACKET_LENGTH_EXCEEDED`,
    /// a full queue with `TOO_MANY_REQUEST`.
    pub fn push(&self, client_id: u32, data: &[u8]) -> Result<(), ResponseCode> {
        if data.is_empty() {
            return Err(ResponseCode::PacketLengthExceeded);
        }
        let data = Vec::from_slice(data).map_err(|_| ResponseCode::PacketLengthExceeded)?;

        self.channel
            .try_send(Request { client_id, data })
            .map_err(|_| ResponseCode::TooManyRequest)
    }

    pub fn pop(&self) -> Option<Request> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
