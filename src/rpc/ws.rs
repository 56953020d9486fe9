//! Binary-protocol server: request intake, dispatch, and change fan-out.
//!
//! ```text
//!  socket callback ──on_data──▶ RequestQueue ──handle_incoming──▶ PacketDispatcher
//!        ▲   (reject frame)                                        │
//!        │                                                          ▼
//!  ClientSink ◀── flush ◀── outbox ◀── bus subscriber ◀── NotificationBus
//! ```
//!
//! Replies go to the requesting client only.  Change notifications go to
//! every client except the one that caused the change.

use core::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use log::{debug, warn};

use crate::app::service::LightService;
use crate::config::Config;
use crate::events::{Delivery, NotificationBus, Sender, SubscriptionId};
use crate::registry::{ParameterRegistry, PropertyId};

use super::channels::RequestQueue;
use super::codec::{Frame, Response, encode_notification, encode_response, parse};
use super::engine::PacketDispatcher;
use super::transport::ClientSink;

struct Outgoing {
    exclude: Option<u32>,
    frame: Frame,
}

/// Encode the current value of `property` as a notification frame.
///
/// A trigger pair sends an empty frame with the first (set-true) wire id
/// when the flag is set and the second one otherwise.
pub fn notification_frame(
    registry: &ParameterRegistry,
    config: &Config,
    property: PropertyId,
) -> Option<Frame> {
    match registry.lookup_by_property(property) {
        [row] => encode_notification(row.wire_id, row.bytes(config)),
        [on, off] => {
            let row = if on.read_uint(config) != 0 { on } else { off };
            encode_notification(row.wire_id, &[])
        }
        _ => None,
    }
}

pub struct WsServer {
    queue: Arc<RequestQueue>,
    outbox: Rc<RefCell<Vec<Outgoing>>>,
    subscription: Option<SubscriptionId>,
}

impl WsServer {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(RequestQueue::new()),
            outbox: Rc::default(),
            subscription: None,
        }
    }

    /// Producer handle for network callbacks on other tasks.
    pub fn queue(&self) -> Arc<RequestQueue> {
        Arc::clone(&self.queue)
    }

    /// Start fanning out changes published on `bus`.
    pub fn attach(&mut self, bus: &NotificationBus) {
        if self.subscription.is_some() {
            return;
        }
        let outbox = Rc::clone(&self.outbox);
        let id = bus.subscribe_all(move |d: &Delivery<'_>| {
            let Some(frame) = notification_frame(d.registry, d.config, d.notification.property)
            else {
                return;
            };
            let exclude = match d.notification.sender {
                Sender::WebSocket(id) => Some(id),
                _ => None,
            };
            outbox.borrow_mut().push(Outgoing { exclude, frame });
        });
        self.subscription = Some(id);
    }

    /// Intake from a network callback.  Returns a reject frame to send
    /// straight back when the request cannot be queued.
    pub fn on_data(&self, client_id: u32, data: &[u8]) -> Option<Frame> {
        match self.queue.push(client_id, data) {
            Ok(()) => None,
            Err(code) => {
                let request_id = match data {
                    [_, _, lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
                    _ => 0,
                };
                warn!("WS: client {} request refused ({})", client_id, code);
                Some(encode_response(request_id, &Response::Code(code)))
            }
        }
    }

    /// Drain the queue in arrival order, replying to each sender, then
    /// flush resulting notifications.  Returns the number of requests
    /// handled.
    pub fn handle_incoming(
        &mut self,
        service: &mut LightService,
        clients: &mut impl ClientSink,
    ) -> usize {
        let mut handled = 0;
        while let Some(request) = self.queue.pop() {
            let reply = match parse(&request.data) {
                Ok(packet) => {
                    let response = PacketDispatcher::handle(service, request.client_id, &packet);
                    encode_response(packet.request_id(), &response)
                }
                Err(rejected) => {
                    debug!("WS: malformed packet from client {}: {}", request.client_id, rejected.code);
                    encode_response(rejected.request_id, &Response::Code(rejected.code))
                }
            };
            clients.send_to(request.client_id, &reply);
            handled += 1;
        }
        self.flush(clients);
        handled
    }

    /// Send queued notifications.
    pub fn flush(&mut self, clients: &mut impl ClientSink) {
        let pending = core::mem::take(&mut *self.outbox.borrow_mut());
        for out in pending {
            clients.broadcast(&out.frame, out.exclude);
        }
    }

    pub fn pending_notifications(&self) -> usize {
        self.outbox.borrow().len()
    }
}

impl Default for WsServer {
    fn default() -> Self {
        Self::new()
    }
}
