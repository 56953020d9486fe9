//! Packet dispatcher: applies decoded packets to the live config.
//!
//! **Transport-decoupled**: the dispatcher owns no socket.  Callers hand
//! it `(client_id, packet)` and get a [`Response`] back; the transport
//! layer decides how to encode and send it.
//!
//! Routing:
//!
//! 1. `GET_CONFIG` → the whole record as a binary body.
//! 2. Commands below the parameter range (`POWER_ON`, `POWER_OFF`,
//!    `RESTART`) → application actions.
//! 3. Anything else → registry lookup by wire id, size-checked write,
//!    then the service's post-update reactions (night-mode reset,
//!    debounced save, publish with the sender's client id).

use log::{debug, warn};

use crate::app::service::LightService;
use crate::events::Sender;
use crate::registry::{PacketType, ValueKind};

use super::codec::{Packet, Response, ResponseCode};
use super::value::{serialize, update_string, update_value};

/// Stateless dispatcher over a [`LightService`].
pub struct PacketDispatcher;

impl PacketDispatcher {
    /// Apply one packet from `client_id`.
    pub fn handle<'s>(
        service: &'s mut LightService,
        client_id: u32,
        packet: &Packet<'_>,
    ) -> Response<'s> {
        let sender = Sender::WebSocket(client_id);
        let raw_type = packet.header.packet_type;

        match PacketType::from_u8(raw_type) {
            Some(PacketType::GetConfig) => return serialize(service.config()),
            Some(PacketType::PowerOn) => return Self::power(service, true, sender),
            Some(PacketType::PowerOff) => return Self::power(service, false, sender),
            Some(PacketType::Restart) => {
                service.request_restart();
                return Response::Code(ResponseCode::Ok);
            }
            _ => {}
        }

        let Some(descriptor) = service.registry().lookup_by_wire_id(raw_type).copied() else {
            warn!("WS: unknown packet type 0x{:02x} from client {}", raw_type, client_id);
            return Response::Code(ResponseCode::BadCommand);
        };

        let dest = descriptor.bytes_mut(service.config_mut());
        let code = match descriptor.kind {
            ValueKind::Scalar => update_value(dest, packet.header.size, packet.payload),
            ValueKind::Text => update_string(dest, packet.payload),
        };

        if code == ResponseCode::Ok {
            debug!("WS: client {} updated {:?}", client_id, descriptor.property);
            service.after_property_update(descriptor.property, sender);
        } else {
            warn!(
                "WS: rejected {:?} update from client {} ({})",
                descriptor.property, client_id, code
            );
        }
        Response::Code(code)
    }

    fn power(service: &mut LightService, on: bool, sender: Sender) -> Response<'static> {
        service.apply_power(on, sender);
        Response::Code(ResponseCode::Ok)
    }
}
