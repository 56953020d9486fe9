//! TCP packet transport.
//!
//! Implements [`ClientSink`] over a non-blocking multi-client TCP
//! listener.  Each connection gets its own [`PacketDecoder`] so frames
//! split across reads are reassembled before they reach the request
//! queue.
//!
//! ```text
//!  accept ──▶ Client { stream, decoder }
//!                │  read (non-blocking)
//!                ▼
//!          PacketDecoder ──frame──▶ WsServer::on_data
//!                                       │ reject?
//!                                       ▼
//!                                  write back to the same client
//! ```
//!
//! `std::net` works on both targets: ESP-IDF exposes lwIP through the
//! std socket API.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use log::{debug, info, warn};

use crate::rpc::codec::{MAX_FRAME_SIZE, PacketDecoder};
use crate::rpc::transport::ClientSink;
use crate::rpc::ws::WsServer;

/// Maximum simultaneously connected clients.
pub const MAX_CLIENTS: usize = 4;

struct Client {
    id: u32,
    stream: TcpStream,
    decoder: PacketDecoder,
}

pub struct TcpPacketServer {
    listener: TcpListener,
    clients: Vec<Client>,
    next_id: u32,
}

impl TcpPacketServer {
    /// Bind `0.0.0.0:<port>` in non-blocking mode.  Port `0` lets the OS
    /// pick one; see [`local_addr`](Self::local_addr).
    pub fn bind(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))?;
        listener.set_nonblocking(true)?;
        info!("Socket: listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            clients: Vec::new(),
            next_id: 1,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Accept new connections and feed received frames into `server`.
    /// Returns the number of frames handed over.
    pub fn poll(&mut self, server: &WsServer) -> usize {
        self.accept();

        let mut frames = 0;
        let mut buf = [0u8; MAX_FRAME_SIZE];
        let mut closed = Vec::new();

        for client in &mut self.clients {
            loop {
                match client.stream.read(&mut buf) {
                    Ok(0) => {
                        closed.push(client.id);
                        break;
                    }
                    Ok(n) => {
                        let stream = &mut client.stream;
                        let id = client.id;
                        client.decoder.feed(&buf[..n], |frame| {
                            frames += 1;
                            if let Some(reject) = server.on_data(id, frame) {
                                if let Err(e) = stream.write_all(&reject) {
                                    debug!("Socket: client {} reject write failed: {}", id, e);
                                }
                            }
                        });
                    }
                    Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                    Err(e) => {
                        warn!("Socket: client {} read error: {}", client.id, e);
                        closed.push(client.id);
                        break;
                    }
                }
            }
        }

        for id in closed {
            self.drop_client(id);
        }
        frames
    }

    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    if self.clients.len() >= MAX_CLIENTS {
                        warn!("Socket: refusing {} (client limit {})", addr, MAX_CLIENTS);
                        continue;
                    }
                    if let Err(e) = stream.set_nonblocking(true) {
                        warn!("Socket: cannot configure {}: {}", addr, e);
                        continue;
                    }
                    // Frames are small and latency-sensitive.
                    let _ = stream.set_nodelay(true);
                    let id = self.next_id;
                    self.next_id = self.next_id.wrapping_add(1).max(1);
                    info!("Socket: client {} connected from {}", id, addr);
                    self.clients.push(Client {
                        id,
                        stream,
                        decoder: PacketDecoder::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("Socket: accept failed: {}", e);
                    break;
                }
            }
        }
    }

    fn drop_client(&mut self, id: u32) {
        if let Some(pos) = self.clients.iter().position(|c| c.id == id) {
            self.clients.swap_remove(pos);
            info!("Socket: client {} disconnected", id);
        }
    }

    fn write_to(client: &mut Client, frame: &[u8]) -> bool {
        match client.stream.write_all(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("Socket: client {} write failed: {}", client.id, e);
                false
            }
        }
    }
}

impl ClientSink for TcpPacketServer {
    fn send_to(&mut self, client_id: u32, frame: &[u8]) {
        let Some(client) = self.clients.iter_mut().find(|c| c.id == client_id) else {
            debug!("Socket: client {} gone, dropping reply", client_id);
            return;
        };
        if !Self::write_to(client, frame) {
            self.drop_client(client_id);
        }
    }

    fn broadcast(&mut self, frame: &[u8], exclude: Option<u32>) {
        let failed: Vec<u32> = self
            .clients
            .iter_mut()
            .filter(|c| Some(c.id) != exclude)
            .filter_map(|c| (!Self::write_to(c, frame)).then_some(c.id))
            .collect();
        for id in failed {
            self.drop_client(id);
        }
    }
}
