//! Mock adapters for integration tests.
//!
//! Each mock records what the core asked of it so tests can assert on
//! the full interaction history without real flash, sockets or brokers.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use lumos::app::events::AppEvent;
use lumos::app::ports::{EventSink, StorageError, StoragePort};
use lumos::error::MqttError;
use lumos::rpc::transport::{ClientSink, MqttClientPort, MqttConnectOptions, MqttMessage};

// ── Storage ───────────────────────────────────────────────────

/// In-memory storage that counts writes and can be told to fail them.
#[derive(Default)]
pub struct MemStore {
    pub data: HashMap<String, Vec<u8>>,
    pub writes: usize,
    pub fail_writes: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&Vec<u8>> {
        self.data.get(&Self::key(namespace, key))
    }

    pub fn raw_mut(&mut self, namespace: &str, key: &str) -> Option<&mut Vec<u8>> {
        self.data.get_mut(&Self::key(namespace, key))
    }
}

impl StoragePort for MemStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.data.get(&Self::key(namespace, key)).ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn len(&self, namespace: &str, key: &str) -> Result<usize, StorageError> {
        self.data
            .get(&Self::key(namespace, key))
            .map(Vec::len)
            .ok_or(StorageError::NotFound)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.writes += 1;
        self.data.insert(Self::key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.data.remove(&Self::key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.data.contains_key(&Self::key(namespace, key))
    }
}

// ── Events ────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Binary transport ──────────────────────────────────────────

#[derive(Default)]
pub struct RecordingClients {
    /// `(client_id, frame)` for direct replies.
    pub sent: Vec<(u32, Vec<u8>)>,
    /// `(excluded client, frame)` for fan-out.
    pub broadcast: Vec<(Option<u32>, Vec<u8>)>,
}

impl RecordingClients {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientSink for RecordingClients {
    fn send_to(&mut self, client_id: u32, frame: &[u8]) {
        self.sent.push((client_id, frame.to_vec()));
    }

    fn broadcast(&mut self, frame: &[u8], exclude: Option<u32>) {
        self.broadcast.push((exclude, frame.to_vec()));
    }
}

// ── MQTT broker ───────────────────────────────────────────────

#[derive(Default)]
pub struct MockBroker {
    pub connects: Vec<(String, u16, String)>,
    pub connected: bool,
    pub accept_connect: bool,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, String)>,
    pub inbox: VecDeque<MqttMessage>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            accept_connect: true,
            ..Self::default()
        }
    }

    pub fn deliver(&mut self, topic: &str, payload: &str) {
        if let Some(msg) = MqttMessage::new(topic, payload.as_bytes()) {
            self.inbox.push_back(msg);
        }
    }
}

impl MqttClientPort for MockBroker {
    fn connect(&mut self, options: &MqttConnectOptions<'_>) -> Result<(), MqttError> {
        self.connects.push((
            options.host.to_string(),
            options.port,
            options.client_id.to_string(),
        ));
        if self.accept_connect {
            Ok(())
        } else {
            Err(MqttError::Client("refused"))
        }
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError> {
        if !self.connected {
            return Err(MqttError::NotConnected);
        }
        self.published.push((topic.to_string(), payload.to_string()));
        Ok(())
    }

    fn poll_message(&mut self) -> Option<MqttMessage> {
        self.inbox.pop_front()
    }
}

// ── Frames ────────────────────────────────────────────────────

/// Build a request frame.
pub fn packet(request_id: u16, packet_type: u8, payload: &[u8]) -> Vec<u8> {
    let mut buf = vec![0xBA, 0xDA];
    buf.extend_from_slice(&request_id.to_le_bytes());
    buf.push(packet_type);
    buf.push(payload.len() as u8);
    buf.extend_from_slice(payload);
    buf
}
