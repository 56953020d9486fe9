//! Unified error types for the lumos firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping
//! the boot path's error handling uniform.  Protocol-level failures are
//! *not* errors: they travel as [`ResponseCode`](crate::rpc::codec::ResponseCode)
//! values back to the client.

use core::fmt;

use crate::app::ports::StorageError;
use crate::drivers::hw_init::HwInitError;
use crate::registry::PropertyId;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible setup operation in the firmware funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The parameter table is inconsistent.  Fatal at startup.
    Registry(RegistryError),
    /// Persistent storage could not be opened.
    Storage(StorageError),
    /// The LED output stage could not be configured.
    Hardware(HwInitError),
    /// Boot-time configuration the network stack cannot accept.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

/// Defects in the static descriptor table, detected by
/// [`ParameterRegistry::build`](crate::registry::ParameterRegistry::build).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two descriptors claim the same wire packet id.
    DuplicateWireId(u8),
    /// Two descriptors claim the same inbound topic.
    DuplicateTopic(&'static str),
    /// A descriptor addresses bytes outside the config record.
    OutOfBounds { wire_id: u8, offset: usize, size: usize },
    /// A property has more than two descriptors, or a trigger pair whose
    /// entries disagree on the byte span.
    InvalidTriggerPair(PropertyId),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateWireId(id) => write!(f, "duplicate wire id 0x{id:02x}"),
            Self::DuplicateTopic(topic) => write!(f, "duplicate topic '{topic}'"),
            Self::OutOfBounds {
                wire_id,
                offset,
                size,
            } => write!(
                f,
                "wire id 0x{wire_id:02x} addresses {offset}..{} outside the config record",
                offset + size
            ),
            Self::InvalidTriggerPair(property) => {
                write!(f, "invalid trigger pair for {property:?}")
            }
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// MQTT errors
// ---------------------------------------------------------------------------

/// Failures while ingesting or publishing MQTT messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttError {
    /// The topic matches no inbound parameter.
    UnknownTopic,
    /// The payload is not a decimal integer.
    InvalidPayload,
    /// The parameter cannot be set over MQTT (e.g. a text field).
    Unsupported,
    /// The broker connection is down.
    NotConnected,
    /// The underlying client refused the operation.
    Client(&'static str),
}

impl fmt::Display for MqttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTopic => write!(f, "unknown topic"),
            Self::InvalidPayload => write!(f, "invalid payload"),
            Self::Unsupported => write!(f, "unsupported parameter"),
            Self::NotConnected => write!(f, "not connected"),
            Self::Client(msg) => write!(f, "client: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
