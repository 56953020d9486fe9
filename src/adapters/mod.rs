//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements         | Connects to                   |
//! |---------------|--------------------|-------------------------------|
//! | `log_sink`    | EventSink          | Serial log output             |
//! | `mqtt_client` | MqttClientPort     | ESP-IDF MQTT client (target)  |
//! | `nvs`         | StoragePort        | NVS / in-memory store         |
//! | `socket`      | ClientSink         | Non-blocking TCP listener     |
//! | `time`        | Clock, TimeSource  | esp_timer + SNTP wall clock   |

pub mod log_sink;
#[cfg(target_os = "espidf")]
pub mod mqtt_client;
pub mod nvs;
pub mod socket;
pub mod time;
