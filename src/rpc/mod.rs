//! Remote-control subsystem.
//!
//! Two front ends share one dispatch path into the application service:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        RPC Stack                             │
//! │                                                              │
//! │  ┌───────────┐   ┌──────────┐   ┌─────────┐   ┌───────────┐  │
//! │  │ ClientSink│──▶│ channels │──▶│  codec  │──▶│  engine   │  │
//! │  │ (socket)  │   │ (queue)  │   │ (frame) │   │ → Service │  │
//! │  └───────────┘   └──────────┘   └─────────┘   └───────────┘  │
//! │        ▲                                            │        │
//! │        │            ┌─────────── bus ◀──────────────┘        │
//! │        │            ▼                                        │
//! │  ┌───────────┐   ┌──────────┐        ┌──────────────────┐    │
//! │  │    ws     │◀──│  outbox  │        │ mqtt (topics ⇄   │    │
//! │  │ (fan-out) │   └──────────┘        │ registry fields) │    │
//! │  └───────────┘                       └──────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod codec;
pub mod engine;
pub mod mqtt;
pub mod transport;
pub mod value;
pub mod ws;
