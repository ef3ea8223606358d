//! Bridge between an MCZ Maestro pellet stove and a message bus.
//!
//! The stove speaks a `|`-delimited text protocol over a WebSocket. This
//! crate keeps one session open at a time, forwards bus commands to the
//! stove and publishes stove state changes back to the bus.
//!
//! # Topics
//!
//! ```text
//! <subscribe_topic>/<Command>     numeric payload       (topic mode)
//! <subscribe_topic>               {"Command","Value"}   (json mode)
//! <publish_topic>/<Key>           state value or Status (topic mode)
//! <publish_topic>                 JSON object           (json mode)
//! ```
//!
//! # Tasks
//!
//! - command intake: bus messages into the [`coalescer::CommandCoalescer`]
//! - state timer: periodic `GetInfo` while connected
//! - [`supervisor::ConnectionSupervisor`]: session lifecycle and send loop
//! - publisher: forwards rendered publications to the bus

pub mod bridge;
pub mod cache;
pub mod coalescer;
pub mod command;
pub mod config;
pub mod frame;
pub mod protocol;
pub mod session;
pub mod supervisor;
