//! Event types published to host applications.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so hosts can
//! forward them over their own event bus (UI bridge, websocket, log file).

pub mod events;
