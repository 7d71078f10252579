//! Network Layer
//!
//! Collaborator surface over the world: the single-writer service,
//! JSON wire messages, and the WebSocket server.
//! This layer reads the wall clock - all world rules run through `game/`.

pub mod protocol;
pub mod service;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ServerError, ErrorCode};
pub use service::{WorldService, ServiceError};
pub use server::{BonfireServer, ServerConfig, BonfireServerError};
