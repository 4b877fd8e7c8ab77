//! Types, wire schemas and crypto primitives shared between the coordinator
//! and participant binaries. Neither binary owns the protocol; this crate
//! does, so the two sides can't silently drift apart.

pub mod bigint;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod error;
pub mod prg;
pub mod types;

pub use bigint::WireUint;
pub use error::{Error, Result};
pub use types::{ClientMessage, HandshakeEnvelope, HexBytes, ServerMessage};
