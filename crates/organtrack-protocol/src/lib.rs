//! Shared protocol definitions for organtrack
//!
//! Control messages, outbound relay messages and the length-prefixed
//! framing used on every peer connection.

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;

pub use codec::{Decoded, WireCodec};
pub use error::ProtocolError;
pub use messages::*;
pub use types::*;
