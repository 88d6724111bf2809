//! # Core Protocol Components
//!
//! Low-level packet handling and the binary wire codec.
//!
//! ## Components
//! - **Opcode**: closed opcode tables for both directions
//! - **Wire**: little-endian integer and NUL-terminated string primitives
//! - **Packet**: opcode/body split of a received buffer
//! - **Codec**: per-opcode decoders, encoders and the socket codec
//!
//! ## Wire Format
//! ```text
//! [Opcode(2, LE)] [Payload(N)]
//! ```
//!
//! There is no length prefix; one socket read carries one packet.

pub mod codec;
pub mod opcode;
pub mod packet;
pub mod wire;
