//! iqserve-protocol: rtl_tcp wire protocol framing.
//!
//! The wire protocol is binary with big-endian multi-byte fields and has
//! three message shapes:
//!
//! - Server to client, once, first: the 12-byte [capability
//!   header](header::encode_header) (magic + tuner type + gain count).
//! - Server to client, repeating: raw interleaved 8-bit unsigned I/Q
//!   sample buffers, device-dependent length, no framing.
//! - Client to server, repeating: [5-byte command
//!   frames](command::decode_frame) (1-byte type + 4-byte value).
//!
//! There is no error reply frame; malformed or unrecognized commands are
//! logged server-side and otherwise ignored.

pub mod command;
pub mod header;

pub use command::{
    Command, CommandType, DecodedCommand, FRAME_LEN, decode_frame, encode_frame,
};
pub use header::{HEADER_LEN, MAGIC, decode_header, encode_header};
