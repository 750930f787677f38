//! Self-delimiting block framing
//!
//! Blocks are embedded in a continuous byte stream as
//! `START`, escaped payload, `END`:
//!
//! ```text
//! 0x01 [payload with 0x01/0x00/0xFF escaped as 0xFF 0x02/0x03/0x04] 0x00
//! ```
//!
//! Because the markers never occur inside a frame, a reader can locate
//! block boundaries scanning in either direction, with no length prefix
//! and no index.

pub mod codec;
mod reader;
mod writer;

pub use codec::{
    END_BYTE, ESCAPE_BYTE, ESCAPED_END_BYTE, ESCAPED_ESCAPE_BYTE, ESCAPED_START_BYTE, START_BYTE,
    frame_block, unescape_block,
};
pub use reader::{BlockReader, READ_CHUNK_SIZE};
pub use writer::BlockWriter;
