//! # Core Wire Components
//!
//! Low-level byte handling: the VarNum codec, frame readers and the frame codec.
//!
//! ## Components
//! - **VarNum**: VarInt/VarLong encoding and an incremental decoder
//! - **Stream**: async framing layer over a live transport
//! - **Buffer**: non-suspending cursor over one received frame
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [VarInt length] [VarInt packet id] [body(length - id bytes)]
//! ```
//!
//! ## Security
//! - Frame length is checked against the configured cap before allocation
//! - A VarInt longer than 5 bytes (VarLong: 10) is rejected

pub mod buffer;
pub mod codec;
pub mod stream;
pub mod varnum;
