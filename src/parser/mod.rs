//! Email parsing: message decoding and MBOX boundary scanning.

pub mod decode;
pub mod mbox;

pub use decode::{decode, DecodedMessage};
