//! Gateway submission: request envelope, defensive response decoding,
//! and retry classification.
//!
//! The gateway's response formats drifted over the years, so decoding
//! works through an ordered ladder of strategies rather than a single
//! schema. See [`decode_reply`].

mod client;
mod decode;
mod envelope;
mod retry;

pub use client::*;
pub use decode::*;
pub use envelope::*;
pub use retry::*;
