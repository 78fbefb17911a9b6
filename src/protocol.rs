//! Line-delimited stream protocol
//!
//! The answer endpoint replies with `data: {json}` lines separated by blank
//! lines. [`FrameDecoder`] recovers [`StreamEvent`]s from raw chunks.

mod event;
mod frame;

#[cfg(test)]
mod proptests;

pub use event::StreamEvent;
pub use frame::{FrameDecoder, EVENT_PREFIX};
