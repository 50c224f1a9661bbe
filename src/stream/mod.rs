//! Line-delimited JSON stream handling for the child process's stdio.
//!
//! [`codec`] frames raw bytes into lines, [`wire`] models the typed wire
//! messages in both directions, and [`accumulator`] tracks in-flight tool
//! invocations announced across a turn.

pub mod accumulator;
pub mod codec;
pub mod wire;

pub use accumulator::{ToolInvocation, ToolUseAccumulator};
pub use codec::StreamCodec;
pub use wire::{decode_line, ContentBlock, Delta, OutboundMessage, StreamEventBody, StreamMessage};
