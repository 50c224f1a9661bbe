//! Typed wire messages exchanged with the child process.
//!
//! Inbound messages (child stdout) are modelled as tagged unions over the
//! small closed set of shapes the binary emits in `stream-json` mode, with an
//! explicit `Unknown` fallback for anything unrecognised. Outbound messages
//! (child stdin) are the initial user message and per-invocation tool
//! replies.
//!
//! # Inbound message types
//!
//! | `type`         | Maps to                                   |
//! |----------------|-------------------------------------------|
//! | `system`       | [`StreamMessage::System`]                 |
//! | `assistant`    | [`StreamMessage::Assistant`]              |
//! | `stream_event` | [`StreamMessage::StreamEvent`]            |
//! | `result`       | [`StreamMessage::Result`]                 |
//! | `user`         | [`StreamMessage::User`] (echo; ignored)   |
//! | *(any other)*  | [`StreamMessage::Unknown`]; skipped       |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Top-level message read from the child's output channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Session bootstrap information emitted once at startup.
    System {
        /// Message subtype (e.g. `init`).
        #[serde(default)]
        subtype: String,
        /// Session identifier assigned by the binary.
        #[serde(default)]
        session_id: String,
    },
    /// A consolidated assistant message with fully-formed content blocks.
    Assistant {
        /// The message body.
        message: MessageBody,
    },
    /// A low-level streaming event (text deltas, tool-use announcements).
    StreamEvent {
        /// The nested event payload.
        event: StreamEventBody,
    },
    /// Terminal result carrying the final response text.
    Result {
        /// Final response text.
        #[serde(default)]
        result: String,
        /// Whether the run ended in error.
        #[serde(default)]
        is_error: bool,
        /// Number of turns consumed.
        #[serde(default)]
        num_turns: u32,
        /// Total run duration in milliseconds.
        #[serde(default)]
        duration_ms: u64,
    },
    /// Echo of a message this side wrote; carries nothing actionable.
    User,
    /// Unrecognised message shape; ignored by the loop.
    #[serde(other)]
    Unknown,
}

/// Assistant/user message body with its ordered content blocks.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    /// Message role (`user` or `assistant`).
    #[serde(default)]
    pub role: String,
    /// Ordered content blocks.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// One content block inside a message, inbound or outbound.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool the model asks to execute.
    ToolUse {
        /// Invocation identifier, unique within a turn.
        #[serde(default)]
        id: String,
        /// Tool name (e.g. `computer`).
        #[serde(default)]
        name: String,
        /// Tool input payload; may be empty at block start.
        #[serde(default)]
        input: Value,
    },
    /// An image payload (base64-encoded).
    Image {
        /// Image source descriptor.
        source: ImageSource,
    },
    /// Unrecognised block shape; ignored.
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    /// Build a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Build a base64 PNG image block.
    #[must_use]
    pub fn png_image(data: impl Into<String>) -> Self {
        Self::Image {
            source: ImageSource {
                kind: "base64".into(),
                media_type: "image/png".into(),
                data: data.into(),
            },
        }
    }
}

/// Source descriptor for an image content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSource {
    /// Encoding kind; always `base64` in this protocol.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// MIME type of the image data.
    #[serde(default)]
    pub media_type: String,
    /// Encoded image bytes.
    #[serde(default)]
    pub data: String,
}

/// Nested event payload of a `stream_event` message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventBody {
    /// A new content block has opened.
    ContentBlockStart {
        /// Position of the block within the message.
        #[serde(default)]
        index: Option<u64>,
        /// The opening block, possibly with empty input.
        content_block: ContentBlock,
    },
    /// An incremental addition to an open content block.
    ContentBlockDelta {
        /// Position of the block the delta belongs to.
        #[serde(default)]
        index: Option<u64>,
        /// The delta payload.
        delta: Delta,
    },
    /// The model finished its turn.
    MessageStop,
    /// Unrecognised event shape; ignored.
    #[serde(other)]
    Unknown,
}

/// Delta payload of a `content_block_delta` event.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delta {
    /// Incremental response text.
    TextDelta {
        /// The text fragment.
        #[serde(default)]
        text: String,
    },
    /// Incremental fragment of a tool invocation's JSON input.
    InputJsonDelta {
        /// The raw JSON fragment; valid JSON only once fully accumulated.
        #[serde(default)]
        partial_json: String,
    },
    /// Unrecognised delta shape; ignored.
    #[serde(other)]
    Unknown,
}

/// Message written to the child's input channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// The initial user message opening the conversation.
    User {
        /// The message body.
        message: OutboundUserMessage,
    },
    /// Reply carrying the outcome of one tool invocation.
    ToolResult {
        /// Identifier of the invocation being answered.
        tool_use_id: String,
        /// Result content blocks (text and/or image).
        content: Vec<ContentBlock>,
        /// Set when the invocation failed.
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Body of the initial outbound user message.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundUserMessage {
    /// Always `user`.
    pub role: String,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

impl OutboundMessage {
    /// Build the initial user message from content blocks.
    #[must_use]
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self::User {
            message: OutboundUserMessage {
                role: "user".into(),
                content,
            },
        }
    }

    /// Serialise to one NDJSON line including the trailing newline.
    ///
    /// Serialisation of these fixed shapes cannot fail; any serde error is
    /// absorbed into an empty line, which the child ignores.
    #[must_use]
    pub fn to_ndjson(&self) -> Vec<u8> {
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }
}

/// Decode one raw line from the output channel into a [`StreamMessage`].
///
/// Deliberately lenient: blank lines and lines that fail to parse as JSON
/// yield `None` instead of an error — the upstream framing is not guaranteed
/// line-atomic under all conditions, and garbage input must never abort the
/// loop. Unrecognised but well-formed messages decode to
/// [`StreamMessage::Unknown`].
#[must_use]
pub fn decode_line(line: &str) -> Option<StreamMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match serde_json::from_str(line) {
        Ok(msg) => Some(msg),
        Err(err) => {
            debug!(%err, "skipping undecodable stream line");
            None
        }
    }
}
