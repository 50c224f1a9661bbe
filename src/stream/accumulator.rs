//! Tool-use accumulator.
//!
//! Tracks the ordered collection of tool invocations announced by the model
//! during the current turn. Input arrives either incrementally — a
//! `content_block_start` opens the invocation and `input_json_delta`
//! fragments build up its JSON input — or atomically, as fully-formed
//! `tool_use` blocks inside an assistant message. Both forms are accepted;
//! the whole-input form wins when both arrive for the same invocation.
//!
//! Deltas referencing an unknown block index or invocation id are discarded
//! rather than failing the loop.

use serde_json::Value;
use tracing::debug;

/// A finalized tool invocation, ready for execution.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Invocation identifier, unique within the turn.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Fully-accumulated input payload.
    pub input: Value,
}

/// An invocation still being assembled from the stream.
#[derive(Debug)]
struct PendingInvocation {
    /// Content-block index the invocation was announced at, when known.
    block_index: Option<u64>,
    id: String,
    name: String,
    /// Raw concatenation of `partial_json` fragments.
    input_buf: String,
    /// Complete input delivered via the whole-input form, if any.
    whole_input: Option<Value>,
}

impl PendingInvocation {
    /// Resolve the final input payload.
    ///
    /// Whole-input form takes precedence; otherwise the accumulated fragment
    /// buffer is parsed as JSON. An empty or unparseable buffer falls back to
    /// an empty object so the executor always receives a structured payload.
    fn finalize(self) -> ToolInvocation {
        let input = match self.whole_input {
            Some(value) if !value.is_null() => value,
            _ => {
                let trimmed = self.input_buf.trim();
                if trimmed.is_empty() {
                    Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(trimmed).unwrap_or_else(|err| {
                        debug!(id = self.id, %err, "accumulated tool input is not valid JSON");
                        Value::Object(serde_json::Map::new())
                    })
                }
            }
        };

        ToolInvocation {
            id: self.id,
            name: self.name,
            input,
        }
    }
}

/// Ordered accumulator of in-flight tool invocations for the current turn.
#[derive(Debug, Default)]
pub struct ToolUseAccumulator {
    in_flight: Vec<PendingInvocation>,
}

impl ToolUseAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations currently in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether any invocations are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Record a tool-use announcement from a `content_block_start` event.
    ///
    /// `initial_input` carries whatever the block opened with (usually an
    /// empty object); a non-empty object is kept as a whole-input candidate.
    pub fn begin(&mut self, block_index: Option<u64>, id: &str, name: &str, initial_input: Value) {
        let whole_input = match &initial_input {
            Value::Object(map) if !map.is_empty() => Some(initial_input),
            _ => None,
        };

        self.in_flight.push(PendingInvocation {
            block_index,
            id: id.to_owned(),
            name: name.to_owned(),
            input_buf: String::new(),
            whole_input,
        });
    }

    /// Append an `input_json_delta` fragment to the matching invocation.
    ///
    /// Matches by content-block index first, falling back to the most
    /// recently announced invocation when the event carries no index. A
    /// fragment with no matching in-flight entry is discarded.
    pub fn append_fragment(&mut self, block_index: Option<u64>, fragment: &str) {
        if fragment.is_empty() {
            return;
        }

        let target = match block_index {
            Some(idx) => self
                .in_flight
                .iter_mut()
                .find(|inv| inv.block_index == Some(idx)),
            None => self.in_flight.last_mut(),
        };

        match target {
            Some(inv) => inv.input_buf.push_str(fragment),
            None => {
                debug!(?block_index, "discarding input delta with no in-flight invocation");
            }
        }
    }

    /// Record a fully-formed `tool_use` block from an assistant message.
    ///
    /// If the invocation id is already in flight (announced incrementally),
    /// its input is replaced by the complete form; otherwise a new invocation
    /// is appended.
    pub fn supply_whole(&mut self, id: &str, name: &str, input: Value) {
        if let Some(existing) = self.in_flight.iter_mut().find(|inv| inv.id == id) {
            existing.whole_input = Some(input);
            return;
        }

        self.in_flight.push(PendingInvocation {
            block_index: None,
            id: id.to_owned(),
            name: name.to_owned(),
            input_buf: String::new(),
            whole_input: Some(input),
        });
    }

    /// Freeze the current turn's invocations and clear for the next turn.
    ///
    /// Returns the invocations in announcement order, each with its input
    /// resolved per [`PendingInvocation::finalize`] semantics.
    pub fn finish_turn(&mut self) -> Vec<ToolInvocation> {
        std::mem::take(&mut self.in_flight)
            .into_iter()
            .map(PendingInvocation::finalize)
            .collect()
    }
}
