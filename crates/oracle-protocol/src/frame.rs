//! Frame encoding for the plan stream.
//!
//! A frame is one `data: <json>` server-sent event terminated by a blank
//! line. Byte-level parsing of the stream lives with the client; this module
//! owns the payload format only. Payloads that fail to parse are dropped,
//! never surfaced.

use crate::event::AgentEvent;
use serde_json::json;
use tracing::debug;

/// Field name of a data line.
pub const DATA_PREFIX: &str = "data:";

/// Content type of the stream.
pub const CONTENT_TYPE: &str = "text/event-stream";

/// Serialize one event as a complete frame, blank-line terminated.
pub fn encode_frame(event: &AgentEvent) -> String {
    let payload = serde_json::to_string(event).unwrap_or_else(|error| {
        json!({ "type": "error", "content": error.to_string() }).to_string()
    });
    format!("{DATA_PREFIX} {payload}\n\n")
}

/// Frame carrying a single `error` event.
pub fn error_frame(message: impl Into<String>) -> String {
    encode_frame(&AgentEvent::error(message))
}

/// Decode the data of one frame. `None` for empty or malformed payloads.
pub fn decode_data(data: &str) -> Option<AgentEvent> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str::<AgentEvent>(data) {
        Ok(event) => Some(event),
        Err(error) => {
            debug!(%error, bytes = data.len(), "dropping malformed frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SessionId;

    #[test]
    fn frame_is_a_blank_line_terminated_data_line() {
        let frame = encode_frame(&AgentEvent::Session {
            session_id: SessionId::from_string("abc"),
        });
        assert_eq!(frame, "data: {\"type\":\"session\",\"session_id\":\"abc\"}\n\n");
    }

    #[test]
    fn data_decodes_to_event() {
        assert_eq!(decode_data("{\"type\":\"done\"}"), Some(AgentEvent::Done));
        assert_eq!(decode_data("  {\"type\":\"done\"}\r"), Some(AgentEvent::Done));
    }

    #[test]
    fn malformed_and_unknown_payloads_are_dropped() {
        assert_eq!(decode_data("{not json}"), None);
        assert_eq!(decode_data("{\"type\":\"future_kind\"}"), None);
        assert_eq!(decode_data(""), None);
    }

    #[test]
    fn error_frame_round_trips_through_data() {
        let frame = error_frame("upstream refused");
        let data = frame.strip_prefix(DATA_PREFIX).map(str::trim).unwrap();
        assert_eq!(decode_data(data), Some(AgentEvent::error("upstream refused")));
    }
}
