use std::pin::Pin;

use bytes::Bytes;
use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};
use oracle_protocol::{AgentEvent, decode_data};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

pub type AgentEventStream = Pin<Box<dyn Stream<Item = ClientResult<AgentEvent>> + Send>>;

/// Decode a server-sent event byte stream into agent events.
///
/// Frames may be split across chunks at any byte. Events whose data is not a
/// known `AgentEvent` are dropped, as are undecodable lines. Only a transport
/// failure is yielded as an error. An event left unterminated when the body
/// ends is discarded.
pub fn parse_agent_stream<S, E>(byte_stream: S) -> AgentEventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + 'static,
{
    let events = byte_stream
        .map(|result| result.map_err(|e| std::io::Error::other(e.to_string())))
        .eventsource()
        .filter_map(|result| async move {
            match result {
                Ok(event) => decode_data(&event.data).map(Ok),
                Err(EventStreamError::Transport(error)) => {
                    Some(Err(ClientError::Interrupted(error.to_string())))
                }
                Err(error) => {
                    debug!(%error, "dropping undecodable frame");
                    None
                }
            }
        });

    Box::pin(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use oracle_protocol::{Plan, SessionId, SubTask, encode_frame};
    use pretty_assertions::assert_eq;

    fn sample_stream() -> (Vec<AgentEvent>, Vec<u8>) {
        let events = vec![
            AgentEvent::Session {
                session_id: SessionId::from_string("abc"),
            },
            AgentEvent::Thinking {
                content: "Analysing… नमस्ते ✓".to_owned(),
            },
            AgentEvent::PlanDecomposed {
                subtasks: vec![SubTask::new(1, "Find schemes", "grant_finder")],
            },
            AgentEvent::SubtaskStart {
                subtask_id: 1,
                description: None,
            },
            AgentEvent::Result {
                plan: Box::new(Plan {
                    goal: "fund my studies".to_owned(),
                    ..Plan::default()
                }),
            },
            AgentEvent::Done,
        ];
        let mut bytes = Vec::new();
        for (index, event) in events.iter().enumerate() {
            bytes.extend_from_slice(encode_frame(event).as_bytes());
            if index == 2 {
                bytes.extend_from_slice(b": keep-alive comment\n\n");
                bytes.extend_from_slice(b"data: {\"type\":\"thinking\",\"content\n\n");
                bytes.extend_from_slice(b"event: ping\n\n");
                bytes.extend_from_slice(b"data: {\"type\":\"future_kind\"}\r\n\r\n");
            }
        }
        (events, bytes)
    }

    async fn decode_chunks(chunks: Vec<Vec<u8>>) -> Vec<AgentEvent> {
        let body = stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, std::io::Error>(Bytes::from(chunk))),
        );
        parse_agent_stream(body)
            .map(|item| item.unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn whole_stream_decodes_in_order() {
        let (events, bytes) = sample_stream();
        assert_eq!(decode_chunks(vec![bytes]).await, events);
    }

    #[tokio::test]
    async fn any_single_split_point_yields_the_same_events() {
        let (events, bytes) = sample_stream();
        for offset in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(offset);
            let decoded = decode_chunks(vec![head.to_vec(), tail.to_vec()]).await;
            assert_eq!(decoded, events, "split at {offset}");
        }
    }

    #[tokio::test]
    async fn byte_at_a_time_yields_the_same_events() {
        let (events, bytes) = sample_stream();
        let chunks = bytes.chunks(1).map(<[u8]>::to_vec).collect();
        assert_eq!(decode_chunks(chunks).await, events);
    }

    #[tokio::test]
    async fn irregular_chunk_sizes_yield_the_same_events() {
        let (events, bytes) = sample_stream();
        for stride in [2_usize, 3, 7, 13, 64] {
            let mut chunks = Vec::new();
            let mut rest = bytes.as_slice();
            let mut size = 1;
            while !rest.is_empty() {
                let take = size.min(rest.len());
                let (head, tail) = rest.split_at(take);
                chunks.push(head.to_vec());
                rest = tail;
                size = (size * stride) % 97 + 1;
            }
            assert_eq!(decode_chunks(chunks).await, events, "stride {stride}");
        }
    }

    #[tokio::test]
    async fn prefix_without_space_is_accepted() {
        let decoded = decode_chunks(vec![b"data:{\"type\":\"done\"}\n\n".to_vec()]).await;
        assert_eq!(decoded, vec![AgentEvent::Done]);
    }

    #[tokio::test]
    async fn transport_failure_is_yielded_after_earlier_events() {
        let frame = encode_frame(&AgentEvent::Done);
        let body = stream::iter(vec![
            Ok(Bytes::from(frame)),
            Err(std::io::Error::other("connection reset")),
        ]);
        let items: Vec<_> = parse_agent_stream(body).collect().await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(AgentEvent::Done)));
        assert!(matches!(
            &items[1],
            Err(ClientError::Interrupted(message)) if message.contains("connection reset")
        ));
    }
}
