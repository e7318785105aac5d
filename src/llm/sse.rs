// Server-sent events framing shared by the streaming adapters

use crate::types::{AppError, AppResult};
use futures::stream::{self, BoxStream, Stream};
use futures::StreamExt;
use std::collections::VecDeque;

/// `data:` payloads of an SSE response body, ending at `[DONE]` or EOF
pub fn data_events(response: reqwest::Response) -> BoxStream<'static, AppResult<String>> {
    data_events_from(response.bytes_stream().boxed())
}

pub fn data_events_from<S, B, E>(bytes: S) -> BoxStream<'static, AppResult<String>>
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.ready.pop_front() {
                return Some((Ok(data), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    state.drain_lines();
                }
                Some(Err(e)) => {
                    state.done = true;
                    let error = AppError::LLMApi(format!("Stream interrupted: {}", e));
                    return Some((Err(error), state));
                }
                None => {
                    // flush a trailing line without a newline
                    state.buffer.push(b'\n');
                    state.drain_lines();
                    state.done = true;
                }
            }
        }
    })
    .boxed()
}

struct SseState<S> {
    bytes: S,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    done: bool,
}

impl<S> SseState<S> {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            if self.done {
                self.buffer.clear();
                return;
            }
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let Some(data) = line.trim().strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data == "[DONE]" {
                self.done = true;
            } else if !data.is_empty() {
                self.ready.push_back(data.to_string());
            }
        }
    }
}
