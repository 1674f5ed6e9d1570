//! Server-Sent Events decoding for streaming completions
//!
//! Providers answer a streaming request with `data: {...}` lines. The decoder
//! reassembles lines across network chunks and hands each payload to a
//! provider-specific parser that turns it into text.

use super::{LlmError, TextStream};
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;

/// What a provider parser made of one `data:` payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseStep {
    /// A text delta to forward
    Text(String),
    /// Bookkeeping event with no text
    Skip,
    /// The provider signalled the end of the completion
    Done,
}

/// Reassembles `data:` payloads from arbitrary byte chunks
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk, returning every payload completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = data_payload(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a final line that arrived without a trailing newline
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\n', '\r']);
    line.strip_prefix("data:")
        .map(|data| data.trim_start().to_string())
}

struct DecodeState<S, P> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    parse: P,
    eof: bool,
    done: bool,
}

/// Turn a provider byte stream into a stream of text deltas.
///
/// The stream ends on the provider's done marker, on end of input, or
/// right after the first error it yields.
pub fn decode_text_stream<S, B, P>(bytes: S, parse: P) -> TextStream
where
    S: Stream<Item = Result<B, LlmError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    P: FnMut(&str) -> Result<SseStep, LlmError> + Send + 'static,
{
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        parse,
        eof: false,
        done: false,
    };
    Box::pin(stream::unfold(state, next_delta))
}

async fn next_delta<S, B, P>(
    mut st: DecodeState<S, P>,
) -> Option<(Result<String, LlmError>, DecodeState<S, P>)>
where
    S: Stream<Item = Result<B, LlmError>> + Send + Unpin,
    B: AsRef<[u8]> + Send,
    P: FnMut(&str) -> Result<SseStep, LlmError> + Send,
{
    loop {
        if st.done {
            return None;
        }

        if let Some(data) = st.pending.pop_front() {
            match (st.parse)(&data) {
                Ok(SseStep::Text(text)) if !text.is_empty() => return Some((Ok(text), st)),
                Ok(SseStep::Text(_) | SseStep::Skip) => continue,
                Ok(SseStep::Done) => {
                    st.done = true;
                    return None;
                }
                Err(e) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
            }
        }

        if st.eof {
            st.done = true;
            return None;
        }

        match st.bytes.next().await {
            Some(Ok(chunk)) => {
                let payloads = st.decoder.push(chunk.as_ref());
                st.pending.extend(payloads);
            }
            Some(Err(e)) => {
                st.done = true;
                return Some((Err(e), st));
            }
            None => {
                st.eof = true;
                st.pending.extend(st.decoder.finish());
            }
        }
    }
}
