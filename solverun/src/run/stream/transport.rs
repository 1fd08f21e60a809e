//! Framed push-channel transports.
//!
//! The subscriber only sees a stream of [`Frame`]s; how they are framed on
//! the wire is the transport's business. [`HttpEventStream`] reads
//! `text/event-stream` over HTTP.

use std::future::Future;
use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};

use super::frame::{Frame, SseFrameDecoder};
use crate::run::client::{ClientConfig, USER_AGENT};
use crate::run::error::TransportError;

/// Boxed stream of frames; ends when the server closes the connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// Opens push subscriptions.
pub trait PushTransport: Send + Sync {
    /// Connects to the push stream of `run_id`.
    fn connect(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<FrameStream, TransportError>> + Send;
}

/// Server-sent events over HTTP (`GET /runs/{id}/stream`).
#[derive(Clone)]
pub struct HttpEventStream {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpEventStream {
    /// Builds a stream client from the job-control settings.
    ///
    /// The request timeout only bounds connection setup; an open stream may
    /// stay idle for as long as the server keeps it.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn stream_url(&self, run_id: &str) -> String {
        format!("{}/runs/{}/stream", self.base_url, run_id)
    }
}

impl PushTransport for HttpEventStream {
    async fn connect(&self, run_id: &str) -> Result<FrameStream, TransportError> {
        let url = self.stream_url(run_id);
        let mut request = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream");
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Push stream connection failed");
            TransportError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
                url,
            });
        }
        debug!(url = %url, "Push stream connected");

        Ok(decode_byte_stream(response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| TransportError::Network(e.to_string()))
        })))
    }
}

/// Turns a stream of byte chunks into a stream of SSE frames.
pub fn decode_byte_stream<S, B>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<B, TransportError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    struct State<S> {
        bytes: Pin<Box<S>>,
        decoder: SseFrameDecoder,
        ready: std::collections::VecDeque<Frame>,
        done: bool,
    }

    let state = State {
        bytes: Box::pin(bytes),
        decoder: SseFrameDecoder::new(),
        ready: Default::default(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.ready.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => state.ready.extend(state.decoder.feed(chunk.as_ref())),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    state.ready.extend(state.decoder.finish());
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_stream_url() {
        let transport = HttpEventStream::new(&ClientConfig::new("http://solver/")).unwrap();
        assert_eq!(transport.stream_url("r-9"), "http://solver/runs/r-9/stream");
    }

    #[tokio::test]
    async fn test_decode_byte_stream_across_chunks() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"event: snapshot\nda")),
            Ok(Bytes::from_static(b"ta: {}\n\ndata: tail")),
        ];
        let frames: Vec<_> = decode_byte_stream(stream::iter(chunks)).collect().await;

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].as_ref().unwrap().event.as_deref(), Some("snapshot"));
        assert_eq!(frames[1].as_ref().unwrap().data, "tail");
    }

    #[tokio::test]
    async fn test_decode_byte_stream_stops_after_error() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"data: a\n\n")),
            Err(TransportError::Network("reset".into())),
            Ok(Bytes::from_static(b"data: b\n\n")),
        ];
        let frames: Vec<_> = decode_byte_stream(stream::iter(chunks)).collect().await;

        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_ok());
        assert!(frames[1].is_err());
    }
}
