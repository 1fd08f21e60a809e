//! One-shot push subscription for a run.
//!
//! [`PushSubscriber::open`] connects through a [`PushTransport`], decodes
//! every frame and dispatches it synchronously to a [`PushHandlers`]
//! implementation from a single task, so handlers see events in arrival
//! order. There is no reconnection: a transport error reports
//! [`ChannelStatus::Error`] once and the subscription is dead.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::envelope::decode_frame;
use super::transport::PushTransport;
use crate::run::types::{EventKind, StreamEvent};

/// Lifecycle of a push subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelStatus {
    Open,
    Error,
    Closed,
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Error => write!(f, "error"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Callbacks for decoded push events.
///
/// Called from the subscriber task; implementations must not block.
/// `final` events are delivered to `on_snapshot` first, then `on_final`.
pub trait PushHandlers: Send + Sync {
    fn on_snapshot(&self, _event: &StreamEvent) {}
    fn on_final(&self, _event: &StreamEvent) {}
    fn on_heartbeat(&self, _event: &StreamEvent) {}
    fn on_meta(&self, _event: &StreamEvent) {}
    fn on_solver_error(&self, _event: &StreamEvent) {}
    fn on_channel_status(&self, _status: ChannelStatus) {}
}

/// State shared between the subscriber task and its [`CloseHandle`].
struct Channel {
    run_id: String,
    handlers: Arc<dyn PushHandlers>,
    token: CancellationToken,
    closed: AtomicBool,
}

impl Channel {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Fires `Closed` the first time it is called.
    fn mark_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        debug!(run_id = %self.run_id, "Push channel closed");
        self.handlers.on_channel_status(ChannelStatus::Closed);
        true
    }

    fn dispatch(&self, event: &StreamEvent) {
        match event.kind {
            EventKind::Snapshot => self.handlers.on_snapshot(event),
            EventKind::Final => {
                self.handlers.on_snapshot(event);
                self.handlers.on_final(event);
            }
            EventKind::Heartbeat => self.handlers.on_heartbeat(event),
            EventKind::Meta => self.handlers.on_meta(event),
            EventKind::SolverError => self.handlers.on_solver_error(event),
        }
    }
}

/// Idempotent close for an open subscription.
#[derive(Clone)]
pub struct CloseHandle {
    channel: Arc<Channel>,
}

impl CloseHandle {
    /// Stops the subscription.
    ///
    /// Fires [`ChannelStatus::Closed`] exactly once per subscription, no
    /// matter how many times this is called or whether the stream already
    /// ended on its own.
    pub fn close(&self) {
        self.channel.mark_closed();
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}

impl fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseHandle")
            .field("run_id", &self.channel.run_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Opens push subscriptions through a transport.
pub struct PushSubscriber<T: PushTransport> {
    transport: Arc<T>,
}

impl<T: PushTransport + 'static> PushSubscriber<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Subscribes to `run_id` and returns the handle that closes it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self, run_id: &str, handlers: Arc<dyn PushHandlers>) -> CloseHandle {
        let channel = Arc::new(Channel {
            run_id: run_id.to_string(),
            handlers,
            token: CancellationToken::new(),
            closed: AtomicBool::new(false),
        });

        let transport = Arc::clone(&self.transport);
        let task_channel = Arc::clone(&channel);
        tokio::spawn(async move {
            Self::pump(transport, task_channel).await;
        });

        CloseHandle { channel }
    }

    async fn pump(transport: Arc<T>, channel: Arc<Channel>) {
        let connected = tokio::select! {
            connected = transport.connect(&channel.run_id) => connected,
            _ = channel.token.cancelled() => return,
        };

        let mut frames = match connected {
            Ok(frames) => frames,
            Err(e) => {
                if !channel.is_closed() {
                    warn!(run_id = %channel.run_id, error = %e, "Push channel failed to open");
                    channel.handlers.on_channel_status(ChannelStatus::Error);
                }
                return;
            }
        };

        if channel.is_closed() {
            return;
        }
        debug!(run_id = %channel.run_id, "Push channel open");
        channel.handlers.on_channel_status(ChannelStatus::Open);

        loop {
            let next = tokio::select! {
                biased;
                _ = channel.token.cancelled() => return,
                next = frames.next() => next,
            };

            match next {
                Some(Ok(frame)) => {
                    if channel.is_closed() {
                        return;
                    }
                    match decode_frame(&frame) {
                        Ok(event) => channel.dispatch(&event),
                        Err(e) => warn!(
                            run_id = %channel.run_id,
                            error = %e,
                            event = frame.event.as_deref().unwrap_or(""),
                            "Dropping malformed push message"
                        ),
                    }
                }
                Some(Err(e)) => {
                    if !channel.is_closed() {
                        warn!(run_id = %channel.run_id, error = %e, "Push channel error");
                        channel.handlers.on_channel_status(ChannelStatus::Error);
                    }
                    return;
                }
                None => {
                    channel.mark_closed();
                    return;
                }
            }
        }
    }
}
