//! Run orchestration and streaming reconciliation.
//!
//! A run is launched with [`RunStatusClient::create_run`], then observed
//! through two unreliable channels at once:
//!
//! - a push subscription ([`PushSubscriber`]) delivering snapshots and the
//!   final result, and
//! - a backoff-driven [`PollLoop`] fetching the run status.
//!
//! Whichever channel sees the authoritative result first writes it into the
//! [`ResultReconciler`]; the other is ignored. Every solution seen on either
//! channel is kept in the [`AlternativeTracker`] for best-of ranking.
//! [`RunHandle::wait`] returns exactly one result or one [`RunError`].

pub mod backoff;
pub mod client;
pub mod error;
pub mod handle;
pub mod observer;
pub mod orchestrator;
pub mod poll;
pub mod reconciler;
pub mod stream;
pub mod tracker;
pub mod types;

pub use backoff::Backoff;
pub use client::{ClientConfig, HttpRunClient, RunStatusClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{EnvelopeError, RunError, TransportError};
pub use handle::{RunCanceller, RunHandle, RunPhase};
pub use observer::{NoopObserver, ObserverSet, RunObserver};
pub use orchestrator::{RunOrchestrator, DEFAULT_RUN_TIMEOUT};
pub use poll::{PollLoop, PollPolicy};
pub use reconciler::{Outcome, ResultReconciler};
pub use stream::{
    ChannelStatus, CloseHandle, Frame, FrameStream, HttpEventStream, PushHandlers, PushSubscriber,
    PushTransport, SseFrameDecoder,
};
pub use tracker::{AlternativeTracker, RankCriteria};
pub use types::{
    Alternative, AlternativeSource, EventKind, JobKind, JobSpec, ObjectiveScore, RunState,
    RunStatus, SolveResult, StreamEvent, StreamPayload,
};

/// Orchestrator over the HTTP client and SSE transport.
pub type HttpOrchestrator = RunOrchestrator<HttpRunClient, HttpEventStream>;

impl HttpOrchestrator {
    /// Builds an orchestrator talking to the backend described by `config`.
    pub fn connect(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = HttpEventStream::new(&config)?;
        let client = HttpRunClient::new(config)?;
        Ok(RunOrchestrator::new(
            std::sync::Arc::new(client),
            std::sync::Arc::new(transport),
        ))
    }
}
