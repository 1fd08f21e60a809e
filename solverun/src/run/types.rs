//! Wire and domain types shared by every run component.
//!
//! These mirror the job-control contract of the remote solver: run status
//! documents returned by `GET /runs/{id}`, the result payload carried by
//! status documents and stream events, and the client-side [`Alternative`]
//! record used for best-of ranking.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Solver status tag that marks a provably optimal solution.
pub const OPTIMAL_STATUS: &str = "optimal";

/// Lifecycle state reported by the backend for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunState {
    /// Returns true for states the backend will never leave.
    ///
    /// Note that `Succeeded` without a materialized result is still treated
    /// as transient by the poll loop; see [`RunStatus::is_materialized`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary objective score reported alongside the completion counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveScore {
    pub score: f64,
    pub possible: f64,
}

/// Output payload of a run.
///
/// Only the completion counts, the status tag and the secondary score are
/// interpreted here. Everything else the solver sends is kept verbatim in
/// `extra` and round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveResult {
    /// Solution identifier, when the solver assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Units of work the solution managed to place.
    pub scheduled: u32,

    /// Units of work requested.
    pub total: u32,

    /// Solver status tag, e.g. `optimal` or `feasible`.
    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<ObjectiveScore>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SolveResult {
    /// Creates a result with the given completion counts and no status tag.
    pub fn new(scheduled: u32, total: u32) -> Self {
        Self {
            id: None,
            scheduled,
            total,
            status: String::new(),
            secondary: None,
            extra: Map::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_secondary(mut self, score: f64, possible: f64) -> Self {
        self.secondary = Some(ObjectiveScore { score, possible });
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns true if the solver tagged this result as optimal.
    pub fn is_optimal(&self) -> bool {
        self.status.eq_ignore_ascii_case(OPTIMAL_STATUS)
    }

    /// Returns true if every unit of work was scheduled.
    pub fn is_complete(&self) -> bool {
        self.scheduled >= self.total
    }

    /// Secondary score used for ranking; a missing score ranks lowest.
    pub fn secondary_score(&self) -> f64 {
        self.secondary.map(|s| s.score).unwrap_or(-1.0)
    }
}

/// Status document for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub run_id: String,
    pub status: RunState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SolveResult>,
}

impl RunStatus {
    /// Creates a status document stamped with the current time.
    pub fn new(run_id: impl Into<String>, status: RunState) -> Self {
        Self {
            run_id: run_id.into(),
            status,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            result: None,
        }
    }

    pub fn with_result(mut self, result: SolveResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns true once the backend reports success *and* has serialized
    /// the result payload.
    pub fn is_materialized(&self) -> bool {
        self.status == RunState::Succeeded && self.result.is_some()
    }
}

/// Kind of a push-channel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Snapshot,
    Final,
    Heartbeat,
    Meta,
    SolverError,
}

impl EventKind {
    /// Returns true for kinds whose payload is a [`SolveResult`].
    pub fn carries_result(&self) -> bool {
        matches!(self, Self::Snapshot | Self::Final)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Final => "final",
            Self::Heartbeat => "heartbeat",
            Self::Meta => "meta",
            Self::SolverError => "solver-error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "snapshot" => Ok(Self::Snapshot),
            "final" => Ok(Self::Final),
            "heartbeat" => Ok(Self::Heartbeat),
            "meta" => Ok(Self::Meta),
            "solver-error" | "solver_error" => Ok(Self::SolverError),
            other => Err(format!("unknown event type '{}'", other)),
        }
    }
}

/// Payload of a stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    Result(SolveResult),
    Metadata(Value),
}

/// A decoded push-channel event.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub kind: EventKind,
    pub payload: StreamPayload,
    /// Time the envelope was stamped by the server, or local arrival time
    /// when the envelope carries no timestamp.
    pub received_at: DateTime<Utc>,
}

impl StreamEvent {
    /// Returns the result payload for `snapshot` and `final` events.
    pub fn result(&self) -> Option<&SolveResult> {
        match &self.payload {
            StreamPayload::Result(result) => Some(result),
            StreamPayload::Metadata(_) => None,
        }
    }

    /// Returns the metadata payload for non-result events.
    pub fn metadata(&self) -> Option<&Value> {
        match &self.payload {
            StreamPayload::Metadata(value) => Some(value),
            StreamPayload::Result(_) => None,
        }
    }
}

/// Channel a tracked solution was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlternativeSource {
    Push,
    Poll,
}

/// A solution retained for best-of ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub id: String,
    pub result: SolveResult,
    pub received_at: DateTime<Utc>,
    pub source: AlternativeSource,
}

/// Kind of job submitted to the solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    #[default]
    Solve,
    Explain,
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "solve" => Ok(Self::Solve),
            "explain" => Ok(Self::Explain),
            other => Err(format!("unknown job kind '{}'", other)),
        }
    }
}

/// Job specification posted to `POST /runs`.
///
/// The payload is opaque; it is forwarded as-is with the job kind merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub kind: JobKind,
    pub payload: Value,
}

impl JobSpec {
    pub fn new(kind: JobKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    pub fn solve(payload: Value) -> Self {
        Self::new(JobKind::Solve, payload)
    }

    pub fn explain(payload: Value) -> Self {
        Self::new(JobKind::Explain, payload)
    }

    /// Builds the request body.
    ///
    /// Object payloads get a `kind` field merged in; anything else is
    /// wrapped as `{"kind": ..., "payload": ...}`.
    pub fn to_body(&self) -> Value {
        let kind = Value::String(match self.kind {
            JobKind::Solve => "solve".to_string(),
            JobKind::Explain => "explain".to_string(),
        });
        match &self.payload {
            Value::Object(fields) => {
                let mut body = fields.clone();
                body.insert("kind".to_string(), kind);
                Value::Object(body)
            }
            other => {
                let mut body = Map::new();
                body.insert("kind".to_string(), kind);
                body.insert("payload".to_string(), other.clone());
                Value::Object(body)
            }
        }
    }
}
