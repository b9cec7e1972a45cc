//! The operation model: the unit of work queued while offline.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Bounds every queued payload type must satisfy.
///
/// Payloads are persisted in the journal, so they must round-trip through
/// serde; they are handed to executors on other tasks, so they must be
/// `Send + Sync`.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Unique identifier of a queued operation (UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Creates a new random operation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an ID from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Semantic intent passed through to the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Read.
    Get,
    /// Create.
    Post,
    /// Replace.
    Put,
    /// Partial update.
    Patch,
    /// Delete.
    Delete,
}

impl Method {
    /// Returns the upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown method: {other}")),
        }
    }
}

/// Scheduling tier. Declaration order gives `Critical > High > Normal > Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work.
    Low,
    /// The default tier.
    #[default]
    Normal,
    /// Ahead of normal work.
    High,
    /// Always first.
    Critical,
}

impl Priority {
    /// Returns the lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Lifecycle status of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    /// Waiting for a sync pass.
    Pending,
    /// Handed to the executor in the current pass.
    Syncing,
    /// Accepted by the remote system. Terminal.
    Completed,
    /// Retries exhausted or permanently rejected. Terminal.
    Failed,
    /// The remote system reported a divergent state.
    Conflict,
}

impl OperationStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Syncing,
        Self::Completed,
        Self::Failed,
        Self::Conflict,
    ];

    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status: {s}"))
    }
}

/// Reconciliation metadata attached by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMetadata {
    /// Identifier of the business entity being mutated.
    pub entity_id: Option<String>,
    /// Kind of the business entity.
    pub entity_type: Option<String>,
    /// Client-side version; overrides `created_at` in conflict comparison.
    pub client_version: Option<DateTime<Utc>>,
    /// Last server version the client saw.
    pub server_version: Option<DateTime<Utc>>,
    /// Tenant the entity belongs to.
    pub tenant_id: Option<String>,
}

impl OperationMetadata {
    /// Metadata describing a single entity.
    #[must_use]
    pub fn for_entity(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            entity_type: Some(entity_type.into()),
            ..Self::default()
        }
    }

    /// Sets the client version.
    #[must_use]
    pub fn with_client_version(mut self, version: DateTime<Utc>) -> Self {
        self.client_version = Some(version);
        self
    }

    /// Sets the server version.
    #[must_use]
    pub fn with_server_version(mut self, version: DateTime<Utc>) -> Self {
        self.server_version = Some(version);
        self
    }

    /// Sets the tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Caller input for [`crate::OperationQueue::add`].
#[derive(Debug, Clone)]
pub struct NewOperation<T> {
    /// Caller-defined category.
    pub op_type: String,
    /// Semantic intent.
    pub method: Method,
    /// Opaque target.
    pub url: String,
    /// Data to submit.
    pub payload: T,
    /// Retry ceiling; `0` fails on the first failed attempt.
    pub max_retries: u32,
    /// Scheduling tier.
    pub priority: Priority,
    /// Reconciliation metadata.
    pub metadata: Option<OperationMetadata>,
}

impl<T> NewOperation<T> {
    /// Default retry ceiling for new operations.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Creates a normal-priority operation with the default retry ceiling.
    pub fn new(op_type: impl Into<String>, method: Method, url: impl Into<String>, payload: T) -> Self {
        Self {
            op_type: op_type.into(),
            method,
            url: url.into(),
            payload,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            priority: Priority::Normal,
            metadata: None,
        }
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the retry ceiling.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Attaches reconciliation metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: OperationMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A queued mutation.
///
/// # Invariants
///
/// - exactly one status holds; `Completed` and `Failed` are terminal
/// - `retry_count <= max_retries`
/// - only `status`, `retry_count`, `last_attempt_at`, `error_message`,
///   `conflict_data` and the backoff gate `not_before` change after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation<T> {
    /// Unique identity.
    pub id: OperationId,
    /// Caller-defined category.
    #[serde(rename = "type")]
    pub op_type: String,
    /// Semantic intent.
    pub method: Method,
    /// Opaque target.
    pub url: String,
    /// Data to submit.
    pub payload: T,
    /// Lifecycle status.
    pub status: OperationStatus,
    /// Retryable failures so far.
    pub retry_count: u32,
    /// Retry ceiling.
    pub max_retries: u32,
    /// Scheduling tier.
    pub priority: Priority,
    /// Creation time; FIFO tie-break and default client version.
    pub created_at: DateTime<Utc>,
    /// Journal insertion order; breaks `created_at` ties.
    pub sequence: u64,
    /// Last dispatch time.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Reason for a permanent failure.
    pub error_message: Option<String>,
    /// Server version captured on conflict.
    pub conflict_data: Option<T>,
    /// Reconciliation metadata.
    pub metadata: Option<OperationMetadata>,
    /// Not eligible for dispatch before this instant (retry backoff).
    pub not_before: Option<DateTime<Utc>>,
}

impl<T> Operation<T> {
    /// Materializes caller input into a pending operation.
    pub fn from_new(new: NewOperation<T>, sequence: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: OperationId::new(),
            op_type: new.op_type,
            method: new.method,
            url: new.url,
            payload: new.payload,
            status: OperationStatus::Pending,
            retry_count: 0,
            max_retries: new.max_retries,
            priority: new.priority,
            created_at: now,
            sequence,
            last_attempt_at: None,
            error_message: None,
            conflict_data: None,
            metadata: new.metadata,
            not_before: None,
        }
    }

    /// Builds a fresh pending operation with this one's identity fields and
    /// a new payload.
    ///
    /// The successor keeps `created_at` so it holds the original's place in
    /// its priority tier.
    #[must_use]
    pub fn successor(&self, payload: T, sequence: u64) -> Self
    where
        T: Clone,
    {
        Self {
            id: OperationId::new(),
            op_type: self.op_type.clone(),
            method: self.method,
            url: self.url.clone(),
            payload,
            status: OperationStatus::Pending,
            retry_count: 0,
            max_retries: self.max_retries,
            priority: self.priority,
            created_at: self.created_at,
            sequence,
            last_attempt_at: None,
            error_message: None,
            conflict_data: None,
            metadata: self.metadata.clone(),
            not_before: None,
        }
    }

    /// Timestamp used for the client side of a conflict comparison.
    #[must_use]
    pub fn client_timestamp(&self) -> DateTime<Utc> {
        self.metadata
            .as_ref()
            .and_then(|m| m.client_version)
            .unwrap_or(self.created_at)
    }

    /// Returns true if another retryable failure is within budget.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Returns true if pending and past its backoff gate.
    #[must_use]
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == OperationStatus::Pending && self.not_before.map_or(true, |at| at <= now)
    }
}

/// Number of operations per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Pending operations.
    pub pending: usize,
    /// Operations in flight.
    pub syncing: usize,
    /// Completed, not yet pruned.
    pub completed: usize,
    /// Permanently failed.
    pub failed: usize,
    /// Parked in conflict.
    pub conflict: usize,
}

impl StatusCounts {
    /// Adds one operation of the given status.
    pub fn record(&mut self, status: OperationStatus) {
        match status {
            OperationStatus::Pending => self.pending += 1,
            OperationStatus::Syncing => self.syncing += 1,
            OperationStatus::Completed => self.completed += 1,
            OperationStatus::Failed => self.failed += 1,
            OperationStatus::Conflict => self.conflict += 1,
        }
    }

    /// Total number of operations.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.pending + self.syncing + self.completed + self.failed + self.conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> Operation<String> {
        let new = NewOperation::new("rental", Method::Post, "/rentals", "body".to_string())
            .with_priority(Priority::High);
        Operation::from_new(new, 7, Utc::now())
    }

    #[test]
    fn from_new_fills_defaults() {
        let op = sample();
        assert_eq!(op.status, OperationStatus::Pending);
        assert_eq!(op.retry_count, 0);
        assert_eq!(op.max_retries, NewOperation::<String>::DEFAULT_MAX_RETRIES);
        assert_eq!(op.sequence, 7);
        assert!(op.last_attempt_at.is_none());
        assert!(op.not_before.is_none());
    }

    #[test]
    fn priority_total_order() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn client_version_overrides_created_at() {
        let mut op = sample();
        assert_eq!(op.client_timestamp(), op.created_at);

        let version = op.created_at - Duration::hours(1);
        op.metadata = Some(OperationMetadata::for_entity("rental", "r-1").with_client_version(version));
        assert_eq!(op.client_timestamp(), version);
    }

    #[test]
    fn readiness_honors_backoff_gate() {
        let mut op = sample();
        let now = Utc::now();
        assert!(op.is_ready(now));

        op.not_before = Some(now + Duration::seconds(5));
        assert!(!op.is_ready(now));
        assert!(op.is_ready(now + Duration::seconds(5)));

        op.status = OperationStatus::Failed;
        assert!(!op.is_ready(now + Duration::seconds(10)));
    }

    #[test]
    fn successor_keeps_identity_fields() {
        let mut op = sample();
        op.status = OperationStatus::Conflict;
        op.retry_count = 2;
        op.conflict_data = Some("server".to_string());

        let next = op.successor("merged".to_string(), 9);
        assert_ne!(next.id, op.id);
        assert_eq!(next.op_type, op.op_type);
        assert_eq!(next.priority, op.priority);
        assert_eq!(next.created_at, op.created_at);
        assert_eq!(next.status, OperationStatus::Pending);
        assert_eq!(next.retry_count, 0);
        assert_eq!(next.payload, "merged");
        assert!(next.conflict_data.is_none());
    }

    #[test]
    fn names_parse_back() {
        for status in OperationStatus::ALL {
            assert_eq!(status.as_str().parse::<OperationStatus>().unwrap(), status);
        }
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!("critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("urgent".parse::<Priority>().is_err());
        assert!(OperationStatus::Completed.is_terminal());
        assert!(!OperationStatus::Conflict.is_terminal());
    }

    #[test]
    fn status_counts_total() {
        let mut counts = StatusCounts::default();
        counts.record(OperationStatus::Pending);
        counts.record(OperationStatus::Failed);
        counts.record(OperationStatus::Failed);
        assert_eq!(counts.failed, 2);
        assert_eq!(counts.total(), 3);
    }
}
