//! Conflict description and resolution.
//!
//! Resolution is pure: it maps a [`ConflictInfo`] to a [`Resolution`] and a
//! payload, and never touches the queue. The orchestrator applies the result.

use crate::resolver::ConflictResolver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use syncq_core::Operation;

/// How a conflict is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// Resubmit the client's payload.
    ClientWins,
    /// Accept the server's state; nothing is resubmitted.
    ServerWins,
    /// Resubmit a shallow merge of both payloads.
    Merge,
    /// Leave the operation parked for a human.
    Manual,
}

impl Resolution {
    /// Returns the kebab-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientWins => "client-wins",
            Self::ServerWins => "server-wins",
            Self::Merge => "merge",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A divergence between the client's operation and the server's state.
#[derive(Debug, Clone)]
pub struct ConflictInfo<T> {
    /// The operation that conflicted.
    pub operation: Operation<T>,
    /// What the client tried to write.
    pub client_data: T,
    /// What the server currently holds.
    pub server_data: T,
    /// Client-side version.
    pub client_timestamp: DateTime<Utc>,
    /// Server-side version.
    pub server_timestamp: DateTime<Utc>,
    /// A resolution chosen up front, which short-circuits any resolver.
    pub resolution: Option<Resolution>,
}

impl<T: Clone> ConflictInfo<T> {
    /// Describes a conflict on `operation`.
    ///
    /// The client side is the operation's payload, versioned by
    /// `metadata.client_version` or, failing that, `created_at`.
    pub fn for_operation(
        operation: &Operation<T>,
        server_data: T,
        server_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            client_data: operation.payload.clone(),
            client_timestamp: operation.client_timestamp(),
            operation: operation.clone(),
            server_data,
            server_timestamp,
            resolution: None,
        }
    }

    /// Presets the resolution.
    #[must_use]
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }
}

/// Outcome of resolving a conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConflict<T> {
    /// The chosen resolution.
    pub resolution: Resolution,
    /// Payload to keep or resubmit; `None` for manual resolution.
    pub data: Option<T>,
    /// Whether `data` must be sent to the server again.
    pub should_sync: bool,
    /// Whether a human has to decide.
    pub requires_user_input: bool,
}

/// Payloads that can be merged field by field.
///
/// Record-like payloads merge shallowly with the client winning on key
/// collisions. Anything else degenerates to the client's data.
pub trait MergePayload: Sized {
    /// Merges `client` over `server`.
    fn shallow_merge(client: &Self, server: &Self) -> Self;
}

impl MergePayload for serde_json::Value {
    fn shallow_merge(client: &Self, server: &Self) -> Self {
        match (client, server) {
            (serde_json::Value::Object(client), serde_json::Value::Object(server)) => {
                let mut merged = server.clone();
                for (key, value) in client {
                    merged.insert(key.clone(), value.clone());
                }
                serde_json::Value::Object(merged)
            }
            _ => client.clone(),
        }
    }
}

impl<V: Clone> MergePayload for BTreeMap<String, V> {
    fn shallow_merge(client: &Self, server: &Self) -> Self {
        let mut merged = server.clone();
        merged.extend(client.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

impl<V: Clone, S: BuildHasher + Clone> MergePayload for HashMap<String, V, S> {
    fn shallow_merge(client: &Self, server: &Self) -> Self {
        let mut merged = server.clone();
        merged.extend(client.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

impl MergePayload for String {
    fn shallow_merge(client: &Self, _server: &Self) -> Self {
        client.clone()
    }
}

impl MergePayload for Vec<u8> {
    fn shallow_merge(client: &Self, _server: &Self) -> Self {
        client.clone()
    }
}

/// Last-write-wins: the client wins only with a strictly newer timestamp.
/// Ties go to the server.
pub fn last_write_wins<T>(conflict: &ConflictInfo<T>) -> Resolution {
    if conflict.client_timestamp > conflict.server_timestamp {
        Resolution::ClientWins
    } else {
        Resolution::ServerWins
    }
}

/// Turns a resolution into the payload and follow-up it implies.
pub fn apply_resolution<T>(conflict: &ConflictInfo<T>, resolution: Resolution) -> ResolvedConflict<T>
where
    T: Clone + MergePayload,
{
    match resolution {
        Resolution::ClientWins => ResolvedConflict {
            resolution,
            data: Some(conflict.client_data.clone()),
            should_sync: true,
            requires_user_input: false,
        },
        Resolution::ServerWins => ResolvedConflict {
            resolution,
            data: Some(conflict.server_data.clone()),
            should_sync: false,
            requires_user_input: false,
        },
        Resolution::Merge => ResolvedConflict {
            resolution,
            data: Some(T::shallow_merge(&conflict.client_data, &conflict.server_data)),
            should_sync: true,
            requires_user_input: false,
        },
        Resolution::Manual => ResolvedConflict {
            resolution,
            data: None,
            should_sync: false,
            requires_user_input: true,
        },
    }
}

/// Resolves with a preset resolution if there is one, else last-write-wins.
pub fn resolve_conflict<T>(conflict: &ConflictInfo<T>) -> ResolvedConflict<T>
where
    T: Clone + MergePayload,
{
    let resolution = conflict
        .resolution
        .unwrap_or_else(|| last_write_wins(conflict));
    apply_resolution(conflict, resolution)
}

/// Resolves with a preset resolution if there is one, else asks `resolver`.
pub async fn resolve_conflict_with<T, R>(conflict: &ConflictInfo<T>, resolver: &R) -> ResolvedConflict<T>
where
    T: Clone + MergePayload,
    R: ConflictResolver<T>,
{
    let resolution = match conflict.resolution {
        Some(preset) => preset,
        None => resolver.resolve(conflict).await,
    };
    apply_resolution(conflict, resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{AlwaysManual, AlwaysMerge};
    use chrono::Duration;
    use serde_json::{json, Value};
    use syncq_core::{Method, NewOperation, OperationMetadata};

    fn conflict(client: Value, server: Value, client_ts: DateTime<Utc>, server_ts: DateTime<Utc>) -> ConflictInfo<Value> {
        let new = NewOperation::new("item", Method::Put, "/items/1", client).with_metadata(
            OperationMetadata::for_entity("item", "1").with_client_version(client_ts),
        );
        let op = Operation::from_new(new, 0, Utc::now());
        ConflictInfo::for_operation(&op, server, server_ts)
    }

    #[test]
    fn lww_ties_favor_server() {
        let now = Utc::now();
        let c = conflict(json!(1), json!(2), now, now);
        assert_eq!(last_write_wins(&c), Resolution::ServerWins);

        let c = conflict(json!(1), json!(2), now + Duration::milliseconds(1), now);
        assert_eq!(last_write_wins(&c), Resolution::ClientWins);

        let c = conflict(json!(1), json!(2), now, now + Duration::seconds(1));
        assert_eq!(last_write_wins(&c), Resolution::ServerWins);
    }

    #[test]
    fn client_timestamp_falls_back_to_created_at() {
        let op = Operation::from_new(
            NewOperation::new("item", Method::Post, "/items", json!({})),
            0,
            Utc::now(),
        );
        let c = ConflictInfo::for_operation(&op, json!({}), Utc::now());
        assert_eq!(c.client_timestamp, op.created_at);
    }

    #[test]
    fn merge_precedence_client_wins_on_collision() {
        let merged = Value::shallow_merge(&json!({"a": 1, "b": 2}), &json!({"b": 3, "c": 4}));
        assert_eq!(merged, json!({"a": 1, "b": 2, "c": 4}));
    }

    #[test]
    fn merge_of_non_records_is_client_data() {
        assert_eq!(Value::shallow_merge(&json!([1, 2]), &json!({"b": 3})), json!([1, 2]));
        assert_eq!(String::shallow_merge(&"mine".into(), &"theirs".into()), "mine");
    }

    #[test]
    fn map_payloads_merge() {
        let client: BTreeMap<String, i32> = [("a".into(), 1), ("b".into(), 2)].into();
        let server: BTreeMap<String, i32> = [("b".into(), 3), ("c".into(), 4)].into();
        let merged = BTreeMap::shallow_merge(&client, &server);
        assert_eq!(merged.get("b"), Some(&2));
        assert_eq!(merged.len(), 3);

        let client: HashMap<String, i32> = [("x".into(), 1)].into();
        let server: HashMap<String, i32> = [("x".into(), 2), ("y".into(), 3)].into();
        let merged = HashMap::shallow_merge(&client, &server);
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 3);
    }

    #[test]
    fn resolutions_apply_per_table() {
        let now = Utc::now();
        let c = conflict(json!({"a": 1}), json!({"b": 2}), now, now);

        let r = apply_resolution(&c, Resolution::ClientWins);
        assert_eq!((r.data, r.should_sync, r.requires_user_input), (Some(json!({"a": 1})), true, false));

        let r = apply_resolution(&c, Resolution::ServerWins);
        assert_eq!((r.data, r.should_sync, r.requires_user_input), (Some(json!({"b": 2})), false, false));

        let r = apply_resolution(&c, Resolution::Merge);
        assert_eq!(r.data, Some(json!({"a": 1, "b": 2})));
        assert!(r.should_sync);

        let r = apply_resolution(&c, Resolution::Manual);
        assert_eq!((r.data, r.should_sync, r.requires_user_input), (None, false, true));
    }

    #[test]
    fn preset_resolution_wins_over_lww() {
        let now = Utc::now();
        let c = conflict(json!(1), json!(2), now, now + Duration::seconds(5))
            .with_resolution(Resolution::ClientWins);
        assert_eq!(resolve_conflict(&c).resolution, Resolution::ClientWins);
    }

    #[tokio::test]
    async fn custom_resolver_is_consulted_unless_preset() {
        let now = Utc::now();
        let c = conflict(json!({"a": 1}), json!({"c": 3}), now, now);

        let resolved = resolve_conflict_with(&c, &AlwaysMerge).await;
        assert_eq!(resolved.resolution, Resolution::Merge);
        assert_eq!(resolved.data, Some(json!({"a": 1, "c": 3})));

        let preset = c.with_resolution(Resolution::ServerWins);
        let resolved = resolve_conflict_with(&preset, &AlwaysManual).await;
        assert_eq!(resolved.resolution, Resolution::ServerWins);
    }

    #[test]
    fn resolution_wire_names() {
        assert_eq!(serde_json::to_string(&Resolution::ClientWins).unwrap(), "\"client-wins\"");
        assert_eq!(serde_json::to_string(&Resolution::ServerWins).unwrap(), "\"server-wins\"");
        assert_eq!(Resolution::Manual.to_string(), "manual");
    }
}
