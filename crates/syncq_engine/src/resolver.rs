//! Pluggable conflict resolution strategies.

use crate::conflict::{last_write_wins, ConflictInfo, Resolution};
use std::future::{ready, Future};

/// Chooses a [`Resolution`] for a conflict.
///
/// Resolvers may be asynchronous, for example to ask a user. They must not
/// mutate the queue; the orchestrator applies the outcome.
pub trait ConflictResolver<T>: Send + Sync {
    /// Picks a resolution for `conflict`.
    fn resolve(&self, conflict: &ConflictInfo<T>) -> impl Future<Output = Resolution> + Send;
}

/// Client wins only with a strictly newer timestamp. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriteWins;

impl<T> ConflictResolver<T> for LastWriteWins {
    fn resolve(&self, conflict: &ConflictInfo<T>) -> impl Future<Output = Resolution> + Send {
        ready(last_write_wins(conflict))
    }
}

/// The server is authoritative.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerWins;

impl<T> ConflictResolver<T> for ServerWins {
    fn resolve(&self, _conflict: &ConflictInfo<T>) -> impl Future<Output = Resolution> + Send {
        ready(Resolution::ServerWins)
    }
}

/// The client is authoritative.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientWins;

impl<T> ConflictResolver<T> for ClientWins {
    fn resolve(&self, _conflict: &ConflictInfo<T>) -> impl Future<Output = Resolution> + Send {
        ready(Resolution::ClientWins)
    }
}

/// Always merge client fields over server fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysMerge;

impl<T> ConflictResolver<T> for AlwaysMerge {
    fn resolve(&self, _conflict: &ConflictInfo<T>) -> impl Future<Output = Resolution> + Send {
        ready(Resolution::Merge)
    }
}

/// Park every conflict for a human.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysManual;

impl<T> ConflictResolver<T> for AlwaysManual {
    fn resolve(&self, _conflict: &ConflictInfo<T>) -> impl Future<Output = Resolution> + Send {
        ready(Resolution::Manual)
    }
}
