//! Optimistic mutation reconciler.
//!
//! ARCHITECTURE
//! ============
//! A mutation shows its speculative value immediately, runs the backend call
//! exactly once, then settles on one of two values only: the value the
//! backend returned, or the value shown before the mutation. Optimism hides
//! latency; it never decides the final data.
//!
//! [`OptimisticMutation`] is the pure state machine. [`Reconciler`] drives it
//! against an async action, publishing every displayed value through a
//! `tokio::sync::watch` channel and serializing mutations per target.
//!
//! TRADE-OFFS
//! ==========
//! A second mutation on a target that is still in flight is rejected, not
//! queued. The caller already shows the first mutation's speculative value,
//! so dropping the second click avoids double toggles without hidden work.
//!
//! The action runs on its own task. If the caller stops waiting, the backend
//! call still completes and the target stays claimed until it does; the
//! result is then dropped instead of being applied to a view that is gone.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::session::SessionSlot;
use crate::backend::BackendError;

// =============================================================================
// ERROR
// =============================================================================

/// Failure of a user-initiated mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The backend could not be reached. Retrying may succeed.
    #[error("network error: {0}")]
    Network(String),
    /// The session is missing or the backend rejected it.
    #[error("please sign in to continue")]
    Unauthorized,
    /// The input or the request was rejected.
    #[error("{0}")]
    Validation(String),
    /// Anything else, including malformed backend responses.
    #[error("something went wrong: {0}")]
    Unknown(String),
}

impl ActionError {
    /// Only transport failures are worth offering a retry for.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<BackendError> for ActionError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport(msg) => Self::Network(msg),
            BackendError::Unauthorized => Self::Unauthorized,
            BackendError::Api { status: 400..=499, message } => Self::Validation(message),
            other => Self::Unknown(other.to_string()),
        }
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Committed,
    RolledBack,
}

/// One optimistic mutation: `Pending -> {Committed, RolledBack}`.
#[derive(Debug, Clone)]
pub struct OptimisticMutation<T> {
    previous: T,
    speculative: T,
    committed: Option<T>,
    status: MutationStatus,
}

impl<T> OptimisticMutation<T> {
    #[must_use]
    pub fn begin(previous: T, speculative: T) -> Self {
        Self { previous, speculative, committed: None, status: MutationStatus::Pending }
    }

    #[must_use]
    pub fn status(&self) -> MutationStatus {
        self.status
    }

    #[must_use]
    pub fn previous(&self) -> &T {
        &self.previous
    }

    #[must_use]
    pub fn speculative(&self) -> &T {
        &self.speculative
    }

    /// The value a view should show right now.
    #[must_use]
    pub fn displayed(&self) -> &T {
        match (self.status, &self.committed) {
            (MutationStatus::Committed, Some(value)) => value,
            (MutationStatus::RolledBack, _) => &self.previous,
            _ => &self.speculative,
        }
    }

    /// Settle on the backend's value. Returns `false` if already settled.
    pub fn commit(&mut self, authoritative: T) -> bool {
        if self.status != MutationStatus::Pending {
            return false;
        }
        self.committed = Some(authoritative);
        self.status = MutationStatus::Committed;
        true
    }

    /// Settle on the pre-mutation value. Returns `false` if already settled.
    pub fn rollback(&mut self) -> bool {
        if self.status != MutationStatus::Pending {
            return false;
        }
        self.status = MutationStatus::RolledBack;
        true
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The backend accepted the mutation; the value is the backend's.
    Committed(T),
    /// The mutation failed; the value is exactly the pre-mutation value.
    RolledBack { value: T, error: ActionError },
    /// Another mutation on the same target was in flight; nothing ran.
    Busy,
    /// The view went away before the result arrived; nothing was applied.
    Discarded,
}

impl<T> Outcome<T> {
    #[cfg(test)]
    pub fn displayed(&self) -> Option<&T> {
        match self {
            Self::Committed(value) | Self::RolledBack { value, .. } => Some(value),
            Self::Busy | Self::Discarded => None,
        }
    }

    /// True when the caller must send the user back through login.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::RolledBack { error: ActionError::Unauthorized, .. })
    }
}

// =============================================================================
// RECONCILER
// =============================================================================

type InFlight<K> = Arc<Mutex<HashSet<K>>>;

/// Releases a target when dropped.
struct Claim<K: Eq + Hash> {
    in_flight: InFlight<K>,
    target: K,
}

impl<K: Eq + Hash> Drop for Claim<K> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.target);
    }
}

/// Runs optimistic mutations with at most one in flight per target.
#[derive(Clone)]
pub struct Reconciler<K> {
    in_flight: InFlight<K>,
}

impl<K> Default for Reconciler<K> {
    fn default() -> Self {
        Self { in_flight: Arc::new(Mutex::new(HashSet::new())) }
    }
}

impl<K> Reconciler<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_in_flight(&self, target: &K) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(target)
    }

    fn try_claim(&self, target: K) -> Option<Claim<K>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target.clone());
        inserted.then(|| Claim { in_flight: self.in_flight.clone(), target })
    }

    /// Show `mutation`'s speculative value, run `action` once, and settle.
    ///
    /// An `Unauthorized` failure invalidates `session` whether or not the view
    /// is still alive. The view counts as gone once every receiver of
    /// `display` has been dropped.
    pub async fn apply<T, Fut>(
        &self,
        target: K,
        mut mutation: OptimisticMutation<T>,
        display: &watch::Sender<T>,
        session: &SessionSlot,
        action: Fut,
    ) -> Outcome<T>
    where
        T: Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        let Some(claim) = self.try_claim(target.clone()) else {
            tracing::debug!(?target, "mutation rejected: target busy");
            return Outcome::Busy;
        };

        display.send_replace(mutation.speculative().clone());

        // The claim travels with the task so an abandoned caller cannot free
        // the target before the backend call finishes.
        let task = tokio::spawn(async move { (action.await, claim) });
        let (result, claim) = match task.await {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(?target, error = %e, "mutation task failed");
                mutation.rollback();
                display.send_replace(mutation.displayed().clone());
                return Outcome::RolledBack {
                    value: mutation.previous().clone(),
                    error: ActionError::Unknown(e.to_string()),
                };
            }
        };

        if matches!(result, Err(ActionError::Unauthorized)) {
            session.invalidate();
        }

        if display.is_closed() {
            tracing::debug!(?target, "mutation result discarded: view gone");
            drop(claim);
            return Outcome::Discarded;
        }

        let outcome = match result {
            Ok(authoritative) => {
                mutation.commit(authoritative.clone());
                Outcome::Committed(authoritative)
            }
            Err(error) => {
                tracing::info!(?target, error = %error, retryable = error.is_retryable(), "mutation rolled back");
                mutation.rollback();
                Outcome::RolledBack { value: mutation.previous().clone(), error }
            }
        };
        display.send_replace(mutation.displayed().clone());
        tracing::debug!(?target, status = ?mutation.status(), "mutation settled");
        drop(claim);
        outcome
    }
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
