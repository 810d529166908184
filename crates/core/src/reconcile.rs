//! Dossier status reconciliation.
//!
//! A status change is computed from the dossier's current persisted status, its request type and
//! the acting role, then written with compare-and-set. When the write loses a race the whole
//! computation is repeated from a fresh load, so the result always reflects the latest status.
//!
//! ## Combined requests
//!
//! An execution dossier of a `LES_DEUX` request needs both responsibles to accept it. The first
//! acceptance records that responsible's partial marker (`ACCEPTEE_AEP` or `ACCEPTEE_ASSEU`);
//! an acceptance by the other responsible while that marker is present finalises the dossier to
//! `ACCEPTEE`. Once final, further acceptances are rejected with
//! [`RaccordError::AlreadyFinal`].
//!
//! Study dossiers have no partial markers. Accepting one opens the request's execution dossier in
//! the same store operation.

use std::future::Future;
use std::sync::Arc;

use crate::config::RetryPolicy;
use crate::error::{RaccordError, RaccordResult};
use crate::records::{Caller, Loaded, StatusWrite};
use crate::status::{ExecutionStatus, Outcome, RequestType, RequestedStatus, Role, StudyStatus};
use crate::store::DossierStore;
use crate::uuid::Uuid;

/// Status the reconciler decided on, before it is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Plan<S> {
    pub status: S,
    pub outcome: Outcome,
}

/// Result of a successful status change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reconciled<S> {
    pub dossier_id: Uuid,
    /// Status now persisted.
    pub status: S,
    pub outcome: Outcome,
    /// Set when this call opened the request's execution dossier.
    pub execution_created: bool,
}

/// Study dossiers take the requested status as submitted.
pub fn plan_study(requested: RequestedStatus) -> Plan<StudyStatus> {
    Plan {
        status: requested.into(),
        outcome: Outcome::Direct,
    }
}

/// Computes an execution dossier's next status.
///
/// # Errors
///
/// - [`RaccordError::AlreadyFinal`] when accepting a combined request that is already accepted
/// - [`RaccordError::Unauthorized`] when a role without a partial marker accepts a combined
///   request
pub fn plan_execution(
    dossier_id: Uuid,
    current: ExecutionStatus,
    request_type: RequestType,
    role: Role,
    requested: RequestedStatus,
) -> RaccordResult<Plan<ExecutionStatus>> {
    let verbatim = Plan {
        status: requested.into(),
        outcome: Outcome::Direct,
    };
    if request_type != RequestType::LesDeux || requested != RequestedStatus::Acceptee {
        return Ok(verbatim);
    }

    if current == ExecutionStatus::Acceptee {
        return Err(RaccordError::AlreadyFinal(dossier_id));
    }
    let marker = role.partial_marker().ok_or_else(|| {
        RaccordError::Unauthorized(format!(
            "role {role} cannot approve a combined request"
        ))
    })?;

    if marker.opposite_marker() == Some(current) {
        Ok(Plan {
            status: ExecutionStatus::Acceptee,
            outcome: Outcome::Final,
        })
    } else {
        Ok(Plan {
            status: marker,
            outcome: Outcome::Partial,
        })
    }
}

/// Rejects callers who may not change statuses on a request of `request_type`.
pub fn authorize(caller: &Caller, request_type: RequestType) -> RaccordResult<()> {
    if caller.role.may_review(request_type) {
        Ok(())
    } else {
        Err(RaccordError::Unauthorized(format!(
            "role {} may not change dossiers of {request_type} requests",
            caller.role
        )))
    }
}

/// Applies status changes to dossiers held in a [`DossierStore`].
#[derive(Clone)]
pub struct StatusReconciler {
    store: Arc<dyn DossierStore>,
    retry: RetryPolicy,
}

impl StatusReconciler {
    pub fn new(store: Arc<dyn DossierStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Changes a study dossier's status; accepting it opens the execution dossier.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the dossier does not exist
    /// - `Unauthorized` if the caller may not review the request's type
    /// - `Conflict` if the status kept changing for every allowed attempt
    /// - storage errors once retries are exhausted
    pub async fn update_study_status(
        &self,
        caller: &Caller,
        id: Uuid,
        requested: RequestedStatus,
        remarks: Option<String>,
    ) -> RaccordResult<Reconciled<StudyStatus>> {
        let remarks = remarks.unwrap_or_default();
        for attempt in 1..=self.retry.cas_attempts {
            let loaded: Loaded<StudyStatus> =
                self.with_storage_retry(|| self.store.load_study(id)).await?;
            authorize(caller, loaded.request_type)?;
            let plan = plan_study(requested);

            let write = StatusWrite {
                expected: loaded.dossier.status,
                new: plan.status,
                remarks: remarks.clone(),
            };
            let cas = self
                .with_storage_retry(|| self.store.compare_and_set_study_status(id, write.clone()))
                .await?;
            if cas.applied {
                tracing::info!(
                    "study dossier {id}: {} -> {} by {} ({})",
                    loaded.dossier.status,
                    plan.status,
                    caller.role,
                    caller.id
                );
                if cas.execution_created {
                    tracing::info!("study dossier {id} accepted, execution dossier opened");
                }
                return Ok(Reconciled {
                    dossier_id: id,
                    status: plan.status,
                    outcome: plan.outcome,
                    execution_created: cas.execution_created,
                });
            }
            tracing::warn!("study dossier {id} changed during update (attempt {attempt})");
        }
        Err(self.conflict(id))
    }

    /// Changes an execution dossier's status, applying the two-approval rule to combined
    /// requests.
    ///
    /// # Errors
    ///
    /// As [`StatusReconciler::update_study_status`], plus `AlreadyFinal` when accepting a
    /// combined request that is already accepted.
    pub async fn update_execution_status(
        &self,
        caller: &Caller,
        id: Uuid,
        requested: RequestedStatus,
        remarks: Option<String>,
    ) -> RaccordResult<Reconciled<ExecutionStatus>> {
        let remarks = remarks.unwrap_or_default();
        for attempt in 1..=self.retry.cas_attempts {
            let loaded: Loaded<ExecutionStatus> = self
                .with_storage_retry(|| self.store.load_execution(id))
                .await?;
            authorize(caller, loaded.request_type)?;
            let current = loaded.dossier.status;
            let plan = plan_execution(id, current, loaded.request_type, caller.role, requested)?;

            let write = StatusWrite {
                expected: current,
                new: plan.status,
                remarks: remarks.clone(),
            };
            let applied = self
                .with_storage_retry(|| {
                    self.store
                        .compare_and_set_execution_status(id, write.clone())
                })
                .await?;
            if applied {
                tracing::info!(
                    "execution dossier {id}: {current} -> {} ({}) by {} ({})",
                    plan.status,
                    plan.outcome,
                    caller.role,
                    caller.id
                );
                return Ok(Reconciled {
                    dossier_id: id,
                    status: plan.status,
                    outcome: plan.outcome,
                    execution_created: false,
                });
            }
            tracing::warn!("execution dossier {id} changed during update (attempt {attempt})");
        }
        Err(self.conflict(id))
    }

    fn conflict(&self, id: Uuid) -> RaccordError {
        RaccordError::Conflict {
            id,
            attempts: self.retry.cas_attempts,
        }
    }

    /// Runs one store call, repeating it with backoff while it fails with a retryable error.
    async fn with_storage_retry<T, F, Fut>(&self, mut op: F) -> RaccordResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RaccordResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.retry.storage_attempts => {
                    let delay = self.retry.backoff_for(attempt);
                    tracing::warn!("storage error (attempt {attempt}), retrying in {delay:?}: {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
