// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Conflict-checked status updates.
//!
//! A status update is a read-modify-write: the live object is fetched, the delta
//! is overlaid onto its `status`, and the result is written back guarded by the
//! `resourceVersion` that was read. A concurrent writer makes the write fail with
//! a conflict, in which case the whole cycle runs again against fresh data.

use crate::constants::{CONFLICT_BACKOFF_MAX_MILLIS, CONFLICT_BACKOFF_MILLIS};
use crate::error::{OperatorError, Result};
use crate::kubernetes::{ControlPlane, ObjectKey};
use crate::overlay::overlay;
use kube::api::DynamicObject;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Delay before retrying after the `attempt`th conflict: exponential, capped,
/// with 0.5x to 1.5x jitter
fn conflict_backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let millis = CONFLICT_BACKOFF_MILLIS
        .saturating_mul(1 << exponent)
        .min(CONFLICT_BACKOFF_MAX_MILLIS);
    let jitter = rand::thread_rng().gen_range(0.5..1.5);
    Duration::from_secs_f64(millis as f64 / 1000.0 * jitter)
}

/// Run `operation` until it succeeds, fails with something other than a write
/// conflict, or `attempts` attempts have conflicted
pub async fn retry_on_conflict<T, F, Fut>(
    resource: &ObjectKey,
    attempts: u32,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Err(e) if e.is_conflict() => {
                if attempt >= attempts {
                    warn!(resource = %resource, attempt, "Write conflicts persisted, giving up");
                    return Err(OperatorError::ConflictRetriesExhausted {
                        resource: resource.to_string(),
                        attempts: attempt,
                    });
                }
                let delay = conflict_backoff(attempt);
                debug!(
                    resource = %resource,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Write conflicted, retrying with fresh data"
                );
                sleep(delay).await;
            }
            result => return result,
        }
    }
}

/// Overlay `delta` onto the status of the object at `key`.
///
/// Fields absent from (or null in) the serialized delta keep their live value.
pub async fn apply_status_update<S>(
    cp: &dyn ControlPlane,
    key: &ObjectKey,
    delta: &S,
    attempts: u32,
) -> Result<DynamicObject>
where
    S: Serialize + ?Sized,
{
    apply_status_replacing(cp, key, delta, &[], attempts).await
}

/// Like [`apply_status_update`], but the top-level status fields named in
/// `replaced` take the value of the delta as a whole instead of being merged
/// into the live value. A replaced field that is unset in the delta is kept.
pub async fn apply_status_replacing<S>(
    cp: &dyn ControlPlane,
    key: &ObjectKey,
    delta: &S,
    replaced: &[&str],
    attempts: u32,
) -> Result<DynamicObject>
where
    S: Serialize + ?Sized,
{
    let delta = serde_json::to_value(delta)?;
    let delta = &delta;

    retry_on_conflict(key, attempts, || async move {
        let mut live = cp
            .get(key)
            .await?
            .ok_or_else(|| OperatorError::NotFound(key.to_string()))?;

        if !live.data.is_object() {
            live.data = Value::Object(Default::default());
        }
        if let Some(data) = live.data.as_object_mut() {
            let status = data.entry("status").or_insert(Value::Null);
            if let Some(fields) = status.as_object_mut() {
                for field in replaced {
                    if delta.get(*field).is_some_and(|v| !v.is_null()) {
                        fields.remove(*field);
                    }
                }
            }
            overlay(status, delta);
        }

        cp.update_status(&live).await
    })
    .await
}
