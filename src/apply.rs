// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Idempotent creation and update of rendered sub-resources.

use crate::error::{OperatorError, Result};
use crate::kubernetes::{ControlPlane, ObjectKey};
use crate::overlay::{covers, overlay};
use crate::status::retry_on_conflict;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

/// What applying a document did to the cluster
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Applies rendered documents so that repeating an apply has no further effect
pub struct Applier<'a> {
    cp: &'a dyn ControlPlane,
    owner: Option<(String, OwnerReference)>,
    attempts: u32,
}

impl<'a> Applier<'a> {
    /// `attempts` bounds the read-modify-write cycles of a forced update
    pub fn new(cp: &'a dyn ControlPlane, attempts: u32) -> Self {
        Self {
            cp,
            owner: None,
            attempts,
        }
    }

    /// Mark objects applied into the owner's namespace as controlled by it
    pub fn with_owner<K: Resource<DynamicType = ()>>(mut self, owner: &K) -> Self {
        if let (Some(namespace), Some(reference)) =
            (owner.namespace(), owner.controller_owner_ref(&()))
        {
            self.owner = Some((namespace, reference));
        }
        self
    }

    /// Create `doc` if it does not exist.
    ///
    /// An existing object is left alone unless `force` is set, in which case the
    /// rendered fields are overlaid onto it. A non-empty `namespace` replaces the
    /// namespace the document declares.
    pub async fn apply(
        &self,
        doc: &DynamicObject,
        namespace: Option<&str>,
        force: bool,
    ) -> Result<ApplyOutcome> {
        let mut object = doc.clone();
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            if object.metadata.namespace.is_some() {
                object.metadata.namespace = Some(ns.to_string());
            }
        }
        self.attach_owner(&mut object);
        let key = ObjectKey::from_object(&object)?;

        match self.cp.get(&key).await? {
            None => match self.cp.create(&object).await {
                Ok(_) => {
                    info!(key = %key, "Created");
                    Ok(ApplyOutcome::Created)
                }
                Err(OperatorError::AlreadyExists(_)) => {
                    debug!(key = %key, "Created concurrently");
                    if force {
                        self.overlay_update(&key, &object).await
                    } else {
                        Ok(ApplyOutcome::Unchanged)
                    }
                }
                Err(e) => Err(e),
            },
            Some(_) if !force => Ok(ApplyOutcome::Unchanged),
            Some(_) => self.overlay_update(&key, &object).await,
        }
    }

    /// Apply documents in order, stopping at the first failure
    pub async fn apply_all(
        &self,
        docs: &[DynamicObject],
        namespace: Option<&str>,
        force: bool,
    ) -> Result<Vec<ApplyOutcome>> {
        let mut outcomes = Vec::with_capacity(docs.len());
        for doc in docs {
            outcomes.push(self.apply(doc, namespace, force).await?);
        }
        Ok(outcomes)
    }

    /// Delete the object at `key`; an object that is already gone counts as deleted
    pub async fn delete(&self, key: &ObjectKey) -> Result<()> {
        if self.cp.delete(key).await? {
            info!(key = %key, "Deleted");
        } else {
            debug!(key = %key, "Already gone");
        }
        Ok(())
    }

    async fn overlay_update(
        &self,
        key: &ObjectKey,
        object: &DynamicObject,
    ) -> Result<ApplyOutcome> {
        let rendered = serde_json::to_value(object)?;
        let rendered = &rendered;
        let cp = self.cp;

        retry_on_conflict(key, self.attempts, || async move {
            let live = cp
                .get(key)
                .await?
                .ok_or_else(|| OperatorError::NotFound(key.to_string()))?;
            let live = serde_json::to_value(&live)?;
            if covers(&live, rendered) {
                return Ok(ApplyOutcome::Unchanged);
            }

            let mut merged = live;
            overlay(&mut merged, rendered);

            // The overlay keeps the live resourceVersion, guarding the write
            cp.update(&serde_json::from_value(merged)?).await?;
            info!(key = %key, "Updated");
            Ok(ApplyOutcome::Updated)
        })
        .await
    }

    fn attach_owner(&self, object: &mut DynamicObject) {
        let Some((namespace, reference)) = &self.owner else {
            return;
        };
        // Owner references cannot cross namespaces
        if object.metadata.namespace.as_deref() != Some(namespace.as_str()) {
            return;
        }
        let references = object.owner_references_mut();
        if !references.iter().any(|r| r.uid == reference.uid) {
            references.push(reference.clone());
        }
    }
}
