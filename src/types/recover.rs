// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::api::batch::v1::Job;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Restores a Backup into a running vineyardd deployment
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "k8s.v6d.io", version = "v1alpha1", kind = "Recover")]
#[kube(namespaced)]
#[kube(status = "RecoverStatus")]
#[kube(
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RecoverSpec {
    pub backup_name: String,
    pub backup_namespace: String,
}

impl Recover {
    /// Current state as recorded in status; a missing status means nothing happened yet
    pub fn state(&self) -> RecoverState {
        self.status
            .as_ref()
            .and_then(|s| s.state)
            .unwrap_or_default()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecoverStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RecoverState>,
    /// Source object id to restored object id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_mapping: Option<BTreeMap<String, String>>,
}

/// Lifecycle of the recover job as observed by polling
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, schemars::JsonSchema)]
pub enum RecoverState {
    #[default]
    #[serde(rename = "")]
    Empty,
    Running,
    #[serde(alias = "Succeed")]
    Succeeded,
}

/// Work a reconciliation cycle performs for a given state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoverAction {
    /// Make sure the recover job exists and poll its progress
    ApplyJob,
    /// Collect the object mapping printed by the finished job
    ExtractMapping,
}

impl RecoverState {
    pub fn action(self) -> RecoverAction {
        match self {
            RecoverState::Empty | RecoverState::Running => RecoverAction::ApplyJob,
            RecoverState::Succeeded => RecoverAction::ExtractMapping,
        }
    }

    /// State after observing the recover job. A job that cannot be found leaves the state as is.
    pub fn observe(self, job: Option<JobProgress>) -> RecoverState {
        match job {
            None => self,
            Some(progress) if progress.is_complete() => RecoverState::Succeeded,
            Some(_) => RecoverState::Running,
        }
    }
}

/// Completion counters of a Job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobProgress {
    pub succeeded: i32,
    pub parallelism: i32,
}

impl JobProgress {
    /// Unset parallelism defaults to 1 and unset succeeded to 0, as the job controller does
    pub fn from_job(job: &Job) -> Self {
        JobProgress {
            succeeded: job
                .status
                .as_ref()
                .and_then(|s| s.succeeded)
                .unwrap_or(0),
            parallelism: job
                .spec
                .as_ref()
                .and_then(|s| s.parallelism)
                .unwrap_or(1),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.succeeded == self.parallelism
    }
}
