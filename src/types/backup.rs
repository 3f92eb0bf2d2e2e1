// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::{CustomResource, ResourceExt};
use serde::{Deserialize, Serialize};

/// A snapshot of a vineyardd deployment stored on a persistent volume
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "k8s.v6d.io", version = "v1alpha1", kind = "Backup")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct BackupSpec {
    pub vineyardd_name: String,
    pub vineyardd_namespace: String,
    /// Number of vineyardd instances the backup was taken from
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    pub backup_path: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pvc_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
}

fn default_replicas() -> u32 {
    1
}

fn default_image() -> String {
    "vineyardcloudnative/vineyardd:latest".to_string()
}

impl Backup {
    /// Claim holding the backup data; defaults to a claim named after the backup
    pub fn pvc_name(&self) -> String {
        self.spec
            .pvc_name
            .clone()
            .unwrap_or_else(|| self.name_any())
    }

    /// Name of the job that restores this backup
    pub fn recover_job_name(&self) -> String {
        format!("recover-{}", self.name_any())
    }
}
