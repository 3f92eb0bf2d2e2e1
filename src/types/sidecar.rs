// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A vineyardd sidecar injected into a workload, backed by its own etcd cluster
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[kube(group = "k8s.v6d.io", version = "v1alpha1", kind = "Sidecar")]
#[kube(namespaced)]
#[kube(status = "SidecarStatus")]
#[kube(
    printcolumn = r#"{"name":"Current", "type":"integer", "jsonPath":".status.current"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SidecarSpec {
    /// `key=value` selector of the workload pods carrying the sidecar
    pub selector: String,
    /// Size of the etcd cluster
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default)]
    pub vineyard: VineyardConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

fn default_replicas() -> u32 {
    1
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct VineyardConfig {
    pub image: String,
}

impl Default for VineyardConfig {
    fn default() -> Self {
        VineyardConfig {
            image: "vineyardcloudnative/vineyardd:latest".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, schemars::JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    #[serde(rename = "type")]
    pub type_: String,
    pub port: i32,
    /// `key=value` selector the routing services forward to
    pub selector: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            type_: "ClusterIP".to_string(),
            port: 9600,
            selector: "rpc.vineyardd.v6d.io/rpc=vineyard-rpc".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SidecarStatus {
    /// Running pods with the sidecar injected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<i32>,
}
