// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Values exposed to manifest templates.
//!
//! Every value here is derived inside a single reconciliation and handed to the
//! renderer by value, so reconciliations of different resources never observe
//! each other's configuration.

use crate::error::{OperatorError, Result};
use crate::selector::LabelSelector;
use crate::types::{Backup, Sidecar};
use kube::ResourceExt;
use serde::Serialize;

/// Port vineyardd serves RPC on
const VINEYARD_RPC_PORT: u16 = 9600;
const ETCD_PEER_PORT: u16 = 2380;

/// Where and how a backup is restored
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FailoverConfig {
    /// Namespace the recover job runs in
    pub namespace: String,
    pub vineyardd_name: String,
    pub vineyardd_namespace: String,
    pub replicas: u32,
    pub backup_path: String,
    pub image: String,
    pub socket_path: String,
    pub endpoint: String,
}

impl FailoverConfig {
    pub fn from_backup(backup: &Backup) -> Result<Self> {
        let namespace = backup
            .namespace()
            .ok_or_else(|| {
                OperatorError::MissingNamespace(format!("Backup {}", backup.name_any()))
            })?;
        let spec = &backup.spec;
        let socket_path = spec.socket_path.clone().unwrap_or_else(|| {
            format!(
                "/var/run/vineyard-kubernetes/{}/{}",
                spec.vineyardd_namespace, spec.vineyardd_name
            )
        });

        Ok(FailoverConfig {
            namespace,
            vineyardd_name: spec.vineyardd_name.clone(),
            vineyardd_namespace: spec.vineyardd_namespace.clone(),
            replicas: spec.replicas,
            backup_path: spec.backup_path.clone(),
            image: spec.image.clone(),
            socket_path,
            endpoint: format!(
                "{}-rpc.{}:{}",
                spec.vineyardd_name, spec.vineyardd_namespace, VINEYARD_RPC_PORT
            ),
        })
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RecoverConfig {
    /// Name of the recover job
    pub name: String,
    pub backup_pvc_name: String,
}

impl RecoverConfig {
    pub fn from_backup(backup: &Backup) -> Self {
        RecoverConfig {
            name: backup.recover_job_name(),
            backup_pvc_name: backup.pvc_name(),
        }
    }
}

/// Peer configuration of one etcd member
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct EtcdConfig {
    /// Member name, also the name of its pod and service
    pub name: String,
    pub namespace: String,
    /// Name of the Sidecar owning the cluster
    pub owner: String,
    pub rank: u32,
    pub replicas: u32,
    pub image: String,
    /// `name=peer-url` list of every member, identical for all ranks
    pub initial_cluster: String,
}

impl EtcdConfig {
    pub fn member_name(owner: &str, rank: u32) -> String {
        format!("{}-etcd-{}", owner, rank)
    }

    pub fn for_rank(owner: &str, namespace: &str, replicas: u32, image: &str, rank: u32) -> Self {
        let initial_cluster = (0..replicas)
            .map(|r| {
                let member = Self::member_name(owner, r);
                format!("{}=http://{}:{}", member, member, ETCD_PEER_PORT)
            })
            .collect::<Vec<_>>()
            .join(",");

        EtcdConfig {
            name: Self::member_name(owner, rank),
            namespace: namespace.to_string(),
            owner: owner.to_string(),
            rank,
            replicas,
            image: image.to_string(),
            initial_cluster,
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SidecarConfig {
    pub name: String,
    pub namespace: String,
    pub service_type: String,
    pub service_port: i32,
}

impl SidecarConfig {
    pub fn from_sidecar(sidecar: &Sidecar, namespace: &str) -> Self {
        SidecarConfig {
            name: sidecar.name_any(),
            namespace: namespace.to_string(),
            service_type: sidecar.spec.service.type_.clone(),
            service_port: sidecar.spec.service.port,
        }
    }
}

/// Everything a template may reference; unset sections are undefined to templates
#[derive(Serialize, Clone, Debug, Default)]
pub struct TemplateContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recover: Option<RecoverConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover: Option<FailoverConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etcd: Option<EtcdConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar: Option<SidecarConfig>,
    pub selector: Vec<LabelSelector>,
}

impl TemplateContext {
    pub fn for_recover(recover: RecoverConfig, failover: FailoverConfig) -> Self {
        TemplateContext {
            recover: Some(recover),
            failover: Some(failover),
            ..Default::default()
        }
    }

    pub fn for_etcd_member(etcd: EtcdConfig) -> Self {
        TemplateContext {
            etcd: Some(etcd),
            ..Default::default()
        }
    }

    pub fn for_sidecar_services(sidecar: SidecarConfig, selector: LabelSelector) -> Self {
        TemplateContext {
            sidecar: Some(sidecar),
            selector: vec![selector],
            ..Default::default()
        }
    }
}
