// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// API group of the operator's custom resources
pub const API_GROUP: &str = "k8s.v6d.io";

/// The operator name used as field manager and in managed-by labels
pub const OPERATOR_NAME: &str = "vineyard-operator";

/// Label keys used on materialized sub-resources
pub mod labels {
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";
    /// Name of the Sidecar an etcd member belongs to
    pub const ETCD_OWNER: &str = "app.vineyard.io/etcd-of";
    /// Rank of an etcd member within its cluster
    pub const ETCD_RANK: &str = "app.vineyard.io/etcd-rank";
    /// Label the job controller puts on the pods of a Job
    pub const JOB_CONTROLLER_UID: &str = "controller-uid";
}

/// Delimiter separating source and destination object ids in recover logs
pub const MAPPING_DELIMITER: &str = "->";

/// Environment defaults
pub mod defaults {
    pub const REQUEUE_INTERVAL_SECS: u64 = 60;
    pub const ERROR_REQUEUE_SECS: u64 = 60;
    pub const STATUS_UPDATE_ATTEMPTS: u32 = 5;
    pub const LOG_READ_TIMEOUT_SECS: u64 = 30;
    pub const SIDECAR_CONTAINER_NAME: &str = "vineyard-sidecar";
    pub const MAX_CONCURRENT_RECONCILES: u16 = 4;
}

/// Backoff after the first conflicting write, in milliseconds; doubles per attempt
pub const CONFLICT_BACKOFF_MILLIS: u64 = 10;

/// Upper bound of the conflict backoff before jitter, in milliseconds
pub const CONFLICT_BACKOFF_MAX_MILLIS: u64 = 1000;

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
