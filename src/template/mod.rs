// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Manifest templates for the sub-resources the reconcilers own.

pub mod context;
pub mod renderer;

pub use context::{EtcdConfig, FailoverConfig, RecoverConfig, SidecarConfig, TemplateContext};
pub use renderer::{
    parse_documents, Renderer, TemplateError, ETCD_POD, ETCD_SERVICE, RECOVER_JOB,
    VINEYARDD_ETCD_SERVICE, VINEYARDD_SERVICE,
};
