// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery and control-plane access.

pub mod control_plane;
pub mod crd;

pub use control_plane::{
    from_dynamic, get_typed, list_typed, to_dynamic, type_meta_of, ControlPlane,
    KubeControlPlane, LogStream, ObjectKey,
};
pub use crd::wait_for_crds;
