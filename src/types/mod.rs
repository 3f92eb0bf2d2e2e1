// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Custom resources served under the `k8s.v6d.io` API group.

pub mod backup;
pub mod recover;
pub mod sidecar;

pub use backup::{Backup, BackupSpec};
pub use recover::{JobProgress, Recover, RecoverAction, RecoverSpec, RecoverState, RecoverStatus};
pub use sidecar::{Sidecar, SidecarSpec, SidecarStatus};
