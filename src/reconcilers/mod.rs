// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that drive the custom resources toward their spec.

pub mod recover;
pub mod sidecar;

pub use recover::RecoverReconciler;
pub use sidecar::SidecarReconciler;

use crate::error::{OperatorError, Result};
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource};
use std::future::Future;
use tokio::sync::watch;

/// Api used to watch `K`, limited to one namespace when configured
pub(crate) fn watched_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Resolves once shutdown has been requested. A dropped sender never resolves.
pub(crate) async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Run `work` unless shutdown is requested first
pub(crate) async fn until_shutdown<T, F>(shutdown: &watch::Receiver<bool>, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if *shutdown.borrow() {
        return Err(OperatorError::Cancelled);
    }
    tokio::select! {
        result = work => result,
        _ = shutdown_requested(shutdown.clone()) => Err(OperatorError::Cancelled),
    }
}
