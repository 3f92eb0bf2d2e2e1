// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Sidecar reconciler - bootstraps the etcd cluster backing an injected vineyardd
//! sidecar, exposes it through services and counts the running instances.

use super::{shutdown_requested, until_shutdown, watched_api};
use crate::apply::Applier;
use crate::config::Config;
use crate::constants::labels::{ETCD_OWNER, ETCD_RANK};
use crate::error::{OperatorError, Result};
use crate::kubernetes::{list_typed, type_meta_of, ControlPlane, ObjectKey};
use crate::selector::LabelSelector;
use crate::status::apply_status_update;
use crate::template::{
    EtcdConfig, Renderer, SidecarConfig, TemplateContext, ETCD_POD, ETCD_SERVICE,
    VINEYARDD_ETCD_SERVICE, VINEYARDD_SERVICE,
};
use crate::types::{Sidecar, SidecarStatus};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{
    runtime::{controller, controller::Action, watcher, Controller},
    Client, ResourceExt,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

pub struct SidecarReconciler {
    cp: Arc<dyn ControlPlane>,
    renderer: Arc<Renderer>,
    config: Config,
    shutdown: watch::Receiver<bool>,
}

impl SidecarReconciler {
    pub fn new(
        cp: Arc<dyn ControlPlane>,
        renderer: Arc<Renderer>,
        config: Config,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            cp,
            renderer,
            config,
            shutdown,
        }
    }

    pub async fn run(self, client: Client) -> anyhow::Result<()> {
        let sidecars = watched_api::<Sidecar>(&client, self.config.watch_namespace.as_deref());
        let controller_config =
            controller::Config::default().concurrency(self.config.max_concurrent_reconciles);
        let shutdown = self.shutdown.clone();
        let context = Arc::new(self);

        Controller::new(sidecars, watcher::Config::default())
            .with_config(controller_config)
            .graceful_shutdown_on(shutdown_requested(shutdown))
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled sidecar: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        info!("Sidecar reconciler stopped");
        Ok(())
    }

    /// One reconciliation cycle; returns the number of running sidecar instances
    pub async fn reconcile_once(&self, sidecar: &Sidecar) -> Result<i32> {
        let cp = self.cp.as_ref();
        let name = sidecar.name_any();
        let namespace = sidecar
            .namespace()
            .ok_or_else(|| OperatorError::MissingNamespace(format!("Sidecar {}", name)))?;
        let spec = &sidecar.spec;
        let applier = Applier::new(cp, self.config.status_update_attempts).with_owner(sidecar);

        for rank in 0..spec.replicas {
            let etcd =
                EtcdConfig::for_rank(&name, &namespace, spec.replicas, &spec.vineyard.image, rank);
            let ctx = TemplateContext::for_etcd_member(etcd);
            for template in [ETCD_POD, ETCD_SERVICE] {
                let docs = self.renderer.render(template, &ctx)?;
                applier.apply_all(&docs, Some(namespace.as_str()), false).await?;
            }
        }
        self.prune_members(&applier, &name, &namespace, spec.replicas).await?;

        let service_selector = LabelSelector::parse(&spec.service.selector)?;
        let ctx = TemplateContext::for_sidecar_services(
            SidecarConfig::from_sidecar(sidecar, &namespace),
            service_selector,
        );
        for template in [VINEYARDD_ETCD_SERVICE, VINEYARDD_SERVICE] {
            let docs = self.renderer.render(template, &ctx)?;
            applier.apply_all(&docs, Some(namespace.as_str()), true).await?;
        }

        let workload_selector = LabelSelector::parse(&spec.selector)?;
        let pods: Vec<Pod> = list_typed(cp, &namespace, &workload_selector.to_string()).await?;
        let current = pods
            .iter()
            .filter(|pod| runs_container(pod, &self.config.sidecar_container_name))
            .count() as i32;

        let recorded = sidecar.status.as_ref().and_then(|s| s.current);
        if recorded != Some(current) {
            info!("Sidecar {}/{} has {} running instances", namespace, name, current);
            let key = ObjectKey::of::<Sidecar>(&namespace, &name);
            let delta = SidecarStatus {
                current: Some(current),
            };
            apply_status_update(cp, &key, &delta, self.config.status_update_attempts).await?;
        }

        Ok(current)
    }

    /// Delete etcd members whose rank is outside the configured cluster size
    async fn prune_members(
        &self,
        applier: &Applier<'_>,
        owner: &str,
        namespace: &str,
        replicas: u32,
    ) -> Result<()> {
        let selector = format!("{}={}", ETCD_OWNER, owner);

        for type_meta in [type_meta_of::<Pod>(), type_meta_of::<Service>()] {
            for object in self.cp.list(&type_meta, namespace, &selector).await? {
                let rank = object
                    .labels()
                    .get(ETCD_RANK)
                    .and_then(|rank| rank.parse::<u32>().ok());
                match rank {
                    Some(rank) if rank >= replicas => {
                        info!("Removing etcd member {} of rank {}", object.name_any(), rank);
                        applier.delete(&ObjectKey::from_object(&object)?).await?;
                    }
                    Some(_) => {}
                    None => debug!("Ignoring {} without a valid etcd rank", object.name_any()),
                }
            }
        }
        Ok(())
    }
}

/// Running pod with the injected container
fn runs_container(pod: &Pod, container: &str) -> bool {
    let running = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == "Running");
    let injected = pod
        .spec
        .as_ref()
        .is_some_and(|spec| spec.containers.iter().any(|c| c.name == container));
    running && injected
}

#[instrument(skip(sidecar, ctx), fields(sidecar = %sidecar.name_any()))]
async fn reconcile(sidecar: Arc<Sidecar>, ctx: Arc<SidecarReconciler>) -> Result<Action> {
    until_shutdown(&ctx.shutdown, ctx.reconcile_once(&sidecar)).await?;
    Ok(Action::requeue(ctx.config.requeue_interval))
}

fn error_policy(
    _sidecar: Arc<Sidecar>,
    error: &OperatorError,
    ctx: Arc<SidecarReconciler>,
) -> Action {
    if matches!(error, OperatorError::Cancelled) {
        debug!("Reconciliation cancelled by shutdown");
        return Action::await_change();
    }
    error!("Reconciliation error: {}", error);
    Action::requeue(ctx.config.error_requeue_interval)
}
