// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Recover reconciler - runs the recover job of a Backup and records the object
//! mapping it prints once finished.

use super::{shutdown_requested, until_shutdown, watched_api};
use crate::apply::Applier;
use crate::config::Config;
use crate::error::{OperatorError, Result};
use crate::kubernetes::{get_typed, ControlPlane, ObjectKey};
use crate::mapping::extract_job_mapping;
use crate::status::{apply_status_replacing, apply_status_update};
use crate::template::{FailoverConfig, RecoverConfig, Renderer, TemplateContext, RECOVER_JOB};
use crate::types::{Backup, JobProgress, Recover, RecoverAction, RecoverState, RecoverStatus};
use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::{
    runtime::{controller, controller::Action, watcher, Controller},
    Client, ResourceExt,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

/// Status field holding the extracted mapping; each extraction replaces it whole
const OBJECT_MAPPING: &str = "objectMapping";

pub struct RecoverReconciler {
    cp: Arc<dyn ControlPlane>,
    renderer: Arc<Renderer>,
    config: Config,
    shutdown: watch::Receiver<bool>,
}

impl RecoverReconciler {
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
        let recovers = watched_api::<Recover>(&client, self.config.watch_namespace.as_deref());
        let controller_config =
            controller::Config::default().concurrency(self.config.max_concurrent_reconciles);
        let shutdown = self.shutdown.clone();
        let context = Arc::new(self);

        Controller::new(recovers, watcher::Config::default())
            .with_config(controller_config)
            .graceful_shutdown_on(shutdown_requested(shutdown))
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled recover: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        info!("Recover reconciler stopped");
        Ok(())
    }

    /// One reconciliation cycle; returns the state recorded at the end of it
    pub async fn reconcile_once(&self, recover: &Recover) -> Result<RecoverState> {
        let cp = self.cp.as_ref();
        let namespace = recover
            .namespace()
            .ok_or_else(|| {
                OperatorError::MissingNamespace(format!("Recover {}", recover.name_any()))
            })?;
        let key = ObjectKey::of::<Recover>(&namespace, &recover.name_any());
        let state = recover.state();

        let spec = &recover.spec;
        let Some(backup) = get_typed::<Backup>(cp, &spec.backup_namespace, &spec.backup_name).await?
        else {
            warn!(
                "Backup {}/{} of recover {} not found",
                spec.backup_namespace, spec.backup_name, key
            );
            return Ok(state);
        };
        let failover = FailoverConfig::from_backup(&backup)?;
        let job_name = backup.recover_job_name();

        match state.action() {
            RecoverAction::ApplyJob => {
                let ctx = TemplateContext::for_recover(
                    RecoverConfig::from_backup(&backup),
                    failover.clone(),
                );
                let docs = self.renderer.render(RECOVER_JOB, &ctx)?;
                Applier::new(cp, self.config.status_update_attempts)
                    .with_owner(recover)
                    .apply_all(&docs, None, false)
                    .await?;

                let Some(job) = get_typed::<Job>(cp, &failover.namespace, &job_name).await? else {
                    info!("Recover job {}/{} not found yet", failover.namespace, job_name);
                    return Ok(state);
                };
                let next = state.observe(Some(JobProgress::from_job(&job)));
                if next != state {
                    info!("Recover {} moved from {:?} to {:?}", key, state, next);
                    let delta = RecoverStatus {
                        state: Some(next),
                        object_mapping: None,
                    };
                    let attempts = self.config.status_update_attempts;
                    apply_status_update(cp, &key, &delta, attempts).await?;
                }
                Ok(next)
            }
            RecoverAction::ExtractMapping => {
                let Some(job) = get_typed::<Job>(cp, &failover.namespace, &job_name).await? else {
                    debug!(
                        "Recover job {}/{} is gone, nothing to extract",
                        failover.namespace, job_name
                    );
                    return Ok(state);
                };
                let mapping = extract_job_mapping(cp, &job, self.config.log_read_timeout).await?;

                let recorded = recover.status.as_ref().and_then(|s| s.object_mapping.as_ref());
                if recorded != Some(&mapping) {
                    info!("Recording {} restored objects for recover {}", mapping.len(), key);
                    let delta = RecoverStatus {
                        state: Some(RecoverState::Succeeded),
                        object_mapping: Some(mapping),
                    };
                    let attempts = self.config.status_update_attempts;
                    apply_status_replacing(cp, &key, &delta, &[OBJECT_MAPPING], attempts).await?;
                }
                Ok(RecoverState::Succeeded)
            }
        }
    }
}

#[instrument(skip(recover, ctx), fields(recover = %recover.name_any()))]
async fn reconcile(recover: Arc<Recover>, ctx: Arc<RecoverReconciler>) -> Result<Action> {
    until_shutdown(&ctx.shutdown, ctx.reconcile_once(&recover)).await?;
    Ok(Action::requeue(ctx.config.requeue_interval))
}

fn error_policy(
    _recover: Arc<Recover>,
    error: &OperatorError,
    ctx: Arc<RecoverReconciler>,
) -> Action {
    if matches!(error, OperatorError::Cancelled) {
        debug!("Reconciliation cancelled by shutdown");
        return Action::await_change();
    }
    error!("Reconciliation error: {}", error);
    Action::requeue(ctx.config.error_requeue_interval)
}
