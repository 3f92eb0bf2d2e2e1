// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vineyard_operator::config::Config;
use vineyard_operator::kubernetes::{wait_for_crds, ControlPlane, KubeControlPlane};
use vineyard_operator::reconcilers::{RecoverReconciler, SidecarReconciler};
use vineyard_operator::template::Renderer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting vineyard operator");

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Configuration loaded: requeue_interval={:?}, watch_namespace={}",
        config.requeue_interval,
        config.watch_namespace.as_deref().unwrap_or("<all>")
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for vineyard CRDs to become available...");
    wait_for_crds(&client).await?;

    let renderer = Arc::new(Renderer::new().context("Failed to load manifest templates")?);
    let cp: Arc<dyn ControlPlane> = Arc::new(KubeControlPlane::new(client.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let sidecar_reconciler = SidecarReconciler::new(
        cp.clone(),
        renderer.clone(),
        config.clone(),
        shutdown_rx.clone(),
    );
    let recover_reconciler = RecoverReconciler::new(cp, renderer, config, shutdown_rx);

    info!("Starting reconcilers...");

    tokio::try_join!(
        sidecar_reconciler.run(client.clone()),
        recover_reconciler.run(client)
    )?;

    info!("All reconcilers stopped");
    Ok(())
}
