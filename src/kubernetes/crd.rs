// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::API_GROUP;
use crate::error::{OperatorError, Result};
use kube::{discovery::Discovery, Client};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Kinds the operator watches or reads
pub const REQUIRED_KINDS: [&str; 3] = ["Sidecar", "Recover", "Backup"];

/// Wait for the operator's CRDs to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_crds(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match missing_kinds(client).await {
            Ok(missing) if missing.is_empty() => {
                info!("CRDs of {} are available", API_GROUP);
                return Ok(());
            }
            Ok(missing) => {
                info!(
                    "CRDs {:?} of {} not yet available, waiting {} seconds...",
                    missing, API_GROUP, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for {} CRDs: {}, retrying in {} seconds...",
                    API_GROUP, e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Required kinds that discovery does not report yet
async fn missing_kinds(client: &Client) -> Result<Vec<&'static str>> {
    let discovery = Discovery::new(client.clone())
        .filter(&[API_GROUP])
        .run()
        .await
        .map_err(|e| OperatorError::kube("discovery", API_GROUP, e))?;

    let served: BTreeSet<String> = discovery
        .groups()
        .filter(|group| group.name() == API_GROUP)
        .flat_map(|group| group.recommended_resources())
        .map(|(ar, _)| ar.kind)
        .collect();

    Ok(missing_from(&served))
}

fn missing_from(served: &BTreeSet<String>) -> Vec<&'static str> {
    REQUIRED_KINDS
        .into_iter()
        .filter(|kind| !served.contains(*kind))
        .collect()
}
