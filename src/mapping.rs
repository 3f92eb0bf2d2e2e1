// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Extraction of the object id mapping printed by recover jobs.
//!
//! Every recover pod prints one `source -> destination` line per restored object.

use crate::constants::{labels::JOB_CONTROLLER_UID, MAPPING_DELIMITER};
use crate::error::{OperatorError, Result};
use crate::kubernetes::{list_typed, ControlPlane};
use futures::io::AsyncReadExt;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument};

pub type ObjectMapping = BTreeMap<String, String>;

/// Collect `key -> value` lines; other lines and lines with an empty key are ignored
pub fn parse_mapping(text: &str) -> ObjectMapping {
    text.lines()
        .filter_map(|line| line.split_once(MAPPING_DELIMITER))
        .map(|(key, value)| (key.trim(), value.trim()))
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Read the complete log of one pod and parse its mapping.
///
/// The whole read, including opening the stream, is bounded by `deadline`.
pub async fn read_pod_mapping(
    cp: &dyn ControlPlane,
    namespace: &str,
    pod: &str,
    deadline: Duration,
) -> Result<ObjectMapping> {
    let read = async {
        let mut stream = cp.open_log_stream(namespace, pod).await?;
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .await
            .map_err(|source| OperatorError::LogStream {
                pod: format!("{}/{}", namespace, pod),
                source,
            })?;
        Ok::<_, OperatorError>(bytes)
    };

    let bytes = timeout(deadline, read)
        .await
        .map_err(|_| OperatorError::Timeout {
            operation: format!("reading logs of pod {}/{}", namespace, pod),
            seconds: deadline.as_secs(),
        })??;

    // Lossy decoding keeps the mapping lines around any binary output
    Ok(parse_mapping(&String::from_utf8_lossy(&bytes)))
}

/// Label value the job controller puts on the job's pods
fn controller_uid(job: &Job) -> Option<String> {
    job.spec
        .as_ref()
        .and_then(|spec| spec.template.metadata.as_ref())
        .and_then(|meta| meta.labels.as_ref())
        .and_then(|labels| labels.get(JOB_CONTROLLER_UID).cloned())
        .or_else(|| job.uid())
}

/// Merge the mappings printed by every pod of `job`.
///
/// Pods are processed in name order and later pods win on duplicate keys. A pod
/// that is gone by the time its log is opened has nothing to contribute; any
/// other pod whose log cannot be read fails the whole extraction.
#[instrument(skip(cp, job), fields(job = %job.name_any()))]
pub async fn extract_job_mapping(
    cp: &dyn ControlPlane,
    job: &Job,
    deadline: Duration,
) -> Result<ObjectMapping> {
    let namespace = job
        .namespace()
        .ok_or_else(|| OperatorError::MissingNamespace(format!("Job {}", job.name_any())))?;
    let uid = controller_uid(job)
        .ok_or_else(|| OperatorError::InvalidObject(format!("Job {} has no uid", job.name_any())))?;

    let mut pods: Vec<Pod> =
        list_typed(cp, &namespace, &format!("{}={}", JOB_CONTROLLER_UID, uid)).await?;
    pods.sort_by_key(|pod| pod.name_any());

    let mut mapping = ObjectMapping::new();
    for pod in &pods {
        let pod_mapping = match read_pod_mapping(cp, &namespace, &pod.name_any(), deadline).await {
            Ok(pod_mapping) => pod_mapping,
            Err(OperatorError::NotFound(_)) => {
                debug!(pod = %pod.name_any(), "Pod is gone, nothing to extract");
                continue;
            }
            Err(e) => return Err(e),
        };
        debug!(pod = %pod.name_any(), entries = pod_mapping.len(), "Read object mapping");
        mapping.extend(pod_mapping);
    }

    Ok(mapping)
}
