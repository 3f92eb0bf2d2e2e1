// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error during {operation} of {resource}: {source}")]
    Kube {
        operation: &'static str,
        resource: String,
        #[source]
        source: kube::Error,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Write conflict on {0}")]
    Conflict(String),

    #[error("Gave up updating {resource} after {attempts} conflicting attempts")]
    ConflictRetriesExhausted { resource: String, attempts: u32 },

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Invalid label selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid object: {0}")]
    InvalidObject(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to read logs of pod {pod}: {source}")]
    LogStream {
        pod: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {seconds}s while {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Resource {0} is not namespaced")]
    MissingNamespace(String),

    #[error("Reconciliation cancelled")]
    Cancelled,
}

impl OperatorError {
    /// Wrap a kube error with the operation and resource it happened on
    pub fn kube(operation: &'static str, resource: impl Into<String>, source: kube::Error) -> Self {
        OperatorError::Kube {
            operation,
            resource: resource.into(),
            source,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, OperatorError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
