// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Compact `key=value` label selectors used in Sidecar specs.

use crate::error::{OperatorError, Result};
use serde::Serialize;
use std::fmt;

/// A single equality label requirement
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LabelSelector {
    pub key: String,
    pub value: String,
}

impl LabelSelector {
    /// Parse `key=value`; both sides must be non-empty and only one `=` is allowed
    pub fn parse(selector: &str) -> Result<Self> {
        let invalid = |reason: &str| OperatorError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };

        let Some((key, value)) = selector.split_once('=') else {
            return Err(invalid("expected key=value"));
        };
        let (key, value) = (key.trim(), value.trim());

        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        if value.is_empty() {
            return Err(invalid("value is empty"));
        }
        if value.contains('=') {
            return Err(invalid("more than one '='"));
        }

        Ok(LabelSelector {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Renders in the form accepted by list label selectors
impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}
