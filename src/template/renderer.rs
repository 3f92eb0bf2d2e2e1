// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Rendering of the embedded manifest templates into control-plane objects.

use super::context::TemplateContext;
use kube::api::DynamicObject;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const RECOVER_JOB: &str = "recover/job.yaml";
pub const ETCD_POD: &str = "etcd/etcd.yaml";
pub const ETCD_SERVICE: &str = "etcd/service.yaml";
pub const VINEYARDD_ETCD_SERVICE: &str = "vineyardd/etcd-service.yaml";
pub const VINEYARDD_SERVICE: &str = "vineyardd/service.yaml";

const TEMPLATES: [(&str, &str); 5] = [
    (RECOVER_JOB, include_str!("../../templates/recover/job.yaml")),
    (ETCD_POD, include_str!("../../templates/etcd/etcd.yaml")),
    (ETCD_SERVICE, include_str!("../../templates/etcd/service.yaml")),
    (
        VINEYARDD_ETCD_SERVICE,
        include_str!("../../templates/vineyardd/etcd-service.yaml"),
    ),
    (
        VINEYARDD_SERVICE,
        include_str!("../../templates/vineyardd/service.yaml"),
    ),
];

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unknown template: {0}")]
    Unknown(String),

    #[error("Failed to render template {template}: {source}")]
    Render {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Failed to decode document {index} of template {template}: {source}")]
    Decode {
        template: String,
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Document {index} of template {template} has no apiVersion/kind")]
    MissingType { template: String, index: usize },
}

/// Named manifest templates, compiled once at startup
pub struct Renderer {
    env: Environment<'static>,
}

impl Renderer {
    pub fn new() -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);

        for (name, source) in TEMPLATES {
            env.add_template(name, source)
                .map_err(|source| TemplateError::Render {
                    template: name.to_string(),
                    source,
                })?;
        }

        Ok(Self { env })
    }

    /// Render a template and decode every document it produces
    pub fn render(
        &self,
        name: &str,
        ctx: &TemplateContext,
    ) -> Result<Vec<DynamicObject>, TemplateError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|_| TemplateError::Unknown(name.to_string()))?;

        let text = template.render(ctx).map_err(|source| TemplateError::Render {
            template: name.to_string(),
            source,
        })?;

        let objects = parse_documents(name, &text)?;
        debug!(template = name, count = objects.len(), "Rendered template");
        Ok(objects)
    }
}

/// Split a multi-document YAML stream into objects, skipping empty documents
pub fn parse_documents(template: &str, text: &str) -> Result<Vec<DynamicObject>, TemplateError> {
    let mut objects = Vec::new();

    for (index, document) in serde_yaml::Deserializer::from_str(text).enumerate() {
        let value =
            serde_yaml::Value::deserialize(document).map_err(|source| TemplateError::Decode {
                template: template.to_string(),
                index,
                source,
            })?;
        if value.is_null() {
            continue;
        }

        let object: DynamicObject =
            serde_yaml::from_value(value).map_err(|source| TemplateError::Decode {
                template: template.to_string(),
                index,
                source,
            })?;
        if object.types.is_none() {
            return Err(TemplateError::MissingType {
                template: template.to_string(),
                index,
            });
        }
        objects.push(object);
    }

    Ok(objects)
}
