// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Access to the cluster's object store, behind a trait so reconcilers can be
//! driven against an in-memory store in tests.

use crate::constants::OPERATOR_NAME;
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use futures::io::AsyncBufRead;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    api::{
        ApiResource, DeleteParams, DynamicObject, GroupVersionKind, ListParams, LogParams, Patch,
        PatchParams, PostParams,
    },
    core::TypeMeta,
    Api, Client, Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::pin::Pin;
use tracing::{debug, instrument};

/// Byte stream of a container's output; released when dropped
pub type LogStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// Identity of an object: its type plus namespace and name
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn new(type_meta: &TypeMeta, namespace: Option<&str>, name: &str) -> Self {
        ObjectKey {
            api_version: type_meta.api_version.clone(),
            kind: type_meta.kind.clone(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    /// Key of a statically typed resource
    pub fn of<K: Resource<DynamicType = ()>>(namespace: &str, name: &str) -> Self {
        Self::new(&type_meta_of::<K>(), Some(namespace), name)
    }

    pub fn from_object(object: &DynamicObject) -> Result<Self> {
        let types = object.types.as_ref().ok_or_else(|| {
            OperatorError::InvalidObject(format!(
                "object {} has no apiVersion/kind",
                object.name_any()
            ))
        })?;
        let name = object.metadata.name.as_deref().ok_or_else(|| {
            OperatorError::InvalidObject(format!("{} object has no name", types.kind))
        })?;
        Ok(Self::new(types, object.metadata.namespace.as_deref(), name))
    }

    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// Operations the reconcilers need from the control plane.
///
/// Absence is part of the contract: `get` returns `None` and `delete` returns
/// `false` for missing objects. A create racing another create fails with
/// [`OperatorError::AlreadyExists`], a write against a stale `resourceVersion`
/// fails with [`OperatorError::Conflict`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>>;

    async fn list(
        &self,
        type_meta: &TypeMeta,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>>;

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject>;

    /// Replace the object; guarded by its `resourceVersion` when set
    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject>;

    /// Write only the `status` of the object, guarded by its `resourceVersion`
    async fn update_status(&self, object: &DynamicObject) -> Result<DynamicObject>;

    async fn delete(&self, key: &ObjectKey) -> Result<bool>;

    async fn open_log_stream(&self, namespace: &str, pod: &str) -> Result<LogStream>;
}

pub fn type_meta_of<K: Resource<DynamicType = ()>>() -> TypeMeta {
    TypeMeta {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
    }
}

pub fn from_dynamic<K: DeserializeOwned>(object: DynamicObject) -> Result<K> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

pub fn to_dynamic<K: Serialize>(object: &K) -> Result<DynamicObject> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// Fetch a typed object, `None` when it does not exist
pub async fn get_typed<K>(cp: &dyn ControlPlane, namespace: &str, name: &str) -> Result<Option<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    cp.get(&ObjectKey::of::<K>(namespace, name))
        .await?
        .map(from_dynamic)
        .transpose()
}

/// List typed objects in a namespace matching a label selector
pub async fn list_typed<K>(
    cp: &dyn ControlPlane,
    namespace: &str,
    label_selector: &str,
) -> Result<Vec<K>>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    cp.list(&type_meta_of::<K>(), namespace, label_selector)
        .await?
        .into_iter()
        .map(from_dynamic)
        .collect()
}

/// Split an apiVersion into group and version; the core group is empty
pub fn parse_api_version(api_version: &str) -> (&str, &str) {
    match api_version.rsplit_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}

/// [`ControlPlane`] backed by a live API server
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
}

impl KubeControlPlane {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, type_meta: &TypeMeta, namespace: Option<&str>) -> Api<DynamicObject> {
        let (group, version) = parse_api_version(&type_meta.api_version);
        let gvk = GroupVersionKind::gvk(group, version, &type_meta.kind);
        let resource = ApiResource::from_gvk(&gvk);
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }
}

fn map_kube_error(operation: &'static str, key: &ObjectKey, err: kube::Error) -> OperatorError {
    match &err {
        kube::Error::Api(resp) if resp.code == 404 => OperatorError::NotFound(key.to_string()),
        kube::Error::Api(resp) if resp.code == 409 && operation == "create" => {
            OperatorError::AlreadyExists(key.to_string())
        }
        kube::Error::Api(resp) if resp.code == 409 => OperatorError::Conflict(key.to_string()),
        _ => OperatorError::kube(operation, key.to_string(), err),
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        self.api(&key.type_meta(), key.namespace.as_deref())
            .get_opt(&key.name)
            .await
            .map_err(|e| map_kube_error("get", key, e))
    }

    #[instrument(skip(self, type_meta), fields(kind = %type_meta.kind))]
    async fn list(
        &self,
        type_meta: &TypeMeta,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>> {
        let params = ListParams::default().labels(label_selector);
        let list = self
            .api(type_meta, Some(namespace))
            .list(&params)
            .await
            .map_err(|e| {
                OperatorError::kube(
                    "list",
                    format!("{} in {} ({})", type_meta.kind, namespace, label_selector),
                    e,
                )
            })?;
        // Items of a list response carry no apiVersion/kind
        Ok(list
            .items
            .into_iter()
            .map(|mut item| {
                item.types.get_or_insert_with(|| type_meta.clone());
                item
            })
            .collect())
    }

    async fn create(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::from_object(object)?;
        debug!(key = %key, "Creating object");
        self.api(&key.type_meta(), key.namespace.as_deref())
            .create(&Self::post_params(), object)
            .await
            .map_err(|e| map_kube_error("create", &key, e))
    }

    async fn update(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::from_object(object)?;
        debug!(key = %key, "Replacing object");
        self.api(&key.type_meta(), key.namespace.as_deref())
            .replace(&key.name, &Self::post_params(), object)
            .await
            .map_err(|e| map_kube_error("update", &key, e))
    }

    async fn update_status(&self, object: &DynamicObject) -> Result<DynamicObject> {
        let key = ObjectKey::from_object(object)?;
        // resourceVersion in a merge patch makes the API server reject stale writes
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": object.metadata.resource_version },
            "status": object.data.get("status"),
        });
        self.api(&key.type_meta(), key.namespace.as_deref())
            .patch_status(
                &key.name,
                &PatchParams {
                    field_manager: Some(OPERATOR_NAME.to_string()),
                    ..Default::default()
                },
                &Patch::Merge(&patch),
            )
            .await
            .map_err(|e| map_kube_error("update_status", &key, e))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<bool> {
        match self
            .api(&key.type_meta(), key.namespace.as_deref())
            .delete(&key.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
            Err(e) => Err(OperatorError::kube("delete", key.to_string(), e)),
        }
    }

    async fn open_log_stream(&self, namespace: &str, pod: &str) -> Result<LogStream> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let resource = format!("Pod {}/{}", namespace, pod);
        let stream = pods
            .log_stream(pod, &LogParams::default())
            .await
            .map_err(|e| match e {
                kube::Error::Api(resp) if resp.code == 404 => {
                    OperatorError::NotFound(resource.clone())
                }
                e => OperatorError::kube("open log stream", resource.clone(), e),
            })?;
        Ok(Box::pin(stream))
    }
}
