//! Kubernetes client wrapper
//!
//! Provides a high-level interface to the Kubernetes API.

use anyhow::{Context, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::Value;
use std::future::Future;
use tracing::debug;

use super::ResourceRef;

/// Kubernetes client wrapper
#[derive(Clone)]
pub struct K8sClient {
    client: Client,
}

impl K8sClient {
    /// Create a client from the default kubeconfig / in-cluster environment
    pub async fn new() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;

        Ok(Self { client })
    }

    /// Create a client from an explicit kubeconfig file
    pub async fn from_kubeconfig(path: &str) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(path)
            .with_context(|| format!("Failed to read kubeconfig {path}"))?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context("Failed to load kubeconfig")?;

        Self::with_config(config)
    }

    /// Create client with custom config
    pub fn with_config(config: Config) -> Result<Self> {
        let client =
            Client::try_from(config).context("Failed to create Kubernetes client from config")?;

        Ok(Self { client })
    }

    /// Connect using an optional kubeconfig path, falling back to the default
    pub async fn connect(kubeconfig: Option<&str>) -> Result<Self> {
        match kubeconfig {
            Some(path) => Self::from_kubeconfig(path).await,
            None => Self::new().await,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Check if a CRD is installed, by its full name (`<plural>.<group>`)
    pub async fn crd_exists(&self, crd_name: &str) -> Result<bool> {
        let crds: Api<CustomResourceDefinition> = Api::all(self.client.clone());

        match crds.get(crd_name).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                debug!("CRD {} not installed", crd_name);
                Ok(false)
            }
            Err(e) => Err(e).context("Failed to check CRD existence"),
        }
    }

    /// Dynamic API for a custom resource that this tool does not own
    pub fn dynamic_api(&self, resource: &ResourceRef) -> Api<DynamicObject> {
        let ar = resource.api_resource();
        match &resource.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

/// Read and merge-patch access to custom resources as JSON.
///
/// `get` returns the object body without `metadata`, so `/spec` and
/// `/status` are top-level keys.
pub trait ObjectStore: Send + Sync {
    fn get(&self, resource: &ResourceRef) -> impl Future<Output = Result<Value>> + Send;

    fn merge_patch(
        &self,
        resource: &ResourceRef,
        patch: &Value,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl ObjectStore for K8sClient {
    async fn get(&self, resource: &ResourceRef) -> Result<Value> {
        let object = self
            .dynamic_api(resource)
            .get(&resource.name)
            .await
            .with_context(|| format!("Failed to get {resource}"))?;
        Ok(object.data)
    }

    async fn merge_patch(&self, resource: &ResourceRef, patch: &Value) -> Result<()> {
        self.dynamic_api(resource)
            .patch(&resource.name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .with_context(|| format!("Failed to patch {resource}"))?;
        Ok(())
    }
}
