//! Fixtures shared by the unit tests: in-memory archives, manifest payloads and a registry that
//! records every call made to it.
use std::collections::HashSet;
use std::io::Read;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;

use crate::oci_digest::OciDigest;
use crate::registry::{ManifestRef, ManifestSpec, Registry};

/// Build an uncompressed tar archive holding `entries` in order.
pub fn archive(entries: &[(&str, &[u8])]) -> Bytes {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, *data)
            .expect("appending to an in-memory archive");
    }
    Bytes::from(builder.into_inner().expect("finishing an in-memory archive"))
}

pub fn v2_manifest(config: &str, layers: &[&str]) -> Vec<u8> {
    let layers: Vec<_> = layers
        .iter()
        .map(|digest| {
            json!({
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "digest": digest,
                "size": 1,
            })
        })
        .collect();
    serde_json::to_vec_pretty(&json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "digest": config,
            "size": 1,
        },
        "layers": layers,
    }))
    .expect("serializing manifest fixture")
}

pub fn v1_manifest(blob_sums: &[&str]) -> Vec<u8> {
    let fs_layers: Vec<_> = blob_sums
        .iter()
        .map(|digest| json!({ "blobSum": digest }))
        .collect();
    serde_json::to_vec(&json!({
        "schemaVersion": 1,
        "name": "legacy",
        "tag": "old",
        "architecture": "amd64",
        "fsLayers": fs_layers,
        "history": [],
    }))
    .expect("serializing manifest fixture")
}

pub fn index_manifest(manifests: &[&str]) -> Vec<u8> {
    let manifests: Vec<_> = manifests
        .iter()
        .map(|digest| {
            json!({
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": digest,
                "size": 1,
            })
        })
        .collect();
    serde_json::to_vec(&json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.index.v1+json",
        "manifests": manifests,
    }))
    .expect("serializing index fixture")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    HasBlob {
        repository: String,
        digest: String,
    },
    UploadBlob {
        repository: String,
        digest: String,
        size: u64,
        received: usize,
    },
    MountBlob {
        repository: String,
        digest: String,
        from: String,
    },
    PutManifest {
        repository: String,
        reference: String,
        content_type: String,
        body: Bytes,
    },
}

impl Call {
    pub fn is_blob_call(&self) -> bool {
        !matches!(self, Call::PutManifest { .. })
    }
}

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct RegistryError(String);

/// In-memory registry that remembers which blobs it holds.
#[derive(Default)]
pub struct RecordingRegistry {
    calls: Mutex<Vec<Call>>,
    blobs: Mutex<HashSet<(String, String)>>,
    failing_uploads: HashSet<String>,
    failing_manifests: HashSet<String>,
    failing_checks: bool,
    refuse_mounts: bool,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(self, repository: &str, digest: &str) -> Self {
        self.blobs
            .lock()
            .expect("registry lock")
            .insert((repository.to_string(), digest.to_string()));
        self
    }

    pub fn failing_upload(mut self, digest: &str) -> Self {
        self.failing_uploads.insert(digest.to_string());
        self
    }

    pub fn failing_manifest(mut self, reference: &str) -> Self {
        self.failing_manifests.insert(reference.to_string());
        self
    }

    pub fn failing_existence_checks(mut self) -> Self {
        self.failing_checks = true;
        self
    }

    pub fn refusing_mounts(mut self) -> Self {
        self.refuse_mounts = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("registry lock").clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("registry lock").clear();
    }

    pub fn holds(&self, repository: &str, digest: &str) -> bool {
        self.blobs
            .lock()
            .expect("registry lock")
            .contains(&(repository.to_string(), digest.to_string()))
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("registry lock").push(call);
    }
}

#[async_trait(?Send)]
impl Registry for RecordingRegistry {
    type Error = RegistryError;

    async fn has_blob(&self, repository: &str, digest: &OciDigest) -> Result<bool, RegistryError> {
        self.record(Call::HasBlob {
            repository: repository.to_string(),
            digest: digest.to_string(),
        });
        if self.failing_checks {
            return Err(RegistryError(String::from("service unavailable")));
        }
        Ok(self.holds(repository, &digest.to_string()))
    }

    async fn upload_blob(
        &self,
        repository: &str,
        digest: &OciDigest,
        content: &mut dyn Read,
        size: u64,
    ) -> Result<(), RegistryError> {
        let mut data = Vec::new();
        content
            .read_to_end(&mut data)
            .map_err(|e| RegistryError(e.to_string()))?;
        self.record(Call::UploadBlob {
            repository: repository.to_string(),
            digest: digest.to_string(),
            size,
            received: data.len(),
        });
        if self.failing_uploads.contains(&digest.to_string()) {
            return Err(RegistryError(String::from("connection reset")));
        }
        self.blobs
            .lock()
            .expect("registry lock")
            .insert((repository.to_string(), digest.to_string()));
        Ok(())
    }

    async fn mount_blob(
        &self,
        repository: &str,
        digest: &OciDigest,
        from: &str,
    ) -> Result<bool, RegistryError> {
        self.record(Call::MountBlob {
            repository: repository.to_string(),
            digest: digest.to_string(),
            from: from.to_string(),
        });
        if self.refuse_mounts || !self.holds(from, &digest.to_string()) {
            return Ok(false);
        }
        self.blobs
            .lock()
            .expect("registry lock")
            .insert((repository.to_string(), digest.to_string()));
        Ok(true)
    }

    async fn put_manifest(
        &self,
        repository: &str,
        reference: &ManifestRef,
        spec: &ManifestSpec,
        body: Bytes,
    ) -> Result<(), RegistryError> {
        self.record(Call::PutManifest {
            repository: repository.to_string(),
            reference: reference.to_string(),
            content_type: spec.content_type(),
            body,
        });
        if self.failing_manifests.contains(&reference.to_string()) {
            return Err(RegistryError(String::from("manifest blob unknown")));
        }
        Ok(())
    }
}
