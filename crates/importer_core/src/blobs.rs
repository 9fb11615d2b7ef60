use std::collections::HashMap;

use crate::manifest::ManifestId;
use crate::oci_digest::OciDigest;

/// What is known about a blob's presence in a particular target repository.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadState {
    #[default]
    Unknown,
    /// The registry already had it.
    Present,
    Uploaded,
    /// Mounted from another repository in the same registry.
    Mounted,
}

impl UploadState {
    pub fn is_available(&self) -> bool {
        !matches!(self, UploadState::Unknown)
    }
}

/// One content-addressed blob and the manifests that reference it.
#[derive(Clone, Debug, Default)]
pub struct BlobRecord {
    size: Option<u64>,
    owners: Vec<ManifestId>,
    uploaded: HashMap<String, UploadState>,
}

impl BlobRecord {
    /// Byte length of the blob entry, once it has been seen in the archive.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Owning manifests in the order they were first seen, each at most once.
    pub fn owners(&self) -> &[ManifestId] {
        &self.owners
    }

    pub fn first_owner(&self) -> Option<ManifestId> {
        self.owners.first().copied()
    }

    pub fn is_orphan(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn upload_state(&self, repository: &str) -> UploadState {
        self.uploaded.get(repository).copied().unwrap_or_default()
    }

    pub(crate) fn set_upload_state(&mut self, repository: &str, state: UploadState) {
        self.uploaded.insert(repository.to_string(), state);
    }

    fn add_owner(&mut self, manifest: ManifestId) -> bool {
        if self.owners.contains(&manifest) {
            return false;
        }
        self.owners.push(manifest);
        true
    }
}

/// Blob records keyed by digest.
///
/// Manifests and blob entries may arrive in any order; both paths create the record on first
/// sight and merge into it afterwards.
#[derive(Clone, Debug, Default)]
pub struct BlobIndex {
    blobs: HashMap<OciDigest, BlobRecord>,
}

impl BlobIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `manifest` references `digest`.
    ///
    /// Returns `false` when the manifest was already an owner.
    pub fn reference(&mut self, digest: &OciDigest, manifest: ManifestId) -> bool {
        self.blobs
            .entry(digest.clone())
            .or_default()
            .add_owner(manifest)
    }

    /// Record the byte length of a blob entry.
    pub fn observe(&mut self, digest: &OciDigest, size: u64) {
        self.blobs.entry(digest.clone()).or_default().size = Some(size);
    }

    pub fn get(&self, digest: &OciDigest) -> Option<&BlobRecord> {
        self.blobs.get(digest)
    }

    pub(crate) fn get_mut(&mut self, digest: &OciDigest) -> Option<&mut BlobRecord> {
        self.blobs.get_mut(digest)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OciDigest, &BlobRecord)> {
        self.blobs.iter()
    }

    /// Blob entries no manifest references.
    pub fn orphans(&self) -> impl Iterator<Item = &OciDigest> {
        self.blobs
            .iter()
            .filter(|(_, b)| b.is_orphan())
            .map(|(d, _)| d)
    }

    /// Referenced blobs with no entry in the archive.
    pub fn missing(&self) -> impl Iterator<Item = &OciDigest> {
        self.blobs
            .iter()
            .filter(|(_, b)| b.size.is_none())
            .map(|(d, _)| d)
    }
}
