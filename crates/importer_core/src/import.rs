use std::io::Read;
use std::str::FromStr;

use serde::Deserialize;

use crate::blobs::UploadState;
use crate::classify::{ClassifiedEntry, PathClassifier};
use crate::errors::{ItemFailure, Result};
use crate::manifest::{ManifestRecord, SchemaVariant, Submission};
use crate::oci_digest::OciDigest;
use crate::registry::{ManifestSpec, Registry};
use crate::report::{ImportReport, Item, Outcome};
use crate::scanner::{parse_archive, ArchiveSource, ParsedArchive};

/// Where a blob referenced from several repositories gets placed.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SharedBlobPolicy {
    /// Only the repository of the first manifest that referenced the blob.
    FirstRepository,
    /// Every owning repository; repositories after the first receive a cross-repository mount.
    #[default]
    AllRepositories,
}

impl FromStr for SharedBlobPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "first-repository" => Ok(SharedBlobPolicy::FirstRepository),
            "all-repositories" => Ok(SharedBlobPolicy::AllRepositories),
            s => Err(format!(
                "unknown shared blob policy `{s}`, expected `first-repository` or `all-repositories`"
            )),
        }
    }
}

/// Replays an archive into a registry in three strictly ordered passes: parse, upload blobs,
/// upload manifests.
///
/// Structural problems (unreadable archive, malformed manifest) abort the run before anything
/// is sent. Failures of individual registry calls are logged, recorded in the
/// [`ImportReport`] and do not stop the remaining work.
pub struct Importer<R: Registry> {
    registry: R,
    classifier: PathClassifier,
    policy: SharedBlobPolicy,
}

impl<R: Registry> Importer<R> {
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            classifier: PathClassifier::new(),
            policy: SharedBlobPolicy::default(),
        }
    }

    pub fn with_shared_blob_policy(mut self, policy: SharedBlobPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Run all three passes over `source`.
    pub async fn import<S>(&self, source: &S) -> Result<ImportReport>
    where
        S: ArchiveSource + ?Sized,
    {
        let mut parsed = self.parse(source)?;
        tracing::info!(
            "parsed {} manifests referencing {} blobs",
            parsed.manifests().len(),
            parsed.blobs().len()
        );

        let mut report = ImportReport::default();
        self.upload_blobs(source, &mut parsed, &mut report).await?;
        self.upload_manifests(&parsed, &mut report).await;

        Ok(report)
    }

    /// Parse pass.
    pub fn parse<S>(&self, source: &S) -> Result<ParsedArchive>
    where
        S: ArchiveSource + ?Sized,
    {
        parse_archive(&self.classifier, source.open()?)
    }

    /// Upload blobs pass: rescan the archive streaming each owned blob to the registry.
    pub async fn upload_blobs<S>(
        &self,
        source: &S,
        parsed: &mut ParsedArchive,
        report: &mut ImportReport,
    ) -> Result<()>
    where
        S: ArchiveSource + ?Sized,
    {
        let mut archive = tar::Archive::new(source.open()?);

        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry.path()?.to_string_lossy().into_owned();
            let digest = match self.classifier.classify(&path)? {
                Some(ClassifiedEntry::Blob { digest }) => digest,
                _ => continue,
            };
            let entry_size = entry.size();
            self.upload_blob(parsed, &digest, &mut entry, entry_size, report)
                .await;
        }

        Ok(())
    }

    async fn upload_blob(
        &self,
        parsed: &mut ParsedArchive,
        digest: &OciDigest,
        content: &mut dyn Read,
        entry_size: u64,
        report: &mut ImportReport,
    ) {
        let (repositories, size) = match parsed.blobs().get(digest) {
            Some(record) if !record.is_orphan() => (
                parsed.repositories_for(record),
                record.size().unwrap_or(entry_size),
            ),
            _ => {
                tracing::info!("UPLOAD BLOB: {digest} SKIPPED: no manifest references it");
                report.record(
                    Item::Blob {
                        digest: digest.clone(),
                        repository: None,
                    },
                    Outcome::Orphan,
                );
                return;
            }
        };

        let (primary, others) = match repositories.split_first() {
            Some(split) => split,
            None => return,
        };

        let state = self
            .push_blob(primary, digest, content, size, report)
            .await;
        self.set_upload_state(parsed, digest, primary, state);

        if self.policy == SharedBlobPolicy::FirstRepository {
            if !others.is_empty() {
                tracing::debug!(
                    "UPLOAD BLOB: {digest} also referenced from {others:?}, placing in {primary} only"
                );
            }
            return;
        }

        for repository in others {
            let state = self
                .mount_blob(repository, digest, primary, state, report)
                .await;
            self.set_upload_state(parsed, digest, repository, state);
        }
    }

    async fn push_blob(
        &self,
        repository: &str,
        digest: &OciDigest,
        content: &mut dyn Read,
        size: u64,
        report: &mut ImportReport,
    ) -> UploadState {
        let item = Item::Blob {
            digest: digest.clone(),
            repository: Some(repository.to_string()),
        };
        tracing::info!("UPLOAD BLOB: {digest} ({repository}) START");

        match self.registry.has_blob(repository, digest).await {
            Ok(true) => {
                tracing::info!("UPLOAD BLOB: {digest} ({repository}) ALREADY EXISTS");
                report.record(item, Outcome::AlreadyPresent);
                return UploadState::Present;
            }
            Ok(false) => (),
            Err(e) => {
                tracing::warn!("UPLOAD BLOB: {digest} ({repository}) existence check failed: {e}");
            }
        }

        match self
            .registry
            .upload_blob(repository, digest, content, size)
            .await
        {
            Ok(()) => {
                tracing::info!("UPLOAD BLOB: {digest} ({repository}) SUCCESS");
                report.record(item, Outcome::Uploaded);
                UploadState::Uploaded
            }
            Err(e) => {
                tracing::warn!("UPLOAD BLOB: {digest} ({repository}) FAILED: {e}");
                report.record(item, Outcome::Failed(ItemFailure::BlobUpload(e.to_string())));
                UploadState::Unknown
            }
        }
    }

    async fn mount_blob(
        &self,
        repository: &str,
        digest: &OciDigest,
        from: &str,
        source_state: UploadState,
        report: &mut ImportReport,
    ) -> UploadState {
        let item = Item::Blob {
            digest: digest.clone(),
            repository: Some(repository.to_string()),
        };
        let fail = |reason: String| {
            Outcome::Failed(ItemFailure::BlobMount {
                from: from.to_string(),
                reason,
            })
        };

        match self.registry.has_blob(repository, digest).await {
            Ok(true) => {
                tracing::info!("MOUNT BLOB: {digest} ({repository}) ALREADY EXISTS");
                report.record(item, Outcome::AlreadyPresent);
                return UploadState::Present;
            }
            Ok(false) => (),
            Err(e) => {
                tracing::warn!("MOUNT BLOB: {digest} ({repository}) existence check failed: {e}");
            }
        }

        if !source_state.is_available() {
            tracing::warn!("MOUNT BLOB: {digest} ({repository}) FAILED: not available in {from}");
            report.record(item, fail(String::from("blob unavailable in source repository")));
            return UploadState::Unknown;
        }

        match self.registry.mount_blob(repository, digest, from).await {
            Ok(true) => {
                tracing::info!("MOUNT BLOB: {digest} ({from} -> {repository}) SUCCESS");
                report.record(item, Outcome::Mounted);
                UploadState::Mounted
            }
            Ok(false) => {
                tracing::warn!("MOUNT BLOB: {digest} ({from} -> {repository}) DECLINED");
                report.record(item, fail(String::from("registry declined the mount")));
                UploadState::Unknown
            }
            Err(e) => {
                tracing::warn!("MOUNT BLOB: {digest} ({from} -> {repository}) FAILED: {e}");
                report.record(item, fail(e.to_string()));
                UploadState::Unknown
            }
        }
    }

    fn set_upload_state(
        &self,
        parsed: &mut ParsedArchive,
        digest: &OciDigest,
        repository: &str,
        state: UploadState,
    ) {
        if let Some(record) = parsed.blobs_mut().get_mut(digest) {
            record.set_upload_state(repository, state);
        }
    }

    /// Upload manifests pass: image manifests in archive order, then indexes.
    pub async fn upload_manifests(&self, parsed: &ParsedArchive, report: &mut ImportReport) {
        let mut indexes: Vec<&ManifestRecord> = Vec::new();

        for record in parsed.manifests() {
            match record.schema().submission() {
                Submission::Image => self.put_manifest(record, report).await,
                Submission::Index => indexes.push(record),
                Submission::NotSubmittable(reason) => {
                    tracing::info!("Put Manifest {} SKIPPED: {reason}", record.qualified_name());
                    report.record(
                        Item::Manifest {
                            name: record.qualified_name(),
                        },
                        Outcome::Skipped(reason),
                    );
                }
            }
        }

        for record in indexes {
            self.put_manifest(record, report).await;
        }
    }

    async fn put_manifest(&self, record: &ManifestRecord, report: &mut ImportReport) {
        let full_name = record.qualified_name();
        let item = Item::Manifest {
            name: full_name.clone(),
        };

        let decoded = match record.schema() {
            SchemaVariant::DistributionIndex { .. } => ManifestSpec::index(record.raw()),
            _ => ManifestSpec::image(record.raw()),
        };
        let spec = match decoded {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!("Put Manifest {full_name} FAILED: {e}");
                report.record(item, Outcome::Failed(ItemFailure::ManifestDecode(e.to_string())));
                return;
            }
        };

        match self
            .registry
            .put_manifest(
                record.repository(),
                record.reference(),
                &spec,
                record.raw().clone(),
            )
            .await
        {
            Ok(()) => {
                tracing::info!("Put Manifest {full_name} SUCCESS");
                report.record(item, Outcome::Submitted);
            }
            Err(e) => {
                tracing::warn!("Put Manifest {full_name} FAILED: {e}");
                report.record(
                    item,
                    Outcome::Failed(ItemFailure::ManifestSubmission(e.to_string())),
                );
            }
        }
    }
}
