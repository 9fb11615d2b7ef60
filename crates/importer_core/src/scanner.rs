use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::blobs::{BlobIndex, BlobRecord};
use crate::classify::{ClassifiedEntry, PathClassifier};
use crate::errors::{Error, Result};
use crate::manifest::{ManifestId, ManifestRecord, SchemaVariant};
use crate::registry::ManifestRef;

/// Something an import archive can be (re)opened from.
///
/// Each pass over the archive opens it anew and reads it front to back.
pub trait ArchiveSource {
    type Reader: Read;

    fn open(&self) -> io::Result<Self::Reader>;
}

impl ArchiveSource for Path {
    type Reader = File;

    fn open(&self) -> io::Result<File> {
        File::open(self)
    }
}

impl ArchiveSource for PathBuf {
    type Reader = File;

    fn open(&self) -> io::Result<File> {
        File::open(self)
    }
}

impl ArchiveSource for Bytes {
    type Reader = Cursor<Bytes>;

    fn open(&self) -> io::Result<Cursor<Bytes>> {
        Ok(Cursor::new(self.clone()))
    }
}

/// Result of the parse pass: every manifest in archive order and the blob index built from
/// them.
#[derive(Clone, Debug, Default)]
pub struct ParsedArchive {
    manifests: Vec<ManifestRecord>,
    blobs: BlobIndex,
}

impl ParsedArchive {
    pub fn manifests(&self) -> &[ManifestRecord] {
        &self.manifests
    }

    pub fn manifest(&self, id: ManifestId) -> &ManifestRecord {
        &self.manifests[id.0]
    }

    pub fn blobs(&self) -> &BlobIndex {
        &self.blobs
    }

    pub(crate) fn blobs_mut(&mut self) -> &mut BlobIndex {
        &mut self.blobs
    }

    /// Distinct repositories of a blob's owning manifests, first owner first.
    pub fn repositories_for(&self, record: &BlobRecord) -> Vec<String> {
        let mut repositories: Vec<String> = Vec::new();
        for id in record.owners() {
            let repository = self.manifest(*id).repository();
            if !repositories.iter().any(|r| r == repository) {
                repositories.push(repository.to_string());
            }
        }
        repositories
    }

    /// Decode a manifest payload and add it, along with its blob ownership edges.
    pub fn add_manifest(
        &mut self,
        path: &str,
        repository: String,
        reference: ManifestRef,
        raw: Bytes,
    ) -> Result<ManifestId> {
        let schema = SchemaVariant::decode(&raw).map_err(|source| Error::MalformedManifest {
            path: path.to_string(),
            source,
        })?;

        let id = ManifestId(self.manifests.len());
        for digest in schema.blob_references() {
            self.blobs.reference(digest, id);
        }
        self.manifests
            .push(ManifestRecord::new(repository, reference, raw, schema));
        Ok(id)
    }
}

/// Single forward pass over an archive building the manifest list and blob index.
///
/// Manifest payloads are read fully into memory; blob payloads are only counted. Unrecognized
/// entries are skipped, and the tar reader discards whatever of an entry was left unread
/// before moving to the next header.
pub fn parse_archive<R: Read>(classifier: &PathClassifier, reader: R) -> Result<ParsedArchive> {
    let mut archive = tar::Archive::new(reader);
    let mut parsed = ParsedArchive::default();

    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();

        match classifier.classify(&path)? {
            Some(ClassifiedEntry::TagManifest { repository, tag }) => {
                tracing::info!("MANIFEST: {repository}:{tag}");
                let raw = read_payload(&mut entry)?;
                parsed.add_manifest(&path, repository, ManifestRef::Tag(tag), raw)?;
            }
            Some(ClassifiedEntry::DigestManifest { repository, digest }) => {
                tracing::info!("MANIFEST: {repository}@{digest}");
                let raw = read_payload(&mut entry)?;
                parsed.add_manifest(&path, repository, ManifestRef::Digest(digest), raw)?;
            }
            Some(ClassifiedEntry::Blob { digest }) => {
                let size = io::copy(&mut entry, &mut io::sink())?;
                tracing::debug!("BLOB: {digest} ({size} bytes)");
                parsed.blobs.observe(&digest, size);
            }
            None => {
                tracing::trace!("skipping unrecognized entry: {path}");
            }
        }
    }

    Ok(parsed)
}

fn read_payload(entry: &mut impl Read) -> io::Result<Bytes> {
    let mut data = Vec::new();
    entry.read_to_end(&mut data)?;
    Ok(Bytes::from(data))
}
