use bytes::Bytes;
use serde::de::IgnoredAny;
use serde::Deserialize;

use crate::errors::ManifestError;
use crate::oci_digest::OciDigest;
use crate::registry::ManifestRef;

const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";

/// Position of a [`ManifestRecord`] in the ordered manifest list of a
/// [`ParsedArchive`](crate::ParsedArchive).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManifestId(pub(crate) usize);

impl ManifestId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One manifest read from the archive.
#[derive(Clone, Debug)]
pub struct ManifestRecord {
    repository: String,
    reference: ManifestRef,
    raw: Bytes,
    schema: SchemaVariant,
}

impl ManifestRecord {
    pub fn new(repository: String, reference: ManifestRef, raw: Bytes, schema: SchemaVariant) -> Self {
        Self {
            repository,
            reference,
            raw,
            schema,
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn reference(&self) -> &ManifestRef {
        &self.reference
    }

    /// The tag, or the digest string, the manifest is registered under.
    pub fn name(&self) -> String {
        self.reference.to_string()
    }

    pub fn tag(&self) -> Option<&str> {
        self.reference.tag()
    }

    pub fn digest(&self) -> Option<&OciDigest> {
        self.reference.digest()
    }

    /// The payload exactly as it appeared in the archive.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn schema(&self) -> &SchemaVariant {
        &self.schema
    }

    pub fn qualified_name(&self) -> String {
        self.reference.qualify(&self.repository)
    }
}

/// The decoded shape of a manifest payload.
///
/// Exactly one reference list is populated per variant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaVariant {
    /// Docker image manifest schema 1. Its blob graph is imported but the manifest itself is
    /// never re-submitted.
    LegacyV1 { fs_layers: Vec<OciDigest> },
    /// Docker image manifest schema 2 or OCI image manifest.
    DistributionV2 {
        layers: Vec<OciDigest>,
        config: Option<OciDigest>,
    },
    /// Docker manifest list or OCI image index. References other manifests, not blobs.
    DistributionIndex { manifests: Vec<OciDigest> },
    /// Any other `schemaVersion`.
    Unknown { schema_version: u32 },
}

/// How the manifest upload pass treats a manifest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Submission {
    Image,
    /// Submitted after all images, since it refers to them.
    Index,
    NotSubmittable(&'static str),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Versioned {
    schema_version: u32,
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    manifests: Option<IgnoredAny>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchemaV1 {
    #[serde(default)]
    fs_layers: Vec<FsLayer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FsLayer {
    blob_sum: String,
}

#[derive(Deserialize)]
struct SchemaV2 {
    #[serde(default)]
    config: Option<DescriptorDigest>,
    #[serde(default)]
    layers: Vec<DescriptorDigest>,
}

#[derive(Deserialize)]
struct SchemaV2Index {
    manifests: Vec<DescriptorDigest>,
}

#[derive(Deserialize)]
struct DescriptorDigest {
    digest: String,
}

impl SchemaVariant {
    /// Decode a manifest payload far enough to know what it references.
    ///
    /// Only `schemaVersion` is read first; the rest of the payload is decoded according to it.
    pub fn decode(raw: &[u8]) -> std::result::Result<Self, ManifestError> {
        let versioned: Versioned = serde_json::from_slice(raw)?;

        match versioned.schema_version {
            1 => {
                let manifest: SchemaV1 = serde_json::from_slice(raw)?;
                let fs_layers = references(manifest.fs_layers.iter().map(|l| l.blob_sum.as_str()));
                Ok(SchemaVariant::LegacyV1 { fs_layers })
            }
            2 if is_index(&versioned) => {
                let index: SchemaV2Index = serde_json::from_slice(raw)?;
                let manifests = references(index.manifests.iter().map(|d| d.digest.as_str()));
                Ok(SchemaVariant::DistributionIndex { manifests })
            }
            2 => {
                let manifest: SchemaV2 = serde_json::from_slice(raw)?;
                let layers = references(manifest.layers.iter().map(|d| d.digest.as_str()));
                let config = manifest
                    .config
                    .and_then(|c| references(std::iter::once(c.digest.as_str())).pop());
                Ok(SchemaVariant::DistributionV2 { layers, config })
            }
            schema_version => Ok(SchemaVariant::Unknown { schema_version }),
        }
    }

    /// Blobs this manifest owns, in declaration order; repeats are preserved.
    pub fn blob_references(&self) -> Vec<&OciDigest> {
        match self {
            SchemaVariant::LegacyV1 { fs_layers } => fs_layers.iter().collect(),
            SchemaVariant::DistributionV2 { layers, config } => {
                layers.iter().chain(config.iter()).collect()
            }
            SchemaVariant::DistributionIndex { .. } => Vec::new(),
            SchemaVariant::Unknown { .. } => Vec::new(),
        }
    }

    pub fn submission(&self) -> Submission {
        match self {
            SchemaVariant::DistributionV2 { .. } => Submission::Image,
            SchemaVariant::DistributionIndex { .. } => Submission::Index,
            SchemaVariant::LegacyV1 { .. } => {
                Submission::NotSubmittable("schema 1 manifests are imported read-only")
            }
            SchemaVariant::Unknown { .. } => {
                Submission::NotSubmittable("unknown manifest schema version")
            }
        }
    }
}

fn is_index(versioned: &Versioned) -> bool {
    match versioned.media_type.as_deref() {
        Some(OCI_INDEX) | Some(DOCKER_MANIFEST_LIST) => true,
        Some(_) => false,
        None => versioned.manifests.is_some(),
    }
}

/// Parse content references, dropping any that are not valid digests.
fn references<'a>(digests: impl Iterator<Item = &'a str>) -> Vec<OciDigest> {
    digests
        .filter_map(|s| match OciDigest::try_from(s) {
            Ok(digest) => Some(digest),
            Err(e) => {
                tracing::warn!("ignoring content reference: {e}");
                None
            }
        })
        .collect()
}
