//! # Registry Abstractions
//!
//! Defines the boundary between the import passes in [`crate::Importer`] and whatever actually
//! talks to a remote registry.
//!
//! The importer only ever asks four things of a registry: does a blob exist in a repository,
//! upload a blob into a repository, mount a blob already present in one repository into
//! another, and register a manifest under a tag or digest. Everything else (transport,
//! authentication, retries) lives behind the [`Registry`] trait.
//!
//! ## Known Implementations
//!
//! ### importer_http
//!
//! Speaks the [OCI Distribution
//! API](https://github.com/opencontainers/distribution-spec/blob/main/spec.md) over plain HTTP.
use std::fmt;
use std::io::Read;

use async_trait::async_trait;
use bytes::Bytes;
use oci_spec::image::{ImageIndex, ImageManifest, MediaType};

use crate::errors::ManifestError;
use crate::oci_digest::OciDigest;

/// Remote registry operations used by the upload passes.
///
/// Calls are made one at a time and awaited before the next one starts. The trait is `?Send`
/// because blob content is handed over as a reader borrowed from the archive being scanned.
#[async_trait(?Send)]
pub trait Registry {
    type Error: std::error::Error;

    /// Whether `digest` already exists in `repository`.
    async fn has_blob(
        &self,
        repository: &str,
        digest: &OciDigest,
    ) -> std::result::Result<bool, Self::Error>;

    /// Upload exactly `size` bytes read from `content` as blob `digest` in `repository`.
    async fn upload_blob(
        &self,
        repository: &str,
        digest: &OciDigest,
        content: &mut dyn Read,
        size: u64,
    ) -> std::result::Result<(), Self::Error>;

    /// Mount blob `digest` from repository `from` into `repository` without re-sending content.
    ///
    /// Returns `false` when the registry declined to mount.
    async fn mount_blob(
        &self,
        repository: &str,
        digest: &OciDigest,
        from: &str,
    ) -> std::result::Result<bool, Self::Error>;

    /// Register a manifest under `reference` in `repository`.
    ///
    /// `body` holds the exact bytes read from the archive; `spec` is its decoded form.
    async fn put_manifest(
        &self,
        repository: &str,
        reference: &ManifestRef,
        spec: &ManifestSpec,
        body: Bytes,
    ) -> std::result::Result<(), Self::Error>;
}

/// Abstraction over [`oci_spec::image::ImageManifest`] and [`oci_spec::image::ImageIndex`].
///
/// This is the form a manifest is handed to [`Registry::put_manifest`] in.
#[derive(Debug)]
pub enum ManifestSpec {
    Image(ImageManifest),
    Index(ImageIndex),
}

impl TryFrom<&Bytes> for ManifestSpec {
    type Error = ManifestError;

    fn try_from(bs: &Bytes) -> std::result::Result<Self, Self::Error> {
        let img_rej_err = match serde_json::from_slice::<ImageManifest>(bs) {
            Ok(m) => return Ok(ManifestSpec::Image(m)),
            Err(e) => e,
        };
        match serde_json::from_slice::<ImageIndex>(bs) {
            Ok(m) => Ok(ManifestSpec::Index(m)),
            Err(ind_rej_err) => {
                tracing::warn!("unable to deserialize manifest as image: {img_rej_err:?}");
                tracing::warn!("unable to deserialize manifest as index: {ind_rej_err:?}");
                Err(ManifestError::Invalid)
            }
        }
    }
}

impl ManifestSpec {
    /// Decode `bs` as an image manifest only.
    pub fn image(bs: &Bytes) -> std::result::Result<Self, ManifestError> {
        Ok(ManifestSpec::Image(serde_json::from_slice(bs)?))
    }

    /// Decode `bs` as an image index only.
    pub fn index(bs: &Bytes) -> std::result::Result<Self, ManifestError> {
        Ok(ManifestSpec::Index(serde_json::from_slice(bs)?))
    }

    #[inline(always)]
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            ManifestSpec::Image(im) => im.media_type().clone(),
            ManifestSpec::Index(ii) => ii.media_type().clone(),
        }
    }

    /// Content type to submit the manifest with, falling back to the OCI media type for its kind
    /// when the payload does not declare one.
    pub fn content_type(&self) -> String {
        let mt = self.media_type().unwrap_or(match self {
            ManifestSpec::Image(_) => MediaType::ImageManifest,
            ManifestSpec::Index(_) => MediaType::ImageIndex,
        });
        mt.to_string()
    }
}

/// Reference to an [OCI
/// Manifest](https://github.com/opencontainers/image-spec/blob/main/manifest.md) as specified by
/// the [OCI Distrbution Spec](https://github.com/opencontainers/distribution-spec).
///
/// This refers to the `<reference>` portion of distribution API endpoints taking the form
/// `/v2/<name>/manifests/<reference>`, which is also how manifests are addressed inside an
/// import archive (`<name>/manifests/<reference>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestRef {
    Digest(OciDigest),
    Tag(String),
}

impl ManifestRef {
    pub fn tag(&self) -> Option<&str> {
        match self {
            ManifestRef::Tag(t) => Some(t.as_str()),
            ManifestRef::Digest(_) => None,
        }
    }

    pub fn digest(&self) -> Option<&OciDigest> {
        match self {
            ManifestRef::Digest(d) => Some(d),
            ManifestRef::Tag(_) => None,
        }
    }

    /// `<repository>:<tag>` or `<repository>@<digest>`.
    pub fn qualify(&self, repository: &str) -> String {
        match self {
            ManifestRef::Tag(t) => format!("{repository}:{t}"),
            ManifestRef::Digest(d) => format!("{repository}@{d}"),
        }
    }
}

impl fmt::Display for ManifestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestRef::Tag(t) => f.write_str(t),
            ManifestRef::Digest(d) => write!(f, "{d}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const IMAGE: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {
            "mediaType": "application/vnd.docker.container.image.v1+json",
            "digest": "sha256:bbb",
            "size": 50
        },
        "layers": [
            {
                "mediaType": "application/vnd.docker.image.rootfs.diff.tar.gzip",
                "digest": "sha256:aaa",
                "size": 100
            }
        ]
    }"#;

    const INDEX: &str = r#"{
        "schemaVersion": 2,
        "manifests": [
            {
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": "sha256:ccc",
                "size": 300
            }
        ]
    }"#;

    #[test]
    fn decodes_image_and_keeps_declared_media_type() {
        let spec = ManifestSpec::try_from(&Bytes::from_static(IMAGE.as_bytes())).unwrap();
        assert!(matches!(spec, ManifestSpec::Image(_)));
        assert_eq!(
            spec.content_type(),
            "application/vnd.docker.distribution.manifest.v2+json"
        );
    }

    #[test]
    fn decodes_index_and_infers_media_type() {
        let spec = ManifestSpec::try_from(&Bytes::from_static(INDEX.as_bytes())).unwrap();
        assert!(matches!(spec, ManifestSpec::Index(_)));
        assert_eq!(
            spec.content_type(),
            "application/vnd.oci.image.index.v1+json"
        );
    }

    #[test]
    fn rejects_payload_of_neither_kind() {
        let bs = Bytes::from_static(br#"{"schemaVersion": 2}"#);
        assert!(matches!(
            ManifestSpec::try_from(&bs),
            Err(ManifestError::Invalid)
        ));
    }

    #[test]
    fn qualifies_references() {
        let tag = ManifestRef::Tag(String::from("latest"));
        let digest = ManifestRef::Digest("sha256:abc".parse().unwrap());
        assert_eq!(tag.qualify("library/alpine"), "library/alpine:latest");
        assert_eq!(digest.qualify("library/alpine"), "library/alpine@sha256:abc");
        assert_eq!(digest.to_string(), "sha256:abc");
        assert_eq!(tag.tag(), Some("latest"));
        assert!(tag.digest().is_none());
    }
}
