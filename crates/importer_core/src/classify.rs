use regex::Regex;

use crate::errors::{Error, Result};
use crate::oci_digest::OciDigest;

// `<algorithm>:<encoded>` by shape only; the digest grammar is checked after matching
const DIGEST_SHAPE: &str = r"([^/:]+):([^/]+)";

/// What an archive entry holds, as determined by its path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClassifiedEntry {
    /// `<repository>/manifests/<tag>`
    TagManifest { repository: String, tag: String },
    /// `<repository>/manifests/<algorithm>:<encoded>`
    DigestManifest {
        repository: String,
        digest: OciDigest,
    },
    /// `blob/<algorithm>:<encoded>`
    Blob { digest: OciDigest },
}

/// Matches archive entry paths against the layout written by a registry export.
///
/// Patterns are anchored to the whole path. A tag reference may not contain `:` so a digest
/// manifest path is never mistaken for a tag. References containing `/` are not recognized.
///
/// A manifest path shaped like `<repository>/manifests/<algorithm>:<encoded>` whose digest is
/// invalid is an error rather than an unrecognized entry. A blob path with an invalid digest is
/// skipped with a warning.
#[derive(Clone, Debug)]
pub struct PathClassifier {
    tag_manifest: Regex,
    digest_manifest: Regex,
    blob: Regex,
}

impl Default for PathClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PathClassifier {
    pub fn new() -> Self {
        Self {
            tag_manifest: Regex::new(r"^(.+)/manifests/([^/:]+)$")
                .expect("tag manifest pattern must compile"),
            digest_manifest: Regex::new(&format!(r"^(.+)/manifests/{DIGEST_SHAPE}$"))
                .expect("digest manifest pattern must compile"),
            blob: Regex::new(&format!(r"^blob/{DIGEST_SHAPE}$")).expect("blob pattern must compile"),
        }
    }

    /// Classify an archive entry path; `Ok(None)` means the entry should be skipped.
    pub fn classify(&self, path: &str) -> Result<Option<ClassifiedEntry>> {
        let path = path.strip_prefix("./").unwrap_or(path);

        if let Some(groups) = self.tag_manifest.captures(path) {
            return Ok(Some(ClassifiedEntry::TagManifest {
                repository: groups[1].to_string(),
                tag: groups[2].to_string(),
            }));
        }

        if let Some(groups) = self.digest_manifest.captures(path) {
            let digest = format!("{}:{}", &groups[2], &groups[3]);
            return match OciDigest::try_from(digest.as_str()) {
                Ok(digest) => Ok(Some(ClassifiedEntry::DigestManifest {
                    repository: groups[1].to_string(),
                    digest,
                })),
                Err(_) => Err(Error::InvalidManifestDigest {
                    path: path.to_string(),
                    digest,
                }),
            };
        }

        if let Some(groups) = self.blob.captures(path) {
            let digest = format!("{}:{}", &groups[1], &groups[2]);
            return match OciDigest::try_from(digest.as_str()) {
                Ok(digest) => Ok(Some(ClassifiedEntry::Blob { digest })),
                Err(_) => {
                    tracing::warn!("skipping blob entry with invalid digest: {path}");
                    Ok(None)
                }
            };
        }

        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    fn tag(repository: &str, tag: &str) -> Option<ClassifiedEntry> {
        Some(ClassifiedEntry::TagManifest {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    fn digest_manifest(repository: &str, digest: &str) -> Option<ClassifiedEntry> {
        Some(ClassifiedEntry::DigestManifest {
            repository: repository.to_string(),
            digest: digest.parse().unwrap(),
        })
    }

    fn blob(digest: &str) -> Option<ClassifiedEntry> {
        Some(ClassifiedEntry::Blob {
            digest: digest.parse().unwrap(),
        })
    }

    #[rstest]
    #[case::tag("repoA/manifests/latest", tag("repoA", "latest"))]
    #[case::nested_repository("library/alpine/manifests/3.19", tag("library/alpine", "3.19"))]
    #[case::dot_slash_prefix("./repoA/manifests/latest", tag("repoA", "latest"))]
    #[case::digest("repoA/manifests/sha256:abc123", digest_manifest("repoA", "sha256:abc123"))]
    #[case::nested_digest(
        "org/team/app/manifests/sha512:ffee",
        digest_manifest("org/team/app", "sha512:ffee")
    )]
    #[case::blob("blob/sha256:aaa", blob("sha256:aaa"))]
    #[case::blob_dot_slash("./blob/sha256:aaa", blob("sha256:aaa"))]
    #[case::blob_without_digest("blob/latest", None)]
    #[case::nested_blob("repoA/blob/sha256:aaa", None)]
    #[case::tag_with_slash("repoA/manifests/feature/x", None)]
    #[case::empty_blob_digest("blob/sha256:", None)]
    #[case::bad_blob_algorithm("blob/SHA256:abc", None)]
    #[case::bad_blob_encoding("blob/sha256:abc.1", None)]
    #[case::directory("repoA/manifests/", None)]
    #[case::no_repository("manifests/latest", None)]
    #[case::unrelated("index.json", None)]
    fn classifies_paths(#[case] path: &str, #[case] expected: Option<ClassifiedEntry>) {
        let classifier = PathClassifier::new();
        assert_eq!(classifier.classify(path).unwrap(), expected);
    }

    #[rstest]
    #[case::bad_algorithm("repoA/manifests/SHA256:abc", "SHA256:abc")]
    #[case::bad_encoding("repoA/manifests/sha256:abc.1", "sha256:abc.1")]
    #[case::dot_slash_prefix("./org/app/manifests/sha256:a+b", "sha256:a+b")]
    fn rejects_manifest_paths_with_invalid_digests(#[case] path: &str, #[case] expected: &str) {
        match PathClassifier::new().classify(path) {
            Err(Error::InvalidManifestDigest { digest, .. }) => assert_eq!(digest, expected),
            other => panic!("expected InvalidManifestDigest, got {other:?}"),
        }
    }
}
