//! Replays a registry export archive into an OCI distribution registry.
//!
//! An import is three strictly ordered passes over the same tar archive:
//!
//! 1. parse: every manifest entry is decoded and a [`BlobIndex`] recording which manifests
//!    reference which blobs is built,
//! 2. upload blobs: the archive is read again and each referenced blob is streamed to the
//!    repository of its first owning manifest,
//! 3. upload manifests: manifests are submitted in archive order, indexes last.
//!
//! See [`Importer`] for the entry point and [`Registry`] for the remote side.
pub mod errors;
pub use errors::{Error, ItemFailure, ManifestError, Result};

mod oci_digest;
pub use oci_digest::OciDigest;

pub mod registry;
pub use registry::{ManifestRef, ManifestSpec, Registry};

mod classify;
pub use classify::{ClassifiedEntry, PathClassifier};

mod manifest;
pub use manifest::{ManifestId, ManifestRecord, SchemaVariant, Submission};

mod blobs;
pub use blobs::{BlobIndex, BlobRecord, UploadState};

mod scanner;
pub use scanner::{parse_archive, ArchiveSource, ParsedArchive};

mod report;
pub use report::{ImportReport, Item, ItemOutcome, Outcome, Summary};

mod import;
pub use import::{Importer, SharedBlobPolicy};

#[cfg(test)]
mod testutil;
