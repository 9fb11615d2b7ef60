use std::fmt;

use crate::errors::ItemFailure;
use crate::oci_digest::OciDigest;

/// The unit a per-item outcome is recorded against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    /// A blob, and the repository it was placed into. Orphans have no repository.
    Blob {
        digest: OciDigest,
        repository: Option<String>,
    },
    /// A manifest, by its qualified `repository:tag` or `repository@digest` name.
    Manifest { name: String },
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Blob {
                digest,
                repository: Some(repository),
            } => write!(f, "blob {digest} ({repository})"),
            Item::Blob {
                digest,
                repository: None,
            } => write!(f, "blob {digest}"),
            Item::Manifest { name } => write!(f, "manifest {name}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Uploaded,
    AlreadyPresent,
    Mounted,
    Submitted,
    /// Deliberately not sent, eg a schema 1 manifest.
    Skipped(&'static str),
    /// Blob entry with no owning manifest.
    Orphan,
    Failed(ItemFailure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemOutcome {
    pub item: Item,
    pub outcome: Outcome,
}

/// Everything that happened to individual blobs and manifests during one import run.
#[derive(Clone, Debug, Default)]
pub struct ImportReport {
    items: Vec<ItemOutcome>,
}

impl ImportReport {
    pub fn record(&mut self, item: Item, outcome: Outcome) {
        self.items.push(ItemOutcome { item, outcome });
    }

    pub fn items(&self) -> &[ItemOutcome] {
        &self.items
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Item, &ItemFailure)> {
        self.items.iter().filter_map(|i| match &i.outcome {
            Outcome::Failed(f) => Some((&i.item, f)),
            _ => None,
        })
    }

    pub fn outcome_of(&self, item: &Item) -> Option<&Outcome> {
        self.items
            .iter()
            .find(|i| &i.item == item)
            .map(|i| &i.outcome)
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for i in &self.items {
            match i.outcome {
                Outcome::Uploaded => s.uploaded += 1,
                Outcome::AlreadyPresent => s.already_present += 1,
                Outcome::Mounted => s.mounted += 1,
                Outcome::Submitted => s.submitted += 1,
                Outcome::Skipped(_) => s.skipped += 1,
                Outcome::Orphan => s.orphans += 1,
                Outcome::Failed(_) => s.failed += 1,
            }
        }
        s
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub uploaded: usize,
    pub already_present: usize,
    pub mounted: usize,
    pub submitted: usize,
    pub skipped: usize,
    pub orphans: usize,
    pub failed: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} blobs uploaded, {} already present, {} mounted, {} manifests submitted, \
             {} skipped, {} orphan blobs, {} failed",
            self.uploaded,
            self.already_present,
            self.mounted,
            self.submitted,
            self.skipped,
            self.orphans,
            self.failed
        )
    }
}
