use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use importer_core::SharedBlobPolicy;
use importer_http::HttpRegistryConfig;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    pub registry: Option<HttpRegistryConfig>,
    pub archive: Option<PathBuf>,
    #[serde(default)]
    pub shared_blobs: SharedBlobPolicy,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut file = File::open(path)
            .with_context(|| format!("opening config file {}", path.display()))?;
        let mut s = String::new();
        file.read_to_string(&mut s)?;
        serde_yaml::from_str(&s).with_context(|| format!("parsing config file {}", path.display()))
    }
}
