// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{file_store::FileStore, mode::BootMode};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

fn default_nv_index() -> u32 {
    recovery_hash_space::NV_INDEX
}

/// Struct defining the TOML format for `--cfg`, which bundles up flags that
/// would otherwise need to appear on the command line.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Boot mode to report to the hash logic; normal mode when absent.
    #[serde(default)]
    pub mode: BootMode,

    /// File holding the recovery hash space.  A relative path is taken
    /// relative to the directory containing the config file.
    pub store: PathBuf,

    /// NV index recorded in (and checked against) the store file.
    #[serde(default = "default_nv_index")]
    pub nv_index: u32,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Self::parse(&text, base)
    }

    pub fn parse(text: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut cfg: Config = toml::from_str(text)?;
        if cfg.store.is_relative() {
            cfg.store = base.join(&cfg.store);
        }
        Ok(cfg)
    }

    pub fn file_store(&self) -> FileStore {
        FileStore::new(&self.store).with_nv_index(self.nv_index)
    }
}
