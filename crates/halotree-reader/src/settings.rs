//! Runtime reader settings.
//!
//! Loading behaviour that used to be fixed at build time (eager preload,
//! identifier loading, the large-simulation identifier layout) is selected
//! here at runtime, usually from a TOML file:
//!
//! ```toml
//! simulation_dir = "/data/millennium"
//! field_format_file = "input/hdf5_field_format.txt"
//!
//! [load]
//! preload_trees = false
//! load_ids = true
//! large_simulation = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use halotree_error::{HaloTreeError, Result};
use serde::{Deserialize, Serialize};

use crate::field_map::FieldMapping;

/// Subdirectory of the simulation directory holding the tree files.
pub const TREE_SUBDIR: &str = "treedata";
/// Extension of merger-tree files.
pub const TREE_FILE_EXTENSION: &str = "hdf5";

/// Flags consulted while opening one tree file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadOptions {
    /// Read the whole halo (and identifier) array when the file is opened
    /// instead of once per tree.
    pub preload_trees: bool,
    /// Also read the simulation-wide identifier records.
    pub load_ids: bool,
    /// Include the main-leaf identifier member.
    pub large_simulation: bool,
}

/// Where the input lives and how to load it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaderConfig {
    pub simulation_dir: PathBuf,
    pub field_format_file: PathBuf,
    #[serde(default)]
    pub load: LoadOptions,
}

impl ReaderConfig {
    #[must_use]
    pub fn new(simulation_dir: impl Into<PathBuf>, field_format_file: impl Into<PathBuf>) -> Self {
        Self {
            simulation_dir: simulation_dir.into(),
            field_format_file: field_format_file.into(),
            load: LoadOptions::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| HaloTreeError::Settings {
            detail: err.to_string(),
        })
    }

    /// Read settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| HaloTreeError::Settings {
            detail: format!("cannot read {}: {err}", path.display()),
        })?;
        Self::from_toml_str(&text)
    }

    /// Path of tree file `filenr`: `<simulation_dir>/treedata/trees_<N>.hdf5`.
    #[must_use]
    pub fn tree_file_path(&self, filenr: u32) -> PathBuf {
        self.simulation_dir
            .join(TREE_SUBDIR)
            .join(format!("trees_{filenr}.{TREE_FILE_EXTENSION}"))
    }

    /// Load the field-format file these settings point at.
    pub fn load_field_mapping(&self) -> Result<FieldMapping> {
        FieldMapping::load(&self.field_format_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_file_naming() {
        let config = ReaderConfig::new("/data/mr", "fields.txt");
        assert_eq!(
            config.tree_file_path(7),
            PathBuf::from("/data/mr/treedata/trees_7.hdf5")
        );
        assert_eq!(
            config.tree_file_path(511),
            PathBuf::from("/data/mr/treedata/trees_511.hdf5")
        );
    }

    #[test]
    fn test_toml_with_defaults() {
        let config = ReaderConfig::from_toml_str(
            "simulation_dir = \"/sim\"\nfield_format_file = \"fmt.txt\"\n",
        )
        .unwrap();
        assert_eq!(config.load, LoadOptions::default());
        assert_eq!(config.field_format_file, PathBuf::from("fmt.txt"));
    }

    #[test]
    fn test_toml_load_table() {
        let config = ReaderConfig::from_toml_str(
            "simulation_dir = \"/sim\"\nfield_format_file = \"fmt.txt\"\n\n[load]\npreload_trees = true\nlarge_simulation = true\n",
        )
        .unwrap();
        assert!(config.load.preload_trees);
        assert!(!config.load.load_ids);
        assert!(config.load.large_simulation);
    }

    #[test]
    fn test_toml_rejects_unknown_keys() {
        let err = ReaderConfig::from_toml_str(
            "simulation_dir = \"/sim\"\nfield_format_file = \"f\"\n[load]\npreload = true\n",
        )
        .unwrap_err();
        assert!(matches!(err, HaloTreeError::Settings { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reader.toml");
        fs::write(
            &path,
            "simulation_dir = \"/sim\"\nfield_format_file = \"f\"\n[load]\nload_ids = true\n",
        )
        .unwrap();
        let config = ReaderConfig::load(&path).unwrap();
        assert!(config.load.load_ids);

        let missing = ReaderConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, HaloTreeError::Settings { .. }));
    }
}
