#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use social_insight::{
    cleaner::CleanTable,
    mapper::SchemaMapper,
    pipeline,
    raw::{LoadOptions, load_raw_table},
};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Loads and imports a fixture with default options.
pub fn import_fixture(name: &str) -> CleanTable {
    let path = fixture_path(name);
    let raw = load_raw_table(&path, &LoadOptions::for_path(&path, None)).expect("load fixture");
    pipeline::try_import(raw, &SchemaMapper::default()).expect("import fixture")
}

pub fn binary() -> Command {
    Command::cargo_bin("social-insight").expect("binary exists")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }
}
