#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use familiar::config::{resolve, ConfigOverrides, FamiliarConfig, RawConfig};
use familiar::dispatch::Dispatcher;
use familiar::generator::Generator;
use familiar::store::TaskStore;
use tempfile::TempDir;

/// A throwaway vault: a temp directory with `Jobs/`, `Processing/`, `Done/`
/// and `Failed/` already created.
pub struct VaultFixture {
    dir: TempDir,
    pub store: TaskStore,
    raw: RawConfig,
}

impl VaultFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = TaskStore::new(dir.path());
        store.ensure_dirs().expect("create task dirs");

        let raw = RawConfig {
            name: Some("Familiar".to_string()),
            vault_path: Some(dir.path().display().to_string()),
            vault_root: Some(dir.path().display().to_string()),
            timeout: Some(5),
            ..RawConfig::default()
        };

        Self { dir, store, raw }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.raw.name = Some(name.to_string());
        self
    }

    pub fn with_allowed_path(mut self, path: &str) -> Self {
        self.raw.allowed_paths.push(path.to_string());
        self
    }

    pub fn with_system_prompt(self, text: &str) -> Self {
        fs::write(self.store.system_prompt_path(), text).expect("write system prompt");
        self
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> FamiliarConfig {
        resolve(self.raw.clone(), &ConfigOverrides::default())
            .expect("fixture config should be valid")
    }

    /// Build a dispatcher over this vault with the given generator.
    pub fn dispatcher<G: Generator>(&self, generator: G) -> Dispatcher<G> {
        let system_prompt = self
            .store
            .load_system_prompt()
            .expect("read system prompt");
        Dispatcher::new(
            Arc::new(self.config()),
            self.store.clone(),
            generator,
            system_prompt,
        )
    }

    /// Write a task file into `Jobs/` and return its path.
    pub fn drop_job(&self, name: &str, content: &str) -> PathBuf {
        let path = self.store.inbox_dir().join(name);
        fs::write(&path, content).expect("write job");
        path
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).expect("read document")
    }

    pub fn inbox(&self) -> Vec<String> {
        names_in(&self.store.inbox_dir())
    }

    pub fn processing(&self) -> Vec<String> {
        names_in(&self.store.processing_dir())
    }

    pub fn done(&self) -> Vec<String> {
        names_in(&self.store.done_dir())
    }

    pub fn failed(&self) -> Vec<String> {
        names_in(&self.store.failed_dir())
    }
}

impl Default for VaultFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorted file names in `dir`; empty if it does not exist.
pub fn names_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
