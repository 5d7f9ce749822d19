//! Local persistence for prompt runs and saved setups
//!
//! A directory-backed keyed store: every record is one pretty-printed JSON
//! file, iterations under `iterations/{id}.json` and saved prompt setups
//! under `files/{name}.json`.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::composer::{PromptSettings, Variable};

const ITERATIONS_DIR: &str = "iterations";
const FILES_DIR: &str = "files";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid file name: '{0}'")]
    InvalidName(String),

    #[error("Iteration not found: {0}")]
    IterationNotFound(String),

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt record {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One completed prompt run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: String,
    pub prompt: String,
    pub user_example: String,
    pub model_example: String,
    /// Serialized request exactly as sent
    pub full_prompt: String,
    pub response: String,
    pub settings: PromptSettings,
    pub variables: Vec<Variable>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub bookmarked: bool,
}

/// Everything needed to restore a composer setup
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub prompt: String,
    pub user_example: String,
    pub model_example: String,
    pub variables: Vec<Variable>,
    pub settings: PromptSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualFile {
    pub name: String,
    pub content: FileContent,
}

impl VirtualFile {
    /// Human-readable dump used by the console `cat` command
    pub fn render(&self) -> String {
        let settings = serde_json::to_string_pretty(&self.content.settings).unwrap_or_default();
        let variables = serde_json::to_string_pretty(&self.content.variables).unwrap_or_default();
        format!(
            "---- BEGIN {name} ----\n[PROMPT]\n{}\n\n[USER EXAMPLE]\n{}\n\n[MODEL EXAMPLE]\n{}\n\n[SETTINGS]\n{}\n\n[VARIABLES]\n{}\n---- END {name} ----",
            self.content.prompt,
            self.content.user_example,
            self.content.model_example,
            settings,
            variables,
            name = self.name,
        )
    }
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { root: root.into() };
        for dir in [ITERATIONS_DIR, FILES_DIR] {
            let path = store.root.join(dir);
            fs::create_dir_all(&path).map_err(|source| StoreError::Io { path, source })?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn iteration_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_name(id)?;
        Ok(self.root.join(ITERATIONS_DIR).join(format!("{}.json", id)))
    }

    fn file_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(FILES_DIR).join(format!("{}.json", name)))
    }

    pub fn add_iteration(&self, iteration: &Iteration) -> Result<(), StoreError> {
        write_record(&self.iteration_path(&iteration.id)?, iteration)
    }

    /// Overwrite an existing iteration with the same id
    pub fn update_iteration(&self, iteration: &Iteration) -> Result<(), StoreError> {
        let path = self.iteration_path(&iteration.id)?;
        if !path.exists() {
            return Err(StoreError::IterationNotFound(iteration.id.clone()));
        }
        write_record(&path, iteration)
    }

    pub fn get_iteration(&self, id: &str) -> Result<Option<Iteration>, StoreError> {
        read_optional(&self.iteration_path(id)?)
    }

    /// Flip the bookmark flag, returning the updated record
    pub fn toggle_bookmark(&self, id: &str) -> Result<Iteration, StoreError> {
        let mut iteration = self
            .get_iteration(id)?
            .ok_or_else(|| StoreError::IterationNotFound(id.to_string()))?;
        iteration.bookmarked = !iteration.bookmarked;
        self.update_iteration(&iteration)?;
        Ok(iteration)
    }

    /// All iterations, oldest first
    pub fn all_iterations(&self) -> Result<Vec<Iteration>, StoreError> {
        let mut iterations: Vec<Iteration> = read_all(&self.root.join(ITERATIONS_DIR))?;
        iterations.sort_by_key(|iteration| iteration.timestamp);
        Ok(iterations)
    }

    /// Insert or replace a saved setup
    pub fn save_file(&self, file: &VirtualFile) -> Result<(), StoreError> {
        write_record(&self.file_path(&file.name)?, file)
    }

    pub fn get_file(&self, name: &str) -> Result<Option<VirtualFile>, StoreError> {
        read_optional(&self.file_path(name)?)
    }

    /// Saved setups sorted by name
    pub fn all_files(&self) -> Result<Vec<VirtualFile>, StoreError> {
        let mut files: Vec<VirtualFile> = read_all(&self.root.join(FILES_DIR))?;
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Remove a saved setup; returns whether it existed
    pub fn delete_file(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.file_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        Err(StoreError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    let serialized = serde_json::to_string_pretty(record).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, serialized).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if path.exists() {
        read_record(path).map(Some)
    } else {
        Ok(None)
    }
}

// Corrupt records are skipped with a warning so one bad file cannot hide the rest
fn read_all<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StoreError> {
    let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        match read_record(&path) {
            Ok(record) => records.push(record),
            Err(e) => bprintln!(warn: "Skipping {}", e),
        }
    }
    Ok(records)
}
