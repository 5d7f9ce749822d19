//! Saved plan files
//!
//! Plans can be kept as YAML (or model responses containing a fenced YAML
//! block) under `{data_dir}/plans`, or loaded from any explicit path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::workflow::parser::{parse_plan, PlanIssue};
use crate::workflow::types::WorkflowDefinition;

const EXTENSIONS: [&str; 2] = ["yaml", "yml"];

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Plan file not found: {name} (searched {})", searched_dirs(.searched))]
    NotFound { name: String, searched: Vec<PathBuf> },

    #[error("Failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a usable plan: {issue}", path.display())]
    Plan { path: PathBuf, issue: PlanIssue },
}

fn searched_dirs(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn plans_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("plans")
}

/// Resolve `name` as a literal path first, then as a plan in `plans_dir`
/// with or without its extension
pub fn find_plan_file(name: &str, plans_dir: &Path) -> Result<PathBuf, LoadError> {
    let literal = PathBuf::from(name);
    if literal.is_file() {
        return Ok(literal);
    }

    let has_extension = EXTENSIONS.iter().any(|ext| name.ends_with(&format!(".{}", ext)));
    let mut candidates = vec![plans_dir.join(name)];
    if !has_extension {
        candidates.extend(EXTENSIONS.iter().map(|ext| plans_dir.join(format!("{}.{}", name, ext))));
    }

    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
            searched: vec![plans_dir.to_path_buf()],
        })
}

/// Read and parse a plan file, returning its text alongside the definition
pub fn load_plan(name: &str, plans_dir: &Path) -> Result<(String, WorkflowDefinition), LoadError> {
    let path = find_plan_file(name, plans_dir)?;
    let text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
        path: path.clone(),
        source,
    })?;
    bprintln!(dev: "Loading plan from {}", path.display());

    match parse_plan(&text).into_result() {
        Ok(definition) => Ok((text, definition)),
        Err(issue) => Err(LoadError::Plan { path, issue }),
    }
}

/// Save plan text as `{plans_dir}/{name}.yaml`
pub fn save_plan(name: &str, text: &str, plans_dir: &Path) -> Result<PathBuf, LoadError> {
    fs::create_dir_all(plans_dir).map_err(|source| LoadError::Io {
        path: plans_dir.to_path_buf(),
        source,
    })?;
    let path = plans_dir.join(format!("{}.yaml", name.trim_end_matches(".yaml")));
    fs::write(&path, text).map_err(|source| LoadError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Names of saved plans, sorted and without extensions
pub fn list_plans(plans_dir: &Path) -> Result<Vec<String>, LoadError> {
    if !plans_dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(plans_dir).map_err(|source| LoadError::Io {
        path: plans_dir.to_path_buf(),
        source,
    })?;

    let mut names: Vec<String> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext))
        })
        .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}
