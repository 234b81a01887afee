use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};

use ragpipe_core::types::Document;

/// Loads a directory tree of `.txt` files as [`Document`]s.
///
/// The id is the path relative to the root without extension (`tech/math/algebra`);
/// metadata carries `path` and `category` (the relative parent directory, `misc` at the root).
#[derive(Debug, Default)]
pub struct CorpusLoader {
    limit: Option<usize>,
}

impl CorpusLoader {
    pub fn new() -> Self { Self::default() }

    /// Only the first `limit` files (in sorted path order) are loaded.
    #[must_use]
    pub fn limited(limit: usize) -> Self { Self { limit: Some(limit) } }

    pub fn load_dir(&self, data_dir: &Path) -> Result<Vec<Document>> { self.load_dir_with(data_dir, |_, _| {}) }

    /// Like [`load_dir`](Self::load_dir), calling `on_file(done, total)` after
    /// every file. Unreadable files are skipped with a warning.
    pub fn load_dir_with<F>(&self, data_dir: &Path, mut on_file: F) -> Result<Vec<Document>>
    where
        F: FnMut(usize, usize),
    {
        if !data_dir.is_dir() {
            return Err(anyhow!("{} is not a directory", data_dir.display()));
        }
        let mut files = list_txt_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        if let Some(limit) = self.limit {
            if files.len() > limit { files.truncate(limit); tracing::info!(limit, "limited corpus"); }
        }
        let total = files.len();
        let mut documents = Vec::with_capacity(total);
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::debug!(file = %file_path.display(), n = file_index + 1, total, "loading");
            match load_file(file_path, data_dir) {
                Ok(doc) => documents.push(doc),
                Err(e) => tracing::warn!(path = %file_path.display(), error = %e, "skipping unreadable file"),
            }
            on_file(file_index + 1, total);
        }
        tracing::info!(documents = documents.len(), dir = %data_dir.display(), "loaded corpus");
        Ok(documents)
    }
}

pub fn load_file(file_path: &Path, data_dir: &Path) -> Result<Document> {
    let content = read_file_content(file_path)?;
    let id = doc_id(file_path, data_dir)?;
    Ok(Document::new(id, content)
        .with_meta("path", file_path.to_string_lossy().to_string())
        .with_meta("category", category(file_path, data_dir)))
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn doc_id(file_path: &Path, data_dir: &Path) -> Result<String> {
    let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path).with_extension("");
    let parts: Vec<String> = relative.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
    if parts.is_empty() { return Err(anyhow!("cannot derive a document id from {}", file_path.display())); }
    Ok(parts.join("/"))
}

fn category(file_path: &Path, data_dir: &Path) -> String {
    let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    let parent: Vec<String> = relative
        .parent()
        .map(|p| p.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect())
        .unwrap_or_default();
    if parent.is_empty() { "misc".to_string() } else { parent.join("/") }
}

pub fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("txt"))
        .map(|e| e.path().to_path_buf())
        .collect();
    txt_files.sort();
    txt_files
}
