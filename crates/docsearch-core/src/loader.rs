//! Plain-text directory loader used for bulk ingestion.
//!
//! Each `*.txt` file becomes one [`DocumentDraft`]: the file stem is the
//! title, the directories between the root and the file become tags.
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::{DocumentDraft, DocumentMetadata, DocumentSource};

#[derive(Debug, Default)]
pub struct DirectoryLoader {
    limit: Option<usize>,
}

impl DirectoryLoader {
    pub fn new() -> Self { Self::default() }

    pub fn with_limit(limit: usize) -> Self { Self { limit: Some(limit) } }

    pub fn load(&self, data_dir: &Path) -> Result<Vec<DocumentDraft>> {
        let mut files = self.list_txt_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        if let Some(limit) = self.limit {
            if files.len() > limit {
                files.truncate(limit);
                tracing::info!(limit, "limited to first files");
            }
        }
        let mut drafts = Vec::with_capacity(files.len());
        for file_path in &files {
            let body = self.read_file_content(file_path)?;
            let body = body.trim();
            if body.is_empty() {
                tracing::debug!(path = %file_path.display(), "skipping empty file");
                continue;
            }
            let mut metadata = DocumentMetadata::new(DocumentSource::File);
            metadata.origin = Some(file_path.to_string_lossy().to_string());
            drafts.push(DocumentDraft {
                title: self.extract_title(file_path),
                body: body.to_string(),
                tags: self.tags_from_path(file_path, data_dir),
                metadata,
            });
        }
        tracing::info!(files = files.len(), documents = drafts.len(), "loaded directory");
        Ok(drafts)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn extract_title(&self, file_path: &Path) -> String {
        file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
    }

    fn tags_from_path(&self, file_path: &Path, data_dir: &Path) -> Vec<String> {
        let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        relative_path
            .parent()
            .map(|parent| parent.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect())
            .unwrap_or_default()
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort();
        txt_files
    }
}
