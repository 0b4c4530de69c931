use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{ErrorContext, SigilError, SigilResult};
use crate::model::{Entry, SigilMetadata};

/// The scan output: every finalized entry in page order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    entries: Vec<Entry>,
}

impl Dataset {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn load(path: &Path) -> SigilResult<Self> {
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SigilError::DatasetNotFound { path: path.to_path_buf() });
            }
            Err(e) => return Err(SigilError::file_io(path.display().to_string(), e)),
        };

        let entries: Vec<Entry> = serde_json::from_slice(&content).map_err(|source| SigilError::DatasetMalformed {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), entries = entries.len(), "Dataset loaded");
        Ok(Self { entries })
    }

    /// Write pretty JSON next to `path` first and rename it into place, so
    /// an existing file is only replaced by a complete one
    pub fn save(&self, path: &Path) -> SigilResult<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).with_path(&parent)?;

        let mut scratch = tempfile::NamedTempFile::new_in(&parent).with_path(&parent)?;
        {
            let mut writer = BufWriter::new(scratch.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, &self.entries).map_err(|e| {
                SigilError::file_io(path.display().to_string(), std::io::Error::new(std::io::ErrorKind::Other, e))
            })?;
            writer.flush().with_path(path)?;
        }
        scratch
            .persist(path)
            .map_err(|e| SigilError::file_io(path.display().to_string(), e.error))?;

        info!(path = %path.display(), entries = self.entries.len(), "Dataset saved");
        Ok(())
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sigil_count(&self) -> usize {
        self.entries.iter().map(|e| e.sigils.len()).sum()
    }

    /// (entry, sigil) pairs in scan order
    pub fn sigils(&self) -> impl Iterator<Item = (&Entry, &SigilMetadata)> {
        self.entries
            .iter()
            .flat_map(|entry| entry.sigils.iter().map(move |sigil| (entry, sigil)))
    }

    /// Case-insensitive substring match over heading, class, description,
    /// references and sigil source text. An empty term matches everything.
    pub fn query(&self, term: &str) -> Vec<&Entry> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.entries.iter().collect();
        }
        self.entries.iter().filter(|e| entry_matches(e, &needle)).collect()
    }
}

fn entry_matches(entry: &Entry, needle: &str) -> bool {
    let hit = |s: &str| s.to_lowercase().contains(needle);
    hit(&entry.heading)
        || hit(&entry.classification)
        || hit(&entry.description)
        || entry.references.iter().any(|r| hit(r))
        || entry.sigils.iter().any(|s| hit(&s.source_text))
}
