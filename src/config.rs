//! Pipeline configuration.
//!
//! Everything the extraction pipeline treats as policy lives here: the
//! language table, which suffixes count as archives, and the knobs bounding
//! how much work one submission may cause. The defaults reproduce the tables
//! the upload form has always shipped with.

use crate::classify::has_extension;
use crate::codec::ArchiveFormat;
use crate::error::{Result, StitchError};
use crate::language::{LanguageId, LanguageTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV_VAR: &str = "BATCHSTITCH_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Supported languages, in tie-break order.
    pub languages: LanguageTable,
    /// Suffixes (without the leading dot) recognized as archives. Multi-part
    /// suffixes such as `tar.gz` are matched as a whole.
    pub archive_extensions: Vec<String>,
    /// Suffixes the upload set accepts.
    pub upload_extensions: Vec<String>,
    /// Language used when detection finds nothing. `None` means first-declared.
    pub default_language: Option<LanguageId>,
    /// Smallest batch a job can be created for.
    pub min_students: usize,
    /// How many archive layers are unpacked below an uploaded file.
    pub max_nesting_depth: usize,
    /// Archives unpacked to widen the language detection sample.
    pub detection_archive_sample: usize,
    /// Concurrent reads while stitching one archive. `1` reads sequentially.
    pub read_concurrency: usize,
    /// Skip dot-files and `__MACOSX` folders when stitching.
    pub skip_hidden: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let archive_extensions: Vec<String> =
            ["tar", "tar.gz", "tar.xz", "zip", "rar"].iter().map(|s| s.to_string()).collect();
        Self {
            languages: LanguageTable::default(),
            upload_extensions: archive_extensions.clone(),
            archive_extensions,
            default_language: None,
            min_students: 2,
            max_nesting_depth: 4,
            detection_archive_sample: 3,
            read_concurrency: num_cpus::get().clamp(1, 8),
            skip_hidden: true,
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration.
    ///
    /// Priority:
    /// 1. An explicit `path`.
    /// 2. The file named by `BATCHSTITCH_CONFIG`.
    /// 3. Built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let chosen: Option<PathBuf> = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
        };
        let config = match chosen {
            Some(p) => {
                debug!(path = %p.display(), "loading pipeline configuration");
                Self::from_file(&p)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| StitchError::io(e, path))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(StitchError::Config("language table is empty".into()));
        }
        if self.archive_extensions.is_empty() {
            return Err(StitchError::Config("no archive extensions configured".into()));
        }
        if let Some(id) = &self.default_language {
            if !self.languages.contains(id) {
                return Err(StitchError::Config(format!(
                    "default language '{}' is not in the language table",
                    id
                )));
            }
        }
        if self.read_concurrency == 0 {
            return Err(StitchError::Config("read_concurrency must be at least 1".into()));
        }
        Ok(())
    }

    /// The configured default language, else the first-declared one.
    pub fn default_language(&self) -> Result<LanguageId> {
        self.default_language
            .clone()
            .or_else(|| self.languages.first().cloned())
            .ok_or_else(|| StitchError::Config("language table is empty".into()))
    }

    /// Resolves a user-supplied code against the table.
    pub fn language(&self, code: &str) -> Result<LanguageId> {
        let id = LanguageId::new(code);
        if self.languages.contains(&id) {
            Ok(id)
        } else {
            Err(StitchError::UnknownLanguage(code.to_string()))
        }
    }

    /// Suffix match against `archive_extensions`, plus tarballs renamed by
    /// course-site downloads (`sub.tar+1.gz`) whose format is configured.
    pub fn is_archive(&self, name: &str) -> bool {
        if has_extension(name, &self.archive_extensions) {
            return true;
        }
        ArchiveFormat::from_name(name)
            .map_or(false, |format| self.archive_extensions.iter().any(|e| e == format.name()))
    }

    /// Source check for one language, or for all of them when `language` is `None`.
    pub fn is_source(&self, name: &str, language: Option<&LanguageId>) -> bool {
        match language {
            Some(id) => has_extension(name, self.languages.extensions(id)),
            None => self.languages.matches_any(name),
        }
    }
}
