use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Reports are staged under this prefix in the export directory until renamed.
const STAGING_PREFIX: &str = ".report-";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("export path {0} exists but is not a directory")]
    NotADirectory(PathBuf),
    #[error("cannot create export directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot save report {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Creates the export directory (and its parents) when missing.
pub fn ensure_export_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        return Err(PersistError::NotADirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(dir).map_err(|source| PersistError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Saves finished reports into one export directory.
///
/// A report is written to a hidden staging file beside its final name and
/// renamed over it, so an existing report is replaced whole or not at all.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, filename: &str, document: &str) -> Result<PathBuf, PersistError> {
        ensure_export_dir(&self.dir)?;
        let target = self.dir.join(filename);
        let save_error = |source| PersistError::Save {
            path: target.clone(),
            source,
        };

        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(save_error)?;
        staged.write_all(document.as_bytes()).map_err(save_error)?;
        staged.as_file().sync_all().map_err(save_error)?;
        staged
            .persist(&target)
            .map_err(|err| save_error(err.error))?;
        Ok(target)
    }
}
