use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ParseError;

/// Which files a walk yields.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// File suffix without the leading dot. Empty accepts every file.
    pub extension: String,
    pub recursive: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            extension: "log".to_string(),
            recursive: true,
        }
    }
}

impl WalkOptions {
    fn accepts(&self, path: &Path) -> bool {
        self.extension.is_empty()
            || path.extension().and_then(OsStr::to_str) == Some(self.extension.as_str())
    }
}

/// Enumerate the regular files under `root` that carry the expected
/// extension, in file-name order. A root that is itself a file is returned
/// as is, whatever its extension.
///
/// Any error met while walking fails the whole walk; files found before the
/// error are dropped.
pub fn enumerate(root: &Path, options: &WalkOptions) -> Result<Vec<PathBuf>, ParseError> {
    let metadata = std::fs::metadata(root).map_err(|e| ParseError::unreadable(root, e))?;
    if metadata.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut walk = WalkDir::new(root).follow_links(true).sort_by_file_name();
    if !options.recursive {
        walk = walk.max_depth(1);
    }

    let mut paths = Vec::new();
    for entry in walk {
        let entry = entry.map_err(|e| ParseError::TraversalFailure {
            root: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if entry.file_type().is_file() && options.accepts(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    tracing::debug!(root = %root.display(), files = paths.len(), "enumerated log files");
    Ok(paths)
}
