//! Maps canonicalized paths to cached token lists.
//!
//! The first access to a path tokenizes and preprocesses the file; later
//! accesses reuse the cached result. The cache lives for one compiler
//! invocation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::diagnostics::FatalError;
use crate::preprocess::{canonicalize_existing, preprocess};
use crate::syntax::Token;

/// Splits a platform path list (`:` on Unix-like systems, `;` on Windows)
/// from the named environment variable.
pub(crate) fn read_path_list_from_env(name: &str) -> Vec<PathBuf> {
    let Some(value) = std::env::var_os(name) else {
        return Vec::new();
    };
    std::env::split_paths(&value)
        .filter(|p| !p.as_os_str().is_empty())
        .collect()
}

pub struct SourceManager {
    cache: FxHashMap<PathBuf, Arc<Vec<Token>>>,
    include_directories: Vec<PathBuf>,
}

impl SourceManager {
    /// Include directories seeded from `LUMINA_INCLUDE_PATH`.
    pub fn from_env() -> SourceManager {
        SourceManager {
            cache: FxHashMap::default(),
            include_directories: read_path_list_from_env("LUMINA_INCLUDE_PATH"),
        }
    }

    pub fn with_include_directories(dirs: Vec<PathBuf>) -> SourceManager {
        SourceManager {
            cache: FxHashMap::default(),
            include_directories: dirs.into_iter().filter(|d| !d.as_os_str().is_empty()).collect(),
        }
    }

    pub fn add_include_directory(&mut self, dir: PathBuf) {
        if !dir.as_os_str().is_empty() {
            self.include_directories.push(dir);
        }
    }

    pub fn include_directories(&self) -> &[PathBuf] {
        &self.include_directories
    }

    /// Tokenizes + preprocesses `path`, or returns the cached result.
    pub fn load_file(&mut self, path: &Path) -> Result<Arc<Vec<Token>>, FatalError> {
        let normalized = canonicalize_existing(path);

        if let Some(cached) = self.cache.get(&normalized) {
            return Ok(cached.clone());
        }

        tracing::debug!(path = %normalized.display(), "tokenizing translation unit");
        let raw = crate::lexer::tokenize(&normalized)?;
        let tokens = Arc::new(preprocess(raw, &self.include_directories)?);
        self.cache.insert(normalized, tokens.clone());
        Ok(tokens)
    }
}
