use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Script every request is routed through, relative to a framework checkout.
pub const DEFAULT_BOOTSTRAP_SCRIPT: &str = "tests/behat/serve-bootstrap.php";

/// Default parent directories searched for the bootstrap script, in order:
/// framework installed as a dependency, legacy root module, framework root.
pub const DEFAULT_BOOTSTRAP_PARENTS: [&str; 3] = ["vendor/silverstripe/framework/", "framework/", ""];

/// Finds the bootstrap script under a project base path.
///
/// Each parent is concatenated with the script path and checked in order;
/// the first existing file wins. The returned path is relative to the base
/// path, so the root fallback yields the bare script path.
///
/// ```
/// use ss_serve::config::BootstrapLocator;
///
/// let locator = BootstrapLocator::default().with_parent("modules/framework/");
/// assert_eq!(locator.parents().len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapLocator {
    parents: Vec<String>,
    script: String,
}

impl Default for BootstrapLocator {
    fn default() -> Self {
        Self::new(
            DEFAULT_BOOTSTRAP_PARENTS.iter().map(|p| p.to_string()),
            DEFAULT_BOOTSTRAP_SCRIPT,
        )
    }
}

impl BootstrapLocator {
    /// Create a locator with an explicit search order
    pub fn new<I, S>(parents: I, script: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parents: parents.into_iter().map(Into::into).collect(),
            script: script.into(),
        }
    }

    /// Append a parent directory to the end of the search order
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parents.push(parent.into());
        self
    }

    /// Parent directories in search order
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Candidate paths in search order, relative to the base path
    pub fn candidates(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.parents
            .iter()
            .map(move |parent| PathBuf::from(format!("{}{}", parent, self.script)))
    }

    /// Returns the first candidate that exists under `base_path`.
    ///
    /// # Errors
    ///
    /// [`Error::BootstrapNotFound`] when no candidate exists.
    pub fn locate(&self, base_path: &Path) -> Result<PathBuf> {
        for candidate in self.candidates() {
            if base_path.join(&candidate).is_file() {
                tracing::debug!(path = %candidate.display(), "Found bootstrap file");
                return Ok(candidate);
            }
            tracing::trace!(path = %candidate.display(), "Bootstrap candidate missing");
        }

        Err(Error::BootstrapNotFound(format!(
            "{} could not be found under {}",
            self.script,
            base_path.display()
        )))
    }

    /// Uses `explicit` when given (it must exist), otherwise searches.
    pub fn resolve(&self, base_path: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(path) if base_path.join(path).is_file() => Ok(path.to_path_buf()),
            Some(path) => Err(Error::BootstrapNotFound(format!(
                "{} does not exist under {}",
                path.display(),
                base_path.display()
            ))),
            None => self.locate(base_path),
        }
    }
}
