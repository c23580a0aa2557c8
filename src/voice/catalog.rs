//! Voice catalogs
//!
//! Synthesis engines often publish their voices late, so callers re-query
//! the catalog for every utterance and must cope with an empty list.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Deserialize;

use super::VoiceDescriptor;
use crate::{Error, Result};

/// Source of the voices currently available for synthesis
pub trait VoiceCatalog {
    /// Snapshot of the available voices; may be empty
    fn voices(&self) -> Vec<VoiceDescriptor>;
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    voices: Vec<VoiceDescriptor>,
}

/// Fixed list of voices, typically read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticCatalog {
    voices: Vec<VoiceDescriptor>,
}

impl StaticCatalog {
    /// Wrap a list of voices
    #[must_use]
    pub const fn new(voices: Vec<VoiceDescriptor>) -> Self {
        Self { voices }
    }

    /// Parse a catalog from TOML text
    ///
    /// ```toml
    /// [[voices]]
    /// name = "Microsoft Pablo - Spanish (Spain)"
    /// lang = "es-ES"
    /// local = true
    /// ```
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid catalog
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Ok(Self::new(file.voices))
    }

    /// Load a catalog file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Catalog(format!("failed to read {}: {e}", path.display()))
        })?;
        let catalog = Self::from_toml(&content)?;

        tracing::info!(
            path = %path.display(),
            voices = catalog.voices.len(),
            "loaded voice catalog"
        );

        Ok(catalog)
    }

    /// Number of voices
    #[must_use]
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

impl VoiceCatalog for StaticCatalog {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }
}

/// Catalog whose content can be replaced while readers hold it
///
/// Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct SharedCatalog {
    inner: Arc<RwLock<Vec<VoiceDescriptor>>>,
}

impl SharedCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published voices
    ///
    /// A writer that panicked mid-update leaves the lock poisoned; the list
    /// is replaced wholesale, so the update still lands.
    pub fn replace(&self, voices: Vec<VoiceDescriptor>) {
        let mut current = self.write_lock();
        tracing::debug!(voices = voices.len(), "voice catalog updated");
        *current = voices;
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, Vec<VoiceDescriptor>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("voice catalog lock poisoned, recovering");
            self.inner.clear_poison();
            poisoned.into_inner()
        })
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Vec<VoiceDescriptor>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VoiceCatalog for SharedCatalog {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.read_lock().clone()
    }
}
