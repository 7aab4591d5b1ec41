//! Mapper program source.
//!
//! The mapper is a JavaScript program, built separately, that implements
//! BiDi on top of CDP inside a hidden tab. It can be provided in three
//! formats:
//!
//! | Format | Description |
//! |--------|-------------|
//! | Inline | Script text held in memory (e.g. `include_str!`) |
//! | File | Path to a `.js` file read at bootstrap |
//! | Base64 | Base64-encoded script text |
//!
//! # Example
//!
//! ```
//! use webdriver_bidi::transport::MapperSource;
//!
//! let inline = MapperSource::inline("window.runMapperInstance = async () => {};");
//! let file = MapperSource::file("./mapperTab.js");
//! let base64 = MapperSource::base64("d2luZG93Lng9MQ==");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use tokio::fs;

use crate::error::{Error, Result};

// ============================================================================
// MapperSource
// ============================================================================

/// Where the mapper script comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapperSource {
    /// Script text.
    Inline(String),

    /// Path to a script file.
    File(PathBuf),

    /// Base64-encoded script text.
    Base64(String),
}

// ============================================================================
// MapperSource - Constructors
// ============================================================================

impl MapperSource {
    /// Creates an inline mapper source.
    #[inline]
    #[must_use]
    pub fn inline(script: impl Into<String>) -> Self {
        Self::Inline(script.into())
    }

    /// Creates a file mapper source.
    #[inline]
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Creates a base64 mapper source.
    #[inline]
    #[must_use]
    pub fn base64(data: impl Into<String>) -> Self {
        Self::Base64(data.into())
    }
}

// ============================================================================
// MapperSource - Loading
// ============================================================================

impl MapperSource {
    /// Returns the path if this is a file-based source.
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::File(path) => Some(path),
            Self::Inline(_) | Self::Base64(_) => None,
        }
    }

    /// Loads the script text.
    ///
    /// Whitespace-only content counts as missing.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the file cannot be read
    /// - [`Error::Config`] if base64 or UTF-8 decoding fails, or the script is empty
    pub async fn load(&self) -> Result<String> {
        let script = match self {
            Self::Inline(script) => script.clone(),
            Self::File(path) => fs::read_to_string(path).await?,
            Self::Base64(data) => {
                let bytes = Base64Standard
                    .decode(data.trim())
                    .map_err(|e| Error::config(format!("Invalid base64 mapper: {e}")))?;
                String::from_utf8(bytes)
                    .map_err(|e| Error::config(format!("Mapper is not UTF-8: {e}")))?
            }
        };

        if script.trim().is_empty() {
            return Err(Error::config("Mapper script is empty"));
        }

        Ok(script)
    }
}

// ============================================================================
// Tests
// ============================================================================
