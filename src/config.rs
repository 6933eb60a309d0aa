//! Document configuration: discovery, defaults, and paged-media options.
//!
//! Configuration is a thin external collaborator of the pipeline: a JSON
//! file next to the input document (`md2pdf.config.json` or
//! `.md2pdf.json`) merged over built-in defaults. An unreadable or
//! unparseable config file is a warning, not a failure — the document
//! still converts with defaults. Only a config file named explicitly on
//! the command line is allowed to fail loudly.

use crate::error::MdpressError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Paged-media options handed to the Chromium `printToPDF` call.
///
/// Field names mirror the CDP option names so a theme's `theme.json`
/// can override them directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PdfOptions {
    pub display_header_footer: bool,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
    pub scale: f64,
    /// Per-render timeout; a hung Chromium fails the document instead of
    /// blocking the process forever.
    pub render_timeout_secs: u64,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            display_header_footer: true,
            print_background: true,
            prefer_css_page_size: true,
            scale: 1.0,
            render_timeout_secs: 120,
        }
    }
}

/// Location of the per-author record store and the stub template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorStoreConfig {
    /// Directory of `<sanitized-email>.yaml` records, relative to the
    /// project directory unless absolute. Pictures live in a `pictures/`
    /// subdirectory beside the records.
    pub directory: PathBuf,
    /// Stub template with `{{email}}` / `{{authorId}}` placeholders.
    /// None uses the embedded default template.
    pub template: Option<PathBuf>,
}

impl Default for AuthorStoreConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("data/authors"),
            template: None,
        }
    }
}

/// Per-project configuration merged over defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentConfig {
    /// Theme name resolved through [`crate::theme::resolve_theme`].
    pub theme: String,
    /// Force a title page even without a `<!-- [[titlepage]] -->` marker.
    pub title_page: bool,
    pub authors: AuthorStoreConfig,
    pub pdf_options: PdfOptions,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            title_page: false,
            authors: AuthorStoreConfig::default(),
            pdf_options: PdfOptions::default(),
        }
    }
}

impl DocumentConfig {
    /// Author record directory resolved against the project directory.
    pub fn authors_dir(&self, project_dir: &Path) -> PathBuf {
        if self.authors.directory.is_absolute() {
            self.authors.directory.clone()
        } else {
            project_dir.join(&self.authors.directory)
        }
    }
}

/// Candidate config file names probed next to the input document.
const CONFIG_CANDIDATES: &[&str] = &["md2pdf.config.json", ".md2pdf.json"];

/// Load the document configuration.
///
/// An explicitly named file that is missing or malformed is fatal; a
/// discovered file that fails to parse degrades to defaults with a warning.
pub fn load_config(
    project_dir: &Path,
    explicit: Option<&Path>,
) -> Result<DocumentConfig, MdpressError> {
    if let Some(path) = explicit {
        let text = std::fs::read_to_string(path).map_err(|e| {
            MdpressError::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;
        return serde_json::from_str(&text).map_err(|e| {
            MdpressError::InvalidConfig(format!("cannot parse '{}': {e}", path.display()))
        });
    }

    for name in CONFIG_CANDIDATES {
        let candidate = project_dir.join(name);
        if !candidate.exists() {
            continue;
        }
        match std::fs::read_to_string(&candidate)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str(&text).map_err(|e| e.to_string()))
        {
            Ok(config) => {
                debug!("Loaded config from {}", candidate.display());
                return Ok(config);
            }
            Err(e) => {
                warn!("Failed to load config from {}: {e}", candidate.display());
            }
        }
    }

    Ok(DocumentConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_paged_media_contract() {
        let opts = PdfOptions::default();
        assert!(opts.display_header_footer);
        assert!(opts.print_background);
        assert!(opts.prefer_css_page_size);
        assert_eq!(opts.scale, 1.0);
    }

    #[test]
    fn discovered_config_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("md2pdf.config.json"),
            r#"{ "theme": "academic", "titlePage": true, "pdfOptions": { "scale": 0.9 } }"#,
        )
        .unwrap();

        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.theme, "academic");
        assert!(config.title_page);
        assert_eq!(config.pdf_options.scale, 0.9);
        // untouched fields keep their defaults
        assert!(config.pdf_options.print_background);
    }

    #[test]
    fn malformed_discovered_config_degrades_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".md2pdf.json"), "{ not json").unwrap();

        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.theme, "default");
    }

    #[test]
    fn explicit_malformed_config_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_config(dir.path(), Some(&path)).unwrap_err();
        assert!(matches!(err, MdpressError::InvalidConfig(_)));
    }

    #[test]
    fn authors_dir_resolves_relative_to_project() {
        let config = DocumentConfig::default();
        let dir = config.authors_dir(Path::new("/proj"));
        assert_eq!(dir, PathBuf::from("/proj/data/authors"));
    }
}
