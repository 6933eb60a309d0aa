//! Theme resolution and header/footer template substitution.
//!
//! A theme bundles the header/footer HTML fragments, the main-content and
//! title-page stylesheets, and paged-media option overrides. Resolution
//! walks a fallback chain — a theme directory next to the project, then
//! the assets embedded in the binary — so conversion always has a usable
//! theme. A theme named explicitly on the command line must exist; a theme
//! named only in the config degrades to the embedded default with a
//! warning.

use crate::config::PdfOptions;
use crate::error::MdpressError;
use crate::pipeline::metadata::PageMetadata;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// Built-in default theme, compiled into the binary so the fallback chain
// always terminates.
const DEFAULT_HEADER: &str = include_str!("../assets/themes/default/header.html");
const DEFAULT_FOOTER: &str = include_str!("../assets/themes/default/footer.html");
const DEFAULT_MAIN_CSS: &str = include_str!("../assets/themes/default/main-content.css");
const DEFAULT_TITLE_CSS: &str = include_str!("../assets/themes/default/title-page.css");

/// Stylesheet source for the rendered page.
#[derive(Debug, Clone)]
pub enum Stylesheet {
    /// On-disk file, emitted as a `<link>` and absolutized by the
    /// post-processor.
    Linked(PathBuf),
    /// CSS text embedded directly in a `<style>` block.
    Inline(String),
}

/// A resolved theme, ready for rendering.
#[derive(Debug, Clone)]
pub struct Theme {
    pub name: String,
    pub header_template: String,
    pub footer_template: String,
    pub main_stylesheet: Stylesheet,
    pub title_stylesheet: Stylesheet,
    pub pdf_options: PdfOptions,
}

/// Optional per-theme overrides read from `theme.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ThemeManifest {
    pdf_options: Option<PdfOptions>,
}

/// Resolve a theme by name.
///
/// `explicit` marks a theme requested on the command line: if it cannot
/// be found the call fails instead of silently substituting the default.
pub fn resolve_theme(
    name: &str,
    project_dir: &Path,
    defaults: &PdfOptions,
    explicit: bool,
) -> Result<Theme, MdpressError> {
    let local = project_dir.join("themes").join(name);
    if local.is_dir() {
        return Ok(load_theme_dir(&local, name, defaults));
    }

    if name != "default" {
        if explicit {
            return Err(MdpressError::ThemeNotFound {
                name: name.to_string(),
            });
        }
        warn!("Theme '{name}' not found, falling back to the built-in default");
    }

    Ok(embedded_default(defaults))
}

fn embedded_default(defaults: &PdfOptions) -> Theme {
    Theme {
        name: "default".to_string(),
        header_template: DEFAULT_HEADER.to_string(),
        footer_template: DEFAULT_FOOTER.to_string(),
        main_stylesheet: Stylesheet::Inline(DEFAULT_MAIN_CSS.to_string()),
        title_stylesheet: Stylesheet::Inline(DEFAULT_TITLE_CSS.to_string()),
        pdf_options: defaults.clone(),
    }
}

/// Load a theme from a directory, filling any missing asset from the
/// embedded default.
fn load_theme_dir(dir: &Path, name: &str, defaults: &PdfOptions) -> Theme {
    debug!("Loading theme '{name}' from {}", dir.display());

    let read_or = |file: &str, fallback: &str| -> String {
        std::fs::read_to_string(dir.join(file)).unwrap_or_else(|_| fallback.to_string())
    };

    let stylesheet_or = |file: &str, fallback: &str| -> Stylesheet {
        let path = dir.join(file);
        if path.is_file() {
            Stylesheet::Linked(path)
        } else {
            Stylesheet::Inline(fallback.to_string())
        }
    };

    let manifest: ThemeManifest = std::fs::read_to_string(dir.join("theme.json"))
        .ok()
        .and_then(|text| match serde_json::from_str(&text) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("Invalid theme.json in {}: {e}", dir.display());
                None
            }
        })
        .unwrap_or_default();

    Theme {
        name: name.to_string(),
        header_template: read_or("header.html", DEFAULT_HEADER),
        footer_template: read_or("footer.html", DEFAULT_FOOTER),
        main_stylesheet: stylesheet_or("main-content.css", DEFAULT_MAIN_CSS),
        title_stylesheet: stylesheet_or("title-page.css", DEFAULT_TITLE_CSS),
        pdf_options: manifest.pdf_options.unwrap_or_else(|| defaults.clone()),
    }
}

/// List theme names available in the given project directory, always
/// including the built-in default.
pub fn available_themes(project_dir: &Path) -> Vec<String> {
    let mut names = vec!["default".to_string()];
    if let Ok(entries) = std::fs::read_dir(project_dir.join("themes")) {
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if name != "default" {
                        names.push(name.to_string());
                    }
                }
            }
        }
    }
    names.sort();
    names
}

// ── Placeholder substitution ─────────────────────────────────────────────

/// What to do with a `{{key}}` that is not a known PageMetadata field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownPlaceholder {
    /// Leave `{{key}}` verbatim in the output (default, matches the
    /// template behaviour users rely on).
    Leave,
    /// Substitute an empty string.
    Blank,
}

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap());

/// Substitute `{{key}}` placeholders in a header/footer template from the
/// enumerated PageMetadata field set: `title`, `subtitle`, `version`,
/// `date`, `license`. Unset fields substitute as empty strings.
pub fn substitute_placeholders(
    template: &str,
    metadata: &PageMetadata,
    policy: UnknownPlaceholder,
) -> String {
    RE_PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let value = match &caps[1] {
                "title" => metadata.title.as_deref(),
                "subtitle" => metadata.subtitle.as_deref(),
                "version" => metadata.version.as_deref(),
                "date" => metadata.date.as_deref(),
                "license" => metadata.license.as_deref(),
                _ => {
                    return match policy {
                        UnknownPlaceholder::Leave => caps[0].to_string(),
                        UnknownPlaceholder::Blank => String::new(),
                    }
                }
            };
            value.unwrap_or("").to_string()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metadata() -> PageMetadata {
        PageMetadata {
            title: Some("Field Guide".into()),
            version: Some("v2.1".into()),
            ..PageMetadata::default()
        }
    }

    #[test]
    fn known_keys_substitute_and_unset_keys_blank() {
        let out = substitute_placeholders(
            "<span>{{title}} — {{version}} — {{license}}</span>",
            &metadata(),
            UnknownPlaceholder::Leave,
        );
        assert_eq!(out, "<span>Field Guide — v2.1 — </span>");
    }

    #[test]
    fn unknown_keys_follow_the_named_policy() {
        let tpl = "{{title}} {{mystery}}";
        assert_eq!(
            substitute_placeholders(tpl, &metadata(), UnknownPlaceholder::Leave),
            "Field Guide {{mystery}}"
        );
        assert_eq!(
            substitute_placeholders(tpl, &metadata(), UnknownPlaceholder::Blank),
            "Field Guide "
        );
    }

    #[test]
    fn missing_theme_falls_back_unless_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = PdfOptions::default();

        let theme = resolve_theme("nope", dir.path(), &defaults, false).unwrap();
        assert_eq!(theme.name, "default");

        let err = resolve_theme("nope", dir.path(), &defaults, true).unwrap_err();
        assert!(matches!(err, MdpressError::ThemeNotFound { .. }));
    }

    #[test]
    fn local_theme_dir_wins_and_fills_gaps_from_default() {
        let dir = tempfile::tempdir().unwrap();
        let theme_dir = dir.path().join("themes/minimal");
        std::fs::create_dir_all(&theme_dir).unwrap();
        std::fs::write(theme_dir.join("header.html"), "<div>{{title}}</div>").unwrap();
        std::fs::write(theme_dir.join("theme.json"), r#"{"pdfOptions":{"scale":0.8}}"#).unwrap();

        let theme = resolve_theme("minimal", dir.path(), &PdfOptions::default(), true).unwrap();
        assert_eq!(theme.header_template, "<div>{{title}}</div>");
        // footer missing on disk, filled from the embedded default
        assert!(theme.footer_template.contains("pageNumber"));
        assert_eq!(theme.pdf_options.scale, 0.8);
    }

    #[test]
    fn default_footer_carries_the_page_number_span() {
        // The title-page variant strips `class="pageNumber"`; the default
        // footer must contain it for that to be meaningful.
        assert!(DEFAULT_FOOTER.contains(r#"class="pageNumber""#));
    }
}
