//! Error types for the mdpress library.
//!
//! A single fatal error enum, [`MdpressError`], is returned by the top-level
//! `convert` entry point. Document validation problems deliberately do NOT
//! appear here as individual variants: the metadata resolver accumulates
//! them in a [`crate::messages::MessageLog`] so the user sees every problem
//! in one run, and only a non-empty error section becomes the single
//! [`MdpressError::MetadataInvalid`] value.

use crate::messages::MessageLog;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mdpress library.
#[derive(Debug, Error)]
pub enum MdpressError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input Markdown file was not found at the given path.
    #[error("Markdown file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Could not read the input file.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Validation ────────────────────────────────────────────────────────
    /// Metadata validation produced at least one error; no output is written.
    #[error("Metadata validation failed with {count} error(s):\n{log}", count = log.errors().len())]
    MetadataInvalid { log: MessageLog },

    // ── Theme/config errors ───────────────────────────────────────────────
    /// A named theme was requested but not found anywhere in the
    /// resolution chain.
    #[error("Theme '{name}' not found.\nLooked in ./themes/{name}/ — run `mdpress themes` to list available themes.")]
    ThemeNotFound { name: String },

    /// A config file was named explicitly but could not be parsed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Rendering-engine errors ───────────────────────────────────────────
    /// Chromium could not be launched.
    #[error("Failed to launch the Chromium rendering engine: {0}\nInstall Chrome or Chromium, or set CHROME env var to the binary path.")]
    BrowserLaunch(String),

    /// The engine accepted the page but the print call failed.
    #[error("PDF rendering failed: {0}")]
    RenderFailed(String),

    /// The engine returned an empty document.
    #[error("PDF generation failed: no content returned by the rendering engine")]
    EmptyRender,

    /// A render call exceeded the configured timeout.
    #[error("PDF rendering timed out after {secs}s\nIncrease renderTimeoutSecs in the config if the document is very large.")]
    RenderTimeout { secs: u64 },

    // ── PDF assembly errors ───────────────────────────────────────────────
    /// lopdf could not parse or manipulate a rendered document.
    #[error("PDF assembly error: {0}")]
    Pdf(#[from] lopdf::Error),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_invalid_lists_every_error() {
        let mut log = MessageLog::new();
        log.error("author \"a@x.com\" is missing a \"bio\"");
        log.error_with(
            "author \"\" is missing a \"name\"",
            vec!["declared in frontmatter authors".into()],
        );
        let e = MdpressError::MetadataInvalid { log };
        let msg = e.to_string();
        assert!(msg.contains("2 error(s)"), "got: {msg}");
        assert!(msg.contains("missing a \"bio\""));
        assert!(msg.contains("declared in frontmatter authors"));
    }

    #[test]
    fn file_not_found_display() {
        let e = MdpressError::FileNotFound {
            path: PathBuf::from("doc.md"),
        };
        assert!(e.to_string().contains("doc.md"));
    }

    #[test]
    fn render_timeout_display() {
        let e = MdpressError::RenderTimeout { secs: 120 };
        assert!(e.to_string().contains("120s"));
    }
}
