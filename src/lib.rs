//! # mdpress
//!
//! Convert Markdown documents into print-ready, paginated PDFs.
//!
//! ## Why this crate?
//!
//! Plain Markdown-to-PDF converters stop at "render the text". Technical
//! books and reports need more: YAML front matter driving a title page,
//! author biographies pulled from a persistent record store, a generated
//! table of contents, themed headers and footers with page numbers, and
//! pages that are actually A4 when they come out the other end. This
//! crate layers those document-level concerns on top of a headless
//! Chromium render, then finishes the job with binary PDF surgery.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Metadata  front matter, title split, author enrichment
//!  ├─ 2. HTML      pulldown-cmark + syntect, anchors, callouts, toc
//!  ├─ 3. Polish    inline images, absolutize links, embed scripts
//!  ├─ 4. Render    Chromium printToPDF (blocking, spawn_blocking)
//!  └─ 5. Assemble  prepend title page, page labels, pin boxes to A4
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdpress::{convert, ConvertOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let output = convert("book.md", &ConvertOptions::new()).await?;
//!     println!("wrote {}", output.pdf_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdpress` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mdpress = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod messages;
pub mod pipeline;
pub mod theme;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AuthorStoreConfig, DocumentConfig, PdfOptions};
pub use convert::{convert, ConvertOptions, ConvertOutput};
pub use error::MdpressError;
pub use messages::MessageLog;
pub use pipeline::html::HtmlTransform;
pub use pipeline::metadata::{Author, PageMetadata};
pub use theme::{available_themes, resolve_theme, Theme};
