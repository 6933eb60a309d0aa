//! Conversion pipeline: the discrete stages between a Markdown file and
//! a paginated PDF.
//!
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch the browser engine) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! metadata ──▶ authors ──▶ html ──▶ postprocess ──▶ render ──▶ assemble
//! (front      (record     (markdown  (inline,       (browser)  (title page,
//!  matter)     store)      → HTML)    absolutize)               labels, A4)
//! ```
//!
//! 1. [`metadata`]    — parse YAML front matter, split the title heading,
//!    collect toc directives
//! 2. [`authors`]     — resolve declared authors against the persistent
//!    record store, creating stubs for newcomers
//! 3. [`html`]        — render Markdown to a standalone HTML document
//!    with anchors, callouts and highlighted code
//! 4. [`postprocess`] — pure string rewrites that make the document
//!    self-contained for a `file://` page load
//! 5. [`render`]      — print the page to PDF through a reused headless
//!    browser; runs in `spawn_blocking` because the DevTools connection
//!    is synchronous
//! 6. [`assemble`]    — binary PDF surgery: prepend the title page,
//!    rewrite page labels, pin every page to A4

pub mod assemble;
pub mod authors;
pub mod html;
pub mod metadata;
pub mod postprocess;
pub mod render;
