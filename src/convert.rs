//! Conversion entry points: one Markdown document in, one PDF out.
//!
//! The orchestrator wires the pipeline stages together and owns the two
//! policy decisions the stages themselves stay agnostic about: whether
//! accumulated metadata errors abort the run, and whether a title page
//! is rendered. Everything else is sequencing — the stage order matters
//! (legal markers before image inlining, inlining before link
//! absolutization, HTML persisted before absolutization so the saved
//! file stays portable).

use crate::config::{load_config, PdfOptions};
use crate::error::MdpressError;
use crate::messages::MessageLog;
use crate::pipeline::html::HtmlTransform;
use crate::pipeline::{assemble, authors, html, metadata, postprocess, render::PdfEngine};
use crate::theme::{resolve_theme, substitute_placeholders, Theme, UnknownPlaceholder};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Caller-facing conversion options, all optional.
#[derive(Default)]
pub struct ConvertOptions {
    /// Output PDF path. Defaults to the input path with a `.pdf` extension.
    pub output: Option<PathBuf>,
    /// Persist the intermediate HTML next to the output.
    pub keep_html: bool,
    /// Theme name; overrides the configured theme and must exist.
    pub theme: Option<String>,
    /// Explicit config file; overrides discovery and must parse.
    pub config: Option<PathBuf>,
    /// Master switch for the title page. The page still only renders
    /// when the document or config asks for one.
    pub title_page: bool,
    /// Extra HTML rewrites applied after the built-in ones, in order.
    pub transforms: Vec<HtmlTransform>,
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self {
            title_page: true,
            ..Self::default()
        }
    }
}

/// What a successful conversion produced.
#[derive(Debug)]
pub struct ConvertOutput {
    pub pdf_path: PathBuf,
    /// Set when `keep_html` was requested.
    pub html_path: Option<PathBuf>,
    /// Name of the theme that was actually used.
    pub theme: String,
    /// Non-fatal findings from metadata resolution.
    pub messages: MessageLog,
}

/// Convert a Markdown file to a paginated PDF.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Fatal conditions only: a missing or unreadable input, blocking
/// metadata errors (see [`MessageLog`]), an explicitly requested theme
/// or config that cannot be loaded, and browser or PDF failures.
/// Warnings never abort; they are logged and returned in the output.
pub async fn convert(
    input: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<ConvertOutput, MdpressError> {
    let input = input.as_ref();
    info!("Starting conversion: {}", input.display());

    if !input.is_file() {
        return Err(MdpressError::FileNotFound {
            path: input.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(input).map_err(|e| MdpressError::InputReadFailed {
        path: input.to_path_buf(),
        source: e,
    })?;

    let project_dir = input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let base_name = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());

    // ── Step 1: Configuration and theme ──────────────────────────────────
    let config = load_config(&project_dir, options.config.as_deref())?;
    let theme_name = options.theme.clone().unwrap_or_else(|| config.theme.clone());
    let theme = resolve_theme(
        &theme_name,
        &project_dir,
        &config.pdf_options,
        options.theme.is_some(),
    )?;

    // ── Step 2: Metadata resolution ──────────────────────────────────────
    let processed = metadata::process_markdown(&raw, &config, &project_dir);
    for warning in processed.messages.warnings() {
        warn!("{}", warning.message);
        for detail in &warning.details {
            warn!("  {detail}");
        }
    }
    if processed.messages.has_errors() {
        return Err(MdpressError::MetadataInvalid {
            log: processed.messages,
        });
    }
    let page_metadata = processed.metadata;

    // ── Step 3: Header/footer templates ──────────────────────────────────
    let header = substitute_placeholders(
        &theme.header_template,
        &page_metadata,
        UnknownPlaceholder::Leave,
    );
    let footer = substitute_placeholders(
        &theme.footer_template,
        &page_metadata,
        UnknownPlaceholder::Leave,
    );
    // The title page must not show a page number; dropping the class
    // keeps the footer layout and defuses the counter span.
    let title_footer = footer.replace(r#"class="pageNumber""#, "");

    // ── Step 4: Render Markdown to HTML ──────────────────────────────────
    let markdown = authors::inject_authors(&processed.markdown, &page_metadata);
    let mut html_content = html::md_to_html(
        &markdown,
        &theme.main_stylesheet,
        &page_metadata,
        &options.transforms,
    );

    // ── Step 5: Post-process ─────────────────────────────────────────────
    html_content = postprocess::mark_legal_excerpts(&html_content);
    html_content = postprocess::inline_local_images(&html_content, &project_dir);

    // A sibling `<name>.js` file is embedded so it runs during the page
    // load, before printing.
    let script_path = project_dir.join(format!("{base_name}.js"));
    if script_path.is_file() {
        let script =
            std::fs::read_to_string(&script_path).map_err(|e| MdpressError::InputReadFailed {
                path: script_path.clone(),
                source: e,
            })?;
        debug!("Embedding script {}", script_path.display());
        html_content = postprocess::inject_script(&html_content, &script);
    }

    // Persist the HTML before absolutization; relative references keep
    // the saved file usable from its own directory.
    let html_path = if options.keep_html {
        let path = project_dir.join(format!("{base_name}.html"));
        write_atomic(&path, html_content.as_bytes()).await?;
        info!("Saved intermediate HTML: {}", path.display());
        Some(path)
    } else {
        None
    };

    html_content = postprocess::absolutize_links(&html_content, &project_dir);

    // ── Step 6: Render and assemble the PDF ──────────────────────────────
    let with_title_page =
        options.title_page && (page_metadata.title_page || config.title_page);

    let engine = PdfEngine::new();
    let result = render_and_assemble(
        &engine,
        html_content,
        &header,
        &footer,
        &title_footer,
        with_title_page,
        &page_metadata,
        &theme,
    )
    .await;
    // The browser goes down on the error path too.
    engine.close();
    let pdf_bytes = result?;

    // ── Step 7: Write output atomically ──────────────────────────────────
    let pdf_path = options
        .output
        .clone()
        .unwrap_or_else(|| project_dir.join(format!("{base_name}.pdf")));
    write_atomic(&pdf_path, &pdf_bytes).await?;
    info!("PDF generated: {}", pdf_path.display());

    Ok(ConvertOutput {
        pdf_path,
        html_path,
        theme: theme.name,
        messages: processed.messages,
    })
}

/// The browser-dependent half of the conversion, separated so the caller
/// can close the engine regardless of where it failed.
#[allow(clippy::too_many_arguments)]
async fn render_and_assemble(
    engine: &PdfEngine,
    html_content: String,
    header: &str,
    footer: &str,
    title_footer: &str,
    with_title_page: bool,
    page_metadata: &metadata::PageMetadata,
    theme: &Theme,
) -> Result<Vec<u8>, MdpressError> {
    let pdf_options: &PdfOptions = &theme.pdf_options;

    let main_render = engine.render(
        html_content,
        header.to_string(),
        footer.to_string(),
        pdf_options,
    );

    let (main_bytes, title_bytes) = if with_title_page {
        let title_html = postprocess::absolutize_links(
            &html::title_page_html(page_metadata, &theme.title_stylesheet),
            Path::new("."),
        );
        let title_render = engine.render(
            title_html,
            header.to_string(),
            title_footer.to_string(),
            pdf_options,
        );
        let (main, title) = tokio::join!(main_render, title_render);
        (main?, Some(title?))
    } else {
        (main_render.await?, None)
    };

    let mut document = assemble::load_pdf(&main_bytes)?;
    if let Some(title_bytes) = title_bytes {
        let title_document = assemble::load_pdf(&title_bytes)?;
        assemble::prepend_title_page(&mut document, &title_document)?;
        assemble::reset_page_labels(&mut document, true)?;
    }
    assemble::crop_to_a4(&mut document)?;
    assemble::save_pdf(&mut document)
}

/// Atomic write: temp file in the target directory, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MdpressError> {
    let io_err = |e: std::io::Error| MdpressError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(io_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_input_is_rejected_up_front() {
        let err = convert("no/such/file.md", &ConvertOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MdpressError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn metadata_errors_block_before_the_browser_launches() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        // Author present but without an email; a blocking error.
        std::fs::write(
            &input,
            "---\ntitle: T\nauthors:\n  - Nameless\n---\n\n# T\n",
        )
        .unwrap();

        let err = convert(&input, &ConvertOptions::new()).await.unwrap_err();
        match err {
            MdpressError::MetadataInvalid { log } => assert!(log.has_errors()),
            other => panic!("expected MetadataInvalid, got {other}"),
        }
    }

    #[tokio::test]
    async fn explicit_unknown_theme_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.md");
        std::fs::write(&input, "# Hi\n").unwrap();

        let options = ConvertOptions {
            theme: Some("nope".to_string()),
            ..ConvertOptions::new()
        };
        let err = convert(&input, &options).await.unwrap_err();
        assert!(matches!(err, MdpressError::ThemeNotFound { .. }));
    }

    #[tokio::test]
    async fn atomic_write_replaces_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        std::fs::write(&path, b"old").unwrap();

        write_atomic(&path, b"new").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert!(!path.with_extension("tmp").exists());
    }
}
