//! Cross-stage integration tests that run without a browser.
//!
//! Everything up to (and after) the Chromium render is exercised here:
//! metadata resolution against a real on-disk author store, HTML
//! rendering, post-processing, and PDF assembly on synthetic documents.
//! The browser-dependent path lives in `tests/e2e.rs`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use mdpress::config::DocumentConfig;
use mdpress::pipeline::{assemble, authors, html, metadata, postprocess};
use mdpress::theme::Stylesheet;
use pretty_assertions::assert_eq;
use std::path::Path;

const COMPLETE_RECORD: &str = "name: Ada Lovelace\nemail: ada@example.com\nbio: Wrote the first program.\n";

fn write_author_record(project_dir: &Path, id: &str, body: &str) {
    let store = project_dir.join("data/authors");
    std::fs::create_dir_all(&store).unwrap();
    std::fs::write(store.join(format!("{id}.yaml")), body).unwrap();
}

// ── Metadata resolution ──────────────────────────────────────────────────

#[test]
fn titled_document_with_known_author_resolves_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    write_author_record(dir.path(), "ada_example_com", COMPLETE_RECORD);

    let raw = "---\n\
               version: v1.2.0\n\
               authors:\n\
               \x20 - Ada Lovelace <ada@example.com>\n\
               ---\n\n\
               # Hello: World\n\n\
               Body text.\n";
    let processed = metadata::process_markdown(raw, &DocumentConfig::default(), dir.path());

    assert!(!processed.messages.has_errors(), "{}", processed.messages);
    assert_eq!(processed.metadata.title.as_deref(), Some("Hello"));
    assert_eq!(processed.metadata.subtitle.as_deref(), Some("World"));
    assert_eq!(processed.metadata.version.as_deref(), Some("v1.2.0"));
    assert_eq!(processed.metadata.author_data.len(), 1);
    assert_eq!(processed.metadata.author_data[0].bio, "Wrote the first program.");

    // Front matter is stripped, the heading is split in two.
    assert!(!processed.markdown.starts_with("---"));
    assert!(processed.markdown.contains("# Hello\n"));
    assert!(processed.markdown.contains("## World"));
}

#[test]
fn unknown_author_is_stubbed_then_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let raw = "---\nauthors:\n\x20 - Ada Lovelace <ada@example.com>\n---\n\n# Doc\n";
    let config = DocumentConfig::default();

    // First run: a stub appears and the run stays error-free.
    let first = metadata::process_markdown(raw, &config, dir.path());
    assert!(!first.messages.has_errors());
    assert!(first
        .messages
        .warnings()
        .iter()
        .any(|w| w.message.contains("author metadata file not found")));
    let stub = dir.path().join("data/authors/ada_example_com.yaml");
    assert!(stub.exists());
    assert!(std::fs::read_to_string(&stub).unwrap().contains("ada@example.com"));

    // Second run against the still-empty stub: now it is a blocking error.
    let second = metadata::process_markdown(raw, &config, dir.path());
    assert!(second.messages.has_errors());
    assert!(second
        .messages
        .errors()
        .iter()
        .any(|e| e.message.contains("missing a \"bio\"")));
}

#[test]
fn toc_directive_inside_a_fence_is_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let fence = "```markdown\n<!-- [[toc]][2] -->\n```";
    let raw = format!("# Doc\n\n<!-- [[toc]][2,3] -->\n\n{fence}\n");

    let processed =
        metadata::process_markdown(&raw, &DocumentConfig::default(), dir.path());

    assert_eq!(processed.metadata.table_of_content, Some(vec![2, 3]));
    // The live directive became the placeholder; the fenced copy did not.
    assert!(processed.markdown.contains("\n[[toc]]\n"));
    assert!(processed.markdown.contains(fence));
}

#[test]
fn title_page_marker_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    let with = metadata::process_markdown(
        "# Doc\n\n<!-- [[titlepage]] -->\n",
        &DocumentConfig::default(),
        dir.path(),
    );
    let without =
        metadata::process_markdown("# Doc\n", &DocumentConfig::default(), dir.path());
    assert!(with.metadata.title_page);
    assert!(!without.metadata.title_page);
}

// ── Rendering and post-processing end to end ─────────────────────────────

#[test]
fn markdown_becomes_a_self_contained_document() {
    let dir = tempfile::tempdir().unwrap();
    write_author_record(dir.path(), "ada_example_com", COMPLETE_RECORD);
    std::fs::write(dir.path().join("figure.png"), b"notapng").unwrap();

    let raw = "---\nauthors:\n\x20 - Ada Lovelace <ada@example.com>\n---\n\n\
               # Guide: Edition One\n\n\
               <!-- [[toc]][2] -->\n\n\
               ## Usage\n\n\
               ![figure](figure.png)\n\n\
               <!-- [[legal]] -->\n\
               > Quoted under license.\n\n\
               <!-- [[authors]] -->\n";
    let processed = metadata::process_markdown(raw, &DocumentConfig::default(), dir.path());
    assert!(!processed.messages.has_errors(), "{}", processed.messages);

    let markdown = authors::inject_authors(&processed.markdown, &processed.metadata);
    let mut page = html::md_to_html(
        &markdown,
        &Stylesheet::Inline(String::new()),
        &processed.metadata,
        &[],
    );
    page = postprocess::mark_legal_excerpts(&page);
    page = postprocess::inline_local_images(&page, dir.path());

    assert!(page.contains("<title>Guide</title>"));
    assert!(page.contains(r#"<div class="table-of-content">"#));
    assert!(page.contains(r##"<a href="#usage">Usage</a>"##));
    assert!(page.contains(r#"<blockquote class="legal-excerpt">"#));
    assert!(page.contains("data:image/png;base64,"));
    assert!(page.contains("About the authors"));
    assert!(page.contains("mailto:ada@example.com"));
    // The subtitle heading never reaches the toc.
    assert!(!page.contains(r##"<a href="#edition-one">"##));
}

// ── PDF assembly ─────────────────────────────────────────────────────────

fn synthetic_pdf(num_pages: u32, width: f64, height: f64, marker: &str) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = vec![];
    for i in 1..=num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("{marker} {i}").into_bytes(),
                        StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(width as f32),
                Object::Real(height as f32),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => num_pages as i64,
        }
        .into(),
    );
    let root_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", root_id);
    doc
}

#[test]
fn full_assembly_pass_produces_a_loadable_a4_document() {
    let oversize = assemble::A4_WIDTH_PT * 1.4;
    let mut body = synthetic_pdf(3, oversize, assemble::A4_HEIGHT_PT, "Body");
    let title = synthetic_pdf(1, assemble::A4_WIDTH_PT, assemble::A4_HEIGHT_PT, "Cover");

    assemble::prepend_title_page(&mut body, &title).unwrap();
    assemble::reset_page_labels(&mut body, true).unwrap();
    assemble::crop_to_a4(&mut body).unwrap();
    let bytes = assemble::save_pdf(&mut body).unwrap();

    let reloaded = assemble::load_pdf(&bytes).unwrap();
    let pages = reloaded.get_pages();
    assert_eq!(pages.len(), 4);

    // The cover leads, body content follows in order.
    let first = reloaded.get_page_content(pages[&1]).unwrap();
    assert!(String::from_utf8_lossy(&first).contains("Cover 1"));
    let last = reloaded.get_page_content(pages[&4]).unwrap();
    assert!(String::from_utf8_lossy(&last).contains("Body 3"));

    // Every page ends up exactly A4.
    for (_, page_id) in pages {
        let page = reloaded.get_object(page_id).unwrap().as_dict().unwrap();
        let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let width = match &media[2] {
            Object::Real(v) => f64::from(*v),
            Object::Integer(v) => *v as f64,
            other => panic!("unexpected box value {other:?}"),
        };
        assert!((width - assemble::A4_WIDTH_PT).abs() < 0.01);
    }
}

#[test]
fn assembly_without_title_page_leaves_labels_absent() {
    let mut body = synthetic_pdf(2, assemble::A4_WIDTH_PT, assemble::A4_HEIGHT_PT, "Body");
    assemble::crop_to_a4(&mut body).unwrap();
    let bytes = assemble::save_pdf(&mut body).unwrap();

    let reloaded = assemble::load_pdf(&bytes).unwrap();
    let root_id = reloaded.trailer.get(b"Root").unwrap().as_reference().unwrap();
    let catalog = reloaded.get_object(root_id).unwrap().as_dict().unwrap();
    assert!(catalog.get(b"PageLabels").is_err());
    assert_eq!(reloaded.get_pages().len(), 2);
}
