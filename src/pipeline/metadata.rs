//! Metadata resolution: front matter, authors, title split, sentinel
//! directives.
//!
//! This stage never fails. Malformed front matter, unparseable author
//! strings, and missing fields all degrade to warnings (or errors) in the
//! [`MessageLog`]; the function always returns cleaned Markdown plus
//! whatever metadata it could derive. The orchestrator decides whether the
//! accumulated errors abort the run.

use crate::config::DocumentConfig;
use crate::messages::MessageLog;
use crate::pipeline::authors::{self, AuthorRecord, AuthorStore};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::path::Path;

/// A declared document author, normalized from the front-matter field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

/// Everything the downstream pipeline needs to know about the document.
///
/// Built incrementally here, consumed read-only by the renderer, the
/// header/footer substitution, and the title-page generator.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub license: Option<String>,
    /// Always `{name, email}` pairs after resolution, never a raw string.
    pub authors: Vec<Author>,
    /// One record per author whose metadata file was found and well-formed.
    pub author_data: Vec<AuthorRecord>,
    /// Set by the `<!-- [[titlepage]] -->` marker.
    pub title_page: bool,
    /// Heading levels requested by `<!-- [[toc]][2,3] -->`, if any.
    pub table_of_content: Option<Vec<u8>>,
}

/// Result of resolving a raw Markdown document.
#[derive(Debug)]
pub struct ProcessedMarkdown {
    /// Markdown with front matter stripped, the title heading rewritten,
    /// and toc directives replaced by the `[[toc]]` placeholder.
    pub markdown: String,
    pub metadata: PageMetadata,
    pub messages: MessageLog,
}

static RE_FRONT_MATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\s*\n(.*?)\n---[ \t]*\n?").unwrap());
static RE_FIRST_H1: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#[ \t]+(.*)$").unwrap());
static RE_AUTHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?)<([^>]+)>$").unwrap());
static RE_TOC_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!-- \[\[toc\]\](?:\[([0-9](?:,[0-9])*)\])? -->").unwrap());
static RE_FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```.*?```").unwrap());

/// Marker left in the Markdown for the renderer to replace with the
/// generated table of contents.
pub const TOC_PLACEHOLDER: &str = "[[toc]]";
/// Sentinel requesting a separately rendered title page.
pub const TITLE_PAGE_MARKER: &str = "<!-- [[titlepage]] -->";
/// Comment excluding the immediately following heading from the toc.
pub const OMIT_FROM_TOC: &str = "<!-- omit from toc -->";

/// Resolve metadata from raw Markdown text.
///
/// `project_dir` anchors the author record store configured in `config`.
pub fn process_markdown(
    raw: &str,
    config: &DocumentConfig,
    project_dir: &Path,
) -> ProcessedMarkdown {
    let mut messages = MessageLog::new();
    let mut metadata = PageMetadata::default();
    let mut markdown = raw.to_string();

    // Front matter: leading `--- ... ---` block, YAML.
    match RE_FRONT_MATTER.captures(&markdown) {
        Some(caps) => match serde_yaml::from_str::<serde_yaml::Mapping>(&caps[1]) {
            Ok(mapping) => apply_front_matter(&mapping, &mut metadata, &mut messages),
            Err(e) => {
                messages.warning_with("invalid YAML frontmatter".to_string(), vec![e.to_string()]);
            }
        },
        None => messages.warning("no frontmatter block found"),
    }

    if metadata.authors.is_empty() {
        messages.warning(
            "no authors were declared in the metadata, \
             the \"about the authors\" section will not be generated",
        );
    }

    // Title/subtitle from the first h1 in the body (front matter may
    // contain `#` YAML comment lines), split on the first colon or dash.
    let body_start = RE_FRONT_MATTER.find(&markdown).map_or(0, |m| m.end());
    if let Some(h1) = RE_FIRST_H1.captures(&markdown[body_start..]) {
        let heading = h1[1].trim();
        let (title, subtitle) = split_title(heading);
        metadata.title = Some(title.to_string());
        metadata.subtitle = subtitle.map(str::to_string);

        // Rewrite the heading so the rendered body shows title and
        // subtitle distinctly; the subtitle is kept out of the toc.
        let mut replacement = format!("# {title}");
        if let Some(sub) = &metadata.subtitle {
            replacement.push_str(&format!("\n\n{OMIT_FROM_TOC}\n## {sub}"));
        }
        let range = h1.get(0).map(|m| m.range()).unwrap_or_default();
        markdown.replace_range(body_start + range.start..body_start + range.end, &replacement);
    }

    metadata.title_page = markdown.contains(TITLE_PAGE_MARKER);

    // Author enrichment against the persistent record store.
    let store = AuthorStore::new(
        config.authors_dir(project_dir),
        config.authors.template.clone(),
    );
    authors::enrich_authors(&mut metadata, &store, &mut messages);

    // Strip exactly the first front-matter block.
    if let Some(m) = RE_FRONT_MATTER.find(&markdown) {
        markdown.replace_range(m.range(), "");
    }

    markdown = process_toc_directives(&markdown, &mut metadata);

    ProcessedMarkdown {
        markdown,
        metadata,
        messages,
    }
}

/// Split a heading on the first `:` or `-`; the subtitle is the trimmed
/// remainder, so further separators survive intact.
fn split_title(heading: &str) -> (&str, Option<&str>) {
    match heading.find([':', '-']) {
        Some(idx) => {
            let title = heading[..idx].trim_end();
            let rest = heading[idx + 1..].trim();
            (title, (!rest.is_empty()).then_some(rest))
        }
        None => (heading, None),
    }
}

fn apply_front_matter(
    mapping: &serde_yaml::Mapping,
    metadata: &mut PageMetadata,
    messages: &mut MessageLog,
) {
    let scalar = |key: &str| -> Option<String> {
        mapping.get(key).and_then(value_to_string)
    };
    metadata.version = scalar("version");
    metadata.date = scalar("date");
    metadata.license = scalar("license");

    if let Some(field) = mapping.get("authors") {
        metadata.authors = parse_authors(field, messages);
    }
}

/// Render a YAML scalar as display text; mappings and sequences are not
/// meaningful for the simple metadata fields.
fn value_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Normalize the authors field: a comma-delimited string, a sequence of
/// strings, or a sequence of `{name, email}` mappings. Every entry must
/// match `Name <email>`; mismatches keep the raw string as the name with
/// an empty email and record a warning.
fn parse_authors(field: &serde_yaml::Value, messages: &mut MessageLog) -> Vec<Author> {
    let entries: Vec<serde_yaml::Value> = match field {
        serde_yaml::Value::String(s) => s
            .split(',')
            .map(|part| serde_yaml::Value::String(part.to_string()))
            .collect(),
        serde_yaml::Value::Sequence(seq) => seq.clone(),
        _ => {
            messages.warning("authors field has an unrecognized shape, ignoring it");
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            serde_yaml::Value::String(s) => Some(parse_author_string(s, messages)),
            serde_yaml::Value::Mapping(m) => Some(Author {
                name: m.get("name").and_then(value_to_string).unwrap_or_default(),
                email: m.get("email").and_then(value_to_string).unwrap_or_default(),
            }),
            _ => None,
        })
        .collect()
}

fn parse_author_string(raw: &str, messages: &mut MessageLog) -> Author {
    let trimmed = raw.trim();
    match RE_AUTHOR.captures(trimmed) {
        Some(caps) => Author {
            name: caps[1].trim().to_string(),
            email: caps[2].trim().to_string(),
        },
        None => {
            messages.warning(format!(
                "author entry \"{trimmed}\" is not in \"Name <email>\" format"
            ));
            Author {
                name: trimmed.to_string(),
                email: String::new(),
            }
        }
    }
}

/// Replace `<!-- [[toc]] -->` directives with the bare placeholder token,
/// recording any requested heading levels. Directives inside fenced code
/// blocks are left byte-for-byte unchanged.
fn process_toc_directives(markdown: &str, metadata: &mut PageMetadata) -> String {
    let fenced: Vec<Range<usize>> = RE_FENCED_BLOCK
        .find_iter(markdown)
        .map(|m| m.range())
        .collect();
    let in_fence = |pos: usize| fenced.iter().any(|r| r.contains(&pos));

    let mut out = String::with_capacity(markdown.len());
    let mut last = 0;
    for caps in RE_TOC_TAG.captures_iter(markdown) {
        let m = caps.get(0).expect("capture 0 always present");
        out.push_str(&markdown[last..m.start()]);
        if in_fence(m.start()) {
            out.push_str(m.as_str());
        } else {
            if let Some(levels) = caps.get(1) {
                metadata.table_of_content = Some(
                    levels
                        .as_str()
                        .split(',')
                        .filter_map(|l| l.parse().ok())
                        .collect(),
                );
            }
            out.push_str(TOC_PLACEHOLDER);
        }
        last = m.end();
    }
    out.push_str(&markdown[last..]);
    out
}
