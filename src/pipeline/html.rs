//! Markdown to standalone HTML document rendering.
//!
//! Two passes over the event stream: the first collects heading text to
//! assign stable, deduplicated anchor slugs and build the table of
//! contents; the second rewrites events (heading ids, GFM callout
//! blockquotes, syntax-highlighted code fences) before serialization.
//! The output is a complete HTML document the browser engine can load
//! from a `file://` URL without further context.

use crate::pipeline::metadata::{PageMetadata, OMIT_FROM_TOC, TOC_PLACEHOLDER};
use crate::theme::Stylesheet;
use once_cell::sync::Lazy;
use pulldown_cmark::{
    html, BlockQuoteKind, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd,
};
use syntect::highlighting::{Theme as SyntaxTheme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;
use tracing::debug;

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static CODE_THEME: Lazy<SyntaxTheme> =
    Lazy::new(|| ThemeSet::load_defaults().themes["InspiredGitHub"].clone());

/// Toc levels used when the directive does not name any.
const DEFAULT_TOC_LEVELS: &[u8] = &[2, 3];

/// A named HTML rewrite applied to the rendered document, in order.
pub struct HtmlTransform {
    name: &'static str,
    apply: Box<dyn Fn(&str) -> String + Send + Sync>,
}

impl HtmlTransform {
    pub fn new(
        name: &'static str,
        apply: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            apply: Box::new(apply),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, html: &str) -> String {
        (self.apply)(html)
    }
}

#[derive(Debug, Clone)]
struct TocEntry {
    level: u8,
    slug: String,
    text: String,
    omitted: bool,
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_GFM
}

/// Render Markdown into a complete, self-titled HTML document.
pub fn md_to_html(
    markdown: &str,
    stylesheet: &Stylesheet,
    metadata: &PageMetadata,
    transforms: &[HtmlTransform],
) -> String {
    let headings = collect_headings(markdown);

    let mut slugs = headings.iter().map(|h| h.slug.clone());
    let mut events: Vec<Event<'_>> = Vec::new();
    let mut code: Option<(String, String)> = None;

    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Start(Tag::Heading {
                level,
                classes,
                attrs,
                ..
            }) => {
                let id = slugs.next().map(CowStr::from);
                events.push(Event::Start(Tag::Heading {
                    level,
                    id,
                    classes,
                    attrs,
                }));
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => {
                        info.split_whitespace().next().unwrap_or("").to_string()
                    }
                    CodeBlockKind::Indented => String::new(),
                };
                code = Some((lang, String::new()));
            }
            Event::Text(text) if code.is_some() => {
                if let Some((_, buffer)) = code.as_mut() {
                    buffer.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, source)) = code.take() {
                    events.push(Event::Html(highlight_code(&lang, &source).into()));
                }
            }
            Event::Start(Tag::BlockQuote(Some(kind))) => {
                events.push(Event::Html(callout_open(kind).into()));
            }
            Event::End(TagEnd::BlockQuote(Some(_))) => {
                events.push(Event::Html("</div>\n".into()));
            }
            other => events.push(other),
        }
    }

    let mut body = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut body, events.into_iter());

    body = substitute_toc(&body, &headings, metadata);

    let mut document = wrap_document(&body, stylesheet, metadata.title.as_deref());
    for transform in transforms {
        debug!("Applying HTML transform '{}'", transform.name());
        document = transform.apply(&document);
    }
    document
}

/// Render the standalone title page document.
pub fn title_page_html(metadata: &PageMetadata, stylesheet: &Stylesheet) -> String {
    let mut body = String::from("<div class=\"title-page\">\n");
    if let Some(title) = &metadata.title {
        body.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));
    }
    if let Some(subtitle) = &metadata.subtitle {
        body.push_str(&format!("<h2>{}</h2>\n", escape_html(subtitle)));
    }
    if !metadata.authors.is_empty() {
        let names: Vec<String> = metadata
            .authors
            .iter()
            .map(|a| escape_html(&a.name))
            .collect();
        body.push_str(&format!("<p class=\"authors\">{}</p>\n", names.join(", ")));
    }
    let line: Vec<String> = [metadata.version.as_deref(), metadata.date.as_deref()]
        .iter()
        .flatten()
        .map(|v| escape_html(v))
        .collect();
    if !line.is_empty() {
        body.push_str(&format!("<p class=\"edition\">{}</p>\n", line.join(" · ")));
    }
    if let Some(license) = &metadata.license {
        body.push_str(&format!("<p class=\"license\">{}</p>\n", escape_html(license)));
    }
    body.push_str("</div>\n");

    wrap_document(&body, stylesheet, metadata.title.as_deref())
}

// ── Pass 1: heading collection ───────────────────────────────────────────

/// Collect every heading with its deduplicated slug. An
/// `<!-- omit from toc -->` comment marks the *next* heading as excluded
/// from the table of contents (it still gets an anchor).
fn collect_headings(markdown: &str) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    let mut seen: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut current: Option<(u8, String)> = None;
    let mut omit_next = false;

    for event in Parser::new_ext(markdown, parser_options()) {
        match event {
            Event::Html(text) | Event::InlineHtml(text) => {
                if text.contains(OMIT_FROM_TOC) {
                    omit_next = true;
                }
            }
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((heading_depth(level), String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buffer)) = current.as_mut() {
                    buffer.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = current.take() {
                    let base = slugify(&text);
                    let count = seen.entry(base.clone()).or_insert(0);
                    let slug = if *count == 0 {
                        base.clone()
                    } else {
                        format!("{base}-{count}")
                    };
                    *count += 1;
                    entries.push(TocEntry {
                        level,
                        slug,
                        text,
                        omitted: std::mem::take(&mut omit_next),
                    });
                }
            }
            _ => {}
        }
    }
    entries
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// GitHub-style anchor slug.
fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

// ── Code fences and callouts ─────────────────────────────────────────────

fn highlight_code(lang: &str, source: &str) -> String {
    let syntax = SYNTAXES
        .find_syntax_by_token(lang)
        .unwrap_or_else(|| SYNTAXES.find_syntax_plain_text());
    match highlighted_html_for_string(source, &SYNTAXES, syntax, &CODE_THEME) {
        Ok(highlighted) => highlighted,
        // Highlighting never blocks conversion.
        Err(_) => format!("<pre><code>{}</code></pre>\n", escape_html(source)),
    }
}

fn callout_open(kind: BlockQuoteKind) -> String {
    let label = match kind {
        BlockQuoteKind::Note => "Note",
        BlockQuoteKind::Tip => "Tip",
        BlockQuoteKind::Important => "Important",
        BlockQuoteKind::Warning => "Warning",
        BlockQuoteKind::Caution => "Caution",
    };
    format!(
        "<div class=\"callout callout-{}\">\n<div class=\"callout-title\">{}</div>\n",
        label.to_ascii_lowercase(),
        label
    )
}

// ── Table of contents ────────────────────────────────────────────────────

fn substitute_toc(body: &str, headings: &[TocEntry], metadata: &PageMetadata) -> String {
    let paragraph = format!("<p>{TOC_PLACEHOLDER}</p>");
    if !body.contains(&paragraph) && !body.contains(TOC_PLACEHOLDER) {
        return body.to_string();
    }

    let levels: Vec<u8> = metadata
        .table_of_content
        .clone()
        .unwrap_or_else(|| DEFAULT_TOC_LEVELS.to_vec());
    let toc = toc_html(headings, &levels);

    if body.contains(&paragraph) {
        body.replacen(&paragraph, &toc, 1)
    } else {
        body.replacen(TOC_PLACEHOLDER, &toc, 1)
    }
}

fn toc_html(headings: &[TocEntry], levels: &[u8]) -> String {
    let selected: Vec<&TocEntry> = headings
        .iter()
        .filter(|h| levels.contains(&h.level) && !h.omitted)
        .collect();

    let mut out = String::from(
        "<div class=\"table-of-content\">\n\
         <h2 id=\"table-of-content\">Table of Contents</h2>\n",
    );
    if let Some(top) = selected.iter().map(|h| h.level).min() {
        let mut depth = top;
        out.push_str("<ul>\n");
        for entry in &selected {
            while depth < entry.level {
                out.push_str("<ul>\n");
                depth += 1;
            }
            while depth > entry.level {
                out.push_str("</ul>\n");
                depth -= 1;
            }
            out.push_str(&format!(
                "<li><a href=\"#{}\">{}</a></li>\n",
                entry.slug,
                escape_html(&entry.text)
            ));
        }
        while depth > top {
            out.push_str("</ul>\n");
            depth -= 1;
        }
        out.push_str("</ul>\n");
    }
    out.push_str("</div>");
    out
}

// ── Document wrapping ────────────────────────────────────────────────────

fn wrap_document(body: &str, stylesheet: &Stylesheet, title: Option<&str>) -> String {
    let style = match stylesheet {
        Stylesheet::Linked(path) => {
            format!("<link rel=\"stylesheet\" href=\"{}\" />", path.display())
        }
        Stylesheet::Inline(css) => format!("<style>\n{css}\n</style>"),
    };
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\" />\n\
         <title>{}</title>\n{}\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title.unwrap_or("Document")),
        style,
        body
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
