//! Post-processing: pure string rewrites of the rendered HTML document.
//!
//! The browser engine loads the document from a `file://` URL in a blank
//! profile, so everything the page needs has to be resolvable at that
//! point: local images are inlined as data URIs, remaining relative
//! references are rewritten to absolute `file://` URLs, and sibling
//! scripts are embedded. Each rewrite is a pure function (`&str → String`)
//! with no shared state, applied in a defined order by the orchestrator:
//! legal markers before inlining, inlining before absolutization (a data
//! URI must not be absolutized).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use tracing::warn;

// ── Rule 1: legal excerpt marking ────────────────────────────────────────

static RE_LEGAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!--\s*\[\[legal\]\]\s*-->\s*<blockquote>").unwrap());

/// Attach the `legal-excerpt` class to a blockquote directly following a
/// `<!-- [[legal]] -->` marker. A marker with no following blockquote is
/// left in place untouched.
pub fn mark_legal_excerpts(html: &str) -> String {
    RE_LEGAL
        .replace_all(html, r#"<blockquote class="legal-excerpt">"#)
        .into_owned()
}

// ── Rule 2: local image inlining ─────────────────────────────────────────

static RE_IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(<img[^>]*?src=")([^"]+)(")"#).unwrap());

/// Replace local `<img src>` references with base64 data URIs so the
/// document renders without filesystem access. Remote and already-inlined
/// sources pass through, which makes the rewrite idempotent. A missing
/// file logs a warning and keeps the original reference.
pub fn inline_local_images(html: &str, base_dir: &Path) -> String {
    RE_IMG_SRC
        .replace_all(html, |caps: &Captures<'_>| {
            let src = &caps[2];
            if has_scheme(src) {
                return caps[0].to_string();
            }
            let path = resolve_path(src, base_dir);
            match std::fs::read(&path) {
                Ok(bytes) => {
                    let mime = mime_for(&path);
                    format!("{}data:{};base64,{}{}", &caps[1], mime, BASE64.encode(bytes), &caps[3])
                }
                Err(e) => {
                    warn!("Cannot inline image {}: {e}", path.display());
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

fn mime_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("svg") => "image/svg+xml".to_string(),
        Some("jpg" | "jpeg") => "image/jpeg".to_string(),
        Some(ext) => format!("image/{}", ext.to_ascii_lowercase()),
        None => "application/octet-stream".to_string(),
    }
}

// ── Rule 3: link absolutization ──────────────────────────────────────────

static RE_URL_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"((?:href|src)=")([^"]+)(")"#).unwrap());

// Mirrors encodeURIComponent for the characters that matter inside a
// path segment; `/` is the separator and never appears inside one.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'%');

/// Rewrite relative `href`/`src` references to absolute `file://` URLs
/// with each path segment percent-encoded. Absolute schemes, anchors and
/// data URIs pass through.
pub fn absolutize_links(html: &str, base_dir: &Path) -> String {
    RE_URL_ATTR
        .replace_all(html, |caps: &Captures<'_>| {
            let url = &caps[2];
            if has_scheme(url) || url.starts_with('#') {
                return caps[0].to_string();
            }
            let path = resolve_path(url, base_dir);
            format!("{}{}{}", &caps[1], file_url(&path), &caps[3])
        })
        .into_owned()
}

fn file_url(path: &Path) -> String {
    let encoded: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => {
                Some(utf8_percent_encode(&part.to_string_lossy(), SEGMENT).to_string())
            }
            _ => None,
        })
        .collect();
    format!("file:///{}", encoded.join("/"))
}

fn resolve_path(url: &str, base_dir: &Path) -> PathBuf {
    if url.starts_with('/') {
        PathBuf::from(url)
    } else {
        base_dir.join(url)
    }
}

fn has_scheme(url: &str) -> bool {
    url.starts_with("http://")
        || url.starts_with("https://")
        || url.starts_with("data:")
        || url.starts_with("file:")
        || url.starts_with("mailto:")
}

// ── Rule 4: script injection ─────────────────────────────────────────────

/// Embed a script at the end of the body. A document without a `</body>`
/// tag gets the script appended.
pub fn inject_script(html: &str, js: &str) -> String {
    let script = format!("<script>\n{js}\n</script>\n");
    match html.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..pos]);
            out.push_str(&script);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}{script}"),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn legal_marker_classes_the_following_blockquote() {
        let html = "<!-- [[legal]] -->\n<blockquote>\n<p>§1 Terms.</p>\n</blockquote>";
        let out = mark_legal_excerpts(html);
        assert!(out.contains(r#"<blockquote class="legal-excerpt">"#));
        assert!(!out.contains("[[legal]]"));
    }

    #[test]
    fn legal_marker_without_blockquote_is_untouched() {
        let html = "<!-- [[legal]] -->\n<p>not a quote</p>";
        assert_eq!(mark_legal_excerpts(html), html);
    }

    #[test]
    fn local_image_becomes_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), b"fakepng").unwrap();

        let html = r#"<img alt="logo" src="logo.png">"#;
        let out = inline_local_images(html, dir.path());
        assert!(out.contains("data:image/png;base64,"));
        assert!(out.contains(&BASE64.encode(b"fakepng")));
    }

    #[test]
    fn image_inlining_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.svg"), b"<svg/>").unwrap();

        let once = inline_local_images(r#"<img src="logo.svg">"#, dir.path());
        assert!(once.contains("data:image/svg+xml;base64,"));
        let twice = inline_local_images(&once, dir.path());
        assert_eq!(once, twice);
    }

    #[test]
    fn remote_and_missing_images_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let html = r#"<img src="https://x.com/a.png"><img src="gone.png">"#;
        assert_eq!(inline_local_images(html, dir.path()), html);
    }

    #[test]
    fn relative_links_become_file_urls_with_encoded_segments() {
        let out = absolutize_links(
            r#"<a href="my docs/guide.md">g</a>"#,
            Path::new("/home/me/project"),
        );
        assert_eq!(
            out,
            r#"<a href="file:///home/me/project/my%20docs/guide.md">g</a>"#
        );
    }

    #[test]
    fn absolute_schemes_and_anchors_pass_through() {
        let html = r##"<a href="https://x.com/">x</a><a href="#section">s</a><img src="data:image/png;base64,AA==">"##;
        assert_eq!(absolutize_links(html, Path::new("/base")), html);
    }

    #[test]
    fn rooted_paths_are_not_rejoined_to_the_base() {
        let out = absolutize_links(r#"<link href="/tmp/t/main.css">"#, Path::new("/base"));
        assert_eq!(out, r#"<link href="file:///tmp/t/main.css">"#);
    }

    #[test]
    fn script_lands_before_the_body_close() {
        let out = inject_script("<body>\n<p>x</p>\n</body>", "console.log(1);");
        let script = out.find("<script>").unwrap();
        let close = out.find("</body>").unwrap();
        assert!(script < close);
        assert!(out.contains("console.log(1);"));
    }

    #[test]
    fn script_is_appended_without_a_body_tag() {
        let out = inject_script("<p>x</p>", "f();");
        assert!(out.ends_with("</script>\n"));
    }
}
