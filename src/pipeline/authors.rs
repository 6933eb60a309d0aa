//! Per-author record store: load, validate, and auto-create stubs.
//!
//! The store is process-external persistent state shared across documents:
//! one YAML file per author, keyed by a filesystem-safe id derived from
//! the email, plus an optional picture asset beside it. Resolving an
//! author either finds an existing record or creates a stub — the tagged
//! [`AuthorResolution`] makes that side effect explicit to callers, so
//! stub creation can stay advisory (a warning) while an existing record
//! with an empty bio is a hard validation error.

use crate::messages::MessageLog;
use crate::pipeline::metadata::{Author, PageMetadata};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_AUTHOR_TEMPLATE: &str = include_str!("../../assets/templates/author.yaml");

/// Picture extensions probed next to the record store, in order.
const PICTURE_EXTENSIONS: &[&str] = &["jpg", "png"];

/// Persisted biographical record for one document contributor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    /// Resolved at load time from the `pictures/` directory, never
    /// persisted.
    #[serde(skip)]
    pub picture_url: Option<PathBuf>,
}

/// Outcome of resolving one declared author against the store.
#[derive(Debug)]
pub enum AuthorResolution {
    /// An existing record was loaded (not yet validated).
    Found(AuthorRecord),
    /// No record existed; a stub was written at this path.
    CreatedStub(PathBuf),
    /// The record file exists but is not valid YAML.
    Malformed(String),
}

/// Handle on the on-disk author record store.
pub struct AuthorStore {
    directory: PathBuf,
    template: Option<PathBuf>,
}

impl AuthorStore {
    pub fn new(directory: PathBuf, template: Option<PathBuf>) -> Self {
        Self { directory, template }
    }

    /// Filesystem-safe record key: every non-alphanumeric character of
    /// the email becomes `_`.
    pub fn author_id(email: &str) -> String {
        email
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    pub fn record_path(&self, email: &str) -> PathBuf {
        self.directory.join(format!("{}.yaml", Self::author_id(email)))
    }

    /// Look for a picture asset beside the store.
    fn picture_path(&self, author_id: &str) -> Option<PathBuf> {
        let pictures = self.directory.join("pictures");
        PICTURE_EXTENSIONS
            .iter()
            .map(|ext| pictures.join(format!("{author_id}.{ext}")))
            .find(|p| p.exists())
    }

    /// Resolve one author: load the existing record, or synthesize a stub
    /// from the template and persist it.
    ///
    /// The store is append-only: records are created if missing and read
    /// thereafter, never deleted. Concurrent creation of the same record
    /// is last-writer-wins, which is acceptable because every stub has
    /// identical content.
    pub fn resolve(&self, author: &Author) -> std::io::Result<AuthorResolution> {
        let id = Self::author_id(&author.email);
        let path = self.record_path(&author.email);

        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            return Ok(match serde_yaml::from_str::<AuthorRecord>(&text) {
                Ok(mut record) => {
                    // Declared name/email win over whatever is in the file;
                    // the record only contributes biography and picture.
                    record.name = author.name.clone();
                    record.email = author.email.clone();
                    record.picture_url = self.picture_path(&id);
                    AuthorResolution::Found(record)
                }
                Err(e) => AuthorResolution::Malformed(e.to_string()),
            });
        }

        let template = match &self.template {
            Some(custom) => std::fs::read_to_string(custom)?,
            None => DEFAULT_AUTHOR_TEMPLATE.to_string(),
        };
        let stub = template
            .replace("{{email}}", &author.email)
            .replace("{{authorId}}", &id);

        std::fs::create_dir_all(&self.directory)?;
        std::fs::write(&path, stub)?;
        debug!("Created author stub {}", path.display());
        Ok(AuthorResolution::CreatedStub(path))
    }
}

/// Validate every declared author and attach the records that resolve.
///
/// Errors (blocking): a declared author missing name or email; an
/// *existing* record with a missing or empty bio. Warnings (advisory):
/// a freshly created stub — its empty bio only becomes an error on a
/// later run against the still-incomplete record.
pub fn enrich_authors(metadata: &mut PageMetadata, store: &AuthorStore, messages: &mut MessageLog) {
    let mut created: Vec<(String, PathBuf)> = Vec::new();
    let mut author_data = Vec::new();

    for author in &metadata.authors {
        if author.name.is_empty() {
            messages.error(format!("author \"{}\" is missing a \"name\"", author.email));
        }
        if author.email.is_empty() {
            messages.error(format!("author \"{}\" is missing an \"email\"", author.name));
            continue;
        }

        match store.resolve(author) {
            Ok(AuthorResolution::Found(record)) => {
                if record.bio.trim().is_empty() {
                    messages.error(format!("author \"{}\" is missing a \"bio\"", author.email));
                } else {
                    author_data.push(record);
                }
            }
            Ok(AuthorResolution::CreatedStub(path)) => {
                created.push((author.email.clone(), path));
            }
            Ok(AuthorResolution::Malformed(detail)) => {
                messages.error_with(
                    format!("author record for \"{}\" is not valid YAML", author.email),
                    vec![detail],
                );
            }
            Err(e) => {
                messages.error_with(
                    format!("cannot access the author store for \"{}\"", author.email),
                    vec![e.to_string()],
                );
            }
        }
    }

    if !created.is_empty() {
        for (email, path) in &created {
            messages.warning_with(
                format!("author metadata file not found for \"{email}\""),
                vec![format!("created author metadata file: {}", path.display())],
            );
        }
        messages.warning("please fill in the new author metadata before generating the final PDF");
    }

    metadata.author_data = author_data;
}

// ── "About the authors" injection ────────────────────────────────────────

/// Fallback avatar used when an author has no picture asset.
const FALLBACK_AVATAR: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round" stroke-linejoin="round" class="author-photo"><path d="M12 12c2.21 0 4-1.79 4-4s-1.79-4-4-4-4 1.79-4 4 1.79 4 4 4z"/><path d="M12 14c-5.33 0-8 2.67-8 8v2h16v-2c0-5.33-2.67-8-8-8z"/></svg>"#;

/// Sentinel replaced by the generated authors section.
pub const AUTHORS_MARKER: &str = "<!-- [[authors]] -->";

/// Replace the `<!-- [[authors]] -->` sentinel with a generated "About
/// the authors" block. No-op when the sentinel or the author data is
/// absent.
pub fn inject_authors(markdown: &str, metadata: &PageMetadata) -> String {
    if metadata.author_data.is_empty() || !markdown.contains(AUTHORS_MARKER) {
        return markdown.to_string();
    }
    markdown.replacen(AUTHORS_MARKER, &authors_block(metadata), 1)
}

fn authors_block(metadata: &PageMetadata) -> String {
    let blocks: Vec<String> = metadata
        .author_data
        .iter()
        .map(|record| {
            let picture = match &record.picture_url {
                Some(path) => format!(
                    r#"<img src="{}" alt="{}" class="author-photo" />"#,
                    path.display(),
                    record.name
                ),
                None => FALLBACK_AVATAR.to_string(),
            };
            format!(
                "<div class=\"author-block\">\n{picture}\n<div>\n<h4>{}</h4>\n<p>{}</p>\n\
                 <p><a href=\"mailto:{}\">{}</a></p>\n</div></div>",
                record.name, record.bio, record.email, record.email
            )
        })
        .collect();

    format!("\n## About the authors\n\n{}\n", blocks.join("\n"))
}
