//! Binary PDF assembly: title-page prepend, page labels, A4 page boxes.
//!
//! The browser hands back two independent PDFs (body and title page),
//! each with its own object table. Stitching them together means deep
//! copying the title page's object graph into the body document with
//! every indirect reference remapped, then splicing the page into the
//! page tree. Page-label and page-box surgery operate on the merged
//! document, so the final bytes are serialized exactly once.

use crate::error::MdpressError;
use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};
use std::collections::HashMap;
use tracing::debug;

/// PDF user-space points per millimetre.
pub const MM_TO_PT: f64 = 2.83465;
/// A4 portrait, in points.
pub const A4_WIDTH_PT: f64 = 210.0 * MM_TO_PT;
pub const A4_HEIGHT_PT: f64 = 297.0 * MM_TO_PT;

/// Parse rendered PDF bytes into a mutable document.
pub fn load_pdf(bytes: &[u8]) -> Result<Document, MdpressError> {
    Ok(Document::load_mem(bytes)?)
}

/// Serialize the assembled document.
pub fn save_pdf(doc: &mut Document) -> Result<Vec<u8>, MdpressError> {
    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(lopdf::Error::from)?;
    Ok(out)
}

/// Deep copy of one document's objects into another, with reference
/// remapping and cycle protection.
struct PageImporter<'a> {
    source: &'a Document,
    target: &'a mut Document,
    imported: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageImporter<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        Self {
            source,
            target,
            imported: HashMap::new(),
        }
    }

    /// Import `source_id` and everything it references, returning its id
    /// in the target document.
    ///
    /// The page tree is cyclic (Page → Parent → Kids → Page), so the
    /// target slot is reserved with a placeholder and registered in the
    /// map *before* descending into the object's references.
    fn import(&mut self, source_id: ObjectId) -> Result<ObjectId, lopdf::Error> {
        if let Some(&target_id) = self.imported.get(&source_id) {
            return Ok(target_id);
        }
        let target_id = self.target.add_object(Object::Null);
        self.imported.insert(source_id, target_id);

        let imported = self.rewrite(self.source.get_object(source_id)?.clone())?;
        match self.target.objects.get_mut(&target_id) {
            Some(slot) => *slot = imported,
            None => return Err(lopdf::Error::ObjectNotFound(target_id)),
        }
        Ok(target_id)
    }

    /// Replace every indirect reference inside `obj` with its imported
    /// counterpart.
    fn rewrite(&mut self, obj: Object) -> Result<Object, lopdf::Error> {
        Ok(match obj {
            Object::Reference(id) => Object::Reference(self.import(id)?),
            Object::Array(items) => Object::Array(
                items
                    .into_iter()
                    .map(|item| self.rewrite(item))
                    .collect::<Result<_, _>>()?,
            ),
            Object::Dictionary(mut dict) => {
                for (_, value) in dict.iter_mut() {
                    *value = self.rewrite(value.clone())?;
                }
                Object::Dictionary(dict)
            }
            Object::Stream(mut stream) => {
                for (_, value) in stream.dict.iter_mut() {
                    *value = self.rewrite(value.clone())?;
                }
                Object::Stream(stream)
            }
            primitive => primitive,
        })
    }
}

/// Splice the pages of `title` (normally exactly one) in front of the
/// pages of `doc`. Annotations and resources travel with the copied
/// pages; existing page content is untouched.
pub fn prepend_title_page(doc: &mut Document, title: &Document) -> Result<(), MdpressError> {
    let title_pages = title.get_pages();
    if title_pages.is_empty() {
        return Ok(());
    }

    let mut importer = PageImporter::new(title, doc);
    // BTreeMap iteration keeps the source page order.
    let mut new_page_ids = Vec::with_capacity(title_pages.len());
    for (_, page_id) in title_pages {
        new_page_ids.push(importer.import(page_id)?);
    }

    let pages_id = page_tree_id(doc)?;
    let pages = doc.get_object_mut(pages_id)?.as_dict_mut()?;

    let mut kids: Vec<Object> = new_page_ids.iter().map(|&id| Object::Reference(id)).collect();
    kids.extend(pages.get(b"Kids")?.as_array()?.clone());
    let count = pages.get(b"Count")?.as_i64()?;
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", count + new_page_ids.len() as i64);

    for page_id in &new_page_ids {
        if let Ok(page) = doc.get_object_mut(*page_id).and_then(Object::as_dict_mut) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }
    debug!("Prepended {} title page(s)", new_page_ids.len());
    Ok(())
}

/// Rewrite the document's page labels so viewers show "Title" for the
/// cover and restart body numbering at 1. Without a title page the
/// labels simply enumerate 1..N.
pub fn reset_page_labels(doc: &mut Document, with_title: bool) -> Result<(), MdpressError> {
    let page_count = doc.get_pages().len();

    let mut nums: Vec<Object> = Vec::with_capacity(page_count * 2);
    for index in 0..page_count {
        let label = match (with_title, index) {
            (true, 0) => "Title".to_string(),
            (true, i) => i.to_string(),
            (false, i) => (i + 1).to_string(),
        };
        nums.push(Object::Integer(index as i64));
        nums.push(Object::Dictionary(dictionary! {
            "P" => Object::String(label.into_bytes(), StringFormat::Literal),
        }));
    }

    let labels_id = doc.add_object(dictionary! { "Nums" => Object::Array(nums) });
    let catalog_id = catalog_id(doc)?;
    let catalog = doc.get_object_mut(catalog_id)?.as_dict_mut()?;
    catalog.set("PageLabels", Object::Reference(labels_id));
    Ok(())
}

/// Force every page to A4.
///
/// An oversized page first gets a centred `CropBox` cut out of its
/// original media box, so the visible window lands in the middle of the
/// rendered content. All four remaining boxes are then pinned to A4
/// unconditionally.
pub fn crop_to_a4(doc: &mut Document) -> Result<(), MdpressError> {
    let a4 = rect(0.0, 0.0, A4_WIDTH_PT, A4_HEIGHT_PT);
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();

    for page_id in page_ids {
        let (width, height) = page_size(doc, page_id)?;
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;

        if width > A4_WIDTH_PT || height > A4_HEIGHT_PT {
            let x = (width - A4_WIDTH_PT) / 2.0;
            let y = (height - A4_HEIGHT_PT) / 2.0;
            page.set("CropBox", rect(x, y, x + A4_WIDTH_PT, y + A4_HEIGHT_PT));
        } else {
            debug!("Page already fits A4: {width:.1}x{height:.1}");
        }

        page.set("MediaBox", a4.clone());
        page.set("BleedBox", a4.clone());
        page.set("TrimBox", a4.clone());
        page.set("ArtBox", a4.clone());
    }
    Ok(())
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Object {
    Object::Array(vec![
        Object::Real(x0 as f32),
        Object::Real(y0 as f32),
        Object::Real(x1 as f32),
        Object::Real(y1 as f32),
    ])
}

fn catalog_id(doc: &Document) -> Result<ObjectId, MdpressError> {
    Ok(doc.trailer.get(b"Root")?.as_reference()?)
}

fn page_tree_id(doc: &Document) -> Result<ObjectId, MdpressError> {
    let catalog_id = catalog_id(doc)?;
    let catalog = doc.get_object(catalog_id)?.as_dict()?;
    Ok(catalog.get(b"Pages")?.as_reference()?)
}

/// Current page extent, honouring a `MediaBox` inherited from the page
/// tree.
fn page_size(doc: &Document, page_id: ObjectId) -> Result<(f64, f64), MdpressError> {
    let mut node_id = page_id;
    loop {
        let node = doc.get_object(node_id)?.as_dict()?;
        if let Ok(media_box) = node.get(b"MediaBox") {
            let media_box = match media_box {
                Object::Reference(id) => doc.get_object(*id)?,
                direct => direct,
            };
            let coords = media_box.as_array()?;
            if coords.len() != 4 {
                return Err(MdpressError::Internal(format!(
                    "page {page_id:?} has a malformed MediaBox"
                )));
            }
            let x0 = number(&coords[0])?;
            let y0 = number(&coords[1])?;
            let x1 = number(&coords[2])?;
            let y1 = number(&coords[3])?;
            return Ok(((x1 - x0).abs(), (y1 - y0).abs()));
        }
        match node.get(b"Parent") {
            Ok(parent) => node_id = parent.as_reference()?,
            Err(_) => {
                return Err(MdpressError::Internal(format!(
                    "page {page_id:?} has no MediaBox anywhere in its tree"
                )))
            }
        }
    }
}

fn number(obj: &Object) -> Result<f64, MdpressError> {
    match obj {
        Object::Integer(v) => Ok(*v as f64),
        Object::Real(v) => Ok(f64::from(*v)),
        _ => Err(MdpressError::Internal(
            "page box coordinate is not a number".to_string(),
        )),
    }
}
