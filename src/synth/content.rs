//! Page content and resource plumbing for lopdf documents

use lopdf::content::Operation;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::acroform::resolve;
use crate::document::{FillError, FillResult};

/// Resource name of the font drawn text uses
pub const FONT_NAME: &str = "AfHelv";

/// Add a standard Helvetica font object
pub fn add_helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Page resources as an owned dictionary, following inheritance
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok(resources) = resolve(doc, resources).as_dict() {
                return resources.clone();
            }
        }
        current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
        depth += 1;
        if depth > 32 {
            break;
        }
    }
    Dictionary::new()
}

/// Register `name -> target` under `category` (`Font`, `XObject`) in the
/// page's own resources
///
/// Resources are copied onto the page before editing, so dictionaries
/// shared with other pages are never touched.
pub fn add_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &str,
    name: &str,
    target: ObjectId,
) -> FillResult<()> {
    let mut resources = effective_resources(doc, page_id);
    let mut entries = resources
        .get(category.as_bytes())
        .ok()
        .and_then(|o| resolve(doc, o).as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    entries.set(name, Object::Reference(target));
    resources.set(category, Object::Dictionary(entries));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Draw `operations` on top of a page
///
/// The existing content is wrapped in `q ... Q` first so graphics state
/// it leaves behind cannot leak into the overlay.
pub fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> FillResult<()> {
    let content = lopdf::content::Content { operations };
    let bytes = content
        .encode()
        .map_err(|e| FillError::Synthesis(format!("content encoding: {}", e)))?;
    let overlay_id = doc.add_object(Stream::new(dictionary! {}, bytes));

    let existing: Vec<Object> = {
        let page = doc.get_object(page_id)?.as_dict()?;
        match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(_) | Err(_) => Vec::new(),
        }
    };

    let contents = if existing.is_empty() {
        vec![Object::Reference(overlay_id)]
    } else {
        let save = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let restore = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
        let mut contents = Vec::with_capacity(existing.len() + 3);
        contents.push(Object::Reference(save));
        contents.extend(existing);
        contents.push(Object::Reference(restore));
        contents.push(Object::Reference(overlay_id));
        contents
    };

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

/// Encode text for a WinAnsi font; characters it lacks become `?`
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            '\t' => b' ',
            _ => b'?',
        })
        .collect()
}

/// Rough Helvetica advance width, in text space units per point
const AVERAGE_GLYPH_WIDTH: f32 = 0.52;

/// Font size that fits `text` into `width`, never above `preferred`
pub fn fit_font_size(text: &str, width: f32, preferred: f32) -> f32 {
    let chars = text.chars().count() as f32;
    if chars == 0.0 || width <= 0.0 {
        return preferred;
    }
    let fitting = width / (chars * AVERAGE_GLYPH_WIDTH);
    preferred.min(fitting).max(preferred.min(6.0))
}

/// `BT /AfHelv size Tf 0 g a b c d e f Tm (text) Tj ET`
///
/// `matrix` places and orients the baseline origin; see
/// `PageGeometry::text_matrix`.
pub fn text_operations(text: &str, matrix: [f32; 6], size: f32) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(FONT_NAME.into()), Object::Real(size as _)]),
        Operation::new("g", vec![Object::Real(0.0)]),
        Operation::new("Tm", matrix.iter().map(|v| Object::Real(*v as _)).collect()),
        Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

/// Filled rectangle in gray level `gray` (1 = white)
pub fn filled_rect_operations(x: f32, y: f32, width: f32, height: f32, gray: f32) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("g", vec![Object::Real(gray as _)]),
        Operation::new(
            "re",
            vec![
                Object::Real(x as _),
                Object::Real(y as _),
                Object::Real(width as _),
                Object::Real(height as _),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Serialize a document
pub fn save(doc: &mut Document) -> FillResult<Vec<u8>> {
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}
