//! Interactive form fields
//!
//! Reads the `/AcroForm` field tree with lopdf: terminal fields with their
//! fully qualified names, inherited types, current values and widget
//! placements. Widget rectangles are converted to top-left content units so
//! they line up with the MuPDF text layer.

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::document::{FillResult, Rect};
use crate::extract::{FieldDescriptor, FieldOrigin};
use crate::record::SourceRecord;
use crate::resolver::FieldResolver;
use crate::template::TemplateBytes;

/// Auto-sized text never grows past this
pub(crate) const MAX_AUTO_FONT_SIZE: f32 = 12.0;

/// Field type from `/FT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Button,
    Choice,
    Signature,
    Unknown,
}

impl FieldKind {
    fn from_name(name: &[u8]) -> Self {
        match name {
            b"Tx" => Self::Text,
            b"Btn" => Self::Button,
            b"Ch" => Self::Choice,
            b"Sig" => Self::Signature,
            _ => Self::Unknown,
        }
    }

    /// Kinds the engine can fill with a text value
    pub fn is_fillable(&self) -> bool {
        matches!(self, Self::Text | Self::Choice)
    }
}

/// One widget annotation of a field
#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: ObjectId,
    /// Page index (0-based), when the widget could be placed
    pub page: Option<usize>,
    /// Top-left rectangle in content units
    pub rect: Rect,
}

/// A terminal interactive field
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveField {
    pub id: ObjectId,
    /// Fully qualified name, `parent.child`
    pub name: String,
    pub kind: FieldKind,
    pub value: Option<String>,
    /// Default appearance string, possibly inherited
    pub default_appearance: Option<String>,
    pub widgets: Vec<Widget>,
}

impl InteractiveField {
    /// Font size requested by `/DA`, `None` for auto size
    pub fn font_size(&self) -> Option<f32> {
        self.default_appearance.as_deref().and_then(da_font_size)
    }
}

/// Read every terminal field of a template
pub fn read_interactive_fields(bytes: &TemplateBytes) -> FillResult<Vec<InteractiveField>> {
    let doc = Document::load_mem(&bytes.duplicate())?;
    Ok(fields_of(&doc))
}

/// Editable descriptors for every fillable field with a placed widget
///
/// A field bound to the record starts from the record's value; an unbound
/// one keeps whatever the template already holds. Geometry comes from the
/// first placed widget.
pub fn field_descriptors(
    fields: &[InteractiveField],
    resolver: &FieldResolver,
    record: &SourceRecord,
) -> Vec<FieldDescriptor> {
    fields
        .iter()
        .filter(|f| f.kind.is_fillable())
        .filter_map(|field| {
            let (page, rect) = field
                .widgets
                .iter()
                .find_map(|w| w.page.map(|page| (page, w.rect)))?;
            let binding = resolver.resolve_field_name(&field.name);
            let current_value = match &binding {
                Some(_) => resolver.value_for(binding.as_ref(), record),
                None => field.value.clone().unwrap_or_default(),
            };
            Some(FieldDescriptor {
                id: String::new(),
                page,
                origin: FieldOrigin::Interactive {
                    name: field.name.clone(),
                },
                anchor_x: rect.x,
                anchor_y: rect.y,
                line_y: rect.y,
                width: rect.width,
                height: rect.height,
                font_size_hint: field
                    .font_size()
                    .unwrap_or_else(|| (rect.height * 0.7).min(MAX_AUTO_FONT_SIZE)),
                extent: rect,
                source_binding: binding,
                current_value,
            })
        })
        .enumerate()
        .map(|(i, mut descriptor)| {
            descriptor.id = format!("field_{}", i);
            descriptor
        })
        .collect()
}

/// Terminal fields of an already loaded document
pub fn fields_of(doc: &Document) -> Vec<InteractiveField> {
    let Some(acroform) = acroform_dict(doc) else {
        return Vec::new();
    };
    let Ok(roots) = acroform.get(b"Fields").and_then(|f| resolve(doc, f).as_array()) else {
        return Vec::new();
    };

    let page_index = page_indices(doc);
    let widget_pages = widget_page_map(doc, &page_index);
    let inherited = Inherited {
        kind: None,
        default_appearance: acroform.get(b"DA").ok().and_then(text_string),
    };

    let mut fields = Vec::new();
    let mut visited = HashSet::new();
    for root in roots {
        if let Ok(id) = root.as_reference() {
            walk(
                doc,
                id,
                "",
                &inherited,
                &page_index,
                &widget_pages,
                &mut visited,
                &mut fields,
            );
        }
    }
    fields
}

#[derive(Clone)]
struct Inherited {
    kind: Option<FieldKind>,
    default_appearance: Option<String>,
}

#[allow(clippy::too_many_arguments)]
fn walk(
    doc: &Document,
    id: ObjectId,
    parent_name: &str,
    inherited: &Inherited,
    page_index: &HashMap<ObjectId, usize>,
    widget_pages: &HashMap<ObjectId, usize>,
    visited: &mut HashSet<ObjectId>,
    out: &mut Vec<InteractiveField>,
) {
    if !visited.insert(id) {
        return;
    }
    let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
        return;
    };

    let partial = dict.get(b"T").ok().and_then(text_string);
    let name = match (&partial, parent_name.is_empty()) {
        (Some(t), true) => t.clone(),
        (Some(t), false) => format!("{}.{}", parent_name, t),
        (None, _) => parent_name.to_string(),
    };
    let here = Inherited {
        kind: dict
            .get(b"FT")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(FieldKind::from_name)
            .or(inherited.kind),
        default_appearance: dict
            .get(b"DA")
            .ok()
            .and_then(text_string)
            .or_else(|| inherited.default_appearance.clone()),
    };

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .ok()
        .and_then(|k| resolve(doc, k).as_array().ok())
        .map(|kids| kids.iter().filter_map(|k| k.as_reference().ok()).collect())
        .unwrap_or_default();

    // Kids carrying their own /T are fields; the rest are widgets
    let (child_fields, child_widgets): (Vec<ObjectId>, Vec<ObjectId>) =
        kids.into_iter().partition(|kid| {
            doc.get_object(*kid)
                .and_then(Object::as_dict)
                .map(|d| d.has(b"T"))
                .unwrap_or(false)
        });

    for child in child_fields {
        walk(doc, child, &name, &here, page_index, widget_pages, visited, out);
    }

    let mut widget_ids = child_widgets;
    if is_widget(dict) {
        widget_ids.insert(0, id);
    }
    if widget_ids.is_empty() && !dict.has(b"FT") && partial.is_none() {
        return;
    }
    if name.is_empty() {
        return;
    }
    // Pure containers have field kids and nothing else
    if widget_ids.is_empty() && dict.has(b"Kids") {
        return;
    }

    let widgets = widget_ids
        .into_iter()
        .filter_map(|wid| {
            let widget = doc.get_object(wid).and_then(Object::as_dict).ok()?;
            let page = widget
                .get(b"P")
                .ok()
                .and_then(|p| p.as_reference().ok())
                .and_then(|p| page_index.get(&p).copied())
                .or_else(|| widget_pages.get(&wid).copied());
            let rect = widget_rect(doc, widget, page, page_index)?;
            Some(Widget {
                id: wid,
                page,
                rect,
            })
        })
        .collect();

    out.push(InteractiveField {
        id,
        name,
        kind: here.kind.unwrap_or(FieldKind::Unknown),
        value: dict.get(b"V").ok().and_then(|v| text_string(resolve(doc, v))),
        default_appearance: here.default_appearance,
        widgets,
    });
}

fn is_widget(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .and_then(Object::as_name)
        .map(|n| n == b"Widget")
        .unwrap_or(false)
}

/// The catalog's `/AcroForm`, direct or referenced
pub(crate) fn acroform_dict(doc: &Document) -> Option<&Dictionary> {
    let root = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    let catalog = doc.get_object(root).ok()?.as_dict().ok()?;
    let acroform = catalog.get(b"AcroForm").ok()?;
    resolve(doc, acroform).as_dict().ok()
}

/// Follow one level of indirection
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Page object id -> 0-based index
pub(crate) fn page_indices(doc: &Document) -> HashMap<ObjectId, usize> {
    doc.get_pages()
        .into_iter()
        .map(|(number, id)| (id, number.saturating_sub(1) as usize))
        .collect()
}

/// Widget id -> page index, from the pages' `/Annots`
fn widget_page_map(doc: &Document, page_index: &HashMap<ObjectId, usize>) -> HashMap<ObjectId, usize> {
    let mut map = HashMap::new();
    for (page_id, index) in page_index {
        let Ok(page) = doc.get_object(*page_id).and_then(Object::as_dict) else {
            continue;
        };
        let Ok(annots) = page.get(b"Annots").map(|a| resolve(doc, a)).and_then(Object::as_array) else {
            continue;
        };
        for annot in annots {
            if let Ok(id) = annot.as_reference() {
                map.insert(id, *index);
            }
        }
    }
    map
}

/// Number from an Integer or Real object
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Four numbers as `[llx lly urx ury]`, normalized
pub(crate) fn rect_array(doc: &Document, obj: &Object) -> Option<[f32; 4]> {
    let values: Vec<f32> = resolve(doc, obj)
        .as_array()
        .ok()?
        .iter()
        .filter_map(|o| number(resolve(doc, o)))
        .collect();
    if values.len() != 4 {
        return None;
    }
    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

/// Inheritable page attribute, nearest ancestor first
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    let mut depth = 0;
    while let Some(id) = current {
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok());
        depth += 1;
        if depth > 32 {
            break;
        }
    }
    None
}

/// Visible box of a page: `/CropBox`, else `/MediaBox`, both inheritable
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited(doc, page_id, b"CropBox")
        .and_then(|o| rect_array(doc, o))
        .or_else(|| inherited(doc, page_id, b"MediaBox").and_then(|o| rect_array(doc, o)))
        .unwrap_or([0.0, 0.0, 612.0, 792.0])
}

/// Page `/Rotate` in degrees: 0, 90, 180 or 270
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> u16 {
    let degrees = inherited(doc, page_id, b"Rotate")
        .and_then(|o| number(resolve(doc, o)))
        .map(|d| d.round() as i64)
        .unwrap_or(0)
        .rem_euclid(360);
    match degrees {
        90 => 90,
        180 => 180,
        270 => 270,
        _ => 0,
    }
}

/// Maps between PDF user space and the rotated, top-left view space the
/// text layer reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageGeometry {
    /// `[llx lly urx ury]` of the visible box
    pub bbox: [f32; 4],
    pub rotation: u16,
}

impl PageGeometry {
    pub fn of(doc: &Document, page_id: ObjectId) -> Self {
        Self {
            bbox: page_box(doc, page_id),
            rotation: page_rotation(doc, page_id),
        }
    }

    pub fn to_pdf(&self, x: f32, y: f32) -> (f32, f32) {
        let [x0, y0, x1, y1] = self.bbox;
        match self.rotation {
            90 => (x0 + y, y0 + x),
            180 => (x1 - x, y0 + y),
            270 => (x1 - y, y1 - x),
            _ => (x0 + x, y1 - y),
        }
    }

    pub fn to_view(&self, px: f32, py: f32) -> (f32, f32) {
        let [x0, y0, x1, y1] = self.bbox;
        match self.rotation {
            90 => (py - y0, px - x0),
            180 => (x1 - px, py - y0),
            270 => (y1 - py, x1 - px),
            _ => (px - x0, y1 - py),
        }
    }

    /// View rectangle as `[x y width height]` in PDF user space
    pub fn rect_to_pdf(&self, rect: Rect) -> [f32; 4] {
        let (ax, ay) = self.to_pdf(rect.x, rect.y);
        let (bx, by) = self.to_pdf(rect.right(), rect.bottom());
        [ax.min(bx), ay.min(by), (ax - bx).abs(), (ay - by).abs()]
    }

    /// `[llx lly urx ury]` in PDF user space as a view rectangle
    pub fn rect_to_view(&self, rect: [f32; 4]) -> Rect {
        let (ax, ay) = self.to_view(rect[0], rect[1]);
        let (bx, by) = self.to_view(rect[2], rect[3]);
        Rect::new(ax.min(bx), ay.min(by), (ax - bx).abs(), (ay - by).abs())
    }

    /// Text matrix drawing upright (in view) text with its baseline
    /// origin at view point `(x, y)`
    pub fn text_matrix(&self, x: f32, y: f32) -> [f32; 6] {
        let (ox, oy) = self.to_pdf(x, y);
        let (rx, ry) = self.to_pdf(x + 1.0, y);
        let (ux, uy) = self.to_pdf(x, y - 1.0);
        [rx - ox, ry - oy, ux - ox, uy - oy, ox, oy]
    }
}

fn widget_rect(
    doc: &Document,
    widget: &Dictionary,
    page: Option<usize>,
    page_index: &HashMap<ObjectId, usize>,
) -> Option<Rect> {
    let rect = rect_array(doc, widget.get(b"Rect").ok()?)?;
    let page_id = page.and_then(|p| page_index.iter().find(|(_, i)| **i == p).map(|(id, _)| *id));
    let geometry = match page_id {
        Some(id) => PageGeometry::of(doc, id),
        None => PageGeometry {
            bbox: [0.0, 0.0, 612.0, 792.0],
            rotation: 0,
        },
    };
    Some(geometry.rect_to_view(rect))
}

/// Decode a PDF text string (UTF-16BE with BOM, UTF-8 with BOM, else
/// PDFDocEncoding approximated as Latin-1)
pub(crate) fn text_string(obj: &Object) -> Option<String> {
    let bytes = match obj {
        Object::String(bytes, _) => bytes.as_slice(),
        Object::Name(name) => name.as_slice(),
        _ => return None,
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return Some(String::from_utf8_lossy(utf8).into_owned());
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}

/// Encode a text string: Latin-1 when possible, else UTF-16BE with BOM
pub(crate) fn encode_text_string(value: &str) -> Object {
    if value.chars().all(|c| (c as u32) < 0x100) {
        let bytes: Vec<u8> = value.chars().map(|c| c as u32 as u8).collect();
        return Object::String(bytes, lopdf::StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, lopdf::StringFormat::Hexadecimal)
}

/// Font size from a `/DA` string, `None` when it asks for auto size
pub(crate) fn da_font_size(da: &str) -> Option<f32> {
    let tokens: Vec<&str> = da.split_whitespace().collect();
    let tf = tokens.iter().position(|t| *t == "Tf")?;
    let size: f32 = tokens.get(tf.checked_sub(1)?)?.parse().ok()?;
    (size > 0.0).then_some(size)
}
