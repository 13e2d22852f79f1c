//! AcroForm-mode output
//!
//! Sets each matched field's value, writes a fresh normal appearance for
//! its widgets and optionally flattens: widget appearances are painted
//! into the page content, widgets are dropped from `/Annots` and the
//! `/AcroForm` dictionary is removed.

use std::collections::{HashMap, HashSet};

use lopdf::content::Operation;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::acroform::{
    acroform_dict, da_font_size, encode_text_string, fields_of, page_indices, rect_array,
    resolve, InteractiveField, MAX_AUTO_FONT_SIZE,
};
use crate::document::{FillError, FillResult};
use crate::extract::FieldDescriptor;
use crate::template::TemplateBytes;

use super::content::{
    add_helvetica, add_page_resource, append_page_content, encode_win_ansi, fit_font_size, save,
    FONT_NAME,
};

/// Annotation flag: hidden
const FLAG_HIDDEN: i64 = 1 << 1;

/// Both copies the preview needs
#[derive(Debug, Clone)]
pub struct PreviewOutput {
    /// Filled but still interactive, kept for further editing and download
    pub editable: Vec<u8>,
    /// Filled and flattened, for display only
    pub display: Vec<u8>,
}

/// Fill interactive fields on a copy of the template
pub fn synthesize_acroform(
    template: &TemplateBytes,
    fields: &[FieldDescriptor],
    flatten: bool,
) -> FillResult<Vec<u8>> {
    let mut doc = Document::load_mem(&template.duplicate())?;
    fill_fields(&mut doc, fields)?;
    if flatten {
        flatten_form(&mut doc)?;
    }
    save(&mut doc)
}

/// Editable and flattened copies from one fill
pub fn preview_acroform(
    template: &TemplateBytes,
    fields: &[FieldDescriptor],
) -> FillResult<PreviewOutput> {
    let editable = synthesize_acroform(template, fields, false)?;
    let mut display = Document::load_mem(&editable)?;
    flatten_form(&mut display)?;
    Ok(PreviewOutput {
        editable,
        display: save(&mut display)?,
    })
}

/// Set `/V` and regenerate appearances for every field with a descriptor
fn fill_fields(doc: &mut Document, descriptors: &[FieldDescriptor]) -> FillResult<()> {
    let values: HashMap<&str, &str> = descriptors
        .iter()
        .filter_map(|d| Some((d.interactive_name()?, d.current_value.as_str())))
        .collect();
    let interactive = fields_of(doc);
    let font_id = add_helvetica(doc);
    let mut filled = 0usize;

    for field in interactive.iter().filter(|f| f.kind.is_fillable()) {
        let Some(value) = values.get(field.name.as_str()) else {
            continue;
        };
        if let Ok(dict) = doc.get_object_mut(field.id).and_then(Object::as_dict_mut) {
            dict.set("V", encode_text_string(value));
        }
        for widget in &field.widgets {
            let appearance =
                appearance_stream(field, widget.rect.width, widget.rect.height, value, font_id)?;
            let appearance_id = doc.add_object(appearance);
            if let Ok(dict) = doc.get_object_mut(widget.id).and_then(Object::as_dict_mut) {
                dict.set("AP", dictionary! { "N" => appearance_id });
            }
        }
        filled += 1;
    }

    // Appearances are now present; viewers need not regenerate them
    if let Some(acroform_id) = acroform_reference(doc) {
        if let Ok(dict) = doc.get_object_mut(acroform_id).and_then(Object::as_dict_mut) {
            dict.remove(b"NeedAppearances");
        }
    }

    tracing::debug!(filled, "Interactive fields filled");
    Ok(())
}

fn appearance_stream(
    field: &InteractiveField,
    width: f32,
    height: f32,
    value: &str,
    font_id: ObjectId,
) -> FillResult<Stream> {
    let preferred = field
        .default_appearance
        .as_deref()
        .and_then(da_font_size)
        .unwrap_or_else(|| (height * 0.7).min(MAX_AUTO_FONT_SIZE));
    let size = fit_font_size(value, width - 4.0, preferred);
    let baseline = ((height - size) / 2.0 + size * 0.22).max(1.0);

    let mut operations = vec![Operation::new("BMC", vec![Object::Name(b"Tx".to_vec())])];
    if !value.is_empty() {
        operations.extend([
            Operation::new("q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(FONT_NAME.into()), Object::Real(size as _)]),
            Operation::new("g", vec![Object::Real(0.0)]),
            Operation::new("Td", vec![Object::Real(2.0), Object::Real(baseline as _)]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(value), lopdf::StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }
    operations.push(Operation::new("EMC", vec![]));

    let content = lopdf::content::Content { operations };
    let bytes = content
        .encode()
        .map_err(|e| FillError::Synthesis(format!("appearance encoding: {}", e)))?;
    Ok(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), Object::Real(width as _), Object::Real(height as _)],
            "Resources" => dictionary! {
                "Font" => dictionary! { FONT_NAME => font_id },
            },
        },
        bytes,
    ))
}

fn catalog_id(doc: &Document) -> Option<ObjectId> {
    doc.trailer.get(b"Root").ok()?.as_reference().ok()
}

fn acroform_reference(doc: &Document) -> Option<ObjectId> {
    let catalog = doc.get_object(catalog_id(doc)?).ok()?.as_dict().ok()?;
    catalog.get(b"AcroForm").ok()?.as_reference().ok()
}

/// Paint widget appearances into page content and drop interactivity
pub fn flatten_form(doc: &mut Document) -> FillResult<()> {
    if acroform_dict(doc).is_none() {
        return Ok(());
    }

    let widget_ids: HashSet<ObjectId> = fields_of(doc)
        .iter()
        .flat_map(|f| f.widgets.iter().map(|w| w.id))
        .collect();
    let pages: Vec<ObjectId> = {
        let mut indexed: Vec<(ObjectId, usize)> = page_indices(doc).into_iter().collect();
        indexed.sort_by_key(|(_, index)| *index);
        indexed.into_iter().map(|(id, _)| id).collect()
    };

    let mut counter = 0usize;
    for page_id in pages {
        let annots: Vec<Object> = {
            let page = doc.get_object(page_id)?.as_dict()?;
            match page.get(b"Annots").map(|a| resolve(doc, a)) {
                Ok(Object::Array(items)) => items.clone(),
                _ => continue,
            }
        };

        let mut kept = Vec::with_capacity(annots.len());
        let mut operations = Vec::new();
        for annot in annots {
            let Ok(id) = annot.as_reference() else {
                kept.push(annot);
                continue;
            };
            if !widget_ids.contains(&id) && !is_widget(doc, id) {
                kept.push(annot);
                continue;
            }
            if let Some((appearance_id, ops)) = paint_widget(doc, id, counter) {
                add_page_resource(doc, page_id, "XObject", &format!("AfFlat{}", counter), appearance_id)?;
                operations.extend(ops);
                counter += 1;
            }
        }

        if !operations.is_empty() {
            append_page_content(doc, page_id, operations)?;
        }
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        if kept.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(kept));
        }
    }

    if let Some(catalog) = catalog_id(doc) {
        let catalog = doc.get_object_mut(catalog)?.as_dict_mut()?;
        catalog.remove(b"AcroForm");
    }

    tracing::debug!(painted = counter, "Form flattened");
    Ok(())
}

fn is_widget(doc: &Document, id: ObjectId) -> bool {
    doc.get_object(id)
        .and_then(Object::as_dict)
        .and_then(|d| d.get(b"Subtype"))
        .and_then(Object::as_name)
        .map(|n| n == b"Widget")
        .unwrap_or(false)
}

/// Operations that paint one widget's normal appearance
fn paint_widget(doc: &mut Document, widget_id: ObjectId, counter: usize) -> Option<(ObjectId, Vec<Operation>)> {
    let (appearance_id, rect, bbox) = {
        let widget = doc.get_object(widget_id).ok()?.as_dict().ok()?;
        let flags = widget.get(b"F").ok().and_then(|f| f.as_i64().ok()).unwrap_or(0);
        if flags & FLAG_HIDDEN != 0 {
            return None;
        }
        let rect = rect_array(doc, widget.get(b"Rect").ok()?)?;

        let normal = resolve(doc, widget.get(b"AP").ok()?).as_dict().ok()?.get(b"N").ok()?;
        // A state dictionary (check boxes) is keyed by /AS
        let appearance_id = match resolve(doc, normal) {
            Object::Stream(_) => normal.as_reference().ok()?,
            Object::Dictionary(states) => {
                let state = widget.get(b"AS").ok()?.as_name().ok()?;
                states.get(state).ok()?.as_reference().ok()?
            }
            _ => return None,
        };
        let stream = doc.get_object(appearance_id).ok()?.as_stream().ok()?;
        let bbox = stream
            .dict
            .get(b"BBox")
            .ok()
            .and_then(|b| rect_array(doc, b))
            .unwrap_or([0.0, 0.0, rect[2] - rect[0], rect[3] - rect[1]]);
        (appearance_id, rect, bbox)
    };

    if let Ok(Object::Stream(stream)) = doc.get_object_mut(appearance_id) {
        stream.dict.set("Type", "XObject");
        stream.dict.set("Subtype", "Form");
    }

    let bbox_width = (bbox[2] - bbox[0]).max(f32::EPSILON);
    let bbox_height = (bbox[3] - bbox[1]).max(f32::EPSILON);
    let sx = (rect[2] - rect[0]) / bbox_width;
    let sy = (rect[3] - rect[1]) / bbox_height;
    let tx = rect[0] - bbox[0] * sx;
    let ty = rect[1] - bbox[1] * sy;

    let ops = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(sx as _),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(sy as _),
                Object::Real(tx as _),
                Object::Real(ty as _),
            ],
        ),
        Operation::new("Do", vec![Object::Name(format!("AfFlat{}", counter).into_bytes())]),
        Operation::new("Q", vec![]),
    ];
    Some((appearance_id, ops))
}

#[cfg(test)]
fn annotation_count(doc: &Document, page_id: ObjectId) -> usize {
    doc.get_object(page_id)
        .and_then(Object::as_dict)
        .and_then(|p| p.get(b"Annots"))
        .map(|a| resolve(doc, a))
        .and_then(Object::as_array)
        .map(|a| a.len())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acroform::read_interactive_fields;
    use crate::document::Rect;
    use crate::extract::FieldOrigin;
    use crate::test_support::{page_content, PdfBuilder};

    fn descriptor(name: &str, value: &str) -> FieldDescriptor {
        FieldDescriptor {
            id: format!("field_{}", name),
            page: 0,
            origin: FieldOrigin::Interactive { name: name.into() },
            anchor_x: 0.0,
            anchor_y: 0.0,
            line_y: 0.0,
            width: 100.0,
            height: 20.0,
            font_size_hint: 10.0,
            extent: Rect::new(0.0, 0.0, 100.0, 20.0),
            source_binding: None,
            current_value: value.into(),
        }
    }

    fn template() -> TemplateBytes {
        TemplateBytes::new(
            PdfBuilder::new()
                .page(612.0, 792.0)
                .text(40.0, 80.0, 12.0, "Mailing Address")
                .text_field("Mailing Address", 150.0, 80.0, 250.0, 20.0)
                .text_field("Signature", 150.0, 300.0, 250.0, 20.0)
                .build(),
        )
    }

    #[test]
    fn test_fill_keeps_form_editable() {
        let out = synthesize_acroform(
            &template(),
            &[descriptor("Mailing Address", "1 Main St")],
            false,
        )
        .unwrap();

        let fields = read_interactive_fields(&TemplateBytes::new(out)).unwrap();
        let address = fields.iter().find(|f| f.name == "Mailing Address").unwrap();
        assert_eq!(address.value.as_deref(), Some("1 Main St"));
        let signature = fields.iter().find(|f| f.name == "Signature").unwrap();
        assert_eq!(signature.value, None);
    }

    #[test]
    fn test_refill_is_idempotent() {
        let first = synthesize_acroform(&template(), &[descriptor("Mailing Address", "1 Main St")], false)
            .unwrap();
        let second = synthesize_acroform(
            &TemplateBytes::new(first),
            &[descriptor("Mailing Address", "1 Main St")],
            false,
        )
        .unwrap();

        let fields = read_interactive_fields(&TemplateBytes::new(second)).unwrap();
        assert_eq!(fields[0].value.as_deref(), Some("1 Main St"));
    }

    #[test]
    fn test_flatten_bakes_values() {
        let out = synthesize_acroform(
            &template(),
            &[descriptor("Mailing Address", "1 Main St")],
            true,
        )
        .unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        assert!(acroform_dict(&doc).is_none());
        assert_eq!(annotation_count(&doc, page_id), 0);

        let content = page_content(&out, 0);
        assert!(content.contains("/AfFlat0 Do"));
        assert!(read_interactive_fields(&TemplateBytes::new(out)).unwrap().is_empty());
    }

    #[test]
    fn test_preview_produces_both_copies() {
        let preview = preview_acroform(&template(), &[descriptor("Mailing Address", "1 Main St")]).unwrap();

        assert_eq!(read_interactive_fields(&TemplateBytes::new(preview.editable)).unwrap().len(), 2);
        assert!(read_interactive_fields(&TemplateBytes::new(preview.display)).unwrap().is_empty());
    }

    #[test]
    fn test_appearance_stream_shows_value() {
        let doc = Document::load_mem(&template().duplicate()).unwrap();
        let fields = fields_of(&doc);
        let address = fields.iter().find(|f| f.name == "Mailing Address").unwrap();

        let stream = appearance_stream(address, 250.0, 20.0, "1 Main St", (99, 0)).unwrap();
        let content = String::from_utf8_lossy(&stream.content);
        assert!(content.contains("(1 Main St) Tj"));
        assert!(content.trim_end().ends_with("EMC"));

        let blank = appearance_stream(address, 250.0, 20.0, "", (99, 0)).unwrap();
        assert!(!String::from_utf8_lossy(&blank.content).contains("Tj"));
    }

    #[test]
    fn test_da_font_size() {
        assert_eq!(da_font_size("/Helv 11 Tf 0 g"), Some(11.0));
        assert_eq!(da_font_size("/Helv 0 Tf 0 g"), None);
        assert_eq!(da_font_size("0 g"), None);
    }
}
