//! Test fixtures: small PDFs assembled with lopdf

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

struct TextSpec {
    x: f32,
    top: f32,
    size: f32,
    text: String,
}

struct FieldSpec {
    name: String,
    x: f32,
    top: f32,
    width: f32,
    height: f32,
    value: Option<String>,
}

struct PageSpec {
    width: f32,
    height: f32,
    texts: Vec<TextSpec>,
    fields: Vec<FieldSpec>,
}

/// Builds single-font PDFs with text at top-left coordinates and
/// optional AcroForm text fields
#[derive(Default)]
pub struct PdfBuilder {
    pages: Vec<PageSpec>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new page
    pub fn page(mut self, width: f32, height: f32) -> Self {
        self.pages.push(PageSpec {
            width,
            height,
            texts: Vec::new(),
            fields: Vec::new(),
        });
        self
    }

    /// Place text on the current page, `top` measured from the page top
    pub fn text(mut self, x: f32, top: f32, size: f32, text: &str) -> Self {
        self.current().texts.push(TextSpec {
            x,
            top,
            size,
            text: text.to_string(),
        });
        self
    }

    /// Add an interactive text field on the current page
    pub fn text_field(mut self, name: &str, x: f32, top: f32, width: f32, height: f32) -> Self {
        self.current().fields.push(FieldSpec {
            name: name.to_string(),
            x,
            top,
            width,
            height,
            value: None,
        });
        self
    }

    /// Add an interactive text field that already carries a value
    pub fn filled_text_field(mut self, name: &str, value: &str, x: f32, top: f32) -> Self {
        self.current().fields.push(FieldSpec {
            name: name.to_string(),
            x,
            top,
            width: 150.0,
            height: 18.0,
            value: Some(value.to_string()),
        });
        self
    }

    fn current(&mut self) -> &mut PageSpec {
        if self.pages.is_empty() {
            self.pages.push(PageSpec {
                width: 612.0,
                height: 792.0,
                texts: Vec::new(),
                fields: Vec::new(),
            });
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut page_refs: Vec<Object> = Vec::new();
        let mut field_refs: Vec<Object> = Vec::new();

        for spec in self.pages {
            let page_id: ObjectId = doc.new_object_id();

            let mut operations = Vec::new();
            for text in &spec.texts {
                let baseline = spec.height - text.top - text.size * 0.8;
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), Object::Real(text.size)]));
                operations.push(Operation::new(
                    "Td",
                    vec![Object::Real(text.x), Object::Real(baseline)],
                ));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(text.text.as_str())],
                ));
                operations.push(Operation::new("ET", vec![]));
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap_or_default(),
            ));

            let mut annots: Vec<Object> = Vec::new();
            for field in &spec.fields {
                let lly = spec.height - field.top - field.height;
                let mut widget = dictionary! {
                    "Type" => "Annot",
                    "Subtype" => "Widget",
                    "FT" => "Tx",
                    "T" => Object::string_literal(field.name.as_str()),
                    "Rect" => vec![
                        Object::Real(field.x),
                        Object::Real(lly),
                        Object::Real(field.x + field.width),
                        Object::Real(lly + field.height),
                    ],
                    "P" => page_id,
                    "F" => 4,
                    "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
                };
                if let Some(value) = &field.value {
                    widget.set("V", Object::string_literal(value.as_str()));
                }
                let widget_id = doc.add_object(widget);
                annots.push(widget_id.into());
                field_refs.push(widget_id.into());
            }

            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), Object::Real(spec.width), Object::Real(spec.height)],
                "Contents" => content_id,
                "Resources" => resources_id,
            };
            if !annots.is_empty() {
                page.set("Annots", annots);
            }
            doc.objects.insert(page_id, page.into());
            page_refs.push(page_id.into());
        }

        let count = page_refs.len() as i64;
        doc.objects.insert(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => page_refs,
                "Count" => count,
            }
            .into(),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if !field_refs.is_empty() {
            let acroform_id = doc.add_object(dictionary! {
                "Fields" => field_refs,
                "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
                "DR" => dictionary! { "Font" => dictionary! { "Helv" => font_id } },
            });
            catalog.set("AcroForm", acroform_id);
        }
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("in-memory save");
        out
    }
}

/// Decoded content of page `index` (0-based)
pub fn page_content(pdf: &[u8], index: usize) -> String {
    let doc = Document::load_mem(pdf).expect("valid pdf");
    let pages = doc.get_pages();
    let page_id = *pages.get(&(index as u32 + 1)).expect("page exists");
    String::from_utf8_lossy(&doc.get_page_content(page_id).expect("page content")).into_owned()
}
