//! Placeholder-mode output
//!
//! Works on a fresh duplicate of the template. Every detected token is
//! removed from the page content and masked, field values are drawn at
//! their anchors in content space and selected choices get a filled mark
//! sized from the token's font.

use lopdf::content::Operation;
use lopdf::Document;

use crate::acroform::PageGeometry;
use crate::document::{FillResult, Rect};
use crate::extract::{ChoiceGroup, ChoiceOption, FieldDescriptor};
use crate::template::TemplateBytes;

use super::content::{
    add_helvetica, add_page_resource, append_page_content, filled_rect_operations,
    fit_font_size, save, text_operations, FONT_NAME,
};
use super::strip::{strip_page_tokens, StripTargets};

/// Baseline offset below a glyph box top, as a fraction of font size
const BASELINE_RATIO: f32 = 0.8;
/// Choice mark edge, as a fraction of font size
const MARK_RATIO: f32 = 0.6;
/// Mask overdraw around token glyphs
const MASK_PAD: f32 = 0.5;

/// Draw fields and choices onto a copy of the template
pub fn synthesize_placeholder(
    template: &TemplateBytes,
    fields: &[FieldDescriptor],
    groups: &[ChoiceGroup],
) -> FillResult<Vec<u8>> {
    let mut doc = Document::load_mem(&template.duplicate())?;
    let pages = doc.get_pages();
    let font_id = add_helvetica(&mut doc);

    let options: Vec<&ChoiceOption> = groups.iter().flat_map(|g| g.options.iter()).collect();
    let mut drawn = 0usize;
    let mut stripped = 0usize;

    for (number, page_id) in pages {
        let index = number.saturating_sub(1) as usize;
        let page_fields: Vec<&FieldDescriptor> = fields.iter().filter(|f| f.page == index).collect();
        let page_options: Vec<&ChoiceOption> =
            options.iter().copied().filter(|o| o.page == index).collect();
        if page_fields.is_empty() && page_options.is_empty() {
            continue;
        }

        let targets = StripTargets {
            tokens: page_fields.iter().filter_map(|f| f.token()).collect(),
            choices: !page_options.is_empty(),
        };
        stripped += strip_page_tokens(&mut doc, page_id, &targets)?;

        // Positions are in the rotated view the text layer reports
        let geometry = PageGeometry::of(&doc, page_id);

        let mut operations: Vec<Operation> = Vec::new();

        // Masks cover whatever stripping could not reach; drawn first so
        // nothing drawn later is covered
        for extent in page_fields
            .iter()
            .map(|f| f.extent)
            .chain(page_options.iter().map(|o| o.extent))
        {
            let [x, y, width, height] = geometry.rect_to_pdf(extent);
            operations.extend(filled_rect_operations(
                x - MASK_PAD,
                y - MASK_PAD,
                width + 2.0 * MASK_PAD,
                height + 2.0 * MASK_PAD,
                1.0,
            ));
        }

        for field in page_fields.iter().filter(|f| f.has_value()) {
            let value = field.current_value.trim();
            let size = fit_font_size(value, field.width, field.font_size_hint);
            let baseline = field.anchor_y + field.font_size_hint * BASELINE_RATIO;
            let matrix = geometry.text_matrix(field.anchor_x, baseline);
            operations.extend(text_operations(value, matrix, size));
            drawn += 1;
        }

        for option in page_options.iter().filter(|o| o.selected) {
            let mark = option.font_size * MARK_RATIO;
            let top = option.y + (option.font_size - mark) / 2.0;
            let [x, y, width, height] = geometry.rect_to_pdf(Rect::new(option.x, top, mark, mark));
            operations.extend(filled_rect_operations(x, y, width, height, 0.0));
            drawn += 1;
        }

        add_page_resource(&mut doc, page_id, "Font", FONT_NAME, font_id)?;
        append_page_content(&mut doc, page_id, operations)?;
    }

    tracing::debug!(drawn, stripped, "Placeholder output drawn");
    save(&mut doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ChoiceExtractor, PlaceholderExtractor};
    use crate::document::TextLayer;
    use crate::pdf::PdfTemplate;
    use crate::record::{Namespace, SourceRecord};
    use crate::resolver::FieldResolver;
    use crate::test_support::{page_content, PdfBuilder};

    fn template() -> TemplateBytes {
        TemplateBytes::new(
            PdfBuilder::new()
                .page(612.0, 792.0)
                .text(40.0, 100.0, 12.0, "Name:")
                .text(100.0, 100.0, 12.0, "{firstName}")
                .text(300.0, 100.0, 12.0, "{lastName}")
                .text(40.0, 200.0, 10.0, "{radio_sex_1}")
                .text(200.0, 200.0, 10.0, "{radio_sex_2}")
                .build(),
        )
    }

    fn record() -> SourceRecord {
        SourceRecord::default()
            .with(Namespace::Subject, "firstName", "Ada")
            .with(Namespace::Subject, "lastName", "Lovelace")
    }

    #[tokio::test]
    async fn test_draws_values_and_marks() {
        let bytes = template();
        let pdf = PdfTemplate::open(bytes.clone(), "p".into()).await.unwrap();
        let pages = pdf.all_pages().await.unwrap();
        let resolver = FieldResolver::default();

        let fields = PlaceholderExtractor::new(resolver.clone()).extract(&pages, &record());
        let mut groups = ChoiceExtractor::new(resolver).extract(&pages);
        assert_eq!(fields.len(), 2);
        assert!(groups[0].select("2"));

        let out = synthesize_placeholder(&bytes, &fields, &groups).unwrap();
        let content = page_content(&out, 0);

        assert!(content.contains("(Ada)"));
        assert!(content.contains("(Lovelace)"));
        // Four masks and one black mark
        assert_eq!(content.matches(" re").count(), 5);
        assert!(content.contains("/AfHelv"));
    }

    #[tokio::test]
    async fn test_output_holds_values_not_tokens() {
        let bytes = template();
        let resolver = FieldResolver::default();
        let extractor = PlaceholderExtractor::new(resolver.clone());

        let pdf = PdfTemplate::open(bytes.clone(), "a".into()).await.unwrap();
        let pages = pdf.all_pages().await.unwrap();
        let fields = extractor.extract(&pages, &record());
        let mut groups = ChoiceExtractor::new(resolver.clone()).extract(&pages);
        assert!(groups[0].select("1"));
        let out = synthesize_placeholder(&bytes, &fields, &groups).unwrap();

        let content = page_content(&out, 0);
        assert!(!content.contains("firstName"));
        assert!(!content.contains("lastName"));
        assert!(!content.contains("radio"));
        assert!(content.contains("(Name:)"));

        let reopened = PdfTemplate::open(TemplateBytes::new(out), "b".into())
            .await
            .unwrap();
        let again = reopened.all_pages().await.unwrap();
        assert!(extractor.extract(&again, &record()).is_empty());
        assert!(ChoiceExtractor::new(resolver).extract(&again).is_empty());

        // Each resolved value reads back at its field's anchor
        for field in &fields {
            let run = again[0]
                .runs
                .iter()
                .find(|r| r.text.trim() == field.current_value)
                .unwrap_or_else(|| panic!("{} not drawn", field.current_value));
            assert!((run.x - field.anchor_x).abs() < 1.0);
            assert!((run.y - field.anchor_y).abs() < 3.0);
        }
    }

    fn number(obj: &lopdf::Object) -> f32 {
        match obj {
            lopdf::Object::Integer(i) => *i as f32,
            lopdf::Object::Real(r) => *r as f32,
            other => panic!("not a number: {:?}", other),
        }
    }

    #[test]
    fn test_rotated_page_draws_upright() {
        let mut doc = Document::load_mem(&PdfBuilder::new().page(612.0, 792.0).build()).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        doc.get_object_mut(page_id)
            .unwrap()
            .as_dict_mut()
            .unwrap()
            .set("Rotate", 90);
        let mut rotated = Vec::new();
        doc.save_to(&mut rotated).unwrap();

        let field = FieldDescriptor {
            id: "field_0".into(),
            page: 0,
            origin: crate::extract::FieldOrigin::Token {
                text: "firstName".into(),
            },
            anchor_x: 100.0,
            anchor_y: 100.0,
            line_y: 100.0,
            width: 200.0,
            height: 12.0,
            font_size_hint: 10.0,
            extent: Rect::new(100.0, 100.0, 60.0, 12.0),
            source_binding: None,
            current_value: "Ada".into(),
        };
        let out = synthesize_placeholder(&TemplateBytes::new(rotated), &[field], &[]).unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let content =
            lopdf::content::Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();

        // Baseline origin at view (100, 108), text turned a quarter left
        let tm = content.operations.iter().find(|op| op.operator == "Tm").unwrap();
        let tm: Vec<f32> = tm.operands.iter().map(number).collect();
        let expected = [0.0, 1.0, -1.0, 0.0, 108.0, 100.0];
        for (got, want) in tm.iter().zip(expected) {
            assert!((got - want).abs() < 0.01, "{:?}", tm);
        }

        // The mask spans the token's extent turned into user space
        let mask = content.operations.iter().find(|op| op.operator == "re").unwrap();
        let mask: Vec<f32> = mask.operands.iter().map(number).collect();
        let expected = [99.5, 99.5, 13.0, 61.0];
        for (got, want) in mask.iter().zip(expected) {
            assert!((got - want).abs() < 0.01, "{:?}", mask);
        }
    }

    #[test]
    fn test_blank_values_not_drawn() {
        let bytes = template();
        let out = synthesize_placeholder(&bytes, &[], &[]).unwrap();
        assert!(!page_content(&out, 0).contains("/AfHelv"));
    }
}
