//! Token removal from page content
//!
//! Text-showing operators (`Tj`, `'`, `"`, `TJ`) are concatenated per page
//! in stream order and matched as one byte string, so a token the template
//! wrote across several operators is still found. Matched bytes become
//! spaces; a string left with nothing but blanks is emptied. Strings in
//! multi-byte font encodings do not match and keep relying on the masks.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

use crate::document::{FillError, FillResult};

/// Choice tokens and their fragments
static CHOICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i-u)\{\s*radio\s*_?\s*(?:[a-z]+\s*_?\s*)?(?:\d+\s*\}?)?|\bradio\s*_\s*id\s*_?\s*\d+\s*\}?|_\s*id\s*_?\s*\d+\s*\}",
    )
    .expect("valid choice strip regex")
});

/// What to remove from one page
#[derive(Debug, Default)]
pub struct StripTargets<'a> {
    /// Field token names, without braces
    pub tokens: Vec<&'a str>,
    /// The page holds choice options
    pub choices: bool,
}

impl StripTargets<'_> {
    fn is_empty(&self) -> bool {
        self.tokens.is_empty() && !self.choices
    }
}

/// Where a shown string sits among the operations
#[derive(Debug, Clone, Copy)]
struct Segment {
    op: usize,
    operand: usize,
    element: Option<usize>,
    start: usize,
    len: usize,
}

fn field_regex(tokens: &[&str]) -> FillResult<Option<Regex>> {
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut names: Vec<&str> = tokens.to_vec();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    names.dedup();
    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?-u)\{{\s*(?:{})(?:\s*\}}|\b)", alternation))
        .map(Some)
        .map_err(|e| FillError::Synthesis(format!("token pattern: {}", e)))
}

fn shown_string(operation: &Operation, operand: usize) -> Option<&[u8]> {
    match operation.operands.get(operand) {
        Some(Object::String(bytes, _)) => Some(bytes),
        _ => None,
    }
}

fn push_segment(
    found: &mut Vec<Segment>,
    text: &mut Vec<u8>,
    at: (usize, usize, Option<usize>),
    bytes: &[u8],
) {
    let (op, operand, element) = at;
    found.push(Segment {
        op,
        operand,
        element,
        start: text.len(),
        len: bytes.len(),
    });
    text.extend_from_slice(bytes);
}

fn segments(operations: &[Operation], text: &mut Vec<u8>) -> Vec<Segment> {
    let mut found = Vec::new();

    for (i, operation) in operations.iter().enumerate() {
        match operation.operator.as_str() {
            "Tj" | "'" => {
                if let Some(bytes) = shown_string(operation, 0) {
                    push_segment(&mut found, text, (i, 0, None), bytes);
                }
            }
            "\"" => {
                if let Some(bytes) = shown_string(operation, 2) {
                    push_segment(&mut found, text, (i, 2, None), bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operation.operands.first() {
                    for (j, item) in items.iter().enumerate() {
                        if let Object::String(bytes, _) = item {
                            push_segment(&mut found, text, (i, 0, Some(j)), bytes);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    found
}

fn segment_bytes<'a>(
    operations: &'a mut [Operation],
    segment: &Segment,
) -> Option<&'a mut Vec<u8>> {
    let operand = operations.get_mut(segment.op)?.operands.get_mut(segment.operand)?;
    let target = match (operand, segment.element) {
        (Object::Array(items), Some(j)) => items.get_mut(j)?,
        (object, None) => object,
        _ => return None,
    };
    match target {
        Object::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

/// Blank matched tokens in `operations`; returns the number of bytes blanked
pub fn blank_tokens(operations: &mut [Operation], targets: &StripTargets<'_>) -> FillResult<usize> {
    if targets.is_empty() {
        return Ok(0);
    }

    let mut text = Vec::new();
    let segments = segments(operations, &mut text);
    let mut blank = vec![false; text.len()];

    if let Some(re) = field_regex(&targets.tokens)? {
        for m in re.find_iter(&text) {
            blank[m.range()].iter_mut().for_each(|b| *b = true);
        }
    }
    if targets.choices {
        for m in CHOICE_RE.find_iter(&text) {
            blank[m.range()].iter_mut().for_each(|b| *b = true);
        }
    }

    let mut blanked = 0;
    for segment in &segments {
        let flags = &blank[segment.start..segment.start + segment.len];
        if !flags.contains(&true) {
            continue;
        }
        let Some(bytes) = segment_bytes(operations, segment) else {
            continue;
        };
        for (byte, flag) in bytes.iter_mut().zip(flags) {
            if *flag {
                *byte = b' ';
                blanked += 1;
            }
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            bytes.clear();
        }
    }
    Ok(blanked)
}

/// Remove tokens from a page's content streams
///
/// The page gets a single rewritten content stream; streams shared with
/// other pages are left alone. Unreadable content is skipped with a
/// warning.
pub fn strip_page_tokens(
    doc: &mut Document,
    page_id: ObjectId,
    targets: &StripTargets<'_>,
) -> FillResult<usize> {
    if targets.is_empty() {
        return Ok(0);
    }

    let decoded = doc
        .get_page_content(page_id)
        .map_err(FillError::from)
        .and_then(|bytes| Content::decode(&bytes).map_err(FillError::from));
    let mut content = match decoded {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(page = ?page_id, error = %e, "Page content unreadable, tokens only masked");
            return Ok(0);
        }
    };

    let blanked = blank_tokens(&mut content.operations, targets)?;
    if blanked == 0 {
        return Ok(0);
    }

    let bytes = content
        .encode()
        .map_err(|e| FillError::Synthesis(format!("content encoding: {}", e)))?;
    let stream_id = doc.add_object(Stream::new(dictionary! {}, bytes));
    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Reference(stream_id));
    Ok(blanked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{page_content, PdfBuilder};

    fn shown(text: &str) -> Operation {
        Operation::new("Tj", vec![Object::string_literal(text)])
    }

    fn texts(operations: &[Operation]) -> Vec<String> {
        operations
            .iter()
            .filter_map(|op| shown_string(op, 0))
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect()
    }

    #[test]
    fn test_blanks_token_inside_label() {
        let mut ops = vec![shown("Name: {firstName} today")];
        let targets = StripTargets {
            tokens: vec!["firstName"],
            choices: false,
        };

        assert_eq!(blank_tokens(&mut ops, &targets).unwrap(), "{firstName}".len());
        let text = &texts(&ops)[0];
        assert!(text.starts_with("Name: "));
        assert!(text.ends_with(" today"));
        assert!(!text.contains("firstName"));
    }

    #[test]
    fn test_token_split_across_operators() {
        let mut ops = vec![
            shown("{first"),
            Operation::new("ET", vec![]),
            Operation::new("BT", vec![]),
            shown("Name}"),
            shown("{radio"),
            shown("_id_7}"),
        ];
        let targets = StripTargets {
            tokens: vec!["firstName"],
            choices: true,
        };

        blank_tokens(&mut ops, &targets).unwrap();
        assert!(texts(&ops).iter().all(String::is_empty));
    }

    #[test]
    fn test_tj_array_and_unknown_tokens() {
        let mut ops = vec![
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("{last"),
                    Object::Integer(-40),
                    Object::string_literal("Name}"),
                ])],
            ),
            shown("{firstNameAlt}"),
            shown("Radiology 5"),
        ];
        let targets = StripTargets {
            tokens: vec!["lastName", "firstName"],
            choices: true,
        };

        blank_tokens(&mut ops, &targets).unwrap();
        let Object::Array(items) = &ops[0].operands[0] else {
            panic!("TJ operand is an array");
        };
        assert_eq!(items[0], Object::string_literal(""));
        assert_eq!(items[1], Object::Integer(-40));
        assert_eq!(texts(&ops[1..]), vec!["{firstNameAlt}", "Radiology 5"]);
    }

    #[test]
    fn test_strip_rewrites_page_content() {
        let pdf = PdfBuilder::new()
            .page(612.0, 792.0)
            .text(40.0, 100.0, 12.0, "Name:")
            .text(100.0, 100.0, 12.0, "{firstName}")
            .build();
        let mut doc = Document::load_mem(&pdf).unwrap();
        let page_id = *doc.get_pages().get(&1).unwrap();
        let targets = StripTargets {
            tokens: vec!["firstName"],
            choices: false,
        };

        assert!(strip_page_tokens(&mut doc, page_id, &targets).unwrap() > 0);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();

        let content = page_content(&out, 0);
        assert!(content.contains("(Name:)"));
        assert!(!content.contains("firstName"));
    }
}
