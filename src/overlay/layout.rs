//! Overlay control placement
//!
//! Pure mapping from content-space field/choice geometry to pixel
//! positions at a zoom factor. Nothing here re-runs extraction: a zoom
//! change is just another call with a different factor.

use serde::{Deserialize, Serialize};

use crate::document::PageSize;
use crate::extract::{ChoiceGroup, FieldDescriptor};
use crate::pdf::{MAX_ZOOM, MIN_ZOOM};
use crate::profile::OffsetCorrection;

/// Editable text control over one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextControl {
    pub field_id: String,
    /// Token text or interactive field name
    pub label: String,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub value: String,
    pub bound: bool,
}

/// Clickable marker over one choice option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceMarker {
    pub option_id: String,
    pub group_key: String,
    pub option_token: String,
    pub left: f32,
    pub top: f32,
    pub size: f32,
    pub selected: bool,
}

/// Every control of one page at one zoom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOverlay {
    pub page: usize,
    pub zoom: f32,
    /// Pixel size of the rendered page
    pub width: f32,
    pub height: f32,
    pub fields: Vec<TextControl>,
    pub choices: Vec<ChoiceMarker>,
}

/// Clamp a requested zoom the way the rasterizer does
pub fn effective_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        1.0
    }
}

/// Lay out one page's controls
pub fn layout_page(
    page: usize,
    size: PageSize,
    zoom: f32,
    fields: &[FieldDescriptor],
    groups: &[ChoiceGroup],
    offset: OffsetCorrection,
) -> PageOverlay {
    let zoom = effective_zoom(zoom);

    let fields = fields
        .iter()
        .filter(|f| f.page == page)
        .map(|f| TextControl {
            field_id: f.id.clone(),
            label: f
                .token()
                .or_else(|| f.interactive_name())
                .unwrap_or_default()
                .to_string(),
            left: f.anchor_x * zoom + offset.dx,
            top: f.anchor_y * zoom + offset.dy,
            width: f.width * zoom,
            height: f.height * zoom,
            font_size: f.font_size_hint * zoom,
            value: f.current_value.clone(),
            bound: f.source_binding.is_some(),
        })
        .collect();

    let choices = groups
        .iter()
        .flat_map(|g| g.options.iter())
        .filter(|o| o.page == page)
        .map(|o| ChoiceMarker {
            option_id: o.id.clone(),
            group_key: o.group_key.clone(),
            option_token: o.option_token.clone(),
            left: o.x * zoom + offset.dx,
            top: o.y * zoom + offset.dy,
            size: o.font_size * zoom,
            selected: o.selected,
        })
        .collect();

    PageOverlay {
        page,
        zoom,
        width: size.width * zoom,
        height: size.height * zoom,
        fields,
        choices,
    }
}
