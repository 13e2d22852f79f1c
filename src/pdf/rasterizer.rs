//! PDF PageRasterizer implementation
//!
//! Renders template pages to bitmaps with MuPDF and encodes them with
//! the `image` crate.

use std::io::Cursor;

use async_trait::async_trait;
use image::DynamicImage;
use mupdf::{Colorspace, Matrix};

use crate::document::{
    FillError, FillResult, ImageFormat, PageRasterizer, RenderRequest, RenderResult,
};

use super::PdfTemplate;

/// Zoom range accepted by the rasterizer
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 4.0;

#[async_trait]
impl PageRasterizer for PdfTemplate {
    async fn render_page(&self, request: &RenderRequest) -> FillResult<RenderResult> {
        let page = request.page;
        self.validate_page(page)?;

        let doc = self.doc.clone();
        let zoom = request.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        let format = request.format;

        tokio::task::spawn_blocking(move || {
            doc.with_doc(|mupdf_doc| {
                let mupdf_page = mupdf_doc.load_page(page as i32)?;

                let matrix = Matrix::new_scale(zoom, zoom);
                let colorspace = Colorspace::device_rgb();
                let pixmap = mupdf_page.to_pixmap(&matrix, &colorspace, true, true)?;

                let (data, width, height) = encode_pixmap(&pixmap, format)?;

                Ok(RenderResult {
                    data,
                    format,
                    width,
                    height,
                })
            })
        })
        .await
        .map_err(|e| FillError::Render(format!("Task join error: {}", e)))?
    }
}

fn encode_pixmap(pixmap: &mupdf::Pixmap, format: ImageFormat) -> FillResult<(Vec<u8>, u32, u32)> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let rgba_buffer = samples_to_rgba(samples, n, width as usize, height as usize);

    let img = image::RgbaImage::from_raw(width, height, rgba_buffer)
        .ok_or_else(|| FillError::Image("Failed to create image buffer".to_string()))?;

    encode_image(DynamicImage::ImageRgba8(img), format).map(|data| (data, width, height))
}

/// Expand `n`-channel samples to RGBA
fn samples_to_rgba(samples: &[u8], n: usize, width: usize, height: usize) -> Vec<u8> {
    let mut rgba = Vec::with_capacity(width * height * 4);

    for y in 0..height {
        for x in 0..width {
            let offset = (y * width + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba.extend_from_slice(&[r, g, b, a]);
        }
    }

    rgba
}

fn encode_image(img: DynamicImage, format: ImageFormat) -> FillResult<Vec<u8>> {
    let mut output = Vec::new();
    match format {
        ImageFormat::Png => img
            .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
            .map_err(|e| FillError::Image(e.to_string()))?,
        // JPEG has no alpha channel
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Jpeg)
            .map_err(|e| FillError::Image(e.to_string()))?,
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateBytes;
    use crate::test_support::PdfBuilder;

    #[test]
    fn test_samples_to_rgba_rgb_input() {
        let rgba = samples_to_rgba(&[10, 20, 30, 40, 50, 60], 3, 2, 1);
        assert_eq!(rgba, vec![10, 20, 30, 255, 40, 50, 60, 255]);
    }

    #[test]
    fn test_samples_to_rgba_keeps_alpha() {
        let rgba = samples_to_rgba(&[1, 2, 3, 128], 4, 1, 1);
        assert_eq!(rgba, vec![1, 2, 3, 128]);
    }

    #[tokio::test]
    async fn test_render_scales_with_zoom() {
        let pdf = PdfBuilder::new()
            .page(200.0, 100.0)
            .text(10.0, 10.0, 12.0, "Hello")
            .build();
        let template = PdfTemplate::open(TemplateBytes::new(pdf), "r".into())
            .await
            .unwrap();

        let request = RenderRequest {
            page: 0,
            zoom: 2.0,
            format: ImageFormat::Png,
        };
        let result = template.render_page(&request).await.unwrap();

        assert_eq!(result.width, 400);
        assert_eq!(result.height, 200);
        assert!(result.data.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
