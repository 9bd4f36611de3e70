//! Board export: raster images, PDF and raw JSON.
//!
//! Capture is delegated to a [`Rasterizer`]. The selection is cleared and one
//! frame awaited before capture so selection handles never land in the
//! output; the previous selection is restored whether capture succeeds or
//! not.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, Stream, dictionary};
use tracing::{error, info};

use crate::board::Board;
use crate::document::CanvasSnapshot;
use crate::error::{BoardError, Result};
use crate::markup::RichText;
use crate::shapes::{Rect, ShapeId, ShapeKind};

/// Canvas background used for every capture
pub const BACKGROUND: Rgb<u8> = Rgb([0x12, 0x12, 0x12]);
pub const JPEG_QUALITY: u8 = 95;

/// A4 landscape in PDF points
const PDF_PAGE: (i64, i64) = (842, 595);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpg,
    Pdf,
    Json,
}

impl ExportFormat {
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Png => "jiukisidian.png",
            ExportFormat::Jpg => "jiukisidian.jpg",
            ExportFormat::Pdf => "jiukisidian-board.pdf",
            ExportFormat::Json => "jiukisidian-board.json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpg),
            "pdf" => Ok(ExportFormat::Pdf),
            "json" => Ok(ExportFormat::Json),
            other => Err(BoardError::validation(format!("unknown export format {other:?}"))),
        }
    }
}

/// What a rasterizer is asked to draw
#[derive(Debug)]
pub struct CaptureRequest<'a> {
    pub snapshot: &'a CanvasSnapshot,
    /// Shapes on the current page, back to front
    pub shapes: Vec<ShapeId>,
}

/// Renders the visible canvas to pixels
#[async_trait]
pub trait Rasterizer {
    /// Resolve once the canvas has repainted
    async fn next_frame(&mut self);

    async fn capture(&mut self, request: &CaptureRequest<'_>) -> Result<RgbImage>;
}

/// Export the current page in `format` into `dir`
pub async fn export_canvas<R: RichText>(
    board: &mut Board<R>,
    rasterizer: &mut dyn Rasterizer,
    format: ExportFormat,
    dir: &Path,
) -> Result<PathBuf> {
    if format == ExportFormat::Json {
        return export_json(board.doc().snapshot(), dir).await;
    }

    let selected = board.doc().selected_ids().to_vec();
    board.select_none();
    rasterizer.next_frame().await;

    let encoded = {
        let request = CaptureRequest {
            snapshot: board.doc().snapshot(),
            shapes: board.doc().current_page_shapes().map(|s| s.id).collect(),
        };
        match rasterizer.capture(&request).await {
            Ok(image) => encode(&image, format),
            Err(e) => Err(e),
        }
    };
    if !selected.is_empty() {
        board.select(&selected);
    }

    let bytes = encoded.map_err(|e| {
        error!(?format, error = %e, "export failed");
        match e {
            BoardError::Render(_) => e,
            other => BoardError::Render(other.to_string()),
        }
    })?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format.file_name());
    tokio::fs::write(&path, bytes).await?;
    info!(path = %path.display(), "board exported");
    Ok(path)
}

/// Write the raw snapshot, pretty-printed
pub async fn export_json(snapshot: &CanvasSnapshot, dir: &Path) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(snapshot)?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(ExportFormat::Json.file_name());
    tokio::fs::write(&path, json).await?;
    info!(path = %path.display(), "snapshot exported");
    Ok(path)
}

fn encode(image: &RgbImage, format: ExportFormat) -> Result<Vec<u8>> {
    let render = |e: image::ImageError| BoardError::Render(e.to_string());
    match format {
        ExportFormat::Png => {
            let mut bytes = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .map_err(render)?;
            Ok(bytes)
        }
        ExportFormat::Jpg => encode_jpeg(image).map_err(render),
        ExportFormat::Pdf => {
            let jpeg = encode_jpeg(image).map_err(render)?;
            jpeg_to_pdf(&jpeg, image.width(), image.height())
        }
        ExportFormat::Json => Err(BoardError::Render("json is not a raster format".into())),
    }
}

fn encode_jpeg(image: &RgbImage) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(image)?;
    Ok(bytes)
}

/// Single landscape page with the image scaled to the page width
fn jpeg_to_pdf(jpeg: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let (page_w, page_h) = PDF_PAGE;
    let (img_w, img_h) = (i64::from(width.max(1)), i64::from(height.max(1)));
    let (mut draw_w, mut draw_h) = (page_w, page_w * img_h / img_w);
    if draw_h > page_h {
        draw_h = page_h;
        draw_w = page_h * img_w / img_h;
    }

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img_w,
            "Height" => img_h,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        jpeg.to_vec(),
    ));
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    draw_w.into(),
                    0_i64.into(),
                    0_i64.into(),
                    draw_h.into(),
                    0_i64.into(),
                    (page_h - draw_h).into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        content.encode().map_err(pdf_error)?,
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1_i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(page_w),
                Object::Integer(page_h),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(pdf_error)?;
    Ok(out)
}

fn pdf_error(e: impl std::fmt::Display) -> BoardError {
    BoardError::Render(format!("pdf: {e}"))
}

/// Flat preview renderer: every shape becomes its page-space bounding box.
/// Rotation and text are not drawn.
#[derive(Debug, Clone, Copy)]
pub struct SketchRasterizer {
    /// Longest output side in pixels
    pub max_side: u32,
}

impl Default for SketchRasterizer {
    fn default() -> Self {
        Self { max_side: 2048 }
    }
}

const PADDING: f64 = 32.0;
const EMPTY_SIZE: (u32, u32) = (800, 600);
const NOTE_FILL: Rgb<u8> = Rgb([0x1e, 0x1e, 0x1e]);
const NOTE_HEADER: Rgb<u8> = Rgb([0xf5, 0xc5, 0x42]);
const IMAGE_FILL: Rgb<u8> = Rgb([0x50, 0x50, 0x50]);
const STROKE: Rgb<u8> = Rgb([0xdc, 0xdc, 0xdc]);

#[async_trait]
impl Rasterizer for SketchRasterizer {
    async fn next_frame(&mut self) {
        tokio::task::yield_now().await;
    }

    async fn capture(&mut self, request: &CaptureRequest<'_>) -> Result<RgbImage> {
        let rects: Vec<(Rect, &ShapeKind)> = request
            .shapes
            .iter()
            .filter_map(|id| request.snapshot.shape(*id))
            .map(|s| (s.bounds(), &s.props))
            .filter(|(r, _)| r.w > 0.0 || r.h > 0.0)
            .collect();
        let Some(area) = union(rects.iter().map(|(r, _)| *r)) else {
            return Ok(RgbImage::from_pixel(EMPTY_SIZE.0, EMPTY_SIZE.1, BACKGROUND));
        };

        let (area_w, area_h) = (area.w + 2.0 * PADDING, area.h + 2.0 * PADDING);
        let scale = (f64::from(self.max_side) / area_w.max(area_h)).min(1.0);
        let width = ((area_w * scale).ceil() as u32).max(1);
        let height = ((area_h * scale).ceil() as u32).max(1);
        if !scale.is_finite() || width > self.max_side.max(1) || height > self.max_side.max(1) {
            return Err(BoardError::Render(format!("cannot fit {area_w}x{area_h} canvas")));
        }

        let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
        let to_px = |r: Rect| {
            Rect::new(
                (r.x - area.x + PADDING) * scale,
                (r.y - area.y + PADDING) * scale,
                r.w * scale,
                r.h * scale,
            )
        };
        for (rect, kind) in rects {
            let px = to_px(rect);
            match kind {
                ShapeKind::Note(_) => {
                    fill(&mut img, px, NOTE_FILL);
                    let header = Rect::new(px.x, px.y, px.w, (32.0 * scale).min(px.h));
                    fill(&mut img, header, NOTE_HEADER);
                }
                ShapeKind::Image { .. } => fill(&mut img, px, IMAGE_FILL),
                _ => stroke(&mut img, px, STROKE),
            }
        }
        Ok(img)
    }
}

fn union(rects: impl Iterator<Item = Rect>) -> Option<Rect> {
    rects.fold(None, |acc, r| {
        Some(match acc {
            None => r,
            Some(a) => {
                let x = a.x.min(r.x);
                let y = a.y.min(r.y);
                let right = (a.x + a.w).max(r.x + r.w);
                let bottom = (a.y + a.h).max(r.y + r.h);
                Rect::new(x, y, right - x, bottom - y)
            }
        })
    })
}

/// Pixel span of a rect, clipped to the image
fn span(img: &RgbImage, r: Rect) -> (u32, u32, u32, u32) {
    let clip = |v: f64, max: u32| v.max(0.0).min(f64::from(max)) as u32;
    (
        clip(r.x.floor(), img.width()),
        clip(r.y.floor(), img.height()),
        clip((r.x + r.w).ceil(), img.width()),
        clip((r.y + r.h).ceil(), img.height()),
    )
}

fn fill(img: &mut RgbImage, r: Rect, color: Rgb<u8>) {
    let (x0, y0, x1, y1) = span(img, r);
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, color);
        }
    }
}

fn stroke(img: &mut RgbImage, r: Rect, color: Rgb<u8>) {
    let (x0, y0, x1, y1) = span(img, r);
    if x1 <= x0 || y1 <= y0 {
        return;
    }
    for x in x0..x1 {
        img.put_pixel(x, y0, color);
        img.put_pixel(x, y1 - 1, color);
    }
    for y in y0..y1 {
        img.put_pixel(x0, y, color);
        img.put_pixel(x1 - 1, y, color);
    }
}
