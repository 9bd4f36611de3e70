//! Image import: file bytes become an embedded data-URL asset plus an image
//! shape centered on the viewport.

use std::io::Cursor;
use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use image::ImageReader;
use tracing::info;

use crate::board::Board;
use crate::document::Asset;
use crate::error::{BoardError, Result};
use crate::markup::RichText;
use crate::shapes::{AssetId, ShapeId};

/// Build an asset from raw image bytes.
///
/// Bytes that are not a recognizable image are refused as a validation
/// error; a recognized image that fails to decode is an IO error.
pub fn decode_image_asset(name: &str, bytes: &[u8]) -> Result<Asset> {
    let format = image::guess_format(bytes)
        .map_err(|_| BoardError::validation(format!("{name} is not an image")))?;
    let (w, h) = ImageReader::with_format(Cursor::new(bytes), format).into_dimensions()?;
    let mime_type = format.to_mime_type().to_string();
    let src = format!("data:{mime_type};base64,{}", general_purpose::STANDARD.encode(bytes));
    Ok(Asset {
        id: AssetId::new(),
        name: name.to_string(),
        src,
        w,
        h,
        mime_type,
    })
}

/// Read an image file off disk into an asset
pub async fn read_image_asset(path: &Path) -> Result<Asset> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BoardError::Io(format!("failed to read {}: {e}", path.display())))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    decode_image_asset(&name, &bytes)
}

/// Import an image file onto the board's current page
pub async fn import_image<R: RichText>(board: &mut Board<R>, path: &Path) -> Result<ShapeId> {
    let asset = read_image_asset(path).await?;
    info!(name = %asset.name, w = asset.w, h = asset.h, "image imported");
    board.place_image(asset)
}
