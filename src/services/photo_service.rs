use crate::error::AppError;
use crate::models::workflow_types::ImageHandle;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;

/// Extensions offered by the photo picker.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"];

const PREVIEW_SIZE: u32 = 640;
const PREVIEW_QUALITY: u8 = 80;

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Handles for the image files in a selection, in selection order. Other
/// files are dropped, so a selection without photos comes back empty.
pub fn image_handles<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Vec<ImageHandle> {
    paths
        .into_iter()
        .filter(|p| is_image_file(p.as_ref()))
        .map(ImageHandle::from_path)
        .collect()
}

/// Downscaled JPEG of the photo as a `data:` URL for the preview element.
pub fn preview_data_url(path: &Path) -> Result<String, AppError> {
    let img = ImageReader::open(path)
        .map_err(|e| AppError {
            message: format!("Failed to open image {}: {}", path.display(), e),
        })?
        .with_guessed_format()?
        .decode()?;

    let img = if img.width() > PREVIEW_SIZE || img.height() > PREVIEW_SIZE {
        img.resize(PREVIEW_SIZE, PREVIEW_SIZE, FilterType::Triangle)
    } else {
        img
    };

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, PREVIEW_QUALITY);
    img.to_rgb8().write_with_encoder(encoder).map_err(|e| AppError {
        message: format!("Failed to encode preview: {}", e),
    })?;

    let b64 = base64::engine::general_purpose::STANDARD.encode(buffer.into_inner());
    Ok(format!("data:image/jpeg;base64,{}", b64))
}
