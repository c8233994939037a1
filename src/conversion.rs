use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::types::{ImageAnnotation, ResolvedImage, Shape};
use crate::utils::infer_image_format;

/// A record-level conversion failure. These are recovered locally: the record
/// is counted as skipped and the batch continues.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("image not found: {0}")]
    ImageNotFound(PathBuf),
    #[error("failed to open image {path}: {source}")]
    ImageUnreadable {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("failed to decode embedded image data: {0}")]
    BadImageData(String),
}

/// Convert a single shape to a YOLO label line.
///
/// Only rectangles with exactly two corner points produce a line; every other
/// shape kind is skipped silently, as is a label missing from the class map.
pub fn convert_shape_to_yolo(
    shape: &Shape,
    img_w: u32,
    img_h: u32,
    class_map: &HashMap<String, usize>,
) -> Option<String> {
    if shape.shape_type != "rectangle" || shape.points.len() != 2 {
        return None;
    }
    let class_id = *class_map.get(&shape.label)?;

    let (x1, y1) = shape.points[0];
    let (x2, y2) = shape.points[1];
    let (x_min, x_max) = (x1.min(x2), x1.max(x2));
    let (y_min, y_max) = (y1.min(y2), y1.max(y2));

    let x_center = (x_min + x_max) / 2.0 / img_w as f64;
    let y_center = (y_min + y_max) / 2.0 / img_h as f64;
    let width = (x_max - x_min) / img_w as f64;
    let height = (y_max - y_min) / img_h as f64;

    Some(format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        class_id, x_center, y_center, width, height
    ))
}

/// Resolve the image referenced by an annotation and read its pixel dimensions.
///
/// Parent-directory escape prefixes are stripped from the reference; relative
/// references are looked up by file name inside `img_dir`. When the file is
/// missing but the annotation carries embedded base64 image data, the decoded
/// bytes are carried forward instead.
pub fn resolve_image(
    annotation: &ImageAnnotation,
    img_dir: &Path,
) -> Result<(ResolvedImage, u32, u32), ConvertError> {
    let cleaned = annotation.image_path.replace("..\\", "").replace("..//", "");
    let mut path = PathBuf::from(&cleaned);
    if !path.is_absolute() {
        let name = path.file_name().map(|n| n.to_owned()).unwrap_or_default();
        path = img_dir.join(name);
    }

    if path.exists() {
        // Header-only probe, the pixel data is never decoded
        let (w, h) = image::image_dimensions(&path).map_err(|source| {
            ConvertError::ImageUnreadable {
                path: path.clone(),
                source,
            }
        })?;
        return Ok((ResolvedImage::OnDisk(path), w, h));
    }

    if let Some(data) = annotation.image_data.as_deref().filter(|d| !d.is_empty()) {
        let bytes =
            base64::decode(data).map_err(|e| ConvertError::BadImageData(e.to_string()))?;
        let (w, h) = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| ConvertError::BadImageData(e.to_string()))?
            .into_dimensions()
            .map_err(|e| ConvertError::BadImageData(e.to_string()))?;
        let extension = infer_image_format(&bytes).unwrap_or("png");
        let stem = Path::new(&cleaned)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let file_name = format!("{}.{}", sanitize_filename::sanitize(stem), extension);
        return Ok((ResolvedImage::Embedded { file_name, bytes }, w, h));
    }

    Err(ConvertError::ImageNotFound(path))
}

/// Convert one annotation record into its resolved image and label lines.
pub fn convert_record(
    annotation: &ImageAnnotation,
    img_dir: &Path,
    class_map: &HashMap<String, usize>,
) -> Result<(ResolvedImage, Vec<String>), ConvertError> {
    let (image, img_w, img_h) = resolve_image(annotation, img_dir)?;
    let lines = annotation
        .shapes
        .iter()
        .filter_map(|shape| convert_shape_to_yolo(shape, img_w, img_h, class_map))
        .collect();
    Ok((image, lines))
}
