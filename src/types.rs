use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// At most this many per-record errors are listed in the summary
pub const MAX_REPORTED_ERRORS: usize = 10;

// The Shape struct representing one annotated region within an image
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Shape {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub group_id: Option<i64>,
    pub shape_type: String,
    pub description: Option<String>,
    pub mask: Option<String>,
}

// The ImageAnnotation struct representing the annotation information of an image
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnnotation {
    pub version: String,
    pub flags: Option<HashMap<String, bool>>,
    pub shapes: Vec<Shape>,
    pub image_path: String,
    pub image_data: Option<String>,
    pub image_height: u32,
    pub image_width: u32,
}

/// One of the three disjoint dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

/// The image a record resolved to: either a file on disk to be copied, or
/// bytes decoded from the annotation's embedded `imageData`.
#[derive(Debug, Clone)]
pub enum ResolvedImage {
    OnDisk(PathBuf),
    Embedded { file_name: String, bytes: Vec<u8> },
}

impl ResolvedImage {
    /// Output file name for the image inside a split directory.
    pub fn file_name(&self) -> String {
        match self {
            ResolvedImage::OnDisk(path) => sanitize_filename::sanitize(
                path.file_name()
                    .map(|n| n.to_string_lossy())
                    .unwrap_or_default(),
            ),
            ResolvedImage::Embedded { file_name, .. } => file_name.clone(),
        }
    }
}

// Struct to hold conversion statistics
#[derive(Debug, Default, Clone)]
pub struct ConversionStats {
    pub train: usize,
    pub val: usize,
    pub test: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ConversionStats {
    pub fn count(&mut self, split: Split) {
        match split {
            Split::Train => self.train += 1,
            Split::Val => self.val += 1,
            Split::Test => self.test += 1,
        }
    }

    /// Record a per-record failure: the record is skipped, never fatal to the batch.
    pub fn record_error(&mut self, source: &Path, err: impl std::fmt::Display) {
        self.skipped += 1;
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        self.errors.push(format!("{}: {}", name, err));
    }

    pub fn total_written(&self) -> usize {
        self.train + self.val + self.test
    }

    pub fn log_summary(&self) {
        info!(
            "Done. Train: {}, Val: {}, Test: {}, Skipped: {}",
            self.train, self.val, self.test, self.skipped
        );
        if !self.errors.is_empty() {
            warn!("Errors:");
            for e in self.errors.iter().take(MAX_REPORTED_ERRORS) {
                warn!("  {}", e);
            }
            if self.errors.len() > MAX_REPORTED_ERRORS {
                warn!("  ...and {} more", self.errors.len() - MAX_REPORTED_ERRORS);
            }
        }
    }
}
