//! YOLO dataset preparation tools
//!
//! Two standalone batch utilities for getting an object-detection dataset
//! ready for training with an external YOLO implementation:
//!
//! - the annotation converter turns labelme JSON files into normalized YOLO
//!   label files, partitions records into train/val/test splits and writes a
//!   `data.yaml` manifest;
//! - the batch renamer gives the image files of a directory sequential
//!   zero-padded names through a collision-safe two-phase rename.

pub mod config;
pub mod conversion;
pub mod dataset;
pub mod io;
pub mod rename;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{ConvertArgs, RenameArgs, SortKey};
pub use conversion::{convert_record, convert_shape_to_yolo, resolve_image, ConvertError};
pub use dataset::{discover_classes, process_dataset, split_indices, SplitAssignment};
pub use io::{list_annotation_files, setup_output_directories, write_manifest, SplitDirs};
pub use rename::{RenameError, RenamePlan};
pub use types::{ConversionStats, ImageAnnotation, ResolvedImage, Shape, Split};
