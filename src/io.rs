use glob::glob;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::Split;
use crate::utils::create_output_directory;

// Paths to the output directories for the train/val/test splits
pub struct SplitDirs {
    pub img_train: PathBuf,
    pub img_val: PathBuf,
    pub img_test: PathBuf,
    pub lbl_train: PathBuf,
    pub lbl_val: PathBuf,
    pub lbl_test: PathBuf,
}

impl SplitDirs {
    /// Image and label directories for a split.
    pub fn for_split(&self, split: Split) -> (&Path, &Path) {
        match split {
            Split::Train => (&self.img_train, &self.lbl_train),
            Split::Val => (&self.img_val, &self.lbl_val),
            Split::Test => (&self.img_test, &self.lbl_test),
        }
    }
}

/// Set up the directory structure for the YOLO dataset output.
pub fn setup_output_directories(output_root: &Path) -> std::io::Result<SplitDirs> {
    let images_dir = output_root.join("images");
    let labels_dir = output_root.join("labels");

    Ok(SplitDirs {
        img_train: create_output_directory(&images_dir.join("train"))?,
        img_val: create_output_directory(&images_dir.join("val"))?,
        img_test: create_output_directory(&images_dir.join("test"))?,
        lbl_train: create_output_directory(&labels_dir.join("train"))?,
        lbl_val: create_output_directory(&labels_dir.join("val"))?,
        lbl_test: create_output_directory(&labels_dir.join("test"))?,
    })
}

/// List the annotation JSON files of a directory, sorted by name.
///
/// The sort order matters: split assignment pairs shuffled indices with this
/// ordering, so it has to be stable across runs.
pub fn list_annotation_files(json_dir: &Path) -> Result<Vec<PathBuf>, glob::PatternError> {
    let pattern = format!("{}/*.json", json_dir.display());
    let mut files: Vec<PathBuf> = glob(&pattern)?.filter_map(|entry| entry.ok()).collect();
    files.sort();
    Ok(files)
}

/// Write the `data.yaml` manifest consumed by the external detector and
/// return its text.
pub fn write_manifest(
    output_root: &Path,
    dirs: &SplitDirs,
    classes: &[String],
) -> std::io::Result<String> {
    let names = classes
        .iter()
        .map(|name| format!("'{}'", name))
        .collect::<Vec<_>>()
        .join(", ");
    let content = format!(
        "train: {}\nval: {}\ntest: {}\nnc: {}\nnames: [{}]\n",
        dirs.img_train.display(),
        dirs.img_val.display(),
        dirs.img_test.display(),
        classes.len(),
        names
    );
    fs::write(output_root.join("data.yaml"), &content)?;
    Ok(content)
}
