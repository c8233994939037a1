use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

/// Command-line arguments for converting labelme JSON annotations to a YOLO dataset.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Convert labelme JSON annotations to a YOLO dataset", long_about = None)]
pub struct ConvertArgs {
    /// Directory containing labelme JSON files
    #[arg(short = 'd', long = "json_dir")]
    pub json_dir: PathBuf,

    /// Directory searched for images referenced by relative paths
    #[arg(short = 'i', long = "img_dir")]
    pub img_dir: PathBuf,

    /// Root directory for the generated dataset
    #[arg(short = 'o', long = "output", default_value = "data")]
    pub output: PathBuf,

    /// Proportion of the dataset to use for training
    #[arg(long = "train_size", default_value_t = 0.7, value_parser = validate_size)]
    pub train_size: f64,

    /// Proportion of the dataset to use for validation; the remainder goes to test
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,
}

/// Command-line arguments for renaming image files to sequential zero-padded numbers.
#[derive(Parser, Debug, Clone)]
#[command(version, about = "Rename image files to sequential zero-padded numbers", long_about = None)]
pub struct RenameArgs {
    /// Folder containing the image files to rename
    pub folder: PathBuf,

    /// Start index
    #[arg(long = "start", default_value_t = 0)]
    pub start: usize,

    /// Zero padding width
    #[arg(long = "padding", default_value_t = 3)]
    pub padding: usize,

    /// Sort files by name or modification time
    #[arg(long = "sort", value_enum, default_value = "name")]
    pub sort: SortKey,

    /// Show planned renames but do not perform them
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Comma-separated list of extensions to include
    #[arg(
        long = "exts",
        value_delimiter = ',',
        default_value = "jpg,jpeg,png,bmp,gif,tiff,webp"
    )]
    pub exts: Vec<String>,

    /// Force rename even if the padded capacity is exceeded
    #[arg(long = "force")]
    pub force: bool,
}

// Sort key for the renamer's file listing
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum SortKey {
    /// Sort by lowercased file name
    Name,
    /// Sort by modification time
    Mtime,
}

// Validate that the size is between 0.0 and 1.0
fn validate_size(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_size() {
        assert!(validate_size("0.5").is_ok());
        assert!(validate_size("1.0").is_ok());
        assert!(validate_size("0.0").is_ok());
        assert!(validate_size("-0.1").is_err());
        assert!(validate_size("1.1").is_err());
        assert!(validate_size("abc").is_err());
    }
}
