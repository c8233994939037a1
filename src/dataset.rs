use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::ConvertArgs;
use crate::conversion::convert_record;
use crate::io::{list_annotation_files, setup_output_directories, write_manifest, SplitDirs};
use crate::types::{ConversionStats, ImageAnnotation, ResolvedImage, Split};
use crate::utils::{create_progress_bar, read_and_parse_json};

/// Which shuffled indices landed in train and val; everything else is test.
#[derive(Debug)]
pub struct SplitAssignment {
    pub train: HashSet<usize>,
    pub val: HashSet<usize>,
}

impl SplitAssignment {
    pub fn split_for(&self, index: usize) -> Split {
        if self.train.contains(&index) {
            Split::Train
        } else if self.val.contains(&index) {
            Split::Val
        } else {
            Split::Test
        }
    }
}

/// Deterministically assign record indices to splits.
///
/// `0..n` is shuffled with a seeded RNG, then partitioned by cumulative
/// counts: `floor(n * train_size)` for train, `floor(n * val_size)` for val,
/// and the remainder for test.
pub fn split_indices(n: usize, train_size: f64, val_size: f64, seed: u64) -> SplitAssignment {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let n_train = (n as f64 * train_size).floor() as usize;
    let n_val = (n as f64 * val_size).floor() as usize;

    SplitAssignment {
        train: indices[..n_train].iter().copied().collect(),
        val: indices[n_train..n_train + n_val].iter().copied().collect(),
    }
}

/// Collect the class vocabulary: every label observed across all records,
/// sorted lexicographically. Ids are the position in the returned list, so
/// the vocabulary is closed once this scan completes.
pub fn discover_classes(annotations: &[(PathBuf, Option<ImageAnnotation>)]) -> Vec<String> {
    annotations
        .iter()
        .filter_map(|(_, annotation)| annotation.as_ref())
        .flat_map(|annotation| annotation.shapes.iter())
        .map(|shape| shape.label.clone())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Parse every annotation file; parse failures are kept as `None` so the
/// record still occupies its split slot and is reported as skipped later.
fn load_annotations(json_files: &[PathBuf]) -> Vec<(PathBuf, Option<ImageAnnotation>)> {
    json_files
        .iter()
        .map(|path| match read_and_parse_json(path) {
            Ok(annotation) => (path.clone(), Some(annotation)),
            Err(e) => {
                error!("Failed to parse JSON ({}): {}", path.display(), e);
                (path.clone(), None)
            }
        })
        .collect()
}

// Copy or materialize the image and write the label file for one record
fn write_record(
    json_path: &Path,
    image: &ResolvedImage,
    lines: &[String],
    images_dir: &Path,
    labels_dir: &Path,
) -> std::io::Result<()> {
    match image {
        ResolvedImage::OnDisk(path) => {
            fs::copy(path, images_dir.join(image.file_name()))?;
        }
        ResolvedImage::Embedded { file_name, bytes } => {
            let mut file = File::create(images_dir.join(file_name))?;
            file.write_all(bytes)?;
        }
    }

    let stem = sanitize_filename::sanitize(
        json_path
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default(),
    );
    let label_path = labels_dir.join(stem).with_extension("txt");
    let mut writer = BufWriter::new(File::create(label_path)?);
    for line in lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()
}

fn write_all_records(
    annotations: &[(PathBuf, Option<ImageAnnotation>)],
    assignment: &SplitAssignment,
    class_map: &HashMap<String, usize>,
    dirs: &SplitDirs,
    img_dir: &Path,
) -> ConversionStats {
    let pb = create_progress_bar(annotations.len() as u64, "Convert");
    let mut stats = ConversionStats::default();

    for (index, (json_path, annotation)) in annotations.iter().enumerate() {
        let annotation = match annotation {
            Some(annotation) => annotation,
            None => {
                stats.record_error(json_path, "failed to parse annotation JSON");
                pb.inc(1);
                continue;
            }
        };
        match convert_record(annotation, img_dir, class_map) {
            Ok((image, lines)) => {
                let split = assignment.split_for(index);
                let (images_dir, labels_dir) = dirs.for_split(split);
                match write_record(json_path, &image, &lines, images_dir, labels_dir) {
                    Ok(()) => stats.count(split),
                    Err(e) => stats.record_error(json_path, e),
                }
            }
            Err(e) => stats.record_error(json_path, e),
        }
        pb.inc(1);
    }

    pb.finish_with_message("Conversion complete");
    stats
}

/// Main dataset conversion pipeline.
///
/// Class discovery completes over the whole dataset before any record is
/// converted, so class ids are stable across splits.
pub fn process_dataset(args: &ConvertArgs) -> Result<ConversionStats, Box<dyn Error>> {
    let json_files = list_annotation_files(&args.json_dir)?;
    if json_files.is_empty() {
        warn!("No JSON files found in {}", args.json_dir.display());
        return Ok(ConversionStats::default());
    }
    info!("Read {} annotation files.", json_files.len());

    let annotations = load_annotations(&json_files);
    let classes = discover_classes(&annotations);
    let class_map: HashMap<String, usize> = classes
        .iter()
        .enumerate()
        .map(|(id, name)| (name.clone(), id))
        .collect();
    info!("Classes: {:?}", classes);

    let dirs = setup_output_directories(&args.output)?;
    let assignment = split_indices(annotations.len(), args.train_size, args.val_size, args.seed);

    let stats = write_all_records(&annotations, &assignment, &class_map, &dirs, &args.img_dir);

    let manifest = write_manifest(&args.output, &dirs, &classes)?;
    stats.log_summary();
    info!("Sample data.yaml:\n{}", manifest);

    Ok(stats)
}
