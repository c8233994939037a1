//! Collision-safe batch renamer.
//!
//! Files are renamed to sequential zero-padded names in two phases: every
//! source is first moved to a unique temporary name, then every temporary is
//! moved to its final name. Final names may therefore overlap with original
//! names (renumbering with overlapping ranges) without any file being
//! overwritten mid-batch. The full mapping is computed and validated before
//! the first filesystem mutation.

use log::{error, info, warn};
use rand::Rng;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;

use crate::config::{RenameArgs, SortKey};

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("\"{0}\" does not exist or is not a directory")]
    InvalidDirectory(PathBuf),
    #[error("padding {padding} cannot represent index {max_index} (max {capacity})")]
    CapacityExceeded {
        padding: usize,
        max_index: usize,
        capacity: usize,
    },
    #[error("{} existing files outside the rename set would be overwritten", .0.len())]
    TargetCollision(Vec<PathBuf>),
    #[error("rename transaction failed: {source}")]
    TransactionFailed { source: io::Error },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RenameError {
    /// Process exit code for each failure cause. Plain I/O errors only arise
    /// from listing the target directory, so they share the invalid-directory
    /// code.
    pub fn exit_code(&self) -> i32 {
        match self {
            RenameError::InvalidDirectory(_) | RenameError::Io(_) => 2,
            RenameError::CapacityExceeded { .. } => 3,
            RenameError::TargetCollision(_) => 4,
            RenameError::TransactionFailed { .. } => 5,
        }
    }
}

/// The fully computed source -> target mapping, in rename order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlan {
    pub steps: Vec<(PathBuf, PathBuf)>,
}

impl RenamePlan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Normalize a user-supplied extension list: trimmed, lowercased, no leading dot.
pub fn normalize_extensions(exts: &[String]) -> HashSet<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// List the regular files of `folder` whose extension is in the allow-list,
/// sorted by lowercased name or by modification time.
pub fn collect_files(
    folder: &Path,
    exts: &HashSet<String>,
    sort: SortKey,
) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            extension_lowercase(path)
                .map(|ext| exts.contains(&ext))
                .unwrap_or(false)
        })
        .collect();

    match sort {
        SortKey::Name => files.sort_by_key(|path| {
            path.file_name()
                .map(|n| n.to_ascii_lowercase())
                .unwrap_or_default()
        }),
        SortKey::Mtime => files.sort_by_key(|path| {
            fs::metadata(path)
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH)
        }),
    }
    Ok(files)
}

/// Fail when the highest computed index does not fit the padding width.
pub fn check_capacity(
    start: usize,
    count: usize,
    padding: usize,
    force: bool,
) -> Result<(), RenameError> {
    let max_index = start + count.saturating_sub(1);
    // Widths beyond usize range can represent anything we can index
    let capacity = match 10usize.checked_pow(padding as u32) {
        Some(p) => p - 1,
        None => return Ok(()),
    };
    if max_index > capacity && !force {
        return Err(RenameError::CapacityExceeded {
            padding,
            max_index,
            capacity,
        });
    }
    Ok(())
}

/// Compute the full mapping: `<zero-padded index><lowercased extension>`.
pub fn build_plan(files: &[PathBuf], folder: &Path, start: usize, padding: usize) -> RenamePlan {
    let steps = files
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let mut name = format!("{:0width$}", start + i, width = padding);
            if let Some(ext) = extension_lowercase(source) {
                name.push('.');
                name.push_str(&ext);
            }
            (source.clone(), folder.join(name))
        })
        .collect();
    RenamePlan { steps }
}

/// Fail when a computed target collides with an existing file that is not
/// itself part of the rename set. Runs before any mutation.
pub fn check_collisions(folder: &Path, plan: &RenamePlan) -> Result<(), RenameError> {
    let sources: HashSet<&PathBuf> = plan.steps.iter().map(|(source, _)| source).collect();
    let targets: HashSet<&PathBuf> = plan.steps.iter().map(|(_, target)| target).collect();

    let mut collisions: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| !sources.contains(path) && targets.contains(path))
        .collect();
    collisions.sort();

    if collisions.is_empty() {
        Ok(())
    } else {
        Err(RenameError::TargetCollision(collisions))
    }
}

fn temp_path(folder: &Path, index: usize, ext: &Option<String>) -> PathBuf {
    let suffix: u32 = rand::thread_rng().gen();
    let mut name = format!(".tmp_ren_{:08x}_{}", suffix, index);
    if let Some(ext) = ext {
        name.push('.');
        name.push_str(ext);
    }
    folder.join(name)
}

/// Perform the staged rename: all sources to temporary names, then all
/// temporaries to final names. On failure, remaining temporaries are moved to
/// `recovered_*` names; original names are not reconstructable from them.
pub fn execute_plan(folder: &Path, plan: &RenamePlan) -> Result<(), RenameError> {
    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(plan.len());

    let result = (|| -> io::Result<()> {
        for (index, (source, target)) in plan.steps.iter().enumerate() {
            let ext = extension_lowercase(source);
            let mut temp = temp_path(folder, index, &ext);
            while temp.exists() {
                temp = temp_path(folder, index, &ext);
            }
            fs::rename(source, &temp)?;
            staged.push((temp, target.clone()));
        }
        for (temp, target) in &staged {
            fs::rename(temp, target)?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => Ok(()),
        Err(source) => {
            error!("Error during rename: {}", source);
            error!("Attempting to rollback partial renames...");
            let mut recovered = 0;
            for (temp, _) in &staged {
                if !temp.exists() {
                    continue;
                }
                let recovery_name = temp
                    .file_name()
                    .map(|n| format!("recovered_{}", n.to_string_lossy().trim_start_matches('.')));
                if let Some(name) = recovery_name {
                    if fs::rename(temp, folder.join(name)).is_ok() {
                        recovered += 1;
                    }
                }
            }
            warn!(
                "Rollback moved {} staged files to recovered_* names; original names may not be fully restored.",
                recovered
            );
            Err(RenameError::TransactionFailed { source })
        }
    }
}

/// Run the full COLLECT -> VALIDATE -> (DRY-RUN | STAGE -> COMMIT) pipeline.
pub fn run(args: &RenameArgs) -> Result<(), RenameError> {
    let folder = &args.folder;
    if !folder.is_dir() {
        return Err(RenameError::InvalidDirectory(folder.clone()));
    }

    let exts = normalize_extensions(&args.exts);
    let files = collect_files(folder, &exts, args.sort)?;
    if files.is_empty() {
        info!("No files found for the given extensions: {:?}", exts);
        return Ok(());
    }

    check_capacity(args.start, files.len(), args.padding, args.force)?;
    let plan = build_plan(&files, folder, args.start, args.padding);
    check_collisions(folder, &plan)?;

    if args.dry_run {
        println!("Dry-run: planned renames:");
        for (source, target) in &plan.steps {
            println!(
                "  {} -> {}",
                source.file_name().unwrap_or_default().to_string_lossy(),
                target.file_name().unwrap_or_default().to_string_lossy()
            );
        }
        println!("Total files: {}", plan.len());
        return Ok(());
    }

    execute_plan(folder, &plan)?;
    info!(
        "Renamed {} files in \"{}\" starting at {} with padding {}.",
        plan.len(),
        folder.display(),
        args.start,
        args.padding
    );
    Ok(())
}
