use clap::Parser;
use log::error;
use std::process;

use yolo_dataset_prep::config::RenameArgs;
use yolo_dataset_prep::rename::{self, RenameError};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = RenameArgs::parse();

    if let Err(e) = rename::run(&args) {
        error!("{}", e);
        match &e {
            RenameError::CapacityExceeded { .. } => {
                error!("Either increase --padding or use --force to proceed (risking non-zero padding).");
            }
            RenameError::TargetCollision(paths) => {
                for path in paths {
                    error!("  {}", path.display());
                }
                error!("Move or remove these files first, or adjust your settings.");
            }
            _ => {}
        }
        process::exit(e.exit_code());
    }
}
