use clap::Parser;
use log::error;
use std::process;

use yolo_dataset_prep::config::ConvertArgs;
use yolo_dataset_prep::dataset::process_dataset;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = ConvertArgs::parse();

    if !args.json_dir.is_dir() {
        error!(
            "The specified json_dir does not exist: {}",
            args.json_dir.display()
        );
        process::exit(2);
    }
    if args.train_size + args.val_size > 1.0 {
        error!(
            "train_size + val_size must not exceed 1.0 (got {} + {})",
            args.train_size, args.val_size
        );
        process::exit(2);
    }

    if let Err(e) = process_dataset(&args) {
        error!("Conversion failed: {}", e);
        process::exit(1);
    }
}
