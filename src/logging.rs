// src/logging.rs

use crate::config::LOG_FILE_NAME;
use env_logger::{Builder, Env, Target};
use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

/// Initializes the global logger.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`. When
/// `log_dir` is given, the directory is created if needed and log lines are
/// appended to `num2vid_log` inside it instead of going to stderr.
///
/// Returns the path of the log file, if one is used.
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be created.
pub fn init_logging(log_dir: Option<&Path>, default_filter: &str) -> io::Result<Option<PathBuf>> {
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));

    let log_file = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = dir.join(LOG_FILE_NAME);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            builder.target(Target::Pipe(Box::new(file)));
            Some(path)
        }
        None => None,
    };

    // Only the first call installs a logger; later calls are harmless no-ops.
    builder.try_init().ok();
    Ok(log_file)
}
