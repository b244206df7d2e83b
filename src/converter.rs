// src/converter.rs

use crate::config::{
    Config, ConfigError, DEFAULT_VID_FORMAT, DEFAULT_VID_OUTPUT_DIR, KEY_FFMPEG_CMD,
    KEY_VID_FORMAT, KEY_VID_OUTPUT_DIR,
};
use crate::templater::{expand, TemplateError, TemplateValues};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use thiserror::Error;

// Type alias for the shared config handle, reloaded before every conversion.
pub type SharedConfig = Arc<Mutex<Config>>;

/// Number of trailing stderr lines kept in an `Encoder` error.
const STDERR_TAIL_LINES: usize = 15;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("failed to launch encoder '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("encoder failed ({status}): {stderr}")]
    Encoder { status: ExitStatus, stderr: String },
    #[error("encoder finished but '{}' was not produced", .0.display())]
    MissingOutput(PathBuf),
    #[error("unable to create output directory '{}': {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Turns numbers into videos by running the configured encoder command.
#[derive(Debug, Clone)]
pub struct Converter {
    config: SharedConfig,
}

impl Converter {
    pub fn new(config: SharedConfig) -> Self {
        Converter { config }
    }

    fn lock_config(&self) -> MutexGuard<'_, Config> {
        // `load` replaces the values wholesale, so a poisoned guard is still consistent.
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates `vid_output_dir` if it does not exist yet and returns it.
    pub fn ensure_output_dir(&self) -> Result<PathBuf, ConvertError> {
        let dir = output_dir(&self.lock_config());
        fs::create_dir_all(&dir).map_err(|source| ConvertError::OutputDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Reloads the config from disk and expands the encoder command for `num`.
    ///
    /// The config lock is released before this returns, so the encoder never
    /// runs while holding it.
    pub fn expand_command(&self, num: u64) -> Result<Vec<String>, ConvertError> {
        let (template, values) = {
            let mut config = self.lock_config();
            // Pick up any manual edits made to the document since the last request.
            config.load()?;
            let template = config.require_str_list(KEY_FFMPEG_CMD)?;
            let values = TemplateValues {
                num,
                vid_format: config.get_str_or(KEY_VID_FORMAT, DEFAULT_VID_FORMAT),
                vid_output_dir: output_dir(&config).to_string_lossy().into_owned(),
            };
            (template, values)
        };
        Ok(expand(&template, &values)?)
    }

    /// Converts `num` to a video and returns the path of the produced file.
    ///
    /// Blocks until the encoder process exits.
    ///
    /// # Errors
    ///
    /// * `ConvertError::Config` / `ConvertError::Template` if the command cannot be built.
    /// * `ConvertError::Spawn` if the encoder cannot be started.
    /// * `ConvertError::Encoder` if it exits with a non-zero status.
    /// * `ConvertError::MissingOutput` if it exits cleanly without writing the output path.
    pub fn convert(&self, num: u64) -> Result<PathBuf, ConvertError> {
        let cmd_list = self.expand_command(num)?;
        // `expand` never returns an empty list.
        let (program, args) = cmd_list.split_first().ok_or(TemplateError::Empty)?;
        let output_path = PathBuf::from(args.last().unwrap_or(program));

        let program_path = resolve_program(program);
        log::debug!(
            "Running encoder '{}' with args {:?}",
            program_path.display(),
            args
        );

        let output = Command::new(&program_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ConvertError::Spawn {
                program: program_path.display().to_string(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            log::debug!("Encoder stderr for num {}:\n{}", num, stderr.trim_end());
        }

        if !output.status.success() {
            log::error!("Encoder failed for num {} (status: {})", num, output.status);
            return Err(ConvertError::Encoder {
                status: output.status,
                stderr: tail_lines(&stderr, STDERR_TAIL_LINES),
            });
        }

        match fs::metadata(&output_path) {
            Ok(meta) if meta.is_file() => {
                if meta.len() == 0 {
                    log::warn!("Encoder produced an empty file at '{}'", output_path.display());
                }
            }
            _ => return Err(ConvertError::MissingOutput(output_path)),
        }

        log::info!("Converted num {} to '{}'", num, output_path.display());
        Ok(output_path)
    }
}

fn output_dir(config: &Config) -> PathBuf {
    let dir = config.get_str_or(KEY_VID_OUTPUT_DIR, DEFAULT_VID_OUTPUT_DIR);
    PathBuf::from(shellexpand::tilde(&dir).into_owned())
}

fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}

/// Locates the encoder executable.
///
/// A bare program name is searched in the following locations:
/// 1. Next to the application executable.
/// 2. In a `tools` subdirectory next to the executable.
/// 3. In `CARGO_MANIFEST_DIR/tools` (debug builds only, for development).
/// 4. In the system's PATH.
///
/// Names containing a path separator are used as given.
fn resolve_program(program: &str) -> PathBuf {
    let as_given = PathBuf::from(program);
    if as_given.components().count() != 1 {
        return as_given;
    }

    let file_name = if cfg!(windows) && Path::new(program).extension().is_none() {
        format!("{}{}", program, env::consts::EXE_SUFFIX)
    } else {
        program.to_string()
    };

    let mut candidates = Vec::new();
    if let Some(exe_dir) = env::current_exe().ok().as_deref().and_then(Path::parent) {
        candidates.push(exe_dir.join(&file_name));
        candidates.push(exe_dir.join("tools").join(&file_name));
    }
    if cfg!(debug_assertions) {
        if let Ok(manifest_dir) = env::var("CARGO_MANIFEST_DIR") {
            candidates.push(PathBuf::from(manifest_dir).join("tools").join(&file_name));
        }
    }

    candidates
        .into_iter()
        .find(|path| path.is_file())
        .unwrap_or(as_given)
}
