// src/ui.rs

use crate::config::{Config, DEFAULT_VID_FORMAT, KEY_LABEL_INSTRUCTIONS, KEY_VID_FORMAT};
use dialoguer::{theme::ColorfulTheme, Input};
use std::path::{Path, PathBuf};

const DEFAULT_INSTRUCTIONS: &str = "Pick a number and the server will turn it into a video.";

/// What the user asked the client to fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub num: u64,
    pub save_path: PathBuf,
}

/// Returns `~/{num}.{vid_format}`, or a path in the current directory if the
/// home directory cannot be determined.
pub fn default_save_path(num: u64, vid_format: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!("{}.{}", num, vid_format))
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_user_path(raw: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    Ok(PathBuf::from(shellexpand::full(raw)?.into_owned()))
}

/// Asks the user for a number within the configured range and where to save
/// the resulting video.
///
/// The number defaults to a random value in `[num_min, num_max]`. The save
/// prompt is skipped when `save_path` is already known.
///
/// # Errors
///
/// Returns an error if any dialoguer interaction fails or the path cannot be expanded.
pub fn prompt_submission(
    config: &Config,
    save_path: Option<PathBuf>,
    theme: &ColorfulTheme,
) -> Result<SubmitRequest, Box<dyn std::error::Error>> {
    println!(
        "\n{}\n",
        config.get_str_or(KEY_LABEL_INSTRUCTIONS, DEFAULT_INSTRUCTIONS)
    );

    let (num_min, num_max) = config.num_range();
    let num = Input::<u64>::with_theme(theme)
        .with_prompt(format!("Number to convert ({}-{})", num_min, num_max))
        .default(rand::random_range(num_min..=num_max))
        .validate_with(move |n: &u64| -> Result<(), String> {
            if (num_min..=num_max).contains(n) {
                Ok(())
            } else {
                Err(format!("Enter a number between {} and {}.", num_min, num_max))
            }
        })
        .interact_text()?;

    let save_path = match save_path {
        Some(path) => path,
        None => {
            let vid_format = config.get_str_or(KEY_VID_FORMAT, DEFAULT_VID_FORMAT);
            let suggested = default_save_path(num, &vid_format);
            let answer = Input::<String>::with_theme(theme)
                .with_prompt("Save video to (supports ~ and env vars)")
                .default(suggested.to_string_lossy().into_owned())
                .interact_text()?;
            expand_user_path(&answer)?
        }
    };

    Ok(SubmitRequest { num, save_path })
}

/// Attempts to open the given video file path with the system's default application.
pub fn play_video_locally(video_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    match open::that(video_path) {
        Ok(_) => {
            println!(
                "Attempting to open '{}' with the default system player.",
                video_path.display()
            );
            Ok(())
        }
        Err(e) => Err(format!(
            "Failed to open video locally with system handler for '{}': {}",
            video_path.display(),
            e
        )
        .into()),
    }
}
