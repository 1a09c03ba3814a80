//! Pass 1: run the C preprocessor.

use std::path::Path;
use std::process::Command;

use cycpp_core::{CycppConfig, CycppError, Result};
use tracing::{debug, info};

/// Preprocess `path`, returning the expanded text with its line markers.
pub fn preprocess_file(path: &Path, config: &CycppConfig) -> Result<String> {
    let args = config.cpp_command_args(path);
    debug!(program = %config.cpp_path, ?args, "running preprocessor");
    let failure = |message: String| CycppError::Preprocessor {
        program: config.cpp_path.clone(),
        message,
    };

    let output = Command::new(&config.cpp_path)
        .args(&args)
        .output()
        .map_err(|e| failure(format!("make sure its path was passed correctly: {e}")))?;
    if !output.status.success() {
        return Err(failure(format!(
            "{}\n{}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim_end()
        )));
    }
    let text = String::from_utf8(output.stdout)
        .map_err(|e| failure(format!("output is not UTF-8: {e}")))?;
    info!(bytes = text.len(), "preprocessed");
    Ok(text)
}

/// A leading `#` must start a line of its own for the segmenter.
pub fn ensure_leading_newline(text: String) -> String {
    if text.starts_with('#') {
        format!("\n{text}")
    } else {
        text
    }
}

/// The original source as pass 3 reads it: line continuations joined.
pub fn join_continuations(text: &str) -> String {
    text.replace("\\\n", "")
}
