//! The `cycpp` driver: preprocess, run the annotation passes, and map the
//! result back onto the original file with `#line` directives.

pub mod includes;
pub mod line_directives;
pub mod preprocess;

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cycpp_core::{process, CycppConfig, Pass3Source};

use crate::line_directives::insert_line_directives;
use crate::preprocess::{ensure_leading_newline, join_continuations, preprocess_file};

/// Run all three passes over the file at `path`.
pub fn compile(path: &Path, config: &CycppConfig) -> Result<String> {
    let canon = preprocess_file(path, config)
        .with_context(|| format!("pass 1 failed for {}", path.display()))?;
    let canon = ensure_leading_newline(canon);
    let original = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let pass3: Cow<'_, str> = match config.pass3_source {
        Pass3Source::Preprocessed => Cow::Borrowed(canon.as_str()),
        Pass3Source::Original => {
            Cow::Owned(join_continuations(&ensure_leading_newline(original.clone())))
        }
    };
    let generated = process(&canon, &pass3, config)
        .with_context(|| format!("failed to process {}", path.display()))?;
    Ok(insert_line_directives(
        &generated,
        &original,
        &path.display().to_string(),
    ))
}
