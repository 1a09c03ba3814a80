//! # cycpp core
//!
//! The annotation passes of the cycpp preprocessor:
//! - statement segmentation of preprocessed source
//! - scope, alias and type tracking shared by both passes
//! - pass 2, which accumulates `#pragma cyclus var` / `note` / `exec`
//!   annotations into a per-class table
//! - pass 3, which expands generator directives into C++ methods
//!
//! Running the C preprocessor and re-inserting `#line` directives live in
//! the `cycpp` binary.

#![warn(clippy::all)]

pub mod accumulate;
pub mod chain;
pub mod codegen;
pub mod error;
pub mod filters;
pub mod location;
pub mod scope;
pub mod script;
pub mod segment;
pub mod table;
pub mod types;

use std::path::PathBuf;

pub use accumulate::accumulate_state;
pub use chain::{Chain, Filter, Machine, Pass};
pub use codegen::{generate_code, Generator, Mode, GENERATOR_NAMES};
pub use error::{CycppError, Result};
pub use script::ScriptError;
pub use segment::{Segmenter, Separator, Statement, StatementKind};
pub use table::{ClassRecord, ClassTable, EntityKind, VariableAnnotation};
pub use types::CanonicalType;

/// cycpp version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing at the default `info` level.
pub fn init_tracing() {
    init_tracing_with(false);
}

/// Initialize tracing for the passes, writing to stderr so generated code
/// on stdout stays clean. `RUST_LOG` takes precedence when set.
pub fn init_tracing_with(verbose: bool) {
    let default = if verbose {
        "cycpp_core=debug,cycpp_cli=debug"
    } else {
        "cycpp_core=info,cycpp_cli=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    // A second initialization (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Which text pass 3 rewrites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pass3Source {
    /// The preprocessor output that pass 2 read.
    #[default]
    Preprocessed,
    /// The original file with line continuations collapsed.
    Original,
}

/// Preprocessor run configuration
#[derive(Debug, Clone)]
pub struct CycppConfig {
    /// C preprocessor executable
    pub cpp_path: String,
    /// Arguments passed to the preprocessor before include flags
    pub cpp_args: Vec<String>,
    /// Include directories, passed as `-I<dir>`
    pub include_dirs: Vec<PathBuf>,
    /// Text rewritten by pass 3
    pub pass3_source: Pass3Source,
    /// Width at which the `annotations()` JSON literal is split
    pub annotation_wrap_width: usize,
}

impl Default for CycppConfig {
    fn default() -> Self {
        Self {
            cpp_path: "cpp".to_string(),
            cpp_args: ["-xc++", "-pipe", "-E", "-DCYCPP"]
                .into_iter()
                .map(String::from)
                .collect(),
            include_dirs: Vec::new(),
            pass3_source: Pass3Source::default(),
            annotation_wrap_width: 50,
        }
    }
}

impl CycppConfig {
    pub fn with_cpp_path(mut self, path: impl Into<String>) -> Self {
        self.cpp_path = path.into();
        self
    }

    pub fn with_include_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.include_dirs.extend(dirs);
        self
    }

    pub fn with_pass3_source(mut self, source: Pass3Source) -> Self {
        self.pass3_source = source;
        self
    }

    pub fn with_annotation_wrap_width(mut self, width: usize) -> Self {
        self.annotation_wrap_width = width;
        self
    }

    /// Full preprocessor argument list for `path`.
    pub fn cpp_command_args(&self, path: &std::path::Path) -> Vec<String> {
        let mut args = self.cpp_args.clone();
        args.extend(self.include_dirs.iter().map(|d| format!("-I{}", d.display())));
        args.push(path.display().to_string());
        args
    }
}

/// Run passes 2 and 3: accumulate annotations from the preprocessed
/// `canon` text, then expand the directives of `pass3_source`.
pub fn process(canon: &str, pass3_source: &str, config: &CycppConfig) -> Result<String> {
    let table = accumulate_state(canon)?;
    generate_code(pass3_source, table, config.annotation_wrap_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn test_default_config() {
        let config = CycppConfig::default();
        assert_eq!(config.cpp_path, "cpp");
        assert_eq!(config.pass3_source, Pass3Source::Preprocessed);
        assert_eq!(config.annotation_wrap_width, 50);
    }

    #[test]
    fn test_cpp_command_args() {
        let config = CycppConfig::default()
            .with_cpp_path("clang-cpp")
            .with_include_dirs([PathBuf::from("/opt/cyclus/include"), PathBuf::from("src")]);
        assert_eq!(
            config.cpp_command_args(Path::new("agent.cc")),
            vec!["-xc++", "-pipe", "-E", "-DCYCPP", "-I/opt/cyclus/include", "-Isrc", "agent.cc"]
        );
        assert_eq!(config.cpp_path, "clang-cpp");
    }

    #[test]
    fn test_process_passthrough() {
        let src = "int main() {\n  return 0;\n}\n";
        assert_eq!(process(src, src, &CycppConfig::default()).unwrap(), src);
    }
}
