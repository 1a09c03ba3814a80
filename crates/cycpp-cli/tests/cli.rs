//! End-to-end runs with a stand-in preprocessor that copies its input.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use cycpp_cli::compile;
use cycpp_core::{CycppConfig, Pass3Source};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// A `cpp` that emits a line marker and the file named by its last argument.
fn fake_cpp(dir: &Path) -> PathBuf {
    let path = dir.join("fake-cpp");
    fs::write(
        &path,
        "#!/bin/sh\nfor last; do :; done\nprintf '# 1 \"%s\"\\n' \"$last\"\ncat \"$last\"\n",
    )
    .unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

const AGENT: &str = "namespace cyclus {\n\
class Agent {};\n\
class Facility : public Agent {};\n\
}\n\
class Sink : public cyclus::Facility {\n \
public:\n  \
#pragma cyclus var {\"default\": 1.0}\n  \
double rate;\n  \
#pragma cyclus decl clone\n\
};\n";

fn setup() -> (TempDir, PathBuf, CycppConfig) {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("sink.h");
    fs::write(&source, AGENT).unwrap();
    let config = CycppConfig::default().with_cpp_path(fake_cpp(dir.path()).display().to_string());
    (dir, source, config)
}

#[test]
fn test_compile_preprocessed() {
    let (_dir, source, config) = setup();
    let out = compile(&source, &config).unwrap();
    let name = source.display().to_string();
    assert!(out.contains("\n  virtual cyclus::Agent* Clone();\n"), "{out}");
    assert!(out.contains(&format!("#line 1 \"{name}\"\nnamespace cyclus {{")), "{out}");
    assert!(!out.contains("#pragma cyclus decl"));
}

#[test]
fn test_compile_original_source() {
    let (_dir, source, config) = setup();
    let config = config.with_pass3_source(Pass3Source::Original);
    let out = compile(&source, &config).unwrap();
    assert!(!out.contains("# 1 \""), "{out}");
    assert!(out.contains("virtual cyclus::Agent* Clone();"));
}

#[test]
fn test_missing_preprocessor_fails() {
    let (_dir, source, _) = setup();
    let config = CycppConfig::default().with_cpp_path("/nonexistent/cpp");
    let err = compile(&source, &config).unwrap_err();
    assert!(format!("{err:#}").contains("/nonexistent/cpp"));
}

#[test]
fn test_passthrough_only_adds_line_directives() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("plain.cc");
    fs::write(&source, "int main() {\n  return 0;\n}\n").unwrap();
    let config = CycppConfig::default().with_cpp_path(fake_cpp(dir.path()).display().to_string());
    let out = compile(&source, &config).unwrap();
    let name = source.display().to_string();
    assert_eq!(
        out,
        format!("\n# 1 \"{name}\"\n#line 1 \"{name}\"\nint main() {{\n  return 0;\n}}")
    );
}
