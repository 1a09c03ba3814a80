//! Re-insert `#line` directives so compiler diagnostics in generated code
//! point back into the original file.
//!
//! The generated lines are aligned against the original lines with a
//! longest-common-subsequence diff, and a directive is inserted at the
//! start of every run of equal lines.

use similar::{capture_diff_slices, Algorithm, DiffOp};

/// A run of `len` equal lines starting at `a` in the original and `b` in
/// the generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub a: usize,
    pub b: usize,
    pub len: usize,
}

/// Runs of equal lines shared by `a` and `b`, in increasing order, with
/// adjacent runs merged.
pub fn matching_blocks(a: &[&str], b: &[&str]) -> Vec<Block> {
    let mut merged: Vec<Block> = Vec::new();
    for op in capture_diff_slices(Algorithm::Lcs, a, b) {
        let DiffOp::Equal {
            old_index,
            new_index,
            len,
        } = op
        else {
            continue;
        };
        match merged.last_mut() {
            Some(last) if last.a + last.len == old_index && last.b + last.len == new_index => {
                last.len += len;
            }
            _ => merged.push(Block {
                a: old_index,
                b: new_index,
                len,
            }),
        }
    }
    merged
}

/// `generated` with `#line <n> "<filename>"` before every block of lines
/// it shares with `original`.
pub fn insert_line_directives(generated: &str, original: &str, filename: &str) -> String {
    let orig_lines: Vec<&str> = original.lines().collect();
    let mut new_lines: Vec<String> = generated.lines().map(str::to_string).collect();
    let blocks = {
        let new_refs: Vec<&str> = new_lines.iter().map(String::as_str).collect();
        matching_blocks(&orig_lines, &new_refs)
    };
    for block in blocks.iter().rev() {
        new_lines.insert(block.b, format!("#line {} \"{filename}\"", block.a + 1));
    }
    new_lines.join("\n")
}
