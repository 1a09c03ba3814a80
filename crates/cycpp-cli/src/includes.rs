//! Include directory arguments.

use std::path::PathBuf;

/// Expand `-I` values. A single value may hold a CMake style list
/// separated by `;`, or a `:` separated search path.
pub fn split_includes(values: &[String]) -> Vec<PathBuf> {
    match values {
        [single] if single.contains(';') => split(single, ';'),
        [single] if single.contains(':') => split(single, ':'),
        _ => values.iter().map(PathBuf::from).collect(),
    }
}

fn split(value: &str, delimiter: char) -> Vec<PathBuf> {
    value
        .split(delimiter)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(dirs: &[&str]) -> Vec<PathBuf> {
        dirs.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_semicolon_list() {
        let values = vec!["/opt/cyclus/include;src;".to_string()];
        assert_eq!(split_includes(&values), paths(&["/opt/cyclus/include", "src"]));
    }

    #[test]
    fn test_colon_list() {
        let values = vec!["a:b".to_string()];
        assert_eq!(split_includes(&values), paths(&["a", "b"]));
    }

    #[test]
    fn test_repeated_values_are_kept_whole() {
        let values = vec!["a:b".to_string(), "c".to_string()];
        assert_eq!(split_includes(&values), paths(&["a:b", "c"]));
        assert!(split_includes(&[]).is_empty());
    }
}
