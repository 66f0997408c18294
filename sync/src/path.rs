//! Mapping store keys onto host paths.

use std::path::{Path, PathBuf};

use crate::error::KeyError;

/// The file backing `key` below `root`.
///
/// Store keys are always `/`-separated; each segment becomes one host path
/// component. Empty and `.` segments are dropped. A `..` segment, or a key
/// with no segments left, is rejected so no key can name a file outside
/// `root` or `root` itself.
pub fn key_path(root: &Path, key: &str) -> Result<PathBuf, KeyError> {
    let mut path = root.to_path_buf();
    let mut segments = 0usize;

    for segment in key.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(KeyError::InvalidKey(key.to_string())),
            segment if segment.contains('\\') && cfg!(windows) => {
                return Err(KeyError::InvalidKey(key.to_string()));
            }
            segment => {
                path.push(segment);
                segments += 1;
            }
        }
    }

    if segments == 0 {
        return Err(KeyError::InvalidKey(key.to_string()));
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_nested_key() {
        let root = Path::new("/srv/app/");
        assert_eq!(
            key_path(root, "nested/dir/config").unwrap(),
            Path::new("/srv/app").join("nested").join("dir").join("config")
        );
    }

    #[test]
    fn test_redundant_separators_are_dropped() {
        let root = Path::new("/srv/app");
        assert_eq!(
            key_path(root, "a//./b").unwrap(),
            Path::new("/srv/app").join("a").join("b")
        );
    }

    #[test]
    fn test_parent_segments_are_rejected() {
        let root = Path::new("/srv/app");
        assert!(matches!(
            key_path(root, "../../etc/passwd"),
            Err(KeyError::InvalidKey(_))
        ));
        assert!(matches!(
            key_path(root, "a/../../b"),
            Err(KeyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert!(matches!(
            key_path(Path::new("/srv"), "/./"),
            Err(KeyError::InvalidKey(_))
        ));
    }
}
