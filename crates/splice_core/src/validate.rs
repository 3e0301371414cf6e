use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Check that every path lives in an existing directory and carries one of
/// the allowed extensions.
pub fn validate_paths<P: AsRef<Path>>(paths: &[P], allowed_extensions: &[String]) -> Result<()> {
    for path in paths {
        validate_path(path.as_ref(), allowed_extensions)?;
    }
    Ok(())
}

pub fn validate_path(path: &Path, allowed_extensions: &[String]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(CoreError::PathNotFound(path.to_path_buf())),
    };
    if !parent.is_dir() {
        return Err(CoreError::PathNotFound(path.to_path_buf()));
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !allowed_extensions.iter().any(|a| a == ext) {
        return Err(CoreError::UnsupportedFormat {
            path: path.to_path_buf(),
            allowed: allowed_extensions.join(", "),
        });
    }
    Ok(())
}

/// Append `.{extension}` when the path does not already end with it.
pub fn ensure_extension(path: &Path, extension: &str) -> PathBuf {
    if path.extension().and_then(|e| e.to_str()) == Some(extension) {
        path.to_path_buf()
    } else {
        let mut p = path.to_path_buf();
        let mut name = p.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(extension);
        p.set_file_name(name);
        p
    }
}

/// Suffix then validate an output location.
pub fn prepare_output(path: &Path, extension: &str, allowed_extensions: &[String]) -> Result<PathBuf> {
    let path = ensure_extension(path, extension);
    validate_path(&path, allowed_extensions)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mp4() -> Vec<String> {
        vec!["mp4".to_string()]
    }

    #[test]
    fn accepts_existing_directory_and_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        assert!(validate_path(&path, &mp4()).is_ok());
    }

    #[test]
    fn rejects_missing_parent_directory() {
        let result = validate_path(Path::new("/some/incorrect/path/asdf.mp4"), &mp4());
        assert!(matches!(result, Err(CoreError::PathNotFound(_))));
    }

    #[test]
    fn rejects_wrong_extension() {
        let dir = TempDir::new().unwrap();
        let result = validate_path(&dir.path().join("clip.avi"), &mp4());
        assert!(matches!(result, Err(CoreError::UnsupportedFormat { .. })));

        let result = validate_path(&dir.path().join("clip"), &mp4());
        assert!(matches!(result, Err(CoreError::UnsupportedFormat { .. })));
    }

    #[test]
    fn relative_path_uses_current_directory() {
        assert!(validate_path(Path::new("clip.mp4"), &mp4()).is_ok());
    }

    #[test]
    fn validate_paths_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("a.mp4");
        let bad = dir.path().join("b.mkv");
        let result = validate_paths(&[good, bad.clone()], &mp4());
        match result {
            Err(CoreError::UnsupportedFormat { path, .. }) => assert_eq!(path, bad),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn extension_appended_if_missing() {
        assert_eq!(
            ensure_extension(Path::new("/tmp/out"), "mp4"),
            PathBuf::from("/tmp/out.mp4")
        );
        assert_eq!(
            ensure_extension(Path::new("/tmp/out.mp4"), "mp4"),
            PathBuf::from("/tmp/out.mp4")
        );
        assert_eq!(
            ensure_extension(Path::new("/tmp/out.mov"), "mp4"),
            PathBuf::from("/tmp/out.mov.mp4")
        );
    }

    #[test]
    fn prepare_output_suffixes_then_validates() {
        let dir = TempDir::new().unwrap();
        let out = prepare_output(&dir.path().join("result"), "mp4", &mp4()).unwrap();
        assert_eq!(out, dir.path().join("result.mp4"));

        let missing = prepare_output(Path::new("/no/such/dir/result"), "mp4", &mp4());
        assert!(matches!(missing, Err(CoreError::PathNotFound(_))));
    }
}
