use crate::domain::{MplaceError, MplaceResult};
use std::fs;
use std::path::Path;

/// Canonical form of generated text: `\n` line endings and a trailing newline.
pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> MplaceResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| {
            MplaceError::io_system(
                "IO.ARTIFACT_DIRECTORY",
                format!("failed to create directory '{}': {}", parent.display(), source),
            )
        })?;
    }

    fs::write(path, normalize_text_artifact(content)).map_err(|source| {
        MplaceError::io_system(
            "IO.ARTIFACT_WRITE",
            format!("failed to write '{}': {}", path.display(), source),
        )
    })
}

pub fn read_text_artifact(path: &Path) -> MplaceResult<String> {
    fs::read_to_string(path).map_err(|source| {
        MplaceError::io_system(
            "IO.ARTIFACT_READ",
            format!("failed to read '{}': {}", path.display(), source),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{normalize_text_artifact, read_text_artifact, write_text_artifact};
    use crate::domain::MplaceErrorCategory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        let normalized = normalize_text_artifact("num_rows = 8;\r\nnum_cols = 12;\rcompounds = 1;");
        assert_eq!(normalized, "num_rows = 8;\nnum_cols = 12;\ncompounds = 1;\n");
        assert_eq!(normalize_text_artifact(""), "");
    }

    #[test]
    fn repeated_writes_produce_identical_bytes() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("nested").join("plate.dzn");
        let input = "num_rows = 8;\r\nnum_cols = 12;";

        write_text_artifact(&path, input).expect("first write should succeed");
        let first = fs::read(&path).expect("artifact should be readable");

        write_text_artifact(&path, input).expect("second write should succeed");
        let second = fs::read(&path).expect("artifact should be readable");

        assert_eq!(first, second);
        assert_eq!(second, b"num_rows = 8;\nnum_cols = 12;\n");
        assert_eq!(
            read_text_artifact(&path).expect("artifact should be readable"),
            "num_rows = 8;\nnum_cols = 12;\n"
        );
    }

    #[test]
    fn missing_files_are_io_errors() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = read_text_artifact(&temp.path().join("absent.dzn"))
            .expect_err("missing file should fail");
        assert_eq!(error.category(), MplaceErrorCategory::IoSystemError);
        assert_eq!(error.exit_code(), 3);
    }
}
