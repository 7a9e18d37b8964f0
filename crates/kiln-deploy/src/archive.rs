//! Packing a project directory for upload.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

use crate::DeployError;

/// Prefix every archive entry is stored under.
pub const ENTRY_PREFIX: &str = "project";

/// A gzipped tarball of a project directory.
#[derive(Debug)]
pub struct Archive {
    /// Compressed tarball
    pub bytes: Vec<u8>,

    /// Number of files packed
    pub file_count: usize,

    /// Uncompressed size of the packed files in bytes
    pub project_size: u64,
}

/// Pack every file under `project` into a gzipped tarball.
///
/// Files are added in sorted path order under [`ENTRY_PREFIX`].
pub fn pack(project: &Path) -> Result<Archive, DeployError> {
    if !project.is_dir() {
        return Err(DeployError::MissingProject(project.to_path_buf()));
    }

    let archive_error = |e: std::io::Error| DeployError::ArchiveError(e.to_string());

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut file_count = 0;
    let mut project_size = 0;

    for entry in WalkDir::new(project)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let relative = path.strip_prefix(project).unwrap_or(path);
        let name: PathBuf = Path::new(ENTRY_PREFIX).join(relative);

        builder
            .append_path_with_name(path, &name)
            .map_err(archive_error)?;

        file_count += 1;
        project_size += entry.metadata().map(|m| m.len()).unwrap_or(0);
    }

    let mut encoder = builder.into_inner().map_err(archive_error)?;
    encoder.flush().map_err(archive_error)?;
    let bytes = encoder.finish().map_err(archive_error)?;

    Ok(Archive {
        bytes,
        file_count,
        project_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;

    use flate2::read::GzDecoder;
    use tempfile::tempdir;

    #[test]
    fn packs_files_under_prefix() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(temp.path().join("index.html"), "<html></html>").unwrap();
        fs::write(temp.path().join("css/main.css"), "a{}").unwrap();

        let archive = pack(temp.path()).unwrap();

        assert_eq!(archive.file_count, 2);
        assert_eq!(archive.project_size, 16);

        let mut tarball = tar::Archive::new(GzDecoder::new(archive.bytes.as_slice()));
        let mut entries: Vec<(String, String)> = tarball
            .entries()
            .unwrap()
            .map(|e| {
                let mut e = e.unwrap();
                let name = e.path().unwrap().display().to_string();
                let mut body = String::new();
                e.read_to_string(&mut body).unwrap();
                (name, body)
            })
            .collect();
        entries.sort();

        assert_eq!(
            entries,
            vec![
                ("project/css/main.css".to_string(), "a{}".to_string()),
                ("project/index.html".to_string(), "<html></html>".to_string()),
            ]
        );
    }

    #[test]
    fn missing_project_is_an_error() {
        let temp = tempdir().unwrap();

        let err = pack(&temp.path().join("dist")).unwrap_err();
        assert!(matches!(err, DeployError::MissingProject(_)));
    }
}
