//! In-memory asset streams.
//!
//! An [`AssetStream`] is read from a glob (or an explicit file list), passed
//! through transformation steps, and written to a destination directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use walkdir::WalkDir;

/// Errors that can occur in the asset pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Invalid glob {pattern}: {message}")]
    Glob { pattern: String, message: String },

    #[error("File not found: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to read {path}: {message}")]
    ReadError { path: PathBuf, message: String },

    #[error("{0} is not valid UTF-8")]
    Encoding(PathBuf),

    #[error("Style error in {path}: {message}")]
    StyleError { path: PathBuf, message: String },

    #[error("Script error in {path}: {message}")]
    ScriptError { path: PathBuf, message: String },

    #[error("Image error in {path}: {message}")]
    ImageError { path: PathBuf, message: String },

    #[error("Failed to write {path}: {message}")]
    WriteError { path: PathBuf, message: String },
}

/// A file flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFile {
    /// Path relative to the glob base, used for the output location
    pub path: PathBuf,

    /// Where the file was read from
    pub origin: PathBuf,

    /// File contents
    pub contents: Vec<u8>,
}

impl AssetFile {
    /// Create a file record.
    pub fn new(path: impl Into<PathBuf>, origin: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            origin: origin.into(),
            contents,
        }
    }

    /// Contents as UTF-8 text.
    pub fn text(&self) -> Result<&str, AssetError> {
        std::str::from_utf8(&self.contents).map_err(|_| AssetError::Encoding(self.origin.clone()))
    }

    /// Replace the contents.
    pub fn with_contents(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.contents = contents.into();
        self
    }

    /// Replace the file extension of the output path.
    pub fn with_extension(mut self, ext: &str) -> Self {
        self.path.set_extension(ext);
        self
    }

    /// Whether the file name starts with an underscore (a Sass partial).
    pub fn is_partial(&self) -> bool {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('_'))
    }
}

/// An ordered sequence of files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetStream {
    files: Vec<AssetFile>,
}

impl AssetStream {
    /// Create a stream from file records.
    pub fn new(files: Vec<AssetFile>) -> Self {
        Self { files }
    }

    /// Read every file under `root` matching `pattern`.
    ///
    /// Output paths are relative to the pattern's glob base. Files are
    /// sorted by path. A base directory that does not exist yields an
    /// empty stream.
    pub fn src(root: &Path, pattern: &str) -> Result<Self, AssetError> {
        let matcher = compile_glob(pattern)?;
        let base = glob_base(pattern);
        let base_dir = root.join(&base);

        if !base_dir.exists() {
            tracing::debug!("No files for {}: {} does not exist", pattern, base_dir.display());
            return Ok(Self::default());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&base_dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative_to_root = path.strip_prefix(root).unwrap_or(path);
            if !matcher.is_match(relative_to_root) {
                continue;
            }

            let contents = read(path)?;
            let relative = path.strip_prefix(&base_dir).unwrap_or(path);
            files.push(AssetFile::new(relative, path, contents));
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self { files })
    }

    /// Read an explicit list of files, keeping list order.
    ///
    /// Unlike [`AssetStream::src`], a missing file is an error.
    pub fn from_paths(root: &Path, paths: &[String]) -> Result<Self, AssetError> {
        let files = paths
            .iter()
            .map(|p| {
                let path = root.join(p);
                if !path.is_file() {
                    return Err(AssetError::MissingFile(path));
                }
                let name = path.file_name().map(PathBuf::from).unwrap_or_default();
                let contents = read(&path)?;
                Ok(AssetFile::new(name, path, contents))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { files })
    }

    /// Files in stream order.
    pub fn files(&self) -> &[AssetFile] {
        &self.files
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the stream is empty.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Apply a fallible step to every file. The first error ends the stream.
    pub fn map<F>(self, step: F) -> Result<Self, AssetError>
    where
        F: FnMut(AssetFile) -> Result<AssetFile, AssetError>,
    {
        let files = self
            .files
            .into_iter()
            .map(step)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { files })
    }

    /// Keep only the files matching a predicate.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: FnMut(&AssetFile) -> bool,
    {
        Self {
            files: self.files.into_iter().filter(predicate).collect(),
        }
    }

    /// Join all files, newline separated, into a single file named `name`.
    pub fn concat(self, name: &str) -> Self {
        if self.files.is_empty() {
            return self;
        }

        let origin = self.files[0].origin.clone();
        let mut contents = Vec::new();
        for (i, file) in self.files.into_iter().enumerate() {
            if i > 0 {
                contents.push(b'\n');
            }
            contents.extend(file.contents);
        }

        Self {
            files: vec![AssetFile::new(name, origin, contents)],
        }
    }

    /// Write every file below `dir`, creating directories as needed.
    pub fn dest(&self, dir: &Path) -> Result<Vec<PathBuf>, AssetError> {
        let mut written = Vec::with_capacity(self.files.len());

        for file in &self.files {
            let target = dir.join(&file.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| AssetError::WriteError {
                    path: parent.to_path_buf(),
                    message: e.to_string(),
                })?;
            }
            fs::write(&target, &file.contents).map_err(|e| AssetError::WriteError {
                path: target.clone(),
                message: e.to_string(),
            })?;
            written.push(target);
        }

        Ok(written)
    }
}

impl IntoIterator for AssetStream {
    type Item = AssetFile;
    type IntoIter = std::vec::IntoIter<AssetFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl FromIterator<AssetFile> for AssetStream {
    fn from_iter<I: IntoIterator<Item = AssetFile>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Compile a glob where `*` does not cross directory separators.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, AssetError> {
    let glob = GlobBuilder::new(pattern.trim_start_matches("./"))
        .literal_separator(true)
        .build()
        .map_err(|e| AssetError::Glob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
    Ok(glob.compile_matcher())
}

/// The leading directories of a pattern that contain no glob syntax.
///
/// `src/scss/**/*.scss` has base `src/scss`; a plain file path has its
/// parent directory as base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let mut base = PathBuf::new();
    let path = Path::new(pattern);
    let mut components = path.components().peekable();

    while let Some(component) = components.next() {
        if components.peek().is_none() {
            // The last component is the file pattern itself.
            break;
        }
        match component {
            Component::CurDir => continue,
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                if part.contains(['*', '?', '[', '{']) {
                    break;
                }
                base.push(&*part);
            }
            other => base.push(other.as_os_str()),
        }
    }

    base
}

fn read(path: &Path) -> Result<Vec<u8>, AssetError> {
    fs::read(path).map_err(|e| AssetError::ReadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
