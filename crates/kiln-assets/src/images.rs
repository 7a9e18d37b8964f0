//! Lossless image optimization.

use rayon::prelude::*;

use crate::stream::{AssetError, AssetFile, AssetStream};

/// Optimize a single image. PNGs are recompressed with oxipng; other
/// formats pass through unchanged.
pub fn optimize(file: AssetFile) -> Result<AssetFile, AssetError> {
    let is_png = file
        .path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));

    if !is_png {
        tracing::debug!("Copying {} unchanged", file.path.display());
        return Ok(file);
    }

    let options = oxipng::Options::from_preset(2);
    let optimized =
        oxipng::optimize_from_memory(&file.contents, &options).map_err(|e| AssetError::ImageError {
            path: file.origin.clone(),
            message: e.to_string(),
        })?;

    if optimized.len() < file.contents.len() {
        tracing::debug!(
            "{}: {} -> {} bytes",
            file.path.display(),
            file.contents.len(),
            optimized.len()
        );
        Ok(file.with_contents(optimized))
    } else {
        Ok(file)
    }
}

/// Optimize every image in a stream in parallel, keeping stream order.
pub fn optimize_all(stream: AssetStream) -> Result<AssetStream, AssetError> {
    let files: Vec<AssetFile> = stream.into_iter().collect();
    let optimized = files
        .into_par_iter()
        .map(optimize)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(AssetStream::new(optimized))
}

#[cfg(test)]
pub(crate) const TINY_PNG: [u8; 68] = [
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5, 0x1c, 0x0c,
    0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64, 0x60, 0x00, 0x00,
    0x00, 0x06, 0x00, 0x02, 0x30, 0x81, 0xd0, 0x2f, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44,
    0xae, 0x42, 0x60, 0x82,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimizes_png_without_growing_it() {
        let file = AssetFile::new("dot.png", "src/img/dot.png", TINY_PNG.to_vec());

        let out = optimize(file).unwrap();

        assert!(out.contents.len() <= TINY_PNG.len());
        assert_eq!(&out.contents[..8], &TINY_PNG[..8]);
    }

    #[test]
    fn copies_other_formats() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec();
        let file = AssetFile::new("logo.svg", "src/img/logo.svg", svg.clone());

        assert_eq!(optimize(file).unwrap().contents, svg);
    }

    #[test]
    fn rejects_corrupt_png() {
        let file = AssetFile::new("bad.png", "src/img/bad.png", b"not a png".to_vec());

        assert!(matches!(optimize(file), Err(AssetError::ImageError { .. })));
    }

    #[test]
    fn keeps_stream_order() {
        let stream = AssetStream::new(vec![
            AssetFile::new("b.svg", "b.svg", b"b".to_vec()),
            AssetFile::new("a.png", "a.png", TINY_PNG.to_vec()),
        ]);

        let out = optimize_all(stream).unwrap();
        let names: Vec<_> = out.files().iter().map(|f| f.path.display().to_string()).collect();

        assert_eq!(names, vec!["b.svg", "a.png"]);
    }
}
