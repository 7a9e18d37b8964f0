//! Stylesheet compilation: Sass to CSS, then vendor prefixing.

use std::path::Path;

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use crate::stream::{AssetError, AssetFile};

/// CSS output formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStyle {
    /// One declaration per line, for development
    Expanded,
    /// No whitespace, for deployment
    Compressed,
}

impl OutputStyle {
    fn grass(self) -> grass::OutputStyle {
        match self {
            OutputStyle::Expanded => grass::OutputStyle::Expanded,
            OutputStyle::Compressed => grass::OutputStyle::Compressed,
        }
    }
}

/// Browsers vendor prefixes are generated for.
///
/// Roughly the "last 2 versions, not dead" set autoprefixer defaults to,
/// pinned so builds are reproducible.
pub fn default_browsers() -> Browsers {
    Browsers {
        android: Some(version(4, 4)),
        chrome: Some(version(80, 0)),
        edge: Some(version(18, 0)),
        firefox: Some(version(68, 0)),
        ie: Some(version(11, 0)),
        ios_saf: Some(version(12, 0)),
        opera: Some(version(67, 0)),
        safari: Some(version(12, 0)),
        samsung: Some(version(10, 0)),
    }
}

fn version(major: u32, minor: u32) -> u32 {
    (major << 16) | (minor << 8)
}

/// Compile a Sass file and apply vendor prefixes.
///
/// `@import`/`@use` resolve relative to the file's origin directory.
/// Expanded output ends with an inline source map. grass emits no map of
/// its own, so the map covers the prefixing step: it points into the
/// compiled CSS, which is embedded as the source content under the Sass
/// file's name, not into the `.scss` lines.
pub fn compile(file: AssetFile, style: OutputStyle) -> Result<AssetFile, AssetError> {
    let source = file.text()?.to_string();
    let css = compile_scss(&file.origin, source, style)?;
    let css = autoprefix(&file.origin, &css, style)?;
    Ok(file.with_contents(css).with_extension("css"))
}

/// Compile Sass source to CSS.
pub fn compile_scss(origin: &Path, source: String, style: OutputStyle) -> Result<String, AssetError> {
    let mut options = grass::Options::default().style(style.grass());
    if let Some(dir) = origin.parent() {
        options = options.load_path(dir);
    }

    grass::from_string(source, &options).map_err(|e| AssetError::StyleError {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })
}

/// Add vendor prefixes for [`default_browsers`] using lightningcss.
///
/// Expanded output gets an inline source map back to `css`.
pub fn autoprefix(origin: &Path, css: &str, style: OutputStyle) -> Result<String, AssetError> {
    let style_error = |message: String| AssetError::StyleError {
        path: origin.to_path_buf(),
        message,
    };

    let targets = Targets::from(default_browsers());
    let map_error = |e: parcel_sourcemap::SourceMapError| {
        style_error(format!("CSS source map error: {}", e))
    };
    let mut map = match style {
        OutputStyle::Expanded => Some(source_map(origin, css).map_err(map_error)?),
        OutputStyle::Compressed => None,
    };

    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: origin.display().to_string(),
            ..Default::default()
        },
    )
    .map_err(|e| style_error(format!("CSS parse error: {}", e)))?;

    stylesheet
        .minify(MinifyOptions {
            targets: targets.clone(),
            ..Default::default()
        })
        .map_err(|e| style_error(format!("CSS prefix error: {}", e)))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: style == OutputStyle::Compressed,
            targets,
            source_map: map.as_mut(),
            ..Default::default()
        })
        .map_err(|e| style_error(format!("CSS print error: {}", e)))?;

    let mut code = printed.code;
    if let Some(map) = map.as_mut() {
        let url = map.to_data_url(None).map_err(map_error)?;
        code.push_str(&format!("\n/*# sourceMappingURL={} */\n", url));
    }
    Ok(code)
}

/// Empty map whose only source is `css`, named after the origin file.
fn source_map(origin: &Path, css: &str) -> Result<SourceMap, parcel_sourcemap::SourceMapError> {
    let name = origin
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| origin.display().to_string());

    let mut map = SourceMap::new("/");
    let index = map.add_source(&name);
    map.set_source_content(index as usize, css)?;
    Ok(map)
}
