//! Path configuration for the asset pipeline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Source globs and destination directories, relative to the project root.
#[derive(Debug, Clone, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_html")]
    pub html: String,
    #[serde(default = "default_scss")]
    pub scss: String,
    #[serde(default = "default_js")]
    pub js: String,
    #[serde(default = "default_img")]
    pub img: String,

    /// Distribution root
    #[serde(default = "default_dist")]
    pub dist: String,
    #[serde(default = "default_css_dest")]
    pub css_dest: String,
    #[serde(default = "default_js_dest")]
    pub js_dest: String,
    #[serde(default = "default_img_dest")]
    pub img_dest: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            html: default_html(),
            scss: default_scss(),
            js: default_js(),
            img: default_img(),
            dist: default_dist(),
            css_dest: default_css_dest(),
            js_dest: default_js_dest(),
            img_dest: default_img_dest(),
        }
    }
}

fn default_html() -> String {
    "src/*.html".to_string()
}
fn default_scss() -> String {
    "src/scss/**/*.scss".to_string()
}
fn default_js() -> String {
    "src/js/**/*.js".to_string()
}
fn default_img() -> String {
    "src/img/*".to_string()
}
fn default_dist() -> String {
    "dist".to_string()
}
fn default_css_dest() -> String {
    "dist/css".to_string()
}
fn default_js_dest() -> String {
    "dist/js".to_string()
}
fn default_img_dest() -> String {
    "dist/img".to_string()
}

/// Output file names for concatenated bundles.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleConfig {
    #[serde(default = "default_scripts_bundle")]
    pub scripts: String,
    #[serde(default = "default_vendor_bundle")]
    pub vendor: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            scripts: default_scripts_bundle(),
            vendor: default_vendor_bundle(),
        }
    }
}

fn default_scripts_bundle() -> String {
    "main.js".to_string()
}
fn default_vendor_bundle() -> String {
    "vendor.js".to_string()
}

/// Everything the transformation steps need to know about a project.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Project root all paths resolve against
    #[serde(skip, default = "default_root")]
    pub root: PathBuf,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub bundles: BundleConfig,

    /// Third-party scripts concatenated, in order, into the vendor bundle
    #[serde(default = "default_vendor")]
    pub vendor: Vec<String>,

    /// Build block name -> asset references written in its place
    #[serde(default = "default_html_blocks")]
    pub html_blocks: BTreeMap<String, Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            paths: PathConfig::default(),
            bundles: BundleConfig::default(),
            vendor: default_vendor(),
            html_blocks: default_html_blocks(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_vendor() -> Vec<String> {
    vec![
        "node_modules/jquery/dist/jquery.min.js".to_string(),
        "node_modules/slick-carousel/slick/slick.min.js".to_string(),
    ]
}

fn default_html_blocks() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("css".to_string(), vec!["./css/main.css".to_string()]),
        (
            "js".to_string(),
            vec!["./js/vendor.js".to_string(), "./js/main.js".to_string()],
        ),
    ])
}

impl PipelineConfig {
    /// Same configuration rooted at another directory.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
