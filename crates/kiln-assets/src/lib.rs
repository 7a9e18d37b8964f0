//! Asset pipeline for kiln builds.
//!
//! Reads source files through globs into [`AssetStream`]s, runs them through
//! the style, script, markup, and image transforms, and writes the results
//! into the distribution tree.

pub mod config;
pub mod html;
pub mod images;
pub mod pipeline;
pub mod scripts;
pub mod stream;
pub mod styles;

pub use config::{BundleConfig, PathConfig, PipelineConfig};
pub use pipeline::{Pipeline, StepReport};
pub use stream::{compile_glob, glob_base, AssetError, AssetFile, AssetStream};
pub use styles::OutputStyle;
