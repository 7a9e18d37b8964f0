//! Build steps composed from streams and transforms.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::html;
use crate::images;
use crate::scripts;
use crate::stream::{AssetError, AssetStream};
use crate::styles::{self, OutputStyle};

/// Result of a build step.
#[derive(Debug, Default)]
pub struct StepReport {
    /// Files written
    pub written: Vec<PathBuf>,

    /// Compiler errors that were logged instead of failing the step
    pub errors: Vec<String>,

    /// Step time in milliseconds
    pub duration_ms: u64,
}

impl StepReport {
    fn finish(mut self, start: Instant) -> Self {
        self.duration_ms = start.elapsed().as_millis() as u64;
        self
    }

    /// Whether the step logged any compiler errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// The asset build steps for one project.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline for a project.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The configuration this pipeline was built from.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Compile stylesheets with expanded output.
    ///
    /// A file that fails to compile is logged and skipped; the step still
    /// succeeds.
    pub fn compile_styles(&self) -> Result<StepReport, AssetError> {
        self.styles(OutputStyle::Expanded)
    }

    /// Compile stylesheets with compressed output.
    pub fn minify_styles(&self) -> Result<StepReport, AssetError> {
        self.styles(OutputStyle::Compressed)
    }

    fn styles(&self, style: OutputStyle) -> Result<StepReport, AssetError> {
        let start = Instant::now();
        let mut report = StepReport::default();

        let sources = AssetStream::src(&self.config.root, &self.config.paths.scss)?
            .filter(|f| !f.is_partial());

        let mut compiled = Vec::with_capacity(sources.len());
        for file in sources {
            match styles::compile(file, style) {
                Ok(css) => compiled.push(css),
                Err(e) => {
                    tracing::error!("{}", e);
                    report.errors.push(e.to_string());
                }
            }
        }

        let dest = self.config.resolve(&self.config.paths.css_dest);
        report.written = AssetStream::new(compiled).dest(&dest)?;
        Ok(report.finish(start))
    }

    /// Lower scripts and concatenate them into the scripts bundle.
    ///
    /// A transform failure is logged and ends the stream: nothing is
    /// written and the step still succeeds.
    pub fn compile_scripts(&self) -> Result<StepReport, AssetError> {
        let start = Instant::now();
        let mut report = StepReport::default();

        let sources = AssetStream::src(&self.config.root, &self.config.paths.js)?;
        match sources.map(scripts::transpile) {
            Ok(lowered) => {
                let dest = self.config.resolve(&self.config.paths.js_dest);
                report.written = lowered.concat(&self.config.bundles.scripts).dest(&dest)?;
            }
            Err(e) => {
                tracing::error!("{}", e);
                report.errors.push(e.to_string());
            }
        }

        Ok(report.finish(start))
    }

    /// Lower, concatenate, and minify scripts. Errors propagate.
    pub fn minify_scripts(&self) -> Result<StepReport, AssetError> {
        let start = Instant::now();

        let bundle = AssetStream::src(&self.config.root, &self.config.paths.js)?
            .map(scripts::transpile)?
            .concat(&self.config.bundles.scripts)
            .map(scripts::minify)?;

        let dest = self.config.resolve(&self.config.paths.js_dest);
        Ok(StepReport {
            written: bundle.dest(&dest)?,
            ..Default::default()
        }
        .finish(start))
    }

    /// Concatenate the vendor libraries, in order, into the vendor bundle.
    pub fn bundle_vendor(&self) -> Result<StepReport, AssetError> {
        let start = Instant::now();

        let bundle = AssetStream::from_paths(&self.config.root, &self.config.vendor)?
            .concat(&self.config.bundles.vendor);

        let dest = self.config.resolve(&self.config.paths.js_dest);
        Ok(StepReport {
            written: bundle.dest(&dest)?,
            ..Default::default()
        }
        .finish(start))
    }

    /// Point build blocks at the bundles and minify every page.
    pub fn minify_html(&self) -> Result<StepReport, AssetError> {
        let start = Instant::now();
        let blocks = &self.config.html_blocks;

        let pages = AssetStream::src(&self.config.root, &self.config.paths.html)?
            .map(|page| html::process(page, blocks))?;

        let dest = self.config.resolve(&self.config.paths.dist);
        Ok(StepReport {
            written: pages.dest(&dest)?,
            ..Default::default()
        }
        .finish(start))
    }

    /// Optimize images into the image destination.
    pub fn minify_images(&self) -> Result<StepReport, AssetError> {
        let start = Instant::now();

        let sources = AssetStream::src(&self.config.root, &self.config.paths.img)?;
        let optimized = images::optimize_all(sources)?;

        let dest = self.config.resolve(&self.config.paths.img_dest);
        Ok(StepReport {
            written: optimized.dest(&dest)?,
            ..Default::default()
        }
        .finish(start))
    }

    /// Remove the distribution directory.
    pub fn clean(&self) -> Result<StepReport, AssetError> {
        let start = Instant::now();
        let dist = self.config.resolve(&self.config.paths.dist);

        if dist.exists() {
            fs::remove_dir_all(&dist).map_err(|e| AssetError::WriteError {
                path: dist.clone(),
                message: e.to_string(),
            })?;
            tracing::info!("Removed {}", dist.display());
        }

        Ok(StepReport::default().finish(start))
    }
}
