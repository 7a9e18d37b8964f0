//! The project's task declarations.

use anyhow::Result;
use kiln_assets::{glob_base, AssetError, Pipeline, StepReport};
use kiln_deploy::SurgeClient;
use kiln_server::{DevServer, DevServerConfig, Reload, WatchRule};
use kiln_tasks::{ActionError, TaskError, TaskGraph};

use crate::config::ConfigFile;

/// Task run when no task is named.
pub const DEFAULT_TASK: &str = "default";

/// Declare every build, serve and deploy task for a project.
pub fn declare(config: &ConfigFile) -> Result<TaskGraph> {
    let pipeline = Pipeline::new(config.pipeline.clone());
    let mut graph = TaskGraph::new();

    step(&mut graph, &pipeline, "compile:scss", Pipeline::compile_styles)?;
    step(&mut graph, &pipeline, "compile:es6", Pipeline::compile_scripts)?;
    step(&mut graph, &pipeline, "clean", Pipeline::clean)?;
    step(&mut graph, &pipeline, "minify:html", Pipeline::minify_html)?;
    step(&mut graph, &pipeline, "minify:css", Pipeline::minify_styles)?;
    step(&mut graph, &pipeline, "minify:js", Pipeline::minify_scripts)?;
    step(&mut graph, &pipeline, "minify:img", Pipeline::minify_images)?;
    step(&mut graph, &pipeline, "vendor", Pipeline::bundle_vendor)?;

    let deploy = config.deploy.clone();
    let project = config.pipeline.resolve(&deploy.project);
    graph.declare(
        "surge",
        &["minify:html", "minify:img", "minify:css", "vendor", "minify:js"],
        move |_| {
            let deploy = deploy.clone();
            let project = project.clone();
            async move {
                let client = SurgeClient::from_env(deploy.endpoint, &deploy.token_env)?;
                client.publish(&project, &deploy.domain).await?;
                Ok::<_, ActionError>(())
            }
        },
    )?;
    graph.alias("deploy", &["surge"])?;

    let server = server_config(config)?;
    graph.declare(
        "serve",
        &["vendor", "compile:es6", "compile:scss"],
        move |graph| {
            let server = DevServer::new(server.clone());
            async move {
                server.start(graph).await?;
                Ok::<_, ActionError>(())
            }
        },
    )?;
    graph.alias(DEFAULT_TASK, &["serve"])?;

    Ok(graph)
}

/// Declare a task that runs one pipeline step on the blocking pool.
fn step(
    graph: &mut TaskGraph,
    pipeline: &Pipeline,
    name: &'static str,
    run: fn(&Pipeline) -> Result<StepReport, AssetError>,
) -> Result<(), TaskError> {
    let pipeline = pipeline.clone();
    graph.declare(name, &[], move |_| {
        let pipeline = pipeline.clone();
        async move {
            let report = tokio::task::spawn_blocking(move || run(&pipeline)).await??;
            for error in &report.errors {
                tracing::error!("[{}] {}", name, error);
            }
            tracing::debug!(
                "[{}] wrote {} files in {}ms",
                name,
                report.written.len(),
                report.duration_ms
            );
            Ok::<_, ActionError>(())
        }
    })
}

/// Dev server settings with the rules that map source changes to tasks.
fn server_config(config: &ConfigFile) -> Result<DevServerConfig, AssetError> {
    let paths = &config.pipeline.paths;

    Ok(DevServerConfig {
        root: config.pipeline.resolve(&config.server.root),
        pages: glob_base(&paths.html),
        port: config.server.port,
        host: config.server.host.clone(),
        open: config.server.open,
        rules: vec![
            WatchRule::new(&paths.scss, Some("compile:scss"), Reload::Css)?,
            WatchRule::new(&paths.html, None, Reload::Full)?,
            WatchRule::new(&paths.js, Some("compile:es6"), Reload::Full)?,
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;

    use tempfile::tempdir;

    use crate::config::load_config;

    fn graph() -> TaskGraph {
        declare(&ConfigFile::default()).unwrap()
    }

    #[test]
    fn declares_all_tasks() {
        let graph = graph();
        let names: Vec<&str> = graph.names().collect();

        assert_eq!(
            names,
            vec![
                "compile:scss",
                "compile:es6",
                "clean",
                "minify:html",
                "minify:css",
                "minify:js",
                "minify:img",
                "vendor",
                "surge",
                "deploy",
                "serve",
                "default",
            ]
        );
        graph.validate().unwrap();
    }

    #[test]
    fn surge_depends_on_every_minify_step() {
        let graph = graph();

        assert_eq!(
            graph.dependencies("surge").unwrap(),
            &["minify:html", "minify:img", "minify:css", "vendor", "minify:js"]
        );
        assert_eq!(graph.dependencies("deploy").unwrap(), &["surge"]);
        assert_eq!(graph.dependencies("default").unwrap(), &["serve"]);
        assert_eq!(
            graph.dependencies("serve").unwrap(),
            &["vendor", "compile:es6", "compile:scss"]
        );
    }

    #[test]
    fn invalid_watch_glob_fails_declaration() {
        let mut config = ConfigFile::default();
        config.pipeline.paths.scss = "src/scss/[".to_string();

        assert!(declare(&config).is_err());
    }

    #[test]
    fn server_lands_on_html_sources() {
        let server = server_config(&ConfigFile::default()).unwrap();

        assert_eq!(server.pages, std::path::PathBuf::from("src"));
        assert_eq!(server.rules.len(), 3);
    }

    #[tokio::test]
    async fn compile_task_writes_output() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src/scss")).unwrap();
        fs::write(
            temp.path().join("src/scss/main.scss"),
            "$c: red;\nbody { color: $c; }\n",
        )
        .unwrap();

        let config = load_config(&temp.path().join("kiln.toml")).unwrap();
        let graph = Arc::new(declare(&config).unwrap());

        let report = graph.run("compile:scss").await.unwrap();

        assert_eq!(report.completed, vec!["compile:scss".to_string()]);
        let css = fs::read_to_string(temp.path().join("dist/css/main.css")).unwrap();
        assert!(css.contains("body"));
    }

    #[tokio::test]
    async fn missing_vendor_file_fails_the_task() {
        let temp = tempdir().unwrap();

        let config = load_config(&temp.path().join("kiln.toml")).unwrap();
        let graph = Arc::new(declare(&config).unwrap());

        let err = graph.run("vendor").await.unwrap_err();
        assert!(matches!(err, TaskError::Failed { ref task, .. } if task == "vendor"));
    }
}
