//! Scaffold a kiln project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
///
/// Writes `config_path` and a `src/` skeleton next to it. Existing files are
/// left alone unless `yes` is set.
pub fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing kiln...");

    let root = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let src_dir = root.join("src");

    if src_dir.exists() && !yes {
        tracing::warn!("src/ directory already exists. Use --yes to overwrite.");
        return Ok(());
    }

    for dir in ["src/scss", "src/js", "src/img"] {
        fs::create_dir_all(root.join(dir))
            .with_context(|| format!("Failed to create {} directory", dir))?;
    }

    write_file(config_path, DEFAULT_CONFIG, yes)?;
    write_file(&src_dir.join("index.html"), DEFAULT_INDEX, yes)?;
    write_file(&src_dir.join("scss/main.scss"), DEFAULT_STYLES, yes)?;
    write_file(&src_dir.join("scss/_variables.scss"), DEFAULT_VARIABLES, yes)?;
    write_file(&src_dir.join("js/main.js"), DEFAULT_SCRIPT, yes)?;

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'kiln' to start the development server.");

    Ok(())
}

fn write_file(path: &Path, contents: &str, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Created {}", path.display());
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# kiln configuration

# Scripts concatenated, in order, into js/vendor.js
vendor = [
    "node_modules/jquery/dist/jquery.min.js",
    "node_modules/slick-carousel/slick/slick.min.js",
]

[paths]
html = "src/*.html"
scss = "src/scss/**/*.scss"
js = "src/js/**/*.js"
img = "src/img/*"
dist = "dist"

# Build blocks in HTML are replaced with these references
[html_blocks]
css = ["./css/main.css"]
js = ["./js/vendor.js", "./js/main.js"]

[server]
port = 3000
open = true

[deploy]
project = "dist"
domain = "my-domain.surge.sh"
# Token is read from this environment variable
token_env = "SURGE_TOKEN"
"#;

const DEFAULT_INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>kiln</title>
  <!-- build:css -->
  <link rel="stylesheet" href="../dist/css/main.css">
  <!-- endbuild -->
</head>
<body>
  <h1>Hello from kiln</h1>

  <!-- build:js -->
  <script src="../dist/js/vendor.js"></script>
  <script src="../dist/js/main.js"></script>
  <!-- endbuild -->
</body>
</html>
"#;

const DEFAULT_STYLES: &str = r#"@use 'variables' as *;

body {
  font-family: $font-stack;
  color: $text;
  display: flex;
  flex-direction: column;
}
"#;

const DEFAULT_VARIABLES: &str = r#"$font-stack: system-ui, sans-serif;
$text: #333;
"#;

const DEFAULT_SCRIPT: &str = r#"const greet = (name) => `Hello, ${name}`;

document.addEventListener('DOMContentLoaded', () => {
  console.log(greet('kiln'));
});
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::config::load_config;

    #[test]
    fn scaffolds_project() {
        let temp = tempdir().unwrap();
        let config_path = temp.path().join("kiln.toml");

        run(&config_path, false).unwrap();

        assert!(temp.path().join("src/index.html").is_file());
        assert!(temp.path().join("src/scss/main.scss").is_file());
        assert!(temp.path().join("src/js/main.js").is_file());
        assert!(temp.path().join("src/img").is_dir());

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.pipeline.html_blocks["js"].len(), 2);
    }

    #[test]
    fn keeps_existing_sources_without_yes() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/index.html"), "mine").unwrap();

        run(&temp.path().join("kiln.toml"), false).unwrap();

        assert_eq!(
            fs::read_to_string(temp.path().join("src/index.html")).unwrap(),
            "mine"
        );
        assert!(!temp.path().join("kiln.toml").exists());
    }

    #[test]
    fn yes_overwrites() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/index.html"), "mine").unwrap();

        run(&temp.path().join("kiln.toml"), true).unwrap();

        let html = fs::read_to_string(temp.path().join("src/index.html")).unwrap();
        assert!(html.contains("<!-- build:css -->"));
    }
}
