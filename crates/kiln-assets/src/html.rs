//! HTML build-block replacement and minification.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use minify_html::Cfg;
use regex::{Captures, Regex};

use crate::stream::{AssetError, AssetFile};

fn build_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?ms)^([ \t]*)<!--\s*build:([\w-]+)\s*-->.*?<!--\s*endbuild\s*-->")
            .expect("build block pattern is valid")
    })
}

/// Replace `<!-- build:NAME -->...<!-- endbuild -->` blocks with tags for
/// the configured references.
///
/// `.css` references become stylesheet links, `.js` references become
/// script tags, anything else is inserted verbatim. Blocks with no entry
/// in `blocks` are left as they are.
pub fn replace_blocks(html: &str, blocks: &BTreeMap<String, Vec<String>>) -> String {
    build_block()
        .replace_all(html, |caps: &Captures| {
            let indent = &caps[1];
            let name = &caps[2];

            match blocks.get(name) {
                Some(refs) => refs
                    .iter()
                    .map(|r| format!("{}{}", indent, tag_for(r)))
                    .collect::<Vec<_>>()
                    .join("\n"),
                None => {
                    tracing::debug!("No replacement configured for build block '{}'", name);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

fn tag_for(reference: &str) -> String {
    if reference.ends_with(".css") {
        format!(r#"<link rel="stylesheet" href="{}">"#, reference)
    } else if reference.ends_with(".js") {
        format!(r#"<script src="{}"></script>"#, reference)
    } else {
        reference.to_string()
    }
}

/// Collapse whitespace and strip comments.
pub fn minify(html: &[u8]) -> Vec<u8> {
    let cfg = Cfg {
        keep_comments: false,
        keep_closing_tags: true,
        keep_html_and_head_opening_tags: true,
        minify_css: false,
        minify_js: false,
        ..Cfg::default()
    };
    minify_html::minify(html, &cfg)
}

/// Rewrite build blocks, then minify.
pub fn process(
    file: AssetFile,
    blocks: &BTreeMap<String, Vec<String>>,
) -> Result<AssetFile, AssetError> {
    let replaced = replace_blocks(file.text()?, blocks);
    let minified = minify(replaced.as_bytes());
    Ok(file.with_contents(minified))
}
