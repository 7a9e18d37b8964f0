//! Script downleveling with swc and minification with oxc.

use std::path::Path;

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::es_target::ESTarget;
use swc_common::comments::SingleThreadedComments;
use swc_common::{sync::Lrc, FileName, Globals, Mark, SourceMap, GLOBALS};
use swc_ecma_ast::EsVersion;
use swc_ecma_codegen::{text_writer::JsWriter, Config as CodegenConfig, Emitter};
use swc_ecma_parser::{parse_file_as_program, EsSyntax, Syntax};
use swc_ecma_transforms_base::fixer::fixer;
use swc_ecma_transforms_base::helpers::{inject_helpers, Helpers, HELPERS};
use swc_ecma_transforms_base::hygiene::hygiene;
use swc_ecma_transforms_base::resolver;
use swc_ecma_transforms_compat::{
    es2015, es2016, es2017, es2018, es2019, es2020, es2021, es2022,
};

use crate::stream::{AssetError, AssetFile};

/// Syntax level scripts are lowered to.
pub const TARGET: EsVersion = EsVersion::Es5;

/// Lower a script to ES5 syntax.
///
/// Every ES2015+ feature the browser may lack is rewritten: block
/// scoping, template literals, classes, destructuring, default and rest
/// parameters, spread, `for...of`, arrows, and the later syntax
/// (`**`, async functions, object spread, `?.`, `??`, class fields).
/// Runtime helpers are inlined into the file that needs them.
pub fn transpile(file: AssetFile) -> Result<AssetFile, AssetError> {
    let code = lower(&file.origin, file.text()?)?;
    Ok(file.with_contents(code))
}

/// Minify lowered source, such as a concatenated bundle, mangling local
/// names. Output stays within ES5.
pub fn minify(file: AssetFile) -> Result<AssetFile, AssetError> {
    let code = minify_source(&file.origin, file.text()?)?;
    Ok(file.with_contents(code))
}

fn minify_source(origin: &Path, source: &str) -> Result<String, AssetError> {
    let allocator = Allocator::default();

    let parsed = Parser::new(&allocator, source, source_type(origin)).parse();
    if !parsed.errors.is_empty() {
        return Err(script_error(origin, &parsed.errors));
    }
    let mut program = parsed.program;

    let options = MinifierOptions {
        compress: Some(CompressOptions {
            target: ESTarget::ES5,
            ..CompressOptions::default()
        }),
        ..MinifierOptions::default()
    };
    let minified = Minifier::new(options).build(&allocator, &mut program);
    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}

fn lower(origin: &Path, source: &str) -> Result<String, AssetError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        Lrc::new(FileName::Real(origin.to_path_buf())),
        source.to_string(),
    );

    let mut recovered = Vec::new();
    let program = parse_file_as_program(
        &fm,
        Syntax::Es(EsSyntax::default()),
        EsVersion::latest(),
        None,
        &mut recovered,
    )
    .map_err(|e| script_error(origin, &[e.kind().msg()]))?;
    if !recovered.is_empty() {
        let messages: Vec<_> = recovered.iter().map(|e| e.kind().msg()).collect();
        return Err(script_error(origin, &messages));
    }

    let program = GLOBALS.set(&Globals::default(), || {
        HELPERS.set(&Helpers::new(false), || {
            let unresolved_mark = Mark::new();
            let top_level_mark = Mark::new();

            program
                .apply(resolver(unresolved_mark, top_level_mark, false))
                .apply((
                    es2022(Default::default(), unresolved_mark),
                    es2021(),
                    es2020(Default::default(), unresolved_mark),
                    es2019(),
                    es2018(Default::default()),
                    es2017(Default::default(), unresolved_mark),
                    es2016(),
                ))
                .apply(es2015(
                    unresolved_mark,
                    None::<SingleThreadedComments>,
                    Default::default(),
                ))
                .apply(inject_helpers(unresolved_mark))
                .apply(hygiene())
                .apply(fixer(None))
        })
    });

    let mut buf = Vec::new();
    {
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_target(TARGET),
            cm: Lrc::clone(&cm),
            comments: None,
            wr: JsWriter::new(Lrc::clone(&cm), "\n", &mut buf, None),
        };
        emitter
            .emit_program(&program)
            .map_err(|e| script_error(origin, &[e]))?;
    }

    String::from_utf8(buf).map_err(|_| AssetError::Encoding(origin.to_path_buf()))
}

fn source_type(origin: &Path) -> SourceType {
    SourceType::from_path(origin).unwrap_or_default()
}

fn script_error<E: std::fmt::Display>(origin: &Path, errors: &[E]) -> AssetError {
    AssetError::ScriptError {
        path: origin.to_path_buf(),
        message: errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn js(source: &str) -> AssetFile {
        AssetFile::new("app.js", "src/js/app.js", source.as_bytes().to_vec())
    }

    #[test]
    fn lowers_arrow_functions() {
        let file = js("const double = (x) => x * 2;\nconsole.log(`n=${double(2)}`);");

        let out = transpile(file).unwrap();
        let code = out.text().unwrap();

        assert!(code.contains("double"));
        assert!(code.contains("console.log"));
        assert!(!code.contains("=>"));
        assert!(!code.contains("const "));
        assert!(!code.contains('`'));
    }

    #[test]
    fn output_is_es5() {
        let source = r#"
const a = 1;
let b = `x${a}`;
class Foo {
  constructor(v) { this.v = v; }
  get() { return this.v; }
}
const { c, d } = obj;
function f(x = 1, ...rest) { return [x, ...rest]; }
for (const v of list) { console.log(v, b, c, d, new Foo(v).get(), f(v)); }
"#;

        let out = transpile(js(source)).unwrap();
        let code = out.text().unwrap();

        for modern in ["const ", "let ", "`", "class Foo", "=>", "...", " of list"] {
            assert!(!code.contains(modern), "{:?} survived in:\n{}", modern, code);
        }
        assert!(code.contains("var "));
        assert!(code.contains("function Foo("));
    }

    #[test]
    fn minified_bundle_stays_es5() {
        let source = "let total = 0;\nfor (let i = 0; i < 3; i++) { total += i; }\nwindow.total = total;";
        let lowered = transpile(js(source)).unwrap();

        let out = minify(lowered).unwrap();
        let code = out.text().unwrap();

        assert!(!code.contains("let "));
        assert!(!code.contains("=>"));
    }

    #[test]
    fn lowers_newer_syntax() {
        let file = js("const a = obj?.b ?? 1;\nconst c = 2 ** 3;");

        let out = transpile(file).unwrap();
        let code = out.text().unwrap();

        assert!(!code.contains("?."));
        assert!(!code.contains("??"));
        assert!(!code.contains("**"));
    }

    #[test]
    fn reports_syntax_errors() {
        let err = transpile(js("function broken( {")).unwrap_err();

        assert!(matches!(err, AssetError::ScriptError { .. }));
    }

    #[test]
    fn minified_output_is_smaller() {
        let source = "function greet(personName) {\n    const message = 'hello ' + personName;\n    return message;\n}\nwindow.greet = greet;\n";

        let out = minify(transpile(js(source)).unwrap()).unwrap();
        let code = out.text().unwrap();

        assert!(code.len() < source.len());
        assert!(!code.contains("personName"));
    }

    #[test]
    fn minifies_bundles() {
        let out = minify(js("var first = 1;\n\nvar second = first + 1;\nwindow.x = second;")).unwrap();

        assert!(!out.text().unwrap().contains("\n\n"));
    }
}
