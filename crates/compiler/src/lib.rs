//! Roole Compiler
//!
//! Compiles Roole stylesheets to CSS. The tree produced by the parser runs
//! through a fixed sequence of passes:
//!
//! import -> evaluate -> extend -> normalize -> prefix -> serialize

mod error;
mod evaluator;
mod extender;
mod formatter;
mod importer;
mod normalizer;
mod options;
mod path;
mod prefixer;
mod scope;
mod serializer;

pub use error::{CompileError, CompileResult};
pub use evaluator::{evaluate, Evaluator};
pub use extender::extend;
pub use formatter::format_error;
pub use importer::Importer;
pub use normalizer::normalize;
pub use options::Options;
pub use prefixer::{prefix, Prefixer};
pub use serializer::{format_number, to_css, Serializer};

use roole_loader::Loader;
use roole_syntax::{parse, Node};

/// Compile `input` to CSS
///
/// Imported sources are read from `options.imports` first and fetched
/// through `loader` otherwise; everything fetched is added to
/// `options.imports`.
pub async fn compile(input: &str, options: &mut Options, loader: &dyn Loader) -> CompileResult<String> {
    match run(input, options, loader).await {
        Ok(css) => Ok(css),
        Err(err) if options.pretty_error => Err(prettify(err, input, options)),
        Err(err) => Err(err),
    }
}

/// Blocking variant of [`compile`] driven by a current-thread runtime
pub fn compile_sync(input: &str, options: &mut Options, loader: &dyn Loader) -> CompileResult<String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(compile(input, options, loader))
}

async fn run(input: &str, options: &mut Options, loader: &dyn Loader) -> CompileResult<String> {
    let root = parse(input, &options.file_path)?;
    log::debug!("Parsed {}", display_path(&options.file_path));

    let root = Importer::new(loader, &mut options.imports).import(root).await?;
    log::debug!("Resolved imports ({} known sources)", options.imports.len());

    let root = transform(root, options)?;
    Ok(Serializer::from_options(options).serialize(&root))
}

/// Run the synchronous passes over an imported tree
fn transform(root: Node, options: &Options) -> CompileResult<Node> {
    let root = evaluate(root)?;
    log::debug!("Evaluated");
    let root = extend(root)?;
    log::debug!("Extended");
    let root = normalize(root)?;
    log::debug!("Normalized");
    Ok(prefix(root, options))
}

/// Rewrite a located error to show the source it points at
fn prettify(err: CompileError, input: &str, options: &Options) -> CompileError {
    if matches!(err, CompileError::Runtime(_) | CompileError::Pretty { .. }) {
        return err;
    }
    let file_path = err.file_path();
    let source = if file_path.is_empty() || file_path == options.file_path {
        Some(input)
    } else {
        options.imports.get(file_path).map(String::as_str)
    };
    let Some(source) = source else {
        return err;
    };
    CompileError::Pretty {
        message: format_error(&err, source),
        source: Box::new(err),
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "<input>"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roole_loader::MemoryLoader;

    async fn compile_with(input: &str, options: &mut Options, loader: &MemoryLoader) -> CompileResult<String> {
        compile(input, options, loader).await
    }

    async fn css(input: &str) -> String {
        compile_with(input, &mut Options::default(), &MemoryLoader::new())
            .await
            .unwrap()
    }

    async fn css_with(input: &str, loader: MemoryLoader) -> String {
        compile_with(input, &mut Options::default(), &loader).await.unwrap()
    }

    async fn fail(input: &str) -> CompileError {
        compile_with(input, &mut Options::default(), &MemoryLoader::new())
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_plain_css_unchanged() {
        let input = "body,\nhtml {\n\tmargin: 0;\n\tpadding: 0;\n}\n\na:hover > span {\n\tcolor: #fff;\n}";
        assert_eq!(css(input).await, input);
    }

    #[tokio::test]
    async fn test_arithmetic_property() {
        assert_eq!(css("body {\n\t-foo: 1 + 1;\n}").await, "body {\n\t-foo: 2;\n}");
    }

    #[tokio::test]
    async fn test_for_generates_rulesets() {
        let input = "@for $i in 1..3 {\n\t.span-$i {\n\t\twidth: $i * 60px;\n\t}\n}";
        assert_eq!(
            css(input).await,
            ".span-1 {\n\twidth: 60px;\n}\n\n.span-2 {\n\twidth: 120px;\n}\n\n.span-3 {\n\twidth: 180px;\n}"
        );
    }

    #[tokio::test]
    async fn test_scope_isolation() {
        let input = "$a = 1;\na {\n\t$a = 2;\n}\n@if true {\n\t$b = 3;\n}\nb {\n\tc: $a $b;\n}";
        assert_eq!(css(input).await, "b {\n\tc: 1 3;\n}");
    }

    #[tokio::test]
    async fn test_nested_rulesets_flattened() {
        let input = "#header {\n\th1 {\n\t\tfont-size: 2em;\n\t}\n\t&.active {\n\t\tcolor: red;\n\t}\n}";
        assert_eq!(
            css(input).await,
            "#header h1 {\n\tfont-size: 2em;\n}\n\n#header.active {\n\tcolor: red;\n}"
        );
    }

    #[tokio::test]
    async fn test_extend_binds_to_existing_rulesets() {
        let input = ".button {\n\tdisplay: inline-block;\n}\n\n#submit {\n\t@extend .button;\n}\n\n.button {\n\tcolor: red;\n}";
        assert_eq!(
            css(input).await,
            ".button,\n#submit {\n\tdisplay: inline-block;\n}\n\n.button {\n\tcolor: red;\n}"
        );
    }

    #[tokio::test]
    async fn test_vendor_prefixes() {
        assert_eq!(
            css("body {\n\tbox-sizing: border-box;\n}").await,
            "body {\n\t-webkit-box-sizing: border-box;\n\t-moz-box-sizing: border-box;\n\tbox-sizing: border-box;\n}"
        );
    }

    #[tokio::test]
    async fn test_font_face() {
        let input = "@font-face {\n\tfont-family: font;\n\tsrc: url(font.woff);\n}";
        assert_eq!(css(input).await, input);
        assert_eq!(
            css("$name = font;\n@font-face {\n\tfont-family: $name;\n}").await,
            "@font-face {\n\tfont-family: font;\n}"
        );
    }

    #[tokio::test]
    async fn test_charset() {
        assert_eq!(css("@charset 'UTF-8';").await, "@charset 'UTF-8';");
        assert_eq!(
            css("@charset \"UTF-8\";\n\na {\n\tb: c;\n}").await,
            "@charset \"UTF-8\";\n\na {\n\tb: c;\n}"
        );
    }

    #[tokio::test]
    async fn test_output_options() {
        let mut options = Options {
            indent: "  ".to_string(),
            precision: 1,
            prefix: Vec::new(),
            ..Options::default()
        };
        let css = compile_with("a {\n\tb: 1 / 3;\n\tbox-shadow: none;\n}", &mut options, &MemoryLoader::new())
            .await
            .unwrap();
        assert_eq!(css, "a {\n  b: 0.3;\n  box-shadow: none;\n}");
    }

    #[tokio::test]
    async fn test_import() {
        let loader = MemoryLoader::new().with("base.roo", "$width = 980px;\nbody {\n\tmargin: 0;\n}");
        assert_eq!(
            css_with("@import 'base';\n\n#main {\n\twidth: $width;\n}", loader).await,
            "body {\n\tmargin: 0;\n}\n\n#main {\n\twidth: 980px;\n}"
        );
    }

    #[tokio::test]
    async fn test_import_relative_to_file_path() {
        let loader = MemoryLoader::new().with("styles/base.roo", "a {\n\tb: c;\n}");
        let mut options = Options {
            file_path: "styles/main.roo".to_string(),
            ..Options::default()
        };
        let css = compile_with("@import 'base';", &mut options, &loader).await.unwrap();
        assert_eq!(css, "a {\n\tb: c;\n}");
        assert!(options.imports.contains_key("styles/base.roo"));
    }

    #[tokio::test]
    async fn test_preloaded_imports_skip_loader() {
        let mut options = Options::default();
        options.imports.insert("base.roo".to_string(), "a {\n\tb: c;\n}".to_string());
        let css = compile_with("@import 'base';", &mut options, &MemoryLoader::new())
            .await
            .unwrap();
        assert_eq!(css, "a {\n\tb: c;\n}");
    }

    #[tokio::test]
    async fn test_import_cycle() {
        let loader = MemoryLoader::new()
            .with("a.roo", "@import 'b';\na {\n\tb: c;\n}")
            .with("b.roo", "@import 'a';\nb {\n\tc: d;\n}");
        assert_eq!(
            css_with("@import 'a';", loader).await,
            "b {\n\tc: d;\n}\n\na {\n\tb: c;\n}"
        );
    }

    #[tokio::test]
    async fn test_errors_are_located() {
        let err = fail("body {\n\twidth: $undefined;\n}").await;
        assert_eq!(err.message(), "$undefined is undefined");
        assert_eq!((err.line(), err.column()), (2, 9));

        let err = fail("@media screen {\n\twidth: auto;\n}").await;
        assert_eq!((err.line(), err.column()), (1, 1));

        let err = fail("body {\n\tmargin: 0\n").await;
        assert!(matches!(err, CompileError::Syntax(_)));
        assert_eq!(err.line(), 3);
    }

    #[tokio::test]
    async fn test_missing_import() {
        let err = fail("a {\n\tb: c;\n}\n@import 'missing';").await;
        assert_eq!(err.message(), "Failed to load 'missing.roo'");
        assert_eq!((err.line(), err.column()), (4, 1));
    }

    #[tokio::test]
    async fn test_pretty_error() {
        let mut options = Options {
            pretty_error: true,
            ..Options::default()
        };
        let err = compile_with("body {\n\t-foo: 1 / 0;\n}", &mut options, &MemoryLoader::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.message(),
            "divide by zero\n\n  (2:12)\n  1| body {\n  2|   -foo: 1 / 0;\n  ---------------^\n  3| }\n"
        );
        assert_eq!((err.line(), err.column()), (2, 12));
    }

    #[tokio::test]
    async fn test_pretty_error_in_imported_file() {
        let loader = MemoryLoader::new().with("base.roo", "a {\n\tb: $c;\n}");
        let mut options = Options {
            pretty_error: true,
            ..Options::default()
        };
        let err = compile_with("@import 'base';", &mut options, &loader).await.unwrap_err();
        assert_eq!(err.file_path(), "base.roo");
        let message = err.message();
        assert!(message.starts_with("$c is undefined\n\n  (base.roo 2:5)\n"));
        assert!(message.contains("  2|   b: $c;\n"));
    }

    #[test]
    fn test_compile_sync() {
        let css = compile_sync("a {\n\tb: 1px + 1;\n}", &mut Options::default(), &MemoryLoader::new()).unwrap();
        assert_eq!(css, "a {\n\tb: 2px;\n}");
    }
}
