//! Roole - compiles Roole stylesheets to CSS
//!
//! Usage: roole [OPTIONS] <FILE|->

use std::env;
use std::io::{self, Read};
use std::process::ExitCode;

use roole_compiler::{compile, Options};
use roole_loader::FileLoader;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the command line asks for
#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Version,
    Compile(Args),
}

/// Compile arguments
#[derive(Debug, Default, PartialEq)]
struct Args {
    input: String,
    output: Option<String>,
    config: Option<String>,
    indent: Option<String>,
    precision: Option<usize>,
    prefix: Option<Vec<String>>,
    skip_prefixed: bool,
    ast: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("roole");

    let command = match parse_args(&args[1.min(args.len())..]) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage(program);
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Help => {
            print_usage(program);
            ExitCode::SUCCESS
        }
        Command::Version => {
            println!("Roole {}", VERSION);
            ExitCode::SUCCESS
        }
        Command::Compile(args) => {
            if let Err(e) = run(args).await {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}

fn print_usage(program: &str) {
    println!(
        r#"Roole {} - A language that compiles to CSS

USAGE:
    {} [OPTIONS] <FILE|->

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -o <FILE>               Write the CSS to FILE instead of stdout
    --indent <STR>          Indentation string (default: tab)
    --precision <N>         Decimal places of numbers (default: 3)
    --prefix <A,B>          Vendor prefixes to generate (default: webkit,moz,ms,o)
    --skip-prefixed         Don't generate prefixed properties already declared
    --config <FILE>         Read options from a JSON file
    --ast                   Print the parsed tree as JSON instead of CSS

EXAMPLES:
    {} style.roo
    {} -o style.css --prefix webkit,moz style.roo
    cat style.roo | {} -

"#,
        VERSION, program, program, program, program
    );
}

/// Parse command line arguments, program name excluded
fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut parsed = Args::default();
    let mut input = None;
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };
        match arg.as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--version" | "-V" => return Ok(Command::Version),
            "-o" => parsed.output = Some(value("-o")?),
            "--config" => parsed.config = Some(value("--config")?),
            "--indent" => parsed.indent = Some(value("--indent")?),
            "--precision" => {
                let precision = value("--precision")?;
                let precision = precision
                    .parse()
                    .map_err(|_| format!("Invalid precision: {}", precision))?;
                parsed.precision = Some(precision);
            }
            "--prefix" => {
                let prefix = value("--prefix")?;
                parsed.prefix = Some(
                    prefix
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from)
                        .collect(),
                );
            }
            "--skip-prefixed" => parsed.skip_prefixed = true,
            "--ast" => parsed.ast = true,
            "-" => input = Some(arg.clone()),
            flag if flag.starts_with('-') => return Err(format!("Unknown option: {}", flag)),
            path => {
                if input.is_some() {
                    return Err(format!("Unexpected argument: {}", path));
                }
                input = Some(path.to_string());
            }
        }
    }

    parsed.input = input.ok_or("No input file given")?;
    Ok(Command::Compile(parsed))
}

/// Build compile options: config file first, then flags
async fn load_options(args: &Args) -> Result<Options, String> {
    let mut options = match &args.config {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| format!("Failed to read {}: {}", path, e))?;
            serde_json::from_str(&json).map_err(|e| format!("Invalid config {}: {}", path, e))?
        }
        None => Options::default(),
    };

    if let Some(indent) = &args.indent {
        options.indent = indent.clone();
    }
    if let Some(precision) = args.precision {
        options.precision = precision;
    }
    if let Some(prefix) = &args.prefix {
        options.prefix = prefix.clone();
    }
    if args.skip_prefixed {
        options.skip_prefixed = true;
    }
    if args.input != "-" {
        options.file_path = args.input.clone();
    }
    options.pretty_error = true;
    Ok(options)
}

async fn read_input(input: &str) -> Result<String, String> {
    if input == "-" {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        return Ok(source);
    }
    tokio::fs::read_to_string(input)
        .await
        .map_err(|e| format!("Failed to read {}: {}", input, e))
}

async fn run(args: Args) -> Result<(), String> {
    let mut options = load_options(&args).await?;
    let source = read_input(&args.input).await?;

    let output = if args.ast {
        let root = roole_syntax::parse(&source, &options.file_path).map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&root).map_err(|e| e.to_string())?
    } else {
        let loader = FileLoader::current_dir().map_err(|e| e.to_string())?;
        let css = compile(&source, &mut options, &loader)
            .await
            .map_err(|e| e.to_string())?;
        log::debug!("Compiled {} ({} imports)", args.input, options.imports.len());
        css
    };

    match &args.output {
        Some(path) => tokio::fs::write(path, output + "\n")
            .await
            .map_err(|e| format!("Failed to write {}: {}", path, e)),
        None => {
            println!("{}", output);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn compile_args(list: &[&str]) -> Args {
        match parse_args(&args(list)).unwrap() {
            Command::Compile(args) => args,
            command => panic!("Expected compile, got {:?}", command),
        }
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(&args(&["-h"])).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&["style.roo", "--version"])).unwrap(), Command::Version);
    }

    #[test]
    fn test_compile_flags() {
        let parsed = compile_args(&[
            "-o", "out.css", "--indent", "  ", "--precision", "2", "--prefix", "webkit, moz",
            "--skip-prefixed", "style.roo",
        ]);
        assert_eq!(parsed.input, "style.roo");
        assert_eq!(parsed.output.as_deref(), Some("out.css"));
        assert_eq!(parsed.indent.as_deref(), Some("  "));
        assert_eq!(parsed.precision, Some(2));
        assert_eq!(parsed.prefix, Some(vec!["webkit".to_string(), "moz".to_string()]));
        assert!(parsed.skip_prefixed);
        assert!(!parsed.ast);
    }

    #[test]
    fn test_stdin_input() {
        let parsed = compile_args(&["--ast", "-"]);
        assert_eq!(parsed.input, "-");
        assert!(parsed.ast);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&args(&["--precision", "x", "a.roo"])).is_err());
        assert!(parse_args(&args(&["--indent"])).is_err());
        assert!(parse_args(&args(&["--bogus", "a.roo"])).is_err());
        assert!(parse_args(&args(&["a.roo", "b.roo"])).is_err());
    }

    #[tokio::test]
    async fn test_config_layered_under_flags() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("roole.json");
        std::fs::write(&config, r#"{"indent": "    ", "precision": 1, "skipPrefixed": true}"#).unwrap();

        let mut parsed = compile_args(&["--precision", "5", "style.roo"]);
        parsed.config = Some(config.to_string_lossy().into_owned());
        let options = load_options(&parsed).await.unwrap();
        assert_eq!(options.indent, "    ");
        assert_eq!(options.precision, 5);
        assert!(options.skip_prefixed);
        assert!(options.pretty_error);
        assert_eq!(options.file_path, "style.roo");
    }
}
