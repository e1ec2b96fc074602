mod config;

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use vippdfa_core::{DocumentKind, KnownAliases, TranslateConfig, TranslateError, Translation};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// VIPP to Papyrus DocDEF translator.
#[derive(Parser)]
#[command(name = "vippdfa", version, about = "VIPP to Papyrus DocDEF translator")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Log translation decisions to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a .DBM main document and its forms to DocDEF
    Translate {
        /// Path to the .DBM main document
        file: PathBuf,
        /// Directory the .dfa files are written to
        #[arg(long, short = 'o', default_value = ".")]
        out_dir: PathBuf,
        /// TOML translation settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// Extra overlay to translate (repeatable)
        #[arg(long = "overlay")]
        overlays: Vec<String>,
        /// Write the translation report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
        /// Record field delimiter
        #[arg(long)]
        delimiter: Option<String>,
        /// Inline subroutines with at most this many commands
        #[arg(long)]
        inline_threshold: Option<usize>,
        /// Treat every record as part of one document
        #[arg(long)]
        no_document_separator: bool,
    },

    /// Print the token stream of a .DBM or .FRM file
    Tokens {
        /// Path to the source file
        file: PathBuf,
    },

    /// Tokenize and parse a .DBM or .FRM file without generating output
    Check {
        /// Path to the source file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Translate {
            file,
            out_dir,
            config: config_path,
            overlays,
            report,
            delimiter,
            inline_threshold,
            no_document_separator,
        } => {
            let mut cfg = match config_path {
                Some(path) => match config::read_translate_config(&path) {
                    Ok(c) => c,
                    Err(msg) => {
                        report_error(&msg, cli.output, cli.quiet);
                        process::exit(1);
                    }
                },
                None => TranslateConfig::default(),
            };
            config::Overrides {
                delimiter: delimiter.as_deref(),
                inline_threshold,
                no_document_separator,
                overlays: &overlays,
            }
            .apply(&mut cfg);
            cmd_translate(&file, &out_dir, &cfg, report.as_deref(), cli.output, cli.quiet);
        }
        Commands::Tokens { file } => {
            cmd_tokens(&file, cli.output, cli.quiet);
        }
        Commands::Check { file } => {
            cmd_check(&file, cli.output, cli.quiet);
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over the flags.
fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_translate(
    file: &Path,
    out_dir: &Path,
    config: &TranslateConfig,
    report_path: Option<&Path>,
    output: OutputFormat,
    quiet: bool,
) {
    let translation = match vippdfa_core::translate(file, config) {
        Ok(t) => t,
        Err(e) => exit_with(&e, output, quiet),
    };

    if let Err(e) = std::fs::create_dir_all(out_dir) {
        let msg = format!("could not create '{}': {}", out_dir.display(), e);
        report_error(&msg, output, quiet);
        process::exit(1);
    }
    let written = match write_outputs(&translation, out_dir) {
        Ok(paths) => paths,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&translation.report)
            .unwrap_or_else(|e| format!("{{\"error\": \"serialization error: {}\"}}", e));
        if let Err(e) = std::fs::write(path, json) {
            let msg = format!("could not write report '{}': {}", path.display(), e);
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }

    match output {
        OutputFormat::Json => {
            let result = TranslateSummary {
                name: &translation.name,
                written: written.iter().map(|p| p.display().to_string()).collect(),
                report: &translation.report,
            };
            let pretty = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            if !quiet {
                for path in &written {
                    println!("wrote {}", path.display());
                }
                println!("{}", translation.report.summary());
            }
        }
    }
}

/// JSON result of `vippdfa translate`.
#[derive(Serialize)]
struct TranslateSummary<'a> {
    name: &'a str,
    written: Vec<String>,
    report: &'a vippdfa_core::Report,
}

/// Write the main stream and every overlay stream as `<NAME>.dfa`.
fn write_outputs(translation: &Translation, out_dir: &Path) -> Result<Vec<PathBuf>, String> {
    let streams = std::iter::once((translation.name.as_str(), translation.dfa.as_str())).chain(
        translation
            .overlays
            .iter()
            .map(|o| (o.name.as_str(), o.dfa.as_str())),
    );
    let mut written = Vec::new();
    for (name, text) in streams {
        let path = out_dir.join(format!("{}.dfa", name));
        std::fs::write(&path, text)
            .map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
        tracing::debug!(path = %path.display(), "wrote output");
        written.push(path);
    }
    Ok(written)
}

fn read_source(file: &Path, output: OutputFormat, quiet: bool) -> String {
    match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            let err = TranslateError::Source {
                path: file.display().to_string(),
                source: e,
            };
            exit_with(&err, output, quiet)
        }
    }
}

fn cmd_tokens(file: &Path, output: OutputFormat, quiet: bool) {
    let src = read_source(file, output, quiet);
    let name = file.display().to_string();
    let tokens = match vippdfa_core::lex(&src, &name) {
        Ok(t) => t,
        Err(e) => exit_with(&TranslateError::from(e), output, quiet),
    };
    match output {
        OutputFormat::Json => {
            let list: Vec<serde_json::Value> = tokens
                .iter()
                .map(|t| {
                    let (kind, text) = t.token.parts();
                    serde_json::json!({
                        "kind": kind,
                        "text": text,
                        "line": t.line,
                        "column": t.column,
                    })
                })
                .collect();
            let pretty = serde_json::to_string_pretty(&list)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            for t in &tokens {
                let (kind, text) = t.token.parts();
                println!("{}:{}\t{}\t{}", t.line, t.column, kind, text);
            }
        }
    }
}

fn cmd_check(file: &Path, output: OutputFormat, quiet: bool) {
    let src = read_source(file, output, quiet);
    let name = file.display().to_string();
    let kind = if name.to_ascii_lowercase().ends_with(".frm") {
        DocumentKind::Overlay
    } else {
        DocumentKind::Main
    };
    let doc = match vippdfa_core::parse_source(&src, &name, kind, &KnownAliases::default()) {
        Ok(d) => d,
        Err(e) => exit_with(&e, output, quiet),
    };
    match output {
        OutputFormat::Json => {
            let result = serde_json::json!({
                "file": name,
                "commands": doc.commands.len(),
                "unused_operands": doc.leftovers.len(),
            });
            let pretty = serde_json::to_string_pretty(&result)
                .unwrap_or_else(|e| format!("serialization error: {}", e));
            println!("{}", pretty);
        }
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "{}: ok ({} commands, {} unused operands)",
                    name,
                    doc.commands.len(),
                    doc.leftovers.len()
                );
            }
        }
    }
}

/// Print a fatal translation error and exit with status 1.
fn exit_with(e: &TranslateError, output: OutputFormat, quiet: bool) -> ! {
    match output {
        OutputFormat::Json => {
            let err_json = serde_json::to_string_pretty(&e.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{:?}\"}}", e));
            eprintln!("{}", err_json);
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", e);
            }
        }
    }
    process::exit(1);
}

/// Print a setup failure (config, output directory) that happens outside
/// translation proper.
fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    match output {
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
        OutputFormat::Text if !quiet => eprintln!("{}", msg),
        OutputFormat::Text => {}
    }
}
