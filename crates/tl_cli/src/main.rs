use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use swc_common::{errors::Handler, sync::Lrc, SourceMap, Span};
use tl_ast::FrontendOptions;
use tl_lower::{emit_module, lower_module, LowerError};
use tl_module::{link_module, LinkDiagnostic};
use tl_parser::{parse_module, ParseResult};

mod logging;

#[derive(Parser)]
#[command(name = "tlc", about = "tlc: link and lower TypeScript modules")]
struct Cli {
    #[command(flatten)]
    frontend: FrontendArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link, lower and emit TypeScript.
    Lower {
        /// Input .ts/.tsx file.
        input: PathBuf,
        /// Output file (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Generate a source map.
        #[arg(long)]
        source_map: bool,
    },
    /// Print the module records as JSON.
    Link {
        input: PathBuf,
        /// Print the type-only record instead of the runtime one.
        #[arg(long)]
        types: bool,
    },
    /// Parse, link and lower the file without emitting anything.
    Check { input: PathBuf },
    /// Parse and dump the AST.
    Parse {
        input: PathBuf,
        /// As JSON rather than debug output.
        #[arg(long)]
        ast: bool,
    },
}

#[derive(Args)]
struct FrontendArgs {
    /// JSON file of front-end options (camelCase keys, all default on).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Reject `import lazy` instead of rewriting it.
    #[arg(long, global = true)]
    no_lazy_imports: bool,
    #[arg(long, global = true)]
    no_ambient_indexers: bool,
    #[arg(long, global = true)]
    no_rest_args: bool,
    #[arg(long, global = true)]
    no_default_export_binding: bool,
}

impl FrontendArgs {
    fn options(&self) -> Result<FrontendOptions> {
        let mut options = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))?
            }
            None => FrontendOptions::default(),
        };
        if self.no_lazy_imports {
            options.lazy_imports = false;
        }
        if self.no_ambient_indexers {
            options.ambient_indexers = false;
        }
        if self.no_rest_args {
            options.rest_arguments = false;
        }
        if self.no_default_export_binding {
            options.default_export_binding = false;
        }
        Ok(options)
    }
}

fn read_and_parse(input: &Path, options: &FrontendOptions) -> Result<ParseResult> {
    let source = std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let filename = input.display().to_string();
    parse_module(&source, &filename, options)
}

fn report_errors(cm: &Lrc<SourceMap>, errors: impl IntoIterator<Item = (Span, String)>) {
    let handler = Handler::with_emitter_writer(Box::new(std::io::stderr()), Some(cm.clone()));
    for (span, message) in errors {
        handler.struct_span_err(span, &message).emit();
    }
}

fn report_link_errors(cm: &Lrc<SourceMap>, diagnostics: &[LinkDiagnostic]) {
    report_errors(cm, diagnostics.iter().map(|d| (d.span, d.kind.to_string())));
}

/// Lower `input`, printing linkage errors at their spans.
fn lower_file(input: &Path, options: &FrontendOptions) -> Result<tl_lower::LowerOutput> {
    let parsed = read_and_parse(input, options)?;
    let cm = parsed.source_map.clone();
    match lower_module(parsed, options) {
        Ok(out) => Ok(out),
        Err(LowerError::Link(diagnostics)) => {
            report_link_errors(&cm, &diagnostics);
            bail!("{}: {} linkage error(s)", input.display(), diagnostics.len())
        }
        Err(LowerError::Unsupported(diagnostics)) => {
            let count = diagnostics.len();
            report_errors(&cm, diagnostics.into_iter().map(|d| (d.span, d.message)));
            bail!("{}: {count} construct(s) cannot be lowered", input.display())
        }
        Err(err) => Err(err).with_context(|| format!("failed to lower {}", input.display())),
    }
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    let options = cli.frontend.options()?;
    tracing::debug!(?options, "front-end options");

    match cli.command {
        Commands::Lower {
            input,
            output,
            source_map,
        } => {
            let out = lower_file(&input, &options)?;
            let emitted = emit_module(&out.program.module, &out.source_map, source_map)?;

            match &output {
                Some(path) => std::fs::write(path, &emitted.code)?,
                None => print!("{}", emitted.code),
            }

            if let Some(map) = emitted.source_map {
                let map_path = match &output {
                    Some(path) => format!("{}.map", path.display()),
                    None => format!("{}.map", input.display()),
                };
                std::fs::write(&map_path, &map)?;
                eprintln!("Source map written to {map_path}");
            }
        }
        Commands::Link { input, types } => {
            let parsed = read_and_parse(&input, &options)?;
            let linked = link_module(&parsed.module);
            let record = if types { &linked.type_record } else { &linked.record };
            println!("{}", serde_json::to_string_pretty(record)?);
            if !linked.diagnostics.is_empty() {
                report_link_errors(&parsed.source_map, &linked.diagnostics);
                bail!("{}: {} linkage error(s)", input.display(), linked.diagnostics.len());
            }
        }
        Commands::Check { input } => {
            let out = lower_file(&input, &options)?;
            let passes: Vec<_> = out.report.changed().collect();
            eprintln!("OK: {} (lowered by: {})", input.display(), passes.join(", "));
        }
        Commands::Parse { input, ast } => {
            let parsed = read_and_parse(&input, &options)?;
            if ast {
                println!("{}", serde_json::to_string_pretty(&parsed.module)?);
            } else {
                println!("{:#?}", parsed.module);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from(["tlc", "lower", "a.ts", "--no-rest-args", "--no-lazy-imports"]).unwrap();
        let options = cli.frontend.options().unwrap();
        assert!(!options.rest_arguments);
        assert!(!options.lazy_imports);
        assert!(options.ambient_indexers);
        assert!(options.default_export_binding);
    }

    #[test]
    fn missing_config_is_an_error() {
        let cli = Cli::try_parse_from(["tlc", "--config", "/nonexistent/tl.json", "check", "a.ts"]).unwrap();
        let err = cli.frontend.options().unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
