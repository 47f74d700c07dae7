//! Beacon compiler front-end CLI.
//!
//! Provides the `beacon` binary. `beacon validate <root>` loads a project
//! directory through the program pipeline and prints diagnostics, pretty or
//! as JSON for machine consumption.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use beacon_core::diagnostic::{Diagnostic, Severity};
use beacon_core::error::CoreError;
use beacon_core::options::ProgramOptions;
use beacon_core::path::FileSpec;
use beacon_program::Program;

/// Beacon language tools.
#[derive(Parser)]
#[command(name = "beacon", about = "Beacon language compiler front-end")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a project root and report diagnostics.
    Validate {
        /// Project root directory.
        root: PathBuf,

        /// Output format.
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,

        /// Optional path to a JSON options file (rootDir is overridden by
        /// the positional root).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate {
            root,
            format,
            config,
        } => {
            let exit_code = run_validate(&root, format, config.as_deref());
            process::exit(exit_code);
        }
    }
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 = no errors, 1 = error diagnostics present,
/// 2 = usage or I/O failure.
fn run_validate(root: &Path, format: Format, config: Option<&Path>) -> i32 {
    let options = match build_options(root, config) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("Error: {message}");
            return 2;
        }
    };

    let mut program = match Program::new(options) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };

    let loaded = match load_project(&mut program) {
        Ok(count) => count,
        Err(e) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };
    tracing::debug!(files = loaded, "project loaded");

    program.validate();
    let diagnostics = program.get_diagnostics();

    match format {
        Format::Json => {
            let json = serde_json::to_string_pretty(&diagnostics)
                .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize: {e}\"}}"));
            println!("{json}");
        }
        Format::Pretty => {
            for diagnostic in &diagnostics {
                println!("{}", render(diagnostic));
            }
            eprintln!(
                "{} file(s), {} diagnostic(s)",
                program.file_count(),
                diagnostics.len()
            );
        }
    }

    let has_errors = diagnostics
        .iter()
        .any(|diagnostic| diagnostic.severity == Severity::Error);
    if has_errors {
        1
    } else {
        0
    }
}

fn build_options(root: &Path, config: Option<&Path>) -> Result<ProgramOptions, String> {
    if !root.is_dir() {
        return Err(format!("'{}' is not a directory", root.display()));
    }
    let mut options = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
            serde_json::from_str::<ProgramOptions>(&text)
                .map_err(|e| format!("invalid config '{}': {e}", path.display()))?
        }
        None => ProgramOptions::default(),
    };
    options.root_dir = root
        .canonicalize()
        .map_err(|e| format!("failed to resolve '{}': {e}", root.display()))?;
    Ok(options)
}

/// Feeds every script and component description under the program's root
/// directory into the program. Returns the number of files loaded.
fn load_project(program: &mut Program) -> Result<usize, CoreError> {
    let root = program.options().root_dir.clone();
    let script_extension = program.options().script_extension.clone();
    let component_extension = program.options().component_extension.clone();

    let mut loaded = 0usize;
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        let wanted = matches!(
            extension.as_deref(),
            Some(e) if e == script_extension || e == component_extension
        );
        if !wanted {
            continue;
        }

        let contents = std::fs::read_to_string(path).map_err(|e| CoreError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let dest = path
            .strip_prefix(&root)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.display().to_string());
        program.set_file(
            FileSpec::SrcDest {
                src: Some(path.display().to_string()),
                src_path: None,
                dest: Some(dest),
                pkg_path: None,
            },
            &contents,
        )?;
        loaded += 1;
    }
    Ok(loaded)
}

fn render(diagnostic: &Diagnostic) -> String {
    let severity = match diagnostic.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "info",
        Severity::Hint => "hint",
    };
    format!(
        "{severity}[{code}] {path}:{line}:{character} {message}",
        code = diagnostic.code,
        path = diagnostic.pkg_path,
        line = diagnostic.range.start.line + 1,
        character = diagnostic.range.start.character + 1,
        message = diagnostic.message,
    )
}
