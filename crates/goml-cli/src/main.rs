use clap::Parser;
use goml_core::config::Config;
use goml_core::CompileError;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "goml", about = "Lower markup statements in .goml files to plain Go")]
struct Cli {
    /// Input files or directories. Omit to read from stdin.
    #[arg()]
    input: Vec<PathBuf>,

    /// Output file (stdin or a single input) or directory (multiple inputs).
    /// By default each input is written next to itself with its last
    /// extension dropped (`page.go.goml` -> `page.go`, `page.goml` -> `page.go`).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only parse and report syntax errors; write nothing.
    #[arg(long)]
    check: bool,

    /// Treat input as a bare statement list instead of a file with a package clause.
    #[arg(long)]
    fragment: bool,

    /// More logging: -v for debug, -vv for trace. RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, thiserror::Error)]
enum DriverError {
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("{}: {source}", .path.display())]
    Compile { path: PathBuf, source: CompileError },
    #[error("no .{0} files found")]
    NoInputs(String),
    #[error("{}: input has no extension, output would overwrite it", .0.display())]
    OutputPath(PathBuf),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(DriverError::Compile {
            source: CompileError::Syntax(errors),
            ..
        }) => {
            for err in errors.iter() {
                eprintln!("{err}");
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), DriverError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if cli.fragment {
        config.parser.fragment = true;
    }

    if cli.input.is_empty() {
        let stdin = Path::new("<stdin>");
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|source| DriverError::Io {
                path: stdin.to_path_buf(),
                source,
            })?;
        if cli.check {
            return check_source(&input, stdin, &config);
        }
        let result = compile_source(&input, stdin, &config)?;
        return write_output(&result, cli.output.as_deref());
    }

    let files = collect_inputs(&cli.input, &config.output.extension)?;
    if files.is_empty() {
        return Err(DriverError::NoInputs(config.output.extension.clone()));
    }
    debug!(count = files.len(), "collected inputs");

    for file in &files {
        let input = std::fs::read_to_string(file).map_err(|source| DriverError::Io {
            path: file.clone(),
            source,
        })?;
        if cli.check {
            check_source(&input, file, &config)?;
            continue;
        }

        let out_path = output_path(file, cli.output.as_deref(), files.len())?;
        let result = compile_source(&input, file, &config)?;
        write_output(&result, Some(&out_path))?;
        info!("{} -> {}", file.display(), out_path.display());
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Config, DriverError> {
    let toml_str = std::fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml(&toml_str).map_err(|source| DriverError::Config {
        path: path.to_path_buf(),
        source,
    })
}

fn compile_source(input: &str, path: &Path, config: &Config) -> Result<String, DriverError> {
    goml_core::compile(input, &path.display().to_string(), config).map_err(|source| {
        DriverError::Compile {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn check_source(input: &str, path: &Path, config: &Config) -> Result<(), DriverError> {
    goml_core::check(input, &path.display().to_string(), config).map_err(|errors| {
        DriverError::Compile {
            path: path.to_path_buf(),
            source: errors.into(),
        }
    })
}

/// The input with its last extension dropped (`page.go.goml` becomes
/// `page.go`); a bare `page.goml` becomes `page.go` as well. Written next to
/// the input unless `--output` names a file (one input) or a directory
/// (several).
fn output_path(input: &Path, output: Option<&Path>, inputs: usize) -> Result<PathBuf, DriverError> {
    let Some(extension) = input.extension() else {
        return Err(DriverError::OutputPath(input.to_path_buf()));
    };
    let mut stripped = input.with_extension("");
    if stripped.extension().is_none() && extension == "goml" {
        stripped.set_extension("go");
    }
    match output {
        Some(path) if inputs == 1 => Ok(path.to_path_buf()),
        Some(dir) => match stripped.file_name() {
            Some(name) => Ok(dir.join(name)),
            None => Err(DriverError::OutputPath(input.to_path_buf())),
        },
        None => Ok(stripped),
    }
}

fn write_output(content: &str, output: Option<&Path>) -> Result<(), DriverError> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| DriverError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            std::fs::write(path, content).map_err(|source| DriverError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
        None => io::stdout()
            .write_all(content.as_bytes())
            .map_err(|source| DriverError::Io {
                path: PathBuf::from("<stdout>"),
                source,
            }),
    }
}

/// Explicit files are kept in command-line order; each directory contributes
/// its files with the configured extension, sorted, in its place.
fn collect_inputs(inputs: &[PathBuf], extension: &str) -> Result<Vec<PathBuf>, DriverError> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            files.push(input.clone());
            continue;
        }
        let io_error = |source| DriverError::Io {
            path: input.clone(),
            source,
        };
        let mut found = Vec::new();
        for entry in std::fs::read_dir(input).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(extension) {
                found.push(path);
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}
