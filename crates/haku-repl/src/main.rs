//! haku CLI entry point.
//!
//! Usage:
//!   haku                       # Interactive REPL
//!   haku -c <code>             # Evaluate a snippet and exit
//!   haku script.hk             # Evaluate a script file and exit

use std::env;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> ExitCode {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        None => {
            haku_repl::run()?;
            Ok(ExitCode::SUCCESS)
        }

        Some("--help" | "-h") => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }

        Some("--version" | "-V") => {
            println!("haku {} ({} {})",
                     env!("CARGO_PKG_VERSION"),
                     env!("HAKU_GIT_HASH"),
                     env!("HAKU_BUILD_DATE"));
            Ok(ExitCode::SUCCESS)
        }

        Some("-c") => {
            let code = args.get(2)
                .context("-c requires a code argument")?;
            evaluate(code)
        }

        Some(path) if !path.starts_with('-') => run_script(path),

        Some(unknown) => {
            eprintln!("Unknown option: {unknown}");
            eprintln!("Run 'haku --help' for usage.");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_help() {
    println!(r#"haku v{}

Usage:
  haku                         Interactive REPL
  haku -c <code>               Evaluate a snippet and exit
  haku <script.hk>             Evaluate a script file and exit

Options:
  -c <code>                    Evaluate a snippet and exit
  -h, --help                   Show this help
  -V, --version                Show version

Environment:
  HAKU_RETAIN                  Keep variables between snippets (on/off)
  HAKU_MAX_PAGE_SIZE           Characters per page of paged output
  HAKU_PAGINATOR_IDLE_TIMEOUT  Seconds before paged output stops responding
  HAKU_INLINE_THRESHOLD        Longest result shown without paging
  HAKU_EXECUTION_TIMEOUT       Seconds a snippet may run
  HAKU_SECRET                  Text that must never be displayed
  RUST_LOG                     Log filter (tracing-subscriber syntax)

Examples:
  haku -c 'sum(range(10))'
  haku fib.hk
"#, env!("CARGO_PKG_VERSION"));
}

/// Evaluate a script file.
fn run_script(path: &str) -> Result<ExitCode> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {path}"))?;

    // Skip shebang if present
    let source = if source.starts_with("#!") {
        source.lines().skip(1).collect::<Vec<_>>().join("\n")
    } else {
        source
    };

    evaluate(&source)
}

fn evaluate(source: &str) -> Result<ExitCode> {
    if haku_repl::run_once(source)? {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
