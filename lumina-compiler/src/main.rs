//! The `lumina-compiler` CLI: compiles one Lumina shader source into a JSON
//! document carrying both GLSL 450 stages plus the interface manifest.
//!
//! Exit codes: 0 success, 1 fatal error (I/O or tokenizer), 2 argument
//! error, 3 cannot open output, 4 output write failure, 5 compilation
//! errors.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use lumina_lang::{compile, CompileOptions, CompileOutcome, Diagnostics};
use tracing_subscriber::EnvFilter;

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// Compiles Lumina shader sources into GLSL 450 plus a JSON interface
/// manifest
struct Args {
    /// Dump the token table, the parsed instructions and both GLSL sources
    #[clap(short = 'd', long = "debug")]
    debug: bool,

    /// Input shader source
    input: PathBuf,

    /// Output JSON file
    output: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // clap exits with code 2 on argument errors
    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> anyhow::Result<ExitCode> {
    let options = CompileOptions {
        debug: args.debug,
        include_directories: None,
    };

    let mut diagnostics = Diagnostics::new();
    let outcome = compile(&args.input, &options, &mut diagnostics)
        .with_context(|| format!("compiling '{}'", args.input.display()))?;

    eprint!("{}", diagnostics.render());

    let json = match outcome {
        CompileOutcome::Aborted { stage } => {
            eprintln!("Compilation aborted after {stage} due to errors.");
            return Ok(ExitCode::from(5));
        }
        CompileOutcome::Success { json } => json,
    };

    let mut out = match std::fs::File::create(&args.output) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("cannot open output: {}", args.output.display());
            return Ok(ExitCode::from(3));
        }
    };
    if out.write_all(json.as_bytes()).is_err() {
        eprintln!("write failed: {}", args.output.display());
        return Ok(ExitCode::from(4));
    }

    println!("Compilation complete: {}", args.output.display());
    Ok(ExitCode::from(0))
}
