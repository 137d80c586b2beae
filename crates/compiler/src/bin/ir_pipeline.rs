//! IR pipeline entry point: passes 0–9 plus the textual MIR hand-off to
//! the external emitter.
//!
//! The module IR goes to stdout (or the given output path); declarations of
//! the runtime helpers the program needs go to stderr. Exits `0` on
//! success and `1` on any error.

use anyhow::Context;
use clap::Parser;
use rx_compiler::{init_tracing, read_input, report, run_ir, PipelineError};
use rx_compiler_mir::pretty::{render_externals, render_module};

#[derive(Parser)]
#[command(author, version, about = "Rx IR pipeline")]
struct Cli {
    /// Source file, or `-` for stdin
    input: String,

    /// Output path for the IR, or `-` for stdout
    #[arg(default_value = "-")]
    output: String,

    /// Render diagnostics as colored reports instead of the plain format
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (source, file_path) = read_input(&cli.input)?;
    let (analysis, module) = match run_ir(&source, &file_path) {
        Ok(output) => output,
        Err(PipelineError::Diagnostic(diagnostic)) => {
            report(&source, &diagnostic, cli.pretty);
            std::process::exit(1);
        }
        Err(error @ PipelineError::Internal(_)) => return Err(error.into()),
    };

    let ir = render_module(&module, &analysis.ctx);
    if cli.output == "-" {
        print!("{ir}");
    } else {
        std::fs::write(&cli.output, ir)
            .with_context(|| format!("cannot write `{}`", cli.output))?;
    }

    // Runtime helpers the emitter must link in.
    let externals = render_externals(&module, &analysis.ctx);
    if !externals.is_empty() {
        eprint!("{externals}");
    }
    Ok(())
}
