//! Semantic pipeline entry point: runs passes 0–8 and reports diagnostics.
//!
//! Prints nothing on success; exits `0` on success and `1` on any error.

use clap::Parser;
use rx_compiler::{init_tracing, read_input, report, run_semantic};

#[derive(Parser)]
#[command(author, version, about = "Rx semantic analysis pipeline")]
struct Cli {
    /// Source file, or `-` for stdin
    input: String,

    /// Render diagnostics as colored reports instead of the plain format
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let (source, file_path) = read_input(&cli.input)?;
    if let Err(diagnostic) = run_semantic(&source, &file_path) {
        report(&source, &diagnostic, cli.pretty);
        std::process::exit(1);
    }
    Ok(())
}
