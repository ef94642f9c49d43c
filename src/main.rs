use anyhow::Context as _;
use clap::Parser;
use inkwell::context::Context;

use minnow::lexer::Lexer;
use minnow::repl::Repl;

use std::fs;
use std::path::PathBuf;

/// JIT compiler and REPL for the minnow language.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Source file compiled before the entry call or the interactive
    /// session.
    file: Option<PathBuf>,

    /// Symbol resolved and called as `fn() -> double` once compilation is
    /// done.
    #[arg(long)]
    entry: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let context = Context::create();
    let mut repl = Repl::new(&context)?;

    if let Some(path) = &cli.file {
        let source = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        repl.run(Lexer::from_bytes(source), false);
        // Program-as-file mode: call the entry symbol and exit.
        if let Some(entry) = &cli.entry {
            return report_entry(&repl, entry);
        }
    }

    repl.run(Lexer::from_stdin(), true);
    if let Some(entry) = &cli.entry {
        return report_entry(&repl, entry);
    }
    Ok(())
}

fn report_entry(repl: &Repl<'_>, entry: &str) -> anyhow::Result<()> {
    let result = repl
        .call_entry(entry)
        .ok_or_else(|| anyhow::anyhow!("entry symbol '{entry}' not found"))?;
    println!("{result}");
    Ok(())
}
