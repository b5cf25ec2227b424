//! xcc CLI
//!
//! Compiles a Xinu-dialect C source file to stack machine assembly.

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;
use std::path::PathBuf;

use xcc::driver::{Compiler, Options};

/// Xinu C dialect compiler
#[derive(ClapParser, Debug)]
#[command(name = "xcc")]
#[command(about = "Compiles a Xinu-flavoured C dialect to stack machine assembly")]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Source file to compile
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file path
    #[arg(short = 'o', long = "output", value_name = "FILE", default_value = "out.xc")]
    output: PathBuf,

    /// Print all tokens
    #[arg(long)]
    dump_tokens: bool,

    /// Print the abstract syntax tree
    #[arg(long)]
    dump_ast: bool,

    /// Print the symbol table
    #[arg(long)]
    dump_symbols: bool,

    /// Print the generated code
    #[arg(long)]
    dump_code: bool,

    /// Enable optimisations (reserved, no effect)
    #[arg(short = 'O')]
    optimize: bool,

    /// Warning level (0-3)
    #[arg(
        short = 'W',
        value_name = "LEVEL",
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(0..=3)
    )]
    warning_level: u8,

    /// Print compiler version
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: (),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let source = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    let mut compiler = Compiler::new(&source, cli.input.clone());
    compiler.set_options(Options {
        dump_tokens: cli.dump_tokens,
        dump_ast: cli.dump_ast,
        dump_symbols: cli.dump_symbols,
        dump_code: cli.dump_code,
        optimize: cli.optimize,
        warning_level: cli.warning_level,
        output_file: cli.output.clone(),
    });

    if !compiler.compile() {
        for err in compiler.errors() {
            eprintln!("Error: {err}");
        }
        bail!("compilation failed with {} error(s)", compiler.error_count());
    }

    compiler
        .write_output(&cli.output)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    println!("Output written to {}", cli.output.display());
    if compiler.warning_count() > 0 {
        println!("{} warning(s)", compiler.warning_count());
    }

    Ok(())
}
