use std::path::PathBuf;

use clap::Parser;

/// jitscope - compile a C# file and list the native code the JIT generated for each member
#[derive(Debug, Parser)]
#[command(name = "jitscope", version, about, long_about = None)]
pub struct Cli {
    /// Path to the C# source file.
    #[arg(short, long, value_name = "FILE")]
    pub file: PathBuf,

    /// Compile without optimizations.
    #[arg(short, long)]
    pub disable_optimization: bool,

    /// Print stage timings and enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,

    /// JSON runtime snapshot to read native code from.
    #[arg(long, value_name = "SNAPSHOT")]
    pub runtime: Option<PathBuf>,

    /// Compile with an external csc-compatible program instead of the built-in compiler.
    #[arg(long, value_name = "PROGRAM")]
    pub csc: Option<PathBuf>,

    /// Assembly reference for the external compiler. May be repeated.
    #[arg(short = 'r', long = "reference", value_name = "DLL")]
    pub references: Vec<PathBuf>,
}
