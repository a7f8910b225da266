mod app;

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use jitscope::{
    compiler::{CommandCompiler, CommandCompilerConfig, Compiler, MetadataCompiler},
    disassembler::IcedDecoder,
    pipeline::{disassemble_file, is_source_file, DisassembleOptions, Toolchain},
    runtime::{ExecutionHost, NoRuntime, RuntimeAttach, RuntimeSnapshot},
};

use crate::app::Cli;

fn main() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        eprintln!("\nCancelled.");
        std::process::exit(130);
    })
    .context("failed to set Ctrl+C handler")?;

    let cli = Cli::parse();

    // jitscope info+ on stderr; --verbose enables debug; RUST_LOG overrides
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("jitscope", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    run(&cli)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    if !is_source_file(&cli.file) {
        log::warn!("{} does not look like a C# source file", cli.file.display());
    }

    let compiler: Box<dyn Compiler> = match &cli.csc {
        Some(program) => Box::new(CommandCompiler::new(CommandCompilerConfig {
            program: program.clone(),
            references: cli.references.clone(),
            ..Default::default()
        })),
        None => {
            if !cli.references.is_empty() {
                log::warn!("--reference is only used together with --csc");
            }
            Box::new(MetadataCompiler::new())
        }
    };

    let snapshot = cli
        .runtime
        .as_deref()
        .map(RuntimeSnapshot::from_file)
        .transpose()
        .with_context(|| "failed to load the runtime snapshot")?;
    let (host, runtime): (&dyn ExecutionHost, &dyn RuntimeAttach) = match &snapshot {
        Some(snapshot) => (snapshot, snapshot),
        None => (&NoRuntime, &NoRuntime),
    };

    let decoder = IcedDecoder::new();
    let toolchain = Toolchain {
        compiler: compiler.as_ref(),
        host,
        runtime,
        decoder: &decoder,
    };
    let options = DisassembleOptions {
        file_path: cli.file.clone(),
        disable_optimization: cli.disable_optimization,
        verbose: cli.verbose,
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    disassemble_file(&options, &toolchain, &mut out)
        .with_context(|| format!("failed to disassemble {}", cli.file.display()))?;
    out.flush()?;
    Ok(())
}
