//! The end-to-end "disassemble a source file" operation.
//!
//! [`disassemble_file`] runs every stage in order and writes a line-oriented report:
//!
//! ```text
//! ; Parsing from file ... done. (3 ms)
//! ; Compiling ... done. (41 ms)
//! ; Analyzing ... done. (1 ms)
//!
//! ; CoreCLR CLR 8.0.8 (coreclr.dll) on x64.
//!
//! ; System.Void C.M(System.Int32)
//! 00007ffa`12340000  55          push rbp
//! ...
//! ```
//!
//! The progress lines are written only in verbose mode. Compilation, resolution and runtime
//! attachment failures abort the run; problems with a single member are reported inline by the
//! [`InstructionRenderer`] and do not.
//!
//! All collaborators come in through a [`Toolchain`], so the same pipeline drives an external
//! compiler against a live runtime or the in-process compiler against a [`RuntimeSnapshot`].
//!
//! [`RuntimeSnapshot`]: crate::runtime::RuntimeSnapshot

use std::{
    io::Write,
    path::{Path, PathBuf},
    time::Instant,
};

use log::info;

use crate::{
    binding::{collect_declarations, MemberResolver},
    compiler::{CompileOptions, Compiler},
    disassembler::{DisassemblyTreeBuilder, InstructionRenderer, NativeDecoder},
    runtime::{ExecutionHost, RuntimeAttach, RuntimeInfo},
    syntax::{self, SyntaxTree},
    Result,
};

/// Module name used when a source has no file name to take it from.
pub const DEFAULT_MODULE_NAME: &str = "jitscope";

/// What to disassemble and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisassembleOptions {
    /// The C# source file
    pub file_path: PathBuf,
    /// Compile without optimizations
    pub disable_optimization: bool,
    /// Write a progress line per stage
    pub verbose: bool,
}

impl DisassembleOptions {
    /// Options for `file_path` with optimizations enabled and no progress output.
    #[must_use]
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        DisassembleOptions {
            file_path: file_path.into(),
            ..Default::default()
        }
    }

    /// The name of the compiled module: the file stem of [`Self::file_path`].
    #[must_use]
    pub fn module_name(&self) -> String {
        self.file_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string())
    }
}

/// The collaborators of a run.
#[derive(Clone, Copy)]
pub struct Toolchain<'a> {
    /// Turns the syntax tree into a module
    pub compiler: &'a dyn Compiler,
    /// Prepares members and reports their entry addresses
    pub host: &'a dyn ExecutionHost,
    /// Attaches to the runtime holding the native code
    pub runtime: &'a dyn RuntimeAttach,
    /// Decodes native code
    pub decoder: &'a dyn NativeDecoder,
}

/// Compiles the file named by `options` and writes the native code of every declared member
/// to `out`.
///
/// # Errors
/// Returns [`crate::Error::Syntax`] or [`crate::Error::Compilation`] for invalid source,
/// [`crate::Error::Resolution`] if the compiled module does not match the declarations,
/// [`crate::Error::RuntimeAttach`] if no runtime is available and [`crate::Error::FileError`]
/// if the file cannot be read or `out` cannot be written.
pub fn disassemble_file(
    options: &DisassembleOptions,
    toolchain: &Toolchain<'_>,
    out: &mut dyn Write,
) -> Result<()> {
    let tree = stage(out, options.verbose, "Parsing from file", || {
        syntax::parse_file(&options.file_path)
    })?;
    report(&tree, &options.module_name(), options, toolchain, out)
}

/// Like [`disassemble_file`], for source text that is already in memory.
///
/// `options.file_path` is ignored; the module is named `module_name`.
///
/// # Errors
/// See [`disassemble_file`].
pub fn disassemble_source(
    source: &str,
    module_name: &str,
    options: &DisassembleOptions,
    toolchain: &Toolchain<'_>,
    out: &mut dyn Write,
) -> Result<()> {
    let tree = stage(out, options.verbose, "Parsing", || syntax::parse(source))?;
    report(&tree, module_name, options, toolchain, out)
}

fn report(
    tree: &SyntaxTree,
    module_name: &str,
    options: &DisassembleOptions,
    toolchain: &Toolchain<'_>,
    out: &mut dyn Write,
) -> Result<()> {
    let compile_options = CompileOptions {
        disable_optimization: options.disable_optimization,
    };
    let assembly = stage(out, options.verbose, "Compiling", || {
        toolchain
            .compiler
            .compile(module_name, tree, &compile_options)
    })?;

    let forest = stage(out, options.verbose, "Analyzing", || {
        let declarations = collect_declarations(tree.root());
        let resolved = MemberResolver::new(&assembly).resolve(&declarations)?;
        DisassemblyTreeBuilder::new(&assembly, toolchain.host).build(&resolved)
    })?;

    if options.verbose {
        writeln!(out)?;
    }

    let runtime = toolchain.runtime.attach_to_current_process()?;
    writeln!(out, "{}", banner(runtime.info()))?;

    let renderer = InstructionRenderer::new(
        &assembly,
        toolchain.host,
        runtime.as_ref(),
        toolchain.decoder,
    );
    for node in &forest {
        writeln!(out)?;
        renderer.render(node, out)?;
    }
    out.flush()?;

    info!(
        "Disassembled {} top-level declaration(s) of {}",
        forest.len(),
        module_name
    );
    Ok(())
}

/// `; CoreCLR CLR 8.0.8 (coreclr.dll) on x64.`
#[must_use]
pub fn banner(runtime: &RuntimeInfo) -> String {
    format!(
        "; {} CLR {} ({}) on {}.",
        runtime.flavor, runtime.version, runtime.module, runtime.architecture
    )
}

fn stage<T>(
    out: &mut dyn Write,
    verbose: bool,
    label: &str,
    run: impl FnOnce() -> Result<T>,
) -> Result<T> {
    if verbose {
        write!(out, "; {label} ... ")?;
        out.flush()?;
    }

    let start = Instant::now();
    let result = run();
    let elapsed = start.elapsed().as_millis();

    match &result {
        Ok(_) => {
            info!("{label} finished in {elapsed} ms");
            if verbose {
                writeln!(out, "done. ({elapsed} ms)")?;
            }
        }
        Err(_) => {
            if verbose {
                writeln!(out, "failed!")?;
            }
        }
    }
    result
}

/// Returns `true` if `path` looks like a C# source file.
#[must_use]
pub fn is_source_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("cs"))
}
