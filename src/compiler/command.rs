//! Compiling through an external csc-compatible command.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, info, warn};

use crate::{
    compiler::{CompileOptions, Compiler},
    diagnostics::{Diagnostic, Diagnostics, Severity},
    metadata::assembly::Assembly,
    syntax::SyntaxTree,
    Error, Result,
};

/// How to invoke the external compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCompilerConfig {
    /// Compiler executable, `csc` by default
    pub program: PathBuf,
    /// Assemblies passed as `-reference:`
    pub references: Vec<PathBuf>,
    /// Arguments placed before the generated ones
    pub extra_args: Vec<String>,
}

impl Default for CommandCompilerConfig {
    fn default() -> Self {
        CommandCompilerConfig {
            program: PathBuf::from("csc"),
            references: Vec::new(),
            extra_args: Vec::new(),
        }
    }
}

/// Compiles by running an external csc-compatible program and loading the DLL it writes.
///
/// The source is written to a temporary directory together with the output, so nothing is left
/// behind. Diagnostics are read from the program's output in the usual
/// `file(line,col): error CODE: message` form.
#[derive(Debug, Clone, Default)]
pub struct CommandCompiler {
    config: CommandCompilerConfig,
}

impl CommandCompiler {
    /// Creates a compiler running `config.program`.
    #[must_use]
    pub fn new(config: CommandCompilerConfig) -> Self {
        CommandCompiler { config }
    }

    /// The command configuration.
    #[must_use]
    pub fn config(&self) -> &CommandCompilerConfig {
        &self.config
    }

    fn arguments(&self, source: &Path, output: &Path, options: &CompileOptions) -> Vec<String> {
        let mut args = self.config.extra_args.clone();
        args.push("-nologo".to_string());
        args.push("-target:library".to_string());
        args.push(if options.disable_optimization {
            "-optimize-".to_string()
        } else {
            "-optimize+".to_string()
        });
        args.push(format!("-out:{}", output.display()));
        for reference in &self.config.references {
            args.push(format!("-reference:{}", reference.display()));
        }
        args.push(source.display().to_string());
        args
    }
}

impl Compiler for CommandCompiler {
    fn compile(
        &self,
        module_name: &str,
        tree: &SyntaxTree,
        options: &CompileOptions,
    ) -> Result<Assembly> {
        let directory = tempfile::tempdir()?;
        let source = directory.path().join(format!("{module_name}.cs"));
        let output = directory.path().join(format!("{module_name}.dll"));
        std::fs::write(&source, tree.source())?;

        let args = self.arguments(&source, &output, options);
        debug!("Running {} {}", self.config.program.display(), args.join(" "));
        let result = Command::new(&self.config.program).args(&args).output()?;

        let mut diagnostics = parse_output(&String::from_utf8_lossy(&result.stdout));
        diagnostics.extend(parse_output(&String::from_utf8_lossy(&result.stderr)));

        if !result.status.success() && !diagnostics.has_errors() {
            diagnostics.push(Diagnostic::error(
                "CMD0001",
                format!(
                    "'{}' exited with {}",
                    self.config.program.display(),
                    result.status
                ),
            ));
        }
        if diagnostics.has_errors() {
            return Err(Error::Compilation(diagnostics));
        }

        for diagnostic in diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
            warn!("{diagnostic}");
        }

        let assembly = Assembly::from_mem(module_name, std::fs::read(&output)?)?;
        info!(
            "Loaded compiled module '{}': {} types, {} methods",
            assembly.name(),
            assembly.types().len(),
            assembly.methods().len()
        );
        Ok(assembly)
    }
}

/// Collects the diagnostics printed by a csc-compatible compiler.
fn parse_output(output: &str) -> Diagnostics {
    output.lines().filter_map(Diagnostic::parse_line).collect::<Vec<_>>().into()
}
