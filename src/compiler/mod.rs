//! Compiling a syntax tree into a module.
//!
//! A [`Compiler`] turns a [`SyntaxTree`] into an [`Assembly`] whose members are later located by
//! the runtime. Two compilers are provided:
//!
//! - [`MetadataCompiler`] lowers declarations straight into metadata, in process. It lays out
//!   types and methods the way a C# compiler does, which is all the resolver depends on.
//! - [`CommandCompiler`] runs an external csc-compatible program and loads the produced DLL.
//!
//! Both report failures as [`crate::Error::Compilation`] carrying every diagnostic.
//!
//! # Examples
//!
//! ```rust
//! use jitscope::{
//!     compiler::{CompileOptions, Compiler, MetadataCompiler},
//!     syntax,
//! };
//!
//! let tree = syntax::parse("class C { void M(int i) { } long M(string s) { return 0; } }")?;
//! let assembly = MetadataCompiler::new().compile("test", &tree, &CompileOptions::default())?;
//!
//! let class = assembly.find_type("", "C").unwrap();
//! let names: Vec<&str> = assembly
//!     .declared_methods(class.token)
//!     .map(|m| m.name.as_str())
//!     .collect();
//! assert_eq!(names, ["M", "M", ".ctor"]);
//! # Ok::<(), jitscope::Error>(())
//! ```

mod command;
mod emit;
mod names;

pub use command::{CommandCompiler, CommandCompilerConfig};
pub use emit::MetadataCompiler;

use crate::{metadata::assembly::Assembly, syntax::SyntaxTree, Result};

/// Options that affect code generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Compile without optimizations, the equivalent of `-optimize-`
    pub disable_optimization: bool,
}

/// Compiles a syntax tree into a module.
pub trait Compiler {
    /// Compiles `tree` into a module called `module_name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Compilation`] when any error-severity diagnostic is reported.
    fn compile(
        &self,
        module_name: &str,
        tree: &SyntaxTree,
        options: &CompileOptions,
    ) -> Result<Assembly>;
}
