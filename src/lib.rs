// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # jitscope
//!
//! Compile a C# source file and see the native x86/x64 code the runtime's JIT produced for each
//! member you declared, in the order you declared it.
//!
//! ## Features
//!
//! - **Declaration-level C# front end** - A `logos` lexer and recursive-descent parser for types
//!   and members; bodies are captured, not interpreted
//! - **Two compilers** - An in-process compiler that lays out ECMA-335 metadata the way a C#
//!   compiler does, or any csc-compatible command
//! - **Positional binding** - Overloads, constructors, accessors, explicit interface
//!   implementations and nested generic types are matched to compiled members by declaration
//!   order
//! - **Native listings** - iced-x86 decoding with call targets resolved to method signatures
//! - **Replayable runtimes** - A JSON runtime snapshot stands in for a live runtime
//!
//! ## Quick Start
//!
//! ```rust
//! use jitscope::prelude::*;
//!
//! let source = "class C { void M(int i) { } long M(string s) { return 0; } }";
//!
//! // Parse and compile
//! let tree = syntax::parse(source)?;
//! let assembly = MetadataCompiler::new().compile("quick", &tree, &CompileOptions::default())?;
//!
//! // Bind declarations to compiled members, in source order
//! let resolved = MemberResolver::new(&assembly).resolve(&collect_declarations(tree.root()))?;
//! let overloads = &resolved[0].children;
//! assert_eq!(assembly.method_signature_text(overloads[0].token), "System.Void C.M(System.Int32)");
//! assert_eq!(assembly.method_signature_text(overloads[1].token), "System.Int64 C.M(System.String)");
//! # Ok::<(), jitscope::Error>(())
//! ```
//!
//! ### Full listing
//!
//! [`pipeline::disassemble_file`] runs parse, compile, bind, prepare and render against a
//! [`pipeline::Toolchain`]:
//!
//! ```rust,no_run
//! use jitscope::prelude::*;
//!
//! let runtime = RuntimeSnapshot::from_file("runtime.json".as_ref())?;
//! let toolchain = Toolchain {
//!     compiler: &MetadataCompiler::new(),
//!     host: &runtime,
//!     runtime: &runtime,
//!     decoder: &IcedDecoder::new(),
//! };
//!
//! let options = DisassembleOptions::new("Program.cs");
//! disassemble_file(&options, &toolchain, &mut std::io::stdout())?;
//! # Ok::<(), jitscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`syntax`] - Lexer, parser and declaration-level AST
//! - [`compiler`] - The [`compiler::Compiler`] trait, the in-process and external compilers
//! - [`metadata`] - The compiled module model and its ECMA-335 loader
//! - [`binding`] - Declaration collection and positional member resolution
//! - [`runtime`] - Runtime introspection traits and JSON runtime snapshots
//! - [`disassembler`] - Disassembly tree, iced-x86 decoding and listing rendering
//! - [`pipeline`] - The end-to-end report
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Result<T, Error>`](Result). Problems with a single member,
//! such as a method the runtime never compiled, are not errors: they are written into the
//! listing as `;` comment lines.
//!
//! ```rust
//! use jitscope::{syntax, Error};
//!
//! match syntax::parse("class C {") {
//!     Err(Error::Syntax(diagnostics)) => assert!(diagnostics.has_errors()),
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```
#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use jitscope::prelude::*;
///
/// let tree = syntax::parse("class C { }")?;
/// assert!(collect_declarations(tree.root())[0].is_type());
/// # Ok::<(), jitscope::Error>(())
/// ```
pub mod prelude;

pub mod binding;
pub mod compiler;
pub mod diagnostics;
pub mod disassembler;
pub mod metadata;
pub mod pipeline;
pub mod runtime;
pub mod syntax;

/// `jitscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use jitscope::{syntax::{self, SyntaxTree}, Result};
///
/// fn parse_class(name: &str) -> Result<SyntaxTree> {
///     syntax::parse(&format!("class {name} {{ }}"))
/// }
/// # assert!(parse_class("C").is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `jitscope` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use metadata::{assembly::Assembly, token::Token};
pub use pipeline::{disassemble_file, DisassembleOptions, Toolchain};
