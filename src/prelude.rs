//! # jitscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the jitscope library. Import it to get the whole parse, compile, bind and render
//! chain in scope.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all jitscope operations
pub use crate::Error;

/// The result type used throughout jitscope
pub use crate::Result;

/// Compiler-style diagnostics
pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};

// ================================================================================================
// Source and Compilation
// ================================================================================================

/// Parsing entry points and the parsed tree
pub use crate::syntax::{self, SyntaxTree};

/// Compilers and their options
pub use crate::compiler::{
    CommandCompiler, CommandCompilerConfig, CompileOptions, Compiler, MetadataCompiler,
};

// ================================================================================================
// Metadata
// ================================================================================================

/// The compiled module model
pub use crate::metadata::assembly::{Assembly, AssemblyBuilder};

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// Method and type definitions
pub use crate::metadata::{
    method::{MethodDefinition, MethodSignature},
    typesystem::TypeDefinition,
};

// ================================================================================================
// Binding
// ================================================================================================

/// Declaration collection and positional resolution
pub use crate::binding::{
    collect_declarations, DeclarationKind, DeclarationNode, MemberNode, MemberResolver,
};

// ================================================================================================
// Runtime and Disassembly
// ================================================================================================

/// Runtime introspection
pub use crate::runtime::{
    Architecture, ExecutionHost, NativeMethod, NoRuntime, RuntimeAttach, RuntimeHandle,
    RuntimeInfo, RuntimeSnapshot, SnapshotMethod,
};

/// Native code decoding and rendering
pub use crate::disassembler::{
    AddressFormatter, DecodedInstruction, DisassemblyNode, DisassemblyTreeBuilder, IcedDecoder,
    InstructionRenderer, NativeDecoder, SymbolLookup,
};

/// The end-to-end report
pub use crate::pipeline::{disassemble_file, disassemble_source, DisassembleOptions, Toolchain};
