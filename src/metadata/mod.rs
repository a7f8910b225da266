//! Compiled module metadata.
//!
//! This module reads the parts of an ECMA-335 image that are needed to map source declarations
//! onto compiled members: the CLR header, the metadata root and its streams, and the TypeDef,
//! MethodDef and related tables. The result is an [`assembly::Assembly`], a token-addressable
//! model of the module's types and methods.
//!
//! # Key Components
//!
//! - [`assembly`] - The compiled module model, its builder and the PE loader
//! - [`token`] - Metadata table row references used throughout .NET
//! - [`tables`] - Row readers for the metadata tables
//! - [`streams`] - Heap and `#~` stream parsing
//! - [`signatures`] - `MethodDefSig` decoding into CLR type names
//! - [`method`] / [`typesystem`] - Method and type definitions
//!
//! # Examples
//!
//! ```rust,no_run
//! use jitscope::metadata::assembly::Assembly;
//!
//! let assembly = Assembly::from_file("Sample.dll".as_ref())?;
//! for ty in assembly.types() {
//!     println!("{}", assembly.type_full_name(ty.token));
//! }
//! # Ok::<(), jitscope::Error>(())
//! ```

/// The compiled module model
pub mod assembly;
/// Implementation of the Header of CIL
pub mod cor20header;
/// Method definitions and their flags
pub mod method;
/// Implementation of the root metadata structure
pub mod root;
/// Implementation of method and type signatures
pub mod signatures;
/// Implementation of the physical metadata streams
pub mod streams;
/// Implementation of the metadata tables
pub mod tables;
/// Metadata tokens
pub mod token;
/// Type definitions
pub mod typesystem;
