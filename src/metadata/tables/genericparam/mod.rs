//! GenericParam table (0x2A): type parameters of generic types and methods.
//!
//! The C# compiler repeats the enclosing type's parameters on each nested type, so a nested type
//! of a generic type is itself generic.

mod raw;
mod reader;

pub use raw::GenericParamRaw;
