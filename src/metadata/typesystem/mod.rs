//! Types defined in a compiled module.

mod primitives;

pub use primitives::{keyword_clr_name, keyword_is_value_type, CilPrimitiveKind};

use crate::metadata::token::Token;

/// Constants of the `TypeAttributes` bitmask (II.23.1.15).
#[allow(non_snake_case)]
pub mod TypeAttributes {
    /// Mask for the visibility bits
    pub const VISIBILITY_MASK: u32 = 0x0000_0007;
    /// Class is not public scope
    pub const NOT_PUBLIC: u32 = 0x0000_0000;
    /// Class is public scope
    pub const PUBLIC: u32 = 0x0000_0001;
    /// Class is nested with public visibility
    pub const NESTED_PUBLIC: u32 = 0x0000_0002;
    /// Class is nested with private visibility
    pub const NESTED_PRIVATE: u32 = 0x0000_0003;
    /// Class is nested with family visibility
    pub const NESTED_FAMILY: u32 = 0x0000_0004;
    /// Class is nested with assembly visibility
    pub const NESTED_ASSEMBLY: u32 = 0x0000_0005;
    /// Class is nested with family and assembly visibility
    pub const NESTED_FAM_AND_ASSEM: u32 = 0x0000_0006;
    /// Class is nested with family or assembly visibility
    pub const NESTED_FAM_OR_ASSEM: u32 = 0x0000_0007;
    /// Fields are laid out sequentially
    pub const SEQUENTIAL_LAYOUT: u32 = 0x0000_0008;
    /// Type is an interface
    pub const INTERFACE: u32 = 0x0000_0020;
    /// Class is abstract
    pub const ABSTRACT: u32 = 0x0000_0080;
    /// Class cannot be extended
    pub const SEALED: u32 = 0x0000_0100;
    /// Class name is special
    pub const SPECIAL_NAME: u32 = 0x0000_0400;
    /// Initialize the class before first static field access
    pub const BEFORE_FIELD_INIT: u32 = 0x0010_0000;
}

/// A type defined in a compiled module.
#[derive(Debug, Clone)]
pub struct TypeDefinition {
    /// TypeDef token
    pub token: Token,
    /// Name as stored in metadata, including a `` `N `` arity suffix for generic types
    pub name: String,
    /// Namespace; empty for nested types and the global namespace
    pub namespace: String,
    /// `TypeAttributes`
    pub flags: u32,
    /// Token of the enclosing type, for nested types
    pub enclosing: Option<Token>,
    /// Names of all type parameters, inherited ones first
    pub generic_params: Vec<String>,
    /// Methods in metadata enumeration order
    pub methods: Vec<Token>,
    /// Directly nested types in metadata order
    pub nested: Vec<Token>,
    /// The type carries `CompilerGeneratedAttribute`
    pub compiler_generated: bool,
}

impl TypeDefinition {
    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.flags & TypeAttributes::INTERFACE != 0
    }

    /// Returns `true` for a type with unbound type parameters, inherited ones included.
    #[must_use]
    pub fn is_generic_type_definition(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

/// Appends the `` `N `` arity suffix the C# compiler gives generic names.
#[must_use]
pub fn generic_arity_name(name: &str, arity: usize) -> String {
    if arity == 0 {
        name.to_string()
    } else {
        format!("{name}`{arity}")
    }
}
