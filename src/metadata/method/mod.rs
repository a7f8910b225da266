//! Methods defined in a compiled module.
//!
//! A [`MethodDefinition`] is everything the resolver and renderer need to know about a MethodDef
//! row: its name as stored in metadata (which for explicit interface implementations carries
//! the interface as a prefix), its flags, its decoded signature and whether the compiler
//! synthesized it.

mod types;

pub use types::*;

use std::fmt;

use crate::metadata::token::Token;

/// A decoded `MethodDefSig`, with all types rendered as CLR type names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Instance method, `this` is passed implicitly
    pub has_this: bool,
    /// Number of method type parameters
    pub generic_param_count: u32,
    /// Return type, e.g. `System.Void`
    pub return_type: String,
    /// Parameter types in declaration order, e.g. `System.Int32`
    pub params: Vec<String>,
}

impl MethodSignature {
    /// A `void()` signature.
    #[must_use]
    pub fn void(has_this: bool) -> Self {
        MethodSignature {
            has_this,
            generic_param_count: 0,
            return_type: "System.Void".to_string(),
            params: Vec::new(),
        }
    }
}

/// A method of a type in a compiled module.
#[derive(Debug, Clone)]
pub struct MethodDefinition {
    /// MethodDef token
    pub token: Token,
    /// Name as stored in metadata, e.g. `.ctor`, `get_Item` or `N.IFoo.M`
    pub name: String,
    /// Accessibility
    pub access: MethodAccessFlags,
    /// Modifiers
    pub modifiers: MethodModifiers,
    /// Implementation code type
    pub impl_code_type: MethodImplCodeType,
    /// Implementation options
    pub impl_options: MethodImplOptions,
    /// RVA of the IL body, 0 if there is none
    pub rva: u32,
    /// Decoded signature
    pub signature: MethodSignature,
    /// Names of the method's own type parameters
    pub generic_params: Vec<String>,
    /// The member carries `CompilerGeneratedAttribute`
    pub compiler_generated: bool,
    /// Token of the declaring TypeDef
    pub declaring_type: Token,
}

impl MethodDefinition {
    /// Creates a public `hidebysig` IL method; static unless the signature has `this`.
    ///
    /// The token and declaring type are assigned when the method is added to an
    /// [`crate::metadata::assembly::AssemblyBuilder`].
    pub fn new(name: impl Into<String>, signature: MethodSignature) -> Self {
        let mut modifiers = MethodModifiers::HIDE_BY_SIG;
        if !signature.has_this {
            modifiers |= MethodModifiers::STATIC;
        }

        MethodDefinition {
            token: Token::new(0),
            name: name.into(),
            access: MethodAccessFlags::PUBLIC,
            modifiers,
            impl_code_type: MethodImplCodeType::IL,
            impl_options: MethodImplOptions::empty(),
            rva: 0,
            generic_params: Vec::new(),
            signature,
            compiler_generated: false,
            declaring_type: Token::new(0),
        }
    }

    /// Returns `true` for static methods, including type initializers.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns `true` if the method has no body to compile.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.contains(MethodModifiers::ABSTRACT)
    }

    /// Returns `true` for a method with unbound type parameters of its own.
    #[must_use]
    pub fn is_generic_method_definition(&self) -> bool {
        self.signature.generic_param_count > 0
    }

    /// Returns `true` for instance and static constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.modifiers.contains(MethodModifiers::RTSPECIAL_NAME)
            && (self.name == ".ctor" || self.name == ".cctor")
    }
}

impl fmt::Display for MethodDefinition {
    /// Formats as `ReturnType Name(Param, Param)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.signature.return_type, self.name)?;
        if !self.generic_params.is_empty() {
            write!(f, "[{}]", self.generic_params.join(","))?;
        }
        write!(f, "({})", self.signature.params.join(", "))
    }
}
