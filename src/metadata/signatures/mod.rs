//! Decoding of `MethodDefSig` blobs (II.23.2.1) into CLR type names.
//!
//! Types are parsed into a small [`TypeSignature`] tree first and rendered afterwards, because
//! rendering needs names from the TypeDef/TypeRef tables and the generic parameter lists that
//! are only known once the whole module has been read.

use crate::{
    file::parser::Parser,
    metadata::{token::Token, typesystem::CilPrimitiveKind},
    Result,
};

const ELEMENT_TYPE_PTR: u8 = 0x0F;
const ELEMENT_TYPE_BYREF: u8 = 0x10;
const ELEMENT_TYPE_VALUETYPE: u8 = 0x11;
const ELEMENT_TYPE_CLASS: u8 = 0x12;
const ELEMENT_TYPE_VAR: u8 = 0x13;
const ELEMENT_TYPE_ARRAY: u8 = 0x14;
const ELEMENT_TYPE_GENERICINST: u8 = 0x15;
const ELEMENT_TYPE_FNPTR: u8 = 0x1B;
const ELEMENT_TYPE_SZARRAY: u8 = 0x1D;
const ELEMENT_TYPE_MVAR: u8 = 0x1E;
const ELEMENT_TYPE_CMOD_REQD: u8 = 0x1F;
const ELEMENT_TYPE_CMOD_OPT: u8 = 0x20;
const ELEMENT_TYPE_SENTINEL: u8 = 0x41;
const ELEMENT_TYPE_PINNED: u8 = 0x45;

const CALLCONV_GENERIC: u8 = 0x10;
const CALLCONV_HASTHIS: u8 = 0x20;
const CALLCONV_EXPLICITTHIS: u8 = 0x40;

/// Nesting limit for type signatures, guards against crafted blobs.
const MAX_DEPTH: usize = 64;

/// A decoded type from a signature blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSignature {
    /// A built-in type
    Primitive(CilPrimitiveKind),
    /// A class or value type, TypeDef/TypeRef/TypeSpec token
    Named(Token),
    /// An instantiated generic type
    GenericInst(Token, Vec<TypeSignature>),
    /// Single-dimensional, zero-based array
    SzArray(Box<TypeSignature>),
    /// General array with `rank` dimensions
    Array(Box<TypeSignature>, u32),
    /// Unmanaged pointer
    Ptr(Box<TypeSignature>),
    /// Managed reference, `ref`/`out`/`in`
    ByRef(Box<TypeSignature>),
    /// Type parameter of the declaring type
    Var(u32),
    /// Type parameter of the method
    MVar(u32),
    /// Function pointer
    FnPtr,
}

/// A decoded `MethodDefSig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDefSig {
    /// Instance method
    pub has_this: bool,
    /// `this` is passed explicitly as the first parameter
    pub explicit_this: bool,
    /// Number of method type parameters
    pub generic_param_count: u32,
    /// Return type
    pub return_type: TypeSignature,
    /// Parameter types
    pub params: Vec<TypeSignature>,
}

/// Supplies names for the tokens and generic parameters a signature refers to.
pub trait TypeNameContext {
    /// Full name of a TypeDef, TypeRef or TypeSpec.
    fn type_name(&self, token: Token) -> String;

    /// Name of the type parameter `index` of the declaring type.
    fn type_param_name(&self, index: u32) -> Option<String>;

    /// Name of the type parameter `index` of the method.
    fn method_param_name(&self, index: u32) -> Option<String>;
}

impl TypeSignature {
    /// Renders the type as a CLR type name, e.g. ``System.Collections.Generic.List`1[System.Int32]``.
    #[must_use]
    pub fn name(&self, context: &dyn TypeNameContext) -> String {
        match self {
            TypeSignature::Primitive(kind) => kind.clr_name().to_string(),
            TypeSignature::Named(token) => context.type_name(*token),
            TypeSignature::GenericInst(token, args) => {
                let args: Vec<String> = args.iter().map(|arg| arg.name(context)).collect();
                format!("{}[{}]", context.type_name(*token), args.join(","))
            }
            TypeSignature::SzArray(element) => format!("{}[]", element.name(context)),
            TypeSignature::Array(element, rank) => {
                let commas = ",".repeat(rank.saturating_sub(1) as usize);
                format!("{}[{commas}]", element.name(context))
            }
            TypeSignature::Ptr(element) => format!("{}*", element.name(context)),
            TypeSignature::ByRef(element) => format!("{}&", element.name(context)),
            TypeSignature::Var(index) => context
                .type_param_name(*index)
                .unwrap_or_else(|| format!("!{index}")),
            TypeSignature::MVar(index) => context
                .method_param_name(*index)
                .unwrap_or_else(|| format!("!!{index}")),
            TypeSignature::FnPtr => "System.IntPtr".to_string(),
        }
    }
}

/// Decodes a `MethodDefSig` blob.
///
/// # Errors
/// Returns an error if the blob is truncated or uses an element type that cannot appear in a
/// method signature.
pub fn parse_method_sig(blob: &[u8]) -> Result<MethodDefSig> {
    let mut parser = Parser::new(blob);
    read_method_sig(&mut parser, 0)
}

fn read_method_sig(parser: &mut Parser, depth: usize) -> Result<MethodDefSig> {
    let calling_convention = parser.read_le::<u8>()?;
    let generic_param_count = if calling_convention & CALLCONV_GENERIC != 0 {
        parser.read_compressed_uint()?
    } else {
        0
    };

    let param_count = parser.read_compressed_uint()?;
    let return_type = read_type(parser, depth + 1)?;

    let mut params = Vec::with_capacity(param_count.min(256) as usize);
    for _ in 0..param_count {
        if parser.peek_byte()? == ELEMENT_TYPE_SENTINEL {
            parser.read_le::<u8>()?;
        }
        params.push(read_type(parser, depth + 1)?);
    }

    Ok(MethodDefSig {
        has_this: calling_convention & CALLCONV_HASTHIS != 0,
        explicit_this: calling_convention & CALLCONV_EXPLICITTHIS != 0,
        generic_param_count,
        return_type,
        params,
    })
}

fn read_type(parser: &mut Parser, depth: usize) -> Result<TypeSignature> {
    if depth > MAX_DEPTH {
        return Err(malformed_error!("Signature nesting exceeds {}", MAX_DEPTH));
    }

    let element_type = parser.read_le::<u8>()?;
    if let Some(kind) = CilPrimitiveKind::from_repr(element_type) {
        return Ok(TypeSignature::Primitive(kind));
    }

    Ok(match element_type {
        ELEMENT_TYPE_CMOD_REQD | ELEMENT_TYPE_CMOD_OPT => {
            parser.read_compressed_token()?;
            read_type(parser, depth + 1)?
        }
        ELEMENT_TYPE_PINNED => read_type(parser, depth + 1)?,
        ELEMENT_TYPE_PTR => TypeSignature::Ptr(Box::new(read_type(parser, depth + 1)?)),
        ELEMENT_TYPE_BYREF => TypeSignature::ByRef(Box::new(read_type(parser, depth + 1)?)),
        ELEMENT_TYPE_SZARRAY => TypeSignature::SzArray(Box::new(read_type(parser, depth + 1)?)),
        ELEMENT_TYPE_VALUETYPE | ELEMENT_TYPE_CLASS => {
            TypeSignature::Named(parser.read_compressed_token()?)
        }
        ELEMENT_TYPE_VAR => TypeSignature::Var(parser.read_compressed_uint()?),
        ELEMENT_TYPE_MVAR => TypeSignature::MVar(parser.read_compressed_uint()?),
        ELEMENT_TYPE_GENERICINST => {
            // CLASS or VALUETYPE marker
            parser.read_le::<u8>()?;
            let base = parser.read_compressed_token()?;
            let count = parser.read_compressed_uint()?;
            let mut args = Vec::with_capacity(count.min(64) as usize);
            for _ in 0..count {
                args.push(read_type(parser, depth + 1)?);
            }
            TypeSignature::GenericInst(base, args)
        }
        ELEMENT_TYPE_ARRAY => {
            let element = read_type(parser, depth + 1)?;
            let rank = parser.read_compressed_uint()?;
            let sizes = parser.read_compressed_uint()?;
            for _ in 0..sizes {
                parser.read_compressed_uint()?;
            }
            let lower_bounds = parser.read_compressed_uint()?;
            for _ in 0..lower_bounds {
                parser.read_compressed_uint()?;
            }
            TypeSignature::Array(Box::new(element), rank)
        }
        ELEMENT_TYPE_FNPTR => {
            read_method_sig(parser, depth + 1)?;
            TypeSignature::FnPtr
        }
        _ => {
            return Err(malformed_error!(
                "Unexpected element type in signature - {:#04x}",
                element_type
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Names;

    impl TypeNameContext for Names {
        fn type_name(&self, token: Token) -> String {
            match token.value() {
                0x0100_0005 => "System.Collections.Generic.List`1".to_string(),
                0x0200_0002 => "N.C".to_string(),
                _ => format!("{token}"),
            }
        }

        fn type_param_name(&self, index: u32) -> Option<String> {
            (index == 0).then(|| "T".to_string())
        }

        fn method_param_name(&self, _index: u32) -> Option<String> {
            None
        }
    }

    #[test]
    fn instance_void_int() {
        // instance void (int32)
        let sig = parse_method_sig(&[0x20, 0x01, 0x01, 0x08]).unwrap();
        assert!(sig.has_this);
        assert_eq!(sig.generic_param_count, 0);
        assert_eq!(sig.return_type.name(&Names), "System.Void");
        assert_eq!(sig.params.len(), 1);
        assert_eq!(sig.params[0].name(&Names), "System.Int32");
    }

    #[test]
    fn generic_and_composite() {
        #[rustfmt::skip]
        let blob = [
            0x10, 0x01,             // generic, 1 type parameter
            0x04,                   // 4 parameters
            0x15, 0x12, 0x15, 0x01, 0x13, 0x00, // return List`1<!0>
            0x1D, 0x0E,             // string[]
            0x10, 0x1E, 0x00,       // ref !!0
            0x11, 0x08,             // valuetype N.C
            0x14, 0x08, 0x02, 0x00, 0x00, // int32[,]
        ];

        let sig = parse_method_sig(&blob).unwrap();
        assert!(!sig.has_this);
        assert_eq!(sig.generic_param_count, 1);
        assert_eq!(
            sig.return_type.name(&Names),
            "System.Collections.Generic.List`1[T]"
        );

        let params: Vec<String> = sig.params.iter().map(|p| p.name(&Names)).collect();
        assert_eq!(params, ["System.String[]", "!!0&", "N.C", "System.Int32[,]"]);
    }

    #[test]
    fn custom_modifiers_are_skipped() {
        // void (modreq(TypeRef 1) int32)
        let sig = parse_method_sig(&[0x00, 0x01, 0x01, 0x1F, 0x05, 0x08]).unwrap();
        assert_eq!(sig.params[0], TypeSignature::Primitive(CilPrimitiveKind::I4));
    }

    #[test]
    fn truncated() {
        assert!(parse_method_sig(&[0x20, 0x02, 0x01, 0x08]).is_err());
        assert!(parse_method_sig(&[0x20, 0x01, 0xEE]).is_err());
    }
}
