//! Built-in types: signature element types and the C# keywords that alias them.

use strum::{EnumIter, FromRepr, IntoEnumIterator};

/// Primitive element types of II.23.1.16 that name a type on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, FromRepr)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum CilPrimitiveKind {
    Void = 0x01,
    Boolean = 0x02,
    Char = 0x03,
    I1 = 0x04,
    U1 = 0x05,
    I2 = 0x06,
    U2 = 0x07,
    I4 = 0x08,
    U4 = 0x09,
    I8 = 0x0A,
    U8 = 0x0B,
    R4 = 0x0C,
    R8 = 0x0D,
    String = 0x0E,
    TypedReference = 0x16,
    I = 0x18,
    U = 0x19,
    Object = 0x1C,
}

impl CilPrimitiveKind {
    /// Full CLR name, e.g. `System.Int32`.
    #[must_use]
    pub fn clr_name(self) -> &'static str {
        match self {
            CilPrimitiveKind::Void => "System.Void",
            CilPrimitiveKind::Boolean => "System.Boolean",
            CilPrimitiveKind::Char => "System.Char",
            CilPrimitiveKind::I1 => "System.SByte",
            CilPrimitiveKind::U1 => "System.Byte",
            CilPrimitiveKind::I2 => "System.Int16",
            CilPrimitiveKind::U2 => "System.UInt16",
            CilPrimitiveKind::I4 => "System.Int32",
            CilPrimitiveKind::U4 => "System.UInt32",
            CilPrimitiveKind::I8 => "System.Int64",
            CilPrimitiveKind::U8 => "System.UInt64",
            CilPrimitiveKind::R4 => "System.Single",
            CilPrimitiveKind::R8 => "System.Double",
            CilPrimitiveKind::String => "System.String",
            CilPrimitiveKind::TypedReference => "System.TypedReference",
            CilPrimitiveKind::I => "System.IntPtr",
            CilPrimitiveKind::U => "System.UIntPtr",
            CilPrimitiveKind::Object => "System.Object",
        }
    }

    /// The C# keyword for this type, if it has one.
    #[must_use]
    pub fn keyword(self) -> Option<&'static str> {
        Some(match self {
            CilPrimitiveKind::Void => "void",
            CilPrimitiveKind::Boolean => "bool",
            CilPrimitiveKind::Char => "char",
            CilPrimitiveKind::I1 => "sbyte",
            CilPrimitiveKind::U1 => "byte",
            CilPrimitiveKind::I2 => "short",
            CilPrimitiveKind::U2 => "ushort",
            CilPrimitiveKind::I4 => "int",
            CilPrimitiveKind::U4 => "uint",
            CilPrimitiveKind::I8 => "long",
            CilPrimitiveKind::U8 => "ulong",
            CilPrimitiveKind::R4 => "float",
            CilPrimitiveKind::R8 => "double",
            CilPrimitiveKind::String => "string",
            CilPrimitiveKind::I => "nint",
            CilPrimitiveKind::U => "nuint",
            CilPrimitiveKind::Object => "object",
            CilPrimitiveKind::TypedReference => return None,
        })
    }

    /// Returns `true` for value types (everything but `string`, `object` and `void`).
    #[must_use]
    pub fn is_value_type(self) -> bool {
        !matches!(
            self,
            CilPrimitiveKind::String | CilPrimitiveKind::Object | CilPrimitiveKind::Void
        )
    }
}

/// Maps a C# predefined type keyword to its CLR type name.
///
/// Covers the keywords without an element type of their own (`decimal`, `dynamic`) as well.
#[must_use]
pub fn keyword_clr_name(keyword: &str) -> Option<&'static str> {
    match keyword {
        "decimal" => Some("System.Decimal"),
        "dynamic" => Some("System.Object"),
        _ => CilPrimitiveKind::iter()
            .find(|kind| kind.keyword() == Some(keyword))
            .map(CilPrimitiveKind::clr_name),
    }
}

/// Returns `true` if `keyword` names a value type.
#[must_use]
pub fn keyword_is_value_type(keyword: &str) -> bool {
    keyword == "decimal"
        || CilPrimitiveKind::iter()
            .any(|kind| kind.keyword() == Some(keyword) && kind.is_value_type())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_types() {
        assert_eq!(
            CilPrimitiveKind::from_repr(0x08).map(CilPrimitiveKind::clr_name),
            Some("System.Int32")
        );
        assert_eq!(
            CilPrimitiveKind::from_repr(0x1C).map(CilPrimitiveKind::clr_name),
            Some("System.Object")
        );
        assert!(CilPrimitiveKind::from_repr(0x12).is_none());
    }

    #[test]
    fn keywords() {
        assert_eq!(keyword_clr_name("int"), Some("System.Int32"));
        assert_eq!(keyword_clr_name("string"), Some("System.String"));
        assert_eq!(keyword_clr_name("long"), Some("System.Int64"));
        assert_eq!(keyword_clr_name("decimal"), Some("System.Decimal"));
        assert_eq!(keyword_clr_name("Foo"), None);
        assert!(keyword_is_value_type("int"));
        assert!(keyword_is_value_type("decimal"));
        assert!(!keyword_is_value_type("string"));
    }
}
