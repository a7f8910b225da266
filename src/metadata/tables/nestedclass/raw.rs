use crate::metadata::token::Token;

/// A raw NestedClass row.
#[derive(Clone, Debug)]
pub struct NestedClassRaw {
    /// 1-based row
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// TypeDef row of the nested type
    pub nested_class: u32,
    /// TypeDef row of the enclosing type
    pub enclosing_class: u32,
}
