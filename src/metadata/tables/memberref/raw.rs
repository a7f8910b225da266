use crate::metadata::{tables::CodedIndex, token::Token};

/// A raw MemberRef row.
#[derive(Clone, Debug)]
pub struct MemberRefRaw {
    /// 1-based row
    pub rid: u32,
    /// Token of this row
    pub token: Token,
    /// Declaring type, `MemberRefParent`
    pub class: CodedIndex,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Blob` index of the signature
    pub signature: u32,
}
