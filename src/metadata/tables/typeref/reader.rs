use crate::{
    file::io::read_le_at_dyn,
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfoRef, TypeRefRaw},
        token::Token,
    },
    Result,
};

impl RowReadable for TypeRefRaw {
    const TABLE: TableId = TableId::TypeRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            token: Token::from_parts(TableId::TypeRef, rid),
            resolution_scope: CodedIndex::read(
                data,
                offset,
                sizes,
                CodedIndexType::ResolutionScope,
            )?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::metadata::tables::{MetadataTable, TableInfo};

    use super::*;

    #[test]
    fn crafted_short() {
        #[rustfmt::skip]
        let data = vec![
            0x06, 0x00, // resolution_scope, AssemblyRef 1
            0x10, 0x00, // type_name
            0x20, 0x00, // type_namespace
            0x07, 0x00, // resolution_scope, TypeRef 1
            0x30, 0x00, // type_name
            0x00, 0x00, // type_namespace
        ];

        let sizes = Arc::new(TableInfo::from_rows(
            &[(TableId::TypeRef, 2), (TableId::AssemblyRef, 1)],
            false,
            false,
            false,
        ));
        let table = MetadataTable::<TypeRefRaw>::new(&data, 2, sizes).unwrap();
        let rows = table.rows().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].token.value(), 0x0100_0001);
        assert_eq!(
            rows[0].resolution_scope,
            CodedIndex::new(TableId::AssemblyRef, 1)
        );
        assert_eq!(rows[0].type_name, 0x10);
        assert_eq!(rows[1].resolution_scope, CodedIndex::new(TableId::TypeRef, 1));
        assert_eq!(rows[1].type_namespace, 0);
    }
}
