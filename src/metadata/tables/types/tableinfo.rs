use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le_at,
    metadata::tables::types::{CodedIndexType, TableId},
    Error::OutOfBounds,
    Result,
};

/// Row count and index width of a single table.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits needed to address every row
    pub bits: u8,
    /// Whether a simple index into this table needs 4 bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Derives the index width for a table with `rows` rows.
    #[must_use]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            // 32 - leading_zeros is at most 32
            #[allow(clippy::cast_possible_truncation)]
            let bits = (32 - rows.leading_zeros()) as u8;
            bits
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// A single column of a metadata table row, as laid out on disk.
#[derive(Clone, Copy, Debug)]
enum Column {
    Fixed(u8),
    Str,
    Guid,
    Blob,
    Index(TableId),
    Coded(CodedIndexType),
}

/// Column layouts of all tables, II.22.2 - II.22.39.
#[rustfmt::skip]
fn columns(table: TableId) -> &'static [Column] {
    use Column::{Blob, Coded, Fixed, Guid, Index, Str};
    use CodedIndexType as C;

    match table {
        TableId::Module                 => &[Fixed(2), Str, Guid, Guid, Guid],
        TableId::TypeRef                => &[Coded(C::ResolutionScope), Str, Str],
        TableId::TypeDef                => &[Fixed(4), Str, Str, Coded(C::TypeDefOrRef), Index(TableId::Field), Index(TableId::MethodDef)],
        TableId::FieldPtr               => &[Index(TableId::Field)],
        TableId::Field                  => &[Fixed(2), Str, Blob],
        TableId::MethodPtr              => &[Index(TableId::MethodDef)],
        TableId::MethodDef              => &[Fixed(4), Fixed(2), Fixed(2), Str, Blob, Index(TableId::Param)],
        TableId::ParamPtr               => &[Index(TableId::Param)],
        TableId::Param                  => &[Fixed(2), Fixed(2), Str],
        TableId::InterfaceImpl          => &[Index(TableId::TypeDef), Coded(C::TypeDefOrRef)],
        TableId::MemberRef              => &[Coded(C::MemberRefParent), Str, Blob],
        TableId::Constant               => &[Fixed(2), Coded(C::HasConstant), Blob],
        TableId::CustomAttribute        => &[Coded(C::HasCustomAttribute), Coded(C::CustomAttributeType), Blob],
        TableId::FieldMarshal           => &[Coded(C::HasFieldMarshal), Blob],
        TableId::DeclSecurity           => &[Fixed(2), Coded(C::HasDeclSecurity), Blob],
        TableId::ClassLayout            => &[Fixed(2), Fixed(4), Index(TableId::TypeDef)],
        TableId::FieldLayout            => &[Fixed(4), Index(TableId::Field)],
        TableId::StandAloneSig          => &[Blob],
        TableId::EventMap               => &[Index(TableId::TypeDef), Index(TableId::Event)],
        TableId::EventPtr               => &[Index(TableId::Event)],
        TableId::Event                  => &[Fixed(2), Str, Coded(C::TypeDefOrRef)],
        TableId::PropertyMap            => &[Index(TableId::TypeDef), Index(TableId::Property)],
        TableId::PropertyPtr            => &[Index(TableId::Property)],
        TableId::Property               => &[Fixed(2), Str, Blob],
        TableId::MethodSemantics        => &[Fixed(2), Index(TableId::MethodDef), Coded(C::HasSemantics)],
        TableId::MethodImpl             => &[Index(TableId::TypeDef), Coded(C::MethodDefOrRef), Coded(C::MethodDefOrRef)],
        TableId::ModuleRef              => &[Str],
        TableId::TypeSpec               => &[Blob],
        TableId::ImplMap                => &[Fixed(2), Coded(C::MemberForwarded), Str, Index(TableId::ModuleRef)],
        TableId::FieldRVA               => &[Fixed(4), Index(TableId::Field)],
        TableId::EncLog                 => &[Fixed(4), Fixed(4)],
        TableId::EncMap                 => &[Fixed(4)],
        TableId::Assembly               => &[Fixed(4), Fixed(2), Fixed(2), Fixed(2), Fixed(2), Fixed(4), Blob, Str, Str],
        TableId::AssemblyProcessor      => &[Fixed(4)],
        TableId::AssemblyOS             => &[Fixed(4), Fixed(4), Fixed(4)],
        TableId::AssemblyRef            => &[Fixed(2), Fixed(2), Fixed(2), Fixed(2), Fixed(4), Blob, Str, Str, Blob],
        TableId::AssemblyRefProcessor   => &[Fixed(4), Index(TableId::AssemblyRef)],
        TableId::AssemblyRefOS          => &[Fixed(4), Fixed(4), Fixed(4), Index(TableId::AssemblyRef)],
        TableId::File                   => &[Fixed(4), Str, Blob],
        TableId::ExportedType           => &[Fixed(4), Fixed(4), Str, Str, Coded(C::Implementation)],
        TableId::ManifestResource       => &[Fixed(4), Fixed(4), Str, Coded(C::Implementation)],
        TableId::NestedClass            => &[Index(TableId::TypeDef), Index(TableId::TypeDef)],
        TableId::GenericParam           => &[Fixed(2), Fixed(2), Coded(C::TypeOrMethodDef), Str],
        TableId::MethodSpec             => &[Coded(C::MethodDefOrRef), Blob],
        TableId::GenericParamConstraint => &[Index(TableId::GenericParam), Coded(C::TypeDefOrRef)],
    }
}

/// Row counts and index widths of every table in a `#~` stream, plus heap index widths.
#[derive(Clone, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Shared reference to a [`TableInfo`]
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Reads the row counts that follow the `#~` header.
    ///
    /// `data` is the complete tables stream; `valid_bitvec` its `valid` field.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream is truncated, or
    /// [`crate::Error::NotSupported`] if it declares tables this reader does not know.
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        if valid_bitvec >> TableId::COUNT != 0 {
            return Err(crate::Error::NotSupported);
        }

        let mut table_info = vec![TableRowInfo::default(); TableId::COUNT];
        let mut next_row_offset = 24;

        for table_id in TableId::iter() {
            if (valid_bitvec & (1 << table_id as usize)) == 0 {
                continue;
            }

            let row_count = read_le_at::<u32>(data, &mut next_row_offset)?;
            table_info[table_id as usize] = TableRowInfo::new(row_count);
        }

        let heap_size_flags = *data.get(6).ok_or(OutOfBounds)?;
        let mut table_info = TableInfo {
            rows: table_info,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        };

        table_info.calculate_coded_index_bits();

        Ok(table_info)
    }

    /// Builds a [`TableInfo`] from explicit row counts.
    #[must_use]
    pub fn from_rows(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut table_info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::COUNT],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for (table, rows) in valid_tables {
            table_info.rows[*table as usize] = TableRowInfo::new(*rows);
        }

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Splits a raw coded index into its table and row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the tag does not name a table of `coded_index_type`.
    pub fn decode_coded_index(
        &self,
        value: u32,
        coded_index_type: CodedIndexType,
    ) -> Result<(TableId, u32)> {
        let tables = coded_index_type.tables();
        let tag_bits = coded_index_type.tag_bits();
        let tag_mask = (1_u32 << tag_bits) - 1;

        let tag = value & tag_mask;
        let index = value >> tag_bits;

        match tables.get(tag as usize) {
            Some(table) => Ok((*table, index)),
            None => Err(OutOfBounds),
        }
    }

    /// Whether simple indexes into `id` are 4 bytes wide.
    #[must_use]
    pub fn is_large(&self, id: TableId) -> bool {
        self.rows[id as usize].is_large
    }

    /// Whether `#Strings` indexes are 4 bytes wide.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Whether `#Blob` indexes are 4 bytes wide.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Width of a `#Strings` index.
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Width of a `#GUID` index.
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Width of a `#Blob` index.
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Row information of `table`.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Width of a simple index into `table_id`.
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// Width of a coded index of kind `coded_index_type`.
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_indexes[coded_index_type as usize] > 16 {
            4
        } else {
            2
        }
    }

    /// Size in bytes of a single row of `table`.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> u32 {
        columns(table)
            .iter()
            .map(|column| {
                u32::from(match column {
                    Column::Fixed(size) => *size,
                    Column::Str => self.str_bytes(),
                    Column::Guid => self.guid_bytes(),
                    Column::Blob => self.blob_bytes(),
                    Column::Index(target) => self.table_index_bytes(*target),
                    Column::Coded(kind) => self.coded_index_bytes(*kind),
                })
            })
            .sum()
    }

    fn calculate_coded_index_bits(&mut self) {
        for ci_type in CodedIndexType::iter() {
            let max_bits = ci_type
                .tables()
                .iter()
                .map(|table| self.rows[*table as usize].bits)
                .max()
                .unwrap_or(1);

            self.coded_indexes[ci_type as usize] = max_bits + ci_type.tag_bits();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_sizes_small() {
        let info = TableInfo::from_rows(
            &[(TableId::TypeDef, 4), (TableId::MethodDef, 10)],
            false,
            false,
            false,
        );

        assert_eq!(info.row_size(TableId::Module), 10);
        assert_eq!(info.row_size(TableId::TypeRef), 6);
        assert_eq!(info.row_size(TableId::TypeDef), 14);
        assert_eq!(info.row_size(TableId::MethodDef), 14);
        assert_eq!(info.row_size(TableId::CustomAttribute), 6);
        assert_eq!(info.row_size(TableId::NestedClass), 4);
        assert_eq!(info.row_size(TableId::GenericParam), 8);
    }

    #[test]
    fn row_sizes_large() {
        let info = TableInfo::from_rows(
            &[(TableId::MethodDef, 0x1_0000), (TableId::TypeDef, 0x800)],
            true,
            true,
            false,
        );

        assert!(info.is_large(TableId::MethodDef));
        assert_eq!(info.table_index_bytes(TableId::MethodDef), 4);
        // MethodDef needs 17 bits before the 5 tag bits are added
        assert_eq!(info.coded_index_bytes(CodedIndexType::HasCustomAttribute), 4);
        assert_eq!(info.coded_index_bytes(CodedIndexType::TypeDefOrRef), 2);
        assert_eq!(info.row_size(TableId::TypeDef), 4 + 4 + 4 + 2 + 2 + 4);
    }

    #[test]
    fn decode() {
        let info = TableInfo::from_rows(&[], false, false, false);
        assert_eq!(
            info.decode_coded_index(0x11, CodedIndexType::TypeDefOrRef).unwrap(),
            (TableId::TypeRef, 4)
        );
        assert_eq!(
            info.decode_coded_index(0x2B, CodedIndexType::CustomAttributeType).unwrap(),
            (TableId::MemberRef, 5)
        );
        assert!(info
            .decode_coded_index(0x07, CodedIndexType::CustomAttributeType)
            .is_err());
    }
}
