use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::{
    file::io::read_le,
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

/// The `#~` stream header (II.24.2.6) and access to the tables that follow it.
pub struct TablesHeader<'a> {
    /// Major schema version
    pub major_version: u8,
    /// Minor schema version
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and index sizes
    pub info: TableInfoRef,
    data: &'a [u8],
    tables_offset: usize,
}

impl<'a> TablesHeader<'a> {
    /// Parses the header at the start of the `#~` stream `data`.
    ///
    /// # Errors
    /// Returns an error if the stream is truncated or declares no tables.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let heap_sizes = data[6];
        let mut tables_offset = 24 + valid.count_ones() as usize * 4;
        // Undocumented extra data flag emitted by some obfuscators
        if heap_sizes & 0x40 != 0 {
            tables_offset += 4;
        }

        Ok(TablesHeader {
            major_version: data[4],
            minor_version: data[5],
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info: Arc::new(TableInfo::new(data, valid)?),
            data,
            tables_offset,
        })
    }

    /// Returns `true` if `table` is present.
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.valid & (1 << table as usize) != 0
    }

    /// Row count of `table`, 0 if absent.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.get(table).rows
    }

    /// Returns a typed view over the table holding `T` rows, or `None` if it is absent.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the table extends past the stream.
    pub fn table<T: RowReadable>(&self) -> Result<Option<MetadataTable<'a, T>>> {
        let rows = self.row_count(T::TABLE);
        if rows == 0 {
            return Ok(None);
        }

        let mut offset = self.tables_offset;
        for table_id in TableId::iter() {
            if table_id == T::TABLE {
                break;
            }
            offset += self.row_count(table_id) as usize * self.info.row_size(table_id) as usize;
        }

        let Some(data) = self.data.get(offset..) else {
            return Err(OutOfBounds);
        };

        Ok(Some(MetadataTable::new(data, rows, self.info.clone())?))
    }
}
