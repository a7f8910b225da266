//! Table infrastructure shared by all row types: table ids, coded indexes, size information and
//! the generic [`MetadataTable`] view.

mod codedindex;
mod tableid;
mod tableinfo;

use std::marker::PhantomData;

use crate::Result;

pub use codedindex::{CodedIndex, CodedIndexType};
pub use tableid::TableId;
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};

/// A row type that can be decoded from a metadata table.
pub trait RowReadable: Sized {
    /// The table this row type lives in
    const TABLE: TableId;

    /// Decodes the row `rid` starting at `offset`, advancing `offset` past it.
    ///
    /// # Errors
    /// Returns an error if the row is truncated or carries an invalid coded index.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfoRef) -> Result<Self>;
}

/// A typed, lazily decoded view over the rows of one table.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    sizes: TableInfoRef,
    _phantom: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Creates a view over `row_count` rows in `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the table.
    pub fn new(data: &'a [u8], row_count: u32, sizes: TableInfoRef) -> Result<Self> {
        let row_size = sizes.row_size(T::TABLE);
        let table_size = u64::from(row_count) * u64::from(row_size);
        if table_size > data.len() as u64 {
            return Err(crate::Error::OutOfBounds);
        }

        Ok(MetadataTable {
            data,
            row_count,
            row_size,
            sizes,
            _phantom: PhantomData,
        })
    }

    /// Size in bytes of the table.
    #[must_use]
    pub fn size(&self) -> u64 {
        u64::from(self.row_count) * u64::from(self.row_size)
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Decodes the 1-based row `index`, or `None` if it does not exist or is damaged.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<T> {
        if index == 0 || self.row_count < index {
            return None;
        }

        let mut offset = (index as usize - 1) * self.row_size as usize;
        T::row_read(self.data, &mut offset, index, &self.sizes).ok()
    }

    /// Decodes every row in order, failing on the first damaged one.
    ///
    /// # Errors
    /// Returns the decoding error of the first row that cannot be read.
    pub fn rows(&self) -> Result<Vec<T>> {
        let mut offset = 0;
        (1..=self.row_count)
            .map(|rid| T::row_read(self.data, &mut offset, rid, &self.sizes))
            .collect()
    }
}
