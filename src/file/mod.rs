//! PE image access.
//!
//! A [`File`] owns the raw bytes of a compiled module (memory-mapped or in memory) together with
//! the section table and CLR runtime header directory that goblin extracted from it. Only what
//! the metadata reader needs is kept, so no borrow of the parsed PE outlives [`File::load`].

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use goblin::pe::{section_table::SectionTable, PE};

use crate::{Error::Empty, Result};
use memory::Memory;
use physical::Physical;

/// Storage for the bytes of a PE image.
pub trait Backend: Send + Sync {
    /// The complete image
    fn data(&self) -> &[u8];
}

/// A parsed PE image carrying a CLR header.
pub struct File {
    data: Box<dyn Backend>,
    sections: Vec<SectionTable>,
    clr_rva: u32,
    clr_size: u32,
}

impl File {
    /// Memory-maps and parses the image at `file`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not a PE image, or carries no CLR header.
    pub fn from_file(file: &Path) -> Result<File> {
        Self::load(Physical::new(file)?)
    }

    /// Parses an image held in memory.
    ///
    /// # Errors
    /// Returns an error if `data` is not a PE image or carries no CLR header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::load(Memory::new(data))
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.data().is_empty() {
            return Err(Empty);
        }

        let pe = PE::parse(data.data())?;
        let Some(optional_header) = pe.header.optional_header else {
            return Err(malformed_error!("File does not have an OptionalHeader"));
        };
        let Some(clr) = optional_header.data_directories.get_clr_runtime_header() else {
            return Err(malformed_error!(
                "File does not have a CLR runtime header directory"
            ));
        };

        let (clr_rva, clr_size) = (clr.virtual_address, clr.size);
        let sections = pe.sections.clone();

        Ok(File {
            data: Box::new(data),
            sections,
            clr_rva,
            clr_size,
        })
    }

    /// The complete image.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// RVA and size of the CLR runtime header.
    #[must_use]
    pub fn clr(&self) -> (usize, usize) {
        (self.clr_rva as usize, self.clr_size as usize)
    }

    /// Returns `len` bytes starting at file offset `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range leaves the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(end) = offset.checked_add(len) else {
            return Err(crate::Error::OutOfBounds);
        };

        self.data().get(offset..end).ok_or(crate::Error::OutOfBounds)
    }

    /// Converts a relative virtual address into a file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains `rva`.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva_u32 = u32::try_from(rva)
            .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        for section in &self.sections {
            let Some(section_max) = section.virtual_address.checked_add(section.virtual_size)
            else {
                return Err(malformed_error!(
                    "Section malformed, causing integer overflow - {} + {}",
                    section.virtual_address,
                    section.virtual_size
                ));
            };

            if section.virtual_address <= rva_u32 && section_max > rva_u32 {
                return Ok((rva - section.virtual_address as usize)
                    + section.pointer_to_raw_data as usize);
            }
        }

        Err(malformed_error!(
            "RVA could not be converted to offset - {}",
            rva
        ))
    }
}
