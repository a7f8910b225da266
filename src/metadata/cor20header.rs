use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The CLR runtime header (II.25.3.3), the entry point into a module's metadata.
///
/// Only the fields needed to locate the metadata root are kept.
pub struct Cor20Header {
    /// Size of the header, always 72
    pub cb: u32,
    /// Major runtime version the module targets
    pub major_runtime_version: u16,
    /// Minor runtime version the module targets
    pub minor_runtime_version: u16,
    /// RVA of the metadata root
    pub meta_data_rva: u32,
    /// Size of the metadata
    pub meta_data_size: u32,
    /// `COMIMAGE_FLAGS_*`
    pub flags: u32,
    /// Token of the entry point method, if any
    pub entry_point_token: u32,
}

impl Cor20Header {
    /// Reads the header at the start of `data`.
    ///
    /// # Errors
    /// Returns an error if `data` is shorter than 72 bytes or the header is inconsistent.
    pub fn read(data: &[u8]) -> Result<Cor20Header> {
        if data.len() < 72 {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(data);

        let cb = parser.read_le::<u32>()?;
        if cb != 72 {
            return Err(malformed_error!(
                "Invalid CLR header size: expected 72, got {}",
                cb
            ));
        }

        let major_runtime_version = parser.read_le::<u16>()?;
        let minor_runtime_version = parser.read_le::<u16>()?;

        let meta_data_rva = parser.read_le::<u32>()?;
        let meta_data_size = parser.read_le::<u32>()?;
        if meta_data_rva == 0 || meta_data_size == 0 {
            return Err(malformed_error!("CLR header has no metadata directory"));
        }

        Ok(Cor20Header {
            cb,
            major_runtime_version,
            minor_runtime_version,
            meta_data_rva,
            meta_data_size,
            flags: parser.read_le::<u32>()?,
            entry_point_token: parser.read_le::<u32>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let mut header = vec![0_u8; 72];
        header[0] = 72;
        header[4] = 2;
        header[6] = 5;
        header[8..12].copy_from_slice(&0x2070_u32.to_le_bytes());
        header[12..16].copy_from_slice(&0x0400_u32.to_le_bytes());
        header[16] = 1;

        let parsed = Cor20Header::read(&header).unwrap();
        assert_eq!(parsed.major_runtime_version, 2);
        assert_eq!(parsed.minor_runtime_version, 5);
        assert_eq!(parsed.meta_data_rva, 0x2070);
        assert_eq!(parsed.meta_data_size, 0x400);
        assert_eq!(parsed.flags, 1);
        assert_eq!(parsed.entry_point_token, 0);
    }

    #[test]
    fn invalid() {
        assert!(Cor20Header::read(&[0; 16]).is_err());

        let mut header = vec![0_u8; 72];
        header[0] = 72;
        assert!(Cor20Header::read(&header).is_err());
    }
}
