use crate::runtime::Architecture;

/// Renders code addresses the way debuggers print them.
///
/// 32-bit targets use eight hex digits; 64-bit targets split the address into two eight-digit
/// halves joined by a backtick, e.g. ``00007ffa`12340000``.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFormatter {
    /// `{:08x}`
    Short,
    /// ``{:08x}`{:08x}``
    Long,
}

impl AddressFormatter {
    /// The formatter for `architecture`.
    #[must_use]
    pub fn for_architecture(architecture: Architecture) -> Self {
        if architecture.is_64bit() {
            AddressFormatter::Long
        } else {
            AddressFormatter::Short
        }
    }

    /// Formats `address`.
    #[must_use]
    pub fn format(self, address: u64) -> String {
        match self {
            AddressFormatter::Short => format32(address),
            AddressFormatter::Long => format64(address),
        }
    }
}

/// Formats a 32-bit address as eight lowercase hex digits.
///
/// # Examples
///
/// ```rust
/// use jitscope::disassembler::format32;
///
/// assert_eq!(format32(0), "00000000");
/// assert_eq!(format32(0xFFFF_FFFF), "ffffffff");
/// ```
#[must_use]
pub fn format32(address: u64) -> String {
    format!("{address:08x}")
}

/// Formats a 64-bit address as two eight-digit halves joined by a backtick.
///
/// # Examples
///
/// ```rust
/// use jitscope::disassembler::format64;
///
/// assert_eq!(format64(0x1_0000_0000), "00000001`00000000");
/// ```
#[must_use]
pub fn format64(address: u64) -> String {
    format!("{:08x}`{:08x}", address >> 32, address & 0xFFFF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_addresses() {
        assert_eq!(format32(0), "00000000");
        assert_eq!(format32(0x1234), "00001234");
        assert_eq!(format32(0xFFFF_FFFF), "ffffffff");
    }

    #[test]
    fn long_addresses() {
        assert_eq!(format64(0), "00000000`00000000");
        assert_eq!(format64(0xFFFF_FFFF), "00000000`ffffffff");
        assert_eq!(format64(0x1_0000_0000), "00000001`00000000");
        assert_eq!(format64(u64::MAX), "ffffffff`ffffffff");
        assert_eq!(format64(0x7FFA_1234_0040), "00007ffa`12340040");
    }

    #[test]
    fn per_architecture() {
        let short = AddressFormatter::for_architecture(Architecture::X86);
        let long = AddressFormatter::for_architecture(Architecture::X64);
        assert_eq!(short, AddressFormatter::Short);
        assert_eq!(long.format(0x10), "00000000`00000010");
        assert_eq!(short.format(0xFFFF_FFFF).len(), 8);
        assert_eq!(long.format(u64::MAX).len(), 17);
    }
}
