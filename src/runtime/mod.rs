//! Runtime introspection.
//!
//! Disassembling a member needs three things from the managed runtime that hosts the compiled
//! module:
//!
//! - an [`ExecutionHost`] that forces native code generation for a member and reports the
//!   member's entry address,
//! - a [`RuntimeAttach`] facility that attaches to the runtime of the current process,
//! - and the resulting [`RuntimeHandle`], which maps addresses back to JIT-compiled methods and
//!   reads their code.
//!
//! [`RuntimeSnapshot`] implements all three from a JSON description of a runtime, which is how
//! listings are produced without a live runtime. [`NoRuntime`] is the stand-in for a process
//! without one.

mod snapshot;

pub use snapshot::{RuntimeSnapshot, RuntimeSnapshotBuilder, SnapshotMethod};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{
    metadata::{assembly::Assembly, token::Token},
    Error, Result,
};

/// Instruction set of the attached runtime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Architecture {
    /// 32-bit x86
    #[strum(serialize = "x86")]
    #[serde(rename = "x86")]
    X86,
    /// 64-bit x86-64
    #[strum(serialize = "x64")]
    #[serde(rename = "x64")]
    X64,
}

impl Architecture {
    /// Address width in bits.
    #[must_use]
    pub fn bitness(self) -> u32 {
        match self {
            Architecture::X86 => 32,
            Architecture::X64 => 64,
        }
    }

    /// Returns `true` for 64-bit targets.
    #[must_use]
    pub fn is_64bit(self) -> bool {
        self == Architecture::X64
    }
}

/// Describes an attached runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    /// Runtime flavor, e.g. `CoreCLR` or `Desktop`
    pub flavor: String,
    /// Runtime version, e.g. `8.0.8`
    pub version: String,
    /// The runtime's native module, e.g. `coreclr.dll`
    pub module: String,
    /// Target architecture
    pub architecture: Architecture,
}

/// A JIT-compiled method as the runtime reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeMethod {
    /// Full signature, e.g. `System.Void C.M(System.Int32)`
    pub signature: String,
    /// The method has native code
    pub compiled: bool,
    /// Start of the hot code region
    pub hot_start: u64,
    /// Size of the hot code region in bytes
    pub hot_size: u32,
}

impl NativeMethod {
    /// Returns `true` if `address` lies inside the hot code region.
    #[must_use]
    pub fn contains(&self, address: u64) -> bool {
        self.compiled
            && address >= self.hot_start
            && address - self.hot_start < u64::from(self.hot_size)
    }
}

/// An attached runtime.
pub trait RuntimeHandle {
    /// Describes the runtime.
    fn info(&self) -> &RuntimeInfo;

    /// Finds the method whose entry point is, or whose hot code contains, `address`.
    fn find_method_by_address(&self, address: u64) -> Option<NativeMethod>;

    /// Reads `len` bytes of code at `address`.
    ///
    /// # Errors
    /// Returns an error if the range is not readable.
    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>>;
}

impl<T: RuntimeHandle + ?Sized> RuntimeHandle for &T {
    fn info(&self) -> &RuntimeInfo {
        (**self).info()
    }

    fn find_method_by_address(&self, address: u64) -> Option<NativeMethod> {
        (**self).find_method_by_address(address)
    }

    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        (**self).read_memory(address, len)
    }
}

/// Attaches to the runtime hosting the current process.
pub trait RuntimeAttach {
    /// Attaches to the runtime. This may block.
    ///
    /// # Errors
    /// Returns [`Error::RuntimeAttach`] if no compatible runtime is found.
    fn attach_to_current_process(&self) -> Result<Box<dyn RuntimeHandle + '_>>;
}

/// Executes compiled modules: prepares members and reports where their code starts.
pub trait ExecutionHost {
    /// Forces native code generation for a member of `module`. Preparing a member twice has no
    /// further effect.
    ///
    /// # Errors
    /// Returns an error if the runtime refuses to compile the member.
    fn prepare_method(&self, module: &Assembly, token: Token) -> Result<()>;

    /// The entry address of a member of `module`, if the runtime knows it.
    fn entry_address(&self, module: &Assembly, token: Token) -> Option<u64>;
}

/// A process without a managed runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRuntime;

impl RuntimeAttach for NoRuntime {
    fn attach_to_current_process(&self) -> Result<Box<dyn RuntimeHandle + '_>> {
        Err(Error::RuntimeAttach(
            "no managed runtime is loaded in this process".to_string(),
        ))
    }
}

impl ExecutionHost for NoRuntime {
    fn prepare_method(&self, _module: &Assembly, _token: Token) -> Result<()> {
        Ok(())
    }

    fn entry_address(&self, _module: &Assembly, _token: Token) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn architecture_names() {
        assert_eq!(Architecture::X86.to_string(), "x86");
        assert_eq!(Architecture::X64.to_string(), "x64");
        assert_eq!("x64".parse::<Architecture>().unwrap(), Architecture::X64);
        assert_eq!(Architecture::X86.bitness(), 32);
        assert!(Architecture::X64.is_64bit());
        assert_eq!(
            serde_json::to_string(&Architecture::X86).unwrap(),
            "\"x86\""
        );
    }

    #[test]
    fn hot_range() {
        let method = NativeMethod {
            signature: "System.Void C.M()".to_string(),
            compiled: true,
            hot_start: 0x1000,
            hot_size: 0x10,
        };
        assert!(method.contains(0x1000));
        assert!(method.contains(0x100F));
        assert!(!method.contains(0x1010));
        assert!(!method.contains(0x0FFF));

        let uncompiled = NativeMethod {
            compiled: false,
            ..method
        };
        assert!(!uncompiled.contains(0x1000));
    }

    #[test]
    fn no_runtime() {
        match NoRuntime.attach_to_current_process() {
            Err(Error::RuntimeAttach(message)) => assert!(message.contains("no managed runtime")),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("attached to nothing"),
        }
    }
}
