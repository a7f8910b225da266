//! Native code disassembly.
//!
//! Once declarations are resolved to compiled members, this module turns the resolved forest
//! into text:
//!
//! - [`DisassemblyTreeBuilder`] maps each resolved member to a [`DisassemblyNode`] and forces
//!   the runtime to generate native code for it. Open generic types and methods have no single
//!   native body and become placeholder nodes.
//! - [`InstructionRenderer`] looks each method up in the attached runtime, decodes its hot code
//!   with a [`NativeDecoder`] and writes the listing.
//! - [`IcedDecoder`] decodes x86 and x64 code with iced-x86 and annotates call and jump targets
//!   with the signature of the method they land in.
//! - [`AddressFormatter`] prints addresses in the ``00007ffa`12340000`` style of native debuggers.
//!
//! # Examples
//!
//! ```rust
//! use jitscope::{
//!     disassembler::{IcedDecoder, NativeDecoder, NoSymbols},
//!     runtime::Architecture,
//! };
//!
//! // push rbp / mov rbp,rsp / pop rbp / ret
//! let code = [0x55, 0x48, 0x8B, 0xEC, 0x5D, 0xC3];
//! let instructions = IcedDecoder::new().decode(&code, 0x1000, Architecture::X64, &NoSymbols)?;
//!
//! assert_eq!(instructions.len(), 4);
//! assert_eq!(instructions[1].text, "mov rbp,rsp");
//! # Ok::<(), jitscope::Error>(())
//! ```

mod address;
mod decoder;
mod renderer;
mod tree;

pub use address::{format32, format64, AddressFormatter};
pub use decoder::{DecodedInstruction, IcedDecoder, NativeDecoder, NoSymbols, SymbolLookup};
pub use renderer::{write_listing, InstructionRenderer};
pub use tree::{DisassemblyNode, DisassemblyTreeBuilder};
