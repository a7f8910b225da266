use std::io::Write;

use log::warn;

use crate::{
    disassembler::{
        AddressFormatter, DecodedInstruction, DisassemblyNode, NativeDecoder, SymbolLookup,
    },
    metadata::{assembly::Assembly, token::Token},
    runtime::{ExecutionHost, RuntimeHandle},
    Error, Result,
};

/// Renders the native code of a disassembly forest as text.
///
/// Types render their children in order, separated by blank lines. A method renders as a
/// `; <signature>` line followed by one line per instruction:
///
/// ```text
/// ; System.Void C.M()
/// 00007ffa`12340000  55          push rbp
/// 00007ffa`12340001  488bec      mov rbp,rsp
/// ```
///
/// Problems with a single member (the runtime does not know it, never compiled it, or its code
/// cannot be read or decoded) are written as comment lines in place of its listing, and
/// rendering continues with the next member.
pub struct InstructionRenderer<'a> {
    assembly: &'a Assembly,
    host: &'a dyn ExecutionHost,
    runtime: &'a dyn RuntimeHandle,
    decoder: &'a dyn NativeDecoder,
}

impl<'a> InstructionRenderer<'a> {
    /// Creates a renderer for members of `assembly`.
    ///
    /// Entry addresses come from `host`, native methods and their code from `runtime`.
    #[must_use]
    pub fn new(
        assembly: &'a Assembly,
        host: &'a dyn ExecutionHost,
        runtime: &'a dyn RuntimeHandle,
        decoder: &'a dyn NativeDecoder,
    ) -> Self {
        InstructionRenderer {
            assembly,
            host,
            runtime,
            decoder,
        }
    }

    /// Writes the listing of `node` to `out`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if writing to `out` fails.
    pub fn render(&self, node: &DisassemblyNode, out: &mut dyn Write) -> Result<()> {
        match node {
            DisassemblyNode::Type { children, .. } => {
                for (index, child) in children.iter().enumerate() {
                    if index > 0 {
                        writeln!(out)?;
                    }
                    self.render(child, out)?;
                }
            }
            DisassemblyNode::Method { token } => self.render_method(*token, out)?,
            DisassemblyNode::OpenGenericType { token, .. } => writeln!(
                out,
                "; Open generic type '{}' cannot be disassembled.",
                self.assembly.type_full_name(*token)
            )?,
            DisassemblyNode::OpenGenericMethod { token } => writeln!(
                out,
                "; Open generic method '{}' cannot be disassembled.",
                self.assembly.method_display_name(*token)
            )?,
        }
        Ok(())
    }

    /// Renders `node` into a string.
    ///
    /// # Errors
    /// Returns an error if the listing is not valid UTF-8.
    pub fn render_to_string(&self, node: &DisassemblyNode) -> Result<String> {
        let mut buffer = Vec::new();
        self.render(node, &mut buffer)?;
        String::from_utf8(buffer).map_err(|error| malformed_error!("{}", error))
    }

    fn render_method(&self, token: Token, out: &mut dyn Write) -> Result<()> {
        let name = self.assembly.method_display_name(token);
        let native = self
            .host
            .entry_address(self.assembly, token)
            .and_then(|entry| self.runtime.find_method_by_address(entry));
        let Some(native) = native else {
            warn!("No native method found for {name}");
            writeln!(out, "; Failed to load method '{name}'.")?;
            return Ok(());
        };

        writeln!(out, "; {}", native.signature)?;
        if !native.compiled {
            warn!("{name} was never JIT compiled");
            writeln!(out, "; Failed to JIT compile this method.")?;
            writeln!(
                out,
                "; See the jitscope documentation on JIT preparation for more details."
            )?;
            return Ok(());
        }

        let code = match self
            .runtime
            .read_memory(native.hot_start, native.hot_size as usize)
        {
            Ok(code) => code,
            Err(error) => {
                warn!("Failed to read code of {name}: {error}");
                writeln!(out, "; Failed to read native code for this method.")?;
                return Ok(());
            }
        };

        let architecture = self.runtime.info().architecture;
        let symbols = RuntimeSymbols(self.runtime);
        let instructions =
            match self
                .decoder
                .decode(&code, native.hot_start, architecture, &symbols)
            {
                Ok(instructions) => instructions,
                Err(error) => {
                    let reason = match error {
                        Error::Decoder(reason) => reason,
                        other => other.to_string(),
                    };
                    warn!("Failed to decode {name}: {reason}");
                    writeln!(out, "; Failed to decode native code: {reason}")?;
                    return Ok(());
                }
            };

        write_listing(
            &instructions,
            AddressFormatter::for_architecture(architecture),
            out,
        )
    }
}

/// Writes one line per instruction: the address, two spaces, the raw bytes padded to a
/// common column and the instruction text.
///
/// The bytes column is two characters wider than the hex of the longest instruction.
///
/// # Errors
/// Returns [`Error::FileError`] if writing to `out` fails.
pub fn write_listing(
    instructions: &[DecodedInstruction],
    addresses: AddressFormatter,
    out: &mut dyn Write,
) -> Result<()> {
    let width = instructions
        .iter()
        .map(|instruction| instruction.bytes.len())
        .max()
        .unwrap_or(0)
        * 2
        + 2;

    for instruction in instructions {
        writeln!(
            out,
            "{}  {:<width$}{}",
            addresses.format(instruction.address),
            instruction.hex_bytes(),
            instruction.text
        )?;
    }
    Ok(())
}

struct RuntimeSymbols<'a>(&'a dyn RuntimeHandle);

impl SymbolLookup for RuntimeSymbols<'_> {
    fn method_signature(&self, address: u64) -> Option<String> {
        self.0
            .find_method_by_address(address)
            .map(|method| method.signature)
    }
}
