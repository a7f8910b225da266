//! x86/x64 native code decoding using iced-x86.
//!
//! Decoding is two passes over the hot code of a method. The first pass decodes every
//! instruction and collects the addresses its near branches and RIP-relative operands refer to;
//! those addresses are resolved to method signatures once. The second pass formats the
//! instructions with an [`IntelFormatter`] whose symbol resolver prints the collected addresses
//! through the [`AddressFormatter`], followed by the signature of the method they belong to.

use std::collections::HashMap;

use iced_x86::{
    Decoder, DecoderOptions, Formatter, Instruction, IntelFormatter, OpKind, SymbolResolver,
    SymbolResult,
};

use crate::{disassembler::AddressFormatter, runtime::Architecture, Error, Result};

/// One decoded instruction, ready to be listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// Address of the first byte
    pub address: u64,
    /// Raw instruction bytes
    pub bytes: Vec<u8>,
    /// Mnemonic and operands, symbolicated
    pub text: String,
    /// Signature of the method the instruction refers to, if any
    pub annotation: Option<String>,
}

impl DecodedInstruction {
    /// The raw bytes as lowercase hex pairs without separators.
    #[must_use]
    pub fn hex_bytes(&self) -> String {
        hex::encode(&self.bytes)
    }
}

/// Maps code addresses to the signature of the native method containing them.
pub trait SymbolLookup {
    /// The full signature of the method at `address`.
    fn method_signature(&self, address: u64) -> Option<String>;
}

/// A lookup that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSymbols;

impl SymbolLookup for NoSymbols {
    fn method_signature(&self, _address: u64) -> Option<String> {
        None
    }
}

impl SymbolLookup for HashMap<u64, String> {
    fn method_signature(&self, address: u64) -> Option<String> {
        self.get(&address).cloned()
    }
}

/// Decodes native code into listable instructions.
pub trait NativeDecoder {
    /// Decodes `code` loaded at `base_address`.
    ///
    /// # Errors
    /// Returns [`Error::Decoder`] if `code` contains bytes that are not a valid instruction.
    fn decode(
        &self,
        code: &[u8],
        base_address: u64,
        architecture: Architecture,
        symbols: &dyn SymbolLookup,
    ) -> Result<Vec<DecodedInstruction>>;
}

/// [`NativeDecoder`] backed by iced-x86, formatting in Intel syntax.
#[derive(Debug, Clone, Copy, Default)]
pub struct IcedDecoder;

impl IcedDecoder {
    /// Creates a decoder.
    #[must_use]
    pub fn new() -> Self {
        IcedDecoder
    }
}

impl NativeDecoder for IcedDecoder {
    fn decode(
        &self,
        code: &[u8],
        base_address: u64,
        architecture: Architecture,
        symbols: &dyn SymbolLookup,
    ) -> Result<Vec<DecodedInstruction>> {
        let mut decoder = Decoder::with_ip(
            architecture.bitness(),
            code,
            base_address,
            DecoderOptions::NONE,
        );

        let mut instructions = Vec::new();
        let mut signatures = HashMap::new();
        for instruction in &mut decoder {
            if instruction.is_invalid() {
                return Err(Error::Decoder(format!(
                    "invalid instruction at offset 0x{:x}",
                    instruction.ip() - base_address
                )));
            }

            if let Some(target) = code_reference(&instruction) {
                if target != instruction.next_ip() && !signatures.contains_key(&target) {
                    if let Some(signature) = symbols.method_signature(target) {
                        signatures.insert(target, signature);
                    }
                }
            }
            instructions.push(instruction);
        }

        let mut formatter = IntelFormatter::with_options(
            Some(Box::new(CodeSymbols {
                addresses: AddressFormatter::for_architecture(architecture),
                signatures: signatures.clone(),
            })),
            None,
        );
        formatter.options_mut().set_hex_prefix("0x");
        formatter.options_mut().set_hex_suffix("");
        formatter.options_mut().set_uppercase_hex(false);
        formatter.options_mut().set_rip_relative_addresses(false);
        formatter.options_mut().set_show_branch_size(false);

        let mut decoded = Vec::with_capacity(instructions.len());
        for instruction in &instructions {
            let start = usize::try_from(instruction.ip() - base_address)
                .map_err(|_| Error::Decoder("code offset out of range".to_string()))?;
            let bytes = code.get(start..start + instruction.len()).ok_or_else(|| {
                Error::Decoder(format!("truncated instruction at offset 0x{start:x}"))
            })?;

            let mut text = String::new();
            formatter.format(instruction, &mut text);

            let annotation = code_reference(instruction)
                .filter(|target| *target != instruction.next_ip())
                .and_then(|target| signatures.get(&target).cloned());

            decoded.push(DecodedInstruction {
                address: instruction.ip(),
                bytes: bytes.to_vec(),
                text,
                annotation,
            });
        }

        Ok(decoded)
    }
}

/// The address a near branch or RIP-relative operand of `instruction` refers to.
fn code_reference(instruction: &Instruction) -> Option<u64> {
    (0..instruction.op_count()).find_map(|operand| {
        if is_code_reference(instruction, operand) {
            Some(match instruction.op_kind(operand) {
                OpKind::Memory => instruction.ip_rel_memory_address(),
                _ => instruction.near_branch_target(),
            })
        } else {
            None
        }
    })
}

fn is_code_reference(instruction: &Instruction, operand: u32) -> bool {
    match instruction.op_kind(operand) {
        OpKind::NearBranch16 | OpKind::NearBranch32 | OpKind::NearBranch64 => true,
        OpKind::Memory => instruction.is_ip_rel_memory_operand(),
        _ => false,
    }
}

struct CodeSymbols {
    addresses: AddressFormatter,
    signatures: HashMap<u64, String>,
}

impl SymbolResolver for CodeSymbols {
    fn symbol(
        &mut self,
        instruction: &Instruction,
        _operand: u32,
        instruction_operand: Option<u32>,
        address: u64,
        _address_size: u32,
    ) -> Option<SymbolResult<'_>> {
        let operand = instruction_operand?;
        if !is_code_reference(instruction, operand) {
            return None;
        }

        let formatted = self.addresses.format(address);
        let text = match self.signatures.get(&address) {
            Some(signature) if address != instruction.next_ip() => {
                format!("{formatted} ({signature})")
            }
            _ => formatted,
        };
        Some(SymbolResult::with_string(address, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{call_stub, CODE_BASE_X64, CODE_BASE_X86, METHOD_STRIDE};

    fn decode(
        code: &[u8],
        base: u64,
        architecture: Architecture,
        symbols: &dyn SymbolLookup,
    ) -> Vec<DecodedInstruction> {
        IcedDecoder::new()
            .decode(code, base, architecture, symbols)
            .unwrap()
    }

    #[test]
    fn x64_call_is_symbolicated() {
        let target = CODE_BASE_X64 + METHOD_STRIDE;
        let code = call_stub(Architecture::X64, CODE_BASE_X64, target);
        let symbols = HashMap::from([(target, "System.Void C.N()".to_string())]);

        let instructions = decode(&code, CODE_BASE_X64, Architecture::X64, &symbols);
        let text: Vec<&str> = instructions.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(
            text,
            [
                "push rbp",
                "mov rbp,rsp",
                "call 00007ffa`12340040 (System.Void C.N())",
                "pop rbp",
                "ret",
            ]
        );

        assert_eq!(instructions[0].address, CODE_BASE_X64);
        assert_eq!(instructions[1].hex_bytes(), "488bec");
        assert_eq!(instructions[2].address, CODE_BASE_X64 + 4);
        assert_eq!(instructions[2].bytes.len(), 5);
        assert_eq!(instructions[2].annotation.as_deref(), Some("System.Void C.N()"));
        assert!(instructions[3].annotation.is_none());
    }

    #[test]
    fn unresolved_targets_still_use_the_address_format() {
        let target = CODE_BASE_X64 + 2 * METHOD_STRIDE;
        let code = call_stub(Architecture::X64, CODE_BASE_X64, target);

        let instructions = decode(&code, CODE_BASE_X64, Architecture::X64, &NoSymbols);
        assert_eq!(instructions[2].text, "call 00007ffa`12340080");
        assert!(instructions[2].annotation.is_none());
    }

    #[test]
    fn x86_call() {
        let target = CODE_BASE_X86 + METHOD_STRIDE;
        let code = call_stub(Architecture::X86, CODE_BASE_X86, target);
        let symbols = HashMap::from([(target, "System.Int32 C.N()".to_string())]);

        let instructions = decode(&code, CODE_BASE_X86, Architecture::X86, &symbols);
        assert_eq!(instructions[1].text, "mov ebp,esp");
        assert_eq!(instructions[2].text, "call 05200040 (System.Int32 C.N())");
    }

    #[test]
    fn zero_offset_self_reference() {
        let next = CODE_BASE_X64 + 5;
        let symbols = HashMap::from([(next, "System.Void C.M()".to_string())]);

        let instructions = decode(
            &[0xE8, 0x00, 0x00, 0x00, 0x00],
            CODE_BASE_X64,
            Architecture::X64,
            &symbols,
        );
        assert_eq!(instructions[0].text, "call 00007ffa`12340005");
        assert!(instructions[0].annotation.is_none());
    }

    #[test]
    fn branch_into_own_body() {
        let symbols = HashMap::from([(CODE_BASE_X64, "System.Void C.Spin()".to_string())]);

        let instructions = decode(&[0xEB, 0xFE], CODE_BASE_X64, Architecture::X64, &symbols);
        assert_eq!(
            instructions[0].text,
            "jmp 00007ffa`12340000 (System.Void C.Spin())"
        );
    }

    #[test]
    fn rip_relative_operands_use_absolute_addresses() {
        let symbols = HashMap::from([
            (0x1016, "System.Void C.N()".to_string()),
            (0x1017, "System.Void C.O()".to_string()),
        ]);

        #[rustfmt::skip]
        let code = [
            0xFF, 0x15, 0x10, 0x00, 0x00, 0x00,       // call qword ptr [rip+0x10]
            0x48, 0x8D, 0x05, 0x0A, 0x00, 0x00, 0x00, // lea rax,[rip+0xa]
        ];

        let instructions = decode(&code, 0x1000, Architecture::X64, &symbols);
        assert_eq!(
            instructions[0].text,
            "call qword ptr [00000000`00001016 (System.Void C.N())]"
        );
        assert_eq!(
            instructions[0].annotation.as_deref(),
            Some("System.Void C.N()")
        );
        assert_eq!(
            instructions[1].text,
            "lea rax,[00000000`00001017 (System.Void C.O())]"
        );
        assert!(!instructions[1].text.contains("rip"));
    }

    #[test]
    fn empty_code() {
        assert!(decode(&[], CODE_BASE_X64, Architecture::X64, &NoSymbols).is_empty());
    }

    #[test]
    fn invalid_code() {
        let result =
            IcedDecoder::new().decode(&[0x90, 0x0F], CODE_BASE_X64, Architecture::X64, &NoSymbols);
        match result {
            Err(Error::Decoder(message)) => {
                assert_eq!(message, "invalid instruction at offset 0x1");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
