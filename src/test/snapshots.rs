use crate::{
    metadata::assembly::Assembly,
    runtime::{Architecture, RuntimeSnapshot, SnapshotMethod},
};

/// Entry address of the first method in snapshots built by [`snapshot_for`] on x64.
pub const CODE_BASE_X64: u64 = 0x0000_7FFA_1234_0000;
/// Entry address of the first method in snapshots built by [`snapshot_for`] on x86.
pub const CODE_BASE_X86: u64 = 0x0520_0000;
/// Distance between two consecutive methods.
pub const METHOD_STRIDE: u64 = 0x40;

/// Code base for `architecture`.
#[must_use]
pub fn code_base(architecture: Architecture) -> u64 {
    match architecture {
        Architecture::X86 => CODE_BASE_X86,
        Architecture::X64 => CODE_BASE_X64,
    }
}

/// A frame-setup stub at `entry` that calls `target`:
///
/// ```text
/// push rbp / mov rbp,rsp / call target / pop rbp / ret
/// ```
#[must_use]
pub fn call_stub(architecture: Architecture, entry: u64, target: u64) -> Vec<u8> {
    let mut code = vec![0x55];
    if architecture.is_64bit() {
        code.push(0x48);
    }
    code.extend_from_slice(&[0x8B, 0xEC]);

    let next = entry + code.len() as u64 + 5;
    let rel = target.wrapping_sub(next) as u32;
    code.push(0xE8);
    code.extend_from_slice(&rel.to_le_bytes());
    code.extend_from_slice(&[0x5D, 0xC3]);
    code
}

/// Entry address of the method at `index` in [`snapshot_for`].
#[must_use]
pub fn entry_of(architecture: Architecture, index: usize) -> u64 {
    code_base(architecture) + index as u64 * METHOD_STRIDE
}

/// A runtime that JIT-compiled every non-abstract method of `assembly`.
///
/// Methods are laid out in metadata order, [`METHOD_STRIDE`] bytes apart. Each one is a
/// [`call_stub`] that calls the method after it; the last one calls the first.
#[must_use]
pub fn snapshot_for(assembly: &Assembly, architecture: Architecture) -> RuntimeSnapshot {
    let count = assembly.methods().len();
    let mut builder = RuntimeSnapshot::builder(architecture);

    for (index, method) in assembly.methods().iter().enumerate() {
        if method.is_abstract() {
            continue;
        }

        let entry = entry_of(architecture, index);
        let target = entry_of(architecture, (index + 1) % count);
        let signature = assembly.method_signature_text(method.token);
        builder = builder.method(
            SnapshotMethod::compiled(&signature, entry, call_stub(architecture, entry, target))
                .with_token(assembly.name(), method.token),
        );
    }

    builder.build()
}
