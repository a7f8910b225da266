use std::{collections::HashSet, path::Path, sync::Mutex};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    metadata::{assembly::Assembly, token::Token},
    runtime::{
        Architecture, ExecutionHost, NativeMethod, RuntimeAttach, RuntimeHandle, RuntimeInfo,
    },
    Error, Result,
};

/// A method recorded in a [`RuntimeSnapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMethod {
    /// Module of the method; any module matches when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// MethodDef token, for lookups by member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<u32>,
    /// Entry address
    pub entry: u64,
    /// Full signature
    pub signature: String,
    /// The method has native code
    pub compiled: bool,
    /// Start of the hot code region
    #[serde(default)]
    pub hot_start: u64,
    /// Size of the hot code region
    #[serde(default)]
    pub hot_size: u32,
    /// Bytes of the hot code region
    #[serde(default, with = "hex_bytes")]
    pub code: Vec<u8>,
}

impl SnapshotMethod {
    /// A JIT-compiled method whose hot code `code` starts at its entry address.
    #[must_use]
    pub fn compiled(signature: &str, entry: u64, code: Vec<u8>) -> Self {
        SnapshotMethod {
            module: None,
            token: None,
            entry,
            signature: signature.to_string(),
            compiled: true,
            hot_start: entry,
            hot_size: u32::try_from(code.len()).unwrap_or(u32::MAX),
            code,
        }
    }

    /// A method the runtime knows but never compiled.
    #[must_use]
    pub fn uncompiled(signature: &str, entry: u64) -> Self {
        SnapshotMethod {
            module: None,
            token: None,
            entry,
            signature: signature.to_string(),
            compiled: false,
            hot_start: 0,
            hot_size: 0,
            code: Vec::new(),
        }
    }

    /// Ties the method to a member of `module`.
    #[must_use]
    pub fn with_token(mut self, module: &str, token: Token) -> Self {
        self.module = Some(module.to_string());
        self.token = Some(token.value());
        self
    }

    fn native(&self) -> NativeMethod {
        NativeMethod {
            signature: self.signature.clone(),
            compiled: self.compiled,
            hot_start: self.hot_start,
            hot_size: self.hot_size,
        }
    }

    fn matches(&self, module: &str, token: Token) -> bool {
        self.token == Some(token.value())
            && self.module.as_deref().map_or(true, |name| name == module)
    }
}

/// A recorded runtime: its description and the methods it compiled.
///
/// The JSON form is
///
/// ```json
/// {
///   "runtime": { "flavor": "CoreCLR", "version": "8.0.8", "module": "coreclr.dll", "architecture": "x64" },
///   "methods": [
///     { "module": "test", "token": 100663297, "entry": 140730000000000, "signature": "System.Void C.M()",
///       "compiled": true, "hot_start": 140730000000000, "hot_size": 2, "code": "90c3" }
///   ]
/// }
/// ```
///
/// A snapshot serves as the [`ExecutionHost`], the [`RuntimeAttach`] facility and the attached
/// [`RuntimeHandle`] at once. Preparing a member only records it.
#[derive(Debug, Serialize, Deserialize)]
pub struct RuntimeSnapshot {
    /// The recorded runtime
    pub runtime: RuntimeInfo,
    /// Recorded methods
    #[serde(default)]
    pub methods: Vec<SnapshotMethod>,
    #[serde(skip)]
    prepared: Mutex<HashSet<(String, u32)>>,
}

impl RuntimeSnapshot {
    /// Creates an empty snapshot of `runtime`.
    #[must_use]
    pub fn new(runtime: RuntimeInfo) -> Self {
        RuntimeSnapshot {
            runtime,
            methods: Vec::new(),
            prepared: Mutex::default(),
        }
    }

    /// Starts building a snapshot of a CoreCLR runtime for `architecture`.
    #[must_use]
    pub fn builder(architecture: Architecture) -> RuntimeSnapshotBuilder {
        RuntimeSnapshotBuilder::new(architecture)
    }

    /// Parses a JSON snapshot.
    ///
    /// # Errors
    /// Returns [`Error::Snapshot`] for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON snapshot from `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file cannot be read and [`Error::Snapshot`] if it is
    /// not a snapshot.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let snapshot = Self::from_json(&json)?;
        debug!(
            "Loaded runtime snapshot {} with {} methods",
            path.display(),
            snapshot.methods.len()
        );
        Ok(snapshot)
    }

    /// Serializes the snapshot to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns [`Error::Snapshot`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns `true` once [`ExecutionHost::prepare_method`] ran for the member.
    #[must_use]
    pub fn is_prepared(&self, module: &Assembly, token: Token) -> bool {
        self.prepared
            .lock()
            .is_ok_and(|prepared| prepared.contains(&(module.name().to_string(), token.value())))
    }

    /// Number of distinct prepared members.
    #[must_use]
    pub fn prepared_count(&self) -> usize {
        self.prepared.lock().map_or(0, |prepared| prepared.len())
    }
}

impl Clone for RuntimeSnapshot {
    fn clone(&self) -> Self {
        RuntimeSnapshot {
            runtime: self.runtime.clone(),
            methods: self.methods.clone(),
            prepared: Mutex::default(),
        }
    }
}

impl RuntimeHandle for RuntimeSnapshot {
    fn info(&self) -> &RuntimeInfo {
        &self.runtime
    }

    fn find_method_by_address(&self, address: u64) -> Option<NativeMethod> {
        self.methods
            .iter()
            .map(SnapshotMethod::native)
            .find(|method| method.contains(address))
            .or_else(|| {
                self.methods
                    .iter()
                    .find(|method| method.entry == address)
                    .map(SnapshotMethod::native)
            })
    }

    fn read_memory(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        for method in self.methods.iter().filter(|m| m.compiled) {
            let Some(offset) = address.checked_sub(method.hot_start) else {
                continue;
            };
            let Ok(offset) = usize::try_from(offset) else {
                continue;
            };
            if let Some(bytes) = offset
                .checked_add(len)
                .and_then(|end| method.code.get(offset..end))
            {
                return Ok(bytes.to_vec());
            }
        }
        Err(Error::OutOfBounds)
    }
}

impl RuntimeAttach for RuntimeSnapshot {
    fn attach_to_current_process(&self) -> Result<Box<dyn RuntimeHandle + '_>> {
        debug!(
            "Attached to {} CLR {} ({}) on {}",
            self.runtime.flavor, self.runtime.version, self.runtime.module, self.runtime.architecture
        );
        Ok(Box::new(self))
    }
}

impl ExecutionHost for RuntimeSnapshot {
    fn prepare_method(&self, module: &Assembly, token: Token) -> Result<()> {
        let mut prepared = self
            .prepared
            .lock()
            .map_err(|_| Error::RuntimeAttach("runtime state is poisoned".to_string()))?;

        if prepared.insert((module.name().to_string(), token.value())) {
            debug!("Prepared {}", module.method_display_name(token));
        }
        Ok(())
    }

    fn entry_address(&self, module: &Assembly, token: Token) -> Option<u64> {
        self.methods
            .iter()
            .find(|method| method.matches(module.name(), token))
            .map(|method| method.entry)
    }
}

/// Builds a [`RuntimeSnapshot`].
#[derive(Debug, Clone)]
pub struct RuntimeSnapshotBuilder {
    runtime: RuntimeInfo,
    methods: Vec<SnapshotMethod>,
}

impl RuntimeSnapshotBuilder {
    fn new(architecture: Architecture) -> Self {
        RuntimeSnapshotBuilder {
            runtime: RuntimeInfo {
                flavor: "CoreCLR".to_string(),
                version: "8.0.8".to_string(),
                module: "coreclr.dll".to_string(),
                architecture,
            },
            methods: Vec::new(),
        }
    }

    /// Sets the runtime flavor.
    #[must_use]
    pub fn flavor(mut self, flavor: &str) -> Self {
        self.runtime.flavor = flavor.to_string();
        self
    }

    /// Sets the runtime version.
    #[must_use]
    pub fn version(mut self, version: &str) -> Self {
        self.runtime.version = version.to_string();
        self
    }

    /// Sets the runtime's native module name.
    #[must_use]
    pub fn module(mut self, module: &str) -> Self {
        self.runtime.module = module.to_string();
        self
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: SnapshotMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Finishes the snapshot.
    #[must_use]
    pub fn build(self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            runtime: self.runtime,
            methods: self.methods,
            prepared: Mutex::default(),
        }
    }
}

/// Serializes code bytes as a lowercase hex string.
mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        hex::decode(digits).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{assembly::AssemblyBuilder, method::MethodDefinition, method::MethodSignature};

    fn module() -> (Assembly, Token) {
        let mut builder = AssemblyBuilder::new("test");
        let class = builder.add_type("", "C", 0, None, Vec::new());
        let method = builder.add_method(class, MethodDefinition::new("M", MethodSignature::void(true)));
        (builder.build(), method)
    }

    #[test]
    fn json_round_trip() {
        let json = r#"{
            "runtime": { "flavor": "CoreCLR", "version": "8.0.8", "module": "coreclr.dll", "architecture": "x64" },
            "methods": [
                { "module": "test", "token": 100663297, "entry": 4096, "signature": "System.Void C.M()",
                  "compiled": true, "hot_start": 4096, "hot_size": 2, "code": "90 c3" },
                { "entry": 8192, "signature": "System.Void C.N()", "compiled": false }
            ]
        }"#;

        let snapshot = RuntimeSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.runtime.architecture, Architecture::X64);
        assert_eq!(snapshot.methods[0].code, [0x90, 0xC3]);
        assert!(snapshot.methods[1].code.is_empty());

        let again = RuntimeSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(again.methods, snapshot.methods);
        assert_eq!(again.runtime, snapshot.runtime);
    }

    #[test]
    fn malformed_json() {
        assert!(matches!(
            RuntimeSnapshot::from_json("{ \"runtime\": 1 }"),
            Err(Error::Snapshot(_))
        ));
        assert!(matches!(
            RuntimeSnapshot::from_json(
                r#"{ "runtime": { "flavor": "", "version": "", "module": "", "architecture": "arm" } }"#
            ),
            Err(Error::Snapshot(_))
        ));
    }

    #[test]
    fn lookups() {
        let (assembly, token) = module();
        let snapshot = RuntimeSnapshot::builder(Architecture::X86)
            .method(
                SnapshotMethod::compiled("System.Void C.M()", 0x1000, vec![0x55, 0x8B, 0xEC, 0x5D, 0xC3])
                    .with_token("test", token),
            )
            .method(SnapshotMethod::uncompiled("System.Void C.N()", 0x2000))
            .build();

        assert_eq!(snapshot.entry_address(&assembly, token), Some(0x1000));
        assert_eq!(snapshot.entry_address(&assembly, Token::new(0x0600_0002)), None);

        let handle = snapshot.attach_to_current_process().unwrap();
        assert_eq!(handle.info().architecture, Architecture::X86);

        let method = handle.find_method_by_address(0x1003).unwrap();
        assert_eq!(method.signature, "System.Void C.M()");
        assert_eq!(method.hot_size, 5);

        let uncompiled = handle.find_method_by_address(0x2000).unwrap();
        assert!(!uncompiled.compiled);
        assert!(handle.find_method_by_address(0x3000).is_none());

        assert_eq!(handle.read_memory(0x1001, 2).unwrap(), [0x8B, 0xEC]);
        assert!(matches!(handle.read_memory(0x1003, 4), Err(Error::OutOfBounds)));
        assert!(matches!(handle.read_memory(0x2000, 1), Err(Error::OutOfBounds)));
    }

    #[test]
    fn preparation_is_idempotent() {
        let (assembly, token) = module();
        let snapshot = RuntimeSnapshot::builder(Architecture::X64).build();

        assert!(!snapshot.is_prepared(&assembly, token));
        snapshot.prepare_method(&assembly, token).unwrap();
        snapshot.prepare_method(&assembly, token).unwrap();
        assert!(snapshot.is_prepared(&assembly, token));
        assert_eq!(snapshot.prepared_count(), 1);
    }
}
