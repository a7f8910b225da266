//! Parse, compile, bind and render against runtime snapshots.

use std::io::Write;

use jitscope::{
    disassembler::{format32, format64},
    prelude::*,
};

const SOURCE: &str = r#"
namespace Demo
{
    public class Calculator
    {
        private int total;

        public Calculator(int seed) { total = seed; }

        public int Add(int value) { total += value; return total; }
        public long Add(long value) => total + value;

        public int Total { get { return total; } }

        public T Echo<T>(T value) => value;
    }

    public class Box<T>
    {
        public T Value;
        public T Get() => Value;
    }
}
"#;

const BASE: u64 = 0x0000_7FF8_0000_1000;

/// `push rbp / mov rbp,rsp / call <next method> / pop rbp / ret`, 0x40 bytes apart.
fn snapshot_for(assembly: &Assembly) -> RuntimeSnapshot {
    let methods = assembly.methods();
    let mut builder = RuntimeSnapshot::builder(Architecture::X64)
        .flavor("CoreCLR")
        .version("8.0.8")
        .module("coreclr.dll");

    for (index, method) in methods.iter().enumerate() {
        if method.is_abstract() || method.is_generic_method_definition() {
            continue;
        }
        let entry = BASE + index as u64 * 0x40;
        let target = BASE + ((index + 1) % methods.len()) as u64 * 0x40;
        let rel = (target.wrapping_sub(entry + 9) as u32).to_le_bytes();

        let mut code = vec![0x55, 0x48, 0x8B, 0xEC, 0xE8];
        code.extend_from_slice(&rel);
        code.extend_from_slice(&[0x5D, 0xC3]);

        builder = builder.method(
            SnapshotMethod::compiled(&assembly.method_signature_text(method.token), entry, code)
                .with_token(assembly.name(), method.token),
        );
    }
    builder.build()
}

fn compile(source: &str, module: &str) -> Assembly {
    let tree = syntax::parse(source).unwrap();
    MetadataCompiler::new()
        .compile(module, &tree, &CompileOptions::default())
        .unwrap()
}

fn report(source: &str, runtime: &RuntimeSnapshot, options: &DisassembleOptions) -> String {
    let compiler = MetadataCompiler::new();
    let decoder = IcedDecoder::new();
    let toolchain = Toolchain {
        compiler: &compiler,
        host: runtime,
        runtime,
        decoder: &decoder,
    };

    let mut out = Vec::new();
    disassemble_source(source, "Demo", options, &toolchain, &mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn full_report() {
    let runtime = snapshot_for(&compile(SOURCE, "Demo"));
    let output = report(SOURCE, &runtime, &DisassembleOptions::default());

    let expected = "\
; CoreCLR CLR 8.0.8 (coreclr.dll) on x64.

; System.Void Demo.Calculator..ctor(System.Int32)
00007ff8`00001000  55          push rbp
00007ff8`00001001  488bec      mov rbp,rsp
00007ff8`00001004  e837000000  call 00007ff8`00001040 (System.Int32 Demo.Calculator.Add(System.Int32))
00007ff8`00001009  5d          pop rbp
00007ff8`0000100a  c3          ret

; System.Int32 Demo.Calculator.Add(System.Int32)
00007ff8`00001040  55          push rbp
00007ff8`00001041  488bec      mov rbp,rsp
00007ff8`00001044  e837000000  call 00007ff8`00001080 (System.Int64 Demo.Calculator.Add(System.Int64))
00007ff8`00001049  5d          pop rbp
00007ff8`0000104a  c3          ret

; System.Int64 Demo.Calculator.Add(System.Int64)
00007ff8`00001080  55          push rbp
00007ff8`00001081  488bec      mov rbp,rsp
00007ff8`00001084  e837000000  call 00007ff8`000010c0 (System.Int32 Demo.Calculator.get_Total())
00007ff8`00001089  5d          pop rbp
00007ff8`0000108a  c3          ret

; System.Int32 Demo.Calculator.get_Total()
00007ff8`000010c0  55          push rbp
00007ff8`000010c1  488bec      mov rbp,rsp
00007ff8`000010c4  e837000000  call 00007ff8`00001100
00007ff8`000010c9  5d          pop rbp
00007ff8`000010ca  c3          ret

; Open generic method 'Demo.Calculator.Echo' cannot be disassembled.

; Open generic type 'Demo.Box`1' cannot be disassembled.
";
    assert_eq!(output, expected);
    assert_eq!(runtime.prepared_count(), 4);
}

#[test]
fn open_generic_type() {
    let source = "class G<T>{}";
    let runtime = snapshot_for(&compile(source, "Demo"));
    let output = report(source, &runtime, &DisassembleOptions::default());

    let listing: Vec<&str> = output.lines().skip(2).collect();
    assert_eq!(listing, ["; Open generic type 'G`1' cannot be disassembled."]);
}

#[test]
fn verbose_report() {
    let runtime = snapshot_for(&compile(SOURCE, "Demo"));
    let options = DisassembleOptions {
        verbose: true,
        disable_optimization: true,
        ..Default::default()
    };
    let output = report(SOURCE, &runtime, &options);
    let lines: Vec<&str> = output.lines().collect();

    assert!(lines[0].starts_with("; Parsing ... done. ("));
    assert!(lines[1].starts_with("; Compiling ... done. ("));
    assert!(lines[2].starts_with("; Analyzing ... done. ("));
    assert_eq!(lines[3], "");
    assert_eq!(lines[4], "; CoreCLR CLR 8.0.8 (coreclr.dll) on x64.");
}

#[test]
fn snapshot_files() {
    let assembly = compile(SOURCE, "Calc");
    let runtime = snapshot_for(&assembly);

    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("runtime.json");
    std::fs::write(&snapshot_path, runtime.to_json().unwrap()).unwrap();
    let source_path = dir.path().join("Calc.cs");
    let mut source = std::fs::File::create(&source_path).unwrap();
    source.write_all(SOURCE.as_bytes()).unwrap();

    let loaded = RuntimeSnapshot::from_file(&snapshot_path).unwrap();
    let compiler = MetadataCompiler::new();
    let decoder = IcedDecoder::new();
    let toolchain = Toolchain {
        compiler: &compiler,
        host: &loaded,
        runtime: &loaded,
        decoder: &decoder,
    };

    let mut out = Vec::new();
    disassemble_file(&DisassembleOptions::new(&source_path), &toolchain, &mut out).unwrap();
    let output = String::from_utf8(out).unwrap();

    assert!(output.contains("; System.Int32 Demo.Calculator.get_Total()"));
    assert!(output.contains("(System.Int64 Demo.Calculator.Add(System.Int64))"));
    assert_eq!(loaded.prepared_count(), 4);
}

#[test]
fn members_missing_from_the_runtime() {
    let source = "class C { void Known() { } void Unknown() { } }";
    let assembly = compile(source, "Demo");
    let known = assembly.methods()[0].token;
    let runtime = RuntimeSnapshot::builder(Architecture::X86)
        .method(
            SnapshotMethod::compiled("System.Void C.Known()", 0x0040_1000, vec![0xC3])
                .with_token("Demo", known),
        )
        .build();

    let output = report(source, &runtime, &DisassembleOptions::default());
    assert_eq!(
        output,
        "; CoreCLR CLR 8.0.8 (coreclr.dll) on x86.\n\
         \n\
         ; System.Void C.Known()\n\
         00401000  c3  ret\n\
         \n\
         ; Failed to load method 'C.Unknown'.\n"
    );
}

#[test]
fn compilation_errors() {
    let runtime = RuntimeSnapshot::builder(Architecture::X64).build();
    let compiler = MetadataCompiler::new();
    let decoder = IcedDecoder::new();
    let toolchain = Toolchain {
        compiler: &compiler,
        host: &runtime,
        runtime: &runtime,
        decoder: &decoder,
    };

    let mut out = Vec::new();
    let result = disassemble_source(
        "class C { void M() { } void M() { } }",
        "Demo",
        &DisassembleOptions::default(),
        &toolchain,
        &mut out,
    );

    match result {
        Err(Error::Compilation(diagnostics)) => {
            let first = diagnostics.iter().next().unwrap();
            assert_eq!(first.code, "CS0111");
            assert_eq!(first.severity, Severity::Error);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(out.is_empty());
}

#[test]
fn address_formats() {
    assert_eq!(format32(0), "00000000");
    assert_eq!(format32(0xFFFF_FFFF), "ffffffff");
    assert_eq!(format64(0), "00000000`00000000");
    assert_eq!(format64(0xFFFF_FFFF), "00000000`ffffffff");
    assert_eq!(format64(0x1_0000_0000), "00000001`00000000");
    assert_eq!(format64(0xFFFF_FFFF_FFFF_FFFF), "ffffffff`ffffffff");
}
