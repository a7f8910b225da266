use thiserror::Error;

use crate::diagnostics::Diagnostics;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! resolution_error {
    ($fmt:expr) => {
        crate::Error::Resolution($fmt.to_string())
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Resolution(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every stage of a run (parsing, compiling, metadata loading, resolving, runtime attachment and
/// decoding) reports its failures through this enum. Faults that only affect a single member's
/// listing are never represented here: the renderer turns them into inline comment lines and
/// keeps going.
///
/// # Error Categories
///
/// ## Binary Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid PE / metadata structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond buffer boundaries
/// - [`Error::NotSupported`] - Unsupported file format or feature
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from goblin crate
/// - [`Error::Snapshot`] - Runtime snapshot (de)serialization errors
///
/// ## Pipeline Errors
/// - [`Error::Syntax`] - The source text is not well-formed
/// - [`Error::Compilation`] - The compiler reported error diagnostics
/// - [`Error::Resolution`] - Declarations and compiled members diverged
/// - [`Error::RuntimeAttach`] - No compatible runtime could be attached
/// - [`Error::Decoder`] - Native code could not be decoded
///
/// # Examples
///
/// ```rust
/// use jitscope::{syntax, Error};
///
/// match syntax::parse("class C { void M() { }") {
///     Ok(_) => unreachable!(),
///     Err(Error::Syntax(diagnostics)) => {
///         assert!(diagnostics.has_errors());
///     }
///     Err(e) => panic!("unexpected error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// This error indicates that the file structure is corrupted or doesn't conform to the
    /// expected .NET PE format. The error includes the source location where the malformation
    /// was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    ///
    /// Indicates that the input is not a .NET PE image, or uses a metadata layout (such as
    /// uncompressed `#-` table streams) this library does not read.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors, both from reading inputs and from writing the report.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin PE parser.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// The source text could not be parsed.
    ///
    /// Carries every syntax diagnostic that was reported before parsing gave up.
    #[error("Syntax errors:\n{0}")]
    Syntax(Diagnostics),

    /// The compiler rejected the syntax tree.
    ///
    /// Carries the full diagnostic list reported by the compiler, warnings included. This is
    /// fatal for the whole run; no partial listing is produced.
    #[error("Compilation failed:\n{0}")]
    Compilation(Diagnostics),

    /// A declaration could not be matched to a compiled member.
    ///
    /// This signals that the declaration forest and the compiled module disagree about which
    /// members exist, for example a name queue that ran dry or a nested type that is missing.
    /// For a freshly compiled module this never happens; seeing it indicates a defect.
    #[error("Resolution fault - {0}")]
    Resolution(String),

    /// No compatible runtime could be attached.
    #[error("Unable to attach to runtime - {0}")]
    RuntimeAttach(String),

    /// The native decoder failed.
    #[error("Decoder error - {0}")]
    Decoder(String),

    /// A runtime snapshot could not be read or written.
    #[error("{0}")]
    Snapshot(#[from] serde_json::Error),
}
