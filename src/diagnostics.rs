//! Compiler-style diagnostics shared by the parser and the compilers.
//!
//! A [`Diagnostic`] mirrors what a C# compiler prints: a severity, a `CSxxxx` code and a message,
//! optionally anchored to a line/column in the source file.

use std::fmt;

use strum::{Display, EnumString};

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Severity {
    /// Informational message
    Info,
    /// Reported, but does not fail compilation
    Warning,
    /// Fails compilation
    Error,
}

/// A 1-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl Location {
    /// Computes the line/column of the byte `offset` inside `source`.
    #[must_use]
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let mut line = 1;
        let mut line_start = 0;
        for (index, byte) in source.as_bytes()[..offset].iter().enumerate() {
            if *byte == b'\n' {
                line += 1;
                line_start = index + 1;
            }
        }

        let column = source[line_start..offset].chars().count() + 1;
        Location {
            line,
            column: u32::try_from(column).unwrap_or(u32::MAX),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line, self.column)
    }
}

/// A single message reported by the parser or a compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity of the message
    pub severity: Severity,
    /// Compiler id, e.g. `CS1002`
    pub code: String,
    /// Human readable message
    pub message: String,
    /// Where in the source the message applies, if known
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Creates an error-severity diagnostic.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: code.to_string(),
            message: message.into(),
            location: None,
        }
    }

    /// Creates a warning-severity diagnostic.
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
            location: None,
        }
    }

    /// Anchors the diagnostic at `location`.
    #[must_use]
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Parses one line of csc-style output.
    ///
    /// Accepts `file(line,col): error CS1002: ; expected` as well as the location-less
    /// `error CS2001: Source file 'x.cs' could not be found.` form. Returns `None` for lines that
    /// are not diagnostics (banners, blank lines, ...).
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Diagnostic> {
        let line = line.trim();
        let (location, rest) = match line.find("): ") {
            Some(close) => {
                let open = line[..close].rfind('(')?;
                let mut coordinates = line[open + 1..close].split(',');
                let location = Location {
                    line: coordinates.next()?.trim().parse().ok()?,
                    column: coordinates.next()?.trim().parse().ok()?,
                };
                (Some(location), &line[close + 3..])
            }
            None => (None, line),
        };

        let (head, message) = rest.split_once(": ")?;
        let mut words = head.split_whitespace();
        let severity = words.next()?.parse::<Severity>().ok()?;
        let code = words.next()?;
        if words.next().is_some() {
            return None;
        }

        Some(Diagnostic {
            severity,
            code: code.to_string(),
            message: message.to_string(),
            location,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.code, self.message)
    }
}

/// An ordered collection of [`Diagnostic`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Diagnostics(Vec::new())
    }

    /// Appends a diagnostic.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    /// Returns `true` if any diagnostic has error severity.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the diagnostics in report order.
    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(value: Vec<Diagnostic>) -> Self {
        Diagnostics(value)
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<T: IntoIterator<Item = Diagnostic>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, diagnostic) in self.0.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}
