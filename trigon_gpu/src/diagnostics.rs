//! Human-readable diagnostics produced while setting up and drawing.
//!
//! Every diagnostic is forwarded to the `log` facade as soon as it is emitted and also kept, so the
//! caller (or a test) can look at what happened after the fact.

use std::collections::HashMap;
use std::fmt;

/// How bad a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Notice,
    Warning,
    Error,
}

impl Severity {
    pub fn level(self) -> log::Level {
        match self {
            Severity::Notice => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        }
    }
}

/// What a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A uniform the caller asked for was optimized away or never declared.
    UnusedUniform { program: String, name: String },
    /// Same as [`DiagnosticKind::UnusedUniform`] for vertex attributes.
    UnusedAttribute { program: String, name: String },
    /// A vertex array left an attribute unbound because the program has no location for it.
    SkippedBinding { program: String, name: String },
    CompileFailure { filename: String },
    LinkFailure { program: String },
    /// An error code read back from the device after a draw.
    DeviceError { code: u32, name: Option<&'static str> },
    /// A message the driver pushed to us on its own, through its debug output.
    DriverMessage { id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}", tag, self.message)
    }
}

/// Collects diagnostics and echoes them to the logger.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, severity: Severity, kind: DiagnosticKind, message: impl Into<String>) {
        let diagnostic = Diagnostic { severity, kind, message: message.into() };
        log::log!(severity.level(), "{}", diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn unused_uniform(&mut self, program: &str, name: &str) {
        self.emit(
            Severity::Warning,
            DiagnosticKind::UnusedUniform { program: program.to_string(), name: name.to_string() },
            format!("uniform {} is not used by program {}", name, program),
        );
    }

    pub fn unused_attribute(&mut self, program: &str, name: &str) {
        self.emit(
            Severity::Warning,
            DiagnosticKind::UnusedAttribute { program: program.to_string(), name: name.to_string() },
            format!("attribute {} is not used by program {}", name, program),
        );
    }

    pub fn skipped_binding(&mut self, program: &str, name: &str) {
        self.emit(
            Severity::Warning,
            DiagnosticKind::SkippedBinding { program: program.to_string(), name: name.to_string() },
            format!("not binding attribute {} of program {}: no location", name, program),
        );
    }

    pub fn device_error(&mut self, code: u32) {
        let name = device_error_name(code);
        let message = match name {
            Some(name) => format!("device error 0x{:04X} ({})", code, name),
            None => format!("device error 0x{:04X}", code),
        };
        self.emit(Severity::Error, DiagnosticKind::DeviceError { code, name }, message);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Counts the entries matching `pred`.
    pub fn count(&self, pred: impl Fn(&Diagnostic) -> bool) -> usize {
        self.entries.iter().filter(|d| pred(d)).count()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

lazy_static! {
    static ref DEVICE_ERROR_NAMES: HashMap<u32, &'static str> = {
        let mut names = HashMap::new();
        names.insert(0x0500, "invalid enum");
        names.insert(0x0501, "invalid value");
        names.insert(0x0502, "invalid operation");
        names.insert(0x0503, "stack overflow");
        names.insert(0x0504, "stack underflow");
        names.insert(0x0505, "out of memory");
        names.insert(0x0506, "invalid framebuffer operation");
        names.insert(0x0507, "context lost");
        names
    };
}

/// Decodes an error code returned by [`Device::get_error`](crate::device::Device::get_error).
pub fn device_error_name(code: u32) -> Option<&'static str> {
    DEVICE_ERROR_NAMES.get(&code).copied()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_error_codes_are_decoded() {
        assert_eq!(device_error_name(0x0502), Some("invalid operation"));
        assert_eq!(device_error_name(0x0505), Some("out of memory"));
        assert_eq!(device_error_name(0x1234), None);
    }

    #[test]
    fn device_errors_keep_code_and_name() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.device_error(0x0501);
        diagnostics.device_error(0x9999);

        assert!(diagnostics.has_errors());
        assert_eq!(
            diagnostics.entries()[0].kind,
            DiagnosticKind::DeviceError { code: 0x0501, name: Some("invalid value") }
        );
        assert_eq!(diagnostics.entries()[0].to_string(), "error: device error 0x0501 (invalid value)");
        assert_eq!(diagnostics.entries()[1].message, "device error 0x9999");
    }

    #[test]
    fn warnings_are_not_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.unused_uniform("HelloTriangle", "proj");

        assert!(!diagnostics.has_errors());
        assert_eq!(diagnostics.count(|d| d.severity == Severity::Warning), 1);
    }
}
