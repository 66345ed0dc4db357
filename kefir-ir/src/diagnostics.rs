//! Caller-supplied diagnostic reporting.
//!
//! This crate never performs file I/O and never formats a source-level error message itself: a
//! pass that wants to report something beyond what it returns through `OptResult` calls into a
//! `DiagnosticSink` the caller supplies, which is responsible for attaching source locations and
//! rendering. The split mirrors how the codegen core this crate descends from keeps
//! `print_errors`/`verifier` diagnostics separate from the result type returned by compilation
//! itself.

use crate::ir::InstrRef;

/// Severity of a diagnostic reported through a [`DiagnosticSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational; does not indicate a problem with the input.
    Note,
    /// A condition worth surfacing to the user but that does not block further processing.
    Warning,
}

/// A sink for non-fatal diagnostics raised while running an analysis or pass.
///
/// Implemented by the caller; this crate never constructs its own sink beyond the no-op one used
/// in tests.
pub trait DiagnosticSink {
    /// Report a diagnostic at the given severity, optionally attributed to an instruction.
    fn report(&mut self, severity: Severity, instr: Option<InstrRef>, message: &str);
}

/// A [`DiagnosticSink`] that discards every diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnosticSink;

impl DiagnosticSink for NullDiagnosticSink {
    fn report(&mut self, _severity: Severity, _instr: Option<InstrRef>, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        messages: Vec<String>,
    }

    impl DiagnosticSink for RecordingSink {
        fn report(&mut self, _severity: Severity, _instr: Option<InstrRef>, message: &str) {
            self.messages.push(message.to_string());
        }
    }

    #[test]
    fn recording_sink_collects_messages() {
        let mut sink = RecordingSink::default();
        sink.report(Severity::Note, None, "hello");
        assert_eq!(sink.messages, vec!["hello".to_string()]);
    }

    #[test]
    fn null_sink_discards() {
        let mut sink = NullDiagnosticSink;
        sink.report(Severity::Warning, None, "ignored");
    }
}
