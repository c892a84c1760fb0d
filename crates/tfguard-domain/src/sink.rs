use tfguard_types::Diagnostic;

/// Ordered failures and errors of one scan.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagnosticSink {
    failures: Vec<Diagnostic>,
    errors: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_failure(&mut self, diagnostic: Diagnostic) {
        self.failures.push(diagnostic);
    }

    pub fn push_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    pub fn extend_failures(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.failures.extend(diagnostics);
    }

    pub fn extend_errors(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.errors.extend(diagnostics);
    }

    pub fn failures(&self) -> &[Diagnostic] {
        &self.failures
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn unwaived_failures(&self) -> usize {
        self.failures.iter().filter(|d| !d.waived.is_waived()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty() && self.errors.is_empty()
    }

    pub fn into_parts(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        (self.failures, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfguard_types::{Severity, Waived};

    #[test]
    fn keeps_insertion_order_and_counts_unwaived() {
        let mut sink = DiagnosticSink::new();
        sink.push_failure(Diagnostic::new(Severity::Low, "b", "m", "f"));
        sink.push_failure(Diagnostic::new(Severity::Low, "a", "m", "f").with_waiver(Waived::Yes));
        sink.push_error(Diagnostic::error("oops", "m", "f"));

        let messages: Vec<&str> = sink.failures().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["b", "a"]);
        assert_eq!(sink.unwaived_failures(), 1);
        assert_eq!(sink.errors().len(), 1);
        assert!(!sink.is_empty());
    }
}
