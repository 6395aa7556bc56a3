#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// A non-fatal event raised during an export, optionally tied to a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub level: DiagnosticLevel,
    pub pair_index: Option<usize>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, level: DiagnosticLevel) -> Self {
        Self {
            message: message.into(),
            level,
            pair_index: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, DiagnosticLevel::Info)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, DiagnosticLevel::Warning)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, DiagnosticLevel::Error)
    }

    pub fn for_pair(mut self, index: usize) -> Self {
        self.pair_index = Some(index);
        self
    }
}

/// Collects diagnostics for one export and mirrors each into the log.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        let location = diagnostic
            .pair_index
            .map(|i| format!(" (pair {})", i + 1))
            .unwrap_or_default();
        match diagnostic.level {
            DiagnosticLevel::Info => log::info!("{}{location}", diagnostic.message),
            DiagnosticLevel::Warning => log::warn!("{}{location}", diagnostic.message),
            DiagnosticLevel::Error => log::error!("{}{location}", diagnostic.message),
        }
        self.entries.push(diagnostic);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::info(message));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::warning(message));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Diagnostic::error(message));
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn has_warnings(&self) -> bool {
        self.entries
            .iter()
            .any(|d| d.level != DiagnosticLevel::Info)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_keep_order_and_levels() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.info("started");
        diagnostics.push(Diagnostic::warning("pair failed").for_pair(2));

        assert!(diagnostics.has_warnings());
        let entries = diagnostics.into_vec();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, DiagnosticLevel::Info);
        assert_eq!(entries[1].pair_index, Some(2));
    }

    #[test]
    fn test_info_only_has_no_warnings() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.info("fine");
        assert!(!diagnostics.has_warnings());
        assert!(!diagnostics.is_empty());
    }
}
