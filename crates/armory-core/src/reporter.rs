//! Reporter trait for dependency injection
//!
//! Core logic reports progress and asks the operator questions through this
//! trait without being coupled to a terminal.

/// Operator-facing output and prompts.
pub trait Reporter: Send + Sync {
    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);

    /// Ask a yes/no question. Non-interactive reporters return `default`.
    fn confirm(&self, prompt: &str, default: bool) -> bool;

    /// Ask the operator to pick one of `options`. `None` means "do not proceed".
    fn select(&self, prompt: &str, options: &[String]) -> Option<usize>;
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
    fn confirm(&self, prompt: &str, default: bool) -> bool {
        (**self).confirm(prompt, default)
    }
    fn select(&self, prompt: &str, options: &[String]) -> Option<usize> {
        (**self).select(prompt, options)
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
///
/// Prompts resolve to their defaults; selections are declined.
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn confirm(&self, _: &str, default: bool) -> bool {
        default
    }
    fn select(&self, _: &str, _: &[String]) -> Option<usize> {
        None
    }
}
