//! Successful results that may carry warnings.

use serde::Serialize;

/// A completed operation.
///
/// Remote side effects that fail after the local change already happened
/// are reported as warnings here rather than as errors.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, message: impl Into<String>) -> Self {
        Self {
            value,
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            message: self.message,
            warnings: self.warnings,
        }
    }
}
