//! Protocol lines that could not be parsed.

/// A stream-json line that could not be parsed.
///
/// Malformed lines are logged and skipped so one bad line does not end
/// the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    line_number: usize,
    raw_line: String,
    error_message: String,
}

impl MalformedLine {
    /// Create a new malformed line record.
    ///
    /// # Arguments
    ///
    /// * `line_number` - Position in the stream (1-indexed)
    /// * `raw_line` - The raw line content that failed to parse
    /// * `error_message` - Human-readable error message
    pub fn new(
        line_number: usize,
        raw_line: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            line_number,
            raw_line: raw_line.into(),
            error_message: error_message.into(),
        }
    }

    /// Get the line number where the error occurred.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Get the raw line content.
    pub fn raw_line(&self) -> &str {
        &self.raw_line
    }

    /// Get the error message.
    pub fn error_message(&self) -> &str {
        &self.error_message
    }
}
