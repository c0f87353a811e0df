use std::fmt;

/// Error codes for all compiler diagnostics.
///
/// Format: E#### where the first digit indicates the phase:
/// - E0xxx: Reader errors
/// - E1xxx: Macro expansion errors
/// - E2xxx: Emission and lint problems
/// - E9xxx: Internal compiler errors
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Reader Errors (E0xxx)
    /// Unexpected end of input
    E0001,
    /// Unexpected character
    E0002,
    /// Unmatched closing delimiter
    E0003,
    /// Map literal with an odd number of forms
    E0004,
    /// Invalid number literal
    E0005,
    /// Empty input
    E0006,

    // Expansion Errors (E1xxx)
    /// Macro did not reach a fixpoint
    E1001,
    /// Macro expansion nested too deeply
    E1002,

    // Emission Problems (E2xxx)
    /// Unknown or malformed type
    E2001,
    /// Operand name could not be resolved
    E2002,
    /// Operand type does not match the instruction
    E2003,
    /// Unknown struct, sum, union, field or variant
    E2004,
    /// Instruction has the wrong shape
    E2005,
    /// Unknown callee
    E2006,
    /// Non-exhaustive match
    E2101,

    // Internal Errors (E9xxx)
    /// Function emission aborted
    E9001,
    /// Malformed module form
    E9002,
    /// Emitted module failed verification
    E9003,
}

impl ErrorCode {
    /// Get the numeric code as a string (e.g., "E2001").
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E0001 => "E0001",
            ErrorCode::E0002 => "E0002",
            ErrorCode::E0003 => "E0003",
            ErrorCode::E0004 => "E0004",
            ErrorCode::E0005 => "E0005",
            ErrorCode::E0006 => "E0006",
            ErrorCode::E1001 => "E1001",
            ErrorCode::E1002 => "E1002",
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E2101 => "E2101",
            ErrorCode::E9001 => "E9001",
            ErrorCode::E9002 => "E9002",
            ErrorCode::E9003 => "E9003",
        }
    }

    /// Check if this is a reader error (E0xxx range).
    pub fn is_reader_error(&self) -> bool {
        self.as_str().starts_with("E0")
    }

    /// Check if this is an internal error (E9xxx range).
    pub fn is_internal(&self) -> bool {
        self.as_str().starts_with("E9")
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_display() {
        assert_eq!(ErrorCode::E2101.to_string(), "E2101");
        assert_eq!(ErrorCode::E0003.as_str(), "E0003");
    }

    #[test]
    fn error_code_ranges() {
        assert!(ErrorCode::E0001.is_reader_error());
        assert!(!ErrorCode::E2001.is_reader_error());
        assert!(ErrorCode::E9001.is_internal());
    }
}
