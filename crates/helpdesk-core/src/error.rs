use std::fmt;

use crate::domain::DomainError;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotInitialized,
    ConfigParseError,
    RecordNotFound,
    InvalidEnumValue,
    ScriptValidationFailed,
    AssignMethodWithoutMembers,
    MalformedDomain,
    StoreFailure,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotInitialized => "E1001",
            Self::ConfigParseError => "E1002",
            Self::RecordNotFound => "E2001",
            Self::InvalidEnumValue => "E2005",
            Self::ScriptValidationFailed => "E4001",
            Self::AssignMethodWithoutMembers => "E4002",
            Self::MalformedDomain => "E4003",
            Self::StoreFailure => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotInitialized => "Helpdesk workspace not initialized",
            Self::ConfigParseError => "Config file parse error",
            Self::RecordNotFound => "Record not found",
            Self::InvalidEnumValue => "Invalid assign method/priority value",
            Self::ScriptValidationFailed => "Domain script failed validation",
            Self::AssignMethodWithoutMembers => "Assignation method needs team members",
            Self::MalformedDomain => "Malformed domain",
            Self::StoreFailure => "Record store failure",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run `hdesk init` to initialize this directory."),
            Self::ConfigParseError => Some("Fix syntax in .hdesk/config.toml and retry."),
            Self::RecordNotFound => None,
            Self::InvalidEnumValue => {
                Some("Use one of manual, randomly, balanced, sequential for assign_method.")
            }
            Self::ScriptValidationFailed => {
                Some("Fix the reported line in the team's domain script and save again.")
            }
            Self::AssignMethodWithoutMembers => {
                Some("Add team members first, or keep the assignation method on manual.")
            }
            Self::MalformedDomain => {
                Some("Each operator needs operands: '&' and '|' take two terms, '!' takes one.")
            }
            Self::StoreFailure => Some("Check the database path and write permissions."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by record writes and store access.
///
/// Validation failures abort the triggering write. Everything that only
/// degrades a filter layer is logged instead and never reaches this type.
#[derive(Debug, thiserror::Error)]
pub enum HelpdeskError {
    /// A domain script failed its static check when the team was saved.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    /// A non-manual assignation method was set on a team with no members.
    #[error("You must have team members assigned to change the assignation method.")]
    AssignMethodWithoutMembers { team: String },

    #[error("{model} record {id} not found")]
    NotFound { model: &'static str, id: i64 },

    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("invalid stored value: {0}")]
    Corrupt(String),
}

impl HelpdeskError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ScriptValidationFailed,
            Self::AssignMethodWithoutMembers { .. } => ErrorCode::AssignMethodWithoutMembers,
            Self::NotFound { .. } => ErrorCode::RecordNotFound,
            Self::Domain(_) => ErrorCode::MalformedDomain,
            Self::Store(_) => ErrorCode::StoreFailure,
            Self::Corrupt(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub type Result<T, E = HelpdeskError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, HelpdeskError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::NotInitialized,
            ErrorCode::ConfigParseError,
            ErrorCode::RecordNotFound,
            ErrorCode::InvalidEnumValue,
            ErrorCode::ScriptValidationFailed,
            ErrorCode::AssignMethodWithoutMembers,
            ErrorCode::MalformedDomain,
            ErrorCode::StoreFailure,
            ErrorCode::InternalUnexpected,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::ScriptValidationFailed.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = HelpdeskError::Validation {
            field: "Task Domain Python Code",
            message: "invalid syntax at line 2".into(),
        };
        assert_eq!(err.to_string(), "Task Domain Python Code: invalid syntax at line 2");
        assert_eq!(err.code(), ErrorCode::ScriptValidationFailed);
        assert!(err.hint().is_some());
    }
}
