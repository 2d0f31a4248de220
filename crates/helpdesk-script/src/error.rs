/// Errors raised while reading or running a predicate script.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("invalid syntax at line {line}, column {col}: {msg}")]
    Syntax { line: usize, col: usize, msg: String },

    /// A construct the sandbox never runs: imports, definitions, `while`,
    /// dunder access and similar.
    #[error("forbidden {what} at line {line}")]
    Forbidden { line: usize, what: String },

    #[error("{0}")]
    Runtime(String),

    #[error("name '{0}' is not defined")]
    Name(String),

    #[error("type error: {0}")]
    Type(String),
}

impl ScriptError {
    pub(crate) fn syntax(line: usize, col: usize, msg: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            col,
            msg: msg.into(),
        }
    }

    pub(crate) fn forbidden(line: usize, what: impl Into<String>) -> Self {
        Self::Forbidden {
            line,
            what: what.into(),
        }
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Whether the error comes from reading the source rather than running it.
    #[must_use]
    pub const fn is_static(&self) -> bool {
        matches!(self, Self::Syntax { .. } | Self::Forbidden { .. })
    }
}

pub type Result<T, E = ScriptError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::ScriptError;

    #[test]
    fn messages_name_the_position() {
        let err = ScriptError::syntax(2, 5, "unexpected ')'");
        assert_eq!(err.to_string(), "invalid syntax at line 2, column 5: unexpected ')'");
        assert!(err.is_static());
        assert_eq!(
            ScriptError::forbidden(1, "import statement").to_string(),
            "forbidden import statement at line 1"
        );
        assert!(!ScriptError::Name("x".into()).is_static());
    }
}
