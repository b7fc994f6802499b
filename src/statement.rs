//! Query-kind wrapper types.
//!
//! Each wrapper is an immutable value holding a command string (or a
//! procedure name) and exists to route a call to the correct execution
//! strategy on a gateway. `Insert` and `Write` validate their text at
//! construction; every construction path (named constructor or `TryFrom`)
//! applies the same check, and the text is preserved verbatim.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::GatewayError;

static INSERT_VERB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*insert\b").expect("static regex is valid"));

/// A row-returning query, executed through the scalar or cursor paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select(String);

impl Select {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Select {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Select {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// A data-modification statement (UPDATE/DELETE/...), executed through the
/// non-query path. The text must not be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Write(String);

impl Write {
    pub fn parse(text: impl Into<String>) -> Result<Self, GatewayError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(GatewayError::InvalidStatement(
                "write statement text must not be empty".into(),
            ));
        }
        Ok(Self(text))
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Write {
    type Error = GatewayError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::parse(text)
    }
}

impl TryFrom<String> for Write {
    type Error = GatewayError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(text)
    }
}

/// An INSERT statement, executed through the identity-returning path.
/// The text must start with the `INSERT` verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert(String);

impl Insert {
    pub fn parse(text: impl Into<String>) -> Result<Self, GatewayError> {
        let text = text.into();
        if !INSERT_VERB.is_match(&text) {
            return Err(GatewayError::InvalidStatement(
                "insert statement text must begin with INSERT".into(),
            ));
        }
        Ok(Self(text))
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Insert {
    type Error = GatewayError;

    fn try_from(text: &str) -> Result<Self, Self::Error> {
        Self::parse(text)
    }
}

impl TryFrom<String> for Insert {
    type Error = GatewayError;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(text)
    }
}

/// A schema-changing statement (CREATE/ALTER/DROP/...), executed through the
/// non-query path, always as plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDefinitionQuery(String);

impl DataDefinitionQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DataDefinitionQuery {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for DataDefinitionQuery {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// A stored-procedure name; invoked through the procedure paths with
/// parameters bound by the caller's setup callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProcedure(String);

impl StoredProcedure {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StoredProcedure {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for StoredProcedure {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_accepts_insert_shaped_text() {
        let text = "INSERT INTO t (a) VALUES (1)";
        let stmt = Insert::parse(text).unwrap();
        assert_eq!(stmt.text(), text);
    }

    #[test]
    fn insert_accepts_lowercase_and_leading_whitespace() {
        let stmt = Insert::parse("  \n insert into t default values").unwrap();
        assert_eq!(stmt.text(), "  \n insert into t default values");
    }

    #[test]
    fn insert_rejects_non_insert_text() {
        for bad in ["", "   ", "SELECT 1", "INSERTX INTO t", "DELETE FROM t"] {
            assert!(matches!(
                Insert::parse(bad),
                Err(GatewayError::InvalidStatement(_))
            ));
        }
    }

    #[test]
    fn insert_try_from_matches_parse() {
        assert!(Insert::try_from("INSERT INTO t VALUES (1)").is_ok());
        assert!(Insert::try_from("SELECT 1").is_err());
        assert!(Insert::try_from(String::from("insert into t values (1)")).is_ok());
        assert!(Insert::try_from(String::new()).is_err());
    }

    #[test]
    fn write_rejects_empty_text() {
        assert!(matches!(
            Write::parse(""),
            Err(GatewayError::InvalidStatement(_))
        ));
        assert!(matches!(
            Write::parse("  \t "),
            Err(GatewayError::InvalidStatement(_))
        ));
        assert!(Write::try_from("DELETE FROM t WHERE id = 1").is_ok());
    }

    #[test]
    fn infallible_wrappers_keep_text_verbatim() {
        assert_eq!(Select::new("SELECT * FROM t").text(), "SELECT * FROM t");
        assert_eq!(DataDefinitionQuery::new("DROP TABLE t").text(), "DROP TABLE t");
        assert_eq!(StoredProcedure::new("audit.log_event").name(), "audit.log_event");
    }

    #[test]
    fn stored_procedure_converts_from_both_string_types() {
        assert_eq!(StoredProcedure::from("log_event").name(), "log_event");
        assert_eq!(
            StoredProcedure::from(String::from("log_event")).name(),
            "log_event"
        );
    }
}
