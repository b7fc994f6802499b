//! The command object handed to setup callbacks.
//!
//! A gateway builds one [`Command`] per call, bound to the wrapper's text or
//! procedure name, and invokes the caller's setup callback exactly once so
//! it can bind parameters before execution.

use crate::value::SqlValue;

/// How the command text is interpreted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Plain SQL text.
    Text,
    /// A stored-procedure name, rendered into an invocation by the gateway.
    Procedure,
}

/// A command under construction: text (or procedure name), kind, and the
/// parameters bound so far.
#[derive(Debug, Clone)]
pub struct Command {
    kind: CommandKind,
    text: String,
    params: Vec<SqlValue>,
}

impl Command {
    pub(crate) fn text_command(text: &str) -> Self {
        Self {
            kind: CommandKind::Text,
            text: text.to_string(),
            params: Vec::new(),
        }
    }

    pub(crate) fn procedure(name: &str) -> Self {
        Self {
            kind: CommandKind::Procedure,
            text: name.to_string(),
            params: Vec::new(),
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// The SQL text, or the procedure name for `CommandKind::Procedure`.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bind the next positional parameter.
    pub fn bind(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.params.push(value.into());
        self
    }

    /// Bind a NULL for the next positional parameter.
    pub fn bind_null(&mut self) -> &mut Self {
        self.params.push(SqlValue::Null);
        self
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_appends_positionally() {
        let mut cmd = Command::text_command("SELECT ?1, ?2, ?3");
        cmd.bind(1_i64).bind("two").bind_null();
        assert_eq!(cmd.kind(), CommandKind::Text);
        assert_eq!(
            cmd.params(),
            &[
                SqlValue::Int(1),
                SqlValue::Text("two".into()),
                SqlValue::Null
            ]
        );
    }

    #[test]
    fn procedure_commands_keep_the_bare_name() {
        let cmd = Command::procedure("record_audit");
        assert_eq!(cmd.kind(), CommandKind::Procedure);
        assert_eq!(cmd.text(), "record_audit");
    }
}
