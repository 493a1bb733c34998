//! Snapshot table schema.

use crate::{Error, Result};

/// Longest identifier PostgreSQL keeps without truncation.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Statements that create the snapshot table. `{table}` is replaced with the
/// configured table name. Every statement is idempotent.
const SCHEMA_SQL: &str = r"
    CREATE TABLE IF NOT EXISTS {table} (
        id BIGSERIAL PRIMARY KEY,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        snapshot JSONB
    );
    CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table} (created_at DESC);
";

/// Returns the schema statements for `table`, one per element.
#[must_use]
pub fn statements(table: &str) -> Vec<String> {
    SCHEMA_SQL
        .replace("{table}", table)
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Checks that `name` can be interpolated into SQL as a bare identifier.
///
/// # Errors
///
/// Returns [`Error::Config`] unless `name` matches `[A-Za-z_][A-Za-z0-9_]*`
/// and fits PostgreSQL's identifier length (the index name adds a prefix
/// and suffix, so the limit applies to that too).
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest {
        return Err(Error::Config(format!(
            "table name '{name}' must match [A-Za-z_][A-Za-z0-9_]*"
        )));
    }

    let index_name_len = "idx__created_at".len() + name.len();
    if index_name_len > MAX_IDENTIFIER_LEN {
        return Err(Error::Config(format!(
            "table name '{name}' is too long (max {} characters)",
            MAX_IDENTIFIER_LEN - "idx__created_at".len()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_statements_substitute_table() {
        let stmts = statements("calls");
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("CREATE TABLE IF NOT EXISTS calls ("));
        assert!(stmts[0].contains("snapshot JSONB"));
        assert!(stmts[1].contains("idx_calls_created_at ON calls"));
        assert!(stmts.iter().all(|s| !s.contains("{table}")));
    }

    #[test_case("calls" ; "plain")]
    #[test_case("_private" ; "leading underscore")]
    #[test_case("calls_v2" ; "digits")]
    fn test_valid_identifiers(name: &str) {
        assert!(validate_identifier(name).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("2calls" ; "leading digit")]
    #[test_case("calls;drop table x" ; "injection")]
    #[test_case("my-calls" ; "hyphen")]
    #[test_case("\"calls\"" ; "quoted")]
    fn test_invalid_identifiers(name: &str) {
        assert!(matches!(validate_identifier(name), Err(Error::Config(_))));
    }

    #[test]
    fn test_identifier_length_limit() {
        let longest = "a".repeat(MAX_IDENTIFIER_LEN - "idx__created_at".len());
        assert!(validate_identifier(&longest).is_ok());
        assert!(validate_identifier(&format!("{longest}a")).is_err());
    }
}
