use crate::core::{Result, RoutingError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema used when a table is created without an explicit one.
pub const DEFAULT_SCHEMA: &str = "doc";

lazy_static! {
    // Characters that are not allowed in physical index names.
    static ref VALID_IDENT: Regex = Regex::new(r#"^[^._\\/*?"<>|\s,#:][^.\\/*?"<>|\s,#:]*$"#)
        .expect("identifier pattern is valid");
}

fn validate_ident(kind: &str, value: &str) -> Result<()> {
    if VALID_IDENT.is_match(value) {
        Ok(())
    } else {
        Err(RoutingError::InvalidIdentifier(format!(
            "{} name '{}' contains invalid characters or starts with '_'",
            kind, value
        )))
    }
}

/// Schema-qualified name of a logical table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableIdent {
    schema: String,
    name: String,
}

impl TableIdent {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let schema = schema.into();
        let name = name.into();
        validate_ident("Schema", &schema)?;
        validate_ident("Table", &name)?;
        Ok(Self { schema, name })
    }

    /// Creates an identifier in the default schema.
    pub fn in_default_schema(name: impl Into<String>) -> Result<Self> {
        Self::new(DEFAULT_SCHEMA, name)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified name, `schema.name`.
    pub fn fqn(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Name of the physical index backing an unpartitioned table.
    ///
    /// The default schema is not part of index names.
    pub fn index_name(&self) -> String {
        if self.schema == DEFAULT_SCHEMA {
            self.name.clone()
        } else {
            self.fqn()
        }
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqn())
    }
}

/// A (possibly nested) column reference.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnIdent {
    name: String,
    #[serde(default)]
    path: Vec<String>,
}

impl ColumnIdent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Vec::new(),
        }
    }

    /// Creates a nested column reference such as `o['a']['b']`.
    pub fn nested(name: impl Into<String>, path: Vec<String>) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }

    /// Parses the dotted form, `o.a.b`.
    pub fn from_dotted(dotted: &str) -> Self {
        let mut parts = dotted.split('.').map(str::to_string);
        let name = parts.next().unwrap_or_default();
        Self {
            name,
            path: parts.collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// True for top-level columns.
    pub fn is_column(&self) -> bool {
        self.path.is_empty()
    }

    /// Dotted form, `o.a.b`.
    pub fn fqn(&self) -> String {
        if self.path.is_empty() {
            return self.name.clone();
        }
        format!("{}.{}", self.name, self.path.join("."))
    }

    /// Subscript form, `o['a']['b']`.
    pub fn sql_fqn(&self) -> String {
        let mut out = self.name.clone();
        for segment in &self.path {
            out.push_str("['");
            out.push_str(segment);
            out.push_str("']");
        }
        out
    }
}

impl fmt::Display for ColumnIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_fqn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_is_not_part_of_index_name() {
        let doc = TableIdent::in_default_schema("users").unwrap();
        assert_eq!(doc.index_name(), "users");
        assert_eq!(doc.fqn(), "doc.users");

        let custom = TableIdent::new("sales", "orders").unwrap();
        assert_eq!(custom.index_name(), "sales.orders");
    }

    #[test]
    fn invalid_table_names_are_rejected() {
        for name in ["_hidden", "a.b", "with space", "q?", ""] {
            let err = TableIdent::in_default_schema(name).unwrap_err();
            assert!(
                matches!(err, RoutingError::InvalidIdentifier(_)),
                "expected invalid identifier for {:?}",
                name
            );
        }
    }

    #[test]
    fn column_ident_renders_nested_paths() {
        let column = ColumnIdent::from_dotted("o.a.b");
        assert!(!column.is_column());
        assert_eq!(column.fqn(), "o.a.b");
        assert_eq!(column.sql_fqn(), "o['a']['b']");
        assert!(ColumnIdent::new("d").is_column());
    }
}
