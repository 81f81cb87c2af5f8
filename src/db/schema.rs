//! Database schema types for SQL Advisor.
//!
//! A [`Schema`] maps table names to their ordered column lists, together with
//! the indexes already defined on those tables and the foreign keys between
//! them.

use serde::Serialize;
use std::collections::BTreeMap;

/// Schema metadata for a set of tables, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    tables: BTreeMap<String, Vec<Column>>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    indexes: BTreeMap<String, Vec<Index>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    foreign_keys: Vec<ForeignKey>,
}

impl Schema {
    /// Creates a new empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a schema from `(table, column)` pairs, preserving column order
    /// within each table.
    pub fn from_columns<I>(columns: I) -> Self
    where
        I: IntoIterator<Item = (String, Column)>,
    {
        let mut schema = Self::new();
        for (table, column) in columns {
            schema.tables.entry(table).or_default().push(column);
        }
        schema
    }

    /// Adds or replaces a table.
    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<Column>) -> Self {
        self.tables.insert(name.into(), columns);
        self
    }

    /// Adds an index to a table.
    pub fn with_index(mut self, table: impl Into<String>, index: Index) -> Self {
        self.indexes.entry(table.into()).or_default().push(index);
        self
    }

    /// Adds a foreign key.
    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Returns the columns of a table, if present.
    pub fn table(&self, name: &str) -> Option<&[Column]> {
        self.tables.get(name).map(Vec::as_slice)
    }

    /// Returns the indexes defined on a table.
    pub fn indexes(&self, table: &str) -> &[Index] {
        self.indexes.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns every foreign key.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Returns the table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Returns a copy restricted to the given table names. Unknown names are skipped.
    ///
    /// Foreign keys are kept when their referencing table is kept.
    pub fn restricted_to(&self, names: &[String]) -> Self {
        let wanted = |table: &str| names.iter().any(|n| n.eq_ignore_ascii_case(table));

        Self {
            tables: self
                .tables
                .iter()
                .filter(|(name, _)| wanted(name.as_str()))
                .map(|(name, cols)| (name.clone(), cols.clone()))
                .collect(),
            indexes: self
                .indexes
                .iter()
                .filter(|(name, _)| wanted(name.as_str()))
                .map(|(name, indexes)| (name.clone(), indexes.clone()))
                .collect(),
            foreign_keys: self
                .foreign_keys
                .iter()
                .filter(|fk| wanted(fk.from_table.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no tables are present.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Formats the schema for inclusion in an LLM prompt.
    pub fn format_for_llm(&self) -> String {
        if self.tables.is_empty() {
            return "(no tables found)\n".to_string();
        }

        let tables_text = self
            .tables
            .iter()
            .map(|(name, columns)| {
                let column_lines = columns
                    .iter()
                    .map(Column::format_for_llm)
                    .collect::<Vec<_>>()
                    .join("");
                let index_lines = match self.indexes(name) {
                    [] => String::new(),
                    indexes => format!(
                        "  Indexes:\n{}",
                        indexes
                            .iter()
                            .map(Index::format_for_llm)
                            .collect::<Vec<_>>()
                            .join("")
                    ),
                };
                format!("Table: {}\n{}{}\n", name, column_lines, index_lines)
            })
            .collect::<Vec<_>>()
            .join("");

        let foreign_keys_text = if self.foreign_keys.is_empty() {
            String::new()
        } else {
            let fk_lines = self
                .foreign_keys
                .iter()
                .map(|fk| {
                    format!(
                        "  - {}.{} -> {}.{}\n",
                        fk.from_table,
                        fk.from_columns.join(", "),
                        fk.to_table,
                        fk.to_columns.join(", ")
                    )
                })
                .collect::<Vec<_>>()
                .join("");
            format!("Foreign Keys:\n{}", fk_lines)
        };

        format!("{}{}", tables_text, foreign_keys_text)
    }
}

/// A single table column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Column {
    /// Column name.
    pub column_name: String,

    /// Full column type (e.g., "int(11)", "varchar(255)").
    pub column_type: String,

    /// Whether the column allows NULL values.
    pub is_nullable: bool,

    /// Key kind as reported by MariaDB (`PRI`, `UNI`, `MUL`), if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_key: Option<String>,
}

impl Column {
    /// Creates a new nullable, unkeyed column.
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            column_name: name.into(),
            column_type: column_type.into(),
            is_nullable: true,
            column_key: None,
        }
    }

    /// Sets whether the column is nullable.
    pub fn nullable(self, nullable: bool) -> Self {
        Self {
            is_nullable: nullable,
            ..self
        }
    }

    /// Sets the key kind. Empty strings mean "no key".
    pub fn with_key(self, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            column_key: (!key.is_empty()).then_some(key),
            ..self
        }
    }

    fn format_for_llm(&self) -> String {
        let annotations = [
            match self.column_key.as_deref() {
                Some("PRI") => Some("PK"),
                Some("UNI") => Some("UNIQUE"),
                Some("MUL") => Some("INDEXED"),
                _ => None,
            },
            (!self.is_nullable).then_some("NOT NULL"),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

        if annotations.is_empty() {
            format!("  - {}: {}\n", self.column_name, self.column_type)
        } else {
            format!(
                "  - {}: {} ({})\n",
                self.column_name,
                self.column_type,
                annotations.join(", ")
            )
        }
    }
}

/// An index on a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Index {
    /// Index name (`PRIMARY` for the primary key).
    pub name: String,

    /// Indexed columns in key order.
    pub columns: Vec<String>,

    /// Whether this is a unique index.
    pub is_unique: bool,
}

impl Index {
    /// Creates a new non-unique index with the given name and columns.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            is_unique: false,
        }
    }

    /// Sets whether the index is unique.
    pub fn unique(self, unique: bool) -> Self {
        Self {
            is_unique: unique,
            ..self
        }
    }

    fn format_for_llm(&self) -> String {
        let unique = if self.is_unique { " UNIQUE" } else { "" };
        format!("    - {} ({}){}\n", self.name, self.columns.join(", "), unique)
    }
}

/// A foreign key relationship between tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Referencing table name.
    pub from_table: String,

    /// Referencing column names.
    pub from_columns: Vec<String>,

    /// Referenced table name.
    pub to_table: String,

    /// Referenced column names.
    pub to_columns: Vec<String>,
}

impl ForeignKey {
    /// Creates a new foreign key relationship.
    pub fn new(
        name: impl Into<String>,
        from_table: impl Into<String>,
        from_columns: Vec<String>,
        to_table: impl Into<String>,
        to_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from_table: from_table.into(),
            from_columns,
            to_table: to_table.into(),
            to_columns,
        }
    }
}
