// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Declarative column definitions.
//!
//! A [`Field`] carries everything needed to render its column clause in a
//! `CREATE TABLE` statement and to turn caller values into what gets stored.

use crate::value::{Value, format_timestamp};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Integer,
    Text,
    Blob,
    Real,
    /// Stored as ISO-8601 text.
    Timestamp,
    /// Stored as integer 0/1.
    Boolean,
}

impl FieldType {
    /// SQLite storage affinity for the type.
    pub fn affinity(self) -> &'static str {
        match self {
            FieldType::Integer | FieldType::Boolean => "INTEGER",
            FieldType::Text | FieldType::Timestamp => "TEXT",
            FieldType::Blob => "BLOB",
            FieldType::Real => "REAL",
        }
    }
}

/// `FOREIGN KEY(column) REFERENCES table(referenced_column)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// Definition of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    pub default: Option<Value>,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl Field {
    /// A nullable column without constraints.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            not_null: false,
            primary_key: false,
            unique: false,
            auto_increment: false,
            foreign_key: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Reference `referenced_table(referenced_column)` from this column.
    pub fn references(
        mut self,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        self.foreign_key = Some(ForeignKey {
            column: self.name.clone(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        });
        self
    }

    /// Render the column clause and, if any, the table-level foreign key clause.
    pub fn render_ddl(&self) -> (String, Option<String>) {
        let mut parts = vec![quote_ident(&self.name), self.ty.affinity().to_owned()];
        if self.not_null {
            parts.push("NOT NULL".into());
        }
        if self.primary_key {
            parts.push("PRIMARY KEY".into());
            // SQLite only accepts AUTOINCREMENT directly after PRIMARY KEY.
            if self.auto_increment {
                parts.push("AUTOINCREMENT".into());
            }
        }
        if self.unique {
            parts.push("UNIQUE".into());
        }
        if let Some(default) = self.render_default() {
            parts.push(format!("DEFAULT {default}"));
        }

        let foreign_key = self.foreign_key.as_ref().map(|fk| {
            format!(
                "FOREIGN KEY({}) REFERENCES {}({})",
                quote_ident(&fk.column),
                quote_ident(&fk.referenced_table),
                quote_ident(&fk.referenced_column)
            )
        });

        (parts.join(" "), foreign_key)
    }

    /// The default rendered as an SQL literal.
    pub fn render_default(&self) -> Option<String> {
        self.default.as_ref().map(|value| self.coerce(value))
    }

    /// Render `value` as an SQL literal according to the declared type.
    ///
    /// Conversion is best effort: a value whose shape does not match the
    /// declared type is rendered through its plain string form.
    pub fn coerce(&self, value: &Value) -> String {
        match (self.ty, value) {
            (_, Value::Null) => "NULL".into(),
            (FieldType::Integer, Value::Integer(i)) => i.to_string(),
            (FieldType::Real, Value::Real(r)) => render_real(*r),
            (FieldType::Real, Value::Integer(i)) => render_real(*i as f64),
            (FieldType::Text, Value::Text(s)) => quote_literal(s),
            (FieldType::Timestamp, Value::Timestamp(ts)) => quote_literal(&format_timestamp(ts)),
            (FieldType::Timestamp, Value::Text(s)) => quote_literal(s),
            (FieldType::Boolean, Value::Boolean(b)) => render_bool(*b),
            (FieldType::Boolean, Value::Integer(i)) => render_bool(*i != 0),
            (FieldType::Blob, Value::Blob(b)) => render_blob(b),
            (_, other) => other.to_string(),
        }
    }

    /// Convert `value` into the representation written to the store.
    ///
    /// Timestamps become ISO-8601 text and booleans become 0/1, so a row read
    /// back compares equal to the parameters it was inserted with.
    pub fn to_storage(&self, value: &Value) -> Value {
        match value {
            Value::Timestamp(ts) => Value::Text(format_timestamp(ts)),
            Value::Boolean(b) => Value::Integer(i64::from(*b)),
            other => other.clone(),
        }
    }
}

/// Double-quote an identifier.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn render_bool(b: bool) -> String {
    if b { "1".into() } else { "0".into() }
}

fn render_real(r: f64) -> String {
    if r.fract() == 0.0 && r.is_finite() {
        format!("{r:.1}")
    } else {
        r.to_string()
    }
}

fn render_blob(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
    format!("X'{hex}'")
}
