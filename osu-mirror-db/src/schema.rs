// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Table definitions and the statements generated from them.
//!
//! An [`EntitySchema`] is plain data: a table name and an ordered list of
//! [`Field`]s. `CREATE TABLE`, `INSERT` and `SELECT` statements are derived
//! from it by the functions in this module.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::field::{Field, quote_ident};

/// What to do when an insert collides with an existing primary key or
/// unique value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConflictPolicy {
    /// Fail the statement (SQLite's default `ABORT`).
    #[default]
    Abort,
    /// Delete the conflicting row and write the new one.
    Replace,
    /// Keep the existing row and skip the new one.
    Ignore,
}

impl ConflictPolicy {
    fn insert_command(self) -> &'static str {
        match self {
            ConflictPolicy::Abort => "INSERT INTO",
            ConflictPolicy::Replace => "INSERT OR REPLACE INTO",
            ConflictPolicy::Ignore => "INSERT OR IGNORE INTO",
        }
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    table_name: String,
    fields: Vec<Field>,
}

impl EntitySchema {
    /// Build a schema, checking that field names are unique and that exactly
    /// one field is the primary key.
    pub fn new(table_name: impl Into<String>, fields: Vec<Field>) -> Result<Self> {
        let table_name = table_name.into();

        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(Error::invalid_schema(
                    &table_name,
                    format!("duplicate field '{}'", field.name),
                ));
            }
        }

        let primary_keys = fields.iter().filter(|f| f.primary_key).count();
        if primary_keys != 1 {
            return Err(Error::invalid_schema(
                &table_name,
                format!("expected exactly one primary key, found {primary_keys}"),
            ));
        }

        Ok(Self { table_name, fields })
    }

    /// Build a schema from a definition already known to be consistent.
    pub(crate) fn from_parts(table_name: &str, fields: Vec<Field>) -> Self {
        Self {
            table_name: table_name.to_owned(),
            fields,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// `CREATE TABLE IF NOT EXISTS` for this table; safe to run repeatedly.
    pub fn create_table_statement(&self) -> String {
        let (columns, foreign_keys): (Vec<_>, Vec<_>) =
            self.fields.iter().map(Field::render_ddl).unzip();

        let mut clauses = columns;
        clauses.extend(foreign_keys.into_iter().flatten());

        format!(
            "CREATE TABLE IF NOT EXISTS {}({})",
            quote_ident(&self.table_name),
            clauses.join(", ")
        )
    }

    /// Full-row insert with one named placeholder per field, in field order.
    pub fn insert_statement(&self, policy: ConflictPolicy) -> String {
        let columns: Vec<String> = self.fields.iter().map(|f| quote_ident(&f.name)).collect();
        let placeholders: Vec<String> = self.fields.iter().map(|f| placeholder(&f.name)).collect();

        format!(
            "{} {} ({}) VALUES ({})",
            policy.insert_command(),
            quote_ident(&self.table_name),
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    /// Equality `SELECT` over the named fields, joined with `AND`.
    ///
    /// Names that are not fields of this schema are ignored. No names at all
    /// selects every row. Rows come back in insertion order.
    pub fn select_statement<'a, I>(&self, known: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: HashSet<&str> = known.into_iter().collect();
        let conditions: Vec<String> = self
            .fields
            .iter()
            .filter(|f| known.contains(f.name.as_str()))
            .map(|f| format!("{} = {}", quote_ident(&f.name), placeholder(&f.name)))
            .collect();

        let mut sql = format!("SELECT * FROM {}", quote_ident(&self.table_name));
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");
        sql
    }
}

/// Named placeholder for a field.
pub(crate) fn placeholder(name: &str) -> String {
    format!(":{name}")
}

/// The set of schemas a store knows about, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Vec<EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry over schemas already ordered so that referenced tables
    /// come first.
    pub(crate) fn from_ordered(schemas: Vec<EntitySchema>) -> Self {
        Self { schemas }
    }

    /// Add a schema.
    ///
    /// Every foreign key must name a column of an already registered schema
    /// (or of the schema itself). Only existence is checked here; whether
    /// the reference holds for actual rows is up to SQLite.
    pub fn register(&mut self, schema: EntitySchema) -> Result<()> {
        if self.get(schema.table_name()).is_some() {
            return Err(Error::invalid_schema(
                schema.table_name(),
                "table registered twice",
            ));
        }

        for fk in schema.fields().iter().filter_map(|f| f.foreign_key.as_ref()) {
            let target = if fk.referenced_table == schema.table_name() {
                Some(&schema)
            } else {
                self.get(&fk.referenced_table)
            };
            let Some(target) = target else {
                return Err(Error::invalid_schema(
                    schema.table_name(),
                    format!("foreign key references unknown table '{}'", fk.referenced_table),
                ));
            };
            if target.field(&fk.referenced_column).is_none() {
                return Err(Error::invalid_schema(
                    schema.table_name(),
                    format!(
                        "foreign key references unknown column '{}.{}'",
                        fk.referenced_table, fk.referenced_column
                    ),
                ));
            }
        }

        self.schemas.push(schema);
        Ok(())
    }

    pub fn get(&self, table_name: &str) -> Option<&EntitySchema> {
        self.schemas.iter().find(|s| s.table_name() == table_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntitySchema> {
        self.schemas.iter()
    }
}
