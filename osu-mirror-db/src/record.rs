// SPDX-FileCopyrightText: 2026 osu-mirror contributors
// SPDX-License-Identifier: MIT

//! Records: data bound to an [`EntitySchema`].

use std::collections::BTreeMap;

use rusqlite::ToSql;

use crate::error::{Error, Result};
use crate::schema::{ConflictPolicy, EntitySchema, placeholder};
use crate::value::Value;

/// Named statement parameters, in field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, Value)>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Call `f` with these values as rusqlite named parameters (`:name` keys).
    pub(crate) fn with_named<T>(&self, f: impl FnOnce(&[(&str, &dyn ToSql)]) -> T) -> T {
        let keys: Vec<String> = self.0.iter().map(|(n, _)| placeholder(n)).collect();
        let named: Vec<(&str, &dyn ToSql)> = keys
            .iter()
            .zip(&self.0)
            .map(|(key, (_, value))| (key.as_str(), value as &dyn ToSql))
            .collect();
        f(&named)
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An SQL statement together with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Params,
}

/// One instance of data conforming to a schema.
///
/// Keys that are not fields of the schema are kept but never written.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'s> {
    schema: &'s EntitySchema,
    data: BTreeMap<String, Value>,
}

impl<'s> Record<'s> {
    /// An empty record; useful as a select criteria builder.
    pub fn new(schema: &'s EntitySchema) -> Self {
        Self {
            schema,
            data: BTreeMap::new(),
        }
    }

    /// Build a record from a raw JSON object, converting each known field
    /// according to its declared type.
    pub fn from_json(
        schema: &'s EntitySchema,
        object: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let data = object
            .iter()
            .filter_map(|(key, json)| {
                schema
                    .field(key)
                    .map(|field| (key.clone(), Value::from_json(json, field.ty)))
            })
            .collect();
        Self { schema, data }
    }

    /// Build a record from already typed values.
    pub fn from_values<I, K, V>(schema: &'s EntitySchema, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let data = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { schema, data }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn schema(&self) -> &'s EntitySchema {
        self.schema
    }

    pub fn table_name(&self) -> &str {
        self.schema.table_name()
    }

    /// True when every field of the schema has a key in the data, null or not.
    pub fn is_valid(&self) -> bool {
        self.schema
            .fields()
            .iter()
            .all(|f| self.data.contains_key(&f.name))
    }

    /// Parameters for a full-row insert.
    ///
    /// Absent fields become null when nullable, else the field default,
    /// else [`Error::MissingRequiredField`].
    pub fn to_insert_parameters(&self) -> Result<Params> {
        self.schema
            .fields()
            .iter()
            .map(|field| {
                let value = match (self.data.get(&field.name), &field.default) {
                    (Some(value), _) => field.to_storage(value),
                    (None, _) if !field.not_null => Value::Null,
                    (None, Some(default)) => field.to_storage(default),
                    (None, None) => {
                        return Err(Error::MissingRequiredField {
                            table: self.schema.table_name().to_owned(),
                            field: field.name.clone(),
                        });
                    }
                };
                Ok((field.name.clone(), value))
            })
            .collect()
    }

    pub fn to_insert_statement_and_parameters(&self, policy: ConflictPolicy) -> Result<Statement> {
        Ok(Statement {
            sql: self.schema.insert_statement(policy),
            params: self.to_insert_parameters()?,
        })
    }

    /// Equality select over the values this record carries.
    pub fn to_select_statement(&self) -> Statement {
        let params: Params = self
            .schema
            .fields()
            .iter()
            .filter_map(|field| {
                self.data
                    .get(&field.name)
                    .map(|v| (field.name.clone(), field.to_storage(v)))
            })
            .collect();
        Statement {
            sql: self.schema.select_statement(params.iter().map(|(n, _)| n)),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::field::{Field, FieldType};

    #[fixture]
    fn schema() -> EntitySchema {
        EntitySchema::new(
            "maps",
            vec![
                Field::new("id", FieldType::Integer).not_null().primary_key(),
                Field::new("title", FieldType::Text).not_null(),
                Field::new("source", FieldType::Text),
                Field::new("video", FieldType::Boolean).not_null().default_value(false),
            ],
        )
        .unwrap()
    }

    #[rstest]
    fn test_is_valid_is_key_presence(schema: EntitySchema) {
        let partial = Record::new(&schema).with("id", 1).with("title", "x");
        assert!(!partial.is_valid());

        let full = partial
            .with("source", Value::Null)
            .with("video", true);
        assert!(full.is_valid());
    }

    #[rstest]
    fn test_insert_parameters_fill_nulls_and_defaults(schema: EntitySchema) {
        let record = Record::new(&schema).with("id", 3).with("title", "Blue Zenith");
        let params = record.to_insert_parameters().unwrap();

        let names: Vec<&str> = params.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["id", "title", "source", "video"]);
        assert_eq!(params.get("source"), Some(&Value::Null));
        assert_eq!(params.get("video"), Some(&Value::Integer(0)));
    }

    #[rstest]
    fn test_missing_required_field(schema: EntitySchema) {
        let record = Record::new(&schema).with("id", 3);
        match record.to_insert_parameters() {
            Err(Error::MissingRequiredField { table, field }) => {
                assert_eq!(table, "maps");
                assert_eq!(field, "title");
            }
            other => panic!("expected MissingRequiredField, got {other:?}"),
        }
    }

    #[rstest]
    fn test_explicit_null_is_kept(schema: EntitySchema) {
        let record = Record::new(&schema)
            .with("id", 3)
            .with("title", Value::Null);
        let params = record.to_insert_parameters().unwrap();
        assert_eq!(params.get("title"), Some(&Value::Null));
    }

    #[rstest]
    fn test_from_json_drops_unknown_keys(schema: EntitySchema) {
        let raw = json!({"id": "9", "title": "FREEDOM DiVE", "video": "1", "extra": 5});
        let record = Record::from_json(&schema, raw.as_object().unwrap());
        assert_eq!(record.get("id"), Some(&Value::Integer(9)));
        assert_eq!(record.get("video"), Some(&Value::Boolean(true)));
        assert_eq!(record.get("extra"), None);
    }

    #[rstest]
    fn test_select_statement_uses_present_fields(schema: EntitySchema) {
        let stmt = Record::new(&schema).with("video", true).to_select_statement();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM \"maps\" WHERE \"video\" = :video ORDER BY rowid"
        );
        assert_eq!(stmt.params.get("video"), Some(&Value::Integer(1)));
    }
}
