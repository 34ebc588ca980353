//! The fixed field list a dataset is bound to.
//!
//! The first field is the identifier: it is the document key, unique and never
//! null. Every other field is an optional update target.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Logical type expected for a dataset column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Utf8,
    Int64,
    Float64,
    Boolean,
    Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: FieldType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

const fn default_nullable() -> bool {
    true
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: FieldType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Default for Schema {
    /// `_id` plus four optional features and a score.
    fn default() -> Self {
        Self {
            fields: vec![
                Field::new("_id", FieldType::Utf8, false),
                Field::new("feature_1", FieldType::Float64, true),
                Field::new("feature_2", FieldType::Float64, true),
                Field::new("feature_3", FieldType::Float64, true),
                Field::new("feature_4", FieldType::Float64, true),
                Field::new("score", FieldType::Float64, false),
            ],
        }
    }
}

impl Schema {
    /// Build a schema, checking it has an identifier and unique names.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty field list, a nullable identifier, or a
    /// duplicated field name.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let schema = Self { fields };
        schema.validate()?;
        Ok(schema)
    }

    /// # Errors
    ///
    /// See [`Schema::new`].
    pub fn validate(&self) -> Result<()> {
        let Some(id) = self.fields.first() else {
            bail!("schema must have at least an identifier field");
        };
        if id.nullable {
            bail!("identifier field {} must not be nullable", id.name);
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                bail!("duplicate field {} in schema", field.name);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// All field names, identifier first.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Name of the identifier field, empty for an unvalidated empty schema.
    #[must_use]
    pub fn id_field(&self) -> &str {
        self.fields.first().map_or("", |f| f.name.as_str())
    }

    /// Names of the update targets (every field but the identifier).
    #[must_use]
    pub fn update_fields(&self) -> Vec<String> {
        self.fields.iter().skip(1).map(|f| f.name.clone()).collect()
    }
}
