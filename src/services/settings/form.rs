use super::{
    document::{SettingsDocument, UpdatePayload, get_path, set_path},
    schema::{self, FieldKind, FieldSpec},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Value of an editable field, as entered by the user or read from a document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl FieldValue {
    /// Value used when the document does not carry the field
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Boolean => FieldValue::Boolean(false),
            FieldKind::Integer => FieldValue::Integer(0),
            FieldKind::Float => FieldValue::Float(0.0),
            FieldKind::String => FieldValue::String(String::new()),
            FieldKind::Enum(options) => {
                FieldValue::String(options.first().copied().unwrap_or_default().to_string())
            }
        }
    }

    /// Read a document value as the given kind, `None` if it has another type
    ///
    /// Enum values outside the option set are kept as they are; the server
    /// owns the document and a value it reports must not be rewritten just
    /// because the dashboard does not know it.
    fn from_document(kind: FieldKind, raw: &Value) -> Option<Self> {
        match kind {
            FieldKind::Boolean => raw.as_bool().map(FieldValue::Boolean),
            FieldKind::Integer => raw
                .as_i64()
                .or_else(|| raw.as_f64().and_then(whole_number))
                .map(FieldValue::Integer),
            FieldKind::Float => raw.as_f64().map(FieldValue::Float),
            FieldKind::String | FieldKind::Enum(_) => {
                raw.as_str().map(|s| FieldValue::String(s.to_string()))
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::String(_) => "string",
        }
    }

    fn to_json(&self) -> Value {
        match self {
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Float(f) => Value::from(*f),
            FieldValue::String(s) => Value::String(s.clone()),
        }
    }
}

fn whole_number(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("unknown settings section: {0}")]
    UnknownSection(String),
    #[error("unknown settings field: {0}")]
    UnknownField(String),
    #[error("invalid value for {field}: expected {expected}, got {actual}")]
    KindMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("invalid value for {field}: {value:?} is not one of {options:?}")]
    InvalidOption {
        field: String,
        value: String,
        options: &'static [&'static str],
    },
    #[error("no settings changes to submit")]
    NothingToSubmit,
}

/// Editable field as handed to the presentation layer
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub id: String,
    pub section: &'static str,
    pub key: String,
    pub label: &'static str,
    pub kind: FieldKind,
    pub value: FieldValue,
    pub sensitive: bool,
    pub edited: bool,
}

/// Fetched settings document plus the user's pending edits
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsForm {
    document: SettingsDocument,
    edits: BTreeMap<String, FieldValue>,
}

impl SettingsForm {
    pub fn new(document: SettingsDocument) -> Self {
        Self {
            document,
            edits: BTreeMap::new(),
        }
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    /// Editable fields of a section with their current values
    ///
    /// A pending edit wins over the document value; a field missing from the
    /// document (or carrying a value of the wrong type) shows its default.
    pub fn derive_fields(&self, section: &str) -> Result<Vec<FieldDescriptor>, FormError> {
        let section = schema::section(section)
            .ok_or_else(|| FormError::UnknownSection(section.to_string()))?;
        let subtree = self.document.section(section.name);

        Ok(schema::section_fields(section.name)
            .map(|field| {
                let id = field.id();
                let edit = self.edits.get(&id).cloned();
                let edited = edit.is_some();
                let value = edit
                    .or_else(|| {
                        subtree
                            .and_then(|s| get_path(s, field.path))
                            .and_then(|raw| FieldValue::from_document(field.kind, raw))
                    })
                    .unwrap_or_else(|| FieldValue::default_for(field.kind));

                FieldDescriptor {
                    id,
                    section: field.section,
                    key: field.key(),
                    label: field.label,
                    kind: field.kind,
                    value,
                    sensitive: field.sensitive,
                    edited,
                }
            })
            .collect())
    }

    /// Keys of a section that no field covers, as dotted paths
    ///
    /// These are re-emitted verbatim whenever the section is submitted. A
    /// non-object value where fields expect an object is listed too, unless
    /// a pending edit beneath it will replace it.
    pub fn passthrough_keys(&self, section: &str) -> Result<Vec<String>, FormError> {
        let section = schema::section(section)
            .ok_or_else(|| FormError::UnknownSection(section.to_string()))?;
        let fields: Vec<&FieldSpec> = schema::section_fields(section.name).collect();
        let mut keys = Vec::new();

        if let Some(subtree) = self.document.section(section.name) {
            collect_passthrough(subtree, &mut Vec::new(), &fields, &mut keys);
        }

        let edited_keys: Vec<String> = fields
            .iter()
            .filter(|field| self.edits.contains_key(&field.id()))
            .map(|field| field.key())
            .collect();
        keys.retain(|key| {
            let parent = format!("{key}.");
            !edited_keys.iter().any(|edited| edited.starts_with(&parent))
        });

        Ok(keys)
    }

    /// Record a user-supplied value for a field
    ///
    /// Setting a field back to the value the document holds drops the edit.
    pub fn apply_edit(&mut self, field_id: &str, value: FieldValue) -> Result<(), FormError> {
        let field =
            schema::field(field_id).ok_or_else(|| FormError::UnknownField(field_id.to_string()))?;
        let value = validate(field, value)?;

        let current = self
            .document
            .section(field.section)
            .and_then(|s| get_path(s, field.path))
            .and_then(|raw| FieldValue::from_document(field.kind, raw));

        if current.as_ref() == Some(&value) {
            self.edits.remove(field_id);
        } else {
            self.edits.insert(field_id.to_string(), value);
        }

        Ok(())
    }

    pub fn edited_sections(&self) -> BTreeSet<&'static str> {
        self.edits
            .keys()
            .filter_map(|id| schema::field(id))
            .map(|field| field.section)
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.edits.is_empty()
    }

    pub fn discard_edits(&mut self) {
        self.edits.clear();
    }

    /// Build the update for the requested sections
    ///
    /// Each section starts from the document subtree (or an empty object if
    /// the server sent none), receives the pending edits, and gets defaults
    /// for fields the document lacks. Everything else in the subtree is kept
    /// as is, including a non-object value sitting where fields expect an
    /// object; only an edit beneath it replaces it. Sections not requested
    /// are left out of the payload.
    pub fn assemble_payload<'a>(
        &self,
        sections: impl IntoIterator<Item = &'a str>,
    ) -> Result<UpdatePayload, FormError> {
        let mut payload = UpdatePayload::default();

        for name in sections {
            let Some(section) = schema::section(name) else {
                let raw = self
                    .document
                    .as_map()
                    .get(name)
                    .ok_or_else(|| FormError::UnknownSection(name.to_string()))?;
                payload.insert(name, raw.clone());
                continue;
            };

            let mut subtree = self
                .document
                .section(section.name)
                .cloned()
                .unwrap_or_default();

            for field in schema::section_fields(section.name) {
                if let Some(value) = self.edits.get(&field.id()) {
                    set_path(&mut subtree, field.path, value.to_json());
                }
            }

            for field in schema::section_fields(section.name) {
                if get_path(&subtree, field.path).is_none()
                    && !beneath_non_object(&subtree, field.path)
                {
                    set_path(
                        &mut subtree,
                        field.path,
                        FieldValue::default_for(field.kind).to_json(),
                    );
                }
            }

            payload.insert(section.name, Value::Object(subtree));
        }

        Ok(payload)
    }
}

fn validate(field: &FieldSpec, value: FieldValue) -> Result<FieldValue, FormError> {
    match (field.kind, value) {
        (FieldKind::Boolean, value @ FieldValue::Boolean(_)) => Ok(value),
        (FieldKind::Integer, value @ FieldValue::Integer(_)) => Ok(value),
        (FieldKind::Integer, FieldValue::Float(f)) if whole_number(f).is_some() => {
            Ok(FieldValue::Integer(f as i64))
        }
        (FieldKind::Float, FieldValue::Float(f)) if f.is_finite() => Ok(FieldValue::Float(f)),
        (FieldKind::Float, FieldValue::Integer(i)) => Ok(FieldValue::Float(i as f64)),
        (FieldKind::String, value @ FieldValue::String(_)) => Ok(value),
        (FieldKind::Enum(options), FieldValue::String(s)) => {
            if options.iter().any(|option| *option == s) {
                Ok(FieldValue::String(s))
            } else {
                Err(FormError::InvalidOption {
                    field: field.id(),
                    value: s,
                    options,
                })
            }
        }
        (kind, value) => Err(FormError::KindMismatch {
            field: field.id(),
            expected: kind.name(),
            actual: value.type_name(),
        }),
    }
}

/// True if a parent key of `path` holds something other than an object
fn beneath_non_object(section: &Map<String, Value>, path: &[&str]) -> bool {
    (1..path.len()).any(|len| get_path(section, &path[..len]).is_some_and(|value| !value.is_object()))
}

fn collect_passthrough<'a>(
    map: &'a Map<String, Value>,
    prefix: &mut Vec<&'a str>,
    fields: &[&FieldSpec],
    out: &mut Vec<String>,
) {
    for (key, value) in map {
        prefix.push(key);

        let covered = fields.iter().any(|field| field.path == prefix.as_slice());
        let is_parent = fields
            .iter()
            .any(|field| field.path.len() > prefix.len() && field.path[..prefix.len()] == prefix[..]);

        match value {
            _ if covered => {}
            Value::Object(child) if is_parent => collect_passthrough(child, prefix, fields, out),
            _ => out.push(prefix.join(".")),
        }

        prefix.pop();
    }
}
