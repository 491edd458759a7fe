use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings document as returned by the device API
///
/// Treated as untyped JSON. Reads never assume a key is present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsDocument(Map<String, Value>);

impl SettingsDocument {
    /// Section subtree, if present and an object
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(Value::as_object)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl TryFrom<Value> for SettingsDocument {
    type Error = anyhow::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(sections) => Ok(Self(sections)),
            other => anyhow::bail!(
                "failed to parse settings: expected an object, got {}",
                json_type(&other)
            ),
        }
    }
}

/// Partial settings update keyed by section
///
/// Every section present replaces the server-side section as a whole.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UpdatePayload(Map<String, Value>);

impl UpdatePayload {
    pub(crate) fn insert(&mut self, name: &str, section: Value) {
        self.0.insert(name.to_string(), section);
    }

    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.0.get(name).and_then(Value::as_object)
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Value at a key path inside a section
pub(crate) fn get_path<'a>(section: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (last, parents) = path.split_last()?;
    let mut current = section;

    for key in parents {
        current = current.get(*key)?.as_object()?;
    }

    current.get(*last)
}

/// Write a value at a key path, creating intermediate objects as needed
///
/// A non-object value sitting on an intermediate key is replaced, since the
/// nested field cannot be stored otherwise.
pub(crate) fn set_path(section: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = section;

    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));

        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }

        let Value::Object(map) = entry else {
            return;
        };
        current = map;
    }

    current.insert(last.to_string(), value);
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
