use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

pub type Fields = serde_json::Map<String, Value>;

/// Marker key of the server-timestamp sentinel.
pub const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

/// Placeholder the store replaces with its own clock at write time.
pub fn server_timestamp() -> Value {
    let mut marker = Fields::new();
    marker.insert(SERVER_TIMESTAMP_KEY.to_string(), Value::Bool(true));
    Value::Object(marker)
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.len() == 1 && obj.get(SERVER_TIMESTAMP_KEY) == Some(&Value::Bool(true)))
        .unwrap_or(false)
}

/// Serialize a struct into top-level document fields.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, serde_json::Error> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(<serde_json::Error as serde::ser::Error>::custom(
            "document must serialize to an object",
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.fields.clone()))
    }
}
