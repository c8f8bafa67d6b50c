//! Table Storage entity models.
//!
//! Two shapes are written to the table store: [`MyEntity`], a typed struct
//! serialized as plain JSON, and [`EdmEntity`], a property map whose values
//! carry explicit `@odata.type` annotations.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Row key of the raw entity; the table scenario queries by it.
pub const RAW_ENTITY_ROW_KEY: &str = "RowKey";

/// Row key of the typed entity.
pub const TYPED_ENTITY_ROW_KEY: &str = "RowKey1";

/// Product entity stored in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MyEntity {
    pub partition_key: String,
    pub row_key: String,
    pub stock: i32,
    pub price: f64,
    pub comments: String,
    pub on_sale: bool,
    pub reduced_price: f64,
    pub purchase_date: DateTime<Utc>,
    #[serde(rename = "BinaryRepresentation", with = "base64_bytes")]
    pub binary_rep: Vec<u8>,
}

impl MyEntity {
    /// Builds the typed sample entity under `partition_key`.
    pub fn sample(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: TYPED_ENTITY_ROW_KEY.to_string(),
            stock: 15,
            price: 9.99,
            comments: "great product".to_string(),
            on_sale: true,
            reduced_price: 7.99,
            purchase_date: sample_purchase_date(),
            binary_rep: b"Bytesliceinfo".to_vec(),
        }
    }
}

/// Purchase date shared by both sample entities: 2021-08-21T01:01:00Z.
pub fn sample_purchase_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 8, 21, 1, 1, 0)
        .single()
        .unwrap_or_default()
}

/// Entity Data Model property value.
#[derive(Debug, Clone, PartialEq)]
pub enum EdmValue {
    String(String),
    Bool(bool),
    Int32(i32),
    Double(f64),
    DateTime(DateTime<Utc>),
    Binary(Vec<u8>),
}

impl EdmValue {
    /// Returns the `@odata.type` annotation, or `None` for types the service
    /// infers from plain JSON.
    pub fn odata_type(&self) -> Option<&'static str> {
        match self {
            EdmValue::String(_) | EdmValue::Bool(_) | EdmValue::Int32(_) => None,
            EdmValue::Double(_) => Some("Edm.Double"),
            EdmValue::DateTime(_) => Some("Edm.DateTime"),
            EdmValue::Binary(_) => Some("Edm.Binary"),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            EdmValue::String(s) => Value::String(s.clone()),
            EdmValue::Bool(b) => Value::Bool(*b),
            EdmValue::Int32(i) => Value::from(*i),
            EdmValue::Double(d) => Value::from(*d),
            EdmValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            EdmValue::Binary(bytes) => Value::String(BASE64.encode(bytes)),
        }
    }
}

impl From<&str> for EdmValue {
    fn from(s: &str) -> Self {
        EdmValue::String(s.to_string())
    }
}

impl From<bool> for EdmValue {
    fn from(b: bool) -> Self {
        EdmValue::Bool(b)
    }
}

impl From<i32> for EdmValue {
    fn from(i: i32) -> Self {
        EdmValue::Int32(i)
    }
}

impl From<f64> for EdmValue {
    fn from(d: f64) -> Self {
        EdmValue::Double(d)
    }
}

impl From<DateTime<Utc>> for EdmValue {
    fn from(dt: DateTime<Utc>) -> Self {
        EdmValue::DateTime(dt)
    }
}

/// A raw table entity: keys plus an ordered list of EDM-typed properties.
#[derive(Debug, Clone, PartialEq)]
pub struct EdmEntity {
    pub partition_key: String,
    pub row_key: String,
    pub properties: Vec<(String, EdmValue)>,
}

impl EdmEntity {
    /// Creates an entity with no properties.
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: Vec::new(),
        }
    }

    /// Adds a property, replacing any earlier value under the same name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<EdmValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.properties.push((name, value)),
        }
        self
    }

    /// Returns the property value under `name`.
    pub fn get(&self, name: &str) -> Option<&EdmValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Builds the raw sample entity under `partition_key`.
    pub fn sample(partition_key: impl Into<String>) -> Self {
        EdmEntity::new(partition_key, RAW_ENTITY_ROW_KEY)
            .with("Stock", 15)
            .with("Price", 9.99)
            .with("Comments", "great product")
            .with("OnSale", true)
            .with("ReducedPrice", 7.99)
            .with("PurchaseDate", sample_purchase_date())
            .with("BinaryRepresentation", EdmValue::Binary(b"Bytesliceinfo".to_vec()))
    }
}

impl Serialize for EdmEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let annotated = self
            .properties
            .iter()
            .filter(|(_, v)| v.odata_type().is_some())
            .count();
        let mut map = serializer.serialize_map(Some(2 + self.properties.len() + annotated))?;
        map.serialize_entry("PartitionKey", &self.partition_key)?;
        map.serialize_entry("RowKey", &self.row_key)?;
        for (name, value) in &self.properties {
            if let Some(odata_type) = value.odata_type() {
                map.serialize_entry(&format!("{}@odata.type", name), odata_type)?;
            }
            map.serialize_entry(name, &value.to_json())?;
        }
        map.end()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}
