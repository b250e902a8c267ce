use chrono::FixedOffset;
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serializer};

/// Serialize an optional offset as `+hh:mm`.
pub fn serialize_offset<S>(offset: &Option<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match offset {
        Some(offset) => serializer.serialize_str(&offset.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Serialize an optional property table as a flat JSON object.
pub fn serialize_properties<S>(
    properties: &Option<IndexMap<String, String>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match properties {
        Some(properties) => {
            let mut map = serializer.serialize_map(Some(properties.len()))?;
            for (k, v) in properties {
                map.serialize_entry(k, v)?;
            }
            map.end()
        }
        None => serializer.serialize_none(),
    }
}

/// Accept `+hh:mm` offsets or well-known abbreviations such as `UTC`.
pub fn deserialize_zone<'de, D>(deserializer: D) -> Result<FixedOffset, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    crate::config::parse_zone(&text).map_err(serde::de::Error::custom)
}
