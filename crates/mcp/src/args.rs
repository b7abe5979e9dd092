//! Typed extraction of tool arguments.
//!
//! Clients send `arguments` as a free-form JSON object. Handlers parse it
//! into a typed parameter struct so that a missing or mis-typed field is
//! reported by name before any filesystem work happens.

use crate::protocol::JsonObject;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess,
    value::{MapAccessDeserializer, StringDeserializer},
};
use serde_json::Value;
use thiserror::Error;

/// Errors from argument extraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentError {
    /// A required argument is absent or `null`.
    #[error("missing required argument: {name}")]
    Missing { name: String },
    /// The argument is present but has the wrong type or an unusable value.
    #[error("invalid argument {name}: {reason}")]
    Invalid { name: String, reason: String },
    /// The arguments were rejected without a single field to blame.
    #[error("invalid arguments: {0}")]
    Malformed(String),
}

/// Tool arguments as received from `mcp.call_tool`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(JsonObject);

impl From<JsonObject> for Arguments {
    fn from(map: JsonObject) -> Self {
        Self(map)
    }
}

impl Arguments {
    pub fn new(map: JsonObject) -> Self {
        Self(map)
    }

    /// Deserialize the whole argument object into `T`. Members set to
    /// `null` count as absent, so they fall back to `T`'s defaults.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ArgumentError> {
        let members: Vec<(String, Value)> = self
            .0
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut current = None;
        let parsed = T::deserialize(MapAccessDeserializer::new(Members {
            iter: members.into_iter(),
            value: None,
            current: &mut current,
        }));
        parsed.map_err(|e| match current {
            Some(name) => ArgumentError::Invalid {
                name,
                reason: e.to_string(),
            },
            None => {
                let reason = e.to_string();
                match missing_field(&reason) {
                    Some(name) => ArgumentError::Missing {
                        name: name.to_string(),
                    },
                    None => ArgumentError::Malformed(reason),
                }
            }
        })
    }
}

/// Map access over the argument members that remembers which member is
/// being deserialized, so a failure can be pinned on it.
struct Members<'a> {
    iter: std::vec::IntoIter<(String, Value)>,
    value: Option<Value>,
    current: &'a mut Option<String>,
}

impl<'de> MapAccess<'de> for Members<'_> {
    type Error = serde_json::Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        let Some((key, value)) = self.iter.next() else {
            *self.current = None;
            return Ok(None);
        };
        self.value = Some(value);
        *self.current = Some(key.clone());
        let key: StringDeserializer<serde_json::Error> = key.into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        let value = self
            .value
            .take()
            .ok_or_else(|| <Self::Error as de::Error>::custom("value requested before key"))?;
        seed.deserialize(value)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

/// Field name out of serde's "missing field `name`" message.
fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")?
        .split_once('`')
        .map(|(name, _)| name)
}
