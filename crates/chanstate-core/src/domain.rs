use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{
    de::Error as _,
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::{Map, Value};

use crate::{errors::Error, Result};

/// Channel id (opaque, stable, compared by equality only).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ChannelId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Upstream payloads carry ids as JSON strings or bare numbers of any sign.
fn scalar_text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or number id, found {other}"
        ))),
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        scalar_text(d).map(Self)
    }
}

/// Message id as an arbitrary-precision non-negative integer.
///
/// Stored as canonical decimal digits (no sign, no leading zeros, `"0"` for
/// zero). Ordering is numeric: a longer canonical form is always larger, and
/// equal lengths compare digit by digit.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    /// Sentinel for "no message observed yet".
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == "0"
    }

    /// Parse decimal digits. Signs, fractions, exponents and whitespace are rejected.
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidIdentifierFormat {
                input: input.to_string(),
            });
        }
        let trimmed = input.trim_start_matches('0');
        if trimmed.is_empty() {
            return Ok(Self::zero());
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Narrow to `u128` when the value fits.
    pub fn to_u128(&self) -> Option<u128> {
        self.0.parse().ok()
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for MessageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.as_bytes().cmp(other.0.as_bytes()))
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MessageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<u64> for MessageId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<u128> for MessageId {
    fn from(n: u128) -> Self {
        Self(n.to_string())
    }
}

// Always serialized as text so JSON consumers never round it through f64.
impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let text = scalar_text(d)?;
        Self::parse(&text).map_err(D::Error::custom)
    }
}

/// Key that carried the id on the wire. Output uses the same key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum IdKey {
    #[default]
    Upper,
    Lower,
}

impl IdKey {
    fn as_str(self) -> &'static str {
        match self {
            IdKey::Upper => "ID",
            IdKey::Lower => "id",
        }
    }
}

/// A channel record: mandatory id plus whatever else upstream sent.
///
/// The id is read from `ID` (or `id` when `ID` is absent) and written back
/// under that same key, always as a string. Unknown fields are carried in
/// `extra` and written back out untouched.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel {
    id: ChannelId,
    id_key: IdKey,
    extra: Map<String, Value>,
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.extra.len() + 1))?;
        map.serialize_entry(self.id_key.as_str(), &self.id)?;
        for (k, v) in &self.extra {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let mut extra = Map::<String, Value>::deserialize(d)?;
        let (id_key, raw) = match (extra.remove("ID"), extra.remove("id")) {
            (Some(upper), lower) => {
                if let Some(lower) = lower {
                    extra.insert("id".to_string(), lower);
                }
                (IdKey::Upper, upper)
            }
            (None, Some(lower)) => (IdKey::Lower, lower),
            (None, None) => return Err(D::Error::missing_field("ID")),
        };
        let id = ChannelId::deserialize(raw).map_err(D::Error::custom)?;
        Ok(Self { id, id_key, extra })
    }
}

impl Channel {
    pub fn new(id: impl Into<ChannelId>) -> Self {
        Self {
            id: id.into(),
            id_key: IdKey::default(),
            extra: Map::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}
