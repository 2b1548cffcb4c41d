use serde::{Deserialize, Deserializer};

/// The node (and older clients) spell booleans as `"true"`/`"false"` strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    String(String),
}

fn parse_bool<E: serde::de::Error>(value: BoolOrString) -> Result<bool, E> {
    match value {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::String(s) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(E::custom(format!("expected boolean, got {:?}", other))),
        },
    }
}

pub(crate) fn bool_from_any<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    parse_bool(BoolOrString::deserialize(deserializer)?)
}

pub(crate) fn opt_bool_from_any<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<BoolOrString>::deserialize(deserializer)? {
        Some(value) => parse_bool(value).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn is_false(value: &bool) -> bool {
    !*value
}
