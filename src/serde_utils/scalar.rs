//! Lenient scalar deserialization
//!
//! `text` turns any YAML/JSON scalar into a `String`, `number` turns a number
//! or a numeric string into an `f64`.

use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

/// Scalars rendered as text: strings pass through, numbers and booleans are formatted
pub mod text {
    use super::*;

    struct TextVisitor;

    impl<'de> Visitor<'de> for TextVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number or boolean")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_bool<E: de::Error>(self, value: bool) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
            Ok(value.to_string())
        }

        // `key:` with nothing after it
        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(TextVisitor)
    }

    pub fn serialize<S>(value: &str, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    /// Like `deserialize`, but an empty or null scalar becomes `None`
    pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = deserializer.deserialize_any(TextVisitor)?;
        Ok(Some(value).filter(|v| !v.is_empty()))
    }

    #[derive(serde::Deserialize)]
    struct Item(#[serde(deserialize_with = "deserialize")] String);

    /// A sequence of scalars, each rendered as text; null is an empty list
    pub fn deserialize_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items: Option<Vec<Item>> = serde::Deserialize::deserialize(deserializer)?;
        Ok(items.unwrap_or_default().into_iter().map(|item| item.0).collect())
    }
}

/// Numbers that may arrive as strings
pub mod number {
    use super::*;

    struct NumberVisitor;

    impl<'de> Visitor<'de> for NumberVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or a numeric string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            value.trim().parse::<f64>().map_err(de::Error::custom)
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(NumberVisitor)
    }

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(*value)
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Loose {
        #[serde(with = "super::text")]
        label: String,
        #[serde(with = "super::number")]
        amount: f64,
    }

    #[test]
    fn test_text_accepts_numbers_and_bools() {
        let parsed: Loose = serde_yaml::from_str("label: 42\namount: 1").unwrap();
        assert_eq!(parsed.label, "42");
        assert_eq!(parsed.amount, 1.0);

        let parsed: Loose = serde_yaml::from_str("label: true\namount: 0.5").unwrap();
        assert_eq!(parsed.label, "true");
    }

    #[derive(Debug, Deserialize)]
    struct Tagged {
        #[serde(default, deserialize_with = "super::text::deserialize_optional")]
        id: Option<String>,
        #[serde(default, deserialize_with = "super::text::deserialize_list")]
        tags: Vec<String>,
    }

    #[test]
    fn test_optional_and_list() {
        let parsed: Tagged = serde_yaml::from_str("id: 7\ntags: [a, 2, true]").unwrap();
        assert_eq!(parsed.id.as_deref(), Some("7"));
        assert_eq!(parsed.tags, vec!["a", "2", "true"]);

        let parsed: Tagged = serde_yaml::from_str("id:\ntags:").unwrap();
        assert_eq!(parsed.id, None);
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_number_accepts_numeric_strings() {
        let parsed: Loose = serde_json::from_str(r#"{"label": "x", "amount": " 0.25 "}"#).unwrap();
        assert_eq!(parsed.amount, 0.25);

        let err = serde_json::from_str::<Loose>(r#"{"label": "x", "amount": "warm"}"#);
        assert!(err.is_err());
    }
}
