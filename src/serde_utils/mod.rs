//! Serialization utilities for common patterns
//!
//! Model-generated documents are loose about scalar types: a plan may say
//! `output: 42` where a string is expected, and a JSON suggestion may send
//! `"temperature": "0.4"`. The helpers here accept either form.

pub mod scalar;

// Note: the scalar helpers are not re-exported because they should be used with the module pattern:
// #[serde(with = "crate::serde_utils::scalar::text")]
