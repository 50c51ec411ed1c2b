//! Ordered builder for `multipart/form-data` request bodies.
//!
//! Requests are encoded into [`FormFields`] first so the exact set of parts can be
//! inspected, then converted into a [`reqwest::multipart::Form`] when sent.
//! Optional values are omitted entirely rather than sent empty: the API treats the
//! presence of a part as "set".

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::fmt::Display;

/// Value of a single form part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    /// Plain text part
    Text(String),
    /// Opaque binary part
    Bytes(Bytes),
}

impl FormValue {
    /// Text content, if this is a text part.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bytes(_) => None,
        }
    }

    /// Binary content, if this is a binary part.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            Self::Text(_) => None,
        }
    }
}

/// Builder for assembling form parts in insertion order.
#[derive(Debug, Default, Clone)]
pub struct FormFields {
    parts: Vec<(String, FormValue)>,
}

impl FormFields {
    /// Create a new, empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { parts: Vec::new() }
    }

    /// Append a required text part.
    pub fn push<T>(&mut self, name: impl Into<String>, value: T)
    where
        T: Display,
    {
        self.parts
            .push((name.into(), FormValue::Text(value.to_string())));
    }

    /// Append a text part when the value is present.
    pub fn push_opt<T>(&mut self, name: impl Into<String>, value: Option<T>)
    where
        T: Display,
    {
        if let Some(value) = value {
            self.push(name, value);
        }
    }

    /// Append a text part when the value is present and non-empty.
    pub fn push_opt_str(&mut self, name: impl Into<String>, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.push(name, value);
        }
    }

    /// Append a binary part.
    pub fn push_bytes(&mut self, name: impl Into<String>, value: Bytes) {
        self.parts.push((name.into(), FormValue::Bytes(value)));
    }

    /// First value recorded under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.parts
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Convenience accessor for a text part.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FormValue::as_text)
    }

    /// Returns true if a part named `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Part names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.parts.iter().map(|(key, _)| key.as_str()).collect()
    }

    /// Iterate over all parts in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.parts.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if no parts have been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Convert into a multipart form, preserving part order.
    ///
    /// Binary parts carry the part name as their file name.
    #[must_use]
    pub fn into_multipart(self) -> Form {
        self.parts
            .into_iter()
            .fold(Form::new(), |form, (name, value)| match value {
                FormValue::Text(text) => form.text(name, text),
                FormValue::Bytes(bytes) => {
                    let length = bytes.len() as u64;
                    let part = Part::stream_with_length(bytes, length).file_name(name.clone());
                    form.part(name, part)
                }
            })
    }
}
