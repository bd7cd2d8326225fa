//! Qualified names and localized text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A name qualified by a namespace index. Text form: `ns:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct QualifiedName {
    /// Namespace index of the name.
    #[serde(default, rename = "namespaceIndex")]
    pub namespace_index: u16,
    /// The unqualified name.
    #[serde(default)]
    pub name: String,
}

impl QualifiedName {
    /// Creates a qualified name.
    pub fn new(ns: u16, name: impl Into<String>) -> Self {
        Self { namespace_index: ns, name: name.into() }
    }

    /// Returns `true` when the name text is empty.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace_index == 0 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.namespace_index, self.name)
        }
    }
}

impl FromStr for QualifiedName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(pos) = s.find(':') {
            if let Ok(ns) = s[..pos].parse::<u16>() {
                return Ok(Self::new(ns, &s[pos + 1..]));
            }
        }
        Ok(Self::new(0, s))
    }
}

/// Human-readable text with a locale tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct LocalizedText {
    /// The text.
    #[serde(default)]
    pub text: String,
    /// RFC 3066 locale, e.g. `en`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub locale: String,
}

impl LocalizedText {
    /// Creates localized text.
    pub fn new(text: impl Into<String>, locale: impl Into<String>) -> Self {
        Self { text: text.into(), locale: locale.into() }
    }

    /// Creates text in the `en` locale.
    pub fn en(text: impl Into<String>) -> Self {
        Self::new(text, "en")
    }
}

impl fmt::Display for LocalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_text_form() {
        assert_eq!(QualifiedName::new(0, "Root").to_string(), "Root");
        assert_eq!(QualifiedName::new(2, "Plc1").to_string(), "2:Plc1");
        let parsed: QualifiedName = "2:Plc1".parse().unwrap();
        assert_eq!(parsed, QualifiedName::new(2, "Plc1"));
        let plain: QualifiedName = "Root".parse().unwrap();
        assert_eq!(plain, QualifiedName::new(0, "Root"));
    }
}
