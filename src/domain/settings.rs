use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

pub const MAX_BLUR_PX: u32 = 50;

/// Every settings key the filter understands, in the order they are shown.
pub const SETTING_KEYS: [&str; 7] = [
    "enabled",
    "enableBlur",
    "blurAmount",
    "keywords",
    "hideShorts",
    "enableAI",
    "classifierCredential",
];

/// A complete settings snapshot. Snapshots are replaced wholesale, never
/// patched field by field while a sweep is reading them.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfiguration {
    pub enabled: bool,
    #[serde(rename = "enableBlur")]
    pub blur_enabled: bool,
    #[serde(rename = "blurAmount")]
    pub blur_amount_px: u32,
    #[serde(rename = "hideShorts")]
    pub hide_short_form: bool,
    pub keywords: KeywordSet,
    #[serde(rename = "enableAI")]
    pub classifier_enabled: bool,
    #[serde(
        rename = "classifierCredential",
        serialize_with = "serialize_credential",
        deserialize_with = "deserialize_credential"
    )]
    pub classifier_credential: Option<String>,
}

impl Default for FilterConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            blur_enabled: true,
            blur_amount_px: 10,
            hide_short_form: true,
            keywords: KeywordSet::default(),
            classifier_enabled: true,
            classifier_credential: None,
        }
    }
}

impl fmt::Debug for FilterConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterConfiguration")
            .field("enabled", &self.enabled)
            .field("blur_enabled", &self.blur_enabled)
            .field("blur_amount_px", &self.blur_amount_px)
            .field("hide_short_form", &self.hide_short_form)
            .field("keywords", &self.keywords)
            .field("classifier_enabled", &self.classifier_enabled)
            .field(
                "classifier_credential",
                &self.classifier_credential.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl FilterConfiguration {
    pub fn validate(&self) -> Result<(), InvalidSettings> {
        if self.blur_amount_px > MAX_BLUR_PX {
            return Err(InvalidSettings::BlurOutOfRange {
                value: self.blur_amount_px,
                max: MAX_BLUR_PX,
            });
        }
        Ok(())
    }

    /// Lays the given keys over this snapshot and returns the validated
    /// result. Keys not present keep their current value.
    pub fn overlay(&self, changes: &Map<String, Value>) -> Result<Self, InvalidSettings> {
        if let Some(key) = changes.keys().find(|k| !SETTING_KEYS.contains(&k.as_str())) {
            return Err(InvalidSettings::UnknownKey(key.clone()));
        }
        let mut merged = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(err) => return Err(InvalidSettings::Malformed(err.to_string())),
        };
        for (key, value) in changes {
            merged.insert(key.clone(), value.clone());
        }
        let next: FilterConfiguration = serde_json::from_value(Value::Object(merged))
            .map_err(|err| InvalidSettings::Malformed(err.to_string()))?;
        next.validate()?;
        Ok(next)
    }

    pub fn classifier_access(&self) -> ClassifierAccess<'_> {
        ClassifierAccess {
            enabled: self.classifier_enabled,
            credential: self.classifier_credential.as_deref(),
        }
    }
}

/// What the classifier client needs to know from the current settings.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierAccess<'a> {
    pub enabled: bool,
    pub credential: Option<&'a str>,
}

impl<'a> ClassifierAccess<'a> {
    pub fn usable_credential(&self) -> Option<&'a str> {
        if !self.enabled {
            return None;
        }
        self.credential.map(str::trim).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum InvalidSettings {
    #[error("blurAmount {value}px is outside 0..={max}px")]
    BlurOutOfRange { value: u32, max: u32 },
    #[error("unknown settings key {0:?}")]
    UnknownKey(String),
    #[error("malformed settings: {0}")]
    Malformed(String),
}

/// Keywords compared case-insensitively. Insertion order is kept only so the
/// list renders stably; it has no effect on matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct KeywordSet {
    items: Vec<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a trimmed keyword. Returns `false` for blanks and duplicates.
    pub fn insert(&mut self, keyword: &str) -> bool {
        let keyword = keyword.trim();
        if keyword.is_empty() || self.contains(keyword) {
            return false;
        }
        self.items.push(keyword.to_string());
        true
    }

    pub fn remove(&mut self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        let before = self.items.len();
        self.items.retain(|k| k.to_lowercase() != needle);
        before != self.items.len()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        self.items.iter().any(|k| k.to_lowercase() == needle)
    }

    /// First keyword that occurs in `text`, ignoring case.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.items
            .iter()
            .find(|k| haystack.contains(&k.to_lowercase()))
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<String>> for KeywordSet {
    fn from(values: Vec<String>) -> Self {
        let mut set = KeywordSet::new();
        for value in &values {
            set.insert(value);
        }
        set
    }
}

impl From<KeywordSet> for Vec<String> {
    fn from(set: KeywordSet) -> Self {
        set.items
    }
}

impl<S: AsRef<str>> FromIterator<S> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = KeywordSet::new();
        for value in iter {
            set.insert(value.as_ref());
        }
        set
    }
}

fn serialize_credential<S: Serializer>(value: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(value.as_deref().unwrap_or(""))
}

fn deserialize_credential<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}
