use crate::error::{DossierError, Result};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The batch jobs a template can drive. Each kind owns one template directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Unpack,
    Prune,
    Extract,
    Convert,
    Rename,
    Merge,
}

impl JobKind {
    pub const ALL: [JobKind; 6] = [
        JobKind::Unpack,
        JobKind::Prune,
        JobKind::Extract,
        JobKind::Convert,
        JobKind::Rename,
        JobKind::Merge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Unpack => "unpack",
            JobKind::Prune => "prune",
            JobKind::Extract => "extract",
            JobKind::Convert => "convert",
            JobKind::Rename => "rename",
            JobKind::Merge => "merge",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        JobKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown job kind '{}'. Expected one of: unpack, prune, extract, convert, rename, merge",
                    s
                )
            })
    }
}

/// A named group of match patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub label: String,
    pub patterns: Vec<String>,
}

/// Categories in the order the template author declared them.
///
/// Serialized as a JSON object so template files stay hand-editable, but
/// deserialized into a vector so declaration order survives. Duplicate labels
/// are rejected while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    categories: Vec<Category>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<S: Into<String>>(&mut self, label: S, patterns: Vec<String>) {
        self.categories.push(Category {
            label: label.into(),
            patterns,
        });
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Category> {
        self.categories.iter()
    }

    pub fn get(&self, label: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.label == label)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Category;
    type IntoIter = std::slice::Iter<'a, Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.categories.iter()
    }
}

impl Serialize for RuleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.label, &category.patterns)?;
        }
        map.end()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PatternList {
    One(String),
    Many(Vec<String>),
}

impl From<PatternList> for Vec<String> {
    fn from(list: PatternList) -> Self {
        match list {
            PatternList::One(pattern) => vec![pattern],
            PatternList::Many(patterns) => patterns,
        }
    }
}

struct RuleSetVisitor;

impl<'de> Visitor<'de> for RuleSetVisitor {
    type Value = RuleSet;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an object mapping category labels to pattern lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<RuleSet, A::Error> {
        let mut rules = RuleSet::new();
        while let Some((label, patterns)) = access.next_entry::<String, PatternList>()? {
            if rules.get(&label).is_some() {
                return Err(de::Error::custom(format!(
                    "duplicate category label '{}'",
                    label
                )));
            }
            rules.push(label, patterns.into());
        }
        Ok(rules)
    }
}

impl<'de> Deserialize<'de> for RuleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(RuleSetVisitor)
    }
}

/// A named, versioned rule template for one job kind.
///
/// Keys that are not part of the fixed layout are kept in `options`: the
/// job reads the ones it recognizes and ignores the rest, and they survive a
/// load/save round trip untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub rules: RuleSet,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Template {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            version: default_version(),
            metadata: Map::new(),
            rules: RuleSet::new(),
            options: Map::new(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_metadata<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_category(mut self, label: &str, patterns: &[&str]) -> Self {
        self.rules
            .push(label, patterns.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_option<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    pub fn bool_option(&self, key: &str, default: bool) -> Result<bool> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(value)) => Ok(*value),
            Some(_) => Err(self.option_type_error(key, "a boolean")),
        }
    }

    pub fn string_option(&self, key: &str, default: &str) -> Result<String> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(value)) => Ok(value.clone()),
            Some(_) => Err(self.option_type_error(key, "a string")),
        }
    }

    pub fn string_list_option(&self, key: &str, default: &[&str]) -> Result<Vec<String>> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(default.iter().map(|s| s.to_string()).collect()),
            Some(value) => {
                as_string_list(value).ok_or_else(|| self.option_type_error(key, "an array of strings"))
            }
        }
    }

    pub fn string_map_option(&self, key: &str) -> Result<BTreeMap<String, String>> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    _ => Err(self.option_type_error(key, "an object of strings")),
                })
                .collect(),
            Some(_) => Err(self.option_type_error(key, "an object of strings")),
        }
    }

    pub fn string_list_map_option(&self, key: &str) -> Result<BTreeMap<String, Vec<String>>> {
        match self.options.get(key) {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(k, v)| {
                    as_string_list(v)
                        .map(|list| (k.clone(), list))
                        .ok_or_else(|| self.option_type_error(key, "an object of string arrays"))
                })
                .collect(),
            Some(_) => Err(self.option_type_error(key, "an object of string arrays")),
        }
    }

    pub fn summary(&self, path: PathBuf) -> TemplateSummary {
        TemplateSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
            categories: self.rules.len(),
            path,
        }
    }

    fn option_type_error(&self, key: &str, expected: &str) -> DossierError {
        DossierError::TemplateValidation {
            message: format!(
                "option '{}' in template '{}' must be {}",
                key, self.name, expected
            ),
        }
    }
}

fn as_string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// What `list_available` reports for each stored template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateSummary {
    pub name: String,
    pub description: String,
    pub version: String,
    pub categories: usize,
    pub path: PathBuf,
}
