//! Rule, stage and plugin descriptors.
//!
//! These are read-only descriptors loaded from a [`Configuration`](crate::Configuration).
//! Stage and plugin options are opaque JSON values: the orchestrator passes them to
//! the named collaborator without looking inside.

use std::fmt;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A regular expression tested against a file's root-relative path (`/` separated).
#[derive(Clone)]
pub struct MatchPattern {
    regex: Regex,
}

impl MatchPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for MatchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MatchPattern").field(&self.as_str()).finish()
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for MatchPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MatchPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        MatchPattern::new(&source)
            .map_err(|err| serde::de::Error::custom(format!("invalid rule pattern `{source}`: {err}")))
    }
}

/// Routes files whose path matches `test` through an ordered list of stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub test: MatchPattern,

    /// Path prefixes the file must live under (empty = everywhere)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<PathBuf>,

    /// Path prefixes the file must not live under
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<PathBuf>,

    #[serde(rename = "use", default)]
    pub stages: Vec<StageRef>,

    /// Output path template for matched files, overriding `output.path`/`output.assets`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl Rule {
    pub fn new(test: MatchPattern) -> Self {
        Self {
            test,
            include: Vec::new(),
            exclude: Vec::new(),
            stages: Vec::new(),
            output: None,
        }
    }

    pub fn include(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.include.push(prefix.into());
        self
    }

    pub fn exclude(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.exclude.push(prefix.into());
        self
    }

    pub fn stage(mut self, stage: StageRef) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn output(mut self, template: impl Into<String>) -> Self {
        self.output = Some(template.into());
        self
    }
}

/// A per-file transform step: collaborator name plus its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RefRepr")]
pub struct StageRef {
    pub name: String,
    pub options: Value,
}

/// A whole-build plugin: collaborator name plus its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RefRepr")]
pub struct PluginRef {
    pub name: String,
    pub options: Value,
}

macro_rules! collaborator_ref {
    ($ty:ident) => {
        impl $ty {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    options: Value::Object(Map::new()),
                }
            }

            pub fn with_options(mut self, options: Value) -> Self {
                self.options = normalize_options(options);
                self
            }
        }

        impl From<RefRepr> for $ty {
            fn from(repr: RefRepr) -> Self {
                match repr {
                    RefRepr::Name(name) => Self::new(name),
                    RefRepr::Full { name, options } => Self::new(name).with_options(options),
                }
            }
        }
    };
}

collaborator_ref!(StageRef);
collaborator_ref!(PluginRef);

/// Accepts both `"babel"` and `{ name = "babel", options = { ... } }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RefRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        options: Value,
    },
}

fn normalize_options(options: Value) -> Value {
    match options {
        Value::Null => Value::Object(Map::new()),
        other => other,
    }
}
