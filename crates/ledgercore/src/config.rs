use crate::{Config, NodeError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Typed accessors over a node's JSON configuration
pub trait ConfigExt {
    fn get_str(&self, key: &str) -> Option<&str>;
    fn get_f64(&self, key: &str) -> Option<f64>;
    fn get_bool(&self, key: &str) -> Option<bool>;
    fn get_string_list(&self, key: &str) -> Option<Vec<String>>;
}

impl ConfigExt for Config {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    fn get_string_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key)?
            .as_array()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// Walk a dotted path (`client.documents.0.type`) into a JSON value.
/// Numeric segments index into arrays.
pub fn resolve_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

macro_rules! config_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => $tag:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $tag)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl FromStr for $name {
            type Err = NodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($tag => Ok($name::$variant),)+
                    other => Err(NodeError::Configuration(format!(
                        "unknown {} '{}', expected one of: {}",
                        $what,
                        other,
                        [$($tag),+].join(", ")
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

config_enum!(
    /// Income-tax regime selecting the slab table
    TaxRegime, "tax regime" {
        Old => "old",
        New => "new",
    }
);

config_enum!(
    /// Comparator used by CONDITION nodes
    ConditionOperator, "operator" {
        Equals => "equals",
        NotEquals => "not_equals",
        GreaterThan => "greater_than",
        LessThan => "less_than",
        Contains => "contains",
    }
);

config_enum!(
    SheetOperation, "sheet operation" {
        Append => "append",
        Update => "update",
        Clear => "clear",
        Read => "read",
    }
);

config_enum!(
    TransformOperation, "transformation" {
        Copy => "copy",
        Format => "format",
        Calculate => "calculate",
    }
);
