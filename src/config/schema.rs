//! Configuration entry definitions.
//!
//! An application declares its settings as a list of [`ConfigEntry`] values.
//! Each entry has a name (also the environment variable), a typed default and
//! an optional command-line counterpart described by [`CliEntry`].

use serde::Serialize;
use std::fmt;

/// Declared type of a configuration entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    Float,
    Bool,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Str => "string",
            ValueType::Int => "integer",
            ValueType::Float => "float",
            ValueType::Bool => "boolean",
        };
        f.write_str(name)
    }
}

/// A resolved configuration value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Str(_) => ValueType::Str,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Bool(_) => ValueType::Bool,
        }
    }

    /// Parse raw text (environment or CLI) into a value of the given type.
    pub fn parse(raw: &str, value_type: ValueType) -> Option<Value> {
        let raw = raw.trim();
        match value_type {
            ValueType::Str => Some(Value::Str(raw.to_string())),
            ValueType::Int => raw.parse().ok().map(Value::Int),
            ValueType::Float => raw.parse().ok().map(Value::Float),
            ValueType::Bool => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(Value::Bool(true)),
                "0" | "false" | "no" | "off" | "" => Some(Value::Bool(false)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// How a command-line flag consumes its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CliAction {
    /// Takes a value (`--name VALUE`).
    #[default]
    Store,
    /// A switch that sets the entry to `true` when present.
    SetTrue,
}

/// Command-line counterpart of a configuration entry.
#[derive(Debug, Clone)]
pub struct CliEntry {
    /// Long flag without the leading dashes, e.g. `log-level`.
    pub long: String,

    /// Optional single-character short flag.
    pub short: Option<char>,

    /// Restricts the accepted values when set.
    pub choices: Option<Vec<String>>,

    pub action: CliAction,
}

impl CliEntry {
    pub fn new(long: impl Into<String>) -> Self {
        Self {
            long: long.into().trim_start_matches('-').to_string(),
            short: None,
            choices: None,
            action: CliAction::Store,
        }
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn switch(mut self) -> Self {
        self.action = CliAction::SetTrue;
        self
    }
}

/// Declaration of a single configuration parameter.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    /// Entry name, also used as the environment variable. Conventionally ALL-CAPS.
    pub name: String,

    /// Help text shown by `--help`.
    pub help: String,

    /// Built-in default, overridden by environment and CLI.
    pub default: Value,

    /// Declared type; environment and CLI values are parsed into it.
    pub value_type: ValueType,

    /// Optional command-line exposure.
    pub cli: Option<CliEntry>,
}

impl ConfigEntry {
    /// Declare an entry whose type is taken from its default.
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            help: String::new(),
            value_type: default.value_type(),
            default,
            cli: None,
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn cli(mut self, cli: CliEntry) -> Self {
        self.cli = Some(cli);
        self
    }
}
