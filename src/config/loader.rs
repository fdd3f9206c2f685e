//! Configuration resolution.
//!
//! Values are resolved in ascending order of precedence:
//! built-in default, environment variable, command-line argument.

use clap::builder::{BoolishValueParser, PossibleValuesParser};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::collections::BTreeMap;
use std::ffi::OsString;
use thiserror::Error;

use crate::config::schema::{CliAction, ConfigEntry, Value, ValueType};
use crate::config::validation::{validate_entries, ValidationError};

/// Error type for configuration resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("invalid value `{value}` for `{name}`: expected {expected}")]
    InvalidValue {
        name: String,
        value: String,
        expected: ValueType,
    },

    #[error("unknown configuration entry `{0}`")]
    Unknown(String),

    #[error("`{name}` is a {actual}, not a {requested}")]
    TypeMismatch {
        name: String,
        requested: ValueType,
        actual: ValueType,
    },

    #[error(transparent)]
    Cli(#[from] clap::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The resolved configuration of an application.
///
/// Built once at startup; shared read-only (behind an `Arc`) once the
/// orchestrator starts.
#[derive(Debug, Clone)]
pub struct Config {
    app_name: String,
    description: String,
    entries: Vec<ConfigEntry>,
    values: BTreeMap<String, Value>,
}

impl Config {
    /// Validate the entries and resolve defaults plus process environment.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    pub fn new(
        app_name: impl Into<String>,
        description: impl Into<String>,
        entries: Vec<ConfigEntry>,
    ) -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::with_env(app_name, description, entries, |name| std::env::var(name).ok())
    }

    /// Like [`Config::new`], reading environment values through `lookup`.
    pub fn with_env<F>(
        app_name: impl Into<String>,
        description: impl Into<String>,
        entries: Vec<ConfigEntry>,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        validate_entries(&entries).map_err(ConfigError::Validation)?;

        let mut values = BTreeMap::new();
        for entry in &entries {
            let value = match lookup(&entry.name) {
                Some(raw) => Value::parse(&raw, entry.value_type).ok_or_else(|| {
                    ConfigError::InvalidValue {
                        name: entry.name.clone(),
                        value: raw.clone(),
                        expected: entry.value_type,
                    }
                })?,
                None => entry.default.clone(),
            };
            values.insert(entry.name.clone(), value);
        }

        Ok(Self {
            app_name: app_name.into(),
            description: description.into(),
            entries,
            values,
        })
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// Overwrite values by name. Names must be declared entries.
    ///
    /// All or nothing: if any parameter is rejected, no value changes.
    pub fn apply_parameters<I>(&mut self, parameters: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut checked = Vec::new();
        for (name, value) in parameters {
            let entry = self
                .entries
                .iter()
                .find(|e| e.name == name)
                .ok_or_else(|| ConfigError::Unknown(name.clone()))?;
            if value.value_type() != entry.value_type {
                return Err(ConfigError::TypeMismatch {
                    name,
                    requested: entry.value_type,
                    actual: value.value_type(),
                });
            }
            checked.push((name, value));
        }
        self.values.extend(checked);
        Ok(())
    }

    /// Parse command-line arguments (without the program name) and apply them.
    pub fn apply_cli_args<I, T>(&mut self, argv: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args = std::iter::once(OsString::from(&self.app_name))
            .chain(argv.into_iter().map(Into::into));
        let matches = self.command().try_get_matches_from(args)?;
        let parameters = self.cli_values(&matches);
        self.apply_parameters(parameters)
    }

    /// Build the argument parser from the declared entries.
    fn command(&self) -> Command {
        let mut command = Command::new(self.app_name.clone()).about(self.description.clone());

        for entry in &self.entries {
            let Some(cli) = &entry.cli else { continue };

            let mut arg = Arg::new(entry.name.clone())
                .long(cli.long.clone())
                .help(entry.help.clone());
            if let Some(short) = cli.short {
                arg = arg.short(short);
            }

            arg = match (cli.action, &cli.choices, entry.value_type) {
                (CliAction::SetTrue, _, _) => arg.action(ArgAction::SetTrue),
                (CliAction::Store, Some(choices), _) => arg
                    .action(ArgAction::Set)
                    .value_parser(PossibleValuesParser::new(choices.clone())),
                (CliAction::Store, None, ValueType::Int) => {
                    arg.action(ArgAction::Set).value_parser(clap::value_parser!(i64))
                }
                (CliAction::Store, None, ValueType::Float) => {
                    arg.action(ArgAction::Set).value_parser(clap::value_parser!(f64))
                }
                (CliAction::Store, None, ValueType::Bool) => {
                    arg.action(ArgAction::Set).value_parser(BoolishValueParser::new())
                }
                (CliAction::Store, None, ValueType::Str) => arg.action(ArgAction::Set),
            };

            command = command.arg(arg);
        }

        command
    }

    /// Collect the values that were actually given on the command line.
    fn cli_values(&self, matches: &ArgMatches) -> Vec<(String, Value)> {
        let mut values = Vec::new();

        for entry in &self.entries {
            let Some(cli) = &entry.cli else { continue };
            let id = entry.name.as_str();

            let value = match cli.action {
                CliAction::SetTrue => matches.get_flag(id).then_some(Value::Bool(true)),
                CliAction::Store if cli.choices.is_some() => matches
                    .get_one::<String>(id)
                    .and_then(|raw| Value::parse(raw, entry.value_type)),
                CliAction::Store => match entry.value_type {
                    ValueType::Int => matches.get_one::<i64>(id).map(|v| Value::Int(*v)),
                    ValueType::Float => matches.get_one::<f64>(id).map(|v| Value::Float(*v)),
                    ValueType::Bool => matches.get_one::<bool>(id).map(|v| Value::Bool(*v)),
                    ValueType::Str => matches.get_one::<String>(id).cloned().map(Value::Str),
                },
            };

            if let Some(value) = value {
                values.push((entry.name.clone(), value));
            }
        }

        values
    }

    /// Get the value of an entry, or `None` if it is not declared.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn lookup(&self, name: &str) -> Result<&Value, ConfigError> {
        self.get(name)
            .ok_or_else(|| ConfigError::Unknown(name.to_string()))
    }

    fn mismatch(name: &str, requested: ValueType, actual: &Value) -> ConfigError {
        ConfigError::TypeMismatch {
            name: name.to_string(),
            requested,
            actual: actual.value_type(),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str, ConfigError> {
        match self.lookup(name)? {
            Value::Str(s) => Ok(s),
            other => Err(Self::mismatch(name, ValueType::Str, other)),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i64, ConfigError> {
        match self.lookup(name)? {
            Value::Int(i) => Ok(*i),
            other => Err(Self::mismatch(name, ValueType::Int, other)),
        }
    }

    pub fn get_float(&self, name: &str) -> Result<f64, ConfigError> {
        match self.lookup(name)? {
            Value::Float(x) => Ok(*x),
            other => Err(Self::mismatch(name, ValueType::Float, other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, ConfigError> {
        match self.lookup(name)? {
            Value::Bool(b) => Ok(*b),
            other => Err(Self::mismatch(name, ValueType::Bool, other)),
        }
    }

    /// Snapshot of every resolved value, keyed by entry name.
    pub fn dump(&self) -> BTreeMap<String, Value> {
        self.values.clone()
    }

    /// Log every resolved value in declaration order.
    pub fn log_dump(&self) {
        tracing::info!(app = %self.app_name, "Configuration:");
        for entry in &self.entries {
            if let Some(value) = self.values.get(&entry.name) {
                tracing::info!(name = %entry.name, value = %value, "  config entry");
            }
        }
    }
}
