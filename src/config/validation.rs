//! Configuration entry validation.
//!
//! # Responsibilities
//! - Reject duplicate entry names and duplicate CLI flags
//! - Check that defaults match their declared type
//! - Check that defaults are among the allowed choices
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function over the declared entries; runs before resolution

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::{CliAction, ConfigEntry, ValueType};

/// A problem found in the declared entry set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("entry name is empty")]
    EmptyName,

    #[error("entry `{0}` is declared more than once")]
    DuplicateName(String),

    #[error("flag `{flag}` of `{entry}` is already used")]
    DuplicateFlag { entry: String, flag: String },

    #[error("default of `{entry}` is a {actual}, declared as {declared}")]
    DefaultTypeMismatch {
        entry: String,
        declared: ValueType,
        actual: ValueType,
    },

    #[error("default `{default}` of `{entry}` is not one of its choices")]
    DefaultNotInChoices { entry: String, default: String },

    #[error("switch `{entry}` must be declared as boolean")]
    SwitchNotBoolean { entry: String },
}

/// Validate a set of entries before they are resolved.
pub fn validate_entries(entries: &[ConfigEntry]) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut names = HashSet::new();
    let mut flags = HashSet::new();

    for entry in entries {
        if entry.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
            continue;
        }
        if !names.insert(entry.name.as_str()) {
            errors.push(ValidationError::DuplicateName(entry.name.clone()));
        }

        let actual = entry.default.value_type();
        if actual != entry.value_type {
            errors.push(ValidationError::DefaultTypeMismatch {
                entry: entry.name.clone(),
                declared: entry.value_type,
                actual,
            });
        }

        let Some(cli) = &entry.cli else { continue };

        let mut used = vec![format!("--{}", cli.long)];
        if let Some(short) = cli.short {
            used.push(format!("-{}", short));
        }
        for flag in used {
            if !flags.insert(flag.clone()) {
                errors.push(ValidationError::DuplicateFlag {
                    entry: entry.name.clone(),
                    flag,
                });
            }
        }

        if cli.action == CliAction::SetTrue && entry.value_type != ValueType::Bool {
            errors.push(ValidationError::SwitchNotBoolean {
                entry: entry.name.clone(),
            });
        }

        if let Some(choices) = &cli.choices {
            let default = entry.default.to_string();
            if !choices.iter().any(|c| *c == default) {
                errors.push(ValidationError::DefaultNotInChoices {
                    entry: entry.name.clone(),
                    default,
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
