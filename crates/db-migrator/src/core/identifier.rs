//! Identifier validation, quoting and normalization.
//!
//! SQL identifiers cannot be bound as statement parameters, so every name that
//! lands in generated DDL goes through [`validate_identifier`] and is then
//! quoted by the target dialect according to its [`IdentifierQuoting`] mode.
//! Names are compared after applying an [`IdentifierNormalizer`].

use serde::{Deserialize, Serialize};

use crate::error::{MigrateError, Result};

/// Longest identifier accepted into the model, in bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Reject empty names, names with a NUL byte and names over
/// [`MAX_IDENTIFIER_LENGTH`].
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Metadata(
            "Empty identifier".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Metadata(format!(
            "Identifier {:?} contains a null byte",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Metadata(format!(
            "Identifier {:?} is {} bytes long, limit is {}",
            name,
            name.len(),
            MAX_IDENTIFIER_LENGTH
        )));
    }

    Ok(())
}

/// When a dialect wraps identifiers in quote characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierQuoting {
    /// Quote every identifier.
    #[default]
    Always,
    /// Quote only names that would otherwise be misread.
    Minimal,
    /// Never quote.
    None,
}

/// Case folding applied before identifiers are compared or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierNormalizer {
    Lowercase,
    Uppercase,
    /// Leave names untouched.
    #[default]
    AsIs,
    /// Fold to the target dialect's storage case.
    Standard,
}

/// Storage case of unquoted identifiers for a vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCase {
    Lower,
    Upper,
    Preserve,
}

impl IdentifierCase {
    pub fn fold(self, name: &str) -> String {
        match self {
            IdentifierCase::Lower => name.to_lowercase(),
            IdentifierCase::Upper => name.to_uppercase(),
            IdentifierCase::Preserve => name.to_string(),
        }
    }
}

impl IdentifierNormalizer {
    /// Normalize `name`; `standard_case` is the dialect's storage case.
    pub fn normalize(self, name: &str, standard_case: IdentifierCase) -> String {
        match self {
            IdentifierNormalizer::Lowercase => name.to_lowercase(),
            IdentifierNormalizer::Uppercase => name.to_uppercase(),
            IdentifierNormalizer::AsIs => name.to_string(),
            IdentifierNormalizer::Standard => standard_case.fold(name),
        }
    }
}

/// Key used to look names up regardless of case.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Whether a name must be quoted to survive a round trip through the parser.
///
/// Mixed-case names, names with characters outside `[A-Za-z0-9_$]`, names
/// starting with a digit and reserved words all need quotes.
pub fn requires_quoting(name: &str, reserved: &[&str]) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok {
        return true;
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return true;
    }
    let has_lower = name.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = name.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return true;
    }
    reserved.iter().any(|word| word.eq_ignore_ascii_case(name))
}

/// Wrap a name in quotes, doubling any embedded closing quote.
pub fn quote_with(name: &str, open: &str, close: &str) -> String {
    let doubled = format!("{}{}", close, close);
    format!("{}{}{}", open, name.replace(close, &doubled), close)
}

/// A check definition is pasted into DDL verbatim, so it must be a single
/// boolean expression.
pub fn validate_check_constraint(definition: &str) -> Result<()> {
    if definition.contains(';') {
        return Err(MigrateError::Metadata(format!(
            "Check constraint {:?} contains a statement separator",
            definition
        )));
    }

    if definition.contains("--") || definition.contains("/*") || definition.contains("*/") {
        return Err(MigrateError::Metadata(format!(
            "Check constraint {:?} contains a comment",
            definition
        )));
    }

    let calls_exec = definition.split_whitespace().any(|word| {
        let word = word.to_lowercase();
        ["exec", "execute"]
            .iter()
            .any(|kw| word == *kw || word.starts_with(&format!("{}(", kw)))
    });
    if calls_exec {
        return Err(MigrateError::Metadata(format!(
            "Check constraint {:?} calls EXEC",
            definition
        )));
    }

    Ok(())
}
