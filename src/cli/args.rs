//! Shared `clap` value-parser newtypes, following the CLI teacher's `CapabilityArg`/
//! `ParameterArg`/`TagArg` pattern in `command/apply_stack.rs`.

use std::{fmt, str::FromStr};

/// A `key=value` pair, used for `--parameter`/`--default-tags`.
#[derive(Clone, Debug)]
pub struct KeyValueArg {
    pub key: String,
    pub value: String,
}

impl FromStr for KeyValueArg {
    type Err = InvalidKeyValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s.split_once('=').ok_or_else(|| InvalidKeyValue(s.to_string()))?;
        if key.is_empty() {
            return Err(InvalidKeyValue(s.to_string()));
        }
        Ok(Self { key: key.to_string(), value: value.to_string() })
    }
}

#[derive(Debug)]
pub struct InvalidKeyValue(String);

impl fmt::Display for InvalidKeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a `key=value` pair", self.0)
    }
}

impl std::error::Error for InvalidKeyValue {}

/// The output format enum shared by the peripheral report-style commands (spec.md §6).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
    Yaml,
    Markdown,
    Html,
    Dot,
}
