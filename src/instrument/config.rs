//! Instrumentation options.
//!
//! Options are read once, before the first class is instrumented, from a comma separated
//! `key=value` list such as `branches=true,hits=flag,strategy=local`. Any key or value that is
//! not understood is an error: instrumenting with a half-read configuration would silently
//! collect the wrong data.

use std::str::FromStr;

use strum::{Display, EnumString};

use crate::{class::ClassInfo, Error, Result};

/// Class-file major version from which dynamically computed constants are available.
pub const CONSTANT_DYNAMIC_MIN_VERSION: u16 = 55;

/// How rewritten methods obtain their class's counter array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CounterStrategy {
    /// Static field filled once by the class initializer
    Field,
    /// Registry lookup on every invocation
    Local,
    /// Lazily resolved class-level constant
    Constant,
}

/// What a counter slot records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum HitMode {
    /// Number of executions
    Count,
    /// Whether the slot was ever executed
    Flag,
}

/// Settings of one instrumentation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentationOptions {
    /// Record jumps and switches in addition to lines
    pub branches: bool,
    /// Counter semantics
    pub hits: HitMode,
    /// Record executable instruction counts per line
    pub instructions: bool,
    /// Maintain per-test line traces
    pub tracking: bool,
    /// Requested counter acquisition strategy
    pub strategy: CounterStrategy,
    /// Run the noise filters
    pub filters: bool,
    /// Instrument synthetic methods that are not lambda bodies
    pub synthetic: bool,
}

impl Default for InstrumentationOptions {
    fn default() -> Self {
        InstrumentationOptions {
            branches: true,
            hits: HitMode::Count,
            instructions: false,
            tracking: false,
            strategy: CounterStrategy::Field,
            filters: true,
            synthetic: false,
        }
    }
}

impl InstrumentationOptions {
    /// Strategy actually used for `class`.
    ///
    /// Constants need a class-file version that supports them and fall back to a field;
    /// interfaces cannot hold a private mutable field and fall back to a local.
    #[must_use]
    pub fn strategy_for(&self, class: &ClassInfo) -> CounterStrategy {
        let mut strategy = self.strategy;
        if strategy == CounterStrategy::Constant
            && class.major_version < CONSTANT_DYNAMIC_MIN_VERSION
        {
            strategy = CounterStrategy::Field;
        }
        if strategy == CounterStrategy::Field && class.is_interface() {
            strategy = CounterStrategy::Local;
        }
        strategy
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(Error::Config(format!(
            "'{value}' is not a boolean value for '{key}'"
        ))),
    }
}

impl FromStr for InstrumentationOptions {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut options = InstrumentationOptions::default();

        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("expected key=value, got '{entry}'")))?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "branches" => options.branches = parse_bool(key, value)?,
                "instructions" => options.instructions = parse_bool(key, value)?,
                "tracking" => options.tracking = parse_bool(key, value)?,
                "filters" => options.filters = parse_bool(key, value)?,
                "synthetic" => options.synthetic = parse_bool(key, value)?,
                "hits" => {
                    options.hits = value.parse().map_err(|_| {
                        Error::Config(format!("unknown hit mode '{value}'"))
                    })?;
                }
                "strategy" => {
                    options.strategy = value.parse().map_err(|_| {
                        Error::Config(format!("unknown counter strategy '{value}'"))
                    })?;
                }
                _ => return Err(Error::Config(format!("unknown option '{key}'"))),
            }
        }

        Ok(options)
    }
}
