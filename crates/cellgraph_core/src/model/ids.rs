//! Cell id generation policy.
//!
//! # Responsibility
//! - Hold the id prefix/postfix and auto-generation switch.
//! - Define the hook collaborators override to namespace generated ids.
//!
//! # Invariants
//! - The counter passed to a strategy is never handed out twice between
//!   two root replacements; strategies must map distinct counters to
//!   distinct ids.

use crate::model::cell::Cell;
use serde::{Deserialize, Serialize};

/// Id generation settings of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdConfig {
    /// Prepended to every generated id.
    pub prefix: String,
    /// Appended to every generated id.
    pub postfix: String,
    /// When false, cells without an id stay out of the registry.
    pub create_ids: bool,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            postfix: String::new(),
            create_ids: true,
        }
    }
}

/// Hook producing the id for one counter value.
pub trait IdStrategy {
    fn create_id(&self, cell: &Cell, counter: u64, config: &IdConfig) -> String;
}

/// Default `prefix + counter + postfix` ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialIds;

impl IdStrategy for SequentialIds {
    fn create_id(&self, _cell: &Cell, counter: u64, config: &IdConfig) -> String {
        format!("{}{}{}", config.prefix, counter, config.postfix)
    }
}

/// Numeric value of a bare numeric id, used to keep the counter ahead of
/// caller-assigned ids.
pub(crate) fn numeric_id(id: &str) -> Option<u64> {
    if id.is_empty() || !id.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}
