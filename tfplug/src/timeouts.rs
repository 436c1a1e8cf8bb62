//! Operation timeouts configured through a `timeouts` block
//!
//! ```hcl
//! timeouts {
//!   create = "30m"
//!   delete = "1h"
//! }
//! ```

use crate::error::{Result, TfplugError};
use crate::schema::{AttributeBuilder, AttributeType, Block, NestedBlock, NestingMode, StringKind};
use crate::types::{AttributePath, Dynamic, DynamicValue};
use std::time::Duration;

pub const TIMEOUTS_BLOCK: &str = "timeouts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Create,
    Read,
    Update,
    Delete,
}

impl TimeoutKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutKind::Create => "create",
            TimeoutKind::Read => "read",
            TimeoutKind::Update => "update",
            TimeoutKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    /// Same budget for every operation
    pub const fn uniform(duration: Duration) -> Self {
        Self {
            create: duration,
            read: duration,
            update: duration,
            delete: duration,
        }
    }

    pub const fn with_create(mut self, duration: Duration) -> Self {
        self.create = duration;
        self
    }

    pub const fn with_update(mut self, duration: Duration) -> Self {
        self.update = duration;
        self
    }

    pub const fn with_delete(mut self, duration: Duration) -> Self {
        self.delete = duration;
        self
    }

    pub fn get(&self, kind: TimeoutKind) -> Duration {
        match kind {
            TimeoutKind::Create => self.create,
            TimeoutKind::Read => self.read,
            TimeoutKind::Update => self.update,
            TimeoutKind::Delete => self.delete,
        }
    }

    fn set(&mut self, kind: TimeoutKind, duration: Duration) {
        match kind {
            TimeoutKind::Create => self.create = duration,
            TimeoutKind::Read => self.read = duration,
            TimeoutKind::Update => self.update = duration,
            TimeoutKind::Delete => self.delete = duration,
        }
    }

    /// Overrides the defaults with whatever the `timeouts` block of `value`
    /// sets. A missing or null block keeps the defaults.
    pub fn from_value(defaults: Timeouts, value: &DynamicValue) -> Result<Self> {
        let mut timeouts = defaults;

        let block = match value.get_map(&AttributePath::new(TIMEOUTS_BLOCK)) {
            Ok(block) => block,
            Err(_) => return Ok(timeouts),
        };

        for kind in [
            TimeoutKind::Create,
            TimeoutKind::Read,
            TimeoutKind::Update,
            TimeoutKind::Delete,
        ] {
            match block.get(kind.as_str()) {
                Some(Dynamic::String(raw)) if !raw.trim().is_empty() => {
                    let duration = humantime::parse_duration(raw.trim()).map_err(|source| {
                        TfplugError::InvalidDuration {
                            attribute: format!("{}.{}", TIMEOUTS_BLOCK, kind.as_str()),
                            source,
                        }
                    })?;
                    timeouts.set(kind, duration);
                }
                Some(Dynamic::Null) | Some(Dynamic::Unknown) | Some(Dynamic::String(_)) | None => {}
                Some(_) => {
                    return Err(TfplugError::TypeMismatch {
                        expected: "string".to_string(),
                        actual: format!("non-string value for {}", kind.as_str()),
                    })
                }
            }
        }

        Ok(timeouts)
    }

    /// Schema for a `timeouts` block offering the given operations
    pub fn block(kinds: &[TimeoutKind]) -> NestedBlock {
        let attributes = kinds
            .iter()
            .map(|kind| {
                AttributeBuilder::new(kind.as_str(), AttributeType::String)
                    .description(&format!(
                        "Time to wait for the {} operation, e.g. \"30s\", \"10m\", \"1h\"",
                        kind.as_str()
                    ))
                    .optional()
                    .build()
            })
            .collect();

        NestedBlock {
            type_name: TIMEOUTS_BLOCK.to_string(),
            block: Block {
                version: 0,
                attributes,
                block_types: Vec::new(),
                description: "Operation timeouts".to_string(),
                description_kind: StringKind::Plain,
                deprecated: false,
            },
            nesting: NestingMode::Single,
            min_items: 0,
            max_items: 1,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(20 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_block(entries: &[(&str, Dynamic)]) -> DynamicValue {
        let block: HashMap<String, Dynamic> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let mut value = DynamicValue::new(Dynamic::Map(HashMap::new()));
        value
            .set_map(&AttributePath::new(TIMEOUTS_BLOCK), block)
            .unwrap();
        value
    }

    #[test]
    fn missing_block_keeps_defaults() {
        let defaults = Timeouts::uniform(Duration::from_secs(600));
        let value = DynamicValue::new(Dynamic::Map(HashMap::new()));

        assert_eq!(Timeouts::from_value(defaults, &value).unwrap(), defaults);
    }

    #[test]
    fn configured_entries_override_defaults() {
        let defaults = Timeouts::uniform(Duration::from_secs(600));
        let value = with_block(&[
            ("create", Dynamic::String("1h30m".to_string())),
            ("delete", Dynamic::Null),
        ]);

        let timeouts = Timeouts::from_value(defaults, &value).unwrap();

        assert_eq!(timeouts.create, Duration::from_secs(90 * 60));
        assert_eq!(timeouts.delete, Duration::from_secs(600));
        assert_eq!(timeouts.get(TimeoutKind::Update), Duration::from_secs(600));
    }

    #[test]
    fn invalid_duration_names_the_attribute() {
        let value = with_block(&[("update", Dynamic::String("soon".to_string()))]);

        let err = Timeouts::from_value(Timeouts::default(), &value).unwrap_err();

        assert!(err.to_string().contains("timeouts.update"));
    }

    #[test]
    fn block_lists_requested_operations() {
        let block = Timeouts::block(&[TimeoutKind::Create, TimeoutKind::Delete]);

        assert_eq!(block.type_name, "timeouts");
        assert_eq!(block.nesting, NestingMode::Single);
        let names: Vec<_> = block.block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["create", "delete"]);
        assert!(block.block.attributes.iter().all(|a| a.optional));
    }
}
