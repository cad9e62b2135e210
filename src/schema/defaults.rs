//! # Default Registry
//!
//! Named, zero-argument value producers referenced from field definitions as
//! `func:<name>`. A reference is checked for existence when the field is
//! compiled and evaluated only when a row is created.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use uuid::Uuid;

use super::errors::{SchemaError, SchemaResult};
use crate::storage::{ColumnDefault, DbValue};

/// Prefix of a deferred default token.
pub const DEFERRED_PREFIX: &str = "func";

/// A registered default producer
pub type Producer = Arc<dyn Fn() -> DbValue + Send + Sync>;

/// Registry of default producers, shared by every compiled schema.
pub struct DefaultRegistry {
    producers: RwLock<BTreeMap<String, Producer>>,
}

impl DefaultRegistry {
    /// Registry seeded with `utcnow`, `today` and `uuid4`.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register("utcnow", || DbValue::Timestamp(Utc::now()));
        registry.register("today", || DbValue::Date(Utc::now().date_naive()));
        registry.register("uuid4", || DbValue::Text(Uuid::new_v4().to_string()));
        registry
    }

    /// Registry with no producers.
    pub fn empty() -> Self {
        Self {
            producers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a producer. An existing name keeps its original producer.
    ///
    /// Returns `true` if the name was newly registered.
    pub fn register<F>(&self, name: impl Into<String>, producer: F) -> bool
    where
        F: Fn() -> DbValue + Send + Sync + 'static,
    {
        let mut producers = self.producers.write().unwrap_or_else(PoisonError::into_inner);
        let name = name.into();
        if producers.contains_key(&name) {
            return false;
        }
        producers.insert(name, Arc::new(producer));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.producers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Evaluates the producer registered under `name`.
    pub fn resolve(&self, name: &str) -> SchemaResult<DbValue> {
        let producer = self
            .producers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        match producer {
            Some(produce) => Ok(produce()),
            None => Err(self.unknown(name)),
        }
    }

    /// Fails unless `name` is registered. Does not evaluate the producer.
    pub fn ensure(&self, name: &str) -> SchemaResult<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(self.unknown(name))
        }
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.producers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn unknown(&self, name: &str) -> SchemaError {
        SchemaError::UnknownDefaultFunction {
            name: name.to_string(),
            available: self.names(),
        }
    }
}

impl Default for DefaultRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Default declared on a field.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultSpec {
    Unspecified,
    /// Value fixed when the field is compiled.
    Literal(DbValue),
    /// Producer name evaluated when a row is created.
    Deferred(String),
}

impl DefaultSpec {
    pub fn is_specified(&self) -> bool {
        !matches!(self, DefaultSpec::Unspecified)
    }

    pub fn to_column_default(&self) -> ColumnDefault {
        match self {
            DefaultSpec::Unspecified => ColumnDefault::None,
            DefaultSpec::Literal(value) => ColumnDefault::Literal(value.clone()),
            DefaultSpec::Deferred(name) => ColumnDefault::Deferred(name.clone()),
        }
    }
}

/// Extracts the producer name from a `func:<name>` token.
///
/// Anything else, including `func:` with an empty name or extra `:` parts,
/// is not a deferred reference.
pub fn parse_deferred_token(token: &str) -> Option<&str> {
    let mut parts = token.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(DEFERRED_PREFIX), Some(name), None) if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// Wire form of a deferred reference.
pub fn deferred_token(name: &str) -> String {
    format!("{}:{}", DEFERRED_PREFIX, name)
}
