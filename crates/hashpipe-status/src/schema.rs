//! Schema classification of decoded status buffers
//!
//! A [`SchemaRegistry`] holds one table per [`Discriminator`]. Classifying a
//! [`StatusMap`] runs each discriminator over it and looks the extracted
//! value up in that discriminator's table. A hit wraps the map in a
//! [`SchemaView`]; anything else hands the map back untouched.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::OnceLock;

use crate::map::StatusMap;
use crate::telescopes;
use crate::value::{Value, ValueKind};

/// Pulls the discriminating value out of a map, `None` when absent
pub type Extractor = fn(&StatusMap) -> Option<String>;

/// Named discriminator field extractor
#[derive(Debug, Clone, Copy)]
pub struct Discriminator {
    pub name: &'static str,
    pub extract: Extractor,
}

/// Named, typed view of one status key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accessor {
    pub name: &'static str,
    pub key: &'static str,
    pub kind: ValueKind,
}

impl Accessor {
    pub const fn new(name: &'static str, key: &'static str, kind: ValueKind) -> Self {
        Self { name, key, kind }
    }
}

/// Accessor surface selected by one discriminator value
#[derive(Debug)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    /// Discriminator value selecting this schema
    pub discriminator_value: &'static str,
    /// Accessor groups, searched in order
    pub accessors: &'static [&'static [Accessor]],
}

impl SchemaDescriptor {
    pub fn accessor(&self, name: &str) -> Option<&'static Accessor> {
        self.accessors
            .iter()
            .flat_map(|group| group.iter())
            .find(|a| a.name == name)
    }

    pub fn accessor_names(&self) -> impl Iterator<Item = &'static str> {
        self.accessors
            .iter()
            .flat_map(|group| group.iter())
            .map(|a| a.name)
    }
}

/// Status map matched to a schema
#[derive(Debug, Clone)]
pub struct SchemaView {
    schema: &'static SchemaDescriptor,
    map: StatusMap,
}

impl SchemaView {
    pub fn new(schema: &'static SchemaDescriptor, map: StatusMap) -> Self {
        Self { schema, map }
    }

    pub fn schema(&self) -> &'static SchemaDescriptor {
        self.schema
    }

    /// Value behind accessor `name`, if present with the declared kind
    pub fn get(&self, name: &str) -> Option<&Value> {
        let accessor = self.schema.accessor(name)?;
        self.map
            .get(accessor.key)
            .filter(|v| accessor.kind.accepts(v.kind()))
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn accessor_names(&self) -> impl Iterator<Item = &'static str> {
        self.schema.accessor_names()
    }

    pub fn map(&self) -> &StatusMap {
        &self.map
    }

    pub fn into_map(self) -> StatusMap {
        self.map
    }
}

impl Deref for SchemaView {
    type Target = StatusMap;

    fn deref(&self) -> &StatusMap {
        &self.map
    }
}

/// Classification result
#[derive(Debug, Clone)]
pub enum Status {
    Schema(SchemaView),
    Raw(StatusMap),
}

impl Status {
    pub fn schema_name(&self) -> Option<&'static str> {
        match self {
            Status::Schema(view) => Some(view.schema().name),
            Status::Raw(_) => None,
        }
    }

    pub fn as_schema(&self) -> Option<&SchemaView> {
        match self {
            Status::Schema(view) => Some(view),
            Status::Raw(_) => None,
        }
    }

    pub fn map(&self) -> &StatusMap {
        match self {
            Status::Schema(view) => view.map(),
            Status::Raw(map) => map,
        }
    }

    pub fn into_map(self) -> StatusMap {
        match self {
            Status::Schema(view) => view.into_map(),
            Status::Raw(map) => map,
        }
    }
}

impl Deref for Status {
    type Target = StatusMap;

    fn deref(&self) -> &StatusMap {
        self.map()
    }
}

struct SchemaTable {
    discriminator: Discriminator,
    schemas: HashMap<&'static str, &'static SchemaDescriptor>,
}

/// Discriminator tables, consulted in registration order
#[derive(Default)]
pub struct SchemaRegistry {
    tables: Vec<SchemaTable>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in telescope schemas
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for &schema in telescopes::SCHEMAS {
            registry.register(telescopes::TELESCOPE, schema);
        }
        registry
    }

    /// Register `schema` under `discriminator`
    ///
    /// Discriminators are matched by name. A second schema for the same
    /// discriminator value replaces the first.
    pub fn register(
        &mut self,
        discriminator: Discriminator,
        schema: &'static SchemaDescriptor,
    ) -> &mut Self {
        let index = match self
            .tables
            .iter()
            .position(|t| t.discriminator.name == discriminator.name)
        {
            Some(index) => index,
            None => {
                self.tables.push(SchemaTable {
                    discriminator,
                    schemas: HashMap::new(),
                });
                self.tables.len() - 1
            }
        };

        if let Some(old) = self.tables[index]
            .schemas
            .insert(schema.discriminator_value, schema)
        {
            tracing::warn!(
                discriminator = discriminator.name,
                value = schema.discriminator_value,
                replaced = old.name,
                "schema registered twice"
            );
        }
        self
    }

    pub fn len(&self) -> usize {
        self.tables.iter().map(|t| t.schemas.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wrap `map` in the first matching schema, or return it as is
    pub fn classify(&self, map: StatusMap) -> Status {
        for table in &self.tables {
            let Some(value) = (table.discriminator.extract)(&map) else {
                continue;
            };
            if let Some(&schema) = table.schemas.get(value.as_str()) {
                tracing::debug!(
                    discriminator = table.discriminator.name,
                    schema = schema.name,
                    "classified status buffer"
                );
                return Status::Schema(SchemaView::new(schema, map));
            }
        }
        tracing::debug!(keys = map.len(), "status buffer matches no schema");
        Status::Raw(map)
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_map();
        for table in &self.tables {
            let mut values: Vec<_> = table.schemas.keys().collect();
            values.sort();
            list.entry(&table.discriminator.name, &values);
        }
        list.finish()
    }
}

static REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();

/// Process-wide registry, the built-in one unless [`install_registry`] ran first
pub fn registry() -> &'static SchemaRegistry {
    REGISTRY.get_or_init(SchemaRegistry::builtin)
}

/// Install the process-wide registry
///
/// Must run before the first [`registry`] call; afterwards the registry is
/// frozen and `registry` is handed back.
pub fn install_registry(registry: SchemaRegistry) -> Result<(), SchemaRegistry> {
    REGISTRY.set(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(records: &[(&str, Value)]) -> StatusMap {
        records.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    fn backend(map: &StatusMap) -> Option<String> {
        map.get("BACKEND")?.as_str().map(str::to_string)
    }

    const BACKEND: Discriminator = Discriminator {
        name: "backend",
        extract: backend,
    };

    static GUPPI: SchemaDescriptor = SchemaDescriptor {
        name: "guppi",
        discriminator_value: "GUPPI",
        accessors: &[&[Accessor::new("nbits", "NBITS", ValueKind::Int)]],
    };

    #[test]
    fn test_builtin_registry() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(registry.len(), telescopes::SCHEMAS.len());
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_classify_match() {
        let registry = SchemaRegistry::builtin();
        let status = registry.classify(map(&[
            ("TELESCOP", Value::from("ATA")),
            ("PULSE", Value::Int(1)),
        ]));

        assert_eq!(status.schema_name(), Some("ata"));
        let view = status.as_schema().unwrap();
        assert_eq!(view.get_i64("pulse"), Some(1));
        assert_eq!(view.get_str("telescope"), Some("ATA"));
        // raw keys stay reachable
        assert_eq!(view.get("PULSE"), None);
        assert_eq!(status.get("PULSE"), Some(&Value::Int(1)));
        assert_eq!(status.len(), 2);
    }

    #[test]
    fn test_classify_fallback() {
        let registry = SchemaRegistry::builtin();

        let unknown = map(&[("TELESCOP", Value::from("GBT")), ("PULSE", Value::Int(1))]);
        let status = registry.classify(unknown.clone());
        assert!(matches!(&status, Status::Raw(m) if *m == unknown));

        let missing = map(&[("PULSE", Value::Int(1))]);
        assert_eq!(registry.classify(missing.clone()).into_map(), missing);

        // a non-string discriminator is treated as absent
        let numeric = map(&[("TELESCOP", Value::Int(42))]);
        assert!(registry.classify(numeric).schema_name().is_none());
    }

    #[test]
    fn test_accessor_kind_is_checked() {
        let registry = SchemaRegistry::builtin();
        let status = registry.classify(map(&[
            ("TELESCOP", Value::from("ATA")),
            ("PULSE", Value::from("soon")),
            ("OBSFREQ", Value::Int(1420)),
        ]));
        let view = status.as_schema().unwrap();
        assert_eq!(view.get("pulse"), None);
        assert_eq!(view.get_f64("obsfreq"), Some(1420.0));
    }

    #[test]
    fn test_second_discriminator_table() {
        let mut registry = SchemaRegistry::builtin();
        registry.register(BACKEND, &GUPPI);

        let status = registry.classify(map(&[
            ("BACKEND", Value::from("GUPPI")),
            ("NBITS", Value::Int(8)),
        ]));
        assert_eq!(status.schema_name(), Some("guppi"));
        assert_eq!(status.as_schema().unwrap().get_i64("nbits"), Some(8));

        // first table to match wins
        let status = registry.classify(map(&[
            ("TELESCOP", Value::from("MeerKAT")),
            ("BACKEND", Value::from("GUPPI")),
        ]));
        assert_eq!(status.schema_name(), Some("meerkat"));
    }

    #[test]
    fn test_register_replaces_value() {
        static ATA_V2: SchemaDescriptor = SchemaDescriptor {
            name: "ata-v2",
            discriminator_value: "ATA",
            accessors: &[],
        };

        let mut registry = SchemaRegistry::builtin();
        let before = registry.len();
        registry.register(telescopes::TELESCOPE, &ATA_V2);
        assert_eq!(registry.len(), before);

        let status = registry.classify(map(&[("TELESCOP", Value::from("ATA"))]));
        assert_eq!(status.schema_name(), Some("ata-v2"));
    }

    #[test]
    fn test_accessor_names() {
        let names: Vec<_> = telescopes::ATA.accessor_names().collect();
        assert!(names.contains(&"telescope"));
        assert!(names.contains(&"pulse"));
    }
}
