use fnv::{FnvHashMap, FnvHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

type Fields<V> = FnvHashMap<String, V>;
type Entities<V> = FnvHashMap<String, Fields<V>>;

/// A reference from an entity field to other entities.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Link {
    Single(String),
    List(Vec<Link>),
    Null
}

/// A plain snapshot of the store, as produced by `Store::extract`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedData {
    /// Scalar fields by entity key.
    pub records: HashMap<String, HashMap<String, Value>>,
    /// Links to other entities by entity key.
    pub links: HashMap<String, HashMap<String, Link>>,
    /// Every typename an entity has been written for.
    #[serde(default)]
    pub typenames: Vec<String>
}

/// The flat entity table. Every entity has a (possibly empty) record entry, links live
/// next to it. A field is either a record or a link, never both.
#[derive(Default)]
pub struct InMemoryData {
    records: Entities<Value>,
    links: Entities<Link>,
    typenames: FnvHashSet<String>
}

impl InMemoryData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_entity(&self, entity_key: &str) -> bool {
        self.records.contains_key(entity_key)
    }

    pub fn entity_count(&self) -> usize {
        self.records.len()
    }

    /// Make sure the entity exists, even if it ends up with no fields.
    pub fn touch(&mut self, entity_key: &str) {
        if !self.records.contains_key(entity_key) {
            self.records.insert(entity_key.to_string(), Fields::default());
        }
    }

    pub fn read_record(&self, entity_key: &str, field_key: &str) -> Option<&Value> {
        self.records
            .get(entity_key)
            .and_then(|entity| entity.get(field_key))
    }

    pub fn read_link(&self, entity_key: &str, field_key: &str) -> Option<&Link> {
        self.links
            .get(entity_key)
            .and_then(|entity| entity.get(field_key))
    }

    pub fn write_record(&mut self, entity_key: &str, field_key: String, value: Value) {
        if let Some(links) = self.links.get_mut(entity_key) {
            links.remove(&field_key);
        }
        self.records
            .entry(entity_key.to_string())
            .or_default()
            .insert(field_key, value);
    }

    pub fn write_link(&mut self, entity_key: &str, field_key: String, link: Link) {
        self.touch(entity_key);
        if let Some(records) = self.records.get_mut(entity_key) {
            records.remove(&field_key);
        }
        self.links
            .entry(entity_key.to_string())
            .or_default()
            .insert(field_key, link);
    }

    pub fn note_typename(&mut self, typename: &str) {
        if !self.typenames.contains(typename) {
            self.typenames.insert(typename.to_string());
        }
    }

    /// Whether an entity of this type has ever been written.
    pub fn has_typename(&self, typename: &str) -> bool {
        self.typenames.contains(typename)
    }

    /// Remove an entity. Links pointing at it are left dangling and fail to read.
    pub fn remove(&mut self, entity_key: &str) -> bool {
        self.links.remove(entity_key);
        self.records.remove(entity_key).is_some()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.links.clear();
        self.typenames.clear();
    }

    pub fn serialize(&self) -> SerializedData {
        fn plain<V: Clone>(entities: &Entities<V>) -> HashMap<String, HashMap<String, V>> {
            entities
                .iter()
                .map(|(key, fields)| {
                    let fields = fields
                        .iter()
                        .map(|(field, value)| (field.clone(), value.clone()))
                        .collect();
                    (key.clone(), fields)
                })
                .collect()
        }

        let mut typenames: Vec<String> = self.typenames.iter().cloned().collect();
        typenames.sort();
        SerializedData {
            records: plain(&self.records),
            links: plain(&self.links),
            typenames
        }
    }

    pub fn hydrate(&mut self, data: SerializedData) {
        self.clear();
        for (key, fields) in data.records {
            self.records.insert(key, fields.into_iter().collect());
        }
        for (key, fields) in data.links {
            self.touch(&key);
            self.links.insert(key, fields.into_iter().collect());
        }
        self.typenames = data.typenames.into_iter().collect();
    }
}
