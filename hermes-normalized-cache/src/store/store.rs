use crate::{
    error::CacheError,
    store::data::{InMemoryData, Link, SerializedData},
    NormalizedCacheOptions
};
use fnv::FnvHashMap;
use hermes::{Document, Field, FieldSelector, Variables};
use parking_lot::{ReentrantMutex, RwLock};
use serde_json::{Map, Value};
use std::{ops::Deref, sync::Arc};

const TYPENAME: &str = "__typename";

type KeyPolicies = FnvHashMap<String, Vec<String>>;

pub fn is_root(typename: &str) -> bool {
    typename == "Query" || typename == "Mutation" || typename == "Subscription"
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None
    }
}

fn key_of_entity(
    policies: &KeyPolicies,
    typename: &str,
    entity: &Map<String, Value>
) -> Result<Option<String>, CacheError> {
    if is_root(typename) {
        return Ok(Some(typename.to_string()));
    }

    if let Some(fields) = policies.get(typename) {
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            let value = entity.get(field).ok_or_else(|| CacheError::MissingField {
                entity: typename.to_string(),
                field: field.clone()
            })?;
            values.push(format!("{}:{}", Value::String(field.clone()), value));
        }
        return Ok(Some(format!("{}:{{{}}}", typename, values.join(","))));
    }

    Ok(entity
        .get("id")
        .or_else(|| entity.get("_id"))
        .and_then(id_string)
        .map(|id| format!("{}:{}", typename, id)))
}

fn typename_matches(condition: Option<&String>, typename: Option<&str>) -> bool {
    match (condition, typename) {
        (Some(condition), Some(typename)) => condition == typename,
        _ => true
    }
}

/// Whether a plain value should be normalized into entities rather than stored as is.
fn holds_entities(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => {
            items.iter().any(holds_entities)
                && items.iter().all(|item| item.is_null() || holds_entities(item))
        }
        _ => false
    }
}

enum Change {
    Touch(String),
    Record(String, String, Value),
    Link(String, String, Link),
    Typename(String)
}

/// Flattens a nested value into entity changes. Nothing touches the store until
/// the whole value has been walked, so a failed write leaves no trace.
struct Writer<'a> {
    policies: &'a KeyPolicies,
    variables: &'a Variables,
    changes: Vec<Change>
}

impl<'a> Writer<'a> {
    fn new(policies: &'a KeyPolicies, variables: &'a Variables) -> Self {
        Self {
            policies,
            variables,
            changes: Vec::new()
        }
    }

    fn apply(self, data: &mut InMemoryData) {
        for change in self.changes {
            match change {
                Change::Touch(entity_key) => data.touch(&entity_key),
                Change::Record(entity_key, field_key, value) => {
                    data.write_record(&entity_key, field_key, value)
                }
                Change::Link(entity_key, field_key, link) => {
                    data.write_link(&entity_key, field_key, link)
                }
                Change::Typename(typename) => data.note_typename(&typename)
            }
        }
    }

    fn entity_key(
        &mut self,
        path: &str,
        typename: Option<&str>,
        entity: &Map<String, Value>
    ) -> Result<String, CacheError> {
        match typename {
            Some(typename) => {
                self.changes.push(Change::Typename(typename.to_string()));
                Ok(key_of_entity(self.policies, typename, entity)?
                    .unwrap_or_else(|| path.to_string()))
            }
            None => Ok(path.to_string())
        }
    }

    fn write_selection(
        &mut self,
        entity_key: &str,
        typename: Option<&str>,
        selection: &[FieldSelector],
        entity: &Map<String, Value>,
        strict: bool
    ) -> Result<(), CacheError> {
        self.changes.push(Change::Touch(entity_key.to_string()));
        for selector in selection {
            match selector {
                FieldSelector::Typename => {
                    if let Some(typename) = entity.get(TYPENAME) {
                        self.changes.push(Change::Record(
                            entity_key.to_string(),
                            TYPENAME.to_string(),
                            typename.clone()
                        ));
                    }
                }
                FieldSelector::Scalar(field) => match entity.get(field.response_key()) {
                    Some(value) => self.changes.push(Change::Record(
                        entity_key.to_string(),
                        field.storage_key(self.variables),
                        value.clone()
                    )),
                    None => missing(entity_key, field, strict)
                },
                FieldSelector::Object(field, selection) => match entity.get(field.response_key()) {
                    Some(value) => {
                        let field_key = field.storage_key(self.variables);
                        let path = format!("{}.{}", entity_key, field_key);
                        let link = self.write_value(&path, selection, value, strict)?;
                        self.changes
                            .push(Change::Link(entity_key.to_string(), field_key, link));
                    }
                    None => missing(entity_key, field, strict)
                },
                FieldSelector::Fragment(condition, selection) => {
                    let matches = typename_matches(condition.as_ref(), typename);
                    self.write_selection(
                        entity_key,
                        typename,
                        selection,
                        entity,
                        strict && matches
                    )?;
                }
            }
        }
        Ok(())
    }

    fn write_value(
        &mut self,
        path: &str,
        selection: &[FieldSelector],
        value: &Value,
        strict: bool
    ) -> Result<Link, CacheError> {
        match value {
            Value::Object(entity) => {
                let typename = entity.get(TYPENAME).and_then(Value::as_str);
                let key = self.entity_key(path, typename, entity)?;
                self.write_selection(&key, typename, selection, entity, strict)?;
                Ok(Link::Single(key))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    self.write_value(&format!("{}.{}", path, i), selection, item, strict)
                })
                .collect::<Result<_, _>>()
                .map(Link::List),
            Value::Null => Ok(Link::Null),
            other => {
                tracing::warn!(path, value = %other, "expected an object, storing null");
                Ok(Link::Null)
            }
        }
    }

    fn write_fields(
        &mut self,
        entity_key: &str,
        fields: &Map<String, Value>
    ) -> Result<(), CacheError> {
        self.changes.push(Change::Touch(entity_key.to_string()));
        if let Some(typename) = fields.get(TYPENAME).and_then(Value::as_str) {
            self.changes.push(Change::Typename(typename.to_string()));
        }
        for (name, value) in fields {
            if holds_entities(value) {
                let path = format!("{}.{}", entity_key, name);
                let link = self.write_plain_value(&path, value)?;
                self.changes
                    .push(Change::Link(entity_key.to_string(), name.clone(), link));
            } else {
                self.changes.push(Change::Record(
                    entity_key.to_string(),
                    name.clone(),
                    value.clone()
                ));
            }
        }
        Ok(())
    }

    fn write_plain_value(&mut self, path: &str, value: &Value) -> Result<Link, CacheError> {
        match value {
            Value::Object(entity) => {
                let typename = entity.get(TYPENAME).and_then(Value::as_str);
                let key = self.entity_key(path, typename, entity)?;
                self.write_fields(&key, entity)?;
                Ok(Link::Single(key))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.write_plain_value(&format!("{}.{}", path, i), item))
                .collect::<Result<_, _>>()
                .map(Link::List),
            _ => Ok(Link::Null)
        }
    }
}

fn missing(entity_key: &str, field: &Field, strict: bool) {
    if strict && !field.client_only {
        tracing::warn!(
            entity = entity_key,
            field = field.response_key(),
            "result is missing a selected field"
        );
    }
}

/// Reassembles nested values from entities along a selection.
struct Reader<'a> {
    data: &'a InMemoryData,
    variables: &'a Variables,
    /// Read `@client` fields that were never written as `null` instead of failing.
    client_defaults: bool
}

impl Reader<'_> {
    fn read_selection(
        &self,
        entity_key: &str,
        selection: &[FieldSelector],
        output: &mut Map<String, Value>,
        strict: bool
    ) -> Result<(), CacheError> {
        if !self.data.has_entity(entity_key) {
            return Err(CacheError::MissingEntity {
                key: entity_key.to_string()
            });
        }

        let typename = self
            .data
            .read_record(entity_key, TYPENAME)
            .and_then(Value::as_str);
        let missing_field = |field_key: String| CacheError::MissingField {
            entity: entity_key.to_string(),
            field: field_key
        };

        for selector in selection {
            match selector {
                FieldSelector::Typename => {
                    if let Some(typename) = typename {
                        output.insert(TYPENAME.to_string(), Value::String(typename.to_string()));
                    }
                }
                FieldSelector::Scalar(field) => {
                    let field_key = field.storage_key(self.variables);
                    match self.data.read_record(entity_key, &field_key) {
                        Some(value) => {
                            output.insert(field.response_key().to_string(), value.clone());
                        }
                        None if field.client_only && self.client_defaults => {
                            output.insert(field.response_key().to_string(), Value::Null);
                        }
                        None if strict => return Err(missing_field(field_key)),
                        None => {}
                    }
                }
                FieldSelector::Object(field, selection) => {
                    let field_key = field.storage_key(self.variables);
                    let value = match self.data.read_link(entity_key, &field_key) {
                        Some(link) => self.read_link(link, selection, strict)?,
                        None => match self.data.read_record(entity_key, &field_key) {
                            Some(value) => value.clone(),
                            None if field.client_only && self.client_defaults => Value::Null,
                            None if strict => return Err(missing_field(field_key)),
                            None => continue
                        }
                    };
                    output.insert(field.response_key().to_string(), value);
                }
                FieldSelector::Fragment(condition, selection) => {
                    let matches = typename_matches(condition.as_ref(), typename);
                    self.read_selection(entity_key, selection, output, strict && matches)?;
                }
            }
        }
        Ok(())
    }

    fn read_link(
        &self,
        link: &Link,
        selection: &[FieldSelector],
        strict: bool
    ) -> Result<Value, CacheError> {
        match link {
            Link::Null => Ok(Value::Null),
            Link::Single(entity_key) => {
                let mut output = Map::new();
                self.read_selection(entity_key, selection, &mut output, strict)?;
                Ok(Value::Object(output))
            }
            Link::List(links) => links
                .iter()
                .map(|link| self.read_link(link, selection, strict))
                .collect::<Result<_, _>>()
                .map(Value::Array)
        }
    }
}

/// The normalized entity store.
///
/// Every entity lives exactly once, under the key computed from its typename and key fields.
/// Results are flattened into entities on write and reassembled along a selection on read,
/// so two queries that select the same entity always observe the same data.
///
/// Reads and writes are safe from any thread. Writes are serialized; use
/// [`transaction`](#method.transaction) to make a read-modify-write atomic.
pub struct Store {
    data: RwLock<InMemoryData>,
    policies: RwLock<KeyPolicies>,
    transaction: ReentrantMutex<()>
}

impl Default for Store {
    fn default() -> Self {
        Self::new(NormalizedCacheOptions::default())
    }
}

impl Store {
    pub fn new(options: NormalizedCacheOptions) -> Self {
        Self {
            data: RwLock::new(InMemoryData::new()),
            policies: RwLock::new(options.keys.into_iter().collect()),
            transaction: ReentrantMutex::new(())
        }
    }

    /// The cache key of an entity, or `None` if it has no identity.
    ///
    /// Root types are keyed by their name. Types with declared key fields are keyed by the
    /// values of those fields in declaration order, anything else by its `id` or `_id`.
    ///
    /// # Errors
    ///
    /// `MissingField` if the type has declared key fields and one of them is absent.
    pub fn key_of_entity(
        &self,
        typename: &str,
        entity: &Map<String, Value>
    ) -> Result<Option<String>, CacheError> {
        key_of_entity(&self.policies.read(), typename, entity)
    }

    /// Identify entities of `typename` by `fields` from now on.
    ///
    /// Redeclaring the same fields is a no-op.
    ///
    /// # Errors
    ///
    /// `ConflictingPolicy` if entities of this type have already been written, since they
    /// would be stored under keys the new policy can never produce.
    pub fn declare_key_fields(
        &self,
        typename: &str,
        fields: Vec<String>
    ) -> Result<(), CacheError> {
        let _tx = self.transaction.lock();
        let mut policies = self.policies.write();
        if policies.get(typename) == Some(&fields) {
            return Ok(());
        }
        if self.data.read().has_typename(typename) {
            return Err(CacheError::ConflictingPolicy {
                typename: typename.to_string()
            });
        }

        tracing::debug!(typename, ?fields, "declared key fields");
        policies.insert(typename.to_string(), fields);
        Ok(())
    }

    /// Merge fields into an entity, normalizing nested objects into their own entities.
    ///
    /// Without a selection the store can't tell a nested entity from an object-valued
    /// scalar, so every nested object is treated as an entity.
    pub fn write_entity(
        &self,
        entity_key: &str,
        fields: &Map<String, Value>
    ) -> Result<(), CacheError> {
        let _tx = self.transaction.lock();
        let policies = self.policies.read();
        let variables = Variables::new();
        let mut writer = Writer::new(&policies, &variables);
        writer.write_fields(entity_key, fields)?;
        writer.apply(&mut self.data.write());
        tracing::trace!(entity = entity_key, "wrote entity");
        Ok(())
    }

    /// Read an entity along a selection, following links.
    ///
    /// Arguments that reference variables resolve to `null` here.
    pub fn read_entity(
        &self,
        entity_key: &str,
        selection: &[FieldSelector]
    ) -> Result<Value, CacheError> {
        let data = self.data.read();
        let variables = Variables::new();
        let reader = Reader {
            data: &data,
            variables: &variables,
            client_defaults: false
        };
        reader.read_link(&Link::Single(entity_key.to_string()), selection, true)
    }

    /// Normalize the result of a document into the store, starting at its root type.
    pub fn write_query(
        &self,
        document: &Document,
        variables: &Variables,
        data: &Value
    ) -> Result<(), CacheError> {
        let data = match data {
            Value::Object(data) => data,
            Value::Null => return Ok(()),
            other => {
                tracing::warn!(value = %other, "query result is not an object, ignoring it");
                return Ok(());
            }
        };

        let root_key = document.operation_type().to_str();
        let variables = document.with_defaults(variables.clone());
        let _tx = self.transaction.lock();
        let policies = self.policies.read();
        let mut writer = Writer::new(&policies, &variables);
        writer.write_selection(root_key, Some(root_key), document.selection(), data, true)?;
        writer.apply(&mut self.data.write());
        tracing::trace!(root = root_key, "wrote query");
        Ok(())
    }

    /// Reassemble the result of a document from the store.
    ///
    /// # Errors
    ///
    /// `MissingEntity` or `MissingField` if anything the document selects isn't cached.
    pub fn read_query(
        &self,
        document: &Document,
        variables: &Variables
    ) -> Result<Value, CacheError> {
        self.read_root(document, variables, false)
    }

    /// Read back a result that just came from a server. Servers never see `@client` fields,
    /// so those that aren't cached yet read as `null`.
    pub(crate) fn read_result(
        &self,
        document: &Document,
        variables: &Variables
    ) -> Result<Value, CacheError> {
        self.read_root(document, variables, true)
    }

    fn read_root(
        &self,
        document: &Document,
        variables: &Variables,
        client_defaults: bool
    ) -> Result<Value, CacheError> {
        let root_key = document.operation_type().to_str();
        let variables = document.with_defaults(variables.clone());
        let data = self.data.read();
        let reader = Reader {
            data: &data,
            variables: &variables,
            client_defaults
        };
        reader.read_link(&Link::Single(root_key.to_string()), document.selection(), true)
    }

    /// Run a custom update function against the cached result of a document.
    ///
    /// The updater receives the current result, or `None` if it isn't fully cached, and
    /// returns the new result to write, or `None` to leave the store as is. Read and write
    /// happen in one transaction.
    pub fn update_query<F>(
        &self,
        document: &Document,
        variables: &Variables,
        updater_fn: F
    ) -> Result<(), CacheError>
    where
        F: FnOnce(Option<Value>) -> Option<Value>
    {
        self.transaction(|| {
            let current = self.read_query(document, variables).ok();
            match updater_fn(current) {
                Some(updated) => self.write_query(document, variables, &updated),
                None => Ok(())
            }
        })
    }

    /// Run `f` with exclusive write access. Writes from other threads wait until it returns,
    /// writes from within `f` go through.
    pub fn transaction<R, F: FnOnce() -> R>(&self, f: F) -> R {
        let _tx = self.transaction.lock();
        f()
    }

    pub fn contains(&self, entity_key: &str) -> bool {
        self.data.read().has_entity(entity_key)
    }

    /// The number of entities in the store.
    pub fn len(&self) -> usize {
        self.data.read().entity_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove an entity. Anything still linking to it becomes a cache miss.
    pub fn evict(&self, entity_key: &str) -> bool {
        let _tx = self.transaction.lock();
        let removed = self.data.write().remove(entity_key);
        tracing::debug!(entity = entity_key, removed, "evicted entity");
        removed
    }

    /// Remove every entity. Key policies stay in place.
    pub fn reset(&self) {
        let _tx = self.transaction.lock();
        self.data.write().clear();
        tracing::debug!("store reset");
    }

    /// A snapshot of every entity, for persisting the cache.
    pub fn extract(&self) -> SerializedData {
        self.data.read().serialize()
    }

    /// Replace the contents of the store with a snapshot.
    pub fn restore(&self, data: SerializedData) {
        let _tx = self.transaction.lock();
        self.data.write().hydrate(data);
        tracing::debug!(entities = self.len(), "store restored");
    }
}

/// A shared handle to the store, used to seed the cache, run custom updates, and passed into
/// local resolvers.
#[derive(Clone, Default)]
pub struct QueryStore {
    pub(crate) store: Arc<Store>
}

impl QueryStore {
    pub fn new(options: NormalizedCacheOptions) -> Self {
        Self {
            store: Arc::new(Store::new(options))
        }
    }
}

impl Deref for QueryStore {
    type Target = Store;

    fn deref(&self) -> &Store {
        &self.store
    }
}

impl From<Arc<Store>> for QueryStore {
    fn from(store: Arc<Store>) -> Self {
        Self { store }
    }
}
