use serde::Deserialize;
use std::collections::HashMap;

/// Options to pass to the normalized cache.
///
/// The options can also be read from a config file:
///
/// ```
/// use hermes_normalized_cache::NormalizedCacheOptions;
///
/// let options: NormalizedCacheOptions = serde_yaml::from_str(r#"
/// keys:
///   Label: [name]
///   Edition: [isbn, printing]
/// "#).unwrap();
/// assert_eq!(options.keys["Edition"], vec!["isbn", "printing"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct NormalizedCacheOptions {
    /// Key fields by typename. The values are the names of the fields, not the IDs
    /// themselves, so if your `User` is identified by a field called `ident`, you should
    /// set `"User" => ["ident"]`.
    /// Types without an entry are identified by `id` or `_id`.
    #[serde(default)]
    pub keys: HashMap<String, Vec<String>>
}

impl NormalizedCacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identify entities of `typename` by the values of `fields`, in order.
    pub fn with_key_fields<T, I, F>(mut self, typename: T, fields: I) -> Self
    where
        T: Into<String>,
        I: IntoIterator<Item = F>,
        F: Into<String>
    {
        self.keys.insert(
            typename.into(),
            fields.into_iter().map(Into::into).collect()
        );
        self
    }
}
