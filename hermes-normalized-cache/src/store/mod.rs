pub(crate) mod data;
#[allow(clippy::module_inception)]
mod store;

pub use data::{Link, SerializedData};
pub use store::{is_root, QueryStore, Store};
