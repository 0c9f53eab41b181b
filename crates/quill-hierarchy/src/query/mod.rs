//! Queries over a resolved (or resolving) hierarchy
//!
//! Every query takes `&ClassRegistry`. Those that may discover new facts
//! return a [`Lookup`](crate::Lookup); the matching `ClassRegistry` methods
//! apply them in the same call.

mod ancestry;
mod capability;
mod lookup;

pub use ancestry::{
    all_parents, derives_directly_from, derives_from, find_common_parent, has_attribute,
    parent_scope, root_parent, root_parents,
};
pub use capability::{implements_array_access, implements_capability, ARRAY_ACCESS};
pub use lookup::{find_constructor, find_function};
