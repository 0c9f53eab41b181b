//! Quill Dispatch
//!
//! Generates name-keyed dispatch for classes resolved by `quill-hierarchy`:
//! per-class method invoke tables guarded by case-insensitive name hashes,
//! static member and `instanceof` tables, object factories, and the
//! program-wide class lookup tables.
//!
//! Every table is first built as a model that can be queried
//! ([`DispatchTable::lookup`]) and then rendered through a [`CodeWriter`].
//!
//! # Usage
//!
//! ```ignore
//! use quill_dispatch::{DispatchBuilder, DispatchMode, QuillConfig};
//! use quill_hierarchy::ClassRegistry;
//!
//! let config = QuillConfig::load("quill.toml")?;
//! let mut registry = ClassRegistry::with_options(config.analysis.clone());
//! // ... declare classes ...
//! registry.resolve();
//!
//! let builder = DispatchBuilder::new(&registry, &config.dispatch);
//! for class in builder.build_all() {
//!     let invoke = class.table(DispatchMode::InstanceInvoke, false);
//! }
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod class_table;
pub mod config;
pub mod create;
pub mod hash;
pub mod instanceof;
pub mod jump_table;
pub mod options;
pub mod property;
pub mod table;
pub mod writer;

pub use builder::{ClassDispatch, DispatchBuilder};
pub use class_table::{
    ClassFallthrough, ClassFlavour, ClassLookupEntry, ClassLookupTable, ClassResolution, ClassTableKind,
};
pub use config::{ConfigError, ConfigResult, QuillConfig};
pub use create::CreateEntryPoint;
pub use hash::{hash_name, hash_name_i, NameHasher};
pub use instanceof::InstanceOfTable;
pub use jump_table::{JumpEntry, JumpTable, KeyCase};
pub use options::{DispatchOptions, Naming};
pub use property::{MemberResolution, PropertyDispatch};
pub use table::{
    Branch, BranchTarget, DispatchMode, DispatchResolution, DispatchTable, Fallthrough, TableSlot,
};
pub use writer::CodeWriter;
