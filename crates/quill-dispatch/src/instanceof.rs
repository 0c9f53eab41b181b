//! `o_instanceof` tables

use quill_hierarchy::query::all_parents;
use quill_hierarchy::{ClassId, ClassRegistry, Derivation};

use crate::hash::{hash_literal, NameHasher};
use crate::jump_table::{render_switch, JumpTable};
use crate::writer::CodeWriter;

/// Names an object of a class answers `instanceof` for
#[derive(Debug, Clone)]
pub struct InstanceOfTable {
    /// Class the table belongs to
    pub class: ClassId,
    /// Qualifier of the class, e.g. `c_Foo::`
    pub scope: String,
    /// The class's own name and every ancestor name
    pub names: JumpTable,
    /// Also ask the runtime parent object
    pub runtime_parent_check: bool,
    hasher: NameHasher,
}

impl InstanceOfTable {
    /// Build the table; extension classes get none
    pub fn build(registry: &ClassRegistry, class: ClassId, scope: String, hasher: NameHasher) -> Option<Self> {
        let entity = registry.class(class);
        if entity.is_extension_class() {
            return None;
        }
        let mut keys = vec![entity.original_name().to_string()];
        keys.extend(all_parents(registry, class));
        Some(Self {
            class,
            scope,
            names: JumpTable::new(keys, hasher),
            runtime_parent_check: entity.derives_from_redeclaring() != Derivation::FromNormal,
            hasher,
        })
    }

    /// Answer known statically; `None` when the parent object must be asked
    pub fn contains(&self, name: &str) -> Option<bool> {
        match self.names.find(name, self.hasher) {
            // HASH_INSTANCEOF always compares the name
            Some(entry) if entry.lname == name.to_ascii_lowercase() => Some(true),
            _ if self.runtime_parent_check => None,
            _ => Some(false),
        }
    }

    /// Write `o_instanceof`
    pub fn render(&self, w: &mut CodeWriter) {
        w.indent_begin(format!("bool {}o_instanceof(CStrRef s) const {{", self.scope));
        render_switch(w, "s->hash()", &self.names, |w, entry| {
            w.line(format!("HASH_INSTANCEOF({}, \"{}\");", hash_literal(entry.hash), entry.name));
        });
        if self.runtime_parent_check {
            w.line("if (parent->o_instanceof(s)) return true;");
        }
        w.line("return false;");
        w.indent_end("}");
    }
}
