//! Static property and class constant lookup tables
//!
//! Property and constant names are case-sensitive, so these tables key on the
//! exact name and switch on `hash_string`.

use quill_hierarchy::{ClassId, ClassRegistry, Storage};

use crate::hash::{hash_literal, NameHasher};
use crate::jump_table::{render_switch, JumpTable};
use crate::table::Fallthrough;
use crate::writer::CodeWriter;

/// `os_get` and `os_constant` of one class
#[derive(Debug, Clone)]
pub struct PropertyDispatch {
    /// Class the tables belong to
    pub class: ClassId,
    /// Code id of the class
    pub class_id: String,
    /// Qualifier of the class, e.g. `c_Foo::`
    pub scope: String,
    /// Static property names
    pub statics: JumpTable,
    /// Constant names
    pub constants: JumpTable,
    /// Where unmatched names go
    pub fallthrough: Fallthrough,
    /// Statics live behind the global pointer
    pub indirect: bool,
    dynamic_statics: Vec<String>,
    hasher: NameHasher,
}

/// Outcome of a simulated member lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberResolution<'t> {
    /// Declared by this class
    Own,
    /// Continue in the fallthrough target
    Fallthrough(&'t Fallthrough),
}

impl PropertyDispatch {
    /// Build the tables; interfaces get none.
    ///
    /// `hasher` must not fold case.
    pub fn build(
        registry: &ClassRegistry,
        class: ClassId,
        class_id: String,
        scope: String,
        fallthrough: Fallthrough,
        hasher: NameHasher,
    ) -> Option<Self> {
        let entity = registry.class(class);
        if entity.is_interface() {
            return None;
        }
        let statics: Vec<&str> = entity
            .properties()
            .iter()
            .filter(|p| p.is_static)
            .map(|p| p.name.as_str())
            .collect();
        let dynamic_statics = entity
            .properties()
            .iter()
            .filter(|p| p.is_static && p.storage == Storage::Dynamic)
            .map(|p| p.name.clone())
            .collect();
        let constants: Vec<&str> = entity.constants().iter().map(|c| c.name.as_str()).collect();

        Some(Self {
            class,
            class_id,
            scope,
            statics: JumpTable::case_sensitive(statics, hasher),
            constants: JumpTable::case_sensitive(constants, hasher),
            fallthrough,
            indirect: entity.properties().needs_indirect_access(),
            dynamic_statics,
            hasher,
        })
    }

    /// Follow `os_get` for a static property
    pub fn lookup_static(&self, name: &str) -> MemberResolution<'_> {
        Self::resolve(&self.statics, name, self.hasher, &self.fallthrough)
    }

    /// Follow `os_constant` for a class constant
    pub fn lookup_constant(&self, name: &str) -> MemberResolution<'_> {
        Self::resolve(&self.constants, name, self.hasher, &self.fallthrough)
    }

    fn resolve<'t>(
        table: &JumpTable,
        name: &str,
        hasher: NameHasher,
        fallthrough: &'t Fallthrough,
    ) -> MemberResolution<'t> {
        match table.find(name, hasher) {
            Some(entry) if entry.lname == name => MemberResolution::Own,
            _ => MemberResolution::Fallthrough(fallthrough),
        }
    }

    /// Write both functions
    pub fn render(&self, w: &mut CodeWriter) {
        let globals = if self.indirect { "g->" } else { "" };

        w.indent_begin(format!("Variant {}os_get(const char *s) {{", self.scope));
        if self.indirect {
            w.line("DECLARE_GLOBAL_VARIABLES(g);");
        }
        render_switch(w, "hash_string(s)", &self.statics, |w, entry| {
            let macro_name = if self.dynamic_statics.contains(&entry.lname) {
                "HASH_RETURN_DYNAMIC"
            } else {
                "HASH_RETURN"
            };
            w.line(format!(
                "{}({}, {}s_{}_{}, \"{}\");",
                macro_name,
                hash_literal(entry.hash),
                globals,
                self.class_id,
                entry.name,
                entry.name
            ));
        });
        w.line(format!("return {}os_get(s);", self.fallthrough.qualifier()));
        w.indent_end("}");

        w.indent_begin(format!("Variant {}os_constant(const char *s) {{", self.scope));
        if let Fallthrough::ParentObject { .. } = self.fallthrough {
            w.line("DECLARE_GLOBAL_VARIABLES(g);");
        }
        render_switch(w, "hash_string(s)", &self.constants, |w, entry| {
            w.line(format!(
                "HASH_RETURN({}, k_{}_{}, \"{}\");",
                hash_literal(entry.hash),
                self.class_id,
                entry.name,
                entry.name
            ));
        });
        w.line(format!("return {}os_constant(s);", self.fallthrough.qualifier()));
        w.indent_end("}");
    }
}
