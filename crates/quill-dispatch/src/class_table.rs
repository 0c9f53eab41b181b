//! Program-wide lookup tables keyed by class name
//!
//! Each kind of table is described by a static `KindSpec`: signature,
//! per-entry macro, interpreter hook and fallthrough. Adding a kind only
//! means adding a spec.

use quill_hierarchy::{ClassId, ClassRegistry};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hash::{hash_literal, NameHasher};
use crate::jump_table::{render_switch, JumpTable};
use crate::writer::CodeWriter;

// ============================================================================
// Table kinds
// ============================================================================

/// Which runtime entry point a class table implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassTableKind {
    /// Instantiate by name without running the constructor
    CreateObjectOnly,
    /// Static member callbacks of a class by name
    ObjectStaticCallbacks,
    /// Initial value of a class variable by class name
    ClassVarInit,
    /// Call info of a static method by class name
    CallInfoStaticMethod,
}

struct KindSpec {
    /// `{sys}` is replaced by `_builtin` for system output
    signature: &'static str,
    macro_name: &'static str,
    preamble: &'static [&'static str],
    eval_hook: Option<fn(&mut CodeWriter)>,
    builtin: &'static [&'static str],
    missing: &'static [&'static str],
}

const CREATE_OBJECT_ONLY: KindSpec = KindSpec {
    signature: "Object create{sys}_object_only(const char *s, ObjectData* root /* = NULL*/) {",
    macro_name: "HASH_CREATE_OBJECT_ONLY",
    preamble: &[],
    eval_hook: Some(create_object_only_hook),
    builtin: &["return create_builtin_object_only(s, root);"],
    missing: &["return throw_missing_class(s);"],
};

const OBJECT_STATIC_CALLBACKS: KindSpec = KindSpec {
    signature: "const ObjectStaticCallbacks * get{sys}_object_static_callbacks(const char *s) {",
    macro_name: "HASH_GET_OBJECT_STATIC_CALLBACKS",
    preamble: &[],
    eval_hook: None,
    builtin: &["return get_builtin_object_static_callbacks(s);"],
    missing: &["return NULL;"],
};

const CLASS_VAR_INIT: KindSpec = KindSpec {
    signature: "Variant get{sys}_class_var_init(const char *s, const char *var) {",
    macro_name: "HASH_GET_CLASS_VAR_INIT",
    preamble: &[],
    eval_hook: Some(class_var_init_hook),
    builtin: &["return get_builtin_class_var_init(s, var);"],
    missing: &["return throw_missing_class(s);"],
};

const CALL_INFO_STATIC_METHOD: KindSpec = KindSpec {
    signature: "bool get_call_info_static_method{sys}(MethodCallPackage &mcp) {",
    macro_name: "HASH_CALL_INFO_STATIC_METHOD",
    preamble: &["const char *s __attribute__((__unused__)) (mcp.rootObj.getCStr());"],
    eval_hook: Some(call_info_static_method_hook),
    builtin: &["return get_call_info_static_method_builtin(mcp);"],
    missing: &["mcp.fail();", "return false;"],
};

fn create_object_only_hook(w: &mut CodeWriter) {
    w.indent_begin("{");
    w.line("Variant r;");
    w.line("if (eval_create_object_only_hook(r, s, root)) return r;");
    w.indent_end("}");
}

fn class_var_init_hook(w: &mut CodeWriter) {
    w.indent_begin("{");
    w.line("Variant r;");
    w.line("if (eval_get_class_var_init_hook(r, s, var)) return r;");
    w.indent_end("}");
}

fn call_info_static_method_hook(w: &mut CodeWriter) {
    w.line("bool foundClass = false;");
    w.line("if (eval_get_call_info_static_method_hook(mcp, foundClass)) return true;");
    w.indent_begin("else if (foundClass) {");
    w.line("return false;");
    w.indent_end("}");
}

impl ClassTableKind {
    /// Every kind, in output order
    pub const ALL: [ClassTableKind; 4] = [
        ClassTableKind::ClassVarInit,
        ClassTableKind::CreateObjectOnly,
        ClassTableKind::CallInfoStaticMethod,
        ClassTableKind::ObjectStaticCallbacks,
    ];

    fn spec(self) -> &'static KindSpec {
        match self {
            ClassTableKind::CreateObjectOnly => &CREATE_OBJECT_ONLY,
            ClassTableKind::ObjectStaticCallbacks => &OBJECT_STATIC_CALLBACKS,
            ClassTableKind::ClassVarInit => &CLASS_VAR_INIT,
            ClassTableKind::CallInfoStaticMethod => &CALL_INFO_STATIC_METHOD,
        }
    }

    /// Per-entry macro without flavour suffix
    pub fn macro_name(self) -> &'static str {
        self.spec().macro_name
    }
}

// ============================================================================
// Entries
// ============================================================================

/// How the runtime must treat a class found by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassFlavour {
    /// Always declared
    Plain,
    /// Declared only once its definition runs
    Volatile,
    /// Several declarations; the live one is picked at runtime
    Redeclared,
}

impl ClassFlavour {
    /// Suffix appended to the entry macro
    pub fn macro_suffix(self) -> &'static str {
        match self {
            ClassFlavour::Plain => "",
            ClassFlavour::Volatile => "_VOLATILE",
            ClassFlavour::Redeclared => "_REDECLARED",
        }
    }
}

/// One class reachable by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLookupEntry {
    /// Representative declaration
    pub class: ClassId,
    /// Runtime treatment
    pub flavour: ClassFlavour,
    /// Name passed to the entry macro
    pub symbol: String,
}

/// Where a name that matches no entry goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassFallthrough {
    /// The built-in runtime's own table
    Builtin,
    /// Report a missing class
    MissingClass,
}

/// Outcome of a simulated class lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassResolution<'t> {
    /// A declared class
    Entry(&'t ClassLookupEntry),
    /// No class by that name in this table
    Fallthrough(ClassFallthrough),
}

// ============================================================================
// Class lookup table
// ============================================================================

/// One program-wide name-to-class table
#[derive(Debug, Clone)]
pub struct ClassLookupTable {
    /// Entry point implemented
    pub kind: ClassTableKind,
    /// Generating the built-in runtime
    pub system_output: bool,
    /// Consult the interpreter first
    pub with_eval: bool,
    /// Class names
    pub names: JumpTable,
    entries: FxHashMap<String, ClassLookupEntry>,
    hasher: NameHasher,
}

impl ClassLookupTable {
    /// Table over the user classes, or over the built-in ones for system output
    pub fn build(
        registry: &ClassRegistry,
        kind: ClassTableKind,
        system_output: bool,
        enable_eval: bool,
        hasher: NameHasher,
    ) -> Self {
        let mut entries = FxHashMap::default();
        let mut keys = Vec::new();
        for name in registry.class_names() {
            let Some(class) = registry.find_class(name) else {
                continue;
            };
            let entity = registry.class(class);
            if entity.is_user_class() == system_output {
                continue;
            }
            let flavour = if entity.is_redeclaring() {
                ClassFlavour::Redeclared
            } else if entity.is_volatile() {
                ClassFlavour::Volatile
            } else {
                ClassFlavour::Plain
            };
            keys.push(entity.original_name().to_string());
            entries.insert(
                name.to_string(),
                ClassLookupEntry {
                    class,
                    flavour,
                    symbol: entity.original_name().to_string(),
                },
            );
        }
        debug!(kind = ?kind, classes = entries.len(), "built class lookup table");

        Self {
            kind,
            system_output,
            with_eval: enable_eval && !system_output,
            names: JumpTable::new(keys, hasher),
            entries,
            hasher,
        }
    }

    /// Entry for a lower-cased class name
    pub fn entry(&self, name: &str) -> Option<&ClassLookupEntry> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    /// Where the unmatched case goes
    pub fn fallthrough(&self) -> ClassFallthrough {
        if self.system_output {
            ClassFallthrough::MissingClass
        } else {
            ClassFallthrough::Builtin
        }
    }

    /// Follow the generated guards for `name`
    pub fn lookup(&self, name: &str) -> ClassResolution<'_> {
        let lname = name.to_ascii_lowercase();
        match self.names.find(&lname, self.hasher) {
            // Every entry macro compares the name as well as the hash
            Some(found) if found.lname == lname => match self.entries.get(&lname) {
                Some(entry) => ClassResolution::Entry(entry),
                None => ClassResolution::Fallthrough(self.fallthrough()),
            },
            _ => ClassResolution::Fallthrough(self.fallthrough()),
        }
    }

    /// Write the lookup function
    pub fn render(&self, w: &mut CodeWriter) {
        let spec = self.kind.spec();
        let sys = if self.system_output { "_builtin" } else { "" };
        w.indent_begin(spec.signature.replace("{sys}", sys));
        for line in spec.preamble {
            w.line(line);
        }
        if self.with_eval {
            if let Some(hook) = spec.eval_hook {
                hook(w);
            }
        }
        if !self.names.is_empty() {
            w.line("DECLARE_GLOBAL_VARIABLES(g);");
        }
        render_switch(w, "hash_string_i(s)", &self.names, |w, key| {
            if let Some(entry) = self.entries.get(&key.lname) {
                w.line(format!(
                    "{}{}({}, {});",
                    spec.macro_name,
                    entry.flavour.macro_suffix(),
                    hash_literal(key.hash),
                    entry.symbol
                ));
            }
        });
        let tail = match self.fallthrough() {
            ClassFallthrough::Builtin => spec.builtin,
            ClassFallthrough::MissingClass => spec.missing,
        };
        for line in tail {
            w.line(line);
        }
        w.indent_end("}");
    }
}
