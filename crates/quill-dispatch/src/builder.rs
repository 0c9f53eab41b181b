//! Dispatch Builder
//!
//! Turns a resolved [`ClassRegistry`] into the name-keyed entry points of
//! every class: invoke tables per [`DispatchMode`], the few-args variant,
//! property and constant tables, `o_instanceof` and object factories.
//!
//! The builder only borrows the registry. Walks that discover new facts while
//! building (method collection for flattened tables, constructor lookup)
//! have their upgrades discarded; resolution must already have reached its
//! fixpoint.

use std::collections::BTreeSet;

use quill_hierarchy::resolver::{collect_methods, needs_invoke_parent};
use quill_hierarchy::{ClassId, ClassRegistry, Derivation, FunctionId};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::class_table::{ClassLookupTable, ClassTableKind};
use crate::create::CreateEntryPoint;
use crate::hash::{hash_name, hash_name_i, NameHasher};
use crate::instanceof::InstanceOfTable;
use crate::jump_table::JumpTable;
use crate::options::DispatchOptions;
use crate::property::PropertyDispatch;
use crate::table::{Branch, BranchTarget, DispatchMode, DispatchTable, Fallthrough, TableSlot};
use crate::writer::CodeWriter;

// ============================================================================
// Per-class output
// ============================================================================

/// Every generated entry point of one class
#[derive(Debug, Clone)]
pub struct ClassDispatch {
    /// Class described
    pub class: ClassId,
    /// Code id of the class
    pub class_id: String,
    /// Method tables, one per mode and static flag
    pub tables: Vec<DispatchTable>,
    /// Few-args variant of the instance invoke table
    pub few_args: DispatchTable,
    /// Slots whose table has no branch and only forwards
    pub empty_tables: BTreeSet<TableSlot>,
    /// Object factories; none for abstract classes and interfaces
    pub create: Option<CreateEntryPoint>,
    /// Static property and constant tables; none for interfaces
    pub properties: Option<PropertyDispatch>,
    /// `o_instanceof`; none for extension classes
    pub instance_of: Option<InstanceOfTable>,
}

impl ClassDispatch {
    /// Table for a mode, if built
    pub fn table(&self, mode: DispatchMode, static_only: bool) -> Option<&DispatchTable> {
        self.tables
            .iter()
            .find(|t| t.mode == mode && t.static_only == static_only)
    }

    /// True if the slot's table was empty
    pub fn is_empty_table(&self, slot: TableSlot) -> bool {
        self.empty_tables.contains(&slot)
    }

    /// `#define` lines that elide the empty tables
    pub fn omit_markers(&self) -> Vec<String> {
        self.empty_tables
            .iter()
            .map(|slot| format!("#define {} 1", slot.guard(&self.class_id)))
            .collect()
    }

    /// Write every entry point of the class
    pub fn render(&self, w: &mut CodeWriter) {
        if let Some(properties) = &self.properties {
            properties.render(w);
        }
        if let Some(instance_of) = &self.instance_of {
            instance_of.render(w);
        }
        for table in &self.tables {
            table.render(w);
            if table.slot() == TableSlot::Invoke {
                self.few_args.render(w);
            }
        }
        if let Some(create) = &self.create {
            create.render(w);
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds dispatch output from a resolved registry
pub struct DispatchBuilder<'r> {
    registry: &'r ClassRegistry,
    options: &'r DispatchOptions,
    hasher: NameHasher,
}

impl<'r> DispatchBuilder<'r> {
    /// Builder keyed by [`hash_name_i`]
    pub fn new(registry: &'r ClassRegistry, options: &'r DispatchOptions) -> Self {
        Self {
            registry,
            options,
            hasher: hash_name_i,
        }
    }

    /// Replace the method and class name hash.
    ///
    /// Property and constant tables always use the case-sensitive [`hash_name`].
    pub fn with_hasher(mut self, hasher: NameHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Code id of a class
    pub fn class_id(&self, class: ClassId) -> String {
        self.registry.class(class).id(&self.options.id_prefix)
    }

    fn scope(&self, class_id: &str) -> String {
        format!("{}{}::", self.options.naming.class, class_id)
    }

    fn flattens(&self, mode: DispatchMode) -> bool {
        self.options.flatten_invoke
            && matches!(mode, DispatchMode::InstanceInvoke | DispatchMode::StaticInvoke)
    }

    /// Methods a table for `mode` dispatches to, sorted by name.
    ///
    /// Abstract methods never qualify, nor do methods that are bound
    /// statically everywhere (neither dynamic nor virtual) unless generating
    /// system output. Static tables keep only static methods, except
    /// call-info tables which list every method.
    pub fn find_jump_table_methods(
        &self,
        class: ClassId,
        mode: DispatchMode,
        static_only: bool,
    ) -> Vec<(String, FunctionId)> {
        let registry = self.registry;
        let static_only = static_only && mode != DispatchMode::CallInfoLookup;

        let candidates: Vec<(String, FunctionId)> = if self.flattens(mode) {
            let lookup = collect_methods(registry, class, true, true);
            if !lookup.is_pure() {
                trace!(
                    class = %self.class_id(class),
                    upgrades = lookup.upgrades.len(),
                    "discarding flattened method collection upgrades"
                );
            }
            lookup.value.into_iter().collect()
        } else {
            registry
                .class(class)
                .functions()
                .iter()
                .filter_map(|(name, ids)| {
                    let first = *ids.first()?;
                    if registry.function(first).is_redeclaring() {
                        None
                    } else {
                        Some((name.clone(), first))
                    }
                })
                .collect()
        };

        let mut methods: Vec<(String, FunctionId)> = candidates
            .into_iter()
            .filter(|(_, f)| {
                let func = registry.function(*f);
                !func.is_abstract()
                    && !(static_only && !func.is_static())
                    && (self.options.system_output || func.is_dynamic() || func.is_virtual())
            })
            .collect();
        methods.sort_by(|a, b| a.0.cmp(&b.0));
        methods
    }

    /// Entry-point name for a mode, e.g. `os_invoke_from_eval`
    pub fn invoke_name(&self, mode: DispatchMode, static_only: bool, few_args: bool) -> String {
        let naming = &self.options.naming;
        let mut name = if static_only {
            naming.object_static.clone()
        } else {
            naming.object.clone()
        };
        name.push_str(match mode {
            DispatchMode::InstanceInvoke | DispatchMode::StaticInvoke => "invoke",
            DispatchMode::InterpretedCallerInvoke => "invoke_from_eval",
            DispatchMode::CallInfoLookup => "get_call_info",
        });
        if few_args {
            name.push_str("_few_args");
        }
        name
    }

    /// Where unmatched names continue for a class
    pub fn fallthrough(&self, class: ClassId, mode: DispatchMode, static_only: bool) -> Fallthrough {
        let registry = self.registry;
        let naming = &self.options.naming;
        let entity = registry.class(class);
        let derivation = entity.derives_from_redeclaring();

        if self.flattens(mode) && !needs_invoke_parent(registry, class, false) {
            let dynamic_object = derivation != Derivation::FromNormal;
            let base = if dynamic_object { "DynamicObjectData" } else { "ObjectData" };
            return Fallthrough::RuntimeBase {
                dynamic_object,
                scope: format!("{}{}::", naming.class, base),
            };
        }

        let Some(parent) = entity.parent() else {
            return Fallthrough::RuntimeBase {
                dynamic_object: false,
                scope: format!("{}ObjectData::", naming.class),
            };
        };

        if derivation == Derivation::DirectFromRedeclared {
            let expr = if static_only {
                format!("g->{}{}->", naming.class_statics_object, parent)
            } else {
                "parent->".to_string()
            };
            return Fallthrough::ParentObject {
                class: parent.to_string(),
                expr,
            };
        }

        let parent_id = registry
            .find_class(parent)
            .map_or_else(|| parent.to_string(), |p| self.class_id(p));
        Fallthrough::Parent {
            class: parent.to_string(),
            scope: self.scope(&parent_id),
        }
    }

    fn branch_target(&self, class_id: &str, func: FunctionId, mode: DispatchMode, static_only: bool, few_args: bool) -> (String, BranchTarget) {
        let naming = &self.options.naming;
        let function = self.registry.function(func);
        let owner = function
            .class()
            .map_or_else(|| class_id.to_string(), |c| self.class_id(c));
        let lname = function.name();

        let target = match mode {
            DispatchMode::InstanceInvoke | DispatchMode::StaticInvoke => {
                let prefix = if few_args { &naming.invoke_few_args } else { &naming.invoke };
                BranchTarget::Invoke {
                    helper: format!("{}{}::{}{}", naming.class, owner, prefix, lname),
                }
            }
            DispatchMode::CallInfoLookup => BranchTarget::CallInfo {
                record: format!("{}{}::{}{}", naming.class, owner, naming.call_info, lname),
            },
            DispatchMode::InterpretedCallerInvoke => {
                if function.is_static() {
                    let class_arg = if static_only { "c" } else { "o_getClassName()" };
                    BranchTarget::Interpreted {
                        callee: format!("{}{}::{}{}", naming.class, owner, naming.method_impl, lname),
                        class_arg: Some(class_arg.to_string()),
                    }
                } else {
                    BranchTarget::Interpreted {
                        callee: format!("{}{}", naming.method, lname),
                        class_arg: None,
                    }
                }
            }
        };
        (owner, target)
    }

    /// One dispatch function of a class
    pub fn build_table(&self, class: ClassId, mode: DispatchMode, static_only: bool, few_args: bool) -> DispatchTable {
        let class_id = self.class_id(class);
        let mut methods = self.find_jump_table_methods(class, mode, static_only);
        if few_args {
            let limit = self.options.invoke_few_args_count;
            methods.retain(|(_, f)| self.registry.function(*f).min_param_count() <= limit);
        }

        let jump = JumpTable::new(methods.iter().map(|(name, _)| name.clone()), self.hasher);
        let by_name: FxHashMap<&str, FunctionId> =
            methods.iter().map(|(name, f)| (name.as_str(), *f)).collect();

        let branches = jump
            .entries()
            .iter()
            .filter_map(|entry| {
                let func = *by_name.get(entry.lname.as_str())?;
                let (owner, target) = self.branch_target(&class_id, func, mode, static_only, few_args);
                Some(Branch {
                    name: self.registry.function(func).original_name().to_string(),
                    lname: entry.lname.clone(),
                    hash: entry.hash,
                    bucket: entry.bucket,
                    tie_break: entry.tie_break,
                    function: func,
                    owner,
                    target,
                })
            })
            .collect::<Vec<_>>();

        trace!(
            class = %class_id,
            mode = ?mode,
            static_only,
            few_args,
            branches = branches.len(),
            "built dispatch table"
        );

        DispatchTable {
            class,
            scope: self.scope(&class_id),
            class_id,
            mode,
            static_only,
            few_args,
            few_args_count: self.options.invoke_few_args_count,
            symbol: self.invoke_name(mode, static_only, few_args),
            branches,
            fallthrough: self.fallthrough(class, mode, static_only),
            bucket_mask: jump.mask(),
            hasher: self.hasher,
        }
    }

    fn modes(&self) -> Vec<(DispatchMode, bool)> {
        let mut modes = vec![
            (DispatchMode::InstanceInvoke, false),
            (DispatchMode::StaticInvoke, true),
        ];
        if self.options.enable_eval || self.options.system_output {
            modes.push((DispatchMode::InterpretedCallerInvoke, false));
            modes.push((DispatchMode::InterpretedCallerInvoke, true));
        }
        modes.push((DispatchMode::CallInfoLookup, true));
        modes.push((DispatchMode::CallInfoLookup, false));
        modes
    }

    /// Every entry point of one class
    pub fn build_class(&self, class: ClassId) -> ClassDispatch {
        let class_id = self.class_id(class);
        let scope = self.scope(&class_id);

        let tables: Vec<DispatchTable> = self
            .modes()
            .into_iter()
            .map(|(mode, static_only)| self.build_table(class, mode, static_only, false))
            .collect();
        let few_args = self.build_table(class, DispatchMode::InstanceInvoke, false, true);
        let empty_tables: BTreeSet<TableSlot> = tables
            .iter()
            .filter(|t| t.is_empty())
            .map(DispatchTable::slot)
            .collect();

        let properties = PropertyDispatch::build(
            self.registry,
            class,
            class_id.clone(),
            scope.clone(),
            self.fallthrough(class, DispatchMode::CallInfoLookup, true),
            hash_name,
        );
        let instance_of = InstanceOfTable::build(self.registry, class, scope, self.hasher);
        let create = CreateEntryPoint::build(self.registry, class, self.options);

        debug!(
            class = %class_id,
            tables = tables.len(),
            empty = empty_tables.len(),
            "built class dispatch"
        );

        ClassDispatch {
            class,
            class_id,
            tables,
            few_args,
            empty_tables,
            create,
            properties,
            instance_of,
        }
    }

    /// Every class, in declaration order
    pub fn build_all(&self) -> Vec<ClassDispatch> {
        self.registry
            .class_ids()
            .map(|class| self.build_class(class))
            .collect()
    }

    /// Program-wide table of one kind
    pub fn class_lookup_table(&self, kind: ClassTableKind) -> ClassLookupTable {
        ClassLookupTable::build(
            self.registry,
            kind,
            self.options.system_output,
            self.options.enable_eval,
            self.hasher,
        )
    }

    /// Render every class and every class lookup table
    pub fn render_all(&self) -> String {
        let mut w = CodeWriter::new();
        let classes = self.build_all();
        for class in &classes {
            for marker in class.omit_markers() {
                w.line(marker);
            }
        }
        for class in &classes {
            class.render(&mut w);
        }
        for kind in ClassTableKind::ALL {
            self.class_lookup_table(kind).render(&mut w);
        }
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DispatchResolution;
    use quill_hierarchy::{ClassEntity, ClassKind, FunctionEntity, Visibility};

    fn class(reg: &mut ClassRegistry, kind: ClassKind, name: &str, parent: Option<&str>) -> ClassId {
        let bases: Vec<&str> = parent.into_iter().collect();
        reg.declare_class(ClassEntity::new(kind, name, parent, &bases).unwrap())
    }

    fn dynamic_method(reg: &mut ClassRegistry, class: ClassId, name: &str) -> FunctionId {
        let f = reg.add_function(class, FunctionEntity::new(name).unwrap());
        reg.set_dynamic(class, name);
        f
    }

    #[test]
    fn test_only_dynamic_or_virtual_methods_are_eligible() {
        let mut reg = ClassRegistry::new();
        let a = class(&mut reg, ClassKind::NormalClass, "A", None);
        dynamic_method(&mut reg, a, "foo");
        reg.add_function(a, FunctionEntity::new("hidden").unwrap());
        reg.resolve();

        let opts = DispatchOptions::default();
        let builder = DispatchBuilder::new(&reg, &opts);
        let names: Vec<String> = builder
            .find_jump_table_methods(a, DispatchMode::InstanceInvoke, false)
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["foo"]);

        let system = DispatchOptions {
            system_output: true,
            ..Default::default()
        };
        let builder = DispatchBuilder::new(&reg, &system);
        assert_eq!(builder.find_jump_table_methods(a, DispatchMode::InstanceInvoke, false).len(), 2);
    }

    #[test]
    fn test_static_tables_keep_static_methods() {
        let mut reg = ClassRegistry::new();
        let a = class(&mut reg, ClassKind::NormalClass, "A", None);
        dynamic_method(&mut reg, a, "inst");
        reg.add_function(a, FunctionEntity::new("make").unwrap().with_static());
        reg.set_dynamic(a, "make");
        reg.add_function(a, FunctionEntity::new("todo").unwrap().with_abstract());
        reg.set_dynamic(a, "todo");
        reg.resolve();

        let opts = DispatchOptions::default();
        let builder = DispatchBuilder::new(&reg, &opts);
        let statics = builder.find_jump_table_methods(a, DispatchMode::StaticInvoke, true);
        assert_eq!(statics.len(), 1);
        assert_eq!(statics[0].0, "make");
        // Call-info tables list every method even when static
        assert_eq!(builder.find_jump_table_methods(a, DispatchMode::CallInfoLookup, true).len(), 2);
    }

    #[test]
    fn test_fallthrough_targets() {
        let mut reg = ClassRegistry::new();
        let base = class(&mut reg, ClassKind::NormalClass, "Base", None);
        let child = class(&mut reg, ClassKind::NormalClass, "Child", Some("Base"));
        let orphan = class(&mut reg, ClassKind::NormalClass, "Orphan", Some("Ghost"));
        reg.resolve();

        let opts = DispatchOptions::default();
        let builder = DispatchBuilder::new(&reg, &opts);

        assert!(matches!(
            builder.fallthrough(base, DispatchMode::InstanceInvoke, false),
            Fallthrough::RuntimeBase { dynamic_object: false, .. }
        ));
        let table = builder.build_table(child, DispatchMode::InstanceInvoke, false, false);
        assert_eq!(table.fallthrough_callee(), "c_Base::o_invoke");

        let table = builder.build_table(orphan, DispatchMode::InstanceInvoke, false, false);
        assert_eq!(table.fallthrough_callee(), "parent->o_invoke");
        let table = builder.build_table(orphan, DispatchMode::StaticInvoke, true, false);
        assert_eq!(table.fallthrough_callee(), "g->cso_ghost->os_invoke");
    }

    #[test]
    fn test_flatten_skips_parent_chain() {
        let mut reg = ClassRegistry::new();
        let base = class(&mut reg, ClassKind::NormalClass, "Base", None);
        dynamic_method(&mut reg, base, "inherited");
        let child = class(&mut reg, ClassKind::NormalClass, "Child", Some("Base"));
        dynamic_method(&mut reg, child, "own");
        reg.resolve();

        let opts = DispatchOptions {
            flatten_invoke: true,
            ..Default::default()
        };
        let builder = DispatchBuilder::new(&reg, &opts);
        let table = builder.build_table(child, DispatchMode::InstanceInvoke, false, false);
        let mut names = table.names();
        names.sort_unstable();
        assert_eq!(names, vec!["inherited", "own"]);
        assert_eq!(table.fallthrough_callee(), "c_ObjectData::o_invoke");
        match table.lookup("inherited") {
            DispatchResolution::Branch(b) => assert_eq!(b.owner, "Base"),
            other => panic!("expected branch, got {:?}", other),
        }

        // Call-info tables never flatten
        let table = builder.build_table(child, DispatchMode::CallInfoLookup, false, false);
        assert_eq!(table.names(), vec!["own"]);
    }

    #[test]
    fn test_private_method_keeps_parent_chain_when_flattening() {
        let mut reg = ClassRegistry::new();
        let base = class(&mut reg, ClassKind::NormalClass, "Base", None);
        reg.add_function(
            base,
            FunctionEntity::new("secret").unwrap().with_visibility(Visibility::Private),
        );
        let child = class(&mut reg, ClassKind::NormalClass, "Child", Some("Base"));
        reg.resolve();

        let opts = DispatchOptions {
            flatten_invoke: true,
            ..Default::default()
        };
        let builder = DispatchBuilder::new(&reg, &opts);
        let table = builder.build_table(child, DispatchMode::InstanceInvoke, false, false);
        assert_eq!(table.fallthrough_callee(), "c_Base::o_invoke");
    }

    #[test]
    fn test_few_args_limit() {
        let mut reg = ClassRegistry::new();
        let a = class(&mut reg, ClassKind::NormalClass, "A", None);
        reg.add_function(a, FunctionEntity::new("small").unwrap().with_params(1, 1));
        reg.add_function(a, FunctionEntity::new("wide").unwrap().with_params(8, 8));
        reg.set_dynamic(a, "small");
        reg.set_dynamic(a, "wide");
        reg.resolve();

        let opts = DispatchOptions::default();
        let builder = DispatchBuilder::new(&reg, &opts);
        let dispatch = builder.build_class(a);
        assert_eq!(dispatch.few_args.names(), vec!["small"]);
        assert_eq!(dispatch.few_args.symbol, "o_invoke_few_args");
        assert_eq!(dispatch.table(DispatchMode::InstanceInvoke, false).map(|t| t.branches.len()), Some(2));
    }

    #[test]
    fn test_eval_tables_only_when_enabled() {
        let mut reg = ClassRegistry::new();
        let a = class(&mut reg, ClassKind::NormalClass, "A", None);
        reg.resolve();

        let opts = DispatchOptions::default();
        let dispatch = DispatchBuilder::new(&reg, &opts).build_class(a);
        assert!(dispatch.table(DispatchMode::InterpretedCallerInvoke, false).is_none());
        assert_eq!(dispatch.tables.len(), 4);

        let opts = DispatchOptions {
            enable_eval: true,
            ..Default::default()
        };
        let dispatch = DispatchBuilder::new(&reg, &opts).build_class(a);
        assert!(dispatch.table(DispatchMode::InterpretedCallerInvoke, true).is_some());
        assert_eq!(dispatch.tables.len(), 6);
        assert!(dispatch.is_empty_table(TableSlot::StaticEvalInvoke));
    }

    #[test]
    fn test_redeclared_class_id() {
        let mut reg = ClassRegistry::new();
        class(&mut reg, ClassKind::NormalClass, "Twice", None);
        let second = class(&mut reg, ClassKind::NormalClass, "Twice", None);
        reg.resolve();

        let opts = DispatchOptions::default();
        let dispatch = DispatchBuilder::new(&reg, &opts).build_class(second);
        assert_eq!(dispatch.class_id, "Twice$$1");
        assert!(dispatch
            .omit_markers()
            .contains(&"#define OMIT_JUMP_TABLE_CLASS_INVOKE_Twice$$1 1".to_string()));
    }
}
