//! Object factory entry points

use quill_hierarchy::query::find_constructor;
use quill_hierarchy::{ClassId, ClassRegistry, FunctionId};
use tracing::trace;

use crate::options::DispatchOptions;
use crate::writer::CodeWriter;

/// Factory functions of one instantiable class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEntryPoint {
    /// Class created
    pub class: ClassId,
    /// Code id of the class
    pub class_id: String,
    /// Constructor run by the full factory, if any
    pub constructor: Option<FunctionId>,
    /// Invoke helper of the constructor, e.g. `c_Base::i___construct`
    pub constructor_helper: Option<String>,
    class_type: String,
    create_symbol: String,
    create_only_symbol: String,
}

impl CreateEntryPoint {
    /// Factory for `class`; abstract classes and interfaces have none
    pub fn build(registry: &ClassRegistry, class: ClassId, options: &DispatchOptions) -> Option<Self> {
        let entity = registry.class(class);
        if entity.is_abstract() {
            return None;
        }
        let naming = &options.naming;
        let class_id = entity.id(&options.id_prefix);

        let lookup = find_constructor(registry, class, true);
        if !lookup.is_pure() {
            trace!(class = %class_id, upgrades = lookup.upgrades.len(), "discarding constructor lookup upgrades");
        }
        let constructor = lookup
            .value
            .filter(|f| !registry.function(*f).is_abstract());
        let constructor_helper = constructor.map(|f| {
            let func = registry.function(f);
            let owner = func
                .class()
                .map_or_else(|| class_id.clone(), |c| registry.class(c).id(&options.id_prefix));
            format!("{}{}::{}{}", naming.class, owner, naming.invoke, func.name())
        });

        Some(Self {
            class,
            class_type: format!("{}{}", naming.class, class_id),
            create_symbol: format!("{}{}", naming.create_object, class_id),
            create_only_symbol: format!("{}{}", naming.create_object_only, class_id),
            class_id,
            constructor,
            constructor_helper,
        })
    }

    /// Name of the full factory, e.g. `co_Foo`
    pub fn create_symbol(&self) -> &str {
        &self.create_symbol
    }

    /// Name of the factory that skips the constructor, e.g. `coo_Foo`
    pub fn create_only_symbol(&self) -> &str {
        &self.create_only_symbol
    }

    /// Write both factories
    pub fn render(&self, w: &mut CodeWriter) {
        w.indent_begin(format!("ObjectData *{}() {{", self.create_only_symbol));
        w.line(format!("return NEWOBJ({})();", self.class_type));
        w.indent_end("}");

        w.indent_begin(format!(
            "Object {}(CArrRef params, bool init /* = true */) {{",
            self.create_symbol
        ));
        w.line(format!("{} *obj = NEWOBJ({})();", self.class_type, self.class_type));
        w.line("obj->init();");
        if let Some(helper) = &self.constructor_helper {
            w.indent_begin("if (init) {");
            w.line("MethodCallPackage mcp;");
            w.line("mcp.construct(Object(obj));");
            w.line(format!("{}(mcp, params);", helper));
            w.indent_end("}");
        }
        w.line("return Object(obj);");
        w.indent_end("}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_hierarchy::{ClassEntity, ClassKind, FunctionEntity};

    #[test]
    fn test_abstract_has_no_factory() {
        let mut reg = ClassRegistry::new();
        let shape = reg.declare_class(ClassEntity::new(ClassKind::AbstractClass, "Shape", None, &[] as &[&str]).unwrap());
        let drawable = reg.declare_class(ClassEntity::new(ClassKind::Interface, "Drawable", None, &[] as &[&str]).unwrap());
        let opts = DispatchOptions::default();
        assert!(CreateEntryPoint::build(&reg, shape, &opts).is_none());
        assert!(CreateEntryPoint::build(&reg, drawable, &opts).is_none());
    }

    #[test]
    fn test_inherited_constructor() {
        let mut reg = ClassRegistry::new();
        let base = reg.declare_class(ClassEntity::new(ClassKind::NormalClass, "Base", None, &[] as &[&str]).unwrap());
        let ctor = reg.add_function(base, FunctionEntity::new("__construct").unwrap());
        let child = reg.declare_class(ClassEntity::new(ClassKind::NormalClass, "Child", Some("Base"), &["Base"]).unwrap());
        reg.resolve();

        let entry = CreateEntryPoint::build(&reg, child, &DispatchOptions::default()).unwrap();
        assert_eq!(entry.constructor, Some(ctor));
        assert_eq!(entry.create_symbol(), "co_Child");

        let mut w = CodeWriter::new();
        entry.render(&mut w);
        let out = w.finish();
        assert!(out.contains("ObjectData *coo_Child() {"));
        assert!(out.contains("c_Base::i___construct(mcp, params);"));
    }

    #[test]
    fn test_no_constructor() {
        let mut reg = ClassRegistry::new();
        let plain = reg.declare_class(ClassEntity::new(ClassKind::NormalClass, "Plain", None, &[] as &[&str]).unwrap());
        let entry = CreateEntryPoint::build(&reg, plain, &DispatchOptions::default()).unwrap();
        assert!(entry.constructor.is_none());

        let mut w = CodeWriter::new();
        entry.render(&mut w);
        assert!(!w.finish().contains("if (init)"));
    }
}
