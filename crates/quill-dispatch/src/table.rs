//! Per-class method dispatch tables
//!
//! A [`DispatchTable`] is the model of one generated `switch` over method
//! name hashes. It can be rendered to source or queried directly, which is
//! how the tables are tested: a lookup follows the same guard rules the
//! generated code does.

use std::fmt;

use quill_hierarchy::{ClassId, FunctionId};
use serde::{Deserialize, Serialize};

use crate::hash::{hash_literal, NameHasher};
use crate::writer::CodeWriter;

// ============================================================================
// Modes and slots
// ============================================================================

/// What a dispatch table is called for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Dynamic call on an object
    InstanceInvoke,
    /// Dynamic call on a class name
    StaticInvoke,
    /// Call arriving from the interpreter
    InterpretedCallerInvoke,
    /// Resolve the call-info record without calling
    CallInfoLookup,
}

/// Identity of one generated entry point of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSlot {
    /// `o_invoke` (and its few-args variant)
    Invoke,
    /// `os_invoke`
    StaticInvoke,
    /// `o_invoke_from_eval`
    EvalInvoke,
    /// `os_invoke_from_eval`
    StaticEvalInvoke,
    /// `o_get_call_info`
    CallInfo,
    /// `os_get_call_info`
    StaticCallInfo,
}

impl TableSlot {
    /// Slot of a table built for `mode`
    pub fn of(mode: DispatchMode, static_only: bool) -> Self {
        match (mode, static_only) {
            (DispatchMode::InstanceInvoke, _) => TableSlot::Invoke,
            (DispatchMode::StaticInvoke, _) => TableSlot::StaticInvoke,
            (DispatchMode::InterpretedCallerInvoke, false) => TableSlot::EvalInvoke,
            (DispatchMode::InterpretedCallerInvoke, true) => TableSlot::StaticEvalInvoke,
            (DispatchMode::CallInfoLookup, false) => TableSlot::CallInfo,
            (DispatchMode::CallInfoLookup, true) => TableSlot::StaticCallInfo,
        }
    }

    /// Preprocessor guard stem; the class id is appended
    pub fn omit_macro(self) -> &'static str {
        match self {
            TableSlot::Invoke => "OMIT_JUMP_TABLE_CLASS_INVOKE",
            TableSlot::StaticInvoke => "OMIT_JUMP_TABLE_CLASS_STATIC_INVOKE",
            TableSlot::EvalInvoke => "OMIT_JUMP_TABLE_CLASS_EVAL_INVOKE",
            TableSlot::StaticEvalInvoke => "OMIT_JUMP_TABLE_CLASS_STATIC_EVAL_INVOKE",
            TableSlot::CallInfo => "OMIT_JUMP_TABLE_CLASS_CALL_INFO",
            TableSlot::StaticCallInfo => "OMIT_JUMP_TABLE_CLASS_STATIC_CALL_INFO",
        }
    }

    /// Full guard name for a class
    pub fn guard(self, class_id: &str) -> String {
        format!("{}_{}", self.omit_macro(), class_id)
    }
}

// ============================================================================
// Branches and fallthrough
// ============================================================================

/// What a matched branch does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchTarget {
    /// Forward the argument package to an invoke helper, e.g. `c_A::i_run`
    Invoke {
        /// Qualified helper name
        helper: String,
    },
    /// Hand back the static call-info record, e.g. `c_A::ci_run`
    CallInfo {
        /// Qualified record name
        record: String,
    },
    /// Run the method body for the interpreter
    Interpreted {
        /// Method body to call
        callee: String,
        /// Class-name argument for static bodies
        class_arg: Option<String>,
    },
}

/// One guarded case of a dispatch table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    /// Method name as declared
    pub name: String,
    /// Lower-cased name the guard is keyed by
    pub lname: String,
    /// Guard hash
    pub hash: u64,
    /// `hash & bucket_mask`
    pub bucket: u64,
    /// Guard also compares the literal name
    pub tie_break: bool,
    /// Method reached
    pub function: FunctionId,
    /// Code id of the class declaring the method
    pub owner: String,
    /// What the branch does
    pub target: BranchTarget,
}

/// Where a table goes when no branch matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallthrough {
    /// The statically known parent's function of the same slot
    Parent {
        /// Parent name, lower-cased
        class: String,
        /// Qualifier, e.g. `c_Base::`
        scope: String,
    },
    /// The parent object, only known at runtime
    ParentObject {
        /// Parent name, lower-cased
        class: String,
        /// `parent->` or `g->cso_<parent>->`
        expr: String,
    },
    /// The runtime's "no such method" handler
    RuntimeBase {
        /// Objects of this class wrap a dynamic parent
        dynamic_object: bool,
        /// Qualifier, e.g. `c_ObjectData::`
        scope: String,
    },
}

impl Fallthrough {
    /// Text placed before the callee symbol
    pub fn qualifier(&self) -> &str {
        match self {
            Fallthrough::Parent { scope, .. } => scope,
            Fallthrough::ParentObject { expr, .. } => expr,
            Fallthrough::RuntimeBase { scope, .. } => scope,
        }
    }

    /// Parent the call continues in, if any
    pub fn parent(&self) -> Option<&str> {
        match self {
            Fallthrough::Parent { class, .. } | Fallthrough::ParentObject { class, .. } => Some(class),
            Fallthrough::RuntimeBase { .. } => None,
        }
    }
}

/// Outcome of a simulated call through a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResolution<'t> {
    /// A guard matched
    Branch(&'t Branch),
    /// No guard matched
    Fallthrough(&'t Fallthrough),
}

// ============================================================================
// Dispatch table
// ============================================================================

/// One generated dispatch function
#[derive(Clone)]
pub struct DispatchTable {
    /// Class the function belongs to
    pub class: ClassId,
    /// Code id of that class
    pub class_id: String,
    /// Call kind served
    pub mode: DispatchMode,
    /// Called on a class name rather than an object
    pub static_only: bool,
    /// Few positional arguments instead of an array
    pub few_args: bool,
    /// Argument slots of the few-args signature
    pub few_args_count: usize,
    /// Function name, e.g. `o_invoke`
    pub symbol: String,
    /// Guarded cases, ordered by bucket then name
    pub branches: Vec<Branch>,
    /// Call made when no case matches
    pub fallthrough: Fallthrough,
    /// Mask applied to the hash in the `switch`
    pub bucket_mask: u64,
    /// Qualifier of the class, e.g. `c_Foo::`
    pub scope: String,
    /// Hash used to build the guards
    pub hasher: NameHasher,
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("class_id", &self.class_id)
            .field("mode", &self.mode)
            .field("static_only", &self.static_only)
            .field("few_args", &self.few_args)
            .field("symbol", &self.symbol)
            .field("branches", &self.names())
            .field("fallthrough", &self.fallthrough)
            .finish()
    }
}

impl DispatchTable {
    /// Entry point identity
    pub fn slot(&self) -> TableSlot {
        TableSlot::of(self.mode, self.static_only)
    }

    /// No guarded case
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Branch lower-cased names in table order
    pub fn names(&self) -> Vec<&str> {
        self.branches.iter().map(|b| b.lname.as_str()).collect()
    }

    /// Full callee of the fallthrough call
    pub fn fallthrough_callee(&self) -> String {
        format!("{}{}", self.fallthrough.qualifier(), self.symbol)
    }

    /// Follow the generated guards for `name`
    pub fn lookup(&self, name: &str) -> DispatchResolution<'_> {
        let lname = name.to_ascii_lowercase();
        let hash = (self.hasher)(&lname);
        let bucket = hash & self.bucket_mask;
        let hit = self
            .branches
            .iter()
            .filter(|b| b.bucket == bucket && b.hash == hash)
            .find(|b| !b.tie_break || b.lname == lname);
        match hit {
            Some(branch) => DispatchResolution::Branch(branch),
            None => DispatchResolution::Fallthrough(&self.fallthrough),
        }
    }

    fn signature(&self) -> String {
        let class_param = if self.static_only { "const char *c, " } else { "" };
        match (self.mode, self.few_args) {
            (DispatchMode::InstanceInvoke, true) => {
                let mut sig = format!(
                    "Variant {}{}(const char *s, int64 hash, int count",
                    self.scope, self.symbol
                );
                for i in 0..self.few_args_count {
                    sig.push_str(&format!(", CVarRef a{}", i));
                }
                sig.push_str(") {");
                sig
            }
            (DispatchMode::InstanceInvoke | DispatchMode::StaticInvoke, false) => format!(
                "Variant {}{}({}const char *s, CArrRef params, int64 hash, bool fatal) {{",
                self.scope, self.symbol, class_param
            ),
            (DispatchMode::InterpretedCallerInvoke, _) => format!(
                "Variant {}{}({}const char *s, Eval::VariableEnvironment &env, \
                 const Eval::FunctionCallExpression *caller, int64 hash, bool fatal) {{",
                self.scope, self.symbol, class_param
            ),
            (DispatchMode::CallInfoLookup, _) => format!(
                "bool {}{}(MethodCallPackage &mcp, int64 hash) {{",
                self.scope, self.symbol
            ),
            (DispatchMode::StaticInvoke, true) => format!(
                "Variant {}{}(const char *c, const char *s, int64 hash, int count) {{",
                self.scope, self.symbol
            ),
        }
    }

    fn fallthrough_args(&self) -> &'static str {
        match (self.mode, self.few_args, self.static_only) {
            (DispatchMode::CallInfoLookup, _, _) => "mcp, hash",
            (_, true, _) => "s, hash, count, INVOKE_FEW_ARGS_PASS_ARGS",
            (DispatchMode::InterpretedCallerInvoke, _, true) => "c, s, env, caller, hash, fatal",
            (DispatchMode::InterpretedCallerInvoke, _, false) => "s, env, caller, hash, fatal",
            (_, _, true) => "c, s, params, hash, fatal",
            (_, _, false) => "s, params, hash, fatal",
        }
    }

    fn render_branch(&self, w: &mut CodeWriter, branch: &Branch) {
        if branch.tie_break {
            w.indent_begin(format!(
                "HASH_GUARD_LITSTR({}, \"{}\") {{",
                hash_literal(branch.hash),
                branch.name
            ));
        } else {
            w.indent_begin(format!("HASH_GUARD({}, {}) {{", hash_literal(branch.hash), branch.lname));
        }
        match &branch.target {
            BranchTarget::Invoke { helper } => {
                w.line("MethodCallPackage mcp;");
                if self.static_only {
                    w.line("mcp.staticMethodCall(c, s);");
                } else {
                    w.line("mcp.methodCallEx(this, s);");
                    w.line("mcp.obj = this;");
                }
                if self.few_args {
                    w.line(format!("return {}(mcp, count, INVOKE_FEW_ARGS_PASS_ARGS);", helper));
                } else {
                    w.line(format!("return {}(mcp, params);", helper));
                }
            }
            BranchTarget::CallInfo { record } => {
                w.line(format!("mcp.ci = &{};", record));
                if !self.static_only {
                    w.line("mcp.obj = this;");
                }
                w.line("return true;");
            }
            BranchTarget::Interpreted { callee, class_arg } => match class_arg {
                Some(arg) => w.line(format!("return {}({}, env, caller);", callee, arg)),
                None => w.line(format!("return {}(env, caller);", callee)),
            },
        }
        w.indent_end("}");
    }

    /// Write the function, wrapped in its omit guard
    pub fn render(&self, w: &mut CodeWriter) {
        let guard = self.slot().guard(&self.class_id);
        w.ifndef_begin(&guard);
        w.indent_begin(self.signature());
        if self.mode == DispatchMode::CallInfoLookup {
            w.line("CStrRef s __attribute__((__unused__)) (mcp.name);");
        }
        if let Fallthrough::ParentObject { .. } = self.fallthrough {
            if self.static_only {
                w.line("DECLARE_GLOBAL_VARIABLES(g);");
            }
        }

        if !self.branches.is_empty() {
            w.indent_begin(format!("switch (hash & {}) {{", self.bucket_mask));
            let mut current = None;
            for branch in &self.branches {
                if current != Some(branch.bucket) {
                    if current.is_some() {
                        w.line("break;");
                        w.indent_end("");
                    }
                    w.indent_begin(format!("case {}:", branch.bucket));
                    current = Some(branch.bucket);
                }
                self.render_branch(w, branch);
            }
            w.line("break;");
            w.indent_end("");
            w.indent_end("}");
        }

        w.line(format!("return {}({});", self.fallthrough_callee(), self.fallthrough_args()));
        w.indent_end("}");
        w.ifndef_end(&guard);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_name_i;
    use crate::jump_table::JumpTable;

    fn table(names: &[&str], mode: DispatchMode, static_only: bool) -> DispatchTable {
        let jump = JumpTable::new(names.iter().copied(), hash_name_i);
        let branches = jump
            .entries()
            .iter()
            .enumerate()
            .map(|(i, e)| Branch {
                name: e.name.clone(),
                lname: e.lname.clone(),
                hash: e.hash,
                bucket: e.bucket,
                tie_break: e.tie_break,
                function: FunctionId(i as u32),
                owner: "Foo".to_string(),
                target: BranchTarget::Invoke {
                    helper: format!("c_Foo::i_{}", e.lname),
                },
            })
            .collect();
        DispatchTable {
            class: ClassId(0),
            class_id: "Foo".to_string(),
            mode,
            static_only,
            few_args: false,
            few_args_count: 6,
            symbol: if static_only { "os_invoke" } else { "o_invoke" }.to_string(),
            branches,
            fallthrough: Fallthrough::Parent {
                class: "base".to_string(),
                scope: "c_Base::".to_string(),
            },
            bucket_mask: jump.mask(),
            scope: "c_Foo::".to_string(),
            hasher: hash_name_i,
        }
    }

    #[test]
    fn test_slots() {
        assert_eq!(TableSlot::of(DispatchMode::InstanceInvoke, false), TableSlot::Invoke);
        assert_eq!(TableSlot::of(DispatchMode::CallInfoLookup, true), TableSlot::StaticCallInfo);
        assert_eq!(TableSlot::Invoke.guard("Foo"), "OMIT_JUMP_TABLE_CLASS_INVOKE_Foo");
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let t = table(&["foo", "bar"], DispatchMode::InstanceInvoke, false);
        match t.lookup("FOO") {
            DispatchResolution::Branch(b) => assert_eq!(b.lname, "foo"),
            other => panic!("expected branch, got {:?}", other),
        }
        match t.lookup("qux") {
            DispatchResolution::Fallthrough(f) => assert_eq!(f.parent(), Some("base")),
            other => panic!("expected fallthrough, got {:?}", other),
        }
        assert_eq!(t.fallthrough_callee(), "c_Base::o_invoke");
    }

    #[test]
    fn test_render_instance_invoke() {
        let t = table(&["foo"], DispatchMode::InstanceInvoke, false);
        let mut w = CodeWriter::new();
        t.render(&mut w);
        let out = w.finish();
        assert!(out.starts_with("#ifndef OMIT_JUMP_TABLE_CLASS_INVOKE_Foo\n"));
        assert!(out.contains("Variant c_Foo::o_invoke(const char *s, CArrRef params, int64 hash, bool fatal) {"));
        assert!(out.contains("switch (hash & 0) {"));
        assert!(out.contains(&format!("HASH_GUARD({}, foo) {{", hash_literal(hash_name_i("foo")))));
        assert!(out.contains("mcp.methodCallEx(this, s);"));
        assert!(out.contains("return c_Foo::i_foo(mcp, params);"));
        assert!(out.contains("return c_Base::o_invoke(s, params, hash, fatal);"));
        assert!(out.ends_with("#endif // OMIT_JUMP_TABLE_CLASS_INVOKE_Foo\n"));
    }

    #[test]
    fn test_render_empty_table_only_forwards() {
        let t = table(&[], DispatchMode::StaticInvoke, true);
        let mut w = CodeWriter::new();
        t.render(&mut w);
        let out = w.finish();
        assert!(!out.contains("switch"));
        assert!(out.contains("return c_Base::os_invoke(c, s, params, hash, fatal);"));
    }
}
