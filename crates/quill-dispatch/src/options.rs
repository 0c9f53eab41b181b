//! Code generation options

use serde::{Deserialize, Serialize};

/// Identifier prefixes used in generated code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Naming {
    /// Class type, e.g. `c_Foo`
    pub class: String,
    /// Instance method body
    pub method: String,
    /// Static method body
    pub method_impl: String,
    /// Invoke helper taking a parameter array
    pub invoke: String,
    /// Invoke helper taking few positional arguments
    pub invoke_few_args: String,
    /// Static call-info record
    pub call_info: String,
    /// Static dispatch entry points (`os_invoke`, ...)
    pub object_static: String,
    /// Instance dispatch entry points (`o_invoke`, ...)
    pub object: String,
    /// Object factory
    pub create_object: String,
    /// Object factory that skips the constructor
    pub create_object_only: String,
    /// Per-class statics object reachable through globals
    pub class_statics_object: String,
    /// Class wrapper
    pub class_wrapper: String,
    /// Smart pointer type
    pub smart_ptr: String,
}

impl Default for Naming {
    fn default() -> Self {
        Self {
            class: "c_".to_string(),
            method: "t_".to_string(),
            method_impl: "ti_".to_string(),
            invoke: "i_".to_string(),
            invoke_few_args: "ifa_".to_string(),
            call_info: "ci_".to_string(),
            object_static: "os_".to_string(),
            object: "o_".to_string(),
            create_object: "co_".to_string(),
            create_object_only: "coo_".to_string(),
            class_statics_object: "cso_".to_string(),
            class_wrapper: "cw_".to_string(),
            smart_ptr: "p_".to_string(),
        }
    }
}

/// Options consulted by the dispatch builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchOptions {
    /// Build invoke tables from the merged hierarchy rather than the class alone
    pub flatten_invoke: bool,

    /// Largest minimum arity routed through the few-args table
    #[serde(default = "default_invoke_few_args_count")]
    pub invoke_few_args_count: usize,

    /// Generating the built-in runtime: every non-abstract method is eligible
    pub system_output: bool,

    /// Emit tables for calls arriving from the interpreter
    pub enable_eval: bool,

    /// Separator between a redeclared class name and its index
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Identifier prefixes
    pub naming: Naming,
}

fn default_invoke_few_args_count() -> usize {
    6
}

fn default_id_prefix() -> String {
    "$$".to_string()
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            flatten_invoke: false,
            invoke_few_args_count: default_invoke_few_args_count(),
            system_output: false,
            enable_eval: false,
            id_prefix: default_id_prefix(),
            naming: Naming::default(),
        }
    }
}
