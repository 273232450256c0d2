use serde::{Deserialize, Serialize};

/// Feature flags controlling preprocessing and which lowering passes run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FrontendOptions {
    /// Accept `import lazy { .. } from "m"`.
    pub lazy_imports: bool,
    /// Lower ambient index signatures to `$_get`/`$_set` members.
    pub ambient_indexers: bool,
    /// Pack trailing call arguments into the callee's rest array.
    pub rest_arguments: bool,
    /// Bind `export default <expr>` to a named module variable.
    pub default_export_binding: bool,
}

impl Default for FrontendOptions {
    fn default() -> Self {
        Self {
            lazy_imports: true,
            ambient_indexers: true,
            rest_arguments: true,
            default_export_binding: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_everything() {
        let options = FrontendOptions::default();
        assert!(options.lazy_imports);
        assert!(options.ambient_indexers);
        assert!(options.rest_arguments);
        assert!(options.default_export_binding);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let options: FrontendOptions = serde_json::from_str(r#"{ "restArguments": false }"#).unwrap();
        assert!(!options.rest_arguments);
        assert!(options.ambient_indexers);
    }
}
