//! Compile options

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Compile configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Path of the main input, used to resolve relative imports
    pub file_path: String,
    /// Sources of imported files keyed by resolved path
    pub imports: FxHashMap<String, String>,
    /// Vendor prefixes to generate
    pub prefix: Vec<String>,
    /// Indentation unit of the generated CSS
    pub indent: String,
    /// Decimal places numbers are rounded to
    pub precision: usize,
    /// Skip generating prefixed properties that are already declared
    pub skip_prefixed: bool,
    /// Rewrite located error messages to show the offending source
    pub pretty_error: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            file_path: String::new(),
            imports: FxHashMap::default(),
            prefix: ["webkit", "moz", "ms", "o"].map(String::from).to_vec(),
            indent: "\t".to_string(),
            precision: 3,
            skip_prefixed: false,
            pretty_error: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert_eq!(options.prefix, vec!["webkit", "moz", "ms", "o"]);
        assert_eq!(options.indent, "\t");
        assert_eq!(options.precision, 3);
        assert!(!options.skip_prefixed);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options: Options =
            serde_json::from_str(r#"{"indent": "  ", "skipPrefixed": true, "prefix": ["webkit"]}"#)
                .unwrap();
        assert_eq!(options.indent, "  ");
        assert!(options.skip_prefixed);
        assert_eq!(options.prefix, vec!["webkit"]);
        assert_eq!(options.precision, 3);
        assert!(options.imports.is_empty());
    }
}
