//! Import resolution
//!
//! Replaces every `@import` of a local stylesheet with the parsed tree of
//! that file. A file is imported at most once per compile; later imports of
//! the same path are dropped, which also breaks import cycles.

use futures_util::future::{BoxFuture, FutureExt};
use roole_loader::Loader;
use roole_syntax::{parse, Alternative, Node, NodeKind};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{CompileError, CompileResult};
use crate::path::{dirname, join_paths};

/// Resolves imports against a loader
pub struct Importer<'a> {
    loader: &'a dyn Loader,
    /// Known sources keyed by resolved path; loaded files are added here
    imports: &'a mut FxHashMap<String, String>,
    imported: FxHashSet<String>,
}

impl<'a> Importer<'a> {
    pub fn new(loader: &'a dyn Loader, imports: &'a mut FxHashMap<String, String>) -> Self {
        Self {
            loader,
            imports,
            imported: FxHashSet::default(),
        }
    }

    /// Resolve every import reachable from `root`
    pub async fn import(mut self, root: Node) -> CompileResult<Node> {
        let loc = root.loc;
        let root = self.import_node(root, String::new()).await?;
        Ok(root.unwrap_or_else(|| Node::null(loc)))
    }

    fn import_rules(&mut self, rules: Vec<Node>, file_path: String) -> BoxFuture<'_, CompileResult<Vec<Node>>> {
        async move {
            let mut output = Vec::with_capacity(rules.len());
            for rule in rules {
                output.extend(self.import_node(rule, file_path.clone()).await?);
            }
            Ok(output)
        }
        .boxed()
    }

    /// Resolve imports in and below `node`
    ///
    /// Yields no node when the node was a duplicate import.
    fn import_node(&mut self, mut node: Node, file_path: String) -> BoxFuture<'_, CompileResult<Option<Node>>> {
        async move {
            if matches!(node.kind, NodeKind::Import { .. }) {
                return self.import_file(node, &file_path).await;
            }

            let loc = node.loc;
            match &mut node.kind {
                NodeKind::Root { file_path: own_path, children } => {
                    let own_path = own_path.clone();
                    *children = self.import_rules(std::mem::take(children), own_path).await?;
                }
                NodeKind::Ruleset { rules, .. }
                | NodeKind::Media { rules, .. }
                | NodeKind::Module { rules, .. }
                | NodeKind::For { rules, .. }
                | NodeKind::Void(rules)
                | NodeKind::Block(rules) => {
                    *rules = self.import_rules(std::mem::take(rules), file_path).await?;
                }
                NodeKind::If { consequence, alternative, .. } => {
                    *consequence = self.import_rules(std::mem::take(consequence), file_path.clone()).await?;
                    match alternative {
                        Some(Alternative::ElseIf(branch)) => {
                            let taken = std::mem::replace(branch.as_mut(), Node::null(loc));
                            if let Some(imported) = self.import_node(taken, file_path).await? {
                                **branch = imported;
                            }
                        }
                        Some(Alternative::Else(rules)) => {
                            *rules = self.import_rules(std::mem::take(rules), file_path).await?;
                        }
                        None => {}
                    }
                }
                NodeKind::Assignment { value, .. } => {
                    if let NodeKind::Mixin { rules, .. } | NodeKind::UserFunction { rules, .. } = &mut value.kind {
                        *rules = self.import_rules(std::mem::take(rules), file_path).await?;
                    }
                }
                _ => {}
            }
            Ok(Some(node))
        }
        .boxed()
    }

    async fn import_file(&mut self, node: Node, file_path: &str) -> CompileResult<Option<Node>> {
        let NodeKind::Import { url, media } = &node.kind else {
            return Ok(Some(node));
        };
        if media.is_some() {
            return Ok(Some(node));
        }
        let NodeKind::String(string) = &url.kind else {
            return Ok(Some(node));
        };
        if has_protocol(&string.value) {
            return Ok(Some(node));
        }

        let mut path = string.value.clone();
        if !has_extension(&path) {
            path.push_str(".roo");
        }
        let path = join_paths(dirname(file_path), &path);

        if !self.imported.insert(path.clone()) {
            log::debug!("Dropping duplicate import of {}", path);
            return Ok(None);
        }

        let source = match self.imports.get(&path) {
            Some(source) => source.clone(),
            None => {
                let source = self.loader.load(&path).await.map_err(|source| CompileError::Import {
                    source,
                    location: node.loc,
                    file_path: file_path.to_string(),
                })?;
                self.imports.insert(path.clone(), source.clone());
                source
            }
        };
        log::debug!("Importing {}", path);

        let root = parse(&source, &path)?;
        self.import_node(root, path).await
    }
}

/// `scheme://...`
fn has_protocol(path: &str) -> bool {
    match path.find("://") {
        Some(index) if index > 0 => path[..index]
            .chars()
            .all(|c| c == '_' || c.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// Ends in `.ext` with an alphabetic extension
fn has_extension(path: &str) -> bool {
    match path.rfind('.') {
        Some(index) => {
            let extension = &path[index + 1..];
            !extension.is_empty() && extension.chars().all(|c| c.is_ascii_alphabetic())
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roole_loader::MemoryLoader;

    fn root_children(node: &Node) -> &[Node] {
        match &node.kind {
            NodeKind::Root { children, .. } => children,
            _ => panic!("Expected root, got {}", node.type_name()),
        }
    }

    async fn import(input: &str, loader: MemoryLoader) -> CompileResult<Node> {
        let mut imports = FxHashMap::default();
        let root = parse(input, "").unwrap();
        Importer::new(&loader, &mut imports).import(root).await
    }

    #[test]
    fn test_path_checks() {
        assert!(has_protocol("http://example.com/style"));
        assert!(!has_protocol("://style"));
        assert!(!has_protocol("lib/base"));
        assert!(has_extension("base.css"));
        assert!(!has_extension("base"));
        assert!(!has_extension("v1.2/base"));
    }

    #[tokio::test]
    async fn test_import_replaced_by_root() {
        let loader = MemoryLoader::new().with("base.roo", "body { margin: 0; }");
        let root = import("@import 'base';", loader).await.unwrap();
        let children = root_children(&root);
        assert_eq!(children.len(), 1);
        assert!(matches!(&children[0].kind, NodeKind::Root { file_path, .. } if file_path == "base.roo"));
    }

    #[tokio::test]
    async fn test_imports_left_in_place() {
        let input = "@import url(base);\n@import 'http://example.com/style';\n@import 'base' screen;";
        let root = import(input, MemoryLoader::new()).await.unwrap();
        let children = root_children(&root);
        assert_eq!(children.len(), 3);
        assert!(children.iter().all(|child| matches!(child.kind, NodeKind::Import { .. })));
    }

    #[tokio::test]
    async fn test_relative_to_importing_file() {
        let loader = MemoryLoader::new()
            .with("tabs/index.roo", "@import 'tab';")
            .with("tabs/tab.roo", ".tab { float: left; }");
        let root = import("@import 'tabs/index';", loader).await.unwrap();
        let index = &root_children(&root)[0];
        let tab = &root_children(index)[0];
        assert!(matches!(&tab.kind, NodeKind::Root { file_path, .. } if file_path == "tabs/tab.roo"));
    }

    #[tokio::test]
    async fn test_duplicate_and_cyclic_imports_dropped() {
        let loader = MemoryLoader::new()
            .with("a.roo", "@import 'b';")
            .with("b.roo", "@import 'a';");
        let root = import("@import 'a';\n@import 'b';", loader).await.unwrap();
        let children = root_children(&root);
        assert_eq!(children.len(), 1);
        let b = &root_children(&children[0])[0];
        assert!(root_children(b).is_empty());
    }

    #[tokio::test]
    async fn test_nested_imports_resolved() {
        let loader = MemoryLoader::new().with("base.roo", "a { b: c; }");
        let root = import("html { @if true { @import 'base'; } }", loader).await.unwrap();
        let NodeKind::Ruleset { rules, .. } = &root_children(&root)[0].kind else {
            panic!("Expected ruleset");
        };
        let NodeKind::If { consequence, .. } = &rules[0].kind else {
            panic!("Expected if");
        };
        assert!(matches!(consequence[0].kind, NodeKind::Root { .. }));
    }

    #[tokio::test]
    async fn test_sources_are_recorded() {
        let loader = MemoryLoader::new().with("base.roo", "a { b: c; }");
        let mut imports = FxHashMap::default();
        let root = parse("@import 'base';", "").unwrap();
        Importer::new(&loader, &mut imports).import(root).await.unwrap();
        assert_eq!(imports.get("base.roo").map(String::as_str), Some("a { b: c; }"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_at_import() {
        let err = import("\n  @import 'missing';", MemoryLoader::new()).await.unwrap_err();
        assert!(matches!(err, CompileError::Import { .. }));
        assert_eq!((err.line(), err.column()), (2, 3));
    }

    #[tokio::test]
    async fn test_syntax_error_in_imported_file() {
        let loader = MemoryLoader::new().with("base.roo", "body # {");
        let err = import("@import 'base';", loader).await.unwrap_err();
        assert_eq!((err.line(), err.column()), (1, 7));
        assert_eq!(err.file_path(), "base.roo");
    }
}
