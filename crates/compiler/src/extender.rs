//! Extender
//!
//! Joins nested selectors and media queries into flat strings, then
//! applies every `@extend` in document order.
//!
//! Joining runs first over the whole tree and records where each `@extend`
//! sits. Applying an `@extend` only looks at rulesets that precede it inside
//! its boundary (the nearest `@void` or imported file), so the walk stops as
//! soon as it reaches the directive itself.

use std::ops::ControlFlow;

use roole_syntax::{Node, NodeKind};

use crate::error::{CompileError, CompileResult};
use crate::serializer::to_css;

/// Join selectors and media queries and resolve `@extend`s
pub fn extend(mut root: Node) -> CompileResult<Node> {
    let mut joiner = Joiner::default();
    joiner.visit(&mut root)?;

    log::debug!("Applying {} @extend directive(s)", joiner.sites.len());
    for site in &joiner.sites {
        site.apply(&mut root)?;
    }

    strip_extends(&mut root);
    Ok(root)
}

/// Enclosing media of an `@extend`
#[derive(Debug, Clone)]
struct MediaContext {
    path: Vec<usize>,
    queries: Vec<String>,
}

/// An `@extend` and the context it was found in
#[derive(Debug)]
struct ExtendSite {
    id: usize,
    /// Path of the nearest root or `@void`
    boundary: Vec<usize>,
    media: Option<MediaContext>,
    /// Joined selectors of the enclosing ruleset
    parents: Option<Vec<String>>,
    inside_void: bool,
    targets: Vec<String>,
    all: bool,
    file_path: String,
}

// -------------------------------------------------------------------------
// Joining

#[derive(Debug, Default)]
struct Joiner {
    sites: Vec<ExtendSite>,
    file_path: String,
    path: Vec<usize>,
    boundary: Vec<usize>,
    media: Option<MediaContext>,
    parents: Option<Vec<String>>,
    inside_void: bool,
}

impl Joiner {
    fn visit_children(&mut self, children: &mut [Node]) -> CompileResult<()> {
        for (i, child) in children.iter_mut().enumerate() {
            self.path.push(i);
            let result = self.visit(child);
            self.path.pop();
            result?;
        }
        Ok(())
    }

    fn visit(&mut self, node: &mut Node) -> CompileResult<()> {
        match &mut node.kind {
            NodeKind::Root { file_path, children } => {
                let outer_path = std::mem::replace(&mut self.file_path, file_path.clone());
                let outer_boundary = std::mem::replace(&mut self.boundary, self.path.clone());
                let result = self.visit_children(children);
                self.file_path = outer_path;
                self.boundary = outer_boundary;
                result
            }
            NodeKind::Void(children) => {
                let outer_boundary = std::mem::replace(&mut self.boundary, self.path.clone());
                let outer_void = std::mem::replace(&mut self.inside_void, true);
                let result = self.visit_children(children);
                self.boundary = outer_boundary;
                self.inside_void = outer_void;
                result
            }
            NodeKind::Ruleset { selector_list, rules } => {
                let original = match &mut selector_list.kind {
                    NodeKind::SelectorList(selectors) => std::mem::take(selectors),
                    _ => return Ok(()),
                };
                let selectors = join_selectors(&original, self.parents.as_deref(), &self.file_path)?;
                log::trace!("Joined selectors {:?}", selectors);
                selector_list.kind = NodeKind::JoinedSelectorList {
                    selectors: selectors.clone(),
                    original,
                    extended: Vec::new(),
                };

                let outer = std::mem::replace(&mut self.parents, Some(selectors));
                let result = self.visit_children(rules);
                self.parents = outer;
                result
            }
            NodeKind::Media { query_list, rules } => {
                let NodeKind::MediaQueryList(queries) = &query_list.kind else {
                    return Ok(());
                };
                let queries = join_media_queries(queries, self.media.as_ref().map(|m| m.queries.as_slice()));
                query_list.kind = NodeKind::JoinedMediaQueryList(queries.clone());

                let context = MediaContext {
                    path: self.path.clone(),
                    queries,
                };
                let outer = std::mem::replace(&mut self.media, Some(context));
                let result = self.visit_children(rules);
                self.media = outer;
                result
            }
            NodeKind::Extend { selector_list, all, id } => {
                *id = self.sites.len() + 1;
                let targets = match &selector_list.kind {
                    NodeKind::SelectorList(selectors) => selectors.iter().map(to_css).collect(),
                    _ => Vec::new(),
                };
                self.sites.push(ExtendSite {
                    id: *id,
                    boundary: self.boundary.clone(),
                    media: self.media.clone(),
                    parents: self.parents.clone(),
                    inside_void: self.inside_void,
                    targets,
                    all: *all,
                    file_path: self.file_path.clone(),
                });
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Join every selector under every parent, parent-major
fn join_selectors(selectors: &[Node], parents: Option<&[String]>, file_path: &str) -> CompileResult<Vec<String>> {
    match parents {
        Some(parents) => {
            let mut joined = Vec::with_capacity(parents.len() * selectors.len());
            for parent in parents {
                for selector in selectors {
                    joined.push(join_selector(selector, Some(parent), file_path)?);
                }
            }
            Ok(joined)
        }
        None => selectors
            .iter()
            .map(|selector| join_selector(selector, None, file_path))
            .collect(),
    }
}

/// Flatten a selector under its parent selector
///
/// `&` stands for the parent. A selector starting with a combinator is
/// appended to the parent directly, any other one after a space.
fn join_selector(selector: &Node, parent: Option<&str>, file_path: &str) -> CompileResult<String> {
    let NodeKind::Selector(parts) = &selector.kind else {
        return Ok(to_css(selector));
    };

    let mut text = String::new();
    let mut has_ampersand = false;
    let mut starts_with_combinator = false;
    for (i, part) in parts.iter().enumerate() {
        match &part.kind {
            NodeKind::AmpersandSelector => {
                let Some(parent) = parent else {
                    return Err(CompileError::semantic(
                        "& selector is not allowed at the top level",
                        part,
                        file_path,
                    ));
                };
                has_ampersand = true;
                text.push_str(parent);
            }
            NodeKind::Combinator(_) if i == 0 => {
                if parent.is_none() {
                    return Err(CompileError::semantic(
                        "selector starting with a combinator is not allowed at the top level",
                        part,
                        file_path,
                    ));
                }
                starts_with_combinator = true;
                text.push_str(&to_css(part));
            }
            _ => text.push_str(&to_css(part)),
        }
    }

    Ok(match parent {
        _ if has_ampersand => text,
        Some(parent) if starts_with_combinator => format!("{}{}", parent, text),
        Some(parent) => format!("{} {}", parent, text),
        None => text,
    })
}

/// `parent and child` for every pair, parent-major
fn join_media_queries(queries: &[Node], parents: Option<&[String]>) -> Vec<String> {
    let compiled: Vec<String> = queries.iter().map(to_css).collect();
    match parents {
        Some(parents) => parents
            .iter()
            .flat_map(|parent| compiled.iter().map(move |query| format!("{} and {}", parent, query)))
            .collect(),
        None => compiled,
    }
}

// -------------------------------------------------------------------------
// Extending

/// Node at `path`, following rule lists from `root`
fn node_at_mut<'a>(mut node: &'a mut Node, path: &[usize]) -> Option<&'a mut Node> {
    for &index in path {
        node = node.rules_mut()?.get_mut(index)?;
    }
    Some(node)
}

impl ExtendSite {
    fn apply(&self, root: &mut Node) -> CompileResult<()> {
        let Some(parents) = &self.parents else {
            return Ok(());
        };

        let scopes = match &self.media {
            Some(media) => {
                let Some(boundary) = node_at_mut(root, &self.boundary) else {
                    return Ok(());
                };
                let mut found = Vec::new();
                let mut path = self.boundary.clone();
                if let Some(children) = boundary.rules_mut() {
                    // Break only marks that the directive's own media was reached
                    if filter_media(children, &mut path, media, &mut found).is_break() {
                        log::trace!("Media search for @extend stopped at {:?}", media.path);
                    }
                }
                found
            }
            None => vec![self.boundary.clone()],
        };

        for target in &self.targets {
            for scope in &scopes {
                let Some(children) = node_at_mut(root, scope).and_then(Node::rules_mut) else {
                    continue;
                };
                if self.extend_rulesets(children, target, parents)?.is_break() {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Find rulesets matching `target` and extend them with `parents`
    fn extend_rulesets(&self, nodes: &mut [Node], target: &str, parents: &[String]) -> CompileResult<ControlFlow<()>> {
        for node in nodes {
            let flow = match &mut node.kind {
                NodeKind::Root { children, .. } | NodeKind::Void(children) => {
                    self.extend_rulesets(children, target, parents)?
                }
                NodeKind::Extend { id, .. } if *id == self.id => ControlFlow::Break(()),
                NodeKind::Ruleset { selector_list, rules } => {
                    let NodeKind::JoinedSelectorList { selectors, .. } = &selector_list.kind else {
                        continue;
                    };
                    let matched = if self.all {
                        selectors.iter().find(|selector| selector.contains(target)).map(|selector| {
                            parents
                                .iter()
                                .map(|parent| selector.replace(target, parent))
                                .collect::<Vec<_>>()
                        })
                    } else {
                        selectors
                            .iter()
                            .any(|selector| selector == target)
                            .then(|| parents.to_vec())
                    };
                    match matched {
                        Some(extended) => {
                            log::trace!("Extending {} with {:?}", target, extended);
                            self.append_selectors(selector_list, &extended);
                            self.extend_nested(rules, &extended)?
                        }
                        None => self.extend_rulesets(rules, target, parents)?,
                    }
                }
                _ => ControlFlow::Continue(()),
            };
            if flow.is_break() {
                return Ok(flow);
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    /// Extend the rulesets nested in a matched ruleset
    fn extend_nested(&self, nodes: &mut [Node], parents: &[String]) -> CompileResult<ControlFlow<()>> {
        for node in nodes {
            let flow = match &mut node.kind {
                NodeKind::Root { children, .. } | NodeKind::Media { rules: children, .. } => {
                    self.extend_nested(children, parents)?
                }
                NodeKind::Extend { id, .. } if *id == self.id => ControlFlow::Break(()),
                NodeKind::Ruleset { selector_list, rules } => {
                    let NodeKind::JoinedSelectorList { original, .. } = &selector_list.kind else {
                        continue;
                    };
                    let joined = join_selectors(original, Some(parents), &self.file_path)?;
                    self.append_selectors(selector_list, &joined);
                    self.extend_nested(rules, &joined)?
                }
                _ => ControlFlow::Continue(()),
            };
            if flow.is_break() {
                return Ok(flow);
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn append_selectors(&self, selector_list: &mut Node, additions: &[String]) {
        if let NodeKind::JoinedSelectorList { selectors, extended, .. } = &mut selector_list.kind {
            selectors.extend_from_slice(additions);
            if !self.inside_void {
                extended.extend_from_slice(additions);
            }
        }
    }
}

/// Collect the medias an `@extend` inside `media` may reach
///
/// Medias with the same queries are collected without descending. The
/// walk ends at the extend's own media.
fn filter_media(
    nodes: &[Node],
    path: &mut Vec<usize>,
    media: &MediaContext,
    found: &mut Vec<Vec<usize>>,
) -> ControlFlow<()> {
    for (i, node) in nodes.iter().enumerate() {
        path.push(i);
        let flow = match &node.kind {
            NodeKind::Root { children, .. }
            | NodeKind::Void(children)
            | NodeKind::Ruleset { rules: children, .. } => filter_media(children, path, media, found),
            NodeKind::Media { query_list, rules } => {
                if *path == media.path {
                    found.push(path.clone());
                    ControlFlow::Break(())
                } else if matches!(&query_list.kind, NodeKind::JoinedMediaQueryList(q) if *q == media.queries) {
                    found.push(path.clone());
                    ControlFlow::Continue(())
                } else {
                    filter_media(rules, path, media, found)
                }
            }
            _ => ControlFlow::Continue(()),
        };
        path.pop();
        if flow.is_break() {
            return flow;
        }
    }
    ControlFlow::Continue(())
}

/// Remove resolved `@extend` nodes
fn strip_extends(node: &mut Node) {
    if let Some(rules) = node.rules_mut() {
        rules.retain(|rule| !matches!(rule.kind, NodeKind::Extend { .. }));
        rules.iter_mut().for_each(strip_extends);
    }
}
