//! Vendor prefixer
//!
//! Adds vendor-prefixed copies of properties, `linear-gradient()` values
//! and `@keyframes` in front of the unprefixed originals.

use roole_syntax::{Node, NodeKind, SourceLocation};
use rustc_hash::FxHashSet;
use smallvec::{smallvec, SmallVec};

use crate::options::Options;

type Nodes = SmallVec<[Node; 1]>;

/// Prefix a normalized tree
pub fn prefix(root: Node, options: &Options) -> Node {
    let mut prefixer = Prefixer::new(options.prefix.clone(), options.skip_prefixed);
    let loc = root.loc;
    prefixer.visit(root).pop().unwrap_or_else(|| Node::null(loc))
}

/// Engines a property name is prefixed for
enum NamePrefixes {
    Only(&'static [&'static str]),
    /// Every configured prefix
    All,
}

fn name_prefixes(name: &str) -> Option<NamePrefixes> {
    match name {
        "box-sizing" | "box-shadow" | "border-radius" => Some(NamePrefixes::Only(&["webkit", "moz"])),
        "user-select" => Some(NamePrefixes::Only(&["webkit", "moz", "ms"])),
        "transition" | "transition-duration" | "transition-property" => {
            Some(NamePrefixes::Only(&["webkit", "moz", "o"]))
        }
        "transform" => Some(NamePrefixes::All),
        _ => None,
    }
}

const GRADIENT_PREFIXES: &[&str] = &["webkit", "moz", "o"];
const KEYFRAMES_PREFIXES: &[&str] = &["webkit", "moz", "o"];

#[derive(Debug)]
pub struct Prefixer {
    prefixes: Vec<String>,
    skip_prefixed: bool,
}

impl Prefixer {
    pub fn new(prefixes: Vec<String>, skip_prefixed: bool) -> Self {
        Self { prefixes, skip_prefixed }
    }

    /// Configured prefixes that are also in `allowed`, in configured order
    fn intersect(&self, allowed: &[&str]) -> Vec<String> {
        self.prefixes
            .iter()
            .filter(|prefix| allowed.contains(&prefix.as_str()))
            .cloned()
            .collect()
    }

    fn visit_all(&mut self, nodes: Vec<Node>) -> Vec<Node> {
        nodes.into_iter().flat_map(|node| self.visit(node)).collect()
    }

    fn visit(&mut self, node: Node) -> Nodes {
        let loc = node.loc;
        let kind = match node.kind {
            NodeKind::Root { file_path, children } => NodeKind::Root {
                file_path,
                children: self.visit_all(children),
            },
            NodeKind::StyleRule { selectors, properties, nested } => NodeKind::StyleRule {
                selectors,
                properties: self.prefix_properties(properties),
                nested: self.visit_all(nested),
            },
            NodeKind::MediaBlock { queries, rulesets, nested } => NodeKind::MediaBlock {
                queries,
                rulesets: self.visit_all(rulesets),
                nested: self.visit_all(nested),
            },
            NodeKind::Keyframes { prefix: None, name, keyframes } => {
                return self.prefix_keyframes(*name, keyframes, loc);
            }
            kind => kind,
        };
        smallvec![Node::new(kind, loc)]
    }

    /// One prefixed copy per engine, each prefixing its properties for that
    /// engine only, followed by the original
    fn prefix_keyframes(&mut self, name: Node, keyframes: Vec<Node>, loc: SourceLocation) -> Nodes {
        let mut output = Nodes::new();
        let configured = self.prefixes.clone();
        for prefix in self.intersect(KEYFRAMES_PREFIXES) {
            self.prefixes = vec![prefix.clone()];
            let keyframes = keyframes
                .iter()
                .cloned()
                .map(|keyframe| self.visit_keyframe(keyframe))
                .collect();
            let kind = NodeKind::Keyframes {
                prefix: Some(prefix),
                name: Box::new(name.clone()),
                keyframes,
            };
            output.push(Node::new(kind, loc));
        }
        self.prefixes = configured;

        let kind = NodeKind::Keyframes {
            prefix: None,
            name: Box::new(name),
            keyframes,
        };
        output.push(Node::new(kind, loc));
        output
    }

    fn visit_keyframe(&self, keyframe: Node) -> Node {
        let loc = keyframe.loc;
        match keyframe.kind {
            NodeKind::Keyframe { selectors, properties } => {
                let properties = self.prefix_properties(properties);
                Node::new(NodeKind::Keyframe { selectors, properties }, loc)
            }
            kind => Node::new(kind, loc),
        }
    }

    fn prefix_properties(&self, properties: Vec<Node>) -> Vec<Node> {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        if self.skip_prefixed {
            seen.extend(properties.iter().filter_map(property_name).map(str::to_string));
        }

        let mut output = Vec::with_capacity(properties.len());
        for property in properties {
            output.extend(self.prefix_property(&property, &mut seen));
            output.push(property);
        }
        output
    }

    /// Prefixed variants of a property
    fn prefix_property(&self, property: &Node, seen: &mut FxHashSet<String>) -> Vec<Node> {
        let NodeKind::Property { name: name_node, value, important } = &property.kind else {
            return Vec::new();
        };
        let Some(name) = property_name(property) else {
            return Vec::new();
        };

        if name == "background" || name == "background-image" {
            if !has_linear_gradient(value) {
                return Vec::new();
            }
            return self
                .intersect(GRADIENT_PREFIXES)
                .iter()
                .map(|prefix| {
                    let mut value = (**value).clone();
                    prefix_gradients(&mut value, prefix);
                    let kind = NodeKind::Property {
                        name: name_node.clone(),
                        value: Box::new(value),
                        important: *important,
                    };
                    Node::new(kind, property.loc)
                })
                .collect();
        }

        let prefixes = match name_prefixes(name) {
            Some(NamePrefixes::Only(allowed)) => self.intersect(allowed),
            Some(NamePrefixes::All) => self.prefixes.clone(),
            None => return Vec::new(),
        };
        let mut variants = Vec::new();
        for prefix in prefixes {
            let prefixed = format!("-{}-{}", prefix, name);
            if self.skip_prefixed && seen.contains(&prefixed) {
                log::trace!("Skipping {}, already present", prefixed);
                continue;
            }
            if self.skip_prefixed {
                seen.insert(prefixed.clone());
            }
            let kind = NodeKind::Property {
                name: Box::new(Node::identifier(prefixed, name_node.loc)),
                value: value.clone(),
                important: *important,
            };
            variants.push(Node::new(kind, property.loc));
        }
        variants
    }
}

fn property_name(property: &Node) -> Option<&str> {
    match &property.kind {
        NodeKind::Property { name, .. } => name.text(),
        _ => None,
    }
}

fn has_linear_gradient(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Function { name, .. } if name == "linear-gradient" => true,
        NodeKind::Function { arguments: items, .. } | NodeKind::List(items) => items.iter().any(has_linear_gradient),
        _ => false,
    }
}

/// Rename every `linear-gradient()` to its prefixed form
///
/// Legacy prefixed syntax takes the starting side rather than the `to`
/// destination, so `to top left` becomes `bottom right`.
fn prefix_gradients(node: &mut Node, prefix: &str) {
    match &mut node.kind {
        NodeKind::Function { name, arguments } if name.as_str() == "linear-gradient" => {
            *name = format!("-{}-linear-gradient", prefix);
            let Some(NodeKind::List(items)) = arguments.first_mut().map(|first| &mut first.kind) else {
                return;
            };
            if !matches!(items.first().map(|item| &item.kind), Some(NodeKind::Identifier(word)) if word == "to") {
                return;
            }
            items.drain(..2.min(items.len()));
            for item in items.iter_mut() {
                if let NodeKind::Identifier(side) = &mut item.kind {
                    let opposite = match side.as_str() {
                        "top" => "bottom",
                        "bottom" => "top",
                        "left" => "right",
                        "right" => "left",
                        _ => continue,
                    };
                    *side = opposite.to_string();
                }
            }
        }
        NodeKind::Function { arguments: items, .. } | NodeKind::List(items) => {
            for item in items.iter_mut() {
                prefix_gradients(item, prefix);
            }
        }
        _ => {}
    }
}
