//! Normalizer
//!
//! Reshapes the extended tree into the groups CSS can express: a ruleset
//! becomes a style rule holding its properties with nested rules after it,
//! and a media holds style rules. Properties directly inside a media are
//! wrapped in a style rule for the enclosing selectors, medias inside a
//! media-scoped ruleset bubble up beside it, and unextended `@void`
//! rulesets disappear.

use roole_syntax::{Node, NodeKind, SourceLocation};
use smallvec::{smallvec, SmallVec};

use crate::error::{CompileError, CompileResult};
use crate::serializer::to_css;

type Nodes = SmallVec<[Node; 1]>;

/// Normalize an extended tree
pub fn normalize(root: Node) -> CompileResult<Node> {
    let mut normalizer = Normalizer::default();
    let mut nodes = normalizer.visit(root)?;
    let loc = nodes.first().map(|node| node.loc).unwrap_or_default();
    Ok(nodes.pop().unwrap_or_else(|| Node::null(loc)))
}

#[derive(Debug, Default)]
struct Normalizer {
    file_path: String,
    depth: usize,
    parent_selectors: Option<Vec<String>>,
    in_media: bool,
    in_void: bool,
}

impl Normalizer {
    fn visit_all(&mut self, nodes: Vec<Node>) -> CompileResult<Vec<Node>> {
        let mut output = Vec::with_capacity(nodes.len());
        for node in nodes {
            output.extend(self.visit(node)?);
        }
        Ok(output)
    }

    fn visit(&mut self, node: Node) -> CompileResult<Nodes> {
        let loc = node.loc;
        match node.kind {
            NodeKind::Root { file_path, children } => {
                let outer = std::mem::replace(&mut self.file_path, file_path.clone());
                self.depth += 1;
                let children = self.visit_all(children);
                self.depth -= 1;
                self.file_path = outer;

                let children = children?;
                if self.depth > 0 && children.is_empty() {
                    return Ok(Nodes::new());
                }
                Ok(smallvec![Node::new(NodeKind::Root { file_path, children }, loc)])
            }
            NodeKind::Ruleset { selector_list, rules } => self.visit_ruleset(*selector_list, rules, loc),
            NodeKind::Media { query_list, rules } => self.visit_media(*query_list, rules, loc),
            NodeKind::Void(children) => {
                let outer = std::mem::replace(&mut self.in_void, true);
                let children = self.visit_all(children);
                self.in_void = outer;
                Ok(Nodes::from_vec(children?))
            }
            kind => Ok(smallvec![Node::new(kind, loc)]),
        }
    }

    fn visit_ruleset(&mut self, selector_list: Node, rules: Vec<Node>, loc: SourceLocation) -> CompileResult<Nodes> {
        let selectors = match selector_list.kind {
            NodeKind::JoinedSelectorList { selectors, extended, .. } => {
                if self.in_void {
                    if extended.is_empty() {
                        return Ok(Nodes::new());
                    }
                    extended
                } else {
                    selectors
                }
            }
            kind => vec![to_css(&Node::new(kind, selector_list.loc))],
        };

        let outer = std::mem::replace(&mut self.parent_selectors, Some(selectors.clone()));
        let rules = self.visit_all(rules);
        self.parent_selectors = outer;

        let (properties, mut nested): (Vec<Node>, Vec<Node>) = rules?
            .into_iter()
            .partition(|rule| matches!(rule.kind, NodeKind::Property { .. }));
        if properties.is_empty() {
            return Ok(Nodes::from_vec(nested));
        }

        let mut bubbled = Vec::new();
        if self.in_media {
            let (medias, others): (Vec<Node>, Vec<Node>) = nested
                .into_iter()
                .partition(|rule| matches!(rule.kind, NodeKind::MediaBlock { .. }));
            bubbled = medias;
            nested = others;
        }

        let rule = Node::new(NodeKind::StyleRule { selectors, properties, nested }, loc);
        let mut output: Nodes = smallvec![rule];
        output.extend(bubbled);
        Ok(output)
    }

    fn visit_media(&mut self, query_list: Node, rules: Vec<Node>, loc: SourceLocation) -> CompileResult<Nodes> {
        let queries = match query_list.kind {
            NodeKind::JoinedMediaQueryList(queries) => queries,
            kind => vec![to_css(&Node::new(kind, query_list.loc))],
        };

        let outer = std::mem::replace(&mut self.in_media, true);
        let rules = self.visit_all(rules);
        self.in_media = outer;

        let mut properties = Vec::new();
        let mut rulesets = Vec::new();
        let mut nested = Vec::new();
        for rule in rules? {
            match rule.kind {
                NodeKind::Property { .. } => properties.push(rule),
                NodeKind::StyleRule { .. } => rulesets.push(rule),
                _ => nested.push(rule),
            }
        }

        if !properties.is_empty() {
            let Some(selectors) = self.parent_selectors.clone() else {
                return Err(CompileError::Semantic {
                    message: "@media containing properties is not allowed at the top level".to_string(),
                    location: loc,
                    file_path: self.file_path.clone(),
                });
            };
            let rule = NodeKind::StyleRule {
                selectors,
                properties,
                nested: Vec::new(),
            };
            rulesets.insert(0, Node::new(rule, loc));
        }

        if rulesets.is_empty() {
            return Ok(Nodes::from_vec(nested));
        }
        Ok(smallvec![Node::new(NodeKind::MediaBlock { queries, rulesets, nested }, loc)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate;
    use crate::extender::extend;
    use roole_syntax::parse;

    fn normalized(input: &str) -> CompileResult<Node> {
        normalize(extend(evaluate(parse(input, "").unwrap())?)?)
    }

    fn css(input: &str) -> String {
        to_css(&normalized(input).unwrap())
    }

    #[test]
    fn test_properties_before_nested_rules() {
        assert_eq!(
            css("a { b { c: d; } e: f; }"),
            "a {\n\te: f;\n}\n\ta b {\n\t\tc: d;\n\t}"
        );
    }

    #[test]
    fn test_ruleset_without_properties_is_spliced() {
        assert_eq!(css("a { b { c: d; } }"), "a b {\n\tc: d;\n}");
    }

    #[test]
    fn test_media_properties_use_enclosing_selectors() {
        assert_eq!(
            css("a { @media screen { b: c; } }"),
            "@media screen {\n\ta {\n\t\tb: c;\n\t}\n}"
        );
    }

    #[test]
    fn test_media_properties_at_top_level() {
        let err = normalized("@media screen { width: auto; }").unwrap_err();
        assert_eq!(err.message(), "@media containing properties is not allowed at the top level");
        assert_eq!((err.line(), err.column()), (1, 1));
    }

    #[test]
    fn test_medias_bubble_out_of_media_scoped_rulesets() {
        let input = "@media screen { body { width: auto; @media (color) { @media (monochrome) { height: auto; } } div { height: auto; } } @media (monochrome) { p { margin: 0; } } }";
        assert_eq!(
            css(input),
            "@media screen {\n\tbody {\n\t\twidth: auto;\n\t}\n\t\tbody div {\n\t\t\theight: auto;\n\t\t}\n}\n\t@media screen and (color) and (monochrome) {\n\t\tbody {\n\t\t\theight: auto;\n\t\t}\n\t}\n\t@media screen and (monochrome) {\n\t\tp {\n\t\t\tmargin: 0;\n\t\t}\n\t}"
        );
    }

    #[test]
    fn test_unextended_void_rulesets_dropped() {
        assert_eq!(css("@void { .a { b: c; } }"), "");
        assert_eq!(
            css("@void { .btn { b: c; } }\n.x { @extend .btn; }"),
            ".x {\n\tb: c;\n}"
        );
    }

    #[test]
    fn test_empty_imported_root_removed() {
        let root = Node::new(
            NodeKind::Root {
                file_path: String::new(),
                children: vec![Node::new(
                    NodeKind::Root {
                        file_path: "empty.roo".to_string(),
                        children: Vec::new(),
                    },
                    Default::default(),
                )],
            },
            Default::default(),
        );
        let NodeKind::Root { children, .. } = normalize(root).unwrap().kind else {
            panic!("Expected root");
        };
        assert!(children.is_empty());
    }
}
