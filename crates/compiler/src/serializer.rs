//! CSS serializer
//!
//! Turns a normalized tree into CSS text. Nested blocks are indented one
//! level deeper than their owner and follow it on the next line.

use roole_syntax::{Fragment, Node, NodeKind};

use crate::options::Options;

/// Serialize a node with the default indent and precision
pub fn to_css(node: &Node) -> String {
    Serializer::default().serialize(node)
}

/// Round `value` to `precision` decimals and print it in shortest form
pub fn format_number(value: f64, precision: usize) -> String {
    let factor = 10f64.powi(precision as i32);
    let rounded = if factor.is_finite() {
        (value * factor).round() / factor
    } else {
        value
    };
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

/// CSS text generator
#[derive(Debug, Clone)]
pub struct Serializer {
    indent: String,
    precision: usize,
    level: usize,
}

impl Default for Serializer {
    fn default() -> Self {
        Self::new("\t", 3)
    }
}

impl Serializer {
    pub fn new(indent: impl Into<String>, precision: usize) -> Self {
        Self {
            indent: indent.into(),
            precision,
            level: 0,
        }
    }

    pub fn from_options(options: &Options) -> Self {
        Self::new(options.indent.clone(), options.precision)
    }

    fn indentation(&self) -> String {
        self.indent.repeat(self.level)
    }

    fn join(&mut self, nodes: &[Node], separator: &str) -> String {
        nodes
            .iter()
            .map(|node| self.serialize(node))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// `properties;` at the current level
    fn properties(&mut self, properties: &[Node]) -> String {
        let separator = format!(";\n{}", self.indentation());
        format!("{};", self.join(properties, &separator))
    }

    /// `{\n <body> \n}` with the body one level deeper
    fn block(&mut self, body: impl FnOnce(&mut Self) -> String) -> String {
        self.level += 1;
        let content = format!("{}{}", self.indentation(), body(self));
        self.level -= 1;
        format!(" {{\n{}\n{}}}", content, self.indentation())
    }

    /// Nodes emitted after a block, one level deeper
    fn nested(&mut self, nested: &[Node]) -> String {
        if nested.is_empty() {
            return String::new();
        }
        self.level += 1;
        let separator = format!("\n{}", self.indentation());
        let css = format!("{}{}", separator, self.join(nested, &separator));
        self.level -= 1;
        css
    }

    fn fragments(&mut self, fragments: &[Fragment]) -> String {
        fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Text(text) => text.clone(),
                Fragment::Splice(node) => self.serialize(node),
            })
            .collect()
    }

    pub fn serialize(&mut self, node: &Node) -> String {
        match &node.kind {
            NodeKind::Root { children, .. } => self.join(children, "\n\n"),
            NodeKind::Comment(text) => format!("/*{}*/", text),

            NodeKind::StyleRule { selectors, properties, nested } => {
                let separator = format!(",\n{}", self.indentation());
                let mut css = selectors.join(&separator);
                css += &self.block(|s| s.properties(properties));
                css += &self.nested(nested);
                css
            }
            NodeKind::MediaBlock { queries, rulesets, nested } => {
                let mut css = String::from("@media");
                css += &if queries.len() > 1 {
                    format!("\n{}", self.indentation())
                } else {
                    " ".to_string()
                };
                css += &queries.join(&format!(",\n{}", self.indentation()));
                css += &self.block(|s| {
                    let separator = format!("\n{}", s.indentation());
                    s.join(rulesets, &separator)
                });
                css += &self.nested(nested);
                css
            }
            NodeKind::Property { name, value, important } => {
                let mut css = format!("{}: {}", self.serialize(name), self.serialize(value));
                if *important {
                    css += " !important";
                }
                css
            }
            NodeKind::Import { url, media } => {
                let mut css = format!("@import {}", self.serialize(url));
                if let Some(media) = media {
                    css.push(' ');
                    css += &self.serialize(media);
                }
                css.push(';');
                css
            }
            NodeKind::Keyframes { prefix, name, keyframes } => {
                let mut css = String::from("@");
                if let Some(prefix) = prefix {
                    css += &format!("-{}-", prefix);
                }
                css += &format!("keyframes {}", self.serialize(name));
                css += &self.block(|s| {
                    let separator = format!("\n{}", s.indentation());
                    s.join(keyframes, &separator)
                });
                css
            }
            NodeKind::Keyframe { selectors, properties } => {
                let css = self.join(selectors, ", ");
                css + &self.block(|s| s.properties(properties))
            }
            NodeKind::KeyframeSelector(value) => self.serialize(value),
            NodeKind::FontFace(properties) => {
                let css = String::from("@font-face");
                css + &self.block(|s| s.properties(properties))
            }
            NodeKind::Charset(value) => format!("@charset {};", self.serialize(value)),

            // Selectors
            NodeKind::SelectorList(selectors) => {
                let separator = format!(",\n{}", self.indentation());
                self.join(selectors, &separator)
            }
            NodeKind::Selector(parts) => self.join(parts, ""),
            NodeKind::Combinator(value) if value == " " => value.clone(),
            NodeKind::Combinator(value) => format!(" {} ", value),
            NodeKind::TypeSelector(value) => self.serialize(value),
            NodeKind::UniversalSelector => "*".to_string(),
            NodeKind::AmpersandSelector => "&".to_string(),
            NodeKind::HashSelector(value) => format!("#{}", self.serialize(value)),
            NodeKind::ClassSelector(value) => format!(".{}", self.serialize(value)),
            NodeKind::AttributeSelector { name, operator, value } => {
                let mut css = format!("[{}", self.serialize(name));
                if let Some(operator) = operator {
                    css += operator;
                }
                if let Some(value) = value {
                    css += &self.serialize(value);
                }
                css.push(']');
                css
            }
            NodeKind::NegationSelector(argument) => format!(":not({})", self.serialize(argument)),
            NodeKind::PseudoSelector { value, doubled } => {
                let colons = if *doubled { "::" } else { ":" };
                format!("{}{}", colons, self.serialize(value))
            }
            NodeKind::PseudoArgument(elements) => self.join(elements, ""),
            NodeKind::SelectorInterpolation(value) => self.serialize(value),
            NodeKind::JoinedSelectorList { selectors, .. } => {
                selectors.join(&format!(",\n{}", self.indentation()))
            }

            // Media queries
            NodeKind::MediaQueryList(queries) => {
                let separator = format!(",\n{}", self.indentation());
                self.join(queries, &separator)
            }
            NodeKind::JoinedMediaQueryList(queries) => {
                queries.join(&format!(",\n{}", self.indentation()))
            }
            NodeKind::MediaQuery(parts) => self.join(parts, " and "),
            NodeKind::MediaInterpolation(value) => self.serialize(value),
            NodeKind::MediaType { modifier, value } => match modifier {
                Some(modifier) => format!("{} {}", modifier, self.serialize(value)),
                None => self.serialize(value),
            },
            NodeKind::MediaFeature { name, value } => match value {
                Some(value) => format!("({}: {})", self.serialize(name), self.serialize(value)),
                None => format!("({})", self.serialize(name)),
            },

            // Values
            NodeKind::List(items) => self.join(items, ""),
            NodeKind::Separator(value) if value == "," => ", ".to_string(),
            NodeKind::Separator(value) => value.clone(),
            NodeKind::Range { .. } => self.serialize(&node.range_to_list()),
            NodeKind::Variable(name) => format!("${}", name),
            NodeKind::Identifier(value) | NodeKind::Raw(value) => value.clone(),
            NodeKind::InterpolatedIdentifier(fragments) => self.fragments(fragments),
            NodeKind::String(string) => {
                let quote = string.quote.as_char();
                format!("{}{}{}", quote, string.value, quote)
            }
            NodeKind::InterpolatedString(fragments) => format!("\"{}\"", self.fragments(fragments)),
            NodeKind::Number(value) => format_number(*value, self.precision),
            NodeKind::Percentage(value) => format!("{}%", format_number(*value, self.precision)),
            NodeKind::Dimension { value, unit } => {
                format!("{}{}", format_number(*value, self.precision), unit)
            }
            NodeKind::Color(hex) => format!("#{}", hex),
            NodeKind::Url(value) => format!("url({})", self.serialize(value)),
            NodeKind::Function { name, arguments } => {
                format!("{}({})", name, self.join(arguments, ", "))
            }
            NodeKind::Boolean(value) => value.to_string(),
            NodeKind::Null => "null".to_string(),

            // Dynamic constructs never survive evaluation
            _ => {
                log::warn!("Unexpected {} node left at serialization", node.type_name());
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roole_syntax::{parse, SourceLocation};

    fn loc() -> SourceLocation {
        SourceLocation::default()
    }

    fn node(kind: NodeKind) -> Node {
        Node::new(kind, loc())
    }

    fn property(name: &str, value: Node) -> Node {
        node(NodeKind::Property {
            name: Box::new(Node::identifier(name, loc())),
            value: Box::new(value),
            important: false,
        })
    }

    fn style_rule(selectors: &[&str], properties: Vec<Node>, nested: Vec<Node>) -> Node {
        node(NodeKind::StyleRule {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            properties,
            nested,
        })
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.24, 3), "0.24");
        assert_eq!(format_number(1.0 / 3.0, 3), "0.333");
        assert_eq!(format_number(2.0, 3), "2");
        assert_eq!(format_number(-0.0, 3), "0");
        assert_eq!(format_number(-0.0001, 3), "0");
        assert_eq!(format_number(1.5, 0), "2");
    }

    #[test]
    fn test_unevaluated_rule_emits_nothing() {
        assert_eq!(to_css(&node(NodeKind::Block(Vec::new()))), "");
    }

    #[test]
    fn test_style_rule() {
        let rule = style_rule(
            &["body", "html"],
            vec![
                property("margin", Node::number(0.0, loc())),
                property("padding", node(NodeKind::Dimension { value: 1.0, unit: "px".into() })),
            ],
            Vec::new(),
        );
        assert_eq!(
            to_css(&rule),
            "body,\nhtml {\n\tmargin: 0;\n\tpadding: 1px;\n}"
        );
    }

    #[test]
    fn test_nested_rules_are_indented() {
        let inner = style_rule(&["body div"], vec![property("a", Node::number(1.0, loc()))], Vec::new());
        let rule = style_rule(&["body"], vec![property("b", Node::number(2.0, loc()))], vec![inner]);
        assert_eq!(
            to_css(&rule),
            "body {\n\tb: 2;\n}\n\tbody div {\n\t\ta: 1;\n\t}"
        );
    }

    #[test]
    fn test_media_block_with_several_queries() {
        let rule = style_rule(&["body"], vec![property("width", Node::identifier("auto", loc()))], Vec::new());
        let media = node(NodeKind::MediaBlock {
            queries: vec!["screen".into(), "print".into()],
            rulesets: vec![rule],
            nested: Vec::new(),
        });
        assert_eq!(
            to_css(&media),
            "@media\nscreen,\nprint {\n\tbody {\n\t\twidth: auto;\n\t}\n}"
        );
    }

    #[test]
    fn test_custom_indent_and_precision() {
        let rule = style_rule(&["a"], vec![property("b", Node::number(0.12345, loc()))], Vec::new());
        assert_eq!(Serializer::new("  ", 2).serialize(&rule), "a {\n  b: 0.12;\n}");
    }

    #[test]
    fn test_selector_parts() {
        let root = parse("a > b.c#d[e=f]:not(.g)::h, i j {}", "").unwrap();
        let NodeKind::Root { children, .. } = &root.kind else {
            panic!("Expected root");
        };
        let NodeKind::Ruleset { selector_list, .. } = &children[0].kind else {
            panic!("Expected ruleset");
        };
        assert_eq!(to_css(selector_list), "a > b.c#d[e=f]:not(.g)::h,\ni j");
    }

    #[test]
    fn test_values() {
        let root = parse(
            "a { b: 'x' url(a.png) 1px/2 #fff, f(1, 50%) !important; }",
            "",
        )
        .unwrap();
        let NodeKind::Root { children, .. } = &root.kind else {
            panic!("Expected root");
        };
        let NodeKind::Ruleset { rules, .. } = &children[0].kind else {
            panic!("Expected ruleset");
        };
        assert_eq!(to_css(&rules[0]), "b: 'x' url(a.png) 1px/2 #fff, f(1, 50%) !important");
    }

    #[test]
    fn test_media_query_parts() {
        let root = parse("@media only screen and (max-width: 980px) and (color) {}", "").unwrap();
        let NodeKind::Root { children, .. } = &root.kind else {
            panic!("Expected root");
        };
        let NodeKind::Media { query_list, .. } = &children[0].kind else {
            panic!("Expected media");
        };
        assert_eq!(to_css(query_list), "only screen and (max-width: 980px) and (color)");
    }

    #[test]
    fn test_keyframes() {
        let keyframe = node(NodeKind::Keyframe {
            selectors: vec![
                node(NodeKind::KeyframeSelector(Box::new(Node::identifier("from", loc())))),
                node(NodeKind::KeyframeSelector(Box::new(node(NodeKind::Percentage(50.0))))),
            ],
            properties: vec![property("top", Node::number(0.0, loc()))],
        });
        let keyframes = node(NodeKind::Keyframes {
            prefix: Some("moz".into()),
            name: Box::new(Node::identifier("name", loc())),
            keyframes: vec![keyframe],
        });
        assert_eq!(
            to_css(&keyframes),
            "@-moz-keyframes name {\n\tfrom, 50% {\n\t\ttop: 0;\n\t}\n}"
        );
    }
}
