//! Selector and media query grammar

use crate::node::{Node, NodeKind};
use crate::parser::Parser;

impl<'a> Parser<'a> {
    pub(crate) fn selector_list(&mut self) -> Option<Node> {
        let start = self.pos;
        let selectors = self.separated(Self::selector, Self::comma)?;
        Some(Node::new(NodeKind::SelectorList(selectors), self.loc(start)))
    }

    pub(crate) fn selector(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let mut parts = Vec::new();
            if let Some(combinator) = p.attempt(|p| {
                let combinator = p.non_space_combinator()?;
                p.skip_whitespace();
                Some(combinator)
            }) {
                parts.push(combinator);
            }

            parts.extend(p.simple_selector()?);
            while let Some((combinator, simple)) = p.attempt(|p| {
                let combinator = p.combinator()?;
                let simple = p.simple_selector()?;
                Some((combinator, simple))
            }) {
                parts.push(combinator);
                parts.extend(simple);
            }

            Some(Node::new(NodeKind::Selector(parts), p.loc(start)))
        })
    }

    fn non_space_combinator(&mut self) -> Option<Node> {
        let start = self.pos;
        let c = self.eat_if(|c| matches!(c, '>' | '+' | '~'))?;
        Some(Node::new(NodeKind::Combinator(c.to_string()), self.loc(start)))
    }

    fn combinator(&mut self) -> Option<Node> {
        self.attempt(|p| {
            p.skip_whitespace();
            let combinator = p.non_space_combinator()?;
            p.skip_whitespace();
            Some(combinator)
        })
        .or_else(|| {
            let start = self.pos;
            self.whitespace()
                .then(|| Node::new(NodeKind::Combinator(" ".to_string()), self.loc(start)))
        })
    }

    /// A base or suffix selector followed by any number of suffixes
    fn simple_selector(&mut self) -> Option<Vec<Node>> {
        let first = self.base_selector().or_else(|| self.suffix_selector())?;
        let mut parts = vec![first];
        while let Some(suffix) = self.suffix_selector() {
            parts.push(suffix);
        }
        Some(parts)
    }

    fn base_selector(&mut self) -> Option<Node> {
        let start = self.pos;
        if let Some(variable) = self.variable() {
            let kind = NodeKind::SelectorInterpolation(Box::new(variable));
            return Some(Node::new(kind, self.loc(start)));
        }
        self.type_selector()
            .or_else(|| self.universal_selector())
            .or_else(|| {
                self.eat('&')
                    .then(|| Node::new(NodeKind::AmpersandSelector, self.loc(start)))
            })
    }

    fn type_selector(&mut self) -> Option<Node> {
        let start = self.pos;
        let value = self.identifier()?;
        Some(Node::new(NodeKind::TypeSelector(Box::new(value)), self.loc(start)))
    }

    fn universal_selector(&mut self) -> Option<Node> {
        let start = self.pos;
        self.eat('*')
            .then(|| Node::new(NodeKind::UniversalSelector, self.loc(start)))
    }

    fn suffix_selector(&mut self) -> Option<Node> {
        self.hash_selector()
            .or_else(|| self.class_selector())
            .or_else(|| self.attribute_selector())
            .or_else(|| self.negation_selector())
            .or_else(|| self.pseudo_selector())
    }

    fn hash_selector(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect('#')?;
            let value = p.identifier()?;
            Some(Node::new(NodeKind::HashSelector(Box::new(value)), p.loc(start)))
        })
    }

    fn class_selector(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect('.')?;
            let value = p.identifier()?;
            Some(Node::new(NodeKind::ClassSelector(Box::new(value)), p.loc(start)))
        })
    }

    fn attribute_selector(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect('[')?;
            p.skip_whitespace();
            let name = p.identifier()?;
            let matcher = p.attempt(|p| {
                p.skip_whitespace();
                let operator = ["^=", "$=", "*=", "~=", "|=", "="]
                    .into_iter()
                    .find(|op| p.eat_str(op))?;
                p.skip_whitespace();
                let value = p.list()?;
                Some((operator.to_string(), value))
            });
            p.skip_whitespace();
            p.expect(']')?;

            let (operator, value) = match matcher {
                Some((operator, value)) => (Some(operator), Some(Box::new(value))),
                None => (None, None),
            };
            let kind = NodeKind::AttributeSelector {
                name: Box::new(name),
                operator,
                value,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn negation_selector(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci(":not")?;
            p.expect('(')?;
            p.skip_whitespace();
            let argument = p
                .class_selector()
                .or_else(|| p.type_selector())
                .or_else(|| p.attribute_selector())
                .or_else(|| p.pseudo_selector())
                .or_else(|| p.hash_selector())
                .or_else(|| p.universal_selector())?;
            p.skip_whitespace();
            p.expect(')')?;
            Some(Node::new(NodeKind::NegationSelector(Box::new(argument)), p.loc(start)))
        })
    }

    fn pseudo_selector(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect(':')?;
            let doubled = p.eat(':');
            let value = p.pseudo_function().or_else(|| p.identifier())?;
            let kind = NodeKind::PseudoSelector {
                value: Box::new(value),
                doubled,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn pseudo_function(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let name = p.raw_identifier()?;
            p.expect('(')?;
            p.skip_whitespace();
            let argument_start = p.pos;
            let elements = p.separated(Self::pseudo_element, Self::blank)?;
            let argument = Node::new(NodeKind::PseudoArgument(elements), p.loc(argument_start));
            p.skip_whitespace();
            p.expect(')')?;
            let kind = NodeKind::Function {
                name,
                arguments: vec![argument],
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn pseudo_element(&mut self) -> Option<Node> {
        let start = self.pos;
        if let Some(sign) = self.eat_if(|c| c == '-' || c == '+') {
            return Some(Node::new(NodeKind::Raw(sign.to_string()), self.loc(start)));
        }
        self.dimension()
            .or_else(|| self.number())
            .or_else(|| self.string())
            .or_else(|| self.identifier())
    }

    pub(crate) fn media_query_list(&mut self) -> Option<Node> {
        let start = self.pos;
        let queries = self.separated(Self::media_query, Self::comma)?;
        Some(Node::new(NodeKind::MediaQueryList(queries), self.loc(start)))
    }

    pub(crate) fn media_query(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let first = p
                .media_interpolation()
                .or_else(|| p.media_type())
                .or_else(|| p.media_feature())?;
            let mut parts = vec![first];
            while let Some(part) = p.attempt(|p| {
                p.skip_whitespace();
                p.expect_keyword("and")?;
                p.skip_whitespace();
                p.media_interpolation().or_else(|| p.media_feature())
            }) {
                parts.push(part);
            }
            Some(Node::new(NodeKind::MediaQuery(parts), p.loc(start)))
        })
    }

    fn media_interpolation(&mut self) -> Option<Node> {
        let start = self.pos;
        let variable = self.variable()?;
        Some(Node::new(NodeKind::MediaInterpolation(Box::new(variable)), self.loc(start)))
    }

    fn media_type(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let modifier = p.attempt(|p| {
                let modifier = p.expect_keyword("only").or_else(|| p.expect_keyword("not"))?;
                p.skip_whitespace();
                Some(modifier.to_string())
            });
            let value = p.identifier()?;
            let kind = NodeKind::MediaType {
                modifier,
                value: Box::new(value),
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn media_feature(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect('(')?;
            p.skip_whitespace();
            let name = p.identifier()?;
            p.skip_whitespace();
            let value = p.attempt(|p| {
                p.expect(':')?;
                p.skip_whitespace();
                let value = p.list()?;
                p.skip_whitespace();
                Some(value)
            });
            p.expect(')')?;
            let kind = NodeKind::MediaFeature {
                name: Box::new(name),
                value: value.map(Box::new),
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SourceLocation;
    use crate::node::{Node, NodeKind};
    use crate::parser::{parse_media_query, parse_selector};

    fn selector_parts(input: &str) -> Vec<Node> {
        match parse_selector(input, "", SourceLocation::default()).map(|node| node.kind) {
            Ok(NodeKind::Selector(parts)) => parts,
            other => panic!("Expected selector, got {:?}", other),
        }
    }

    fn query_parts(input: &str) -> Vec<Node> {
        match parse_media_query(input, "", SourceLocation::default()).map(|node| node.kind) {
            Ok(NodeKind::MediaQuery(parts)) => parts,
            other => panic!("Expected media query, got {:?}", other),
        }
    }

    #[test]
    fn test_compound_selector() {
        let parts = selector_parts("div.a#b:hover");
        assert_eq!(parts.len(), 4);
        assert!(matches!(parts[0].kind, NodeKind::TypeSelector(_)));
        assert!(matches!(parts[1].kind, NodeKind::ClassSelector(_)));
        assert!(matches!(parts[2].kind, NodeKind::HashSelector(_)));
        assert!(matches!(parts[3].kind, NodeKind::PseudoSelector { doubled: false, .. }));
    }

    #[test]
    fn test_combinators() {
        let parts = selector_parts("ul > li  a+b");
        let combinators: Vec<&str> = parts
            .iter()
            .filter_map(|part| match &part.kind {
                NodeKind::Combinator(value) => Some(value.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(combinators, vec![">", " ", "+"]);
    }

    #[test]
    fn test_leading_combinator() {
        let parts = selector_parts("> div");
        assert!(matches!(&parts[0].kind, NodeKind::Combinator(value) if value == ">"));
        assert!(matches!(parts[1].kind, NodeKind::TypeSelector(_)));
    }

    #[test]
    fn test_ampersand_and_universal() {
        let parts = selector_parts("& *");
        assert_eq!(parts.len(), 3);
        assert!(matches!(parts[0].kind, NodeKind::AmpersandSelector));
        assert!(matches!(parts[2].kind, NodeKind::UniversalSelector));
    }

    #[test]
    fn test_attribute_selector() {
        let parts = selector_parts("input[type = 'text']");
        assert!(matches!(
            &parts[1].kind,
            NodeKind::AttributeSelector { operator: Some(op), value: Some(_), .. } if op == "="
        ));
        let parts = selector_parts("a[href^=http]");
        assert!(matches!(&parts[1].kind, NodeKind::AttributeSelector { operator: Some(op), .. } if op == "^="));
    }

    #[test]
    fn test_negation_and_pseudo_function() {
        let parts = selector_parts("li:not(.a):nth-child(2n+1)::before");
        assert!(matches!(parts[1].kind, NodeKind::NegationSelector(_)));
        let NodeKind::PseudoSelector { value, .. } = &parts[2].kind else {
            panic!("Expected pseudo selector");
        };
        let NodeKind::Function { name, arguments } = &value.kind else {
            panic!("Expected pseudo function");
        };
        assert_eq!(name, "nth-child");
        assert!(matches!(&arguments[0].kind, NodeKind::PseudoArgument(elements) if elements.len() == 3));
        assert!(matches!(parts[3].kind, NodeKind::PseudoSelector { doubled: true, .. }));
    }

    #[test]
    fn test_selector_interpolation() {
        let parts = selector_parts("$sel .a");
        assert!(matches!(parts[0].kind, NodeKind::SelectorInterpolation(_)));
    }

    #[test]
    fn test_media_query_parts() {
        let parts = query_parts("only screen and (max-width: 100px) and $feature");
        assert!(matches!(&parts[0].kind, NodeKind::MediaType { modifier: Some(m), .. } if m == "only"));
        assert!(matches!(parts[1].kind, NodeKind::MediaFeature { value: Some(_), .. }));
        assert!(matches!(parts[2].kind, NodeKind::MediaInterpolation(_)));
    }

    #[test]
    fn test_media_feature_without_value() {
        let parts = query_parts("(color)");
        assert!(matches!(parts[0].kind, NodeKind::MediaFeature { value: None, .. }));
    }
}
