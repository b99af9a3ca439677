//! Expression and literal grammar
//!
//! Precedence from loosest to tightest: list separators, `or`, `and`,
//! `is`/`isnt`, relational, range, additive, multiplicative, unary.

use crate::node::{
    ArithmeticOp, EqualityOp, Fragment, LogicalOp, Node, NodeKind, Quote, RelationalOp,
    StringValue, UnaryOp,
};
use crate::parser::{is_name_char, is_name_start, Parser};

impl<'a> Parser<'a> {
    /// Items separated by commas, slashes or whitespace
    pub(crate) fn list(&mut self) -> Option<Node> {
        self.list_with(Self::separator)
    }

    /// Items separated by slashes or whitespace
    pub(crate) fn non_comma_list(&mut self) -> Option<Node> {
        self.list_with(Self::non_comma_separator)
    }

    fn list_with(&mut self, separator: fn(&mut Self) -> Option<Node>) -> Option<Node> {
        let start = self.pos;
        let first = self.logical_or()?;
        let mut items = vec![first];
        while let Some((sep, item)) = self.attempt(|p| {
            let sep = separator(p)?;
            let item = p.logical_or()?;
            Some((sep, item))
        }) {
            items.push(sep);
            items.push(item);
        }

        if items.len() == 1 {
            items.pop()
        } else {
            Some(Node::new(NodeKind::List(items), self.loc(start)))
        }
    }

    fn separator(&mut self) -> Option<Node> {
        self.attempt(|p| {
            p.skip_whitespace();
            let start = p.pos;
            p.expect(',')?;
            p.skip_whitespace();
            Some(Node::new(NodeKind::Separator(",".to_string()), p.loc(start)))
        })
        .or_else(|| self.non_comma_separator())
    }

    fn non_comma_separator(&mut self) -> Option<Node> {
        let start = self.pos;
        let value = if self.eat('/') {
            "/"
        } else if self.whitespace() {
            " "
        } else {
            return None;
        };
        Some(Node::new(NodeKind::Separator(value.to_string()), self.loc(start)))
    }

    /// Left-associative chain of `operand (operator operand)*`
    fn binary_chain<O>(
        &mut self,
        operand: fn(&mut Self) -> Option<Node>,
        operator: fn(&mut Self) -> Option<O>,
        build: fn(Box<Node>, O, Box<Node>) -> NodeKind,
    ) -> Option<Node> {
        let start = self.pos;
        let mut node = operand(self)?;
        while let Some((op, right)) = self.attempt(|p| {
            let op = operator(p)?;
            let right = operand(p)?;
            Some((op, right))
        }) {
            node = Node::new(build(Box::new(node), op, Box::new(right)), self.loc(start));
        }
        Some(node)
    }

    /// Keyword operator surrounded by optional whitespace
    fn word_operator(&mut self, word: &str) -> Option<()> {
        self.skip_whitespace();
        self.expect_keyword(word)?;
        self.skip_whitespace();
        Some(())
    }

    fn logical_or(&mut self) -> Option<Node> {
        self.binary_chain(
            Self::logical_and,
            |p| p.word_operator("or").map(|_| LogicalOp::Or),
            |left, operator, right| NodeKind::Logical { left, operator, right },
        )
    }

    fn logical_and(&mut self) -> Option<Node> {
        self.binary_chain(
            Self::equality,
            |p| p.word_operator("and").map(|_| LogicalOp::And),
            |left, operator, right| NodeKind::Logical { left, operator, right },
        )
    }

    fn equality(&mut self) -> Option<Node> {
        self.binary_chain(
            Self::relational,
            |p| {
                p.attempt(|p| p.word_operator("isnt").map(|_| EqualityOp::Isnt))
                    .or_else(|| p.attempt(|p| p.word_operator("is").map(|_| EqualityOp::Is)))
            },
            |left, operator, right| NodeKind::Equality { left, operator, right },
        )
    }

    fn relational(&mut self) -> Option<Node> {
        self.binary_chain(
            Self::range,
            |p| {
                p.skip_whitespace();
                let angle = p.eat_if(|c| c == '<' || c == '>')?;
                let inclusive = p.eat('=');
                p.skip_whitespace();
                Some(match (angle, inclusive) {
                    ('<', false) => RelationalOp::Lt,
                    ('<', true) => RelationalOp::Le,
                    (_, false) => RelationalOp::Gt,
                    (_, true) => RelationalOp::Ge,
                })
            },
            |left, operator, right| NodeKind::Relational { left, operator, right },
        )
    }

    fn range(&mut self) -> Option<Node> {
        let start = self.pos;
        let from = self.additive()?;
        let rest = self.attempt(|p| {
            p.skip_whitespace();
            p.expect_str("..")?;
            let exclusive = p.eat('.');
            p.skip_whitespace();
            let to = p.additive()?;
            Some((exclusive, to))
        });
        match rest {
            Some((exclusive, to)) => {
                let kind = NodeKind::Range {
                    from: Box::new(from),
                    exclusive,
                    to: Box::new(to),
                };
                Some(Node::new(kind, self.loc(start)))
            }
            None => Some(from),
        }
    }

    pub(crate) fn additive(&mut self) -> Option<Node> {
        self.binary_chain(
            Self::multiplicative,
            |p| {
                let sign = p
                    .attempt(|p| {
                        p.skip_whitespace();
                        let sign = p.eat_if(|c| c == '+' || c == '-')?;
                        p.whitespace().then_some(sign)
                    })
                    .or_else(|| p.eat_if(|c| c == '+' || c == '-'))?;
                Some(if sign == '+' { ArithmeticOp::Add } else { ArithmeticOp::Subtract })
            },
            |left, operator, right| NodeKind::Arithmetic { left, operator, right },
        )
    }

    fn multiplicative(&mut self) -> Option<Node> {
        self.binary_chain(
            Self::unary,
            |p| {
                p.attempt(|p| {
                    p.skip_whitespace();
                    p.expect('/')?;
                    p.whitespace().then_some(ArithmeticOp::Divide)
                })
                .or_else(|| {
                    p.attempt(|p| {
                        if !p.whitespace() {
                            return None;
                        }
                        p.expect('/')?;
                        p.skip_whitespace();
                        Some(ArithmeticOp::Divide)
                    })
                })
                .or_else(|| {
                    p.attempt(|p| {
                        p.skip_whitespace();
                        p.expect('*')?;
                        p.skip_whitespace();
                        Some(ArithmeticOp::Multiply)
                    })
                })
            },
            |left, operator, right| NodeKind::Arithmetic { left, operator, right },
        )
    }

    fn unary(&mut self) -> Option<Node> {
        self.primary().or_else(|| {
            self.attempt(|p| {
                let start = p.pos;
                let sign = p.eat_if(|c| c == '+' || c == '-')?;
                let operand = p.unary()?;
                let operator = if sign == '+' { UnaryOp::Plus } else { UnaryOp::Minus };
                let kind = NodeKind::Unary {
                    operator,
                    operand: Box::new(operand),
                };
                Some(Node::new(kind, p.loc(start)))
            })
        })
    }

    fn primary(&mut self) -> Option<Node> {
        self.parenthesized()
            .or_else(|| self.variable_or_call())
            .or_else(|| self.percentage())
            .or_else(|| self.dimension())
            .or_else(|| self.number())
            .or_else(|| self.color())
            .or_else(|| self.url())
            .or_else(|| self.function())
            .or_else(|| self.boolean())
            .or_else(|| self.null())
            .or_else(|| self.identifier())
            .or_else(|| self.string())
    }

    fn parenthesized(&mut self) -> Option<Node> {
        self.attempt(|p| {
            p.expect('(')?;
            p.skip_whitespace();
            let list = p.list()?;
            p.skip_whitespace();
            p.expect(')')?;
            Some(list)
        })
    }

    fn variable_or_call(&mut self) -> Option<Node> {
        let start = self.pos;
        let variable = self.variable()?;
        match self.call_arguments() {
            Some(arguments) => {
                let kind = NodeKind::Call {
                    callee: Box::new(variable),
                    arguments,
                };
                Some(Node::new(kind, self.loc(start)))
            }
            None => Some(variable),
        }
    }

    /// `( argumentList? )` directly after a callee
    pub(crate) fn call_arguments(&mut self) -> Option<Vec<Node>> {
        self.attempt(|p| {
            p.expect('(')?;
            p.skip_whitespace();
            let arguments = p.argument_list().unwrap_or_default();
            p.skip_whitespace();
            p.expect(')')?;
            Some(arguments)
        })
    }

    fn argument_list(&mut self) -> Option<Vec<Node>> {
        self.separated(Self::non_comma_list, Self::comma)
    }

    pub(crate) fn variable(&mut self) -> Option<Node> {
        let start = self.pos;
        let name = self.variable_name()?;
        Some(Node::new(NodeKind::Variable(name), self.loc(start)))
    }

    pub(crate) fn variable_name(&mut self) -> Option<String> {
        self.attempt(|p| {
            p.expect('$')?;
            p.raw_identifier()
        })
    }

    /// `{$name}`
    fn interpolation(&mut self) -> Option<Node> {
        self.attempt(|p| {
            p.expect('{')?;
            p.skip_whitespace();
            let variable = p.variable()?;
            p.skip_whitespace();
            p.expect('}')?;
            Some(variable)
        })
    }

    pub(crate) fn raw_identifier(&mut self) -> Option<String> {
        self.attempt(|p| {
            let start = p.pos;
            p.eat('-');
            p.eat_if(is_name_start)?;
            p.eat_while(is_name_char);
            Some(p.input_slice(start).to_string())
        })
    }

    /// Identifier made of raw runs and variable splices
    ///
    /// A lone splice yields the variable itself.
    pub(crate) fn identifier(&mut self) -> Option<Node> {
        let start = self.pos;
        let mut fragments = Vec::new();
        loop {
            if let Some(text) = self.raw_identifier() {
                push_text(&mut fragments, &text);
                continue;
            }
            let splice = self.attempt(|p| {
                let dash = p.eat('-');
                let variable = p.variable().or_else(|| p.interpolation())?;
                Some((dash, variable))
            });
            match splice {
                Some((dash, variable)) => {
                    if dash {
                        push_text(&mut fragments, "-");
                    }
                    fragments.push(Fragment::Splice(variable));
                }
                None => break,
            }
        }

        let loc = self.loc(start);
        let kind = match fragments.len() {
            0 => return None,
            1 => match fragments.remove(0) {
                Fragment::Splice(variable) => return Some(variable),
                Fragment::Text(text) => NodeKind::Identifier(text),
            },
            _ => NodeKind::InterpolatedIdentifier(fragments),
        };
        Some(Node::new(kind, loc))
    }

    pub(crate) fn string(&mut self) -> Option<Node> {
        self.single_quoted_string()
            .or_else(|| self.double_quoted_string())
    }

    fn single_quoted_string(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect('\'')?;
            let value_start = p.pos;
            while p.string_char('\'').is_some() {}
            let value = p.input_slice(value_start).to_string();
            p.expect('\'')?;
            let kind = NodeKind::String(StringValue {
                value,
                quote: Quote::Single,
            });
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn double_quoted_string(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect('"')?;
            let mut fragments = Vec::new();
            loop {
                let text_start = p.pos;
                while p.string_char('"').is_some() {}
                if p.pos > text_start {
                    let text = p.input_slice(text_start).to_string();
                    push_text(&mut fragments, &text);
                } else if let Some(variable) = p.variable().or_else(|| p.interpolation()) {
                    fragments.push(Fragment::Splice(variable));
                } else if p.eat('{') {
                    push_text(&mut fragments, "{");
                } else {
                    break;
                }
            }
            p.expect('"')?;

            let has_splice = fragments.iter().any(|f| matches!(f, Fragment::Splice(_)));
            let kind = if has_splice {
                NodeKind::InterpolatedString(fragments)
            } else {
                let value = fragments
                    .into_iter()
                    .map(|f| match f {
                        Fragment::Text(text) => text,
                        Fragment::Splice(_) => String::new(),
                    })
                    .collect();
                NodeKind::String(StringValue {
                    value,
                    quote: Quote::Double,
                })
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    /// One plain character or escape sequence inside a string
    fn string_char(&mut self, quote: char) -> Option<()> {
        if self.peek() == Some('\\') {
            return self.attempt(|p| {
                p.expect('\\')?;
                p.eat_if(|c| !matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}'))
                    .map(|_| ())
            });
        }
        let interpolates = quote == '"';
        self.eat_if(|c| {
            c != quote
                && !matches!(c, '\n' | '\r' | '\x0c')
                && !(interpolates && (c == '{' || c == '$'))
        })
        .map(|_| ())
    }

    fn raw_number(&mut self) -> Option<f64> {
        let start = self.pos;
        let fraction = self.attempt(|p| {
            p.eat_while(|c| c.is_ascii_digit());
            p.expect('.')?;
            p.eat_many(|c| c.is_ascii_digit())
        });
        if fraction.is_none() {
            self.eat_many(|c| c.is_ascii_digit())?;
        }
        self.input_slice(start).parse().ok()
    }

    pub(crate) fn number(&mut self) -> Option<Node> {
        let start = self.pos;
        let value = self.raw_number()?;
        Some(Node::number(value, self.loc(start)))
    }

    pub(crate) fn percentage(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let value = p.raw_number()?;
            p.expect('%')?;
            Some(Node::new(NodeKind::Percentage(value), p.loc(start)))
        })
    }

    pub(crate) fn dimension(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let value = p.raw_number()?;
            let unit = p.raw_identifier()?;
            Some(Node::new(NodeKind::Dimension { value, unit }, p.loc(start)))
        })
    }

    /// `#rgb` or `#rrggbb`
    fn color(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect('#')?;
            let digits = p.eat_many(|c| c.is_ascii_alphanumeric())?;
            if digits.len() != 3 && digits.len() != 6 {
                return None;
            }
            Some(Node::new(NodeKind::Color(digits.to_string()), p.loc(start)))
        })
    }

    pub(crate) fn url(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("url(")?;
            p.skip_whitespace();
            let value = p.string().or_else(|| {
                let address_start = p.pos;
                let address = p.eat_many(is_url_char)?;
                Some(Node::new(NodeKind::Raw(address.to_string()), p.loc(address_start)))
            })?;
            p.skip_whitespace();
            p.expect(')')?;
            Some(Node::new(NodeKind::Url(Box::new(value)), p.loc(start)))
        })
    }

    fn function(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let name = p.raw_identifier()?;
            p.expect('(')?;
            p.skip_whitespace();
            let arguments = p.argument_list()?;
            p.skip_whitespace();
            p.expect(')')?;
            Some(Node::new(NodeKind::Function { name, arguments }, p.loc(start)))
        })
    }

    fn boolean(&mut self) -> Option<Node> {
        let start = self.pos;
        let value = if self.expect_keyword("true").is_some() {
            true
        } else if self.expect_keyword("false").is_some() {
            false
        } else {
            return None;
        };
        Some(Node::boolean(value, self.loc(start)))
    }

    fn null(&mut self) -> Option<Node> {
        let start = self.pos;
        self.expect_keyword("null")?;
        Some(Node::null(self.loc(start)))
    }
}

fn push_text(fragments: &mut Vec<Fragment>, text: &str) {
    match fragments.last_mut() {
        Some(Fragment::Text(last)) => last.push_str(text),
        _ => fragments.push(Fragment::Text(text.to_string())),
    }
}

fn is_url_char(c: char) -> bool {
    matches!(c, '!' | '#' | '$' | '%' | '&' | '*'..='~')
}

#[cfg(test)]
mod tests {
    use crate::node::{ArithmeticOp, Fragment, Node, NodeKind, UnaryOp};
    use crate::parser::parse;

    fn value(source: &str) -> Node {
        let input = format!("a {{ b: {} }}", source);
        let Ok(NodeKind::Root { children, .. }) = parse(&input, "").map(|node| node.kind) else {
            panic!("Failed to parse {}", input);
        };
        let NodeKind::Ruleset { rules, .. } = &children[0].kind else {
            panic!("Expected ruleset");
        };
        let NodeKind::Property { value, .. } = &rules[0].kind else {
            panic!("Expected property");
        };
        (**value).clone()
    }

    #[test]
    fn test_numbers() {
        assert!(matches!(value("12").kind, NodeKind::Number(n) if n == 12.0));
        assert!(matches!(value(".5").kind, NodeKind::Number(n) if n == 0.5));
        assert!(matches!(value("50%").kind, NodeKind::Percentage(n) if n == 50.0));
        assert!(matches!(value("1.5em").kind, NodeKind::Dimension { value, ref unit } if value == 1.5 && unit == "em"));
    }

    #[test]
    fn test_colors() {
        assert!(matches!(value("#fff").kind, NodeKind::Color(ref hex) if hex == "fff"));
        assert!(matches!(value("#A0b1C2").kind, NodeKind::Color(ref hex) if hex == "A0b1C2"));
    }

    #[test]
    fn test_precedence() {
        let node = value("1 + 2 * 3");
        let NodeKind::Arithmetic { operator, right, .. } = &node.kind else {
            panic!("Expected arithmetic");
        };
        assert_eq!(*operator, ArithmeticOp::Add);
        assert!(matches!(right.kind, NodeKind::Arithmetic { operator: ArithmeticOp::Multiply, .. }));
    }

    #[test]
    fn test_logical_and_comparison() {
        assert!(matches!(value("1 < 2 and 3 >= 2 or false").kind, NodeKind::Logical { .. }));
        assert!(matches!(value("$a isnt 1").kind, NodeKind::Equality { .. }));
        assert!(matches!(value("$a IS 1").kind, NodeKind::Equality { .. }));
    }

    #[test]
    fn test_ranges() {
        assert!(matches!(value("1..3").kind, NodeKind::Range { exclusive: false, .. }));
        assert!(matches!(value("1 ... $n").kind, NodeKind::Range { exclusive: true, .. }));
    }

    #[test]
    fn test_unary() {
        let node = value("-$x");
        assert!(matches!(node.kind, NodeKind::InterpolatedIdentifier(_)));
        let node = value("-(1)");
        assert!(matches!(node.kind, NodeKind::Unary { operator: UnaryOp::Minus, .. }));
    }

    #[test]
    fn test_functions_and_urls() {
        let node = value("rgba(0, 0, 0, .5)");
        assert!(matches!(node.kind, NodeKind::Function { ref arguments, .. } if arguments.len() == 4));
        let node = value("url(http://example.com/a.png)");
        let NodeKind::Url(address) = &node.kind else {
            panic!("Expected url");
        };
        assert!(matches!(&address.kind, NodeKind::Raw(text) if text == "http://example.com/a.png"));
    }

    #[test]
    fn test_call_expression() {
        let node = value("$double(2px)");
        assert!(matches!(node.kind, NodeKind::Call { ref arguments, .. } if arguments.len() == 1));
    }

    #[test]
    fn test_interpolated_identifier() {
        let node = value("foo-{$bar}-$baz");
        let NodeKind::InterpolatedIdentifier(fragments) = &node.kind else {
            panic!("Expected interpolated identifier");
        };
        assert!(matches!(&fragments[0], Fragment::Text(text) if text == "foo-"));
        assert!(matches!(&fragments[1], Fragment::Splice(_)));
        assert!(matches!(&fragments[2], Fragment::Text(text) if text == "-"));
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let node = value("'it\\'s'");
        assert!(matches!(node.kind, NodeKind::String(ref s) if s.value == "it\\'s"));
    }
}
