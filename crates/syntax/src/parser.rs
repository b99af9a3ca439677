//! Roole parser
//!
//! Backtracking recursive descent straight over the source text. Every rule
//! returns `None` on failure and leaves the position where it found it. The
//! parser remembers the rightmost position at which a terminal failed to
//! match; when the input cannot be consumed completely that position becomes
//! the reported syntax error.

use crate::error::{SourceLocation, SyntaxError, SyntaxResult};
use crate::node::{Alternative, AssignOp, Fragment, Node, NodeKind};

/// Parse a stylesheet
pub fn parse(input: &str, file_path: &str) -> SyntaxResult<Node> {
    Parser::new(input, file_path).parse(StartRule::Root)
}

/// Parse a single selector, locating every node at `loc`
pub fn parse_selector(input: &str, file_path: &str, loc: SourceLocation) -> SyntaxResult<Node> {
    Parser::new(input, file_path)
        .with_location(loc)
        .parse(StartRule::Selector)
}

/// Parse a single media query, locating every node at `loc`
pub fn parse_media_query(input: &str, file_path: &str, loc: SourceLocation) -> SyntaxResult<Node> {
    Parser::new(input, file_path)
        .with_location(loc)
        .parse(StartRule::MediaQuery)
}

/// Grammar rule a parse starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartRule {
    Root,
    Selector,
    MediaQuery,
}

/// Roole parser
pub struct Parser<'a> {
    input: &'a str,
    pub(crate) pos: usize,
    /// Rightmost offset a terminal failed at
    failure: usize,
    line_starts: Vec<usize>,
    file_path: String,
    /// Fixed location for every node, used when re-parsing interpolations
    location: Option<SourceLocation>,
}

impl<'a> Parser<'a> {
    /// Create a new parser
    pub fn new(input: &'a str, file_path: impl Into<String>) -> Self {
        let bytes = input.as_bytes();
        let mut line_starts = vec![0];
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                    i += 1;
                    line_starts.push(i + 1);
                }
                b'\r' | b'\n' => line_starts.push(i + 1),
                _ => {}
            }
            i += 1;
        }

        Self {
            input,
            pos: 0,
            failure: 0,
            line_starts,
            file_path: file_path.into(),
            location: None,
        }
    }

    /// Locate every node (and the error, if any) at `loc`
    pub fn with_location(mut self, loc: SourceLocation) -> Self {
        self.location = Some(loc);
        self
    }

    /// Run the parser from `start`, requiring the whole input to be consumed
    pub fn parse(&mut self, start: StartRule) -> SyntaxResult<Node> {
        let node = match start {
            StartRule::Root => self.root(),
            StartRule::Selector => self.selector(),
            StartRule::MediaQuery => self.media_query(),
        };

        match node {
            Some(node) if self.pos == self.input.len() => Ok(node),
            _ => Err(self.error()),
        }
    }

    fn error(&self) -> SyntaxError {
        let offset = self.pos.max(self.failure);
        let found = self.input[offset..].chars().next();
        let location = self.location.unwrap_or_else(|| self.location_at(offset));
        log::trace!("Syntax error at {} in '{}'", location, self.file_path);
        SyntaxError::unexpected(found, location, self.file_path.clone())
    }

    fn location_at(&self, offset: usize) -> SourceLocation {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = self.input[line_start..offset].chars().count() + 1;
        SourceLocation::new(line, column, offset)
    }

    /// Location of a node starting at `start`
    pub(crate) fn loc(&self, start: usize) -> SourceLocation {
        self.location.unwrap_or_else(|| self.location_at(start))
    }

    // ---------------------------------------------------------------------
    // Terminals

    pub(crate) fn fail(&mut self) {
        if self.pos > self.failure {
            self.failure = self.pos;
        }
    }

    /// Input consumed since `start`
    pub(crate) fn input_slice(&self, start: usize) -> &'a str {
        &self.input[start..self.pos]
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Match a single character
    pub(crate) fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            self.fail();
            false
        }
    }

    pub(crate) fn expect(&mut self, expected: char) -> Option<()> {
        self.eat(expected).then_some(())
    }

    /// Match a literal string
    pub(crate) fn eat_str(&mut self, expected: &str) -> bool {
        if self.rest().starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            self.fail();
            false
        }
    }

    pub(crate) fn expect_str(&mut self, expected: &str) -> Option<()> {
        self.eat_str(expected).then_some(())
    }

    /// Match a literal string, ignoring ASCII case
    pub(crate) fn eat_str_ci(&mut self, expected: &str) -> bool {
        let matched = self
            .rest()
            .get(..expected.len())
            .is_some_and(|text| text.eq_ignore_ascii_case(expected));
        if matched {
            self.pos += expected.len();
        } else {
            self.fail();
        }
        matched
    }

    pub(crate) fn expect_str_ci(&mut self, expected: &str) -> Option<()> {
        self.eat_str_ci(expected).then_some(())
    }

    /// Match a word, ignoring ASCII case, that is not the start of a longer name
    pub(crate) fn expect_keyword(&mut self, word: &str) -> Option<&'a str> {
        let start = self.pos;
        if !self.eat_str_ci(word) {
            return None;
        }
        if self.peek().is_some_and(is_name_char) {
            self.pos = start;
            self.fail();
            return None;
        }
        Some(&self.input[start..self.pos])
    }

    /// Match one character satisfying `pred`
    pub(crate) fn eat_if(&mut self, pred: impl Fn(char) -> bool) -> Option<char> {
        match self.peek() {
            Some(c) if pred(c) => {
                self.pos += c.len_utf8();
                Some(c)
            }
            _ => {
                self.fail();
                None
            }
        }
    }

    /// Match zero or more characters satisfying `pred`
    pub(crate) fn eat_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.eat_if(&pred).is_some() {}
        &self.input[start..self.pos]
    }

    /// Match one or more characters satisfying `pred`
    pub(crate) fn eat_many(&mut self, pred: impl Fn(char) -> bool) -> Option<&'a str> {
        let text = self.eat_while(pred);
        (!text.is_empty()).then_some(text)
    }

    /// Run a rule, restoring the position when it fails
    pub(crate) fn attempt<T>(&mut self, rule: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let start = self.pos;
        let result = rule(self);
        if result.is_none() {
            self.pos = start;
        }
        result
    }

    /// `item (separator item)*`
    pub(crate) fn separated<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Option<T>,
        mut separator: impl FnMut(&mut Self) -> Option<()>,
    ) -> Option<Vec<T>> {
        let first = item(self)?;
        let mut items = vec![first];
        while let Some(next) = self.attempt(|p| {
            separator(p)?;
            item(p)
        }) {
            items.push(next);
        }
        Some(items)
    }

    /// `s`: one or more runs of whitespace or comments
    pub(crate) fn whitespace(&mut self) -> bool {
        let mut consumed = false;
        loop {
            let progressed = self.eat_many(is_whitespace).is_some()
                || self.single_line_comment()
                || self.multi_line_comment().is_some();
            if !progressed {
                return consumed;
            }
            consumed = true;
        }
    }

    /// `_`: optional whitespace
    pub(crate) fn skip_whitespace(&mut self) {
        self.whitespace();
    }

    /// Separator that only skips whitespace
    pub(crate) fn blank(&mut self) -> Option<()> {
        self.skip_whitespace();
        Some(())
    }

    /// `_ , _`
    pub(crate) fn comma(&mut self) -> Option<()> {
        self.skip_whitespace();
        self.expect(',')?;
        self.skip_whitespace();
        Some(())
    }

    fn single_line_comment(&mut self) -> bool {
        if !self.eat_str("//") {
            return false;
        }
        self.eat_while(|c| !matches!(c, '\r' | '\n' | '\x0c'));
        true
    }

    /// Block comment, returning the text between the delimiters
    fn multi_line_comment(&mut self) -> Option<String> {
        self.attempt(|p| {
            p.expect_str("/*")?;
            let start = p.pos;
            match p.rest().find("*/") {
                Some(len) => {
                    p.pos += len + 2;
                    Some(p.input[start..start + len].to_string())
                }
                None => {
                    p.pos = p.input.len();
                    p.fail();
                    None
                }
            }
        })
    }

    /// Statement terminator: `;` (repeatable) or a closing brace left in place
    pub(crate) fn semicolon(&mut self) -> Option<()> {
        if self.peek() == Some('}') {
            return Some(());
        }
        self.expect(';')?;
        while self
            .attempt(|p| {
                p.skip_whitespace();
                p.expect(';')
            })
            .is_some()
        {}
        Some(())
    }

    // ---------------------------------------------------------------------
    // Statements

    fn root(&mut self) -> Option<Node> {
        let start = self.pos;
        let mut children = Vec::new();
        if let Some(text) = self.multi_line_comment() {
            children.push(Node::new(NodeKind::Comment(text), self.loc(start)));
        }
        self.skip_whitespace();
        if let Some(rules) = self.attempt(|p| {
            let rules = p.separated(Self::root_rule, Self::blank)?;
            p.skip_whitespace();
            Some(rules)
        }) {
            children.extend(rules);
        }

        let file_path = self.file_path.clone();
        Some(Node::new(NodeKind::Root { file_path, children }, self.loc(start)))
    }

    fn root_rule(&mut self) -> Option<Node> {
        self.ruleset()
            .or_else(|| self.assignment())
            .or_else(|| self.media())
            .or_else(|| self.void())
            .or_else(|| self.block())
            .or_else(|| self.import())
            .or_else(|| self.if_rule())
            .or_else(|| self.for_rule())
            .or_else(|| self.module())
            .or_else(|| self.mixin_call())
            .or_else(|| self.keyframes())
            .or_else(|| self.font_face())
            .or_else(|| self.charset())
    }

    fn rule(&mut self) -> Option<Node> {
        self.ruleset()
            .or_else(|| self.property())
            .or_else(|| self.assignment())
            .or_else(|| self.extend())
            .or_else(|| self.media())
            .or_else(|| self.void())
            .or_else(|| self.block())
            .or_else(|| self.import())
            .or_else(|| self.if_rule())
            .or_else(|| self.for_rule())
            .or_else(|| self.module())
            .or_else(|| self.return_rule())
            .or_else(|| self.mixin_call())
            .or_else(|| self.keyframes())
            .or_else(|| self.font_face())
    }

    /// `{ rules }`
    pub(crate) fn rule_list(&mut self) -> Option<Vec<Node>> {
        self.attempt(|p| {
            p.expect('{')?;
            p.skip_whitespace();
            let rules = p.separated(Self::rule, Self::blank).unwrap_or_default();
            p.skip_whitespace();
            p.expect('}')?;
            Some(rules)
        })
    }

    fn ruleset(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let selector_list = p.selector_list()?;
            p.skip_whitespace();
            let rules = p.rule_list()?;
            let kind = NodeKind::Ruleset {
                selector_list: Box::new(selector_list),
                rules,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    pub(crate) fn property(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let star = p.eat('*');
            let mut name = p.identifier()?;
            if star {
                name = prefix_star(name);
            }
            p.skip_whitespace();
            p.expect(':')?;
            p.skip_whitespace();
            let value = p.list()?;
            p.skip_whitespace();
            let important = p.eat_str("!important");
            p.skip_whitespace();
            p.semicolon()?;

            let kind = NodeKind::Property {
                name: Box::new(name),
                value: Box::new(value),
                important,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn assignment(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let name = p.variable_name()?;
            p.skip_whitespace();
            let op_start = p.pos;
            p.eat_if(|c| matches!(c, '-' | '+' | '*' | '/' | '?'));
            p.expect('=')?;
            let operator = AssignOp::from_operator(&p.input[op_start..p.pos])?;
            p.skip_whitespace();
            let value = p
                .mixin()
                .or_else(|| p.function_definition())
                .or_else(|| p.list())?;
            p.skip_whitespace();
            p.semicolon()?;

            let kind = NodeKind::Assignment {
                name,
                operator,
                value: Box::new(value),
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn mixin(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str("@mixin")?;
            let (parameters, rules) = p.callable_body()?;
            Some(Node::new(NodeKind::Mixin { parameters, rules }, p.loc(start)))
        })
    }

    fn function_definition(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str("@function")?;
            let (parameters, rules) = p.callable_body()?;
            Some(Node::new(NodeKind::UserFunction { parameters, rules }, p.loc(start)))
        })
    }

    /// `(_ parameterList)? _ ruleList`
    fn callable_body(&mut self) -> Option<(Vec<Node>, Vec<Node>)> {
        let parameters = self
            .attempt(|p| {
                p.skip_whitespace();
                p.separated(Self::parameter, Self::comma)
            })
            .unwrap_or_default();
        self.skip_whitespace();
        let rules = self.rule_list()?;
        Some((parameters, rules))
    }

    fn parameter(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let name = p.variable_name()?;
            let default = p.attempt(|p| {
                p.skip_whitespace();
                p.expect('=')?;
                p.skip_whitespace();
                p.non_comma_list()
            });
            let kind = NodeKind::Parameter {
                name,
                default: default.map(Box::new),
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn extend(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@extend")?;
            let all = p.eat_str_ci("-all");
            p.skip_whitespace();
            let selector_list = p.selector_list()?;
            p.skip_whitespace();
            p.semicolon()?;
            let kind = NodeKind::Extend {
                selector_list: Box::new(selector_list),
                all,
                id: 0,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn media(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@media")?;
            p.skip_whitespace();
            let query_list = p.media_query_list()?;
            p.skip_whitespace();
            let rules = p.rule_list()?;
            let kind = NodeKind::Media {
                query_list: Box::new(query_list),
                rules,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn void(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@void")?;
            p.skip_whitespace();
            let rules = p.rule_list()?;
            Some(Node::new(NodeKind::Void(rules), p.loc(start)))
        })
    }

    fn block(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@block")?;
            p.skip_whitespace();
            let rules = p.rule_list()?;
            Some(Node::new(NodeKind::Block(rules), p.loc(start)))
        })
    }

    fn module(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@module")?;
            p.skip_whitespace();
            let name = p.additive()?;
            let separator = p.attempt(|p| {
                p.skip_whitespace();
                p.expect_keyword("with")?;
                p.skip_whitespace();
                p.additive()
            });
            p.skip_whitespace();
            let rules = p.rule_list()?;
            let kind = NodeKind::Module {
                name: Box::new(name),
                separator: separator.map(Box::new),
                rules,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn import(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@import")?;
            p.skip_whitespace();
            let url = p.string().or_else(|| p.url()).or_else(|| p.variable())?;
            p.skip_whitespace();
            let media = p.attempt(|p| {
                let media = p.media_query_list()?;
                p.skip_whitespace();
                Some(media)
            });
            p.semicolon()?;
            let kind = NodeKind::Import {
                url: Box::new(url),
                media: media.map(Box::new),
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn if_rule(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@if")?;
            p.conditional(start)
        })
    }

    /// `_ list _ ruleList (_ (elseIf | else))?`
    fn conditional(&mut self, start: usize) -> Option<Node> {
        self.skip_whitespace();
        let condition = self.list()?;
        self.skip_whitespace();
        let consequence = self.rule_list()?;
        let alternative = self.attempt(|p| {
            p.skip_whitespace();
            p.else_if()
                .map(|node| Alternative::ElseIf(Box::new(node)))
                .or_else(|| p.else_rule().map(Alternative::Else))
        });

        let kind = NodeKind::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        };
        Some(Node::new(kind, self.loc(start)))
    }

    fn else_if(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@else")?;
            p.skip_whitespace();
            p.expect_keyword("if")?;
            p.conditional(start)
        })
    }

    fn else_rule(&mut self) -> Option<Vec<Node>> {
        self.attempt(|p| {
            p.expect_str_ci("@else")?;
            p.skip_whitespace();
            p.rule_list()
        })
    }

    fn for_rule(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@for")?;
            p.skip_whitespace();
            let value = p.variable()?;
            p.skip_whitespace();
            let index = p.attempt(|p| {
                p.expect(',')?;
                p.skip_whitespace();
                let index = p.variable()?;
                p.skip_whitespace();
                Some(index)
            });
            let step = p.attempt(|p| {
                p.expect_keyword("by")?;
                p.skip_whitespace();
                let step = p.additive()?;
                p.skip_whitespace();
                Some(step)
            });
            p.expect_keyword("in")?;
            p.skip_whitespace();
            let list = p.list()?;
            p.skip_whitespace();
            let rules = p.rule_list()?;

            let kind = NodeKind::For {
                value: Box::new(value),
                index: index.map(Box::new),
                step: step.map(Box::new),
                list: Box::new(list),
                rules,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn return_rule(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@return")?;
            p.skip_whitespace();
            let value = p.list()?;
            p.skip_whitespace();
            p.semicolon()?;
            Some(Node::new(NodeKind::Return(Box::new(value)), p.loc(start)))
        })
    }

    fn mixin_call(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let callee = p.variable()?;
            let arguments = p.call_arguments().unwrap_or_default();
            p.skip_whitespace();
            p.semicolon()?;
            let kind = NodeKind::MixinCall {
                callee: Box::new(callee),
                arguments,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn keyframes(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect('@')?;
            let prefix = p.attempt(|p| {
                p.expect('-')?;
                let prefix_start = p.pos;
                p.eat_if(|c| c == '_' || c.is_ascii_alphabetic())?;
                p.eat_while(|c| c == '_' || c.is_ascii_alphanumeric());
                let prefix = p.input[prefix_start..p.pos].to_string();
                p.expect('-')?;
                Some(prefix)
            });
            p.expect_str_ci("keyframes")?;
            p.skip_whitespace();
            let name = p.identifier()?;
            p.skip_whitespace();

            p.expect('{')?;
            p.skip_whitespace();
            let keyframes = p.separated(Self::keyframe, Self::blank)?;
            p.skip_whitespace();
            p.expect('}')?;

            let kind = NodeKind::Keyframes {
                prefix,
                name: Box::new(name),
                keyframes,
            };
            Some(Node::new(kind, p.loc(start)))
        })
    }

    fn keyframe(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            let selectors = p.separated(Self::keyframe_selector, Self::comma)?;
            p.skip_whitespace();
            let properties = p.property_list()?;
            Some(Node::new(NodeKind::Keyframe { selectors, properties }, p.loc(start)))
        })
    }

    fn keyframe_selector(&mut self) -> Option<Node> {
        let start = self.pos;
        let value = match self.expect_keyword("from").or_else(|| self.expect_keyword("to")) {
            Some(word) => Node::identifier(word, self.loc(start)),
            None => self.percentage()?,
        };
        Some(Node::new(NodeKind::KeyframeSelector(Box::new(value)), self.loc(start)))
    }

    /// `{ property (_ property)* }`
    fn property_list(&mut self) -> Option<Vec<Node>> {
        self.attempt(|p| {
            p.expect('{')?;
            p.skip_whitespace();
            let properties = p.separated(Self::property, Self::blank)?;
            p.skip_whitespace();
            p.expect('}')?;
            Some(properties)
        })
    }

    fn font_face(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@font-face")?;
            p.skip_whitespace();
            let properties = p.property_list()?;
            Some(Node::new(NodeKind::FontFace(properties), p.loc(start)))
        })
    }

    fn charset(&mut self) -> Option<Node> {
        self.attempt(|p| {
            let start = p.pos;
            p.expect_str_ci("@charset")?;
            p.skip_whitespace();
            let value = p.string()?;
            p.skip_whitespace();
            p.semicolon()?;
            Some(Node::new(NodeKind::Charset(Box::new(value)), p.loc(start)))
        })
    }
}

/// Prepend the IE `*` hack to a property name
fn prefix_star(name: Node) -> Node {
    let loc = name.loc;
    let kind = match name.kind {
        NodeKind::Identifier(text) => NodeKind::Identifier(format!("*{}", text)),
        NodeKind::InterpolatedIdentifier(mut fragments) => {
            match fragments.first_mut() {
                Some(Fragment::Text(text)) => text.insert(0, '*'),
                _ => fragments.insert(0, Fragment::Text("*".to_string())),
            }
            NodeKind::InterpolatedIdentifier(fragments)
        }
        kind => NodeKind::InterpolatedIdentifier(vec![
            Fragment::Text("*".to_string()),
            Fragment::Splice(Node::new(kind, loc)),
        ]),
    };
    Node::new(kind, loc)
}

pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0c')
}

pub(crate) fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

pub(crate) fn is_name_char(c: char) -> bool {
    c == '-' || c == '_' || c.is_ascii_alphanumeric()
}
