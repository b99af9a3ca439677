//! Stylesheet tree
//!
//! Every construct of the language is a [`Node`]: a [`NodeKind`] plus the
//! location it was parsed at. Each compiler pass consumes a tree and
//! produces a new one, so later passes introduce their own kinds
//! (joined selector lists, normalized style rules) alongside the parsed ones.

use serde::Serialize;

use crate::error::SourceLocation;

/// A tree element
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub loc: SourceLocation,
}

/// Structural equality; locations are ignored
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

/// Node kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "children", rename_all = "camelCase")]
pub enum NodeKind {
    // Statements
    Root { file_path: String, children: Vec<Node> },
    Comment(String),
    Ruleset { selector_list: Box<Node>, rules: Vec<Node> },
    Property { name: Box<Node>, value: Box<Node>, important: bool },
    Assignment { name: String, operator: AssignOp, value: Box<Node> },
    /// `id` is assigned by the extender, in document order
    Extend { selector_list: Box<Node>, all: bool, id: usize },
    Media { query_list: Box<Node>, rules: Vec<Node> },
    Void(Vec<Node>),
    Block(Vec<Node>),
    Module { name: Box<Node>, separator: Option<Box<Node>>, rules: Vec<Node> },
    Import { url: Box<Node>, media: Option<Box<Node>> },
    If { condition: Box<Node>, consequence: Vec<Node>, alternative: Option<Alternative> },
    For {
        value: Box<Node>,
        index: Option<Box<Node>>,
        step: Option<Box<Node>>,
        list: Box<Node>,
        rules: Vec<Node>,
    },
    MixinCall { callee: Box<Node>, arguments: Vec<Node> },
    Return(Box<Node>),
    Keyframes { prefix: Option<String>, name: Box<Node>, keyframes: Vec<Node> },
    Keyframe { selectors: Vec<Node>, properties: Vec<Node> },
    KeyframeSelector(Box<Node>),
    FontFace(Vec<Node>),
    Charset(Box<Node>),

    // Selectors
    SelectorList(Vec<Node>),
    Selector(Vec<Node>),
    Combinator(String),
    SelectorInterpolation(Box<Node>),
    TypeSelector(Box<Node>),
    UniversalSelector,
    AmpersandSelector,
    HashSelector(Box<Node>),
    ClassSelector(Box<Node>),
    AttributeSelector { name: Box<Node>, operator: Option<String>, value: Option<Box<Node>> },
    NegationSelector(Box<Node>),
    PseudoSelector { value: Box<Node>, doubled: bool },
    PseudoArgument(Vec<Node>),

    // Media queries
    MediaQueryList(Vec<Node>),
    MediaQuery(Vec<Node>),
    MediaInterpolation(Box<Node>),
    MediaType { modifier: Option<String>, value: Box<Node> },
    MediaFeature { name: Box<Node>, value: Option<Box<Node>> },

    // Values
    List(Vec<Node>),
    Separator(String),
    Range { from: Box<Node>, exclusive: bool, to: Box<Node> },
    Logical { left: Box<Node>, operator: LogicalOp, right: Box<Node> },
    Equality { left: Box<Node>, operator: EqualityOp, right: Box<Node> },
    Relational { left: Box<Node>, operator: RelationalOp, right: Box<Node> },
    Arithmetic { left: Box<Node>, operator: ArithmeticOp, right: Box<Node> },
    Unary { operator: UnaryOp, operand: Box<Node> },
    Variable(String),
    Identifier(String),
    InterpolatedIdentifier(Vec<Fragment>),
    String(StringValue),
    /// Double-quoted string containing splices
    InterpolatedString(Vec<Fragment>),
    Number(f64),
    Percentage(f64),
    Dimension { value: f64, unit: String },
    Color(String),
    Url(Box<Node>),
    /// Verbatim text, e.g. an unquoted url address
    Raw(String),
    Function { name: String, arguments: Vec<Node> },
    Call { callee: Box<Node>, arguments: Vec<Node> },
    Boolean(bool),
    Null,
    Mixin { parameters: Vec<Node>, rules: Vec<Node> },
    UserFunction { parameters: Vec<Node>, rules: Vec<Node> },
    Parameter { name: String, default: Option<Box<Node>> },

    // Produced by the extender
    JoinedSelectorList { selectors: Vec<String>, original: Vec<Node>, extended: Vec<String> },
    JoinedMediaQueryList(Vec<String>),

    // Produced by the normalizer
    StyleRule { selectors: Vec<String>, properties: Vec<Node>, nested: Vec<Node> },
    MediaBlock { queries: Vec<String>, rulesets: Vec<Node>, nested: Vec<Node> },
}

/// `@else if` or `@else` branch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Alternative {
    ElseIf(Box<Node>),
    Else(Vec<Node>),
}

/// Piece of an interpolated identifier or string
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Fragment {
    Text(String),
    Splice(Node),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Quote {
    Single,
    Double,
}

impl Quote {
    pub fn as_char(self) -> char {
        match self {
            Quote::Single => '\'',
            Quote::Double => '"',
        }
    }
}

/// String literal; the quote style does not take part in equality
#[derive(Debug, Clone, Serialize)]
pub struct StringValue {
    pub value: String,
    pub quote: Quote,
}

impl PartialEq for StringValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssignOp {
    Assign,
    Default,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl AssignOp {
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "=" => Some(AssignOp::Assign),
            "?=" => Some(AssignOp::Default),
            "+=" => Some(AssignOp::Add),
            "-=" => Some(AssignOp::Subtract),
            "*=" => Some(AssignOp::Multiply),
            "/=" => Some(AssignOp::Divide),
            _ => None,
        }
    }

    /// Arithmetic applied by a compound assignment
    pub fn arithmetic(self) -> Option<ArithmeticOp> {
        match self {
            AssignOp::Add => Some(ArithmeticOp::Add),
            AssignOp::Subtract => Some(ArithmeticOp::Subtract),
            AssignOp::Multiply => Some(ArithmeticOp::Multiply),
            AssignOp::Divide => Some(ArithmeticOp::Divide),
            AssignOp::Assign | AssignOp::Default => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EqualityOp {
    Is,
    Isnt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationalOp {
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl ArithmeticOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        }
    }
}

impl Node {
    pub fn new(kind: NodeKind, loc: SourceLocation) -> Self {
        Self { kind, loc }
    }

    pub fn number(value: f64, loc: SourceLocation) -> Self {
        Self::new(NodeKind::Number(value), loc)
    }

    pub fn boolean(value: bool, loc: SourceLocation) -> Self {
        Self::new(NodeKind::Boolean(value), loc)
    }

    pub fn null(loc: SourceLocation) -> Self {
        Self::new(NodeKind::Null, loc)
    }

    pub fn identifier(value: impl Into<String>, loc: SourceLocation) -> Self {
        Self::new(NodeKind::Identifier(value.into()), loc)
    }

    /// Kind name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Root { .. } => "root",
            NodeKind::Comment(_) => "comment",
            NodeKind::Ruleset { .. } => "ruleset",
            NodeKind::Property { .. } => "property",
            NodeKind::Assignment { .. } => "assignment",
            NodeKind::Extend { .. } => "extend",
            NodeKind::Media { .. } => "media",
            NodeKind::Void(_) => "void",
            NodeKind::Block(_) => "block",
            NodeKind::Module { .. } => "module",
            NodeKind::Import { .. } => "import",
            NodeKind::If { .. } => "if",
            NodeKind::For { .. } => "for",
            NodeKind::MixinCall { .. } => "mixinCall",
            NodeKind::Return(_) => "return",
            NodeKind::Keyframes { .. } => "keyframes",
            NodeKind::Keyframe { .. } => "keyframe",
            NodeKind::KeyframeSelector(_) => "keyframeSelector",
            NodeKind::FontFace(_) => "fontFace",
            NodeKind::Charset(_) => "charset",
            NodeKind::SelectorList(_) => "selectorList",
            NodeKind::Selector(_) => "selector",
            NodeKind::Combinator(_) => "combinator",
            NodeKind::SelectorInterpolation(_) => "selectorInterpolation",
            NodeKind::TypeSelector(_) => "typeSelector",
            NodeKind::UniversalSelector => "universalSelector",
            NodeKind::AmpersandSelector => "ampersandSelector",
            NodeKind::HashSelector(_) => "hashSelector",
            NodeKind::ClassSelector(_) => "classSelector",
            NodeKind::AttributeSelector { .. } => "attributeSelector",
            NodeKind::NegationSelector(_) => "negationSelector",
            NodeKind::PseudoSelector { .. } => "pseudoSelector",
            NodeKind::PseudoArgument(_) => "pseudoArgument",
            NodeKind::MediaQueryList(_) => "mediaQueryList",
            NodeKind::MediaQuery(_) => "mediaQuery",
            NodeKind::MediaInterpolation(_) => "mediaInterpolation",
            NodeKind::MediaType { .. } => "mediaType",
            NodeKind::MediaFeature { .. } => "mediaFeature",
            NodeKind::List(_) => "list",
            NodeKind::Separator(_) => "separator",
            NodeKind::Range { .. } => "range",
            NodeKind::Logical { .. } => "logicalExpression",
            NodeKind::Equality { .. } => "equalityExpression",
            NodeKind::Relational { .. } => "relationalExpression",
            NodeKind::Arithmetic { .. } => "arithmeticExpression",
            NodeKind::Unary { .. } => "unaryExpression",
            NodeKind::Variable(_) => "variable",
            NodeKind::Identifier(_) | NodeKind::InterpolatedIdentifier(_) => "identifier",
            NodeKind::String(_) | NodeKind::InterpolatedString(_) => "string",
            NodeKind::Number(_) => "number",
            NodeKind::Percentage(_) => "percentage",
            NodeKind::Dimension { .. } => "dimension",
            NodeKind::Color(_) => "color",
            NodeKind::Url(_) => "url",
            NodeKind::Raw(_) => "raw",
            NodeKind::Function { .. } | NodeKind::UserFunction { .. } => "function",
            NodeKind::Call { .. } => "call",
            NodeKind::Boolean(_) => "boolean",
            NodeKind::Null => "null",
            NodeKind::Mixin { .. } => "mixin",
            NodeKind::Parameter { .. } => "parameter",
            NodeKind::JoinedSelectorList { .. } => "selectorList",
            NodeKind::JoinedMediaQueryList(_) => "mediaQueryList",
            NodeKind::StyleRule { .. } => "ruleset",
            NodeKind::MediaBlock { .. } => "media",
        }
    }

    /// Numeric value of a number, percentage or dimension
    pub fn to_number(&self) -> Option<f64> {
        match &self.kind {
            NodeKind::Number(value) | NodeKind::Percentage(value) => Some(*value),
            NodeKind::Dimension { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Copy of a numeric node carrying a different value
    pub fn with_number(&self, value: f64) -> Node {
        let kind = match &self.kind {
            NodeKind::Percentage(_) => NodeKind::Percentage(value),
            NodeKind::Dimension { unit, .. } => NodeKind::Dimension { value, unit: unit.clone() },
            _ => NodeKind::Number(value),
        };
        Node::new(kind, self.loc)
    }

    /// Truthiness used by `@if`, `and` and `or`
    pub fn is_truthy(&self) -> bool {
        match &self.kind {
            NodeKind::Boolean(value) => *value,
            NodeKind::Number(value) | NodeKind::Percentage(value) => *value != 0.0,
            NodeKind::Dimension { value, .. } => *value != 0.0,
            NodeKind::Identifier(value) => !value.is_empty(),
            NodeKind::String(string) => !string.value.is_empty(),
            _ => true,
        }
    }

    /// Raw text of an identifier or string
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier(value) => Some(value),
            NodeKind::String(string) => Some(&string.value),
            _ => None,
        }
    }

    /// Child rules of nodes that own a rule list
    pub fn rules_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.kind {
            NodeKind::Root { children, .. } => Some(children),
            NodeKind::Ruleset { rules, .. } | NodeKind::Media { rules, .. } => Some(rules),
            NodeKind::Void(rules) => Some(rules),
            _ => None,
        }
    }

    /// Materialize a range into its items
    ///
    /// Yields `null` when the range is empty, the single item when it holds
    /// one value, and a space-separated list otherwise.
    pub fn range_to_list(&self) -> Node {
        let NodeKind::Range { from, exclusive, to } = &self.kind else {
            return self.clone();
        };
        let (Some(mut current), Some(end)) = (from.to_number(), to.to_number()) else {
            return Node::null(self.loc);
        };

        let step = if current < end { 1.0 } else { -1.0 };
        let mut items = Vec::new();
        loop {
            let within = if *exclusive {
                (step > 0.0 && current < end) || (step < 0.0 && current > end)
            } else {
                (step > 0.0 && current <= end) || (step < 0.0 && current >= end)
            };
            if !within {
                break;
            }
            if !items.is_empty() {
                items.push(Node::new(NodeKind::Separator(" ".to_string()), self.loc));
            }
            items.push(from.with_number(current));
            current += step;
        }

        match items.len() {
            0 => Node::null(self.loc),
            1 => items.remove(0),
            _ => Node::new(NodeKind::List(items), self.loc),
        }
    }
}
