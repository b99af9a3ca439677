//! Evaluator
//!
//! Eliminates the dynamic constructs of a stylesheet: variables are
//! resolved, expressions computed, interpolations spliced, and `@if`,
//! `@for`, `@block`, `@module`, mixin calls and function calls expanded
//! into plain rules and values.

use roole_syntax::{
    parse_media_query, parse_selector, Alternative, ArithmeticOp, AssignOp, EqualityOp, Fragment,
    LogicalOp, Node, NodeKind, Quote, RelationalOp, SourceLocation, StringValue, UnaryOp,
};
use smallvec::{smallvec, SmallVec};

use crate::error::{CompileError, CompileResult};
use crate::scope::Scope;
use crate::serializer::to_css;

/// Rules a single rule evaluates to
type Rules = SmallVec<[Node; 1]>;

/// Evaluate a parsed (and imported) stylesheet
pub fn evaluate(root: Node) -> CompileResult<Node> {
    Evaluator::new().evaluate(root)
}

/// Tree-walking evaluator
#[derive(Debug, Default)]
pub struct Evaluator {
    scope: Scope,
    file_path: String,
    /// Class prefix accumulated from enclosing `@module`s
    module_prefix: String,
    in_function: bool,
    /// Value of the `@return` that ended the current function body
    returned: Option<Node>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evaluate(&mut self, root: Node) -> CompileResult<Node> {
        let loc = root.loc;
        match root.kind {
            NodeKind::Root { file_path, children } => self.visit_root(file_path, children, loc),
            kind => Ok(Node::new(kind, loc)),
        }
    }

    fn error(&self, message: impl Into<String>, node: &Node) -> CompileError {
        CompileError::semantic(message, node, &self.file_path)
    }

    fn error_at(&self, message: impl Into<String>, location: SourceLocation) -> CompileError {
        CompileError::Semantic {
            message: message.into(),
            location,
            file_path: self.file_path.clone(),
        }
    }

    /// Run `f` inside a fresh variable frame
    fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> CompileResult<T>) -> CompileResult<T> {
        self.scope.push();
        let result = f(self);
        self.scope.pop();
        result
    }

    // ---------------------------------------------------------------------
    // Rules

    fn visit_root(&mut self, file_path: String, children: Vec<Node>, loc: SourceLocation) -> CompileResult<Node> {
        let previous = std::mem::replace(&mut self.file_path, file_path.clone());
        let children = self.visit_rules(children);
        self.file_path = previous;
        Ok(Node::new(NodeKind::Root { file_path, children: children? }, loc))
    }

    fn visit_rules(&mut self, rules: Vec<Node>) -> CompileResult<Vec<Node>> {
        let mut output = Vec::with_capacity(rules.len());
        for rule in rules {
            if self.returned.is_some() {
                break;
            }
            output.extend(self.visit_rule(rule)?);
        }
        Ok(output)
    }

    fn visit_rule(&mut self, node: Node) -> CompileResult<Rules> {
        let loc = node.loc;
        let kind = match node.kind {
            NodeKind::Root { file_path, children } => {
                return Ok(smallvec![self.visit_root(file_path, children, loc)?]);
            }
            NodeKind::Ruleset { selector_list, rules } => {
                let selector_list = self.visit_selector_list(*selector_list)?;
                let rules = self.scoped(|this| this.visit_rules(rules))?;
                if rules.is_empty() {
                    return Ok(Rules::new());
                }
                NodeKind::Ruleset {
                    selector_list: Box::new(selector_list),
                    rules,
                }
            }
            NodeKind::Property { name, value, important } => NodeKind::Property {
                name: Box::new(self.visit_value(*name)?),
                value: Box::new(self.visit_value(*value)?),
                important,
            },
            NodeKind::Assignment { name, operator, value } => {
                self.visit_assignment(&name, operator, *value, loc)?;
                return Ok(Rules::new());
            }
            NodeKind::Extend { selector_list, all, id } => NodeKind::Extend {
                selector_list: Box::new(self.visit_selector_list(*selector_list)?),
                all,
                id,
            },
            NodeKind::Media { query_list, rules } => {
                let query_list = self.visit_media_query_list(*query_list)?;
                let rules = self.scoped(|this| this.visit_rules(rules))?;
                if rules.is_empty() {
                    return Ok(Rules::new());
                }
                NodeKind::Media {
                    query_list: Box::new(query_list),
                    rules,
                }
            }
            NodeKind::Void(rules) => NodeKind::Void(self.scoped(|this| this.visit_rules(rules))?),
            NodeKind::Block(rules) => {
                return Ok(Rules::from_vec(self.scoped(|this| this.visit_rules(rules))?));
            }
            NodeKind::Module { name, separator, rules } => {
                return self.visit_module(*name, separator.map(|s| *s), rules);
            }
            NodeKind::Import { url, media } => NodeKind::Import {
                url: Box::new(self.visit_value(*url)?),
                media: match media {
                    Some(media) => Some(Box::new(self.visit_media_query_list(*media)?)),
                    None => None,
                },
            },
            NodeKind::If { condition, consequence, alternative } => {
                return self.visit_if(*condition, consequence, alternative);
            }
            NodeKind::For { value, index, step, list, rules } => {
                return self.visit_for(*value, index.map(|i| *i), step.map(|s| *s), *list, rules);
            }
            NodeKind::MixinCall { callee, arguments } => {
                return self.visit_mixin_call(*callee, arguments, loc);
            }
            NodeKind::Return(value) => {
                if !self.in_function {
                    return Err(self.error_at("@return is only allowed inside @function", loc));
                }
                self.returned = Some(self.visit_value(*value)?);
                return Ok(Rules::new());
            }
            NodeKind::Keyframes { prefix, name, keyframes } => NodeKind::Keyframes {
                prefix,
                name: Box::new(self.visit_value(*name)?),
                keyframes: keyframes
                    .into_iter()
                    .map(|keyframe| self.visit_keyframe(keyframe))
                    .collect::<CompileResult<_>>()?,
            },
            NodeKind::FontFace(properties) => NodeKind::FontFace(self.visit_rules(properties)?),
            NodeKind::Charset(value) => NodeKind::Charset(Box::new(self.visit_value(*value)?)),
            kind => kind,
        };
        Ok(smallvec![Node::new(kind, loc)])
    }

    fn visit_assignment(&mut self, name: &str, operator: AssignOp, value: Node, loc: SourceLocation) -> CompileResult<()> {
        let value = self.visit_value(value)?;
        let value = match operator.arithmetic() {
            Some(op) => {
                let current = self.resolve(name, loc)?;
                self.arithmetic(current, op, value)?
            }
            None => {
                if operator == AssignOp::Default && self.scope.resolve(name).is_some() {
                    return Ok(());
                }
                value
            }
        };
        log::trace!("${} = {}", name, value.type_name());
        self.scope.define(name, value);
        Ok(())
    }

    fn visit_module(&mut self, name: Node, separator: Option<Node>, rules: Vec<Node>) -> CompileResult<Rules> {
        let name = self.visit_value(name)?;
        let name = match &name.kind {
            NodeKind::Identifier(text) => text.clone(),
            NodeKind::String(string) => string.value.clone(),
            _ => return Err(self.error("module name can only be identifier or string", &name)),
        };
        let separator = match separator {
            Some(separator) => {
                let separator = self.visit_value(separator)?;
                match &separator.kind {
                    NodeKind::String(string) => string.value.clone(),
                    _ => return Err(self.error("module separator can only be string", &separator)),
                }
            }
            None => "-".to_string(),
        };

        let outer = self.module_prefix.clone();
        self.module_prefix = format!("{}{}{}", outer, name, separator);
        let rules = self.scoped(|this| this.visit_rules(rules));
        self.module_prefix = outer;
        Ok(Rules::from_vec(rules?))
    }

    fn visit_if(&mut self, condition: Node, consequence: Vec<Node>, alternative: Option<Alternative>) -> CompileResult<Rules> {
        let condition = self.visit_value(condition)?;
        if condition.is_truthy() {
            return Ok(Rules::from_vec(self.visit_rules(consequence)?));
        }
        match alternative {
            Some(Alternative::ElseIf(branch)) => self.visit_rule(*branch),
            Some(Alternative::Else(rules)) => Ok(Rules::from_vec(self.visit_rules(rules)?)),
            None => Ok(Rules::new()),
        }
    }

    fn visit_for(
        &mut self,
        value: Node,
        index: Option<Node>,
        step: Option<Node>,
        list: Node,
        rules: Vec<Node>,
    ) -> CompileResult<Rules> {
        let step = match step {
            Some(step) => {
                let step = self.visit_value(step)?;
                let number = step
                    .to_number()
                    .ok_or_else(|| self.error("step number must be a numberic value", &step))?;
                if number == 0.0 {
                    return Err(self.error("step number is not allowed to be zero", &step));
                }
                number
            }
            None => 1.0,
        };

        let mut list = self.visit_value(list)?;
        if matches!(list.kind, NodeKind::Range { .. }) {
            list = list.range_to_list();
        }

        let value_name = variable_name(&value);
        let index = index.map(|index| (variable_name(&index).to_string(), index.loc));
        let items = match list.kind {
            NodeKind::Null => {
                self.scope.define(value_name, list);
                if let Some((name, loc)) = &index {
                    self.scope.define(name, Node::null(*loc));
                }
                return Ok(Rules::new());
            }
            NodeKind::List(items) => items,
            _ => {
                self.scope.define(value_name, list);
                if let Some((name, loc)) = &index {
                    self.scope.define(name, Node::number(0.0, *loc));
                }
                return Ok(Rules::from_vec(self.visit_rules(rules)?));
            }
        };

        // Items sit at even positions, separators in between
        let step = if step > 0.0 {
            step.trunc().max(1.0) as isize
        } else {
            step.trunc().min(-1.0) as isize
        };
        let length = items.len() as isize;
        // A step past the end only visits the first item
        let step = step.clamp(-length.max(1), length.max(1));
        let (mut i, mut j) = if step > 0 { (0, 0) } else { (length - 1, (length - 1) / 2) };

        let mut output = Rules::new();
        while (0..length).contains(&i) {
            self.scope.define(value_name, items[i as usize].clone());
            if let Some((name, loc)) = &index {
                self.scope.define(name, Node::number(j as f64, *loc));
            }
            output.extend(self.visit_rules(rules.clone())?);
            if self.returned.is_some() {
                break;
            }
            i += 2 * step;
            j += step.signum();
        }
        Ok(output)
    }

    fn visit_mixin_call(&mut self, callee: Node, arguments: Vec<Node>, loc: SourceLocation) -> CompileResult<Rules> {
        let callee = self.visit_value(callee)?;
        let NodeKind::Mixin { parameters, rules } = callee.kind else {
            let message = format!("'{}' is not a 'mixin'", callee.type_name());
            return Err(self.error_at(message, loc));
        };
        let rules = self.scoped(|this| this.call(parameters, rules, arguments, loc, false))?;
        Ok(Rules::from_vec(rules))
    }

    fn visit_call(&mut self, callee: Node, arguments: Vec<Node>, loc: SourceLocation) -> CompileResult<Node> {
        let callee = self.visit_value(callee)?;
        let NodeKind::UserFunction { parameters, rules } = callee.kind else {
            let message = format!("'{}' is not a 'function'", callee.type_name());
            return Err(self.error_at(message, loc));
        };

        let outer = self.returned.take();
        let result = self.scoped(|this| this.call(parameters, rules, arguments, loc, true));
        let returned = std::mem::replace(&mut self.returned, outer);
        result?;

        Ok(match returned {
            Some(mut value) => {
                value.loc = loc;
                value
            }
            None => Node::null(loc),
        })
    }

    /// Bind arguments to parameters and evaluate a mixin or function body
    ///
    /// Missing arguments take the parameter default, or `null`.
    fn call(
        &mut self,
        parameters: Vec<Node>,
        rules: Vec<Node>,
        arguments: Vec<Node>,
        loc: SourceLocation,
        in_function: bool,
    ) -> CompileResult<Vec<Node>> {
        let arguments = arguments
            .into_iter()
            .map(|argument| self.visit_value(argument))
            .collect::<CompileResult<Vec<_>>>()?;

        for (i, parameter) in parameters.into_iter().enumerate() {
            let NodeKind::Parameter { name, default } = parameter.kind else {
                continue;
            };
            let value = match arguments.get(i) {
                Some(argument) => argument.clone(),
                None => default.map(|default| *default).unwrap_or_else(|| Node::null(loc)),
            };
            self.scope.define(&name, value);
        }

        let outer = std::mem::replace(&mut self.in_function, in_function);
        let rules = self.visit_rules(rules);
        self.in_function = outer;
        rules
    }

    fn visit_keyframe(&mut self, keyframe: Node) -> CompileResult<Node> {
        let loc = keyframe.loc;
        match keyframe.kind {
            NodeKind::Keyframe { selectors, properties } => {
                let properties = self.visit_rules(properties)?;
                Ok(Node::new(NodeKind::Keyframe { selectors, properties }, loc))
            }
            kind => Ok(Node::new(kind, loc)),
        }
    }

    // ---------------------------------------------------------------------
    // Selectors

    fn visit_selector_list(&mut self, node: Node) -> CompileResult<Node> {
        let loc = node.loc;
        match node.kind {
            NodeKind::SelectorList(selectors) => {
                let selectors = selectors
                    .into_iter()
                    .map(|selector| self.visit_selector(selector))
                    .collect::<CompileResult<_>>()?;
                Ok(Node::new(NodeKind::SelectorList(selectors), loc))
            }
            kind => Ok(Node::new(kind, loc)),
        }
    }

    fn visit_selector(&mut self, node: Node) -> CompileResult<Node> {
        let loc = node.loc;
        let NodeKind::Selector(parts) = node.kind else {
            return Ok(Node::new(node.kind, loc));
        };

        let mut output: Vec<Node> = Vec::with_capacity(parts.len());
        for part in parts {
            let NodeKind::SelectorInterpolation(value) = part.kind else {
                output.push(self.visit_selector_part(part)?);
                continue;
            };

            let value = self.visit_value(*value)?;
            let NodeKind::String(string) = value.kind else {
                let value = Node::new(value.kind, value.loc);
                output.push(Node::new(NodeKind::TypeSelector(Box::new(value)), part.loc));
                continue;
            };

            let selector = parse_selector(string.value.trim(), &self.file_path, value.loc)
                .map_err(|source| CompileError::Interpolation {
                    context: "selector",
                    source,
                })?;
            let NodeKind::Selector(spliced) = selector.kind else {
                continue;
            };
            // `body $selector` with `$selector = '> div'` must not yield two combinators
            let is_combinator = |node: Option<&Node>| matches!(node.map(|n| &n.kind), Some(NodeKind::Combinator(_)));
            if is_combinator(spliced.first()) && is_combinator(output.last()) {
                output.pop();
            }
            for part in spliced {
                output.push(self.visit_selector_part(part)?);
            }
        }
        Ok(Node::new(NodeKind::Selector(output), loc))
    }

    fn visit_selector_part(&mut self, node: Node) -> CompileResult<Node> {
        let loc = node.loc;
        let kind = match node.kind {
            NodeKind::TypeSelector(value) => NodeKind::TypeSelector(Box::new(self.visit_value(*value)?)),
            NodeKind::HashSelector(value) => NodeKind::HashSelector(Box::new(self.visit_value(*value)?)),
            NodeKind::ClassSelector(value) => {
                let mut value = self.visit_value(*value)?;
                if !self.module_prefix.is_empty() {
                    let name = format!("{}{}", self.module_prefix, to_css(&value));
                    value = Node::identifier(name, value.loc);
                }
                NodeKind::ClassSelector(Box::new(value))
            }
            NodeKind::AttributeSelector { name, operator, value } => NodeKind::AttributeSelector {
                name: Box::new(self.visit_value(*name)?),
                operator,
                value: match value {
                    Some(value) => Some(Box::new(self.visit_value(*value)?)),
                    None => None,
                },
            },
            NodeKind::NegationSelector(argument) => {
                NodeKind::NegationSelector(Box::new(self.visit_selector_part(*argument)?))
            }
            NodeKind::PseudoSelector { value, doubled } => NodeKind::PseudoSelector {
                value: Box::new(self.visit_pseudo_value(*value)?),
                doubled,
            },
            kind => kind,
        };
        Ok(Node::new(kind, loc))
    }

    fn visit_pseudo_value(&mut self, node: Node) -> CompileResult<Node> {
        let loc = node.loc;
        match node.kind {
            NodeKind::Function { name, arguments } => {
                let mut evaluated = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    let argument_loc = argument.loc;
                    evaluated.push(match argument.kind {
                        NodeKind::PseudoArgument(elements) => {
                            let elements = elements
                                .into_iter()
                                .map(|element| self.visit_value(element))
                                .collect::<CompileResult<_>>()?;
                            Node::new(NodeKind::PseudoArgument(elements), argument_loc)
                        }
                        kind => self.visit_value(Node::new(kind, argument_loc))?,
                    });
                }
                Ok(Node::new(NodeKind::Function { name, arguments: evaluated }, loc))
            }
            kind => self.visit_value(Node::new(kind, loc)),
        }
    }

    // ---------------------------------------------------------------------
    // Media queries

    fn visit_media_query_list(&mut self, node: Node) -> CompileResult<Node> {
        let loc = node.loc;
        match node.kind {
            NodeKind::MediaQueryList(queries) => {
                let mut evaluated = Vec::with_capacity(queries.len());
                for query in queries {
                    let query_loc = query.loc;
                    evaluated.push(match query.kind {
                        NodeKind::MediaQuery(parts) => {
                            Node::new(NodeKind::MediaQuery(self.visit_media_query_parts(parts)?), query_loc)
                        }
                        kind => Node::new(kind, query_loc),
                    });
                }
                Ok(Node::new(NodeKind::MediaQueryList(evaluated), loc))
            }
            kind => Ok(Node::new(kind, loc)),
        }
    }

    fn visit_media_query_parts(&mut self, parts: Vec<Node>) -> CompileResult<Vec<Node>> {
        let mut output = Vec::with_capacity(parts.len());
        for part in parts {
            let loc = part.loc;
            match part.kind {
                NodeKind::MediaInterpolation(value) => {
                    let value = self.visit_value(*value)?;
                    let NodeKind::String(string) = value.kind else {
                        let kind = NodeKind::MediaType {
                            modifier: None,
                            value: Box::new(Node::new(value.kind, value.loc)),
                        };
                        output.push(Node::new(kind, loc));
                        continue;
                    };
                    let query = parse_media_query(string.value.trim(), &self.file_path, value.loc)
                        .map_err(|source| CompileError::Interpolation {
                            context: "media query",
                            source,
                        })?;
                    if let NodeKind::MediaQuery(spliced) = query.kind {
                        output.extend(self.visit_media_query_parts(spliced)?);
                    }
                }
                NodeKind::MediaType { modifier, value } => {
                    let value = Box::new(self.visit_value(*value)?);
                    output.push(Node::new(NodeKind::MediaType { modifier, value }, loc));
                }
                NodeKind::MediaFeature { name, value } => {
                    let kind = NodeKind::MediaFeature {
                        name: Box::new(self.visit_value(*name)?),
                        value: match value {
                            Some(value) => Some(Box::new(self.visit_value(*value)?)),
                            None => None,
                        },
                    };
                    output.push(Node::new(kind, loc));
                }
                kind => output.push(Node::new(kind, loc)),
            }
        }
        Ok(output)
    }

    // ---------------------------------------------------------------------
    // Values

    fn resolve(&self, name: &str, loc: SourceLocation) -> CompileResult<Node> {
        match self.scope.resolve(name) {
            Some(value) => {
                let mut value = value.clone();
                value.loc = loc;
                Ok(value)
            }
            None => Err(self.error_at(format!("${} is undefined", name), loc)),
        }
    }

    fn visit_value(&mut self, node: Node) -> CompileResult<Node> {
        let loc = node.loc;
        let kind = match node.kind {
            NodeKind::Variable(name) => return self.resolve(&name, loc),
            NodeKind::InterpolatedIdentifier(fragments) => {
                NodeKind::Identifier(self.interpolate(fragments, false)?)
            }
            NodeKind::InterpolatedString(fragments) => NodeKind::String(StringValue {
                value: self.interpolate(fragments, true)?,
                quote: Quote::Double,
            }),
            NodeKind::List(items) => NodeKind::List(
                items
                    .into_iter()
                    .map(|item| self.visit_value(item))
                    .collect::<CompileResult<_>>()?,
            ),
            NodeKind::Range { from, exclusive, to } => {
                let from = self.visit_value(*from)?;
                let to = self.visit_value(*to)?;
                for bound in [&from, &to] {
                    if bound.to_number().is_none() {
                        return Err(self.error("only numberic values are allowed in 'range'", bound));
                    }
                }
                NodeKind::Range {
                    from: Box::new(from),
                    exclusive,
                    to: Box::new(to),
                }
            }
            NodeKind::Logical { left, operator, right } => {
                let left = self.visit_value(*left)?;
                let short_circuits = match operator {
                    LogicalOp::And => !left.is_truthy(),
                    LogicalOp::Or => left.is_truthy(),
                };
                return if short_circuits { Ok(left) } else { self.visit_value(*right) };
            }
            NodeKind::Equality { left, operator, right } => {
                let left = self.visit_value(*left)?;
                let right = self.visit_value(*right)?;
                let equal = left == right;
                let result = match operator {
                    EqualityOp::Is => equal,
                    EqualityOp::Isnt => !equal,
                };
                return Ok(Node::boolean(result, left.loc));
            }
            NodeKind::Relational { left, operator, right } => {
                let left = self.visit_value(*left)?;
                let right = self.visit_value(*right)?;
                return Ok(Node::boolean(compare(&left, operator, &right), left.loc));
            }
            NodeKind::Arithmetic { left, operator, right } => {
                let left = self.visit_value(*left)?;
                let right = self.visit_value(*right)?;
                return self.arithmetic(left, operator, right);
            }
            NodeKind::Unary { operator, operand } => {
                let operand = self.visit_value(*operand)?;
                return match (operator, operand.to_number()) {
                    (UnaryOp::Plus, Some(_)) => Ok(operand),
                    (UnaryOp::Minus, Some(value)) => Ok(operand.with_number(-value)),
                    (operator, None) => {
                        let message = format!(
                            "unsupported unary operation: {}'{}'",
                            operator.as_str(),
                            operand.type_name()
                        );
                        Err(self.error_at(message, loc))
                    }
                };
            }
            NodeKind::Function { name, arguments } => NodeKind::Function {
                name,
                arguments: arguments
                    .into_iter()
                    .map(|argument| self.visit_value(argument))
                    .collect::<CompileResult<_>>()?,
            },
            NodeKind::Call { callee, arguments } => return self.visit_call(*callee, arguments, loc),
            NodeKind::Url(value) => NodeKind::Url(Box::new(self.visit_value(*value)?)),
            NodeKind::Mixin { parameters, rules } => NodeKind::Mixin {
                parameters: self.visit_parameters(parameters)?,
                rules,
            },
            NodeKind::UserFunction { parameters, rules } => NodeKind::UserFunction {
                parameters: self.visit_parameters(parameters)?,
                rules,
            },
            kind => kind,
        };
        Ok(Node::new(kind, loc))
    }

    /// Evaluate parameter defaults in the defining scope
    fn visit_parameters(&mut self, parameters: Vec<Node>) -> CompileResult<Vec<Node>> {
        parameters
            .into_iter()
            .map(|parameter| {
                let loc = parameter.loc;
                match parameter.kind {
                    NodeKind::Parameter { name, default: Some(default) } => {
                        let default = Some(Box::new(self.visit_value(*default)?));
                        Ok(Node::new(NodeKind::Parameter { name, default }, loc))
                    }
                    kind => Ok(Node::new(kind, loc)),
                }
            })
            .collect()
    }

    /// Concatenate the fragments of an interpolated identifier or string
    fn interpolate(&mut self, fragments: Vec<Fragment>, quoted: bool) -> CompileResult<String> {
        let mut text = String::new();
        for fragment in fragments {
            let node = match fragment {
                Fragment::Text(value) => {
                    text.push_str(&value);
                    continue;
                }
                Fragment::Splice(node) => self.visit_value(node)?,
            };
            match &node.kind {
                NodeKind::Mixin { .. } | NodeKind::UserFunction { .. } => {
                    let message = format!("'{}' is not allowed to be interpolated", node.type_name());
                    return Err(self.error(message, &node));
                }
                NodeKind::String(string) if quoted => text.push_str(&escape_quotes(&string.value)),
                NodeKind::String(string) => text.push_str(&string.value),
                NodeKind::Identifier(value) => text.push_str(value),
                NodeKind::Number(value) => text.push_str(&number_text(*value)),
                _ => text.push_str(&to_css(&node)),
            }
        }
        Ok(text)
    }

    /// Apply a binary arithmetic operator
    fn arithmetic(&self, left: Node, operator: ArithmeticOp, right: Node) -> CompileResult<Node> {
        use NodeKind::*;

        let numeric = |node: &Node| matches!(node.kind, Number(_) | Percentage(_) | Dimension { .. });
        let textual = |node: &Node| matches!(node.kind, Identifier(_) | String(_));

        if let (Some(a), Some(b)) = (left.to_number(), right.to_number()) {
            if operator == ArithmeticOp::Divide && b == 0.0 {
                return Err(self.error("divide by zero", &right));
            }
            let value = match operator {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Subtract => a - b,
                ArithmeticOp::Multiply => a * b,
                ArithmeticOp::Divide => a / b,
            };
            // A plain number adopts the unit of the other operand
            return Ok(match left.kind {
                Number(_) if !matches!(right.kind, Number(_)) => right.with_number(value),
                _ => left.with_number(value),
            });
        }

        if operator == ArithmeticOp::Add {
            let appends = match (&left.kind, &right.kind) {
                (Identifier(_), Number(_) | Boolean(_) | Identifier(_) | Percentage(_) | Dimension { .. }) => true,
                (String(_), _) => textual(&right) || numeric(&right) || matches!(right.kind, Boolean(_)),
                _ => false,
            };
            if appends {
                let suffix = match (&left.kind, &right.kind) {
                    (Identifier(_), Percentage(value)) => number_text(*value),
                    _ => operand_text(&right),
                };
                return Ok(with_text(left, |text| text.push_str(&suffix)));
            }

            let prepends = match (&left.kind, &right.kind) {
                (Number(_) | Boolean(_) | Identifier(_) | Percentage(_) | Dimension { .. }, String(_)) => true,
                (Boolean(_) | Dimension { .. }, Identifier(_)) => true,
                _ => false,
            };
            if prepends {
                let prefix = operand_text(&left);
                return Ok(with_text(right, |text| text.insert_str(0, &prefix)));
            }
        }

        let message = format!(
            "unsupported binary operation: '{}' {} '{}'",
            left.type_name(),
            operator.as_str(),
            right.type_name()
        );
        Err(self.error(message, &left))
    }
}

/// Name of a `$variable` node
fn variable_name(node: &Node) -> &str {
    match &node.kind {
        NodeKind::Variable(name) => name,
        _ => "",
    }
}

/// Text of an operand in a concatenation
fn operand_text(node: &Node) -> String {
    match &node.kind {
        NodeKind::Identifier(value) => value.clone(),
        NodeKind::String(string) => string.value.clone(),
        NodeKind::Number(value) => number_text(*value),
        NodeKind::Percentage(value) => format!("{}%", number_text(*value)),
        NodeKind::Dimension { value, unit } => format!("{}{}", number_text(*value), unit),
        NodeKind::Boolean(value) => value.to_string(),
        _ => to_css(node),
    }
}

/// Rewrite the text of an identifier or string node
fn with_text(mut node: Node, edit: impl FnOnce(&mut String)) -> Node {
    match &mut node.kind {
        NodeKind::Identifier(value) => edit(value),
        NodeKind::String(string) => edit(&mut string.value),
        _ => {}
    }
    node
}

/// Unrounded number text
fn number_text(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// Escape bare double quotes, keeping already escaped ones
fn escape_quotes(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                escaped.push('\\');
                escaped.push('"');
                chars.next();
            }
            '"' => escaped.push_str("\\\""),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Relational comparison; identifiers and strings compare as text
fn compare(left: &Node, operator: RelationalOp, right: &Node) -> bool {
    fn apply<T: PartialOrd + ?Sized>(a: &T, operator: RelationalOp, b: &T) -> bool {
        match operator {
            RelationalOp::Lt => a < b,
            RelationalOp::Le => a <= b,
            RelationalOp::Gt => a > b,
            RelationalOp::Ge => a >= b,
        }
    }

    match (&left.kind, &right.kind) {
        (NodeKind::Identifier(a), NodeKind::Identifier(b)) => apply(a.as_str(), operator, b.as_str()),
        (NodeKind::String(a), NodeKind::String(b)) => apply(a.value.as_str(), operator, b.value.as_str()),
        _ => match (left.to_number(), right.to_number()) {
            (Some(a), Some(b)) => apply(&a, operator, &b),
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roole_syntax::parse;

    fn eval(input: &str) -> CompileResult<Node> {
        evaluate(parse(input, "").unwrap())
    }

    fn children(node: &Node) -> &[Node] {
        match &node.kind {
            NodeKind::Root { children, .. } => children,
            NodeKind::Ruleset { rules, .. } | NodeKind::Media { rules, .. } => rules,
            _ => panic!("Expected a rule container, got {}", node.type_name()),
        }
    }

    /// Serialized values of the properties of the first ruleset
    fn values(input: &str) -> Vec<String> {
        let root = eval(input).unwrap();
        children(&children(&root)[0])
            .iter()
            .filter_map(|rule| match &rule.kind {
                NodeKind::Property { value, .. } => Some(to_css(value)),
                _ => None,
            })
            .collect()
    }

    fn value(expression: &str) -> String {
        values(&format!("a {{ b: {}; }}", expression)).remove(0)
    }

    fn fail(input: &str) -> (String, usize, usize) {
        let err = eval(input).unwrap_err();
        (err.message(), err.line(), err.column())
    }

    #[test]
    fn test_numeric_arithmetic() {
        assert_eq!(value("1 + 1"), "2");
        assert_eq!(value("1 + 1%"), "2%");
        assert_eq!(value("2% + 1px"), "3%");
        assert_eq!(value("1em + 1px"), "2em");
        assert_eq!(value("1 - 2px"), "-1px");
        assert_eq!(value("2 * 1%"), "2%");
        assert_eq!(value("1 / 3"), "0.333");
        assert_eq!(value("1px / 2%"), "0.5px");
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(value("1 + 'str'"), "'1str'");
        assert_eq!(value("2% + 'str'"), "'2%str'");
        assert_eq!(value("1px + id"), "1pxid");
        assert_eq!(value("true + id"), "trueid");
        assert_eq!(value("id + 1px"), "id1px");
        assert_eq!(value("-webkit + -moz"), "-webkit-moz");
        assert_eq!(value("'str' + 1%"), "'str1%'");
        assert_eq!(value("\"foo\" + 'bar'"), "\"foobar\"");
        assert_eq!(value("id + 'str'"), "'idstr'");
        assert_eq!(value("a + 50%"), "a50");
        assert_eq!(value("a + 50px"), "a50px");
    }

    #[test]
    fn test_unsupported_operations() {
        assert_eq!(
            fail("a {\n\tb: true - 1;\n}").0,
            "unsupported binary operation: 'boolean' - 'number'"
        );
        assert_eq!(fail("a {\n\tb: -(true);\n}").0, "unsupported unary operation: -'boolean'");
        assert_eq!(fail("a {\n\tb: 1 + id;\n}").0, "unsupported binary operation: 'number' + 'identifier'");
    }

    #[test]
    fn test_divide_by_zero_located_at_divisor() {
        assert_eq!(fail("body {\n\t-foo: 1 / 0;\n}"), ("divide by zero".to_string(), 2, 12));
        assert_eq!(fail("body {\n\t-foo: 1px / 0%;\n}").1, 2);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(value("1 < 2"), "true");
        assert_eq!(value("2 >= abc"), "false");
        assert_eq!(value("abc < abd"), "true");
        assert_eq!(value("1 is 1"), "true");
        assert_eq!(value("'a' is \"a\""), "true");
        assert_eq!(value("1 isnt 1px"), "true");
        assert_eq!(value("false or 0 or a"), "a");
        assert_eq!(value("a and 0 and b"), "0");
    }

    #[test]
    fn test_variables_and_scopes() {
        let input = "$w = 1px;\na {\n\t$w = 2px;\n\tb: $w;\n}\nc {\n\td: $w;\n}";
        let root = eval(input).unwrap();
        assert_eq!(to_css(&children(&children(&root)[0])[0]), "b: 2px");
        assert_eq!(to_css(&children(&children(&root)[1])[0]), "d: 1px");
    }

    #[test]
    fn test_default_and_compound_assignment() {
        assert_eq!(values("$a = 1;\n$a ?= 2;\n$b ?= 3;\nx { a: $a; b: $b; }"), vec!["1", "3"]);
        assert_eq!(values("$a = 1px;\n$a += 2;\n$a *= 3;\nx { a: $a; }"), vec!["9px"]);
        assert_eq!(fail("$a += 1;").0, "$a is undefined");
    }

    #[test]
    fn test_undefined_variable() {
        assert_eq!(fail("a {\n\tb: $c;\n}"), ("$c is undefined".to_string(), 2, 5));
    }

    #[test]
    fn test_identifier_interpolation() {
        assert_eq!(values("$b = bar;\n$n = 1.5;\na { foo-{$b}-$n: x; }").len(), 1);
        let root = eval("$b = bar;\na { foo-$b: x; }").unwrap();
        assert_eq!(to_css(&children(&children(&root)[0])[0]), "foo-bar: x");
        assert_eq!(
            fail("$m = @mixin {\n\ta { b: c; }\n};\nx {\n\tfoo-$m: x;\n}").0,
            "'mixin' is not allowed to be interpolated"
        );
    }

    #[test]
    fn test_string_interpolation() {
        assert_eq!(values("$b = 'x\"y';\na { c: \"a $b\"; }"), vec!["\"a x\\\"y\""]);
        assert_eq!(values("$b = 'x\\\"y';\na { c: \"{$b}\"; }"), vec!["\"x\\\"y\""]);
        assert_eq!(values("$b = 1 2;\na { c: '$b'; d: \"$b\"; }"), vec!["'$b'", "\"1 2\""]);
    }

    #[test]
    fn test_selector_interpolation() {
        let root = eval("$sel = '> div';\nbody $sel { a: b; }").unwrap();
        let NodeKind::Ruleset { selector_list, .. } = &children(&root)[0].kind else {
            panic!("Expected ruleset");
        };
        assert_eq!(to_css(selector_list), "body > div");

        let (message, line, column) = fail("$sel = 'a #';\n$sel { b: c; }");
        assert!(message.starts_with("error parsing selector interpolation: "));
        assert_eq!((line, column), (2, 1));
    }

    #[test]
    fn test_media_interpolation() {
        let root = eval("$q = 'screen and (color)';\n@media $q, print { a { b: c; } }").unwrap();
        let NodeKind::Media { query_list, .. } = &children(&root)[0].kind else {
            panic!("Expected media");
        };
        assert_eq!(to_css(query_list), "screen and (color),\nprint");
        assert_eq!(fail("$qry = 'screen @';\n@media $qry {\n\tbody {\n\t\twidth: auto;\n\t}\n}").1, 2);
    }

    #[test]
    fn test_empty_rulesets_removed() {
        let root = eval("a { $b = 1; }\n@media screen { a { $b = 1; } }").unwrap();
        assert!(children(&root).is_empty());
    }

    #[test]
    fn test_if_chain() {
        let input = "$a = 2;\n@if $a is 1 { a { b: one; } } @else if $a is 2 { a { b: two; } } @else { a { b: other; } }";
        assert_eq!(values(input), vec!["two"]);
        assert!(children(&eval("@if false { a { b: c; } }").unwrap()).is_empty());
    }

    #[test]
    fn test_for_loops() {
        assert_eq!(values("a { @for $i in 1..3 { b: $i; } }"), vec!["1", "2", "3"]);
        assert_eq!(values("a { @for $i, $j in a b c { b: $j; } }"), vec!["0", "1", "2"]);
        assert_eq!(values("a { @for $i by 2 in 1 2 3 { b: $i; } }"), vec!["1", "3"]);
        assert_eq!(values("a { @for $i, $j by -1 in a b c { b: $i $j; } }"), vec!["c 2", "b 1", "a 0"]);
        assert_eq!(values("a { @for $i, $j in x { b: $i $j; } }"), vec!["x 0"]);
    }

    #[test]
    fn test_for_huge_step_visits_first_item() {
        assert_eq!(values("a { @for $i by 9999999999999999999 in 1 2 3 { b: $i; } }"), vec!["1"]);
        assert_eq!(values("a { @for $i by -9999999999999999999 in 1 2 3 { b: $i; } }"), vec!["3"]);
        assert_eq!(values("a { @for $i, $j by -3 in a b c { b: $i $j; } }"), vec!["c 2"]);
    }

    #[test]
    fn test_for_over_null_binds_null() {
        assert_eq!(values("a { @for $i, $j in 1...1 { b: c; } d: $i $j; }"), vec!["null null"]);
    }

    #[test]
    fn test_for_step_errors() {
        assert_eq!(fail("@for $i by a in 1 2 { }").0, "step number must be a numberic value");
        assert_eq!(fail("@for $i by 0 in 1 2 { }").0, "step number is not allowed to be zero");
        assert_eq!(fail("@for $i in 1..a { }").0, "only numberic values are allowed in 'range'");
    }

    #[test]
    fn test_mixin_call() {
        let input = "$m = @mixin $a, $b = 2, $c {\n\twidth: $a $b $c;\n};\nx {\n\t$m(1);\n}";
        assert_eq!(values(input), vec!["1 2 null"]);
        assert_eq!(fail("$m = 1;\nx {\n\t$m();\n}"), ("'number' is not a 'mixin'".to_string(), 3, 2));
    }

    #[test]
    fn test_function_call() {
        let input = "$double = @function $n {\n\t@if $n > 0 {\n\t\t@return $n * 2;\n\t}\n\t@return 0;\n};\na { b: $double(2px); c: $double(-1); }";
        assert_eq!(values(input), vec!["4px", "0"]);
        assert_eq!(values("$f = @function { $x = 1; };\na { b: $f(); }"), vec!["null"]);
        assert_eq!(fail("$m = @mixin { };\na { b: $m(); }").0, "'mixin' is not a 'function'");
        assert_eq!(fail("a { @return 1; }").0, "@return is only allowed inside @function");
    }

    #[test]
    fn test_block_scope() {
        let input = "$a = 1;\n@block {\n\t$a = 2;\n\tb { c: $a; }\n}\nd { e: $a; }";
        let root = eval(input).unwrap();
        assert_eq!(children(&root).len(), 2);
        assert_eq!(to_css(&children(&children(&root)[1])[0]), "e: 1");
    }

    #[test]
    fn test_module_prefixes_classes() {
        let root = eval("@module foo {\n\t.a .b { c: d; }\n\t@module bar with '_' { .e { f: g; } }\n}").unwrap();
        let selectors: Vec<String> = children(&root)
            .iter()
            .filter_map(|rule| match &rule.kind {
                NodeKind::Ruleset { selector_list, .. } => Some(to_css(selector_list)),
                _ => None,
            })
            .collect();
        assert_eq!(selectors, vec![".foo-a .foo-b", ".foo-bar_e"]);
        assert_eq!(fail("@module 1 { }").0, "module name can only be identifier or string");
        assert_eq!(fail("@module a with b { }").0, "module separator can only be string");
    }
}
