//! Graph pattern and expression trees.

use crate::term::*;
use oxterm::{Literal, NamedNode, Variable};
use std::fmt;

/// An [expression](https://www.w3.org/TR/sparql11-query/#expressions).
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum Expression {
    NamedNode(NamedNode),
    Literal(Literal),
    Variable(Variable),
    /// [Logical-or](https://www.w3.org/TR/sparql11-query/#func-logical-or).
    Or(Box<Self>, Box<Self>),
    /// [Logical-and](https://www.w3.org/TR/sparql11-query/#func-logical-and).
    And(Box<Self>, Box<Self>),
    /// [RDFterm-equal](https://www.w3.org/TR/sparql11-query/#func-RDFterm-equal) and all the XSD equalities.
    Equal(Box<Self>, Box<Self>),
    /// [sameTerm](https://www.w3.org/TR/sparql11-query/#func-sameTerm).
    SameTerm(Box<Self>, Box<Self>),
    /// [op:numeric-greater-than](https://www.w3.org/TR/xpath-functions/#func-numeric-greater-than) and other XSD greater than operators.
    Greater(Box<Self>, Box<Self>),
    GreaterOrEqual(Box<Self>, Box<Self>),
    /// [op:numeric-less-than](https://www.w3.org/TR/xpath-functions/#func-numeric-less-than) and other XSD less than operators.
    Less(Box<Self>, Box<Self>),
    LessOrEqual(Box<Self>, Box<Self>),
    /// [IN](https://www.w3.org/TR/sparql11-query/#func-in)
    In(Box<Self>, Vec<Self>),
    /// [op:numeric-add](https://www.w3.org/TR/xpath-functions/#func-numeric-add).
    Add(Box<Self>, Box<Self>),
    /// [op:numeric-subtract](https://www.w3.org/TR/xpath-functions/#func-numeric-subtract).
    Subtract(Box<Self>, Box<Self>),
    /// [op:numeric-multiply](https://www.w3.org/TR/xpath-functions/#func-numeric-multiply).
    Multiply(Box<Self>, Box<Self>),
    /// [op:numeric-divide](https://www.w3.org/TR/xpath-functions/#func-numeric-divide).
    Divide(Box<Self>, Box<Self>),
    /// [op:numeric-unary-plus](https://www.w3.org/TR/xpath-functions/#func-numeric-unary-plus).
    UnaryPlus(Box<Self>),
    /// [op:numeric-unary-minus](https://www.w3.org/TR/xpath-functions/#func-numeric-unary-minus).
    UnaryMinus(Box<Self>),
    /// [fn:not](https://www.w3.org/TR/xpath-functions/#func-not).
    Not(Box<Self>),
    /// [EXISTS](https://www.w3.org/TR/sparql11-query/#func-filter-exists).
    Exists(Box<GraphPattern>),
    /// [BOUND](https://www.w3.org/TR/sparql11-query/#func-bound).
    Bound(Variable),
    /// [IF](https://www.w3.org/TR/sparql11-query/#func-if).
    If(Box<Self>, Box<Self>, Box<Self>),
    /// [COALESCE](https://www.w3.org/TR/sparql11-query/#func-coalesce).
    Coalesce(Vec<Self>),
    /// A built-in function call.
    FunctionCall(Function, Vec<Self>),
}

impl Expression {
    /// Formats using the [SPARQL S-Expression syntax](https://jena.apache.org/documentation/notes/sse.html).
    pub(crate) fn fmt_sse(&self, f: &mut impl fmt::Write) -> fmt::Result {
        match self {
            Self::NamedNode(node) => write!(f, "{node}"),
            Self::Literal(l) => write!(f, "{l}"),
            Self::Variable(var) => write!(f, "{var}"),
            Self::Or(a, b) => fmt_sse_binary_expression(f, "||", a, b),
            Self::And(a, b) => fmt_sse_binary_expression(f, "&&", a, b),
            Self::Equal(a, b) => fmt_sse_binary_expression(f, "=", a, b),
            Self::SameTerm(a, b) => fmt_sse_binary_expression(f, "sameTerm", a, b),
            Self::Greater(a, b) => fmt_sse_binary_expression(f, ">", a, b),
            Self::GreaterOrEqual(a, b) => fmt_sse_binary_expression(f, ">=", a, b),
            Self::Less(a, b) => fmt_sse_binary_expression(f, "<", a, b),
            Self::LessOrEqual(a, b) => fmt_sse_binary_expression(f, "<=", a, b),
            Self::In(a, b) => {
                write!(f, "(in ")?;
                a.fmt_sse(f)?;
                for p in b {
                    write!(f, " ")?;
                    p.fmt_sse(f)?;
                }
                write!(f, ")")
            }
            Self::Add(a, b) => fmt_sse_binary_expression(f, "+", a, b),
            Self::Subtract(a, b) => fmt_sse_binary_expression(f, "-", a, b),
            Self::Multiply(a, b) => fmt_sse_binary_expression(f, "*", a, b),
            Self::Divide(a, b) => fmt_sse_binary_expression(f, "/", a, b),
            Self::UnaryPlus(e) => fmt_sse_unary_expression(f, "+", e),
            Self::UnaryMinus(e) => fmt_sse_unary_expression(f, "-", e),
            Self::Not(e) => fmt_sse_unary_expression(f, "!", e),
            Self::FunctionCall(function, parameters) => {
                write!(f, "({function}")?;
                for p in parameters {
                    write!(f, " ")?;
                    p.fmt_sse(f)?;
                }
                write!(f, ")")
            }
            Self::Exists(p) => {
                write!(f, "(exists ")?;
                p.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::Bound(v) => write!(f, "(bound {v})"),
            Self::If(a, b, c) => {
                write!(f, "(if ")?;
                a.fmt_sse(f)?;
                write!(f, " ")?;
                b.fmt_sse(f)?;
                write!(f, " ")?;
                c.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::Coalesce(parameters) => {
                write!(f, "(coalesce")?;
                for p in parameters {
                    write!(f, " ")?;
                    p.fmt_sse(f)?;
                }
                write!(f, ")")
            }
        }
    }

    /// Shorthand for a call to a built-in [`Function`].
    #[inline]
    pub fn call(function: Function, args: impl IntoIterator<Item = Self>) -> Self {
        Self::FunctionCall(function, args.into_iter().collect())
    }
}

impl fmt::Display for Expression {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_sse(f)
    }
}

impl From<NamedNode> for Expression {
    #[inline]
    fn from(p: NamedNode) -> Self {
        Self::NamedNode(p)
    }
}

impl From<Literal> for Expression {
    #[inline]
    fn from(p: Literal) -> Self {
        Self::Literal(p)
    }
}

impl From<Variable> for Expression {
    #[inline]
    fn from(v: Variable) -> Self {
        Self::Variable(v)
    }
}

impl From<NamedNodePattern> for Expression {
    #[inline]
    fn from(p: NamedNodePattern) -> Self {
        match p {
            NamedNodePattern::NamedNode(p) => p.into(),
            NamedNodePattern::Variable(p) => p.into(),
        }
    }
}

fn fmt_sse_binary_expression(
    f: &mut impl fmt::Write,
    name: &str,
    a: &Expression,
    b: &Expression,
) -> fmt::Result {
    write!(f, "({name} ")?;
    a.fmt_sse(f)?;
    write!(f, " ")?;
    b.fmt_sse(f)?;
    write!(f, ")")
}

fn fmt_sse_unary_expression(f: &mut impl fmt::Write, name: &str, e: &Expression) -> fmt::Result {
    write!(f, "({name} ")?;
    e.fmt_sse(f)?;
    write!(f, ")")
}

/// A built-in function name.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Function {
    Str,
    Lang,
    LangMatches,
    Datatype,
    IsIri,
    IsBlank,
    IsLiteral,
    IsNumeric,
    Regex,
    StrLen,
    UCase,
    LCase,
    Contains,
    StrStarts,
    StrEnds,
    StrBefore,
    StrAfter,
    Concat,
    Abs,
    /// The local name of an IRI, as a simple literal.
    LocalName,
    /// The namespace of an IRI, as a simple literal.
    Namespace,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Str => "STR",
            Self::Lang => "LANG",
            Self::LangMatches => "LANGMATCHES",
            Self::Datatype => "DATATYPE",
            Self::IsIri => "isIRI",
            Self::IsBlank => "isBLANK",
            Self::IsLiteral => "isLITERAL",
            Self::IsNumeric => "isNUMERIC",
            Self::Regex => "REGEX",
            Self::StrLen => "STRLEN",
            Self::UCase => "UCASE",
            Self::LCase => "LCASE",
            Self::Contains => "CONTAINS",
            Self::StrStarts => "STRSTARTS",
            Self::StrEnds => "STRENDS",
            Self::StrBefore => "STRBEFORE",
            Self::StrAfter => "STRAFTER",
            Self::Concat => "CONCAT",
            Self::Abs => "ABS",
            Self::LocalName => "LOCALNAME",
            Self::Namespace => "NAMESPACE",
        })
    }
}

/// A graph pattern of the algebra.
///
/// The node set is closed: every evaluator handles every variant with a plain `match`.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum GraphPattern {
    /// A single quad pattern matched against the store.
    Pattern(QuadPattern),
    /// [Join](https://www.w3.org/TR/sparql11-query/#defn_algJoin).
    Join { left: Box<Self>, right: Box<Self> },
    /// [LeftJoin](https://www.w3.org/TR/sparql11-query/#defn_algLeftJoin), also called optional.
    LeftJoin {
        left: Box<Self>,
        right: Box<Self>,
        expression: Option<Expression>,
    },
    /// [Filter](https://www.w3.org/TR/sparql11-query/#defn_algFilter).
    Filter { expr: Expression, inner: Box<Self> },
    /// [Union](https://www.w3.org/TR/sparql11-query/#defn_algUnion).
    Union { left: Box<Self>, right: Box<Self> },
    /// [Extend](https://www.w3.org/TR/sparql11-query/#defn_extend), also called bind.
    Extend {
        inner: Box<Self>,
        variable: Variable,
        expression: Expression,
    },
    /// [Distinct](https://www.w3.org/TR/sparql11-query/#defn_algDistinct).
    Distinct { inner: Box<Self> },
    /// [OrderBy](https://www.w3.org/TR/sparql11-query/#defn_algOrdered).
    OrderBy {
        inner: Box<Self>,
        expression: Vec<OrderExpression>,
    },
    /// [Slice](https://www.w3.org/TR/sparql11-query/#defn_algSlice): offset and limit.
    Slice {
        inner: Box<Self>,
        start: usize,
        length: Option<usize>,
    },
    /// [Project](https://www.w3.org/TR/sparql11-query/#defn_algProjection).
    Project {
        inner: Box<Self>,
        variables: Vec<Variable>,
    },
}

impl GraphPattern {
    #[inline]
    pub fn join(left: Self, right: Self) -> Self {
        Self::Join {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[inline]
    pub fn left_join(left: Self, right: Self, expression: Option<Expression>) -> Self {
        Self::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            expression,
        }
    }

    #[inline]
    pub fn union(left: Self, right: Self) -> Self {
        Self::Union {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[inline]
    pub fn filter(inner: Self, expr: Expression) -> Self {
        Self::Filter {
            expr,
            inner: Box::new(inner),
        }
    }

    #[inline]
    pub fn extend(inner: Self, variable: Variable, expression: Expression) -> Self {
        Self::Extend {
            inner: Box::new(inner),
            variable,
            expression,
        }
    }

    #[inline]
    pub fn distinct(inner: Self) -> Self {
        Self::Distinct {
            inner: Box::new(inner),
        }
    }

    #[inline]
    pub fn order_by(inner: Self, expression: Vec<OrderExpression>) -> Self {
        Self::OrderBy {
            inner: Box::new(inner),
            expression,
        }
    }

    #[inline]
    pub fn slice(inner: Self, start: usize, length: Option<usize>) -> Self {
        Self::Slice {
            inner: Box::new(inner),
            start,
            length,
        }
    }

    #[inline]
    pub fn project(inner: Self, variables: Vec<Variable>) -> Self {
        Self::Project {
            inner: Box::new(inner),
            variables,
        }
    }

    /// Formats using the [SPARQL S-Expression syntax](https://jena.apache.org/documentation/notes/sse.html).
    pub(crate) fn fmt_sse(&self, f: &mut impl fmt::Write) -> fmt::Result {
        match self {
            Self::Pattern(pattern) => pattern.fmt_sse(f),
            Self::Join { left, right } => {
                write!(f, "(join ")?;
                left.fmt_sse(f)?;
                write!(f, " ")?;
                right.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::LeftJoin {
                left,
                right,
                expression,
            } => {
                write!(f, "(leftjoin ")?;
                left.fmt_sse(f)?;
                write!(f, " ")?;
                right.fmt_sse(f)?;
                if let Some(expr) = expression {
                    write!(f, " ")?;
                    expr.fmt_sse(f)?;
                }
                write!(f, ")")
            }
            Self::Filter { expr, inner } => {
                write!(f, "(filter ")?;
                expr.fmt_sse(f)?;
                write!(f, " ")?;
                inner.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::Union { left, right } => {
                write!(f, "(union ")?;
                left.fmt_sse(f)?;
                write!(f, " ")?;
                right.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::Extend {
                inner,
                variable,
                expression,
            } => {
                write!(f, "(extend (({variable} ")?;
                expression.fmt_sse(f)?;
                write!(f, ")) ")?;
                inner.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::Distinct { inner } => {
                write!(f, "(distinct ")?;
                inner.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::OrderBy { inner, expression } => {
                write!(f, "(order (")?;
                for (i, c) in expression.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    c.fmt_sse(f)?;
                }
                write!(f, ") ")?;
                inner.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::Slice {
                inner,
                start,
                length,
            } => {
                if let Some(length) = length {
                    write!(f, "(slice {start} {length} ")?;
                } else {
                    write!(f, "(slice {start} _ ")?;
                }
                inner.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::Project { inner, variables } => {
                write!(f, "(project (")?;
                for (i, v) in variables.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ") ")?;
                inner.fmt_sse(f)?;
                write!(f, ")")
            }
        }
    }

    /// Calls `callback` on each [in-scope variable](https://www.w3.org/TR/sparql11-query/#variableScope) occurrence.
    ///
    /// Variables hidden by a [`GraphPattern::Project`] are not reported.
    pub fn on_in_scope_variable<'a>(&'a self, mut callback: impl FnMut(&'a Variable)) {
        self.lookup_in_scope_variables(&mut callback)
    }

    fn lookup_in_scope_variables<'a>(&'a self, callback: &mut impl FnMut(&'a Variable)) {
        match self {
            Self::Pattern(pattern) => pattern.on_variable(callback),
            Self::Join { left, right }
            | Self::LeftJoin { left, right, .. }
            | Self::Union { left, right } => {
                left.lookup_in_scope_variables(callback);
                right.lookup_in_scope_variables(callback);
            }
            Self::Extend {
                inner, variable, ..
            } => {
                inner.lookup_in_scope_variables(callback);
                callback(variable);
            }
            Self::Project { variables, .. } => {
                for v in variables {
                    callback(v);
                }
            }
            Self::Filter { inner, .. }
            | Self::OrderBy { inner, .. }
            | Self::Distinct { inner }
            | Self::Slice { inner, .. } => inner.lookup_in_scope_variables(callback),
        }
    }
}

impl fmt::Display for GraphPattern {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_sse(f)
    }
}

impl From<QuadPattern> for GraphPattern {
    #[inline]
    fn from(pattern: QuadPattern) -> Self {
        Self::Pattern(pattern)
    }
}

/// An ordering comparator used by [`GraphPattern::OrderBy`].
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum OrderExpression {
    /// Ascending order
    Asc(Expression),
    /// Descending order
    Desc(Expression),
}

impl OrderExpression {
    /// Formats using the [SPARQL S-Expression syntax](https://jena.apache.org/documentation/notes/sse.html).
    pub(crate) fn fmt_sse(&self, f: &mut impl fmt::Write) -> fmt::Result {
        match self {
            Self::Asc(e) => {
                write!(f, "(asc ")?;
                e.fmt_sse(f)?;
                write!(f, ")")
            }
            Self::Desc(e) => {
                write!(f, "(desc ")?;
                e.fmt_sse(f)?;
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for OrderExpression {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_sse(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    fn ex(name: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("http://example.com/{name}"))
    }

    #[test]
    fn sse_of_nested_tree() {
        let tree = GraphPattern::slice(
            GraphPattern::project(
                GraphPattern::left_join(
                    QuadPattern::new(var("s"), ex("p"), var("o")).into(),
                    QuadPattern::new(var("s"), ex("q"), var("x"))
                        .in_graph(var("g"))
                        .into(),
                    Some(Expression::Bound(var("x"))),
                ),
                vec![var("s"), var("x")],
            ),
            2,
            Some(3),
        );
        assert_eq!(
            tree.to_string(),
            "(slice 2 3 (project (?s ?x) (leftjoin (triple ?s <http://example.com/p> ?o) (quad ?g ?s <http://example.com/q> ?x) (bound ?x))))"
        );
    }

    #[test]
    fn sse_of_expressions() {
        let expr = Expression::And(
            Box::new(Expression::Greater(
                Box::new(var("o").into()),
                Box::new(Literal::from(1).into()),
            )),
            Box::new(Expression::call(
                Function::StrStarts,
                [Expression::call(Function::Str, [var("s").into()]), Literal::from("http").into()],
            )),
        );
        assert_eq!(
            expr.to_string(),
            "(&& (> ?o \"1\"^^<http://www.w3.org/2001/XMLSchema#integer>) (STRSTARTS (STR ?s) \"http\"))"
        );
    }

    #[test]
    fn in_scope_variables_stop_at_projection() {
        let tree = GraphPattern::join(
            GraphPattern::project(
                QuadPattern::new(var("a"), ex("p"), var("hidden")).into(),
                vec![var("a")],
            ),
            GraphPattern::extend(
                QuadPattern::new(var("a"), ex("p"), var("b")).into(),
                var("c"),
                var("b").into(),
            ),
        );
        let mut variables = Vec::new();
        tree.on_in_scope_variable(|v| variables.push(v.as_str()));
        assert_eq!(variables, ["a", "a", "b", "c"]);
    }
}
