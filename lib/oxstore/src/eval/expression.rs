//! Compilation of [`Expression`]s into closures over encoded tuples.
//!
//! An expression evaluates to `None` when it raises an error or reads an unbound variable.

use crate::cursor::Cursor;
use crate::error::EvaluationError;
use crate::eval::ordering::{equals, is_numeric_datatype, partial_cmp};
use crate::eval::{EncodedTuple, SimpleEvaluator, encode_variable};
use crate::storage::{InternedTerm, TypedValue};
use oxalgebra::{Expression, Function};
use oxsdatatypes::{Boolean, Decimal, Double, Float, Integer};
use oxterm::vocab::xsd;
use oxterm::{Literal, NamedNode, Term, Variable};
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::ops::RangeInclusive;
use std::rc::Rc;
use std::sync::Arc;

const REGEX_SIZE_LIMIT: usize = 1_000_000;

pub(super) type ExpressionEvaluator = Rc<dyn Fn(&EncodedTuple) -> Option<Arc<InternedTerm>>>;
pub(super) type BooleanEvaluator = Rc<dyn Fn(&EncodedTuple) -> Option<bool>>;

impl SimpleEvaluator {
    pub(super) fn effective_boolean_value_expression_evaluator(
        &self,
        expression: &Expression,
        encoded_variables: &mut Vec<Variable>,
    ) -> Result<BooleanEvaluator, EvaluationError> {
        let eval = self.expression_evaluator(expression, encoded_variables)?;
        let evaluator: BooleanEvaluator =
            Rc::new(move |tuple| effective_boolean_value(&*eval(tuple)?));
        Ok(evaluator)
    }

    pub(super) fn expression_evaluator(
        &self,
        expression: &Expression,
        encoded_variables: &mut Vec<Variable>,
    ) -> Result<ExpressionEvaluator, EvaluationError> {
        let evaluator: ExpressionEvaluator = match expression {
            Expression::NamedNode(node) => {
                let term = self.dataset.constant(node.clone().into());
                Rc::new(move |_| Some(Arc::clone(&term)))
            }
            Expression::Literal(literal) => {
                let term = self.dataset.constant(literal.clone().into());
                Rc::new(move |_| Some(Arc::clone(&term)))
            }
            Expression::Variable(variable) => {
                let position = encode_variable(encoded_variables, variable);
                Rc::new(move |tuple| tuple.get(position).cloned())
            }
            Expression::Or(a, b) => {
                let a = self.effective_boolean_value_expression_evaluator(a, encoded_variables)?;
                let b = self.effective_boolean_value_expression_evaluator(b, encoded_variables)?;
                Rc::new(move |tuple| match a(tuple) {
                    Some(true) => Some(bool_term(true)),
                    Some(false) => b(tuple).map(bool_term),
                    None => b(tuple)?.then(|| bool_term(true)),
                })
            }
            Expression::And(a, b) => {
                let a = self.effective_boolean_value_expression_evaluator(a, encoded_variables)?;
                let b = self.effective_boolean_value_expression_evaluator(b, encoded_variables)?;
                Rc::new(move |tuple| match a(tuple) {
                    Some(true) => b(tuple).map(bool_term),
                    Some(false) => Some(bool_term(false)),
                    None => (!b(tuple)?).then(|| bool_term(false)),
                })
            }
            Expression::Equal(a, b) => {
                let a = self.expression_evaluator(a, encoded_variables)?;
                let b = self.expression_evaluator(b, encoded_variables)?;
                Rc::new(move |tuple| equals(&*a(tuple)?, &*b(tuple)?).map(bool_term))
            }
            Expression::SameTerm(a, b) => {
                let a = self.expression_evaluator(a, encoded_variables)?;
                let b = self.expression_evaluator(b, encoded_variables)?;
                Rc::new(move |tuple| Some(bool_term(a(tuple)?.term() == b(tuple)?.term())))
            }
            Expression::Greater(a, b) => self.comparison_evaluator(a, b, encoded_variables, |o| {
                o == Ordering::Greater
            })?,
            Expression::GreaterOrEqual(a, b) => {
                self.comparison_evaluator(a, b, encoded_variables, |o| o != Ordering::Less)?
            }
            Expression::Less(a, b) => {
                self.comparison_evaluator(a, b, encoded_variables, |o| o == Ordering::Less)?
            }
            Expression::LessOrEqual(a, b) => {
                self.comparison_evaluator(a, b, encoded_variables, |o| o != Ordering::Greater)?
            }
            Expression::In(needle, list) => {
                let needle = self.expression_evaluator(needle, encoded_variables)?;
                let list = list
                    .iter()
                    .map(|e| self.expression_evaluator(e, encoded_variables))
                    .collect::<Result<Vec<_>, _>>()?;
                Rc::new(move |tuple| {
                    let needle = needle(tuple)?;
                    let mut error = false;
                    for candidate in &list {
                        match candidate(tuple).and_then(|c| equals(&needle, &c)) {
                            Some(true) => return Some(bool_term(true)),
                            Some(false) => (),
                            None => error = true,
                        }
                    }
                    (!error).then(|| bool_term(false))
                })
            }
            Expression::Add(a, b) => {
                self.arithmetic_evaluator(a, b, encoded_variables, NumericOperator::Add)?
            }
            Expression::Subtract(a, b) => {
                self.arithmetic_evaluator(a, b, encoded_variables, NumericOperator::Subtract)?
            }
            Expression::Multiply(a, b) => {
                self.arithmetic_evaluator(a, b, encoded_variables, NumericOperator::Multiply)?
            }
            Expression::Divide(a, b) => {
                self.arithmetic_evaluator(a, b, encoded_variables, NumericOperator::Divide)?
            }
            Expression::UnaryPlus(e) => {
                let e = self.expression_evaluator(e, encoded_variables)?;
                Rc::new(move |tuple| {
                    let value = e(tuple)?;
                    value.value()?.is_numeric().then_some(value)
                })
            }
            Expression::UnaryMinus(e) => {
                let e = self.expression_evaluator(e, encoded_variables)?;
                Rc::new(move |tuple| {
                    Some(value_term(match *e(tuple)?.value()? {
                        TypedValue::Integer(v) => TypedValue::Integer(v.checked_neg()?),
                        TypedValue::Decimal(v) => TypedValue::Decimal(v.checked_neg()?),
                        TypedValue::Float(v) => TypedValue::Float(-v),
                        TypedValue::Double(v) => TypedValue::Double(-v),
                        _ => return None,
                    }))
                })
            }
            Expression::Not(e) => {
                let e = self.effective_boolean_value_expression_evaluator(e, encoded_variables)?;
                Rc::new(move |tuple| e(tuple).map(|v| bool_term(!v)))
            }
            Expression::Exists(pattern) => {
                let eval = self.graph_pattern_evaluator(pattern, encoded_variables)?;
                Rc::new(move |tuple| {
                    let mut cursor = eval(tuple.clone());
                    let found = cursor.next();
                    cursor.close();
                    // a failed evaluation is an expression error
                    found.ok().map(|found| bool_term(found.is_some()))
                })
            }
            Expression::Bound(variable) => {
                let position = encode_variable(encoded_variables, variable);
                Rc::new(move |tuple| Some(bool_term(tuple.contains(position))))
            }
            Expression::If(condition, then, otherwise) => {
                let condition =
                    self.effective_boolean_value_expression_evaluator(condition, encoded_variables)?;
                let then = self.expression_evaluator(then, encoded_variables)?;
                let otherwise = self.expression_evaluator(otherwise, encoded_variables)?;
                Rc::new(move |tuple| {
                    if condition(tuple)? {
                        then(tuple)
                    } else {
                        otherwise(tuple)
                    }
                })
            }
            Expression::Coalesce(list) => {
                let list = list
                    .iter()
                    .map(|e| self.expression_evaluator(e, encoded_variables))
                    .collect::<Result<Vec<_>, _>>()?;
                Rc::new(move |tuple| list.iter().find_map(|e| e(tuple)))
            }
            Expression::FunctionCall(function, parameters) => {
                let arity = function_arity(*function);
                if !arity.contains(&parameters.len()) {
                    return Err(EvaluationError::InvalidPattern(format!(
                        "{function} takes between {} and {} arguments, {} given",
                        arity.start(),
                        arity.end(),
                        parameters.len()
                    )));
                }
                let args = parameters
                    .iter()
                    .map(|e| self.expression_evaluator(e, encoded_variables))
                    .collect::<Result<Vec<_>, _>>()?;
                if *function == Function::Regex {
                    if let Some(regex) =
                        compile_static_pattern_if_exists(&parameters[1], parameters.get(2))
                    {
                        let text = Rc::clone(&args[0]);
                        let evaluator: ExpressionEvaluator = Rc::new(move |tuple| {
                            let text = text(tuple)?;
                            let (text, _) = to_string_and_language(&text)?;
                            Some(bool_term(regex.is_match(text)))
                        });
                        return Ok(evaluator);
                    }
                }
                let function = *function;
                Rc::new(move |tuple| {
                    let args = args
                        .iter()
                        .map(|e| e(tuple))
                        .collect::<Option<Vec<_>>>()?;
                    call_function(function, &args)
                })
            }
        };
        Ok(evaluator)
    }

    fn comparison_evaluator(
        &self,
        a: &Expression,
        b: &Expression,
        encoded_variables: &mut Vec<Variable>,
        accept: fn(Ordering) -> bool,
    ) -> Result<ExpressionEvaluator, EvaluationError> {
        let a = self.expression_evaluator(a, encoded_variables)?;
        let b = self.expression_evaluator(b, encoded_variables)?;
        let evaluator: ExpressionEvaluator = Rc::new(move |tuple| {
            Some(bool_term(accept(partial_cmp(&*a(tuple)?, &*b(tuple)?)?)))
        });
        Ok(evaluator)
    }

    fn arithmetic_evaluator(
        &self,
        a: &Expression,
        b: &Expression,
        encoded_variables: &mut Vec<Variable>,
        operator: NumericOperator,
    ) -> Result<ExpressionEvaluator, EvaluationError> {
        let a = self.expression_evaluator(a, encoded_variables)?;
        let b = self.expression_evaluator(b, encoded_variables)?;
        let evaluator: ExpressionEvaluator = Rc::new(move |tuple| {
            let a = a(tuple)?;
            let b = b(tuple)?;
            let operands = NumericBinaryOperands::new(a.value()?, b.value()?)?;
            Some(value_term(operator.apply(operands)?))
        });
        Ok(evaluator)
    }
}

/// The [effective boolean value](https://www.w3.org/TR/sparql11-query/#ebv) of a term.
pub(super) fn effective_boolean_value(term: &InternedTerm) -> Option<bool> {
    match term.value() {
        Some(TypedValue::Boolean(v)) => Some((*v).into()),
        Some(TypedValue::Integer(v)) => Some(Boolean::from(*v).into()),
        Some(TypedValue::Decimal(v)) => Some(Boolean::from(*v).into()),
        Some(TypedValue::Float(v)) => Some(Boolean::from(*v).into()),
        Some(TypedValue::Double(v)) => Some(Boolean::from(*v).into()),
        Some(TypedValue::DateTime(_) | TypedValue::Date(_) | TypedValue::Time(_)) => None,
        None => {
            let literal = term.as_literal()?;
            match literal.datatype() {
                xsd::STRING => Some(!literal.value().is_empty()),
                // invalid lexical form
                datatype if datatype == xsd::BOOLEAN || is_numeric_datatype(datatype) => {
                    Some(false)
                }
                _ => None,
            }
        }
    }
}

/// Two numeric values promoted to their common type: integer, decimal, float then double.
pub(super) enum NumericBinaryOperands {
    Integer(Integer, Integer),
    Decimal(Decimal, Decimal),
    Float(Float, Float),
    Double(Double, Double),
}

impl NumericBinaryOperands {
    pub fn new(a: &TypedValue, b: &TypedValue) -> Option<Self> {
        Some(match (*a, *b) {
            (TypedValue::Integer(a), TypedValue::Integer(b)) => Self::Integer(a, b),
            (TypedValue::Integer(a), TypedValue::Decimal(b)) => Self::Decimal(a.into(), b),
            (TypedValue::Integer(a), TypedValue::Float(b)) => Self::Float(a.into(), b),
            (TypedValue::Integer(a), TypedValue::Double(b)) => Self::Double(a.into(), b),
            (TypedValue::Decimal(a), TypedValue::Integer(b)) => Self::Decimal(a, b.into()),
            (TypedValue::Decimal(a), TypedValue::Decimal(b)) => Self::Decimal(a, b),
            (TypedValue::Decimal(a), TypedValue::Float(b)) => Self::Float(a.into(), b),
            (TypedValue::Decimal(a), TypedValue::Double(b)) => Self::Double(a.into(), b),
            (TypedValue::Float(a), TypedValue::Integer(b)) => Self::Float(a, b.into()),
            (TypedValue::Float(a), TypedValue::Decimal(b)) => Self::Float(a, b.into()),
            (TypedValue::Float(a), TypedValue::Float(b)) => Self::Float(a, b),
            (TypedValue::Float(a), TypedValue::Double(b)) => Self::Double(a.into(), b),
            (TypedValue::Double(a), TypedValue::Integer(b)) => Self::Double(a, b.into()),
            (TypedValue::Double(a), TypedValue::Decimal(b)) => Self::Double(a, b.into()),
            (TypedValue::Double(a), TypedValue::Float(b)) => Self::Double(a, b.into()),
            (TypedValue::Double(a), TypedValue::Double(b)) => Self::Double(a, b),
            _ => return None,
        })
    }
}

#[derive(Clone, Copy)]
enum NumericOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl NumericOperator {
    /// `None` on overflow and on integer or decimal division by zero.
    fn apply(self, operands: NumericBinaryOperands) -> Option<TypedValue> {
        Some(match operands {
            NumericBinaryOperands::Integer(a, b) => match self {
                Self::Add => TypedValue::Integer(a.checked_add(b)?),
                Self::Subtract => TypedValue::Integer(a.checked_sub(b)?),
                Self::Multiply => TypedValue::Integer(a.checked_mul(b)?),
                Self::Divide => TypedValue::Decimal(Decimal::from(a).checked_div(b)?),
            },
            NumericBinaryOperands::Decimal(a, b) => TypedValue::Decimal(match self {
                Self::Add => a.checked_add(b)?,
                Self::Subtract => a.checked_sub(b)?,
                Self::Multiply => a.checked_mul(b)?,
                Self::Divide => a.checked_div(b)?,
            }),
            NumericBinaryOperands::Float(a, b) => TypedValue::Float(match self {
                Self::Add => a + b,
                Self::Subtract => a - b,
                Self::Multiply => a * b,
                Self::Divide => a / b,
            }),
            NumericBinaryOperands::Double(a, b) => TypedValue::Double(match self {
                Self::Add => a + b,
                Self::Subtract => a - b,
                Self::Multiply => a * b,
                Self::Divide => a / b,
            }),
        })
    }
}

fn function_arity(function: Function) -> RangeInclusive<usize> {
    match function {
        Function::Str
        | Function::Lang
        | Function::Datatype
        | Function::IsIri
        | Function::IsBlank
        | Function::IsLiteral
        | Function::IsNumeric
        | Function::StrLen
        | Function::UCase
        | Function::LCase
        | Function::Abs
        | Function::LocalName
        | Function::Namespace => 1..=1,
        Function::LangMatches
        | Function::Contains
        | Function::StrStarts
        | Function::StrEnds
        | Function::StrBefore
        | Function::StrAfter => 2..=2,
        Function::Regex => 2..=3,
        Function::Concat => 0..=usize::MAX,
    }
}

/// Evaluates a built-in function on already evaluated arguments. The arity has been checked at compile time.
fn call_function(function: Function, args: &[Arc<InternedTerm>]) -> Option<Arc<InternedTerm>> {
    match function {
        Function::Str => Some(simple_literal(match args[0].term() {
            Term::NamedNode(node) => node.as_str(),
            Term::Literal(literal) => literal.value(),
            Term::BlankNode(_) => return None,
        })),
        Function::Lang => Some(simple_literal(
            args[0].as_literal()?.language().unwrap_or_default(),
        )),
        Function::LangMatches => {
            let tag = simple_string(&args[0])?;
            let range = simple_string(&args[1])?;
            Some(bool_term(lang_matches(tag, range)))
        }
        Function::Datatype => Some(Arc::new(InternedTerm::new(NamedNode::new_unchecked(
            args[0].as_literal()?.datatype(),
        )))),
        Function::IsIri => Some(bool_term(args[0].term().is_named_node())),
        Function::IsBlank => Some(bool_term(args[0].term().is_blank_node())),
        Function::IsLiteral => Some(bool_term(args[0].term().is_literal())),
        Function::IsNumeric => Some(bool_term(
            args[0].value().is_some_and(TypedValue::is_numeric),
        )),
        Function::Regex => {
            let (text, _) = to_string_and_language(&args[0])?;
            let flags = match args.get(2) {
                Some(flags) => Some(simple_string(flags)?),
                None => None,
            };
            let regex = compile_pattern(simple_string(&args[1])?, flags)?;
            Some(bool_term(regex.is_match(text)))
        }
        Function::StrLen => {
            let (value, _) = to_string_and_language(&args[0])?;
            let length = i64::try_from(value.chars().count()).ok()?;
            Some(value_term(TypedValue::Integer(length.into())))
        }
        Function::UCase => {
            let (value, language) = to_string_and_language(&args[0])?;
            Some(build_plain_literal(value.to_uppercase(), language))
        }
        Function::LCase => {
            let (value, language) = to_string_and_language(&args[0])?;
            Some(build_plain_literal(value.to_lowercase(), language))
        }
        Function::Contains => {
            let (a, b, _) = to_argument_compatible_strings(&args[0], &args[1])?;
            Some(bool_term(a.contains(b)))
        }
        Function::StrStarts => {
            let (a, b, _) = to_argument_compatible_strings(&args[0], &args[1])?;
            Some(bool_term(a.starts_with(b)))
        }
        Function::StrEnds => {
            let (a, b, _) = to_argument_compatible_strings(&args[0], &args[1])?;
            Some(bool_term(a.ends_with(b)))
        }
        Function::StrBefore => {
            let (a, b, language) = to_argument_compatible_strings(&args[0], &args[1])?;
            Some(if let Some(position) = a.find(b) {
                build_plain_literal(a[..position].to_owned(), language)
            } else {
                simple_literal("")
            })
        }
        Function::StrAfter => {
            let (a, b, language) = to_argument_compatible_strings(&args[0], &args[1])?;
            Some(if let Some(position) = a.find(b) {
                build_plain_literal(a[position + b.len()..].to_owned(), language)
            } else {
                simple_literal("")
            })
        }
        Function::Concat => {
            let mut result = String::new();
            let mut language = None;
            for arg in args {
                let (value, arg_language) = to_string_and_language(arg)?;
                match language {
                    None => language = Some(arg_language),
                    Some(current) if current != arg_language => language = Some(None),
                    Some(_) => (),
                }
                result.push_str(value);
            }
            Some(build_plain_literal(result, language.flatten()))
        }
        Function::Abs => Some(value_term(match *args[0].value()? {
            TypedValue::Integer(v) => TypedValue::Integer(v.checked_abs()?),
            TypedValue::Decimal(v) => TypedValue::Decimal(v.checked_abs()?),
            TypedValue::Float(v) => TypedValue::Float(v.abs()),
            TypedValue::Double(v) => TypedValue::Double(v.abs()),
            _ => return None,
        })),
        Function::LocalName => match args[0].term() {
            Term::NamedNode(node) => Some(simple_literal(node.local_name())),
            _ => None,
        },
        Function::Namespace => match args[0].term() {
            Term::NamedNode(node) => Some(simple_literal(node.namespace())),
            _ => None,
        },
    }
}

fn lang_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    let tag = tag.to_ascii_lowercase();
    let range = range.to_ascii_lowercase();
    tag == range
        || tag
            .strip_prefix(range.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
}

fn bool_term(value: bool) -> Arc<InternedTerm> {
    value_term(value.into())
}

fn value_term(value: TypedValue) -> Arc<InternedTerm> {
    Arc::new(InternedTerm::from_value(value))
}

fn simple_literal(value: &str) -> Arc<InternedTerm> {
    Arc::new(InternedTerm::new(Literal::new_simple_literal(value)))
}

fn build_plain_literal(value: String, language: Option<&str>) -> Arc<InternedTerm> {
    Arc::new(InternedTerm::new(if let Some(language) = language {
        Literal::new_language_tagged_literal_unchecked(value, language)
    } else {
        Literal::new_simple_literal(value)
    }))
}

/// The lexical form of a simple literal.
fn simple_string(term: &InternedTerm) -> Option<&str> {
    let literal = term.as_literal()?;
    (literal.datatype() == xsd::STRING).then(|| literal.value())
}

/// The lexical form and the language of a simple or language-tagged literal.
fn to_string_and_language(term: &InternedTerm) -> Option<(&str, Option<&str>)> {
    let literal = term.as_literal()?;
    if literal.datatype() == xsd::STRING {
        Some((literal.value(), None))
    } else {
        literal
            .language()
            .map(|language| (literal.value(), Some(language)))
    }
}

fn to_argument_compatible_strings<'a>(
    arg1: &'a InternedTerm,
    arg2: &'a InternedTerm,
) -> Option<(&'a str, &'a str, Option<&'a str>)> {
    let (value1, language1) = to_string_and_language(arg1)?;
    let (value2, language2) = to_string_and_language(arg2)?;
    (language2.is_none() || language1 == language2).then_some((value1, value2, language1))
}

fn compile_static_pattern_if_exists(
    pattern: &Expression,
    flags: Option<&Expression>,
) -> Option<Regex> {
    let Expression::Literal(pattern) = pattern else {
        return None;
    };
    if pattern.datatype() != xsd::STRING {
        return None;
    }
    let flags = match flags {
        Some(Expression::Literal(flags)) if flags.datatype() == xsd::STRING => Some(flags.value()),
        Some(_) => return None,
        None => None,
    };
    compile_pattern(pattern.value(), flags)
}

fn compile_pattern(pattern: &str, flags: Option<&str>) -> Option<Regex> {
    let mut pattern = Cow::Borrowed(pattern);
    let flags = flags.unwrap_or_default();
    if flags.contains('q') {
        pattern = regex::escape(&pattern).into();
    }
    let mut regex_builder = RegexBuilder::new(&pattern);
    regex_builder.size_limit(REGEX_SIZE_LIMIT);
    for flag in flags.chars() {
        match flag {
            's' => {
                regex_builder.dot_matches_new_line(true);
            }
            'm' => {
                regex_builder.multi_line(true);
            }
            'i' => {
                regex_builder.case_insensitive(true);
            }
            'x' => {
                regex_builder.ignore_whitespace(true);
            }
            'q' => (),
            _ => return None,
        }
    }
    regex_builder.build().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(term: impl Into<Term>) -> Arc<InternedTerm> {
        Arc::new(InternedTerm::new(term))
    }

    fn call(function: Function, args: &[Arc<InternedTerm>]) -> Option<Term> {
        call_function(function, args).map(|t| t.term().clone())
    }

    #[test]
    fn ebv() {
        assert_eq!(effective_boolean_value(&term(Literal::from(0))), Some(false));
        assert_eq!(effective_boolean_value(&term(Literal::from(2.5))), Some(true));
        assert_eq!(effective_boolean_value(&term(Literal::from(""))), Some(false));
        assert_eq!(effective_boolean_value(&term(Literal::from("a"))), Some(true));
        assert_eq!(
            effective_boolean_value(&term(Literal::new_typed_literal(
                "foo",
                NamedNode::new_unchecked(xsd::INTEGER)
            ))),
            Some(false)
        );
        assert_eq!(
            effective_boolean_value(&term(NamedNode::new_unchecked("http://example.com/"))),
            None
        );
    }

    #[test]
    fn arithmetic_promotion() {
        let integer = TypedValue::Integer(Integer::from(3));
        let decimal = TypedValue::Decimal(Decimal::from(2));
        let double = TypedValue::Double(Double::from(0.5));
        let Some(NumericBinaryOperands::Decimal(..)) = NumericBinaryOperands::new(&integer, &decimal)
        else {
            panic!("integer and decimal are promoted to decimal")
        };
        assert_eq!(
            NumericOperator::Add.apply(NumericBinaryOperands::new(&integer, &double).unwrap()),
            Some(TypedValue::Double(Double::from(3.5)))
        );
        assert_eq!(
            NumericOperator::Divide.apply(NumericBinaryOperands::new(&integer, &integer).unwrap()),
            Some(TypedValue::Decimal(Decimal::from(1)))
        );
        let zero = TypedValue::Integer(Integer::from(0));
        assert_eq!(
            NumericOperator::Divide.apply(NumericBinaryOperands::new(&integer, &zero).unwrap()),
            None
        );
        let max = TypedValue::Integer(Integer::from(i64::MAX));
        assert_eq!(
            NumericOperator::Add.apply(NumericBinaryOperands::new(&max, &integer).unwrap()),
            None
        );
        assert!(NumericBinaryOperands::new(&integer, &TypedValue::from(true)).is_none());
    }

    #[test]
    fn string_functions() {
        let en = term(Literal::new_language_tagged_literal_unchecked("foobar", "en"));
        assert_eq!(
            call(Function::UCase, &[Arc::clone(&en)]),
            Some(Literal::new_language_tagged_literal_unchecked("FOOBAR", "en").into())
        );
        assert_eq!(
            call(Function::StrBefore, &[Arc::clone(&en), term(Literal::from("bar"))]),
            Some(Literal::new_language_tagged_literal_unchecked("foo", "en").into())
        );
        assert_eq!(
            call(Function::StrAfter, &[Arc::clone(&en), term(Literal::from("x"))]),
            Some(Literal::from("").into())
        );
        assert_eq!(
            call(
                Function::Contains,
                &[
                    Arc::clone(&en),
                    term(Literal::new_language_tagged_literal_unchecked("o", "fr"))
                ]
            ),
            None
        );
        assert_eq!(
            call(Function::Concat, &[Arc::clone(&en), term(Literal::from("!"))]),
            Some(Literal::from("foobar!").into())
        );
        assert_eq!(
            call(Function::StrLen, &[term(Literal::from("été"))]),
            Some(Literal::from(3).into())
        );
        assert_eq!(
            call(Function::Lang, &[en]),
            Some(Literal::from("en").into())
        );
    }

    #[test]
    fn regex() {
        assert_eq!(
            call(
                Function::Regex,
                &[
                    term(Literal::from("Alice")),
                    term(Literal::from("^ali")),
                    term(Literal::from("i"))
                ]
            ),
            Some(Literal::from(true).into())
        );
        assert_eq!(
            call(
                Function::Regex,
                &[
                    term(Literal::from("Alice")),
                    term(Literal::from("^ali")),
                    term(Literal::from("z"))
                ]
            ),
            None
        );
        assert_eq!(
            call(
                Function::Regex,
                &[term(Literal::from("a.c")), term(Literal::from(".")), term(Literal::from("q"))]
            ),
            Some(Literal::from(true).into())
        );
    }

    #[test]
    fn lang_ranges() {
        assert!(lang_matches("en-US", "en"));
        assert!(lang_matches("EN", "en"));
        assert!(!lang_matches("eng", "en"));
        assert!(lang_matches("fr", "*"));
        assert!(!lang_matches("", "*"));
    }

    #[test]
    fn iri_parts() {
        let iri = term(NamedNode::new_unchecked("http://example.com/ns#name"));
        assert_eq!(
            call(Function::LocalName, &[Arc::clone(&iri)]),
            Some(Literal::from("name").into())
        );
        assert_eq!(
            call(Function::Namespace, &[iri]),
            Some(Literal::from("http://example.com/ns#").into())
        );
        assert_eq!(call(Function::LocalName, &[term(Literal::from("a"))]), None);
    }
}
