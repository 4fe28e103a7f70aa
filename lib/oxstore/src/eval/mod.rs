//! Evaluation of [`GraphPattern`]s against a store snapshot.
//!
//! Each algebra node is compiled once into a closure mapping an incoming tuple to a cursor of tuples
//! extending it, so the right side of a join is evaluated with the bindings of each left row.

use crate::binding::BindingSet;
use crate::cursor::{Cursor, CursorIter, EmptyCursor};
use crate::error::EvaluationError;
use crate::eval::expression::ExpressionEvaluator;
use crate::eval::ordering::cmp_terms;
use crate::storage::{EncodedPattern, InternedTerm, Scan, SnapshotPin, StorageCore, TermId};
use oxalgebra::{
    GraphNamePattern, GraphPattern, NamedNodePattern, OrderExpression, QuadPattern, TermPattern,
};
use oxterm::{Term, Variable};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{fmt, vec};
use tracing::trace;

mod expression;
mod ordering;

/// A row of the evaluation: the values of the encoded variables by position.
#[derive(Clone, Default)]
struct EncodedTuple {
    inner: Vec<Option<Arc<InternedTerm>>>,
}

impl EncodedTuple {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    fn contains(&self, index: usize) -> bool {
        self.inner.get(index).is_some_and(Option::is_some)
    }

    fn get(&self, index: usize) -> Option<&Arc<InternedTerm>> {
        self.inner.get(index).and_then(Option::as_ref)
    }

    fn set(&mut self, index: usize, value: Arc<InternedTerm>) {
        if self.inner.len() <= index {
            self.inner.resize(index + 1, None);
        }
        self.inner[index] = Some(value);
    }

    /// The values up to the last bound one.
    fn bound_prefix(&self) -> &[Option<Arc<InternedTerm>>] {
        let end = self
            .inner
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |i| i + 1);
        &self.inner[..end]
    }
}

impl PartialEq for EncodedTuple {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.bound_prefix() == other.bound_prefix()
    }
}

impl Eq for EncodedTuple {}

impl Hash for EncodedTuple {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bound_prefix().hash(state)
    }
}

type TupleCursor = Box<dyn Cursor<Item = EncodedTuple, Error = EvaluationError>>;
type TupleEvaluator = Rc<dyn Fn(EncodedTuple) -> TupleCursor>;

/// The statements seen by an evaluation.
#[derive(Clone)]
struct EvalDataset {
    core: Arc<StorageCore>,
    snapshot: u64,
    include_inferred: bool,
}

impl EvalDataset {
    /// The dictionary version of a term if it is known, a detached term otherwise.
    fn constant(&self, term: Term) -> Arc<InternedTerm> {
        self.core
            .dictionary
            .get(&term)
            .unwrap_or_else(|| Arc::new(InternedTerm::new(term)))
    }

    fn encoded_id(&self, term: &InternedTerm) -> Option<TermId> {
        term.id()
            .or_else(|| self.core.dictionary.lookup(term.term()))
    }

    fn scan(&self, pattern: EncodedPattern) -> Scan {
        self.core
            .index
            .scan(pattern, self.snapshot, self.include_inferred)
    }

    fn resolve(&self, id: TermId) -> Result<Arc<InternedTerm>, EvaluationError> {
        Ok(self.core.dictionary.resolve(id)?)
    }
}

struct SimpleEvaluator {
    dataset: EvalDataset,
    deadline: Option<Instant>,
}

impl SimpleEvaluator {
    fn graph_pattern_evaluator(
        &self,
        pattern: &GraphPattern,
        encoded_variables: &mut Vec<Variable>,
    ) -> Result<TupleEvaluator, EvaluationError> {
        let evaluator: TupleEvaluator = match pattern {
            GraphPattern::Pattern(pattern) => self.quad_pattern_evaluator(pattern, encoded_variables),
            GraphPattern::Join { left, right } => {
                let left = self.graph_pattern_evaluator(left, encoded_variables)?;
                let right = self.graph_pattern_evaluator(right, encoded_variables)?;
                Rc::new(move |from| {
                    Box::new(JoinCursor {
                        left: left(from),
                        right_evaluator: Rc::clone(&right),
                        current_right: None,
                    })
                })
            }
            GraphPattern::LeftJoin {
                left,
                right,
                expression,
            } => {
                let left = self.graph_pattern_evaluator(left, encoded_variables)?;
                let mut right = self.graph_pattern_evaluator(right, encoded_variables)?;
                if let Some(expression) = expression {
                    let condition = self.effective_boolean_value_expression_evaluator(
                        expression,
                        encoded_variables,
                    )?;
                    let unfiltered = right;
                    right = Rc::new(move |from| {
                        let condition = Rc::clone(&condition);
                        Box::new(
                            unfiltered(from).filter(move |tuple| condition(tuple).unwrap_or(false)),
                        )
                    });
                }
                Rc::new(move |from| {
                    Box::new(LeftJoinCursor {
                        left: left(from),
                        right_evaluator: Rc::clone(&right),
                        current_right: None,
                        left_tuple_to_yield: None,
                    })
                })
            }
            GraphPattern::Filter { expr, inner } => {
                let child = self.graph_pattern_evaluator(inner, encoded_variables)?;
                let condition =
                    self.effective_boolean_value_expression_evaluator(expr, encoded_variables)?;
                Rc::new(move |from| {
                    let condition = Rc::clone(&condition);
                    Box::new(child(from).filter(move |tuple| condition(tuple).unwrap_or(false)))
                })
            }
            GraphPattern::Union { left, right } => {
                let plans: Rc<[TupleEvaluator]> = Rc::new([
                    self.graph_pattern_evaluator(left, encoded_variables)?,
                    self.graph_pattern_evaluator(right, encoded_variables)?,
                ]);
                Rc::new(move |from| {
                    Box::new(UnionCursor {
                        plans: Rc::clone(&plans),
                        input: from,
                        current: None,
                        next_plan: 0,
                    })
                })
            }
            GraphPattern::Extend {
                inner,
                variable,
                expression,
            } => {
                let mut rebound = false;
                inner.on_in_scope_variable(|v| rebound |= v == variable);
                if rebound {
                    return Err(EvaluationError::InvalidPattern(format!(
                        "{variable} is bound by the pattern it extends"
                    )));
                }
                let child = self.graph_pattern_evaluator(inner, encoded_variables)?;
                let position = encode_variable(encoded_variables, variable);
                let expression = self.expression_evaluator(expression, encoded_variables)?;
                Rc::new(move |from| {
                    let expression = Rc::clone(&expression);
                    Box::new(child(from).filter_map(move |mut tuple| {
                        let Some(value) = expression(&tuple) else {
                            return Some(tuple);
                        };
                        if let Some(existing) = tuple.get(position) {
                            // bound by the enclosing pattern
                            return (*existing == value).then_some(tuple);
                        }
                        tuple.set(position, value);
                        Some(tuple)
                    }))
                })
            }
            GraphPattern::Distinct { inner } => {
                let child = self.graph_pattern_evaluator(inner, encoded_variables)?;
                Rc::new(move |from| {
                    let mut seen = FxHashSet::default();
                    Box::new(child(from).filter(move |tuple| seen.insert(tuple.clone())))
                })
            }
            GraphPattern::OrderBy { inner, expression } => {
                let child = self.graph_pattern_evaluator(inner, encoded_variables)?;
                let comparators = expression
                    .iter()
                    .map(|comparator| {
                        Ok(match comparator {
                            OrderExpression::Asc(e) => {
                                Comparator::Asc(self.expression_evaluator(e, encoded_variables)?)
                            }
                            OrderExpression::Desc(e) => {
                                Comparator::Desc(self.expression_evaluator(e, encoded_variables)?)
                            }
                        })
                    })
                    .collect::<Result<Rc<[_]>, EvaluationError>>()?;
                let deadline = self.deadline;
                Rc::new(move |from| {
                    Box::new(OrderCursor {
                        state: OrderState::Pending(child(from)),
                        comparators: Rc::clone(&comparators),
                        deadline,
                    })
                })
            }
            GraphPattern::Slice {
                inner,
                start,
                length,
            } => {
                let child = self.graph_pattern_evaluator(inner, encoded_variables)?;
                let (start, length) = (*start, *length);
                Rc::new(move |from| Box::new(child(from).slice(start, length)))
            }
            GraphPattern::Project { inner, variables } => {
                let mut inner_encoded_variables = variables.clone();
                let child = self.graph_pattern_evaluator(inner, &mut inner_encoded_variables)?;
                let mapping = variables
                    .iter()
                    .enumerate()
                    .map(|(inner_key, variable)| {
                        (inner_key, encode_variable(encoded_variables, variable))
                    })
                    .collect::<Rc<[(usize, usize)]>>();
                Rc::new(move |from| {
                    let mapping = Rc::clone(&mapping);
                    let mut input = EncodedTuple::with_capacity(mapping.len());
                    for (inner_key, outer_key) in &*mapping {
                        if let Some(value) = from.get(*outer_key) {
                            input.set(*inner_key, Arc::clone(value));
                        }
                    }
                    Box::new(child(input).filter_map(move |tuple| {
                        let mut output = from.clone();
                        for (inner_key, outer_key) in &*mapping {
                            if let Some(value) = tuple.get(*inner_key) {
                                if let Some(existing) = output.get(*outer_key) {
                                    if existing != value {
                                        return None;
                                    }
                                } else {
                                    output.set(*outer_key, Arc::clone(value));
                                }
                            }
                        }
                        Some(output)
                    }))
                })
            }
        };
        Ok(evaluator)
    }

    fn quad_pattern_evaluator(
        &self,
        pattern: &QuadPattern,
        encoded_variables: &mut Vec<Variable>,
    ) -> TupleEvaluator {
        if matches!(pattern.subject, TermPattern::Literal(_)) {
            return Rc::new(|_| Box::new(EmptyCursor::default()));
        }
        let subject = self.term_selector(&pattern.subject, encoded_variables);
        let predicate = match &pattern.predicate {
            NamedNodePattern::NamedNode(node) => {
                TupleSelector::Constant(self.dataset.constant(node.clone().into()))
            }
            NamedNodePattern::Variable(variable) => {
                TupleSelector::Variable(encode_variable(encoded_variables, variable))
            }
        };
        let object = self.term_selector(&pattern.object, encoded_variables);
        let graph_name = match &pattern.graph_name {
            GraphNamePattern::Any => GraphSelector::Any,
            GraphNamePattern::DefaultGraph => GraphSelector::DefaultGraph,
            GraphNamePattern::NamedNode(node) => GraphSelector::Named(TupleSelector::Constant(
                self.dataset.constant(node.clone().into()),
            )),
            GraphNamePattern::BlankNode(node) => GraphSelector::Named(TupleSelector::Constant(
                self.dataset.constant(node.clone().into()),
            )),
            GraphNamePattern::Variable(variable) => GraphSelector::Named(TupleSelector::Variable(
                encode_variable(encoded_variables, variable),
            )),
        };
        let dataset = self.dataset.clone();
        Rc::new(move |from| {
            let mut bound = [None; 4];
            let mut outputs = [None; 4];
            for (i, selector) in [&subject, &predicate, &object].into_iter().enumerate() {
                match selector.position(&dataset, &from) {
                    Position::Free(slot) => outputs[i] = Some(slot),
                    Position::Bound(id) => bound[i] = Some(id),
                    Position::Unmatchable => return Box::new(EmptyCursor::default()),
                }
            }
            let mut named_graphs_only = false;
            match &graph_name {
                GraphSelector::Any => (),
                GraphSelector::DefaultGraph => bound[3] = Some(TermId::DEFAULT_GRAPH),
                GraphSelector::Named(selector) => match selector.position(&dataset, &from) {
                    Position::Free(slot) => {
                        outputs[3] = Some(slot);
                        named_graphs_only = true;
                    }
                    Position::Bound(id) => bound[3] = Some(id),
                    Position::Unmatchable => return Box::new(EmptyCursor::default()),
                },
            }
            let [s, p, o, g] = bound;
            let scan_pattern = EncodedPattern {
                subject: s,
                predicate: p,
                object: o,
                graph_name: g,
            };
            Box::new(PatternCursor {
                scan: Some(dataset.scan(scan_pattern)),
                dataset: dataset.clone(),
                from,
                outputs,
                named_graphs_only,
            })
        })
    }

    fn term_selector(
        &self,
        pattern: &TermPattern,
        encoded_variables: &mut Vec<Variable>,
    ) -> TupleSelector {
        match pattern {
            TermPattern::NamedNode(node) => {
                TupleSelector::Constant(self.dataset.constant(node.clone().into()))
            }
            TermPattern::BlankNode(node) => {
                TupleSelector::Constant(self.dataset.constant(node.clone().into()))
            }
            TermPattern::Literal(literal) => {
                TupleSelector::Constant(self.dataset.constant(literal.clone().into()))
            }
            TermPattern::Variable(variable) => {
                TupleSelector::Variable(encode_variable(encoded_variables, variable))
            }
        }
    }
}

fn encode_variable(variables: &mut Vec<Variable>, variable: &Variable) -> usize {
    if let Some(key) = variables.iter().position(|v| v == variable) {
        key
    } else {
        variables.push(variable.clone());
        variables.len() - 1
    }
}

enum TupleSelector {
    Constant(Arc<InternedTerm>),
    Variable(usize),
}

impl TupleSelector {
    fn position(&self, dataset: &EvalDataset, from: &EncodedTuple) -> Position {
        let term = match self {
            Self::Constant(term) => term,
            Self::Variable(slot) => match from.get(*slot) {
                Some(term) => term,
                None => return Position::Free(*slot),
            },
        };
        // a term missing from the dictionary is in no statement
        dataset
            .encoded_id(term)
            .map_or(Position::Unmatchable, Position::Bound)
    }
}

enum GraphSelector {
    Any,
    DefaultGraph,
    Named(TupleSelector),
}

/// A quad position resolved against an incoming tuple.
enum Position {
    /// An unbound variable, to be set from the matched statements.
    Free(usize),
    Bound(TermId),
    Unmatchable,
}

struct PatternCursor {
    scan: Option<Scan>,
    dataset: EvalDataset,
    from: EncodedTuple,
    /// The tuple slot to set from the subject, predicate, object and graph name.
    outputs: [Option<usize>; 4],
    named_graphs_only: bool,
}

impl PatternCursor {
    fn bind(&self, ids: [TermId; 4]) -> Result<Option<EncodedTuple>, EvaluationError> {
        let mut tuple = self.from.clone();
        for (slot, id) in self.outputs.into_iter().zip(ids) {
            let Some(slot) = slot else {
                continue;
            };
            if let Some(existing) = tuple.get(slot) {
                // the same variable twice in the pattern
                if existing.id() != Some(id) {
                    return Ok(None);
                }
            } else {
                tuple.set(slot, self.dataset.resolve(id)?);
            }
        }
        Ok(Some(tuple))
    }
}

impl Cursor for PatternCursor {
    type Item = EncodedTuple;
    type Error = EvaluationError;

    fn next(&mut self) -> Result<Option<EncodedTuple>, EvaluationError> {
        while let Some(entry) = self.scan.as_mut().and_then(Iterator::next) {
            let quad = &entry.quad;
            if self.named_graphs_only && quad.graph_name.is_default_graph() {
                continue;
            }
            match self.bind([quad.subject, quad.predicate, quad.object, quad.graph_name]) {
                Ok(Some(tuple)) => return Ok(Some(tuple)),
                Ok(None) => (),
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
        self.close();
        Ok(None)
    }

    fn close(&mut self) {
        self.scan = None;
    }
}

struct JoinCursor {
    left: TupleCursor,
    right_evaluator: TupleEvaluator,
    current_right: Option<TupleCursor>,
}

impl Cursor for JoinCursor {
    type Item = EncodedTuple;
    type Error = EvaluationError;

    fn next(&mut self) -> Result<Option<EncodedTuple>, EvaluationError> {
        loop {
            if let Some(right) = &mut self.current_right {
                match right.next() {
                    Ok(Some(tuple)) => return Ok(Some(tuple)),
                    Ok(None) => self.current_right = None,
                    Err(e) => {
                        self.close();
                        return Err(e);
                    }
                }
            }
            match self.left.next() {
                Ok(Some(left)) => self.current_right = Some((self.right_evaluator)(left)),
                Ok(None) => return Ok(None),
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut right) = self.current_right.take() {
            right.close();
        }
        self.left.close();
    }
}

struct LeftJoinCursor {
    left: TupleCursor,
    right_evaluator: TupleEvaluator,
    current_right: Option<TupleCursor>,
    /// The current left row while no right row extended it.
    left_tuple_to_yield: Option<EncodedTuple>,
}

impl Cursor for LeftJoinCursor {
    type Item = EncodedTuple;
    type Error = EvaluationError;

    fn next(&mut self) -> Result<Option<EncodedTuple>, EvaluationError> {
        loop {
            if let Some(right) = &mut self.current_right {
                match right.next() {
                    Ok(Some(tuple)) => {
                        self.left_tuple_to_yield = None;
                        return Ok(Some(tuple));
                    }
                    Ok(None) => self.current_right = None,
                    Err(e) => {
                        self.close();
                        return Err(e);
                    }
                }
            }
            if let Some(left) = self.left_tuple_to_yield.take() {
                return Ok(Some(left));
            }
            match self.left.next() {
                Ok(Some(left)) => {
                    self.current_right = Some((self.right_evaluator)(left.clone()));
                    self.left_tuple_to_yield = Some(left);
                }
                Ok(None) => return Ok(None),
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut right) = self.current_right.take() {
            right.close();
        }
        self.left_tuple_to_yield = None;
        self.left.close();
    }
}

struct UnionCursor {
    plans: Rc<[TupleEvaluator]>,
    input: EncodedTuple,
    current: Option<TupleCursor>,
    next_plan: usize,
}

impl Cursor for UnionCursor {
    type Item = EncodedTuple;
    type Error = EvaluationError;

    fn next(&mut self) -> Result<Option<EncodedTuple>, EvaluationError> {
        loop {
            if let Some(current) = &mut self.current {
                match current.next() {
                    Ok(Some(tuple)) => return Ok(Some(tuple)),
                    Ok(None) => self.current = None,
                    Err(e) => {
                        self.close();
                        return Err(e);
                    }
                }
            }
            let Some(plan) = self.plans.get(self.next_plan) else {
                return Ok(None);
            };
            self.current = Some(plan(self.input.clone()));
            self.next_plan += 1;
        }
    }

    fn close(&mut self) {
        if let Some(mut current) = self.current.take() {
            current.close();
        }
        self.next_plan = self.plans.len();
    }
}

enum Comparator {
    Asc(ExpressionEvaluator),
    Desc(ExpressionEvaluator),
}

impl Comparator {
    fn key(&self, tuple: &EncodedTuple) -> Option<Arc<InternedTerm>> {
        match self {
            Self::Asc(e) | Self::Desc(e) => e(tuple),
        }
    }

    fn cmp(&self, a: Option<&InternedTerm>, b: Option<&InternedTerm>) -> Ordering {
        match self {
            Self::Asc(_) => cmp_terms(a, b),
            Self::Desc(_) => cmp_terms(b, a),
        }
    }
}

enum OrderState {
    /// Not materialized yet.
    Pending(TupleCursor),
    Sorted(vec::IntoIter<EncodedTuple>),
    Closed,
}

/// Materializes its child on the first call to `next` and streams the sorted rows.
struct OrderCursor {
    state: OrderState,
    comparators: Rc<[Comparator]>,
    deadline: Option<Instant>,
}

impl Cursor for OrderCursor {
    type Item = EncodedTuple;
    type Error = EvaluationError;

    fn next(&mut self) -> Result<Option<EncodedTuple>, EvaluationError> {
        loop {
            match &mut self.state {
                OrderState::Pending(child) => {
                    match sort_rows(child, &self.comparators, self.deadline) {
                        Ok(rows) => self.state = OrderState::Sorted(rows.into_iter()),
                        Err(e) => {
                            child.close();
                            self.state = OrderState::Closed;
                            return Err(e);
                        }
                    }
                }
                OrderState::Sorted(rows) => {
                    if let Some(row) = rows.next() {
                        return Ok(Some(row));
                    }
                    self.state = OrderState::Closed;
                }
                OrderState::Closed => return Ok(None),
            }
        }
    }

    fn close(&mut self) {
        if let OrderState::Pending(child) = &mut self.state {
            child.close();
        }
        self.state = OrderState::Closed;
    }
}

/// Stable sort: rows with equal keys keep the order of the child.
fn sort_rows(
    child: &mut TupleCursor,
    comparators: &[Comparator],
    deadline: Option<Instant>,
) -> Result<Vec<EncodedTuple>, EvaluationError> {
    check_deadline(deadline)?;
    let mut rows = Vec::new();
    while let Some(tuple) = child.next()? {
        check_deadline(deadline)?;
        let keys = comparators
            .iter()
            .map(|c| c.key(&tuple))
            .collect::<Vec<_>>();
        rows.push((keys, tuple));
    }
    check_deadline(deadline)?;
    rows.sort_by(|(a, _), (b, _)| {
        for ((a, b), comparator) in a.iter().zip(b).zip(comparators) {
            let order = comparator.cmp(a.as_deref(), b.as_deref());
            if order != Ordering::Equal {
                return order;
            }
        }
        Ordering::Equal
    });
    check_deadline(deadline)?;
    Ok(rows.into_iter().map(|(_, tuple)| tuple).collect())
}

fn check_deadline(deadline: Option<Instant>) -> Result<(), EvaluationError> {
    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
        trace!("evaluation cancelled by its deadline");
        return Err(EvaluationError::Cancelled);
    }
    Ok(())
}

/// Checks the deadline before pulling each row.
struct DeadlineCursor {
    inner: Option<TupleCursor>,
    deadline: Instant,
}

impl Cursor for DeadlineCursor {
    type Item = EncodedTuple;
    type Error = EvaluationError;

    fn next(&mut self) -> Result<Option<EncodedTuple>, EvaluationError> {
        let Some(inner) = &mut self.inner else {
            return Ok(None);
        };
        if let Err(e) = check_deadline(Some(self.deadline)) {
            self.close();
            return Err(e);
        }
        let result = inner.next();
        if result.is_err() {
            self.inner = None;
        }
        result
    }

    fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
    }
}

/// The statements an evaluation reads: a pinned snapshot, or the staged state of a transaction.
///
/// Built with [`Snapshot::dataset`](crate::Snapshot::dataset) or [`Transaction::dataset`](crate::Transaction::dataset).
pub struct QueryDataset<'a> {
    core: Arc<StorageCore>,
    snapshot: u64,
    pin: Option<Arc<SnapshotPin>>,
    _lifetime: PhantomData<&'a ()>,
}

impl QueryDataset<'_> {
    pub(crate) fn new(core: Arc<StorageCore>, snapshot: u64, pin: Option<Arc<SnapshotPin>>) -> Self {
        Self {
            core,
            snapshot,
            pin,
            _lifetime: PhantomData,
        }
    }
}

/// Evaluates [`GraphPattern`]s.
///
/// ```
/// use oxalgebra::{GraphPattern, QuadPattern};
/// use oxstore::{BindingSet, QueryEvaluator, Store};
/// use oxterm::{GraphName, Literal, NamedNode, Quad, Variable};
///
/// let store = Store::new()?;
/// let ex = NamedNode::new("http://example.com")?;
/// store.insert(&Quad::new(ex.clone(), ex.clone(), Literal::from(1), GraphName::DefaultGraph))?;
///
/// let pattern = GraphPattern::Pattern(QuadPattern::new(
///     Variable::new("s")?,
///     ex.clone(),
///     Variable::new("o")?,
/// ));
/// let snapshot = store.snapshot();
/// let rows = QueryEvaluator::new()
///     .execute(snapshot.dataset(), &pattern, &BindingSet::default())?
///     .into_iter()
///     .collect::<Result<Vec<_>, _>>()?;
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0]["o"], Literal::from(1).into());
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
#[must_use]
pub struct QueryEvaluator {
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    include_inferred: bool,
}

impl Default for QueryEvaluator {
    fn default() -> Self {
        Self {
            deadline: None,
            timeout: None,
            include_inferred: true,
        }
    }
}

impl QueryEvaluator {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the evaluation once `timeout` has elapsed since [`execute`](Self::execute) was called.
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Cancels the evaluation at the given instant.
    #[inline]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Only matches explicit statements.
    #[inline]
    pub fn without_inferred(mut self) -> Self {
        self.include_inferred = false;
        self
    }

    /// Evaluates `pattern`, the `bindings` of the variables in scope at its top being fixed.
    ///
    /// The evaluation is lazy: statements are read as the returned cursor is consumed.
    /// Bindings of variables not in scope at the top of the pattern are ignored.
    pub fn execute<'a>(
        &self,
        dataset: QueryDataset<'a>,
        pattern: &GraphPattern,
        bindings: &BindingSet,
    ) -> Result<BindingCursor<'a>, EvaluationError> {
        let deadline = match (
            self.deadline,
            self.timeout.and_then(|t| Instant::now().checked_add(t)),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        trace!(pattern = %pattern, snapshot = dataset.snapshot, "evaluating graph pattern");
        let QueryDataset {
            core, snapshot, pin, ..
        } = dataset;
        let evaluator = SimpleEvaluator {
            dataset: EvalDataset {
                core,
                snapshot,
                include_inferred: self.include_inferred,
            },
            deadline,
        };
        let mut encoded_variables = Vec::new();
        pattern.on_in_scope_variable(|variable| {
            encode_variable(&mut encoded_variables, variable);
        });
        let variables = Arc::<[Variable]>::from(encoded_variables.as_slice());
        let mut from = EncodedTuple::with_capacity(variables.len());
        for (variable, value) in bindings {
            if let Some(position) = variables.iter().position(|v| v == variable) {
                from.set(position, evaluator.dataset.constant(value.clone()));
            }
        }
        let child = evaluator.graph_pattern_evaluator(pattern, &mut encoded_variables)?;
        let mut inner = child(from);
        if let Some(deadline) = deadline {
            inner = Box::new(DeadlineCursor {
                inner: Some(inner),
                deadline,
            });
        }
        Ok(BindingCursor {
            variables,
            inner,
            _pin: pin,
            _lifetime: PhantomData,
        })
    }
}

/// The rows of an evaluation, see [`QueryEvaluator::execute`].
///
/// Each row binds a subset of [`variables`](Self::variables).
/// It is both a [`Cursor`] and an [`IntoIterator`].
#[must_use]
pub struct BindingCursor<'a> {
    variables: Arc<[Variable]>,
    inner: TupleCursor,
    _pin: Option<Arc<SnapshotPin>>,
    _lifetime: PhantomData<&'a ()>,
}

impl BindingCursor<'_> {
    /// The variables in scope at the top of the evaluated pattern.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

impl Cursor for BindingCursor<'_> {
    type Item = BindingSet;
    type Error = EvaluationError;

    fn next(&mut self) -> Result<Option<BindingSet>, EvaluationError> {
        let Some(tuple) = self.inner.next()? else {
            return Ok(None);
        };
        let values = (0..self.variables.len())
            .map(|i| tuple.get(i).map(|t| t.term().clone()))
            .collect::<Vec<_>>();
        Ok(Some(BindingSet::new(Arc::clone(&self.variables), values)))
    }

    #[inline]
    fn close(&mut self) {
        self.inner.close()
    }
}

impl<'a> IntoIterator for BindingCursor<'a> {
    type Item = Result<BindingSet, EvaluationError>;
    type IntoIter = CursorIter<Self>;

    #[inline]
    fn into_iter(self) -> CursorIter<Self> {
        self.into_results()
    }
}

impl fmt::Debug for BindingCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCursor")
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::IterCursor;
    use oxterm::Literal;
    use std::cell::Cell;
    use std::hash::BuildHasher;
    use std::thread;

    fn value(i: i64) -> Arc<InternedTerm> {
        Arc::new(InternedTerm::new(Literal::from(i)))
    }

    #[test]
    fn trailing_unbound_values_are_ignored() {
        let mut a = EncodedTuple::default();
        a.set(0, value(1));
        let mut b = EncodedTuple::with_capacity(4);
        b.set(0, value(1));
        b.inner.resize(4, None);
        assert!(a == b);
        let hasher = rustc_hash::FxBuildHasher;
        assert_eq!(hasher.hash_one(&a), hasher.hash_one(&b));
        b.set(2, value(2));
        assert!(a != b);
        assert!(b.contains(2));
        assert!(!b.contains(1));
        assert!(!b.contains(10));
    }

    #[test]
    fn encode_variable_reuses_positions() {
        let mut variables = Vec::new();
        let s = Variable::new_unchecked("s");
        let o = Variable::new_unchecked("o");
        assert_eq!(encode_variable(&mut variables, &s), 0);
        assert_eq!(encode_variable(&mut variables, &o), 1);
        assert_eq!(encode_variable(&mut variables, &s), 0);
        assert_eq!(variables, [s, o]);
    }

    #[test]
    fn deadline_cursor_cancels_and_closes() {
        let mut cursor = DeadlineCursor {
            inner: Some(Box::new(IterCursor::new(
                vec![Ok::<_, EvaluationError>(EncodedTuple::default())].into_iter(),
            ))),
            deadline: Instant::now(),
        };
        assert!(matches!(cursor.next(), Err(EvaluationError::Cancelled)));
        assert!(matches!(cursor.next(), Ok(None)));
    }

    #[test]
    fn sort_rows_checks_the_deadline_while_pulling() {
        let pulled = Rc::new(Cell::new(0));
        let counter = Rc::clone(&pulled);
        let mut child: TupleCursor = Box::new(IterCursor::new((0..1000).map(move |_| {
            counter.set(counter.get() + 1);
            thread::sleep(Duration::from_millis(5));
            Ok(EncodedTuple::default())
        })));
        let deadline = Instant::now() + Duration::from_millis(50);
        assert!(matches!(
            sort_rows(&mut child, &[], Some(deadline)),
            Err(EvaluationError::Cancelled)
        ));
        assert!(pulled.get() > 0);
        assert!(pulled.get() < 1000);
    }

    #[test]
    fn order_cursor_is_cancelled_during_materialization() {
        let child = IterCursor::new((0..1000).map(|_| {
            thread::sleep(Duration::from_millis(5));
            Ok(EncodedTuple::default())
        }));
        let mut cursor = OrderCursor {
            state: OrderState::Pending(Box::new(child)),
            comparators: Vec::new().into(),
            deadline: Some(Instant::now() + Duration::from_millis(50)),
        };
        assert!(matches!(cursor.next(), Err(EvaluationError::Cancelled)));
        assert!(matches!(cursor.next(), Ok(None)));
    }
}
