//! Tree-walking evaluator
//!
//! Strict, left-to-right, single-threaded. Short-circuiting applies to
//! `&&`, `or`, `||`, `??`, and the untaken branches of `if`/`match`.
//! Cancellation is checked at every call boundary; stdlib reducers check it
//! again at their loop heads.

use chrono::{DateTime, FixedOffset};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Diagnostic, ErrorKind, Span};
use crate::parser::ast::{
    BinaryOp, Expr, FunctionDef, LetBinding, ObjectEntry, Program, TemplateDef, UnaryOp,
};
use crate::stdlib::{self, StdlibEntry};
use crate::udm::{coerce, deep_equal, LambdaValue, ObjectBuilder, Udm};

use super::environment::{Binding, Env, Frame};
use super::pattern::match_pattern;
use super::selector;
use super::template::TemplateEngine;

/// Cooperative cancellation flag, shared with the caller's watchdog
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-run evaluation knobs
#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub cancel: CancelToken,
    /// Override the wall-clock snapshot `now()`/`today()` read
    pub clock: Option<DateTime<FixedOffset>>,
    /// Seed for the `random*` source; a process entropy source otherwise
    pub seed: Option<u64>,
}

pub struct Evaluator<'p> {
    templates: TemplateEngine<'p>,
    cancel: CancelToken,
    /// The program frame top-level function bodies evaluate under
    globals: Option<Env>,
    /// Wall time, snapshotted once per run so every `now()` call agrees
    pub now: DateTime<FixedOffset>,
    pub rng: StdRng,
    /// (last millisecond, counter) pair backing monotonic UUIDv7 batches
    pub uuid_state: (u64, u32),
}

/// Evaluate a compiled program against already-lifted inputs
pub fn evaluate_program(
    program: &Program,
    inputs: &[(String, Udm)],
    options: &EvalOptions,
) -> Result<Udm, Diagnostic> {
    let root = Frame::root();
    for entry in stdlib::registry() {
        root.define(entry.name, Binding::Stdlib(entry));
        for alias in entry.aliases {
            root.define(*alias, Binding::Stdlib(entry));
        }
    }

    let env = Frame::child(&root);
    for def in &program.functions {
        env.define(def.name.clone(), Binding::Function(Rc::new(def.clone())));
    }
    for (name, value) in inputs {
        env.define_value(format!("${}", name), value.clone());
    }

    let mut evaluator = Evaluator::new(&program.templates, options);
    evaluator.globals = Some(Rc::clone(&env));
    evaluator.eval(&program.body, &env)
}

impl<'p> Evaluator<'p> {
    pub fn new(templates: &'p [TemplateDef], options: &EvalOptions) -> Self {
        let now = options
            .clock
            .unwrap_or_else(|| chrono::Local::now().fixed_offset());
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Evaluator {
            templates: TemplateEngine::new(templates),
            cancel: options.cancel.clone(),
            globals: None,
            now,
            rng,
            uuid_state: (0, 0),
        }
    }

    pub fn check_cancel(&self, span: Span) -> Result<(), Diagnostic> {
        if self.cancel.is_cancelled() {
            Err(Diagnostic::new(ErrorKind::Cancelled, "evaluation cancelled").with_span(span))
        } else {
            Ok(())
        }
    }

    pub fn eval(&mut self, expr: &Expr, env: &Env) -> Result<Udm, Diagnostic> {
        match expr {
            Expr::Null(_) => Ok(Udm::Null),
            Expr::Bool(b, _) => Ok(Udm::Bool(*b)),
            Expr::Int(n, _) => Ok(Udm::Int(*n)),
            Expr::Float(n, _) => Ok(Udm::Float(*n)),
            Expr::Str(s, _) => Ok(Udm::string(s.clone())),

            Expr::Array(items, _) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, env)?);
                }
                Ok(Udm::Array(values))
            }

            Expr::Object(entries, _) => self.eval_object(entries, env),

            Expr::Ident(name, span) => match env.lookup(name) {
                Some(Binding::Value(value)) => Ok(value),
                Some(Binding::Stdlib(entry)) => Err(Diagnostic::new(
                    ErrorKind::TypeMismatch,
                    format!(
                        "`{}` is a library function; call it or wrap it in a lambda",
                        entry.name
                    ),
                )
                .with_span(*span)),
                Some(Binding::Function(def)) => Err(Diagnostic::new(
                    ErrorKind::TypeMismatch,
                    format!(
                        "`{}` is a function; call it or wrap it in a lambda",
                        def.name
                    ),
                )
                .with_span(*span)),
                None => Err(Diagnostic::new(
                    ErrorKind::UnresolvedBinding,
                    format!("unknown identifier `{}`", name),
                )
                .with_span(*span)),
            },

            Expr::InputRef(name, span) => match env.lookup(&format!("${}", name)) {
                Some(Binding::Value(value)) => Ok(value),
                _ => Err(Diagnostic::new(
                    ErrorKind::UnresolvedBinding,
                    format!("unknown input `${}`", name),
                )
                .with_span(*span)),
            },

            Expr::CurrentNode(span) => match env.lookup(".") {
                Some(Binding::Value(value)) => Ok(value),
                _ => Err(Diagnostic::new(
                    ErrorKind::UnresolvedBinding,
                    "`.` is only bound inside templates and predicates",
                )
                .with_span(*span)),
            },

            Expr::Member { target, name, span } => {
                let value = self.eval(target, env)?;
                selector::member(&value, name, *span)
            }

            Expr::Attribute { target, name, span } => {
                let value = self.eval(target, env)?;
                selector::attribute(&value, name, *span)
            }

            Expr::RecursiveDescent { target, name, .. } => {
                let value = self.eval(target, env)?;
                Ok(selector::recursive_descent(&value, name))
            }

            Expr::Wildcard { target, span } => {
                let value = self.eval(target, env)?;
                selector::wildcard(&value, *span)
            }

            Expr::Index { target, index, span } => self.eval_index(target, index, *span, env),

            Expr::Unary { op, operand, span } => {
                let value = self.eval(operand, env)?;
                self.eval_unary(*op, value, *span)
            }

            Expr::Binary {
                op,
                left,
                right,
                span,
            } => self.eval_binary(*op, left, right, *span, env),

            Expr::Call { callee, args, span } => self.eval_call(callee, args, *span, env),

            Expr::Lambda { params, body, span: _ } => Ok(Udm::Lambda(Rc::new(LambdaValue {
                params: params.clone(),
                body: (**body).clone(),
                env: Rc::clone(env),
                name: None,
            }))),

            Expr::If {
                cond,
                then_branch,
                else_branch,
                span,
            } => {
                let cond_value = self.eval(cond, env)?;
                match coerce::unwrap_text(&cond_value) {
                    Udm::Bool(true) => self.eval(then_branch, env),
                    Udm::Bool(false) => self.eval(else_branch, env),
                    other => Err(Diagnostic::new(
                        ErrorKind::TypeMismatch,
                        format!("`if` condition must be boolean, found {}", other.type_of()),
                    )
                    .with_span(*span)),
                }
            }

            Expr::Match {
                scrutinee,
                cases,
                span,
            } => {
                let value = self.eval(scrutinee, env)?;
                for case in cases {
                    if let Some(bindings) = match_pattern(&case.pattern, &value) {
                        let frame = Frame::child(env);
                        for (name, bound) in bindings {
                            frame.define_value(name, bound);
                        }
                        if let Some(guard) = &case.guard {
                            let guard_value = self.eval(guard, &frame)?;
                            match coerce::unwrap_text(&guard_value) {
                                Udm::Bool(true) => {}
                                Udm::Bool(false) => continue,
                                other => {
                                    return Err(Diagnostic::new(
                                        ErrorKind::TypeMismatch,
                                        format!(
                                            "`when` guard must be boolean, found {}",
                                            other.type_of()
                                        ),
                                    )
                                    .with_span(guard.span()))
                                }
                            }
                        }
                        return self.eval(&case.body, &frame);
                    }
                }
                Err(Diagnostic::new(
                    ErrorKind::TypeMismatch,
                    format!("no `match` case matched value of type {}", value.type_of()),
                )
                .with_span(*span))
            }

            Expr::Apply { selector: sel, span } => {
                let selected = self.eval(sel, env)?;
                match selected {
                    Udm::Array(items) => {
                        let mut results = Vec::with_capacity(items.len());
                        for node in &items {
                            results.push(self.apply_node(node, env, *span)?);
                        }
                        Ok(Udm::Array(results))
                    }
                    single => self.apply_node(&single, env, *span),
                }
            }

            Expr::Block { lets, value, .. } => {
                let frame = Frame::child(env);
                for binding in lets {
                    self.eval_let(binding, &frame)?;
                }
                self.eval(value, &frame)
            }
        }
    }

    fn eval_let(&mut self, binding: &LetBinding, frame: &Env) -> Result<(), Diagnostic> {
        let value = self.eval(&binding.value, frame)?;
        frame.define_value(binding.name.clone(), value);
        Ok(())
    }

    /// Object literals evaluate under their own frame so let-entries are
    /// visible to later siblings; the builder keeps the mutable
    /// accumulation private.
    fn eval_object(&mut self, entries: &[ObjectEntry], env: &Env) -> Result<Udm, Diagnostic> {
        let frame = Frame::child(env);
        let mut builder = ObjectBuilder::new();
        for entry in entries {
            match entry {
                ObjectEntry::Let(binding) => self.eval_let(binding, &frame)?,
                ObjectEntry::Property { key, value, .. } => {
                    let evaluated = self.eval(value, &frame)?;
                    builder.property(key.clone(), evaluated);
                }
                ObjectEntry::Attribute { key, value, .. } => {
                    let evaluated = self.eval(value, &frame)?;
                    builder.attribute(key.clone(), coerce::to_display_string(&evaluated));
                }
            }
        }
        Ok(builder.build())
    }

    fn eval_index(
        &mut self,
        target: &Expr,
        index: &Expr,
        span: Span,
        env: &Env,
    ) -> Result<Udm, Diagnostic> {
        let value = self.eval(target, env)?;

        // A bracket expression mentioning `.` filters; anything else is
        // evaluated first and dispatched on its value
        if selector::uses_current_node(index) {
            return self.filter_with_predicate(value, index, span, env);
        }

        let idx = self.eval(index, env)?;
        match idx {
            Udm::Int(n) => selector::index(&value, n, span),
            Udm::Bool(keep) => match value {
                Udm::Array(items) => Ok(Udm::Array(if keep { items } else { Vec::new() })),
                single if keep => Ok(single),
                _ => Err(Diagnostic::new(
                    ErrorKind::SelectorFailure,
                    "predicate did not match",
                )
                .with_span(span)),
            },
            Udm::Lambda(lambda) => {
                let items = match value {
                    Udm::Array(items) => items,
                    single => vec![single],
                };
                let mut kept = Vec::new();
                for item in items {
                    self.check_cancel(span)?;
                    let verdict = self.call_lambda(&lambda, vec![item.clone()], span)?;
                    match coerce::unwrap_text(&verdict) {
                        Udm::Bool(true) => kept.push(item),
                        Udm::Bool(false) => {}
                        other => {
                            return Err(Diagnostic::new(
                                ErrorKind::TypeMismatch,
                                format!(
                                    "predicate lambda must return boolean, found {}",
                                    other.type_of()
                                ),
                            )
                            .with_span(span))
                        }
                    }
                }
                Ok(Udm::Array(kept))
            }
            other => Err(Diagnostic::new(
                ErrorKind::TypeMismatch,
                format!(
                    "`[...]` needs an integer index or a predicate, found {}",
                    other.type_of()
                ),
            )
            .with_span(span)),
        }
    }

    fn filter_with_predicate(
        &mut self,
        value: Udm,
        predicate: &Expr,
        span: Span,
        env: &Env,
    ) -> Result<Udm, Diagnostic> {
        let test = |this: &mut Self, item: &Udm| -> Result<bool, Diagnostic> {
            let frame = Frame::child(env);
            frame.define_value(".", item.clone());
            let verdict = this.eval(predicate, &frame)?;
            match coerce::unwrap_text(&verdict) {
                Udm::Bool(b) => Ok(*b),
                other => Err(Diagnostic::new(
                    ErrorKind::TypeMismatch,
                    format!("predicate must evaluate to boolean, found {}", other.type_of()),
                )
                .with_span(predicate.span())),
            }
        };

        match value {
            Udm::Array(items) => {
                let mut kept = Vec::new();
                for item in items {
                    self.check_cancel(span)?;
                    if test(self, &item)? {
                        kept.push(item);
                    }
                }
                Ok(Udm::Array(kept))
            }
            single => {
                if test(self, &single)? {
                    Ok(single)
                } else {
                    Err(Diagnostic::new(
                        ErrorKind::SelectorFailure,
                        "predicate did not match",
                    )
                    .with_span(span))
                }
            }
        }
    }

    fn eval_unary(&mut self, op: UnaryOp, value: Udm, span: Span) -> Result<Udm, Diagnostic> {
        match op {
            UnaryOp::Neg => match coerce::unwrap_text(&value) {
                Udm::Int(n) => Ok(Udm::Int(-n)),
                Udm::Float(n) => Ok(Udm::Float(-n)),
                other => Err(Diagnostic::new(
                    ErrorKind::TypeMismatch,
                    format!("cannot negate {}", other.type_of()),
                )
                .with_span(span)),
            },
            UnaryOp::Not => match coerce::unwrap_text(&value) {
                Udm::Bool(b) => Ok(Udm::Bool(!b)),
                other => Err(Diagnostic::new(
                    ErrorKind::TypeMismatch,
                    format!("`!` needs a boolean, found {}", other.type_of()),
                )
                .with_span(span)),
            },
        }
    }

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        span: Span,
        env: &Env,
    ) -> Result<Udm, Diagnostic> {
        match op {
            // `||` falls through on undefined, null, and empty string
            BinaryOp::Default => match self.eval(left, env) {
                Err(diag) if diag.kind == ErrorKind::SelectorFailure => self.eval(right, env),
                Err(diag) => Err(diag),
                Ok(value) => {
                    let unwrapped = coerce::unwrap_text(&value);
                    let empty = matches!(unwrapped, Udm::Null)
                        || matches!(unwrapped, Udm::Str(s) if s.is_empty());
                    if empty {
                        self.eval(right, env)
                    } else {
                        Ok(value)
                    }
                }
            },
            // `??` falls through on undefined and null only
            BinaryOp::Coalesce => match self.eval(left, env) {
                Err(diag) if diag.kind == ErrorKind::SelectorFailure => self.eval(right, env),
                Err(diag) => Err(diag),
                Ok(value) => {
                    if matches!(coerce::unwrap_text(&value), Udm::Null) {
                        self.eval(right, env)
                    } else {
                        Ok(value)
                    }
                }
            },
            BinaryOp::And => {
                let lhs = self.eval(left, env)?;
                match self.expect_bool(&lhs, "&&", span)? {
                    false => Ok(Udm::Bool(false)),
                    true => {
                        let rhs = self.eval(right, env)?;
                        Ok(Udm::Bool(self.expect_bool(&rhs, "&&", span)?))
                    }
                }
            }
            BinaryOp::Or => {
                let lhs = self.eval(left, env)?;
                match self.expect_bool(&lhs, "or", span)? {
                    true => Ok(Udm::Bool(true)),
                    false => {
                        let rhs = self.eval(right, env)?;
                        Ok(Udm::Bool(self.expect_bool(&rhs, "or", span)?))
                    }
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let lhs = self.eval(left, env)?;
                let rhs = self.eval(right, env)?;
                let equal = deep_equal(coerce::unwrap_text(&lhs), coerce::unwrap_text(&rhs));
                Ok(Udm::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let lhs = self.eval(left, env)?;
                let rhs = self.eval(right, env)?;
                compare_for_op(op, &lhs, &rhs, span)
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let lhs = self.eval(left, env)?;
                let rhs = self.eval(right, env)?;
                arithmetic(op, &lhs, &rhs, span)
            }
        }
    }

    fn expect_bool(&self, value: &Udm, op: &str, span: Span) -> Result<bool, Diagnostic> {
        match coerce::unwrap_text(value) {
            Udm::Bool(b) => Ok(*b),
            other => Err(Diagnostic::new(
                ErrorKind::TypeMismatch,
                format!("`{}` needs boolean operands, found {}", op, other.type_of()),
            )
            .with_span(span)),
        }
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        span: Span,
        env: &Env,
    ) -> Result<Udm, Diagnostic> {
        if let Expr::Ident(name, ident_span) = callee {
            return match env.lookup(name) {
                Some(Binding::Stdlib(entry)) => {
                    let values = self.eval_args(args, env)?;
                    self.call_stdlib(entry, values, span)
                }
                Some(Binding::Function(def)) => {
                    let values = self.eval_args(args, env)?;
                    self.call_named_function(&def, values, span)
                }
                Some(Binding::Value(value)) => {
                    let values = self.eval_args(args, env)?;
                    self.call_value(&value, values, span)
                }
                None => Err(Diagnostic::new(
                    ErrorKind::UnresolvedBinding,
                    format!("unknown function `{}`", name),
                )
                .with_span(*ident_span)),
            };
        }
        let callee_value = self.eval(callee, env)?;
        let values = self.eval_args(args, env)?;
        self.call_value(&callee_value, values, span)
    }

    fn eval_args(&mut self, args: &[Expr], env: &Env) -> Result<Vec<Udm>, Diagnostic> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        Ok(values)
    }

    pub fn call_stdlib(
        &mut self,
        entry: &'static StdlibEntry,
        args: Vec<Udm>,
        span: Span,
    ) -> Result<Udm, Diagnostic> {
        self.check_cancel(span)?;
        let arity_ok = args.len() >= entry.min_args
            && entry.max_args.map(|max| args.len() <= max).unwrap_or(true);
        if !arity_ok {
            let expected = match entry.max_args {
                Some(max) if max == entry.min_args => format!("{}", entry.min_args),
                Some(max) => format!("{} to {}", entry.min_args, max),
                None => format!("at least {}", entry.min_args),
            };
            return Err(Diagnostic::new(
                ErrorKind::ArityMismatch,
                format!(
                    "`{}` expects {} argument(s), got {}",
                    entry.name,
                    expected,
                    args.len()
                ),
            )
            .with_span(span));
        }
        (entry.func)(self, args, span).map_err(|diag| {
            if diag.span.is_none() {
                diag.with_span(span)
            } else {
                diag
            }
        })
    }

    /// Apply a value as a function; used by the evaluator and by
    /// higher-order stdlib functions
    pub fn call_function(
        &mut self,
        callee: &Udm,
        args: Vec<Udm>,
        span: Span,
    ) -> Result<Udm, Diagnostic> {
        self.call_value(callee, args, span)
    }

    fn call_value(&mut self, callee: &Udm, args: Vec<Udm>, span: Span) -> Result<Udm, Diagnostic> {
        match callee {
            Udm::Lambda(lambda) => self.call_lambda(&Rc::clone(lambda), args, span),
            other => Err(Diagnostic::new(
                ErrorKind::TypeMismatch,
                format!("cannot call a value of type {}", other.type_of()),
            )
            .with_span(span)),
        }
    }

    /// Apply a top-level `function` definition. Its body sees the program
    /// frame, not the caller's scope.
    fn call_named_function(
        &mut self,
        def: &Rc<FunctionDef>,
        args: Vec<Udm>,
        span: Span,
    ) -> Result<Udm, Diagnostic> {
        self.check_cancel(span)?;
        if args.len() != def.params.len() {
            return Err(Diagnostic::new(
                ErrorKind::ArityMismatch,
                format!(
                    "`{}` expects {} argument(s), got {}",
                    def.name,
                    def.params.len(),
                    args.len()
                ),
            )
            .with_span(span));
        }
        let parent = self
            .globals
            .clone()
            .expect("named functions exist only in program runs");
        let frame = Frame::child(&parent);
        for (param, value) in def.params.iter().zip(args) {
            frame.define_value(param.name.clone(), value);
        }
        let def = Rc::clone(def);
        self.eval(&def.body, &frame).map_err(|mut diag| {
            diag.push_frame(def.name.clone(), Some(span));
            diag
        })
    }

    fn call_lambda(
        &mut self,
        lambda: &Rc<LambdaValue>,
        args: Vec<Udm>,
        span: Span,
    ) -> Result<Udm, Diagnostic> {
        self.check_cancel(span)?;
        if args.len() != lambda.params.len() {
            let name = lambda.name.as_deref().unwrap_or("<lambda>");
            return Err(Diagnostic::new(
                ErrorKind::ArityMismatch,
                format!(
                    "`{}` expects {} argument(s), got {}",
                    name,
                    lambda.params.len(),
                    args.len()
                ),
            )
            .with_span(span));
        }
        let frame = Frame::child(&lambda.env);
        for (param, value) in lambda.params.iter().zip(args) {
            frame.define_value(param.name.clone(), value);
        }
        self.eval(&lambda.body, &frame).map_err(|mut diag| {
            diag.push_frame(
                lambda.name.clone().unwrap_or_else(|| "<lambda>".to_string()),
                Some(span),
            );
            diag
        })
    }

    fn apply_node(&mut self, node: &Udm, env: &Env, span: Span) -> Result<Udm, Diagnostic> {
        let candidates: Vec<_> = self.templates.candidates(node).collect();
        for (template, bindings) in candidates {
            let frame = Frame::child(env);
            frame.define_value(".", node.clone());
            for (name, value) in bindings {
                frame.define_value(name, value);
            }
            if let Some(guard) = &template.guard {
                let verdict = self.eval(guard, &frame)?;
                match coerce::unwrap_text(&verdict) {
                    Udm::Bool(true) => {}
                    Udm::Bool(false) => continue,
                    other => {
                        return Err(Diagnostic::new(
                            ErrorKind::TypeMismatch,
                            format!("template guard must be boolean, found {}", other.type_of()),
                        )
                        .with_span(guard.span()))
                    }
                }
            }
            return self.eval(&template.body, &frame);
        }
        Err(Diagnostic::new(
            ErrorKind::NoTemplateMatch,
            format!("no template matches value of type {}", node.type_of()),
        )
        .with_span(span))
    }
}

fn compare_for_op(op: BinaryOp, lhs: &Udm, rhs: &Udm, span: Span) -> Result<Udm, Diagnostic> {
    use std::cmp::Ordering;
    let l = coerce::unwrap_text(lhs);
    let r = coerce::unwrap_text(rhs);
    let ordering: Ordering = match (l, r) {
        (Udm::Int(a), Udm::Int(b)) => a.cmp(b),
        (Udm::Str(a), Udm::Str(b)) => a.cmp(b),
        (Udm::DateTime(a), Udm::DateTime(b)) => a.cmp(b),
        (Udm::Date(a), Udm::Date(b)) => a.cmp(b),
        (Udm::LocalDateTime(a), Udm::LocalDateTime(b)) => a.cmp(b),
        (Udm::Time(a), Udm::Time(b)) => a.cmp(b),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => {
                return Err(Diagnostic::new(
                    ErrorKind::TypeMismatch,
                    format!(
                        "cannot compare {} with {} using `{}`",
                        l.type_of(),
                        r.type_of(),
                        op.symbol()
                    ),
                )
                .with_span(span))
            }
        },
    };
    let result = match op {
        BinaryOp::Lt => ordering == std::cmp::Ordering::Less,
        BinaryOp::Le => ordering != std::cmp::Ordering::Greater,
        BinaryOp::Gt => ordering == std::cmp::Ordering::Greater,
        BinaryOp::Ge => ordering != std::cmp::Ordering::Less,
        _ => unreachable!("not a comparison operator"),
    };
    Ok(Udm::Bool(result))
}

fn arithmetic(op: BinaryOp, lhs: &Udm, rhs: &Udm, span: Span) -> Result<Udm, Diagnostic> {
    let l = coerce::unwrap_text(lhs);
    let r = coerce::unwrap_text(rhs);

    // `+` concatenates as soon as either side is a string
    if op == BinaryOp::Add {
        if matches!(l, Udm::Str(_)) || matches!(r, Udm::Str(_)) {
            let mut joined = coerce::to_display_string(l);
            joined.push_str(&coerce::to_display_string(r));
            return Ok(Udm::Str(joined));
        }
    }

    match (l, r) {
        (Udm::Int(a), Udm::Int(b)) => int_arithmetic(op, *a, *b, span),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => {
                let result = match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Mod => a % b,
                    _ => unreachable!("not an arithmetic operator"),
                };
                Ok(Udm::Float(result))
            }
            _ => Err(Diagnostic::new(
                ErrorKind::TypeMismatch,
                format!(
                    "`{}` needs numeric operands, found {} and {}",
                    op.symbol(),
                    l.type_of(),
                    r.type_of()
                ),
            )
            .with_span(span)),
        },
    }
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64, span: Span) -> Result<Udm, Diagnostic> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => {
            if b == 0 {
                return Err(
                    Diagnostic::new(ErrorKind::DivisionByZero, "division by zero").with_span(span)
                );
            }
            a.checked_div(b)
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(
                    Diagnostic::new(ErrorKind::DivisionByZero, "modulo by zero").with_span(span)
                );
            }
            a.checked_rem(b)
        }
        _ => unreachable!("not an arithmetic operator"),
    };
    match result {
        Some(n) => Ok(Udm::Int(n)),
        None => Err(Diagnostic::new(
            ErrorKind::TypeMismatch,
            format!("integer overflow in `{}`", op.symbol()),
        )
        .with_span(span)),
    }
}
