//! Tree-walking executor for formula ASTs.
//!
//! Evaluation does not stop at the first problem: each failing node records
//! a runtime error on the context and yields no value, and evaluation of
//! sibling nodes carries on. A run succeeds only if the error list is empty
//! and the root produced a time.

use chrono::Datelike;
use indexmap::IndexMap;
use serde::Serialize;
use zman_astro::{minutes_between, Time};
use zman_syntax::ast::{Base, BinaryOp, ConditionOp, Node, NodeKind};
use zman_syntax::error::{Error, ErrorList};
use zman_syntax::token::Position;
use zman_syntax::vocab::{ConditionVar, FunctionName, Primitive};

use crate::context::ExecutionContext;
use crate::value::{format_minutes, Value};

/// Named intermediate results in the order they were first computed.
pub type Breakdown = IndexMap<String, Value>;

#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub result: Time,
    pub breakdown: Breakdown,
}

/// Evaluates `ast` against `ctx`.
pub fn execute(ast: &Node, ctx: &mut ExecutionContext) -> Result<Time, ErrorList> {
    Executor::new(ctx).run(ast)
}

/// Like [`execute`], also returning every primitive, function call and
/// reference the formula went through.
pub fn execute_with_breakdown(ast: &Node, ctx: &mut ExecutionContext) -> Result<Evaluation, ErrorList> {
    let mut executor = Executor::new(ctx).with_breakdown();
    let result = executor.run(ast)?;
    Ok(Evaluation {
        result,
        breakdown: executor.into_breakdown(),
    })
}

/// Season name for a month, flipped south of the equator.
pub fn season(month: u32, latitude: f64) -> &'static str {
    let northern = match month {
        12 | 1 | 2 => "winter",
        3..=5 => "spring",
        6..=8 => "summer",
        _ => "autumn",
    };
    if latitude >= 0.0 {
        return northern;
    }
    match northern {
        "winter" => "summer",
        "summer" => "winter",
        "spring" => "autumn",
        _ => "spring",
    }
}

pub struct Executor<'a> {
    ctx: &'a mut ExecutionContext,
    breakdown: Option<Breakdown>,
}

impl<'a> Executor<'a> {
    pub fn new(ctx: &'a mut ExecutionContext) -> Self {
        Self { ctx, breakdown: None }
    }

    pub fn with_breakdown(mut self) -> Self {
        self.breakdown = Some(Breakdown::new());
        self
    }

    pub fn into_breakdown(self) -> Breakdown {
        self.breakdown.unwrap_or_default()
    }

    pub fn run(&mut self, ast: &Node) -> Result<Time, ErrorList> {
        self.ctx.errors.clear();
        let value = self.eval(ast);
        let mut errors = std::mem::take(&mut self.ctx.errors);

        let time = match value {
            Some(Value::Time(t)) => Some(t),
            Some(other) => {
                errors.push(
                    Error::runtime(format!("formula produced a {} ({}), not a time", other.value_type(), other))
                        .at(ast.pos),
                );
                None
            }
            None => None,
        };

        match time {
            Some(t) if errors.is_empty() => {
                tracing::debug!(formula = %ast, result = %t, "evaluated formula");
                Ok(t)
            }
            _ => {
                if errors.is_empty() {
                    errors.push(Error::runtime("formula produced no value").at(ast.pos));
                }
                tracing::debug!(formula = %ast, errors = errors.len(), "evaluation failed");
                Err(ErrorList::from(errors))
            }
        }
    }

    fn fail<T>(&mut self, err: Error) -> Option<T> {
        self.ctx.errors.push(err);
        None
    }

    fn record(&mut self, name: impl Into<String>, value: Value) {
        if let Some(steps) = &mut self.breakdown {
            steps.entry(name.into()).or_insert(value);
        }
    }

    fn eval(&mut self, node: &Node) -> Option<Value> {
        match &node.kind {
            NodeKind::Primitive(p) => self.primitive(*p, node.pos).map(Value::Time),
            NodeKind::Function { name, args } => self.function(node, *name, args).map(Value::Time),
            NodeKind::Binary { op, left, right } => {
                let l = self.eval(left);
                let r = self.eval(right);
                self.binary(*op, l?, r?, node.pos)
            }
            NodeKind::Duration { minutes, .. } => Some(Value::Duration(*minutes)),
            NodeKind::Number(n) => Some(Value::Number(*n)),
            NodeKind::String(s) => Some(Value::String(s.clone())),
            NodeKind::Reference(key) => match self.ctx.cached(key) {
                Some(t) => {
                    self.record(format!("@{}", key), Value::Time(t));
                    Some(Value::Time(t))
                }
                None => self.fail(
                    Error::runtime(format!("undefined reference @{}", key))
                        .at(node.pos)
                        .with_suggestion("referenced formulas must be evaluated before the formulas that use them"),
                ),
            },
            NodeKind::Direction(d) => self.fail(
                Error::runtime(format!("direction '{}' is only meaningful inside solar()", d)).at(node.pos),
            ),
            NodeKind::Base(b) => self.fail(
                Error::runtime(format!("base '{}' is only meaningful inside proportional_hours()", b.name()))
                    .at(node.pos),
            ),
            NodeKind::ConditionVar(v) => Some(self.condition_var(*v)),
            NodeKind::Condition { op, left, right } if op.is_logical() => {
                self.logical(*op, left, right).map(Value::Boolean)
            }
            NodeKind::Condition { op, left, right } => self.comparison(*op, left, right, node.pos),
            NodeKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => match self.eval(condition)? {
                Value::Boolean(true) => self.eval(then_branch),
                Value::Boolean(false) => match else_branch {
                    Some(e) => self.eval(e),
                    None => self.fail(
                        Error::runtime("condition is false and there is no else branch")
                            .at(node.pos)
                            .with_suggestion("add an else branch, e.g. if (...) { ... } else { sunset }"),
                    ),
                },
                other => self.fail(
                    Error::runtime(format!("condition must evaluate to a Boolean, got {}", other.value_type()))
                        .at(condition.pos),
                ),
            },
        }
    }

    fn eval_time(&mut self, node: &Node, what: &str) -> Option<Time> {
        match self.eval(node)? {
            Value::Time(t) => Some(t),
            other => self.fail(
                Error::runtime(format!("{} must be a Time, got {}", what, other.value_type())).at(node.pos),
            ),
        }
    }

    fn eval_number(&mut self, node: &Node, what: &str) -> Option<f64> {
        match self.eval(node)? {
            Value::Number(n) => Some(n),
            other => self.fail(
                Error::runtime(format!("{} must be a Number, got {}", what, other.value_type())).at(node.pos),
            ),
        }
    }

    fn primitive(&mut self, p: Primitive, pos: Position) -> Option<Time> {
        let time = match p.twilight() {
            Some((degrees, morning)) => {
                let times = self.ctx.solar_angle(degrees);
                if morning {
                    times.ascending
                } else {
                    times.descending
                }
            }
            None => {
                let sun = self.ctx.sun_times();
                match p {
                    Primitive::Sunrise => sun.sunrise,
                    Primitive::Sunset => sun.sunset,
                    Primitive::VisibleSunrise => sun.visible_sunrise,
                    Primitive::VisibleSunset => sun.visible_sunset,
                    Primitive::SolarNoon => Some(sun.solar_noon),
                    Primitive::SolarMidnight => Some(sun.solar_midnight),
                    _ => None,
                }
            }
        };

        match time {
            Some(t) => {
                tracing::trace!(primitive = p.name(), time = %t, "resolved primitive");
                self.ctx.remember(p.name(), t);
                self.record(p.name(), Value::Time(t));
                Some(t)
            }
            None => {
                let msg = format!(
                    "{} does not occur on {} at latitude {}",
                    p,
                    self.ctx.date(),
                    self.ctx.latitude()
                );
                self.fail(
                    Error::runtime(msg)
                        .at(pos)
                        .with_suggestion("the sun does not reach this position on the date; guard the formula with a latitude condition"),
                )
            }
        }
    }

    fn function(&mut self, node: &Node, name: FunctionName, args: &[Node]) -> Option<Time> {
        let key = node.to_string();
        if let Some(t) = self.ctx.memoized(&key) {
            self.record(key, Value::Time(t));
            return Some(t);
        }
        if args.len() != 2 {
            return self.fail(
                Error::runtime(format!("{}() takes exactly 2 arguments, got {}", name, args.len()))
                    .at(node.pos)
                    .with_suggestion(format!("Usage: {}", name.signature())),
            );
        }

        let time = match name {
            FunctionName::Solar => self.solar(&args[0], &args[1]),
            FunctionName::ProportionalHours => self.proportional_hours(&args[0], &args[1]),
            FunctionName::Midpoint => {
                let a = self.eval_time(&args[0], "midpoint() argument 1");
                let b = self.eval_time(&args[1], "midpoint() argument 2");
                Some(self.ctx.astronomy().midpoint(a?, b?))
            }
        }?;

        tracing::trace!(function = %key, time = %time, "evaluated function");
        self.ctx.memoize(key.clone(), time);
        self.record(key, Value::Time(time));
        Some(time)
    }

    fn solar(&mut self, degrees: &Node, direction: &Node) -> Option<Time> {
        let deg = self.eval_number(degrees, "solar() degrees");
        let dir = match direction.kind {
            NodeKind::Direction(d) => Some(d),
            _ => self.fail(Error::runtime("solar() second argument must be a direction").at(direction.pos)),
        };
        let (deg, dir) = (deg?, dir?);

        let times = self.ctx.solar_angle(deg);
        let time = if dir.is_morning() { times.ascending } else { times.descending };
        match time {
            Some(t) => Some(t),
            None => self.fail(
                Error::runtime(format!(
                    "the sun does not reach {}° below the horizon on {} at latitude {}",
                    deg,
                    self.ctx.date(),
                    self.ctx.latitude()
                ))
                .at(degrees.pos)
                .with_suggestion("use a smaller angle or a fixed offset for this season"),
            ),
        }
    }

    fn proportional_hours(&mut self, hours: &Node, base: &Node) -> Option<Time> {
        let count = self.eval_number(hours, "proportional_hours() hours");
        let span = match &base.kind {
            NodeKind::Base(Base::Custom(bounds)) => {
                if bounds.len() != 2 {
                    return self.fail(
                        Error::runtime(format!(
                            "custom base requires exactly 2 arguments: start and end, got {}",
                            bounds.len()
                        ))
                        .at(base.pos),
                    );
                }
                let start = self.eval_time(&bounds[0], "custom base start");
                let end = self.eval_time(&bounds[1], "custom base end");
                start.zip(end)
            }
            NodeKind::Base(b) => {
                let offset = b.offset_minutes().unwrap_or(0.0);
                let rise = self.primitive(Primitive::Sunrise, base.pos);
                let set = self.primitive(Primitive::Sunset, base.pos);
                match rise.zip(set) {
                    Some((r, s)) => self.shift(r, -offset, base.pos).zip(self.shift(s, offset, base.pos)),
                    None => None,
                }
            }
            _ => self.fail(Error::runtime("proportional_hours() second argument must be a base").at(base.pos)),
        };
        let (count, (start, end)) = (count?, span?);
        match self.ctx.astronomy().proportional_hours(start, end, count) {
            Some(t) => Some(t),
            None => self.fail(
                Error::runtime(format!("proportional_hours() hour {} is out of range", count)).at(hours.pos),
            ),
        }
    }

    /// `t` moved by `minutes`, or a runtime error when the result is not a
    /// representable time.
    fn shift(&mut self, t: Time, minutes: f64, pos: Position) -> Option<Time> {
        match self.ctx.astronomy().add_minutes(t, minutes) {
            Some(shifted) => Some(shifted),
            None => {
                let msg = format!("time offset out of range: {}", format_minutes(minutes));
                self.fail(Error::runtime(msg).at(pos))
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, l: Value, r: Value, pos: Position) -> Option<Value> {
        match (op, l, r) {
            (BinaryOp::Sub, Value::Time(a), Value::Time(b)) => Some(Value::Duration(minutes_between(b, a))),
            (BinaryOp::Add, Value::Time(t), Value::Duration(d)) => self.shift(t, d, pos).map(Value::Time),
            (BinaryOp::Sub, Value::Time(t), Value::Duration(d)) => self.shift(t, -d, pos).map(Value::Time),
            (BinaryOp::Add, Value::Duration(a), Value::Duration(b)) => Some(Value::Duration(a + b)),
            (BinaryOp::Sub, Value::Duration(a), Value::Duration(b)) => Some(Value::Duration(a - b)),
            (BinaryOp::Mul, Value::Duration(d), Value::Number(n))
            | (BinaryOp::Mul, Value::Number(n), Value::Duration(d)) => Some(Value::Duration(d * n)),
            (BinaryOp::Div, Value::Duration(_) | Value::Number(_), Value::Number(n)) if n == 0.0 => {
                self.fail(Error::runtime("division by zero").at(pos))
            }
            (BinaryOp::Div, Value::Duration(d), Value::Number(n)) => Some(Value::Duration(d / n)),
            (op, Value::Number(a), Value::Number(b)) => Some(Value::Number(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
            })),
            (op, l, r) => {
                let mut err = Error::runtime(format!(
                    "cannot apply '{}' to {} and {}",
                    op.symbol(),
                    l.value_type(),
                    r.value_type()
                ))
                .at(pos);
                if op == BinaryOp::Add && matches!((&l, &r), (Value::Time(_), Value::Time(_))) {
                    err = err.with_suggestion("subtract times to get a duration, or add a duration to a time");
                }
                self.fail(err)
            }
        }
    }

    fn condition_var(&mut self, var: ConditionVar) -> Value {
        match var {
            ConditionVar::Latitude => Value::Number(self.ctx.latitude()),
            ConditionVar::Longitude => Value::Number(self.ctx.longitude()),
            ConditionVar::Elevation => Value::Number(self.ctx.elevation()),
            ConditionVar::DayLength => Value::Duration(self.ctx.sun_times().day_length),
            ConditionVar::Month => Value::Number(self.ctx.date().month() as f64),
            ConditionVar::Season => {
                Value::String(season(self.ctx.date().month(), self.ctx.latitude()).to_string())
            }
        }
    }

    fn logical(&mut self, op: ConditionOp, left: &Node, right: &Node) -> Option<bool> {
        let l = self.eval_bool(left, op)?;
        match (op, l) {
            (ConditionOp::And, false) => Some(false),
            (ConditionOp::Or, true) => Some(true),
            _ => self.eval_bool(right, op),
        }
    }

    fn eval_bool(&mut self, node: &Node, op: ConditionOp) -> Option<bool> {
        match self.eval(node)? {
            Value::Boolean(b) => Some(b),
            other => self.fail(
                Error::runtime(format!("'{}' needs Boolean operands, got {}", op.symbol(), other.value_type()))
                    .at(node.pos),
            ),
        }
    }

    fn comparison(&mut self, op: ConditionOp, left: &Node, right: &Node, pos: Position) -> Option<Value> {
        let l = self.eval(left);
        let r = self.eval(right);
        let (l, r) = (l?, r?);

        let ordering = match (&l, &r) {
            (Value::Number(a), Value::Number(b)) | (Value::Duration(a), Value::Duration(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => {
                return match op {
                    ConditionOp::Eq => Some(Value::Boolean(a == b)),
                    ConditionOp::Ne => Some(Value::Boolean(a != b)),
                    _ => self.fail(Error::runtime("strings can only be compared with == or !=").at(pos)),
                };
            }
            _ => {
                return self.fail(
                    Error::runtime(format!("cannot compare {} with {}", l.value_type(), r.value_type())).at(pos),
                )
            }
        };
        let Some(ord) = ordering else {
            return self.fail(Error::runtime("comparison with an undefined number").at(pos));
        };

        let holds = match op {
            ConditionOp::Gt => ord.is_gt(),
            ConditionOp::Lt => ord.is_lt(),
            ConditionOp::Ge => ord.is_ge(),
            ConditionOp::Le => ord.is_le(),
            ConditionOp::Eq => ord.is_eq(),
            ConditionOp::Ne => ord.is_ne(),
            ConditionOp::And | ConditionOp::Or => {
                return self.fail(Error::runtime(format!("'{}' is not a comparison", op.symbol())).at(pos))
            }
        };
        Some(Value::Boolean(holds))
    }
}
