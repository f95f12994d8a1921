use zman_syntax::ast::{Base, BinaryOp, ConditionOp, Node, NodeKind};
use zman_syntax::error::{Error, ErrorList};
use zman_syntax::token::Position;
use zman_syntax::types::{condition_var_type, ValueType};
use zman_syntax::vocab::{ConditionVar, Direction, FunctionName};

/// How many available keys an undefined-reference hint lists.
const MAX_LISTED_KEYS: usize = 5;

pub struct Validator<'a> {
    keys: Vec<&'a str>,
    formula_key: Option<&'a str>,
    errors: Vec<Error>,
}

impl<'a> Validator<'a> {
    pub fn new<S: AsRef<str>>(available_keys: &'a [S]) -> Self {
        Self {
            keys: available_keys.iter().map(AsRef::as_ref).collect(),
            formula_key: None,
            errors: Vec::new(),
        }
    }

    /// Key of the formula being checked; references to it are rejected.
    pub fn with_formula_key(mut self, key: &'a str) -> Self {
        self.formula_key = Some(key);
        self
    }

    pub fn validate(mut self, ast: &Node) -> ErrorList {
        self.check(ast);
        let root = ast.value_type();
        if root != ValueType::Time {
            self.error(
                ast.pos,
                format!("formula must produce a Time, got {}", root),
                Some("a formula evaluates to a time of day, e.g. sunrise - 72min".into()),
            );
        }
        tracing::debug!(errors = self.errors.len(), "validated formula");
        ErrorList::from(self.errors)
    }

    fn error(&mut self, pos: Position, msg: String, suggestion: Option<String>) {
        let mut err = Error::semantic(msg).at(pos);
        if let Some(s) = suggestion {
            err = err.with_suggestion(s);
        }
        self.errors.push(err);
    }

    fn base_expected(&mut self, pos: Position) {
        self.error(
            pos,
            "proportional_hours() second argument must be a base".into(),
            Some("one of: gra, mga, mga_90, mga_120, custom(start, end)".into()),
        );
    }

    fn check(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Primitive(_)
            | NodeKind::Duration { .. }
            | NodeKind::Number(_)
            | NodeKind::String(_)
            | NodeKind::ConditionVar(_) => {}
            NodeKind::Direction(d) => self.error(
                node.pos,
                format!("direction '{}' can only be used as the second argument of solar()", d),
                None,
            ),
            NodeKind::Base(b) => self.error(
                node.pos,
                format!(
                    "base '{}' can only be used as the second argument of proportional_hours()",
                    b.name()
                ),
                None,
            ),
            NodeKind::Reference(key) => self.check_reference(key, node.pos),
            NodeKind::Function { name, args } => self.check_function(*name, args, node.pos),
            NodeKind::Binary { op, left, right } => {
                self.check(left);
                self.check(right);
                self.check_binary(*op, left, right, node.pos);
            }
            NodeKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check(condition);
                let ct = condition.value_type();
                if ct != ValueType::Boolean {
                    self.error(
                        condition.pos,
                        format!("condition must be a comparison, got {}", ct),
                        Some("compare a value, e.g. if (latitude > 40) { ... }".into()),
                    );
                }
                self.check(then_branch);
                if let Some(e) = else_branch {
                    self.check(e);
                    let (tt, et) = (then_branch.value_type(), e.value_type());
                    if tt != et {
                        self.error(
                            e.pos,
                            format!("if-branch produces {} but else-branch produces {}", tt, et),
                            Some("both branches must produce the same kind of value".into()),
                        );
                    }
                }
            }
            NodeKind::Condition { op, left, right } => {
                self.check(left);
                self.check(right);
                self.check_condition(*op, left, right, node.pos);
            }
        }
    }

    fn check_reference(&mut self, key: &str, pos: Position) {
        if self.formula_key == Some(key) {
            self.error(
                pos,
                format!("formula cannot reference itself (@{})", key),
                Some("reference another formula or use a primitive instead".into()),
            );
            return;
        }
        if !self.keys.is_empty() && !self.keys.contains(&key) {
            let mut listed = self.keys.iter().take(MAX_LISTED_KEYS).copied().collect::<Vec<_>>().join(", ");
            if self.keys.len() > MAX_LISTED_KEYS {
                listed.push_str(", ...");
            }
            self.error(
                pos,
                format!("undefined reference @{}", key),
                Some(format!("Available formulas: {}", listed)),
            );
        }
    }

    fn check_function(&mut self, name: FunctionName, args: &[Node], pos: Position) {
        if args.len() != 2 {
            self.error(
                pos,
                format!("{}() takes exactly 2 arguments, got {}", name, args.len()),
                Some(format!("Usage: {}", name.signature())),
            );
            for arg in args {
                if !matches!(arg.kind, NodeKind::Direction(_) | NodeKind::Base(_)) {
                    self.check(arg);
                }
            }
            return;
        }
        match name {
            FunctionName::Solar => {
                self.check_number_arg(name, "degrees", &args[0], (0.0, 90.0), "Common values: 16.1 (dawn), 8.5 (nightfall)");
                if !matches!(args[1].kind, NodeKind::Direction(_)) {
                    let names = Direction::ALL.iter().map(|d| d.name()).collect::<Vec<_>>().join(", ");
                    self.error(
                        args[1].pos,
                        "solar() second argument must be a direction".into(),
                        Some(format!("one of: {}", names)),
                    );
                    if !matches!(args[1].kind, NodeKind::Base(_)) {
                        self.check(&args[1]);
                    }
                }
            }
            FunctionName::ProportionalHours => {
                self.check_number_arg(name, "hours", &args[0], (0.5, 12.0), "a day has 12 proportional hours");
                match &args[1].kind {
                    NodeKind::Base(Base::Custom(bounds)) => self.check_custom_base(bounds, args[1].pos),
                    NodeKind::Base(_) => {}
                    NodeKind::Direction(_) => self.base_expected(args[1].pos),
                    _ => {
                        self.base_expected(args[1].pos);
                        self.check(&args[1]);
                    }
                }
            }
            FunctionName::Midpoint => {
                for (i, arg) in args.iter().enumerate() {
                    self.check(arg);
                    let t = arg.value_type();
                    if t != ValueType::Time {
                        self.error(arg.pos, format!("midpoint() argument {} must be a Time, got {}", i + 1, t), None);
                    }
                }
            }
        }
    }

    /// Literal arguments are range-checked; anything else is validated
    /// recursively and must at least be numeric.
    fn check_number_arg(&mut self, func: FunctionName, what: &str, arg: &Node, range: (f64, f64), hint: &str) {
        if let Some(n) = arg.as_number() {
            if n < range.0 || n > range.1 {
                self.error(
                    arg.pos,
                    format!("{}() {} must be between {} and {}, got {}", func, what, range.0, range.1, n),
                    Some(hint.to_string()),
                );
            }
            return;
        }
        self.check(arg);
        let t = arg.value_type();
        if t != ValueType::Number {
            self.error(arg.pos, format!("{}() {} must be a Number, got {}", func, what, t), None);
        }
    }

    fn check_custom_base(&mut self, bounds: &[Node], pos: Position) {
        if bounds.len() != 2 {
            self.error(
                pos,
                format!("custom base requires exactly 2 arguments: start and end, got {}", bounds.len()),
                Some("e.g. custom(sunrise - 72min, sunset + 72min)".into()),
            );
        }
        for (label, bound) in ["start", "end"].iter().zip(bounds) {
            self.check(bound);
            let t = bound.value_type();
            if t != ValueType::Time {
                self.error(bound.pos, format!("custom base {} must be a Time, got {}", label, t), None);
            }
        }
    }

    fn check_binary(&mut self, op: BinaryOp, left: &Node, right: &Node, pos: Position) {
        let (lt, rt) = (left.value_type(), right.value_type());
        let has_time = lt == ValueType::Time || rt == ValueType::Time;
        match op {
            BinaryOp::Add if lt == ValueType::Time && rt == ValueType::Time => self.error(
                pos,
                "cannot add two times".into(),
                Some("subtract times to get a duration (sunset - sunrise), or add a duration to a time (sunrise + 30min)".into()),
            ),
            BinaryOp::Mul | BinaryOp::Div if has_time => {
                let verb = if op == BinaryOp::Mul { "multiply" } else { "divide" };
                self.error(
                    pos,
                    format!("cannot {} a time", verb),
                    Some("scale a duration instead, e.g. (sunset - sunrise) / 12".into()),
                );
            }
            _ => {}
        }
    }

    fn check_condition(&mut self, op: ConditionOp, left: &Node, right: &Node, pos: Position) {
        let (lt, rt) = (left.value_type(), right.value_type());
        if op.is_logical() {
            for side in [left, right] {
                if side.value_type() != ValueType::Boolean {
                    self.error(side.pos, format!("'{}' needs a comparison on both sides", op.symbol()), None);
                }
            }
            return;
        }

        let before = self.errors.len();
        for (var_side, other) in [(left, right), (right, left)] {
            if let NodeKind::ConditionVar(var) = var_side.kind {
                let expected = condition_var_type(var);
                let got = other.value_type();
                if got != expected {
                    self.error(
                        other.pos,
                        format!("{} must be compared with a {}, got {}", var, expected, got),
                        Some(comparison_example(var).into()),
                    );
                }
            }
        }
        if self.errors.len() > before {
            return;
        }

        if lt != rt {
            self.error(pos, format!("cannot compare {} with {}", lt, rt), None);
        } else if lt == ValueType::String && !op.is_equality() {
            self.error(pos, "strings can only be compared with == or !=".into(), None);
        } else if matches!(lt, ValueType::Time | ValueType::Boolean) {
            self.error(pos, format!("{} values cannot be compared", lt), None);
        }
    }
}

fn comparison_example(var: ConditionVar) -> &'static str {
    match var {
        ConditionVar::Latitude => "e.g. latitude > 40",
        ConditionVar::Longitude => "e.g. longitude < 0",
        ConditionVar::Elevation => "e.g. elevation > 500",
        ConditionVar::DayLength => "e.g. day_length > 12h",
        ConditionVar::Month => "e.g. month == 12",
        ConditionVar::Season => "e.g. season == \"winter\"",
    }
}
