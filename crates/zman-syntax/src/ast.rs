//! AST (abstract syntax tree) types for the formula language.
//!
//! The node set is closed: every stage matches on [`NodeKind`] exhaustively,
//! so adding a variant is a compile error until each stage handles it.
//! `Display` renders canonical formula text that parses back into an
//! equivalent tree.

use std::fmt;

use crate::token::Position;
use crate::vocab::{ConditionVar, Direction, FunctionName, Primitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
        }
    }
}

/// Comparators plus the logical connectives joining comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
}

impl ConditionOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ConditionOp::Gt => ">",
            ConditionOp::Lt => "<",
            ConditionOp::Ge => ">=",
            ConditionOp::Le => "<=",
            ConditionOp::Eq => "==",
            ConditionOp::Ne => "!=",
            ConditionOp::And => "&&",
            ConditionOp::Or => "||",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, ConditionOp::And | ConditionOp::Or)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, ConditionOp::Eq | ConditionOp::Ne)
    }
}

/// Day-span definitions for proportional hours.
#[derive(Debug, Clone, PartialEq)]
pub enum Base {
    /// Sunrise to sunset.
    Gra,
    /// 72 minutes before sunrise to 72 minutes after sunset.
    Mga,
    Mga90,
    Mga120,
    /// Explicit start and end; the validator requires exactly two Time args.
    Custom(Vec<Node>),
}

impl Base {
    pub fn name(&self) -> &'static str {
        match self {
            Base::Gra => "gra",
            Base::Mga => "mga",
            Base::Mga90 => "mga_90",
            Base::Mga120 => "mga_120",
            Base::Custom(_) => "custom",
        }
    }

    /// Minutes the span extends past sunrise and sunset; `None` for custom.
    pub fn offset_minutes(&self) -> Option<f64> {
        match self {
            Base::Gra => Some(0.0),
            Base::Mga => Some(72.0),
            Base::Mga90 => Some(90.0),
            Base::Mga120 => Some(120.0),
            Base::Custom(_) => None,
        }
    }

    /// Builds a named base; `custom` starts without arguments.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gra" => Some(Base::Gra),
            "mga" => Some(Base::Mga),
            "mga_90" => Some(Base::Mga90),
            "mga_120" => Some(Base::Mga120),
            "custom" => Some(Base::Custom(Vec::new())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Primitive(Primitive),
    Function {
        name: FunctionName,
        args: Vec<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// A duration in minutes; `text` is the literal as written.
    Duration {
        minutes: f64,
        text: String,
    },
    Number(f64),
    String(String),
    /// `@key`, naming another formula.
    Reference(String),
    Direction(Direction),
    Base(Base),
    Conditional {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    Condition {
        op: ConditionOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    ConditionVar(ConditionVar),
}

/// An AST node and the position of its first token.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: Position,
}

impl Node {
    pub fn new(kind: NodeKind, pos: Position) -> Self {
        Self { kind, pos }
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        let pos = left.pos;
        Self::new(
            NodeKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            pos,
        )
    }

    pub fn condition(op: ConditionOp, left: Node, right: Node) -> Self {
        let pos = left.pos;
        Self::new(
            NodeKind::Condition {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            pos,
        )
    }

    /// The value of a number literal, if this node is one.
    pub fn as_number(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Number(n) => Some(n),
            _ => None,
        }
    }

    fn needs_parens_under(&self, parent: BinaryOp, right_side: bool) -> bool {
        match &self.kind {
            NodeKind::Binary { op, .. } => {
                op.precedence() < parent.precedence()
                    || (right_side && op.precedence() == parent.precedence())
            }
            _ => false,
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, node: &Node, parent: BinaryOp, right: bool) -> fmt::Result {
    if node.needs_parens_under(parent, right) {
        write!(f, "({})", node)
    } else {
        write!(f, "{}", node)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Node]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", a)?;
    }
    Ok(())
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Base::Custom(args) => {
                f.write_str("custom(")?;
                write_args(f, args)?;
                f.write_str(")")
            }
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Primitive(p) => write!(f, "{}", p),
            NodeKind::Function { name, args } => {
                write!(f, "{}(", name)?;
                write_args(f, args)?;
                f.write_str(")")
            }
            NodeKind::Binary { op, left, right } => {
                write_operand(f, left, *op, false)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, *op, true)
            }
            NodeKind::Duration { text, .. } => f.write_str(text),
            NodeKind::Number(n) => write!(f, "{}", n),
            NodeKind::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            NodeKind::Reference(key) => write!(f, "@{}", key),
            NodeKind::Direction(d) => write!(f, "{}", d),
            NodeKind::Base(b) => write!(f, "{}", b),
            NodeKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                write!(f, "if ({}) {{ {} }}", condition, then_branch)?;
                match else_branch.as_deref() {
                    Some(e) if matches!(e.kind, NodeKind::Conditional { .. }) => write!(f, " else {}", e),
                    Some(e) => write!(f, " else {{ {} }}", e),
                    None => Ok(()),
                }
            }
            NodeKind::Condition { op, left, right } => {
                let wrap = |n: &Node| {
                    *op == ConditionOp::And
                        && matches!(n.kind, NodeKind::Condition { op: ConditionOp::Or, .. })
                };
                if wrap(left) {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, " {} ", op.symbol())?;
                if wrap(right) {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
            NodeKind::ConditionVar(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(kind: NodeKind) -> Node {
        Node::new(kind, Position::default())
    }

    fn dur(text: &str, minutes: f64) -> Node {
        at(NodeKind::Duration { minutes, text: text.into() })
    }

    #[test]
    fn binary_display_respects_precedence() {
        let sunrise = at(NodeKind::Primitive(Primitive::Sunrise));
        let sunset = at(NodeKind::Primitive(Primitive::Sunset));
        let span = Node::binary(BinaryOp::Sub, sunset, sunrise.clone());
        let scaled = Node::binary(BinaryOp::Div, span, at(NodeKind::Number(12.0)));
        assert_eq!(scaled.to_string(), "(sunset - sunrise) / 12");

        let nested = Node::binary(
            BinaryOp::Sub,
            sunrise,
            Node::binary(BinaryOp::Add, dur("72min", 72.0), dur("1h", 60.0)),
        );
        assert_eq!(nested.to_string(), "sunrise - (72min + 1h)");
    }

    #[test]
    fn conditional_display_chains_else_if() {
        let cond = Node::condition(
            ConditionOp::Gt,
            at(NodeKind::ConditionVar(ConditionVar::Latitude)),
            at(NodeKind::Number(30.0)),
        );
        let inner = at(NodeKind::Conditional {
            condition: Box::new(cond.clone()),
            then_branch: Box::new(dur("1h", 60.0)),
            else_branch: Some(Box::new(dur("2h", 120.0))),
        });
        let outer = at(NodeKind::Conditional {
            condition: Box::new(cond),
            then_branch: Box::new(dur("30min", 30.0)),
            else_branch: Some(Box::new(inner)),
        });
        assert_eq!(
            outer.to_string(),
            "if (latitude > 30) { 30min } else if (latitude > 30) { 1h } else { 2h }"
        );
    }

    #[test]
    fn literals_display() {
        assert_eq!(at(NodeKind::Number(16.1)).to_string(), "16.1");
        assert_eq!(at(NodeKind::String("a\"b".into())).to_string(), "\"a\\\"b\"");
        assert_eq!(at(NodeKind::Reference("alos".into())).to_string(), "@alos");
        let custom = at(NodeKind::Base(Base::Custom(vec![
            at(NodeKind::Primitive(Primitive::Sunrise)),
            at(NodeKind::Primitive(Primitive::Sunset)),
        ])));
        assert_eq!(custom.to_string(), "custom(sunrise, sunset)");
    }
}
