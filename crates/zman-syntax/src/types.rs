//! Static value categories of AST nodes.

use std::fmt;

use indexmap::IndexSet;

use crate::ast::{Base, BinaryOp, Node, NodeKind};
use crate::vocab::ConditionVar;

/// The category of value a node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Time,
    Duration,
    Number,
    Boolean,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Time => "Time",
            ValueType::Duration => "Duration",
            ValueType::Number => "Number",
            ValueType::Boolean => "Boolean",
            ValueType::String => "String",
        };
        f.write_str(s)
    }
}

/// Static type of a condition variable.
pub fn condition_var_type(var: ConditionVar) -> ValueType {
    match var {
        ConditionVar::Month => ValueType::Number,
        ConditionVar::Season => ValueType::String,
        ConditionVar::DayLength => ValueType::Duration,
        ConditionVar::Latitude | ConditionVar::Longitude | ConditionVar::Elevation => ValueType::Number,
    }
}

/// Result type of a binary operation, if the operand pair is a recognised one.
pub fn binary_result_type(op: BinaryOp, left: ValueType, right: ValueType) -> Option<ValueType> {
    use BinaryOp::*;
    use ValueType::*;
    match (op, left, right) {
        (Sub, Time, Time) => Some(Duration),
        (Add | Sub, Time, Duration) => Some(Time),
        (Add | Sub, Duration, Duration) => Some(Duration),
        (Mul, Duration, Number) | (Mul, Number, Duration) => Some(Duration),
        (Div, Duration, Number) => Some(Duration),
        (_, Number, Number) => Some(Number),
        _ => None,
    }
}

/// Static type of a node.
///
/// Pure and total. Binary operations on an unrecognised operand pair fall
/// back to the left operand's type; the validator and executor reject those
/// pairs separately.
pub fn value_type_of(node: &Node) -> ValueType {
    match &node.kind {
        NodeKind::Primitive(_) | NodeKind::Reference(_) | NodeKind::Function { .. } => ValueType::Time,
        NodeKind::Duration { .. } => ValueType::Duration,
        NodeKind::Number(_) => ValueType::Number,
        NodeKind::String(_) | NodeKind::Direction(_) | NodeKind::Base(_) => ValueType::String,
        NodeKind::Binary { op, left, right } => {
            let l = value_type_of(left);
            binary_result_type(*op, l, value_type_of(right)).unwrap_or(l)
        }
        NodeKind::Conditional { then_branch, .. } => value_type_of(then_branch),
        NodeKind::Condition { .. } => ValueType::Boolean,
        NodeKind::ConditionVar(v) => condition_var_type(*v),
    }
}

impl Node {
    pub fn value_type(&self) -> ValueType {
        value_type_of(self)
    }

    /// Keys of every `@reference` in this tree, in first-occurrence order.
    pub fn references(&self) -> IndexSet<String> {
        extract_references(self)
    }
}

/// Collects every referenced formula key in the tree.
pub fn extract_references(node: &Node) -> IndexSet<String> {
    let mut refs = IndexSet::new();
    collect_references(node, &mut refs);
    refs
}

fn collect_references(node: &Node, out: &mut IndexSet<String>) {
    match &node.kind {
        NodeKind::Reference(key) => {
            out.insert(key.clone());
        }
        NodeKind::Binary { left, right, .. } | NodeKind::Condition { left, right, .. } => {
            collect_references(left, out);
            collect_references(right, out);
        }
        NodeKind::Function { args, .. } | NodeKind::Base(Base::Custom(args)) => {
            for a in args {
                collect_references(a, out);
            }
        }
        NodeKind::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            collect_references(condition, out);
            collect_references(then_branch, out);
            if let Some(e) = else_branch {
                collect_references(e, out);
            }
        }
        NodeKind::Primitive(_)
        | NodeKind::Duration { .. }
        | NodeKind::Number(_)
        | NodeKind::String(_)
        | NodeKind::Direction(_)
        | NodeKind::Base(_)
        | NodeKind::ConditionVar(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Position;
    use crate::vocab::Primitive;

    fn at(kind: NodeKind) -> Node {
        Node::new(kind, Position::default())
    }

    fn time() -> Node {
        at(NodeKind::Primitive(Primitive::Sunrise))
    }

    fn dur() -> Node {
        at(NodeKind::Duration { minutes: 72.0, text: "72min".into() })
    }

    fn num() -> Node {
        at(NodeKind::Number(2.0))
    }

    #[test]
    fn binary_rules() {
        let cases = [
            (BinaryOp::Sub, time(), time(), ValueType::Time, ValueType::Duration),
            (BinaryOp::Add, time(), dur(), ValueType::Time, ValueType::Time),
            (BinaryOp::Sub, dur(), dur(), ValueType::Duration, ValueType::Duration),
            (BinaryOp::Mul, num(), dur(), ValueType::Number, ValueType::Duration),
            (BinaryOp::Div, dur(), num(), ValueType::Duration, ValueType::Duration),
            (BinaryOp::Div, num(), num(), ValueType::Number, ValueType::Number),
        ];
        for (op, l, r, lt, expected) in cases {
            assert_eq!(l.value_type(), lt);
            assert_eq!(Node::binary(op, l, r).value_type(), expected);
        }
    }

    #[test]
    fn unrecognised_pairs_fall_back_to_left() {
        assert_eq!(Node::binary(BinaryOp::Add, time(), time()).value_type(), ValueType::Time);
        assert_eq!(Node::binary(BinaryOp::Mul, dur(), dur()).value_type(), ValueType::Duration);
        assert_eq!(Node::binary(BinaryOp::Add, num(), time()).value_type(), ValueType::Number);
    }

    #[test]
    fn condition_vars_and_conditions() {
        assert_eq!(condition_var_type(ConditionVar::Month), ValueType::Number);
        assert_eq!(condition_var_type(ConditionVar::Season), ValueType::String);
        assert_eq!(condition_var_type(ConditionVar::DayLength), ValueType::Duration);
        assert_eq!(condition_var_type(ConditionVar::Elevation), ValueType::Number);
        let c = Node::condition(crate::ast::ConditionOp::Gt, num(), num());
        assert_eq!(c.value_type(), ValueType::Boolean);
    }

    #[test]
    fn references_walk_every_branch() {
        let r = |k: &str| at(NodeKind::Reference(k.into()));
        let tree = at(NodeKind::Conditional {
            condition: Box::new(Node::condition(crate::ast::ConditionOp::Eq, r("a"), num())),
            then_branch: Box::new(Node::binary(BinaryOp::Add, r("b"), dur())),
            else_branch: Some(Box::new(at(NodeKind::Function {
                name: crate::vocab::FunctionName::ProportionalHours,
                args: vec![num(), at(NodeKind::Base(Base::Custom(vec![r("c"), r("a")])))],
            }))),
        });
        let refs: Vec<_> = tree.references().into_iter().collect();
        assert_eq!(refs, vec!["a", "b", "c"]);
    }
}
