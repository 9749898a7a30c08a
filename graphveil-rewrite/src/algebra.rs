//! Filter normalization algebra.
//!
//! Merges a chain of filters on one variable into a single minimal
//! filter, or detects that their conjunction is unsatisfiable. The fold
//! is left-to-right in insertion order; each step combines the
//! accumulator with the next filter by dispatching on the pair of root
//! operators, over the eight simple shapes `=`, `!=`, `<`, `<=`, `>`,
//! `>=`, `IN`, `NOT IN`.
//!
//! A compound operand (root `&&`, `||`, `!`, or any non-simple shape)
//! is conjoined with `&&` rather than analyzed. The same fallback
//! applies when two values cannot be ordered (distinct IRIs, an
//! unparsable date): conjunction is always sound and never widens.
//!
//! Normalization rules applied to every step result:
//! a singleton `IN {x}` collapses to `= x`, a singleton `NOT IN {x}` to
//! `!= x`, an empty `IN` is the contradiction, and an empty `NOT IN`
//! disappears.

use std::cmp::Ordering;

use graphveil_core::{NodeValue, Var};
use graphveil_sparql::ast::{BinaryOp, Expression, Filter};

/// Result of merging a filter chain.
#[derive(Clone, Debug, PartialEq)]
pub enum Combined {
    /// The merged filter expression
    Expr(Expression),
    /// The chain is unsatisfiable
    Contradiction,
}

/// Merge a non-empty chain of filters on a single variable, left to
/// right.
pub fn combine(filters: &[Filter]) -> Combined {
    let mut acc = filters[0].expr.clone();
    for next in &filters[1..] {
        match step(acc, &next.expr) {
            Some(merged) => acc = merged,
            None => return Combined::Contradiction,
        }
    }
    Combined::Expr(acc)
}

/// One fold step; `None` is the contradiction.
fn step(acc: Expression, next: &Expression) -> Option<Expression> {
    let (Some(a), Some(b)) = (as_simple(&acc), as_simple(next)) else {
        return Some(Expression::and(acc, next.clone()));
    };

    match combine_pair(&a, &b) {
        Pair::Expr(expr) => Some(expr),
        Pair::Bottom => None,
        Pair::Conjoin => Some(Expression::and(acc, next.clone())),
    }
}

/// The eight simple operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SimpleOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
}

/// A simple filter: `var op value` or `var [NOT] IN (values)`.
struct Simple {
    op: SimpleOp,
    var: Var,
    values: Vec<NodeValue>,
}

impl Simple {
    fn value(&self) -> &NodeValue {
        &self.values[0]
    }
}

/// Outcome of combining one pair.
enum Pair {
    Expr(Expression),
    Bottom,
    Conjoin,
}

/// Recognize a simple filter shape.
fn as_simple(expr: &Expression) -> Option<Simple> {
    match expr {
        Expression::Binary { op, left, right } if op.is_comparison() => {
            let Expression::Var(var) = left.as_ref() else {
                return None;
            };
            let Expression::Value(value) = right.as_ref() else {
                return None;
            };
            let op = match op {
                BinaryOp::Eq => SimpleOp::Eq,
                BinaryOp::Ne => SimpleOp::Ne,
                BinaryOp::Lt => SimpleOp::Lt,
                BinaryOp::Le => SimpleOp::Le,
                BinaryOp::Gt => SimpleOp::Gt,
                BinaryOp::Ge => SimpleOp::Ge,
                BinaryOp::And | BinaryOp::Or => return None,
            };
            Some(Simple {
                op,
                var: var.clone(),
                values: vec![value.clone()],
            })
        }
        Expression::In {
            expr,
            list,
            negated,
        } => {
            let Expression::Var(var) = expr.as_ref() else {
                return None;
            };
            let mut values = Vec::new();
            for element in list {
                let Expression::Value(value) = element else {
                    return None;
                };
                values.push(value.clone());
            }
            Some(Simple {
                op: if *negated { SimpleOp::NotIn } else { SimpleOp::In },
                var: var.clone(),
                values,
            })
        }
        _ => None,
    }
}

/// Whether `value` satisfies the simple constraint. `None` when the
/// required ordering does not exist.
fn satisfies(value: &NodeValue, constraint: &Simple) -> Option<bool> {
    match constraint.op {
        SimpleOp::Eq => Some(value.same_value(constraint.value())),
        SimpleOp::Ne => Some(!value.same_value(constraint.value())),
        SimpleOp::Lt => value
            .compare(constraint.value())
            .map(|o| o == Ordering::Less),
        SimpleOp::Le => value
            .compare(constraint.value())
            .map(|o| o != Ordering::Greater),
        SimpleOp::Gt => value
            .compare(constraint.value())
            .map(|o| o == Ordering::Greater),
        SimpleOp::Ge => value
            .compare(constraint.value())
            .map(|o| o != Ordering::Less),
        SimpleOp::In => Some(constraint.values.iter().any(|x| value.same_value(x))),
        SimpleOp::NotIn => Some(!constraint.values.iter().any(|x| value.same_value(x))),
    }
}

fn cmp_expr(op: BinaryOp, var: &Var, value: &NodeValue) -> Expression {
    Expression::compare(op, var.clone(), value.clone())
}

/// `IN` result with collapse rules: empty is the contradiction, a
/// singleton becomes `=`.
fn in_result(var: &Var, values: Vec<NodeValue>) -> Pair {
    match values.len() {
        0 => Pair::Bottom,
        1 => Pair::Expr(cmp_expr(BinaryOp::Eq, var, &values[0])),
        _ => Pair::Expr(Expression::in_list(
            Expression::Var(var.clone()),
            values,
            false,
        )),
    }
}

/// `NOT IN` over a non-empty set, collapsing a singleton to `!=`.
fn not_in_expr(var: &Var, values: Vec<NodeValue>) -> Expression {
    if values.len() == 1 {
        cmp_expr(BinaryOp::Ne, var, &values[0])
    } else {
        Expression::in_list(Expression::Var(var.clone()), values, true)
    }
}

/// A range bound conjoined with the leftover `NOT IN` exclusions (those
/// inside the range); an empty exclusion set disappears.
fn bound_with_exclusions(base: Expression, var: &Var, exclusions: Vec<NodeValue>) -> Pair {
    if exclusions.is_empty() {
        Pair::Expr(base)
    } else {
        Pair::Expr(Expression::and(base, not_in_expr(var, exclusions)))
    }
}

/// Dispatch on the `(acc, next)` operator pair.
fn combine_pair(a: &Simple, b: &Simple) -> Pair {
    use SimpleOp::*;
    let v = &a.var;

    // An equality on either side reduces to a satisfiability test of the
    // pinned value against the other constraint
    if a.op == Eq {
        return match satisfies(a.value(), b) {
            Some(true) => Pair::Expr(cmp_expr(BinaryOp::Eq, v, a.value())),
            Some(false) => Pair::Bottom,
            None => Pair::Conjoin,
        };
    }
    if b.op == Eq {
        return match satisfies(b.value(), a) {
            Some(true) => Pair::Expr(cmp_expr(BinaryOp::Eq, v, b.value())),
            Some(false) => Pair::Bottom,
            None => Pair::Conjoin,
        };
    }

    // An IN on either side filters its members by the other constraint
    if a.op == In {
        let kept: Vec<NodeValue> = a
            .values
            .iter()
            .filter(|x| satisfies(x, b) == Some(true))
            .cloned()
            .collect();
        return in_result(v, kept);
    }
    if b.op == In {
        let kept: Vec<NodeValue> = b
            .values
            .iter()
            .filter(|x| satisfies(x, a) == Some(true))
            .cloned()
            .collect();
        return in_result(v, kept);
    }

    match (a.op, b.op) {
        (Ne, Ne) => {
            if a.value().same_value(b.value()) {
                Pair::Expr(cmp_expr(BinaryOp::Ne, v, a.value()))
            } else {
                Pair::Expr(not_in_expr(v, vec![a.value().clone(), b.value().clone()]))
            }
        }

        // != against a range: the exclusion is subsumed when it falls
        // outside the range, tightens a closed bound when it sits on it,
        // and otherwise must be conjoined
        (Ne, Lt) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) | Some(Ordering::Equal) => {
                Pair::Expr(cmp_expr(BinaryOp::Lt, v, b.value()))
            }
            _ => Pair::Conjoin,
        },
        (Ne, Le) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) => Pair::Expr(cmp_expr(BinaryOp::Le, v, b.value())),
            Some(Ordering::Equal) => Pair::Expr(cmp_expr(BinaryOp::Lt, v, b.value())),
            _ => Pair::Conjoin,
        },
        (Ne, Gt) => match a.value().compare(b.value()) {
            Some(Ordering::Less) | Some(Ordering::Equal) => {
                Pair::Expr(cmp_expr(BinaryOp::Gt, v, b.value()))
            }
            _ => Pair::Conjoin,
        },
        (Ne, Ge) => match a.value().compare(b.value()) {
            Some(Ordering::Less) => Pair::Expr(cmp_expr(BinaryOp::Ge, v, b.value())),
            Some(Ordering::Equal) => Pair::Expr(cmp_expr(BinaryOp::Gt, v, b.value())),
            _ => Pair::Conjoin,
        },
        (Ne, NotIn) => {
            let mut values = b.values.clone();
            if !values.iter().any(|x| x.same_value(a.value())) {
                values.push(a.value().clone());
            }
            Pair::Expr(not_in_expr(v, values))
        }

        // Mirrors of the above with the range on the left
        (Lt, Ne) => match a.value().compare(b.value()) {
            Some(Ordering::Less) | Some(Ordering::Equal) => {
                Pair::Expr(cmp_expr(BinaryOp::Lt, v, a.value()))
            }
            _ => Pair::Conjoin,
        },
        (Le, Ne) => match a.value().compare(b.value()) {
            Some(Ordering::Less) => Pair::Expr(cmp_expr(BinaryOp::Le, v, a.value())),
            Some(Ordering::Equal) => Pair::Expr(cmp_expr(BinaryOp::Lt, v, a.value())),
            _ => Pair::Conjoin,
        },
        (Gt, Ne) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) | Some(Ordering::Equal) => {
                Pair::Expr(cmp_expr(BinaryOp::Gt, v, a.value()))
            }
            _ => Pair::Conjoin,
        },
        (Ge, Ne) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) => Pair::Expr(cmp_expr(BinaryOp::Ge, v, a.value())),
            Some(Ordering::Equal) => Pair::Expr(cmp_expr(BinaryOp::Gt, v, a.value())),
            _ => Pair::Conjoin,
        },

        // Two upper bounds keep the tighter one
        (Lt, Lt) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) => Pair::Expr(cmp_expr(BinaryOp::Lt, v, b.value())),
            Some(_) => Pair::Expr(cmp_expr(BinaryOp::Lt, v, a.value())),
            None => Pair::Conjoin,
        },
        (Lt, Le) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) => Pair::Expr(cmp_expr(BinaryOp::Le, v, b.value())),
            Some(_) => Pair::Expr(cmp_expr(BinaryOp::Lt, v, a.value())),
            None => Pair::Conjoin,
        },
        (Le, Lt) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) | Some(Ordering::Equal) => {
                Pair::Expr(cmp_expr(BinaryOp::Lt, v, b.value()))
            }
            Some(Ordering::Less) => Pair::Expr(cmp_expr(BinaryOp::Le, v, a.value())),
            None => Pair::Conjoin,
        },
        (Le, Le) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) => Pair::Expr(cmp_expr(BinaryOp::Le, v, b.value())),
            Some(_) => Pair::Expr(cmp_expr(BinaryOp::Le, v, a.value())),
            None => Pair::Conjoin,
        },

        // Two lower bounds keep the tighter one
        (Gt, Gt) => match a.value().compare(b.value()) {
            Some(Ordering::Less) => Pair::Expr(cmp_expr(BinaryOp::Gt, v, b.value())),
            Some(_) => Pair::Expr(cmp_expr(BinaryOp::Gt, v, a.value())),
            None => Pair::Conjoin,
        },
        (Gt, Ge) => match a.value().compare(b.value()) {
            Some(Ordering::Less) => Pair::Expr(cmp_expr(BinaryOp::Ge, v, b.value())),
            Some(_) => Pair::Expr(cmp_expr(BinaryOp::Gt, v, a.value())),
            None => Pair::Conjoin,
        },
        (Ge, Gt) => match a.value().compare(b.value()) {
            Some(Ordering::Less) | Some(Ordering::Equal) => {
                Pair::Expr(cmp_expr(BinaryOp::Gt, v, b.value()))
            }
            Some(Ordering::Greater) => Pair::Expr(cmp_expr(BinaryOp::Ge, v, a.value())),
            None => Pair::Conjoin,
        },
        (Ge, Ge) => match a.value().compare(b.value()) {
            Some(Ordering::Less) => Pair::Expr(cmp_expr(BinaryOp::Ge, v, b.value())),
            Some(_) => Pair::Expr(cmp_expr(BinaryOp::Ge, v, a.value())),
            None => Pair::Conjoin,
        },

        // Opposite bounds: a non-empty open interval stays a
        // conjunction; an empty one is the contradiction
        (Lt, Gt) | (Lt, Ge) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) => Pair::Conjoin,
            Some(_) => Pair::Bottom,
            None => Pair::Conjoin,
        },
        (Le, Gt) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) => Pair::Conjoin,
            Some(_) => Pair::Bottom,
            None => Pair::Conjoin,
        },
        (Le, Ge) => match a.value().compare(b.value()) {
            Some(Ordering::Greater) => Pair::Conjoin,
            Some(Ordering::Equal) => Pair::Expr(cmp_expr(BinaryOp::Eq, v, a.value())),
            Some(Ordering::Less) => Pair::Bottom,
            None => Pair::Conjoin,
        },
        (Gt, Lt) | (Gt, Le) => match a.value().compare(b.value()) {
            Some(Ordering::Less) => Pair::Conjoin,
            Some(_) => Pair::Bottom,
            None => Pair::Conjoin,
        },
        (Ge, Lt) => match a.value().compare(b.value()) {
            Some(Ordering::Less) => Pair::Conjoin,
            Some(_) => Pair::Bottom,
            None => Pair::Conjoin,
        },
        (Ge, Le) => match a.value().compare(b.value()) {
            Some(Ordering::Less) => Pair::Conjoin,
            Some(Ordering::Equal) => Pair::Expr(cmp_expr(BinaryOp::Eq, v, a.value())),
            Some(Ordering::Greater) => Pair::Bottom,
            None => Pair::Conjoin,
        },

        // A range against NOT IN: keep the bound (tightened when a
        // closed bound sits on an excluded value) plus the exclusions
        // that still fall inside the range
        (Lt, NotIn) => {
            let kept = inside(&b.values, a);
            bound_with_exclusions(cmp_expr(BinaryOp::Lt, v, a.value()), v, kept)
        }
        (Le, NotIn) => {
            let base = if b.values.iter().any(|x| x.same_value(a.value())) {
                cmp_expr(BinaryOp::Lt, v, a.value())
            } else {
                cmp_expr(BinaryOp::Le, v, a.value())
            };
            let kept = strictly_inside(&b.values, a.value(), Ordering::Less);
            bound_with_exclusions(base, v, kept)
        }
        (Gt, NotIn) => {
            let kept = inside(&b.values, a);
            bound_with_exclusions(cmp_expr(BinaryOp::Gt, v, a.value()), v, kept)
        }
        (Ge, NotIn) => {
            let base = if b.values.iter().any(|x| x.same_value(a.value())) {
                cmp_expr(BinaryOp::Gt, v, a.value())
            } else {
                cmp_expr(BinaryOp::Ge, v, a.value())
            };
            let kept = strictly_inside(&b.values, a.value(), Ordering::Greater);
            bound_with_exclusions(base, v, kept)
        }
        (NotIn, Ne) => {
            let mut values = a.values.clone();
            if !values.iter().any(|x| x.same_value(b.value())) {
                values.push(b.value().clone());
            }
            Pair::Expr(not_in_expr(v, values))
        }
        (NotIn, Lt) => {
            let kept = inside(&a.values, b);
            bound_with_exclusions(cmp_expr(BinaryOp::Lt, v, b.value()), v, kept)
        }
        (NotIn, Le) => {
            let base = if a.values.iter().any(|x| x.same_value(b.value())) {
                cmp_expr(BinaryOp::Lt, v, b.value())
            } else {
                cmp_expr(BinaryOp::Le, v, b.value())
            };
            let kept = strictly_inside(&a.values, b.value(), Ordering::Less);
            bound_with_exclusions(base, v, kept)
        }
        (NotIn, Gt) => {
            let kept = inside(&a.values, b);
            bound_with_exclusions(cmp_expr(BinaryOp::Gt, v, b.value()), v, kept)
        }
        (NotIn, Ge) => {
            let base = if a.values.iter().any(|x| x.same_value(b.value())) {
                cmp_expr(BinaryOp::Gt, v, b.value())
            } else {
                cmp_expr(BinaryOp::Ge, v, b.value())
            };
            let kept = strictly_inside(&a.values, b.value(), Ordering::Greater);
            bound_with_exclusions(base, v, kept)
        }
        (NotIn, NotIn) => {
            let mut values = a.values.clone();
            for value in &b.values {
                if !values.iter().any(|x| x.same_value(value)) {
                    values.push(value.clone());
                }
            }
            Pair::Expr(not_in_expr(v, values))
        }

        // Eq and In were handled above
        _ => Pair::Conjoin,
    }
}

/// Excluded values that satisfy the range constraint (the others are
/// already outside it).
fn inside(values: &[NodeValue], range: &Simple) -> Vec<NodeValue> {
    values
        .iter()
        .filter(|x| satisfies(x, range) == Some(true))
        .cloned()
        .collect()
}

/// Excluded values strictly on the given side of the bound.
fn strictly_inside(values: &[NodeValue], bound: &NodeValue, side: Ordering) -> Vec<NodeValue> {
    values
        .iter()
        .filter(|x| x.compare(bound) == Some(side))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphveil_sparql::ast::Filter;

    fn v() -> Var {
        Var::new("v")
    }

    fn int(n: i64) -> NodeValue {
        NodeValue::integer(n.to_string())
    }

    fn f(op: BinaryOp, n: i64) -> Filter {
        Filter::new(Expression::compare(op, v(), int(n)))
    }

    fn f_in(values: &[i64], negated: bool) -> Filter {
        Filter::new(Expression::in_list(
            Expression::Var(v()),
            values.iter().map(|n| int(*n)).collect(),
            negated,
        ))
    }

    #[test]
    fn test_eq_eq_contradiction() {
        assert_eq!(
            combine(&[f(BinaryOp::Eq, 1), f(BinaryOp::Eq, 2)]),
            Combined::Contradiction
        );
        assert_eq!(
            combine(&[f(BinaryOp::Eq, 1), f(BinaryOp::Eq, 1)]),
            Combined::Expr(Expression::compare(BinaryOp::Eq, v(), int(1)))
        );
    }

    #[test]
    fn test_ge_then_eq_tightens() {
        // The equality survives when it satisfies the bound
        assert_eq!(
            combine(&[f(BinaryOp::Ge, 10), f(BinaryOp::Eq, 20)]),
            Combined::Expr(Expression::compare(BinaryOp::Eq, v(), int(20)))
        );
    }

    #[test]
    fn test_gt_lt_contradiction() {
        // Disjoint bounds leave nothing
        assert_eq!(
            combine(&[f(BinaryOp::Gt, 100), f(BinaryOp::Lt, 50)]),
            Combined::Contradiction
        );
    }

    #[test]
    fn test_gt_lt_interval() {
        assert_eq!(
            combine(&[f(BinaryOp::Gt, 1), f(BinaryOp::Lt, 5)]),
            Combined::Expr(Expression::and(
                Expression::compare(BinaryOp::Gt, v(), int(1)),
                Expression::compare(BinaryOp::Lt, v(), int(5)),
            ))
        );
    }

    #[test]
    fn test_le_ge_equal_collapses_to_eq() {
        assert_eq!(
            combine(&[f(BinaryOp::Le, 3), f(BinaryOp::Ge, 3)]),
            Combined::Expr(Expression::compare(BinaryOp::Eq, v(), int(3)))
        );
    }

    #[test]
    fn test_ne_ne_becomes_not_in() {
        assert_eq!(
            combine(&[f(BinaryOp::Ne, 1), f(BinaryOp::Ne, 2)]),
            Combined::Expr(Expression::in_list(
                Expression::Var(v()),
                vec![int(1), int(2)],
                true,
            ))
        );
    }

    #[test]
    fn test_in_filtered_by_range() {
        // IN (1,2,5,9) with < 5 keeps 1 and 2
        assert_eq!(
            combine(&[f_in(&[1, 2, 5, 9], false), f(BinaryOp::Lt, 5)]),
            Combined::Expr(Expression::in_list(
                Expression::Var(v()),
                vec![int(1), int(2)],
                false,
            ))
        );
    }

    #[test]
    fn test_in_singleton_collapses() {
        assert_eq!(
            combine(&[f_in(&[1, 7], false), f(BinaryOp::Gt, 5)]),
            Combined::Expr(Expression::compare(BinaryOp::Eq, v(), int(7)))
        );
    }

    #[test]
    fn test_in_emptied_is_contradiction() {
        assert_eq!(
            combine(&[f_in(&[1, 2], false), f(BinaryOp::Gt, 5)]),
            Combined::Contradiction
        );
    }

    #[test]
    fn test_in_in_intersection() {
        assert_eq!(
            combine(&[f_in(&[1, 2, 3], false), f_in(&[2, 3, 4], false)]),
            Combined::Expr(Expression::in_list(
                Expression::Var(v()),
                vec![int(2), int(3)],
                false,
            ))
        );
    }

    #[test]
    fn test_not_in_union() {
        assert_eq!(
            combine(&[f_in(&[1, 2], true), f_in(&[2, 3], true)]),
            Combined::Expr(Expression::in_list(
                Expression::Var(v()),
                vec![int(1), int(2), int(3)],
                true,
            ))
        );
    }

    #[test]
    fn test_not_in_then_in_difference() {
        assert_eq!(
            combine(&[f_in(&[1, 2], true), f_in(&[2, 3], false)]),
            Combined::Expr(Expression::compare(BinaryOp::Eq, v(), int(3)))
        );
    }

    #[test]
    fn test_ge_not_in_on_bound_opens_interval() {
        // >= 5 with NOT IN (5) becomes > 5
        assert_eq!(
            combine(&[f(BinaryOp::Ge, 5), f_in(&[5], true)]),
            Combined::Expr(Expression::compare(BinaryOp::Gt, v(), int(5)))
        );
    }

    #[test]
    fn test_gt_not_in_keeps_inside_exclusions() {
        // > 1 with NOT IN (0, 3) keeps the bound and excludes 3
        assert_eq!(
            combine(&[f(BinaryOp::Gt, 1), f_in(&[0, 3], true)]),
            Combined::Expr(Expression::and(
                Expression::compare(BinaryOp::Gt, v(), int(1)),
                Expression::compare(BinaryOp::Ne, v(), int(3)),
            ))
        );
    }

    #[test]
    fn test_compound_operand_conjoins() {
        let compound = Filter::new(Expression::and(
            Expression::compare(BinaryOp::Gt, v(), int(1)),
            Expression::compare(BinaryOp::Lt, v(), int(9)),
        ));
        let result = combine(&[compound.clone(), f(BinaryOp::Ne, 5)]);
        assert_eq!(
            result,
            Combined::Expr(Expression::and(
                compound.expr,
                Expression::compare(BinaryOp::Ne, v(), int(5)),
            ))
        );
    }

    #[test]
    fn test_incomparable_dates_conjoin() {
        let good = Filter::new(Expression::compare(
            BinaryOp::Lt,
            v(),
            NodeValue::date("2020-01-01"),
        ));
        let bad = Filter::new(Expression::compare(
            BinaryOp::Gt,
            v(),
            NodeValue::date("not-a-date"),
        ));
        assert_eq!(
            combine(&[good.clone(), bad.clone()]),
            Combined::Expr(Expression::and(good.expr, bad.expr))
        );
    }

    /// For every operator pair and a grid of values, the merged
    /// filter has exactly the solution set of the conjunction over a
    /// small integer domain; a contradiction means the conjunction is
    /// empty.
    #[test]
    fn test_pairwise_solution_sets() {
        let domain: Vec<i64> = (0..=6).collect();
        let scalars: Vec<i64> = vec![1, 3, 5];
        let sets: Vec<Vec<i64>> = vec![vec![1], vec![1, 3], vec![3, 5], vec![0, 2, 4, 6]];

        let mut cases: Vec<(Filter, Box<dyn Fn(i64) -> bool>)> = Vec::new();
        for &n in &scalars {
            cases.push((f(BinaryOp::Eq, n), Box::new(move |x| x == n)));
            cases.push((f(BinaryOp::Ne, n), Box::new(move |x| x != n)));
            cases.push((f(BinaryOp::Lt, n), Box::new(move |x| x < n)));
            cases.push((f(BinaryOp::Le, n), Box::new(move |x| x <= n)));
            cases.push((f(BinaryOp::Gt, n), Box::new(move |x| x > n)));
            cases.push((f(BinaryOp::Ge, n), Box::new(move |x| x >= n)));
        }
        for set in &sets {
            let owned = set.clone();
            cases.push((f_in(set, false), Box::new(move |x| owned.contains(&x))));
            let owned = set.clone();
            cases.push((f_in(set, true), Box::new(move |x| !owned.contains(&x))));
        }

        for (left, sat_left) in &cases {
            for (right, sat_right) in &cases {
                let merged = combine(&[left.clone(), right.clone()]);
                for &x in &domain {
                    let expected = sat_left(x) && sat_right(x);
                    let actual = match &merged {
                        Combined::Contradiction => false,
                        Combined::Expr(expr) => eval(expr, x),
                    };
                    assert_eq!(
                        actual, expected,
                        "x={x}, left={left}, right={right}, merged={merged:?}"
                    );
                }
            }
        }
    }

    /// Minimal evaluator for merged expressions over one integer.
    fn eval(expr: &Expression, x: i64) -> bool {
        match expr {
            Expression::Binary { op, left, right } => match op {
                BinaryOp::And => eval(left, x) && eval(right, x),
                BinaryOp::Or => eval(left, x) || eval(right, x),
                _ => {
                    let value = expr_value(right);
                    match op {
                        BinaryOp::Eq => x == value,
                        BinaryOp::Ne => x != value,
                        BinaryOp::Lt => x < value,
                        BinaryOp::Le => x <= value,
                        BinaryOp::Gt => x > value,
                        BinaryOp::Ge => x >= value,
                        BinaryOp::And | BinaryOp::Or => unreachable!(),
                    }
                }
            },
            Expression::Not(inner) => !eval(inner, x),
            Expression::In { list, negated, .. } => {
                let contained = list.iter().any(|e| expr_value(e) == x);
                contained != *negated
            }
            other => panic!("unexpected merged expression: {other}"),
        }
    }

    fn expr_value(expr: &Expression) -> i64 {
        match expr {
            Expression::Value(value) => value.lexical().parse().unwrap(),
            other => panic!("expected a constant, got {other}"),
        }
    }
}
