use std::sync::Arc;

use rstest::{fixture, rstest};
use stx_core::{Ast, ComparisonOp, Context, GroupTable, NodeId, Sequence, Value};

#[fixture]
fn ctx() -> Context {
    Context::new(Arc::new(GroupTable::new()))
}

fn numbers(ast: &mut Ast, items: &[f64]) -> NodeId {
    let seq: Sequence = items.iter().map(|n| Value::Number(*n)).collect();
    ast.value(seq)
}

fn compare(ctx: &mut Context, a: &[f64], op: ComparisonOp, b: &[f64]) -> bool {
    let mut ast = Ast::new();
    let left = numbers(&mut ast, a);
    let right = numbers(&mut ast, b);
    let cmp = ast.compare(op, left, right);
    let out = ast.evaluate(cmp, ctx, 0).unwrap();
    assert_eq!(out.len(), 1);
    out.to_boolean()
}

#[rstest]
#[case(&[1.0, 2.0], ComparisonOp::Eq, &[2.0, 3.0], true)]
#[case(&[1.0, 2.0], ComparisonOp::Ne, &[2.0, 3.0], true)]
#[case(&[1.0], ComparisonOp::Ne, &[1.0], false)]
#[case(&[1.0, 1.0], ComparisonOp::Ne, &[1.0], false)]
#[case(&[1.0, 5.0], ComparisonOp::Lt, &[2.0], true)]
#[case(&[3.0, 5.0], ComparisonOp::Lt, &[2.0], false)]
#[case(&[3.0], ComparisonOp::Ge, &[3.0], true)]
#[case(&[], ComparisonOp::Eq, &[1.0], false)]
#[case(&[], ComparisonOp::Ne, &[1.0], false)]
fn general_comparison_is_existential(
    mut ctx: Context,
    #[case] a: &[f64],
    #[case] op: ComparisonOp,
    #[case] b: &[f64],
    #[case] expected: bool,
) {
    assert_eq!(compare(&mut ctx, a, op, b), expected);
}

#[rstest]
#[case("abc", ComparisonOp::Lt, "abd", true)]
#[case("B", ComparisonOp::Lt, "a", true)]
#[case("10", ComparisonOp::Gt, "9", false)]
#[case("x", ComparisonOp::Eq, "x", true)]
fn strings_compare_by_codepoint(
    mut ctx: Context,
    #[case] a: &str,
    #[case] op: ComparisonOp,
    #[case] b: &str,
    #[case] expected: bool,
) {
    let mut ast = Ast::new();
    let left = ast.string(a);
    let right = ast.string(b);
    let cmp = ast.compare(op, left, right);
    assert_eq!(ast.evaluate(cmp, &mut ctx, 0).unwrap(), Sequence::one(expected));
}

#[rstest]
fn number_wins_over_string(mut ctx: Context) {
    let mut ast = Ast::new();
    let left = ast.number(10.0);
    let right = ast.string("9");
    let gt = ast.compare(ComparisonOp::Gt, left, right);
    assert_eq!(ast.evaluate(gt, &mut ctx, 0).unwrap(), Sequence::one(true));
}

#[rstest]
fn boolean_wins_over_number(mut ctx: Context) {
    let mut ast = Ast::new();
    let t = ast.value(Sequence::one(true));
    let two = ast.number(2.0);
    let eq = ast.compare(ComparisonOp::Eq, t, two);
    assert_eq!(ast.evaluate(eq, &mut ctx, 0).unwrap(), Sequence::one(true));
}
