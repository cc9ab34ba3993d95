use std::sync::Arc;

use rstest::{fixture, rstest};
use stx_core::{
    ArithOp, Ast, ComparisonOp, Context, CopyMap, Event, ExpandedName, GroupTable, NodeId, Sequence, TreeKind,
};

fn q(local: &str) -> ExpandedName {
    ExpandedName::local(local)
}

#[fixture]
fn ctx() -> Context {
    let mut ctx = Context::new(Arc::new(GroupTable::new()));
    ctx.push(Event::document());
    ctx.push(Event::element(q("a")).with_attribute(q("n"), "4"));
    ctx
}

/// `concat('n=', string(@n * 2 + 1))`
fn sample(ast: &mut Ast) -> NodeId {
    let lit = ast.string("n=");
    let n = ast.attr(q("n"));
    let two = ast.number(2.0);
    let one = ast.number(1.0);
    let mul = ast.arith(ArithOp::Mul, n, two);
    let add = ast.arith(ArithOp::Add, mul, one);
    let s = ast.call(q("string"), &[add]);
    ast.call(q("concat"), &[lit, s])
}

#[rstest]
fn literal_only_subtrees_are_constant() {
    let mut ast = Ast::new();
    let a = ast.number(1.0);
    let b = ast.string("2");
    let sum = ast.arith(ArithOp::Add, a, b);
    let cmp = ast.compare(ComparisonOp::Lt, sum, a);
    let call = ast.call(q("concat"), &[b, b]);
    assert!(ast.is_constant(sum));
    assert!(ast.is_constant(cmp));
    assert!(ast.is_constant(call));

    let var = ast.var(q("v"));
    let with_var = ast.arith(ArithOp::Add, a, var);
    assert!(!ast.is_constant(with_var));

    let dot = ast.context_item();
    let step = ast.child(dot, a);
    assert!(!ast.is_constant(step));

    let pos = ast.call(q("position"), &[]);
    assert!(!ast.is_constant(pos));
    let unknown = ast.call(q("nope"), &[a]);
    assert!(!ast.is_constant(unknown));
}

#[rstest]
fn copies_evaluate_like_their_original(mut ctx: Context) {
    let mut ast = Ast::new();
    let expr = sample(&mut ast);
    let before = ast.len();
    let mut map = CopyMap::new();
    let copy = ast.deep_copy(expr, &mut map);

    assert_ne!(copy, expr);
    assert_eq!(ast.len(), before * 2);
    assert_eq!(ast.evaluate(expr, &mut ctx, 2).unwrap(), Sequence::one("n=9"));
    assert_eq!(ast.evaluate(copy, &mut ctx, 2).unwrap(), ast.evaluate(expr, &mut ctx, 2).unwrap());
    // every copied node is new
    assert!(map.nodes().all(|(old, new)| old != new));
}

#[rstest]
fn copies_share_literal_strings() {
    let mut ast = Ast::new();
    let s = ast.string("shared");
    let mut map = CopyMap::new();
    let copy = ast.deep_copy(s, &mut map);
    match (ast.kind(s), ast.kind(copy)) {
        (TreeKind::String(a), TreeKind::String(b)) => assert!(Arc::ptr_eq(a, b)),
        other => panic!("unexpected kinds {other:?}"),
    }
}

#[rstest]
fn shared_subtrees_are_copied_once() {
    let mut ast = Ast::new();
    let a = ast.number(1.0);
    let twice = ast.arith(ArithOp::Add, a, a);
    let mut map = CopyMap::new();
    let copy = ast.deep_copy(twice, &mut map);
    let node = ast.node(copy);
    assert_eq!(node.left, node.right);
    assert_eq!(map.node(a), node.left);
}

#[rstest]
fn folding_replaces_maximal_constant_subtrees(mut ctx: Context) {
    let mut ast = Ast::new();
    let one = ast.number(1.0);
    let two = ast.number(2.0);
    let three = ast.arith(ArithOp::Add, one, two);
    let upper = ast.string("ab");
    let call = ast.call(q("upper-case"), &[upper]);
    let dot = ast.context_item();
    let seq = ast.sequence(three, call);
    let all = ast.sequence(dot, seq);

    assert_eq!(ast.fold_constants(all), 1);
    assert!(matches!(ast.kind(seq), TreeKind::Value(_)));
    assert_eq!(ast.node(seq).left, None);
    // the context item is untouched
    assert!(matches!(ast.kind(dot), TreeKind::ContextItem));

    let out = ast.evaluate(all, &mut ctx, 2).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out.get(1).map(|v| v.string_value()).as_deref(), Some("3"));
    assert_eq!(out.get(2).map(|v| v.string_value()).as_deref(), Some("AB"));

    // already folded, and literals are never folded
    assert_eq!(ast.fold_constants(all), 0);
    assert_eq!(ast.fold_constants(one), 0);
}

#[rstest]
fn folding_leaves_erroneous_subtrees_for_the_run() {
    let mut ast = Ast::new();
    let one = ast.number(1.0);
    let two = ast.number(2.0);
    let pair = ast.sequence(one, two);
    let bad = ast.arith(ArithOp::Add, pair, one);
    assert!(ast.is_constant(bad));
    // the sequence operand itself is folded, the failing sum is not
    assert_eq!(ast.fold_constants(bad), 1);
    assert!(matches!(ast.kind(bad), TreeKind::Arith(ArithOp::Add)));
    assert!(matches!(ast.kind(pair), TreeKind::Value(_)));
}
