use std::sync::Arc;

use rstest::{fixture, rstest};
use stx_core::{
    ArithOp, Ast, CollectingSink, ComparisonOp, Context, ContextBuilder, ErrorCode, Event, ExpandedName, GroupTable,
    LogicOp, NodeId, NodeKind, Sequence, Value,
};

fn q(local: &str) -> ExpandedName {
    ExpandedName::local(local)
}

/// `doc / root(lang=en) / section(name=alpha) / item(id=i1, type=a) / text`
#[fixture]
fn ctx() -> Context {
    let mut ctx = Context::new(Arc::new(GroupTable::new()));
    ctx.push(Event::document());
    ctx.push(Event::element(q("root")).with_attribute(q("lang"), "en"));
    ctx.push(Event::element(q("section")).with_attribute(q("name"), "alpha"));
    ctx.push(Event::element(q("item")).with_attribute(q("id"), "i1").with_attribute(q("type"), "a"));
    ctx.push(Event::text("Alpha One"));
    ctx
}

fn lenient(sink: &CollectingSink) -> Context {
    let mut ctx = ContextBuilder::new(Arc::new(GroupTable::new())).with_sink(Arc::new(sink.clone())).build();
    ctx.push(Event::document());
    ctx.push(Event::element(q("root")));
    ctx
}

fn names(seq: &Sequence) -> Vec<String> {
    seq.iter()
        .map(|v| v.as_node().and_then(|n| n.name()).map(|n| n.local.clone()).unwrap_or_default())
        .collect()
}

#[rstest]
fn context_parent_and_root(mut ctx: Context) {
    let mut ast = Ast::new();
    let dot = ast.context_item();
    let dotdot = ast.parent();
    let root = ast.root();

    let here = ast.evaluate(dot, &mut ctx, 4).unwrap();
    assert_eq!(names(&here), ["item"]);
    let up = ast.evaluate(dotdot, &mut ctx, 4).unwrap();
    assert_eq!(names(&up), ["section"]);
    let top = ast.evaluate(root, &mut ctx, 4).unwrap();
    assert_eq!(top.first().and_then(Value::as_node).map(|n| n.kind()), Some(NodeKind::Document));

    assert!(ast.evaluate(dotdot, &mut ctx, 1).unwrap().is_empty());
}

#[rstest]
fn name_test_sees_only_the_next_open_entry(mut ctx: Context) {
    let mut ast = Ast::new();
    let section = ast.name(q("section"));
    let item = ast.name(q("item"));
    assert_eq!(names(&ast.evaluate(section, &mut ctx, 2).unwrap()), ["section"]);
    assert!(ast.evaluate(item, &mut ctx, 2).unwrap().is_empty());
    assert!(ast.evaluate(item, &mut ctx, 5).unwrap().is_empty());
}

#[rstest]
fn child_path_from_root(mut ctx: Context) {
    let mut ast = Ast::new();
    let root = ast.root();
    let r = ast.name(q("root"));
    let s = ast.name(q("section"));
    let i = ast.name(q("item"));
    let p1 = ast.child(root, r);
    let p2 = ast.child(p1, s);
    let path = ast.child(p2, i);
    assert_eq!(names(&ast.evaluate(path, &mut ctx, 4).unwrap()), ["item"]);
    // the same path from a shallower context: only what is open is visible
    assert_eq!(names(&ast.evaluate(path, &mut ctx, 1).unwrap()), ["item"]);
}

#[rstest]
fn descendant_path_finds_open_descendants(mut ctx: Context) {
    let mut ast = Ast::new();
    let root = ast.root();
    let any = ast.wildcard();
    let all = ast.descendant(root, any);
    assert_eq!(names(&ast.evaluate(all, &mut ctx, 1).unwrap()), ["root", "section", "item"]);

    let text = ast.text();
    let root2 = ast.root();
    let texts = ast.descendant(root2, text);
    let out = ast.evaluate(texts, &mut ctx, 1).unwrap();
    assert_eq!(out.string_value(), "Alpha One");
}

#[rstest]
fn attributes_of_the_context_element(mut ctx: Context) {
    let mut ast = Ast::new();
    let all = ast.attr_wildcard();
    let out = ast.evaluate(all, &mut ctx, 4).unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out.join(","), "i1,a");

    let id = ast.attr(q("id"));
    assert_eq!(ast.evaluate(id, &mut ctx, 4).unwrap().string_value(), "i1");
    // the text entry has no attributes
    assert!(ast.evaluate(all, &mut ctx, 5).unwrap().is_empty());

    let parent = ast.parent();
    let name = ast.attr(q("name"));
    let up = ast.child(parent, name);
    assert_eq!(ast.evaluate(up, &mut ctx, 4).unwrap().string_value(), "alpha");
}

#[rstest]
fn step_from_attribute_is_empty(mut ctx: Context) {
    let mut ast = Ast::new();
    let id = ast.attr(q("id"));
    let any = ast.any_node();
    let path = ast.child(id, any);
    assert!(ast.evaluate(path, &mut ctx, 4).unwrap().is_empty());
}

#[rstest]
fn filter_keeps_selected_items(mut ctx: Context) {
    let mut ast = Ast::new();
    let all = ast.attr_wildcard();
    let two = ast.number(2.0);
    let second = ast.predicate(all, two);
    assert_eq!(ast.evaluate(second, &mut ctx, 4).unwrap().string_value(), "a");

    let root = ast.root();
    let any = ast.wildcard();
    let elements = ast.descendant(root, any);
    let lang = ast.attr(q("lang"));
    let with_lang = ast.predicate(elements, lang);
    assert_eq!(names(&ast.evaluate(with_lang, &mut ctx, 1).unwrap()), ["root"]);
    assert_eq!(ctx.position(), 1);
}

#[rstest]
fn union_is_deduplicated_in_document_order(mut ctx: Context) {
    let mut ast = Ast::new();
    let dot = ast.context_item();
    let dotdot = ast.parent();
    let id = ast.attr(q("id"));
    let a = ast.union(dot, id);
    let b = ast.union(a, dotdot);
    let c = ast.union(b, dot);
    let out = ast.evaluate(c, &mut ctx, 4).unwrap();
    let kinds: Vec<NodeKind> = out.iter().filter_map(Value::as_node).map(|n| n.kind()).collect();
    assert_eq!(kinds, [NodeKind::Element, NodeKind::Element, NodeKind::Attribute]);
    assert_eq!(names(&out), ["section", "item", "id"]);
}

#[rstest]
#[case(ArithOp::Add, 7.0, 2.0, 9.0)]
#[case(ArithOp::Sub, 7.0, 2.0, 5.0)]
#[case(ArithOp::Mul, 7.0, 2.0, 14.0)]
#[case(ArithOp::Div, 7.0, 2.0, 3.5)]
#[case(ArithOp::Mod, 7.0, 2.0, 1.0)]
#[case(ArithOp::Mod, -7.0, 2.0, -1.0)]
#[case(ArithOp::Div, 1.0, 0.0, f64::INFINITY)]
fn arithmetic(mut ctx: Context, #[case] op: ArithOp, #[case] a: f64, #[case] b: f64, #[case] expected: f64) {
    let mut ast = Ast::new();
    let x = ast.number(a);
    let y = ast.number(b);
    let e = ast.arith(op, x, y);
    assert_eq!(ast.evaluate(e, &mut ctx, 0).unwrap(), Sequence::one(expected));
}

#[rstest]
fn arithmetic_with_empty_operand_is_empty(mut ctx: Context) {
    let mut ast = Ast::new();
    let x = ast.number(1.0);
    let empty = ast.value(Sequence::empty());
    let sum = ast.arith(ArithOp::Add, x, empty);
    assert!(ast.evaluate(sum, &mut ctx, 0).unwrap().is_empty());
    let neg = ast.negate(empty);
    assert!(ast.evaluate(neg, &mut ctx, 0).unwrap().is_empty());
    let neg = ast.negate(x);
    assert_eq!(ast.evaluate(neg, &mut ctx, 0).unwrap(), Sequence::one(-1.0));
}

#[rstest]
fn arithmetic_on_a_sequence_is_reported() {
    let sink = CollectingSink::new();
    let mut ctx = lenient(&sink);
    let mut ast = Ast::new();
    let one = ast.number(1.0);
    let two = ast.number(2.0);
    let pair = ast.sequence(one, two);
    let sum = ast.arith(ArithOp::Add, pair, one);
    assert!(ast.evaluate(sum, &mut ctx, 2).unwrap().is_empty());
    let minus = ast.negate(pair);
    assert!(ast.evaluate(minus, &mut ctx, 2).unwrap().is_empty());
    assert_eq!(sink.codes(), [ErrorCode::XPTY0004, ErrorCode::XPTY0004]);
}

#[rstest]
fn logic_short_circuits(mut ctx: Context) {
    let mut ast = Ast::new();
    let f = ast.call(q("false"), &[]);
    // an unknown function would be reported with the default sink if it were evaluated
    let boom = ast.call(q("no-such-function"), &[]);
    let and = ast.logic(LogicOp::And, f, boom);
    assert_eq!(ast.evaluate(and, &mut ctx, 0).unwrap(), Sequence::one(false));
    let t = ast.call(q("true"), &[]);
    let or = ast.logic(LogicOp::Or, t, boom);
    assert_eq!(ast.evaluate(or, &mut ctx, 0).unwrap(), Sequence::one(true));
}

#[rstest]
fn sequence_and_template(mut ctx: Context) {
    let mut ast = Ast::new();
    let a = ast.string("id=");
    let id = ast.attr(q("id"));
    let sep = ast.string("; ");
    let one = ast.number(1.0);
    let two = ast.number(2.0);
    let pair = ast.sequence(one, two);
    let avt = ast.avt(&[a, id, sep, pair]);
    assert_eq!(ast.evaluate(avt, &mut ctx, 4).unwrap().string_value(), "id=i1; 1 2");
    assert_eq!(ast.evaluate(pair, &mut ctx, 4).unwrap().len(), 2);
}

#[test]
fn step_over_atomic_value_is_a_type_error() {
    let sink = CollectingSink::new();
    let mut ctx = lenient(&sink);
    let mut ast = Ast::new();
    let n = ast.number(3.0);
    let any = ast.any_node();
    let path = ast.child(n, any);
    assert!(ast.evaluate(path, &mut ctx, 2).unwrap().is_empty());
    assert_eq!(sink.codes(), [ErrorCode::XPTY0004]);
}

#[test]
fn stale_node_reference_is_detected() {
    let sink = CollectingSink::new();
    let mut ctx = lenient(&sink);
    let mut ast = Ast::new();
    ctx.push(Event::element(q("gone")));
    let captured = ctx.stack().node_ref(2).unwrap();
    ctx.pop();
    ctx.push(Event::element(q("other")));

    let stale = ast.value(Sequence::one(captured));
    let any = ast.any_node();
    let path = ast.child(stale, any);
    assert!(ast.evaluate(path, &mut ctx, 3).unwrap().is_empty());
    assert_eq!(sink.codes(), [ErrorCode::XPTY0004]);
}

fn compared_with_old(ast: &mut Ast, v: NodeId) -> NodeId {
    let old = ast.string("old");
    ast.compare(ComparisonOp::Eq, v, old)
}

fn string_of(ast: &mut Ast, v: NodeId) -> NodeId {
    ast.call(q("string"), &[v])
}

fn name_of(ast: &mut Ast, v: NodeId) -> NodeId {
    ast.call(q("name"), &[v])
}

fn concatenated(ast: &mut Ast, v: NodeId) -> NodeId {
    let prefix = ast.string("x");
    ast.call(q("concat"), &[prefix, v])
}

fn in_template(ast: &mut Ast, v: NodeId) -> NodeId {
    let text = ast.string("text: ");
    ast.avt(&[text, v])
}

fn plus_one(ast: &mut Ast, v: NodeId) -> NodeId {
    let one = ast.number(1.0);
    ast.arith(ArithOp::Add, v, one)
}

fn negated(ast: &mut Ast, v: NodeId) -> NodeId {
    ast.negate(v)
}

fn united_with_context(ast: &mut Ast, v: NodeId) -> NodeId {
    let dot = ast.context_item();
    ast.union(v, dot)
}

/// `$v` holds a text node whose entry was replaced by a sibling with different content.
#[rstest]
#[case::comparison(compared_with_old)]
#[case::string_accessor(string_of)]
#[case::name_accessor(name_of)]
#[case::string_argument(concatenated)]
#[case::template(in_template)]
#[case::arithmetic(plus_one)]
#[case::unary_minus(negated)]
#[case::union(united_with_context)]
fn stale_node_in_a_variable_is_detected(#[case] build: fn(&mut Ast, NodeId) -> NodeId) {
    let sink = CollectingSink::new();
    let mut ctx = lenient(&sink);
    ctx.push(Event::text("old"));
    let captured = ctx.stack().node_ref(2).unwrap();
    ctx.pop();
    ctx.push(Event::text("new"));
    ctx.declare_local(q("v"), Sequence::one(captured));

    let mut ast = Ast::new();
    let v = ast.var(q("v"));
    let expr = build(&mut ast, v);
    assert!(ast.evaluate(expr, &mut ctx, 3).unwrap().is_empty());
    assert_eq!(sink.codes(), [ErrorCode::XPTY0004]);
}

#[test]
fn live_node_in_a_variable_is_usable() {
    let sink = CollectingSink::new();
    let mut ctx = lenient(&sink);
    ctx.push(Event::text("old"));
    let captured = ctx.stack().node_ref(2).unwrap();
    ctx.declare_local(q("v"), Sequence::one(captured));

    let mut ast = Ast::new();
    let v = ast.var(q("v"));
    let cmp = compared_with_old(&mut ast, v);
    assert_eq!(ast.evaluate(cmp, &mut ctx, 3).unwrap(), Sequence::one(true));
    let text = in_template(&mut ast, v);
    assert_eq!(ast.evaluate(text, &mut ctx, 3).unwrap().string_value(), "text: old");
    assert!(sink.errors().is_empty());
}
