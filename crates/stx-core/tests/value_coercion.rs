use rstest::rstest;
use stx_core::xdm::{format_number, parse_number};
use stx_core::{AncestorStack, Event, ExpandedName, Sequence, Value};

#[rstest]
#[case(Sequence::empty(), false)]
#[case(Sequence::one(0.0), false)]
#[case(Sequence::one(f64::NAN), false)]
#[case(Sequence::one(-3.0), true)]
#[case(Sequence::one(""), false)]
#[case(Sequence::one("false"), true)]
#[case(Sequence::one(false), false)]
#[case(Sequence::from(vec![Value::Boolean(false), Value::Boolean(false)]), true)]
fn boolean_value(#[case] seq: Sequence, #[case] expected: bool) {
    assert_eq!(seq.to_boolean(), expected);
}

#[rstest]
#[case(Sequence::one(true), 1.0)]
#[case(Sequence::one(false), 0.0)]
#[case(Sequence::one(" 42 "), 42.0)]
#[case(Sequence::one("-0.5"), -0.5)]
#[case(Sequence::from(vec![Value::Number(7.0), Value::Number(8.0)]), 7.0)]
fn number_value(#[case] seq: Sequence, #[case] expected: f64) {
    assert_eq!(seq.to_number(), expected);
}

#[rstest]
#[case("")]
#[case("abc")]
#[case("1e5")]
#[case("+3")]
fn number_value_of_non_numeric_strings_is_nan(#[case] s: &str) {
    assert!(Sequence::one(s).to_number().is_nan());
    assert!(Sequence::empty().to_number().is_nan());
}

#[rstest]
#[case(Value::Boolean(true), "true")]
#[case(Value::Number(1.0), "1")]
#[case(Value::Number(-0.0), "0")]
#[case(Value::Number(2.5), "2.5")]
#[case(Value::Number(f64::NEG_INFINITY), "-Infinity")]
#[case(Value::string("x y"), "x y")]
fn string_value(#[case] value: Value, #[case] expected: &str) {
    assert_eq!(value.string_value(), expected);
    assert_eq!(Sequence::one(value).string_value(), expected);
}

#[test]
fn empty_sequence_string_is_empty() {
    assert_eq!(Sequence::empty().string_value(), "");
}

#[test]
fn node_values_read_their_text() {
    let mut stack = AncestorStack::new();
    stack.push(Event::document());
    stack.push(Event::element(ExpandedName::local("a")));
    stack.push(Event::text(" 12 "));

    let element = Value::Node(stack.node_ref(1).unwrap());
    assert!(element.to_boolean());
    assert_eq!(element.string_value(), "");
    assert!(element.to_number().is_nan());

    let text = Value::Node(stack.node_ref(2).unwrap());
    assert_eq!(text.string_value(), " 12 ");
    assert_eq!(text.to_number(), 12.0);
}

#[test]
fn format_and_parse_agree_on_integers() {
    for n in [0.0, 1.0, -17.0, 123_456_789.0] {
        assert_eq!(parse_number(&format_number(n)), n);
    }
}

#[test]
fn join_uses_string_values() {
    let seq = Sequence::from(vec![Value::Number(1.0), Value::string("b"), Value::Boolean(true)]);
    assert_eq!(seq.join("-"), "1-b-true");
}
