use pretty_assertions::assert_eq;

use super::*;

#[test]
fn heads_map_to_ops() {
    assert_eq!(Op::from_head(Some("add")), Op::Binary(BinOp::Add));
    assert_eq!(Op::from_head(Some("le")), Op::Compare(Comparison::Le));
    assert_eq!(Op::from_head(Some("zext")), Op::Cast(CastOp::ZExt));
    assert_eq!(Op::from_head(Some("coro-final-suspend")), Op::Coro(CoroOp::FinalSuspend));
    assert_eq!(Op::from_head(Some("sum-get")), Op::SumGet);
}

#[test]
fn unknown_and_missing_heads_are_unrecognized() {
    assert_eq!(Op::from_head(Some("frobnicate")), Op::Unrecognized);
    assert_eq!(Op::from_head(None), Op::Unrecognized);
}

#[test]
fn definitions() {
    assert!(Op::Binary(BinOp::Mul).defines_result());
    assert!(Op::As.defines_result());
    assert!(Op::Coro(CoroOp::Begin).defines_result());
    assert!(!Op::Store.defines_result());
    assert!(!Op::Coro(CoroOp::End).defines_result());
    assert!(!Op::If.defines_result());
}

#[test]
fn signedness_selects_predicate() {
    assert_eq!(Comparison::Lt.int_predicate(false), IntPredicate::Slt);
    assert_eq!(Comparison::Lt.int_predicate(true), IntPredicate::Ult);
    assert_eq!(Comparison::Eq.int_predicate(true), IntPredicate::Eq);
    assert_eq!(Comparison::Ne.float_predicate(), FloatPredicate::Une);
}
