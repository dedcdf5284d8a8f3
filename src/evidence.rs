use crate::formula::{replace, Formula};
use crate::types::TrId;

/// Simplifies a formula against the info annotations attached to term
/// occurrences. Pure and idempotent up to `albet` normal form: each
/// literal is checked against the facts recorded on its arguments, and
/// a match settles it as `Top` or `Bot` outright.
pub fn reduce_with_evidence(f: &Formula) -> Formula {
  match f {
    // equality has its own treatment downstream
    Formula::Trm { id: TrId::EQUALITY, .. } => f.clone(),
    l if l.is_literal() => literal_evidence(l),
    f => f.clone().albet().map_sub(&mut |g| reduce_with_evidence(&g)).bool_simp(),
  }
}

fn literal_evidence(l: &Formula) -> Formula {
  let neg = Formula::neg(l.clone()).albet();
  let Some(args) = l.lt_atomic().tr_args() else { unreachable!("literal without an atom") };
  for t in args {
    for a in t.strip().info().unwrap_or(&[]) {
      let fact = replace(t, &Formula::ThisT, a);
      if fact.lt_twins(l) {
        return Formula::Top
      }
      if fact.lt_twins(&neg) {
        return Formula::Bot
      }
    }
  }
  l.clone()
}

/// A goal is trivial when evidence alone settles it.
pub fn trivial_by_evidence(f: &Formula) -> bool { reduce_with_evidence(f).is_top() }

#[cfg(test)]
mod tests {
  use super::*;
  use crate::formula::Tag;

  fn p(x: Formula) -> Formula { Formula::trm(TrId::USER_BASE, "p", vec![x]) }
  fn q(x: Formula) -> Formula { Formula::trm(TrId(0x101), "q", vec![x]) }

  #[test]
  fn annotation_settles_a_literal() {
    let x = Formula::var("x").with_info(vec![p(Formula::ThisT)]);
    assert!(reduce_with_evidence(&p(x.clone())).is_top());
    assert!(trivial_by_evidence(&p(x.clone())));
    // the same annotation contradicts the negated literal
    assert!(reduce_with_evidence(&Formula::neg(p(x))).is_bot());
  }

  #[test]
  fn negative_annotation_contradicts() {
    let x = Formula::var("x").with_info(vec![Formula::neg(p(Formula::ThisT))]);
    assert!(reduce_with_evidence(&p(x)).is_bot());
  }

  #[test]
  fn unrelated_annotations_leave_the_literal_alone() {
    let x = Formula::var("x").with_info(vec![q(Formula::ThisT)]);
    let goal = p(x);
    assert!(reduce_with_evidence(&goal).twins(&goal));
  }

  #[test]
  fn equality_is_left_alone() {
    let x = Formula::var("x").with_info(vec![Formula::eq(Formula::ThisT, Formula::var("y"))]);
    let goal = Formula::eq(x, Formula::var("y"));
    assert!(reduce_with_evidence(&goal).twins(&goal));
  }

  #[test]
  fn reduction_descends_through_connectives() {
    let x = Formula::var("x").with_info(vec![p(Formula::ThisT)]);
    let f = Formula::and(p(x.clone()), Formula::imp(p(x.clone()), p(x)));
    assert!(reduce_with_evidence(&f).is_top());
  }

  #[test]
  fn reduction_is_idempotent() {
    let x = Formula::var("x").with_info(vec![p(Formula::ThisT)]);
    let f = Formula::all("v", Formula::or(q(Formula::Ind { depth: 0 }), p(x)));
    let once = reduce_with_evidence(&f);
    let twice = reduce_with_evidence(&once);
    assert_eq!(format!("{once:?}"), format!("{twice:?}"));
  }

  #[test]
  fn plain_formulas_reduce_to_albet_form() {
    let f = Formula::neg(Formula::and(q(Formula::var("a")), q(Formula::var("b"))));
    let reduced = reduce_with_evidence(&f);
    assert!(matches!(reduced, Formula::Or { .. }));
  }

  #[test]
  fn tagged_arguments_still_carry_their_evidence() {
    let x = Formula::tag(Tag::GenericMark, Formula::var("x").with_info(vec![p(Formula::ThisT)]));
    assert!(reduce_with_evidence(&p(x)).is_top());
  }
}
