use crate::evidence::reduce_with_evidence;
use crate::formula::{inst, replace, Formula, Tag};
use crate::types::TrId;

/// The head block descriptor of a context entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlockKind {
  Definition,
  Signature,
  /// A definition introduced inside the current proof block.
  LowDefinition,
  Axiom,
  Lemma,
  Theorem,
  Hypothesis,
  Assumption,
  Case,
}

/// One statement visible to the prover: the formula, its reduced form,
/// and the bookkeeping the filter needs.
#[derive(Clone, Debug)]
pub struct Context {
  pub formula: Formula,
  /// Cache of `reduce_with_evidence(formula)`.
  pub reduced: Formula,
  pub kind: BlockKind,
  /// Introduced inside the current proof block.
  pub low_level: bool,
  pub name: Box<str>,
  /// Names cited by this item.
  pub link: Vec<Box<str>>,
}

impl Context {
  pub fn new(formula: Formula, kind: BlockKind, low_level: bool, name: &str) -> Context {
    let reduced = reduce_with_evidence(&formula);
    Context { formula, reduced, kind, low_level, name: name.into(), link: vec![] }
  }

  /// The same entry carrying a different formula; the reduced cache is
  /// recomputed.
  pub fn set_form(&self, formula: Formula) -> Context {
    let reduced = reduce_with_evidence(&formula);
    Context { formula, reduced, ..self.clone() }
  }

  pub fn is_definition_or_signature(&self) -> bool {
    matches!(self.kind, BlockKind::Definition | BlockKind::Signature)
  }
}

/// Selects the context entries that reach the prover. Returns the
/// selection together with any cited names that could not be found.
pub fn filter_context(thesis: &Context, context: &[Context]) -> (Vec<Context>, Vec<Box<str>>) {
  let link = &thesis.link;
  if link.is_empty() {
    let out = context.iter().map(rewrite_entry).filter(|c| !c.reduced.is_top()).collect();
    return (out, vec![])
  }
  let split = context.iter().position(|c| !c.low_level).unwrap_or(context.len());
  let (low, top) = context.split_at(split);
  let mut out: Vec<Context> = low.to_vec();
  out.extend(top.iter().filter(|c| link.contains(&c.name)).cloned());
  let missing =
    link.iter().filter(|n| !top.iter().any(|c| c.name == **n)).cloned().collect::<Vec<_>>();
  // definitions and signatures carry the type information the prover
  // always needs, cited or not
  out.extend((top.iter().filter(|c| c.is_definition_or_signature())).map(rewrite_entry));
  out.retain(|c| !c.reduced.is_top());
  (out, missing)
}

fn rewrite_entry(c: &Context) -> Context {
  if c.is_definition_or_signature() {
    c.set_form(rewrite_head(&c.formula))
  } else {
    c.clone()
  }
}

/// Converts a definition or signature head into prover-usable form:
/// the outermost universals are stripped onto fresh stable names, the
/// defining equation is erased in favor of the instantiated body, and
/// for a definition the reverse direction is kept as an explicit
/// implication under the original binders.
pub fn rewrite_head(f: &Formula) -> Formula { dive(0, f.clone()) }

fn dive(n: u32, f: Formula) -> Formula {
  match f {
    Formula::All { f, .. } => match *f {
      // a definition whose body is vacuous says nothing at all
      Formula::Imp { ref f, ref g }
        if matches!(f.strip(), Formula::Trm { .. })
          && matches!(&**f, Formula::Tag { tag: Tag::HeadTerm, .. })
          && g.is_top() =>
        Formula::Top,
      body => dive(n + 1, inst(&format!("?{n}"), &body)),
    },
    Formula::Imp { f: head, g } if head_definiens(&head).is_some() => {
      let t = head_definiens(&head).unwrap().clone();
      replace(&t, &Formula::ThisT, &g).bool_simp()
    }
    Formula::Iff { f: head, g } if head_definiens(&head).is_some() => {
      let t = head_definiens(&head).unwrap().clone();
      let eq = head.strip().clone();
      let fwd = replace(&t, &Formula::ThisT, &g).bool_simp();
      if fwd.is_top() {
        return Formula::Top
      }
      Formula::and(fwd, generalize_hole(Formula::imp((*g).clone(), eq)))
    }
    f => f,
  }
}

/// The definiens of a tagged head equation `HeadTerm (_ = t)`.
fn head_definiens(head: &Formula) -> Option<&Formula> {
  let Formula::Tag { tag: Tag::HeadTerm, f } = head else { return None };
  let Formula::Trm { id: TrId::EQUALITY, args, .. } = &**f else { return None };
  let [_, t] = &**args else { return None };
  Some(t)
}

/// Generalizes the definitional hole: every `ThisT` becomes a fresh
/// universally bound variable, turning `F ⇒ eq` into the reverse
/// direction of the definition.
fn generalize_hole(f: Formula) -> Formula {
  Formula::All { decl: "v".into(), f: Box::new(hole_at(&f, 0)) }
}

fn hole_at(f: &Formula, d: u32) -> Formula {
  match f {
    Formula::ThisT => Formula::Ind { depth: d },
    Formula::All { decl, f } =>
      Formula::All { decl: decl.clone(), f: Box::new(hole_at(f, d + 1)) },
    Formula::Exi { decl, f } =>
      Formula::Exi { decl: decl.clone(), f: Box::new(hole_at(f, d + 1)) },
    f => f.clone().map_sub(&mut |g| hole_at(&g, d)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn body(x: Formula) -> Formula { Formula::trm(TrId::USER_BASE, "body", vec![x]) }
  fn d(x: Formula) -> Formula { Formula::trm(TrId(0x101), "d", vec![x]) }

  fn sig_head(f: Formula) -> Formula {
    // ∀x. (HeadTerm (x = d(x)) ⇒ f)
    let eq = Formula::eq(Formula::Ind { depth: 0 }, d(Formula::Ind { depth: 0 }));
    Formula::all("x", Formula::imp(Formula::tag(Tag::HeadTerm, eq), f))
  }

  #[test]
  fn signature_head_substitutes_the_definiens() {
    let f = sig_head(body(Formula::ThisT));
    let out = rewrite_head(&f);
    // ThisT is filled with the definiens; the equation is gone
    assert!(out.twins(&body(d(Formula::var("?0")))));
  }

  #[test]
  fn vacuous_definition_is_erased() {
    let f = sig_head(Formula::Top);
    assert!(rewrite_head(&f).is_top());
  }

  #[test]
  fn definition_head_keeps_the_reverse_direction() {
    let eq = Formula::eq(Formula::Ind { depth: 0 }, d(Formula::Ind { depth: 0 }));
    let f = Formula::all(
      "x",
      Formula::iff(Formula::tag(Tag::HeadTerm, eq), body(Formula::ThisT)),
    );
    let out = rewrite_head(&f);
    let Formula::And { f: fwd, g: rev } = &out else { panic!("expected a conjunction") };
    assert!(fwd.twins(&body(d(Formula::var("?0")))));
    let Formula::All { f: rev_body, .. } = &**rev else { panic!("expected re-bound universal") };
    assert!(matches!(&**rev_body, Formula::Imp { .. }));
  }

  #[test]
  fn filter_keeps_order_and_drops_trivial() {
    let a = Context::new(body(Formula::var("a")), BlockKind::Axiom, false, "a1");
    let b = Context::new(Formula::Top, BlockKind::Lemma, false, "l1");
    let thesis = Context::new(body(Formula::var("t")), BlockKind::Theorem, false, "th");
    let (out, missing) = filter_context(&thesis, &[a.clone(), b]);
    assert!(missing.is_empty());
    assert_eq!(out.len(), 1);
    assert_eq!(&*out[0].name, "a1");
  }

  #[test]
  fn citations_select_and_warn() {
    let low = Context::new(body(Formula::var("l")), BlockKind::Assumption, true, "");
    let cited = Context::new(body(Formula::var("c")), BlockKind::Lemma, false, "lem");
    let skipped = Context::new(body(Formula::var("s")), BlockKind::Lemma, false, "other");
    let sig = Context::new(sig_head(body(Formula::ThisT)), BlockKind::Signature, false, "sig");
    let mut thesis = Context::new(body(Formula::var("t")), BlockKind::Theorem, false, "th");
    thesis.link = vec!["lem".into(), "ghost".into()];
    let (out, missing) = filter_context(&thesis, &[low, cited, skipped, sig]);
    assert_eq!(missing, vec![Box::<str>::from("ghost")]);
    let names: Vec<&str> = out.iter().map(|c| &*c.name).collect();
    // low-level prefix, then the citation, then definitions/signatures
    assert_eq!(names, ["", "lem", "sig"]);
    // the signature head was rewritten on the way in
    assert!(out[2].formula.twins(&body(d(Formula::var("?0")))));
  }
}
