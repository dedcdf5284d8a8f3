use crate::context::{BlockKind, Context};
use crate::distree::DisTree;
use crate::evidence::{reduce_with_evidence, trivial_by_evidence};
use crate::formula::{bind, inst, replace, Formula, Tag};
use crate::types::{DefEntry, DefKind, Eval, TrId};
use crate::unify::match_pat;
use hashbrown::HashMap;

/// One pass of conservative unfolding: every definition, extensionality
/// and evaluation is expanded at most once per occurrence, and expanded
/// sites are wrapped in `GenericMark` so the pass never re-enters them.
pub struct Unfolder<'a> {
  pub defs: &'a HashMap<TrId, DefEntry>,
  pub evals: &'a DisTree<Eval>,
  /// Definitional unfolding enabled.
  pub unfold: bool,
  /// Set/function extensionality and evaluation unfolding enabled.
  pub unfold_sf: bool,
  /// Number of expansions performed so far.
  pub count: u32,
}

impl<'a> Unfolder<'a> {
  pub fn new(
    defs: &'a HashMap<TrId, DefEntry>, evals: &'a DisTree<Eval>, unfold: bool, unfold_sf: bool,
  ) -> Unfolder<'a> {
    Unfolder { defs, evals, unfold, unfold_sf, count: 0 }
  }

  /// Unfolds one context entry. `LowDefinition` entries carry their own
  /// defining equations and are left alone.
  pub fn unfold_conservative(&mut self, c: &Context) -> Context {
    if c.kind == BlockKind::LowDefinition {
      return c.clone()
    }
    let f = self.fill(&mut vec![], Some(true), 0, c.formula.clone());
    c.set_form(f)
  }

  /// The polarity-tracking walk: `sign` flips under negation and on the
  /// antecedent of an implication, `local` accumulates the facts in
  /// force at the current position, `depth` numbers the binders opened
  /// on the way down.
  fn fill(&mut self, local: &mut Vec<Formula>, sign: Option<bool>, depth: u32, f: Formula) -> Formula {
    match f {
      Formula::Tag { tag: Tag::GenericMark, .. } => f,
      Formula::Trm { .. } => {
        let g = self.unfold_atomic(sign.expect("unfold hit an atom without polarity"), f);
        reduce_with_evidence(&g)
      }
      // rewrite so every position below has a defined polarity
      Formula::Iff { f, g } => {
        let both =
          Formula::and(Formula::Imp { f: f.clone(), g: g.clone() }, Formula::Imp { f: g, g: f });
        self.fill(local, sign, depth, both)
      }
      Formula::All { decl, f } => {
        let name = format!("u{depth}");
        let h = self.fill(local, sign, depth + 1, inst(&name, &f));
        Formula::All { decl, f: Box::new(bind(&name, &h)) }
      }
      Formula::Exi { decl, f } => {
        let name = format!("u{depth}");
        let h = self.fill(local, sign, depth + 1, inst(&name, &f));
        Formula::Exi { decl, f: Box::new(bind(&name, &h)) }
      }
      Formula::Not { f } => Formula::neg(self.fill(local, sign.map(|b| !b), depth, *f)),
      Formula::Imp { f, g } => {
        let ante = self.fill(local, sign.map(|b| !b), depth, *f);
        local.push(ante.clone());
        let cons = self.fill(local, sign, depth, *g);
        local.pop();
        Formula::imp(ante, cons)
      }
      Formula::And { f, g } => {
        let lhs = self.fill(local, sign, depth, *f);
        local.push(lhs.clone());
        let rhs = self.fill(local, sign, depth, *g);
        local.pop();
        Formula::and(lhs, rhs)
      }
      Formula::Or { f, g } => {
        let lhs = self.fill(local, sign, depth, *f);
        local.push(Formula::neg(lhs.clone()).albet());
        let rhs = self.fill(local, sign, depth, *g);
        local.pop();
        Formula::or(lhs, rhs)
      }
      Formula::Tag { tag, f } => Formula::Tag { tag, f: Box::new(self.fill(local, sign, depth, *f)) },
      f => f,
    }
  }

  /// Combines an atom with the local properties of itself and of its
  /// subterms, marking the original site against re-expansion.
  fn unfold_atomic(&mut self, sign: bool, f: Formula) -> Formula {
    let mut sub_props = vec![];
    self.subterm_local_properties(sign, &f, &mut sub_props);
    let props = self.local_properties(sign, &f);
    let mut res = Formula::marked(f);
    for p in props.into_iter().rev() {
      res = if sign { Formula::and(p, res) } else { Formula::or(p, res) };
    }
    for p in sub_props.into_iter().rev() {
      res = if sign { Formula::and(p, res) } else { Formula::imp(p, res) };
    }
    res
  }

  fn subterm_local_properties(&mut self, sign: bool, f: &Formula, out: &mut Vec<Formula>) {
    // marked subtrees were expanded already
    if matches!(f, Formula::Tag { .. }) {
      return
    }
    let mut subs = vec![];
    f.for_each_sub(|h| subs.push(h));
    for h in subs {
      out.extend(self.local_properties(sign, h));
      self.subterm_local_properties(sign, h, out);
    }
  }

  fn local_properties(&mut self, sign: bool, t: &Formula) -> Vec<Formula> {
    match t {
      Formula::Tag { .. } => vec![],
      Formula::Trm { id: TrId::EQUALITY, args, .. } => {
        let [l, r] = &**args else { panic!("equality without two sides") };
        let mut props = self.definitional_properties(sign, l, r);
        props.extend(self.definitional_properties(sign, r, l));
        props.extend(self.extensionalities(sign, l, r));
        props
      }
      Formula::Trm { id: TrId::APP, .. } | Formula::Trm { id: TrId::ELEMENT, .. } =>
        self.evaluations(sign, t),
      Formula::Trm { .. } => self.definitional_properties(sign, t, t),
      _ => vec![],
    }
  }

  /// The definiens of `f`, instantiated at `g` and marked. Signatures
  /// expand only in positive position.
  fn definitional_properties(&mut self, sign: bool, f: &Formula, g: &Formula) -> Vec<Formula> {
    if !self.unfold {
      return vec![]
    }
    let out = (|| {
      let def = self.defs.get(&f.tr_id()?)?;
      if !(sign || def.kind == DefKind::Definition) {
        return None
      }
      let sb = match_pat(&def.term, f)?;
      let res = replace(&Formula::marked(g.clone()), &Formula::ThisT, &sb.apply(&def.formula));
      if res.is_top() {
        return None
      }
      Some(res)
    })();
    if out.is_some() {
      self.count += 1
    }
    out.into_iter().collect()
  }

  fn extensionalities(&mut self, sign: bool, l: &Formula, r: &Formula) -> Vec<Formula> {
    if !self.unfold_sf {
      return vec![]
    }
    let set = Formula::set_of(Formula::ThisT);
    let fun = Formula::function_of(Formula::ThisT);
    let mut out = vec![];
    if l.has_info(&set) && r.has_info(&set) {
      out.push(set_extensionality(l, r))
    }
    if l.has_info(&fun) && r.has_info(&fun) {
      out.push(function_extensionality(sign, l, r))
    }
    self.count += out.len() as u32;
    out
  }

  /// An evaluation rewrite for `t`, when its side conditions are
  /// settled by evidence alone.
  fn evaluations(&mut self, sign: bool, t: &Formula) -> Vec<Formula> {
    if !self.unfold_sf {
      return vec![]
    }
    let out = (self.evals.find(t).into_iter()).find_map(|ev| {
      let sb = match_pat(&ev.term, t)?;
      if !ev.conditions.iter().all(|c| trivial_by_evidence(&sb.apply(c))) {
        return None
      }
      let branch = if sign { &ev.positives } else { &ev.negatives };
      Some(replace(&Formula::marked(t.clone()), &Formula::ThisT, &sb.apply(branch)))
    });
    if out.is_some() {
      self.count += 1
    }
    out.into_iter().collect()
  }
}

/// `∀v. v ∈ l ⇔ v ∈ r`
fn set_extensionality(l: &Formula, r: &Formula) -> Formula {
  let v = || Formula::Ind { depth: 0 };
  Formula::all("v", Formula::iff(Formula::elem(v(), l.clone()), Formula::elem(v(), r.clone())))
}

/// `dom l = dom r ∧ ∀v. v ∈ dom l ⇒ l(v) = r(v)`, with the domain
/// equality taken element-wise in negative position.
fn function_extensionality(sign: bool, l: &Formula, r: &Formula) -> Formula {
  let v = || Formula::Ind { depth: 0 };
  let dom_eq = if sign {
    Formula::eq(Formula::dom_of(l.clone()), Formula::dom_of(r.clone()))
  } else {
    Formula::all(
      "v",
      Formula::iff(
        Formula::elem(v(), Formula::dom_of(l.clone())),
        Formula::elem(v(), Formula::dom_of(r.clone())),
      ),
    )
  };
  let app_eq = Formula::all(
    "v",
    Formula::imp(
      Formula::elem(v(), Formula::dom_of(l.clone())),
      Formula::eq(Formula::app(l.clone(), v()), Formula::app(r.clone(), v())),
    ),
  );
  Formula::and(dom_eq, app_eq)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn q(x: Formula) -> Formula { Formula::trm(TrId::USER_BASE, "q", vec![x]) }
  fn r(x: Formula) -> Formula { Formula::trm(TrId(0x101), "r", vec![x]) }
  fn s(x: Formula) -> Formula { Formula::trm(TrId(0x102), "s", vec![x]) }
  fn a() -> Formula { Formula::trm(TrId(0x103), "a", vec![]) }

  fn q_def() -> (HashMap<TrId, DefEntry>, DisTree<Eval>) {
    // q(y) ⇔ r(y) ∧ s(y), with ThisT the defined occurrence
    let mut defs = HashMap::new();
    defs.insert(
      TrId::USER_BASE,
      DefEntry::new(
        q(Formula::var("y")),
        Formula::and(r(Formula::var("y")), s(Formula::var("y"))),
        DefKind::Definition,
      ),
    );
    (defs, DisTree::new())
  }

  fn entry(f: Formula) -> Context { Context::new(f, BlockKind::Hypothesis, true, "") }

  #[test]
  fn definition_unfolds_once_and_is_marked() {
    let (defs, evals) = q_def();
    let mut uf = Unfolder::new(&defs, &evals, true, true);
    let out = uf.unfold_conservative(&entry(q(a())));
    assert_eq!(uf.count, 1);
    // the site is conjoined with its definiens and marked
    let Formula::And { f, g } = &out.formula else { panic!("expected a conjunction") };
    assert!(f.equivalent(&Formula::and(r(a()), s(a()))));
    assert!(matches!(&**g, Formula::Tag { tag: Tag::GenericMark, .. }));

    // a second pass finds only the marked site and expands nothing
    let mut uf2 = Unfolder::new(&defs, &evals, true, true);
    uf2.unfold_conservative(&out);
    assert_eq!(uf2.count, 0);
  }

  #[test]
  fn negative_occurrences_unfold_disjunctively() {
    let (defs, evals) = q_def();
    let mut uf = Unfolder::new(&defs, &evals, true, true);
    let out = uf.unfold_conservative(&entry(Formula::neg(q(a()))));
    assert_eq!(uf.count, 1);
    let Formula::Not { f } = &out.formula else { panic!("negation was lost") };
    assert!(matches!(&**f, Formula::Or { .. }));
  }

  #[test]
  fn signatures_expand_only_positively() {
    let mut defs = HashMap::new();
    defs.insert(
      TrId::USER_BASE,
      DefEntry::new(q(Formula::var("y")), r(Formula::var("y")), DefKind::Signature),
    );
    let evals = DisTree::new();
    let mut uf = Unfolder::new(&defs, &evals, true, true);
    uf.unfold_conservative(&entry(Formula::neg(q(a()))));
    assert_eq!(uf.count, 0);
    uf.unfold_conservative(&entry(q(a())));
    assert_eq!(uf.count, 1);
  }

  #[test]
  fn low_definitions_are_skipped() {
    let (defs, evals) = q_def();
    let mut uf = Unfolder::new(&defs, &evals, true, true);
    let c = Context::new(q(a()), BlockKind::LowDefinition, true, "");
    let out = uf.unfold_conservative(&c);
    assert_eq!(uf.count, 0);
    assert!(out.formula.twins(&q(a())));
  }

  #[test]
  fn disabled_settings_suppress_expansion() {
    let (defs, evals) = q_def();
    let mut uf = Unfolder::new(&defs, &evals, false, false);
    uf.unfold_conservative(&entry(q(a())));
    assert_eq!(uf.count, 0);
  }

  #[test]
  fn set_equality_gets_extensionality() {
    let defs = HashMap::new();
    let evals = DisTree::new();
    let set = Formula::set_of(Formula::ThisT);
    let l = Formula::var("l").with_info(vec![set.clone()]);
    let r2 = Formula::var("r").with_info(vec![set]);
    let mut uf = Unfolder::new(&defs, &evals, true, true);
    let out = uf.unfold_conservative(&entry(Formula::eq(l, r2)));
    assert_eq!(uf.count, 1);
    let Formula::And { f, .. } = &out.formula else { panic!("expected extensionality conjunct") };
    assert!(matches!(&**f, Formula::All { .. }));
  }

  #[test]
  fn evaluation_requires_trivial_conditions() {
    let defs = HashMap::new();
    let mut evals = DisTree::new();
    // app(f0, x) evaluates to r(x) provided x ∈ dom f0
    let pat = Formula::app(Formula::var("f0"), Formula::var("x"));
    evals.insert(
      &pat,
      Eval {
        term: pat.clone(),
        positives: r(Formula::var("x")),
        negatives: s(Formula::var("x")),
        conditions: vec![Formula::elem(Formula::var("x"), Formula::dom_of(Formula::var("f0")))],
      },
    );

    // conditions not derivable: nothing happens
    let mut uf = Unfolder::new(&defs, &evals, true, true);
    uf.unfold_conservative(&entry(Formula::eq(
      Formula::app(Formula::var("g0"), a()),
      Formula::var("z"),
    )));
    assert_eq!(uf.count, 0);

    // with the membership recorded on the argument, the rewrite fires
    let arg = a().with_info(vec![Formula::elem(Formula::ThisT, Formula::dom_of(Formula::var("g0")))]);
    let mut uf = Unfolder::new(&defs, &evals, true, true);
    let out = uf.unfold_conservative(&entry(Formula::eq(
      Formula::app(Formula::var("g0"), arg),
      Formula::var("z"),
    )));
    assert_eq!(uf.count, 1);
    let _ = out;
  }
}
