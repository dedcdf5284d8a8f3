use crate::formula::Formula;
use hashbrown::HashMap;

/// A substitution keyed by variable name. Bindings may reference other
/// variables; `apply` resolves chains.
#[derive(Clone, Debug, Default)]
pub struct Subst(pub HashMap<Box<str>, Formula>);

impl Subst {
  pub fn new() -> Self { Self::default() }

  /// Follows variable chains to the representative of `f`.
  fn walk<'a>(&'a self, mut f: &'a Formula) -> &'a Formula {
    while let Formula::Var { name, .. } = f.strip() {
      match self.0.get(name) {
        Some(next) => f = next,
        None => break,
      }
    }
    f
  }

  pub fn apply(&self, f: &Formula) -> Formula {
    let f = self.walk(f);
    f.clone().map_sub(&mut |g| self.apply(&g))
  }

  fn occurs(&self, name: &str, f: &Formula) -> bool {
    match self.walk(f) {
      Formula::Var { name: n, .. } => **n == *name,
      f => {
        let mut found = false;
        f.for_each_sub(|g| found |= self.occurs(name, g));
        found
      }
    }
  }
}

/// One-sided matching: variables of `pat` bind subterms of `t`;
/// repeated variables must bind equivalent subterms.
pub fn match_pat(pat: &Formula, t: &Formula) -> Option<Subst> {
  let mut sb = Subst::new();
  match_into(pat, t, &mut sb).then_some(sb)
}

fn match_into(pat: &Formula, t: &Formula, sb: &mut Subst) -> bool {
  match (pat.strip(), t.strip()) {
    (Formula::Var { name, .. }, t) => match sb.0.get(name) {
      Some(prev) => prev.twins(t),
      None => {
        sb.0.insert(name.clone(), t.clone());
        true
      }
    },
    (Formula::Trm { id: i1, args: a1, .. }, Formula::Trm { id: i2, args: a2, .. }) =>
      i1 == i2
        && a1.len() == a2.len()
        && a1.iter().zip(&**a2).all(|(p, u)| match_into(p, u, sb)),
    (Formula::Ind { depth: d1 }, Formula::Ind { depth: d2 }) => d1 == d2,
    (Formula::ThisT, Formula::ThisT) => true,
    _ => false,
  }
}

/// Two-sided term unification with occurs check, extending `sb`.
pub fn unify(f: &Formula, g: &Formula, sb: &mut Subst) -> bool {
  let f = sb.walk(f).clone();
  let g = sb.walk(g).clone();
  match (f.strip(), g.strip()) {
    (Formula::Var { name: n1, .. }, Formula::Var { name: n2, .. }) if n1 == n2 => true,
    (Formula::Var { name, .. }, t) | (t, Formula::Var { name, .. }) => {
      if sb.occurs(name, t) {
        return false
      }
      sb.0.insert(name.clone(), t.clone());
      true
    }
    (Formula::Trm { id: i1, args: a1, .. }, Formula::Trm { id: i2, args: a2, .. }) =>
      i1 == i2 && a1.len() == a2.len() && {
        let (a1, a2) = (a1.to_vec(), a2.to_vec());
        a1.iter().zip(&a2).all(|(x, y)| unify(x, y, sb))
      },
    (Formula::Ind { depth: d1 }, Formula::Ind { depth: d2 }) => d1 == d2,
    (Formula::ThisT, Formula::ThisT) => true,
    _ => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::TrId;

  fn f(args: Vec<Formula>) -> Formula { Formula::trm(TrId::USER_BASE, "f", args) }
  fn c(name: &str) -> Formula { Formula::trm(TrId(0x102), name, vec![]) }

  #[test]
  fn matching_binds_consistently() {
    let pat = f(vec![Formula::var("x"), Formula::var("x")]);
    assert!(match_pat(&pat, &f(vec![c("a"), c("a")])).is_some());
    assert!(match_pat(&pat, &f(vec![c("a"), c("b")])).is_none());

    let sb = match_pat(&f(vec![Formula::var("x"), c("b")]), &f(vec![c("a"), c("b")])).unwrap();
    assert!(sb.apply(&Formula::var("x")).twins(&c("a")));
  }

  #[test]
  fn matching_is_one_sided() {
    // a variable in the target is data, not a binder
    assert!(match_pat(&c("a"), &Formula::var("x")).is_none());
    assert!(match_pat(&Formula::var("x"), &c("a")).is_some());
  }

  #[test]
  fn unification_solves_both_sides() {
    let mut sb = Subst::new();
    assert!(unify(&f(vec![Formula::var("x"), c("b")]), &f(vec![c("a"), Formula::var("y")]), &mut sb));
    assert!(sb.apply(&Formula::var("x")).twins(&c("a")));
    assert!(sb.apply(&Formula::var("y")).twins(&c("b")));
  }

  #[test]
  fn occurs_check_rejects_cyclic_bindings() {
    let mut sb = Subst::new();
    assert!(!unify(&Formula::var("x"), &f(vec![Formula::var("x")]), &mut sb));
  }

  #[test]
  fn apply_resolves_chains() {
    let mut sb = Subst::new();
    assert!(unify(&Formula::var("x"), &Formula::var("y"), &mut sb));
    assert!(unify(&Formula::var("y"), &c("a"), &mut sb));
    assert!(sb.apply(&f(vec![Formula::var("x")])).twins(&f(vec![c("a")])));
  }
}
