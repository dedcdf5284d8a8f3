use crate::types::TrId;

/// Tags wrap a subtree without logical content. Only `GenericMark`
/// influences the core: the unfolder never re-enters a marked subtree
/// in the same pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tag {
  /// Marks the defining equation head of a definition or signature.
  HeadTerm,
  /// Marks a subterm already unfolded in this pass.
  GenericMark,
  /// Marks a rewrite produced by the evaluation unfolder.
  Evaluation,
}

/// One recursive tree for formulas and terms: `Trm` doubles as
/// predicate and function application, and the `info` lists attach
/// locally known facts to a specific occurrence.
#[derive(Clone)]
pub enum Formula {
  Iff { f: Box<Formula>, g: Box<Formula> },
  Imp { f: Box<Formula>, g: Box<Formula> },
  And { f: Box<Formula>, g: Box<Formula> },
  Or { f: Box<Formula>, g: Box<Formula> },
  Not { f: Box<Formula> },
  All { decl: Box<str>, f: Box<Formula> },
  Exi { decl: Box<str>, f: Box<Formula> },
  Tag { tag: Tag, f: Box<Formula> },
  Trm { id: TrId, name: Box<str>, args: Box<[Formula]>, info: Vec<Formula> },
  Var { name: Box<str>, info: Vec<Formula> },
  /// A bound variable, de Bruijn style: `depth` counts binders between
  /// the occurrence and its quantifier.
  Ind { depth: u32 },
  Top,
  Bot,
  /// The hole of a definitional pattern.
  ThisT,
}

impl Default for Formula {
  fn default() -> Self { Self::Top }
}

impl Formula {
  pub fn and(f: Formula, g: Formula) -> Formula { Formula::And { f: Box::new(f), g: Box::new(g) } }
  pub fn or(f: Formula, g: Formula) -> Formula { Formula::Or { f: Box::new(f), g: Box::new(g) } }
  pub fn imp(f: Formula, g: Formula) -> Formula { Formula::Imp { f: Box::new(f), g: Box::new(g) } }
  pub fn iff(f: Formula, g: Formula) -> Formula { Formula::Iff { f: Box::new(f), g: Box::new(g) } }
  pub fn neg(f: Formula) -> Formula { Formula::Not { f: Box::new(f) } }
  pub fn all(decl: &str, f: Formula) -> Formula {
    Formula::All { decl: decl.into(), f: Box::new(f) }
  }
  pub fn exi(decl: &str, f: Formula) -> Formula {
    Formula::Exi { decl: decl.into(), f: Box::new(f) }
  }
  pub fn tag(tag: Tag, f: Formula) -> Formula { Formula::Tag { tag, f: Box::new(f) } }
  /// Wraps a site the unfolder has expanded.
  pub fn marked(f: Formula) -> Formula { Formula::tag(Tag::GenericMark, f) }

  pub fn trm(id: TrId, name: &str, args: Vec<Formula>) -> Formula {
    Formula::Trm { id, name: name.into(), args: args.into(), info: vec![] }
  }
  pub fn var(name: &str) -> Formula { Formula::Var { name: name.into(), info: vec![] } }

  pub fn eq(l: Formula, r: Formula) -> Formula { Formula::trm(TrId::EQUALITY, "=", vec![l, r]) }
  pub fn elem(x: Formula, s: Formula) -> Formula {
    Formula::trm(TrId::ELEMENT, "element_of", vec![x, s])
  }
  pub fn dom_of(f: Formula) -> Formula { Formula::trm(TrId::DOM, "dom", vec![f]) }
  pub fn app(f: Formula, x: Formula) -> Formula { Formula::trm(TrId::APP, "app", vec![f, x]) }
  /// The "is a set" atom.
  pub fn set_of(t: Formula) -> Formula { Formula::trm(TrId::SET, "set", vec![t]) }
  /// The "is a function" atom.
  pub fn function_of(t: Formula) -> Formula { Formula::trm(TrId::FUNCTION, "function", vec![t]) }

  pub fn mk_neg(self) -> Self {
    match self {
      Formula::Not { f } => *f,
      f => Formula::Not { f: Box::new(f) },
    }
  }

  pub fn maybe_neg(self, pos: bool) -> Self {
    if pos {
      self
    } else {
      self.mk_neg()
    }
  }

  /// Strips outer tags.
  pub fn strip(&self) -> &Formula {
    match self {
      Formula::Tag { f, .. } => f.strip(),
      f => f,
    }
  }

  pub fn is_top(&self) -> bool { matches!(self, Formula::Top) }
  pub fn is_bot(&self) -> bool { matches!(self, Formula::Bot) }
  pub fn is_trm(&self) -> bool { matches!(self, Formula::Trm { .. }) }

  pub fn is_literal(&self) -> bool {
    match self.strip() {
      Formula::Not { f } => f.strip().is_trm(),
      f => f.is_trm(),
    }
  }

  /// The underlying atom of a literal.
  pub fn lt_atomic(&self) -> &Formula {
    match self.strip() {
      Formula::Not { f } => f.strip(),
      f => f,
    }
  }

  pub fn tr_id(&self) -> Option<TrId> {
    match self.strip() {
      Formula::Trm { id, .. } => Some(*id),
      _ => None,
    }
  }

  pub fn tr_args(&self) -> Option<&[Formula]> {
    match self.strip() {
      Formula::Trm { args, .. } => Some(args),
      _ => None,
    }
  }

  pub fn tr_name(&self) -> Option<&str> {
    match self.strip() {
      Formula::Trm { name, .. } => Some(name),
      _ => None,
    }
  }

  pub fn info(&self) -> Option<&[Formula]> {
    match self {
      Formula::Trm { info, .. } | Formula::Var { info, .. } => Some(info),
      _ => None,
    }
  }

  /// Attaches annotations to a term occurrence; no-op on non-terms.
  pub fn with_info(mut self, new_info: Vec<Formula>) -> Formula {
    if let Formula::Trm { info, .. } | Formula::Var { info, .. } = &mut self {
      info.extend(new_info)
    }
    self
  }

  /// Whether this occurrence carries an annotation equivalent to `pat`.
  pub fn has_info(&self, pat: &Formula) -> bool {
    self.strip().info().is_some_and(|info| info.iter().any(|a| a.twins(pat)))
  }

  /// Syntactic term equivalence, ignoring tags and info annotations.
  pub fn twins(&self, other: &Formula) -> bool {
    match (self.strip(), other.strip()) {
      (Formula::Trm { id: i1, args: a1, .. }, Formula::Trm { id: i2, args: a2, .. }) =>
        i1 == i2 && a1.len() == a2.len() && a1.iter().zip(&**a2).all(|(t, u)| t.twins(u)),
      (Formula::Var { name: n1, .. }, Formula::Var { name: n2, .. }) => n1 == n2,
      (Formula::Ind { depth: d1 }, Formula::Ind { depth: d2 }) => d1 == d2,
      (Formula::Top, Formula::Top)
      | (Formula::Bot, Formula::Bot)
      | (Formula::ThisT, Formula::ThisT) => true,
      _ => false,
    }
  }

  /// Structural equivalence of whole formulas, ignoring tags and info.
  pub fn equivalent(&self, other: &Formula) -> bool {
    match (self.strip(), other.strip()) {
      (Formula::Iff { f: a, g: b }, Formula::Iff { f: c, g: d })
      | (Formula::Imp { f: a, g: b }, Formula::Imp { f: c, g: d })
      | (Formula::And { f: a, g: b }, Formula::And { f: c, g: d })
      | (Formula::Or { f: a, g: b }, Formula::Or { f: c, g: d }) =>
        a.equivalent(c) && b.equivalent(d),
      (Formula::Not { f: a }, Formula::Not { f: b }) => a.equivalent(b),
      (Formula::All { f: a, .. }, Formula::All { f: b, .. })
      | (Formula::Exi { f: a, .. }, Formula::Exi { f: b, .. }) => a.equivalent(b),
      (Formula::Trm { id: i1, args: a1, .. }, Formula::Trm { id: i2, args: a2, .. }) =>
        i1 == i2 && a1.len() == a2.len() && a1.iter().zip(&**a2).all(|(t, u)| t.equivalent(u)),
      (f1, f2) => f1.twins(f2),
    }
  }

  /// `twins` lifted to literals: at most one negation on each side.
  pub fn lt_twins(&self, other: &Formula) -> bool {
    match (self.strip(), other.strip()) {
      (Formula::Not { f: f1 }, Formula::Not { f: f2 }) => f1.twins(f2),
      (Formula::Not { .. }, _) | (_, Formula::Not { .. }) => false,
      (f1, f2) => f1.twins(f2),
    }
  }

  /// One normalization step: `Iff` becomes a conjunction of
  /// implications, a negation is pushed through whatever it guards.
  pub fn albet(self) -> Formula {
    match self {
      Formula::Iff { f, g } =>
        Formula::and(Formula::Imp { f: f.clone(), g: g.clone() }, Formula::Imp { f: g, g: f }),
      Formula::Not { f } => match *f {
        Formula::All { decl, f } => Formula::Exi { decl, f: Box::new(Formula::Not { f }) },
        Formula::Exi { decl, f } => Formula::All { decl, f: Box::new(Formula::Not { f }) },
        Formula::Iff { f, g } => Formula::or(
          Formula::And { f: f.clone(), g: Box::new(Formula::Not { f: g.clone() }) },
          Formula::And { f: g, g: Box::new(Formula::Not { f }) },
        ),
        Formula::And { f, g } =>
          Formula::or(Formula::Not { f }.albet(), Formula::Not { f: g }.albet()),
        Formula::Or { f, g } =>
          Formula::and(Formula::Not { f }.albet(), Formula::Not { f: g }.albet()),
        Formula::Imp { f, g } => Formula::And { f, g: Box::new(Formula::Not { f: g }.albet()) },
        Formula::Not { f } => f.albet(),
        Formula::Tag { f, .. } => Formula::Not { f }.albet(),
        Formula::Top => Formula::Bot,
        Formula::Bot => Formula::Top,
        f => Formula::Not { f: Box::new(f) },
      },
      Formula::Tag { tag, f } => Formula::Tag { tag, f: Box::new(f.albet()) },
      f => f,
    }
  }

  /// Constant-folds trivial connectives one level deep.
  pub fn bool_simp(self) -> Formula {
    match self {
      Formula::All { decl, f } => match *f {
        Formula::Top => Formula::Top,
        Formula::Bot => Formula::Bot,
        f => Formula::All { decl, f: Box::new(f) },
      },
      Formula::Exi { decl, f } => match *f {
        Formula::Top => Formula::Top,
        Formula::Bot => Formula::Bot,
        f => Formula::Exi { decl, f: Box::new(f) },
      },
      Formula::Iff { f, g } => match (*f, *g) {
        (Formula::Top, g) => g,
        (f, Formula::Top) => f,
        (Formula::Bot, g) => g.mk_neg(),
        (f, Formula::Bot) => f.mk_neg(),
        (f, g) => Formula::iff(f, g),
      },
      Formula::Imp { f, g } => match (*f, *g) {
        (Formula::Top, g) => g,
        (_, Formula::Top) => Formula::Top,
        (Formula::Bot, _) => Formula::Top,
        (f, Formula::Bot) => f.mk_neg(),
        (f, g) => Formula::imp(f, g),
      },
      Formula::And { f, g } => match (*f, *g) {
        (Formula::Bot, _) | (_, Formula::Bot) => Formula::Bot,
        (Formula::Top, g) => g,
        (f, Formula::Top) => f,
        (f, g) => Formula::and(f, g),
      },
      Formula::Or { f, g } => match (*f, *g) {
        (Formula::Top, _) | (_, Formula::Top) => Formula::Top,
        (Formula::Bot, g) => g,
        (f, Formula::Bot) => f,
        (f, g) => Formula::or(f, g),
      },
      Formula::Not { f } => match *f {
        Formula::Top => Formula::Bot,
        Formula::Bot => Formula::Top,
        f => Formula::Not { f: Box::new(f) },
      },
      Formula::Tag { tag, f } => match *f {
        Formula::Top => Formula::Top,
        Formula::Bot => Formula::Bot,
        f => Formula::Tag { tag, f: Box::new(f) },
      },
      f => f,
    }
  }

  /// Rebuilds one structural level through `op`. Info annotations are
  /// not positions and are left alone.
  pub fn map_sub(self, op: &mut impl FnMut(Formula) -> Formula) -> Formula {
    match self {
      Formula::Not { f } => Formula::Not { f: Box::new(op(*f)) },
      Formula::Tag { tag, f } => Formula::Tag { tag, f: Box::new(op(*f)) },
      Formula::All { decl, f } => Formula::All { decl, f: Box::new(op(*f)) },
      Formula::Exi { decl, f } => Formula::Exi { decl, f: Box::new(op(*f)) },
      Formula::And { f, g } => Formula::And { f: Box::new(op(*f)), g: Box::new(op(*g)) },
      Formula::Or { f, g } => Formula::Or { f: Box::new(op(*f)), g: Box::new(op(*g)) },
      Formula::Imp { f, g } => Formula::Imp { f: Box::new(op(*f)), g: Box::new(op(*g)) },
      Formula::Iff { f, g } => Formula::Iff { f: Box::new(op(*f)), g: Box::new(op(*g)) },
      Formula::Trm { id, name, args, info } => {
        let args = args.into_vec().into_iter().map(&mut *op).collect();
        Formula::Trm { id, name, args, info }
      }
      f => f,
    }
  }

  /// Visits the direct subformulas (and arguments) of `self`.
  pub fn for_each_sub<'a>(&'a self, mut op: impl FnMut(&'a Formula)) {
    match self {
      Formula::Not { f }
      | Formula::Tag { f, .. }
      | Formula::All { f, .. }
      | Formula::Exi { f, .. } => op(f),
      Formula::And { f, g }
      | Formula::Or { f, g }
      | Formula::Imp { f, g }
      | Formula::Iff { f, g } => {
        op(f);
        op(g)
      }
      Formula::Trm { args, .. } =>
        for t in &**args {
          op(t)
        },
      _ => {}
    }
  }

  /// Flattens the top-level conjunction chain.
  pub fn conjuncts<'a>(&'a self, out: &mut Vec<&'a Formula>) {
    match self {
      Formula::And { f, g } => {
        f.conjuncts(out);
        g.conjuncts(out)
      }
      Formula::Top => {}
      f => out.push(f),
    }
  }

  /// Whether any subtree is `twins`-equivalent to `pat`.
  pub fn occurs(&self, pat: &Formula) -> bool {
    if self.twins(pat) {
      return true
    }
    let mut found = false;
    self.for_each_sub(|g| found |= g.occurs(pat));
    found
  }
}

/// Replaces every subterm `twins`-equivalent to `old` by `new`.
pub fn replace(new: &Formula, old: &Formula, f: &Formula) -> Formula {
  if f.twins(old) {
    return new.clone()
  }
  f.clone().map_sub(&mut |g| replace(new, old, &g))
}

/// Opens a binder: the variable bound at the outermost level becomes
/// the free variable `name`.
pub fn inst(name: &str, f: &Formula) -> Formula { inst_at(name, f, 0) }

fn inst_at(name: &str, f: &Formula, d: u32) -> Formula {
  match f {
    Formula::Ind { depth } if *depth == d => Formula::var(name),
    Formula::All { decl, f } =>
      Formula::All { decl: decl.clone(), f: Box::new(inst_at(name, f, d + 1)) },
    Formula::Exi { decl, f } =>
      Formula::Exi { decl: decl.clone(), f: Box::new(inst_at(name, f, d + 1)) },
    f => f.clone().map_sub(&mut |g| inst_at(name, &g, d)),
  }
}

/// Opens a binder with an arbitrary (closed) term.
pub fn inst_with(t: &Formula, f: &Formula) -> Formula { inst_with_at(t, f, 0) }

fn inst_with_at(t: &Formula, f: &Formula, d: u32) -> Formula {
  match f {
    Formula::Ind { depth } if *depth == d => t.clone(),
    Formula::All { decl, f } =>
      Formula::All { decl: decl.clone(), f: Box::new(inst_with_at(t, f, d + 1)) },
    Formula::Exi { decl, f } =>
      Formula::Exi { decl: decl.clone(), f: Box::new(inst_with_at(t, f, d + 1)) },
    f => f.clone().map_sub(&mut |g| inst_with_at(t, &g, d)),
  }
}

/// Inverse of [`inst`]: occurrences of the free variable `name` become
/// the variable bound at the outermost level.
pub fn bind(name: &str, f: &Formula) -> Formula { bind_at(name, f, 0) }

fn bind_at(name: &str, f: &Formula, d: u32) -> Formula {
  match f {
    Formula::Var { name: n, .. } if **n == *name => Formula::Ind { depth: d },
    Formula::All { decl, f } =>
      Formula::All { decl: decl.clone(), f: Box::new(bind_at(name, f, d + 1)) },
    Formula::Exi { decl, f } =>
      Formula::Exi { decl: decl.clone(), f: Box::new(bind_at(name, f, d + 1)) },
    f => f.clone().map_sub(&mut |g| bind_at(name, &g, d)),
  }
}

/// Substitutes `t` for the free variable `name`.
pub fn subst(t: &Formula, name: &str, f: &Formula) -> Formula {
  match f {
    Formula::Var { name: n, .. } if **n == *name => t.clone(),
    f => f.clone().map_sub(&mut |g| subst(t, name, &g)),
  }
}

impl std::fmt::Debug for Formula {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Formula::Iff { f: a, g: b } => write!(f, "({a:?} ↔ {b:?})"),
      Formula::Imp { f: a, g: b } => write!(f, "({a:?} → {b:?})"),
      Formula::And { f: a, g: b } => write!(f, "({a:?} ∧ {b:?})"),
      Formula::Or { f: a, g: b } => write!(f, "({a:?} ∨ {b:?})"),
      Formula::Not { f: a } => write!(f, "¬{a:?}"),
      Formula::All { decl, f: a } => write!(f, "∀ {decl}, {a:?}"),
      Formula::Exi { decl, f: a } => write!(f, "∃ {decl}, {a:?}"),
      Formula::Tag { tag, f: a } => write!(f, "[{tag:?}]{a:?}"),
      Formula::Trm { name, args, .. } => match (&**name, &**args) {
        ("=", [l, r]) => write!(f, "({l:?} = {r:?})"),
        (name, []) => write!(f, "{name}"),
        (name, args) => {
          write!(f, "{name}")?;
          let mut s = f.debug_tuple("");
          for arg in args {
            s.field(arg);
          }
          s.finish()
        }
      },
      Formula::Var { name, .. } => write!(f, "{name}"),
      Formula::Ind { depth } => write!(f, "b{depth}"),
      Formula::Top => write!(f, "true"),
      Formula::Bot => write!(f, "false"),
      Formula::ThisT => write!(f, "this"),
    }
  }
}
