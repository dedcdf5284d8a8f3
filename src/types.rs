use crate::context::Context;
use crate::distree::DisTree;
use crate::formula::Formula;
use crate::meson::MRule;
use enum_map::{Enum, EnumMap};
use hashbrown::HashMap;
use std::time::Duration;

/// A trait for newtyped integers, that can be used as index types in vectors and sets.
pub trait Idx: Copy + Eq + std::hash::Hash + Ord {
  /// Convert from `T` to `usize`
  fn into_usize(self) -> usize;
  /// Convert from `usize` to `T`
  fn from_usize(_: usize) -> Self;
  /// Generate a fresh variable from a `&mut ID` counter.
  #[must_use]
  fn fresh(&mut self) -> Self {
    let n = *self;
    *self = Self::from_usize(self.into_usize() + 1);
    n
  }
}

impl Idx for u32 {
  fn into_usize(self) -> usize { self as _ }
  fn from_usize(n: usize) -> Self { n as _ }
}

#[macro_export]
macro_rules! mk_id {
  ($($id:ident,)*) => {
    $(
      #[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
      pub struct $id(pub u32);
      impl $crate::types::Idx for $id {
        fn from_usize(n: usize) -> Self { Self(n as u32) }
        fn into_usize(self) -> usize { self.0 as usize }
      }
      impl std::fmt::Debug for $id {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { self.0.fmt(f) }
      }
      impl std::str::FromStr for $id {
        type Err = std::num::ParseIntError;
        fn from_str(s: &str) -> Result<Self, Self::Err> { u32::from_str(s).map($id) }
      }
    )*
  };
}

mk_id! {
  TrId,
  SkId,
}

impl TrId {
  pub const EQUALITY: TrId = TrId(0);
  pub const ELEMENT: TrId = TrId(1);
  pub const SET: TrId = TrId(2);
  pub const FUNCTION: TrId = TrId(3);
  pub const DOM: TrId = TrId(4);
  pub const APP: TrId = TrId(5);
  pub const LESS: TrId = TrId(6);
  pub const THESIS: TrId = TrId(7);
  /// First id available to user symbols.
  pub const USER_BASE: TrId = TrId(0x100);
  /// Skolem constants live above this line, numbered by [`SkId`].
  pub const SKOLEM_BASE: TrId = TrId(0x4000_0000);

  pub fn skolem(n: SkId) -> TrId { TrId(TrId::SKOLEM_BASE.0 + n.0) }
}

#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct Position {
  pub line: u32,
  pub col: u32,
}

impl std::fmt::Debug for Position {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}:{}", self.line, self.col)
  }
}

/// Non-fatal failure of one reasoning alternative.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Failure {
  /// The depth limit ran out before any sub-procedure succeeded.
  Exhausted,
  /// Unfolding produced zero expansions.
  NoProgress,
  /// The prover ran out of its time budget.
  Timeout,
  /// The prover returned a non-success verdict.
  Rejected,
}
pub type OrFail<T = ()> = Result<T, Failure>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum BoolInstr {
  /// Send reduced formulas to the ATP.
  Ontored,
  /// Enable definition unfolding overall.
  Unfold,
  /// Enable unfolding on low-level context items.
  Unfoldlow,
  /// Enable set/function extensionality and evaluation unfolding.
  Unfoldsf,
  /// Same, but on low-level items.
  Unfoldlowsf,
  Printreason,
  Printfulltask,
  Printunfold,
}

impl BoolInstr {
  pub fn default_value(self) -> bool {
    matches!(self, BoolInstr::Unfold | BoolInstr::Unfoldlow | BoolInstr::Unfoldsf)
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum IntInstr {
  /// Max recursive unfold-and-retry rounds.
  Depthlimit,
  /// External prover wall budget in seconds.
  Timelimit,
}

impl IntInstr {
  pub fn default_value(self) -> u32 {
    match self {
      IntInstr::Depthlimit => 3,
      IntInstr::Timelimit => 3,
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum StrInstr {
  /// Name of the external prover to use; empty selects the first one.
  Prover,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
  Bool(BoolInstr, bool),
  Int(IntInstr, u32),
  Str(StrInstr, Box<str>),
}

/// The instruction stack. Later entries shadow earlier ones.
#[derive(Clone, Debug, Default)]
pub struct Instrs(pub Vec<Instr>);

impl Instrs {
  pub fn push(&mut self, i: Instr) { self.0.push(i) }

  pub fn bool(&self, k: BoolInstr) -> bool {
    (self.0.iter().rev())
      .find_map(|i| match i {
        Instr::Bool(k2, v) if *k2 == k => Some(*v),
        _ => None,
      })
      .unwrap_or_else(|| k.default_value())
  }

  pub fn int(&self, k: IntInstr) -> u32 {
    (self.0.iter().rev())
      .find_map(|i| match i {
        Instr::Int(k2, v) if *k2 == k => Some(*v),
        _ => None,
      })
      .unwrap_or_else(|| k.default_value())
  }

  pub fn str(&self, k: StrInstr) -> Option<&str> {
    (self.0.iter().rev()).find_map(|i| match i {
      Instr::Str(k2, v) if *k2 == k => Some(&**v),
      _ => None,
    })
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum TimeKind {
  ProofTime,
  SuccessTime,
  SimplifyTime,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Enum)]
pub enum IntKind {
  Goals,
  FailedGoals,
  TrivialGoals,
  SuccessfulGoals,
  Unfolds,
  Sections,
  Symbols,
  TrivialChecks,
  HardChecks,
  SuccessfulChecks,
  Equations,
  FailedEquations,
}

#[derive(Clone, Debug)]
pub enum Counter {
  Time(TimeKind, Duration),
  Int(IntKind, u32),
}

/// The single mutable sink of the reasoner: an ordered counter log and
/// the two latching flags.
#[derive(Clone, Debug, Default)]
pub struct RState {
  pub counters: Vec<Counter>,
  pub failed: bool,
  pub already_checked: bool,
}

impl RState {
  pub fn add_time(&mut self, k: TimeKind, d: Duration) { self.counters.push(Counter::Time(k, d)) }

  pub fn add_int(&mut self, k: IntKind, n: u32) { self.counters.push(Counter::Int(k, n)) }

  pub fn increment(&mut self, k: IntKind) { self.add_int(k, 1) }

  pub fn fetch_time(&self, k: TimeKind) -> Duration {
    (self.counters.iter())
      .filter_map(|c| match c {
        Counter::Time(k2, d) if *k2 == k => Some(*d),
        _ => None,
      })
      .sum()
  }

  pub fn fetch_int(&self, k: IntKind) -> u32 {
    (self.counters.iter())
      .filter_map(|c| match c {
        Counter::Int(k2, n) if *k2 == k => Some(*n),
        _ => None,
      })
      .sum()
  }

  /// The most recent entry for `k`. Reading from an empty log is a
  /// driver bug.
  pub fn last_time(&self, k: TimeKind) -> Duration {
    (self.counters.iter().rev())
      .find_map(|c| match c {
        Counter::Time(k2, d) if *k2 == k => Some(*d),
        _ => None,
      })
      .expect("timer read from an empty counter log")
  }

  pub fn time_totals(&self) -> EnumMap<TimeKind, Duration> {
    let mut m = EnumMap::default();
    for c in &self.counters {
      if let Counter::Time(k, d) = c {
        m[*k] += *d
      }
    }
    m
  }

  pub fn int_totals(&self) -> EnumMap<IntKind, u32> {
    let mut m = EnumMap::default();
    for c in &self.counters {
      if let Counter::Int(k, n) = c {
        m[*k] += *n
      }
    }
    m
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DefKind {
  Definition,
  Signature,
}

/// A definition or signature extension, keyed by the id of its head
/// symbol. Only `term`, `formula` and `kind` drive unfolding; the
/// remaining fields serve the surrounding ontological machinery.
#[derive(Clone, Debug)]
pub struct DefEntry {
  /// Hypotheses guarding the definiens.
  pub guards: Vec<Formula>,
  /// The definiens, with `ThisT` at the defined occurrence.
  pub formula: Formula,
  pub kind: DefKind,
  /// The defined term, arguments as pattern variables.
  pub term: Formula,
  /// Literal conjuncts of the definiens usable as info annotations.
  pub evidence: Vec<Formula>,
  /// Guards grouped per pattern variable of `term`.
  pub guard_groups: Vec<(Box<str>, Vec<Formula>)>,
}

impl DefEntry {
  pub fn new(term: Formula, formula: Formula, kind: DefKind) -> DefEntry {
    let mut conjuncts = vec![];
    formula.conjuncts(&mut conjuncts);
    let (body, guards): (Vec<&Formula>, Vec<&Formula>) =
      conjuncts.into_iter().partition(|f| f.occurs(&Formula::ThisT));
    let evidence = body.iter().filter(|f| f.is_literal()).map(|&f| f.clone()).collect();
    let guards: Vec<Formula> = guards.into_iter().cloned().collect();
    let mut guard_groups = vec![];
    if let Formula::Trm { args, .. } = &term {
      for arg in &**args {
        if let Formula::Var { name, .. } = arg {
          let group: Vec<Formula> = guards.iter().filter(|g| g.occurs(arg)).cloned().collect();
          guard_groups.push((name.clone(), group));
        }
      }
    }
    DefEntry { guards, formula, kind, term, evidence, guard_groups }
  }

  pub fn is_definition(&self) -> bool { self.kind == DefKind::Definition }
}

/// An evaluation rewrite: when `term` matches and all `conditions` hold
/// by evidence, an occurrence may be replaced by `positives` (in
/// positive position) or `negatives` (in negative position).
#[derive(Clone, Debug)]
pub struct Eval {
  pub term: Formula,
  pub positives: Formula,
  pub negatives: Formula,
  pub conditions: Vec<Formula>,
}

/// Read-mostly verification state, produced per goal by the surrounding
/// walker. The core never mutates it, only layers overrides.
#[derive(Clone)]
pub struct VState {
  pub thesis: Context,
  /// Ordered, most recent first.
  pub context: Vec<Context>,
  pub definitions: HashMap<TrId, DefEntry>,
  pub evaluations: DisTree<Eval>,
  pub meson_pos: Vec<MRule>,
  pub meson_neg: Vec<MRule>,
  pub provers: Vec<crate::export::Prover>,
  pub instructions: Instrs,
  pub skolem: SkId,
  /// Labels of the enclosing proof blocks, innermost last.
  pub branch: Vec<Box<str>>,
  pub pos: Position,
}
