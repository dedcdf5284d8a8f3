use crate::context::Context;
use crate::formula::{inst, inst_with, Formula};
use crate::types::{Idx, SkId, TrId};
use crate::unify::{unify, Subst};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative stop token for the time-budgeted search. The solver
/// checks it at every node, so a host cancellation or the wall-clock
/// deadline fires promptly.
pub struct Watchdog<'a> {
  deadline: Instant,
  cancel: Option<&'a AtomicBool>,
}

impl<'a> Watchdog<'a> {
  pub fn new(budget: Duration, cancel: Option<&'a AtomicBool>) -> Watchdog<'a> {
    Watchdog { deadline: Instant::now() + budget, cancel }
  }

  pub fn expired(&self) -> bool {
    Instant::now() >= self.deadline || self.cancel.is_some_and(|c| c.load(Ordering::Relaxed))
  }
}

#[derive(Copy, Clone, Debug)]
pub struct Stopped;
pub type OrStopped<T> = Result<T, Stopped>;

/// A model-elimination rule: `conc` holds once every assumption does.
#[derive(Clone, Debug)]
pub struct MRule {
  pub asms: Vec<Formula>,
  pub conc: Formula,
}

/// All contrapositives of a clause given as literals.
pub fn contrapositives(clause: &[Formula]) -> Vec<MRule> {
  (0..clause.len())
    .map(|i| MRule {
      asms: (clause.iter().enumerate())
        .filter(|&(j, _)| j != i)
        .map(|(_, l)| Formula::neg(l.clone()).albet())
        .collect(),
      conc: clause[i].clone(),
    })
    .collect()
}

/// Splits rules into those concluding positive and negative literals,
/// the pair the verification state carries precomputed.
pub fn sort_rules(rules: Vec<MRule>) -> (Vec<MRule>, Vec<MRule>) {
  rules.into_iter().partition(|r| !matches!(r.conc.strip(), Formula::Not { .. }))
}

/// Clause-normalizes formulas: negations pushed by `albet`, universals
/// opened onto fresh variables, existentials skolemized over the
/// variables in scope, disjunctions distributed.
struct Clausifier {
  skolem: SkId,
  fresh: u32,
}

impl Clausifier {
  fn clauses(&mut self, f: Formula, free: &mut Vec<Formula>) -> Vec<Vec<Formula>> {
    match f.albet() {
      Formula::And { f, g } => {
        let mut out = self.clauses(*f, free);
        out.extend(self.clauses(*g, free));
        out
      }
      Formula::All { f, .. } => {
        let name = format!("X{}", self.fresh.fresh());
        free.push(Formula::var(&name));
        let out = self.clauses(inst(&name, &f), free);
        free.pop();
        out
      }
      Formula::Exi { f, .. } => {
        let n = self.skolem.fresh();
        let sk = Formula::trm(TrId::skolem(n), &format!("sk{}", n.0), free.clone());
        self.clauses(inst_with(&sk, &f), free)
      }
      Formula::Or { f, g } => {
        let left = self.clauses(*f, free);
        let right = self.clauses(*g, free);
        let mut out = vec![];
        for c1 in &left {
          for c2 in &right {
            let mut c = c1.clone();
            c.extend(c2.iter().cloned());
            out.push(c)
          }
        }
        out
      }
      Formula::Imp { f, g } => self.clauses(Formula::or(Formula::neg(*f), *g), free),
      Formula::Tag { f, .. } => self.clauses(*f, free),
      Formula::Top => vec![],
      Formula::Bot => vec![vec![]],
      lit => vec![vec![lit]],
    }
  }
}

/// Immutable cons-list of ancestor literals along the current branch.
#[derive(Clone, Default)]
struct Ancestors(Option<Rc<(Formula, Ancestors)>>);

impl Ancestors {
  fn push(&self, f: Formula) -> Ancestors { Ancestors(Some(Rc::new((f, self.clone())))) }

  fn iter(&self) -> AncIter<'_> { AncIter(self) }
}

struct AncIter<'a>(&'a Ancestors);

impl<'a> Iterator for AncIter<'a> {
  type Item = &'a Formula;
  fn next(&mut self) -> Option<&'a Formula> {
    let node = self.0 .0.as_deref()?;
    self.0 = &node.1;
    Some(&node.0)
  }
}

#[derive(Clone)]
struct Goal {
  lit: Formula,
  depth: u32,
  ancestors: Ancestors,
}

struct Prover<'a> {
  positives: Vec<MRule>,
  negatives: Vec<MRule>,
  /// Start rules from the negated goal, concluding absurdity.
  starts: Vec<MRule>,
  fresh: Cell<u32>,
  dog: &'a Watchdog<'a>,
}

impl Prover<'_> {
  fn rules_for(&self, lit: &Formula) -> &[MRule] {
    match lit.strip() {
      Formula::Bot => &self.starts,
      Formula::Not { .. } => &self.negatives,
      _ => &self.positives,
    }
  }

  fn solve(&self, sb: &Subst, goals: &[Goal]) -> OrStopped<bool> {
    if self.dog.expired() {
      return Err(Stopped)
    }
    let [goal, rest @ ..] = goals else { return Ok(true) };
    // reduction: close the branch against an ancestor
    for anc in goal.ancestors.iter() {
      let mut sb2 = sb.clone();
      if unify_complement(&goal.lit, anc, &mut sb2) && self.solve(&sb2, rest)? {
        return Ok(true)
      }
    }
    // expansion: apply a rule concluding this literal
    if goal.depth == 0 {
      return Ok(false)
    }
    for rule in self.rules_for(&goal.lit) {
      let k = self.fresh.get();
      self.fresh.set(k + 1);
      let rule = rename(rule, k);
      let mut sb2 = sb.clone();
      if !unify_literal(&rule.conc, &goal.lit, &mut sb2) {
        continue
      }
      let ancestors = goal.ancestors.push(goal.lit.clone());
      let mut goals2: Vec<Goal> = (rule.asms.iter())
        .map(|l| Goal { lit: l.clone(), depth: goal.depth - 1, ancestors: ancestors.clone() })
        .collect();
      goals2.extend(rest.iter().cloned());
      if self.solve(&sb2, &goals2)? {
        return Ok(true)
      }
    }
    Ok(false)
  }
}

fn unify_literal(a: &Formula, b: &Formula, sb: &mut Subst) -> bool {
  match (a.strip(), b.strip()) {
    (Formula::Not { f }, Formula::Not { f: g }) => unify(f, g, sb),
    (Formula::Not { .. }, _) | (_, Formula::Not { .. }) => false,
    (Formula::Bot, Formula::Bot) => true,
    (a, b) => unify(a, b, sb),
  }
}

fn unify_complement(a: &Formula, b: &Formula, sb: &mut Subst) -> bool {
  match (a.strip(), b.strip()) {
    (Formula::Not { f }, b @ Formula::Trm { .. }) => unify(f, b, sb),
    (a @ Formula::Trm { .. }, Formula::Not { f }) => unify(a, f, sb),
    _ => false,
  }
}

fn rename(rule: &MRule, k: u32) -> MRule {
  MRule {
    asms: rule.asms.iter().map(|f| rename_vars(f, k)).collect(),
    conc: rename_vars(&rule.conc, k),
  }
}

fn rename_vars(f: &Formula, k: u32) -> Formula {
  match f {
    Formula::Var { name, info } =>
      Formula::Var { name: format!("{name}'{k}").into(), info: info.clone() },
    f => f.clone().map_sub(&mut |g| rename_vars(&g, k)),
  }
}

const MAX_DEPTH: u32 = 16;

/// Attempts to refute the negated goal from the low-level context and
/// the precomputed rule base. The verdict is definite: `true` only on a
/// completed proof within the watchdog budget.
pub fn prove(
  skolem: SkId, low_context: &[&Context], positives: &[MRule], negatives: &[MRule],
  goal: &Formula, dog: &Watchdog<'_>,
) -> bool {
  let mut cl = Clausifier { skolem, fresh: 0 };
  let mut pos = positives.to_vec();
  let mut neg = negatives.to_vec();
  let mut starts = vec![];
  let add = |rule: MRule, pos: &mut Vec<MRule>, neg: &mut Vec<MRule>| {
    if matches!(rule.conc.strip(), Formula::Not { .. }) {
      neg.push(rule)
    } else {
      pos.push(rule)
    }
  };
  for c in low_context {
    for clause in cl.clauses(c.formula.clone(), &mut vec![]) {
      for rule in contrapositives(&clause) {
        add(rule, &mut pos, &mut neg)
      }
    }
  }
  for clause in cl.clauses(Formula::neg(goal.clone()), &mut vec![]) {
    starts.push(MRule {
      asms: clause.iter().map(|l| Formula::neg(l.clone()).albet()).collect(),
      conc: Formula::Bot,
    });
    for rule in contrapositives(&clause) {
      add(rule, &mut pos, &mut neg)
    }
  }
  let prover = Prover { positives: pos, negatives: neg, starts, fresh: Cell::new(0), dog };
  for depth in 1..=MAX_DEPTH {
    let start = Goal { lit: Formula::Bot, depth, ancestors: Ancestors::default() };
    match prover.solve(&Subst::new(), &[start]) {
      Err(Stopped) => return false,
      Ok(true) => return true,
      Ok(false) => {}
    }
  }
  false
}
