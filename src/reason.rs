use crate::context::{filter_context, Context};
use crate::evidence::reduce_with_evidence;
use crate::formula::Formula;
use crate::meson::{self, Watchdog};
use crate::set_verbose;
use crate::types::{BoolInstr, Failure, IntInstr, IntKind, OrFail, RState, TimeKind, VState};
use crate::unfold::Unfolder;
use crate::{export, vprintln};
use itertools::Itertools;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

/// The goal driver: a read-only state snapshot plus the mutable
/// counter sink.
pub struct Reasoner<'a> {
  pub v: &'a VState,
  pub r: &'a mut RState,
}

impl<'a> Reasoner<'a> {
  pub fn new(v: &'a VState, r: &'a mut RState) -> Reasoner<'a> { Reasoner { v, r } }

  fn log(&self, gate: BoolInstr, args: std::fmt::Arguments<'_>) {
    if self.v.instructions.bool(gate) {
      eprintln!("[reason] {:?}: {}", self.v.pos, args)
    }
  }

  /// Filters the context, splits the thesis into goals, and discharges
  /// each in turn. Any goal failing all alternatives aborts the thesis.
  pub fn prove_thesis(&mut self) -> OrFail {
    let depth = self.v.instructions.int(IntInstr::Depthlimit);
    if depth == 0 {
      return Err(Failure::Exhausted)
    }
    let (context, missing) = filter_context(&self.v.thesis, &self.v.context);
    if !missing.is_empty() {
      eprintln!(
        "[reason] {:?}: warning: could not find the cited sections {}",
        self.v.pos,
        missing.iter().format(", ")
      );
    }
    let goals = split_goal(&self.v.thesis.formula);
    self.sequence_goals(&context, depth, 0, goals)
  }

  fn sequence_goals(
    &mut self, context: &[Context], depth: u32, iteration: u32, goals: Vec<Formula>,
  ) -> OrFail {
    for goal in goals {
      if let Some(n) = crate::FIRST_VERBOSE_GOAL {
        set_verbose(self.r.fetch_int(IntKind::Goals) >= n)
      }
      vprintln!("goal {}: {goal:?}", self.r.fetch_int(IntKind::Goals));
      self.r.increment(IntKind::Goals);
      let reduced = reduce_with_evidence(&goal);
      let outcome = (self.trivial(&goal, &reduced))
        .or_else(|_| self.launch_prover(context, &goal, &reduced, iteration))
        .or_else(|_| self.reason(context, &goal, depth, iteration));
      if let Err(e) = outcome {
        self.log(BoolInstr::Printreason, format_args!("goal failed: {goal:?}"));
        self.r.increment(IntKind::FailedGoals);
        self.r.failed = true;
        return Err(e)
      }
    }
    Ok(())
  }

  fn trivial(&mut self, goal: &Formula, reduced: &Formula) -> OrFail {
    if !reduced.is_top() {
      return Err(Failure::Rejected)
    }
    if !goal.is_top() {
      self.log(BoolInstr::Printreason, format_args!("trivial: {goal:?}"))
    }
    self.r.increment(IntKind::TrivialGoals);
    Ok(())
  }

  /// Sends the goal to the external prover under the `ProofTime` timer.
  /// A successful span is mirrored into `SuccessTime`.
  fn launch_prover(
    &mut self, context: &[Context], goal: &Formula, reduced: &Formula, iteration: u32,
  ) -> OrFail {
    let on_reduced = self.v.instructions.bool(BoolInstr::Ontored);
    if self.v.instructions.bool(BoolInstr::Printfulltask) {
      let mut msg = String::from("prover task:\n");
      for c in context.iter().rev() {
        let f = if on_reduced { &c.reduced } else { &c.formula };
        msg.push_str(&format!("  {:?}\n", f));
      }
      msg.push_str(&format!("  |- {goal:?}"));
      eprintln!("[reason] {:?}: {msg}", self.v.pos);
    }
    let mut goal_ctx = self.v.thesis.set_form(goal.clone());
    goal_ctx.reduced = reduced.clone();
    let start = Instant::now();
    let outcome = export::export(
      on_reduced,
      iteration,
      &self.v.provers,
      &self.v.instructions,
      context,
      &goal_ctx,
    );
    self.r.add_time(TimeKind::ProofTime, start.elapsed());
    match outcome {
      Ok(true) => {
        let time = self.r.last_time(TimeKind::ProofTime);
        self.r.add_time(TimeKind::SuccessTime, time);
        self.r.increment(IntKind::SuccessfulGoals);
        Ok(())
      }
      Ok(false) => Err(Failure::Rejected),
      Err(e) => {
        self.log(BoolInstr::Printreason, format_args!("prover unavailable: {e}"));
        Err(Failure::Rejected)
      }
    }
  }

  /// The recursive branch: unfold the negated goal and the low-level
  /// context once, then try again one level deeper.
  fn reason(&mut self, context: &[Context], goal: &Formula, depth: u32, iteration: u32) -> OrFail {
    if depth == 1 {
      self.log(BoolInstr::Printreason, format_args!("reasoning depth exceeded"));
      return Err(Failure::Exhausted)
    }
    let task = self.unfold(context, goal)?;
    let (head, rest) = task.split_first().expect("unfold returned an empty task");
    // the new goal is the negation of the head of the returned task
    let new_goal = head.formula.clone().mk_neg();
    self.sequence_goals(rest, depth - 1, iteration + 1, vec![new_goal])
  }

  /// One round of conservative unfolding over the task `¬goal :
  /// context`. Fails the alternative when nothing was expanded.
  fn unfold(&mut self, context: &[Context], goal: &Formula) -> OrFail<Vec<Context>> {
    let ins = &self.v.instructions;
    let unfold_general = ins.bool(BoolInstr::Unfold);
    let unfold_low = ins.bool(BoolInstr::Unfoldlow);
    let unfold_sf = ins.bool(BoolInstr::Unfoldsf);
    let unfold_low_sf = ins.bool(BoolInstr::Unfoldlowsf);
    if !unfold_general && !unfold_sf {
      return Err(Failure::NoProgress)
    }
    let split = context.iter().position(|c| !c.low_level).unwrap_or(context.len());
    let (low, top) = context.split_at(split);
    let mut head = self.v.thesis.set_form(goal.clone().mk_neg());
    head.low_level = true;
    let mut uf = Unfolder::new(&self.v.definitions, &self.v.evaluations, unfold_general, unfold_sf);
    let mut new_low = vec![uf.unfold_conservative(&head)];
    uf.unfold = unfold_general && unfold_low;
    uf.unfold_sf = unfold_sf && unfold_low_sf;
    for c in low {
      new_low.push(uf.unfold_conservative(c))
    }
    for c in &new_low {
      self.log(BoolInstr::Printunfold, format_args!("unfolded: {:?}", c.formula));
    }
    if uf.count == 0 {
      self.log(BoolInstr::Printunfold, format_args!("nothing to unfold"));
      return Err(Failure::NoProgress)
    }
    self.r.add_int(IntKind::Unfolds, uf.count);
    new_low.extend(top.iter().cloned());
    Ok(new_low)
  }

  /// The fast MESON filter over the low-level context, under a hard
  /// 1 ms wall-clock budget with a cooperative stop point.
  pub fn launch_reasoning(&mut self, cancel: Option<&AtomicBool>) -> OrFail {
    let low: Vec<&Context> = self.v.context.iter().take_while(|c| c.low_level).collect();
    let dog = Watchdog::new(Duration::from_micros(1000), cancel);
    let proved = meson::prove(
      self.v.skolem,
      &low,
      &self.v.meson_pos,
      &self.v.meson_neg,
      &self.v.thesis.formula,
      &dog,
    );
    if proved {
      Ok(())
    } else {
      Err(Failure::Timeout)
    }
  }
}

/// Splits a thesis into sequential goals: universals distribute over
/// every sub-goal, the first conjunct becomes a hypothesis of the
/// second, and a left disjunct stays as a standing alternative.
pub fn split_goal(f: &Formula) -> Vec<Formula> { split(f.strip().clone()) }

fn split(f: Formula) -> Vec<Formula> {
  match f.albet() {
    Formula::All { decl, f } => (split(*f).into_iter())
      .map(|g| Formula::All { decl: decl.clone(), f: Box::new(g) })
      .collect(),
    Formula::And { f, g } => {
      let mut out = split((*f).clone());
      out.extend(split(Formula::Imp { f, g }));
      out
    }
    Formula::Or { f, g } =>
      (split(*g).into_iter()).map(|h| Formula::Or { f: f.clone(), g: Box::new(h) }).collect(),
    f => vec![f],
  }
}
