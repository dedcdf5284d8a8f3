use hashbrown::HashMap;
use reason_core::context::{BlockKind, Context};
use reason_core::distree::DisTree;
use reason_core::formula::Formula;
use reason_core::types::{
  DefEntry, DefKind, Failure, Instr, Instrs, IntInstr, IntKind, Position, RState, SkId, TimeKind,
  TrId, VState,
};
use reason_core::Reasoner;
use std::time::Duration;

fn p(x: Formula) -> Formula { Formula::trm(TrId::USER_BASE, "p", vec![x]) }
fn q(x: Formula) -> Formula { Formula::trm(TrId(0x101), "q", vec![x]) }
fn r(x: Formula) -> Formula { Formula::trm(TrId(0x102), "r", vec![x]) }
fn s(x: Formula) -> Formula { Formula::trm(TrId(0x103), "s", vec![x]) }
fn a() -> Formula { Formula::trm(TrId(0x104), "a", vec![]) }

fn vstate(thesis: Formula, context: Vec<Context>) -> VState {
  VState {
    thesis: Context::new(thesis, BlockKind::Theorem, false, "thesis"),
    context,
    definitions: HashMap::new(),
    evaluations: DisTree::new(),
    meson_pos: vec![],
    meson_neg: vec![],
    provers: vec![],
    instructions: Instrs::default(),
    skolem: SkId(0),
    branch: vec![],
    pos: Position { line: 1, col: 1 },
  }
}

#[test]
fn trivial_goal_by_annotation() {
  // p(x) where x records p(ThisT): settled without any prover
  let x = Formula::var("x").with_info(vec![p(Formula::ThisT)]);
  let v = vstate(p(x), vec![]);
  let mut r = RState::default();
  assert_eq!(Reasoner::new(&v, &mut r).prove_thesis(), Ok(()));
  assert_eq!(r.fetch_int(IntKind::Goals), 1);
  assert_eq!(r.fetch_int(IntKind::TrivialGoals), 1);
  assert_eq!(r.fetch_int(IntKind::SuccessfulGoals), 0);
  assert_eq!(r.fetch_time(TimeKind::ProofTime), Duration::ZERO);
  assert!(!r.failed);
}

#[test]
fn contradictory_annotation_fails_the_goal() {
  let x = Formula::var("x").with_info(vec![Formula::neg(p(Formula::ThisT))]);
  let v = vstate(p(x), vec![]);
  let mut rs = RState::default();
  assert!(Reasoner::new(&v, &mut rs).prove_thesis().is_err());
  assert_eq!(rs.fetch_int(IntKind::TrivialGoals), 0);
  assert_eq!(rs.fetch_int(IntKind::FailedGoals), 1);
  assert!(rs.failed);
}

#[test]
fn conjunction_splits_and_uses_the_first_conjunct() {
  let x = || Formula::var("x").with_info(vec![p(Formula::ThisT)]);
  let v = vstate(Formula::and(p(x()), p(x())), vec![]);
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).prove_thesis(), Ok(()));
  // the split produced [A, A ⇒ B]; both discharge trivially
  assert_eq!(rs.fetch_int(IntKind::Goals), 2);
  assert_eq!(rs.fetch_int(IntKind::TrivialGoals), 2);
}

#[test]
fn unfolding_discharges_a_defined_goal() {
  // q(a) with q(y) ⇔ r(y) ∧ s(y), and a known to satisfy r and s
  let mut defs = HashMap::new();
  defs.insert(
    TrId(0x101),
    DefEntry::new(
      q(Formula::var("y")),
      Formula::and(r(Formula::var("y")), s(Formula::var("y"))),
      DefKind::Definition,
    ),
  );
  let arg = a().with_info(vec![r(Formula::ThisT), s(Formula::ThisT)]);
  let mut v = vstate(q(arg), vec![]);
  v.definitions = defs;
  v.instructions.push(Instr::Int(IntInstr::Depthlimit, 2));
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).prove_thesis(), Ok(()));
  assert_eq!(rs.fetch_int(IntKind::Unfolds), 1);
  // the original goal plus the recursive one
  assert_eq!(rs.fetch_int(IntKind::Goals), 2);
  assert_eq!(rs.fetch_int(IntKind::TrivialGoals), 1);
}

#[test]
fn depth_limit_stops_the_recursion() {
  let mut defs = HashMap::new();
  defs.insert(
    TrId(0x101),
    DefEntry::new(
      q(Formula::var("y")),
      Formula::and(r(Formula::var("y")), s(Formula::var("y"))),
      DefKind::Definition,
    ),
  );
  let arg = a().with_info(vec![r(Formula::ThisT), s(Formula::ThisT)]);
  let mut v = vstate(q(arg), vec![]);
  v.definitions = defs;
  v.instructions.push(Instr::Int(IntInstr::Depthlimit, 1));
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).prove_thesis(), Err(Failure::Exhausted));
  assert_eq!(rs.fetch_int(IntKind::FailedGoals), 1);
  assert_eq!(rs.fetch_int(IntKind::Unfolds), 0);
}

#[test]
fn negated_goal_unfolds_and_recurses() {
  // ¬q(a) with q(y) ⇔ r(y) ∧ s(y), and a known to falsify r: the
  // refutation assumption q(a) collapses under its definiens and the
  // recursive goal discharges trivially
  let mut defs = HashMap::new();
  defs.insert(
    TrId(0x101),
    DefEntry::new(
      q(Formula::var("y")),
      Formula::and(r(Formula::var("y")), s(Formula::var("y"))),
      DefKind::Definition,
    ),
  );
  let arg = a().with_info(vec![Formula::neg(r(Formula::ThisT))]);
  let mut v = vstate(Formula::neg(q(arg)), vec![]);
  v.definitions = defs;
  v.instructions.push(Instr::Int(IntInstr::Depthlimit, 2));
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).prove_thesis(), Ok(()));
  assert_eq!(rs.fetch_int(IntKind::Unfolds), 1);
  assert_eq!(rs.fetch_int(IntKind::Goals), 2);
  assert_eq!(rs.fetch_int(IntKind::TrivialGoals), 1);
}

#[test]
fn negated_goal_recursion_fails_deeper_without_panicking() {
  // a satisfies r and s, so ¬q(a) does not hold: the recursion still
  // runs one round and only then gives up at the depth limit
  let mut defs = HashMap::new();
  defs.insert(
    TrId(0x101),
    DefEntry::new(
      q(Formula::var("y")),
      Formula::and(r(Formula::var("y")), s(Formula::var("y"))),
      DefKind::Definition,
    ),
  );
  let arg = a().with_info(vec![r(Formula::ThisT), s(Formula::ThisT)]);
  let mut v = vstate(Formula::neg(q(arg)), vec![]);
  v.definitions = defs;
  v.instructions.push(Instr::Int(IntInstr::Depthlimit, 2));
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).prove_thesis(), Err(Failure::Exhausted));
  assert_eq!(rs.fetch_int(IntKind::Unfolds), 1);
  assert_eq!(rs.fetch_int(IntKind::Goals), 2);
  // the recursive goal fails, and with it the original one
  assert_eq!(rs.fetch_int(IntKind::FailedGoals), 2);
}

#[test]
fn negated_goal_hits_the_depth_limit() {
  let mut defs = HashMap::new();
  defs.insert(
    TrId(0x101),
    DefEntry::new(
      q(Formula::var("y")),
      Formula::and(r(Formula::var("y")), s(Formula::var("y"))),
      DefKind::Definition,
    ),
  );
  let arg = a().with_info(vec![Formula::neg(r(Formula::ThisT))]);
  let mut v = vstate(Formula::neg(q(arg)), vec![]);
  v.definitions = defs;
  v.instructions.push(Instr::Int(IntInstr::Depthlimit, 1));
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).prove_thesis(), Err(Failure::Exhausted));
  assert_eq!(rs.fetch_int(IntKind::Unfolds), 0);
  assert_eq!(rs.fetch_int(IntKind::FailedGoals), 1);
}

#[test]
fn zero_depth_fails_immediately() {
  let v = {
    let mut v = vstate(p(a()), vec![]);
    v.instructions.push(Instr::Int(IntInstr::Depthlimit, 0));
    v
  };
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).prove_thesis(), Err(Failure::Exhausted));
  assert_eq!(rs.fetch_int(IntKind::Goals), 0);
}

#[test]
fn fruitless_unfolding_reports_no_progress() {
  // nothing is defined, so the recursive branch cannot make progress
  let mut v = vstate(q(a()), vec![]);
  v.instructions.push(Instr::Int(IntInstr::Depthlimit, 2));
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).prove_thesis(), Err(Failure::NoProgress));
  assert_eq!(rs.fetch_int(IntKind::Unfolds), 0);
  assert!(rs.failed);
}

#[test]
fn meson_bridge_settles_local_goals() {
  let fact = Context::new(p(a()), BlockKind::Assumption, true, "");
  let chain = Context::new(
    Formula::all("x", Formula::imp(p(Formula::Ind { depth: 0 }), q(Formula::Ind { depth: 0 }))),
    BlockKind::Assumption,
    true,
    "",
  );
  let v = vstate(q(a()), vec![fact, chain]);
  let mut rs = RState::default();
  assert_eq!(Reasoner::new(&v, &mut rs).launch_reasoning(None), Ok(()));

  let v2 = vstate(r(a()), vec![]);
  let mut rs2 = RState::default();
  assert!(Reasoner::new(&v2, &mut rs2).launch_reasoning(None).is_err());
}

#[test]
fn top_level_context_is_invisible_to_meson() {
  // the same fact placed above the low-level prefix is out of reach
  let fact = Context::new(p(a()), BlockKind::Axiom, false, "ax");
  let v = vstate(p(a()), vec![fact]);
  let mut rs = RState::default();
  assert!(Reasoner::new(&v, &mut rs).launch_reasoning(None).is_err());
}
