use crate::context::Context;
use crate::error::ProverDbError;
use crate::formula::Formula;
use crate::types::{Instrs, IntInstr, StrInstr, TrId};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::{self, Read as _, Write as _};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProverFormat {
  Tptp,
  Dfg,
}

/// One entry of the prover database.
#[derive(Clone, Debug, PartialEq)]
pub struct Prover {
  pub name: Box<str>,
  pub label: Box<str>,
  pub path: Box<str>,
  pub args: Vec<Box<str>>,
  pub format: ProverFormat,
  pub successes: Vec<Box<str>>,
  pub failures: Vec<Box<str>>,
  pub unknowns: Vec<Box<str>>,
}

impl Prover {
  fn empty(name: &str) -> Prover {
    Prover {
      name: name.into(),
      label: "".into(),
      path: "".into(),
      args: vec![],
      format: ProverFormat::Tptp,
      successes: vec![],
      failures: vec![],
      unknowns: vec![],
    }
  }
}

/// Parses the prover database: one tag per line (`P` name, `L` label,
/// `C` command, `F` format, `Y`/`N`/`U` response patterns), `#`
/// comments and blank lines ignored.
pub fn parse_provers(text: &str) -> Result<Vec<Prover>, ProverDbError> {
  let mut out = vec![];
  let mut cur: Option<(usize, Prover)> = None;
  for (i, line) in text.lines().enumerate() {
    let n = i + 1;
    let line = line.trim_end();
    if line.is_empty() || line.starts_with('#') {
      continue
    }
    let (tag, rest) = line.split_at(1);
    let rest = rest.trim();
    let tag = tag.chars().next().unwrap();
    if tag == 'P' {
      if let Some((ln, p)) = cur.take() {
        out.push(validate(ln, p)?)
      }
      cur = Some((n, Prover::empty(rest)));
      continue
    }
    let Some((_, p)) = &mut cur else { return Err(ProverDbError::StrayLine(n)) };
    match tag {
      'L' => p.label = rest.into(),
      'C' => {
        let mut it = rest.split_whitespace();
        p.path = it.next().unwrap_or("").into();
        p.args = it.map(Into::into).collect()
      }
      'F' =>
        p.format = match rest {
          "tptp" => ProverFormat::Tptp,
          "dfg" => ProverFormat::Dfg,
          _ => return Err(ProverDbError::BadFormat(n, rest.into())),
        },
      'Y' => p.successes.push(rest.into()),
      'N' => p.failures.push(rest.into()),
      'U' => p.unknowns.push(rest.into()),
      c => return Err(ProverDbError::UnknownTag(n, c)),
    }
  }
  if let Some((ln, p)) = cur.take() {
    out.push(validate(ln, p)?)
  }
  Ok(out)
}

fn validate(line: usize, p: Prover) -> Result<Prover, ProverDbError> {
  if p.path.is_empty() {
    return Err(ProverDbError::MissingCommand(line, p.name))
  }
  if p.successes.is_empty() {
    return Err(ProverDbError::MissingSuccess(line, p.name))
  }
  if p.failures.is_empty() && p.unknowns.is_empty() {
    return Err(ProverDbError::MissingFailure(line, p.name))
  }
  Ok(p)
}

/// Loads and validates the database; a malformed entry is fatal.
pub fn load_provers(path: &Path) -> io::Result<Vec<Prover>> {
  let text = std::fs::read_to_string(path)?;
  match parse_provers(&text) {
    Ok(ps) => Ok(ps),
    Err(e) => {
      e.report(path);
      Err(io::Error::new(io::ErrorKind::InvalidData, "invalid prover database"))
    }
  }
}

fn sym(name: &str) -> String {
  let mut s = String::new();
  for c in name.chars() {
    if c.is_ascii_alphanumeric() {
      s.extend(c.to_lowercase())
    } else {
      s.push('_')
    }
  }
  if !s.starts_with(|c: char| c.is_ascii_lowercase()) {
    s.insert(0, 's')
  }
  s
}

fn var(name: &str) -> String {
  let mut s = String::from("W");
  s.extend(name.chars().filter(|c| c.is_ascii_alphanumeric()));
  s
}

fn bound(d: u32, depth: u32) -> u32 {
  d.checked_sub(depth + 1).expect("unbound de Bruijn variable in export")
}

struct Tptp<'a>(&'a Formula, u32);

impl std::fmt::Display for Tptp<'_> {
  fn fmt(&self, w: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let d = self.1;
    match self.0.strip() {
      Formula::Top => write!(w, "$true"),
      Formula::Bot => write!(w, "$false"),
      Formula::Not { f } => write!(w, "~ {}", Tptp(f, d)),
      Formula::And { f, g } => write!(w, "({} & {})", Tptp(f, d), Tptp(g, d)),
      Formula::Or { f, g } => write!(w, "({} | {})", Tptp(f, d), Tptp(g, d)),
      Formula::Imp { f, g } => write!(w, "({} => {})", Tptp(f, d), Tptp(g, d)),
      Formula::Iff { f, g } => write!(w, "({} <=> {})", Tptp(f, d), Tptp(g, d)),
      Formula::All { f, .. } => write!(w, "! [V{d}] : {}", Tptp(f, d + 1)),
      Formula::Exi { f, .. } => write!(w, "? [V{d}] : {}", Tptp(f, d + 1)),
      Formula::Trm { id: TrId::EQUALITY, args, .. } =>
        write!(w, "({} = {})", Tptp(&args[0], d), Tptp(&args[1], d)),
      Formula::Trm { name, args, .. } => {
        write!(w, "{}", sym(name))?;
        if !args.is_empty() {
          write!(w, "(")?;
          for (i, a) in args.iter().enumerate() {
            if i > 0 {
              write!(w, ",")?
            }
            write!(w, "{}", Tptp(a, d))?
          }
          write!(w, ")")?
        }
        Ok(())
      }
      Formula::Var { name, .. } => write!(w, "{}", var(name)),
      Formula::Ind { depth } => write!(w, "V{}", bound(d, *depth)),
      Formula::ThisT => write!(w, "this_t"),
      Formula::Tag { .. } => unreachable!("strip left a tag"),
    }
  }
}

struct Dfg<'a>(&'a Formula, u32);

impl std::fmt::Display for Dfg<'_> {
  fn fmt(&self, w: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let d = self.1;
    match self.0.strip() {
      Formula::Top => write!(w, "true"),
      Formula::Bot => write!(w, "false"),
      Formula::Not { f } => write!(w, "not({})", Dfg(f, d)),
      Formula::And { f, g } => write!(w, "and({},{})", Dfg(f, d), Dfg(g, d)),
      Formula::Or { f, g } => write!(w, "or({},{})", Dfg(f, d), Dfg(g, d)),
      Formula::Imp { f, g } => write!(w, "implies({},{})", Dfg(f, d), Dfg(g, d)),
      Formula::Iff { f, g } => write!(w, "equiv({},{})", Dfg(f, d), Dfg(g, d)),
      Formula::All { f, .. } => write!(w, "forall([V{d}],{})", Dfg(f, d + 1)),
      Formula::Exi { f, .. } => write!(w, "exists([V{d}],{})", Dfg(f, d + 1)),
      Formula::Trm { id: TrId::EQUALITY, args, .. } =>
        write!(w, "equal({},{})", Dfg(&args[0], d), Dfg(&args[1], d)),
      Formula::Trm { name, args, .. } => {
        write!(w, "{}", sym(name))?;
        if !args.is_empty() {
          write!(w, "(")?;
          for (i, a) in args.iter().enumerate() {
            if i > 0 {
              write!(w, ",")?
            }
            write!(w, "{}", Dfg(a, d))?
          }
          write!(w, ")")?
        }
        Ok(())
      }
      Formula::Var { name, .. } => write!(w, "{}", var(name)),
      Formula::Ind { depth } => write!(w, "V{}", bound(d, *depth)),
      Formula::ThisT => write!(w, "this_t"),
      Formula::Tag { .. } => unreachable!("strip left a tag"),
    }
  }
}

/// Collects the signature: predicates are terms at formula positions,
/// functions are terms below them. Equality is builtin and skipped.
fn collect_symbols(
  f: &Formula, at_formula: bool, preds: &mut BTreeSet<(String, usize)>,
  funcs: &mut BTreeSet<(String, usize)>,
) {
  match f.strip() {
    Formula::Trm { id, name, args, .. } => {
      if *id != TrId::EQUALITY {
        let set = if at_formula { &mut *preds } else { &mut *funcs };
        set.insert((sym(name), args.len()));
      }
      for a in &**args {
        collect_symbols(a, false, preds, funcs)
      }
    }
    f => f.for_each_sub(|g| collect_symbols(g, true, preds, funcs)),
  }
}

/// Renders the whole task in the prover's input format. The context
/// arrives most recent first and is emitted chronologically.
pub fn render_task(
  format: ProverFormat, on_reduced: bool, context: &[Context], goal: &Context,
) -> String {
  fn pick(on_reduced: bool, c: &Context) -> &Formula {
    if on_reduced { &c.reduced } else { &c.formula }
  }
  macro_rules! pick {
    ($c:expr) => {
      pick(on_reduced, $c)
    };
  }
  let mut out = String::new();
  match format {
    ProverFormat::Tptp => {
      for (i, c) in context.iter().rev().enumerate() {
        let _ = writeln!(out, "fof(m{i}, hypothesis, {}).", Tptp(pick!(c), 0));
      }
      let _ = writeln!(out, "fof(m__, conjecture, {}).", Tptp(pick!(goal), 0));
    }
    ProverFormat::Dfg => {
      let (mut preds, mut funcs) = (BTreeSet::new(), BTreeSet::new());
      for c in context.iter().chain(std::iter::once(goal)) {
        collect_symbols(pick!(c), true, &mut preds, &mut funcs)
      }
      let _ = writeln!(out, "begin_problem(reason).\n");
      let _ = writeln!(out, "list_of_descriptions.");
      let _ = writeln!(out, "name({{* reasoning task *}}).");
      let _ = writeln!(out, "author({{* reason-core *}}).");
      let _ = writeln!(out, "status(unknown).");
      let _ = writeln!(out, "description({{* exported goal with context *}}).");
      let _ = writeln!(out, "end_of_list.\n");
      let _ = writeln!(out, "list_of_symbols.");
      if !funcs.is_empty() {
        let _ =
          writeln!(out, "functions[{}].", funcs.iter().map(|(n, a)| format!("({n},{a})")).join(", "));
      }
      if !preds.is_empty() {
        let _ =
          writeln!(out, "predicates[{}].", preds.iter().map(|(n, a)| format!("({n},{a})")).join(", "));
      }
      let _ = writeln!(out, "end_of_list.\n");
      let _ = writeln!(out, "list_of_formulae(axioms).");
      for (i, c) in context.iter().rev().enumerate() {
        let _ = writeln!(out, "formula({},m{i}).", Dfg(pick!(c), 0));
      }
      let _ = writeln!(out, "end_of_list.\n");
      let _ = writeln!(out, "list_of_formulae(conjectures).");
      let _ = writeln!(out, "formula({},m__).", Dfg(pick!(goal), 0));
      let _ = writeln!(out, "end_of_list.\n");
      let _ = writeln!(out, "end_problem.");
    }
  }
  out
}

fn classify(prover: &Prover, output: &str) -> Option<bool> {
  for line in output.lines() {
    if prover.successes.iter().any(|p| line.starts_with(&**p)) {
      return Some(true)
    }
    if prover.failures.iter().any(|p| line.starts_with(&**p)) {
      return Some(false)
    }
    if prover.unknowns.iter().any(|p| line.starts_with(&**p)) {
      return Some(false)
    }
  }
  None
}

/// Pipes the task over stdin and polls the subprocess under the time
/// limit; an overrun kills the prover and counts as failure.
fn run_prover(prover: &Prover, task: &str, limit: Duration) -> io::Result<bool> {
  let secs = limit.as_secs().to_string();
  let mut cmd = Command::new(&*prover.path);
  for a in &prover.args {
    cmd.arg(a.replace("%d", &secs));
  }
  cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null());
  let mut child = cmd.spawn()?;
  {
    let mut stdin = child.stdin.take().expect("stdin was piped");
    // a prover may exit before reading the whole task
    let _ = stdin.write_all(task.as_bytes());
  }
  let mut stdout = child.stdout.take().expect("stdout was piped");
  let reader = std::thread::spawn(move || {
    let mut buf = String::new();
    let _ = stdout.read_to_string(&mut buf);
    buf
  });
  let start = Instant::now();
  let grace = Duration::from_secs(1);
  loop {
    if child.try_wait()?.is_some() {
      break
    }
    if start.elapsed() > limit + grace {
      let _ = child.kill();
      let _ = child.wait();
      let _ = reader.join();
      return Ok(false)
    }
    std::thread::sleep(Duration::from_millis(10))
  }
  let output = reader.join().unwrap_or_default();
  Ok(classify(prover, &output).unwrap_or_else(|| {
    eprintln!("warning: prover {} gave no recognizable verdict", prover.name);
    false
  }))
}

/// Serializes the goal and context, invokes the selected ATP, and
/// classifies its response. Every unfolding round grants the prover one
/// more second on top of the `Timelimit` instruction.
pub fn export(
  on_reduced: bool, iteration: u32, provers: &[Prover], instrs: &Instrs, context: &[Context],
  goal: &Context,
) -> io::Result<bool> {
  let prover = match instrs.str(StrInstr::Prover) {
    Some(name) if !name.is_empty() => provers.iter().find(|p| &*p.name == name).ok_or_else(|| {
      io::Error::new(io::ErrorKind::NotFound, format!("prover '{name}' not in the database"))
    })?,
    _ => provers.first().ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no provers loaded"))?,
  };
  let limit = Duration::from_secs((instrs.int(IntInstr::Timelimit) + iteration) as u64);
  let task = render_task(prover.format, on_reduced, context, goal);
  run_prover(prover, &task, limit)
}
