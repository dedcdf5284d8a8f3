use std::path::Path;

#[derive(PartialEq, Eq)]
enum Severity {
  Error,
  #[allow(unused)]
  Warning,
}

/// Fatal defects in the prover database. Reported with the offending
/// line and aborting the load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProverDbError {
  /// A tag line appeared before any `P` line.
  StrayLine(usize),
  /// A line starting with an unknown tag character.
  UnknownTag(usize, char),
  /// An `F` line naming neither `tptp` nor `dfg`.
  BadFormat(usize, Box<str>),
  /// A prover without a `C` command line.
  MissingCommand(usize, Box<str>),
  /// A prover without any `Y` success pattern.
  MissingSuccess(usize, Box<str>),
  /// A prover with neither an `N` nor a `U` pattern.
  MissingFailure(usize, Box<str>),
}

impl ProverDbError {
  pub fn report(self, file: &Path) -> bool {
    let severity = Severity::Error;
    let (line, msg) = match &self {
      ProverDbError::StrayLine(n) => (*n, "tag line before the first P entry".to_string()),
      ProverDbError::UnknownTag(n, c) => (*n, format!("unknown tag '{c}'")),
      ProverDbError::BadFormat(n, s) => (*n, format!("unknown format '{s}' (expected tptp or dfg)")),
      ProverDbError::MissingCommand(n, p) => (*n, format!("prover '{p}' declares no command line")),
      ProverDbError::MissingSuccess(n, p) => (*n, format!("prover '{p}' has no success pattern")),
      ProverDbError::MissingFailure(n, p) =>
        (*n, format!("prover '{p}' has neither a failure nor an unknown pattern")),
    };
    let sev = match severity {
      Severity::Error => "error",
      Severity::Warning => "warning",
    };
    eprintln!("{}:{line}: {sev}: {msg}", file.to_string_lossy());
    severity == Severity::Error
  }
}
