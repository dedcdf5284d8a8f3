//! The reasoning core of a natural-language proof assistant.
//!
//! Given a goal formula and a stack of contextual assumptions, the core
//! decides whether the goal follows by direct evidence collected on
//! subterms ([`evidence`]), by a bounded recursive unfolding of local
//! definitions ([`unfold`]), by the internal model-elimination prover
//! ([`meson`]), or by delegation to an external ATP ([`export`]).
//! The driver tying these together lives in [`reason`].

use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod context;
pub mod distree;
pub mod error;
pub mod evidence;
pub mod export;
pub mod formula;
pub mod meson;
pub mod reason;
pub mod types;
pub mod unfold;
pub mod unify;

pub use context::Context;
pub use formula::{Formula, Tag};
pub use reason::Reasoner;
pub use types::{RState, VState};

/// Default location of the prover database, overridable via the
/// `REASON_PROVERS` environment variable.
pub static PROVER_DB: Lazy<PathBuf> = Lazy::new(|| {
  std::env::var_os("REASON_PROVERS").map_or_else(|| "provers.dat".into(), PathBuf::from)
});

/// Set to `Some(n)` to turn on verbose output from goal `n` onward.
pub const FIRST_VERBOSE_GOAL: Option<u32> = None;

static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(b: bool) { VERBOSE.store(b, Ordering::Relaxed) }
pub fn verbose() -> bool { VERBOSE.load(Ordering::Relaxed) }

#[macro_export]
macro_rules! vprintln {
  ($($args:tt)*) => {
    if $crate::verbose() {
      eprintln!($($args)*)
    }
  };
}
