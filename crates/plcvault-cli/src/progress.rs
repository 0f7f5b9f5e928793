//! Progress and cancellation wiring for interactive imports.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use plcvault_core::{ImportPhase, ProgressSink};

/// Logs each phase with its percentage.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
  fn report(&self, phase: ImportPhase) {
    tracing::info!(percent = phase.percent(), "{}", phase.label());
  }
}

/// A flag set by the first Ctrl-C. Imports observe it before writing.
pub fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
  let flag = Arc::new(AtomicBool::new(false));
  let handle = Arc::clone(&flag);
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("cancellation requested; stopping before the next write");
      handle.store(true, Ordering::SeqCst);
    }
  });
  flag
}
