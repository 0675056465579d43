//! Scoped instrumentation hook for the summation passes
//!
//! Passes bracket their work with `start(label)` / `stop(label)`.
//! Hooks never fail and never feed anything back into the numerics.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub trait Timer {
    fn start(&self, label: &str);
    fn stop(&self, label: &str);
}

/// Logs the wall time of each labelled section at `debug` level
#[derive(Debug, Default)]
pub struct LogTimer {
    started: Mutex<HashMap<String, Instant>>,
}

impl LogTimer {
    // a panic in another pass leaves the map itself intact
    fn started(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.started.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Timer for LogTimer {
    fn start(&self, label: &str) {
        self.started().insert(label.to_owned(), Instant::now());
    }

    fn stop(&self, label: &str) {
        let t0 = self.started().remove(label);
        match t0 {
            Some(t0) => log::debug!("{label:<20} : {:.6} s", t0.elapsed().as_secs_f64()),
            None => log::warn!("timer '{label}' stopped without being started"),
        }
    }
}
