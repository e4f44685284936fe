//! Engine configuration (§6.3).

use rustc_hash::FxHashSet;

use crate::kb::DEFAULT_REFLEXIVE_PREDICATES;

/// Tunables for an [`crate::engine::Engine`] (§6.3). Construct with
/// [`EngineConfig::default`] and override individual fields, mirroring the
/// way the teacher's `Config` structs are built.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on assertion count (≥ 10; default 65536).
    pub max_kb_size: usize,
    /// Size of the inference worker pool (≥ 2; default `max(2, ncpu/2)`).
    pub inference_workers: usize,
    /// Bound on the commit queue's FIFO capacity (default 10000).
    pub commit_queue_capacity: usize,
    /// Fixpoint iteration cap for [`crate::unify::substitute`] (default 50).
    pub subst_max_depth: usize,
    /// Whether `input` events should be forwarded over an external
    /// transport; a transport's concern, the core only honors the flag
    /// when deciding whether to emit the event (default false).
    pub broadcast_input_events: bool,
    /// Predicates treated as reflexive for the triviality check (§4.4).
    pub reflexive_predicates: FxHashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let ncpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        Self {
            max_kb_size: 65536,
            inference_workers: (ncpu / 2).max(2),
            commit_queue_capacity: 10_000,
            subst_max_depth: crate::unify::DEFAULT_MAX_SUBST_DEPTH,
            broadcast_input_events: false,
            reflexive_predicates: DEFAULT_REFLEXIVE_PREDICATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Clamp configuration values to their documented minimums
    /// (`max_kb_size >= 10`, `inference_workers >= 2`), logging if a
    /// supplied value was out of range.
    pub fn normalized(mut self) -> Self {
        if self.max_kb_size < 10 {
            tracing::warn!(requested = self.max_kb_size, "max_kb_size below minimum, clamping to 10");
            self.max_kb_size = 10;
        }
        if self.inference_workers < 2 {
            tracing::warn!(
                requested = self.inference_workers,
                "inference_workers below minimum, clamping to 2"
            );
            self.inference_workers = 2;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_meets_minimums() {
        let cfg = EngineConfig::default();
        assert!(cfg.max_kb_size >= 10);
        assert!(cfg.inference_workers >= 2);
        assert_eq!(cfg.subst_max_depth, 50);
        assert!(!cfg.broadcast_input_events);
    }

    #[test]
    fn normalized_clamps_out_of_range_values() {
        let cfg = EngineConfig {
            max_kb_size: 1,
            inference_workers: 0,
            ..EngineConfig::default()
        }
        .normalized();
        assert_eq!(cfg.max_kb_size, 10);
        assert_eq!(cfg.inference_workers, 2);
    }
}
