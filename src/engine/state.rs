//! Engine state machine (§4.10) and the supplemented status snapshot.

/// The engine's lifecycle state (§4.10).
///
/// Transitions: `Idle -> Starting` (`start`); `Starting -> Running` (workers
/// up); `Running <-> Paused`; `{Running, Paused} -> Stopping -> Stopped`.
/// A worker-loop panic moves the engine to `Error` transiently; it
/// self-recovers back to `Running` after a brief backoff (§7
/// `worker-exception`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Starting,
    Running,
    Paused,
    Stopping,
    Stopped,
    Error,
}

/// A point-in-time snapshot of engine and queue occupancy, returned by
/// `Engine::status` (not part of the distilled control interface, but a
/// natural read-only accessor for anything embedding the engine — an IDE
/// status bar, a health check, a test assertion).
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub state: EngineState,
    pub kb_size: usize,
    pub rule_count: usize,
    pub commit_queue_len: usize,
    pub inference_queue_len: usize,
}
