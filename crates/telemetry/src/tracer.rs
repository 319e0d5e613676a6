//! Decision tracer: thread-safe session store with cached analyses.

use crate::TelemetryError;
use crate::analysis::TraceAnalysis;
use crate::export::{self, ExportFormat};
use crate::model::{DecisionPath, DecisionTrace, TraceStep};
use chrono::{Duration as ChronoDuration, Utc};
use maestro_config::TelemetryConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Sessions in insertion order plus an id index.
#[derive(Debug, Default)]
struct TraceStore {
    order: VecDeque<String>,
    paths: HashMap<String, DecisionPath>,
}

/// Records every pipeline step per session and serves analyses and exports.
///
/// History is bounded: once `capacity` sessions are held, starting a new one
/// evicts the oldest, whether or not it has ended.
pub struct DecisionTracer {
    /// Session history.
    store: RwLock<TraceStore>,
    /// Computed analyses keyed by window, with the time they were built.
    cache: Mutex<HashMap<u32, (Instant, TraceAnalysis)>>,
    /// Bumped under the cache lock whenever a session ends.
    generation: AtomicU64,
    capacity: usize,
    cache_ttl: Duration,
}

impl DecisionTracer {
    pub fn new(capacity: usize, cache_ttl: Duration) -> Self {
        Self {
            store: RwLock::new(TraceStore::default()),
            cache: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            capacity: capacity.max(1),
            cache_ttl,
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.max_sessions, Duration::from_secs(config.analysis_cache_secs))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open a session and return its id.
    pub fn start_session(&self, user_id: &str, request_text: &str) -> String {
        let path = DecisionPath::new(user_id, request_text);
        let id = path.session_id.clone();

        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        while store.order.len() >= self.capacity {
            if let Some(oldest) = store.order.pop_front() {
                store.paths.remove(&oldest);
                debug!(session_id = %oldest, "Evicted oldest trace session");
            }
        }
        store.order.push_back(id.clone());
        store.paths.insert(id.clone(), path);

        debug!(session_id = %id, user_id, "Trace session started");
        id
    }

    /// Append a step to an open session and return the recorded trace id.
    pub fn add_trace(&self, session_id: &str, step: TraceStep) -> Result<String, TelemetryError> {
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        let path = store
            .paths
            .get_mut(session_id)
            .ok_or_else(|| TelemetryError::UnknownSession(session_id.to_string()))?;
        if path.is_complete() {
            return Err(TelemetryError::SessionEnded(session_id.to_string()));
        }

        let trace = DecisionTrace::stamp(session_id, &path.user_id, step);
        let id = trace.id.clone();
        debug!(
            session_id,
            step = %trace.step_name,
            kind = %trace.kind,
            success = trace.success,
            elapsed_ms = trace.execution_time_ms,
            "Trace recorded"
        );
        path.push(trace);
        Ok(id)
    }

    /// Close a session, finalize its timing and drop cached analyses.
    pub fn end_session(
        &self,
        session_id: &str,
        result: Option<serde_json::Value>,
    ) -> Result<DecisionPath, TelemetryError> {
        let snapshot = {
            let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
            let path = store
                .paths
                .get_mut(session_id)
                .ok_or_else(|| TelemetryError::UnknownSession(session_id.to_string()))?;
            if path.is_complete() {
                return Err(TelemetryError::SessionEnded(session_id.to_string()));
            }
            path.end(result);
            path.clone()
        };
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            self.generation.fetch_add(1, Ordering::SeqCst);
            cache.clear();
        }

        info!(
            session_id,
            steps = snapshot.summary.total_steps,
            successful = snapshot.summary.successful_steps,
            total_ms = snapshot.summary.total_time_ms,
            "Trace session ended"
        );
        Ok(snapshot)
    }

    pub fn get_session_trace(&self, session_id: &str) -> Option<DecisionPath> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.paths.get(session_id).cloned()
    }

    /// A user's sessions, most recent first.
    pub fn get_user_traces(&self, user_id: &str, limit: usize) -> Vec<DecisionPath> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store
            .order
            .iter()
            .rev()
            .filter_map(|id| store.paths.get(id))
            .filter(|p| p.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Analysis over sessions that ended within the last `window_hours`.
    pub fn get_trace_analysis(&self, window_hours: u32) -> TraceAnalysis {
        {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some((built, analysis)) = cache.get(&window_hours) {
                if built.elapsed() < self.cache_ttl {
                    return analysis.clone();
                }
            }
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let analysis = {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            let paths = Self::completed_within(&store, window_hours);
            TraceAnalysis::compute(window_hours, &paths)
        };
        debug!(window_hours, sessions = analysis.sessions_analyzed, "Trace analysis computed");

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        // A session ended while computing; this result may already be stale.
        if self.generation.load(Ordering::SeqCst) == generation {
            cache.insert(window_hours, (Instant::now(), analysis.clone()));
        }
        analysis
    }

    /// Render sessions that ended within the last `window_hours`.
    pub fn export_traces(
        &self,
        format: ExportFormat,
        window_hours: u32,
    ) -> Result<String, TelemetryError> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        let paths = Self::completed_within(&store, window_hours);
        export::render(format, &paths)
    }

    /// Sessions held, open or ended.
    pub fn session_count(&self) -> usize {
        self.store.read().unwrap_or_else(|e| e.into_inner()).paths.len()
    }

    pub fn active_session_count(&self) -> usize {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store.paths.values().filter(|p| !p.is_complete()).count()
    }

    fn completed_within(store: &TraceStore, window_hours: u32) -> Vec<&DecisionPath> {
        let cutoff = Utc::now() - ChronoDuration::hours(i64::from(window_hours));
        store
            .order
            .iter()
            .filter_map(|id| store.paths.get(id))
            .filter(|p| p.ended_at.is_some_and(|end| end >= cutoff))
            .collect()
    }
}

impl Default for DecisionTracer {
    fn default() -> Self {
        Self::from_config(&TelemetryConfig::default())
    }
}
