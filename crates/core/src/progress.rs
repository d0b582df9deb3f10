use crate::models::DocumentOutcome;
use std::time::{Duration, Instant};

/// Aggregate counters for one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub attempted: u64,
    pub persisted: u64,
    /// Checkpoint hits plus duplicate-key races resolved as skips.
    pub already_ingested: u64,
    pub unreadable: u64,
    pub needs_ocr: u64,
    pub ocr_used: u64,
    pub errors: u64,
    pub chunks_created: u64,
    pub embeddings_created: u64,
    pub mentions_extracted: u64,
}

impl RunStats {
    pub fn record(&mut self, outcome: &DocumentOutcome) {
        self.attempted += 1;
        match outcome {
            DocumentOutcome::AlreadyIngested => self.already_ingested += 1,
            DocumentOutcome::Persisted {
                used_ocr,
                chunks,
                embedded,
                mentions,
            } => {
                self.persisted += 1;
                if *used_ocr {
                    self.ocr_used += 1;
                }
                self.chunks_created += *chunks as u64;
                self.embeddings_created += *embedded as u64;
                self.mentions_extracted += *mentions as u64;
            }
            DocumentOutcome::NeedsOcr => self.needs_ocr += 1,
            DocumentOutcome::Unreadable => self.unreadable += 1,
            DocumentOutcome::Failed { .. } => self.errors += 1,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.persisted as f64 / self.attempted as f64 * 100.0
    }
}

/// Tracks a run's counters against the known work-list size and estimates
/// time remaining from the observed throughput.
pub struct ProgressTracker {
    started: Instant,
    total: u64,
    pub stats: RunStats,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self {
            started: Instant::now(),
            total,
            stats: RunStats::default(),
        }
    }

    pub fn record(&mut self, outcome: &DocumentOutcome) {
        self.stats.record(outcome);
    }

    pub fn attempted(&self) -> u64 {
        self.stats.attempted
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Documents attempted per second so far.
    pub fn rate(&self) -> f64 {
        let seconds = self.elapsed().as_secs_f64();
        if seconds <= 0.0 {
            return 0.0;
        }
        self.stats.attempted as f64 / seconds
    }

    /// Estimated time remaining at the current rate; `None` until the first
    /// document finishes.
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.rate();
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.stats.attempted);
        Some(Duration::from_secs_f64(remaining as f64 / rate))
    }

    pub fn report(&self) {
        let eta = self.eta().map(format_duration);
        tracing::info!(
            attempted = self.stats.attempted,
            total = self.total,
            persisted = self.stats.persisted,
            needs_ocr = self.stats.needs_ocr,
            unreadable = self.stats.unreadable,
            errors = self.stats.errors,
            rate = format!("{:.2}/s", self.rate()),
            success = format!("{:.0}%", self.stats.success_rate()),
            eta = eta.as_deref().unwrap_or("unknown"),
            "ingestion progress"
        );
    }
}

/// Compact elapsed/remaining formatting: "2h 5m", "12m", "45s".
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{total_seconds}s")
    }
}
