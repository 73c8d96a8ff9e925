//! Per-generation statistics.

use crate::population::GenerationReport;
use serde::{Deserialize, Serialize};

/// Statistics for one completed generation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u32,
    /// Agents that finished their trial
    pub finished: usize,
    /// Agents carried over unchanged
    pub promoted: usize,
    /// Agents removed
    pub discarded: usize,
    pub best_fitness: f32,
    pub mean_fitness: f32,
    pub worst_fitness: f32,
    /// Simulated time the generation took
    pub elapsed: f32,
}

impl GenerationStats {
    pub fn from_report(report: &GenerationReport, elapsed: f32) -> Self {
        Self {
            generation: report.generation,
            finished: report.finished,
            promoted: report.promoted,
            discarded: report.discarded.len(),
            best_fitness: report.best_fitness.unwrap_or(0.0),
            mean_fitness: report.mean_fitness.unwrap_or(0.0),
            worst_fitness: report.worst_fitness.unwrap_or(0.0),
            elapsed,
        }
    }

    /// Format stats as a one-line summary
    pub fn summary(&self) -> String {
        format!(
            "Gen:{:5} | Done:{:4} | Kept:{:4} | Best:{:9.2} | Mean:{:9.2} | Worst:{:9.2}",
            self.generation,
            self.finished,
            self.promoted,
            self.best_fitness,
            self.mean_fitness,
            self.worst_fitness
        )
    }
}

/// Historical statistics tracker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatsHistory {
    /// All recorded generations
    pub snapshots: Vec<GenerationStats>,
}

impl StatsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stats: GenerationStats) {
        self.snapshots.push(stats);
    }

    pub fn latest(&self) -> Option<&GenerationStats> {
        self.snapshots.last()
    }

    /// Best fitness per generation
    pub fn best_series(&self) -> Vec<(u32, f32)> {
        self.snapshots
            .iter()
            .map(|s| (s.generation, s.best_fitness))
            .collect()
    }

    /// Mean fitness per generation
    pub fn mean_series(&self) -> Vec<(u32, f32)> {
        self.snapshots
            .iter()
            .map(|s| (s.generation, s.mean_fitness))
            .collect()
    }

    /// Highest best-of-generation fitness seen so far
    pub fn best_ever(&self) -> Option<&GenerationStats> {
        self.snapshots
            .iter()
            .filter(|s| s.finished > 0)
            .max_by(|a, b| a.best_fitness.total_cmp(&b.best_fitness))
    }

    /// Save history to file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Load history from file
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
