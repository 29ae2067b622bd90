//! Reduction of raw samples to the fixed signal vocabulary
//!
//! Each derived signal is emitted only when every sample it depends on is
//! present. A missing prerequisite omits the signal; it never becomes zero.

use crate::models::{round_to, NormalizedSignal, Sample, SignalName};
use thiserror::Error;
use tracing::debug;

pub const MEM_TOTAL: &str = "node_memory_MemTotal_bytes";
pub const MEM_AVAILABLE: &str = "node_memory_MemAvailable_bytes";
pub const MEM_FREE: &str = "node_memory_MemFree_bytes";
pub const FS_SIZE: &str = "node_filesystem_size_bytes";
pub const FS_AVAIL: &str = "node_filesystem_avail_bytes";
pub const LOAD1: &str = "node_load1";

/// Mountpoint whose filesystem backs the disk signal
pub const ROOT_MOUNTPOINT: &str = "/";

/// Decimal places kept on derived ratios
const RATIO_PRECISION: i32 = 4;

/// A derived signal whose prerequisite sample was absent or unusable
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{signal} skipped: {reason}")]
pub struct MissingInput {
    pub signal: SignalName,
    pub reason: &'static str,
}

/// Scalars gathered in one pass over the samples
#[derive(Debug, Default)]
struct Accumulator {
    mem_total: Option<f64>,
    mem_available: Option<f64>,
    mem_free: Option<f64>,
    fs_size: Option<f64>,
    fs_avail: Option<f64>,
    load1: Option<f64>,
}

impl Accumulator {
    fn collect(samples: &[Sample]) -> Self {
        let mut acc = Self::default();

        for sample in samples {
            let is_root = sample.label("mountpoint") == Some(ROOT_MOUNTPOINT);
            let slot = match sample.name.as_str() {
                MEM_TOTAL => &mut acc.mem_total,
                MEM_AVAILABLE => &mut acc.mem_available,
                MEM_FREE => &mut acc.mem_free,
                FS_SIZE if is_root => &mut acc.fs_size,
                FS_AVAIL if is_root => &mut acc.fs_avail,
                LOAD1 => &mut acc.load1,
                _ => continue,
            };
            // Last sample of a series wins
            *slot = Some(sample.value);
        }

        acc
    }

    fn memory_used(&self) -> Result<f64, MissingInput> {
        let missing = |reason| MissingInput {
            signal: SignalName::MemoryUsedPercent,
            reason,
        };

        let total = self.mem_total.ok_or_else(|| missing("MemTotal absent"))?;
        if !(total > 0.0) {
            return Err(missing("MemTotal not positive"));
        }
        // MemFree is only a fallback for kernels without MemAvailable
        let available = self
            .mem_available
            .or(self.mem_free)
            .ok_or_else(|| missing("MemAvailable and MemFree absent"))?;

        Ok(round_to((total - available) / total, RATIO_PRECISION))
    }

    fn disk_free(&self) -> Result<f64, MissingInput> {
        let missing = |reason| MissingInput {
            signal: SignalName::DiskFreePercent,
            reason,
        };

        let size = self.fs_size.ok_or_else(|| missing("root filesystem size absent"))?;
        if !(size > 0.0) {
            return Err(missing("root filesystem size not positive"));
        }
        let avail = self
            .fs_avail
            .ok_or_else(|| missing("root filesystem avail absent"))?;

        Ok(round_to(avail / size, RATIO_PRECISION))
    }

    fn cpu_load(&self) -> Result<f64, MissingInput> {
        self.load1.ok_or(MissingInput {
            signal: SignalName::CpuLoad1m,
            reason: "node_load1 absent",
        })
    }
}

/// Normalize samples stamped with the current time
pub fn normalize_metrics(samples: &[Sample]) -> Vec<NormalizedSignal> {
    normalize_metrics_at(samples, chrono::Utc::now().timestamp())
}

/// Normalize samples stamped with an explicit collection instant
pub fn normalize_metrics_at(samples: &[Sample], timestamp: i64) -> Vec<NormalizedSignal> {
    let acc = Accumulator::collect(samples);

    let derived = [
        (SignalName::MemoryUsedPercent, acc.memory_used()),
        (SignalName::DiskFreePercent, acc.disk_free()),
        (SignalName::CpuLoad1m, acc.cpu_load()),
    ];

    derived
        .into_iter()
        .filter_map(|(name, result)| match result {
            Ok(value) => Some(NormalizedSignal::new(name, value, timestamp)),
            Err(missing) => {
                debug!(error = %missing, "Derived signal omitted");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricType, SignalCategory};

    fn gauge(name: &str, value: f64) -> Sample {
        Sample::new(name, value, MetricType::Gauge)
    }

    fn root_fs(name: &str, value: f64) -> Sample {
        gauge(name, value).with_label("mountpoint", "/")
    }

    fn find(signals: &[NormalizedSignal], name: SignalName) -> Option<&NormalizedSignal> {
        signals.iter().find(|s| s.metric == name)
    }

    #[test]
    fn test_all_three_signals() {
        let samples = vec![
            gauge(MEM_TOTAL, 1000.0),
            gauge(MEM_AVAILABLE, 250.0),
            root_fs(FS_SIZE, 100.0),
            root_fs(FS_AVAIL, 40.0),
            gauge(LOAD1, 0.42),
        ];

        let signals = normalize_metrics_at(&samples, 42);
        assert_eq!(signals.len(), 3);

        let memory = find(&signals, SignalName::MemoryUsedPercent).unwrap();
        assert_eq!(memory.value, 0.75);
        assert_eq!(memory.category, SignalCategory::Memory);
        assert_eq!(memory.timestamp, 42);

        assert_eq!(find(&signals, SignalName::DiskFreePercent).unwrap().value, 0.4);
        assert_eq!(find(&signals, SignalName::CpuLoad1m).unwrap().value, 0.42);
    }

    #[test]
    fn test_cpu_load_passthrough() {
        let signals = normalize_metrics_at(&[gauge(LOAD1, 0.95)], 1);

        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metric, SignalName::CpuLoad1m);
        assert_eq!(signals[0].value, 0.95);
    }

    #[test]
    fn test_no_memory_signal_without_total() {
        let samples = vec![gauge(MEM_AVAILABLE, 250.0), gauge(MEM_FREE, 100.0)];
        let signals = normalize_metrics_at(&samples, 1);
        assert!(find(&signals, SignalName::MemoryUsedPercent).is_none());
    }

    #[test]
    fn test_no_memory_signal_with_zero_total() {
        let samples = vec![gauge(MEM_TOTAL, 0.0), gauge(MEM_AVAILABLE, 0.0)];
        assert!(normalize_metrics_at(&samples, 1).is_empty());
    }

    #[test]
    fn test_mem_free_fallback_only_when_available_absent() {
        let with_free_only = vec![gauge(MEM_TOTAL, 1000.0), gauge(MEM_FREE, 100.0)];
        let signals = normalize_metrics_at(&with_free_only, 1);
        assert_eq!(signals[0].value, 0.9);

        // Available wins even when MemFree appears after it
        let both = vec![
            gauge(MEM_TOTAL, 1000.0),
            gauge(MEM_AVAILABLE, 500.0),
            gauge(MEM_FREE, 100.0),
        ];
        let signals = normalize_metrics_at(&both, 1);
        assert_eq!(signals[0].value, 0.5);
    }

    #[test]
    fn test_memory_signal_needs_available_or_free() {
        let signals = normalize_metrics_at(&[gauge(MEM_TOTAL, 1000.0)], 1);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_disk_signal_uses_root_mountpoint_only() {
        let samples = vec![
            gauge(FS_SIZE, 100.0).with_label("mountpoint", "/boot"),
            gauge(FS_AVAIL, 1.0).with_label("mountpoint", "/boot"),
            root_fs(FS_SIZE, 100.0),
            root_fs(FS_AVAIL, 5.0),
        ];

        let signals = normalize_metrics_at(&samples, 1);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].metric, SignalName::DiskFreePercent);
        assert_eq!(signals[0].value, 0.05);
    }

    #[test]
    fn test_disk_signal_skipped_without_root_size() {
        let samples = vec![root_fs(FS_AVAIL, 5.0)];
        assert!(normalize_metrics_at(&samples, 1).is_empty());
    }

    #[test]
    fn test_ratio_rounded_to_four_places() {
        let samples = vec![gauge(MEM_TOTAL, 3.0), gauge(MEM_AVAILABLE, 1.0)];
        let signals = normalize_metrics_at(&samples, 1);
        assert_eq!(signals[0].value, 0.6667);
    }

    #[test]
    fn test_empty_samples() {
        assert!(normalize_metrics(&[]).is_empty());
    }
}
