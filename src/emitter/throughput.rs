//! Delivery throughput accounting.
//!
//! Counters live on the emitter instance. Every `interval` delivered records
//! a [`ThroughputReport`] is produced, handed to the configured
//! [`ReportSink`], and the counters restart.

use std::time::{Duration, Instant};

use log::info;

use super::usage::ResourceUsage;

/// One reporting window.
#[derive(Clone, Debug, PartialEq)]
pub struct ThroughputReport {
    pub records: u64,
    pub bytes: u64,
    pub elapsed: Duration,
    pub usage: Option<ResourceUsage>,
}

impl ThroughputReport {
    pub fn records_per_sec(&self) -> f64 {
        per_sec(self.records, self.elapsed)
    }

    pub fn bytes_per_sec(&self) -> f64 {
        per_sec(self.bytes, self.elapsed)
    }
}

fn per_sec(n: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { n as f64 / secs } else { 0.0 }
}

impl std::fmt::Display for ThroughputReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Rate: {:.2} records/s ({:.2} bytes/s)",
            self.records_per_sec(),
            self.bytes_per_sec()
        )?;
        if let Some(usage) = &self.usage {
            write!(f, "; {usage}")?;
        }
        Ok(())
    }
}

/// Destination for periodic throughput reports.
pub trait ReportSink: Send {
    fn report(&mut self, report: &ThroughputReport);
}

/// Writes reports to the operational log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReportSink;

impl ReportSink for LogReportSink {
    fn report(&mut self, report: &ThroughputReport) {
        info!("{report}");
    }
}

/// Record and byte counters for the current window.
#[derive(Debug)]
pub struct ThroughputCounter {
    interval: u64,
    started: Instant,
    records: u64,
    bytes: u64,
}

impl ThroughputCounter {
    /// A zero interval disables reporting.
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            started: Instant::now(),
            records: 0,
            bytes: 0,
        }
    }

    /// Count one delivered record of `bytes` length; returns a report when
    /// the window is full.
    pub fn record(&mut self, bytes: usize) -> Option<ThroughputReport> {
        self.records += 1;
        self.bytes = self.bytes.saturating_add(bytes as u64);
        if self.interval == 0 || self.records < self.interval {
            return None;
        }
        let report = ThroughputReport {
            records: self.records,
            bytes: self.bytes,
            elapsed: self.started.elapsed(),
            usage: ResourceUsage::sample(),
        };
        self.started = Instant::now();
        self.records = 0;
        self.bytes = 0;
        Some(report)
    }
}
