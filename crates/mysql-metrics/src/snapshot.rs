//! Snapshot type, derived statistics, and export formats.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// Point-in-time copy of every counter.
///
/// Derived quantities (averages, success rates) are pure functions of the
/// snapshot, so two reads of the same snapshot always agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)] // field names mirror the counters one-to-one
pub struct MetricsSnapshot {
    pub connections_created: u64,
    pub connections_acquired: u64,
    pub connections_released: u64,
    pub connection_failures: u64,
    pub queries_executed: u64,
    pub queries_failed: u64,
    pub reconnect_attempts: u64,
    pub reconnect_successes: u64,
    pub acquire_time_us: u64,
    pub usage_time_us: u64,
    pub query_time_us: u64,
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl MetricsSnapshot {
    /// Average time to acquire a session, microseconds.
    #[must_use]
    pub fn avg_acquire_time_us(&self) -> f64 {
        ratio(self.acquire_time_us, self.connections_acquired)
    }

    /// Average time a caller held a session, microseconds.
    #[must_use]
    pub fn avg_usage_time_us(&self) -> f64 {
        ratio(self.usage_time_us, self.connections_released)
    }

    /// Average statement execution time, microseconds.
    #[must_use]
    pub fn avg_query_time_us(&self) -> f64 {
        ratio(self.query_time_us, self.queries_executed)
    }

    /// Share of acquire attempts that produced a session, percent.
    #[must_use]
    pub fn acquire_success_rate(&self) -> f64 {
        ratio(
            self.connections_acquired,
            self.connections_acquired + self.connection_failures,
        ) * 100.0
    }

    /// Share of statements that completed without error, percent.
    #[must_use]
    pub fn query_success_rate(&self) -> f64 {
        ratio(
            self.queries_executed - self.queries_failed,
            self.queries_executed,
        ) * 100.0
    }

    /// Share of reconnect cycles that restored a session, percent.
    #[must_use]
    pub fn reconnect_success_rate(&self) -> f64 {
        ratio(self.reconnect_successes, self.reconnect_attempts) * 100.0
    }

    /// Write the counters and derived statistics as CSV.
    ///
    /// One `metric,value,unit,description` row per counter and derived
    /// metric, plus a trailing export-time row.
    pub fn write_csv<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "metric,value,unit,description")?;

        writeln!(
            w,
            "connections_created,{},count,Sessions opened against a backend",
            self.connections_created
        )?;
        writeln!(
            w,
            "connections_acquired,{},count,Sessions handed to callers",
            self.connections_acquired
        )?;
        writeln!(
            w,
            "connections_released,{},count,Sessions returned to the pool",
            self.connections_released
        )?;
        writeln!(
            w,
            "connection_failures,{},count,Failed handshakes and refused acquires",
            self.connection_failures
        )?;
        writeln!(
            w,
            "queries_executed,{},count,Statements executed",
            self.queries_executed
        )?;
        writeln!(
            w,
            "queries_failed,{},count,Statements that ended in error",
            self.queries_failed
        )?;
        writeln!(
            w,
            "reconnect_attempts,{},count,Reconnect cycles started",
            self.reconnect_attempts
        )?;
        writeln!(
            w,
            "reconnect_successes,{},count,Reconnect cycles that restored a session",
            self.reconnect_successes
        )?;

        writeln!(
            w,
            "total_acquire_time,{:.3},ms,Cumulative time callers spent acquiring",
            self.acquire_time_us as f64 / 1000.0
        )?;
        writeln!(
            w,
            "total_usage_time,{:.3},ms,Cumulative time sessions were held",
            self.usage_time_us as f64 / 1000.0
        )?;
        writeln!(
            w,
            "total_query_time,{:.3},ms,Cumulative statement execution time",
            self.query_time_us as f64 / 1000.0
        )?;

        writeln!(
            w,
            "avg_acquire_time,{:.3},ms,Average time to acquire a session",
            self.avg_acquire_time_us() / 1000.0
        )?;
        writeln!(
            w,
            "avg_usage_time,{:.3},ms,Average time a session was held",
            self.avg_usage_time_us() / 1000.0
        )?;
        writeln!(
            w,
            "avg_query_time,{:.3},ms,Average statement execution time",
            self.avg_query_time_us() / 1000.0
        )?;

        writeln!(
            w,
            "acquire_success_rate,{:.2},%,Acquire attempts that produced a session",
            self.acquire_success_rate()
        )?;
        writeln!(
            w,
            "query_success_rate,{:.2},%,Statements that completed without error",
            self.query_success_rate()
        )?;
        writeln!(
            w,
            "reconnect_success_rate,{:.2},%,Reconnect cycles that restored a session",
            self.reconnect_success_rate()
        )?;

        writeln!(
            w,
            "exported_at,{},timestamp,Time the statistics were exported",
            chrono::Local::now().to_rfc3339()
        )?;
        Ok(())
    }

    /// Export to a CSV file at `path`.
    pub fn export_csv(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "exporting performance counters");
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        fs::write(path, buf)
    }

    /// Human-readable statistics report with qualitative ratings.
    #[must_use]
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "===== connection pool statistics =====");
        let _ = writeln!(out, "generated: {}", chrono::Local::now().to_rfc3339());
        let _ = writeln!(out);
        let _ = writeln!(out, "[connections]");
        let _ = writeln!(out, "  created:        {}", self.connections_created);
        let _ = writeln!(out, "  acquired:       {}", self.connections_acquired);
        let _ = writeln!(out, "  released:       {}", self.connections_released);
        let _ = writeln!(out, "  failures:       {}", self.connection_failures);
        let _ = writeln!(
            out,
            "  acquire rate:   {:.2}%",
            self.acquire_success_rate()
        );
        let _ = writeln!(
            out,
            "  avg acquire:    {:.2} ms",
            self.avg_acquire_time_us() / 1000.0
        );
        let _ = writeln!(
            out,
            "  avg usage:      {:.2} ms",
            self.avg_usage_time_us() / 1000.0
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "[queries]");
        let _ = writeln!(out, "  executed:       {}", self.queries_executed);
        let _ = writeln!(out, "  failed:         {}", self.queries_failed);
        let _ = writeln!(out, "  success rate:   {:.2}%", self.query_success_rate());
        let _ = writeln!(
            out,
            "  avg execution:  {:.2} ms",
            self.avg_query_time_us() / 1000.0
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "[reconnects]");
        let _ = writeln!(out, "  attempts:       {}", self.reconnect_attempts);
        let _ = writeln!(out, "  successes:      {}", self.reconnect_successes);
        let _ = writeln!(
            out,
            "  success rate:   {:.2}%",
            self.reconnect_success_rate()
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "[assessment]");
        let _ = writeln!(
            out,
            "  acquire latency: {}",
            acquire_level(self.avg_acquire_time_us())
        );
        let _ = writeln!(
            out,
            "  query latency:   {}",
            query_level(self.avg_query_time_us())
        );
        let _ = writeln!(out, "  stability:       {}", self.stability_level());
        let _ = writeln!(out, "======================================");
        out
    }

    fn stability_level(&self) -> &'static str {
        let acquire = self.acquire_success_rate();
        let query = self.query_success_rate();
        if acquire > 99.5 && query > 99.5 {
            "excellent (success rates > 99.5%)"
        } else if acquire > 98.0 && query > 98.0 {
            "good (success rates > 98%)"
        } else if acquire > 95.0 && query > 95.0 {
            "fair (success rates > 95%)"
        } else {
            "poor (success rates too low)"
        }
    }
}

fn acquire_level(avg_us: f64) -> &'static str {
    if avg_us < 1_000.0 {
        "excellent (< 1 ms)"
    } else if avg_us < 10_000.0 {
        "good (< 10 ms)"
    } else if avg_us < 50_000.0 {
        "fair (< 50 ms)"
    } else {
        "poor (> 50 ms)"
    }
}

fn query_level(avg_us: f64) -> &'static str {
    if avg_us < 10_000.0 {
        "excellent (< 10 ms)"
    } else if avg_us < 100_000.0 {
        "good (< 100 ms)"
    } else if avg_us < 500_000.0 {
        "fair (< 500 ms)"
    } else {
        "poor (> 500 ms)"
    }
}
