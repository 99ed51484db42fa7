use chrono::Local;
use colored::*;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::{HarnessError, Result};
use crate::models::config_model::LoadTestConfig;
use crate::models::metrics::{AggregateState, ErrorRecord};
use crate::models::report::{ErrorGroup, Percentiles, Report, Summary};
use crate::utils::hardware::HostInfo;

pub const DEFAULT_REPORT_PATH: &str = "load-test-report.json";

pub fn build_report(config: LoadTestConfig, results: AggregateState, host: HostInfo) -> Report {
    let summary = summarize(&results);
    let errors = group_errors(&results.errors);
    let timestamp = results.ended_at.to_rfc3339();

    Report {
        config,
        results,
        summary,
        errors,
        host,
        timestamp,
    }
}

pub fn summarize(state: &AggregateState) -> Summary {
    // `ended_at` is when the stop flag flipped; requests finishing during the
    // drain are still counted, so RPS can read slightly high.
    let duration_seconds = (state.ended_at - state.started_at).num_milliseconds().max(0) as f64 / 1000.0;
    let requests_per_second = if duration_seconds > 0.0 {
        state.total_requests as f64 / duration_seconds
    } else {
        0.0
    };
    let success_rate = if state.total_requests > 0 {
        state.successful_requests as f64 / state.total_requests as f64
    } else {
        0.0
    };

    let mut sorted = state.response_times.clone();
    sorted.sort_unstable();

    let avg_response_time = if sorted.is_empty() {
        0.0
    } else {
        sorted.iter().sum::<u64>() as f64 / sorted.len() as f64
    };

    Summary {
        duration_seconds,
        requests_per_second,
        success_rate,
        avg_response_time,
        percentiles: Percentiles {
            p50: percentile(&sorted, 0.50),
            p90: percentile(&sorted, 0.90),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        },
        min_time: sorted.first().copied().unwrap_or(0),
        max_time: sorted.last().copied().unwrap_or(0),
    }
}

/// `sorted` must be ascending. Index is `floor(len * p)` clamped to the sample.
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64 * p).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Groups by (endpoint, message), ordered by count then endpoint name.
pub fn group_errors(errors: &[ErrorRecord]) -> Vec<ErrorGroup> {
    let mut groups: BTreeMap<(String, String), ErrorGroup> = BTreeMap::new();
    for record in errors {
        let message = record.error.to_string();
        groups
            .entry((record.endpoint_name.clone(), message.clone()))
            .or_insert_with(|| ErrorGroup {
                endpoint_name: record.endpoint_name.clone(),
                message,
                status_code: record.status_code,
                count: 0,
            })
            .count += 1;
    }

    let mut grouped: Vec<ErrorGroup> = groups.into_values().collect();
    grouped.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.endpoint_name.cmp(&b.endpoint_name)));
    grouped
}

pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).map_err(|source| HarnessError::ReportWrite {
        path: path.to_path_buf(),
        source,
    })
}

pub fn render_summary(report: &Report) -> String {
    let state = &report.results;
    let summary = &report.summary;
    let local = state.ended_at.with_timezone(&Local).format("%Y/%m/%d %H:%M:%S");
    let mut out = String::new();

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "🔥 ======== TEST RESULTS ======== 🔥".bold().white().on_blue());
    let mut row = |label: ColoredString, value: String| {
        let _ = writeln!(out, "{} {}", label, value.bold());
    };
    row("⏰ Timestamp                : ".blue().bold(), local.to_string());
    row("🌐 Target                   : ".blue().bold(), format!("{} | {}", report.config.base_url, report.config.api_url));
    row("⌛ Duration (s)             : ".blue().bold(), format!("{:.2}", summary.duration_seconds));
    row("👥 Peak concurrent users    : ".blue().bold(), state.max_concurrent_users.to_string());
    row("✅ Total requests           : ".green().bold(), state.total_requests.to_string());
    row("✅ Successful requests      : ".green().bold(), state.successful_requests.to_string());
    row("❌ Failed requests          : ".red().bold(), state.failed_requests.to_string());
    row("🎯 Success rate             : ".green().bold(), format!("{:.2}%", summary.success_rate * 100.0));
    row("⚡ Fastest response (ms)    : ".cyan().bold(), summary.min_time.to_string());
    row("🐢 Slowest response (ms)    : ".yellow().bold(), summary.max_time.to_string());
    row("📊 Average response (ms)    : ".magenta().bold(), format!("{:.2}", summary.avg_response_time));
    row("📊 Median response time (ms): ".magenta().bold(), summary.percentiles.p50.to_string());
    row("📊 p90 / p95 / p99 (ms)     : ".magenta().bold(), format!(
        "{} / {} / {}",
        summary.percentiles.p90, summary.percentiles.p95, summary.percentiles.p99
    ));
    row("📈 Requests per second (RPS): ".blue().bold(), format!("{:.2}", summary.requests_per_second));

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "📦 ======== STATUS BREAKDOWN ========".bold().white().on_blue());
    for (status, count) in &state.status_counts {
        let _ = writeln!(out, "{}", format!("• {status}: {count}").bold());
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", "🧭 ======== ENDPOINTS ========".bold().white().on_blue());
    for (name, tally) in &state.endpoints {
        let _ = writeln!(
            out,
            "{}",
            format!("• {name}: {} requests, {} failed", tally.requests, tally.failures).bold()
        );
    }

    if !report.errors.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", "🚨 ======== ERRORS ========".bold().white().on_red());
        for group in &report.errors {
            let _ = writeln!(
                out,
                "{}",
                format!("• {} | {}: {}", group.endpoint_name, group.message, group.count).red()
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;
    use chrono::{Duration, TimeZone, Utc};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn state_with(times: &[u64], failed: u64) -> AggregateState {
        let started_at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let mut state = AggregateState::empty(started_at);
        state.ended_at = started_at + Duration::seconds(10);
        state.total_requests = times.len() as u64;
        state.failed_requests = failed;
        state.successful_requests = times.len() as u64 - failed;
        state.response_times = times.to_vec();
        state
    }

    fn error(endpoint: &str, err: RequestError) -> ErrorRecord {
        ErrorRecord {
            endpoint_name: endpoint.to_string(),
            url: format!("http://localhost/{endpoint}"),
            status_code: err.status_code(),
            error: err,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn percentile_uses_floor_index() {
        let sorted: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&sorted, 0.50), 51);
        assert_eq!(percentile(&sorted, 0.90), 91);
        assert_eq!(percentile(&sorted, 0.99), 100);
        assert_eq!(percentile(&sorted, 1.0), 100);
        assert_eq!(percentile(&sorted, 0.0), 1);
        assert_eq!(percentile(&[], 0.5), 0);
        assert_eq!(percentile(&[7], 0.99), 7);
    }

    #[test]
    fn summary_is_independent_of_record_order() {
        let times: Vec<u64> = (0..500).map(|i| (i * 37) % 1000 + 5).collect();
        let mut shuffled = times.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(11));

        let a = summarize(&state_with(&times, 0));
        let b = summarize(&state_with(&shuffled, 0));
        assert_eq!(a, b);
        assert_eq!(summarize(&state_with(&times, 0)), a);
    }

    #[test]
    fn computes_rates_and_extremes() {
        let summary = summarize(&state_with(&[100, 300, 200, 400], 1));
        assert_eq!(summary.duration_seconds, 10.0);
        assert!((summary.requests_per_second - 0.4).abs() < f64::EPSILON);
        assert!((summary.success_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(summary.avg_response_time, 250.0);
        assert_eq!(summary.min_time, 100);
        assert_eq!(summary.max_time, 400);
        assert_eq!(summary.percentiles.p50, 300);
    }

    #[test]
    fn empty_run_reports_zero_not_nan() {
        let summary = summarize(&state_with(&[], 0));
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.requests_per_second, 0.0);
        assert_eq!(summary.avg_response_time, 0.0);
        assert_eq!(summary.percentiles, Percentiles::default());
    }

    #[test]
    fn zero_duration_does_not_divide_by_zero() {
        let mut state = state_with(&[10, 20], 0);
        state.ended_at = state.started_at;
        let summary = summarize(&state);
        assert_eq!(summary.requests_per_second, 0.0);
        assert_eq!(summary.success_rate, 1.0);
    }

    #[test]
    fn groups_errors_by_endpoint_and_message() {
        let server_error = || RequestError::HttpStatus {
            code: 500,
            reason: "Internal Server Error".into(),
        };
        let errors = vec![
            error("Cart", server_error()),
            error("Cart", server_error()),
            error("Cart", RequestError::Timeout(100)),
            error("Home", server_error()),
            error("Cart", server_error()),
        ];

        let groups = group_errors(&errors);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].endpoint_name, "Cart");
        assert_eq!(groups[0].message, "HTTP 500 Internal Server Error");
        assert_eq!(groups[0].status_code, Some(500));
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups.iter().map(|g| g.count).sum::<u64>(), 5);
        let timeout = groups.iter().find(|g| g.message.starts_with("timeout")).unwrap();
        assert_eq!(timeout.status_code, None);
    }

    #[test]
    fn renders_summary_and_writes_json() {
        let mut state = state_with(&[120, 80], 1);
        state
            .status_counts
            .insert("200".to_string(), 1);
        state.errors.push(error("Cart", RequestError::Network("refused".into())));
        let report = build_report(LoadTestConfig::default(), state, HostInfo::default());

        let text = render_summary(&report);
        assert!(text.contains("TEST RESULTS"));
        assert!(text.contains("STATUS BREAKDOWN"));
        assert!(text.contains("refused"));

        let dir = std::env::temp_dir().join(format!("loadforge-report-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(DEFAULT_REPORT_PATH);
        write_report(&report, &path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["results"]["totalRequests"], 2);
        assert_eq!(json["results"]["failedRequests"], 1);
        assert_eq!(json["summary"]["successRate"], 0.5);
        assert_eq!(json["summary"]["percentiles"]["p50"], 120);
        assert_eq!(json["config"]["concurrent"], 50);
        assert_eq!(json["errors"][0]["count"], 1);
        assert!(json["timestamp"].is_string());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unwritable_path_is_report_error() {
        let report = build_report(LoadTestConfig::default(), state_with(&[], 0), HostInfo::default());
        let path = std::env::temp_dir()
            .join("loadforge-missing-dir")
            .join("nested")
            .join(DEFAULT_REPORT_PATH);
        let err = write_report(&report, &path).unwrap_err();
        assert!(matches!(err, HarnessError::ReportWrite { .. }));
    }
}
