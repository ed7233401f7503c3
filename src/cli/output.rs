use std::fmt::Write as FmtWrite;

use crate::models::{OutputFormat, SearchResults, StoredRecord};
use crate::services::MetricsSummary;

pub trait Formatter {
    fn format_search_results(&self, results: &SearchResults) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_ingest_stats(&self, stats: &IngestStats) -> String;
    fn format_records(&self, records: &[StoredRecord]) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub daemon_running: bool,
    pub daemon_idle_secs: Option<u64>,
    pub embedding_url: String,
    pub embedding_healthy: bool,
    pub store_driver: String,
    pub store_url: String,
    pub store_connected: bool,
    pub record_count: u64,
    pub collection: String,
    pub metrics: Option<MetricsSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub reference_id: String,
    pub chunks_created: u64,
    pub duration_ms: u64,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Search results for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, result) in results.results.iter().enumerate() {
            writeln!(output, "{}. [Score: {:.3}]", i + 1, result.score).unwrap();
            writeln!(output, "   Id: {}", result.id).unwrap();
            writeln!(output, "   Reference: {}", result.reference_id).unwrap();
            writeln!(output, "   ---").unwrap();

            let preview: String = result.text.chars().take(200).collect();
            let preview = if result.text.chars().count() > 200 {
                format!("{}...", preview)
            } else {
                preview
            };
            for line in preview.lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let daemon_status = if status.daemon_running {
            "[RUNNING]"
        } else {
            "[STOPPED]"
        };
        writeln!(output, "Daemon:        {}", daemon_status).unwrap();

        if status.daemon_running {
            if let Some(idle) = status.daemon_idle_secs {
                writeln!(output, "  Idle:        {}s", idle).unwrap();
            }
            if let Some(ref m) = status.metrics {
                writeln!(output, "  Requests:    {}", m.total_requests).unwrap();
                writeln!(output, "  Avg Latency: {}ms", m.avg_latency_ms).unwrap();
                if m.error_rate > 0.0 {
                    writeln!(output, "  Error Rate:  {:.1}%", m.error_rate).unwrap();
                }
            }
        }
        writeln!(output).unwrap();

        let embedding_status = if status.embedding_healthy {
            "[HEALTHY]"
        } else {
            "[UNREACHABLE]"
        };
        writeln!(
            output,
            "Embedding:     {} ({})",
            embedding_status, status.embedding_url
        )
        .unwrap();
        writeln!(output).unwrap();

        let store_status = if status.store_connected {
            "[CONNECTED]"
        } else {
            "[DISCONNECTED]"
        };
        writeln!(
            output,
            "Record Store:  {} ({})",
            status.store_driver, store_status
        )
        .unwrap();
        if status.store_connected {
            writeln!(output, "  URL:         {}", status.store_url).unwrap();
            writeln!(output, "  Collection:  {}", status.collection).unwrap();
            writeln!(output, "  Records:     {}", status.record_count).unwrap();
        }

        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "Ingestion Complete").unwrap();
        writeln!(output, "------------------").unwrap();
        writeln!(output, "Reference: {}", stats.reference_id).unwrap();
        writeln!(output, "Chunks stored: {}", stats.chunks_created).unwrap();
        writeln!(output, "Duration: {}ms", stats.duration_ms).unwrap();
        output
    }

    fn format_records(&self, records: &[StoredRecord]) -> String {
        if records.is_empty() {
            return "No records found.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "Records ({})", records.len()).unwrap();
        writeln!(output, "--------").unwrap();
        for record in records {
            let preview: String = record.text.chars().take(60).collect();
            writeln!(
                output,
                "  {}  [{}]  {}",
                record.id, record.created_at, preview
            )
            .unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_string(&self, value: &serde_json::Value) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap()
        } else {
            serde_json::to_string(value).unwrap()
        }
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if self.pretty {
            serde_json::to_string_pretty(results)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(results).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let metrics = status.metrics.as_ref().map(|m| {
            serde_json::json!({
                "total_requests": m.total_requests,
                "avg_latency_ms": m.avg_latency_ms,
                "error_rate": m.error_rate,
            })
        });

        let json = serde_json::json!({
            "daemon": {
                "running": status.daemon_running,
                "idle_secs": status.daemon_idle_secs,
                "metrics": metrics,
            },
            "embedding": {
                "url": status.embedding_url,
                "healthy": status.embedding_healthy,
            },
            "record_store": {
                "driver": status.store_driver,
                "url": status.store_url,
                "connected": status.store_connected,
                "collection": status.collection,
                "records": status.record_count,
            }
        });

        self.to_string(&json)
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let json = serde_json::json!({
            "reference_id": stats.reference_id,
            "chunks_created": stats.chunks_created,
            "duration_ms": stats.duration_ms,
        });
        self.to_string(&json)
    }

    fn format_records(&self, records: &[StoredRecord]) -> String {
        let json = serde_json::json!({"records": records});
        self.to_string(&json)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_search_results(&self, results: &SearchResults) -> String {
        if results.is_empty() {
            return format!("## No results found\n\nQuery: `{}`\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "## Search Results\n").unwrap();
        writeln!(output, "**Query:** `{}`\n", results.query).unwrap();
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, result) in results.results.iter().enumerate() {
            writeln!(output, "### {}. Score: {:.3}\n", i + 1, result.score).unwrap();
            writeln!(output, "**Id:** `{}`\n", result.id).unwrap();
            writeln!(output, "**Reference:** `{}`\n", result.reference_id).unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", result.text).unwrap();
            writeln!(output, "```\n").unwrap();
        }

        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();

        let daemon_status = if status.daemon_running { "✅" } else { "❌" };
        writeln!(output, "### Daemon {}\n", daemon_status).unwrap();

        if status.daemon_running {
            if let Some(ref m) = status.metrics {
                writeln!(output, "- **Requests:** {}", m.total_requests).unwrap();
                writeln!(output, "- **Avg Latency:** {}ms", m.avg_latency_ms).unwrap();
                if m.error_rate > 0.0 {
                    writeln!(output, "- **Error Rate:** {:.1}%", m.error_rate).unwrap();
                }
            }
        }
        writeln!(output).unwrap();

        let embedding_status = if status.embedding_healthy { "✅" } else { "❌" };
        writeln!(output, "### Embedding Server {}\n", embedding_status).unwrap();
        writeln!(output, "- **URL:** `{}`\n", status.embedding_url).unwrap();

        let store_status = if status.store_connected { "✅" } else { "❌" };
        writeln!(
            output,
            "### Record Store ({}) {}\n",
            status.store_driver, store_status
        )
        .unwrap();
        writeln!(output, "- **URL:** `{}`", status.store_url).unwrap();
        writeln!(output, "- **Collection:** {}", status.collection).unwrap();
        writeln!(output, "- **Records:** {}", status.record_count).unwrap();

        output
    }

    fn format_ingest_stats(&self, stats: &IngestStats) -> String {
        let mut output = String::new();
        writeln!(output, "## Ingestion Complete\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Reference | `{}` |", stats.reference_id).unwrap();
        writeln!(output, "| Chunks stored | {} |", stats.chunks_created).unwrap();
        writeln!(output, "| Duration | {}ms |", stats.duration_ms).unwrap();
        output
    }

    fn format_records(&self, records: &[StoredRecord]) -> String {
        if records.is_empty() {
            return "## Records\n\n*No records found.*\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "## Records\n").unwrap();
        writeln!(output, "| Id | Created | Text |").unwrap();
        writeln!(output, "|----|---------|------|").unwrap();
        for record in records {
            let preview: String = record.text.chars().take(60).collect();
            writeln!(
                output,
                "| `{}` | {} | {} |",
                record.id,
                record.created_at,
                preview.replace('\n', " ")
            )
            .unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}
