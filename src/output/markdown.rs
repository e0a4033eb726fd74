//! Markdown summary generation
//!
//! Renders a finished [`CrawlRun`] as a human-readable report: run metadata,
//! overall totals, a per-portal table, failed routes and drop reasons.

use crate::state::CrawlRun;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Writes the markdown summary of `run` to `output_path`
pub fn write_markdown_summary(run: &CrawlRun, output_path: &Path) -> io::Result<()> {
    let markdown = format_markdown_summary(run);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl run as markdown
pub fn format_markdown_summary(run: &CrawlRun) -> String {
    let mut md = String::new();

    md.push_str("# Fare-Harvest Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", run.started_at.to_rfc3339()));
    if let Some(finished) = &run.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = run.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    md.push_str(&format!("- **Status**: {}\n", run.status()));
    if let Some(hash) = &run.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Portals**: {}\n", run.portals.len()));
    md.push_str(&format!("- **Failed Portals**: {}\n", run.failed_portals()));
    md.push_str(&format!("- **Routes Visited**: {}\n", run.total_routes()));
    md.push_str(&format!("- **Failed Routes**: {}\n", run.failed_routes()));
    md.push_str(&format!("- **Listings**: {}\n", run.total_listings()));
    md.push_str(&format!("- **Dropped Entries**: {}\n\n", run.total_dropped()));

    // Per-portal breakdown
    md.push_str("## Portals\n\n");
    md.push_str("| Portal | State | Pages | Routes | Listings | Dropped | Failed Routes |\n");
    md.push_str("|--------|-------|-------|--------|----------|---------|---------------|\n");
    for portal in &run.portals {
        let state = if portal.interrupted {
            format!("{} (interrupted)", portal.state)
        } else {
            portal.state.to_string()
        };
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} |\n",
            portal.portal,
            state,
            portal.pages,
            portal.routes_found,
            portal.listings(),
            portal.dropped(),
            portal.failed_routes()
        ));
    }
    md.push('\n');

    // Portal failures
    let failures: Vec<_> = run
        .portals
        .iter()
        .filter_map(|p| p.failure.as_ref().map(|f| (&p.portal, f)))
        .collect();
    if !failures.is_empty() {
        md.push_str("## Portal Failures\n\n");
        for (portal, failure) in failures {
            md.push_str(&format!("- **{}**: {}\n", portal, failure));
        }
        md.push('\n');
    }

    // Failed routes
    let failed_routes: Vec<_> = run
        .portals
        .iter()
        .flat_map(|p| p.routes.iter())
        .filter(|r| r.is_failed())
        .collect();
    if !failed_routes.is_empty() {
        md.push_str("## Failed Routes\n\n");
        md.push_str("| Portal | Route | Attempts | Error |\n");
        md.push_str("|--------|-------|----------|-------|\n");
        for route in failed_routes.iter().take(50) {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                route.route.portal,
                route.route.route_name,
                route.attempts,
                route.error.as_deref().unwrap_or_default()
            ));
        }
        if failed_routes.len() > 50 {
            md.push_str(&format!("\n... and {} more\n", failed_routes.len() - 50));
        }
        md.push('\n');
    }

    // Drop reasons
    let reasons = run.drop_reasons();
    if !reasons.is_empty() {
        md.push_str("## Dropped Entries\n\n");
        md.push_str("| Reason | Count |\n");
        md.push_str("|--------|-------|\n");
        for (reason, count) in reasons {
            md.push_str(&format!("| {} | {} |\n", reason, count));
        }
        md.push('\n');
    }

    md
}
