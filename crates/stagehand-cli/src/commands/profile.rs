// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `--profile` report: where resumptions spent their time.

use stagehand_rt::TraceLog;

use crate::output;

/// Print the busiest await sites, at most `limit` rows.
pub fn print_report(traces: &TraceLog, limit: usize) {
    let summary = traces.summarize();
    println!();
    println!(
        "{} ({} resumption(s) recorded, buffer {})",
        output::section_header("Profile"),
        traces.len(),
        traces.capacity()
    );
    if summary.is_empty() {
        println!("  no traces recorded");
        return;
    }
    println!("  {:>6} {:>9} {:>7}  await site", "count", "total", "max");
    println!("  {}", output::separator(60));
    for row in summary.iter().take(limit) {
        println!(
            "  {:>6} {:>9} {:>7}  {}",
            row.count,
            output::duration_ms(row.total_ms).to_string(),
            output::duration_ms(row.max_ms).to_string(),
            row.label
        );
    }
    if summary.len() > limit {
        println!("  ... {} more site(s)", summary.len() - limit);
    }
}
