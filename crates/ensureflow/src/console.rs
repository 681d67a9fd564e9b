use colored::Colorize;
use ensureflow_cloud::{Report, ReportSink};

/// 報告行を色付きで stdout に出力する
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn report(&self, report: Report<'_>, preview: bool) {
        let line = report.line(preview);
        let line = match report {
            Report::Planned(_) => line.yellow(),
            Report::Applied(_) => line.green(),
            Report::Unchanged { .. } => line.dimmed(),
        };
        println!("{}", line);
    }
}
