//! Desktop notifications via notify-rust (D-Bus).

use notify_rust::Notification;
use tracing::{debug, warn};

use crate::worker::RunSummary;

pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn batch_finished(&self, summary: &RunSummary) {
        let title = if summary.cancelled {
            "Conversion stopped"
        } else {
            "Conversion finished"
        };
        self.notify(title, &summary_body(summary));
    }

    pub fn batch_failed(&self, message: &str) {
        self.notify("Conversion failed", message);
    }

    fn notify(&self, summary: &str, body: &str) {
        if !self.enabled {
            return;
        }

        debug!("Notification: {summary}");

        if let Err(e) = Notification::new()
            .summary(summary)
            .body(body)
            .icon("audio-x-generic")
            .timeout(5000)
            .show()
        {
            warn!("Failed to show notification: {e}");
        }
    }
}

fn summary_body(summary: &RunSummary) -> String {
    format!(
        "{}/{} files processed: {} converted, {} skipped, {} failed, {} timed out",
        summary.completed,
        summary.total,
        summary.converted,
        summary.skipped,
        summary.failed,
        summary.timed_out
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_lists_every_count() {
        let summary = RunSummary {
            total: 5,
            completed: 4,
            converted: 2,
            skipped: 1,
            failed: 1,
            timed_out: 0,
            cancelled: true,
        };
        assert_eq!(
            summary_body(&summary),
            "4/5 files processed: 2 converted, 1 skipped, 1 failed, 0 timed out"
        );
    }

    #[test]
    fn disabled_notifier_is_silent() {
        Notifier::new(false).batch_failed("nothing to see");
    }
}
