//! Terminal presentation — spinner during execution, styled results.
//!
//! Uses `indicatif` for the progress spinner and `console` for color.
//! Operational logging goes through `tracing`; this module only covers
//! what a human watching a local run sees.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::poll::PollResponse;
use crate::state_machine::{RunContext, RunStatus};

/// Visual progress indicator for a workload run.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl RunProgress {
    /// Start the spinner with the input being executed.
    pub fn start(input: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("RUN: {input}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Stop the spinner and print the terminal result of the run.
    pub fn complete(&self, ctx: &RunContext) {
        self.pb.finish_and_clear();
        match ctx.status {
            RunStatus::Succeeded => {
                println!("  {} Run succeeded", self.green.apply_to("✓"));
            }
            RunStatus::Failed => {
                println!("  {} Run failed", self.red.apply_to("✗"));
            }
            _ => {
                println!("  {} Run did not reach a terminal state", self.yellow.apply_to("?"));
            }
        }
    }
}

/// Print a poll response with status-appropriate styling. The body is
/// already redacted by the poll path.
pub fn print_poll_response(response: &PollResponse) {
    let style = if response.status_code == 200 {
        Style::new().green().bold()
    } else {
        Style::new().red().bold()
    };
    println!();
    println!(
        "{}",
        style.apply_to(format!("─── Poll Response ({}) ───", response.status_code))
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&response.body).unwrap_or_default()
    );
}
