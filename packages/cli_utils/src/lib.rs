#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the pulse binaries.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines are printed above the progress bars
//! instead of tearing through them. [`IndicatifProgress`] adapts an
//! `indicatif` bar to the [`ProgressCallback`] trait the library crates
//! report through.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use pulse_ingest::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied once `set_total()` reports a length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// A spinner for work whose size is unknown until it starts, such as
    /// scoring a stage. Turns into a bar with percentage and ETA on
    /// [`ProgressCallback::set_total()`].
    #[must_use]
    pub fn stage_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Self::spinner(multi, message, "cyan")
    }

    /// Same as [`Self::stage_bar`] in a second color, for output writing.
    #[must_use]
    pub fn files_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Self::spinner(multi, message, "yellow")
    }

    /// A bar over a fixed number of pipeline steps.
    #[must_use]
    pub fn steps_bar(
        multi: &MultiProgress,
        message: &str,
        total: u64,
    ) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new(total));
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message(message.to_string());

        let bar_style = bar.style();

        Arc::new(Self { bar, bar_style })
    }

    fn spinner(multi: &MultiProgress, message: &str, color: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template(&format!("{{spinner:.{color}}} {{msg}}"))
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(&format!(
            "  {{msg}} {{wide_bar:.{color}/dim}} {{pos}}/{{len}} {{percent}}% [{{eta}}]"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Arc::new(Self { bar, bar_style })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs the global logger, wrapped so that log output is suspended
/// while progress bars redraw.
///
/// Honors `RUST_LOG`; `default_level` applies when it is unset. Returns the
/// [`MultiProgress`] every bar must be added to.
#[must_use]
pub fn init_logger(default_level: log::LevelFilter) -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(default_level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let logger = builder.build();
    let level = logger.filter();

    // Already installed when called twice in one process.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_bar_accepts_updates() {
        let multi = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let progress = IndicatifProgress::stage_bar(&multi, "Scoring");
        progress.set_total(3);
        progress.inc(2);
        progress.set_message("Scoring 2025-03-01".to_string());
        progress.finish("Scored 3 dates".to_string());
    }

    #[test]
    fn init_logger_can_run_twice() {
        let _ = init_logger(log::LevelFilter::Warn);
        let _ = init_logger(log::LevelFilter::Info);
    }
}
