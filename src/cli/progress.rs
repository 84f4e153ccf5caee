use crate::scanner::{Progress, ProgressFn};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

/// Progress bar sink for a run labelled `label`, or `None` when stderr is
/// not a terminal. The bar is created on the first update, once the total is
/// known, and cleared when the run completes.
pub fn progress_bar(label: &str) -> Option<ProgressFn> {
    if !std::io::stderr().is_terminal() {
        return None;
    }

    let label = label.to_string();
    let mut bar: Option<ProgressBar> = None;
    Some(Box::new(move |p: Progress| {
        let pb = bar.get_or_insert_with(|| new_bar(&label, p.total));
        pb.set_position(p.done as u64);
        pb.set_message(format!("{} pass | {} fail", p.passed, p.failed));
        if p.done == p.total {
            pb.finish_and_clear();
        }
    }))
}

fn new_bar(label: &str, total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{prefix:.bold} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
    pb.set_style(style);
    pb.set_prefix(label.to_string());
    pb
}

