//! Terminal progress bar.

use indicatif::{ProgressBar, ProgressStyle};
use keepfetch::transfer::ProgressCallback;

const BAR_TEMPLATE: &str =
    "{spinner:.blue} {prefix:.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";

const BAR_CHARS: &str = "█▓▒░  ";

/// Create a byte progress bar labelled with `name`.
pub fn create_bar(name: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
        bar.set_style(style.progress_chars(BAR_CHARS));
    }
    bar.set_prefix(name.to_string());
    bar
}

/// Progress callback that drives `bar`.
pub fn callback(bar: ProgressBar) -> ProgressCallback {
    Box::new(move |bytes, total, chunks, total_chunks| {
        if bar.length() != Some(total) {
            bar.set_length(total);
        }
        bar.set_position(bytes);
        bar.set_message(format!("{}/{} chunks", chunks, total_chunks));
    })
}
