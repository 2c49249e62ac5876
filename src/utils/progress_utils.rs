use indicatif::ProgressStyle;
use tracing::{info_span, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Replays shorter than this finish too quickly for a bar to be useful.
const MIN_PROGRESS_LEN: u64 = 500;

/// A span carrying a progress bar. The bar is drawn by the `IndicatifLayer`
/// while the span is entered, so log lines are printed above it instead of
/// through it. Without that layer installed the span is inert.
pub fn progress_span(len: u64, msg: &str) -> Option<Span> {
    if len < MIN_PROGRESS_LEN {
        return None;
    }

    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise} / {eta_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        .ok()?
        .progress_chars("##-");

    let span = info_span!("replay", len);
    span.pb_set_style(&style);
    span.pb_set_length(len);
    span.pb_set_message(msg);

    Some(span)
}

#[cfg(test)]
mod tests {
    use super::progress_span;

    #[test]
    fn test_short_runs_have_no_bar() {
        assert!(progress_span(3, "Replaying").is_none());
    }

    #[test]
    fn test_long_runs_have_a_bar() {
        assert!(progress_span(10_000, "Replaying").is_some());
    }
}
