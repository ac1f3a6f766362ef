// src/summarize/mod.rs
pub mod backend;
pub mod extractor;
pub mod generator;

pub use backend::{build_backend, DynBackend, SummaryBackend, SummaryRequest};
pub use extractor::{ArticleExtractor, HttpExtractor, NoopExtractor};
pub use generator::{FallbackReason, SummarizedItem, SummaryGenerator, SummaryOrigin};

use metrics::describe_counter;
use once_cell::sync::OnceCell;

pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "summary_generated_total",
            "Items summarized from parsed backend output."
        );
        describe_counter!(
            "summary_fallback_total",
            "Items that took the fallback record path, by reason."
        );
    });
}
