use std::sync::Arc;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::types::{CancelSignal, Hit};

use super::Detector;

/// Everything a detector needs to examine one input: the text itself,
/// the resolved configuration (for `validation_strictness` and similar
/// knobs), and a cancellation signal checked between detectors.
pub struct DetectorContext<'a> {
    pub text: &'a str,
    pub config: &'a RegistryConfig,
}

/// Holds a fixed, priority-sorted detector set and runs it over an
/// input with a shared match budget (`max_matches_per_call`) and
/// cooperative cancellation checked between detectors (not mid-detector
/// — an individual detector runs to completion once started).
pub struct DetectorRuntime {
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectorRuntime {
    pub fn new(mut detectors: Vec<Arc<dyn Detector>>) -> Self {
        detectors.sort_by_key(|d| d.priority());
        Self { detectors }
    }

    pub fn detectors(&self) -> &[Arc<dyn Detector>] {
        &self.detectors
    }

    /// Runs every detector in priority order, stopping early if `cancel`
    /// reports cancellation or the match budget is exhausted.
    pub async fn run(
        &self,
        text: &str,
        config: &RegistryConfig,
        cancel: &dyn CancelSignal,
    ) -> Vec<Hit> {
        let ctx = DetectorContext { text, config };
        let mut hits = Vec::new();

        for detector in &self.detectors {
            if cancel.is_cancelled() {
                debug!("detector run cancelled before {}", detector.id());
                break;
            }
            if hits.len() >= config.max_matches_per_call {
                debug!("match budget reached before {}", detector.id());
                break;
            }

            let mut found = detector.detect(&ctx).await;
            let remaining = config.max_matches_per_call.saturating_sub(hits.len());
            if found.len() > remaining {
                found.truncate(remaining);
            }
            hits.extend(found);
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::patterns::{CreditCardDetector, EmailDetector};
    use crate::types::NeverCancel;

    #[tokio::test]
    async fn runs_detectors_in_priority_order_and_collects_hits() {
        let runtime = DetectorRuntime::new(vec![
            Arc::new(CreditCardDetector),
            Arc::new(EmailDetector),
        ]);
        let config = RegistryConfig::default();
        let hits = runtime
            .run("contact alice@example.com, card 4242424242424242", &config, &NeverCancel)
            .await;
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn respects_match_budget() {
        let runtime = DetectorRuntime::new(vec![Arc::new(EmailDetector)]);
        let mut config = RegistryConfig::default();
        config.max_matches_per_call = 1;
        let text = "a@b.com, c@d.com, e@f.com";
        let hits = runtime.run(text, &config, &NeverCancel).await;
        assert_eq!(hits.len(), 1);
    }
}
