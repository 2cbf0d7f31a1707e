//! Sequential batch rendering with per-item failure isolation.

use crate::canvas::CanvasRenderer;
use crate::optimizer::ImageOptimizer;
use crate::result::{RenderError, RenderResult};
use crate::scene::{validate_dimensions, validate_quality, RenderOutcome, RenderRequest};
use tracing::{debug, info};

/// One slot of a batch
#[derive(Debug, Clone)]
pub enum BatchEntry {
    /// An item to validate and render
    Render(RenderRequest),
    /// An item already rejected upstream, e.g. while decoding the request body
    Rejected(RenderOutcome),
}

impl From<RenderRequest> for BatchEntry {
    fn from(request: RenderRequest) -> Self {
        Self::Render(request)
    }
}

/// Renders a list of requests one after another
#[derive(Debug, Clone)]
pub struct BatchCoordinator {
    renderer: CanvasRenderer,
    optimizer: ImageOptimizer,
    max_dimension: u32,
}

impl BatchCoordinator {
    /// Create a coordinator rejecting items larger than `max_dimension`
    #[must_use]
    pub const fn new(
        renderer: CanvasRenderer,
        optimizer: ImageOptimizer,
        max_dimension: u32,
    ) -> Self {
        Self {
            renderer,
            optimizer,
            max_dimension,
        }
    }

    /// Render every item, in order, one at a time.
    ///
    /// Always returns exactly one outcome per entry, at the same index. A
    /// failing or invalid item is recorded and the next item is still
    /// attempted. No size limit is applied here.
    #[tracing::instrument(skip_all, fields(items = items.len()))]
    pub async fn render_batch(&self, items: Vec<BatchEntry>) -> Vec<RenderOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());

        for (index, entry) in items.into_iter().enumerate() {
            let outcome = match entry {
                BatchEntry::Rejected(outcome) => {
                    debug!(index, "batch item rejected before rendering");
                    outcome
                }
                BatchEntry::Render(item) => match self.render_one(index, &item).await {
                    Ok(image) => RenderOutcome::succeeded(item.id, image, item.format),
                    Err(e) => {
                        debug!(index, error = %e, "batch item failed");
                        RenderOutcome::failed(item.id, &e, item.format)
                    }
                },
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.success).count();
        info!(total = outcomes.len(), failed, "batch complete");
        outcomes
    }

    async fn render_one(&self, index: usize, item: &RenderRequest) -> RenderResult<Vec<u8>> {
        validate_dimensions(item.width, item.height, self.max_dimension)
            .and_then(|()| validate_quality(item.quality))
            .map_err(|e| scoped_to_item(e, index))?;

        let pixels = self
            .renderer
            .render(&item.scene, item.width, item.height)
            .await?;
        self.optimizer.optimize(&pixels, item.format, item.quality)
    }
}

/// Prefix a field error with the item's position, e.g. `items[2].width`.
#[must_use]
pub fn scoped_to_item(err: RenderError, index: usize) -> RenderError {
    match err {
        RenderError::InvalidInput { field, message } if field.is_empty() => {
            RenderError::invalid_input(format!("items[{index}]"), message)
        }
        RenderError::InvalidInput { field, message } => {
            RenderError::invalid_input(format!("items[{index}].{field}"), message)
        }
        other => other,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::browser::{BrowserPool, RuntimeSource};
    use crate::mock::MockLauncher;
    use crate::optimizer::ImageFormat;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn coordinator(launcher: &MockLauncher) -> BatchCoordinator {
        let pool = BrowserPool::new(
            Arc::new(launcher.clone()),
            RuntimeSource::Html(String::new()),
            4,
        );
        BatchCoordinator::new(
            CanvasRenderer::new(pool, Duration::from_secs(5)),
            ImageOptimizer::new(),
            4096,
        )
    }

    fn entries(items: &[RenderRequest]) -> Vec<BatchEntry> {
        items.iter().cloned().map(BatchEntry::from).collect()
    }

    fn rect() -> Value {
        json!({"objects": [{"type": "rect", "width": 40, "height": 40, "fill": "#00f"}]})
    }

    #[tokio::test]
    async fn test_valid_and_null_scene() {
        let launcher = MockLauncher::new();
        let batch = coordinator(&launcher);

        let items = vec![
            RenderRequest::new("a", rect())
                .with_size(100, 100)
                .with_format(ImageFormat::Png),
            RenderRequest::new("b", Value::Null).with_size(100, 100),
        ];
        let results = batch.render_batch(entries(&items)).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, json!("a"));
        assert!(results[0].success);
        assert!(!results[0].image.as_ref().unwrap().is_empty());
        assert_eq!(results[0].format, ImageFormat::Png);
        assert!(results[0].error.is_none());

        assert_eq!(results[1].id, json!("b"));
        assert!(!results[1].success);
        assert!(results[1].image.is_none());
        assert_eq!(results[1].format, ImageFormat::Png);
        assert!(results[1].error.is_some());
    }

    #[tokio::test]
    async fn test_failure_in_middle_does_not_stop_batch() {
        let launcher = MockLauncher::new();
        let batch = coordinator(&launcher);

        let items: Vec<_> = (0..5)
            .map(|i| {
                let scene = if i == 2 { json!("not a scene") } else { rect() };
                RenderRequest::new(i, scene).with_size(20, 20)
            })
            .collect();
        let results = batch.render_batch(entries(&items)).await;

        let success: Vec<bool> = results.iter().map(|r| r.success).collect();
        assert_eq!(success, vec![true, true, false, true, true]);
    }

    #[tokio::test]
    async fn test_invalid_item_fails_alone() {
        let launcher = MockLauncher::new();
        let batch = coordinator(&launcher);

        let items = vec![
            RenderRequest::new("ok", rect()).with_size(20, 20),
            RenderRequest::new("huge", rect()).with_size(5000, 20),
            RenderRequest::new("q", rect()).with_size(20, 20).with_quality(0),
            RenderRequest::new("ok2", rect()).with_size(20, 20),
        ];
        let results = batch.render_batch(entries(&items)).await;

        let success: Vec<bool> = results.iter().map(|r| r.success).collect();
        assert_eq!(success, vec![true, false, false, true]);
        assert!(results[1].error.as_ref().unwrap().contains("items[1].width"));
        assert!(results[2].error.as_ref().unwrap().contains("items[2].quality"));
        assert_eq!(launcher.pages_created(), 1);
    }

    #[tokio::test]
    async fn test_rejected_entry_keeps_its_slot() {
        let launcher = MockLauncher::new();
        let batch = coordinator(&launcher);

        let rejected = RenderOutcome::failed(
            json!("broken"),
            &RenderError::invalid_input("items[1]", "invalid value: -1"),
            ImageFormat::Png,
        );
        let results = batch
            .render_batch(vec![
                RenderRequest::new("a", rect()).with_size(10, 10).into(),
                BatchEntry::Rejected(rejected.clone()),
                RenderRequest::new("c", rect()).with_size(10, 10).into(),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].success && results[2].success);
        assert_eq!(results[1], rejected);
    }

    #[test]
    fn test_scoped_to_item() {
        let err = scoped_to_item(RenderError::invalid_input("width", "too big"), 3);
        assert!(err.to_string().contains("`items[3].width`"));
        let err = scoped_to_item(RenderError::invalid_input("", "not an object"), 0);
        assert!(err.to_string().contains("`items[0]`"));
        let err = scoped_to_item(RenderError::scene_load("x"), 1);
        assert!(matches!(err, RenderError::SceneLoad { .. }));
    }

    #[tokio::test]
    async fn test_jpeg_items_are_jpeg() {
        let launcher = MockLauncher::new();
        let batch = coordinator(&launcher);

        let items = vec![RenderRequest::new("j", rect())
            .with_size(30, 30)
            .with_format(ImageFormat::Jpeg)
            .with_quality(70)];
        let results = batch.render_batch(entries(&items)).await;
        let image = results[0].image.as_ref().unwrap();
        assert_eq!(&image[0..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_empty_batch_is_empty() {
        let launcher = MockLauncher::new();
        assert!(coordinator(&launcher).render_batch(Vec::new()).await.is_empty());
        assert_eq!(launcher.launches(), 0);
    }

    #[tokio::test]
    async fn test_items_reuse_one_page() {
        let launcher = MockLauncher::new();
        let batch = coordinator(&launcher);

        let items: Vec<_> = (0..6)
            .map(|i| RenderRequest::new(i, rect()).with_size(10, 10))
            .collect();
        batch.render_batch(entries(&items)).await;
        assert_eq!(launcher.pages_created(), 1);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(24))]

            #[test]
            fn prop_results_align_with_items(
                ids in proptest::collection::vec(any::<i64>(), 0..8),
                bad in proptest::collection::vec(any::<bool>(), 8),
            ) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                let launcher = MockLauncher::new();
                let batch = coordinator(&launcher);

                let items: Vec<_> = ids
                    .iter()
                    .zip(&bad)
                    .map(|(id, bad)| {
                        let scene = if *bad { Value::Null } else { rect() };
                        RenderRequest::new(*id, scene).with_size(8, 8)
                    })
                    .collect();
                let results = rt.block_on(batch.render_batch(entries(&items)));

                prop_assert_eq!(results.len(), items.len());
                for (i, (item, result)) in items.iter().zip(&results).enumerate() {
                    prop_assert_eq!(&result.id, &item.id);
                    prop_assert_eq!(result.success, !bad[i]);
                    prop_assert_eq!(result.image.is_some(), result.success);
                    prop_assert_eq!(result.error.is_some(), !result.success);
                }
            }
        }
    }
}
