//! Shopping-list download: cached aggregation, then rendering.

use std::sync::Arc;

use pantry_core::{Caller, PantryError, PantryResult, RenderError};
use pantry_storage::ShoppingListCache;
use tracing::{error, info};

use crate::render::{RenderedDocument, ShoppingListRenderer};

/// Produces the caller's shopping-list document.
#[derive(Clone)]
pub struct ShoppingListService {
    cache: Arc<ShoppingListCache>,
    renderer: Arc<dyn ShoppingListRenderer>,
}

impl std::fmt::Debug for ShoppingListService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShoppingListService")
            .field("cache", &self.cache)
            .field("renderer", &"<ShoppingListRenderer>")
            .finish()
    }
}

impl ShoppingListService {
    pub fn new(cache: Arc<ShoppingListCache>, renderer: Arc<dyn ShoppingListRenderer>) -> Self {
        Self { cache, renderer }
    }

    pub fn cache(&self) -> &Arc<ShoppingListCache> {
        &self.cache
    }

    /// Aggregate (through the cache) and render.
    ///
    /// Anonymous callers get `Unauthorized`, an empty cart `EmptyCart`.
    /// Rendering runs on the blocking pool.
    pub async fn download(&self, caller: &Caller) -> PantryResult<RenderedDocument> {
        let user_id = caller.require_user()?;

        let read = self.cache.get_or_compute(caller).await?;
        let cache_hit = read.was_cache_hit();
        let lines = read.into_value();

        if lines.is_empty() {
            info!(user_id = user_id.get(), cache_hit, "Shopping cart is empty");
            return Err(PantryError::EmptyCart);
        }

        let line_count = lines.len();
        let renderer = Arc::clone(&self.renderer);
        let rendered = tokio::task::spawn_blocking(move || renderer.render(&lines))
            .await
            .map_err(|e| RenderError::Encoding {
                reason: format!("render task failed: {}", e),
            })
            .and_then(|result| result);

        match rendered {
            Ok(document) => {
                info!(
                    user_id = user_id.get(),
                    line_count,
                    cache_hit,
                    byte_len = document.bytes.len(),
                    "Shopping list rendered"
                );
                Ok(document)
            }
            Err(e) => {
                error!(
                    user_id = user_id.get(),
                    line_count,
                    error = %e,
                    "Shopping list rendering failed"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::render::PdfRenderer;
    use pantry_core::{AggregatedLine, UserId};
    use pantry_storage::{
        Aggregator, CacheConfig, InMemoryCacheBackend, InMemoryStore, NewRecipe, Store,
    };
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records what it was asked to render.
    #[derive(Default)]
    struct RecordingRenderer {
        calls: AtomicUsize,
        last: Mutex<Vec<AggregatedLine>>,
    }

    impl ShoppingListRenderer for RecordingRenderer {
        fn render(&self, lines: &[AggregatedLine]) -> Result<RenderedDocument, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().expect("lock") = lines.to_vec();
            Ok(RenderedDocument {
                bytes: b"%PDF-stub".to_vec(),
                content_type: "application/pdf",
                filename: "shopping_cart.pdf".to_string(),
            })
        }
    }

    fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let salt = store.insert_ingredient("Salt", "g").unwrap();
        let apples = store.insert_ingredient("Apples", "kg").unwrap();
        for (name, amount) in [("Soup", 5), ("Stew", 10)] {
            store
                .insert_recipe(NewRecipe {
                    author: UserId::new(100),
                    name: name.to_string(),
                    image: String::new(),
                    text: "Cook.".to_string(),
                    cooking_time: 20,
                    tag_ids: Vec::new(),
                    ingredients: vec![(salt.id, amount), (apples.id, 1)],
                })
                .unwrap();
        }
        store
    }

    fn service_with(
        store: Arc<InMemoryStore>,
        renderer: Arc<dyn ShoppingListRenderer>,
    ) -> ShoppingListService {
        let cache = ShoppingListCache::new(
            Aggregator::new(store),
            Arc::new(InMemoryCacheBackend::new(16)),
            CacheConfig::default(),
        );
        ShoppingListService::new(Arc::new(cache), renderer)
    }

    async fn fill_cart(store: &InMemoryStore, user: UserId) {
        let page = store.recipe_list(&Default::default()).await.unwrap();
        for recipe in page.results {
            store
                .list_add(pantry_core::RecipeList::ShoppingCart, user, recipe.id)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_download_requires_user() {
        let service = service_with(seeded_store(), Arc::new(RecordingRenderer::default()));
        let result = service.download(&Caller::Anonymous).await;
        assert!(matches!(result, Err(PantryError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_empty_cart_is_reported_and_not_rendered() {
        let renderer = Arc::new(RecordingRenderer::default());
        let service = service_with(seeded_store(), renderer.clone());

        let result = service.download(&Caller::User(UserId::new(1))).await;

        assert!(matches!(result, Err(PantryError::EmptyCart)));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_download_renders_aggregated_lines() {
        let store = seeded_store();
        let user = UserId::new(1);
        fill_cart(&store, user).await;

        let renderer = Arc::new(RecordingRenderer::default());
        let service = service_with(store, renderer.clone());

        let doc = service.download(&Caller::User(user)).await.unwrap();

        assert_eq!(doc.filename, "shopping_cart.pdf");
        assert_eq!(
            *renderer.last.lock().unwrap(),
            vec![
                AggregatedLine::new("Apples", "kg", 2),
                AggregatedLine::new("Salt", "g", 15),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_download_served_from_cache() {
        let store = seeded_store();
        let user = UserId::new(1);
        fill_cart(&store, user).await;
        let service = service_with(store, Arc::new(RecordingRenderer::default()));

        service.download(&Caller::User(user)).await.unwrap();
        service.download(&Caller::User(user)).await.unwrap();

        let stats = service.cache().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[tokio::test]
    async fn test_render_failure_surfaces_as_render_error() {
        let store = seeded_store();
        let user = UserId::new(1);
        fill_cart(&store, user).await;

        let renderer = PdfRenderer::new(RenderConfig {
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
            ..RenderConfig::default()
        });
        let service = service_with(store, Arc::new(renderer));

        let result = service.download(&Caller::User(user)).await;
        assert!(matches!(
            result,
            Err(PantryError::Render(RenderError::FontUnavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_download_with_pdf_renderer() {
        let store = seeded_store();
        let user = UserId::new(1);
        fill_cart(&store, user).await;
        let service = service_with(store, Arc::new(PdfRenderer::new(RenderConfig::default())));

        let doc = service.download(&Caller::User(user)).await.unwrap();
        assert!(doc.bytes.starts_with(b"%PDF"));
    }
}
