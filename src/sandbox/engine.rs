use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::OnceCell;

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// A loaded OCR engine. Implementations may queue overlapping calls
/// internally; callers add no locking of their own.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize a PNG-encoded image and return the raw text.
    async fn recognize(&self, png: &[u8]) -> Result<String>;
}

/// Builds an engine from pre-provisioned assets.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn OcrEngine>>;
}

/// Holds the one engine instance of a sandbox lifetime.
///
/// The first caller runs the loader; callers arriving while it runs await the
/// same initialization. A failed load leaves the slot empty so the next
/// request tries again.
pub struct EngineSlot {
    loader: Arc<dyn EngineLoader>,
    engine: OnceCell<Arc<dyn OcrEngine>>,
}

impl EngineSlot {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.initialized()
    }

    pub async fn get(&self) -> Result<Arc<dyn OcrEngine>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                log_info!("Initializing OCR engine...");
                let engine = self.loader.load().await?;
                log_info!("OCR engine initialized");
                Ok::<_, anyhow::Error>(engine)
            })
            .await?;
        Ok(Arc::clone(engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Blank;

    #[async_trait]
    impl OcrEngine for Blank {
        async fn recognize(&self, _png: &[u8]) -> Result<String> {
            Ok(String::new())
        }
    }

    struct CountingLoader {
        loads: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl EngineLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn OcrEngine>> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail_first && attempt == 0 {
                bail!("trained data missing");
            }
            Ok(Arc::new(Blank))
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_initialization() {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail_first: false,
        });
        let slot = Arc::new(EngineSlot::new(loader.clone()));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let slot = Arc::clone(&slot);
                tokio::spawn(async move { slot.get().await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(slot.is_initialized());
    }

    #[tokio::test]
    async fn failed_initialization_is_retried() {
        let loader = Arc::new(CountingLoader {
            loads: AtomicUsize::new(0),
            fail_first: true,
        });
        let slot = EngineSlot::new(loader.clone());

        let err = slot.get().await.err().unwrap();
        assert!(err.to_string().contains("trained data missing"));
        assert!(!slot.is_initialized());

        slot.get().await.unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }
}
