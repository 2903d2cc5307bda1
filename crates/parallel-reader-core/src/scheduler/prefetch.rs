use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::TranslationScheduler;
use crate::config::Lang;

#[derive(Default)]
struct Queue {
    lang: Option<Lang>,
    pages: VecDeque<Vec<String>>,
    generation: u64,
}

struct Shared {
    queue: Mutex<Queue>,
    notify: Notify,
}

impl Shared {
    fn queue(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background warmer for upcoming pages.
///
/// A single worker takes one page at a time: pages already cached are
/// skipped, otherwise it waits for the foreground to go idle, sleeps the
/// configured delay and translates the page. Failures are logged and the
/// page is dropped. Dropping the prefetcher stops the worker.
pub struct Prefetcher {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl Prefetcher {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(scheduler: Arc<TranslationScheduler>, delay: Duration) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            notify: Notify::new(),
        });

        let worker = tokio::spawn(run(Arc::clone(&shared), scheduler, delay));

        Self { shared, worker }
    }

    /// Replace whatever is queued with `pages`, in order.
    pub fn schedule(&self, pages: Vec<Vec<String>>, lang: &Lang) {
        {
            let mut queue = self.shared.queue();
            queue.pages = pages.into();
            queue.lang = Some(lang.clone());
            queue.generation += 1;
            debug!("Prefetch queue replaced with {} pages", queue.pages.len());
        }
        self.shared.notify.notify_one();
    }

    pub fn clear(&self) {
        let mut queue = self.shared.queue();
        queue.pages.clear();
        queue.generation += 1;
    }

    /// Pages still waiting, not counting one being worked on.
    pub fn pending(&self) -> usize {
        self.shared.queue().pages.len()
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run(shared: Arc<Shared>, scheduler: Arc<TranslationScheduler>, delay: Duration) {
    loop {
        let next = {
            let mut queue = shared.queue();
            let generation = queue.generation;
            let lang = queue.lang.clone();
            queue.pages.pop_front().zip(lang).map(|(page, lang)| (page, lang, generation))
        };

        let Some((page, lang, generation)) = next else {
            shared.notify.notified().await;
            continue;
        };

        if scheduler.is_cached(&page, &lang).await {
            debug!("Prefetch: page of {} sentences already cached", page.len());
            continue;
        }

        scheduler.wait_idle().await;
        tokio::time::sleep(delay).await;

        if shared.queue().generation != generation {
            debug!("Prefetch: queue replaced while waiting, dropping page");
            continue;
        }

        let results = scheduler.prefetch_page(&page, &lang).await;
        let failed = results.iter().filter(|t| t.source.is_placeholder()).count();
        if failed > 0 {
            warn!("Prefetch: {} of {} sentences not translated", failed, results.len());
        } else {
            debug!("Prefetch: warmed page of {} sentences", results.len());
        }
    }
}
