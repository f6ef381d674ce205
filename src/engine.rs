//! The engine's process-wide state (§9 "global mutable state -> explicit
//! contexts"): frontier, corpus, pacer, and the cooperative stop flag live
//! in one value passed explicitly to every worker, rather than behind
//! package-level singletons.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use newsbot_core::{AppConfig, FetchConfig};
use newsbot_frontier::FrontierStore;
use newsbot_pacer::HostPacer;
use newsbot_storage::CorpusStore;

pub struct Engine {
    pub frontier: FrontierStore,
    pub corpus: CorpusStore,
    pub pacer: HostPacer,
    pub config: AppConfig,
    pub fetch_config: FetchConfig,
    stop: AtomicBool,
}

impl Engine {
    pub fn new(frontier: FrontierStore, corpus: CorpusStore, config: AppConfig) -> Arc<Self> {
        let pacer = HostPacer::new(Duration::from_secs_f64(config.logic.delay_seconds));
        let fetch_config = FetchConfig {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(config.logic.request_timeout),
            user_agent: "newsbot/0.1".to_string(),
        };
        Arc::new(Self {
            frontier,
            corpus,
            pacer,
            config,
            fetch_config,
            stop: AtomicBool::new(false),
        })
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn recrawl_after(&self) -> i64 {
        self.config.logic.recrawl_after_seconds
    }

    pub fn non_article_refetch(&self) -> i64 {
        self.config.logic.non_article_refetch_seconds
    }
}
