use super::RefinementPipeline;
use crate::cache::{FingerprintGenerator, RequestCache};
use crate::config::RefineConfig;
use crate::context::{ContextProvider, NoContext};
use crate::prompt::PromptBuilder;
use crate::secrets::{EnvSecretStore, SecretStore};
use crate::streaming::StreamingOrchestrator;
use crate::telemetry::{noop_sink, HistorySink};
use crate::tokens::{TokenBudget, TokenCounter};
use crate::transport::GenerativeService;
use crate::Result;
use std::sync::Arc;

/// Builder for [`RefinementPipeline`].
///
/// Only the service is required. Defaults: [`RefineConfig::default`], no
/// context, credential from `REFINE_API_KEY`, no-op history sink, a fresh cache.
pub struct RefinementPipelineBuilder {
    service: Arc<dyn GenerativeService>,
    config: RefineConfig,
    context: Arc<dyn ContextProvider>,
    secrets: Arc<dyn SecretStore>,
    sink: Arc<dyn HistorySink>,
    prompt: PromptBuilder,
    counter: Option<Arc<dyn TokenCounter>>,
    cache: Option<Arc<RequestCache>>,
}

impl RefinementPipelineBuilder {
    pub fn new(service: Arc<dyn GenerativeService>) -> Self {
        Self {
            service,
            config: RefineConfig::default(),
            context: Arc::new(NoContext),
            secrets: Arc::new(EnvSecretStore::default()),
            sink: noop_sink(),
            prompt: PromptBuilder::new(),
            counter: None,
            cache: None,
        }
    }

    pub fn config(mut self, config: RefineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = provider;
        self
    }

    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secrets = store;
        self
    }

    /// Inject a history sink. Default is a no-op sink.
    pub fn history_sink(mut self, sink: Arc<dyn HistorySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn prompt_builder(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = Some(counter);
        self
    }

    /// Share a cache between pipelines. Its configuration is replaced by this
    /// builder's config on `build`.
    pub fn cache(mut self, cache: Arc<RequestCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<RefinementPipeline> {
        self.config.validate()?;
        let config = self.config;

        let cache = match self.cache {
            Some(cache) => {
                cache.reconfigure(config.cache_config());
                cache
            }
            None => Arc::new(RequestCache::new(config.cache_config())),
        };

        let mut budget = TokenBudget::new(config.max_prompt_tokens, config.token_warning_threshold);
        if let Some(counter) = self.counter {
            budget = budget.with_counter(counter);
        }

        let orchestrator = StreamingOrchestrator::new(self.service)
            .with_retry_policy(config.retry_policy())
            .with_timeout(config.request_timeout())
            .with_progress_every(config.progress_every);

        Ok(RefinementPipeline {
            model_id: config.model_id.clone(),
            config,
            cache,
            orchestrator,
            context: self.context,
            secrets: self.secrets,
            sink: self.sink,
            prompt: self.prompt,
            budget,
            fingerprints: FingerprintGenerator::new(),
        })
    }
}
