//! Priority-ordered handler chain: the advanced rendering strategy.
//!
//! Handlers run one after another in descending priority, each seeing the
//! output of the previous one. Code regions are protected for the whole
//! pass; the result is converted to HTML and table markers are resolved.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use wk_config::HandlersConfig;
use wk_storage::PageStore;

use crate::alert::{AlertKind, AlertSink, PerformanceAlert};
use crate::context::ParseContext;
use crate::error::{RegistryError, RenderError};
use crate::handler::{InitContext, SyntaxHandler};
use crate::markdown;
use crate::protect::{ProtectedRegions, ProtectionScope};
use crate::tables;

/// Execution counters of one handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerStats {
    pub executions: u64,
    pub errors: u64,
    pub total_time: Duration,
    /// Passes that exceeded the handler's timeout.
    pub slow_calls: u64,
}

#[derive(Default)]
struct Counters {
    executions: AtomicU64,
    errors: AtomicU64,
    total_micros: AtomicU64,
    slow_calls: AtomicU64,
}

struct Entry {
    handler: Box<dyn SyntaxHandler>,
    enabled: AtomicBool,
    counters: Counters,
}

/// Registered handlers plus their runtime state.
pub struct HandlerChain {
    entries: Vec<Entry>,
    initialized: AtomicBool,
    default_timeout: Duration,
    alerts: Arc<dyn AlertSink>,
}

impl HandlerChain {
    pub fn new(default_timeout: Duration, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            entries: Vec::new(),
            initialized: AtomicBool::new(false),
            default_timeout,
            alerts,
        }
    }

    pub fn from_config(config: &HandlersConfig, alerts: Arc<dyn AlertSink>) -> Self {
        Self::new(Duration::from_millis(config.default_timeout_ms), alerts)
    }

    /// Add a handler behind every handler of equal or higher priority.
    pub fn register(&mut self, handler: impl SyntaxHandler + 'static) -> Result<(), RegistryError> {
        let id = handler.id();
        if self.entries.iter().any(|e| e.handler.id() == id) {
            return Err(RegistryError::DuplicateId(id.to_owned()));
        }
        let priority = handler.priority();
        let position = self
            .entries
            .iter()
            .position(|e| e.handler.priority() < priority)
            .unwrap_or(self.entries.len());
        tracing::debug!(handler = id, priority, "Registered syntax handler");
        self.entries.insert(
            position,
            Entry {
                handler: Box::new(handler),
                enabled: AtomicBool::new(true),
                counters: Counters::default(),
            },
        );
        Ok(())
    }

    /// Handler ids in execution order.
    pub fn handler_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.handler.id()).collect()
    }

    pub fn handler(&self, id: &str) -> Option<&dyn SyntaxHandler> {
        self.entry(id).map(|e| e.handler.as_ref())
    }

    pub fn is_enabled(&self, id: &str) -> Option<bool> {
        self.entry(id).map(|e| e.enabled.load(Ordering::Acquire))
    }

    /// Switch a handler on or off. Returns `false` for unknown ids.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        entry.enabled.store(enabled, Ordering::Release);
        tracing::info!(handler = id, enabled, "Syntax handler toggled");
        true
    }

    pub fn stats(&self, id: &str) -> Option<HandlerStats> {
        self.entry(id).map(|e| HandlerStats {
            executions: e.counters.executions.load(Ordering::Relaxed),
            errors: e.counters.errors.load(Ordering::Relaxed),
            total_time: Duration::from_micros(e.counters.total_micros.load(Ordering::Relaxed)),
            slow_calls: e.counters.slow_calls.load(Ordering::Relaxed),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Initialize every handler. Handlers with unmet dependencies or failing
    /// setup are disabled; their ids are returned.
    pub fn initialize(&self, ctx: &InitContext<'_>) -> Vec<String> {
        let mut disabled = Vec::new();
        for entry in &self.entries {
            let handler = &entry.handler;
            let missing = handler
                .metadata()
                .dependencies
                .iter()
                .find(|dependency| !ctx.provides(dependency));
            let failure = match missing {
                Some(dependency) => Some(
                    RegistryError::MissingDependency {
                        handler: handler.id().to_owned(),
                        dependency: dependency.clone(),
                    }
                    .to_string(),
                ),
                None => handler.initialize(ctx).err().map(|e| e.to_string()),
            };
            if let Some(error) = failure {
                tracing::error!(handler = handler.id(), %error, "Syntax handler disabled");
                entry.enabled.store(false, Ordering::Release);
                disabled.push(handler.id().to_owned());
            }
        }
        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            handlers = self.entries.len(),
            disabled = disabled.len(),
            "Handler chain initialized"
        );
        disabled
    }

    /// Render `content` to HTML through every enabled handler.
    pub fn parse(&self, content: &str, ctx: &ParseContext) -> Result<String, RenderError> {
        if !self.is_initialized() {
            return Err(RenderError::NotInitialized);
        }

        let (mut text, regions) = ProtectedRegions::protect(content, ProtectionScope::Code);
        for entry in self.entries.iter().filter(|e| e.enabled.load(Ordering::Acquire)) {
            let started = Instant::now();
            let result = entry.handler.process(&text, ctx);
            self.record(entry, started.elapsed(), ctx);

            match result {
                Ok(output) => text = output,
                Err(source) => {
                    entry.counters.errors.fetch_add(1, Ordering::Relaxed);
                    return Err(RenderError::Handler {
                        id: entry.handler.id().to_owned(),
                        source,
                    });
                }
            }
        }

        let html = markdown::to_html(&regions.restore(&text));
        Ok(tables::post_process_tables(&html))
    }

    /// Reload page names in every handler that keeps them.
    pub fn refresh_page_names(&self, store: &dyn PageStore) {
        for entry in &self.entries {
            entry.handler.refresh_page_names(store);
        }
    }

    pub fn add_page_name(&self, name: &str) {
        for entry in &self.entries {
            entry.handler.add_page_name(name);
        }
    }

    pub fn remove_page_name(&self, name: &str) {
        for entry in &self.entries {
            entry.handler.remove_page_name(name);
        }
    }

    fn entry(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.handler.id() == id)
    }

    fn record(&self, entry: &Entry, elapsed: Duration, ctx: &ParseContext) {
        let counters = &entry.counters;
        counters.executions.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        counters.total_micros.fetch_add(micros, Ordering::Relaxed);

        let timeout = entry
            .handler
            .metadata()
            .timeout_ms
            .map_or(self.default_timeout, Duration::from_millis);
        if elapsed > timeout {
            counters.slow_calls.fetch_add(1, Ordering::Relaxed);
            self.alerts.raise(PerformanceAlert {
                kind: AlertKind::SlowHandler,
                subject: entry.handler.id().to_owned(),
                elapsed,
                threshold: timeout,
                message: format!(
                    "Handler {} took {}ms on {}",
                    entry.handler.id(),
                    elapsed.as_millis(),
                    ctx.page_name
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use pretty_assertions::assert_eq;
    use regex::Regex;
    use wk_config::Config;
    use wk_storage::MockPageStore;

    use super::*;
    use crate::alert::MemoryAlertSink;
    use crate::error::HandlerError;
    use crate::handler::{HandlerMetadata, HandlerOutput, SyntaxMatch};

    static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").unwrap());

    /// Appends its tag to every `@word`.
    struct Tagger {
        metadata: HandlerMetadata,
        tag: &'static str,
        fail_init: bool,
        fail_pass: bool,
        delay: Duration,
    }

    impl Tagger {
        fn new(id: &str, priority: i32, tag: &'static str) -> Self {
            Self {
                metadata: HandlerMetadata::new(id, WORD.as_str(), priority),
                tag,
                fail_init: false,
                fail_pass: false,
                delay: Duration::ZERO,
            }
        }
    }

    impl SyntaxHandler for Tagger {
        fn metadata(&self) -> &HandlerMetadata {
            &self.metadata
        }

        fn pattern(&self) -> &Regex {
            &WORD
        }

        fn handle_match(
            &self,
            m: &SyntaxMatch,
            _ctx: &ParseContext,
        ) -> Result<HandlerOutput, HandlerError> {
            Ok(HandlerOutput::Replace(format!("{}{}", m.full_match, self.tag)))
        }

        fn initialize(&self, _ctx: &InitContext<'_>) -> Result<(), HandlerError> {
            if self.fail_init {
                return Err(HandlerError::Initialization("boom".to_owned()));
            }
            Ok(())
        }

        fn process(&self, content: &str, _ctx: &ParseContext) -> Result<String, HandlerError> {
            std::thread::sleep(self.delay);
            if self.fail_pass {
                return Err(HandlerError::InvalidSyntax("broken".to_owned()));
            }
            Ok(WORD
                .replace_all(content, |caps: &regex::Captures<'_>| format!("{}{}", &caps[0], self.tag))
                .into_owned())
        }
    }

    fn init(chain: &HandlerChain) -> Vec<String> {
        let store = MockPageStore::new();
        let config = Config::default();
        chain.initialize(&InitContext {
            store: &store,
            config: &config,
        })
    }

    fn chain() -> (HandlerChain, Arc<MemoryAlertSink>) {
        let alerts = Arc::new(MemoryAlertSink::new());
        let sink = Arc::clone(&alerts);
        (HandlerChain::new(Duration::from_secs(5), sink), alerts)
    }

    #[test]
    fn test_priority_order_is_stable() {
        let (mut chain, _) = chain();
        chain.register(Tagger::new("low", 10, "L")).unwrap();
        chain.register(Tagger::new("first", 50, "1")).unwrap();
        chain.register(Tagger::new("high", 90, "H")).unwrap();
        chain.register(Tagger::new("second", 50, "2")).unwrap();

        assert_eq!(chain.handler_ids(), vec!["high", "first", "second", "low"]);

        init(&chain);
        let html = chain.parse("@w", &ParseContext::new("P")).unwrap();
        assert_eq!(html, "<p>@wH12L</p>\n");
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let (mut chain, _) = chain();
        chain.register(Tagger::new("same", 1, "a")).unwrap();

        let err = chain.register(Tagger::new("same", 2, "b")).unwrap_err();

        assert!(matches!(err, RegistryError::DuplicateId(id) if id == "same"));
    }

    #[test]
    fn test_parse_requires_initialization() {
        let (chain, _) = chain();

        let err = chain.parse("x", &ParseContext::new("P")).unwrap_err();

        assert!(matches!(err, RenderError::NotInitialized));
    }

    #[test]
    fn test_failed_setup_disables_handler() {
        let (mut chain, _) = chain();
        let mut broken = Tagger::new("broken", 20, "B");
        broken.fail_init = true;
        let mut needy = Tagger::new("needy", 15, "N");
        needy.metadata = needy.metadata.with_dependencies(&["SearchIndex"]);
        chain.register(broken).unwrap();
        chain.register(needy).unwrap();
        chain.register(Tagger::new("ok", 10, "K")).unwrap();

        let disabled = init(&chain);

        assert_eq!(disabled, vec!["broken", "needy"]);
        assert_eq!(chain.is_enabled("broken"), Some(false));
        assert_eq!(chain.parse("@w", &ParseContext::new("P")).unwrap(), "<p>@wK</p>\n");
    }

    #[test]
    fn test_handler_failure_is_reported() {
        let (mut chain, _) = chain();
        let mut failing = Tagger::new("failing", 10, "F");
        failing.fail_pass = true;
        chain.register(failing).unwrap();
        init(&chain);

        let err = chain.parse("@w", &ParseContext::new("P")).unwrap_err();

        assert!(matches!(&err, RenderError::Handler { id, .. } if id == "failing"));
        assert_eq!(chain.stats("failing").unwrap().errors, 1);
    }

    #[test]
    fn test_toggle_and_stats() {
        let (mut chain, _) = chain();
        chain.register(Tagger::new("t", 10, "T")).unwrap();
        init(&chain);

        assert!(chain.set_enabled("t", false));
        assert!(!chain.set_enabled("nope", false));
        assert_eq!(chain.parse("@w", &ParseContext::new("P")).unwrap(), "<p>@w</p>\n");

        chain.set_enabled("t", true);
        chain.parse("@w", &ParseContext::new("P")).unwrap();
        assert_eq!(chain.stats("t").unwrap().executions, 1);
        assert!(chain.handler("t").is_some());
    }

    #[test]
    fn test_slow_handler_raises_alert() {
        let (mut chain, alerts) = chain();
        let mut slow = Tagger::new("slow", 10, "S");
        slow.metadata = slow.metadata.with_timeout_ms(1);
        slow.delay = Duration::from_millis(20);
        chain.register(slow).unwrap();
        init(&chain);

        chain.parse("@w", &ParseContext::new("Slow Page")).unwrap();

        let raised = alerts.alerts();
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].kind, AlertKind::SlowHandler);
        assert_eq!(raised[0].subject, "slow");
        assert_eq!(chain.stats("slow").unwrap().slow_calls, 1);
    }

    #[test]
    fn test_code_is_protected() {
        let (mut chain, _) = chain();
        chain.register(Tagger::new("t", 10, "T")).unwrap();
        init(&chain);

        let html = chain.parse("`@code` @text", &ParseContext::new("P")).unwrap();

        assert_eq!(html, "<p><code>@code</code> @textT</p>\n");
    }
}
