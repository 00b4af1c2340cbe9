//! Strategy selection between the handler chain and the legacy pipeline.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use wk_config::RenderingConfig;

use crate::alert::{AlertKind, AlertSink, PerformanceAlert};
use crate::chain::HandlerChain;
use crate::context::ParseContext;
use crate::error::RenderError;
use crate::legacy::LegacyPipeline;

/// Which strategy produced a rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Advanced,
    Legacy,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Advanced => "advanced",
            Self::Legacy => "legacy",
        })
    }
}

/// HTML plus the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub strategy: Strategy,
}

/// Result of attempting the handler chain.
#[derive(Debug)]
pub enum StrategyOutcome {
    Rendered(String),
    /// The chain failed; the legacy pipeline may take over.
    NeedsFallback(RenderError),
}

/// Single entry point for markup to HTML.
///
/// The handler chain serves a render when it is enabled by configuration and
/// initialized. A chain failure falls back to the legacy pipeline when
/// `fallback_to_legacy` is set and is returned as an error otherwise.
pub struct WikiRenderer {
    config: RenderingConfig,
    chain: Option<Arc<HandlerChain>>,
    legacy: LegacyPipeline,
    alerts: Arc<dyn AlertSink>,
}

impl WikiRenderer {
    pub fn new(config: RenderingConfig, legacy: LegacyPipeline, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            config,
            chain: None,
            legacy,
            alerts,
        }
    }

    #[must_use]
    pub fn with_chain(mut self, chain: Arc<HandlerChain>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn config(&self) -> &RenderingConfig {
        &self.config
    }

    pub fn chain(&self) -> Option<&Arc<HandlerChain>> {
        self.chain.as_ref()
    }

    pub fn legacy(&self) -> &LegacyPipeline {
        &self.legacy
    }

    pub fn render(&self, content: &str, ctx: &ParseContext) -> Result<Rendered, RenderError> {
        match self.try_advanced(content, ctx) {
            Some(StrategyOutcome::Rendered(html)) => {
                return Ok(self.finish(html, Strategy::Advanced, ctx));
            }
            Some(StrategyOutcome::NeedsFallback(error)) => {
                if !self.config.fallback_to_legacy {
                    tracing::error!(page = %ctx.page_name, %error, "Advanced rendering failed");
                    return Err(error);
                }
                tracing::warn!(
                    page = %ctx.page_name,
                    %error,
                    "Advanced rendering failed, falling back to legacy pipeline"
                );
            }
            None => {}
        }

        let html = self.legacy.render(content, ctx);
        Ok(self.finish(html, Strategy::Legacy, ctx))
    }

    /// Run the handler chain if it is enabled and ready.
    pub fn try_advanced(&self, content: &str, ctx: &ParseContext) -> Option<StrategyOutcome> {
        if !self.config.use_advanced_parser {
            return None;
        }
        let chain = self.chain.as_ref().filter(|chain| chain.is_initialized())?;

        let started = Instant::now();
        let outcome = match chain.parse(content, ctx) {
            Ok(html) => StrategyOutcome::Rendered(html),
            Err(error) => return Some(StrategyOutcome::NeedsFallback(error)),
        };
        if self.config.performance_comparison {
            self.compare_with_legacy(content, ctx, started.elapsed());
        }
        Some(outcome)
    }

    fn compare_with_legacy(&self, content: &str, ctx: &ParseContext, advanced: Duration) {
        let started = Instant::now();
        let _ = self.legacy.render(content, ctx);
        let legacy = started.elapsed();

        let difference = advanced.abs_diff(legacy);
        let threshold = Duration::from_millis(self.config.comparison_threshold_ms);
        tracing::debug!(
            page = %ctx.page_name,
            advanced_ms = advanced.as_millis(),
            legacy_ms = legacy.as_millis(),
            "Rendering strategy comparison"
        );
        if difference > threshold {
            self.alerts.raise(PerformanceAlert {
                kind: AlertKind::StrategyDivergence,
                subject: ctx.page_name.clone(),
                elapsed: difference,
                threshold,
                message: format!(
                    "Advanced {}ms vs legacy {}ms",
                    advanced.as_millis(),
                    legacy.as_millis()
                ),
            });
        }
    }

    fn finish(&self, html: String, strategy: Strategy, ctx: &ParseContext) -> Rendered {
        if self.config.log_parsing_method {
            tracing::debug!(page = %ctx.page_name, %strategy, "Rendered page");
        }
        Rendered { html, strategy }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;
    use std::time::Instant;

    use pretty_assertions::assert_eq;
    use regex::Regex;
    use wk_config::Config;
    use wk_storage::MockPageStore;

    use super::*;
    use crate::alert::MemoryAlertSink;
    use crate::error::HandlerError;
    use crate::handler::{HandlerMetadata, HandlerOutput, InitContext, SyntaxHandler, SyntaxMatch};
    use crate::handlers::{EscapedSyntaxHandler, TableHandler, WikiLinkHandler};
    use crate::link::LinkRoutes;
    use crate::macros::{MacroExpander, SystemInfo};
    use crate::names::{PageNameMatcher, PageNames};
    use crate::plugin::PluginRegistry;

    static ANYTHING: LazyLock<Regex> = LazyLock::new(|| Regex::new(".").unwrap());

    struct Failing {
        metadata: HandlerMetadata,
    }

    impl Failing {
        fn new() -> Self {
            Self {
                metadata: HandlerMetadata::new("Failing", ".", 10),
            }
        }
    }

    impl SyntaxHandler for Failing {
        fn metadata(&self) -> &HandlerMetadata {
            &self.metadata
        }

        fn pattern(&self) -> &Regex {
            &ANYTHING
        }

        fn handle_match(
            &self,
            _m: &SyntaxMatch,
            _ctx: &ParseContext,
        ) -> Result<HandlerOutput, HandlerError> {
            Ok(HandlerOutput::Skip)
        }

        fn process(&self, _content: &str, _ctx: &ParseContext) -> Result<String, HandlerError> {
            Err(HandlerError::InvalidSyntax("always".to_owned()))
        }
    }

    struct Fixture {
        store: MockPageStore,
        alerts: Arc<MemoryAlertSink>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: MockPageStore::new().with_page("Home", "").with_page("Plugin", ""),
                alerts: Arc::new(MemoryAlertSink::new()),
            }
        }

        fn legacy(&self) -> LegacyPipeline {
            let names = Arc::new(PageNames::new(PageNameMatcher::default()));
            names.replace(vec!["Home".to_owned(), "Plugin".to_owned()]);
            let system = SystemInfo {
                application_name: "wk".to_owned(),
                version: "0.1.0".to_owned(),
                base_url: "http://localhost:3000".to_owned(),
                started_at: Instant::now(),
            };
            let expander = MacroExpander::new(
                system,
                Arc::clone(&names),
                Arc::new(PluginRegistry::with_builtins()),
            );
            LegacyPipeline::new(Arc::new(expander), names, LinkRoutes::default())
        }

        fn chain(&self, initialize: bool) -> Arc<HandlerChain> {
            let mut chain = HandlerChain::new(Duration::from_secs(5), Arc::clone(&self.alerts) as Arc<dyn AlertSink>);
            chain.register(EscapedSyntaxHandler::new()).unwrap();
            chain.register(TableHandler::new()).unwrap();
            chain
                .register(WikiLinkHandler::new(LinkRoutes::default()))
                .unwrap();
            if initialize {
                let config = Config::default();
                chain.initialize(&InitContext {
                    store: &self.store,
                    config: &config,
                });
            }
            Arc::new(chain)
        }

        fn renderer(&self, config: RenderingConfig, chain: Option<Arc<HandlerChain>>) -> WikiRenderer {
            let renderer = WikiRenderer::new(config, self.legacy(), Arc::clone(&self.alerts) as Arc<dyn AlertSink>);
            match chain {
                Some(chain) => renderer.with_chain(chain),
                None => renderer,
            }
        }
    }

    #[test]
    fn test_advanced_when_initialized() {
        let fixture = Fixture::new();
        let renderer = fixture.renderer(RenderingConfig::default(), Some(fixture.chain(true)));

        let rendered = renderer.render("[Home]", &ParseContext::new("Home")).unwrap();

        assert_eq!(rendered.strategy, Strategy::Advanced);
        assert_eq!(
            rendered.html,
            "<p><a href=\"/wiki/Home\" class=\"wikipage\">Home</a></p>\n"
        );
    }

    #[test]
    fn test_legacy_when_chain_missing_or_uninitialized() {
        let fixture = Fixture::new();
        let ctx = ParseContext::new("Home");

        let without_chain = fixture.renderer(RenderingConfig::default(), None);
        assert_eq!(without_chain.render("x", &ctx).unwrap().strategy, Strategy::Legacy);

        let uninitialized = fixture.renderer(RenderingConfig::default(), Some(fixture.chain(false)));
        assert_eq!(uninitialized.render("x", &ctx).unwrap().strategy, Strategy::Legacy);

        let disabled = fixture.renderer(
            RenderingConfig {
                use_advanced_parser: false,
                ..RenderingConfig::default()
            },
            Some(fixture.chain(true)),
        );
        assert_eq!(disabled.render("x", &ctx).unwrap().strategy, Strategy::Legacy);
    }

    #[test]
    fn test_failure_falls_back_or_propagates() {
        let fixture = Fixture::new();
        let ctx = ParseContext::new("Home");
        let failing_chain = || {
            let mut chain = HandlerChain::new(Duration::from_secs(5), Arc::clone(&fixture.alerts) as Arc<dyn AlertSink>);
            chain.register(Failing::new()).unwrap();
            chain.initialize(&InitContext {
                store: &fixture.store,
                config: &Config::default(),
            });
            Arc::new(chain)
        };

        let rendered = fixture
            .renderer(RenderingConfig::default(), Some(failing_chain()))
            .render("[Plugins]", &ctx)
            .unwrap();
        assert_eq!(rendered.strategy, Strategy::Legacy);
        assert_eq!(
            rendered.html,
            "<p><a href=\"/wiki/Plugin\" class=\"wikipage\">Plugins</a></p>\n"
        );

        let strict = RenderingConfig {
            fallback_to_legacy: false,
            ..RenderingConfig::default()
        };
        let err = fixture
            .renderer(strict, Some(failing_chain()))
            .render("[Plugins]", &ctx)
            .unwrap_err();
        assert!(matches!(err, RenderError::Handler { id, .. } if id == "Failing"));
    }

    #[test]
    fn test_plain_markdown_same_for_both_strategies() {
        let fixture = Fixture::new();
        let ctx = ParseContext::new("Home");
        let source = "## Title\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n> quote\n";

        let advanced = fixture
            .renderer(RenderingConfig::default(), Some(fixture.chain(true)))
            .render(source, &ctx)
            .unwrap();
        let legacy = fixture.renderer(RenderingConfig::default(), None).render(source, &ctx).unwrap();

        assert_eq!(advanced.html, legacy.html);
        assert_eq!(advanced.html, crate::markdown::to_html(source));
    }

    #[test]
    fn test_comparison_alert_threshold() {
        let fixture = Fixture::new();
        let config = RenderingConfig {
            performance_comparison: true,
            comparison_threshold_ms: 10_000,
            ..RenderingConfig::default()
        };
        let renderer = fixture.renderer(config, Some(fixture.chain(true)));

        renderer.render("[Home]", &ParseContext::new("Home")).unwrap();

        assert!(fixture.alerts.alerts().is_empty());
    }
}
