//! Intent router: classifies one user message into a [`RoutingDecision`].
//!
//! Ordered, short-circuiting:
//!
//! 1. exact small-talk match → `welcome` with the canned greeting, no retrieval
//! 2. retrieve up to `top_k` documents into `context`
//! 3. meta keyword → `meta`
//! 4. no domain keyword and no context → `out_of_scope`
//! 5. otherwise `dbt` > `airflow`/`dag` > `bigquery` > `sql`

use std::sync::Arc;

use dataclaw_config::RouterConfig;
use dataclaw_core::retrieval::{RetrievedDocument, Retriever};
use dataclaw_core::routing::{RoutingDecision, Scope};
use tracing::{debug, warn};

pub const WELCOME_ANSWER: &str = "Hi 👋 I'm a **Data Engineering Assistant**.\n\n\
I can help you with:\n\
- Airflow DAGs\n\
- dbt models & tests\n\
- BigQuery SQL & optimization\n\
- Data quality & pipelines";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";
const DEFAULT_SOURCE: &str = "docs";

pub struct IntentRouter {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    small_talk: Vec<String>,
    meta_keywords: Vec<String>,
    domain_keywords: Vec<String>,
}

impl IntentRouter {
    /// Router with the default vocabulary and `top_k`.
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self::from_config(retriever, &RouterConfig::default())
    }

    pub fn from_config(retriever: Arc<dyn Retriever>, config: &RouterConfig) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words.iter().map(|w| w.trim().to_lowercase()).collect()
        };
        Self {
            retriever,
            top_k: config.top_k,
            small_talk: lower(&config.small_talk),
            meta_keywords: lower(&config.meta_keywords),
            domain_keywords: lower(&config.domain_keywords),
        }
    }

    pub async fn route(&self, message: &str) -> RoutingDecision {
        let normalized = message.trim().to_lowercase();

        if self.small_talk.iter().any(|w| *w == normalized) {
            debug!("Small talk, skipping retrieval");
            return RoutingDecision::canned(Scope::Welcome, WELCOME_ANSWER);
        }

        let context = self.retrieve_context(message).await;

        if contains_any(&normalized, &self.meta_keywords) {
            return RoutingDecision::new(Scope::Meta, context);
        }

        if context.is_empty() && !contains_any(&normalized, &self.domain_keywords) {
            return RoutingDecision::canned(Scope::OutOfScope, "");
        }

        RoutingDecision::new(sub_scope(&normalized), context)
    }

    /// Retrieved documents as one context block. A failed search counts as
    /// no results.
    async fn retrieve_context(&self, message: &str) -> String {
        match self.retriever.search(message, self.top_k).await {
            Ok(docs) => format_context(&docs),
            Err(e) => {
                warn!(retriever = self.retriever.name(), error = %e, "Retrieval failed, continuing without context");
                String::new()
            }
        }
    }
}

fn contains_any(text: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| !k.is_empty() && text.contains(k.as_str()))
}

fn sub_scope(normalized: &str) -> Scope {
    if normalized.contains("dbt") {
        Scope::Dbt
    } else if normalized.contains("airflow") || normalized.contains("dag") {
        Scope::Airflow
    } else if normalized.contains("bigquery") {
        Scope::Bigquery
    } else {
        Scope::Sql
    }
}

/// `[Source: label]\ntext` per document, joined by a horizontal rule.
pub fn format_context(docs: &[RetrievedDocument]) -> String {
    docs.iter()
        .map(|d| format!("[Source: {}]\n{}", d.source().unwrap_or(DEFAULT_SOURCE), d.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::CountingRetriever;

    fn router(retriever: CountingRetriever) -> (IntentRouter, Arc<CountingRetriever>) {
        let retriever = Arc::new(retriever);
        (IntentRouter::new(retriever.clone()), retriever)
    }

    #[tokio::test]
    async fn small_talk_skips_retrieval() {
        let (router, retriever) = router(CountingRetriever::with_docs(&[("a.md", "airflow")]));
        for greeting in ["hi", "  Hello ", "BONJOUR", "yo"] {
            let decision = router.route(greeting).await;
            assert_eq!(decision.scope, Scope::Welcome);
            assert!(!decision.direct_answer().is_empty());
        }
        assert_eq!(retriever.calls(), 0);
    }

    #[tokio::test]
    async fn greeting_inside_sentence_is_not_small_talk() {
        let (router, retriever) = router(CountingRetriever::empty());
        let decision = router.route("hi, count rows in orders").await;
        assert_eq!(decision.scope, Scope::Sql);
        assert_eq!(retriever.calls(), 1);
    }

    #[tokio::test]
    async fn no_keyword_and_no_context_is_out_of_scope() {
        let (router, _) = router(CountingRetriever::empty());
        let decision = router.route("what's the weather in Paris?").await;
        assert_eq!(decision.scope, Scope::OutOfScope);
        assert!(decision.context.is_empty());
        assert_eq!(decision.direct_answer(), "");
    }

    #[tokio::test]
    async fn context_alone_keeps_message_in_scope() {
        let (router, _) = router(CountingRetriever::with_docs(&[("oncall.md", "Page the on-call")]));
        let decision = router.route("who do I page at night?").await;
        assert_eq!(decision.scope, Scope::Sql);
        assert_eq!(decision.context, "[Source: oncall.md]\nPage the on-call");
    }

    #[tokio::test]
    async fn meta_keeps_context_and_has_empty_answer() {
        let (router, _) = router(CountingRetriever::with_docs(&[("conv.md", "Use snake_case")]));
        let decision = router.route("What are the team conventions?").await;
        assert_eq!(decision.scope, Scope::Meta);
        assert!(decision.context.contains("snake_case"));
        assert_eq!(decision.direct_answer(), "");
    }

    #[tokio::test]
    async fn sub_scope_priority() {
        let (router, _) = router(CountingRetriever::empty());
        assert_eq!(
            router.route("dbt model feeding an Airflow DAG in BigQuery").await.scope,
            Scope::Dbt
        );
        assert_eq!(router.route("airflow retries for my pipeline").await.scope, Scope::Airflow);
        assert_eq!(router.route("DAG schedule for the etl").await.scope, Scope::Airflow);
        assert_eq!(router.route("bigquery partition pruning").await.scope, Scope::Bigquery);
        assert_eq!(router.route("show me the top 10 customers").await.scope, Scope::Sql);
    }

    #[tokio::test]
    async fn retrieval_failure_counts_as_empty() {
        let (router, retriever) = router(CountingRetriever::failing());
        let decision = router.route("count rows in orders").await;
        assert_eq!(decision.scope, Scope::Sql);
        assert!(decision.context.is_empty());
        assert_eq!(retriever.calls(), 1);

        let decision = router.route("tell me a joke").await;
        assert_eq!(decision.scope, Scope::OutOfScope);
    }

    #[tokio::test]
    async fn requests_configured_top_k() {
        let retriever = Arc::new(CountingRetriever::empty());
        let config = RouterConfig {
            top_k: 5,
            ..RouterConfig::default()
        };
        let router = IntentRouter::from_config(retriever.clone(), &config);
        router.route("sql").await;
        assert_eq!(retriever.last_top_k(), Some(5));
    }

    #[test]
    fn context_format_preserves_order_and_sources() {
        let docs = vec![
            RetrievedDocument::new("A", "doc1"),
            RetrievedDocument::new("B", "doc2"),
        ];
        assert_eq!(
            format_context(&docs),
            "[Source: doc1]\nA\n\n---\n\n[Source: doc2]\nB"
        );
    }

    #[test]
    fn missing_source_defaults_to_docs() {
        let doc = RetrievedDocument {
            text: "A".into(),
            metadata: serde_json::Map::new(),
        };
        assert_eq!(format_context(&[doc]), "[Source: docs]\nA");
    }
}
