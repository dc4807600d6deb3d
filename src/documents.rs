//! Document library with a simulated search.
//!
//! Matching is a case-insensitive substring test on name and content. There is
//! no embedding index; relevance comes from an injectable scorer.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::SimulationConfig;
use crate::error::{EntityKind, OrchestrationError, Result};
use crate::notifications::NotificationSink;

const SUMMARY_WORDS: usize = 50;
const CHUNK_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub size: usize,
    pub uploaded_at: DateTime<Utc>,
    pub content: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document: Document,
    pub relevance_score: f64,
    pub matching_chunks: Vec<String>,
}

pub trait RelevanceScorer: Send + Sync {
    fn score(&self, query: &str, document: &Document) -> f64;
}

/// Uniform score in [0.5, 1.0)
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomScorer;

impl RelevanceScorer for RandomScorer {
    fn score(&self, _query: &str, _document: &Document) -> f64 {
        rand::rng().random_range(0.5..1.0)
    }
}

fn summarize(content: &str) -> String {
    let words: Vec<&str> = content.split_whitespace().take(SUMMARY_WORDS).collect();
    format!("{}...", words.join(" "))
}

fn leading_chunk(content: &str) -> String {
    let chunk: String = content.chars().take(CHUNK_CHARS).collect();
    format!("{}...", chunk)
}

pub struct DocumentLibrary {
    documents: RwLock<Vec<Document>>,
    scorer: Arc<dyn RelevanceScorer>,
    notifier: Arc<dyn NotificationSink>,
    indexing_delay: Duration,
    search_delay: Duration,
}

impl DocumentLibrary {
    pub fn new(notifier: Arc<dyn NotificationSink>) -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            scorer: Arc::new(RandomScorer),
            notifier,
            indexing_delay: Duration::ZERO,
            search_delay: Duration::ZERO,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn RelevanceScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_simulation(mut self, config: &SimulationConfig) -> Self {
        self.indexing_delay = Duration::from_millis(config.document_indexing_ms);
        self.search_delay = Duration::from_millis(config.search_ms);
        self
    }

    pub async fn add(&self, name: &str, media_type: &str, content: &str) -> Document {
        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            media_type: media_type.to_string(),
            size: content.len(),
            uploaded_at: Utc::now(),
            content: content.to_string(),
            summary: summarize(content),
        };

        // Stands in for embedding generation
        tokio::time::sleep(self.indexing_delay).await;

        self.documents.write().await.push(document.clone());
        tracing::info!(document_id = %document.id, name, size = document.size, "Document indexed");
        self.notifier.success(
            "Document processed",
            &format!("{} was analyzed and indexed successfully.", name),
        );
        document
    }

    pub async fn remove(&self, id: &str) -> Result<Document> {
        let mut documents = self.documents.write().await;
        let index = documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| OrchestrationError::NotFound {
                entity: EntityKind::Document,
                id: id.to_string(),
            })?;
        let removed = documents.remove(index);
        self.notifier.success(
            "Document removed",
            "The document was removed from the knowledge base.",
        );
        Ok(removed)
    }

    pub async fn list(&self) -> Vec<Document> {
        self.documents.read().await.clone()
    }

    pub async fn search(&self, query: &str) -> Vec<SearchResult> {
        let query = query.trim();
        let documents = self.list().await;
        if query.is_empty() || documents.is_empty() {
            return Vec::new();
        }

        tokio::time::sleep(self.search_delay).await;

        let needle = query.to_lowercase();
        let mut results: Vec<SearchResult> = documents
            .into_iter()
            .filter(|d| d.content.to_lowercase().contains(&needle) || d.name.to_lowercase().contains(&needle))
            .map(|document| SearchResult {
                relevance_score: self.scorer.score(query, &document),
                matching_chunks: vec![leading_chunk(&document.content)],
                document,
            })
            .collect();
        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));

        tracing::debug!(query, hits = results.len(), "Document search finished");
        if results.is_empty() {
            self.notifier.success(
                "No results",
                "No relevant documents were found for your search.",
            );
        }
        results
    }
}
