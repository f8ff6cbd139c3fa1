//! Annotated document loading.
//!
//! Reads documents that an external annotation pipeline has already
//! segmented and tokenized, materializes their hierarchy top-down
//! (document → sentences/tables → cells → phrases), then generates n-gram
//! candidate spans over every sentence and phrase and materializes the
//! distinct ones. Loading the same file twice inserts nothing new.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Deserialize;
use tracing::{debug, info};

use context_spans_core::candidates::ngram_spans;
use context_spans_core::materialize::{materialize, materialize_spans, BatchSummary, Outcome};
use context_spans_core::models::{
    Cell, CellLayout, Context, Document, Phrase, PhraseOwner, Sentence, Table,
};
use context_spans_core::span::TemporarySpan;
use context_spans_core::store::ContextStore;
use context_spans_core::tokens::{TokenAttr, TokenAttrs};
use context_spans_core::TemporaryContext;

use crate::config::Config;
use crate::db;

/// One annotated document of the input file.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentInput {
    pub name: String,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    #[serde(default)]
    pub sentences: Vec<SentenceInput>,
    #[serde(default)]
    pub tables: Vec<TableInput>,
    #[serde(default)]
    pub phrases: Vec<PhraseInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SentenceInput {
    pub position: i64,
    pub char_start: i64,
    pub text: String,
    #[serde(flatten)]
    pub tokens: TokenAttrs,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableInput {
    pub position: i64,
    pub char_start: i64,
    pub text: String,
    #[serde(default)]
    pub cells: Vec<CellInput>,
    #[serde(default)]
    pub phrases: Vec<PhraseInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellInput {
    pub position: i64,
    pub char_start: i64,
    pub text: String,
    #[serde(flatten)]
    pub layout: CellLayout,
    #[serde(default)]
    pub phrases: Vec<PhraseInput>,
}

/// `char_start` is relative to whatever the phrase is nested in.
#[derive(Debug, Clone, Deserialize)]
pub struct PhraseInput {
    pub position: i64,
    pub char_start: i64,
    pub text: String,
    #[serde(flatten)]
    pub tokens: TokenAttrs,
    #[serde(flatten)]
    pub layout: CellLayout,
}

/// Parse an input file: a JSON array of documents.
pub fn read_documents(path: &Path) -> Result<Vec<DocumentInput>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse input file: {}", path.display()))
}

/// Counts reported by a load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub documents: usize,
    pub sentences: usize,
    pub tables: usize,
    pub cells: usize,
    pub phrases: usize,
    /// Hierarchy contexts inserted by this load.
    pub inserted: usize,
    /// Hierarchy contexts that already existed.
    pub loaded: usize,
    pub spans: BatchSummary,
}

impl LoadSummary {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Inserted(_) => self.inserted += 1,
            Outcome::Loaded(_) | Outcome::AlreadySet(_) => self.loaded += 1,
        }
    }
}

/// Materializes documents through any [`ContextStore`].
pub struct Loader<'a, S: ContextStore + ?Sized> {
    store: &'a S,
    max_conflict_retries: u32,
    summary: LoadSummary,
    /// Materialized sentences and phrases, the parents of n-gram candidates.
    token_parents: Vec<Arc<Context>>,
}

impl<'a, S: ContextStore + ?Sized> Loader<'a, S> {
    pub fn new(store: &'a S, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries,
            summary: LoadSummary::default(),
            token_parents: Vec::new(),
        }
    }

    async fn put(&mut self, candidate: &mut dyn TemporaryContext) -> Result<()> {
        let outcome = materialize(self.store, candidate, self.max_conflict_retries).await?;
        self.summary.record(outcome);
        Ok(())
    }

    /// Materialize one document and everything nested in it.
    pub async fn load_document(&mut self, input: &DocumentInput) -> Result<()> {
        let mut doc = Document::new(input.name.as_str(), input.meta.clone())?;
        self.put(&mut doc).await?;
        self.summary.documents += 1;
        debug!(name = %doc.name, stable_id = %doc.base.stable_id, "document");

        for s in &input.sentences {
            let mut sentence = Sentence::new(
                &doc,
                s.position,
                s.char_start,
                s.text.as_str(),
                s.tokens.clone(),
            )
            .with_context(|| format!("sentence {} of {}", s.position, input.name))?;
            self.put(&mut sentence).await?;
            self.summary.sentences += 1;
            self.token_parents.push(Arc::new(sentence.into()));
        }

        for t in &input.tables {
            let mut table = Table::new(&doc, t.position, t.char_start, t.text.as_str())?;
            self.put(&mut table).await?;
            self.summary.tables += 1;

            for c in &t.cells {
                let mut cell = Cell::new(
                    &table,
                    c.position,
                    c.char_start,
                    c.text.as_str(),
                    c.layout.clone(),
                )?;
                self.put(&mut cell).await?;
                self.summary.cells += 1;

                for p in &c.phrases {
                    self.load_phrase(PhraseOwner::Cell(&cell), p).await?;
                }
            }
            for p in &t.phrases {
                self.load_phrase(PhraseOwner::Table(&table), p).await?;
            }
        }

        for p in &input.phrases {
            self.load_phrase(PhraseOwner::Document(&doc), p).await?;
        }
        Ok(())
    }

    async fn load_phrase(&mut self, owner: PhraseOwner<'_>, p: &PhraseInput) -> Result<()> {
        let mut phrase = Phrase::new(
            owner,
            p.position,
            p.char_start,
            p.text.as_str(),
            p.tokens.clone(),
            p.layout.clone(),
        )
        .with_context(|| format!("phrase {}", p.position))?;
        self.put(&mut phrase).await?;
        self.summary.phrases += 1;
        self.token_parents.push(Arc::new(phrase.into()));
        Ok(())
    }

    /// Materialize every distinct n-gram (n ≤ `max_n`) of the loaded
    /// sentences and phrases. `max_n == 0` skips span generation.
    pub async fn load_ngrams(&mut self, max_n: usize) -> Result<Vec<TemporarySpan>> {
        let mut candidates = Vec::new();
        for parent in &self.token_parents {
            candidates.extend(ngram_spans(parent, max_n)?);
        }
        let (spans, batch) =
            materialize_spans(self.store, candidates, self.max_conflict_retries).await?;
        self.summary.spans = batch;
        Ok(spans)
    }

    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }
}

/// Run `cspan load`: materialize the documents of `path` and their n-grams.
pub async fn run_load(
    config: &Config,
    path: &Path,
    ngrams: Option<usize>,
    print_spans: bool,
) -> Result<()> {
    let documents = read_documents(path)?;
    let max_n = ngrams.unwrap_or(config.extract.max_ngrams);

    let store = db::open_store(config).await?;
    let mut loader = Loader::new(&store, config.materialize.max_conflict_retries);

    for doc in &documents {
        loader.load_document(doc).await?;
    }
    let spans = loader.load_ngrams(max_n).await?;

    let summary = loader.summary().clone();
    info!(
        documents = summary.documents,
        inserted = summary.inserted + summary.spans.inserted,
        "load complete"
    );

    if print_spans {
        for span in &spans {
            print_span(span, &config.extract.separator)?;
        }
    }

    println!("load {}", path.display());
    println!("  documents: {}", summary.documents);
    println!("  sentences: {}", summary.sentences);
    println!("  tables:    {}", summary.tables);
    println!("  cells:     {}", summary.cells);
    println!("  phrases:   {}", summary.phrases);
    println!(
        "  contexts inserted: {} (existing: {})",
        summary.inserted, summary.loaded
    );
    println!(
        "  spans: {} candidates, {} distinct, {} inserted, {} existing",
        summary.spans.candidates,
        summary.spans.distinct,
        summary.spans.inserted,
        summary.spans.loaded
    );
    println!("ok");

    store.pool().close().await;
    Ok(())
}

fn print_span(span: &TemporarySpan, separator: &str) -> Result<()> {
    let lemmas = span
        .get_attrib_span(TokenAttr::Lemmas, separator)
        .unwrap_or_default();
    println!(
        "{}\t{}\t{}\t{}",
        span.id.unwrap_or_default(),
        span.stable_id()?,
        span.get_span()?,
        lemmas
    );
    Ok(())
}
