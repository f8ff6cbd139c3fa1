use std::sync::Arc;

use tempfile::TempDir;

use context_spans::config::Config;
use context_spans::sqlite_store::SqliteStore;
use context_spans::{db, delete, migrate};
use context_spans_core::cascade::collect_owned;
use context_spans_core::materialize::{load_or_insert, materialize, Outcome};
use context_spans_core::models::{
    CellLayout, Context, ContextKind, Document, Phrase, PhraseOwner, Sentence, Table,
};
use context_spans_core::registry::FieldValue;
use context_spans_core::span::TemporarySpan;
use context_spans_core::store::{ContextStore, StoreError};
use context_spans_core::tokens::TokenAttrs;

async fn setup() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let config = Config::minimal(tmp.path().join("data").join("cspan.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    (tmp, SqliteStore::new(pool))
}

async fn document(store: &SqliteStore, name: &str) -> Document {
    let mut doc = Document::new(name, Some(serde_json::json!({"lang": "en"}))).unwrap();
    load_or_insert(store, &mut doc).await.unwrap();
    doc
}

async fn sentence(store: &SqliteStore, doc: &Document) -> Arc<Context> {
    let tokens = TokenAttrs::new(
        vec!["the".into(), "cat".into(), "sat".into()],
        vec![0, 4, 8],
    );
    let mut s = Sentence::new(doc, 0, 100, "the cat sat", tokens).unwrap();
    load_or_insert(store, &mut s).await.unwrap();
    Arc::new(s.into())
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let (_tmp, store) = setup().await;
    migrate::apply(store.pool()).await.unwrap();
    assert!(store.count_by_kind().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_load_or_insert_is_idempotent() {
    let (_tmp, store) = setup().await;
    let first = document(&store, "report-1").await;

    let mut again = Document::new("report-1", None).unwrap();
    let outcome = materialize(&store, &mut again, 3).await.unwrap();
    assert_eq!(outcome, Outcome::Loaded(first.base.id.unwrap()));
    assert_eq!(
        store.count_by_kind().await.unwrap(),
        vec![(ContextKind::Document, 1)]
    );
}

#[tokio::test]
async fn test_subtype_row_written_from_registry() {
    let (_tmp, store) = setup().await;
    let doc = document(&store, "report-1").await;
    let parent = sentence(&store, &doc).await;

    let row: (i64, String, String, Option<String>) = sqlx::query_as(
        "SELECT document_id, text, words, lemmas FROM sentence WHERE id = ?",
    )
    .bind(parent.id().unwrap())
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(row.0, doc.base.id.unwrap());
    assert_eq!(row.1, "the cat sat");
    assert_eq!(row.2, r#"["the","cat","sat"]"#);
    assert_eq!(row.3, None);

    let meta: String = sqlx::query_scalar("SELECT meta FROM document WHERE id = ?")
        .bind(doc.base.id.unwrap())
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(meta, r#"{"lang":"en"}"#);
}

#[tokio::test]
async fn test_duplicate_stable_id_is_conflict() {
    let (_tmp, store) = setup().await;
    let fields = vec![
        ("name", FieldValue::from("dup")),
        ("meta", FieldValue::Null),
    ];
    store
        .insert_row(ContextKind::Document, "dup::document:0:0", &fields)
        .await
        .unwrap();
    let err = store
        .insert_row(ContextKind::Document, "dup::document:0:0", &fields)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ref id) if id == "dup::document:0:0"));
    // The failed insert left nothing behind.
    assert_eq!(
        store.count_by_kind().await.unwrap(),
        vec![(ContextKind::Document, 1)]
    );
}

#[tokio::test]
async fn test_phrase_position_unique_without_table_or_cell() {
    let (_tmp, store) = setup().await;
    let doc = document(&store, "report-1").await;
    let phrase = |char_start: i64| {
        let tokens = TokenAttrs::new(vec!["42".into()], vec![0]);
        Phrase::new(
            PhraseOwner::Document(&doc),
            0,
            char_start,
            "42",
            tokens,
            CellLayout::default(),
        )
        .unwrap()
    };

    let mut first = phrase(0);
    load_or_insert(&store, &mut first).await.unwrap();
    let mut clash = phrase(5);
    assert_ne!(first.base.stable_id, clash.base.stable_id);
    assert!(load_or_insert(&store, &mut clash).await.is_err());
    assert_eq!(clash.base.id, None);

    let mut table = Table::new(&doc, 0, 20, "42 43").unwrap();
    load_or_insert(&store, &mut table).await.unwrap();
    let in_table = |char_start: i64| {
        let tokens = TokenAttrs::new(vec!["42".into()], vec![0]);
        Phrase::new(
            PhraseOwner::Table(&table),
            0,
            char_start,
            "42",
            tokens,
            CellLayout::default(),
        )
        .unwrap()
    };
    let mut first = in_table(0);
    load_or_insert(&store, &mut first).await.unwrap();
    assert!(load_or_insert(&store, &mut in_table(3)).await.is_err());

    assert_eq!(
        store.count_by_kind().await.unwrap(),
        vec![
            (ContextKind::Document, 1),
            (ContextKind::Table, 1),
            (ContextKind::Phrase, 2),
        ]
    );
}

#[tokio::test]
async fn test_span_stable_id_and_row() {
    let (_tmp, store) = setup().await;
    let doc = document(&store, "report-1").await;
    let parent = sentence(&store, &doc).await;

    let mut cat = TemporarySpan::new(Arc::clone(&parent), 4, 6);
    let id = load_or_insert(&store, &mut cat).await.unwrap();
    assert_eq!(
        store
            .lookup_by_stable_id("report-1::span:104:106")
            .await
            .unwrap(),
        Some(id)
    );

    let row: (i64, i64, i64) =
        sqlx::query_as("SELECT parent_id, char_start, char_end FROM span WHERE id = ?")
            .bind(id)
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(row, (parent.id().unwrap(), 4, 6));

    let span = cat.promote().unwrap();
    assert_eq!(span.id(), id);
}

#[tokio::test]
async fn test_concurrent_materialize_inserts_once() {
    let (_tmp, store) = setup().await;
    let doc = document(&store, "report-1").await;
    let parent = sentence(&store, &doc).await;
    let store = Arc::new(store);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let parent = Arc::clone(&parent);
        handles.push(tokio::spawn(async move {
            let mut span = TemporarySpan::new(parent, 0, 6);
            load_or_insert(store.as_ref(), &mut span).await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let spans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM span")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(spans, 1);
}

#[tokio::test]
async fn test_cascade_removes_only_owned_contexts() {
    let (_tmp, store) = setup().await;
    let keep = document(&store, "keep").await;
    let gone = document(&store, "drop").await;
    for doc in [&keep, &gone] {
        let parent = sentence(&store, doc).await;
        for (s, e) in [(0, 2), (4, 6), (0, 6)] {
            let mut span = TemporarySpan::new(Arc::clone(&parent), s, e);
            load_or_insert(&store, &mut span).await.unwrap();
        }
    }

    let owned = collect_owned(&store, gone.base.id.unwrap()).await.unwrap();
    assert_eq!(owned.len(), 5);

    let removed = delete::delete_document(&store, "drop").await.unwrap();
    assert_eq!(removed, 5);

    let counts = store.count_by_kind().await.unwrap();
    assert_eq!(
        counts,
        vec![
            (ContextKind::Document, 1),
            (ContextKind::Sentence, 1),
            (ContextKind::Span, 3),
        ]
    );
    assert!(store
        .lookup_by_stable_id("drop::document:0:0")
        .await
        .unwrap()
        .is_none());
    assert!(store
        .lookup_by_stable_id("keep::span:104:106")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_delete_unknown_document() {
    let (_tmp, store) = setup().await;
    let err = delete::delete_document(&store, "missing").await.unwrap_err();
    assert!(err.to_string().contains("document not found"));
}
