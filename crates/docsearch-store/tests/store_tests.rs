use std::sync::Arc;

use docsearch_core::config::Settings;
use docsearch_core::traits::{DocumentStore, Embedder};
use docsearch_core::types::{DocumentDraft, IndexState, SortOrder};
use docsearch_core::StoreError;
use docsearch_embed::FakeEmbedder;
use docsearch_store::{LocalDocumentStore, TEXT_INDEX_NAME};
use docsearch_text::TantivyIndex;
use docsearch_vector::LanceTable;
use tempfile::TempDir;

async fn store(tmp: &TempDir, with_text: bool) -> LocalDocumentStore {
    let uri = tmp.path().join("lancedb").to_string_lossy().to_string();
    let table = LanceTable::open(&uri, "documents", 384).await.expect("table");
    let text = with_text.then(|| Arc::new(TantivyIndex::in_memory().expect("tantivy")));
    LocalDocumentStore::new(table, text)
}

async fn seed(store: &LocalDocumentStore) {
    let e = FakeEmbedder::new(384);
    let docs = [
        ("Starting fires", "Use dry tinder and a ferro rod to start a fire.", vec!["fire"]),
        ("Water filters", "Boil water or use a ceramic filter.", vec!["water"]),
        ("Fire safety", "Keep water nearby when the fire is burning.", vec!["fire", "safety"]),
    ];
    for (title, body, tags) in docs {
        let d = DocumentDraft::new(title, body).with_tags(tags);
        let emb = e.embed(&d.embedding_text()).expect("embed");
        store.insert(d.with_embedding(Some(emb))).await.expect("insert");
    }
}

#[tokio::test]
async fn lexical_search_uses_tantivy_and_returns_documents() {
    let tmp = TempDir::new().expect("tmp");
    let s = store(&tmp, true).await;
    seed(&s).await;
    let hits = s.lexical_search("fire", 10).await.expect("search");
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.document.title.to_lowercase().contains("fire")));
    assert!(hits[0].score >= hits[1].score);
}

#[tokio::test]
async fn lexical_search_without_text_index_reports_absent() {
    let tmp = TempDir::new().expect("tmp");
    let s = store(&tmp, false).await;
    seed(&s).await;
    let err = s.lexical_search("fire", 10).await.expect_err("absent");
    assert!(matches!(err, StoreError::IndexAbsent(ref n) if n == TEXT_INDEX_NAME));
    assert_eq!(s.capability_probe(TEXT_INDEX_NAME).await.expect("probe"), IndexState::Absent);
}

#[tokio::test]
async fn keyword_search_counts_term_occurrences() {
    let tmp = TempDir::new().expect("tmp");
    let s = store(&tmp, false).await;
    seed(&s).await;
    let hits = s.keyword_search("water", 10).await.expect("keyword");
    let titles: Vec<_> = hits.iter().map(|h| h.document.title.as_str()).collect();
    assert_eq!(titles, ["Water filters", "Fire safety"]);
    assert_eq!(hits[0].score, 3.0);
    assert_eq!(hits[1].score, 1.0);
}

#[tokio::test]
async fn list_orders_by_insertion() {
    let tmp = TempDir::new().expect("tmp");
    let s = store(&tmp, true).await;
    seed(&s).await;
    let newest = s.list(2, SortOrder::NewestFirst).await.expect("list");
    assert_eq!(newest.iter().map(|d| d.title.as_str()).collect::<Vec<_>>(), ["Fire safety", "Water filters"]);
    let oldest = s.list(10, SortOrder::OldestFirst).await.expect("list");
    assert_eq!(oldest.first().map(|d| d.title.as_str()), Some("Starting fires"));
    assert_eq!(s.count().await.expect("count"), 3);
}

#[tokio::test]
async fn text_capability_present_when_opened() {
    let tmp = TempDir::new().expect("tmp");
    let s = store(&tmp, true).await;
    assert_eq!(s.capability_probe(TEXT_INDEX_NAME).await.expect("probe"), IndexState::Present);
    assert_eq!(s.capability_probe("vector_idx").await.expect("probe"), IndexState::Absent);
}

#[tokio::test]
async fn lexical_search_tolerates_query_syntax_in_free_text() {
    let tmp = TempDir::new().expect("tmp");
    let s = store(&tmp, true).await;
    seed(&s).await;
    let hits = s.lexical_search("fire at 10:30", 10).await.expect("stray colon");
    assert_eq!(hits.len(), 2);
    let hits = s.lexical_search("ferro \"unbalanced", 10).await.expect("unbalanced quote");
    assert_eq!(hits.iter().map(|h| h.document.title.as_str()).collect::<Vec<_>>(), ["Starting fires"]);
}

#[tokio::test]
async fn lexical_query_without_usable_clause_is_typed() {
    let tmp = TempDir::new().expect("tmp");
    let s = store(&tmp, true).await;
    seed(&s).await;
    let err = s.lexical_search("nosuchfield:fire", 10).await.expect_err("malformed");
    assert!(matches!(err, StoreError::MalformedQuery(_)), "{err:?}");
}

fn settings(text_dir: &str, text_enabled: bool) -> Settings {
    let mut settings = Settings::default();
    settings.data.lancedb_dir = "lancedb".into();
    settings.data.text_index_dir = text_dir.into();
    settings.data.text_index_enabled = text_enabled;
    settings
}

#[tokio::test]
async fn enabling_text_index_on_existing_corpus_indexes_old_documents() {
    let tmp = TempDir::new().expect("tmp");
    {
        let s = LocalDocumentStore::open(&settings("tantivy", false), tmp.path()).await.expect("open without text");
        seed(&s).await;
    }
    let s = LocalDocumentStore::open(&settings("tantivy", true), tmp.path()).await.expect("reopen with text");
    assert_eq!(s.capability_probe(TEXT_INDEX_NAME).await.expect("probe"), IndexState::Present);
    let hits = s.lexical_search("fire", 10).await.expect("search");
    assert_eq!(hits.len(), 2);
}

#[tokio::test]
async fn fresh_text_directory_is_rebuilt_from_the_table() {
    let tmp = TempDir::new().expect("tmp");
    {
        let s = LocalDocumentStore::open(&settings("tantivy-a", true), tmp.path()).await.expect("open");
        seed(&s).await;
        assert_eq!(s.lexical_search("water", 10).await.expect("search").len(), 2);
    }
    let s = LocalDocumentStore::open(&settings("tantivy-b", true), tmp.path()).await.expect("reopen");
    let titles: Vec<_> = s.lexical_search("tinder", 10).await.expect("search").into_iter().map(|h| h.document.title).collect();
    assert_eq!(titles, ["Starting fires"]);

    // Inserts after the rebuild land in both indexes exactly once.
    s.insert(DocumentDraft::new("Tinder boxes", "Keep tinder dry.").with_embedding(None)).await.expect("insert");
    assert_eq!(s.lexical_search("tinder", 10).await.expect("search").len(), 2);
    assert_eq!(s.count().await.expect("count"), 4);
}
