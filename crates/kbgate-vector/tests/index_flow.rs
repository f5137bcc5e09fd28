use std::fs;
use std::path::Path;
use std::sync::Arc;

use kbgate_core::data_processor::ChunkingConfig;
use kbgate_core::error::Error;
use kbgate_core::traits::{BlockingRetriever, Embedder, Retriever};
use kbgate_embed::FakeEmbedder;
use kbgate_vector::index_build::compute_ivfpq_params;
use kbgate_vector::{IndexOptions, IndexOrigin, SemanticIndex};
use tempfile::TempDir;

const DIM: usize = 128;

fn embedder() -> Arc<dyn Embedder> { Arc::new(FakeEmbedder::new(DIM)) }

fn seed_corpus(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("refunds.md"), "# Refund Policy\n\nRefunds are accepted within 30 days of purchase.").unwrap();
    fs::write(dir.join("shipping.md"), "# Shipping\n\nOrders ship within two business days.").unwrap();
    fs::write(dir.join("support.txt"), "Support is available by email around the clock.").unwrap();
}

fn options(tmp: &TempDir) -> IndexOptions {
    IndexOptions {
        source_dir: tmp.path().join("data"),
        persist_dir: tmp.path().join("storage"),
        table: "chunks".to_string(),
        extensions: vec!["md".to_string(), "txt".to_string()],
        chunking: ChunkingConfig::default(),
        ann_min_rows: 100_000,
    }
}

#[tokio::test]
async fn build_then_load_keeps_rankings() {
    let tmp = TempDir::new().unwrap();
    seed_corpus(&tmp.path().join("data"));
    let opts = options(&tmp);

    let queries = ["Refunds are accepted within 30 days of purchase.", "when do orders ship", "email support"];

    let built = SemanticIndex::open_or_build(&opts, embedder()).await.expect("build");
    assert_eq!(built.origin(), IndexOrigin::Built);
    assert!(opts.persist_dir.exists(), "index persisted");
    assert_eq!(built.row_count().await.unwrap(), 5);
    assert_eq!(built.dim().await.unwrap(), DIM);

    let mut before = Vec::new();
    for q in queries { before.push(built.retrieve(q, 5).await.expect("retrieve")); }
    drop(built);

    let loaded = SemanticIndex::open_or_build(&opts, embedder()).await.expect("load");
    assert_eq!(loaded.origin(), IndexOrigin::Loaded);
    for (q, expected) in queries.iter().zip(before) {
        let got = loaded.retrieve(q, 5).await.expect("retrieve");
        let got_ids: Vec<&str> = got.iter().map(|h| h.chunk.id.as_str()).collect();
        let exp_ids: Vec<&str> = expected.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(got_ids, exp_ids, "ranking for {q:?}");
        let (a, b) = (got[0].score.unwrap(), expected[0].score.unwrap());
        assert!((a - b).abs() < 1e-5, "top score for {q:?}: {a} vs {b}");
    }
}

#[tokio::test]
async fn exact_text_ranks_first_with_near_unit_score() {
    let tmp = TempDir::new().unwrap();
    seed_corpus(&tmp.path().join("data"));
    let index = SemanticIndex::open_or_build(&options(&tmp), embedder()).await.expect("build");

    let hits = index.retrieve("Refunds are accepted within 30 days of purchase.", 5).await.expect("retrieve");
    assert!(hits.len() <= 5);
    assert_eq!(hits[0].chunk.id, "refunds:1");
    assert_eq!(hits[0].chunk.file_name, "refunds.md");
    assert!(hits[0].score.unwrap() > 0.99);
    for pair in hits.windows(2) { assert!(pair[0].score >= pair[1].score); }
}

#[tokio::test]
async fn top_k_bounds_result_count() {
    let tmp = TempDir::new().unwrap();
    seed_corpus(&tmp.path().join("data"));
    let index = SemanticIndex::open_or_build(&options(&tmp), embedder()).await.expect("build");
    assert_eq!(index.retrieve("refund", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn source_changes_are_not_picked_up_by_load() {
    let tmp = TempDir::new().unwrap();
    seed_corpus(&tmp.path().join("data"));
    let opts = options(&tmp);
    drop(SemanticIndex::open_or_build(&opts, embedder()).await.expect("build"));

    fs::write(opts.source_dir.join("new.md"), "A brand new document.").unwrap();
    let index = SemanticIndex::open_or_build(&opts, embedder()).await.expect("load");
    assert_eq!(index.row_count().await.unwrap(), 5);
}

#[tokio::test]
async fn empty_source_builds_empty_index() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("data")).unwrap();
    let index = SemanticIndex::open_or_build(&options(&tmp), embedder()).await.expect("build");
    assert_eq!(index.row_count().await.unwrap(), 0);
    assert!(index.retrieve("anything", 5).await.expect("retrieve").is_empty());
}

#[tokio::test]
async fn missing_source_fails_without_leaving_storage() {
    let tmp = TempDir::new().unwrap();
    let opts = options(&tmp);
    assert!(SemanticIndex::open_or_build(&opts, embedder()).await.is_err());
    assert!(!opts.persist_dir.exists());
}

#[tokio::test]
async fn failed_rebuild_keeps_existing_index() {
    let tmp = TempDir::new().unwrap();
    seed_corpus(&tmp.path().join("data"));
    let opts = options(&tmp);
    drop(SemanticIndex::build(&opts, embedder()).await.expect("first build"));

    // The table already exists, so a second build cannot create it.
    assert!(SemanticIndex::build(&opts, embedder()).await.is_err());
    assert!(opts.persist_dir.exists(), "existing index must survive a failed build");

    let index = SemanticIndex::open_or_build(&opts, embedder()).await.expect("load");
    assert_eq!(index.origin(), IndexOrigin::Loaded);
    assert_eq!(index.row_count().await.unwrap(), 5);
}

/// Drops the last vector of every batch.
struct ShortEmbedder(FakeEmbedder);

impl Embedder for ShortEmbedder {
    fn dim(&self) -> usize { self.0.dim() }
    fn max_len(&self) -> usize { self.0.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut out = self.0.embed_batch(texts)?;
        out.pop();
        Ok(out)
    }
}

#[tokio::test]
async fn short_embedding_batch_is_an_embedding_error() {
    let tmp = TempDir::new().unwrap();
    seed_corpus(&tmp.path().join("data"));
    let opts = options(&tmp);
    let err = match SemanticIndex::open_or_build(&opts, Arc::new(ShortEmbedder(FakeEmbedder::new(DIM)))).await {
        Ok(_) => panic!("build should fail"),
        Err(e) => e,
    };
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Embedding(_))), "{err:#}");
    assert!(!opts.persist_dir.exists());
}

#[test]
fn blocking_retrieval_without_runtime() {
    let tmp = TempDir::new().unwrap();
    seed_corpus(&tmp.path().join("data"));
    let rt = tokio::runtime::Runtime::new().unwrap();
    let index = rt.block_on(SemanticIndex::open_or_build(&options(&tmp), embedder())).expect("build");
    let expected = rt.block_on(index.retrieve("when do orders ship", 5)).unwrap();

    // A plain thread has no runtime context, so the index drives its own.
    let got = std::thread::scope(|s| s.spawn(|| index.retrieve_blocking("when do orders ship", 5)).join().unwrap())
        .expect("blocking retrieve");
    assert_eq!(got.len(), expected.len());
    assert_eq!(got[0].chunk.id, expected[0].chunk.id);
}

#[test]
fn ivfpq_params_fit_small_tables_and_dims() {
    let p = compute_ivfpq_params(10, 1024);
    assert_eq!(p.nlist, 9);
    assert_eq!(p.m, 32);
    let p = compute_ivfpq_params(1_000_000, 384);
    assert_eq!(p.nlist, 2000);
    assert_eq!(p.m, 16);
    assert_eq!(compute_ivfpq_params(1, 10).m, 2);
}
