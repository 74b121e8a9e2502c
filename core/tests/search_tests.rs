use kb_core::{Bm25Index, DocId, Metadata};

fn three_docs() -> Bm25Index {
    let mut index = Bm25Index::new();
    index.add_document(1, "deploy cloud run service", Metadata::new());
    index.add_document(2, "deploy cloud build trigger", Metadata::new());
    index.add_document(3, "storage bucket upload", Metadata::new());
    index
}

fn ids(index: &Bm25Index, query: &str, limit: Option<usize>) -> Vec<DocId> {
    index.search(query, limit).iter().map(|h| h.doc_id).collect()
}

#[test]
fn ranks_matching_documents_above_others() {
    let index = three_docs();
    for _ in 0..10 {
        assert_eq!(ids(&index, "cloud deploy", None), vec![1, 2]);
    }
    let hits = index.search("cloud deploy", None);
    assert!(hits.iter().all(|h| h.score > 0.0));
    assert_eq!(hits[0].score, hits[1].score);
}

#[test]
fn rare_terms_outweigh_common_ones() {
    let index = three_docs();
    // "upload" occurs in one document, "cloud" and "deploy" in two
    assert_eq!(ids(&index, "cloud deploy upload", None), vec![3, 1, 2]);
}

#[test]
fn hits_carry_content_and_metadata() {
    let mut index = Bm25Index::new();
    let mut meta = Metadata::new();
    meta.insert("source".into(), "knowledge/artifact-registry.md".into());
    index.add_document(4, "Push images to Artifact Registry", meta.clone());
    let hits = index.search("artifact", None);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].text, "Push images to Artifact Registry");
    assert_eq!(hits[0].metadata, meta);
}

#[test]
fn limit_keeps_the_best_hit() {
    let index = three_docs();
    let all = index.search("build trigger upload", None);
    let one = index.search("build trigger upload", Some(1));
    assert_eq!(one.len(), 1);
    assert_eq!(one[0], all[0]);
    assert_eq!(index.search("build trigger upload", Some(0)).len(), all.len());
    assert!(index.search("kubernetes", Some(1)).is_empty());
}

#[test]
fn unseen_terms_add_nothing() {
    let index = three_docs();
    let base = index.search("storage", None);
    let with_noise = index.search("storage kubernetes helm", None);
    assert_eq!(base, with_noise);
}

#[test]
fn empty_query_and_empty_index_return_nothing() {
    let index = three_docs();
    assert!(index.search("", None).is_empty());
    assert!(index.search("?! 42", None).is_empty());
    assert!(Bm25Index::new().search("cloud", None).is_empty());
}

#[test]
fn more_occurrences_never_lower_the_score() {
    let mut scores = Vec::new();
    for reps in 1..6 {
        let mut index = Bm25Index::new();
        let text = format!("{} filler words here", "cache ".repeat(reps));
        index.add_document(1, text, Metadata::new());
        index.add_document(2, "unrelated filler words here", Metadata::new());
        scores.push(index.search("cache", None)[0].score);
    }
    assert!(scores.windows(2).all(|w| w[1] >= w[0]), "{scores:?}");
}

#[test]
fn shorter_documents_win_at_equal_tf() {
    let mut index = Bm25Index::new();
    index.add_document(1, "rollback plan with many many extra words attached", Metadata::new());
    index.add_document(2, "rollback plan", Metadata::new());
    assert_eq!(ids(&index, "rollback", None), vec![2, 1]);
}
