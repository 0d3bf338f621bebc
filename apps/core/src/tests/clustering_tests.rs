//! Gap Clustering Tests
//!
//! Batch loop bounds, upsert-by-name, write ordering and cluster resolution.

use super::mocks::{faq, FailingClusterStore, MockLlm};
use crate::config::AssistConfig;
use crate::gaps::clusterer::GapClusterer;
use crate::models::{ActionType, ClusterStatus, NewGapQuestion};
use crate::services::memory::{MemoryClusterStore, MemoryFaqStore, MemoryGapStore};
use crate::services::traits::{ClusterStore, GapStore};
use std::sync::Arc;

const EMPTY_REPLY: &str = r#"{"clusters": []}"#;

const GIFT_CARD_REPLY: &str = r#"{"clusters": [
    {"name": "Gift cards", "description": "Buying and using gift cards",
     "question_ids": [1, 2, 5, 6, 99], "action": "create", "existing_faq_id": null,
     "suggested_question": "How do gift cards work?", "suggested_answer": "Gift cards are sold in store."},
    {"name": "Lonely", "description": "Only one question", "question_ids": [3], "action": "create"}
]}"#;

struct Fixture {
    gaps: Arc<MemoryGapStore>,
    clusters: Arc<MemoryClusterStore>,
    llm: Arc<MockLlm>,
    clusterer: GapClusterer,
}

fn config(batch_size: usize, max_batches: usize) -> AssistConfig {
    AssistConfig {
        batch_size,
        max_batches,
        batch_delay_ms: 0,
        min_questions_to_cluster: 3,
        ..AssistConfig::default()
    }
}

fn fixture(config: &AssistConfig, llm: MockLlm) -> Fixture {
    let gaps = Arc::new(MemoryGapStore::new());
    let clusters = Arc::new(MemoryClusterStore::new());
    let llm = Arc::new(llm);
    let faqs = MemoryFaqStore::new(vec![faq(10, "How do I return an item?", "orders")]);

    let clusterer = GapClusterer::new(
        config,
        gaps.clone(),
        clusters.clone(),
        Arc::new(faqs),
        llm.clone(),
    );
    Fixture {
        gaps,
        clusters,
        llm,
        clusterer,
    }
}

async fn add_questions(gaps: &MemoryGapStore, texts: &[&str]) {
    for text in texts {
        gaps.insert_question(NewGapQuestion {
            question_text: text.to_string(),
            session_id: "s".to_string(),
            user_id: None,
            page_id: None,
            faq_confidence: 0.0,
            faq_match_id: None,
            context: format!("Q1: earlier | A1: about {text}"),
        })
        .await
        .unwrap();
    }
}

const FIRST_BATCH: [&str; 4] = [
    "Can I buy a gift card online?",
    "Do gift cards expire?",
    "Where is the nearest store?",
    "Do you sell refurbished laptops?",
];

#[tokio::test]
async fn test_requires_minimum_without_force() {
    let f = fixture(&config(4, 10), MockLlm::new().always(GIFT_CARD_REPLY));
    add_questions(&f.gaps, &FIRST_BATCH[..2]).await;

    assert!(!f.clusterer.run(false, false).await.unwrap());
    assert_eq!(f.llm.calls(), 0);
}

#[tokio::test]
async fn test_forced_run_on_empty_log() {
    let f = fixture(&config(4, 10), MockLlm::new().always(GIFT_CARD_REPLY));
    assert!(!f.clusterer.run(true, false).await.unwrap());
    assert_eq!(f.llm.calls(), 0);
}

#[tokio::test]
async fn test_creates_cluster_and_marks_members() {
    let f = fixture(&config(4, 10), MockLlm::new().reply(GIFT_CARD_REPLY).always(EMPTY_REPLY));
    add_questions(&f.gaps, &FIRST_BATCH).await;

    let summary = f.clusterer.run_detailed(false, false).await.unwrap();
    assert!(summary.produced_clusters());
    assert_eq!(summary.clusters_created, 1);
    assert_eq!(summary.clusters_updated, 0);
    // Full first batch, then an empty one once the left-over questions are skipped.
    assert_eq!(summary.batches, 1);
    assert_eq!(f.llm.calls(), 1);

    let listed = f.clusters.list(None, 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    let cluster = &listed[0];
    assert_eq!(cluster.cluster_name, "Gift cards");
    assert_eq!(cluster.question_count, 2);
    assert_eq!(cluster.priority_score, 20.0);
    assert_eq!(cluster.status, ClusterStatus::New);
    assert_eq!(cluster.action_type, ActionType::Create);
    assert_eq!(
        cluster.sample_questions,
        vec!["Can I buy a gift card online?", "Do gift cards expire?"]
    );
    assert_eq!(cluster.sample_contexts.len(), cluster.sample_questions.len());
    assert!(cluster.sample_contexts[0].contains("gift card online"));

    let members = f.gaps.questions_for_cluster(cluster.id).await.unwrap();
    let ids: Vec<i64> = members.iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(f.gaps.count(Some(false), None).await.unwrap(), 2);

    let prompts = f.llm.prompts();
    assert!(prompts[0].contains("[FAQ 10] How do I return an item?"));
    assert!(prompts[0].contains("- [3] Where is the nearest store?"));
}

#[tokio::test]
async fn test_rerun_merges_by_name() {
    let f = fixture(&config(4, 10), MockLlm::new().always(GIFT_CARD_REPLY));
    add_questions(&f.gaps, &FIRST_BATCH).await;
    assert!(f.clusterer.run(false, false).await.unwrap());

    add_questions(&f.gaps, &["Can gift cards be used online?", "Is there a gift card balance check?"]).await;
    let summary = f.clusterer.run_detailed(true, false).await.unwrap();

    assert_eq!(summary.clusters_created, 0);
    assert_eq!(summary.clusters_updated, 1);

    let listed = f.clusters.list(None, 10).await.unwrap();
    assert_eq!(listed.len(), 1, "re-running must not duplicate clusters");
    assert_eq!(listed[0].question_count, 4);
    assert_eq!(listed[0].priority_score, 40.0);
    assert_eq!(listed[0].sample_questions.len(), 4);
    assert_eq!(f.gaps.questions_for_cluster(listed[0].id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_batch_count_is_bounded() {
    let texts: Vec<String> = (0..10).map(|i| format!("Question number {i} about stock")).collect();
    let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

    let f = fixture(&config(2, 3), MockLlm::new().always(EMPTY_REPLY));
    add_questions(&f.gaps, &texts).await;

    let summary = f.clusterer.run_detailed(true, false).await.unwrap();
    assert!(!summary.produced_clusters());
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.questions_processed, 6);
    assert_eq!(f.llm.calls(), 3);

    // Each batch moved past the questions left unclustered by the last one.
    let prompts = f.llm.prompts();
    assert!(prompts[0].contains("Question number 0 "));
    assert!(prompts[1].contains("Question number 2 "));
    assert!(prompts[2].contains("Question number 4 "));

    f.clusterer.run(true, true).await.unwrap();
    assert_eq!(f.llm.calls(), 4);
}

#[tokio::test]
async fn test_partial_batch_ends_run() {
    let texts: Vec<String> = (0..6).map(|i| format!("Question number {i} about stock")).collect();
    let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

    let f = fixture(&config(4, 10), MockLlm::new().always(EMPTY_REPLY));
    add_questions(&f.gaps, &texts).await;

    let summary = f.clusterer.run_detailed(true, false).await.unwrap();
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.questions_processed, 6);
    assert_eq!(f.llm.calls(), 2);
}

#[tokio::test]
async fn test_bad_llm_output_produces_nothing() {
    for llm in [
        MockLlm::new().truncated(GIFT_CARD_REPLY),
        MockLlm::new().failing(),
        MockLlm::new().reply("Sorry, I cannot help with that."),
    ] {
        let f = fixture(&config(4, 1), llm);
        add_questions(&f.gaps, &FIRST_BATCH).await;

        assert!(!f.clusterer.run(true, false).await.unwrap());
        assert_eq!(f.gaps.count(Some(true), None).await.unwrap(), 0);
        assert!(f.clusters.list(None, 10).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_unavailable_llm_short_circuits() {
    let f = fixture(&config(4, 10), MockLlm::new().unavailable());
    add_questions(&f.gaps, &FIRST_BATCH).await;

    assert!(!f.clusterer.run(true, false).await.unwrap());
    assert!(!f.clusterer.run(true, false).await.unwrap());
    assert_eq!(f.llm.calls(), 0);
}

#[tokio::test]
async fn test_failed_cluster_write_leaves_questions_unmarked() {
    let cfg = config(4, 10);
    let gaps = Arc::new(MemoryGapStore::new());
    add_questions(&gaps, &FIRST_BATCH).await;

    let clusterer = GapClusterer::new(
        &cfg,
        gaps.clone(),
        Arc::new(FailingClusterStore::default()),
        Arc::new(MemoryFaqStore::default()),
        Arc::new(MockLlm::new().always(GIFT_CARD_REPLY)),
    );

    assert!(clusterer.run(true, false).await.is_err());
    assert_eq!(gaps.count(Some(true), None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_improve_requires_known_faq() {
    let reply = r#"{"clusters": [
        {"name": "Return window", "question_ids": [1, 2], "action": "improve", "existing_faq_id": 10},
        {"name": "Phantom FAQ", "question_ids": [3, 4], "action": "improve", "existing_faq_id": 77}
    ]}"#;
    let f = fixture(&config(4, 1), MockLlm::new().reply(reply));
    add_questions(&f.gaps, &FIRST_BATCH).await;

    assert!(f.clusterer.run(true, false).await.unwrap());

    let improve = f.clusters.get_by_name("Return window").await.unwrap().unwrap();
    assert_eq!(improve.action_type, ActionType::Improve);
    assert_eq!(improve.existing_faq_id, Some(10));

    let phantom = f.clusters.get_by_name("Phantom FAQ").await.unwrap().unwrap();
    assert_eq!(phantom.action_type, ActionType::Create);
    assert_eq!(phantom.existing_faq_id, None);
}

#[tokio::test]
async fn test_resolve_and_dismiss() {
    let reply = r#"{"clusters": [
        {"name": "Gift cards", "question_ids": [1, 2]},
        {"name": "Store locations", "question_ids": [3, 4]}
    ]}"#;
    let f = fixture(&config(4, 1), MockLlm::new().reply(reply));
    add_questions(&f.gaps, &FIRST_BATCH).await;
    f.clusterer.run(true, false).await.unwrap();

    let gift = f.clusters.get_by_name("Gift cards").await.unwrap().unwrap();
    let stores = f.clusters.get_by_name("Store locations").await.unwrap().unwrap();

    assert!(f.clusterer.resolve(gift.id).await.unwrap());
    assert!(f.clusterer.dismiss(stores.id).await.unwrap());
    assert!(!f.clusterer.resolve(999).await.unwrap());

    let gift = f.clusters.get(gift.id).await.unwrap().unwrap();
    assert_eq!(gift.status, ClusterStatus::FaqCreated);
    assert!(f
        .gaps
        .questions_for_cluster(gift.id)
        .await
        .unwrap()
        .iter()
        .all(|q| q.is_resolved));

    let stores = f.clusters.get(stores.id).await.unwrap().unwrap();
    assert_eq!(stores.status, ClusterStatus::Dismissed);
    assert!(f
        .gaps
        .questions_for_cluster(stores.id)
        .await
        .unwrap()
        .iter()
        .all(|q| !q.is_resolved));

    let stats = f.clusterer.stats().await.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.clustered, 4);
    assert_eq!(stats.resolved, 2);
    assert_eq!(stats.clusters_faq_created, 1);
    assert_eq!(stats.clusters_dismissed, 1);
    assert_eq!(stats.clusters_new, 0);

    assert!(f.clusterer.review(stores.id).await.unwrap());
    let reviewed = f.clusterer.list(Some(ClusterStatus::Reviewed), 10).await.unwrap();
    assert_eq!(reviewed.len(), 1);
}

#[tokio::test]
async fn test_closed_cluster_reopens_on_new_questions() {
    let f = fixture(&config(4, 10), MockLlm::new().always(GIFT_CARD_REPLY));
    add_questions(&f.gaps, &FIRST_BATCH).await;
    assert!(f.clusterer.run(true, false).await.unwrap());

    let gift = f.clusters.get_by_name("Gift cards").await.unwrap().unwrap();
    assert!(f.clusterer.resolve(gift.id).await.unwrap());

    add_questions(&f.gaps, &["Can gift cards be used online?", "Is there a gift card balance check?"]).await;
    let summary = f.clusterer.run_detailed(true, false).await.unwrap();
    assert_eq!(summary.clusters_updated, 1);

    let gift = f.clusters.get(gift.id).await.unwrap().unwrap();
    assert_eq!(gift.status, ClusterStatus::New);
    assert_eq!(gift.question_count, 4);

    // Earlier members stay resolved; the new ones are open for review.
    let members = f.gaps.questions_for_cluster(gift.id).await.unwrap();
    let resolved: Vec<bool> = members.iter().map(|q| q.is_resolved).collect();
    assert_eq!(resolved, vec![true, true, false, false]);
}
