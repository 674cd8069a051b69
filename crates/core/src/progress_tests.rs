// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn update(processed: Option<u64>, total: Option<u64>) -> ProgressUpdate {
    ProgressUpdate { processed, total, entities: BTreeMap::new() }
}

#[test]
fn merge_overrides_present_fields_only() {
    let stored = Progress { processed: 10, total: Some(100), entities: BTreeMap::new() };
    let merged = stored.merged(&update(Some(40), None)).unwrap();
    assert_eq!(merged.processed, 40);
    assert_eq!(merged.total, Some(100));
}

#[test]
fn merge_rejects_processed_over_total_in_update() {
    let err = Progress::default().merged(&update(Some(150), Some(100))).unwrap_err();
    assert_eq!(err, ProgressError::ProcessedExceedsTotal { processed: 150, total: 100 });
}

#[test]
fn merge_rejects_processed_over_stored_total() {
    let stored = Progress { processed: 90, total: Some(100), entities: BTreeMap::new() };
    let err = stored.merged(&update(Some(101), None)).unwrap_err();
    assert_eq!(err, ProgressError::ProcessedExceedsTotal { processed: 101, total: 100 });
}

#[test]
fn merge_without_total_accepts_any_processed() {
    let merged = Progress::default().merged(&update(Some(5_000), None)).unwrap();
    assert_eq!(merged.processed, 5_000);
    assert_eq!(merged.ratio(), None);
}

#[test]
fn merge_replaces_entities_by_name() {
    let mut stored = Progress::default();
    stored.entities.insert("issues".into(), EntityProgress { processed: 1, total: Some(10) });
    stored.entities.insert("commits".into(), EntityProgress { processed: 3, total: None });

    let mut upd = ProgressUpdate::default();
    upd.entities.insert("issues".into(), EntityProgress { processed: 7, total: Some(10) });
    let merged = stored.merged(&upd).unwrap();

    assert_eq!(merged.entities["issues"].processed, 7);
    assert_eq!(merged.entities["commits"].processed, 3);
}

#[test]
fn merge_rejects_entity_over_total() {
    let mut upd = ProgressUpdate::default();
    upd.entities.insert("issues".into(), EntityProgress { processed: 11, total: Some(10) });
    let err = Progress::default().merged(&upd).unwrap_err();
    assert!(matches!(err, ProgressError::EntityExceedsTotal { ref entity, .. } if entity == "issues"));
}

#[test]
fn ratio_handles_empty_total() {
    let progress = Progress { processed: 0, total: Some(0), entities: BTreeMap::new() };
    assert_eq!(progress.ratio(), Some(1.0));
}

#[test]
fn resume_merge_is_last_write_wins_per_entity() {
    let mut stored = ResumeState::new()
        .with("issues", ResumeCursor::Page { page: 3 })
        .with("commits", ResumeCursor::After { token: "abc".into() });
    stored.merge(ResumeState::new().with("issues", ResumeCursor::Page { page: 9 }));

    assert_eq!(stored.get("issues"), Some(&ResumeCursor::Page { page: 9 }));
    assert_eq!(stored.get("commits"), Some(&ResumeCursor::After { token: "abc".into() }));
    assert_eq!(stored.len(), 2);
}

#[test]
fn resume_state_serializes_as_object() {
    let state = ResumeState::new().with("issues", ResumeCursor::Page { page: 2 });
    let json = serde_json::to_value(&state).unwrap();
    assert_eq!(json, serde_json::json!({ "issues": { "kind": "page", "page": 2 } }));

    let parsed: ResumeState = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, state);
}

proptest! {
    #[test]
    fn processed_over_total_is_never_clamped(processed in 0u64..10_000, total in 0u64..10_000) {
        let result = Progress::default().merged(&update(Some(processed), Some(total)));
        if processed > total {
            prop_assert!(result.is_err());
        } else {
            let merged = result.unwrap();
            prop_assert_eq!(merged.processed, processed);
            prop_assert_eq!(merged.total, Some(total));
        }
    }
}
