//! Tests for the conversation orchestrator
//!
//! This file covers:
//! - Censorship-aware model selection
//! - History persistence after every turn
//! - Workflow create / switch / delete
//! - Degraded turns (provider failure, timeout) and save rollback

mod common;

use common::*;
use mavis::{
    ChatDatabase, HistoryStore, MavisError, Message, ModelSpec, OrchestratorSettings, Role,
    SelectionError, TurnOptions, WorkflowStore, FALLBACK_RESPONSE,
};
use std::time::Duration;

// ============================================================================
// Model Selection Tests
// ============================================================================

mod selection_tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_turn_uses_censored_model() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();

        let outcome = h
            .orchestrator
            .generate_response("hello", TurnOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.model.name, "openaiA");
        assert_eq!(outcome.content, "openaiA says: hello");
        assert!(!outcome.degraded);
        assert_eq!(h.gate.calls(), 1);
    }

    #[tokio::test]
    async fn test_flagged_turn_uses_uncensored_model() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();
        h.gate.set(true);

        let outcome = h
            .orchestrator
            .generate_response("something edgy", TurnOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.model.name, "openaiB");
        assert!(!outcome.model.censored);
    }

    #[tokio::test]
    async fn test_force_flagged_skips_gate() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();

        let outcome = h
            .orchestrator
            .generate_response("hi", TurnOptions::flagged())
            .await
            .unwrap();

        assert_eq!(outcome.model.name, "openaiB");
        assert_eq!(h.gate.calls(), 0);
    }

    #[tokio::test]
    async fn test_skip_moderation_uses_censored_even_if_gate_flags() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();
        h.gate.set(true);

        let outcome = h
            .orchestrator
            .generate_response("hi", TurnOptions::unmoderated())
            .await
            .unwrap();

        assert_eq!(outcome.model.name, "openaiA");
        assert_eq!(h.gate.calls(), 0);
    }

    #[tokio::test]
    async fn test_explicit_index_bypasses_moderation() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();
        h.gate.set(true);

        let outcome = h
            .orchestrator
            .generate_response("hi", TurnOptions::with_model(0))
            .await
            .unwrap();

        assert_eq!(outcome.model.name, "openaiA");
        assert_eq!(h.gate.calls(), 0);
    }

    #[tokio::test]
    async fn test_selection_is_deterministic() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();

        let mut picked = Vec::new();
        for _ in 0..3 {
            let outcome = h
                .orchestrator
                .generate_response("same input", TurnOptions::default())
                .await
                .unwrap();
            picked.push(outcome.model.id);
        }
        assert!(picked.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn test_flagged_without_uncensored_model_leaves_history_untouched() {
        let mut h = harness_with(
            ChatDatabase::open_in_memory().unwrap(),
            &[ModelSpec::new("openai", "gpt-4o-mini", true)],
            ScriptedFactory::new(),
            settings(),
        )
        .await;
        let workflow = h.orchestrator.create_workflow("test").unwrap();
        let before = h.orchestrator.history().to_vec();

        let err = h
            .orchestrator
            .generate_response("edgy", TurnOptions::flagged())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MavisError::Selection(SelectionError::NoSuitableModel { censored: false })
        ));
        assert_eq!(h.orchestrator.history(), before.as_slice());
        assert_eq!(h.store.load_history(workflow.id).unwrap(), before);
    }

    #[tokio::test]
    async fn test_out_of_range_index_is_selection_error() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();
        let before = h.orchestrator.history().len();

        let err = h
            .orchestrator
            .generate_response("hi", TurnOptions::with_model(7))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MavisError::Selection(SelectionError::InvalidIndex { index: 7, len: 2 })
        ));
        assert_eq!(h.orchestrator.history().len(), before);
    }

    #[tokio::test]
    async fn test_reorder_changes_default_selection() {
        let mut h = harness_with(
            ChatDatabase::open_in_memory().unwrap(),
            &[
                ModelSpec::new("openai", "first", true),
                ModelSpec::new("ollama", "second", true),
            ],
            ScriptedFactory::new(),
            settings(),
        )
        .await;
        h.orchestrator.create_workflow("test").unwrap();

        let before = h
            .orchestrator
            .generate_response("a", TurnOptions::default())
            .await
            .unwrap();
        assert_eq!(before.model.name, "first");

        h.orchestrator.registry_mut().reorder(&[1, 0]).unwrap();

        let after = h
            .orchestrator
            .generate_response("b", TurnOptions::default())
            .await
            .unwrap();
        assert_eq!(after.model.name, "second");
        assert_eq!(after.content, "second says: b");
    }

    #[tokio::test]
    async fn test_turn_without_workflow_fails() {
        let mut h = harness().await;
        let err = h
            .orchestrator
            .generate_response("hi", TurnOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MavisError::NoActiveWorkflow));
    }
}

// ============================================================================
// Persistence Tests
// ============================================================================

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_history_persisted_after_each_turn() {
        let mut h = harness().await;
        let workflow = h.orchestrator.create_workflow("test").unwrap();

        for text in ["one", "two", "three"] {
            h.orchestrator
                .generate_response(text, TurnOptions::default())
                .await
                .unwrap();
            assert_eq!(
                h.store.load_history(workflow.id).unwrap(),
                h.orchestrator.history()
            );
        }
        // welcome + 3 * (human, assistant)
        assert_eq!(h.orchestrator.history().len(), 7);
    }

    #[tokio::test]
    async fn test_turn_appends_human_then_assistant() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();

        h.orchestrator
            .generate_response("hello", TurnOptions::default())
            .await
            .unwrap();

        let history = h.orchestrator.history();
        let tail = &history[history.len() - 2..];
        assert_eq!(tail[0], Message::human("hello"));
        assert_eq!(tail[1], Message::assistant("openaiA says: hello"));
    }

    #[tokio::test]
    async fn test_adapter_receives_prior_history_and_input() {
        let mut h = harness().await;
        h.orchestrator.create_workflow("test").unwrap();

        h.orchestrator
            .generate_response("first", TurnOptions::default())
            .await
            .unwrap();
        h.orchestrator
            .generate_response("second", TurnOptions::default())
            .await
            .unwrap();

        let adapter = h.factory.adapter_for("openaiA").unwrap();
        let seen = adapter.seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.len(), 4);
        assert_eq!(last[0], Message::assistant(WELCOME));
        assert_eq!(last[3], Message::human("second"));
    }

    #[tokio::test]
    async fn test_failed_save_rolls_back_history() {
        let mut h = harness_with(
            FlakyStore::new(),
            &two_models(),
            ScriptedFactory::new(),
            settings(),
        )
        .await;
        let workflow = h.orchestrator.create_workflow("test").unwrap();
        let before = h.orchestrator.history().to_vec();

        h.store.set_failing(true);
        let err = h
            .orchestrator
            .generate_response("lost", TurnOptions::default())
            .await
            .unwrap_err();

        assert!(err.is_persistence());
        assert_eq!(h.orchestrator.history(), before.as_slice());
        assert_eq!(h.store.load_history(workflow.id).unwrap(), before);

        h.store.set_failing(false);
        h.orchestrator
            .generate_response("kept", TurnOptions::default())
            .await
            .unwrap();
        assert_eq!(h.orchestrator.history().len(), before.len() + 2);
    }

    #[tokio::test]
    async fn test_chat_maps_errors_to_fallback() {
        let mut h = harness().await;
        assert_eq!(h.orchestrator.chat("no workflow yet").await, FALLBACK_RESPONSE);

        h.orchestrator.create_workflow("test").unwrap();
        assert_eq!(h.orchestrator.chat("hi").await, "openaiA says: hi");
    }
}

// ============================================================================
// Degraded Turn Tests
// ============================================================================

mod degraded_tests {
    use super::*;

    #[tokio::test]
    async fn test_failing_provider_appends_exactly_one_fallback() {
        let mut h = harness_with(
            ChatDatabase::open_in_memory().unwrap(),
            &two_models(),
            ScriptedFactory::new().with_script("openaiA", Script::Fail("boom".into())),
            settings(),
        )
        .await;
        let workflow = h.orchestrator.create_workflow("test").unwrap();
        let before = h.orchestrator.history().len();

        let outcome = h
            .orchestrator
            .generate_response("hello", TurnOptions::default())
            .await
            .unwrap();

        assert!(outcome.degraded);
        assert_eq!(outcome.content, FALLBACK_RESPONSE);

        let history = h.orchestrator.history();
        assert_eq!(history.len(), before + 2);
        let fallbacks = history
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content == FALLBACK_RESPONSE)
            .count();
        assert_eq!(fallbacks, 1);
        assert_eq!(h.store.load_history(workflow.id).unwrap(), history);
    }

    #[tokio::test]
    async fn test_unbuildable_model_degrades_turn() {
        let mut h = harness_with(
            ChatDatabase::open_in_memory().unwrap(),
            &[
                ModelSpec::new("mystery", "ghost", true),
                ModelSpec::new("openai", "openaiB", false),
            ],
            ScriptedFactory::new(),
            settings(),
        )
        .await;
        h.orchestrator.create_workflow("test").unwrap();

        let outcome = h
            .orchestrator
            .generate_response("hello", TurnOptions::default())
            .await
            .unwrap();
        assert!(outcome.degraded);
        assert_eq!(outcome.model.name, "ghost");
        assert_eq!(outcome.content, FALLBACK_RESPONSE);

        let outcome = h
            .orchestrator
            .generate_response("hello", TurnOptions::flagged())
            .await
            .unwrap();
        assert!(!outcome.degraded);
        assert_eq!(outcome.model.name, "openaiB");
    }

    #[tokio::test]
    async fn test_failures_are_not_retried() {
        let mut h = harness_with(
            ChatDatabase::open_in_memory().unwrap(),
            &two_models(),
            ScriptedFactory::new().with_script("openaiA", Script::Fail("boom".into())),
            settings(),
        )
        .await;
        h.orchestrator.create_workflow("test").unwrap();

        h.orchestrator
            .generate_response("hello", TurnOptions::default())
            .await
            .unwrap();

        let adapter = h.factory.adapter_for("openaiA").unwrap();
        assert_eq!(adapter.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_fallback() {
        let mut h = harness_with(
            ChatDatabase::open_in_memory().unwrap(),
            &two_models(),
            ScriptedFactory::new()
                .with_script("openaiA", Script::Hang(Duration::from_secs(30))),
            OrchestratorSettings {
                welcome_message: None,
                request_timeout: Some(Duration::from_millis(20)),
            },
        )
        .await;
        h.orchestrator.create_workflow("test").unwrap();

        let outcome = h
            .orchestrator
            .generate_response("slow", TurnOptions::default())
            .await
            .unwrap();

        assert!(outcome.degraded);
        assert_eq!(
            h.orchestrator.history(),
            &[Message::human("slow"), Message::assistant(FALLBACK_RESPONSE)]
        );
    }
}

// ============================================================================
// Workflow Tests
// ============================================================================

mod workflow_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_seeds_welcome_as_sole_entry() {
        let mut h = harness().await;
        let workflow = h.orchestrator.create_workflow("fresh").unwrap();

        assert_eq!(h.orchestrator.history(), &[Message::assistant(WELCOME)]);
        assert_eq!(
            h.store.load_history(workflow.id).unwrap(),
            vec![Message::assistant(WELCOME)]
        );
        assert_eq!(h.orchestrator.active_workflow(), Some(&workflow));
    }

    #[tokio::test]
    async fn test_create_without_welcome_starts_empty() {
        let mut h = harness_with(
            ChatDatabase::open_in_memory().unwrap(),
            &two_models(),
            ScriptedFactory::new(),
            OrchestratorSettings::default(),
        )
        .await;
        let workflow = h.orchestrator.create_workflow("quiet").unwrap();

        assert!(h.orchestrator.history().is_empty());
        assert!(h.store.get_workflow(workflow.id).unwrap().is_some());
        assert!(!h.store.has_history(workflow.id).unwrap());
    }

    #[tokio::test]
    async fn test_switch_away_and_back_restores_history() {
        let mut h = harness().await;
        let first = h.orchestrator.create_workflow("first").unwrap();
        h.orchestrator
            .generate_response("remember me", TurnOptions::default())
            .await
            .unwrap();
        let first_history = h.orchestrator.history().to_vec();

        let second = h.orchestrator.create_workflow("second").unwrap();
        assert_eq!(h.orchestrator.active_workflow().map(|w| w.id), Some(second.id));
        assert_eq!(h.orchestrator.history(), &[Message::assistant(WELCOME)]);

        let session = h.orchestrator.set_active_workflow(first.id).unwrap();
        assert_eq!(session.messages(), first_history.as_slice());
        assert_eq!(session.workflow().name, "first");
    }

    #[tokio::test]
    async fn test_adapter_sees_switched_history() {
        let mut h = harness().await;
        let first = h.orchestrator.create_workflow("first").unwrap();
        h.orchestrator
            .generate_response("in first", TurnOptions::default())
            .await
            .unwrap();
        h.orchestrator.create_workflow("second").unwrap();
        h.orchestrator.set_active_workflow(first.id).unwrap();

        h.orchestrator
            .generate_response("back again", TurnOptions::default())
            .await
            .unwrap();

        let adapter = h.factory.adapter_for("openaiA").unwrap();
        let seen = adapter.seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert!(last.contains(&Message::human("in first")));
        assert_eq!(last.last(), Some(&Message::human("back again")));
    }

    #[tokio::test]
    async fn test_select_unknown_workflow_fails() {
        let mut h = harness().await;
        let err = h
            .orchestrator
            .set_active_workflow(uuid::Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, MavisError::WorkflowNotFound(_)));
        assert!(h.orchestrator.session().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_history_loads_empty() {
        let mut h = harness().await;
        let workflow = h.orchestrator.create_workflow("broken").unwrap();
        h.store.save_raw_history(workflow.id, "{not json").unwrap();

        let session = h.orchestrator.set_active_workflow(workflow.id).unwrap();
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_delete_active_workflow_clears_session() {
        let mut h = harness().await;
        let keep = h.orchestrator.create_workflow("keep").unwrap();
        let doomed = h.orchestrator.create_workflow("doomed").unwrap();

        h.orchestrator.delete_workflow(doomed.id).unwrap();

        assert!(h.orchestrator.session().is_none());
        assert!(h.store.get_workflow(doomed.id).unwrap().is_none());
        assert!(!h.store.has_history(doomed.id).unwrap());
        assert_eq!(h.orchestrator.list_workflows().unwrap(), vec![keep]);
    }

    #[tokio::test]
    async fn test_delete_inactive_workflow_keeps_session() {
        let mut h = harness().await;
        let other = h.orchestrator.create_workflow("other").unwrap();
        let active = h.orchestrator.create_workflow("active").unwrap();

        h.orchestrator.delete_workflow(other.id).unwrap();
        assert_eq!(h.orchestrator.active_workflow().map(|w| w.id), Some(active.id));
    }

    #[tokio::test]
    async fn test_delete_unknown_workflow_fails() {
        let mut h = harness().await;
        let err = h
            .orchestrator
            .delete_workflow(uuid::Uuid::new_v4())
            .unwrap_err();
        assert!(matches!(err, MavisError::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn test_resume_latest_picks_newest_workflow() {
        let mut h = harness().await;
        assert!(h.orchestrator.resume_latest().unwrap().is_none());

        h.orchestrator.create_workflow("older").unwrap();
        let newer = h.orchestrator.create_workflow("newer").unwrap();
        h.orchestrator.delete_workflow(newer.id).unwrap();
        let newest = h.orchestrator.create_workflow("newest").unwrap();

        let resumed = h.orchestrator.resume_latest().unwrap().unwrap();
        assert_eq!(resumed, newest);
    }

    #[tokio::test]
    async fn test_insert_assistant_message_requires_workflow() {
        let mut h = harness().await;
        assert!(matches!(
            h.orchestrator.insert_assistant_message("note"),
            Err(MavisError::NoActiveWorkflow)
        ));

        let workflow = h.orchestrator.create_workflow("notes").unwrap();
        h.orchestrator.insert_assistant_message("note").unwrap();
        assert_eq!(h.store.load_history(workflow.id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_history_does_not_switch() {
        let mut h = harness().await;
        let first = h.orchestrator.create_workflow("first").unwrap();
        let second = h.orchestrator.create_workflow("second").unwrap();

        let history = h.orchestrator.load_history(first.id).unwrap();
        assert_eq!(history, vec![Message::assistant(WELCOME)]);
        assert_eq!(h.orchestrator.active_workflow().map(|w| w.id), Some(second.id));
    }
}
