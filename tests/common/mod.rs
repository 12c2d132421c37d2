//! Shared test doubles: scripted adapters, a controllable moderation gate and
//! a store whose saves can be made to fail.

#![allow(dead_code)]

use async_trait::async_trait;
use mavis::{
    AdapterFactory, ChatDatabase, ConversationOrchestrator, ConversationStore, HistoryStore,
    MavisError, MavisResult, Message, ModelEntry, ModelRegistry, ModelSpec, ModelStore,
    ModerationGate, OrchestratorSettings, ProviderAdapter, Workflow, WorkflowStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// Scripted Adapter
// ============================================================================

/// How a scripted adapter answers
#[derive(Debug, Clone)]
pub enum Script {
    /// Reply `<model> says: <input>`
    Echo,
    /// Always return the same text
    Reply(String),
    /// Always fail
    Fail(String),
    /// Sleep before replying
    Hang(Duration),
}

pub struct ScriptedAdapter {
    provider: String,
    model: String,
    script: Script,
    pub calls: AtomicUsize,
    /// Message lists received by `complete`
    pub seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedAdapter {
    pub fn new(spec: &ModelSpec, script: Script) -> Self {
        Self {
            provider: spec.provider.clone(),
            model: spec.name.clone(),
            script,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[Message]) -> MavisResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());
        let input = messages.last().map(|m| m.content.clone()).unwrap_or_default();

        match &self.script {
            Script::Echo => Ok(format!("{} says: {}", self.model, input)),
            Script::Reply(text) => Ok(text.clone()),
            Script::Fail(reason) => Err(MavisError::ProviderInvocation(reason.clone())),
            Script::Hang(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(format!("{} finally says: {}", self.model, input))
            }
        }
    }
}

// ============================================================================
// Scripted Factory
// ============================================================================

/// Builds scripted adapters. Model names map to scripts; unknown names echo.
/// Providers other than `openai` / `ollama` are rejected like the real factory.
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: HashMap<String, Script>,
    pub builds: AtomicUsize,
    built: Mutex<Vec<Arc<ScriptedAdapter>>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, model: &str, script: Script) -> Self {
        self.scripts.insert(model.to_string(), script);
        self
    }

    /// Every adapter built so far, in build order
    pub fn built(&self) -> Vec<Arc<ScriptedAdapter>> {
        self.built.lock().unwrap().clone()
    }

    /// Most recently built adapter for `model`
    pub fn adapter_for(&self, model: &str) -> Option<Arc<ScriptedAdapter>> {
        self.built()
            .into_iter()
            .rev()
            .find(|a| a.model() == model)
    }
}

#[async_trait]
impl AdapterFactory for ScriptedFactory {
    async fn build(&self, spec: &ModelSpec) -> MavisResult<Arc<dyn ProviderAdapter>> {
        let _: mavis::ProviderType = spec.provider.parse()?;
        self.builds.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(&spec.name).cloned().unwrap_or(Script::Echo);
        let adapter = Arc::new(ScriptedAdapter::new(spec, script));
        self.built.lock().unwrap().push(adapter.clone());
        Ok(adapter)
    }
}

// ============================================================================
// Moderation
// ============================================================================

/// Gate whose verdict can be flipped during a test
#[derive(Default)]
pub struct SwitchGate {
    pub flagged: AtomicBool,
    pub calls: AtomicUsize,
}

impl SwitchGate {
    pub fn new(flagged: bool) -> Self {
        Self {
            flagged: AtomicBool::new(flagged),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, flagged: bool) {
        self.flagged.store(flagged, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModerationGate for SwitchGate {
    async fn is_flagged(&self, _text: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.flagged.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Store With Injectable Save Failures
// ============================================================================

/// Delegates to an in-memory database; history saves fail while `fail_saves` is set
pub struct FlakyStore {
    pub inner: ChatDatabase,
    pub fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: ChatDatabase::open_in_memory().unwrap(),
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }
}

impl HistoryStore for FlakyStore {
    fn save_history(&self, workflow_id: Uuid, messages: &[Message]) -> MavisResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(MavisError::Persistence("disk full".to_string()));
        }
        self.inner.save_history(workflow_id, messages)
    }

    fn load_history(&self, workflow_id: Uuid) -> MavisResult<Vec<Message>> {
        self.inner.load_history(workflow_id)
    }

    fn delete_history(&self, workflow_id: Uuid) -> MavisResult<()> {
        self.inner.delete_history(workflow_id)
    }
}

impl WorkflowStore for FlakyStore {
    fn create_workflow(&self, workflow: &Workflow) -> MavisResult<()> {
        self.inner.create_workflow(workflow)
    }

    fn get_workflow(&self, workflow_id: Uuid) -> MavisResult<Option<Workflow>> {
        self.inner.get_workflow(workflow_id)
    }

    fn list_workflows(&self) -> MavisResult<Vec<Workflow>> {
        self.inner.list_workflows()
    }

    fn delete_workflow(&self, workflow_id: Uuid) -> MavisResult<bool> {
        self.inner.delete_workflow(workflow_id)
    }
}

impl ModelStore for FlakyStore {
    fn insert_model(&self, spec: &ModelSpec) -> MavisResult<i64> {
        self.inner.insert_model(spec)
    }

    fn load_models(&self) -> MavisResult<Vec<ModelEntry>> {
        self.inner.load_models()
    }

    fn update_model(&self, id: i64, spec: &ModelSpec) -> MavisResult<()> {
        self.inner.update_model(id, spec)
    }

    fn delete_model(&self, id: i64) -> MavisResult<bool> {
        self.inner.delete_model(id)
    }

    fn replace_models(&self, specs: &[ModelSpec]) -> MavisResult<Vec<ModelEntry>> {
        self.inner.replace_models(specs)
    }
}

impl ConversationStore for FlakyStore {
    fn purge_workflow(&self, workflow_id: Uuid) -> MavisResult<bool> {
        self.inner.purge_workflow(workflow_id)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const WELCOME: &str = "Welcome to the test workflow";

/// `openaiA` (censored) followed by `openaiB` (uncensored)
pub fn two_models() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("openai", "openaiA", true),
        ModelSpec::new("openai", "openaiB", false),
    ]
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        welcome_message: Some(WELCOME.to_string()),
        request_timeout: None,
    }
}

pub struct Harness<S> {
    pub orchestrator: ConversationOrchestrator,
    pub store: Arc<S>,
    pub factory: Arc<ScriptedFactory>,
    pub gate: Arc<SwitchGate>,
}

pub async fn harness_with<S>(
    store: S,
    models: &[ModelSpec],
    factory: ScriptedFactory,
    settings: OrchestratorSettings,
) -> Harness<S>
where
    S: ConversationStore + 'static,
{
    let store = Arc::new(store);
    let factory = Arc::new(factory);
    let gate = Arc::new(SwitchGate::new(false));

    let model_store: Arc<dyn ModelStore> = store.clone();
    let registry = ModelRegistry::load(model_store, factory.clone(), models)
        .await
        .unwrap();
    let conversation_store: Arc<dyn ConversationStore> = store.clone();
    let orchestrator =
        ConversationOrchestrator::new(conversation_store, registry, gate.clone(), settings);

    Harness {
        orchestrator,
        store,
        factory,
        gate,
    }
}

/// Orchestrator over an in-memory database with `openaiA` / `openaiB`
pub async fn harness() -> Harness<ChatDatabase> {
    harness_with(
        ChatDatabase::open_in_memory().unwrap(),
        &two_models(),
        ScriptedFactory::new(),
        settings(),
    )
    .await
}
