use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::assets::{FlowReference, SessionAssets};
use crate::contact::Contact;
use crate::definition::Flow;
use crate::engine::Engine;
use crate::envs::Environment;
use crate::events::{Event, EventPayload};
use crate::inputs::Input;
use crate::modifiers::Modifier;
use crate::results::{ResultValue, Results};
use crate::template::{Escaping, TemplateError};
use crate::waits::Wait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Active,
    Waiting,
    Completed,
    Expired,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Expired | RunStatus::Failed)
    }
}

/// One visit to a node on the run's path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Step {
    pub uuid: Uuid,
    pub node_uuid: Uuid,
    pub arrived_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_uuid: Option<Uuid>,
}

/// The wait a run is currently suspended on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActiveWait {
    pub wait: Wait,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<DateTime<Utc>>,
}

/// One flow instance's execution state, exclusively owned by its session.
#[derive(Debug, Serialize, Deserialize)]
pub struct Run {
    uuid: Uuid,
    flow: FlowReference,
    status: RunStatus,
    path: Vec<Step>,
    events: Vec<Event>,
    results: Results,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    webhook: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wait: Option<ActiveWait>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_uuid: Option<Uuid>,
    created_on: DateTime<Utc>,
    modified_on: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exited_on: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(flow: FlowReference, parent_uuid: Option<Uuid>) -> Self {
        let now = Utc::now();
        Run {
            uuid: Uuid::new_v4(),
            flow,
            status: RunStatus::Active,
            path: Vec::new(),
            events: Vec::new(),
            results: Results::new(),
            webhook: None,
            wait: None,
            parent_uuid,
            created_on: now,
            modified_on: now,
            exited_on: None,
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn flow(&self) -> &FlowReference {
        &self.flow
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.modified_on = Utc::now();
    }

    /// Moves the run to a terminal status and closes out its wait.
    pub(crate) fn exit(&mut self, status: RunStatus) {
        self.status = status;
        self.wait = None;
        let now = Utc::now();
        self.modified_on = now;
        self.exited_on = Some(now);
    }

    pub fn parent_uuid(&self) -> Option<Uuid> {
        self.parent_uuid
    }

    pub fn path(&self) -> &[Step] {
        &self.path
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn results(&self) -> &Results {
        &self.results
    }

    pub fn webhook(&self) -> Option<&Value> {
        self.webhook.as_ref()
    }

    pub(crate) fn set_webhook(&mut self, value: Value) {
        self.webhook = Some(value);
    }

    pub fn wait(&self) -> Option<&ActiveWait> {
        self.wait.as_ref()
    }

    pub fn expires_on(&self) -> Option<DateTime<Utc>> {
        self.wait.as_ref().and_then(|w| w.expires_on)
    }

    /// Appends to the run's local event log. Order of emission is the causal
    /// execution order; entries are never mutated or removed.
    pub(crate) fn log_event(&mut self, event: Event) {
        self.modified_on = event.created_on;
        self.events.push(event);
    }

    /// Stores a result and logs the full value as a `run_result_changed`
    /// event, even when it overwrites an existing name.
    pub(crate) fn save_result(&mut self, result: ResultValue) {
        self.results.save(result.clone());
        self.log_event(Event::new(EventPayload::RunResultChanged { result }));
    }

    pub(crate) fn create_step(&mut self, node_uuid: Uuid) {
        self.path.push(Step {
            uuid: Uuid::new_v4(),
            node_uuid,
            arrived_on: Utc::now(),
            exit_uuid: None,
        });
        self.modified_on = Utc::now();
    }

    pub(crate) fn set_exit(&mut self, exit_uuid: Uuid) {
        if let Some(step) = self.path.last_mut() {
            step.exit_uuid = Some(exit_uuid);
        }
    }

    /// The node this run is positioned at: the last step on its path.
    pub fn current_node_uuid(&self) -> Option<Uuid> {
        self.path.last().map(|s| s.node_uuid)
    }

    pub(crate) fn set_waiting(&mut self, wait: Wait, expires_on: Option<DateTime<Utc>>) {
        self.wait = Some(ActiveWait { wait, expires_on });
        self.set_status(RunStatus::Waiting);
    }

    pub(crate) fn clear_wait(&mut self) {
        self.wait = None;
    }
}

/// A subflow entry requested by an action, picked up by the session after
/// the node's actions finish.
#[derive(Debug, Clone)]
pub struct PendingFlow {
    pub flow: FlowReference,
    pub terminal: bool,
}

/// Everything one action or router step may see or touch. Borrows are split
/// off the session so the run, the contact snapshot and the shared assets
/// can be used together without aliasing.
pub struct RunContext<'a> {
    pub(crate) run: &'a mut Run,
    pub(crate) flow: &'a Flow,
    pub(crate) contact: &'a mut Contact,
    pub(crate) environment: &'a Environment,
    pub(crate) assets: &'a SessionAssets,
    pub(crate) input: Option<&'a Input>,
    pub(crate) child_status: Option<RunStatus>,
    pub(crate) engine: &'a Engine,
    pub(crate) modifiers: &'a mut Vec<Box<dyn Modifier>>,
    pub(crate) pending_flow: &'a mut Option<PendingFlow>,
}

impl<'a> RunContext<'a> {
    pub fn run(&self) -> &Run {
        self.run
    }

    pub fn contact(&self) -> &Contact {
        self.contact
    }

    pub fn environment(&self) -> &Environment {
        self.environment
    }

    pub fn assets(&self) -> &SessionAssets {
        self.assets
    }

    pub fn input(&self) -> Option<&Input> {
        self.input
    }

    pub fn engine(&self) -> &Engine {
        self.engine
    }

    pub fn log_event(&mut self, payload: EventPayload) {
        self.run.log_event(Event::new(payload));
    }

    /// Language priority for localization: the contact's language when
    /// allowed, then the environment's allowed languages.
    pub fn languages(&self) -> Vec<String> {
        self.environment.language_priority(self.contact)
    }

    /// Localized text array for a property of the item identified by `uuid`,
    /// defaulting to the flow's base-language values.
    pub fn translate(&self, uuid: Uuid, property: &str, defaults: &[String]) -> Vec<String> {
        self.flow
            .localization()
            .translated_text_array(uuid, property, defaults, &self.languages())
    }

    /// The context visible to template evaluation.
    pub fn eval_context(&self) -> Value {
        let mut fields = Map::new();
        for (key, value) in self.contact.fields() {
            if let Some(value) = value {
                fields.insert(key.clone(), Value::String(value.clone()));
            }
        }

        let groups: Vec<Value> = self
            .contact
            .group_uuids()
            .iter()
            .filter_map(|uuid| self.assets.group(*uuid))
            .map(|g| Value::String(g.name.clone()))
            .collect();

        let mut results = Map::new();
        for (key, result) in self.run.results().iter() {
            results.insert(
                key.clone(),
                json!({
                    "value": result.value,
                    "category": result.category,
                    "category_localized": result.category_localized,
                }),
            );
        }

        let input = match self.input {
            Some(Input::Msg { msg, .. }) => json!({
                "type": "msg",
                "text": msg.text,
                "attachments": msg.attachments,
                "urn": msg.urn,
            }),
            Some(Input::Dial { status, duration_seconds, .. }) => json!({
                "type": "dial",
                "status": status,
                "duration_seconds": duration_seconds,
            }),
            None => Value::Null,
        };

        json!({
            "contact": {
                "uuid": self.contact.uuid(),
                "name": self.contact.name(),
                "language": self.contact.language(),
                "timezone": self.contact.timezone(),
                "status": self.contact.status(),
                "urn": self.contact.preferred_urn(),
                "urns": self.contact.urns(),
                "fields": Value::Object(fields.clone()),
                "groups": groups,
            },
            "fields": Value::Object(fields),
            "results": Value::Object(results),
            "webhook": self.run.webhook().cloned().unwrap_or(Value::Null),
            "input": input,
            "child": self.child_status.map(|s| json!({"status": s})).unwrap_or(Value::Null),
            "run": {
                "uuid": self.run.uuid(),
                "status": self.run.status(),
            },
        })
    }

    pub fn evaluate_template(&self, text: &str) -> Result<String, TemplateError> {
        self.engine.evaluator().evaluate_template(text, &self.eval_context())
    }

    pub fn evaluate_template_text(&self, text: &str, escaping: Escaping, strict: bool) -> Result<String, TemplateError> {
        self.engine
            .evaluator()
            .evaluate_template_text(text, &self.eval_context(), escaping, strict)
    }

    /// Evaluates a template, logging any failure as a non-fatal error event
    /// and falling back to an empty string.
    pub fn evaluate_logged(&mut self, text: &str) -> String {
        match self.evaluate_template(text) {
            Ok(evaluated) => evaluated,
            Err(e) => {
                self.log_event(EventPayload::Error { text: e.to_string() });
                String::new()
            }
        }
    }

    pub fn save_result(&mut self, result: ResultValue) {
        self.run.save_result(result);
    }

    /// Applies a contact modifier, forwarding any events it emits into the
    /// run's log and recording the modifier itself for the sprint.
    pub fn apply_modifier(&mut self, modifier: Box<dyn Modifier>) {
        let run = &mut *self.run;
        let contact = &mut *self.contact;
        modifier.apply(self.environment, self.assets, contact, &mut |event| {
            run.log_event(event);
        });
        self.modifiers.push(modifier);
    }

    /// The explicit fatal path: transitions the run to `failed` and emits a
    /// terminal failure event. Everything else is non-fatal.
    pub fn fail(&mut self, text: impl Into<String>) {
        self.run.exit(RunStatus::Failed);
        self.log_event(EventPayload::Failure { text: text.into() });
    }

    /// Requests entry into a subflow once the current node's actions finish.
    pub fn enter_flow(&mut self, flow: FlowReference, terminal: bool) {
        *self.pending_flow = Some(PendingFlow { flow, terminal });
    }
}
