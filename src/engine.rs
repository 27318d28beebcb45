use std::collections::HashMap;

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::assets::{FlowReference, SessionAssets};
use crate::contact::Contact;
use crate::definition::ValidationError;
use crate::envs::Environment;
use crate::events::Event;
use crate::modifiers::Modifier;
use crate::resumes::{Resume, ResumeError};
use crate::run::Run;
use crate::services::{AirtimeService, EmailService, WebhookService, DEFAULT_MAX_BODY_BYTES};
use crate::session::{self, NodeEntry, Session};
use crate::template::{HandlebarsEvaluator, TemplateEvaluator};

/// Traversal guard: a run visiting more nodes than this in total is failed
/// as looping.
pub const DEFAULT_MAX_STEPS: usize = 100;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unable to read flow {0}")]
    MissingFlow(Uuid),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Resume(#[from] ResumeError),
}

/// Everything that happened during one engine entry: the new events of every
/// touched run in emission order, plus the contact modifiers the caller must
/// apply to its own store.
#[derive(Debug)]
pub struct Sprint {
    events: Vec<Event>,
    modifiers: Vec<Box<dyn Modifier>>,
}

impl Sprint {
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn modifiers(&self) -> &[Box<dyn Modifier>] {
        &self.modifiers
    }
}

/// The stateless runtime: evaluator plus external service ports. Sessions
/// hold all mutable state; one engine can drive any number of them.
pub struct Engine {
    evaluator: Box<dyn TemplateEvaluator>,
    webhook: Option<Box<dyn WebhookService>>,
    airtime: Option<Box<dyn AirtimeService>>,
    email: Option<Box<dyn EmailService>>,
    max_body_bytes: usize,
    max_steps: usize,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn evaluator(&self) -> &dyn TemplateEvaluator {
        self.evaluator.as_ref()
    }

    pub fn webhook_service(&self) -> Option<&dyn WebhookService> {
        self.webhook.as_deref()
    }

    pub fn airtime_service(&self) -> Option<&dyn AirtimeService> {
        self.airtime.as_deref()
    }

    pub fn email_service(&self) -> Option<&dyn EmailService> {
        self.email.as_deref()
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Starts a new session for a contact at the given flow and drives it
    /// until it waits or ends.
    #[tracing::instrument(skip_all, fields(flow = %flow.uuid))]
    pub fn start_session(
        &self,
        assets: &SessionAssets,
        environment: Environment,
        contact: Contact,
        flow: &FlowReference,
    ) -> Result<(Session, Sprint), EngineError> {
        let definition = assets.flow(flow.uuid).ok_or(EngineError::MissingFlow(flow.uuid))?;
        definition.validate()?;
        let entry_node = definition.entry_node().map(|n| n.uuid());

        let mut session = Session::new(environment, contact);
        session.push_run(Run::new(definition.reference(), None));

        let mut modifiers = Vec::new();
        let mut watermarks = HashMap::new();
        let mut events = Vec::new();
        match entry_node {
            Some(node_uuid) => {
                session::run_continuation(
                    self,
                    &mut session,
                    assets,
                    &mut modifiers,
                    &mut watermarks,
                    &mut events,
                    (0, NodeEntry::Fresh(node_uuid)),
                )?;
            }
            None => session.reconcile_status(),
        }

        info!(session = %session.uuid(), status = ?session.status(), "session started");
        Ok((session, Sprint { events, modifiers }))
    }

    /// Wakes a waiting session with external input or a timeout and drives
    /// it until it waits again or ends.
    #[tracing::instrument(skip_all, fields(session = %session.uuid()))]
    pub fn resume_session(
        &self,
        session: &mut Session,
        assets: &SessionAssets,
        resume: Box<dyn Resume>,
    ) -> Result<Sprint, EngineError> {
        let index = session.waiting_run_index().ok_or(ResumeError::NotWaiting)?;
        let wait = session.runs()[index].wait().ok_or(ResumeError::NotWaiting)?;
        if !resume.matches(&wait.wait) {
            return Err(ResumeError::WrongKind {
                resume: resume.type_name(),
                wait: wait.wait.type_name(),
            }
            .into());
        }

        let mut watermarks: HashMap<Uuid, usize> =
            session.runs().iter().map(|r| (r.uuid(), r.events().len())).collect();
        let mut events = Vec::new();

        let mut modifiers = Vec::new();
        let start = session::apply_resume(session, index, resume.as_ref());
        session::drain_new_events(session, &mut watermarks, &mut events);
        match start {
            Some(start) => {
                session::run_continuation(
                    self,
                    session,
                    assets,
                    &mut modifiers,
                    &mut watermarks,
                    &mut events,
                    start,
                )?;
            }
            None => session.reconcile_status(),
        }

        info!(status = ?session.status(), "session resumed");
        Ok(Sprint { events, modifiers })
    }
}

pub struct EngineBuilder {
    evaluator: Box<dyn TemplateEvaluator>,
    webhook: Option<Box<dyn WebhookService>>,
    airtime: Option<Box<dyn AirtimeService>>,
    email: Option<Box<dyn EmailService>>,
    max_body_bytes: usize,
    max_steps: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        EngineBuilder {
            evaluator: Box::new(HandlebarsEvaluator::new()),
            webhook: None,
            airtime: None,
            email: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder::default()
    }

    pub fn with_evaluator(mut self, evaluator: Box<dyn TemplateEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_webhook_service(mut self, service: Box<dyn WebhookService>) -> Self {
        self.webhook = Some(service);
        self
    }

    pub fn with_airtime_service(mut self, service: Box<dyn AirtimeService>) -> Self {
        self.airtime = Some(service);
        self
    }

    pub fn with_email_service(mut self, service: Box<dyn EmailService>) -> Self {
        self.email = Some(service);
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            evaluator: self.evaluator,
            webhook: self.webhook,
            airtime: self.airtime,
            email: self.email,
            max_body_bytes: self.max_body_bytes,
            max_steps: self.max_steps,
        }
    }
}
