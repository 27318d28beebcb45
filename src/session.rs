use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::assets::SessionAssets;
use crate::contact::Contact;
use crate::definition::Node;
use crate::engine::{Engine, EngineError};
use crate::envs::Environment;
use crate::events::{Event, EventPayload};
use crate::inputs::Input;
use crate::modifiers::Modifier;
use crate::resumes::{Resume, RunResume};
use crate::results::ResultValue;
use crate::run::{PendingFlow, Run, RunContext, RunStatus};
use crate::waits::Wait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Waiting,
    Completed,
    Errored,
}

/// A contact's complete interaction with an entry flow and every subflow
/// entered from it. Owns the contact snapshot and all runs; single-threaded
/// by construction.
#[derive(Debug, Serialize, Deserialize)]
pub struct Session {
    uuid: Uuid,
    environment: Environment,
    contact: Contact,
    status: SessionStatus,
    runs: Vec<Run>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Input>,
    created_on: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(environment: Environment, contact: Contact) -> Self {
        Session {
            uuid: Uuid::new_v4(),
            environment,
            contact,
            status: SessionStatus::Active,
            runs: Vec::new(),
            input: None,
            created_on: Utc::now(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// The run suspended on a wait, when the session is waiting.
    pub fn waiting_run(&self) -> Option<&Run> {
        self.runs.iter().find(|r| r.status() == RunStatus::Waiting)
    }

    /// When the current wait gives up and the session can be resumed with a
    /// wait timeout.
    pub fn wait_expires_on(&self) -> Option<DateTime<Utc>> {
        self.waiting_run().and_then(|r| r.expires_on())
    }

    pub(crate) fn waiting_run_index(&self) -> Option<usize> {
        self.runs.iter().position(|r| r.status() == RunStatus::Waiting)
    }

    pub(crate) fn push_run(&mut self, run: Run) {
        self.runs.push(run);
    }

    /// Derives the session status from its runs: waiting if any run waits,
    /// errored if the entry run failed, otherwise completed.
    pub(crate) fn reconcile_status(&mut self) {
        self.status = if self.runs.iter().any(|r| r.status() == RunStatus::Waiting) {
            SessionStatus::Waiting
        } else if self.runs.first().map(Run::status) == Some(RunStatus::Failed) {
            SessionStatus::Errored
        } else {
            SessionStatus::Completed
        };
    }
}

/// How a run arrives at the node about to be processed.
pub(crate) enum NodeEntry {
    /// First arrival: a step is recorded and actions execute before routing.
    Fresh(Uuid),
    /// Re-entry at the current node after a wait or a completed child run;
    /// actions already ran, only the router fires.
    Resumed(Option<RunStatus>),
}

enum StepOutcome {
    Continue(Uuid),
    Waiting,
    Exited,
    Subflow(PendingFlow),
}

/// Copies each run's events past its watermark into the sprint stream and
/// advances the watermark. Called after every point that can log, so the
/// stream interleaves runs in emission order.
pub(crate) fn drain_new_events(
    session: &Session,
    watermarks: &mut HashMap<Uuid, usize>,
    events: &mut Vec<Event>,
) {
    for run in &session.runs {
        let mark = watermarks.entry(run.uuid()).or_insert(0);
        if *mark < run.events().len() {
            events.extend(run.events()[*mark..].iter().cloned());
            *mark = run.events().len();
        }
    }
}

/// Drives the session forward from one entry point until every reachable
/// run has either ended or suspended on a wait.
pub(crate) fn run_continuation(
    engine: &Engine,
    session: &mut Session,
    assets: &SessionAssets,
    modifiers: &mut Vec<Box<dyn Modifier>>,
    watermarks: &mut HashMap<Uuid, usize>,
    events: &mut Vec<Event>,
    start: (usize, NodeEntry),
) -> Result<(), EngineError> {
    let mut current = Some(start);

    while let Some((index, entry)) = current.take() {
        let outcome = step_run(engine, session, assets, modifiers, index, entry)?;
        drain_new_events(session, watermarks, events);
        match outcome {
            StepOutcome::Continue(destination) => {
                current = Some((index, NodeEntry::Fresh(destination)));
            }
            StepOutcome::Waiting => break,
            StepOutcome::Exited => {
                current = unwind(session, index);
                drain_new_events(session, watermarks, events);
            }
            StepOutcome::Subflow(pending) => {
                if pending.terminal {
                    session.runs[index].exit(RunStatus::Completed);
                }
                let parent_uuid = session.runs[index].uuid();
                let child = Run::new(pending.flow.clone(), Some(parent_uuid));
                let child_index = session.runs.len();
                debug!(flow = %pending.flow.uuid, run = %child.uuid(), "entering subflow");
                session.runs.push(child);

                let entry_node = assets
                    .flow(pending.flow.uuid)
                    .ok_or(EngineError::MissingFlow(pending.flow.uuid))?
                    .entry_node()
                    .map(Node::uuid);
                match entry_node {
                    Some(node_uuid) => current = Some((child_index, NodeEntry::Fresh(node_uuid))),
                    None => {
                        session.runs[child_index].exit(RunStatus::Completed);
                        current = unwind(session, child_index);
                        drain_new_events(session, watermarks, events);
                    }
                }
            }
        }
    }

    session.reconcile_status();
    Ok(())
}

/// Hands a finished run's status back to its parent. A failed child fails
/// the parent too; completed and expired children route through the parent's
/// router on `child.status`.
fn unwind(session: &mut Session, index: usize) -> Option<(usize, NodeEntry)> {
    let status = session.runs[index].status();
    let parent_uuid = session.runs[index].parent_uuid()?;
    let parent_index = session.runs.iter().position(|r| r.uuid() == parent_uuid)?;
    if session.runs[parent_index].status().is_terminal() {
        return None;
    }

    if status == RunStatus::Failed {
        session.runs[parent_index].exit(RunStatus::Failed);
        session.runs[parent_index].log_event(crate::events::Event::new(EventPayload::Failure {
            text: "child run failed".to_string(),
        }));
        return unwind(session, parent_index);
    }

    let resume = RunResume::new(status);
    Some((parent_index, NodeEntry::Resumed(resume.child_status())))
}

fn step_run(
    engine: &Engine,
    session: &mut Session,
    assets: &SessionAssets,
    modifiers: &mut Vec<Box<dyn Modifier>>,
    index: usize,
    entry: NodeEntry,
) -> Result<StepOutcome, EngineError> {
    let flow_uuid = session.runs[index].flow().uuid;
    let flow = assets.flow(flow_uuid).ok_or(EngineError::MissingFlow(flow_uuid))?;

    let Session { runs, contact, environment, input, .. } = session;
    let run = &mut runs[index];
    let mut pending_flow = None;
    let (node_uuid, fresh, child_status) = match entry {
        NodeEntry::Fresh(node_uuid) => (node_uuid, true, None),
        NodeEntry::Resumed(child_status) => match run.current_node_uuid() {
            Some(node_uuid) => (node_uuid, false, child_status),
            None => {
                run.exit(RunStatus::Completed);
                return Ok(StepOutcome::Exited);
            }
        },
    };

    let mut ctx = RunContext {
        run,
        flow,
        contact,
        environment,
        assets,
        input: input.as_ref(),
        child_status,
        engine,
        modifiers,
        pending_flow: &mut pending_flow,
    };

    if fresh {
        if ctx.run().path().len() >= engine.max_steps() {
            ctx.fail("flow appears to be looping");
            return Ok(StepOutcome::Exited);
        }
        ctx.run.create_step(node_uuid);
    }

    let node = match flow.node(node_uuid) {
        Some(node) => node,
        None => {
            ctx.fail(format!("unable to find node {node_uuid}"));
            return Ok(StepOutcome::Exited);
        }
    };

    if fresh {
        for action in node.actions() {
            action.execute(&mut ctx);
            if ctx.run().status() != RunStatus::Active {
                return Ok(StepOutcome::Exited);
            }
            if ctx.pending_flow.is_some() {
                break;
            }
        }
        if let Some(pending) = ctx.pending_flow.take() {
            return Ok(StepOutcome::Subflow(pending));
        }
    }

    Ok(route_node(&mut ctx, node, fresh))
}

/// Routes the run out of a node. On fresh arrival a router with a wait
/// suspends the run instead of routing.
fn route_node(ctx: &mut RunContext, node: &Node, allow_wait: bool) -> StepOutcome {
    let router = match node.router() {
        None => {
            return match node.exits().first() {
                Some(exit) => {
                    ctx.run.set_exit(exit.uuid);
                    match exit.destination_uuid {
                        Some(destination) => StepOutcome::Continue(destination),
                        None => {
                            ctx.run.exit(RunStatus::Completed);
                            StepOutcome::Exited
                        }
                    }
                }
                None => {
                    ctx.run.exit(RunStatus::Completed);
                    StepOutcome::Exited
                }
            };
        }
        Some(router) => router,
    };

    if allow_wait {
        if let Some(wait) = router.wait() {
            let expires_on = wait.timeout().map(|t| Utc::now() + Duration::seconds(t.seconds as i64));
            ctx.log_event(match wait {
                Wait::Msg { .. } => EventPayload::MsgWait { expires_on },
                Wait::Dial { .. } => EventPayload::DialWait { expires_on },
            });
            ctx.run.set_waiting(wait.clone(), expires_on);
            return StepOutcome::Waiting;
        }
    }

    let route = router.route(ctx);
    let category = match router.categories().iter().find(|c| c.uuid == route.category_uuid) {
        Some(category) => category.clone(),
        None => {
            ctx.fail(format!("router picked unknown category {}", route.category_uuid));
            return StepOutcome::Exited;
        }
    };

    if let Some(result_name) = router.result_name() {
        let defaults = [category.name.clone()];
        let localized = ctx.translate(category.uuid, "name", &defaults);
        let category_localized = (localized[0] != category.name).then(|| localized[0].clone());
        let node_uuid = ctx.run().current_node_uuid().unwrap_or_else(Uuid::nil);
        ctx.save_result(ResultValue {
            name: result_name.to_string(),
            value: route.value.clone(),
            category: Some(category.name.clone()),
            category_localized,
            node_uuid,
            input: route.operand.clone(),
            extra: None,
            created_on: Utc::now(),
        });
    }

    let exit_uuid = match category.exit_uuid {
        Some(exit_uuid) => exit_uuid,
        None => {
            ctx.run.exit(RunStatus::Completed);
            return StepOutcome::Exited;
        }
    };
    ctx.run.set_exit(exit_uuid);

    match node.exit(exit_uuid).and_then(|e| e.destination_uuid) {
        Some(destination) => StepOutcome::Continue(destination),
        None => {
            ctx.run.exit(RunStatus::Completed);
            StepOutcome::Exited
        }
    }
}

/// Wakes the waiting run with a matching resume and returns where the
/// continuation should pick up.
pub(crate) fn apply_resume(
    session: &mut Session,
    index: usize,
    resume: &dyn Resume,
) -> Option<(usize, NodeEntry)> {
    let Session { runs, input, .. } = session;
    let run = &mut runs[index];

    resume.apply(run, input);

    if let Some(status) = resume.terminal_status() {
        run.exit(status);
        return unwind(session, index);
    }

    run.clear_wait();
    run.set_status(RunStatus::Active);
    Some((index, NodeEntry::Resumed(None)))
}
