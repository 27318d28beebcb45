use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{Event, EventPayload};
use crate::inputs::{DialStatus, Input, MsgIn};
use crate::run::{Run, RunStatus};
use crate::waits::Wait;

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("session is not waiting for input")]
    NotWaiting,
    #[error("resume of type '{resume}' can't be applied to wait of type '{wait}'")]
    WrongKind { resume: &'static str, wait: &'static str },
}

/// An external stimulus that wakes a waiting session: an incoming message,
/// a completed dial, or the wait's timeout elapsing.
#[typetag::serde(tag = "type")]
pub trait Resume: Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    /// When the stimulus happened, which may predate the engine seeing it.
    fn resumed_on(&self) -> DateTime<Utc>;

    /// Whether this resume satisfies the given wait.
    fn matches(&self, wait: &Wait) -> bool;

    /// Records the resume on the waiting run and surfaces any new input.
    fn apply(&self, run: &mut Run, input: &mut Option<Input>);

    /// The status the resumed run should exit with instead of continuing,
    /// if this resume ends it outright.
    fn terminal_status(&self) -> Option<RunStatus> {
        None
    }

    /// The exit status of a completed child run, for resumes that unwind a
    /// subflow back into its parent.
    fn child_status(&self) -> Option<RunStatus> {
        None
    }

    fn clone_box(&self) -> Box<dyn Resume>;
}

impl Clone for Box<dyn Resume> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Resumes a session waiting on a message wait with an incoming message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgResume {
    pub msg: MsgIn,
    #[serde(default = "Utc::now")]
    pub resumed_on: DateTime<Utc>,
}

impl MsgResume {
    pub fn new(msg: MsgIn) -> Self {
        MsgResume { msg, resumed_on: Utc::now() }
    }
}

#[typetag::serde(name = "msg")]
impl Resume for MsgResume {
    fn type_name(&self) -> &'static str {
        "msg"
    }

    fn resumed_on(&self) -> DateTime<Utc> {
        self.resumed_on
    }

    fn matches(&self, wait: &Wait) -> bool {
        matches!(wait, Wait::Msg { .. })
    }

    fn apply(&self, run: &mut Run, input: &mut Option<Input>) {
        run.log_event(Event::new(EventPayload::MsgReceived { msg: self.msg.clone() }));
        *input = Some(Input::Msg { msg: self.msg.clone(), created_on: self.resumed_on });
    }

    fn clone_box(&self) -> Box<dyn Resume> {
        Box::new(self.clone())
    }
}

/// Resumes a session waiting on a dial wait with the outcome of the call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialResume {
    pub status: DialStatus,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default = "Utc::now")]
    pub resumed_on: DateTime<Utc>,
}

impl DialResume {
    pub fn new(status: DialStatus, duration_seconds: u64) -> Self {
        DialResume { status, duration_seconds, resumed_on: Utc::now() }
    }
}

#[typetag::serde(name = "dial")]
impl Resume for DialResume {
    fn type_name(&self) -> &'static str {
        "dial"
    }

    fn resumed_on(&self) -> DateTime<Utc> {
        self.resumed_on
    }

    fn matches(&self, wait: &Wait) -> bool {
        matches!(wait, Wait::Dial { .. })
    }

    fn apply(&self, run: &mut Run, input: &mut Option<Input>) {
        run.log_event(Event::new(EventPayload::DialEnded {
            status: self.status,
            duration_seconds: self.duration_seconds,
        }));
        *input = Some(Input::Dial {
            status: self.status,
            duration_seconds: self.duration_seconds,
            created_on: self.resumed_on,
        });
    }

    fn clone_box(&self) -> Box<dyn Resume> {
        Box::new(self.clone())
    }
}

/// Resumes a session whose wait timeout has elapsed. The waiting run exits
/// as expired rather than routing onward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitTimeoutResume {
    #[serde(default = "Utc::now")]
    pub resumed_on: DateTime<Utc>,
}

impl Default for WaitTimeoutResume {
    fn default() -> Self {
        WaitTimeoutResume { resumed_on: Utc::now() }
    }
}

#[typetag::serde(name = "wait_timeout")]
impl Resume for WaitTimeoutResume {
    fn type_name(&self) -> &'static str {
        "wait_timeout"
    }

    fn resumed_on(&self) -> DateTime<Utc> {
        self.resumed_on
    }

    fn matches(&self, wait: &Wait) -> bool {
        wait.timeout().is_some()
    }

    fn apply(&self, run: &mut Run, _input: &mut Option<Input>) {
        run.log_event(Event::new(EventPayload::RunExpired));
    }

    fn terminal_status(&self) -> Option<RunStatus> {
        Some(RunStatus::Expired)
    }

    fn clone_box(&self) -> Box<dyn Resume> {
        Box::new(self.clone())
    }
}

/// Synthetic resume used to unwind a completed child run into its waiting
/// parent. Never arrives from outside the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResume {
    pub status: RunStatus,
    #[serde(default = "Utc::now")]
    pub resumed_on: DateTime<Utc>,
}

impl RunResume {
    pub(crate) fn new(status: RunStatus) -> Self {
        RunResume { status, resumed_on: Utc::now() }
    }
}

#[typetag::serde(name = "run")]
impl Resume for RunResume {
    fn type_name(&self) -> &'static str {
        "run"
    }

    fn resumed_on(&self) -> DateTime<Utc> {
        self.resumed_on
    }

    fn matches(&self, _wait: &Wait) -> bool {
        false
    }

    fn apply(&self, _run: &mut Run, _input: &mut Option<Input>) {}

    fn child_status(&self) -> Option<RunStatus> {
        Some(self.status)
    }

    fn clone_box(&self) -> Box<dyn Resume> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;
    use crate::assets::FlowReference;
    use crate::waits::Timeout;

    #[test]
    fn test_resume_wait_matching() {
        let msg_wait = Wait::Msg { timeout: None };
        let dial_wait = Wait::Dial { timeout: Some(Timeout { seconds: 120 }) };

        let msg = MsgResume::new(MsgIn::new("hi"));
        assert!(msg.matches(&msg_wait));
        assert!(!msg.matches(&dial_wait));

        let dial = DialResume::new(DialStatus::Answered, 15);
        assert!(dial.matches(&dial_wait));
        assert!(!dial.matches(&msg_wait));

        let timeout = WaitTimeoutResume::default();
        assert!(!timeout.matches(&msg_wait));
        assert!(timeout.matches(&dial_wait));
        assert_eq!(timeout.terminal_status(), Some(RunStatus::Expired));
    }

    #[test]
    fn test_resume_round_trip() {
        let resume: Box<dyn Resume> = Box::new(DialResume::new(DialStatus::Busy, 0));
        let json = serde_json::to_value(&resume).unwrap();
        assert_eq!(json["type"], "dial");
        assert_eq!(json["status"], "busy");
        let back: Box<dyn Resume> = serde_json::from_value(json).unwrap();
        assert_eq!(back.type_name(), "dial");
    }

    #[test]
    fn test_resumed_on_stamps_the_input() {
        let happened = Utc.with_ymd_and_hms(2024, 4, 1, 12, 30, 0).unwrap();
        let resume = MsgResume { msg: MsgIn::new("hi"), resumed_on: happened };

        let flow = FlowReference { uuid: Uuid::new_v4(), name: "Test".to_string() };
        let mut run = Run::new(flow, None);
        let mut input = None;
        resume.apply(&mut run, &mut input);

        match input {
            Some(Input::Msg { created_on, .. }) => assert_eq!(created_on, happened),
            other => panic!("expected msg input, got {other:?}"),
        }
    }

    #[test]
    fn test_resume_without_timestamp_defaults_to_now() {
        let resume: Box<dyn Resume> =
            serde_json::from_value(serde_json::json!({
                "type": "msg",
                "msg": {"uuid": Uuid::new_v4(), "text": "hi"}
            }))
            .unwrap();
        assert!((Utc::now() - resume.resumed_on()).num_seconds() < 5);
    }
}
