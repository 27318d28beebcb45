use std::collections::HashMap;

use serde_json::{json, Value};
use uuid::Uuid;

use rivulet::actions::CallWebhookAction;
use rivulet::assets::{Field, SessionAssets};
use rivulet::contact::{Contact, ContactStatus, Urn};
use rivulet::definition::Flow;
use rivulet::engine::{Engine, EngineError};
use rivulet::envs::Environment;
use rivulet::events::EventPayload;
use rivulet::inputs::MsgIn;
use rivulet::resumes::{DialResume, MsgResume, ResumeError, WaitTimeoutResume};
use rivulet::run::RunStatus;
use rivulet::services::{RequestDescriptor, ResponseDescriptor, ServiceCall, ServiceError, WebhookService};
use rivulet::session::SessionStatus;

/// Webhook stub returning a canned status and body for every request.
struct StubWebhook {
    status: u16,
    body: Option<&'static str>,
}

impl WebhookService for StubWebhook {
    fn call(&self, request: RequestDescriptor) -> Result<ServiceCall, ServiceError> {
        Ok(ServiceCall {
            request,
            response: Some(ResponseDescriptor {
                status: self.status,
                body: self.body.map(|b| b.to_string()),
            }),
            elapsed_ms: 1,
        })
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine() -> Engine {
    init_logging();
    Engine::builder().build()
}

fn contact() -> Contact {
    let mut contact = Contact::new("Bob");
    contact.add_urn(Urn::parse("tel:+12065551212").unwrap());
    contact
}

fn assets_with(flows: Vec<Value>) -> SessionAssets {
    let flows = flows.into_iter().map(|v| Flow::from_value(v).unwrap()).collect();
    SessionAssets::new(vec![], vec![], vec![], vec![], flows)
}

fn event_types(events: &[rivulet::events::Event]) -> Vec<&'static str> {
    events.iter().map(|e| e.type_name()).collect()
}

fn hello_flow(flow_uuid: Uuid) -> Value {
    json!({
        "uuid": flow_uuid,
        "name": "Hello",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "send_msg",
                "uuid": Uuid::new_v4(),
                "text": "Hello {{contact.name}}"
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    })
}

#[test]
fn test_single_message_flow_completes() {
    let flow_uuid = Uuid::new_v4();
    let assets = assets_with(vec![hello_flow(flow_uuid)]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    let (session, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(session.runs().len(), 1);
    assert_eq!(session.runs()[0].status(), RunStatus::Completed);
    assert_eq!(event_types(sprint.events()), vec!["msg_created"]);

    match &sprint.events()[0].payload {
        EventPayload::MsgCreated { msg } => {
            assert_eq!(msg.text, "Hello Bob");
            assert_eq!(msg.urn.as_ref().map(|u| u.as_str()), Some("tel:+12065551212"));
        }
        other => panic!("expected msg_created, got {other:?}"),
    }
}

#[test]
fn test_missing_flow_is_an_error() {
    let assets = assets_with(vec![]);
    let missing = rivulet::assets::FlowReference { uuid: Uuid::new_v4(), name: "Ghost".to_string() };
    let err = engine()
        .start_session(&assets, Environment::default(), contact(), &missing)
        .unwrap_err();
    assert!(matches!(err, EngineError::MissingFlow(_)));
}

#[test]
fn test_webhook_failure_is_not_fatal() {
    let flow_uuid = Uuid::new_v4();
    let hook_node = Uuid::new_v4();
    let msg_node = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Webhook",
        "language": "eng",
        "nodes": [
            {
                "uuid": hook_node,
                "actions": [{
                    "type": "call_webhook",
                    "uuid": Uuid::new_v4(),
                    "method": "GET",
                    "url": "http://example.com/lookup",
                    "result_name": "Lookup"
                }],
                "exits": [{"uuid": Uuid::new_v4(), "destination_uuid": msg_node}]
            },
            {
                "uuid": msg_node,
                "actions": [{
                    "type": "send_msg",
                    "uuid": Uuid::new_v4(),
                    "text": "Sorry, that didn't work"
                }],
                "exits": [{"uuid": Uuid::new_v4()}]
            }
        ]
    });
    let assets = assets_with(vec![flow]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    init_logging();
    let engine = Engine::builder()
        .with_webhook_service(Box::new(StubWebhook { status: 500, body: Some(r#"{"error":"boom"}"#) }))
        .build();
    let (session, sprint) = engine
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    // the failed call is recorded but the run marches on
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(
        event_types(sprint.events()),
        vec!["run_result_changed", "webhook_called", "msg_created"]
    );

    let result = session.runs()[0].results().get("Lookup").unwrap();
    assert_eq!(result.value, "500");
    assert_eq!(result.category.as_deref(), Some("Failure"));
    assert_eq!(result.input.as_deref(), Some("GET http://example.com/lookup"));
    assert_eq!(result.extra, Some(json!({"error": "boom"})));
    assert_eq!(result.node_uuid, hook_node);

    match &sprint.events()[1].payload {
        EventPayload::WebhookCalled { status, .. } => {
            assert_eq!(*status, rivulet::services::CallStatus::ResponseError)
        }
        other => panic!("expected webhook_called, got {other:?}"),
    }
}

fn favorites_flow(flow_uuid: Uuid, timeout_seconds: Option<u64>) -> Value {
    let yes_category = Uuid::new_v4();
    let other_category = Uuid::new_v4();
    let yes_exit = Uuid::new_v4();
    let other_exit = Uuid::new_v4();
    let ask_node = Uuid::new_v4();
    let done_node = Uuid::new_v4();
    let wait = match timeout_seconds {
        Some(seconds) => json!({"type": "msg", "timeout": {"seconds": seconds}}),
        None => json!({"type": "msg"}),
    };
    json!({
        "uuid": flow_uuid,
        "name": "Favorites",
        "language": "eng",
        "nodes": [
            {
                "uuid": ask_node,
                "actions": [{
                    "type": "send_msg",
                    "uuid": Uuid::new_v4(),
                    "text": "Do you like beer?"
                }],
                "router": {
                    "type": "switch",
                    "operand": "{{input.text}}",
                    "wait": wait,
                    "result_name": "Beer",
                    "cases": [{
                        "uuid": Uuid::new_v4(),
                        "type": "has_any_word",
                        "arguments": ["yes", "yeah"],
                        "category_uuid": yes_category
                    }],
                    "categories": [
                        {"uuid": yes_category, "name": "Yes", "exit_uuid": yes_exit},
                        {"uuid": other_category, "name": "Other", "exit_uuid": other_exit}
                    ],
                    "default_category_uuid": other_category
                },
                "exits": [
                    {"uuid": yes_exit, "destination_uuid": done_node},
                    {"uuid": other_exit, "destination_uuid": done_node}
                ]
            },
            {
                "uuid": done_node,
                "actions": [{
                    "type": "send_msg",
                    "uuid": Uuid::new_v4(),
                    "text": "You said {{results.beer.value}}"
                }],
                "exits": [{"uuid": Uuid::new_v4()}]
            }
        ]
    })
}

#[test]
fn test_wait_and_msg_resume() {
    let flow_uuid = Uuid::new_v4();
    let assets = assets_with(vec![favorites_flow(flow_uuid, None)]);
    let flow = assets.flow(flow_uuid).unwrap().reference();
    let engine = engine();

    let (mut session, sprint) = engine
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    assert_eq!(session.status(), SessionStatus::Waiting);
    assert_eq!(session.runs()[0].status(), RunStatus::Waiting);
    assert_eq!(event_types(sprint.events()), vec!["msg_created", "msg_wait"]);
    assert!(session.wait_expires_on().is_none());

    let sprint = engine
        .resume_session(&mut session, &assets, Box::new(MsgResume::new(MsgIn::new("yes please"))))
        .unwrap();

    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(
        event_types(sprint.events()),
        vec!["msg_received", "run_result_changed", "msg_created"]
    );

    let result = session.runs()[0].results().get("Beer").unwrap();
    assert_eq!(result.value, "yes");
    assert_eq!(result.category.as_deref(), Some("Yes"));
    assert_eq!(result.input.as_deref(), Some("yes please"));

    match &sprint.events()[2].payload {
        EventPayload::MsgCreated { msg } => assert_eq!(msg.text, "You said yes"),
        other => panic!("expected msg_created, got {other:?}"),
    }
}

#[test]
fn test_resume_of_wrong_kind_is_rejected() {
    let flow_uuid = Uuid::new_v4();
    let assets = assets_with(vec![favorites_flow(flow_uuid, None)]);
    let flow = assets.flow(flow_uuid).unwrap().reference();
    let engine = engine();

    let (mut session, _) = engine
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    let err = engine
        .resume_session(
            &mut session,
            &assets,
            Box::new(DialResume::new(rivulet::inputs::DialStatus::Answered, 10)),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::Resume(ResumeError::WrongKind { resume: "dial", wait: "msg" })));

    // the session is untouched and can still take the right resume
    assert_eq!(session.status(), SessionStatus::Waiting);
    engine
        .resume_session(&mut session, &assets, Box::new(MsgResume::new(MsgIn::new("no"))))
        .unwrap();
    assert_eq!(session.status(), SessionStatus::Completed);
}

#[test]
fn test_resume_of_completed_session_is_rejected() {
    let flow_uuid = Uuid::new_v4();
    let assets = assets_with(vec![hello_flow(flow_uuid)]);
    let flow = assets.flow(flow_uuid).unwrap().reference();
    let engine = engine();

    let (mut session, _) = engine
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();
    assert_eq!(session.status(), SessionStatus::Completed);

    let err = engine
        .resume_session(&mut session, &assets, Box::new(MsgResume::new(MsgIn::new("hi"))))
        .unwrap_err();
    assert!(matches!(err, EngineError::Resume(ResumeError::NotWaiting)));
}

#[test]
fn test_wait_timeout_expires_the_run() {
    let flow_uuid = Uuid::new_v4();
    let assets = assets_with(vec![favorites_flow(flow_uuid, Some(300))]);
    let flow = assets.flow(flow_uuid).unwrap().reference();
    let engine = engine();

    let (mut session, _) = engine
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();
    assert!(session.wait_expires_on().is_some());

    let sprint = engine
        .resume_session(&mut session, &assets, Box::new(WaitTimeoutResume::default()))
        .unwrap();

    assert_eq!(session.runs()[0].status(), RunStatus::Expired);
    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(event_types(sprint.events()), vec!["run_expired"]);
    // the expired run saved no result for the unanswered question
    assert!(session.runs()[0].results().get("Beer").is_none());
}

#[test]
fn test_status_modifier_noop_emits_nothing() {
    let flow_uuid = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Status",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "set_contact_status",
                "uuid": Uuid::new_v4(),
                "status": "active"
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });
    let assets = assets_with(vec![flow]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    let (session, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    // contact is already active so nothing changed and nothing was logged
    assert_eq!(session.contact().status(), ContactStatus::Active);
    assert!(sprint.events().is_empty());
    assert_eq!(sprint.modifiers().len(), 1);
}

#[test]
fn test_result_overwrite_keeps_event_history() {
    let flow_uuid = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Results",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [
                {
                    "type": "set_run_result",
                    "uuid": Uuid::new_v4(),
                    "name": "Favorite Color",
                    "value": "red"
                },
                {
                    "type": "set_run_result",
                    "uuid": Uuid::new_v4(),
                    "name": "favorite color",
                    "value": "blue"
                }
            ],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });
    let assets = assets_with(vec![flow]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    let (session, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    // one entry in the store, two changes in the log
    assert_eq!(session.runs()[0].results().len(), 1);
    assert_eq!(session.runs()[0].results().get("Favorite Color").unwrap().value, "blue");
    assert_eq!(
        event_types(sprint.events()),
        vec!["run_result_changed", "run_result_changed"]
    );
}

#[test]
fn test_set_contact_field_requires_known_field() {
    let flow_uuid = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Fields",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "set_contact_field",
                "uuid": Uuid::new_v4(),
                "field": {"key": "gender", "name": "Gender"},
                "value": "male"
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });

    // without the field asset, the action reports a missing dependency
    let assets = assets_with(vec![flow.clone()]);
    let reference = assets.flow(flow_uuid).unwrap().reference();
    let (session, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &reference)
        .unwrap();
    assert_eq!(event_types(sprint.events()), vec!["dependency_missing"]);
    assert_eq!(session.contact().field("gender"), None);
    assert_eq!(session.status(), SessionStatus::Completed);

    // with it, the field is set
    let flows = vec![Flow::from_value(flow).unwrap()];
    let assets = SessionAssets::new(
        vec![],
        vec![],
        vec![],
        vec![Field { key: "gender".to_string(), name: "Gender".to_string() }],
        flows,
    );
    let (session, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &reference)
        .unwrap();
    assert_eq!(event_types(sprint.events()), vec!["contact_field_changed"]);
    assert_eq!(session.contact().field("gender"), Some("male"));
}

#[test]
fn test_looping_flow_fails_the_run() {
    let flow_uuid = Uuid::new_v4();
    let node = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Loop",
        "language": "eng",
        "nodes": [{
            "uuid": node,
            "actions": [],
            "exits": [{"uuid": Uuid::new_v4(), "destination_uuid": node}]
        }]
    });
    let assets = assets_with(vec![flow]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    let (session, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    assert_eq!(session.runs()[0].status(), RunStatus::Failed);
    assert_eq!(session.status(), SessionStatus::Errored);
    assert_eq!(event_types(sprint.events()), vec!["failure"]);
    assert_eq!(session.runs()[0].path().len(), 100);
}

#[test]
fn test_subflow_completes_back_into_parent() {
    let parent_uuid = Uuid::new_v4();
    let child_uuid = Uuid::new_v4();
    let enter_node = Uuid::new_v4();
    let after_node = Uuid::new_v4();

    let child = json!({
        "uuid": child_uuid,
        "name": "Child",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "send_msg",
                "uuid": Uuid::new_v4(),
                "text": "In the child"
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });
    let parent = json!({
        "uuid": parent_uuid,
        "name": "Parent",
        "language": "eng",
        "nodes": [
            {
                "uuid": enter_node,
                "actions": [{
                    "type": "enter_flow",
                    "uuid": Uuid::new_v4(),
                    "flow": {"uuid": child_uuid, "name": "Child"}
                }],
                "exits": [{"uuid": Uuid::new_v4(), "destination_uuid": after_node}]
            },
            {
                "uuid": after_node,
                "actions": [{
                    "type": "send_msg",
                    "uuid": Uuid::new_v4(),
                    "text": "Back in the parent"
                }],
                "exits": [{"uuid": Uuid::new_v4()}]
            }
        ]
    });

    let assets = assets_with(vec![parent, child]);
    let flow = assets.flow(parent_uuid).unwrap().reference();

    let (session, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(session.runs().len(), 2);
    assert_eq!(session.runs()[0].status(), RunStatus::Completed);
    assert_eq!(session.runs()[1].status(), RunStatus::Completed);
    assert_eq!(session.runs()[1].parent_uuid(), Some(session.runs()[0].uuid()));
    // events appear in the order they were logged, child between the
    // parent's entry and its post-child message
    assert_eq!(
        event_types(sprint.events()),
        vec!["flow_entered", "msg_created", "msg_created"]
    );
    match &sprint.events()[1].payload {
        EventPayload::MsgCreated { msg } => assert_eq!(msg.text, "In the child"),
        other => panic!("expected msg_created, got {other:?}"),
    }
    match &sprint.events()[2].payload {
        EventPayload::MsgCreated { msg } => assert_eq!(msg.text, "Back in the parent"),
        other => panic!("expected msg_created, got {other:?}"),
    }
}

#[test]
fn test_airtime_without_service_records_failure_result() {
    let flow_uuid = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Airtime",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "transfer_airtime",
                "uuid": Uuid::new_v4(),
                "amounts": {"USD": 1.5},
                "result_name": "Reward"
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });
    let assets = assets_with(vec![flow]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    let (session, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    assert_eq!(session.status(), SessionStatus::Completed);
    assert_eq!(event_types(sprint.events()), vec!["error", "run_result_changed"]);
    let result = session.runs()[0].results().get("Reward").unwrap();
    assert_eq!(result.value, "0");
    assert_eq!(result.category.as_deref(), Some("Failure"));
}

#[test]
fn test_large_webhook_body_is_omitted() {
    let flow_uuid = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "BigBody",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "call_webhook",
                "uuid": Uuid::new_v4(),
                "method": "GET",
                "url": "http://example.com/big",
                "result_name": "Lookup"
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });
    let assets = assets_with(vec![flow]);
    let reference = assets.flow(flow_uuid).unwrap().reference();

    init_logging();
    let big: &'static str = Box::leak(format!("{{\"data\":\"{}\"}}", "x".repeat(20_000)).into_boxed_str());
    let engine = Engine::builder()
        .with_webhook_service(Box::new(StubWebhook { status: 200, body: Some(big) }))
        .build();
    let (session, _) = engine
        .start_session(&assets, Environment::default(), contact(), &reference)
        .unwrap();

    let result = session.runs()[0].results().get("Lookup").unwrap();
    assert_eq!(result.value, "200");
    assert_eq!(result.category.as_deref(), Some("Success"));
    // over-limit bodies are dropped whole, so there is no extra to keep
    assert!(result.extra.is_none());
}

#[test]
fn test_empty_attachment_is_dropped_with_error() {
    let flow_uuid = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Attachments",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "send_msg",
                "uuid": Uuid::new_v4(),
                "text": "Here you go",
                "attachments": ["image:http://example.com/cat.jpg", "  "],
                "quick_replies": ["Thanks", ""]
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });
    let assets = assets_with(vec![flow]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    let (_, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    assert_eq!(event_types(sprint.events()), vec!["error", "error", "msg_created"]);
    match &sprint.events()[0].payload {
        EventPayload::Error { text } => {
            assert_eq!(text, "attachment text evaluated to empty string, skipping")
        }
        other => panic!("expected error, got {other:?}"),
    }
    match &sprint.events()[1].payload {
        EventPayload::Error { text } => {
            assert_eq!(text, "quick reply evaluated to empty string, skipping")
        }
        other => panic!("expected error, got {other:?}"),
    }
    match &sprint.events()[2].payload {
        EventPayload::MsgCreated { msg } => {
            assert_eq!(msg.attachments, vec!["image:http://example.com/cat.jpg"]);
            assert_eq!(msg.quick_replies, vec!["Thanks"]);
        }
        other => panic!("expected msg_created, got {other:?}"),
    }
}

#[test]
fn test_broadcast_carries_attachments_and_quick_replies() {
    let flow_uuid = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Broadcast",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "send_broadcast",
                "uuid": Uuid::new_v4(),
                "text": "Hi everybody",
                "attachments": ["image:http://example.com/dog.jpg"],
                "quick_replies": ["Yes", "No"],
                "urns": ["tel:+12065551213"]
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });
    let assets = assets_with(vec![flow]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    let (_, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    assert_eq!(event_types(sprint.events()), vec!["broadcast_created"]);
    match &sprint.events()[0].payload {
        EventPayload::BroadcastCreated { text, attachments, quick_replies, urns, .. } => {
            assert_eq!(text, "Hi everybody");
            assert_eq!(attachments, &vec!["image:http://example.com/dog.jpg".to_string()]);
            assert_eq!(quick_replies, &vec!["Yes".to_string(), "No".to_string()]);
            assert_eq!(urns.len(), 1);
        }
        other => panic!("expected broadcast_created, got {other:?}"),
    }
}

#[test]
fn test_unmatched_group_name_is_a_plain_error() {
    let flow_uuid = Uuid::new_v4();
    let flow = json!({
        "uuid": flow_uuid,
        "name": "Groups",
        "language": "eng",
        "nodes": [{
            "uuid": Uuid::new_v4(),
            "actions": [{
                "type": "add_contact_groups",
                "uuid": Uuid::new_v4(),
                "groups": [{"name_match": "{{contact.name}} Fans"}]
            }],
            "exits": [{"uuid": Uuid::new_v4()}]
        }]
    });
    let assets = assets_with(vec![flow]);
    let flow = assets.flow(flow_uuid).unwrap().reference();

    let (_, sprint) = engine()
        .start_session(&assets, Environment::default(), contact(), &flow)
        .unwrap();

    // a runtime name miss is an ordinary error, not a broken flow dependency
    assert_eq!(event_types(sprint.events()), vec!["error"]);
    match &sprint.events()[0].payload {
        EventPayload::Error { text } => assert_eq!(text, "no such group with name 'Bob Fans'"),
        other => panic!("expected error, got {other:?}"),
    }
}

#[test]
fn test_call_webhook_validation() {
    let action = CallWebhookAction {
        uuid: Uuid::new_v4(),
        method: "FETCH".to_string(),
        url: "http://example.com".to_string(),
        headers: HashMap::new(),
        body: None,
        result_name: None,
    };
    assert!(rivulet::actions::Action::validate(&action).is_err());
}
