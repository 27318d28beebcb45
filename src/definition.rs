use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::actions::Action;
use crate::assets::FlowReference;
use crate::localization::Localization;
use crate::routers::Router;

/// Structural problems caught at load time, before any execution.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("unable to read flow definition: {0}")]
    Read(String),
    #[error("action {uuid} in node {node}: {reason}")]
    Action { node: Uuid, uuid: Uuid, reason: String },
    #[error("router in node {node}: {reason}")]
    Router { node: Uuid, reason: String },
    #[error("exit {uuid} in node {node}: destination {destination} is not a node in this flow")]
    ExitDestination { node: Uuid, uuid: Uuid, destination: Uuid },
    #[error("node {node}: a router is required when there is more than one exit")]
    MissingRouter { node: Uuid },
    #[error("flow {flow} has no nodes")]
    Empty { flow: Uuid },
}

/// A branch destination: the next node to visit, or nothing (terminal).
#[derive(Debug, Serialize, Deserialize)]
pub struct Exit {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_uuid: Option<Uuid>,
}

/// A static definition unit: ordered actions, an optional router, ordered
/// exits. Immutable once loaded.
#[derive(Debug, Serialize, Deserialize)]
pub struct Node {
    uuid: Uuid,
    #[serde(default)]
    actions: Vec<Box<dyn Action>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    router: Option<Box<dyn Router>>,
    #[serde(default)]
    exits: Vec<Exit>,
}

impl Node {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn actions(&self) -> &[Box<dyn Action>] {
        &self.actions
    }

    pub fn router(&self) -> Option<&dyn Router> {
        self.router.as_deref()
    }

    pub fn exits(&self) -> &[Exit] {
        &self.exits
    }

    pub fn exit(&self, uuid: Uuid) -> Option<&Exit> {
        self.exits.iter().find(|e| e.uuid == uuid)
    }

    fn validate(&self, flow: &Flow) -> Result<(), ValidationError> {
        for action in &self.actions {
            action
                .validate()
                .map_err(|reason| ValidationError::Action { node: self.uuid, uuid: action.uuid(), reason })?;
        }

        if let Some(router) = &self.router {
            router
                .validate(&self.exits)
                .map_err(|reason| ValidationError::Router { node: self.uuid, reason })?;
        } else if self.exits.len() > 1 {
            return Err(ValidationError::MissingRouter { node: self.uuid });
        }

        for exit in &self.exits {
            if let Some(destination) = exit.destination_uuid {
                if flow.node(destination).is_none() {
                    return Err(ValidationError::ExitDestination {
                        node: self.uuid,
                        uuid: exit.uuid,
                        destination,
                    });
                }
            }
        }

        Ok(())
    }
}

/// A complete flow definition. Traversal always enters at the first node.
#[derive(Debug, Serialize, Deserialize)]
pub struct Flow {
    uuid: Uuid,
    name: String,
    /// Base language of the authored text; localization tables override it.
    language: String,
    #[serde(default)]
    localization: Localization,
    nodes: Vec<Node>,
}

impl Flow {
    /// Reads and validates a flow definition from JSON text.
    pub fn from_json(json: &str) -> Result<Flow, ValidationError> {
        let flow: Flow = serde_json::from_str(json).map_err(|e| ValidationError::Read(e.to_string()))?;
        flow.validate()?;
        Ok(flow)
    }

    /// Reads and validates a flow definition from an already-parsed value.
    pub fn from_value(value: Value) -> Result<Flow, ValidationError> {
        let flow: Flow = serde_json::from_value(value).map_err(|e| ValidationError::Read(e.to_string()))?;
        flow.validate()?;
        Ok(flow)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn localization(&self) -> &Localization {
        &self.localization
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, uuid: Uuid) -> Option<&Node> {
        self.nodes.iter().find(|n| n.uuid == uuid)
    }

    pub fn entry_node(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn reference(&self) -> FlowReference {
        FlowReference { uuid: self.uuid, name: self.name.clone() }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nodes.is_empty() {
            return Err(ValidationError::Empty { flow: self.uuid });
        }
        for node in &self.nodes {
            node.validate(self)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reads_type_tagged_actions_and_routers() {
        let category = Uuid::new_v4();
        let exit = Uuid::new_v4();
        let flow = Flow::from_value(json!({
            "uuid": Uuid::new_v4(),
            "name": "Tagged",
            "language": "eng",
            "nodes": [{
                "uuid": Uuid::new_v4(),
                "actions": [{
                    "type": "send_msg",
                    "uuid": Uuid::new_v4(),
                    "text": "Hi there"
                }],
                "router": {
                    "type": "switch",
                    "operand": "{{input.text}}",
                    "cases": [],
                    "categories": [{"uuid": category, "name": "All", "exit_uuid": exit}],
                    "default_category_uuid": category
                },
                "exits": [{"uuid": exit}]
            }]
        }))
        .unwrap();

        let node = flow.entry_node().unwrap();
        assert_eq!(node.actions().len(), 1);
        assert!(node.router().is_some());

        // the tag survives serialization so stored definitions reload
        let json = serde_json::to_value(&flow).unwrap();
        assert_eq!(json["nodes"][0]["actions"][0]["type"], "send_msg");
        assert_eq!(json["nodes"][0]["router"]["type"], "switch");
        Flow::from_value(json).unwrap();
    }

    #[test]
    fn test_rejects_empty_flow() {
        let err = Flow::from_value(json!({
            "uuid": Uuid::new_v4(),
            "name": "Empty",
            "language": "eng",
            "nodes": []
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::Empty { .. }));
    }

    #[test]
    fn test_rejects_unknown_exit_destination() {
        let err = Flow::from_value(json!({
            "uuid": Uuid::new_v4(),
            "name": "Broken",
            "language": "eng",
            "nodes": [{
                "uuid": Uuid::new_v4(),
                "actions": [],
                "exits": [{"uuid": Uuid::new_v4(), "destination_uuid": Uuid::new_v4()}]
            }]
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::ExitDestination { .. }));
    }

    #[test]
    fn test_rejects_multiple_exits_without_router() {
        let err = Flow::from_value(json!({
            "uuid": Uuid::new_v4(),
            "name": "Broken",
            "language": "eng",
            "nodes": [{
                "uuid": Uuid::new_v4(),
                "actions": [],
                "exits": [
                    {"uuid": Uuid::new_v4()},
                    {"uuid": Uuid::new_v4()}
                ]
            }]
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::MissingRouter { .. }));
    }

    #[test]
    fn test_unknown_action_type_is_a_read_error() {
        let err = Flow::from_value(json!({
            "uuid": Uuid::new_v4(),
            "name": "Broken",
            "language": "eng",
            "nodes": [{
                "uuid": Uuid::new_v4(),
                "actions": [{"type": "does_not_exist", "uuid": Uuid::new_v4()}],
                "exits": [{"uuid": Uuid::new_v4()}]
            }]
        }))
        .unwrap_err();
        assert!(matches!(err, ValidationError::Read(_)));
    }
}
