use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::FlowReference;
use crate::events::EventPayload;
use crate::results::ResultValue;
use crate::run::RunContext;

use super::Action;

/// Saves an arbitrary evaluated value as a run result. Values are not
/// validated; any text is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRunResultAction {
    pub uuid: Uuid,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[typetag::serde(name = "set_run_result")]
impl Action for SetRunResultAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        let value = ctx.evaluate_logged(&self.value);
        let category_localized = self.category.as_ref().and_then(|category| {
            let defaults = [category.clone()];
            let localized = ctx.translate(self.uuid, "category", &defaults);
            (localized[0] != *category).then(|| localized[0].clone())
        });
        let node_uuid = ctx.run().current_node_uuid().unwrap_or_else(Uuid::nil);

        ctx.save_result(ResultValue {
            name: self.name.clone(),
            value,
            category: self.category.clone(),
            category_localized,
            node_uuid,
            input: None,
            extra: None,
            created_on: Utc::now(),
        });
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Starts another flow as a child of the current run. When `terminal` is
/// set the parent never resumes after the child completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnterFlowAction {
    pub uuid: Uuid,
    pub flow: FlowReference,
    #[serde(default)]
    pub terminal: bool,
}

#[typetag::serde(name = "enter_flow")]
impl Action for EnterFlowAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn execute(&self, ctx: &mut RunContext) {
        if ctx.assets().flow(self.flow.uuid).is_none() {
            ctx.log_event(EventPayload::DependencyMissing {
                reference: serde_json::json!({ "type": "flow", "uuid": self.flow.uuid, "name": self.flow.name }),
            });
            ctx.fail(format!("missing dependency: flow {}", self.flow.uuid));
            return;
        }

        let parent_run_uuid = Some(ctx.run().uuid());
        ctx.log_event(EventPayload::FlowEntered {
            flow: self.flow.clone(),
            parent_run_uuid,
            terminal: self.terminal,
        });
        ctx.enter_flow(self.flow.clone(), self.terminal);
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}
