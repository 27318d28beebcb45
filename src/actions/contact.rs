use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::{FieldReference, GroupReference};
use crate::contact::{ContactStatus, Urn};
use crate::events::EventPayload;
use crate::modifiers::{
    FieldModifier, GroupsModification, GroupsModifier, LanguageModifier, NameModifier, StatusModifier,
    TimezoneModifier, UrnsModification, UrnsModifier,
};
use crate::run::RunContext;

use super::{resolve_groups, Action};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContactStatusAction {
    pub uuid: Uuid,
    pub status: ContactStatus,
}

#[typetag::serde(name = "set_contact_status")]
impl Action for SetContactStatusAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn execute(&self, ctx: &mut RunContext) {
        ctx.apply_modifier(Box::new(StatusModifier { status: self.status }));
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Sets a contact field to the evaluated value, clearing it when the value
/// evaluates to empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContactFieldAction {
    pub uuid: Uuid,
    pub field: FieldReference,
    pub value: String,
}

#[typetag::serde(name = "set_contact_field")]
impl Action for SetContactFieldAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.field.key.is_empty() {
            return Err("field key is required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        if ctx.assets().field(&self.field.key).is_none() {
            ctx.log_event(EventPayload::DependencyMissing {
                reference: serde_json::json!({ "type": "field", "key": self.field.key }),
            });
            return;
        }
        let value = ctx.evaluate_logged(&self.value);
        let value = value.trim();
        let value = if value.is_empty() { None } else { Some(value.to_string()) };
        ctx.apply_modifier(Box::new(FieldModifier { field: self.field.clone(), value }));
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContactNameAction {
    pub uuid: Uuid,
    pub name: String,
}

#[typetag::serde(name = "set_contact_name")]
impl Action for SetContactNameAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn execute(&self, ctx: &mut RunContext) {
        let name = ctx.evaluate_logged(&self.name).trim().to_string();
        ctx.apply_modifier(Box::new(NameModifier { name }));
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Sets the contact language. An empty evaluated value clears it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContactLanguageAction {
    pub uuid: Uuid,
    pub language: String,
}

#[typetag::serde(name = "set_contact_language")]
impl Action for SetContactLanguageAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn execute(&self, ctx: &mut RunContext) {
        let language = ctx.evaluate_logged(&self.language).trim().to_string();
        let language = if language.is_empty() { None } else { Some(language) };
        ctx.apply_modifier(Box::new(LanguageModifier { language }));
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetContactTimezoneAction {
    pub uuid: Uuid,
    pub timezone: String,
}

#[typetag::serde(name = "set_contact_timezone")]
impl Action for SetContactTimezoneAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn execute(&self, ctx: &mut RunContext) {
        let timezone = ctx.evaluate_logged(&self.timezone).trim().to_string();
        let timezone = if timezone.is_empty() { None } else { Some(timezone) };
        ctx.apply_modifier(Box::new(TimezoneModifier { timezone }));
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddContactGroupsAction {
    pub uuid: Uuid,
    pub groups: Vec<GroupReference>,
}

#[typetag::serde(name = "add_contact_groups")]
impl Action for AddContactGroupsAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.groups.is_empty() {
            return Err("groups are required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        let groups = resolve_groups(ctx, &self.groups);
        if !groups.is_empty() {
            ctx.apply_modifier(Box::new(GroupsModifier { groups, modification: GroupsModification::Add }));
        }
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveContactGroupsAction {
    pub uuid: Uuid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupReference>,
    /// Removes the contact from every static group instead of a named set.
    #[serde(default)]
    pub all_groups: bool,
}

#[typetag::serde(name = "remove_contact_groups")]
impl Action for RemoveContactGroupsAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.groups.is_empty() && !self.all_groups {
            return Err("groups are required unless all_groups is set".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        let groups = if self.all_groups {
            ctx.assets().groups().iter().filter(|g| !g.is_dynamic()).map(|g| g.reference()).collect()
        } else {
            resolve_groups(ctx, &self.groups)
        };
        if !groups.is_empty() {
            ctx.apply_modifier(Box::new(GroupsModifier { groups, modification: GroupsModification::Remove }));
        }
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}

/// Adds a URN built from a fixed scheme and an evaluated path template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddContactUrnAction {
    pub uuid: Uuid,
    pub scheme: String,
    pub path: String,
}

#[typetag::serde(name = "add_contact_urn")]
impl Action for AddContactUrnAction {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn validate(&self) -> Result<(), String> {
        if self.scheme.is_empty() {
            return Err("scheme is required".to_string());
        }
        if self.path.is_empty() {
            return Err("path is required".to_string());
        }
        Ok(())
    }

    fn execute(&self, ctx: &mut RunContext) {
        let path = ctx.evaluate_logged(&self.path).trim().to_string();
        if path.is_empty() {
            ctx.log_event(EventPayload::Error { text: "URN path evaluated to empty string, skipping".to_string() });
            return;
        }
        match Urn::from_parts(&self.scheme, &path) {
            Ok(urn) => ctx.apply_modifier(Box::new(UrnsModifier {
                urns: vec![urn],
                modification: UrnsModification::Append,
            })),
            Err(e) => ctx.log_event(EventPayload::Error { text: format!("unable to add URN: {e}") }),
        }
    }

    fn clone_box(&self) -> Box<dyn Action> {
        Box::new(self.clone())
    }
}
