use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::assets::{FieldReference, GroupReference, SessionAssets};
use crate::contact::{Contact, ContactStatus, Urn};
use crate::envs::Environment;
use crate::events::{Event, EventPayload};

/// Defensive cap on dynamic-group re-evaluation passes. Group queries may
/// not reference membership, so a fixed point is normally reached after the
/// first full pass.
const MAX_REEVALUATION_PASSES: usize = 10;

/// A describable, atomic contact mutation. Applying a modifier when the
/// contact already reflects the target state is a no-op and emits no event;
/// otherwise the mutation happens and exactly one corresponding event is
/// emitted before any cascading group-membership events.
#[typetag::serde(tag = "type")]
pub trait Modifier: Debug + Send + Sync {
    fn apply(&self, env: &Environment, assets: &SessionAssets, contact: &mut Contact, log: &mut dyn FnMut(Event));

    fn clone_box(&self) -> Box<dyn Modifier>;
}

impl Clone for Box<dyn Modifier> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Re-runs every dynamic group's membership test against the post-mutation
/// contact snapshot, emitting a `contact_groups_changed` event per pass that
/// changed anything, until a fixed point (or the defensive cap) is reached.
pub(crate) fn reevaluate_dynamic_groups(
    assets: &SessionAssets,
    contact: &mut Contact,
    log: &mut dyn FnMut(Event),
) {
    for _ in 0..MAX_REEVALUATION_PASSES {
        let mut added: Vec<GroupReference> = Vec::new();
        let mut removed: Vec<GroupReference> = Vec::new();

        for group in assets.groups() {
            let query = match &group.query {
                Some(query) => query,
                None => continue,
            };
            let should_belong = query.matches(contact);
            if should_belong && contact.add_to_group(group.uuid) {
                added.push(group.reference());
            } else if !should_belong && contact.remove_from_group(group.uuid) {
                removed.push(group.reference());
            }
        }

        if added.is_empty() && removed.is_empty() {
            return;
        }
        log(Event::new(EventPayload::ContactGroupsChanged {
            groups_added: added,
            groups_removed: removed,
        }));
    }
}

/// Modifies the status of a contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusModifier {
    pub status: ContactStatus,
}

#[typetag::serde(name = "status")]
impl Modifier for StatusModifier {
    fn apply(&self, _env: &Environment, assets: &SessionAssets, contact: &mut Contact, log: &mut dyn FnMut(Event)) {
        if contact.status() != self.status {
            contact.set_status(self.status);
            log(Event::new(EventPayload::ContactStatusChanged { status: self.status }));
            reevaluate_dynamic_groups(assets, contact, log);
        }
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}

/// Sets or clears the value of a contact field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldModifier {
    pub field: FieldReference,
    pub value: Option<String>,
}

#[typetag::serde(name = "field")]
impl Modifier for FieldModifier {
    fn apply(&self, _env: &Environment, assets: &SessionAssets, contact: &mut Contact, log: &mut dyn FnMut(Event)) {
        let current = contact.field(&self.field.key).map(|v| v.to_string());
        if current == self.value {
            return;
        }
        contact.set_field(self.field.key.clone(), self.value.clone());
        log(Event::new(EventPayload::ContactFieldChanged {
            field: self.field.clone(),
            value: self.value.clone(),
        }));
        reevaluate_dynamic_groups(assets, contact, log);
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameModifier {
    pub name: String,
}

#[typetag::serde(name = "name")]
impl Modifier for NameModifier {
    fn apply(&self, _env: &Environment, assets: &SessionAssets, contact: &mut Contact, log: &mut dyn FnMut(Event)) {
        if contact.name() == self.name {
            return;
        }
        contact.set_name(self.name.clone());
        log(Event::new(EventPayload::ContactNameChanged { name: self.name.clone() }));
        reevaluate_dynamic_groups(assets, contact, log);
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageModifier {
    pub language: Option<String>,
}

#[typetag::serde(name = "language")]
impl Modifier for LanguageModifier {
    fn apply(&self, _env: &Environment, assets: &SessionAssets, contact: &mut Contact, log: &mut dyn FnMut(Event)) {
        if contact.language() == self.language.as_deref() {
            return;
        }
        contact.set_language(self.language.clone());
        log(Event::new(EventPayload::ContactLanguageChanged { language: self.language.clone() }));
        reevaluate_dynamic_groups(assets, contact, log);
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneModifier {
    pub timezone: Option<String>,
}

#[typetag::serde(name = "timezone")]
impl Modifier for TimezoneModifier {
    fn apply(&self, _env: &Environment, assets: &SessionAssets, contact: &mut Contact, log: &mut dyn FnMut(Event)) {
        if contact.timezone() == self.timezone.as_deref() {
            return;
        }
        contact.set_timezone(self.timezone.clone());
        log(Event::new(EventPayload::ContactTimezoneChanged { timezone: self.timezone.clone() }));
        reevaluate_dynamic_groups(assets, contact, log);
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupsModification {
    Add,
    Remove,
}

/// Adds the contact to, or removes it from, a set of static groups.
/// Dynamic groups are skipped; their membership is query-driven only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsModifier {
    pub groups: Vec<GroupReference>,
    pub modification: GroupsModification,
}

#[typetag::serde(name = "groups")]
impl Modifier for GroupsModifier {
    fn apply(&self, _env: &Environment, assets: &SessionAssets, contact: &mut Contact, log: &mut dyn FnMut(Event)) {
        let mut added: Vec<GroupReference> = Vec::new();
        let mut removed: Vec<GroupReference> = Vec::new();

        for reference in &self.groups {
            let group = match reference.uuid.and_then(|uuid| assets.group(uuid)) {
                Some(group) => group,
                None => continue,
            };
            if group.is_dynamic() {
                continue;
            }
            match self.modification {
                GroupsModification::Add => {
                    if contact.add_to_group(group.uuid) {
                        added.push(group.reference());
                    }
                }
                GroupsModification::Remove => {
                    if contact.remove_from_group(group.uuid) {
                        removed.push(group.reference());
                    }
                }
            }
        }

        if added.is_empty() && removed.is_empty() {
            return;
        }
        log(Event::new(EventPayload::ContactGroupsChanged {
            groups_added: added,
            groups_removed: removed,
        }));
        reevaluate_dynamic_groups(assets, contact, log);
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrnsModification {
    Append,
    Remove,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrnsModifier {
    pub urns: Vec<Urn>,
    pub modification: UrnsModification,
}

#[typetag::serde(name = "urns")]
impl Modifier for UrnsModifier {
    fn apply(&self, _env: &Environment, assets: &SessionAssets, contact: &mut Contact, log: &mut dyn FnMut(Event)) {
        let mut changed = false;
        for urn in &self.urns {
            changed |= match self.modification {
                UrnsModification::Append => contact.add_urn(urn.clone()),
                UrnsModification::Remove => contact.remove_urn(urn),
            };
        }
        if !changed {
            return;
        }
        log(Event::new(EventPayload::ContactUrnsChanged { urns: contact.urns().to_vec() }));
        reevaluate_dynamic_groups(assets, contact, log);
    }

    fn clone_box(&self) -> Box<dyn Modifier> {
        Box::new(self.clone())
    }
}
