//! Users, capabilities and the action history carried by auditable entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SlotbaseError};

pub const SAVE_DOCUMENT: &str = "save_document";
pub const SET_WRITABILITY: &str = "set_writability";
pub const SET_VISIBILITY: &str = "set_visibility";

// ------------- Users -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    permissions: Vec<String>,
}
impl Group {
    pub fn new<I, S>(name: &str, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_owned(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    name: String,
    groups: Vec<Group>,
}
impl User {
    pub fn new(name: &str, groups: Vec<Group>) -> Self {
        Self {
            name: name.to_owned(),
            groups,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
    fn holds(&self, capability: &str) -> bool {
        self.groups
            .iter()
            .any(|g| g.permissions.iter().any(|p| p == capability))
    }
}

// ------------- History -------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    #[serde(rename = "c")]
    Create,
    #[serde(rename = "m")]
    Modify,
    #[serde(rename = "d")]
    Delete,
    #[serde(rename = "r")]
    ReadOnly,
    #[serde(rename = "w")]
    Writable,
    #[serde(rename = "h")]
    Hide,
    #[serde(rename = "s")]
    Show,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub user: String,
    pub event: Event,
    pub timestamp: DateTime<Utc>,
}
impl Action {
    pub fn new(user: &User, event: Event) -> Self {
        Self {
            user: user.name.clone(),
            event,
            timestamp: Utc::now(),
        }
    }
}

/// An entity carrying an append-only list of actions.
pub trait Historical {
    fn history(&self) -> &[Action];
    fn history_mut(&mut self) -> &mut Vec<Action>;

    /// Whoever acted on the entity first.
    fn creator(&self) -> Option<&str> {
        self.history().first().map(|a| a.user.as_str())
    }
    /// The latest writability toggle decides.
    fn is_readonly(&self) -> bool {
        self.history()
            .iter()
            .rev()
            .find_map(|a| match a.event {
                Event::ReadOnly => Some(true),
                Event::Writable => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
    /// The latest visibility toggle decides.
    fn is_hidden(&self) -> bool {
        self.history()
            .iter()
            .rev()
            .find_map(|a| match a.event {
                Event::Hide => Some(true),
                Event::Show => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }
}

// ------------- Auditor -------------
/// Decides what a user may do and records what they did.
#[derive(Debug, Clone)]
pub struct Auditor {
    admin_groups: Vec<String>,
}
impl Default for Auditor {
    fn default() -> Self {
        Self::new(vec!["admin".to_owned()])
    }
}
impl Auditor {
    pub fn new(admin_groups: Vec<String>) -> Self {
        Self { admin_groups }
    }
    pub fn is_admin(&self, user: &User) -> bool {
        user.groups
            .iter()
            .any(|g| self.admin_groups.iter().any(|a| *a == g.name))
    }
    pub fn can_any(&self, user: &User, capabilities: &[&str]) -> bool {
        self.is_admin(user) || capabilities.iter().any(|c| user.holds(c))
    }
    pub fn can_all(&self, user: &User, capabilities: &[&str]) -> bool {
        self.is_admin(user) || capabilities.iter().all(|c| user.holds(c))
    }
    pub fn authorize(&self, user: &User, capabilities: &[&str]) -> Result<()> {
        if self.can_any(user, capabilities) {
            Ok(())
        } else {
            Err(SlotbaseError::PermissionDenied {
                user: user.name.clone(),
                required: capabilities.iter().map(|c| c.to_string()).collect(),
            })
        }
    }
    /// Checks that `user` may save `entity` without touching its history.
    pub fn permit<H>(&self, user: &User, entity: &H, modify_writability: bool) -> Result<()>
    where
        H: Historical,
    {
        if entity.is_readonly() && !(modify_writability && self.can_any(user, &[SET_WRITABILITY])) {
            return Err(SlotbaseError::PermissionDenied {
                user: user.name.clone(),
                required: vec![SET_WRITABILITY.to_owned()],
            });
        }
        self.authorize(user, &[SAVE_DOCUMENT])
    }
    /// Appends a create or modify action, depending on whether the entity has history.
    pub fn record<H>(&self, user: &User, entity: &mut H, modify_writability: bool) -> Result<Event>
    where
        H: Historical,
    {
        self.permit(user, &*entity, modify_writability)?;
        let event = if entity.history().is_empty() {
            Event::Create
        } else {
            Event::Modify
        };
        debug!(user = %user.name, ?event, "recording action");
        entity.history_mut().push(Action::new(user, event));
        Ok(event)
    }
    pub fn set_readonly<H: Historical>(&self, user: &User, entity: &mut H) -> Result<()> {
        self.toggle(user, entity, SET_WRITABILITY, Event::ReadOnly, true)
    }
    pub fn set_writable<H: Historical>(&self, user: &User, entity: &mut H) -> Result<()> {
        self.toggle(user, entity, SET_WRITABILITY, Event::Writable, true)
    }
    /// Does nothing when the entity is already hidden.
    pub fn hide<H: Historical>(&self, user: &User, entity: &mut H) -> Result<()> {
        self.authorize(user, &[SET_VISIBILITY])?;
        if entity.is_hidden() {
            return Ok(());
        }
        self.toggle(user, entity, SET_VISIBILITY, Event::Hide, false)
    }
    /// Does nothing when the entity is already shown.
    pub fn show<H: Historical>(&self, user: &User, entity: &mut H) -> Result<()> {
        self.authorize(user, &[SET_VISIBILITY])?;
        if !entity.is_hidden() {
            return Ok(());
        }
        self.toggle(user, entity, SET_VISIBILITY, Event::Show, false)
    }
    fn toggle<H: Historical>(
        &self,
        user: &User,
        entity: &mut H,
        capability: &str,
        event: Event,
        modify_writability: bool,
    ) -> Result<()> {
        self.authorize(user, &[capability])?;
        self.record(user, entity, modify_writability)?;
        entity.history_mut().push(Action::new(user, event));
        Ok(())
    }
}
