//! Organization Directory Module
//!
//! Holds the self-referential organization hierarchy and the role
//! assignments that drive read-scoping across the whole engine.

pub mod scope;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::shared::error::{PlanningError, Result};

pub use scope::{OrgScope, OrgTree};

pub type OrgId = Uuid;

// ============================================================================
// Organization Types
// ============================================================================

/// Position of an organization in the national structure. Only `Minister`
/// carries engine semantics (it bypasses all hierarchy scoping); the rest
/// are labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrganizationType {
    Minister,
    StateMinister,
    ChiefExecutive,
    LeadExecutive,
    ExecutiveWing,
    Desk,
    Team,
}

/// Organization entity. The parent pointer forms a tree; a cycle in it is
/// data corruption and is surfaced as `CorruptHierarchy` by traversals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub org_type: OrganizationType,
    pub parent: Option<OrgId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: &str, org_type: OrganizationType, parent: Option<OrgId>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            org_type,
            parent,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_minister(&self) -> bool {
        self.org_type == OrganizationType::Minister
    }
}

// ============================================================================
// Roles and User Context
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgRole {
    Admin,
    Planner,
    Evaluator,
}

/// Opaque caller identity supplied by the (out-of-scope) auth layer: who the
/// user is and which role they hold in which organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: Uuid,
    pub org_roles: Vec<(OrgId, OrgRole)>,
}

impl UserContext {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            org_roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, org: OrgId, role: OrgRole) -> Self {
        self.org_roles.push((org, role));
        self
    }

    pub fn has_role(&self, role: OrgRole) -> bool {
        self.org_roles.iter().any(|(_, r)| *r == role)
    }

    /// Organizations in which the user holds the given role.
    pub fn orgs_with_role(&self, role: OrgRole) -> Vec<OrgId> {
        self.org_roles
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(org, _)| *org)
            .collect()
    }

    pub fn org_ids(&self) -> Vec<OrgId> {
        self.org_roles.iter().map(|(org, _)| *org).collect()
    }

    /// First organization the user belongs to, mirroring the "first
    /// membership wins" rule used throughout plan ownership checks.
    pub fn primary_org(&self) -> Option<OrgId> {
        self.org_roles.first().map(|(org, _)| *org)
    }

    pub fn role_in(&self, org: OrgId) -> Option<OrgRole> {
        self.org_roles
            .iter()
            .find(|(o, _)| *o == org)
            .map(|(_, r)| *r)
    }

    /// Evaluator duties may be carried by an ADMIN as well.
    pub fn can_evaluate(&self) -> bool {
        self.has_role(OrgRole::Evaluator) || self.has_role(OrgRole::Admin)
    }
}

// ============================================================================
// Directory Service
// ============================================================================

/// In-memory organization registry. Reads are lock-free once a tree snapshot
/// is taken; traversal itself never touches the store.
#[derive(Clone, Default)]
pub struct DirectoryService {
    orgs: Arc<RwLock<HashMap<OrgId, Organization>>>,
}

impl DirectoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, org: Organization) -> Organization {
        let mut orgs = self.orgs.write().await;
        orgs.insert(org.id, org.clone());
        org
    }

    pub async fn create(
        &self,
        name: &str,
        org_type: OrganizationType,
        parent: Option<OrgId>,
    ) -> Result<Organization> {
        if name.trim().is_empty() {
            return Err(PlanningError::MissingField("organization name"));
        }
        if let Some(parent_id) = parent {
            let orgs = self.orgs.read().await;
            if !orgs.contains_key(&parent_id) {
                return Err(PlanningError::NotFound("parent organization"));
            }
        }
        Ok(self.register(Organization::new(name, org_type, parent)).await)
    }

    pub async fn get(&self, id: OrgId) -> Result<Organization> {
        let orgs = self.orgs.read().await;
        orgs.get(&id)
            .cloned()
            .ok_or(PlanningError::NotFound("organization"))
    }

    pub async fn list(&self) -> Vec<Organization> {
        let orgs = self.orgs.read().await;
        let mut all: Vec<_> = orgs.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Immutable snapshot of the hierarchy for traversal and scoping.
    pub async fn tree(&self) -> OrgTree {
        let orgs = self.orgs.read().await;
        OrgTree::from_orgs(orgs.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_requires_existing_parent() {
        let directory = DirectoryService::new();
        let err = directory
            .create("Desk A", OrganizationType::Desk, Some(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanningError::NotFound(_)));

        let minister = directory
            .create("Ministry", OrganizationType::Minister, None)
            .await
            .unwrap();
        let desk = directory
            .create("Desk A", OrganizationType::Desk, Some(minister.id))
            .await
            .unwrap();
        assert_eq!(desk.parent, Some(minister.id));
    }

    #[tokio::test]
    async fn user_context_role_lookup() {
        let org = Uuid::new_v4();
        let ctx = UserContext::new(Uuid::new_v4())
            .with_role(org, OrgRole::Planner)
            .with_role(Uuid::new_v4(), OrgRole::Evaluator);

        assert!(ctx.has_role(OrgRole::Planner));
        assert!(ctx.can_evaluate());
        assert_eq!(ctx.role_in(org), Some(OrgRole::Planner));
        assert_eq!(ctx.orgs_with_role(OrgRole::Planner), vec![org]);
        assert_eq!(ctx.primary_org(), Some(org));
    }
}
