//! Hierarchy traversal and role-based read scoping.
//!
//! The scoping rule is applied uniformly across every component:
//! ADMIN sees the subtree under its own organization (a Minister admin sees
//! everything), PLANNER sees only its own organizations, EVALUATOR is
//! unrestricted unless the caller explicitly narrows to its own
//! organizations for personal-dashboard views.

use std::collections::{HashMap, HashSet};
use tracing::{error, info};

use super::{OrgId, OrgRole, Organization, OrganizationType, UserContext};
use crate::shared::error::{PlanningError, Result};

/// Immutable view of the organization hierarchy.
pub struct OrgTree {
    types: HashMap<OrgId, OrganizationType>,
    children: HashMap<OrgId, Vec<OrgId>>,
}

impl OrgTree {
    pub fn from_orgs<'a, I>(orgs: I) -> Self
    where
        I: IntoIterator<Item = &'a Organization>,
    {
        let mut types = HashMap::new();
        let mut children: HashMap<OrgId, Vec<OrgId>> = HashMap::new();
        for org in orgs {
            types.insert(org.id, org.org_type);
            if let Some(parent) = org.parent {
                children.entry(parent).or_default().push(org.id);
            }
        }
        Self { types, children }
    }

    pub fn contains(&self, org: OrgId) -> bool {
        self.types.contains_key(&org)
    }

    pub fn is_minister(&self, org: OrgId) -> bool {
        self.types.get(&org) == Some(&OrganizationType::Minister)
    }

    /// The organization plus every transitive child, via explicit worklist
    /// traversal. Each node has a single parent pointer, so reaching a node
    /// twice means the parent graph has a cycle; that is a data-integrity
    /// bug, reported as `CorruptHierarchy` instead of looping forever.
    pub fn descendants(&self, root: OrgId) -> Result<HashSet<OrgId>> {
        if !self.contains(root) {
            return Err(PlanningError::NotFound("organization"));
        }

        let mut visited = HashSet::new();
        let mut stack = vec![root];
        while let Some(org) = stack.pop() {
            if !visited.insert(org) {
                error!(organization = %org, "organization hierarchy contains a cycle");
                return Err(PlanningError::CorruptHierarchy(org));
            }
            if let Some(kids) = self.children.get(&org) {
                stack.extend(kids.iter().copied());
            }
        }
        Ok(visited)
    }

    /// Resolve the set of organizations the caller may read, per role.
    /// `own_orgs_only` narrows an evaluator to its own organizations.
    pub fn visible_orgs(&self, ctx: &UserContext, own_orgs_only: bool) -> Result<OrgScope> {
        // Role precedence mirrors the source system: admin wins, then
        // evaluator, then planner.
        if let Some(admin_org) = ctx.orgs_with_role(OrgRole::Admin).first().copied() {
            if self.is_minister(admin_org) {
                info!(user = %ctx.user_id, "minister admin, scoping bypassed");
                return Ok(OrgScope::All);
            }
            let subtree = self.descendants(admin_org)?;
            info!(user = %ctx.user_id, orgs = subtree.len(), "admin scoped to subtree");
            return Ok(OrgScope::Only(subtree));
        }

        if ctx.has_role(OrgRole::Evaluator) {
            if own_orgs_only {
                return Ok(OrgScope::Only(ctx.org_ids().into_iter().collect()));
            }
            return Ok(OrgScope::All);
        }

        if ctx.has_role(OrgRole::Planner) {
            return Ok(OrgScope::Only(
                ctx.orgs_with_role(OrgRole::Planner).into_iter().collect(),
            ));
        }

        // No recognized role: no access.
        Ok(OrgScope::Only(HashSet::new()))
    }
}

/// Outcome of a scope resolution.
#[derive(Debug, Clone)]
pub enum OrgScope {
    All,
    Only(HashSet<OrgId>),
}

impl OrgScope {
    pub fn permits(&self, org: OrgId) -> bool {
        match self {
            Self::All => true,
            Self::Only(orgs) => orgs.contains(&org),
        }
    }

    /// Default/shared items (no owning organization) are visible to everyone.
    pub fn permits_opt(&self, org: Option<OrgId>) -> bool {
        org.map(|o| self.permits(o)).unwrap_or(true)
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::All)
    }
}
