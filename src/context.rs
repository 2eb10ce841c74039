//! Session context: who is asking, and which part of the hierarchy they see.
//!
//! Every dashboard and mutation takes a `SessionContext` explicitly; there
//! is no ambient role state.

use crate::error::{AppError, Result};
use crate::models::Cell;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Senior pastor, sees the whole church (default)
    #[default]
    Pastor,
    /// Leader of one network
    NetworkLeader,
    /// Coordinator of one coordination
    Coordinator,
    /// Supervisor attached to one coordination
    Supervisor,
    /// Leader of one cell
    CellLeader,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Pastor => write!(f, "Pastor"),
            Role::NetworkLeader => write!(f, "Network leader"),
            Role::Coordinator => write!(f, "Coordinator"),
            Role::Supervisor => write!(f, "Supervisor"),
            Role::CellLeader => write!(f, "Cell leader"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ViewDashboard,
    SubmitReport,
    DeleteReport,
    RecordMultiplication,
    DeleteMultiplication,
    ImportData,
}

impl Permission {
    fn action(&self) -> &'static str {
        match self {
            Permission::ViewDashboard => "view dashboards",
            Permission::SubmitReport => "submit a weekly report",
            Permission::DeleteReport => "delete a weekly report",
            Permission::RecordMultiplication => "record a multiplication",
            Permission::DeleteMultiplication => "delete a multiplication",
            Permission::ImportData => "import data",
        }
    }
}

/// Part of the hierarchy visible to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", content = "id", rename_all = "snake_case")]
pub enum Scope {
    All,
    Network(Uuid),
    Coordination(Uuid),
    Cell(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub role: Role,
    pub scope: Scope,
}

impl SessionContext {
    /// Whole-church session.
    pub fn pastor() -> Self {
        Self {
            role: Role::Pastor,
            scope: Scope::All,
        }
    }

    /// Pair a role with the id it is scoped to.
    pub fn for_role(role: Role, scope_id: Option<Uuid>) -> Result<Self> {
        let scope = match (role, scope_id) {
            (Role::Pastor, _) => Scope::All,
            (Role::NetworkLeader, Some(id)) => Scope::Network(id),
            (Role::Coordinator | Role::Supervisor, Some(id)) => Scope::Coordination(id),
            (Role::CellLeader, Some(id)) => Scope::Cell(id),
            (role, None) => {
                return Err(AppError::InvalidInput(format!(
                    "{} sessions need a scope id",
                    role
                )))
            }
        };
        Ok(Self { role, scope })
    }

    pub fn permits(&self, permission: Permission) -> bool {
        use Permission::*;
        match self.role {
            Role::Pastor => true,
            Role::NetworkLeader => permission != ImportData,
            Role::Coordinator => matches!(
                permission,
                ViewDashboard
                    | SubmitReport
                    | DeleteReport
                    | RecordMultiplication
                    | DeleteMultiplication
            ),
            Role::Supervisor | Role::CellLeader => {
                matches!(permission, ViewDashboard | SubmitReport)
            }
        }
    }

    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.permits(permission) {
            Ok(())
        } else {
            Err(AppError::NotPermitted {
                role: self.role.to_string(),
                action: permission.action().to_string(),
            })
        }
    }

    /// Whether `cell` (living under `network_id`) is inside this scope.
    pub fn covers(&self, cell: &Cell, network_id: Option<Uuid>) -> bool {
        match self.scope {
            Scope::All => true,
            Scope::Network(id) => network_id == Some(id),
            Scope::Coordination(id) => cell.coordination_id == id,
            Scope::Cell(id) => cell.id == id,
        }
    }

    /// Fail with `NotPermitted` unless `cell` is inside this scope.
    pub fn require_cell(&self, cell: &Cell, network_id: Option<Uuid>) -> Result<()> {
        if self.covers(cell, network_id) {
            Ok(())
        } else {
            Err(AppError::NotPermitted {
                role: self.role.to_string(),
                action: format!("act on cell \"{}\"", cell.name),
            })
        }
    }

    /// Ids of the cells this session can see.
    pub fn visible_cells(&self, snapshot: &Snapshot) -> HashSet<Uuid> {
        let coordinations = self.visible_coordinations(snapshot);
        snapshot
            .cells
            .iter()
            .filter(|c| match self.scope {
                Scope::Cell(id) => c.id == id,
                _ => coordinations.contains(&c.coordination_id),
            })
            .map(|c| c.id)
            .collect()
    }

    fn visible_coordinations(&self, snapshot: &Snapshot) -> HashSet<Uuid> {
        snapshot
            .coordinations
            .iter()
            .filter(|c| match self.scope {
                Scope::All => true,
                Scope::Network(id) => c.network_id == id,
                Scope::Coordination(id) => c.id == id,
                Scope::Cell(cell_id) => snapshot
                    .cells
                    .iter()
                    .any(|cell| cell.id == cell_id && cell.coordination_id == c.id),
            })
            .map(|c| c.id)
            .collect()
    }

    /// Restrict a snapshot to what this session can see.
    ///
    /// Profiles and couples stay whole so names still resolve.
    pub fn scope_snapshot(&self, snapshot: &Snapshot) -> Snapshot {
        if self.scope == Scope::All {
            return snapshot.clone();
        }

        let coordinations = self.visible_coordinations(snapshot);
        let cells = self.visible_cells(snapshot);
        let mut networks: HashSet<Uuid> = snapshot
            .coordinations
            .iter()
            .filter(|c| coordinations.contains(&c.id))
            .map(|c| c.network_id)
            .collect();
        if let Scope::Network(id) = self.scope {
            networks.insert(id);
        }

        let mut scoped = snapshot.clone();
        scoped.networks.retain(|n| networks.contains(&n.id));
        scoped.coordinations.retain(|c| coordinations.contains(&c.id));
        scoped.cells.retain(|c| cells.contains(&c.id));
        scoped.members.retain(|m| cells.contains(&m.cell_id));
        scoped.reports.retain(|r| cells.contains(&r.cell_id));
        scoped
            .multiplications
            .retain(|m| cells.contains(&m.origin_cell_id) || cells.contains(&m.new_cell_id));
        scoped
            .supervisors
            .retain(|s| coordinations.contains(&s.coordination_id));
        scoped.supervisions.retain(|s| cells.contains(&s.cell_id));
        scoped
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::pastor()
    }
}
