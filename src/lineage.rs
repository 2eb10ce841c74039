//! Cell multiplication lineage.
//!
//! Multiplication records are flat (origin, new cell, date) edges. This
//! module rebuilds the forest of "who begat whom" from them, answers which
//! cells may still be used as a new cell, and validates edges before they
//! are stored so that no cell becomes its own ancestor.

use crate::error::{AppError, Result};
use crate::models::{Cell, Multiplication};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

/// Inbound edge of a cell that was born from a multiplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent_id: Uuid,
    pub multiplication_id: Uuid,
    pub multiplied_on: NaiveDate,
    pub notes: Option<String>,
}

/// One rendered node of the lineage forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageNode {
    pub cell_id: Uuid,
    pub name: String,
    pub is_root: bool,
    pub multiplied_on: Option<NaiveDate>,
    pub depth: usize,
    pub children: Vec<LineageNode>,
}

impl LineageNode {
    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|c| c.size()).sum::<usize>()
    }
}

/// Destination-keyed parent map built from multiplication records.
#[derive(Debug, Clone, Default)]
pub struct Lineage {
    parents: HashMap<Uuid, ParentLink>,
    origins: Vec<Uuid>,
}

impl Lineage {
    /// Single pass over the records. A destination seen twice keeps the last edge.
    pub fn build(records: &[Multiplication]) -> Self {
        let mut lineage = Self::default();

        for record in records {
            if let Some(previous) = lineage.link(record) {
                warn!(
                    "Cell {} has more than one recorded origin, keeping multiplication {} over {}",
                    record.new_cell_id, record.id, previous.multiplication_id
                );
            }
        }

        lineage
    }

    fn link(&mut self, record: &Multiplication) -> Option<ParentLink> {
        if !self.origins.contains(&record.origin_cell_id) {
            self.origins.push(record.origin_cell_id);
        }

        self.parents.insert(
            record.new_cell_id,
            ParentLink {
                parent_id: record.origin_cell_id,
                multiplication_id: record.id,
                multiplied_on: record.multiplied_on,
                notes: record.notes.clone(),
            },
        )
    }

    /// Validate `record` with [`Lineage::check_new_edge`] and add it.
    ///
    /// An edge already carrying the same multiplication id is replaced, so
    /// loading the same records twice is accepted.
    pub fn add_edge(&mut self, record: &Multiplication) -> Result<()> {
        let stale = self
            .parents
            .iter()
            .find(|(_, link)| link.multiplication_id == record.id)
            .map(|(destination, _)| *destination);

        if let Some(destination) = stale {
            if let Some(link) = self.parents.remove(&destination) {
                if !self.parents.values().any(|l| l.parent_id == link.parent_id) {
                    self.origins.retain(|id| *id != link.parent_id);
                }
            }
        }

        self.check_new_edge(record.origin_cell_id, record.new_cell_id)?;
        self.link(record);
        Ok(())
    }

    pub fn parent_of(&self, cell_id: Uuid) -> Option<&ParentLink> {
        self.parents.get(&cell_id)
    }

    /// A cell with no inbound edge.
    pub fn is_root(&self, cell_id: Uuid) -> bool {
        !self.parents.contains_key(&cell_id)
    }

    /// Origins that are never a destination, in first-appearance order.
    pub fn roots(&self) -> Vec<Uuid> {
        self.origins
            .iter()
            .copied()
            .filter(|id| self.is_root(*id))
            .collect()
    }

    /// Cells whose recorded parent is `cell_id`, oldest multiplication first.
    pub fn children_of(&self, cell_id: Uuid) -> Vec<Uuid> {
        let mut children: Vec<(&Uuid, &ParentLink)> = self
            .parents
            .iter()
            .filter(|(_, link)| link.parent_id == cell_id)
            .collect();
        children.sort_by(|a, b| a.1.multiplied_on.cmp(&b.1.multiplied_on).then(a.0.cmp(b.0)));
        children.into_iter().map(|(id, _)| *id).collect()
    }

    /// Render the subtree rooted at `cell_id`.
    ///
    /// A child already on the current path is skipped, so cyclic data
    /// still produces a finite tree.
    pub fn render(&self, cell_id: Uuid, names: &HashMap<Uuid, &str>) -> LineageNode {
        let mut path = HashSet::new();
        self.render_node(cell_id, 0, names, &mut path)
    }

    /// Render every root.
    pub fn forest(&self, names: &HashMap<Uuid, &str>) -> Vec<LineageNode> {
        self.roots()
            .into_iter()
            .map(|root| self.render(root, names))
            .collect()
    }

    fn render_node(
        &self,
        cell_id: Uuid,
        depth: usize,
        names: &HashMap<Uuid, &str>,
        path: &mut HashSet<Uuid>,
    ) -> LineageNode {
        path.insert(cell_id);

        let mut children = Vec::new();
        for child in self.children_of(cell_id) {
            if path.contains(&child) {
                warn!("Multiplication cycle detected at cell {}, not descending", child);
                continue;
            }
            children.push(self.render_node(child, depth + 1, names, path));
        }

        path.remove(&cell_id);

        LineageNode {
            cell_id,
            name: names
                .get(&cell_id)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "Célula desconhecida".to_string()),
            is_root: self.is_root(cell_id),
            multiplied_on: self.parent_of(cell_id).map(|l| l.multiplied_on),
            depth,
            children,
        }
    }

    /// Walks parent links upward from `cell_id` (excluding itself).
    pub fn ancestors(&self, cell_id: Uuid) -> Vec<Uuid> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([cell_id]);
        let mut current = cell_id;

        while let Some(link) = self.parents.get(&current) {
            if !seen.insert(link.parent_id) {
                break;
            }
            ancestors.push(link.parent_id);
            current = link.parent_id;
        }

        ancestors
    }

    /// Cells that may still be chosen as the new cell of a multiplication.
    pub fn available_destinations<'a>(&self, cells: &'a [Cell]) -> Vec<&'a Cell> {
        cells
            .iter()
            .filter(|c| !self.parents.contains_key(&c.id))
            .collect()
    }

    /// Reject edges that would break the one-parent or acyclic invariants.
    pub fn check_new_edge(&self, origin: Uuid, destination: Uuid) -> Result<()> {
        if origin == destination {
            return Err(AppError::SelfMultiplication(origin));
        }

        if self.parents.contains_key(&destination) {
            return Err(AppError::DestinationAlreadyUsed(destination));
        }

        if self.ancestors(origin).contains(&destination) {
            return Err(AppError::MultiplicationCycle {
                origin,
                destination,
            });
        }

        Ok(())
    }
}
