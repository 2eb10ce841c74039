//! Supervision coverage per coordination.

use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisionSummary {
    pub coordination_id: Uuid,
    pub coordination_name: String,
    pub supervisors_count: usize,
    pub supervisions_count: usize,
    pub took_place_count: usize,
    /// Average checklist completion (0-100) over visits that took place.
    pub avg_checklist_completion: u32,
}

/// One row per coordination, in input order.
pub fn summarize_supervisions(snapshot: &Snapshot) -> Vec<SupervisionSummary> {
    let cell_to_coordination: HashMap<Uuid, Uuid> = snapshot
        .cells
        .iter()
        .map(|c| (c.id, c.coordination_id))
        .collect();

    snapshot
        .coordinations
        .iter()
        .map(|coordination| {
            let visits: Vec<_> = snapshot
                .supervisions
                .iter()
                .filter(|s| cell_to_coordination.get(&s.cell_id) == Some(&coordination.id))
                .collect();

            let held: Vec<_> = visits.iter().filter(|s| s.took_place).collect();
            let avg = if held.is_empty() {
                0
            } else {
                let total: f64 = held.iter().map(|s| s.checklist_completion()).sum();
                (total / held.len() as f64).round() as u32
            };

            SupervisionSummary {
                coordination_id: coordination.id,
                coordination_name: coordination.name.clone(),
                supervisors_count: snapshot
                    .supervisors
                    .iter()
                    .filter(|s| s.coordination_id == coordination.id)
                    .count(),
                supervisions_count: visits.len(),
                took_place_count: held.len(),
                avg_checklist_completion: avg,
            }
        })
        .collect()
}
