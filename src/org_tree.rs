//! Browsable organization tree.
//!
//! Network → Coordination → {Supervisor, Cell}. This is the structural
//! hierarchy, unrelated to multiplication ancestry.

use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Network,
    Coordination,
    Supervisor,
    Cell,
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Network => "Rede",
            NodeKind::Coordination => "Coordenação",
            NodeKind::Supervisor => "Supervisor",
            NodeKind::Cell => "Célula",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgNode {
    pub kind: NodeKind,
    pub id: Uuid,
    pub name: String,
    pub couple_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OrgNode>,
}

impl OrgNode {
    /// Own name or couple name contains `needle`, or some descendant matches.
    ///
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        let own = self.name.to_lowercase().contains(needle)
            || self
                .couple_name
                .as_ref()
                .is_some_and(|c| c.to_lowercase().contains(needle));

        own || self.children.iter().any(|c| c.matches(needle))
    }
}

/// Build one tree per network.
pub fn build_org_tree(snapshot: &Snapshot) -> Vec<OrgNode> {
    let directory = snapshot.directory();

    snapshot
        .networks
        .iter()
        .map(|network| {
            let coordinations = snapshot
                .coordinations
                .iter()
                .filter(|c| c.network_id == network.id)
                .map(|coordination| {
                    let supervisors = snapshot
                        .supervisors
                        .iter()
                        .filter(|s| s.coordination_id == coordination.id)
                        .map(|s| OrgNode {
                            kind: NodeKind::Supervisor,
                            id: s.id,
                            name: directory
                                .profile_name(Some(s.profile_id))
                                .unwrap_or("Supervisor sem perfil")
                                .to_string(),
                            couple_name: None,
                            children: Vec::new(),
                        });

                    let cells = snapshot
                        .cells
                        .iter()
                        .filter(|c| c.coordination_id == coordination.id)
                        .map(|c| OrgNode {
                            kind: NodeKind::Cell,
                            id: c.id,
                            name: c.name.clone(),
                            couple_name: directory.couple_name(c.couple_id),
                            children: Vec::new(),
                        });

                    OrgNode {
                        kind: NodeKind::Coordination,
                        id: coordination.id,
                        name: coordination.name.clone(),
                        couple_name: directory.couple_name(coordination.couple_id),
                        children: supervisors.chain(cells).collect(),
                    }
                })
                .collect();

            OrgNode {
                kind: NodeKind::Network,
                id: network.id,
                name: network.name.clone(),
                couple_name: directory.couple_name(network.couple_id),
                children: coordinations,
            }
        })
        .collect()
}

/// Keep only nodes that match `query` (case-insensitive), recursively.
///
/// An empty query keeps everything.
pub fn filter_tree(nodes: &[OrgNode], query: &str) -> Vec<OrgNode> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return nodes.to_vec();
    }
    prune(nodes, &needle)
}

fn prune(nodes: &[OrgNode], needle: &str) -> Vec<OrgNode> {
    nodes
        .iter()
        .filter(|n| n.matches(needle))
        .map(|n| OrgNode {
            children: prune(&n.children, needle),
            ..n.clone()
        })
        .collect()
}
