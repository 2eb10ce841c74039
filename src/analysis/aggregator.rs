//! Hierarchical roll-up of weekly reports.
//!
//! This module turns the flat collections of a snapshot into per-network,
//! per-coordination, per-cell and per-leader statistics plus a KPI
//! summary. Reports are expected to be filtered to the desired period
//! beforehand.

use crate::models::{Cell, Coordination, ReportMetric, WeeklyReport};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Totals shared by every level that groups several cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollUp {
    pub cells_count: usize,
    pub members_count: usize,
    pub visitors: u64,
    pub reports_count: usize,
    /// Percentage of cells with at least one report (0-100).
    pub submission_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub id: Uuid,
    pub name: String,
    pub couple_name: Option<String>,
    pub coordinations_count: usize,
    #[serde(flatten)]
    pub totals: RollUp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationStats {
    pub id: Uuid,
    pub name: String,
    pub network_id: Uuid,
    pub network_name: Option<String>,
    pub couple_name: Option<String>,
    #[serde(flatten)]
    pub totals: RollUp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellStats {
    pub id: Uuid,
    pub name: String,
    pub coordination_id: Uuid,
    pub coordination_name: Option<String>,
    pub members_count: usize,
    pub visitors: u64,
    pub reports_count: usize,
}

/// One row per cell led by a leadership couple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderStats {
    pub cell_id: Uuid,
    pub cell_name: String,
    pub couple_name: String,
    pub reports_count: usize,
    pub total_visitors: u64,
    pub avg_visitors: u64,
}

/// Sum of every report counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTotals {
    pub members_present: u64,
    pub leaders_in_training: u64,
    pub discipleships: u64,
    pub visitors: u64,
    pub children: u64,
}

impl MetricTotals {
    pub fn add(&mut self, report: &WeeklyReport) {
        for metric in ReportMetric::ALL {
            *self.slot(metric) += metric.value(report) as u64;
        }
    }

    pub fn get(&self, metric: ReportMetric) -> u64 {
        match metric {
            ReportMetric::MembersPresent => self.members_present,
            ReportMetric::LeadersInTraining => self.leaders_in_training,
            ReportMetric::Discipleships => self.discipleships,
            ReportMetric::Visitors => self.visitors,
            ReportMetric::Children => self.children,
        }
    }

    fn slot(&mut self, metric: ReportMetric) -> &mut u64 {
        match metric {
            ReportMetric::MembersPresent => &mut self.members_present,
            ReportMetric::LeadersInTraining => &mut self.leaders_in_training,
            ReportMetric::Discipleships => &mut self.discipleships,
            ReportMetric::Visitors => &mut self.visitors,
            ReportMetric::Children => &mut self.children,
        }
    }
}

/// Global figures over the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_members: usize,
    pub total_cells: usize,
    pub total_visitors: u64,
    pub total_reports: usize,
    pub metrics: MetricTotals,
}

/// Every derived view of the aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub by_network: Vec<NetworkStats>,
    pub by_coordination: Vec<CoordinationStats>,
    pub by_cell: Vec<CellStats>,
    pub by_leader: Vec<LeaderStats>,
    pub kpis: Option<Kpis>,
}

/// Lookups built once per aggregation.
struct Indices<'a> {
    members_per_cell: HashMap<Uuid, usize>,
    reports_per_cell: HashMap<Uuid, Vec<&'a WeeklyReport>>,
    cells_per_coordination: HashMap<Uuid, Vec<&'a Cell>>,
    coordinations_per_network: HashMap<Uuid, Vec<&'a Coordination>>,
}

impl<'a> Indices<'a> {
    fn build(snapshot: &'a Snapshot) -> Self {
        let mut members_per_cell: HashMap<Uuid, usize> = HashMap::new();
        for member in snapshot.members.iter().filter(|m| m.is_active) {
            *members_per_cell.entry(member.cell_id).or_default() += 1;
        }

        let mut reports_per_cell: HashMap<Uuid, Vec<&WeeklyReport>> = HashMap::new();
        for report in &snapshot.reports {
            reports_per_cell.entry(report.cell_id).or_default().push(report);
        }

        let mut cells_per_coordination: HashMap<Uuid, Vec<&Cell>> = HashMap::new();
        for cell in &snapshot.cells {
            cells_per_coordination
                .entry(cell.coordination_id)
                .or_default()
                .push(cell);
        }

        let mut coordinations_per_network: HashMap<Uuid, Vec<&Coordination>> = HashMap::new();
        for coordination in &snapshot.coordinations {
            coordinations_per_network
                .entry(coordination.network_id)
                .or_default()
                .push(coordination);
        }

        Self {
            members_per_cell,
            reports_per_cell,
            cells_per_coordination,
            coordinations_per_network,
        }
    }

    fn members(&self, cell_id: Uuid) -> usize {
        self.members_per_cell.get(&cell_id).copied().unwrap_or(0)
    }

    fn reports(&self, cell_id: Uuid) -> &[&'a WeeklyReport] {
        self.reports_per_cell
            .get(&cell_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn visitors(&self, cell_id: Uuid) -> u64 {
        self.reports(cell_id).iter().map(|r| r.visitors as u64).sum()
    }

    fn cells_of(&self, coordination_id: Uuid) -> &[&'a Cell] {
        self.cells_per_coordination
            .get(&coordination_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn coordinations_of(&self, network_id: Uuid) -> &[&'a Coordination] {
        self.coordinations_per_network
            .get(&network_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn roll_up(&self, cells: &[&Cell]) -> RollUp {
        let mut totals = RollUp {
            cells_count: cells.len(),
            ..RollUp::default()
        };
        let mut submitting = 0;

        for cell in cells {
            let reports = self.reports(cell.id);
            totals.members_count += self.members(cell.id);
            totals.visitors += self.visitors(cell.id);
            totals.reports_count += reports.len();
            if !reports.is_empty() {
                submitting += 1;
            }
        }

        totals.submission_rate = submission_rate(submitting, cells.len());
        totals
    }
}

/// `round(100 * submitting / total)`, 0 when there are no cells.
pub fn submission_rate(submitting: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * submitting as f64 / total as f64).round() as u32
}

/// `round(total / count)`, 0 when count is 0.
pub fn rounded_average(total: u64, count: usize) -> u64 {
    if count == 0 {
        return 0;
    }
    (total as f64 / count as f64).round() as u64
}

/// Compute every view of the dashboard from one snapshot.
pub fn aggregate(snapshot: &Snapshot) -> Dashboard {
    let idx = Indices::build(snapshot);
    let directory = snapshot.directory();

    let by_network = snapshot
        .networks
        .iter()
        .map(|network| {
            let coordinations = idx.coordinations_of(network.id);
            let cells: Vec<&Cell> = coordinations
                .iter()
                .flat_map(|c| idx.cells_of(c.id).iter().copied())
                .collect();

            NetworkStats {
                id: network.id,
                name: network.name.clone(),
                couple_name: directory.couple_name(network.couple_id),
                coordinations_count: coordinations.len(),
                totals: idx.roll_up(&cells),
            }
        })
        .collect();

    let by_coordination = snapshot
        .coordinations
        .iter()
        .map(|coordination| CoordinationStats {
            id: coordination.id,
            name: coordination.name.clone(),
            network_id: coordination.network_id,
            network_name: directory
                .network(coordination.network_id)
                .map(|n| n.name.clone()),
            couple_name: directory.couple_name(coordination.couple_id),
            totals: idx.roll_up(idx.cells_of(coordination.id)),
        })
        .collect();

    let by_cell = snapshot
        .cells
        .iter()
        .map(|cell| CellStats {
            id: cell.id,
            name: cell.name.clone(),
            coordination_id: cell.coordination_id,
            coordination_name: directory
                .coordination(cell.coordination_id)
                .map(|c| c.name.clone()),
            members_count: idx.members(cell.id),
            visitors: idx.visitors(cell.id),
            reports_count: idx.reports(cell.id).len(),
        })
        .collect();

    let by_leader = snapshot
        .cells
        .iter()
        .filter(|cell| cell.couple_id.is_some())
        .map(|cell| {
            let reports_count = idx.reports(cell.id).len();
            let total_visitors = idx.visitors(cell.id);
            LeaderStats {
                cell_id: cell.id,
                cell_name: cell.name.clone(),
                couple_name: directory
                    .couple_name(cell.couple_id)
                    .unwrap_or_else(|| "Casal sem nome".to_string()),
                reports_count,
                total_visitors,
                avg_visitors: rounded_average(total_visitors, reports_count),
            }
        })
        .collect();

    Dashboard {
        by_network,
        by_coordination,
        by_cell,
        by_leader,
        kpis: compute_kpis(snapshot),
    }
}

/// `None` when there is nothing at all to summarize.
fn compute_kpis(snapshot: &Snapshot) -> Option<Kpis> {
    let nothing_loaded = snapshot.networks.is_empty()
        && snapshot.coordinations.is_empty()
        && snapshot.cells.is_empty()
        && snapshot.members.is_empty()
        && snapshot.reports.is_empty();
    if nothing_loaded {
        return None;
    }

    let mut metrics = MetricTotals::default();
    for report in &snapshot.reports {
        metrics.add(report);
    }

    Some(Kpis {
        total_members: snapshot.members.iter().filter(|m| m.is_active).count(),
        total_cells: snapshot.cells.len(),
        total_visitors: metrics.visitors,
        total_reports: snapshot.reports.len(),
        metrics,
    })
}

/// Coordinations whose submission rate is under `min_rate` percent.
pub fn below_submission_threshold(dashboard: &Dashboard, min_rate: u32) -> Vec<&CoordinationStats> {
    dashboard
        .by_coordination
        .iter()
        .filter(|c| c.totals.submission_rate < min_rate)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeadershipCouple, Member, Network, Profile};
    use chrono::NaiveDate;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn network(n: u128) -> Network {
        Network {
            id: id(n),
            name: format!("Rede {}", n),
            couple_id: None,
        }
    }

    fn coordination(n: u128, network: u128) -> Coordination {
        Coordination {
            id: id(n),
            name: format!("Coordenação {}", n),
            network_id: id(network),
            couple_id: None,
        }
    }

    fn cell(n: u128, coordination: u128) -> Cell {
        Cell {
            id: id(n),
            name: format!("Célula {}", n),
            coordination_id: id(coordination),
            leader_id: None,
            couple_id: None,
            meeting_day: None,
            meeting_time: None,
            address: None,
        }
    }

    fn member(n: u128, cell: u128, active: bool) -> Member {
        Member {
            id: id(n),
            cell_id: id(cell),
            profile_id: None,
            is_active: active,
            encounter: false,
            baptism: false,
            consolidation: false,
            life_university: false,
            leadership_school: false,
            destiny_training: false,
            ministry_service: false,
        }
    }

    fn report(n: u128, cell: u128, visitors: u32) -> WeeklyReport {
        WeeklyReport {
            id: id(n),
            cell_id: id(cell),
            week_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            meeting_date: None,
            members_present: 4,
            leaders_in_training: 1,
            discipleships: 0,
            visitors,
            children: 2,
            notes: None,
            photo_url: None,
        }
    }

    const Z: u128 = 1;
    const Y: u128 = 10;
    const X: u128 = 100;

    /// Network Z > coordination Y > cell X with 5 active members and two reports.
    fn scenario() -> Snapshot {
        let mut members: Vec<Member> = (0..5).map(|i| member(1000 + i, X, true)).collect();
        members.push(member(2000, X, false));

        Snapshot {
            networks: vec![network(Z)],
            coordinations: vec![coordination(Y, Z)],
            cells: vec![cell(X, Y)],
            members,
            reports: vec![report(500, X, 3), report(501, X, 5)],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_single_cell_roll_up() {
        let dashboard = aggregate(&scenario());

        let cell = &dashboard.by_cell[0];
        assert_eq!(cell.visitors, 8);
        assert_eq!(cell.reports_count, 2);
        assert_eq!(cell.members_count, 5);
        assert_eq!(cell.coordination_name.as_deref(), Some("Coordenação 10"));

        let expected = RollUp {
            cells_count: 1,
            members_count: 5,
            visitors: 8,
            reports_count: 2,
            submission_rate: 100,
        };
        assert_eq!(dashboard.by_coordination[0].totals, expected);
        assert_eq!(dashboard.by_network[0].totals, expected);
        assert_eq!(dashboard.by_network[0].coordinations_count, 1);

        let kpis = dashboard.kpis.unwrap();
        assert_eq!(kpis.total_members, 5);
        assert_eq!(kpis.total_cells, 1);
        assert_eq!(kpis.total_visitors, 8);
        assert_eq!(kpis.total_reports, 2);
        assert_eq!(kpis.metrics.get(ReportMetric::MembersPresent), 8);
        assert_eq!(kpis.metrics.get(ReportMetric::Children), 4);
    }

    #[test]
    fn test_no_reports_gives_zero_rate() {
        let snapshot = Snapshot {
            networks: vec![network(Z)],
            coordinations: vec![coordination(Y, Z)],
            cells: vec![cell(X, Y), cell(X + 1, Y), cell(X + 2, Y)],
            ..Snapshot::default()
        };

        let dashboard = aggregate(&snapshot);
        let totals = &dashboard.by_coordination[0].totals;
        assert_eq!(totals.cells_count, 3);
        assert_eq!(totals.submission_rate, 0);
        assert_eq!(totals.visitors, 0);
        assert_eq!(totals.reports_count, 0);
        assert!(dashboard.kpis.is_some());
    }

    #[test]
    fn test_empty_snapshot() {
        let dashboard = aggregate(&Snapshot::default());
        assert!(dashboard.by_network.is_empty());
        assert!(dashboard.by_coordination.is_empty());
        assert!(dashboard.by_cell.is_empty());
        assert!(dashboard.by_leader.is_empty());
        assert!(dashboard.kpis.is_none());
    }

    #[test]
    fn test_network_without_cells() {
        let snapshot = Snapshot {
            networks: vec![network(Z)],
            ..Snapshot::default()
        };
        let dashboard = aggregate(&snapshot);
        assert_eq!(dashboard.by_network[0].totals.submission_rate, 0);
        assert_eq!(dashboard.by_network[0].totals.cells_count, 0);
    }

    #[test]
    fn test_partial_submission_rate() {
        let mut snapshot = scenario();
        snapshot.cells.push(cell(X + 1, Y));
        snapshot.cells.push(cell(X + 2, Y));

        let dashboard = aggregate(&snapshot);
        assert_eq!(dashboard.by_coordination[0].totals.submission_rate, 33);
        assert_eq!(dashboard.by_network[0].totals.submission_rate, 33);

        let lagging = below_submission_threshold(&dashboard, 50);
        assert_eq!(lagging.len(), 1);
        assert!(below_submission_threshold(&dashboard, 30).is_empty());
    }

    #[test]
    fn test_orphans_excluded_from_parents() {
        let mut snapshot = scenario();
        // cell under a coordination that does not exist
        snapshot.cells.push(cell(300, 999));
        snapshot.reports.push(report(502, 300, 7));
        // coordination under a network that does not exist
        snapshot.coordinations.push(coordination(20, 888));

        let dashboard = aggregate(&snapshot);
        assert_eq!(dashboard.by_network[0].totals.visitors, 8);
        assert_eq!(dashboard.by_network[0].totals.cells_count, 1);

        let orphan_cell = dashboard.by_cell.iter().find(|c| c.id == id(300)).unwrap();
        assert_eq!(orphan_cell.visitors, 7);
        assert!(orphan_cell.coordination_name.is_none());

        let orphan_coord = dashboard
            .by_coordination
            .iter()
            .find(|c| c.id == id(20))
            .unwrap();
        assert!(orphan_coord.network_name.is_none());
        assert_eq!(orphan_coord.totals.cells_count, 0);
    }

    #[test]
    fn test_cell_visitors_sum_to_report_visitors() {
        let mut snapshot = scenario();
        snapshot.cells.push(cell(X + 1, Y));
        snapshot.reports.push(report(600, X + 1, 11));
        snapshot.reports.push(report(601, X + 1, 0));

        let dashboard = aggregate(&snapshot);
        let by_cell: u64 = dashboard.by_cell.iter().map(|c| c.visitors).sum();
        let all: u64 = snapshot.reports.iter().map(|r| r.visitors as u64).sum();
        assert_eq!(by_cell, all);
    }

    #[test]
    fn test_leader_rows() {
        let ana = Profile {
            id: id(7001),
            full_name: "Ana".to_string(),
            birth_date: None,
            church_join_date: None,
        };
        let joao = Profile {
            id: id(7002),
            full_name: "João".to_string(),
            ..ana.clone()
        };
        let couple = LeadershipCouple {
            id: id(8000),
            spouse1_id: Some(joao.id),
            spouse2_id: Some(ana.id),
        };

        let mut snapshot = scenario();
        snapshot.cells[0].couple_id = Some(couple.id);
        snapshot.cells.push(cell(X + 1, Y));
        snapshot.cells[1].couple_id = Some(couple.id);
        snapshot.reports.push(report(700, X, 0));
        snapshot.profiles = vec![ana, joao];
        snapshot.couples = vec![couple];

        let dashboard = aggregate(&snapshot);
        assert_eq!(dashboard.by_leader.len(), 2);

        let led = &dashboard.by_leader[0];
        assert_eq!(led.couple_name, "João & Ana");
        assert_eq!(led.reports_count, 3);
        assert_eq!(led.total_visitors, 8);
        // 8 / 3 = 2.67
        assert_eq!(led.avg_visitors, 3);

        let idle = &dashboard.by_leader[1];
        assert_eq!(idle.reports_count, 0);
        assert_eq!(idle.avg_visitors, 0);
    }

    #[test]
    fn test_rate_and_average_helpers() {
        assert_eq!(submission_rate(0, 0), 0);
        assert_eq!(submission_rate(1, 2), 50);
        assert_eq!(submission_rate(2, 3), 67);
        assert_eq!(submission_rate(3, 3), 100);
        assert_eq!(rounded_average(0, 0), 0);
        assert_eq!(rounded_average(5, 2), 3);
        assert_eq!(rounded_average(9, 4), 2);
    }
}
