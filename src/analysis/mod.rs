//! Analysis modules.
//!
//! Pure derivations over a snapshot: hierarchical roll-ups, the member
//! leaderboard and supervision coverage.

pub mod aggregator;
pub mod ranking;
pub mod supervision;

pub use aggregator::*;
pub use ranking::*;
pub use supervision::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Role, SessionContext};
    use crate::lineage::Lineage;
    use crate::snapshot::{Period, Snapshot, SnapshotLoader};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn church() -> Snapshot {
        let root = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/church");
        tokio_test::block_on(SnapshotLoader::new(root).load()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fixture_dashboard() {
        let snapshot = church().with_period(&Period::new(date(2024, 3, 1), date(2024, 3, 31)));
        let dashboard = aggregate(&snapshot);

        let network = &dashboard.by_network[0];
        assert_eq!(network.name, "Rede Norte");
        assert_eq!(network.couple_name.as_deref(), Some("Ana Souza & João Souza"));
        assert_eq!(network.totals.cells_count, 2);
        assert_eq!(network.totals.members_count, 2);
        assert_eq!(network.totals.visitors, 7);
        assert_eq!(network.totals.submission_rate, 50);

        let kpis = dashboard.kpis.unwrap();
        assert_eq!(kpis.total_members, 2);
        assert_eq!(kpis.total_reports, 2);
        assert_eq!(kpis.metrics.members_present, 17);
        assert_eq!(kpis.metrics.children, 2);

        assert_eq!(dashboard.by_leader.len(), 1);
        assert_eq!(dashboard.by_leader[0].avg_visitors, 4);
    }

    #[test]
    fn test_fixture_ranking_and_supervision() {
        let snapshot = church();

        let ranking = rank_members(&snapshot, date(2024, 3, 15));
        assert_eq!(ranking.len(), 2);
        assert_eq!(ranking[0].name, "Maria Lima");
        assert_eq!(ranking[0].total_score, 27);

        let coverage = summarize_supervisions(&snapshot);
        assert_eq!(coverage[0].supervisors_count, 1);
        assert_eq!(coverage[0].took_place_count, 1);
        assert_eq!(coverage[0].avg_checklist_completion, 20);
    }

    #[test]
    fn test_fixture_lineage_and_scope() {
        let snapshot = church();
        let vida = Uuid::from_u128(0x100);
        let luz = Uuid::from_u128(0x101);

        let lineage = Lineage::build(&snapshot.multiplications);
        assert_eq!(lineage.roots(), vec![vida]);
        assert_eq!(lineage.children_of(vida), vec![luz]);

        let leader = SessionContext::for_role(Role::CellLeader, Some(luz)).unwrap();
        let scoped = leader.scope_snapshot(&snapshot);
        assert_eq!(scoped.cells.len(), 1);
        assert!(scoped.reports.is_empty());

        let names: HashMap<Uuid, &str> = snapshot
            .cells
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect();
        assert_eq!(lineage.render(vida, &names).children[0].name, "Célula Luz");
    }
}
