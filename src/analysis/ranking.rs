//! Member leaderboard.
//!
//! Active members are scored by tenure (whole months since joining the
//! church) plus ten points per spiritual milestone reached.

use crate::models::Milestone;
use crate::snapshot::Snapshot;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Points awarded per milestone.
pub const MILESTONE_WEIGHT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberScore {
    pub member_id: Uuid,
    pub name: String,
    pub cell_id: Uuid,
    pub cell_name: Option<String>,
    pub months_in_church: u32,
    pub milestones: Vec<Milestone>,
    pub milestones_count: u32,
    pub milestones_score: u32,
    pub total_score: u32,
}

/// Whole calendar months from `from` to `to`; 0 if `to` is earlier.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }

    let mut months =
        (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }

    months.max(0) as u32
}

/// Score every active member and sort by total score, highest first.
///
/// Ties keep input order. Members without a profile or join date score 0
/// months and are still ranked.
pub fn rank_members(snapshot: &Snapshot, today: NaiveDate) -> Vec<MemberScore> {
    let directory = snapshot.directory();

    let mut scores: Vec<MemberScore> = snapshot
        .members
        .iter()
        .filter(|m| m.is_active)
        .map(|member| {
            let profile = member
                .profile_id
                .and_then(|id| directory.profiles.get(&id).copied());

            let months_in_church = profile
                .and_then(|p| p.church_join_date)
                .map(|joined| months_between(joined, today))
                .unwrap_or(0);

            let milestones: Vec<Milestone> = Milestone::ALL
                .into_iter()
                .filter(|m| m.is_reached(member))
                .collect();
            let milestones_count = member.milestones_count() as u32;
            let milestones_score = milestones_count * MILESTONE_WEIGHT;

            MemberScore {
                member_id: member.id,
                name: profile
                    .map(|p| p.full_name.clone())
                    .unwrap_or_else(|| "(sem perfil)".to_string()),
                cell_id: member.cell_id,
                cell_name: directory.cell_name(member.cell_id).map(String::from),
                months_in_church,
                milestones,
                milestones_count,
                milestones_score,
                total_score: months_in_church + milestones_score,
            }
        })
        .collect();

    scores.sort_by(|a, b| b.total_score.cmp(&a.total_score));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Member, Profile};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn member(n: u128, profile: Option<u128>) -> Member {
        Member {
            id: Uuid::from_u128(n),
            cell_id: Uuid::from_u128(1),
            profile_id: profile.map(Uuid::from_u128),
            is_active: true,
            encounter: false,
            baptism: false,
            consolidation: false,
            life_university: false,
            leadership_school: false,
            destiny_training: false,
            ministry_service: false,
        }
    }

    fn profile(n: u128, name: &str, joined: Option<NaiveDate>) -> Profile {
        Profile {
            id: Uuid::from_u128(n),
            full_name: name.to_string(),
            birth_date: None,
            church_join_date: joined,
        }
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(date(2023, 1, 15), date(2024, 1, 15)), 12);
        assert_eq!(months_between(date(2023, 1, 15), date(2024, 1, 14)), 11);
        assert_eq!(months_between(date(2024, 1, 31), date(2024, 2, 29)), 0);
        assert_eq!(months_between(date(2024, 3, 1), date(2024, 1, 1)), 0);
        assert_eq!(months_between(date(2024, 3, 1), date(2024, 3, 1)), 0);
    }

    #[test]
    fn test_more_milestones_rank_higher_at_equal_tenure() {
        let joined = Some(date(2022, 6, 1));
        let mut fewer = member(10, Some(100));
        fewer.encounter = true;
        let mut more = member(11, Some(101));
        more.encounter = true;
        more.baptism = true;

        let snapshot = Snapshot {
            members: vec![fewer, more],
            profiles: vec![profile(100, "Fewer", joined), profile(101, "More", joined)],
            ..Snapshot::default()
        };

        let ranked = rank_members(&snapshot, date(2024, 6, 1));
        assert_eq!(ranked[0].name, "More");
        assert!(ranked[0].total_score > ranked[1].total_score);
        assert_eq!(ranked[0].months_in_church, ranked[1].months_in_church);
    }

    #[test]
    fn test_score_formula_and_missing_data() {
        let mut veteran = member(10, Some(100));
        veteran.life_university = true;
        veteran.leadership_school = true;
        veteran.destiny_training = true;

        let mut no_profile = member(11, None);
        no_profile.baptism = true;

        let no_join_date = member(12, Some(102));

        let mut inactive = member(13, Some(100));
        inactive.is_active = false;

        let snapshot = Snapshot {
            members: vec![no_join_date, no_profile, veteran, inactive],
            profiles: vec![
                profile(100, "Veterano", Some(date(2020, 1, 10))),
                profile(102, "Sem Data", None),
            ],
            ..Snapshot::default()
        };

        let ranked = rank_members(&snapshot, date(2024, 1, 10));
        assert_eq!(ranked.len(), 3);

        for score in &ranked {
            assert_eq!(
                score.total_score,
                score.months_in_church + MILESTONE_WEIGHT * score.milestones_count
            );
            assert_eq!(score.milestones_count as usize, score.milestones.len());
        }

        assert_eq!(ranked[0].name, "Veterano");
        assert_eq!(ranked[0].months_in_church, 48);
        assert_eq!(ranked[0].total_score, 78);

        assert_eq!(ranked[1].name, "(sem perfil)");
        assert_eq!(ranked[1].months_in_church, 0);
        assert_eq!(ranked[1].total_score, 10);

        assert_eq!(ranked[2].name, "Sem Data");
        assert_eq!(ranked[2].total_score, 0);
    }

    #[test]
    fn test_future_join_date_clamps_to_zero() {
        let snapshot = Snapshot {
            members: vec![member(10, Some(100))],
            profiles: vec![profile(100, "Futuro", Some(date(2030, 1, 1)))],
            ..Snapshot::default()
        };
        let ranked = rank_members(&snapshot, date(2024, 1, 1));
        assert_eq!(ranked[0].months_in_church, 0);
    }
}
