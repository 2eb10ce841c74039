//! Data models for the cell-group hierarchy.
//!
//! These are the rows of the organization's tables (networks, coordinations,
//! cells, members, weekly reports, multiplications, supervisions) as read
//! from JSON exports or from the local store. Field names are English; the
//! Portuguese column names of the original exports are accepted as aliases.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

fn default_true() -> bool {
    true
}

/// Top-level grouping of coordinations (`rede`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Network {
    pub id: Uuid,
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(default, alias = "casal_id")]
    pub couple_id: Option<Uuid>,
}

/// Mid-level grouping of cells within a network (`coordenacao`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Coordination {
    pub id: Uuid,
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(alias = "rede_id")]
    pub network_id: Uuid,
    #[serde(default, alias = "casal_id")]
    pub couple_id: Option<Uuid>,
}

/// A small group with members and a weekly meeting (`celula`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Cell {
    pub id: Uuid,
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(alias = "coordenacao_id")]
    pub coordination_id: Uuid,
    #[serde(default, alias = "lider_id")]
    pub leader_id: Option<Uuid>,
    #[serde(default, alias = "casal_id")]
    pub couple_id: Option<Uuid>,
    #[serde(default)]
    pub meeting_day: Option<String>,
    #[serde(default)]
    pub meeting_time: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

/// Personal data shared by members, leaders and supervisors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    #[serde(alias = "nome")]
    pub full_name: String,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub church_join_date: Option<NaiveDate>,
}

/// Two linked profiles jointly leading a network, coordination or cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct LeadershipCouple {
    pub id: Uuid,
    #[serde(default)]
    pub spouse1_id: Option<Uuid>,
    #[serde(default)]
    pub spouse2_id: Option<Uuid>,
}

impl LeadershipCouple {
    /// `"{spouse1} & {spouse2}"`, or whichever single name resolves.
    pub fn display_name(&self, profiles: &HashMap<Uuid, &Profile>) -> Option<String> {
        let name_of = |id: Option<Uuid>| {
            id.and_then(|id| profiles.get(&id))
                .map(|p| p.full_name.trim())
                .filter(|n| !n.is_empty())
        };

        match (name_of(self.spouse1_id), name_of(self.spouse2_id)) {
            (Some(a), Some(b)) => Some(format!("{} & {}", a, b)),
            (Some(a), None) => Some(a.to_string()),
            (None, Some(b)) => Some(b.to_string()),
            (None, None) => None,
        }
    }
}

/// A cell member. Inactive rows are soft-deleted and excluded from counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: Uuid,
    #[serde(alias = "celula_id")]
    pub cell_id: Uuid,
    #[serde(default, alias = "perfil_id")]
    pub profile_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub encounter: bool,
    #[serde(default)]
    pub baptism: bool,
    #[serde(default)]
    pub consolidation: bool,
    #[serde(default)]
    pub life_university: bool,
    #[serde(default)]
    pub leadership_school: bool,
    #[serde(default)]
    pub destiny_training: bool,
    #[serde(default)]
    pub ministry_service: bool,
}

impl Member {
    /// Number of spiritual milestones reached.
    pub fn milestones_count(&self) -> usize {
        Milestone::ALL.iter().filter(|m| m.is_reached(self)).count()
    }
}

/// Spiritual-growth milestone tracked per member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    Encounter,
    Baptism,
    Consolidation,
    LifeUniversity,
    LeadershipSchool,
    DestinyTraining,
    MinistryService,
}

impl Milestone {
    pub const ALL: [Milestone; 7] = [
        Milestone::Encounter,
        Milestone::Baptism,
        Milestone::Consolidation,
        Milestone::LifeUniversity,
        Milestone::LeadershipSchool,
        Milestone::DestinyTraining,
        Milestone::MinistryService,
    ];

    pub fn is_reached(&self, member: &Member) -> bool {
        match self {
            Milestone::Encounter => member.encounter,
            Milestone::Baptism => member.baptism,
            Milestone::Consolidation => member.consolidation,
            Milestone::LifeUniversity => member.life_university,
            Milestone::LeadershipSchool => member.leadership_school,
            Milestone::DestinyTraining => member.destiny_training,
            Milestone::MinistryService => member.ministry_service,
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Milestone::Encounter => write!(f, "Encontro com Deus"),
            Milestone::Baptism => write!(f, "Batismo"),
            Milestone::Consolidation => write!(f, "Consolidação"),
            Milestone::LifeUniversity => write!(f, "Universidade da Vida"),
            Milestone::LeadershipSchool => write!(f, "Escola de Líderes"),
            Milestone::DestinyTraining => write!(f, "Capacitação Destino"),
            Milestone::MinistryService => write!(f, "Serve em Ministério"),
        }
    }
}

/// A cell's submitted counters for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WeeklyReport {
    pub id: Uuid,
    #[serde(alias = "celula_id")]
    pub cell_id: Uuid,
    pub week_start: NaiveDate,
    #[serde(default)]
    pub meeting_date: Option<NaiveDate>,
    #[serde(default)]
    pub members_present: u32,
    #[serde(default)]
    pub leaders_in_training: u32,
    #[serde(default)]
    pub discipleships: u32,
    #[serde(default)]
    pub visitors: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Counters submitted for a cell meeting. The week is derived from
/// `meeting_date`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWeeklyReport {
    pub cell_id: Uuid,
    pub meeting_date: NaiveDate,
    pub members_present: u32,
    pub leaders_in_training: u32,
    pub discipleships: u32,
    pub visitors: u32,
    pub children: u32,
    pub notes: Option<String>,
    pub photo_url: Option<String>,
}

/// Numeric counter carried by a weekly report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMetric {
    MembersPresent,
    LeadersInTraining,
    Discipleships,
    Visitors,
    Children,
}

impl ReportMetric {
    pub const ALL: [ReportMetric; 5] = [
        ReportMetric::MembersPresent,
        ReportMetric::LeadersInTraining,
        ReportMetric::Discipleships,
        ReportMetric::Visitors,
        ReportMetric::Children,
    ];

    pub fn value(&self, report: &WeeklyReport) -> u32 {
        match self {
            ReportMetric::MembersPresent => report.members_present,
            ReportMetric::LeadersInTraining => report.leaders_in_training,
            ReportMetric::Discipleships => report.discipleships,
            ReportMetric::Visitors => report.visitors,
            ReportMetric::Children => report.children,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportMetric::MembersPresent => "Membros presentes",
            ReportMetric::LeadersInTraining => "Líderes em treinamento",
            ReportMetric::Discipleships => "Discipulados",
            ReportMetric::Visitors => "Visitantes",
            ReportMetric::Children => "Crianças",
        }
    }
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// "Cell X begat cell Y on date D."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Multiplication {
    pub id: Uuid,
    #[serde(alias = "celula_origem_id")]
    pub origin_cell_id: Uuid,
    #[serde(alias = "celula_destino_id")]
    pub new_cell_id: Uuid,
    #[serde(alias = "data_multiplicacao")]
    pub multiplied_on: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMultiplication {
    pub origin_cell_id: Uuid,
    pub new_cell_id: Uuid,
    pub multiplied_on: NaiveDate,
    pub notes: Option<String>,
}

/// A profile assigned to supervise the cells of one coordination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Supervisor {
    pub id: Uuid,
    #[serde(alias = "perfil_id")]
    pub profile_id: Uuid,
    #[serde(alias = "coordenacao_id")]
    pub coordination_id: Uuid,
}

/// Checklist item evaluated during a supervision visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItem {
    Welcome,
    Icebreaker,
    Worship,
    Edification,
    Offering,
    Prayer,
    Vision,
    Snack,
    Punctuality,
    Hospitality,
    VisitorFollowUp,
    LeaderInTraining,
    ChildrenCare,
    ReportSubmitted,
    Environment,
}

impl ChecklistItem {
    pub const COUNT: usize = 15;
}

/// Record of a supervisor's visit to a cell meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supervision {
    pub id: Uuid,
    #[serde(alias = "celula_id")]
    pub cell_id: Uuid,
    pub supervisor_id: Uuid,
    #[serde(alias = "data")]
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default, alias = "aconteceu")]
    pub took_place: bool,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default)]
    pub strengths: Option<String>,
    #[serde(default)]
    pub improvements: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Supervision {
    /// Fraction of the checklist marked, in percent.
    pub fn checklist_completion(&self) -> f64 {
        let mut items = self.checklist.clone();
        items.sort();
        items.dedup();
        items.len() as f64 * 100.0 / ChecklistItem::COUNT as f64
    }
}
