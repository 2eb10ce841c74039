//! AI summarization payloads.
//!
//! The endpoint receives per-cell report histories and answers with a
//! markdown narrative. Nothing in the aggregation core depends on it.

pub mod client;

pub use client::{InsightClient, InsightSettings};

use crate::models::WeeklyReport;
use crate::snapshot::{Period, Snapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum InsightKind {
    /// Trend analysis of attendance and visitors
    #[serde(rename = "growth_analysis")]
    #[value(name = "growth")]
    GrowthAnalysis,
    /// Short summary for church leadership
    #[serde(rename = "executive_summary")]
    #[value(name = "executive")]
    ExecutiveSummary,
}

/// Report history of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReports {
    pub celula_name: String,
    pub coordenacao_name: Option<String>,
    pub reports: Vec<WeeklyReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRequest {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub data: Vec<CellReports>,
    pub period: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightResponse {
    /// Markdown narrative.
    pub insight: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default, rename = "generatedAt")]
    pub generated_at: Option<String>,
}

/// Build the request body for the cells in `snapshot`.
///
/// Every cell is sent, in input order, with its reports sorted by week.
/// Reports are expected to be already limited to `period`.
pub fn build_request(snapshot: &Snapshot, kind: InsightKind, period: &Period) -> InsightRequest {
    let directory = snapshot.directory();

    let data = snapshot
        .cells
        .iter()
        .map(|cell| {
            let mut reports: Vec<WeeklyReport> = snapshot
                .reports
                .iter()
                .filter(|r| r.cell_id == cell.id)
                .cloned()
                .collect();
            reports.sort_by_key(|r| r.week_start);

            CellReports {
                celula_name: cell.name.clone(),
                coordenacao_name: directory
                    .coordination(cell.coordination_id)
                    .map(|c| c.name.clone()),
                reports,
            }
        })
        .collect();

    InsightRequest {
        kind,
        data,
        period: period.label(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, Coordination};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report(cell_id: Uuid, week_start: NaiveDate, visitors: u32) -> WeeklyReport {
        WeeklyReport {
            id: Uuid::new_v4(),
            cell_id,
            week_start,
            meeting_date: None,
            members_present: 6,
            leaders_in_training: 0,
            discipleships: 0,
            visitors,
            children: 0,
            notes: None,
            photo_url: None,
        }
    }

    fn sample() -> Snapshot {
        let coord = Coordination {
            id: Uuid::from_u128(10),
            name: "Coordenação Oeste".to_string(),
            network_id: Uuid::from_u128(1),
            couple_id: None,
        };
        let cell = |n: u128, name: &str| Cell {
            id: Uuid::from_u128(n),
            name: name.to_string(),
            coordination_id: coord.id,
            leader_id: None,
            couple_id: None,
            meeting_day: None,
            meeting_time: None,
            address: None,
        };

        Snapshot {
            cells: vec![cell(100, "Célula Luz"), cell(101, "Célula Paz")],
            reports: vec![
                report(Uuid::from_u128(100), date(2024, 3, 11), 2),
                report(Uuid::from_u128(100), date(2024, 3, 4), 4),
            ],
            coordinations: vec![coord],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_build_request() {
        let period = Period::new(date(2024, 3, 1), date(2024, 3, 31));
        let request = build_request(&sample(), InsightKind::GrowthAnalysis, &period);

        assert_eq!(request.period, "01/03/2024 a 31/03/2024");
        assert_eq!(request.data.len(), 2);
        assert_eq!(request.data[0].celula_name, "Célula Luz");
        assert_eq!(
            request.data[0].coordenacao_name.as_deref(),
            Some("Coordenação Oeste")
        );
        assert_eq!(request.data[0].reports[0].week_start, date(2024, 3, 4));
        assert!(request.data[1].reports.is_empty());
    }

    #[test]
    fn test_wire_names() {
        let period = Period::new(date(2024, 1, 1), date(2024, 12, 31));
        let request = build_request(&Snapshot::default(), InsightKind::ExecutiveSummary, &period);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["type"], "executive_summary");
        assert!(json["data"].as_array().unwrap().is_empty());

        let response: InsightResponse = serde_json::from_str(
            r##"{"insight": "# Resumo", "type": "growth_analysis",
                "period": "2024", "generatedAt": "2024-12-31T10:00:00Z"}"##,
        )
        .unwrap();
        assert_eq!(response.kind, InsightKind::GrowthAnalysis);
        assert_eq!(response.generated_at.as_deref(), Some("2024-12-31T10:00:00Z"));
    }
}
