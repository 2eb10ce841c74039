//! Loading table exports into an in-memory snapshot.
//!
//! A data directory holds one JSON array per table, either as
//! `<table>.json` or as batch files under `<table>/`. Every table is read
//! by an independent future; a table with no files is an empty list.

use crate::models::{
    Cell, Coordination, LeadershipCouple, Member, Multiplication, Network, Profile, Supervision,
    Supervisor, WeeklyReport,
};
use anyhow::{Context, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;
use walkdir::WalkDir;

/// Every collection the derivations read, as fetched at one point in time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub coordinations: Vec<Coordination>,
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub couples: Vec<LeadershipCouple>,
    #[serde(default)]
    pub reports: Vec<WeeklyReport>,
    #[serde(default)]
    pub multiplications: Vec<Multiplication>,
    #[serde(default)]
    pub supervisors: Vec<Supervisor>,
    #[serde(default)]
    pub supervisions: Vec<Supervision>,
}

impl Snapshot {
    /// Copy of the snapshot keeping only reports whose week, and supervisions
    /// whose visit date, fall in `period`.
    pub fn with_period(&self, period: &Period) -> Snapshot {
        let mut scoped = self.clone();
        scoped
            .reports
            .retain(|r| period.contains(r.week_start));
        scoped
            .supervisions
            .retain(|s| period.contains(s.date));
        scoped
    }

    /// Name lookups over profiles, couples and the hierarchy.
    pub fn directory(&self) -> Directory<'_> {
        Directory {
            profiles: self.profiles.iter().map(|p| (p.id, p)).collect(),
            couples: self.couples.iter().map(|c| (c.id, c)).collect(),
            networks: self.networks.iter().map(|n| (n.id, n)).collect(),
            coordinations: self.coordinations.iter().map(|c| (c.id, c)).collect(),
            cells: self.cells.iter().map(|c| (c.id, c)).collect(),
        }
    }
}

/// Id-keyed views over a snapshot.
pub struct Directory<'a> {
    pub profiles: HashMap<Uuid, &'a Profile>,
    pub couples: HashMap<Uuid, &'a LeadershipCouple>,
    pub networks: HashMap<Uuid, &'a Network>,
    pub coordinations: HashMap<Uuid, &'a Coordination>,
    pub cells: HashMap<Uuid, &'a Cell>,
}

impl<'a> Directory<'a> {
    pub fn profile_name(&self, id: Option<Uuid>) -> Option<&'a str> {
        id.and_then(|id| self.profiles.get(&id))
            .map(|p| p.full_name.as_str())
    }

    pub fn couple_name(&self, id: Option<Uuid>) -> Option<String> {
        id.and_then(|id| self.couples.get(&id))
            .and_then(|c| c.display_name(&self.profiles))
    }

    pub fn cell_name(&self, id: Uuid) -> Option<&'a str> {
        self.cells.get(&id).map(|c| c.name.as_str())
    }

    pub fn coordination(&self, id: Uuid) -> Option<&'a Coordination> {
        self.coordinations.get(&id).copied()
    }

    pub fn network(&self, id: Uuid) -> Option<&'a Network> {
        self.networks.get(&id).copied()
    }
}

/// Inclusive date range reports are filtered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Named periods relative to "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodPreset {
    /// Current calendar month (default)
    #[default]
    CurrentMonth,
    /// Previous calendar month
    LastMonth,
    /// Current month and the two before it
    LastThreeMonths,
    /// Current calendar year
    CurrentYear,
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn month_end(date: NaiveDate) -> NaiveDate {
    month_start(date)
        .checked_add_months(Months::new(1))
        .and_then(|d| d.pred_opt())
        .unwrap_or(date)
}

impl Period {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn preset(preset: PeriodPreset, today: NaiveDate) -> Self {
        match preset {
            PeriodPreset::CurrentMonth => Self::new(month_start(today), month_end(today)),
            PeriodPreset::LastMonth => {
                let prev = month_start(today).pred_opt().unwrap_or(today);
                Self::new(month_start(prev), prev)
            }
            PeriodPreset::LastThreeMonths => {
                let from = month_start(today)
                    .checked_sub_months(Months::new(2))
                    .unwrap_or(today);
                Self::new(from, month_end(today))
            }
            PeriodPreset::CurrentYear => {
                let from = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
                let to = NaiveDate::from_ymd_opt(today.year(), 12, 31).unwrap_or(today);
                Self::new(from, to)
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// `dd/mm/yyyy a dd/mm/yyyy`
    pub fn label(&self) -> String {
        format!(
            "{} a {}",
            self.from.format("%d/%m/%Y"),
            self.to.format("%d/%m/%Y")
        )
    }
}

/// Exported tables, each accepted under an English or Portuguese name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Networks,
    Coordinations,
    Cells,
    Members,
    Profiles,
    Couples,
    Reports,
    Multiplications,
    Supervisors,
    Supervisions,
}

impl Table {
    pub fn stems(&self) -> [&'static str; 2] {
        match self {
            Table::Networks => ["networks", "redes"],
            Table::Coordinations => ["coordinations", "coordenacoes"],
            Table::Cells => ["cells", "celulas"],
            Table::Members => ["members", "membros"],
            Table::Profiles => ["profiles", "perfis"],
            Table::Couples => ["couples", "casais"],
            Table::Reports => ["reports", "relatorios"],
            Table::Multiplications => ["multiplications", "multiplicacoes"],
            Table::Supervisors => ["supervisors", "supervisores"],
            Table::Supervisions => ["supervisions", "supervisoes"],
        }
    }
}

/// Reads a data directory of JSON table exports.
pub struct SnapshotLoader {
    root: PathBuf,
}

impl SnapshotLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Files holding rows of `table`, in a stable order.
    pub fn table_files(&self, table: Table) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for stem in table.stems() {
            let single = self.root.join(format!("{}.json", stem));
            if single.is_file() {
                files.push(single);
            }

            let dir = self.root.join(stem);
            if !dir.is_dir() {
                continue;
            }

            let mut batch: Vec<PathBuf> = WalkDir::new(&dir)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| is_json(p))
                .collect();
            batch.sort();
            files.extend(batch);
        }

        files
    }

    /// Load every table concurrently.
    pub async fn load(&self) -> Result<Snapshot> {
        info!("Loading table exports from {}", self.root.display());

        if !self.root.is_dir() {
            return Err(anyhow::anyhow!(
                "Data directory not found: {}",
                self.root.display()
            ));
        }

        let (
            networks,
            coordinations,
            cells,
            members,
            profiles,
            couples,
            reports,
            multiplications,
            supervisors,
            supervisions,
        ) = futures::try_join!(
            self.read::<Network>(Table::Networks),
            self.read::<Coordination>(Table::Coordinations),
            self.read::<Cell>(Table::Cells),
            self.read::<Member>(Table::Members),
            self.read::<Profile>(Table::Profiles),
            self.read::<LeadershipCouple>(Table::Couples),
            self.read::<WeeklyReport>(Table::Reports),
            self.read::<Multiplication>(Table::Multiplications),
            self.read::<Supervisor>(Table::Supervisors),
            self.read::<Supervision>(Table::Supervisions),
        )?;

        let snapshot = Snapshot {
            networks,
            coordinations,
            cells,
            members,
            profiles,
            couples,
            reports,
            multiplications,
            supervisors,
            supervisions,
        };

        info!(
            "Loaded {} networks, {} coordinations, {} cells, {} members, {} reports",
            snapshot.networks.len(),
            snapshot.coordinations.len(),
            snapshot.cells.len(),
            snapshot.members.len(),
            snapshot.reports.len()
        );

        Ok(snapshot)
    }

    async fn read<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>> {
        let files = self.table_files(table);

        if files.is_empty() {
            debug!("No export found for {:?}, using an empty table", table);
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        for file in files {
            let content = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let batch: Vec<T> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file.display()))?;

            debug!("{}: {} rows", file.display(), batch.len());
            rows.extend(batch);
        }

        Ok(rows)
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_presets() {
        let today = date(2024, 3, 15);

        let current = Period::preset(PeriodPreset::CurrentMonth, today);
        assert_eq!(current, Period::new(date(2024, 3, 1), date(2024, 3, 31)));

        let last = Period::preset(PeriodPreset::LastMonth, today);
        assert_eq!(last, Period::new(date(2024, 2, 1), date(2024, 2, 29)));

        let quarter = Period::preset(PeriodPreset::LastThreeMonths, today);
        assert_eq!(quarter, Period::new(date(2024, 1, 1), date(2024, 3, 31)));

        let year = Period::preset(PeriodPreset::CurrentYear, today);
        assert_eq!(year, Period::new(date(2024, 1, 1), date(2024, 12, 31)));
    }

    #[test]
    fn test_last_month_in_january() {
        let last = Period::preset(PeriodPreset::LastMonth, date(2024, 1, 10));
        assert_eq!(last, Period::new(date(2023, 12, 1), date(2023, 12, 31)));
    }

    #[test]
    fn test_period_label_and_contains() {
        let period = Period::new(date(2024, 1, 1), date(2024, 1, 31));
        assert_eq!(period.label(), "01/01/2024 a 31/01/2024");
        assert!(period.contains(date(2024, 1, 1)));
        assert!(period.contains(date(2024, 1, 31)));
        assert!(!period.contains(date(2024, 2, 1)));
    }

    #[test]
    fn test_load_directory_with_batches() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        std::fs::write(
            root.join("redes.json"),
            r#"[{"id": "00000000-0000-0000-0000-000000000001", "nome": "Rede Norte"}]"#,
        )
        .unwrap();

        std::fs::create_dir(root.join("relatorios")).unwrap();
        std::fs::write(
            root.join("relatorios").join("2024-01.json"),
            r#"[{"id": "00000000-0000-0000-0000-00000000000a",
                 "celula_id": "00000000-0000-0000-0000-0000000000c1",
                 "week_start": "2024-01-01", "visitors": 3}]"#,
        )
        .unwrap();
        std::fs::write(
            root.join("relatorios").join("2024-02.json"),
            r#"[{"id": "00000000-0000-0000-0000-00000000000b",
                 "celula_id": "00000000-0000-0000-0000-0000000000c1",
                 "week_start": "2024-02-05", "visitors": 5}]"#,
        )
        .unwrap();
        std::fs::write(root.join("relatorios").join("README.txt"), "ignored").unwrap();

        let loader = SnapshotLoader::new(root);
        assert_eq!(loader.table_files(Table::Reports).len(), 2);

        let snapshot = tokio_test::block_on(loader.load()).unwrap();
        assert_eq!(snapshot.networks.len(), 1);
        assert_eq!(snapshot.networks[0].name, "Rede Norte");
        assert_eq!(snapshot.reports.len(), 2);
        assert!(snapshot.cells.is_empty());

        let january = snapshot.with_period(&Period::new(date(2024, 1, 1), date(2024, 1, 31)));
        assert_eq!(january.reports.len(), 1);
        assert_eq!(january.reports[0].visitors, 3);
    }

    #[test]
    fn test_load_missing_directory() {
        let loader = SnapshotLoader::new("/definitely/not/here");
        assert!(tokio_test::block_on(loader.load()).is_err());
    }

    #[test]
    fn test_load_rejects_malformed_table() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("cells.json"), "{ not json").unwrap();

        let loader = SnapshotLoader::new(temp_dir.path());
        let err = tokio_test::block_on(loader.load()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
