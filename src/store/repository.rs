//! Repository over the local store.
//!
//! Reads return a whole [`Snapshot`]; mutations are single-entity and each
//! runs under the caller's [`SessionContext`].

use crate::context::{Permission, SessionContext};
use crate::error::{AppError, Result};
use crate::lineage::Lineage;
use crate::models::*;
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Rows written per table by an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub profiles: usize,
    pub couples: usize,
    pub networks: usize,
    pub coordinations: usize,
    pub cells: usize,
    pub members: usize,
    pub reports: usize,
    pub multiplications: usize,
    pub supervisors: usize,
    pub supervisions: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.profiles
            + self.couples
            + self.networks
            + self.coordinations
            + self.cells
            + self.members
            + self.reports
            + self.multiplications
            + self.supervisors
            + self.supervisions
    }
}

/// Map a unique-index violation on `multiplications(new_cell_id)`.
fn destination_conflict(err: sqlx::Error, destination: Uuid) -> AppError {
    match err {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::DestinationAlreadyUsed(destination)
        }
        other => AppError::Database(other),
    }
}

fn supervision_from_row(row: &SqliteRow) -> Result<Supervision> {
    let checklist: String = row.try_get("checklist")?;

    Ok(Supervision {
        id: row.try_get("id")?,
        cell_id: row.try_get("cell_id")?,
        supervisor_id: row.try_get("supervisor_id")?,
        date: row.try_get("date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        took_place: row.try_get("took_place")?,
        checklist: serde_json::from_str(&checklist)?,
        strengths: row.try_get("strengths")?,
        improvements: row.try_get("improvements")?,
        notes: row.try_get("notes")?,
    })
}

#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read every table, in insertion order.
    pub async fn load_snapshot(&self) -> Result<Snapshot> {
        let snapshot = Snapshot {
            networks: sqlx::query_as::<_, Network>("SELECT * FROM networks ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?,
            coordinations: sqlx::query_as::<_, Coordination>(
                "SELECT * FROM coordinations ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await?,
            cells: sqlx::query_as::<_, Cell>("SELECT * FROM cells ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?,
            members: sqlx::query_as::<_, Member>("SELECT * FROM members ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?,
            profiles: sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?,
            couples: sqlx::query_as::<_, LeadershipCouple>(
                "SELECT * FROM couples ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await?,
            reports: sqlx::query_as::<_, WeeklyReport>(
                "SELECT * FROM weekly_reports ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await?,
            multiplications: self.list_multiplications().await?,
            supervisors: sqlx::query_as::<_, Supervisor>(
                "SELECT * FROM supervisors ORDER BY rowid",
            )
            .fetch_all(&self.pool)
            .await?,
            supervisions: sqlx::query("SELECT * FROM supervisions ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?
                .iter()
                .map(supervision_from_row)
                .collect::<Result<Vec<_>>>()?,
        };

        tracing::debug!(
            "Loaded snapshot from store: {} cells, {} reports",
            snapshot.cells.len(),
            snapshot.reports.len()
        );

        Ok(snapshot)
    }

    /// Upsert every row of `snapshot` in one transaction.
    ///
    /// Report weeks are normalized to their Monday, so two exported reports
    /// for the same cell and week collapse into the later one. Multiplications
    /// are checked against the stored edges and each other; the first self
    /// edge, reused destination or cycle aborts the whole import.
    pub async fn import_snapshot(
        &self,
        ctx: &SessionContext,
        snapshot: &Snapshot,
    ) -> Result<ImportSummary> {
        ctx.require(Permission::ImportData)?;

        let mut tx = self.pool.begin().await?;
        let mut summary = ImportSummary::default();

        for p in &snapshot.profiles {
            sqlx::query(
                r#"
                INSERT INTO profiles (id, full_name, birth_date, church_join_date)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    full_name = excluded.full_name,
                    birth_date = excluded.birth_date,
                    church_join_date = excluded.church_join_date
                "#,
            )
            .bind(p.id)
            .bind(&p.full_name)
            .bind(p.birth_date)
            .bind(p.church_join_date)
            .execute(&mut *tx)
            .await?;
            summary.profiles += 1;
        }

        for c in &snapshot.couples {
            sqlx::query(
                r#"
                INSERT INTO couples (id, spouse1_id, spouse2_id)
                VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    spouse1_id = excluded.spouse1_id,
                    spouse2_id = excluded.spouse2_id
                "#,
            )
            .bind(c.id)
            .bind(c.spouse1_id)
            .bind(c.spouse2_id)
            .execute(&mut *tx)
            .await?;
            summary.couples += 1;
        }

        for n in &snapshot.networks {
            sqlx::query(
                r#"
                INSERT INTO networks (id, name, couple_id)
                VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    couple_id = excluded.couple_id
                "#,
            )
            .bind(n.id)
            .bind(&n.name)
            .bind(n.couple_id)
            .execute(&mut *tx)
            .await?;
            summary.networks += 1;
        }

        for c in &snapshot.coordinations {
            sqlx::query(
                r#"
                INSERT INTO coordinations (id, name, network_id, couple_id)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    network_id = excluded.network_id,
                    couple_id = excluded.couple_id
                "#,
            )
            .bind(c.id)
            .bind(&c.name)
            .bind(c.network_id)
            .bind(c.couple_id)
            .execute(&mut *tx)
            .await?;
            summary.coordinations += 1;
        }

        for c in &snapshot.cells {
            sqlx::query(
                r#"
                INSERT INTO cells (id, name, coordination_id, leader_id, couple_id,
                                   meeting_day, meeting_time, address)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    coordination_id = excluded.coordination_id,
                    leader_id = excluded.leader_id,
                    couple_id = excluded.couple_id,
                    meeting_day = excluded.meeting_day,
                    meeting_time = excluded.meeting_time,
                    address = excluded.address
                "#,
            )
            .bind(c.id)
            .bind(&c.name)
            .bind(c.coordination_id)
            .bind(c.leader_id)
            .bind(c.couple_id)
            .bind(&c.meeting_day)
            .bind(&c.meeting_time)
            .bind(&c.address)
            .execute(&mut *tx)
            .await?;
            summary.cells += 1;
        }

        for m in &snapshot.members {
            sqlx::query(
                r#"
                INSERT INTO members (id, cell_id, profile_id, is_active, encounter, baptism,
                                     consolidation, life_university, leadership_school,
                                     destiny_training, ministry_service)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    cell_id = excluded.cell_id,
                    profile_id = excluded.profile_id,
                    is_active = excluded.is_active,
                    encounter = excluded.encounter,
                    baptism = excluded.baptism,
                    consolidation = excluded.consolidation,
                    life_university = excluded.life_university,
                    leadership_school = excluded.leadership_school,
                    destiny_training = excluded.destiny_training,
                    ministry_service = excluded.ministry_service
                "#,
            )
            .bind(m.id)
            .bind(m.cell_id)
            .bind(m.profile_id)
            .bind(m.is_active)
            .bind(m.encounter)
            .bind(m.baptism)
            .bind(m.consolidation)
            .bind(m.life_university)
            .bind(m.leadership_school)
            .bind(m.destiny_training)
            .bind(m.ministry_service)
            .execute(&mut *tx)
            .await?;
            summary.members += 1;
        }

        for r in &snapshot.reports {
            let week_start = week_start_of(r.week_start);
            if week_start != r.week_start {
                tracing::debug!(
                    "Report {} week {} normalized to {}",
                    r.id,
                    r.week_start,
                    week_start
                );
            }

            // A re-exported report may have moved to another cell or week.
            sqlx::query(
                "DELETE FROM weekly_reports WHERE id = ? AND (cell_id <> ? OR week_start <> ?)",
            )
            .bind(r.id)
            .bind(r.cell_id)
            .bind(week_start)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO weekly_reports (id, cell_id, week_start, meeting_date,
                                            members_present, leaders_in_training,
                                            discipleships, visitors, children,
                                            notes, photo_url)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(cell_id, week_start) DO UPDATE SET
                    meeting_date = excluded.meeting_date,
                    members_present = excluded.members_present,
                    leaders_in_training = excluded.leaders_in_training,
                    discipleships = excluded.discipleships,
                    visitors = excluded.visitors,
                    children = excluded.children,
                    notes = excluded.notes,
                    photo_url = excluded.photo_url
                "#,
            )
            .bind(r.id)
            .bind(r.cell_id)
            .bind(week_start)
            .bind(r.meeting_date)
            .bind(r.members_present)
            .bind(r.leaders_in_training)
            .bind(r.discipleships)
            .bind(r.visitors)
            .bind(r.children)
            .bind(&r.notes)
            .bind(&r.photo_url)
            .execute(&mut *tx)
            .await?;
            summary.reports += 1;
        }

        let stored = sqlx::query_as::<_, Multiplication>(
            "SELECT * FROM multiplications ORDER BY rowid",
        )
        .fetch_all(&mut *tx)
        .await?;
        let mut lineage = Lineage::build(&stored);

        for m in &snapshot.multiplications {
            lineage.add_edge(m)?;

            sqlx::query(
                r#"
                INSERT INTO multiplications (id, origin_cell_id, new_cell_id, multiplied_on, notes)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    origin_cell_id = excluded.origin_cell_id,
                    new_cell_id = excluded.new_cell_id,
                    multiplied_on = excluded.multiplied_on,
                    notes = excluded.notes
                "#,
            )
            .bind(m.id)
            .bind(m.origin_cell_id)
            .bind(m.new_cell_id)
            .bind(m.multiplied_on)
            .bind(&m.notes)
            .execute(&mut *tx)
            .await
            .map_err(|e| destination_conflict(e, m.new_cell_id))?;
            summary.multiplications += 1;
        }

        for s in &snapshot.supervisors {
            sqlx::query(
                r#"
                INSERT INTO supervisors (id, profile_id, coordination_id)
                VALUES (?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    profile_id = excluded.profile_id,
                    coordination_id = excluded.coordination_id
                "#,
            )
            .bind(s.id)
            .bind(s.profile_id)
            .bind(s.coordination_id)
            .execute(&mut *tx)
            .await?;
            summary.supervisors += 1;
        }

        for s in &snapshot.supervisions {
            sqlx::query(
                r#"
                INSERT INTO supervisions (id, cell_id, supervisor_id, date, start_time, end_time,
                                          took_place, checklist, strengths, improvements, notes)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    cell_id = excluded.cell_id,
                    supervisor_id = excluded.supervisor_id,
                    date = excluded.date,
                    start_time = excluded.start_time,
                    end_time = excluded.end_time,
                    took_place = excluded.took_place,
                    checklist = excluded.checklist,
                    strengths = excluded.strengths,
                    improvements = excluded.improvements,
                    notes = excluded.notes
                "#,
            )
            .bind(s.id)
            .bind(s.cell_id)
            .bind(s.supervisor_id)
            .bind(s.date)
            .bind(&s.start_time)
            .bind(&s.end_time)
            .bind(s.took_place)
            .bind(serde_json::to_string(&s.checklist)?)
            .bind(&s.strengths)
            .bind(&s.improvements)
            .bind(&s.notes)
            .execute(&mut *tx)
            .await?;
            summary.supervisions += 1;
        }

        tx.commit().await?;

        tracing::info!("Imported {} rows into the store", summary.total());
        Ok(summary)
    }

    pub async fn get_cell(&self, id: Uuid) -> Result<Cell> {
        sqlx::query_as::<_, Cell>("SELECT * FROM cells WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound { entity: "Cell", id })
    }

    async fn network_of(&self, coordination_id: Uuid) -> Result<Option<Uuid>> {
        let network_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT network_id FROM coordinations WHERE id = ?",
        )
        .bind(coordination_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(network_id)
    }

    /// Load a cell and check it lies inside the session's scope.
    async fn scoped_cell(&self, ctx: &SessionContext, id: Uuid) -> Result<Cell> {
        let cell = self.get_cell(id).await?;
        let network_id = self.network_of(cell.coordination_id).await?;
        ctx.require_cell(&cell, network_id)?;
        Ok(cell)
    }

    pub async fn get_report(&self, id: Uuid) -> Result<WeeklyReport> {
        sqlx::query_as::<_, WeeklyReport>("SELECT * FROM weekly_reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound {
                entity: "Weekly report",
                id,
            })
    }

    /// Submit a cell's report for the week of `meeting_date`.
    ///
    /// A second submission for the same cell and week replaces the counters
    /// of the first and keeps its id.
    pub async fn submit_report(
        &self,
        ctx: &SessionContext,
        req: NewWeeklyReport,
    ) -> Result<WeeklyReport> {
        ctx.require(Permission::SubmitReport)?;
        let cell = self.scoped_cell(ctx, req.cell_id).await?;

        let week_start = week_start_of(req.meeting_date);

        let report = sqlx::query_as::<_, WeeklyReport>(
            r#"
            INSERT INTO weekly_reports (id, cell_id, week_start, meeting_date,
                                        members_present, leaders_in_training,
                                        discipleships, visitors, children,
                                        notes, photo_url)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(cell_id, week_start) DO UPDATE SET
                meeting_date = excluded.meeting_date,
                members_present = excluded.members_present,
                leaders_in_training = excluded.leaders_in_training,
                discipleships = excluded.discipleships,
                visitors = excluded.visitors,
                children = excluded.children,
                notes = excluded.notes,
                photo_url = excluded.photo_url
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(cell.id)
        .bind(week_start)
        .bind(req.meeting_date)
        .bind(req.members_present)
        .bind(req.leaders_in_training)
        .bind(req.discipleships)
        .bind(req.visitors)
        .bind(req.children)
        .bind(&req.notes)
        .bind(&req.photo_url)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            "Report for \"{}\" week of {} saved ({})",
            cell.name,
            week_start,
            report.id
        );
        Ok(report)
    }

    pub async fn delete_report(&self, ctx: &SessionContext, id: Uuid) -> Result<WeeklyReport> {
        ctx.require(Permission::DeleteReport)?;
        let report = self.get_report(id).await?;
        self.scoped_cell(ctx, report.cell_id).await?;

        let rows = sqlx::query("DELETE FROM weekly_reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound {
                entity: "Weekly report",
                id,
            });
        }

        tracing::info!("Deleted weekly report {}", id);
        Ok(report)
    }

    pub async fn list_multiplications(&self) -> Result<Vec<Multiplication>> {
        let records =
            sqlx::query_as::<_, Multiplication>("SELECT * FROM multiplications ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;

        Ok(records)
    }

    /// Record that `origin_cell_id` begat `new_cell_id`.
    ///
    /// Both cells must exist. Self edges, a destination that already has a
    /// parent, and edges that would close a cycle are rejected.
    pub async fn record_multiplication(
        &self,
        ctx: &SessionContext,
        req: NewMultiplication,
    ) -> Result<Multiplication> {
        ctx.require(Permission::RecordMultiplication)?;

        let origin = self.scoped_cell(ctx, req.origin_cell_id).await?;
        let destination = self.get_cell(req.new_cell_id).await?;

        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, Multiplication>(
            "SELECT * FROM multiplications ORDER BY rowid",
        )
        .fetch_all(&mut *tx)
        .await?;
        Lineage::build(&stored).check_new_edge(origin.id, destination.id)?;

        let record = sqlx::query_as::<_, Multiplication>(
            r#"
            INSERT INTO multiplications (id, origin_cell_id, new_cell_id, multiplied_on, notes)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(origin.id)
        .bind(destination.id)
        .bind(req.multiplied_on)
        .bind(&req.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| destination_conflict(e, destination.id))?;

        tx.commit().await?;

        tracing::info!(
            "Recorded multiplication \"{}\" -> \"{}\" on {}",
            origin.name,
            destination.name,
            record.multiplied_on
        );
        Ok(record)
    }

    /// Delete a multiplication record. Both cells stay; the new cell becomes
    /// a root again.
    pub async fn delete_multiplication(
        &self,
        ctx: &SessionContext,
        id: Uuid,
    ) -> Result<Multiplication> {
        ctx.require(Permission::DeleteMultiplication)?;

        let record = sqlx::query_as::<_, Multiplication>(
            "SELECT * FROM multiplications WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound {
            entity: "Multiplication",
            id,
        })?;

        self.scoped_cell(ctx, record.origin_cell_id).await?;

        sqlx::query("DELETE FROM multiplications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::info!("Deleted multiplication {}", id);
        Ok(record)
    }
}
