//! Spreadsheet export of the dashboard.

use super::write_output;
use crate::analysis::Dashboard;
use crate::models::ReportMetric;
use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;
use tracing::info;

/// Header row in bold, widened columns.
fn header(sheet: &mut Worksheet, titles: &[&str], bold: &Format) -> Result<(), XlsxError> {
    for (col, title) in titles.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, bold)?;
        sheet.set_column_width(col as u16, 18)?;
    }
    Ok(())
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn kpi_sheet(dashboard: &Dashboard, period: &str, bold: &Format) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name("KPIs")?;
    header(&mut sheet, &["Indicador", "Valor"], bold)?;

    sheet.write_string(1, 0, "Período")?;
    sheet.write_string(1, 1, period)?;

    let Some(kpis) = &dashboard.kpis else {
        return Ok(sheet);
    };

    let mut rows: Vec<(&str, f64)> = vec![
        ("Membros", kpis.total_members as f64),
        ("Células", kpis.total_cells as f64),
        ("Visitantes", kpis.total_visitors as f64),
        ("Relatórios", kpis.total_reports as f64),
    ];
    for metric in ReportMetric::ALL {
        rows.push((metric.label(), kpis.metrics.get(metric) as f64));
    }

    for (i, (label, value)) in rows.into_iter().enumerate() {
        let row = i as u32 + 2;
        sheet.write_string(row, 0, label)?;
        sheet.write_number(row, 1, value)?;
    }

    Ok(sheet)
}

fn network_sheet(dashboard: &Dashboard, bold: &Format) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name("Redes")?;
    header(
        &mut sheet,
        &[
            "Rede",
            "Casal",
            "Coordenações",
            "Células",
            "Membros",
            "Visitantes",
            "Relatórios",
            "Envio (%)",
        ],
        bold,
    )?;

    for (i, n) in dashboard.by_network.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &n.name)?;
        sheet.write_string(row, 1, opt(&n.couple_name))?;
        sheet.write_number(row, 2, n.coordinations_count as f64)?;
        sheet.write_number(row, 3, n.totals.cells_count as f64)?;
        sheet.write_number(row, 4, n.totals.members_count as f64)?;
        sheet.write_number(row, 5, n.totals.visitors as f64)?;
        sheet.write_number(row, 6, n.totals.reports_count as f64)?;
        sheet.write_number(row, 7, n.totals.submission_rate)?;
    }

    Ok(sheet)
}

fn coordination_sheet(dashboard: &Dashboard, bold: &Format) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name("Coordenacoes")?;
    header(
        &mut sheet,
        &[
            "Coordenação",
            "Rede",
            "Casal",
            "Células",
            "Membros",
            "Visitantes",
            "Relatórios",
            "Envio (%)",
        ],
        bold,
    )?;

    for (i, c) in dashboard.by_coordination.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &c.name)?;
        sheet.write_string(row, 1, opt(&c.network_name))?;
        sheet.write_string(row, 2, opt(&c.couple_name))?;
        sheet.write_number(row, 3, c.totals.cells_count as f64)?;
        sheet.write_number(row, 4, c.totals.members_count as f64)?;
        sheet.write_number(row, 5, c.totals.visitors as f64)?;
        sheet.write_number(row, 6, c.totals.reports_count as f64)?;
        sheet.write_number(row, 7, c.totals.submission_rate)?;
    }

    Ok(sheet)
}

fn cell_sheet(dashboard: &Dashboard, bold: &Format) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name("Celulas")?;
    header(
        &mut sheet,
        &["Célula", "Coordenação", "Membros", "Visitantes", "Relatórios"],
        bold,
    )?;

    for (i, c) in dashboard.by_cell.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &c.name)?;
        sheet.write_string(row, 1, opt(&c.coordination_name))?;
        sheet.write_number(row, 2, c.members_count as f64)?;
        sheet.write_number(row, 3, c.visitors as f64)?;
        sheet.write_number(row, 4, c.reports_count as f64)?;
    }

    Ok(sheet)
}

fn leader_sheet(dashboard: &Dashboard, bold: &Format) -> Result<Worksheet, XlsxError> {
    let mut sheet = Worksheet::new();
    sheet.set_name("Lideres")?;
    header(
        &mut sheet,
        &["Casal", "Célula", "Relatórios", "Visitantes", "Média visitantes"],
        bold,
    )?;

    for (i, l) in dashboard.by_leader.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &l.couple_name)?;
        sheet.write_string(row, 1, &l.cell_name)?;
        sheet.write_number(row, 2, l.reports_count as f64)?;
        sheet.write_number(row, 3, l.total_visitors as f64)?;
        sheet.write_number(row, 4, l.avg_visitors as f64)?;
    }

    Ok(sheet)
}

/// One sheet per view: KPIs, Redes, Coordenacoes, Celulas, Lideres.
pub fn build_workbook(dashboard: &Dashboard, period: &str) -> Result<Workbook> {
    let bold = Format::new().set_bold();
    let mut workbook = Workbook::new();

    workbook.push_worksheet(kpi_sheet(dashboard, period, &bold)?);
    workbook.push_worksheet(network_sheet(dashboard, &bold)?);
    workbook.push_worksheet(coordination_sheet(dashboard, &bold)?);
    workbook.push_worksheet(cell_sheet(dashboard, &bold)?);
    workbook.push_worksheet(leader_sheet(dashboard, &bold)?);

    Ok(workbook)
}

/// Build the workbook and write it to `path`.
pub fn export_xlsx(dashboard: &Dashboard, period: &str, path: &Path) -> Result<()> {
    let mut workbook = build_workbook(dashboard, period)?;
    let buffer = workbook
        .save_to_buffer()
        .context("Failed to serialize workbook")?;

    write_output(path, &buffer)?;
    info!("Workbook written to {}", path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{CellStats, Kpis};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn dashboard() -> Dashboard {
        Dashboard {
            by_cell: vec![CellStats {
                id: Uuid::new_v4(),
                name: "Célula Vida".to_string(),
                coordination_id: Uuid::new_v4(),
                coordination_name: None,
                members_count: 5,
                visitors: 8,
                reports_count: 2,
            }],
            kpis: Some(Kpis {
                total_members: 5,
                total_cells: 1,
                total_visitors: 8,
                total_reports: 2,
                ..Kpis::default()
            }),
            ..Dashboard::default()
        }
    }

    #[test]
    fn test_build_workbook_sheets() {
        let mut workbook = build_workbook(&dashboard(), "01/01/2024 a 31/01/2024").unwrap();

        for name in ["KPIs", "Redes", "Coordenacoes", "Celulas", "Lideres"] {
            assert!(workbook.worksheet_from_name(name).is_ok(), "missing {}", name);
        }

        let buffer = workbook.save_to_buffer().unwrap();
        assert!(buffer.starts_with(b"PK"));
    }

    #[test]
    fn test_export_xlsx_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dashboard.xlsx");

        export_xlsx(&Dashboard::default(), "2024", &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
