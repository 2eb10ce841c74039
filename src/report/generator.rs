//! Markdown report generation.
//!
//! Each view (dashboard, ranking, lineage, organization tree, insight) is
//! rendered section by section into a single Markdown string.

use super::{DashboardReport, ReportMetadata};
use crate::analysis::{
    CellStats, CoordinationStats, Kpis, LeaderStats, MemberScore, NetworkStats,
    SupervisionSummary,
};
use crate::insight::InsightResponse;
use crate::lineage::LineageNode;
use crate::models::{Cell, ReportMetric};
use crate::org_tree::OrgNode;
use anyhow::Result;
use serde::Serialize;

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Generate the full dashboard report.
///
/// Coordinations below `min_submission_rate` (if given) are flagged.
pub fn generate_dashboard_markdown(
    report: &DashboardReport,
    min_submission_rate: Option<u32>,
) -> String {
    let mut output = String::new();

    output.push_str("# Dashboard de Células\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));

    match &report.dashboard.kpis {
        Some(kpis) => output.push_str(&generate_kpi_section(kpis)),
        None => {
            output.push_str("Nenhum dado encontrado para o escopo selecionado.\n\n");
            output.push_str(&generate_footer());
            return output;
        }
    }

    output.push_str(&generate_network_section(&report.dashboard.by_network));
    output.push_str(&generate_coordination_section(
        &report.dashboard.by_coordination,
        min_submission_rate,
    ));
    output.push_str(&generate_cell_section(&report.dashboard.by_cell));
    output.push_str(&generate_leader_section(&report.dashboard.by_leader));
    output.push_str(&generate_supervision_section(&report.supervision));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Período:** {}\n", metadata.period));
    section.push_str(&format!("- **Perfil:** {}\n", metadata.role));
    section.push_str(&format!("- **Fonte:** `{}`\n", metadata.source));
    section.push_str(&format!(
        "- **Gerado em:** {}\n\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    section
}

fn generate_kpi_section(kpis: &Kpis) -> String {
    let mut section = String::new();

    section.push_str("## Indicadores\n\n");
    section.push_str("| Membros | Células | Visitantes | Relatórios |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | {} |\n\n",
        kpis.total_members, kpis.total_cells, kpis.total_visitors, kpis.total_reports
    ));

    section.push_str("### Totais por indicador\n\n");
    section.push_str("| Indicador | Total |\n");
    section.push_str("|:---|---:|\n");
    for metric in ReportMetric::ALL {
        section.push_str(&format!(
            "| {} | {} |\n",
            metric.label(),
            kpis.metrics.get(metric)
        ));
    }
    section.push('\n');

    section
}

fn generate_network_section(networks: &[NetworkStats]) -> String {
    let mut section = String::new();

    section.push_str("## Redes\n\n");
    if networks.is_empty() {
        section.push_str("Nenhuma rede cadastrada.\n\n");
        return section;
    }

    section.push_str(
        "| Rede | Casal | Coordenações | Células | Membros | Visitantes | Relatórios | Envio |\n",
    );
    section.push_str("|:---|:---|---:|---:|---:|---:|---:|---:|\n");
    for n in networks {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {}% |\n",
            n.name,
            or_dash(n.couple_name.as_deref()),
            n.coordinations_count,
            n.totals.cells_count,
            n.totals.members_count,
            n.totals.visitors,
            n.totals.reports_count,
            n.totals.submission_rate
        ));
    }
    section.push('\n');

    section
}

fn generate_coordination_section(
    coordinations: &[CoordinationStats],
    min_submission_rate: Option<u32>,
) -> String {
    let mut section = String::new();

    section.push_str("## Coordenações\n\n");
    if coordinations.is_empty() {
        section.push_str("Nenhuma coordenação cadastrada.\n\n");
        return section;
    }

    section.push_str("| Coordenação | Rede | Casal | Células | Membros | Visitantes | Relatórios | Envio |\n");
    section.push_str("|:---|:---|:---|---:|---:|---:|---:|---:|\n");
    for c in coordinations {
        let flag = match min_submission_rate {
            Some(min) if c.totals.submission_rate < min => " ⚠",
            _ => "",
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {}%{} |\n",
            c.name,
            or_dash(c.network_name.as_deref()),
            or_dash(c.couple_name.as_deref()),
            c.totals.cells_count,
            c.totals.members_count,
            c.totals.visitors,
            c.totals.reports_count,
            c.totals.submission_rate,
            flag
        ));
    }
    section.push('\n');

    if let Some(min) = min_submission_rate {
        section.push_str(&format!(
            "*⚠ abaixo da taxa mínima de envio ({}%)*\n\n",
            min
        ));
    }

    section
}

fn generate_cell_section(cells: &[CellStats]) -> String {
    let mut section = String::new();

    section.push_str("## Células\n\n");
    if cells.is_empty() {
        section.push_str("Nenhuma célula cadastrada.\n\n");
        return section;
    }

    section.push_str("| Célula | Coordenação | Membros | Visitantes | Relatórios |\n");
    section.push_str("|:---|:---|---:|---:|---:|\n");
    for c in cells {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            c.name,
            or_dash(c.coordination_name.as_deref()),
            c.members_count,
            c.visitors,
            c.reports_count
        ));
    }
    section.push('\n');

    section
}

fn generate_leader_section(leaders: &[LeaderStats]) -> String {
    if leaders.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Líderes\n\n");
    section.push_str("| Casal | Célula | Relatórios | Visitantes | Média |\n");
    section.push_str("|:---|:---|---:|---:|---:|\n");
    for l in leaders {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            l.couple_name, l.cell_name, l.reports_count, l.total_visitors, l.avg_visitors
        ));
    }
    section.push('\n');

    section
}

fn generate_supervision_section(rows: &[SupervisionSummary]) -> String {
    if rows.iter().all(|r| r.supervisions_count == 0) {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Supervisões\n\n");
    section.push_str("| Coordenação | Supervisores | Registradas | Realizadas | Checklist |\n");
    section.push_str("|:---|---:|---:|---:|---:|\n");
    for r in rows {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {}% |\n",
            r.coordination_name,
            r.supervisors_count,
            r.supervisions_count,
            r.took_place_count,
            r.avg_checklist_completion
        ));
    }
    section.push('\n');

    section
}

/// Leaderboard of the top `limit` members.
pub fn generate_ranking_markdown(scores: &[MemberScore], limit: usize) -> String {
    let mut output = String::new();

    output.push_str("# Ranking de Membros\n\n");
    if scores.is_empty() {
        output.push_str("Nenhum membro ativo encontrado.\n\n");
        return output;
    }

    output.push_str("| # | Membro | Célula | Meses | Marcos | Pontos |\n");
    output.push_str("|---:|:---|:---|---:|---:|---:|\n");
    for (i, s) in scores.iter().take(limit).enumerate() {
        output.push_str(&format!(
            "| {} | {} | {} | {} | {} | **{}** |\n",
            i + 1,
            s.name,
            or_dash(s.cell_name.as_deref()),
            s.months_in_church,
            s.milestones_count,
            s.total_score
        ));
    }
    output.push('\n');

    if scores.len() > limit {
        output.push_str(&format!(
            "*{} de {} membros exibidos*\n\n",
            limit,
            scores.len()
        ));
    }

    output
}

fn push_lineage_node(output: &mut String, node: &LineageNode) {
    let indent = "  ".repeat(node.depth);
    match node.multiplied_on {
        Some(date) if !node.is_root => output.push_str(&format!(
            "{}- {} *(multiplicada em {})*\n",
            indent,
            node.name,
            date.format("%d/%m/%Y")
        )),
        _ => output.push_str(&format!("{}- **{}**\n", indent, node.name)),
    }

    for child in &node.children {
        push_lineage_node(output, child);
    }
}

/// Multiplication forest as nested lists, plus the cells still free to be
/// recorded as a new cell.
pub fn generate_lineage_markdown(forest: &[LineageNode], available: &[&Cell]) -> String {
    let mut output = String::new();

    output.push_str("# Multiplicações\n\n");
    if forest.is_empty() {
        output.push_str("Nenhuma multiplicação registrada.\n\n");
    } else {
        let total: usize = forest.iter().map(|root| root.size()).sum();
        output.push_str(&format!(
            "**Linhagens:** {} | **Células:** {}\n\n",
            forest.len(),
            total
        ));
        for root in forest {
            push_lineage_node(&mut output, root);
        }
        output.push('\n');
    }

    if !available.is_empty() {
        output.push_str("## Células disponíveis como destino\n\n");
        for cell in available {
            output.push_str(&format!("- {}\n", cell.name));
        }
        output.push('\n');
    }

    output
}

fn push_org_node(output: &mut String, node: &OrgNode, depth: usize) {
    let indent = "  ".repeat(depth);
    output.push_str(&format!("{}- {}: **{}**", indent, node.kind.label(), node.name));
    if let Some(couple) = &node.couple_name {
        output.push_str(&format!(" ({})", couple));
    }
    output.push('\n');

    for child in &node.children {
        push_org_node(output, child, depth + 1);
    }
}

pub fn generate_tree_markdown(nodes: &[OrgNode]) -> String {
    let mut output = String::new();

    output.push_str("# Estrutura\n\n");
    if nodes.is_empty() {
        output.push_str("Nenhum resultado.\n\n");
        return output;
    }

    for node in nodes {
        push_org_node(&mut output, node, 0);
    }
    output.push('\n');

    output
}

pub fn generate_insight_markdown(response: &InsightResponse) -> String {
    let mut output = String::new();

    output.push_str(response.insight.trim_end());
    output.push_str("\n\n");

    let period = response.period.as_deref().unwrap_or("-");
    match &response.generated_at {
        Some(at) => output.push_str(&format!("*Período: {} | Gerado em: {}*\n", period, at)),
        None => output.push_str(&format!("*Período: {}*\n", period)),
    }

    output
}

fn generate_footer() -> String {
    "---\n\n*Relatório gerado por celulas*\n".to_string()
}

/// Pretty JSON for any of the derived views.
pub fn generate_json_report<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Dashboard, RollUp};
    use crate::context::{Role, Scope};
    use crate::org_tree::NodeKind;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;

    fn metadata() -> ReportMetadata {
        ReportMetadata {
            generated_at: Utc::now(),
            period: "01/03/2024 a 31/03/2024".to_string(),
            role: Role::Pastor,
            scope: Scope::All,
            source: "data/".to_string(),
        }
    }

    fn coordination(name: &str, rate: u32) -> CoordinationStats {
        CoordinationStats {
            id: Uuid::new_v4(),
            name: name.to_string(),
            network_id: Uuid::from_u128(1),
            network_name: Some("Rede Central".to_string()),
            couple_name: None,
            totals: RollUp {
                cells_count: 2,
                members_count: 10,
                visitors: 4,
                reports_count: 3,
                submission_rate: rate,
            },
        }
    }

    fn create_test_report() -> DashboardReport {
        DashboardReport {
            metadata: metadata(),
            dashboard: Dashboard {
                by_network: vec![NetworkStats {
                    id: Uuid::from_u128(1),
                    name: "Rede Central".to_string(),
                    couple_name: Some("João & Ana".to_string()),
                    coordinations_count: 2,
                    totals: RollUp {
                        cells_count: 4,
                        members_count: 20,
                        visitors: 8,
                        reports_count: 6,
                        submission_rate: 75,
                    },
                }],
                by_coordination: vec![coordination("Norte", 100), coordination("Sul", 50)],
                by_cell: vec![],
                by_leader: vec![LeaderStats {
                    cell_id: Uuid::new_v4(),
                    cell_name: "Célula Luz".to_string(),
                    couple_name: "Pedro & Marta".to_string(),
                    reports_count: 2,
                    total_visitors: 5,
                    avg_visitors: 3,
                }],
                kpis: Some(Kpis {
                    total_members: 20,
                    total_cells: 4,
                    total_visitors: 8,
                    total_reports: 6,
                    ..Kpis::default()
                }),
            },
            supervision: vec![],
        }
    }

    #[test]
    fn test_generate_dashboard_markdown() {
        let markdown = generate_dashboard_markdown(&create_test_report(), None);

        assert!(markdown.contains("# Dashboard de Células"));
        assert!(markdown.contains("## Indicadores"));
        assert!(markdown.contains("| Rede Central | João & Ana | 2 | 4 | 20 | 8 | 6 | 75% |"));
        assert!(markdown.contains("## Líderes"));
        assert!(markdown.contains("Visitantes"));
        assert!(!markdown.contains("## Supervisões"));
        assert!(!markdown.contains('⚠'));
    }

    #[test]
    fn test_threshold_flags_low_coordinations() {
        let markdown = generate_dashboard_markdown(&create_test_report(), Some(80));

        assert!(markdown.contains("| 50%"));
        assert!(markdown.contains("50% ⚠ |"));
        assert!(markdown.contains("100% |"));
        assert!(!markdown.contains("100% ⚠"));
    }

    #[test]
    fn test_empty_dashboard() {
        let mut report = create_test_report();
        report.dashboard = Dashboard::default();

        let markdown = generate_dashboard_markdown(&report, None);
        assert!(markdown.contains("Nenhum dado encontrado"));
        assert!(!markdown.contains("## Redes"));
    }

    #[test]
    fn test_generate_lineage_markdown() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let forest = vec![LineageNode {
            cell_id: Uuid::from_u128(1),
            name: "Célula A".to_string(),
            is_root: true,
            multiplied_on: None,
            depth: 0,
            children: vec![LineageNode {
                cell_id: Uuid::from_u128(2),
                name: "Célula B".to_string(),
                is_root: false,
                multiplied_on: Some(date),
                depth: 1,
                children: vec![],
            }],
        }];

        let markdown = generate_lineage_markdown(&forest, &[]);
        assert!(markdown.contains("**Linhagens:** 1 | **Células:** 2"));
        assert!(markdown.contains("- **Célula A**\n"));
        assert!(markdown.contains("  - Célula B *(multiplicada em 01/05/2024)*\n"));
        assert!(!markdown.contains("disponíveis"));
    }

    #[test]
    fn test_generate_tree_markdown() {
        let nodes = vec![OrgNode {
            kind: NodeKind::Network,
            id: Uuid::from_u128(1),
            name: "Rede Jovem".to_string(),
            couple_name: Some("Lucas & Bia".to_string()),
            children: vec![OrgNode {
                kind: NodeKind::Coordination,
                id: Uuid::from_u128(10),
                name: "Norte".to_string(),
                couple_name: None,
                children: vec![],
            }],
        }];

        let markdown = generate_tree_markdown(&nodes);
        assert!(markdown.contains("- Rede: **Rede Jovem** (Lucas & Bia)\n"));
        assert!(markdown.contains("  - Coordenação: **Norte**\n"));
        assert!(generate_tree_markdown(&[]).contains("Nenhum resultado"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&create_test_report()).unwrap();

        assert!(json.contains("\"by_network\""));
        assert!(json.contains("\"submission_rate\": 75"));
        assert!(json.contains("\"metadata\""));
    }
}
