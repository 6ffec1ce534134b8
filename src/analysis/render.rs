//! Markdown rendering of the final report

use std::fmt::Write;

use crate::types::{FinalReport, RankedText, StageAnalysis};

/// How many pain points, positives and suggestions to list per stage
const LIST_LIMIT: usize = 5;

pub fn render_markdown(report: &FinalReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = write_report(&mut out, report);
    out
}

fn write_report(out: &mut String, report: &FinalReport) -> std::fmt::Result {
    writeln!(out, "# Workshop Pilot Report")?;
    writeln!(out)?;
    writeln!(out, "Generated {}  ", report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out, "Input fingerprint `{}`", report.input_fingerprint)?;
    writeln!(out)?;

    write_summary(out, report)?;
    write_problematic(out, report)?;
    writeln!(out, "## 3. Stage Analysis")?;
    writeln!(out)?;
    for stage in &report.stages {
        write_stage(out, stage, report.struggling_threshold)?;
    }
    write_maturity(out, report)?;
    write_departments(out, report)?;
    write_data_quality(out, report)?;
    Ok(())
}

fn write_summary(out: &mut String, report: &FinalReport) -> std::fmt::Result {
    let t = &report.totals;
    writeln!(out, "## 1. Summary")?;
    writeln!(out)?;
    writeln!(out, "| Metric | Value |")?;
    writeln!(out, "|---|---|")?;
    writeln!(out, "| Personas | {} |", t.personas)?;
    writeln!(out, "| Completed | {} |", t.completed)?;
    writeln!(out, "| Dropped out | {} |", t.dropped_out)?;
    writeln!(out, "| Errored | {} |", t.errored)?;
    writeln!(out, "| Interrupted | {} |", t.interrupted)?;
    writeln!(out, "| Degraded stage results | {} |", t.degraded_results)?;
    writeln!(out, "| Average satisfaction | {} |", score(t.average_satisfaction))?;
    writeln!(out, "| Would recommend | {} |", percent(t.recommendation_rate))?;
    writeln!(out)?;
    Ok(())
}

fn write_problematic(out: &mut String, report: &FinalReport) -> std::fmt::Result {
    writeln!(out, "## 2. Problematic Stages")?;
    writeln!(out)?;
    if report.problematic_stages.is_empty() {
        writeln!(out, "No stage had participants.")?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "| Rank | Stage | Satisfaction | Participants | Top pain points |")?;
    writeln!(out, "|---|---|---|---|---|")?;
    for p in &report.problematic_stages {
        writeln!(
            out,
            "| {} | {}. {} | {:.2} | {} | {} |",
            p.rank,
            p.stage_number,
            cell(&p.stage_name),
            p.composite_satisfaction,
            p.participants,
            cell(&p.top_pain_points.join("; "))
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_stage(out: &mut String, stage: &StageAnalysis, threshold: f64) -> std::fmt::Result {
    writeln!(out, "### Stage {}: {}", stage.stage_number, stage.stage_name)?;
    writeln!(out)?;
    if stage.participants == 0 {
        writeln!(out, "No persona reached this stage.")?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(
        out,
        "- Participants: {} (dropouts here: {}, degraded: {})",
        stage.participants, stage.dropouts, stage.degraded_results
    )?;
    writeln!(
        out,
        "- Minutes: {} actual vs {:.1} expected",
        one_decimal(stage.average_minutes),
        stage.expected_minutes
    )?;
    writeln!(
        out,
        "- Ease {} / Clarity {} / Value {} / Composite {}",
        score(stage.average_ease),
        score(stage.average_clarity),
        score(stage.average_value),
        score(stage.composite_satisfaction)
    )?;
    let tp = &stage.time_perception;
    writeln!(
        out,
        "- Time: {} too short, {} just right, {} too long",
        tp.too_short, tp.just_right, tp.too_long
    )?;
    writeln!(out)?;

    if !stage.pain_points.is_empty() {
        writeln!(out, "**Pain points**")?;
        writeln!(out)?;
        for p in stage.pain_points.iter().take(LIST_LIMIT) {
            writeln!(out, "- {} ({})", p.text, p.count)?;
        }
        writeln!(out)?;
    }
    write_ranked(out, "Positive feedback", &stage.positive_points)?;
    write_ranked(out, "Suggestions", &stage.suggestions)?;

    if !stage.struggling.is_empty() {
        writeln!(out, "**Struggling personas** (composite below {:.1})", threshold)?;
        writeln!(out)?;
        writeln!(out, "| Persona | Department | Maturity | Score | Issues |")?;
        writeln!(out, "|---|---|---|---|---|")?;
        for s in &stage.struggling {
            writeln!(
                out,
                "| {} {} | {} | {} | {:.2} | {} |",
                s.persona.id,
                cell(&s.persona.name),
                cell(&s.persona.department),
                s.persona.digital_maturity,
                s.composite,
                cell(&s.pain_points.join("; "))
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn write_ranked(out: &mut String, title: &str, items: &[RankedText]) -> std::fmt::Result {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "**{}**", title)?;
    writeln!(out)?;
    for item in items.iter().take(LIST_LIMIT) {
        writeln!(out, "- {} ({})", item.text, item.count)?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_maturity(out: &mut String, report: &FinalReport) -> std::fmt::Result {
    writeln!(out, "## 4. Digital Maturity")?;
    writeln!(out)?;
    writeln!(out, "| Maturity | Personas | Satisfaction | Struggles most at |")?;
    writeln!(out, "|---|---|---|---|")?;
    for row in &report.maturity_cross_tab {
        let stages = row
            .struggling_stages
            .iter()
            .take(3)
            .map(|s| format!("{}. {} ({})", s.stage_number, s.stage_name, s.struggling))
            .collect::<Vec<_>>()
            .join("; ");
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            row.maturity,
            row.personas,
            score(row.average_satisfaction),
            cell(if stages.is_empty() { "-" } else { &stages })
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_departments(out: &mut String, report: &FinalReport) -> std::fmt::Result {
    writeln!(out, "## 5. Departments")?;
    writeln!(out)?;
    writeln!(out, "| Department | Personas | Satisfaction | Top pain points |")?;
    writeln!(out, "|---|---|---|---|")?;
    for seg in &report.department_segments {
        let pains = seg
            .top_pain_points
            .iter()
            .map(|p| format!("{} ({})", p.text, p.count))
            .collect::<Vec<_>>()
            .join("; ");
        writeln!(
            out,
            "| {} | {} | {} | {} |",
            cell(&seg.department),
            seg.personas,
            score(seg.average_satisfaction),
            cell(if pains.is_empty() { "-" } else { &pains })
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_data_quality(out: &mut String, report: &FinalReport) -> std::fmt::Result {
    writeln!(out, "## 6. Data Quality")?;
    writeln!(out)?;
    writeln!(
        out,
        "{} degraded stage results were substituted with neutral values.",
        report.totals.degraded_results
    )?;
    writeln!(out)?;
    if !report.skipped_artifacts.is_empty() {
        writeln!(out, "Skipped artifacts:")?;
        writeln!(out)?;
        for skipped in &report.skipped_artifacts {
            writeln!(out, "- `{}`: {}", skipped.path, skipped.reason)?;
        }
        writeln!(out)?;
    }
    writeln!(out, "Sources:")?;
    writeln!(out)?;
    for source in &report.sources {
        writeln!(
            out,
            "- {}: {} artifacts{}",
            source.group_id,
            source.artifacts_loaded,
            source
                .run_id
                .as_deref()
                .map(|id| format!(" (run {})", id))
                .unwrap_or_default()
        )?;
    }
    Ok(())
}

fn score(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn one_decimal(value: Option<f64>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string())
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.0}%", v * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

/// Keep table cells on one line and free of column breaks
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::types::{ProblematicStage, ReportTotals, SkippedArtifact};

    fn empty_report() -> FinalReport {
        FinalReport {
            generated_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            input_fingerprint: "ab".repeat(32),
            stage_count: 0,
            struggling_threshold: 7.5,
            totals: ReportTotals::default(),
            stages: vec![],
            problematic_stages: vec![],
            maturity_cross_tab: vec![],
            department_segments: vec![],
            skipped_artifacts: vec![],
            sources: vec![],
        }
    }

    #[test]
    fn test_sections_present() {
        let md = render_markdown(&empty_report());
        for heading in ["# Workshop Pilot Report", "## 1. Summary", "## 2. Problematic Stages", "## 6. Data Quality"] {
            assert!(md.contains(heading), "missing {}", heading);
        }
        assert!(md.contains("2025-03-01 12:00:00 UTC"));
    }

    #[test]
    fn test_table_cells_escaped() {
        let mut report = empty_report();
        report.problematic_stages.push(ProblematicStage {
            rank: 1,
            stage_number: 4,
            stage_name: "A|B".into(),
            composite_satisfaction: 5.0,
            participants: 3,
            top_pain_points: vec!["line\nbreak".into()],
        });
        report.skipped_artifacts.push(SkippedArtifact {
            path: "group1/P002_result.json".into(),
            reason: "listed in group summary but missing".into(),
        });

        let md = render_markdown(&report);
        assert!(md.contains("| 1 | 4. A\\|B | 5.00 | 3 | line break |"));
        assert!(md.contains("`group1/P002_result.json`"));
    }
}
