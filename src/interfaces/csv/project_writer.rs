use crate::application::collections::ProjectSummary;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct ProjectRecord {
    project: u32,
    goal: Decimal,
    funded: Decimal,
    percent: Decimal,
    funders: usize,
    days_left: Option<u32>,
    state: &'static str,
}

impl From<&ProjectSummary> for ProjectRecord {
    fn from(summary: &ProjectSummary) -> Self {
        Self {
            project: summary.project_id,
            goal: summary.goal.normalize(),
            funded: summary.funded.value().normalize(),
            percent: summary.percent.normalize(),
            funders: summary.funders,
            days_left: summary.days_left,
            state: summary.state.as_str(),
        }
    }
}

/// Writes project summaries as CSV, one row per project.
pub struct ProjectWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ProjectWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_summaries(&mut self, summaries: &[ProjectSummary]) -> Result<()> {
        for summary in summaries {
            self.writer.serialize(ProjectRecord::from(summary))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::tests::sample_project;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_writes_header_and_rows() {
        let mut project = sample_project();
        project.add_funds(dec!(50.00));
        let active = ProjectSummary::of(&project, 2, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());

        project.add_funds(dec!(150));
        let finished =
            ProjectSummary::of(&project, 3, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());

        let mut out = Vec::new();
        ProjectWriter::new(&mut out)
            .write_summaries(&[active, finished])
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "project,goal,funded,percent,funders,days_left,state");
        assert_eq!(lines[1], "1,200,50,25,2,7,active");
        assert_eq!(lines[2], "1,200,200,100,3,0,successful");
    }

    #[test]
    fn test_no_deadline_leaves_days_left_empty() {
        let mut project = sample_project();
        project.funding_days = 0;
        let summary = ProjectSummary::of(&project, 0, project.funding_start);

        let mut out = Vec::new();
        ProjectWriter::new(&mut out)
            .write_summaries(&[summary])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1,200,0,0,0,,active"));
    }
}
