//! Report Assembler
//!
//! Concatenates the frozen section buffers into the final CSV document.
//! No business logic happens here; every value was already projected.

use super::buffer::FrozenSections;
use crate::resource::{ResourceKind, Row};
use chrono::{DateTime, SecondsFormat, Utc};

/// First line of every report
pub const REPORT_TITLE: &str = "GCP INVENTORY";

/// Line written before every section title
const SECTION_SEPARATOR: &str = ",";

/// Default file name prefix
pub const DEFAULT_REPORT_PREFIX: &str = "gcp-inventory";

/// One titled block of the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: ResourceKind,
    pub title: &'static str,
    pub header: Row,
    pub rows: Vec<Row>,
}

/// The finished report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub title: &'static str,
    pub sections: Vec<Section>,
}

impl Report {
    pub fn section(&self, kind: ResourceKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Serialize the report; the same report always renders the same bytes
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(self.title);
        out.push('\n');

        for section in &self.sections {
            out.push_str(SECTION_SEPARATOR);
            out.push('\n');
            out.push_str(section.title);
            out.push('\n');
            out.push_str(&section.header.to_line());
            out.push('\n');
            for row in &section.rows {
                out.push_str(&row.to_line());
                out.push('\n');
            }
        }

        out
    }
}

/// Build the report from frozen buffers, in kind order, omitting kinds
/// without rows
pub fn assemble(sections: &FrozenSections) -> Report {
    let sections = ResourceKind::ALL
        .iter()
        .filter(|&&kind| sections.has_data(kind))
        .map(|&kind| Section {
            kind,
            title: kind.section_title(),
            header: Row::header(kind),
            rows: sections.rows(kind).to_vec(),
        })
        .collect();

    Report {
        title: REPORT_TITLE,
        sections,
    }
}

/// `<prefix>-<ISO-8601 UTC timestamp>.csv`
pub fn report_file_name(prefix: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{}-{}.csv",
        prefix,
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(kind: ResourceKind, fields: &[&str]) -> Row {
        Row::from_fields(kind, fields.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn sample() -> FrozenSections {
        FrozenSections::from_rows([
            (
                ResourceKind::Firewall,
                vec![row(
                    ResourceKind::Firewall,
                    &["p1", "allow-ssh", "default", "INGRESS", "1000", "tcp:22"],
                )],
            ),
            (
                ResourceKind::Vm,
                vec![
                    row(
                        ResourceKind::Vm,
                        &[
                            "p1",
                            "ACTIVE",
                            "web-1",
                            "us-central1-a",
                            "zones/us-central1-a/machineTypes/e2-medium",
                            "10.0.0.2",
                            "34.1.2.3",
                            "RUNNING",
                        ],
                    ),
                    row(
                        ResourceKind::Vm,
                        &[
                            "p2",
                            "ACTIVE",
                            "db-1",
                            "us-central1-b",
                            "zones/us-central1-b/machineTypes/n2-standard-4",
                            "10.0.0.3",
                            "",
                            "RUNNING",
                        ],
                    ),
                ],
            ),
        ])
    }

    #[test]
    fn test_render_format() {
        let rendered = assemble(&sample()).render();
        let expected = "GCP INVENTORY\n\
            ,\n\
            VMs\n\
            projectId,projectStatus,name,zone,machineType,internalIP,externalIP,status\n\
            p1,ACTIVE,web-1,us-central1-a,zones/us-central1-a/machineTypes/e2-medium,\
            10.0.0.2,34.1.2.3,RUNNING\n\
            p2,ACTIVE,db-1,us-central1-b,zones/us-central1-b/machineTypes/n2-standard-4,\
            10.0.0.3,,RUNNING\n\
            ,\n\
            FIREWALL RULES\n\
            projectId,name,network,direction,priority,allowRules\n\
            p1,allow-ssh,default,INGRESS,1000,tcp:22\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_empty_kinds_are_omitted() {
        let report = assemble(&sample());
        let kinds: Vec<ResourceKind> = report.sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ResourceKind::Vm, ResourceKind::Firewall]);
        assert!(report.section(ResourceKind::Disk).is_none());

        let rendered = report.render();
        assert!(!rendered.contains("DISKS"));
        assert!(!rendered.contains("SNAPSHOTS"));
    }

    #[test]
    fn test_empty_collection_renders_title_only() {
        let rendered = assemble(&FrozenSections::default()).render();
        assert_eq!(rendered, "GCP INVENTORY\n");
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let frozen = sample();
        let first = assemble(&frozen).render();
        let second = assemble(&frozen).render();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn test_rows_keep_append_order() {
        let report = assemble(&sample());
        let names: Vec<&str> = report
            .section(ResourceKind::Vm)
            .unwrap()
            .rows
            .iter()
            .map(|r| r.fields()[2].as_str())
            .collect();
        assert_eq!(names, vec!["web-1", "db-1"]);
    }

    #[test]
    fn test_report_file_name() {
        let timestamp = Utc
            .with_ymd_and_hms(2026, 10, 19, 8, 15, 30)
            .unwrap();
        assert_eq!(
            report_file_name(DEFAULT_REPORT_PREFIX, timestamp),
            "gcp-inventory-2026-10-19T08:15:30.000Z.csv"
        );
    }
}
