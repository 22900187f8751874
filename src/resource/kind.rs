//! Resource kinds covered by the inventory

use std::fmt;

/// One category of cloud object being inventoried.
///
/// The declaration order is the section order of the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Vm,
    Disk,
    Snapshot,
    Firewall,
    IamBinding,
}

impl ResourceKind {
    /// Every kind, in report order
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Vm,
        ResourceKind::Disk,
        ResourceKind::Snapshot,
        ResourceKind::Firewall,
        ResourceKind::IamBinding,
    ];

    /// Position in [`ResourceKind::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Ordered column names of this kind's section
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Self::Vm => &[
                "projectId",
                "projectStatus",
                "name",
                "zone",
                "machineType",
                "internalIP",
                "externalIP",
                "status",
            ],
            Self::Disk => &["projectId", "name", "zone", "sizeGb", "type", "status"],
            Self::Snapshot => &[
                "projectId",
                "name",
                "creationTimestamp",
                "diskSizeGb",
                "status",
            ],
            Self::Firewall => &[
                "projectId",
                "name",
                "network",
                "direction",
                "priority",
                "allowRules",
            ],
            Self::IamBinding => &["projectId", "principalType", "principal", "roles"],
        }
    }

    /// Title line printed above the section header
    pub fn section_title(self) -> &'static str {
        match self {
            Self::Vm => "VMs",
            Self::Disk => "DISKS",
            Self::Snapshot => "SNAPSHOTS",
            Self::Firewall => "FIREWALL RULES",
            Self::IamBinding => "IAM - USERS AND ROLES",
        }
    }

    /// Short identifier used in logs and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vm => "vm",
            Self::Disk => "disk",
            Self::Snapshot => "snapshot",
            Self::Firewall => "firewall",
            Self::IamBinding => "iam",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_declaration_order() {
        for (i, kind) in ResourceKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        let mut sorted = ResourceKind::ALL;
        sorted.sort();
        assert_eq!(sorted, ResourceKind::ALL);
    }

    #[test]
    fn test_every_schema_starts_with_project_id() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.columns()[0], "projectId", "{kind}");
        }
    }

    #[test]
    fn test_column_counts() {
        assert_eq!(ResourceKind::Vm.columns().len(), 8);
        assert_eq!(ResourceKind::Disk.columns().len(), 6);
        assert_eq!(ResourceKind::Snapshot.columns().len(), 5);
        assert_eq!(ResourceKind::Firewall.columns().len(), 6);
        assert_eq!(ResourceKind::IamBinding.columns().len(), 4);
    }
}
