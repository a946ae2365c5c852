//! Static filename classification table.
//!
//! Entries are scanned in declaration order; `priority` only orders how
//! matched files are processed and written. Exclude tokens let a generic
//! token (`Roster`) step aside for its specific variants (`Roster_Current`).
//! Changing this table requires a redeploy.

use crate::models::Category;

/// One filename rule.
#[derive(Debug, PartialEq, Eq)]
pub struct ClassificationRule {
    pub match_token: &'static str,
    pub category: Category,
    pub key: &'static str,
    pub exclude_tokens: &'static [&'static str],
    pub priority: u32,
}

impl ClassificationRule {
    /// Case-sensitive substring match, voided by any exclude token.
    pub fn matches(&self, filename: &str) -> bool {
        filename.contains(self.match_token)
            && !self
                .exclude_tokens
                .iter()
                .any(|token| filename.contains(token))
    }

    /// `category|key`, the grouping key used during reassembly.
    pub fn compound_key(&self) -> String {
        format!("{}|{}", self.category, self.key)
    }
}

const fn rule(
    match_token: &'static str,
    category: Category,
    key: &'static str,
    exclude_tokens: &'static [&'static str],
    priority: u32,
) -> ClassificationRule {
    ClassificationRule {
        match_token,
        category,
        key,
        exclude_tokens,
        priority,
    }
}

use Category::{Config, Data};

pub static RULES: &[ClassificationRule] = &[
    // Planning lists and dashboard settings
    rule("PL_Paths", Config, "paths", &[], 1),
    rule("PL_Units", Config, "units", &[], 2),
    rule("PL_Thresholds", Config, "thresholds", &[], 3),
    rule("PL_Courses", Config, "courses", &[], 4),
    rule("PL_Roles", Config, "roles", &[], 5),
    rule("PL_Locations", Config, "locations", &[], 6),
    rule("PL_Holidays", Config, "holidays", &[], 7),
    rule("PL_Contacts", Config, "contacts", &[], 8),
    rule("Dashboard_Settings", Config, "settings", &[], 9),
    rule("Org_Structure", Config, "orgStructure", &[], 10),
    rule("Readiness_Rules", Config, "readinessRules", &[], 11),
    rule("Skill_Matrix", Config, "skillMatrix", &[], 12),
    // Roster and membership
    rule("Roster", Data, "roster", &["Current", "History"], 20),
    rule("Roster_Current", Data, "rosterCurrent", &[], 21),
    rule("Roster_History", Data, "rosterHistory", &[], 22),
    rule("Members", Data, "members", &["Inactive"], 23),
    rule("Members_Inactive", Data, "membersInactive", &[], 24),
    rule("Member_List", Data, "members", &[], 25),
    rule("Workspace_Accounts", Data, "workspaceAccounts", &[], 26),
    rule("Vacancies", Data, "vacancies", &[], 27),
    rule("Promotions", Data, "promotions", &[], 28),
    // Readiness inputs
    rule("Training_Records", Data, "training", &["Pending"], 30),
    rule("Training_Pending", Data, "trainingPending", &[], 31),
    rule("Certifications", Data, "certifications", &["Expired"], 32),
    rule("Certifications_Expired", Data, "certificationsExpired", &[], 33),
    rule("Medical", Data, "medical", &["Overdue"], 34),
    rule("Medical_Overdue", Data, "medicalOverdue", &[], 35),
    rule("Qualifications", Data, "qualifications", &[], 36),
    rule("Equipment", Data, "equipment", &[], 37),
    rule("Leave_Schedule", Data, "leave", &[], 38),
    rule("Deployments", Data, "deployments", &["Planned"], 39),
    rule("Deployments_Planned", Data, "deploymentsPlanned", &[], 40),
    rule("Attendance", Data, "attendance", &[], 41),
    rule("Readiness_Summary", Data, "readinessSummary", &[], 42),
    rule("Issues_Log", Data, "issues", &[], 43),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_priorities_unique() {
        let mut seen = HashSet::new();
        for r in RULES {
            assert!(seen.insert(r.priority), "duplicate priority {}", r.priority);
        }
    }

    #[test]
    fn test_match_tokens_unique() {
        let mut seen = HashSet::new();
        for r in RULES {
            assert!(seen.insert(r.match_token), "duplicate token {}", r.match_token);
        }
    }

    #[test]
    fn test_exclude_voids_match() {
        let roster = RULES.iter().find(|r| r.key == "roster").unwrap();
        assert!(roster.matches("Roster_2026.csv"));
        assert!(!roster.matches("Roster_Current.csv"));
        assert!(!roster.matches("Roster_History_Q1.csv"));
    }

    #[test]
    fn test_compound_key() {
        assert_eq!(RULES[0].compound_key(), "config|paths");
    }
}
