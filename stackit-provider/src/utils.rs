//! Utility functions shared by services

use std::sync::OnceLock;

use regex::Regex;

/// Project roles from before the role model change; still accepted as members
pub const LEGACY_PROJECT_ROLES: [&str; 4] = [
    "project.admin",
    "project.auditor",
    "project.member",
    "project.owner",
];

pub fn is_legacy_project_role(role: &str) -> bool {
    LEGACY_PROJECT_ROLES.contains(&role)
}

/// Remove leading zeros from the numbers of a cron schedule
///
/// The API stores "00 00 * * *" as "0 0 * * *"; comparing the simplified form
/// keeps the configured value from showing up as a change.
pub fn simplify_backup_schedule(schedule: &str) -> String {
    static LEADING_ZEROS: OnceLock<Regex> = OnceLock::new();
    let re = LEADING_ZEROS.get_or_init(|| {
        Regex::new(r"\b0+\d+").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    });
    re.replace_all(schedule, |caps: &regex::Captures| {
        let trimmed = caps[0].trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    })
    .into_owned()
}

/// Region of a regional object: the configured override, else the provider region
pub fn region_with_override(configured: Option<&str>, provider_region: &str) -> String {
    match configured {
        Some(region) if !region.is_empty() => region.to_string(),
        _ => provider_region.to_string(),
    }
}

/// Attribute description suffix listing the accepted values
pub fn supported_values_documentation(values: &[&str]) -> String {
    if values.is_empty() {
        return String::new();
    }
    let quoted: Vec<String> = values.iter().map(|v| format!("`{}`", v)).collect();
    format!("Supported values are: {}.", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplify_backup_schedule() {
        assert_eq!(simplify_backup_schedule("00 00 * * *"), "0 0 * * *");
        assert_eq!(simplify_backup_schedule("05 010 * * *"), "5 10 * * *");
        assert_eq!(simplify_backup_schedule("0 0 * * *"), "0 0 * * *");
        assert_eq!(simplify_backup_schedule("30 10 * * 1"), "30 10 * * 1");
        assert_eq!(simplify_backup_schedule(""), "");
        assert_eq!(simplify_backup_schedule("0 100 * * *"), "0 100 * * *");
    }

    #[test]
    fn test_region_with_override() {
        assert_eq!(region_with_override(Some("eu02"), "eu01"), "eu02");
        assert_eq!(region_with_override(Some(""), "eu01"), "eu01");
        assert_eq!(region_with_override(None, "eu01"), "eu01");
    }

    #[test]
    fn test_supported_values_documentation() {
        assert_eq!(supported_values_documentation(&[]), "");
        assert_eq!(
            supported_values_documentation(&["a", "b"]),
            "Supported values are: `a`, `b`."
        );
    }

    #[test]
    fn test_is_legacy_project_role() {
        assert!(is_legacy_project_role("project.owner"));
        assert!(!is_legacy_project_role("owner"));
    }
}
