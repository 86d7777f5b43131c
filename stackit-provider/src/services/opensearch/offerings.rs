//! Service plan lookup through the offerings catalogue

use thiserror::Error;

use super::api::Offering;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanLookupError {
    #[error("couldn't find version '{version}', available versions are: {}", bullet_list(available))]
    UnknownVersion {
        version: String,
        available: Vec<String>,
    },

    #[error(
        "couldn't find plan_name '{plan_name}' for version {version}, available names are: {}",
        bullet_list(available)
    )]
    UnknownPlanName {
        plan_name: String,
        version: String,
        available: Vec<String>,
    },

    #[error(
        "couldn't find plan_name and version for plan_id '{plan_id}', known plans are: {}",
        bullet_list(known)
    )]
    UnknownPlanId { plan_id: String, known: Vec<String> },
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|item| format!("\n- {}", item)).collect()
}

/// Plan id for a version and plan name, both matched case-insensitively
pub fn resolve_plan_id(
    offerings: &[Offering],
    version: &str,
    plan_name: &str,
) -> Result<String, PlanLookupError> {
    let mut available_versions = Vec::new();
    let mut available_names = Vec::new();
    let mut version_found = false;

    for offering in offerings {
        let offered_version = offering.version.as_deref().unwrap_or_default();
        if !offered_version.eq_ignore_ascii_case(version) {
            available_versions.push(offered_version.to_string());
            continue;
        }
        version_found = true;

        for plan in &offering.plans {
            let Some(name) = plan.name.as_deref() else {
                continue;
            };
            if name.eq_ignore_ascii_case(plan_name) {
                if let Some(id) = &plan.id {
                    return Ok(id.clone());
                }
            }
            available_names.push(name.to_string());
        }
    }

    if version_found {
        Err(PlanLookupError::UnknownPlanName {
            plan_name: plan_name.to_string(),
            version: version.to_string(),
            available: available_names,
        })
    } else {
        Err(PlanLookupError::UnknownVersion {
            version: version.to_string(),
            available: available_versions,
        })
    }
}

/// Plan name and version for a plan id, matched case-insensitively
///
/// The returned values are spelled exactly as the catalogue spells them.
pub fn resolve_plan_name_and_version(
    offerings: &[Offering],
    plan_id: &str,
) -> Result<(String, String), PlanLookupError> {
    for offering in offerings {
        for plan in &offering.plans {
            if plan.id.as_deref().is_some_and(|id| id.eq_ignore_ascii_case(plan_id)) {
                return Ok((
                    plan.name.clone().unwrap_or_default(),
                    offering.version.clone().unwrap_or_default(),
                ));
            }
        }
    }

    Err(PlanLookupError::UnknownPlanId {
        plan_id: plan_id.to_string(),
        known: offerings
            .iter()
            .flat_map(|o| o.plans.iter().filter_map(|p| p.name.clone()))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::opensearch::api::Plan;

    fn plan(id: &str, name: &str) -> Plan {
        Plan {
            id: Some(id.to_string()),
            name: Some(name.to_string()),
            description: None,
            free: None,
        }
    }

    fn catalogue() -> Vec<Offering> {
        vec![
            Offering {
                name: Some("opensearch".to_string()),
                version: Some("2".to_string()),
                plans: vec![plan("P-1", "stackit-opensearch-1.2.10-single"), plan("p-2", "stackit-opensearch-2.4.10-replica")],
            },
            Offering {
                name: Some("opensearch".to_string()),
                version: Some("1".to_string()),
                plans: vec![plan("p-3", "stackit-opensearch-1.2.10-single")],
            },
        ]
    }

    #[test]
    fn plan_id_matches_case_insensitively() {
        let offerings = catalogue();
        assert_eq!(
            resolve_plan_id(&offerings, "2", "STACKIT-OPENSEARCH-2.4.10-REPLICA").unwrap(),
            "p-2"
        );
        assert_eq!(
            resolve_plan_id(&offerings, "1", "stackit-opensearch-1.2.10-single").unwrap(),
            "p-3"
        );
    }

    #[test]
    fn unknown_version_lists_versions() {
        let err = resolve_plan_id(&catalogue(), "3", "x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "couldn't find version '3', available versions are: \n- 2\n- 1"
        );
    }

    #[test]
    fn unknown_plan_name_lists_names_of_version() {
        let err = resolve_plan_id(&catalogue(), "1", "huge").unwrap_err();
        assert_eq!(
            err,
            PlanLookupError::UnknownPlanName {
                plan_name: "huge".to_string(),
                version: "1".to_string(),
                available: vec!["stackit-opensearch-1.2.10-single".to_string()],
            }
        );
    }

    #[test]
    fn plan_id_resolves_exact_name_and_version() {
        let (name, version) = resolve_plan_name_and_version(&catalogue(), "p-1").unwrap();
        assert_eq!(name, "stackit-opensearch-1.2.10-single");
        assert_eq!(version, "2");
    }

    #[test]
    fn absent_plan_id_lists_all_plan_names() {
        let err = resolve_plan_name_and_version(&catalogue(), "p-9").unwrap_err();
        match &err {
            PlanLookupError::UnknownPlanId { known, .. } => assert_eq!(known.len(), 3),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("stackit-opensearch-2.4.10-replica"));
    }
}
