use super::*;
use crate::controller::test_fixtures::*;

fn not_found() -> StoreError {
    StoreError::NotFound {
        kind: "ClusterVersion",
        name: "version".to_string(),
    }
}

#[test]
fn test_mapping_table_covers_five_distinct_types() {
    let mut types: Vec<_> = CLUSTER_VERSION_CONDITIONS
        .iter()
        .map(|m| m.condition_type.as_str())
        .collect();
    types.sort_unstable();
    types.dedup();
    assert_eq!(types.len(), 5);

    let progressing = CLUSTER_VERSION_CONDITIONS
        .iter()
        .find(|m| m.condition_type == ControlPlaneConditionType::ClusterVersionProgressing)
        .unwrap();
    assert_eq!(progressing.cluster_version_type, "Progressing");
}

#[test]
fn test_fetch_error_makes_every_condition_unknown() {
    let error = not_found();
    let derived = derive_cluster_version_conditions(Err(&error), Some(4), fixed_now());

    assert_eq!(derived.len(), 5);
    for condition in &derived {
        assert_eq!(condition.status, "Unknown");
        assert_eq!(condition.reason, STATUS_UNKNOWN_REASON);
        assert_eq!(
            condition.message,
            "failed to get clusterVersion: ClusterVersion version not found"
        );
        assert_eq!(condition.observed_generation, Some(4));
    }
}

#[test]
fn test_missing_condition_is_unknown_with_not_found_message() {
    let cv = cluster_version(
        vec![cvo_condition("Available", "True", Some("AsExpected"), None)],
        vec![],
    );

    let derived = derive_cluster_version_conditions(Ok(&cv), Some(2), fixed_now());

    let failing = derived
        .iter()
        .find(|c| c.type_ == "ClusterVersionFailing")
        .unwrap();
    assert_eq!(failing.status, "Unknown");
    assert_eq!(failing.reason, STATUS_UNKNOWN_REASON);
    assert_eq!(failing.message, CONDITION_NOT_FOUND_MESSAGE);

    let available = derived
        .iter()
        .find(|c| c.type_ == "ClusterVersionAvailable")
        .unwrap();
    assert_eq!(available.status, "True");
    assert_eq!(available.reason, "AsExpected");
    assert_eq!(available.message, "");
}

#[test]
fn test_present_conditions_are_mirrored_with_generation() {
    let cv = cluster_version(healthy_cvo_conditions(), vec![]);

    let derived = derive_cluster_version_conditions(Ok(&cv), Some(9), fixed_now());

    for (mapping, condition) in CLUSTER_VERSION_CONDITIONS.iter().zip(&derived) {
        let source =
            find_cluster_version_condition(cv.conditions(), mapping.cluster_version_type).unwrap();
        assert_eq!(condition.type_, mapping.condition_type.as_str());
        assert_eq!(condition.status, source.status);
        assert_eq!(Some(&condition.reason), source.reason.as_ref());
        assert_eq!(condition.message, source.message.clone().unwrap_or_default());
        assert_eq!(condition.observed_generation, Some(9));
    }
}

#[test]
fn test_empty_or_absent_reason_falls_back() {
    let cv = cluster_version(
        vec![
            cvo_condition("Failing", "False", Some(""), Some("no failure")),
            cvo_condition("Upgradeable", "True", None, None),
        ],
        vec![],
    );

    let derived = derive_cluster_version_conditions(Ok(&cv), Some(1), fixed_now());

    for type_ in ["ClusterVersionFailing", "ClusterVersionUpgradeable"] {
        let condition = derived.iter().find(|c| c.type_ == type_).unwrap();
        assert_eq!(condition.reason, FROM_CLUSTER_VERSION_REASON);
        assert!(!condition.reason.is_empty());
    }
}

#[test]
fn test_reason_is_never_empty() {
    let error = not_found();
    let cv = cluster_version(
        vec![cvo_condition("Available", "True", Some(""), None)],
        vec![],
    );

    for observed in [Ok(&cv), Err(&error)] {
        for condition in derive_cluster_version_conditions(observed, None, fixed_now()) {
            assert!(!condition.reason.is_empty(), "{:?}", condition);
        }
    }
}

#[test]
fn test_set_status_condition_appends_new_types_in_order() {
    let cv = cluster_version(healthy_cvo_conditions(), vec![]);
    let mut conditions = vec![Condition {
        type_: "Available".to_string(),
        status: "True".to_string(),
        reason: "AsExpected".to_string(),
        message: String::new(),
        observed_generation: Some(1),
        last_transition_time: Time(fixed_now()),
    }];

    for condition in derive_cluster_version_conditions(Ok(&cv), Some(1), fixed_now()) {
        assert!(set_status_condition(&mut conditions, condition));
    }

    let types: Vec<_> = conditions.iter().map(|c| c.type_.as_str()).collect();
    assert_eq!(
        types,
        vec![
            "Available",
            "ClusterVersionFailing",
            "ClusterVersionReleaseAccepted",
            "ClusterVersionProgressing",
            "ClusterVersionUpgradeable",
            "ClusterVersionAvailable",
        ]
    );
}

#[test]
fn test_set_status_condition_reapply_is_noop() {
    let cv = cluster_version(healthy_cvo_conditions(), vec![]);
    let first = with_conditions(
        &HostedControlPlaneStatus::default(),
        derive_cluster_version_conditions(Ok(&cv), Some(1), fixed_now()),
    );

    let later = fixed_now() + chrono::Duration::minutes(10);
    let second = with_conditions(
        &first,
        derive_cluster_version_conditions(Ok(&cv), Some(1), later),
    );

    assert_eq!(first, second);
    for condition in &second.conditions {
        assert_eq!(condition.last_transition_time, Time(fixed_now()));
    }
}

#[test]
fn test_set_status_condition_keeps_transition_time_when_only_message_changes() {
    let mut conditions = Vec::new();
    let original = Condition {
        type_: "ClusterVersionProgressing".to_string(),
        status: "True".to_string(),
        reason: "AsExpected".to_string(),
        message: "Working towards 4.12.1: 10% complete".to_string(),
        observed_generation: Some(1),
        last_transition_time: Time(fixed_now()),
    };
    set_status_condition(&mut conditions, original.clone());

    let later = fixed_now() + chrono::Duration::minutes(5);
    let changed = set_status_condition(
        &mut conditions,
        Condition {
            message: "Working towards 4.12.1: 50% complete".to_string(),
            observed_generation: Some(2),
            last_transition_time: Time(later),
            ..original.clone()
        },
    );

    assert!(changed);
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].message, "Working towards 4.12.1: 50% complete");
    assert_eq!(conditions[0].observed_generation, Some(2));
    assert_eq!(conditions[0].last_transition_time, Time(fixed_now()));
}

#[test]
fn test_set_status_condition_moves_transition_time_on_status_change() {
    let mut conditions = Vec::new();
    let original = Condition {
        type_: "ClusterVersionAvailable".to_string(),
        status: "True".to_string(),
        reason: "AsExpected".to_string(),
        message: String::new(),
        observed_generation: Some(1),
        last_transition_time: Time(fixed_now()),
    };
    set_status_condition(&mut conditions, original.clone());

    let later = fixed_now() + chrono::Duration::minutes(5);
    set_status_condition(
        &mut conditions,
        Condition {
            status: "Unknown".to_string(),
            reason: STATUS_UNKNOWN_REASON.to_string(),
            last_transition_time: Time(later),
            ..original
        },
    );

    assert_eq!(conditions[0].status, "Unknown");
    assert_eq!(conditions[0].reason, STATUS_UNKNOWN_REASON);
    assert_eq!(conditions[0].last_transition_time, Time(later));
}

#[test]
fn test_with_conditions_leaves_release_fields_untouched() {
    let status = control_plane(IMAGE_4_12_1, Some(IMAGE_4_12_0), 1)
        .status
        .unwrap();
    let error = not_found();

    let next = with_conditions(
        &status,
        derive_cluster_version_conditions(Err(&error), Some(1), fixed_now()),
    );

    assert_eq!(next.release_image, status.release_image);
    assert_eq!(next.version, status.version);
    assert_eq!(next.conditions.len(), 5);
}
