//! Property tests over the role builders, plan rendering and isolation.

use proptest::prelude::*;
use sbp_model::{NamePrefix, ResourceKind};
use sbp_policy::{
    build_executor_role, build_orchestrator_role, candidate_names, check_isolation, check_projects,
    BootstrapPlan, RenderContext,
};
use sbp_test_utils::{extended_plan, fixed_ctx};

fn valid_identifier() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z0-9]{1,8}", 1..4)
        .prop_map(|segments| segments.join("-"))
        .prop_filter("child prefixes are reserved", |id| {
            !matches!(id.split('-').next(), Some("build" | "pr"))
        })
}

fn invalid_identifier() -> impl Strategy<Value = String> {
    prop_oneof![
        valid_identifier().prop_map(|id| format!("{id}--x")),
        valid_identifier().prop_map(|id| format!("-{id}")),
        valid_identifier().prop_map(|id| format!("{id}-")),
        valid_identifier().prop_map(|id| format!("{id}_x")),
        valid_identifier().prop_map(|id| format!("A{id}")),
        Just(String::new()),
    ]
}

proptest! {
    #[test]
    fn prop_orchestrator_patterns_contain_identifier(id in valid_identifier()) {
        let role = build_orchestrator_role(&id).unwrap();
        let heads: Vec<String> = NamePrefix::ALL.iter().map(|p| format!("{p}-{id}--")).collect();
        for statement in role.statements() {
            for pattern in statement.rendered_resources(&RenderContext::new()) {
                prop_assert!(
                    heads.iter().any(|h| pattern.ends_with(&format!("{h}*"))),
                    "{} lacks a child prefix", pattern
                );
            }
        }
    }

    #[test]
    fn prop_invalid_identifiers_fail_both_builders(id in invalid_identifier()) {
        let err = build_orchestrator_role(&id).unwrap_err();
        prop_assert!(err.is_invalid_identifier());
        let err = build_executor_role(&id, None).unwrap_err();
        prop_assert!(err.is_invalid_identifier());
    }

    #[test]
    fn prop_builders_are_idempotent(id in valid_identifier()) {
        let a = BootstrapPlan::for_project(&id).unwrap();
        let b = BootstrapPlan::for_project(&id).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.to_json_string(&fixed_ctx()).unwrap(), b.to_json_string(&fixed_ctx()).unwrap());
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn prop_distinct_projects_are_isolated(a in valid_identifier(), b in valid_identifier()) {
        prop_assume!(a != b);
        let report = check_projects(&extended_plan(&a), &extended_plan(&b));
        prop_assert!(report.is_isolated(), "{} vs {}: {:?}", a, b, report.overlaps);
    }

    #[test]
    fn prop_lookalike_projects_are_isolated(
        id in valid_identifier(),
        head in prop_oneof![Just("build"), Just("pr"), Just("cicd")],
    ) {
        let prefixed = format!("{head}-{id}");
        let suffixed = format!("{id}-{head}");
        if head == "cicd" {
            let report = check_projects(&extended_plan(&id), &extended_plan(&prefixed));
            prop_assert!(report.is_isolated(), "{} vs {}: {:?}", id, prefixed, report.overlaps);
        } else {
            prop_assert!(BootstrapPlan::for_project(&prefixed).unwrap_err().is_invalid_identifier());
        }
        let report = check_projects(&extended_plan(&id), &extended_plan(&suffixed));
        prop_assert!(report.is_isolated(), "{} vs {}: {:?}", id, suffixed, report.overlaps);
    }

    #[test]
    fn prop_child_derived_names_are_checked(a in valid_identifier(), b in valid_identifier()) {
        prop_assume!(a != b);
        let other = sbp_test_utils::project(&b);
        let names = candidate_names(&other);
        for kind in [ResourceKind::LogGroup, ResourceKind::ReportGroup] {
            let has_kind = names.iter().any(|n| {
                n.kind() == kind
                    && NamePrefix::ALL.iter().any(|p| n.name().starts_with(&p.name_head(&other)))
            });
            prop_assert!(has_kind);
        }
        let report = check_isolation(&extended_plan(&a), &names);
        prop_assert_eq!(report.names_checked, names.len());
        prop_assert!(report.is_isolated(), "{} vs {}: {:?}", a, b, report.overlaps);
    }

    #[test]
    fn prop_only_describe_is_unscoped(id in valid_identifier()) {
        let plan = extended_plan(&id);
        for role in plan.roles() {
            for statement in role.all_statements() {
                if statement.resources().iter().any(|r| r.is_unscoped()) {
                    prop_assert!(statement.is_unscoped_read_only());
                    prop_assert!(statement.grants("cloudformation:DescribeStacks"));
                }
            }
        }
    }
}

#[test]
fn own_child_names_are_not_overlaps() {
    let plan = extended_plan("x");
    let mut names = candidate_names(&sbp_test_utils::project("y"));
    names.push(sbp_model::ResourceName::prefixed(
        ResourceKind::Project,
        NamePrefix::Build,
        &sbp_test_utils::project("x"),
        &sbp_model::Suffix::parse("main").unwrap(),
    ));
    assert!(check_isolation(&plan, &names).is_isolated());
}
