//! Testing utilities for SBP workspace
//!
//! Shared fixtures for plans, render contexts and child templates.

#![allow(missing_docs)]

use sbp_model::{ProjectIdentifier, RenderContext, Suffix};
use sbp_policy::{BootstrapConfig, BootstrapPlan, Extension};
use serde_json::{json, Value};

pub const SCENARIO_PROJECT: &str = "salesforce-apex-mocks";
pub const TEST_REGION: &str = "us-east-1";
pub const TEST_ACCOUNT: &str = "111122223333";

pub fn project(id: &str) -> ProjectIdentifier {
    ProjectIdentifier::parse(id).unwrap()
}

pub fn fixed_ctx() -> RenderContext {
    RenderContext::resolved(TEST_REGION, TEST_ACCOUNT).unwrap()
}

pub fn plan(id: &str) -> BootstrapPlan {
    BootstrapPlan::for_project(id).unwrap()
}

pub fn salesforce_plan() -> BootstrapPlan {
    plan(SCENARIO_PROJECT)
}

pub fn all_extensions() -> Vec<Extension> {
    vec![
        Extension::BuildLogs,
        Extension::TestReports,
        Extension::Parameters,
        Extension::ImagePull,
        Extension::PrivateRegistry {
            secret: Suffix::parse("dockerhub").unwrap(),
        },
    ]
}

pub fn extended_plan(id: &str) -> BootstrapPlan {
    let config = all_extensions()
        .into_iter()
        .fold(BootstrapConfig::new(project(id)), BootstrapConfig::with_extension);
    BootstrapPlan::build(&config).unwrap()
}

/// Child template with one build project and its role
pub fn child_template(role_name: &str, service: &str) -> Value {
    json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Resources": {
            "BuildRole": {
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "RoleName": role_name,
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": service },
                            "Action": "sts:AssumeRole"
                        }]
                    }
                }
            },
            "BuildProject": {
                "Type": "AWS::CodeBuild::Project",
                "Properties": {
                    "Name": role_name,
                    "ServiceRole": { "Fn::GetAtt": ["BuildRole", "Arn"] }
                }
            }
        }
    })
}

pub fn scoped_child_template(id: &str) -> Value {
    child_template(&format!("build-{id}--main"), "codebuild.amazonaws.com")
}
