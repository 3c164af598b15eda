//! Baseline hardening rules.

use rampart_core::rules::{require_at_least, require_non_empty_list, require_present, require_true};
use rampart_core::{Level, Property, ResourceNode, Rule, RuleInput, Verdict};
use serde_json::Value;

pub const S3_ENCRYPTION: &str = "baseline-S3Encryption";
pub const S3_PUBLIC_ACCESS: &str = "baseline-S3PublicAccessBlock";
pub const SG_OPEN_INGRESS: &str = "baseline-SgOpenIngress";
pub const LAMBDA_IN_VPC: &str = "baseline-LambdaInsideVpc";
pub const SQS_SSL_ONLY: &str = "baseline-SqsSslRequestsOnly";
pub const LOG_RETENTION: &str = "baseline-LogGroupRetention";

pub fn rules() -> Vec<Rule> {
    vec![
        Rule::new(S3_ENCRYPTION, Level::Error, s3_encryption)
            .with_info("The S3 bucket does not have default server-side encryption enabled.")
            .with_explanation("Default encryption protects objects at rest without relying on every writer to request it.")
            .for_kinds(["AWS::S3::Bucket"]),
        Rule::new(S3_PUBLIC_ACCESS, Level::Error, s3_public_access)
            .with_info("The S3 bucket does not block all public access.")
            .with_explanation("All four public access block settings must be enabled to prevent ACL- and policy-based exposure.")
            .for_kinds(["AWS::S3::Bucket"]),
        Rule::new(SG_OPEN_INGRESS, Level::Warn, sg_open_ingress)
            .with_info("The security group allows unrestricted inbound traffic.")
            .with_explanation("Ingress from 0.0.0.0/0 or ::/0 exposes the attached resources to the whole internet.")
            .when(has_inline_ingress),
        Rule::new(LAMBDA_IN_VPC, Level::Warn, lambda_in_vpc)
            .with_info("The Lambda function is not attached to a VPC.")
            .with_explanation("Functions that reach private data should run inside a VPC with at least one subnet and one security group.")
            .for_kinds(["AWS::Lambda::Function"]),
        Rule::new(SQS_SSL_ONLY, Level::Error, sqs_ssl_only)
            .with_info("The SQS queue does not require requests to use SSL.")
            .with_explanation("A queue policy should deny any request where aws:SecureTransport is false.")
            .for_kinds(["AWS::SQS::Queue"]),
        Rule::new(LOG_RETENTION, Level::Info, log_retention)
            .with_info("The log group retains events for less than 90 days.")
            .for_kinds(["AWS::Logs::LogGroup"]),
    ]
}

fn s3_encryption(input: &RuleInput<'_>) -> Verdict {
    require_present(
        input.node(),
        "BucketEncryption.ServerSideEncryptionConfiguration",
    )
}

fn s3_public_access(input: &RuleInput<'_>) -> Verdict {
    const SETTINGS: [&str; 4] = [
        "PublicAccessBlockConfiguration.BlockPublicAcls",
        "PublicAccessBlockConfiguration.BlockPublicPolicy",
        "PublicAccessBlockConfiguration.IgnorePublicAcls",
        "PublicAccessBlockConfiguration.RestrictPublicBuckets",
    ];
    let all_set = SETTINGS
        .iter()
        .all(|key| require_true(input.node(), key) == Verdict::Compliant);
    Verdict::from_bool(all_set)
}

// Groups without inline ingress (rules attached as separate resources) are
// out of scope.
fn has_inline_ingress(node: &ResourceNode) -> bool {
    node.kind() == "AWS::EC2::SecurityGroup"
        && !matches!(node.property("SecurityGroupIngress"), Property::Missing)
}

fn sg_open_ingress(input: &RuleInput<'_>) -> Verdict {
    let node = input.node();
    let rules = match node.property("SecurityGroupIngress") {
        Property::Resolved(Value::Array(rules)) => rules,
        Property::Missing | Property::Unresolved => return Verdict::NonCompliant,
        Property::Resolved(_) => {
            return Verdict::error("SecurityGroupIngress is not a list")
        }
    };
    let open = rules.iter().any(|rule| {
        let cidr_open = |key: &str, any: &str| match rule.get(key) {
            Some(Value::String(cidr)) => cidr == any,
            Some(Value::Object(_)) => true,
            _ => false,
        };
        cidr_open("CidrIp", "0.0.0.0/0") || cidr_open("CidrIpv6", "::/0")
    });
    Verdict::from_bool(!open)
}

fn lambda_in_vpc(input: &RuleInput<'_>) -> Verdict {
    let node = input.node();
    let groups = require_non_empty_list(node, "VpcConfig.SecurityGroupIds");
    let subnets = require_non_empty_list(node, "VpcConfig.SubnetIds");
    Verdict::from_bool(groups == Verdict::Compliant && subnets == Verdict::Compliant)
}

fn sqs_ssl_only(input: &RuleInput<'_>) -> Verdict {
    let queue = input.node();
    let enforced = input
        .tree()
        .nodes_of_kind("AWS::SQS::QueuePolicy")
        .filter(|policy| references(policy, queue))
        .any(|policy| {
            policy
                .property("PolicyDocument.Statement")
                .resolved()
                .and_then(Value::as_array)
                .is_some_and(|statements| statements.iter().any(denies_insecure_transport))
        });
    Verdict::from_bool(enforced)
}

// A `Queues` entry is either the queue's full path, or its bare id when the
// policy sits in the same stack (same parent) as the queue.
fn references(policy: &ResourceNode, queue: &ResourceNode) -> bool {
    let full_path = queue.path().to_string();
    let bare_id = queue.path().id();
    let same_stack = policy.path().parent() == queue.path().parent();
    policy
        .property("Queues")
        .resolved()
        .and_then(Value::as_array)
        .is_some_and(|items| {
            items.iter().filter_map(Value::as_str).any(|entry| {
                entry == full_path || (same_stack && Some(entry) == bare_id)
            })
        })
}

fn denies_insecure_transport(statement: &Value) -> bool {
    let deny = statement.get("Effect").and_then(Value::as_str) == Some("Deny");
    let secure = statement
        .get("Condition")
        .and_then(|c| c.get("Bool"))
        .and_then(|b| b.get("aws:SecureTransport"));
    let insecure = matches!(secure, Some(Value::Bool(false)))
        || matches!(secure, Some(Value::String(s)) if s == "false");
    deny && insecure
}

fn log_retention(input: &RuleInput<'_>) -> Verdict {
    require_at_least(input.node(), "RetentionInDays", 90.0)
}
