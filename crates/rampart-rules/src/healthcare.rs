//! Healthcare data-protection rules.

use rampart_core::rules::{require_at_least, require_present, require_true};
use rampart_core::{Level, Rule, RuleInput, Verdict};

pub const RDS_STORAGE_ENCRYPTED: &str = "healthcare-RdsStorageEncrypted";
pub const RDS_BACKUP_RETENTION: &str = "healthcare-RdsBackupRetention";
pub const SQS_ENCRYPTED: &str = "healthcare-SqsEncrypted";

pub fn rules() -> Vec<Rule> {
    vec![
        Rule::new(RDS_STORAGE_ENCRYPTED, Level::Error, |input| {
            require_true(input.node(), "StorageEncrypted")
        })
        .with_info("The RDS instance does not have storage encryption enabled.")
        .with_explanation("Protected health information must be encrypted at rest.")
        .for_kinds(["AWS::RDS::DBInstance", "AWS::RDS::DBCluster"]),
        Rule::new(RDS_BACKUP_RETENTION, Level::Warn, |input| {
            require_at_least(input.node(), "BackupRetentionPeriod", 7.0)
        })
        .with_info("The RDS instance keeps automated backups for less than 7 days.")
        .for_kinds(["AWS::RDS::DBInstance"]),
        Rule::new(SQS_ENCRYPTED, Level::Error, sqs_encrypted)
            .with_info("The SQS queue is not encrypted at rest.")
            .with_explanation("Use a KMS key or SQS-managed server-side encryption.")
            .for_kinds(["AWS::SQS::Queue"]),
    ]
}

fn sqs_encrypted(input: &RuleInput<'_>) -> Verdict {
    let node = input.node();
    if require_present(node, "KmsMasterKeyId") == Verdict::Compliant {
        return Verdict::Compliant;
    }
    require_true(node, "SqsManagedSseEnabled")
}
