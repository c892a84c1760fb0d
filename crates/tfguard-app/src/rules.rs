//! The built-in rule pack and rule selection.
//!
//! Rule ids are `<category>.<check>`; categories are `encryption`,
//! `logging_and_monitoring`, `public_exposure` and `security_group`.

use anyhow::Context;
use globset::Glob;
use tfguard_domain::Rule;
use tfguard_domain::assert::{AssertError, Validator};
use tfguard_settings::ResolvedConfig;
use tfguard_types::Severity;

type Check = Result<(), AssertError>;

const INSECURE_LISTENER_PORTS: [i64; 4] = [80, 21, 23, 5900];
const PUBLIC_ACLS: [&str; 3] = ["public-read", "public-read-write", "authenticated-read"];
const WEAK_SSL_POLICIES: [&str; 2] = [
    "ELBSecurityPolicy-2015-05",
    "ELBSecurityPolicy-TLS-1-0-2015-04",
];

// encryption

fn alb_listener_port(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_alb_listener")?.property("port")?.should_equal("443")?;
    Ok(())
}

fn alb_listener_protocol(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_alb_listener")?
        .property("protocol")?
        .should_not_equal_case_insensitive("http")?;
    Ok(())
}

fn alb_listener_ssl_policy(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    let policy = v.resources("aws_alb_listener")?.property("ssl_policy")?;
    for weak in WEAK_SSL_POLICIES {
        policy.should_not_equal(weak)?;
    }
    Ok(())
}

fn alb_listener_certificate(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_alb_listener")?
        .should_have_properties(&["certificate_arn"])?;
    Ok(())
}

fn instance_ebs_encrypted(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_instance")?
        .property("ebs_block_device")?
        .property("encrypted")?
        .should_equal(true)?;
    Ok(())
}

fn cloudfront_origin_https(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_cloudfront_distribution")?
        .property("origin")?
        .property("custom_origin_config")?
        .property("origin_protocol_policy")?
        .should_equal("https-only")?;
    Ok(())
}

fn cloudfront_viewer_protocol(v: &Validator<'_>) -> Check {
    let distributions = v.resources("aws_cloudfront_distribution")?;
    for behavior in ["default_cache_behavior", "cache_behavior"] {
        distributions
            .property(behavior)?
            .property("viewer_protocol_policy")?
            .should_not_equal("allow-all")?;
    }
    Ok(())
}

fn cloudtrail_kms(v: &Validator<'_>) -> Check {
    v.resources("aws_cloudtrail")?
        .should_have_properties(&["kms_key_id"])?;
    Ok(())
}

fn db_instance_encrypted(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    let db = v.resources("aws_db_instance")?;
    db.property("storage_encrypted")?.should_equal(true)?;
    db.should_have_properties(&["kms_key_id"])?;
    Ok(())
}

fn ebs_volume_encrypted(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    let volumes = v.resources("aws_ebs_volume")?;
    volumes.property("encrypted")?.should_equal(true)?;
    volumes.should_have_properties(&["kms_key_id"])?;
    Ok(())
}

fn efs_encrypted(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    let fs = v.resources("aws_efs_file_system")?;
    fs.property("encrypted")?.should_equal(true)?;
    fs.should_have_properties(&["kms_key_id"])?;
    Ok(())
}

fn elb_listener_port(v: &Validator<'_>) -> Check {
    let ports = v.resources("aws_elb")?.property("listener")?.property("lb_port")?;
    for port in INSECURE_LISTENER_PORTS {
        ports.should_not_equal(port)?;
    }
    Ok(())
}

fn rds_cluster_encrypted(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    let clusters = v.resources("aws_rds_cluster")?;
    clusters.property("storage_encrypted")?.should_equal(true)?;
    clusters.should_have_properties(&["kms_key_id"])?;
    Ok(())
}

fn redshift_encrypted(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    let clusters = v.resources("aws_redshift_cluster")?;
    clusters.property("encrypted")?.should_equal(true)?;
    clusters.should_have_properties(&["kms_key_id"])?;
    Ok(())
}

fn s3_object_kms(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    let objects = v.resources("aws_s3_bucket_object")?;
    objects
        .property("server_side_encryption")?
        .should_equal("aws:kms")?;
    objects.should_have_properties(&["kms_key_id"])?;
    Ok(())
}

fn sqs_kms(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_sqs_queue")?.should_have_properties(&[
        "kms_master_key_id",
        "kms_data_key_reuse_period_seconds",
    ])?;
    Ok(())
}

fn ssm_parameter_secure(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    let params = v.resources("aws_ssm_parameter")?;
    params.property("type")?.should_equal("SecureString")?;
    params.should_have_properties(&["key_id"])?;
    Ok(())
}

// logging_and_monitoring

fn alb_logging(v: &Validator<'_>) -> Check {
    v.resources("aws_alb")?.should_have_properties(&["access_logs"])?;
    Ok(())
}

fn cloudfront_logging(v: &Validator<'_>) -> Check {
    v.resources("aws_cloudfront_distribution")?
        .should_have_properties(&["logging_config"])?;
    Ok(())
}

fn cloudtrail_logging(v: &Validator<'_>) -> Check {
    v.resources("aws_cloudtrail")?
        .property("enable_logging")?
        .should_not_equal(false)?;
    Ok(())
}

fn elb_logging(v: &Validator<'_>) -> Check {
    v.resources("aws_elb")?.should_have_properties(&["access_logs"])?;
    Ok(())
}

fn emr_logging(v: &Validator<'_>) -> Check {
    v.resources("aws_emr_cluster")?.should_have_properties(&["log_uri"])?;
    Ok(())
}

fn redshift_logging(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_redshift_cluster")?
        .property("enable_logging")?
        .should_not_equal(false)?;
    Ok(())
}

fn s3_logging(v: &Validator<'_>) -> Check {
    v.resources("aws_s3_bucket")?.should_have_properties(&["logging"])?;
    Ok(())
}

// public_exposure

fn alb_public(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_alb")?.property("internal")?.should_not_equal(false)?;
    Ok(())
}

fn elb_public(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources("aws_elb")?.property("internal")?.should_not_equal(false)?;
    Ok(())
}

fn publicly_accessible(v: &Validator<'_>) -> Check {
    v.resources(["aws_db_instance", "aws_rds_cluster_instance"])?
        .property("publicly_accessible")?
        .should_not_equal(true)?;
    Ok(())
}

fn dms_and_redshift_publicly_accessible(v: &Validator<'_>) -> Check {
    v.error_if_property_missing();
    v.resources(["aws_dms_replication_instance", "aws_redshift_cluster"])?
        .property("publicly_accessible")?
        .should_not_equal(true)?;
    Ok(())
}

fn instance_public_ip(v: &Validator<'_>) -> Check {
    v.resources(["aws_instance", "aws_launch_configuration"])?
        .property("associate_public_ip_address")?
        .should_not_equal(true)?;
    Ok(())
}

fn s3_bucket_public(v: &Validator<'_>) -> Check {
    let buckets = v.resources("aws_s3_bucket")?;
    let acl = buckets.property("acl")?;
    for public in PUBLIC_ACLS {
        acl.should_not_equal(public)?;
    }
    buckets.should_not_have_properties(&["website"])?;
    Ok(())
}

// security_group

fn classic_security_groups(v: &Validator<'_>) -> Check {
    v.resources([
        "aws_db_security_group",
        "aws_redshift_security_group",
        "aws_elasticache_security_group",
    ])?
    .should_not_exist()?;
    Ok(())
}

fn security_group_rule_open(v: &Validator<'_>) -> Check {
    v.resources("aws_security_group_rule")?
        .with_property("type", "ingress")?
        .property("cidr_blocks")?
        .list_should_not_contain("0.0.0.0/0")?;
    Ok(())
}

fn security_group_inline_rule_open(v: &Validator<'_>) -> Check {
    v.resources("aws_security_group")?
        .property("ingress")?
        .property("cidr_blocks")?
        .list_should_not_contain("0.0.0.0/0")?;
    Ok(())
}

const fn rule(
    id: &'static str,
    severity: Severity,
    description: &'static str,
    check: fn(&Validator<'_>) -> Check,
) -> Rule {
    Rule {
        id,
        severity,
        description,
        check,
    }
}

/// Every built-in rule, in evaluation order.
#[rustfmt::skip]
pub const BUILTIN_RULES: &[Rule] = &[
    rule("encryption.aws_alb_listener_port", Severity::Medium, "ALB listeners use port 443", alb_listener_port),
    rule("encryption.aws_alb_listener_protocol", Severity::Medium, "ALB listeners do not use plain HTTP", alb_listener_protocol),
    rule("encryption.aws_alb_listener_ssl_policy", Severity::Medium, "ALB listeners avoid outdated TLS policies", alb_listener_ssl_policy),
    rule("encryption.aws_alb_listener_certificate", Severity::Medium, "ALB listeners carry a certificate", alb_listener_certificate),
    rule("encryption.aws_instance_ebs_block_device_encrypted", Severity::Medium, "EC2 EBS block devices are encrypted", instance_ebs_encrypted),
    rule("encryption.aws_cloudfront_distribution_origin_protocol_policy", Severity::Medium, "CloudFront origins are reached over HTTPS only", cloudfront_origin_https),
    rule("encryption.aws_cloudfront_distribution_viewer_protocol_policy", Severity::Medium, "CloudFront cache behaviors do not allow plain HTTP", cloudfront_viewer_protocol),
    rule("encryption.aws_cloudtrail_kms", Severity::Medium, "CloudTrail logs use a KMS key", cloudtrail_kms),
    rule("encryption.aws_db_instance_encrypted", Severity::Medium, "RDS instances are encrypted with a KMS key", db_instance_encrypted),
    rule("encryption.aws_ebs_volume_encrypted", Severity::Medium, "EBS volumes are encrypted with a KMS key", ebs_volume_encrypted),
    rule("encryption.aws_efs_file_system_encrypted", Severity::Medium, "EFS file systems are encrypted with a KMS key", efs_encrypted),
    rule("encryption.aws_elb_listener_port", Severity::Medium, "ELB listeners avoid cleartext ports", elb_listener_port),
    rule("encryption.aws_rds_cluster_encrypted", Severity::Medium, "RDS clusters are encrypted with a KMS key", rds_cluster_encrypted),
    rule("encryption.aws_redshift_cluster_encrypted", Severity::Medium, "Redshift clusters are encrypted with a KMS key", redshift_encrypted),
    rule("encryption.aws_s3_bucket_object_kms", Severity::Medium, "S3 objects use KMS server-side encryption", s3_object_kms),
    rule("encryption.aws_sqs_queue_kms", Severity::Medium, "SQS queues use a KMS key", sqs_kms),
    rule("encryption.aws_ssm_parameter_secure", Severity::Medium, "SSM parameters are SecureStrings with a KMS key", ssm_parameter_secure),
    rule("logging_and_monitoring.aws_alb_logging", Severity::Low, "ALBs write access logs", alb_logging),
    rule("logging_and_monitoring.aws_cloudfront_distribution_logging", Severity::Low, "CloudFront distributions write access logs", cloudfront_logging),
    rule("logging_and_monitoring.aws_cloudtrail_logging", Severity::Low, "CloudTrail logging is enabled", cloudtrail_logging),
    rule("logging_and_monitoring.aws_elb_logging", Severity::Low, "ELBs write access logs", elb_logging),
    rule("logging_and_monitoring.aws_emr_cluster_logging", Severity::Low, "EMR clusters write logs to S3", emr_logging),
    rule("logging_and_monitoring.aws_redshift_cluster_logging", Severity::Low, "Redshift audit logging is enabled", redshift_logging),
    rule("logging_and_monitoring.aws_s3_bucket_logging", Severity::Low, "S3 buckets write access logs", s3_logging),
    rule("public_exposure.aws_alb_public", Severity::High, "ALBs are internal", alb_public),
    rule("public_exposure.aws_elb_public", Severity::High, "ELBs are internal", elb_public),
    rule("public_exposure.aws_db_instance_public", Severity::High, "RDS instances are not publicly accessible", publicly_accessible),
    rule("public_exposure.aws_dms_redshift_public", Severity::High, "DMS and Redshift instances are not publicly accessible", dms_and_redshift_publicly_accessible),
    rule("public_exposure.aws_instance_public_ip", Severity::High, "Instances do not get public IP addresses", instance_public_ip),
    rule("public_exposure.aws_s3_bucket_public", Severity::High, "S3 buckets are not public or website hosts", s3_bucket_public),
    rule("security_group.aws_classic_security_group_used", Severity::Medium, "No EC2-Classic security group types are used", classic_security_groups),
    rule("security_group.aws_security_group_rule_open", Severity::High, "Ingress rules are not open to 0.0.0.0/0", security_group_rule_open),
    rule("security_group.aws_security_group_inline_rule_open", Severity::High, "Inline ingress blocks are not open to 0.0.0.0/0", security_group_inline_rule_open),
];

/// Apply per-rule settings and the `--rules` glob to the built-in pack.
///
/// Rule ids named in the config must exist.
pub fn select_rules(config: &ResolvedConfig) -> anyhow::Result<Vec<Rule>> {
    for id in config.rules.keys() {
        if !BUILTIN_RULES.iter().any(|r| r.id == id) {
            anyhow::bail!("unknown rule id in config: {id}");
        }
    }
    let matcher = match config.rule_glob.as_deref() {
        Some(glob) => Some(
            Glob::new(glob)
                .with_context(|| format!("invalid rule glob: {glob}"))?
                .compile_matcher(),
        ),
        None => None,
    };

    let mut out = Vec::new();
    for rule in BUILTIN_RULES {
        if matcher.as_ref().is_some_and(|m| !m.is_match(rule.id)) {
            continue;
        }
        let mut rule = *rule;
        if let Some(settings) = config.rules.get(rule.id) {
            if settings.enabled == Some(false) {
                continue;
            }
            if let Some(severity) = settings.severity {
                rule.severity = severity;
            }
        }
        out.push(rule);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfguard_settings::{CliOverrides, parse_config_toml, resolve_config};

    fn resolved(toml: &str, rules: Option<&str>) -> ResolvedConfig {
        let cfg = parse_config_toml(toml).expect("parse");
        let cli = CliOverrides {
            rules: rules.map(str::to_string),
            ..CliOverrides::default()
        };
        resolve_config(cfg, cli).expect("resolve")
    }

    #[test]
    fn rule_ids_are_unique_and_categorized() {
        let mut ids: Vec<&str> = BUILTIN_RULES.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), BUILTIN_RULES.len());
        for id in ids {
            let category = id.split('.').next().unwrap_or_default();
            assert!(
                matches!(
                    category,
                    "encryption" | "logging_and_monitoring" | "public_exposure" | "security_group"
                ),
                "{id}"
            );
        }
    }

    #[test]
    fn glob_selects_a_category() {
        let rules = select_rules(&resolved("", Some("public_exposure.*"))).expect("select");
        assert!(!rules.is_empty());
        assert!(rules.iter().all(|r| r.id.starts_with("public_exposure.")));
    }

    #[test]
    fn config_disables_and_reweights_rules() {
        let config = resolved(
            r#"
[rules."public_exposure.aws_alb_public"]
severity = "low"

[rules."public_exposure.aws_elb_public"]
enabled = false
"#,
            Some("public_exposure.aws_[ae]lb_public"),
        );
        let rules = select_rules(&config).expect("select");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, "public_exposure.aws_alb_public");
        assert_eq!(rules[0].severity, Severity::Low);
    }

    #[test]
    fn unknown_rule_ids_are_rejected() {
        let config = resolved("[rules.nope]\nenabled = false\n", None);
        assert!(select_rules(&config).is_err());
    }
}
