// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Exposure Evaluator
 * Maps bucket configuration signals to findings and an aggregate risk
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::types::{ExposureSignalSet, Finding, FindingDetails, FindingType, ScanResult};

/// Evaluate one bucket's signals. Pure and deterministic: findings are always
/// emitted in rule order, whatever order the signals arrived in.
pub fn evaluate(signals: &ExposureSignalSet) -> ScanResult {
    let findings = [
        check_public_access_block(signals),
        check_policy_status(signals),
        check_acl(signals),
        check_website(signals),
    ]
    .into_iter()
    .flatten()
    .collect();

    ScanResult::from_findings(findings)
}

fn check_public_access_block(signals: &ExposureSignalSet) -> Option<Finding> {
    let bpa = signals.public_access_block.as_ref()?;

    bpa.has_disabled_flag().then(|| {
        Finding::new(
            FindingType::BpaDisabled,
            FindingDetails::BpaDisabled { bpa: bpa.clone() },
        )
    })
}

fn check_policy_status(signals: &ExposureSignalSet) -> Option<Finding> {
    let status = signals.policy_status.as_ref()?;

    (status.is_public == Some(true)).then(|| {
        Finding::new(
            FindingType::PolicyPublic,
            FindingDetails::PolicyPublic {
                policy_status: status.clone(),
            },
        )
    })
}

fn check_acl(signals: &ExposureSignalSet) -> Option<Finding> {
    let grants = signals.acl.as_ref()?;

    grants.iter().any(|g| g.is_public_grantee()).then(|| {
        Finding::new(
            FindingType::PublicAcl,
            FindingDetails::PublicAcl {
                grants: grants.clone(),
            },
        )
    })
}

// Hosting is treated as an exposure vector on its own
fn check_website(signals: &ExposureSignalSet) -> Option<Finding> {
    signals.website.as_ref().map(|_| {
        Finding::new(
            FindingType::WebsitePublic,
            FindingDetails::WebsitePublic { website: true },
        )
    })
}
