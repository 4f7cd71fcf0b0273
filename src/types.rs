// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Exposure Monitor Domain Types
 * Accounts, buckets, exposure signals and findings
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider tag for AWS accounts in the catalog
pub const PROVIDER_AWS: &str = "aws";

/// Region used when a bucket's location cannot be resolved
pub const DEFAULT_REGION: &str = "us-east-1";

/// Ordered risk level: low < med < high < critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Med,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Med => "med",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// High and critical findings make a bucket public
    pub fn is_public_exposure(&self) -> bool {
        *self >= Severity::High
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Low
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "med" | "medium" => Ok(Severity::Med),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

/// Exposure signal category a finding was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingType {
    BpaDisabled,
    PolicyPublic,
    PublicAcl,
    WebsitePublic,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::BpaDisabled => "BPA_DISABLED",
            FindingType::PolicyPublic => "POLICY_PUBLIC",
            FindingType::PublicAcl => "PUBLIC_ACL",
            FindingType::WebsitePublic => "WEBSITE_PUBLIC",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            FindingType::BpaDisabled | FindingType::WebsitePublic => Severity::Med,
            FindingType::PolicyPublic | FindingType::PublicAcl => Severity::High,
        }
    }
}

impl std::fmt::Display for FindingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer cloud account registered through account management
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudAccount {
    pub id: Uuid,
    pub org_id: String,
    pub provider: String,
    pub display_name: Option<String>,
    pub role_arn: String,
    pub external_id: Option<String>,
    pub is_active: bool,
}

/// Persisted bucket row, identity is (account_id, name)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRecord {
    pub id: Uuid,
    pub org_id: String,
    pub account_id: Uuid,
    pub name: String,
    pub region: String,
    pub last_seen_at: DateTime<Utc>,
}

/// Public access block flags. `None` means the flag was not returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccessBlock {
    pub block_public_acls: Option<bool>,
    pub ignore_public_acls: Option<bool>,
    pub block_public_policy: Option<bool>,
    pub restrict_public_buckets: Option<bool>,
}

impl PublicAccessBlock {
    pub fn fully_protective() -> Self {
        Self {
            block_public_acls: Some(true),
            ignore_public_acls: Some(true),
            block_public_policy: Some(true),
            restrict_public_buckets: Some(true),
        }
    }

    /// True when any flag is explicitly false
    pub fn has_disabled_flag(&self) -> bool {
        [
            self.block_public_acls,
            self.ignore_public_acls,
            self.block_public_policy,
            self.restrict_public_buckets,
        ]
        .contains(&Some(false))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyStatus {
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AclGrant {
    pub grantee_uri: Option<String>,
    pub grantee_id: Option<String>,
    pub grantee_display_name: Option<String>,
    pub permission: Option<String>,
}

impl AclGrant {
    /// Grantee is the AllUsers or AuthenticatedUsers well-known group
    pub fn is_public_grantee(&self) -> bool {
        self.grantee_uri
            .as_deref()
            .map(|uri| uri.contains("AllUsers") || uri.contains("AuthenticatedUsers"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteConfig {
    pub index_document: Option<String>,
    pub error_document: Option<String>,
    pub redirect_all_requests_to: Option<String>,
}

/// Per-bucket configuration signals for one cycle. `None` is an absent signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExposureSignalSet {
    pub public_access_block: Option<PublicAccessBlock>,
    pub policy_status: Option<PolicyStatus>,
    pub acl: Option<Vec<AclGrant>>,
    pub website: Option<WebsiteConfig>,
}

/// One fetched signal, used to assemble a signal set in any order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    PublicAccessBlock(PublicAccessBlock),
    PolicyStatus(PolicyStatus),
    Acl(Vec<AclGrant>),
    Website(WebsiteConfig),
}

impl ExposureSignalSet {
    pub fn insert(&mut self, signal: Signal) {
        match signal {
            Signal::PublicAccessBlock(bpa) => self.public_access_block = Some(bpa),
            Signal::PolicyStatus(status) => self.policy_status = Some(status),
            Signal::Acl(grants) => self.acl = Some(grants),
            Signal::Website(website) => self.website = Some(website),
        }
    }

    pub fn from_signals(signals: impl IntoIterator<Item = Signal>) -> Self {
        let mut set = Self::default();
        for signal in signals {
            set.insert(signal);
        }
        set
    }
}

/// Signal fetched from the provider for each bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    PublicAccessBlock,
    PolicyStatus,
    Acl,
    Website,
    Location,
}

impl SignalKind {
    pub fn operation(&self) -> &'static str {
        match self {
            SignalKind::PublicAccessBlock => "s3:GetPublicAccessBlock",
            SignalKind::PolicyStatus => "s3:GetBucketPolicyStatus",
            SignalKind::Acl => "s3:GetBucketAcl",
            SignalKind::Website => "s3:GetBucketWebsite",
            SignalKind::Location => "s3:GetBucketLocation",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.operation())
    }
}

/// What the enumerator observed about one bucket
#[derive(Debug, Clone)]
pub struct BucketObservation {
    pub name: String,
    pub region: String,
    pub signals: ExposureSignalSet,
}

/// Detail payload stored with a finding, one shape per finding type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FindingDetails {
    BpaDisabled {
        bpa: PublicAccessBlock,
    },
    PolicyPublic {
        #[serde(rename = "policyStatus")]
        policy_status: PolicyStatus,
    },
    PublicAcl {
        grants: Vec<AclGrant>,
    },
    WebsitePublic {
        website: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub severity: Severity,
    pub details: FindingDetails,
}

impl Finding {
    pub fn new(finding_type: FindingType, details: FindingDetails) -> Self {
        Self {
            finding_type,
            severity: finding_type.severity(),
            details,
        }
    }
}

/// Evaluator output for one bucket in one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub findings: Vec<Finding>,
    pub is_public: bool,
    pub max_severity: Severity,
}

impl ScanResult {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let is_public = findings.iter().any(|f| f.severity.is_public_exposure());
        let max_severity = findings
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or_default();

        Self {
            findings,
            is_public,
            max_severity,
        }
    }

    pub fn finding_types(&self) -> Vec<FindingType> {
        self.findings.iter().map(|f| f.finding_type).collect()
    }
}
