// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - S3 Enumerator Tests
 * Bucket listing and best-effort signal fetches against a mock S3 endpoint
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use exposure_monitor::cloud::{
    AssumedCredentials, EnumeratorFactory, ResourceEnumerator, RetryConfig, S3EnumeratorFactory,
};
use exposure_monitor::evaluator::evaluate;
use exposure_monitor::types::{CloudAccount, FindingType, PolicyStatus, PROVIDER_AWS};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

const S3_NS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

async fn enumerator(server: &MockServer, signal_timeout: Duration) -> Arc<dyn ResourceEnumerator> {
    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("AKIDBASE", "base-secret", None, None, "test"))
        .retry_config(aws_config::retry::RetryConfig::disabled())
        .load()
        .await;

    let retry = RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    };
    let factory = S3EnumeratorFactory::new(&sdk_config, signal_timeout, retry)
        .with_endpoint(Some(server.uri()), true);

    let account = CloudAccount {
        id: Uuid::new_v4(),
        org_id: "acme".to_string(),
        provider: PROVIDER_AWS.to_string(),
        display_name: None,
        role_arn: "arn:aws:iam::123456789012:role/Audit".to_string(),
        external_id: None,
        is_active: true,
    };
    let credentials = AssumedCredentials {
        access_key_id: "ASIATESTKEY".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: "token".to_string(),
        expires_at: None,
    };

    factory.for_account(&account, &credentials)
}

fn xml(status: u16, body: String) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body, "application/xml")
}

fn s3_error(status: u16, code: &str) -> ResponseTemplate {
    xml(
        status,
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Error><Code>{}</Code><Message>{}</Message><RequestId>req-1</RequestId></Error>",
            code, code
        ),
    )
}

fn bucket_list(names: &[&str], continuation_token: Option<&str>) -> ResponseTemplate {
    let buckets: String = names
        .iter()
        .map(|name| {
            format!(
                "<Bucket><Name>{}</Name><CreationDate>2024-01-01T00:00:00.000Z</CreationDate></Bucket>",
                name
            )
        })
        .collect();
    let token = continuation_token
        .map(|t| format!("<ContinuationToken>{}</ContinuationToken>", t))
        .unwrap_or_default();

    xml(
        200,
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <ListAllMyBucketsResult xmlns=\"{}\">\
             <Owner><ID>owner-canonical-id</ID></Owner>\
             <Buckets>{}</Buckets>{}\
             </ListAllMyBucketsResult>",
            S3_NS, buckets, token
        ),
    )
}

fn location(region: &str) -> ResponseTemplate {
    xml(
        200,
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <LocationConstraint xmlns=\"{}\">{}</LocationConstraint>",
            S3_NS, region
        ),
    )
}

fn public_access_block(block_public_policy: bool) -> ResponseTemplate {
    xml(
        200,
        format!(
            "<PublicAccessBlockConfiguration xmlns=\"{}\">\
             <BlockPublicAcls>true</BlockPublicAcls>\
             <IgnorePublicAcls>true</IgnorePublicAcls>\
             <BlockPublicPolicy>{}</BlockPublicPolicy>\
             <RestrictPublicBuckets>true</RestrictPublicBuckets>\
             </PublicAccessBlockConfiguration>",
            S3_NS, block_public_policy
        ),
    )
}

fn policy_status(is_public: bool) -> ResponseTemplate {
    xml(
        200,
        format!(
            "<PolicyStatus xmlns=\"{}\"><IsPublic>{}</IsPublic></PolicyStatus>",
            S3_NS, is_public
        ),
    )
}

fn all_users_acl() -> ResponseTemplate {
    xml(
        200,
        format!(
            "<AccessControlPolicy xmlns=\"{}\">\
             <Owner><ID>owner-canonical-id</ID></Owner>\
             <AccessControlList><Grant>\
             <Grantee xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" xsi:type=\"Group\">\
             <URI>http://acs.amazonaws.com/groups/global/AllUsers</URI></Grantee>\
             <Permission>READ</Permission>\
             </Grant></AccessControlList>\
             </AccessControlPolicy>",
            S3_NS
        ),
    )
}

fn website() -> ResponseTemplate {
    xml(
        200,
        format!(
            "<WebsiteConfiguration xmlns=\"{}\">\
             <IndexDocument><Suffix>index.html</Suffix></IndexDocument>\
             </WebsiteConfiguration>",
            S3_NS
        ),
    )
}

async fn mount_signal(server: &MockServer, bucket: &str, subresource: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/{}", bucket)))
        .and(query_param(subresource, ""))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_list_buckets_follows_continuation_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("continuation-token", "page-2"))
        .respond_with(bucket_list(&["gamma"], None))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(bucket_list(&["alpha", "beta"], Some("page-2")))
        .mount(&server)
        .await;

    let enumerator = enumerator(&server, Duration::from_secs(5)).await;
    let names = enumerator.list_buckets().await.unwrap();

    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
}

#[tokio::test]
async fn test_list_buckets_denied_is_an_enumeration_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(s3_error(403, "AccessDenied"))
        .mount(&server)
        .await;

    let enumerator = enumerator(&server, Duration::from_secs(5)).await;
    let err = enumerator.list_buckets().await.unwrap_err();

    assert!(err.to_string().contains("AccessDenied"), "{}", err);
}

#[tokio::test]
async fn test_denied_and_missing_signals_do_not_hide_the_rest() {
    let server = MockServer::start().await;

    mount_signal(&server, "assets", "location", location("eu-north-1")).await;
    mount_signal(&server, "assets", "publicAccessBlock", public_access_block(false)).await;
    mount_signal(&server, "assets", "policyStatus", policy_status(true)).await;
    mount_signal(&server, "assets", "acl", s3_error(403, "AccessDenied")).await;
    mount_signal(&server, "assets", "website", s3_error(404, "NoSuchWebsiteConfiguration")).await;

    let enumerator = enumerator(&server, Duration::from_secs(5)).await;
    let observation = enumerator.describe_bucket("assets").await;

    assert_eq!(observation.name, "assets");
    assert_eq!(observation.region, "eu-north-1");

    let signals = &observation.signals;
    let bpa = signals.public_access_block.as_ref().unwrap();
    assert_eq!(bpa.block_public_policy, Some(false));
    assert_eq!(
        signals.policy_status,
        Some(PolicyStatus {
            is_public: Some(true)
        })
    );
    assert!(signals.acl.is_none());
    assert!(signals.website.is_none());

    let result = evaluate(signals);
    assert_eq!(
        result.finding_types(),
        vec![FindingType::BpaDisabled, FindingType::PolicyPublic]
    );
}

#[tokio::test]
async fn test_unknown_location_defaults_and_slow_signal_is_absent() {
    let server = MockServer::start().await;

    mount_signal(&server, "legacy", "location", s3_error(403, "AccessDenied")).await;
    mount_signal(
        &server,
        "legacy",
        "publicAccessBlock",
        s3_error(404, "NoSuchPublicAccessBlockConfiguration"),
    )
    .await;
    mount_signal(
        &server,
        "legacy",
        "policyStatus",
        policy_status(true).set_delay(Duration::from_secs(5)),
    )
    .await;
    mount_signal(&server, "legacy", "acl", all_users_acl()).await;
    mount_signal(&server, "legacy", "website", website()).await;

    let enumerator = enumerator(&server, Duration::from_millis(500)).await;
    let observation = enumerator.describe_bucket("legacy").await;

    assert_eq!(observation.region, "us-east-1");

    let signals = &observation.signals;
    assert!(signals.public_access_block.is_none());
    assert!(signals.policy_status.is_none());

    let grants = signals.acl.as_ref().unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(
        grants[0].grantee_uri.as_deref(),
        Some("http://acs.amazonaws.com/groups/global/AllUsers")
    );
    assert_eq!(grants[0].permission.as_deref(), Some("READ"));

    let site = signals.website.as_ref().unwrap();
    assert_eq!(site.index_document.as_deref(), Some("index.html"));

    let result = evaluate(signals);
    assert_eq!(
        result.finding_types(),
        vec![FindingType::PublicAcl, FindingType::WebsitePublic]
    );
}
