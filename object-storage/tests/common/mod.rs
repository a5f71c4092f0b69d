//! Shared helpers for LocalStack-backed integration tests

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::Client as S3Client;
use object_storage::Environment;
use uuid::Uuid;

/// LocalStack endpoint used by the test environment
pub const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";
const TEST_REGION: &str = "us-east-1";

/// Loads test environment variables and installs a tracing subscriber
pub fn setup_test_env() {
    dotenvy::from_path(".env.example").ok();

    tracing_subscriber::fmt()
        .with_max_level(Environment::from_env().tracing_level())
        .try_init()
        .ok();
}

/// Raw S3 client pointed at LocalStack, used to verify backend state
pub async fn verification_client() -> S3Client {
    let credentials = Credentials::from_keys(
        "test", // AWS_ACCESS_KEY_ID
        "test", // AWS_SECRET_ACCESS_KEY
        None,   // no session token
    );
    let config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(LOCALSTACK_ENDPOINT)
        .region(Region::new(TEST_REGION))
        .credentials_provider(credentials)
        .load()
        .await;

    let s3_config: aws_sdk_s3::Config = (&config).into();
    S3Client::from_conf(s3_config.to_builder().force_path_style(true).build())
}

/// Creates a uniquely named bucket for the test
pub async fn create_test_bucket(client: &S3Client) -> String {
    let bucket = format!("test-objects-{}", Uuid::new_v4());
    client
        .create_bucket()
        .bucket(&bucket)
        .send()
        .await
        .expect("Failed to create test bucket");
    bucket
}

/// Downloads an object's full content
pub async fn download_object(client: &S3Client, bucket: &str, key: &str) -> Vec<u8> {
    let response = client
        .get_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .expect("Failed to get object");

    let body = response.body.collect().await.expect("Failed to read object body");
    body.into_bytes().to_vec()
}

/// Checks if an object exists
pub async fn object_exists(client: &S3Client, bucket: &str, key: &str) -> bool {
    match client.head_object().bucket(bucket).key(key).send().await {
        Ok(_) => true,
        Err(SdkError::ServiceError(service_err))
            if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
        {
            false
        }
        Err(e) => panic!("Failed to check object existence: {e}"),
    }
}
