use crate::create_test_context_with_env;
use apisign_core::{Error, ErrorKind, HttpSend, Result};
use apisign_execute_api::create_signer;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use std::fs::File;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// HttpSend that answers from a fixed table and remembers every uri it saw.
#[derive(Debug, Clone, Default)]
struct TableHttpSend {
    routes: Vec<(Method, String, StatusCode, String)>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl TableHttpSend {
    fn route(mut self, method: Method, uri: &str, status: StatusCode, body: &str) -> Self {
        self.routes
            .push((method, uri.to_string(), status, body.to_string()));
        self
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl HttpSend for TableHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let uri = req.uri().to_string();
        self.seen.lock().expect("lock poisoned").push(uri.clone());

        let Some((_, _, status, body)) = self
            .routes
            .iter()
            .find(|(method, route, _, _)| method == req.method() && *route == uri)
        else {
            return Err(Error::unexpected("connection refused").with_context(format!("uri: {uri}")));
        };

        Ok(http::Response::builder()
            .status(*status)
            .body(Bytes::from(body.clone()))?)
    }
}

fn write_file(dir: &TempDir, name: &str, lines: &[&str]) -> anyhow::Result<String> {
    let path = dir.path().join(name);
    let mut f = File::create(&path)?;
    for line in lines {
        writeln!(f, "{line}")?;
    }
    Ok(path.to_string_lossy().to_string())
}

#[tokio::test]
async fn test_default_scope_malformed_credentials_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let credentials = write_file(
        &dir,
        "credentials",
        &[
            "[default",
            "aws_access_key_id = AKIADEFAULTEXAMPLE",
            "aws_secret_access_key = defaultsecret",
        ],
    )?;
    let ctx =
        create_test_context_with_env(&[("AWS_SHARED_CREDENTIALS_FILE", credentials.as_str())]);

    let err = create_signer(&ctx, "us-east-1", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    Ok(())
}

#[tokio::test]
async fn test_default_scope_partial_env_keys() {
    let ctx = create_test_context_with_env(&[("AWS_ACCESS_KEY_ID", "AKIAENVEXAMPLE")]);

    let err = create_signer(&ctx, "us-east-1", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
}

#[tokio::test]
async fn test_profile_partial_keys() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let credentials = write_file(
        &dir,
        "credentials",
        &["[dev]", "aws_access_key_id = AKIADEVEXAMPLE"],
    )?;
    let ctx = create_test_context_with_env(&[
        ("AWS_SHARED_CREDENTIALS_FILE", credentials.as_str()),
        ("AWS_CONTAINER_CREDENTIALS_FULL_URI", "http://creds.test/role"),
    ]);

    let err = create_signer(&ctx, "us-east-1", Some("dev"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    Ok(())
}

#[tokio::test]
async fn test_explicit_profile_container_denied() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_file(&dir, "config", &["[profile dev]", "region = us-east-1"])?;
    let http = TableHttpSend::default().route(
        Method::GET,
        "http://creds.test/role",
        StatusCode::FORBIDDEN,
        "denied",
    );
    let ctx = create_test_context_with_env(&[
        ("AWS_CONFIG_FILE", config.as_str()),
        ("AWS_CONTAINER_CREDENTIALS_FULL_URI", "http://creds.test/role"),
    ])
    .with_http_send(http.clone());

    let err = create_signer(&ctx, "us-east-1", Some("dev"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialDenied);
    assert_eq!(http.seen(), vec!["http://creds.test/role"]);
    Ok(())
}

#[tokio::test]
async fn test_explicit_profile_instance_role_denied() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_file(&dir, "config", &["[profile dev]", "region = us-east-1"])?;
    let http = TableHttpSend::default()
        .route(
            Method::PUT,
            "http://imds.test/latest/api/token",
            StatusCode::OK,
            "imds-token",
        )
        .route(
            Method::GET,
            "http://imds.test/latest/meta-data/iam/security-credentials/",
            StatusCode::OK,
            "app-role\n",
        )
        .route(
            Method::GET,
            "http://imds.test/latest/meta-data/iam/security-credentials/app-role",
            StatusCode::OK,
            r#"{"Code": "AssumeRoleUnauthorizedAccess", "Message": "not allowed"}"#,
        );
    let ctx = create_test_context_with_env(&[
        ("AWS_CONFIG_FILE", config.as_str()),
        ("AWS_EC2_METADATA_DISABLED", "false"),
        ("AWS_EC2_METADATA_SERVICE_ENDPOINT", "http://imds.test"),
    ])
    .with_http_send(http.clone());

    let err = create_signer(&ctx, "us-east-1", Some("dev"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialDenied);
    assert_eq!(http.seen().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_role_profile_does_not_fall_back() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_file(
        &dir,
        "config",
        &[
            "[profile deploy]",
            "role_arn = arn:aws:iam::123456789012:role/deploy",
            "source_profile = base",
            "role_session_name = ci",
        ],
    )?;
    let credentials = write_file(
        &dir,
        "credentials",
        &[
            "[base]",
            "aws_access_key_id = AKIABASEEXAMPLE",
            "aws_secret_access_key = basesecret",
        ],
    )?;
    let http = TableHttpSend::default()
        .route(
            Method::GET,
            "https://sts.amazonaws.com/?Action=AssumeRole&RoleArn=arn%3Aaws%3Aiam%3A%3A123456789012%3Arole%2Fdeploy&RoleSessionName=ci&Version=2011-06-15",
            StatusCode::FORBIDDEN,
            r#"<ErrorResponse><Error><Code>AccessDenied</Code><Message>no</Message></Error></ErrorResponse>"#,
        )
        .route(
            Method::GET,
            "http://creds.test/role",
            StatusCode::OK,
            r#"{"AccessKeyId": "ASIACONTAINER", "SecretAccessKey": "secret", "Token": "token", "Expiration": "2124-01-01T00:00:00Z"}"#,
        );
    let ctx = create_test_context_with_env(&[
        ("AWS_CONFIG_FILE", config.as_str()),
        ("AWS_SHARED_CREDENTIALS_FILE", credentials.as_str()),
        ("AWS_CONTAINER_CREDENTIALS_FULL_URI", "http://creds.test/role"),
    ])
    .with_http_send(http.clone());

    let err = create_signer(&ctx, "us-east-1", Some("deploy"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialDenied);
    assert_eq!(http.seen().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_sso_profile_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = write_file(
        &dir,
        "config",
        &[
            "[profile sso]",
            "sso_session = corp",
            "sso_account_id = 123456789012",
            "sso_role_name = ReadOnly",
        ],
    )?;
    let ctx = create_test_context_with_env(&[("AWS_CONFIG_FILE", config.as_str())]);

    let err = create_signer(&ctx, "us-east-1", Some("sso"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialInvalid);
    Ok(())
}
