use crate::create_test_context_with_env;
use apisign_core::ErrorKind;
use apisign_execute_api::{create_signer, create_signer_from_config, Config};
use pretty_assertions::assert_eq;
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

/// Write a credentials file with `default` and `dev` profiles.
fn shared_files() -> anyhow::Result<(TempDir, String, String)> {
    let dir = tempfile::tempdir()?;

    let credentials = dir.path().join("credentials");
    let mut f = File::create(&credentials)?;
    writeln!(f, "[default]")?;
    writeln!(f, "aws_access_key_id = AKIADEFAULTEXAMPLE")?;
    writeln!(f, "aws_secret_access_key = defaultsecret")?;
    writeln!(f)?;
    writeln!(f, "[dev]")?;
    writeln!(f, "aws_access_key_id = ASIADEVEXAMPLE")?;
    writeln!(f, "aws_secret_access_key = devsecret")?;
    writeln!(f, "aws_session_token = devtoken")?;

    let config = dir.path().join("config");
    let mut f = File::create(&config)?;
    writeln!(f, "[profile staging]")?;
    writeln!(f, "region = eu-west-1")?;
    writeln!(f, "aws_access_key_id = AKIASTAGINGEXAMPLE")?;
    writeln!(f, "aws_secret_access_key = stagingsecret")?;

    let credentials = credentials.to_string_lossy().to_string();
    let config = config.to_string_lossy().to_string();
    Ok((dir, credentials, config))
}

#[tokio::test]
async fn test_explicit_profile() -> anyhow::Result<()> {
    let (_dir, credentials, config) = shared_files()?;
    let ctx = create_test_context_with_env(&[
        ("AWS_SHARED_CREDENTIALS_FILE", credentials.as_str()),
        ("AWS_CONFIG_FILE", config.as_str()),
        // Ignored because a profile is named.
        ("AWS_ACCESS_KEY_ID", "AKIAENVEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "envsecret"),
    ]);

    let signer = create_signer(&ctx, "us-east-1", Some("dev")).await?;
    assert_eq!(signer.credential().access_key_id, "ASIADEVEXAMPLE");
    assert_eq!(signer.credential().session_token.as_deref(), Some("devtoken"));

    let signer = create_signer(&ctx, "us-east-1", Some("staging")).await?;
    assert_eq!(signer.credential().access_key_id, "AKIASTAGINGEXAMPLE");
    Ok(())
}

#[tokio::test]
async fn test_nonexistent_profile() -> anyhow::Result<()> {
    let (_dir, credentials, config) = shared_files()?;
    let ctx = create_test_context_with_env(&[
        ("AWS_SHARED_CREDENTIALS_FILE", credentials.as_str()),
        ("AWS_CONFIG_FILE", config.as_str()),
        ("AWS_ACCESS_KEY_ID", "AKIAENVEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "envsecret"),
    ]);

    let err = create_signer(&ctx, "us-east-1", Some("nonexistent-profile"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialNotFound);
    Ok(())
}

#[tokio::test]
async fn test_default_scope_uses_profile_env() -> anyhow::Result<()> {
    let (_dir, credentials, config) = shared_files()?;
    let ctx = create_test_context_with_env(&[
        ("AWS_SHARED_CREDENTIALS_FILE", credentials.as_str()),
        ("AWS_CONFIG_FILE", config.as_str()),
        ("AWS_PROFILE", "dev"),
    ]);

    let signer = create_signer(&ctx, "us-east-1", None).await?;
    assert_eq!(signer.credential().access_key_id, "ASIADEVEXAMPLE");
    Ok(())
}

#[tokio::test]
async fn test_default_scope_prefers_env_keys() -> anyhow::Result<()> {
    let (_dir, credentials, config) = shared_files()?;
    let ctx = create_test_context_with_env(&[
        ("AWS_SHARED_CREDENTIALS_FILE", credentials.as_str()),
        ("AWS_CONFIG_FILE", config.as_str()),
        ("AWS_ACCESS_KEY_ID", "AKIAENVEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "envsecret"),
    ]);

    let signer = create_signer(&ctx, "us-east-1", None).await?;
    assert_eq!(signer.credential().access_key_id, "AKIAENVEXAMPLE");
    Ok(())
}

#[tokio::test]
async fn test_config_profile_and_files() -> anyhow::Result<()> {
    let (_dir, credentials, config) = shared_files()?;
    let ctx = create_test_context_with_env(&[]);

    let config = Config {
        region: Some("us-east-2".to_string()),
        profile: Some("dev".to_string()),
        config_file: Some(config),
        credentials_file: Some(credentials),
        ec2_metadata_disabled: true,
    };
    let signer = create_signer_from_config(&ctx, &config).await?;
    assert_eq!(signer.region(), "us-east-2");
    assert_eq!(signer.credential().access_key_id, "ASIADEVEXAMPLE");
    Ok(())
}
