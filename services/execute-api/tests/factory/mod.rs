mod profile;
mod propagation;
mod signing;

use super::create_test_context_with_env;
use apisign_core::ErrorKind;
use apisign_execute_api::{create_signer, create_signer_from_config, Config};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_create_signer_from_env() -> anyhow::Result<()> {
    let ctx = create_test_context_with_env(&[
        ("AWS_ACCESS_KEY_ID", "AKIAENVEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "envsecret"),
    ]);

    let signer = create_signer(&ctx, "us-west-2", None).await?;
    assert_eq!(signer.region(), "us-west-2");
    assert_eq!(signer.service(), "execute-api");
    assert_eq!(signer.credential().access_key_id, "AKIAENVEXAMPLE");
    assert_eq!(signer.credential().secret_access_key, "envsecret");
    assert!(signer.credential().session_token.is_none());
    Ok(())
}

#[tokio::test]
async fn test_create_signer_with_session_token() -> anyhow::Result<()> {
    let ctx = create_test_context_with_env(&[
        ("AWS_ACCESS_KEY_ID", "ASIAENVEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "envsecret"),
        ("AWS_SESSION_TOKEN", "envtoken"),
    ]);

    let signer = create_signer(&ctx, "us-east-1", None).await?;
    assert_eq!(signer.credential().session_token.as_deref(), Some("envtoken"));
    Ok(())
}

#[tokio::test]
async fn test_create_signer_without_credentials() {
    let ctx = create_test_context_with_env(&[]);

    let err = create_signer(&ctx, "us-east-1", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CredentialNotFound);
    assert!(err.is_credential_error());
}

#[tokio::test]
async fn test_create_signer_invalid_region() {
    let ctx = create_test_context_with_env(&[
        ("AWS_ACCESS_KEY_ID", "AKIAENVEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "envsecret"),
    ]);

    for region in ["", "Not A Region", "us-east-1-"] {
        let err = create_signer(&ctx, region, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid, "{region:?}");
    }
}

#[tokio::test]
async fn test_create_signer_from_config() -> anyhow::Result<()> {
    let ctx = create_test_context_with_env(&[
        ("AWS_ACCESS_KEY_ID", "AKIAENVEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "envsecret"),
        ("AWS_REGION", "ap-southeast-2"),
    ]);

    let config = Config::default().from_env(&ctx);
    let signer = create_signer_from_config(&ctx, &config).await?;
    assert_eq!(signer.region(), "ap-southeast-2");

    // An explicit region wins over the environment.
    let config = Config::default().with_region("eu-central-1").from_env(&ctx);
    let signer = create_signer_from_config(&ctx, &config).await?;
    assert_eq!(signer.region(), "eu-central-1");
    Ok(())
}

#[tokio::test]
async fn test_create_signer_from_config_without_region() {
    let ctx = create_test_context_with_env(&[
        ("AWS_ACCESS_KEY_ID", "AKIAENVEXAMPLE"),
        ("AWS_SECRET_ACCESS_KEY", "envsecret"),
    ]);

    let config = Config::default().from_env(&ctx);
    let err = create_signer_from_config(&ctx, &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
}
