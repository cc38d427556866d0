use apisign_core::{Context, OsEnv};
use apisign_execute_api::create_signer;
use apisign_file_read_tokio::TokioFileRead;
use apisign_http_send_reqwest::ReqwestHttpSend;
use http::{Request, StatusCode};
use log::{debug, warn};
use reqwest::Client;
use std::env;
use std::time::Duration;

/// Settings for calls against a real API Gateway stage.
///
/// Enabled with `APISIGN_EXECUTE_API_TEST=on`, the endpoint must use IAM authorization.
fn live_settings() -> Option<(String, String, Option<String>)> {
    let _ = env_logger::builder().is_test(true).try_init();

    if env::var("APISIGN_EXECUTE_API_TEST").unwrap_or_default() != "on" {
        return None;
    }

    let url = env::var("APISIGN_EXECUTE_API_URL").expect("APISIGN_EXECUTE_API_URL must be set");
    let region =
        env::var("APISIGN_EXECUTE_API_REGION").expect("APISIGN_EXECUTE_API_REGION must be set");
    let profile = env::var("APISIGN_EXECUTE_API_PROFILE").ok();
    Some((url, region, profile))
}

#[tokio::test]
async fn test_signed_request_is_accepted() -> anyhow::Result<()> {
    let Some((url, region, profile)) = live_settings() else {
        warn!("APISIGN_EXECUTE_API_TEST is not set, skipped");
        return Ok(());
    };

    let client = Client::builder()
        .connect_timeout(Duration::from_secs(1))
        .build()?;
    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::new(client.clone()))
        .with_env(OsEnv);

    let signer = create_signer(&ctx, &region, profile.as_deref()).await?;
    let req = signer
        .sign_request(Request::get(&url).body(Vec::new())?)
        .await?;
    debug!("signed request: {req:?}");

    let resp = client
        .execute(req.map(reqwest::Body::from).try_into()?)
        .await?;
    debug!("got response: {resp:?}");
    assert_ne!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_unsigned_request_is_rejected() -> anyhow::Result<()> {
    let Some((url, _, _)) = live_settings() else {
        warn!("APISIGN_EXECUTE_API_TEST is not set, skipped");
        return Ok(());
    };

    let resp = Client::new().get(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    Ok(())
}
