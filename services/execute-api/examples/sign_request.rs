use anyhow::Result;
use apisign_core::{Context, OsEnv};
use apisign_execute_api::create_signer;
use apisign_file_read_tokio::TokioFileRead;
use apisign_http_send_reqwest::ReqwestHttpSend;
use reqwest::Client;
use std::time::Duration;

/// Usage: `cargo run --example sign_request -- <url> [region] [profile]`
#[tokio::main]
async fn main() -> Result<()> {
    let _ = env_logger::builder().try_init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .unwrap_or_else(|| "https://abc123.execute-api.us-east-1.amazonaws.com/prod/".to_string());
    let region = args.next().unwrap_or_else(|| "us-east-1".to_string());
    let profile = args.next();

    // Metadata endpoints are unreachable outside AWS, fail fast there.
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(1))
        .build()?;

    let ctx = Context::new()
        .with_file_read(TokioFileRead)
        .with_http_send(ReqwestHttpSend::new(client.clone()))
        .with_env(OsEnv);

    let signer = create_signer(&ctx, &region, profile.as_deref()).await?;
    println!(
        "Resolved credential {:?} for {}/{}",
        signer.credential(),
        signer.region(),
        signer.service()
    );

    let req = http::Request::get(&url).body(Vec::new())?;
    let req = signer.sign_request(req).await?;
    println!("Authorization: {:?}", req.headers().get("authorization"));

    let resp = client.execute(req.map(reqwest::Body::from).try_into()?).await?;
    println!("Response status: {}", resp.status());
    println!("Response body: {}", resp.text().await?);

    Ok(())
}
