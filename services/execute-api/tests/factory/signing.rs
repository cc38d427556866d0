use apisign_core::time::parse_rfc3339;
use apisign_core::Context;
use apisign_execute_api::{create_signer_with, Signer, StaticCredentialProvider};
use http::header::AUTHORIZATION;
use http::Request;
use pretty_assertions::assert_eq;

const URL: &str = "https://abc123.execute-api.us-east-1.amazonaws.com/prod/pets?limit=10";

async fn signer() -> anyhow::Result<Signer> {
    let provider = StaticCredentialProvider::new(
        "AKIDEXAMPLE",
        "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
    );
    Ok(create_signer_with(&Context::new(), &provider, "us-east-1").await?)
}

async fn authorization(signer: &Signer, body: &'static str) -> anyhow::Result<String> {
    let req = Request::post(URL).body(body)?;
    let req = signer.sign_request(req).await?;
    Ok(req.headers()[AUTHORIZATION].to_str()?.to_string())
}

#[tokio::test]
async fn test_signatures_are_deterministic() -> anyhow::Result<()> {
    let time = parse_rfc3339("2015-08-30T12:36:00Z")?;
    let signer = signer().await?.with_time(time);

    let first = authorization(&signer, "{}").await?;
    let second = authorization(&signer, "{}").await?;
    assert_eq!(first, second);
    assert!(first.starts_with(
        "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/execute-api/aws4_request, "
    ));
    Ok(())
}

#[tokio::test]
async fn test_signatures_differ_by_time_and_body() -> anyhow::Result<()> {
    let signer = signer().await?;

    let early = signer.clone().with_time(parse_rfc3339("2015-08-30T12:36:00Z")?);
    let late = signer.clone().with_time(parse_rfc3339("2015-08-30T12:36:01Z")?);

    assert_ne!(
        authorization(&early, "{}").await?,
        authorization(&late, "{}").await?
    );
    assert_ne!(
        authorization(&early, "{}").await?,
        authorization(&early, "[]").await?
    );
    Ok(())
}

#[tokio::test]
async fn test_signer_is_shared_across_tasks() -> anyhow::Result<()> {
    let time = parse_rfc3339("2015-08-30T12:36:00Z")?;
    let signer = signer().await?.with_time(time);
    let expected = authorization(&signer, "{}").await?;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let signer = signer.clone();
        tasks.push(tokio::spawn(async move {
            authorization(&signer, "{}").await
        }));
    }
    for task in tasks {
        assert_eq!(task.await??, expected);
    }
    Ok(())
}
