use std::time::SystemTime;

use apisign_core::Context;
use apisign_execute_api::{create_signer_with, StaticCredentialProvider, EXECUTE_API_SERVICE};
use aws_sigv4::http_request::PayloadChecksumKind;
use aws_sigv4::http_request::SignableBody;
use aws_sigv4::http_request::SignableRequest;
use aws_sigv4::http_request::SigningSettings;
use aws_sigv4::sign::v4::SigningParams;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use once_cell::sync::Lazy;

criterion_group!(benches, bench);
criterion_main!(benches);

const URL: &str = "https://abc123.execute-api.us-east-1.amazonaws.com/prod/pets?limit=10";
const BODY: &str = r#"{"name":"rex","type":"dog"}"#;

static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .expect("must success")
});

pub fn bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute_api");

    group.bench_function("apisign", |b| {
        let provider = StaticCredentialProvider::new("access_key_id", "secret_access_key");
        let signer = RUNTIME
            .block_on(create_signer_with(&Context::new(), &provider, "us-east-1"))
            .expect("signer must be built");

        b.to_async(&*RUNTIME).iter(|| async {
            let req = http::Request::post(URL)
                .body(BODY)
                .expect("request must be valid");
            signer.sign_request(req).await.expect("must success")
        })
    });

    group.bench_function("aws_sigv4", |b| {
        let mut ss = SigningSettings::default();
        ss.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;

        let credentials = aws_credential_types::Credentials::new(
            "access_key_id".to_string(),
            "secret_access_key".to_string(),
            None,
            None,
            "test",
        )
        .into();

        let sp = SigningParams::builder()
            .identity(&credentials)
            .region("us-east-1")
            .name(EXECUTE_API_SERVICE)
            .time(SystemTime::now())
            .settings(ss)
            .build()
            .expect("signing params must be valid")
            .into();

        b.iter(|| {
            let _ = aws_sigv4::http_request::sign(
                SignableRequest::new(
                    "POST",
                    URL,
                    std::iter::empty(),
                    SignableBody::Bytes(BODY.as_bytes()),
                )
                .expect("request must be valid"),
                &sp,
            )
            .expect("signing must succeed");
        })
    });

    group.finish();
}
