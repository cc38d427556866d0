// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::constants::*;
use crate::Credential;
use apisign_core::time::parse_rfc3339;
use apisign_core::{Context, Error, ProvideCredential, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{Method, StatusCode};
use log::debug;
use serde::Deserialize;

const IMDS_TOKEN_HEADER: &str = "x-aws-ec2-metadata-token";
const IMDS_TOKEN_TTL_HEADER: &str = "x-aws-ec2-metadata-token-ttl-seconds";
// 21600s (6h) is recommended by AWS.
const IMDS_TOKEN_TTL_SECONDS: &str = "21600";

/// Imdsv2CredentialProvider loads credentials from the EC2 instance metadata
/// service using the session-oriented (v2) protocol.
///
/// A fresh metadata token is fetched on every call; nothing is cached.
///
/// The provider is skipped when disabled via [`Imdsv2CredentialProvider::with_disabled`]
/// or `AWS_EC2_METADATA_DISABLED=true`, and when the token endpoint can't be
/// reached at all, which is the case off EC2. Any answer from the service
/// that is not a credential is an error.
#[derive(Debug, Default, Clone)]
pub struct Imdsv2CredentialProvider {
    endpoint: Option<String>,
    disabled: bool,
}

impl Imdsv2CredentialProvider {
    /// Create a new `Imdsv2CredentialProvider` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the endpoint for the metadata service.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Disable this provider.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    fn endpoint(&self, ctx: &Context) -> String {
        let endpoint = self
            .endpoint
            .clone()
            .or_else(|| {
                ctx.env_var(AWS_EC2_METADATA_SERVICE_ENDPOINT)
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or_else(|| EC2_METADATA_ENDPOINT.to_string());
        endpoint.trim_end_matches('/').to_string()
    }

    /// Fetch a session token, `None` when nothing answers at `endpoint`.
    async fn load_token(&self, ctx: &Context, endpoint: &str) -> Result<Option<String>> {
        let url = format!("{endpoint}/latest/api/token");
        let req = http::Request::builder()
            .uri(&url)
            .method(Method::PUT)
            .header(CONTENT_LENGTH, "0")
            .header(IMDS_TOKEN_TTL_HEADER, IMDS_TOKEN_TTL_SECONDS)
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build IMDS token request")
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;

        let resp = match ctx.http_send_as_string(req).await {
            Ok(resp) => resp,
            Err(err) => {
                debug!("ec2 metadata service at {endpoint} is unreachable: {err}");
                return Ok(None);
            }
        };

        if resp.status() != StatusCode::OK {
            return Err(imds_error("fetch token", resp.status(), resp.body()));
        }

        Ok(Some(resp.into_body()))
    }

    async fn get(&self, ctx: &Context, url: &str, token: &str) -> Result<String> {
        let req = http::Request::builder()
            .uri(url)
            .method(Method::GET)
            .header(IMDS_TOKEN_HEADER, token)
            .body(Bytes::new())
            .map_err(|e| {
                Error::request_invalid("failed to build IMDS request")
                    .with_source(e)
                    .with_context(format!("url: {url}"))
            })?;

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::unexpected("failed to send IMDS request")
                .with_source(e)
                .with_context(format!("url: {url}"))
        })?;

        if resp.status() != StatusCode::OK {
            return Err(imds_error("get metadata", resp.status(), resp.body())
                .with_context(format!("url: {url}")));
        }

        Ok(resp.into_body())
    }
}

#[async_trait]
impl ProvideCredential for Imdsv2CredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let disabled_env = ctx
            .env_var(AWS_EC2_METADATA_DISABLED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        if self.disabled || disabled_env {
            debug!("ec2 metadata service is disabled, skip imds credential");
            return Ok(None);
        }

        let endpoint = self.endpoint(ctx);
        let Some(token) = self.load_token(ctx, &endpoint).await? else {
            return Ok(None);
        };

        let url = format!("{endpoint}/latest/meta-data/iam/security-credentials/");
        let roles = self.get(ctx, &url, &token).await?;
        // The listing holds one role per line; instance profiles carry exactly one.
        let Some(role) = roles.lines().map(str::trim).find(|v| !v.is_empty()) else {
            return Err(Error::config_invalid("no IAM role attached to EC2 instance"));
        };

        let url = format!("{endpoint}/latest/meta-data/iam/security-credentials/{role}");
        let content = self.get(ctx, &url, &token).await?;
        let resp: Ec2MetadataIamSecurityCredentials =
            serde_json::from_str(&content).map_err(|e| {
                Error::unexpected("failed to parse IMDS credentials response")
                    .with_source(e)
                    .with_context(format!("role: {role}"))
            })?;

        match resp.code.as_str() {
            "Success" => {}
            "AssumeRoleUnauthorizedAccess" => {
                return Err(Error::credential_denied(format!(
                    "EC2 instance not authorized to assume role: {}",
                    resp.message
                ))
                .with_context(format!("role: {role}")));
            }
            code if code.contains("Expired") => {
                return Err(Error::credential_expired(format!(
                    "IMDS credentials expired: {}",
                    resp.message
                ))
                .with_context(format!("role: {role}")));
            }
            code => {
                return Err(Error::unexpected(format!(
                    "IMDS returned error: [{code}] {}",
                    resp.message
                ))
                .with_context(format!("role: {role}")));
            }
        }

        Ok(Some(Credential {
            access_key_id: resp.access_key_id,
            secret_access_key: resp.secret_access_key,
            session_token: Some(resp.token).filter(|v| !v.is_empty()),
            expires_in: Some(parse_rfc3339(&resp.expiration)?),
        }))
    }
}

fn imds_error(operation: &str, status: StatusCode, body: &str) -> Error {
    let message = format!("IMDS {operation} failed: {body}");
    let err = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::credential_denied(message),
        StatusCode::NOT_FOUND => Error::config_invalid(message),
        _ => Error::unexpected(message),
    };
    err.with_context(format!("status: {status}"))
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Ec2MetadataIamSecurityCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: String,
    expiration: String,

    code: String,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provide_credential::testing::MockHttpSend;
    use apisign_core::{ErrorKind, StaticEnv};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    const ENDPOINT: &str = "http://169.254.169.254";

    fn credentials_body(code: &str) -> String {
        format!(
            r#"{{
                "Code": "{code}",
                "LastUpdated": "2024-01-01T00:00:00Z",
                "Type": "AWS-HMAC",
                "AccessKeyId": "ASIAINSTANCEKEY",
                "SecretAccessKey": "instancesecret",
                "Token": "instancetoken",
                "Expiration": "2124-01-01T00:00:00Z"
            }}"#
        )
    }

    fn metadata(code: &str) -> MockHttpSend {
        MockHttpSend::default()
            .route(
                Method::PUT,
                &format!("{ENDPOINT}/latest/api/token"),
                StatusCode::OK,
                "imds-token",
            )
            .route(
                Method::GET,
                &format!("{ENDPOINT}/latest/meta-data/iam/security-credentials/"),
                StatusCode::OK,
                "web-role\n",
            )
            .route(
                Method::GET,
                &format!("{ENDPOINT}/latest/meta-data/iam/security-credentials/web-role"),
                StatusCode::OK,
                &credentials_body(code),
            )
    }

    fn context(http: MockHttpSend, envs: &[(&str, &str)]) -> Context {
        let _ = env_logger::builder().is_test(true).try_init();

        Context::new().with_http_send(http).with_env(StaticEnv {
            home_dir: None,
            envs: envs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        })
    }

    #[tokio::test]
    async fn test_imds_success() {
        let http = metadata("Success");
        let ctx = context(http.clone(), &[]);

        let cred = Imdsv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap()
            .expect("credential must be loaded");
        assert_eq!(cred.access_key_id, "ASIAINSTANCEKEY");
        assert_eq!(cred.secret_access_key, "instancesecret");
        assert_eq!(cred.session_token.as_deref(), Some("instancetoken"));
        assert!(cred.expires_in.is_some());

        let recorded = http.recorded();
        assert_eq!(recorded.len(), 3);
        assert_eq!(recorded[0].method, Method::PUT);
        assert_eq!(recorded[0].uri, format!("{ENDPOINT}/latest/api/token"));
        assert_eq!(
            recorded[2].uri,
            format!("{ENDPOINT}/latest/meta-data/iam/security-credentials/web-role")
        );
        assert_eq!(
            recorded[0]
                .headers
                .get(IMDS_TOKEN_TTL_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some(IMDS_TOKEN_TTL_SECONDS)
        );
        for req in &recorded[1..] {
            assert_eq!(
                req.headers
                    .get(IMDS_TOKEN_HEADER)
                    .and_then(|v| v.to_str().ok()),
                Some("imds-token")
            );
        }
    }

    #[tokio::test]
    async fn test_imds_fetches_token_every_call() {
        let http = metadata("Success");
        let ctx = context(http.clone(), &[]);
        let provider = Imdsv2CredentialProvider::new();

        provider.provide_credential(&ctx).await.unwrap();
        provider.provide_credential(&ctx).await.unwrap();

        let token_requests = http
            .recorded()
            .into_iter()
            .filter(|r| r.method == Method::PUT)
            .count();
        assert_eq!(token_requests, 2);
    }

    #[tokio::test]
    async fn test_imds_disabled() {
        let http = metadata("Success");

        let ctx = context(http.clone(), &[(AWS_EC2_METADATA_DISABLED, "TRUE")]);
        let cred = Imdsv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap();
        assert!(cred.is_none());

        let ctx = context(http.clone(), &[]);
        let cred = Imdsv2CredentialProvider::new()
            .with_disabled(true)
            .provide_credential(&ctx)
            .await
            .unwrap();
        assert!(cred.is_none());

        assert!(http.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_imds_endpoint_from_env() {
        let http = MockHttpSend::default().route(
            Method::PUT,
            "http://[fd00:ec2::254]/latest/api/token",
            StatusCode::FORBIDDEN,
            "",
        );
        let ctx = context(
            http.clone(),
            &[(AWS_EC2_METADATA_SERVICE_ENDPOINT, "http://[fd00:ec2::254]/")],
        );

        let err = Imdsv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialDenied);

        let recorded = http.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].uri, "http://[fd00:ec2::254]/latest/api/token");
    }

    #[tokio::test]
    async fn test_imds_unauthorized_role() {
        let ctx = context(metadata("AssumeRoleUnauthorizedAccess"), &[]);

        let err = Imdsv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialDenied);
    }

    #[tokio::test]
    async fn test_imds_expired_code() {
        let ctx = context(metadata("Expired"), &[]);

        let err = Imdsv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialExpired);
    }

    #[tokio::test]
    async fn test_imds_unreachable() {
        let http = MockHttpSend::default();
        let ctx = context(http.clone(), &[]);

        let cred = Imdsv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap();
        assert!(cred.is_none());
        // Only the token request is attempted.
        assert_eq!(http.recorded().len(), 1);
    }

    #[tokio::test]
    async fn test_imds_role_listing_error() {
        let http = MockHttpSend::default()
            .route(
                Method::PUT,
                &format!("{ENDPOINT}/latest/api/token"),
                StatusCode::OK,
                "imds-token",
            )
            .route(
                Method::GET,
                &format!("{ENDPOINT}/latest/meta-data/iam/security-credentials/"),
                StatusCode::INTERNAL_SERVER_ERROR,
                "boom",
            );
        let ctx = context(http, &[]);

        let err = Imdsv2CredentialProvider::new()
            .provide_credential(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
    }
}
