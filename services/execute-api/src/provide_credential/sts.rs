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

//! Minimal STS client for the role based providers.
//!
//! Only the two calls credential resolution needs are supported, and every
//! call hits the network: nothing here caches.

use crate::constants::*;
use crate::sign_request::RequestSigner;
use crate::Credential;
use apisign_core::time::parse_rfc3339;
use apisign_core::{Context, Error, Result, SignRequest};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use log::debug;
use serde::Deserialize;

/// STS host to call and the region requests to it are signed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StsEndpoint {
    pub host: String,
    pub region: String,
}

impl StsEndpoint {
    /// Pick the STS endpoint.
    ///
    /// The global endpoint is used unless `regional` is set, which requires a
    /// region. Global endpoints are signed for `us-east-1` (`cn-north-1` in
    /// the China partition).
    pub fn new(region: Option<&str>, regional: bool) -> Result<Self> {
        let region = region.filter(|v| !v.is_empty());

        if regional {
            let Some(region) = region else {
                return Err(Error::config_invalid(
                    "regional STS endpoint requires a region",
                ));
            };
            let host = if region.starts_with("cn-") {
                format!("sts.{region}.amazonaws.com.cn")
            } else {
                format!("sts.{region}.amazonaws.com")
            };
            return Ok(Self {
                host,
                region: region.to_string(),
            });
        }

        if region.is_some_and(|v| v.starts_with("cn-")) {
            Ok(Self {
                host: "sts.amazonaws.com.cn".to_string(),
                region: "cn-north-1".to_string(),
            })
        } else {
            Ok(Self {
                host: "sts.amazonaws.com".to_string(),
                region: "us-east-1".to_string(),
            })
        }
    }
}

/// Whether `AWS_STS_REGIONAL_ENDPOINTS` (or the profile's
/// `sts_regional_endpoints`) asks for the regional endpoint.
pub(crate) fn is_regional(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("regional"))
}

/// Call `action` and turn the returned credentials into a [`Credential`].
///
/// With `signing` set the request is signed with SigV4 for `sts`,
/// `AssumeRoleWithWebIdentity` is sent unsigned.
pub(crate) async fn request_credential(
    ctx: &Context,
    endpoint: &StsEndpoint,
    action: &str,
    params: &[(&str, &str)],
    signing: Option<&Credential>,
) -> Result<Credential> {
    let url = {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("Action", action);
        query.append_pair("Version", STS_API_VERSION);
        for (k, v) in params {
            query.append_pair(k, v);
        }
        format!("https://{}/?{}", endpoint.host, query.finish())
    };

    let req = http::Request::builder()
        .method(Method::GET)
        .uri(&url)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(X_AMZ_CONTENT_SHA_256, EMPTY_STRING_SHA256)
        .body(Bytes::new())
        .map_err(|e| {
            Error::request_invalid(format!("failed to build STS {action} request"))
                .with_source(e)
                .with_context(format!("endpoint: {}", endpoint.host))
        })?;

    let (mut parts, body) = req.into_parts();
    if let Some(cred) = signing {
        RequestSigner::new(&endpoint.region)
            .with_service(STS_SERVICE)
            .sign_request(ctx, &mut parts, Some(cred), None)
            .await?;
    }
    let req = http::Request::from_parts(parts, body);

    debug!("sending STS {action} request to {}", endpoint.host);
    let resp = ctx.http_send_as_string(req).await.map_err(|e| {
        Error::unexpected(format!("failed to send {action} request to STS"))
            .with_source(e)
            .with_context(format!("endpoint: {}", endpoint.host))
    })?;

    if resp.status() != StatusCode::OK {
        return Err(sts_error(action, resp.status(), resp.body()));
    }

    let body = resp.into_body();
    let resp: StsResponse = quick_xml::de::from_str(&body).map_err(|e| {
        Error::unexpected(format!("failed to parse STS {action} response"))
            .with_source(e)
            .with_context(format!("response_length: {}", body.len()))
    })?;
    let cred = resp.result.credentials;

    if cred.access_key_id.is_empty() || cred.secret_access_key.is_empty() {
        return Err(Error::unexpected(format!(
            "STS {action} response carries no credentials"
        )));
    }

    Ok(Credential {
        access_key_id: cred.access_key_id.trim().to_string(),
        secret_access_key: cred.secret_access_key.trim().to_string(),
        session_token: Some(cred.session_token.trim().to_string()).filter(|v| !v.is_empty()),
        expires_in: Some(parse_rfc3339(cred.expiration.trim())?),
    })
}

/// Map an STS error response onto an [`ErrorKind`](apisign_core::ErrorKind).
fn sts_error(action: &str, status: StatusCode, body: &str) -> Error {
    let detail = quick_xml::de::from_str::<StsErrorResponse>(body)
        .map(|v| v.error)
        .unwrap_or_default();
    let message = format!("STS {action} failed: [{}] {}", detail.code, detail.message);

    let err = match (status, detail.code.as_str()) {
        (_, "ExpiredToken" | "ExpiredTokenException") => Error::credential_expired(message),
        (
            _,
            "InvalidClientTokenId"
            | "SignatureDoesNotMatch"
            | "InvalidIdentityToken"
            | "IDPRejectedClaim",
        ) => Error::credential_invalid(message),
        (StatusCode::FORBIDDEN, _) | (_, "AccessDenied") => Error::credential_denied(message),
        (StatusCode::BAD_REQUEST, _) => Error::config_invalid(message),
        _ => Error::unexpected(message),
    };
    err.with_context(format!("status: {status}"))
}

#[derive(Default, Debug, Deserialize)]
#[serde(default)]
struct StsResponse {
    #[serde(rename = "AssumeRoleResult", alias = "AssumeRoleWithWebIdentityResult")]
    result: StsResult,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsResult {
    credentials: StsCredentials,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    expiration: String,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsErrorResponse {
    error: StsErrorDetail,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct StsErrorDetail {
    code: String,
    message: String,
}
