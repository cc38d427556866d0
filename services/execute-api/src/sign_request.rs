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
use apisign_core::hash::{hex_hmac_sha256, hex_sha256, hmac_sha256};
use apisign_core::time::{format_date, format_iso8601, now, DateTime};
use apisign_core::{Context, Result, SignRequest, SigningRequest};
use async_trait::async_trait;
use http::header;
use http::request::Parts;
use http::HeaderValue;
use log::debug;
use percent_encoding::utf8_percent_encode;
use std::fmt::Write;
use std::time::Duration;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Headers that are never signed because intermediaries are allowed to rewrite them.
const UNSIGNED_HEADERS: [&str; 3] = ["expect", "user-agent", "x-amzn-trace-id"];

/// RequestSigner computes AWS Signature Version 4 for one region and service.
///
/// It trusts the region it is given. Callers outside this crate go through
/// [`Signer`](crate::Signer), whose factories validate the region first.
///
/// - [Signature Version 4 signing process](https://docs.aws.amazon.com/general/latest/gr/signature-version-4.html)
#[derive(Debug, Clone)]
pub(crate) struct RequestSigner {
    service: &'static str,
    region: String,

    time: Option<DateTime>,
}

impl RequestSigner {
    /// Create a new `execute-api` signer for the given region.
    pub(crate) fn new(region: &str) -> Self {
        Self {
            service: EXECUTE_API_SERVICE,
            region: region.into(),

            time: None,
        }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Sign for another service, STS calls made while resolving credentials use this.
    pub(crate) fn with_service(mut self, service: &'static str) -> Self {
        self.service = service;
        self
    }

    /// Region this signer signs for.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Service this signer signs for.
    pub fn service(&self) -> &str {
        self.service
    }
}

#[async_trait]
impl SignRequest for RequestSigner {
    type Credential = Credential;

    async fn sign_request(
        &self,
        _: &Context,
        req: &mut Parts,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> Result<()> {
        let Some(cred) = credential else {
            return Ok(());
        };

        let now = self.time.unwrap_or_else(now);
        let mut signed_req = SigningRequest::build(req)?;

        // Scope: "20220313/<region>/execute-api/aws4_request"
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(now),
            self.region,
            self.service
        );
        debug!("calculated scope: {scope}");

        // canonicalize context
        canonicalize_header(&mut signed_req, cred, expires_in, now)?;
        canonicalize_query(&mut signed_req, cred, expires_in, now, &scope);

        // build canonical request and string to sign.
        let creq = canonical_request_string(&signed_req)?;
        debug!("calculated canonical request: {creq}");

        let string_to_sign = string_to_sign(now, &scope, &hex_sha256(creq.as_bytes()))?;
        debug!("calculated string to sign: {string_to_sign}");

        let signing_key =
            generate_signing_key(&cred.secret_access_key, now, &self.region, self.service);
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        if expires_in.is_some() {
            signed_req.query_push("X-Amz-Signature", signature);
        } else {
            let mut authorization = HeaderValue::from_str(&format!(
                "{ALGORITHM} Credential={}/{}, SignedHeaders={}, Signature={}",
                cred.access_key_id,
                scope,
                signed_header_names(&signed_req).join(";"),
                signature
            ))?;
            authorization.set_sensitive(true);

            signed_req
                .headers
                .insert(header::AUTHORIZATION, authorization);
        }

        // Apply to the request.
        signed_req.apply(req)
    }
}

/// Sorted names of the headers that take part in the signature.
fn signed_header_names(req: &SigningRequest) -> Vec<&str> {
    req.header_name_to_vec_sorted()
        .into_iter()
        .filter(|name| !UNSIGNED_HEADERS.contains(name))
        .collect()
}

fn canonicalize_header(
    req: &mut SigningRequest,
    cred: &Credential,
    expires_in: Option<Duration>,
    now: DateTime,
) -> Result<()> {
    // A previous signature must never be signed again.
    req.headers.remove(header::AUTHORIZATION);

    // Header names and values need to be normalized according to Step 4 of https://docs.aws.amazon.com/general/latest/gr/sigv4-create-canonical-request.html
    for (_, value) in req.headers.iter_mut() {
        SigningRequest::header_value_normalize(value)
    }

    // Insert HOST header if not present.
    if req.headers.get(header::HOST).is_none() {
        let host = HeaderValue::from_str(req.authority.as_str())?;
        req.headers.insert(header::HOST, host);
    }

    if expires_in.is_none() {
        req.headers
            .insert(X_AMZ_DATE, HeaderValue::try_from(format_iso8601(now))?);

        req.headers.remove(X_AMZ_SECURITY_TOKEN);
        if let Some(token) = &cred.session_token {
            let mut value = HeaderValue::from_str(token)?;
            // Set token value sensitive to avoid leaking.
            value.set_sensitive(true);

            req.headers.insert(X_AMZ_SECURITY_TOKEN, value);
        }
    }

    Ok(())
}

fn canonicalize_query(
    req: &mut SigningRequest,
    cred: &Credential,
    expires_in: Option<Duration>,
    now: DateTime,
    scope: &str,
) {
    if let Some(expire) = expires_in {
        let signed_headers = signed_header_names(req).join(";");

        req.query_push("X-Amz-Algorithm", ALGORITHM);
        req.query_push(
            "X-Amz-Credential",
            format!("{}/{scope}", cred.access_key_id),
        );
        req.query_push("X-Amz-Date", format_iso8601(now));
        req.query_push("X-Amz-Expires", expire.as_secs().to_string());
        req.query_push("X-Amz-SignedHeaders", signed_headers);

        if let Some(token) = &cred.session_token {
            req.query_push("X-Amz-Security-Token", token);
        }
    }

    if req.query.is_empty() {
        return;
    }

    // Pairs are sorted by their encoded form.
    let mut query = req
        .query
        .iter()
        .map(|(k, v)| {
            (
                utf8_percent_encode(k, &AWS_QUERY_ENCODE_SET).to_string(),
                utf8_percent_encode(v, &AWS_QUERY_ENCODE_SET).to_string(),
            )
        })
        .collect::<Vec<_>>();
    query.sort();
    req.query = query;
}

fn canonical_request_string(req: &SigningRequest) -> Result<String> {
    // 256 is specially chosen to avoid reallocation for most requests.
    let mut f = String::with_capacity(256);

    writeln!(f, "{}", req.method)?;
    writeln!(f, "{}", canonical_uri(&req.path))?;
    writeln!(
        f,
        "{}",
        req.query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    )?;

    let signed_headers = signed_header_names(req);
    for name in signed_headers.iter() {
        let values = req
            .headers
            .get_all(*name)
            .iter()
            .map(|v| v.to_str().map(|v| v.split_whitespace().collect::<Vec<_>>().join(" ")))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        writeln!(f, "{name}:{}", values.join(","))?;
    }
    writeln!(f)?;
    writeln!(f, "{}", signed_headers.join(";"))?;

    match req.headers.get(X_AMZ_CONTENT_SHA_256) {
        Some(v) => write!(f, "{}", v.to_str()?)?,
        None => write!(f, "{EMPTY_STRING_SHA256}")?,
    }

    Ok(f)
}

/// Canonical form of an already percent-encoded path.
///
/// Dot segments and empty segments are removed, then every byte outside the
/// unreserved set is encoded again, so `%20` becomes `%2520`.
fn canonical_uri(path: &str) -> String {
    let path = normalize_path(path);
    utf8_percent_encode(&path, &AWS_URI_ENCODE_SET).to_string()
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    if !path.contains('.') && !path.contains("//") {
        return path;
    }

    let mut segments: Vec<&str> = Vec::with_capacity(path.matches('/').count() + 1);
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            v => segments.push(v),
        }
    }

    let mut normalized = format!("/{}", segments.join("/"));
    let ends_with_slash = ["/", "/.", "/./", "/..", "/../"]
        .iter()
        .any(|v| path.ends_with(v));
    if ends_with_slash && !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

// StringToSign:
//
// AWS4-HMAC-SHA256
// 20220313T072004Z
// 20220313/<region>/<service>/aws4_request
// <hashed_canonical_request>
fn string_to_sign(now: DateTime, scope: &str, hashed_request: &str) -> Result<String> {
    let mut f = String::new();
    writeln!(f, "{ALGORITHM}")?;
    writeln!(f, "{}", format_iso8601(now))?;
    writeln!(f, "{scope}")?;
    write!(f, "{hashed_request}")?;
    Ok(f)
}

fn generate_signing_key(secret: &str, time: DateTime, region: &str, service: &str) -> Vec<u8> {
    // Sign secret
    let secret = format!("AWS4{secret}");
    // Sign date
    let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
    // Sign region
    let sign_region = hmac_sha256(sign_date.as_slice(), region.as_bytes());
    // Sign service
    let sign_service = hmac_sha256(sign_region.as_slice(), service.as_bytes());
    // Sign request
    hmac_sha256(sign_service.as_slice(), "aws4_request".as_bytes())
}
