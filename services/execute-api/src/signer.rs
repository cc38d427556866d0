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
use crate::provide_credential::DefaultCredentialProvider;
use crate::sign_request::RequestSigner;
use crate::{Config, Credential};
use apisign_core::hash::hex_sha256;
use apisign_core::time::DateTime;
use apisign_core::{Context, Error, ProvideCredential, Result, SignRequest, SigningCredential};
use http::request::Parts;
use http::{HeaderValue, Request};
use log::debug;
use std::time::Duration;

/// Longest validity a presigned SigV4 request may carry.
const MAX_PRESIGN_EXPIRES: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Signer is an immutable value closed over a resolved credential, a region
/// and the `execute-api` service.
///
/// Build it with [`create_signer`], [`create_signer_with`] or
/// [`create_signer_from_config`]. All of them validate the region, and there
/// is no other way to obtain a signing primitive:
///
/// ```compile_fail
/// let signer = apisign_execute_api::RequestSigner::new("not a region");
/// ```
#[derive(Debug, Clone)]
pub struct Signer {
    ctx: Context,
    credential: Credential,
    signer: RequestSigner,
}

impl Signer {
    /// Region requests are signed for.
    pub fn region(&self) -> &str {
        self.signer.region()
    }

    /// Service requests are signed for, always `execute-api`.
    pub fn service(&self) -> &str {
        self.signer.service()
    }

    /// The credential this signer was built with.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Pin the signing time.
    ///
    /// Only useful for tests, real requests must be signed with the current time.
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.signer = self.signer.with_time(time);
        self
    }

    /// Sign the request in the `Authorization` header.
    ///
    /// `body` is hashed into `x-amz-content-sha256`; pass an empty slice for
    /// requests without a payload.
    pub async fn sign(&self, parts: &mut Parts, body: &[u8]) -> Result<()> {
        parts.headers.insert(
            X_AMZ_CONTENT_SHA_256,
            HeaderValue::from_str(&hex_sha256(body))?,
        );

        self.signer
            .sign_request(&self.ctx, parts, Some(&self.credential), None)
            .await
    }

    /// Sign a whole request, see [`Signer::sign`].
    pub async fn sign_request<B: AsRef<[u8]>>(&self, req: Request<B>) -> Result<Request<B>> {
        let (mut parts, body) = req.into_parts();
        self.sign(&mut parts, body.as_ref()).await?;
        Ok(Request::from_parts(parts, body))
    }

    /// Presign the request by moving the signature into the query string.
    ///
    /// `expires_in` must be between one second and seven days.
    pub async fn presign(&self, parts: &mut Parts, expires_in: Duration) -> Result<()> {
        if expires_in.as_secs() == 0 || expires_in > MAX_PRESIGN_EXPIRES {
            return Err(Error::request_invalid(
                "presign expiration must be between 1 second and 7 days",
            )
            .with_context(format!("expires_in: {}s", expires_in.as_secs())));
        }

        self.signer
            .sign_request(&self.ctx, parts, Some(&self.credential), Some(expires_in))
            .await
    }
}

/// Check that `region` looks like an AWS region name such as `us-east-1`.
pub fn validate_region(region: &str) -> Result<()> {
    let valid = !region.is_empty()
        && !region.starts_with('-')
        && !region.ends_with('-')
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');

    if !valid {
        return Err(Error::config_invalid("region is not a valid AWS region")
            .with_context(format!("region: {region:?}")));
    }
    Ok(())
}

/// Build a signer for `region` from the ambient credential chain.
///
/// With `profile` set, credentials come from that profile in the shared AWS
/// files (then container and instance metadata) and environment keys are
/// ignored. An unknown profile fails with
/// [`ErrorKind::CredentialNotFound`](apisign_core::ErrorKind::CredentialNotFound).
///
/// ```no_run
/// use apisign_core::{Context, OsEnv};
/// use apisign_execute_api::create_signer;
///
/// # async fn example() -> apisign_core::Result<()> {
/// let ctx = Context::new().with_env(OsEnv);
/// let signer = create_signer(&ctx, "us-east-1", Some("dev")).await?;
/// assert_eq!(signer.service(), "execute-api");
/// # Ok(())
/// # }
/// ```
pub async fn create_signer(ctx: &Context, region: &str, profile: Option<&str>) -> Result<Signer> {
    let config = Config {
        region: Some(region.to_string()),
        profile: profile.map(|v| v.to_string()),
        ..Default::default()
    };

    create_signer_with(ctx, &DefaultCredentialProvider::from_config(&config), region).await
}

/// Build a signer from `config`.
///
/// `config.region` is required. Call [`Config::from_env`] first to pick up
/// `AWS_REGION` and friends.
pub async fn create_signer_from_config(ctx: &Context, config: &Config) -> Result<Signer> {
    let Some(region) = config.region.as_deref() else {
        return Err(Error::config_invalid("region is required to build a signer"));
    };

    create_signer_with(ctx, &DefaultCredentialProvider::from_config(config), region).await
}

/// Build a signer for `region` with credentials from `provider`.
///
/// The region is validated before the provider is asked for anything.
pub async fn create_signer_with<P>(ctx: &Context, provider: &P, region: &str) -> Result<Signer>
where
    P: ProvideCredential<Credential = Credential> + ?Sized,
{
    validate_region(region)?;

    let Some(credential) = provider.provide_credential(ctx).await? else {
        return Err(Error::credential_not_found(
            "no credential found to sign execute-api requests",
        )
        .with_context(format!("region: {region}")));
    };

    if credential.is_expired() {
        return Err(Error::credential_expired("resolved credential is expired")
            .with_context(format!("expires_in: {:?}", credential.expires_in)));
    }
    if !credential.is_valid() {
        return Err(Error::credential_invalid(
            "resolved credential has an empty access key or secret",
        ));
    }

    debug!("built execute-api signer for region {region} with credential {credential:?}");

    Ok(Signer {
        ctx: ctx.clone(),
        credential,
        signer: RequestSigner::new(region),
    })
}
