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
use crate::provide_credential::sts::{is_regional, request_credential, StsEndpoint};
use crate::Credential;
use apisign_core::time::now;
use apisign_core::{Context, Error, ProvideCredential, Result};
use async_trait::async_trait;
use log::debug;

/// One `sts:AssumeRole` call: the role and the options sent with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AssumeRole {
    pub role_arn: String,
    pub role_session_name: Option<String>,
    pub external_id: Option<String>,
    pub duration_seconds: Option<u32>,
}

impl AssumeRole {
    pub fn new(role_arn: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            role_session_name: None,
            external_id: None,
            duration_seconds: None,
        }
    }

    /// Exchange `source` for credentials of this role.
    pub async fn assume(
        &self,
        ctx: &Context,
        endpoint: &StsEndpoint,
        source: &Credential,
    ) -> Result<Credential> {
        let session_name = self
            .role_session_name
            .clone()
            .unwrap_or_else(|| format!("apisign-session-{}", now().timestamp()));
        let duration = self.duration_seconds.map(|v| v.to_string());

        let mut params = vec![
            ("RoleArn", self.role_arn.as_str()),
            ("RoleSessionName", session_name.as_str()),
        ];
        if let Some(v) = &self.external_id {
            params.push(("ExternalId", v.as_str()));
        }
        if let Some(v) = &duration {
            params.push(("DurationSeconds", v.as_str()));
        }

        debug!("assuming role {} with session {session_name}", self.role_arn);
        request_credential(ctx, endpoint, "AssumeRole", &params, Some(source))
            .await
            .map_err(|e| e.with_context(format!("role_arn: {}", self.role_arn)))
    }
}

/// AssumeRoleCredentialProvider exchanges the credential of another provider
/// for temporary credentials of an IAM role.
///
/// Every call performs one `sts:AssumeRole` request. The source provider
/// must yield a credential; `None` from it is a
/// [`ErrorKind::CredentialNotFound`](apisign_core::ErrorKind::CredentialNotFound) error.
///
/// ```no_run
/// use apisign_execute_api::{AssumeRoleCredentialProvider, EnvCredentialProvider};
///
/// let provider = AssumeRoleCredentialProvider::new(
///     "arn:aws:iam::123456789012:role/api-caller",
///     EnvCredentialProvider::new(),
/// )
/// .with_external_id("partner-42");
/// ```
#[derive(Debug)]
pub struct AssumeRoleCredentialProvider {
    role: AssumeRole,
    region: Option<String>,
    regional_endpoint: Option<bool>,
    source: Box<dyn ProvideCredential<Credential = Credential>>,
}

impl AssumeRoleCredentialProvider {
    /// Assume `role_arn` with credentials from `source`.
    pub fn new(
        role_arn: impl Into<String>,
        source: impl ProvideCredential<Credential = Credential>,
    ) -> Self {
        Self {
            role: AssumeRole::new(role_arn),
            region: None,
            regional_endpoint: None,
            source: Box::new(source),
        }
    }

    /// Set the role session name, `apisign-session-<unix time>` by default.
    pub fn with_role_session_name(mut self, name: impl Into<String>) -> Self {
        self.role.role_session_name = Some(name.into());
        self
    }

    /// Set the external id the role's trust policy asks for.
    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.role.external_id = Some(id.into());
        self
    }

    /// Set how long the returned credential stays valid.
    pub fn with_duration_seconds(mut self, seconds: u32) -> Self {
        self.role.duration_seconds = Some(seconds);
        self
    }

    /// Set the region used to pick the STS endpoint, `AWS_REGION` otherwise.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Call the regional STS endpoint instead of the global one.
    ///
    /// Defaults to `AWS_STS_REGIONAL_ENDPOINTS=regional`.
    pub fn with_regional_endpoint(mut self, regional: bool) -> Self {
        self.regional_endpoint = Some(regional);
        self
    }
}

#[async_trait]
impl ProvideCredential for AssumeRoleCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let Some(source) = self.source.provide_credential(ctx).await? else {
            return Err(Error::credential_not_found(
                "no source credential to assume role with",
            )
            .with_context(format!("role_arn: {}", self.role.role_arn)));
        };

        let region = self.region.clone().or_else(|| ctx.env_var(AWS_REGION));
        let regional = self
            .regional_endpoint
            .unwrap_or_else(|| is_regional(ctx.env_var(AWS_STS_REGIONAL_ENDPOINTS).as_deref()));
        let endpoint = StsEndpoint::new(region.as_deref(), regional)?;

        self.role.assume(ctx, &endpoint, &source).await.map(Some)
    }
}
