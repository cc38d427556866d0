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

/// AssumeRoleWithWebIdentityCredentialProvider exchanges an OIDC token file
/// for temporary credentials of an IAM role (EKS IRSA and friends).
///
/// Unset fields fall back to the environment:
///
/// - `AWS_ROLE_ARN`
/// - `AWS_WEB_IDENTITY_TOKEN_FILE`
/// - `AWS_ROLE_SESSION_NAME`
/// - `AWS_REGION` and `AWS_STS_REGIONAL_ENDPOINTS` for the STS endpoint
///
/// Without both a role and a token file the provider yields nothing. Once
/// both are known, an unreadable token file or an STS failure is an error.
#[derive(Debug, Default, Clone)]
pub struct AssumeRoleWithWebIdentityCredentialProvider {
    role_arn: Option<String>,
    web_identity_token_file: Option<String>,
    role_session_name: Option<String>,
    region: Option<String>,
    regional_endpoint: Option<bool>,
}

impl AssumeRoleWithWebIdentityCredentialProvider {
    /// Create a provider configured from the environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the role to assume.
    pub fn with_role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.role_arn = Some(role_arn.into());
        self
    }

    /// Set the file holding the web identity token.
    pub fn with_web_identity_token_file(mut self, path: impl Into<String>) -> Self {
        self.web_identity_token_file = Some(path.into());
        self
    }

    /// Set the role session name.
    pub fn with_role_session_name(mut self, name: impl Into<String>) -> Self {
        self.role_session_name = Some(name.into());
        self
    }

    /// Set the region used to pick the STS endpoint.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Call the regional STS endpoint instead of the global one.
    pub fn with_regional_endpoint(mut self, regional: bool) -> Self {
        self.regional_endpoint = Some(regional);
        self
    }
}

#[async_trait]
impl ProvideCredential for AssumeRoleWithWebIdentityCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let envs = ctx.env_vars();
        let env = |key: &str| envs.get(key).filter(|v| !v.is_empty()).cloned();

        let role_arn = self.role_arn.clone().or_else(|| env(AWS_ROLE_ARN));
        let token_file = self
            .web_identity_token_file
            .clone()
            .or_else(|| env(AWS_WEB_IDENTITY_TOKEN_FILE));
        let (Some(role_arn), Some(token_file)) = (role_arn, token_file) else {
            debug!("no web identity role configured, skip web identity credential");
            return Ok(None);
        };

        let path = ctx.expand_home_dir(&token_file).unwrap_or(token_file);
        let token = ctx.file_read_as_string(&path).await.map_err(|e| {
            Error::credential_invalid("failed to read web identity token file")
                .with_source(e)
                .with_context(format!("path: {path}"))
        })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::credential_invalid("web identity token file is empty")
                .with_context(format!("path: {path}")));
        }

        let session_name = self
            .role_session_name
            .clone()
            .or_else(|| env(AWS_ROLE_SESSION_NAME))
            .unwrap_or_else(|| format!("apisign-session-{}", now().timestamp()));
        let region = self.region.clone().or_else(|| env(AWS_REGION));
        let regional = self
            .regional_endpoint
            .unwrap_or_else(|| is_regional(env(AWS_STS_REGIONAL_ENDPOINTS).as_deref()));
        let endpoint = StsEndpoint::new(region.as_deref(), regional)?;

        request_credential(
            ctx,
            &endpoint,
            "AssumeRoleWithWebIdentity",
            &[
                ("RoleArn", role_arn.as_str()),
                ("RoleSessionName", session_name.as_str()),
                ("WebIdentityToken", token),
            ],
            None,
        )
        .await
        .map(Some)
        .map_err(|e| e.with_context(format!("role_arn: {role_arn}")))
    }
}
