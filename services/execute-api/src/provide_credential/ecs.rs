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
use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use log::debug;
use serde::Deserialize;

/// EcsCredentialProvider loads credentials from the ECS / EKS container
/// credentials endpoint.
///
/// The endpoint is taken from:
/// - `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`, resolved against `http://169.254.170.2`
/// - `AWS_CONTAINER_CREDENTIALS_FULL_URI`
///
/// If `AWS_CONTAINER_AUTHORIZATION_TOKEN` is set, it's sent as the
/// `Authorization` header.
///
/// References:
/// - [IAM roles for tasks](https://docs.aws.amazon.com/AmazonECS/latest/developerguide/task-iam-roles.html)
#[derive(Debug, Default, Clone)]
pub struct EcsCredentialProvider {
    endpoint: Option<String>,
}

impl EcsCredentialProvider {
    /// Create a new `EcsCredentialProvider` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the endpoint used with `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl ProvideCredential for EcsCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let envs = ctx.env_vars();

        let relative_uri = envs
            .get(AWS_CONTAINER_CREDENTIALS_RELATIVE_URI)
            .filter(|v| !v.is_empty());
        let full_uri = envs
            .get(AWS_CONTAINER_CREDENTIALS_FULL_URI)
            .filter(|v| !v.is_empty());

        let url = match (relative_uri, full_uri) {
            (Some(relative), _) => {
                let endpoint = self.endpoint.as_deref().unwrap_or(ECS_CONTAINER_ENDPOINT);
                format!("{}{relative}", endpoint.trim_end_matches('/'))
            }
            (None, Some(full)) => full.to_string(),
            (None, None) => {
                debug!("not running in a container, skip ecs credential");
                return Ok(None);
            }
        };

        let mut req = http::Request::builder().uri(&url).method(Method::GET);
        if let Some(token) = envs
            .get(AWS_CONTAINER_AUTHORIZATION_TOKEN)
            .filter(|v| !v.is_empty())
        {
            req = req.header(AUTHORIZATION, token);
        }
        let req = req.body(Bytes::new()).map_err(|e| {
            Error::request_invalid("failed to build container credentials request")
                .with_source(e)
                .with_context(format!("url: {url}"))
        })?;

        let resp = ctx.http_send_as_string(req).await.map_err(|e| {
            Error::unexpected("failed to connect to container credentials endpoint")
                .with_source(e)
                .with_context(format!("url: {url}"))
        })?;

        match resp.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::credential_denied(format!(
                    "container credentials endpoint rejected the request: {}",
                    resp.body()
                ))
                .with_context(format!("status: {}", resp.status())));
            }
            status => {
                return Err(Error::unexpected(format!(
                    "request to container credentials endpoint failed: {}",
                    resp.body()
                ))
                .with_context(format!("status: {status}")));
            }
        }

        let content = resp.into_body();
        let cred: ContainerCredentials = serde_json::from_str(&content).map_err(|e| {
            Error::unexpected("failed to parse container credentials").with_source(e)
        })?;

        let expires_in = match cred.expiration.as_deref() {
            Some(v) => Some(parse_rfc3339(v)?),
            None => None,
        };

        Ok(Some(Credential {
            access_key_id: cred.access_key_id,
            secret_access_key: cred.secret_access_key,
            session_token: cred.token.filter(|v| !v.is_empty()),
            expires_in,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<String>,
}
