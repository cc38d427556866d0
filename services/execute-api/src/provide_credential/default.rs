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

use crate::provide_credential::{
    AssumeRoleWithWebIdentityCredentialProvider, EcsCredentialProvider, EnvCredentialProvider,
    Imdsv2CredentialProvider, ProfileCredentialProvider,
};
use crate::{Config, Credential};
use apisign_core::{Context, ProvideCredential, ProvideCredentialChain, Result};
use async_trait::async_trait;
use log::debug;

/// DefaultCredentialProvider is the ambient credential chain.
///
/// Without a profile, resolution tries in order:
///
/// 1. Environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`)
/// 2. Web identity from `AWS_ROLE_ARN` and `AWS_WEB_IDENTITY_TOKEN_FILE`
/// 3. Shared profile files (profile from `AWS_PROFILE` or `default`)
/// 4. ECS container credentials
/// 5. EC2 instance metadata (IMDSv2)
///
/// With a profile from [`Config::profile`], the environment is skipped and the
/// named profile must exist. A profile without any credential configured
/// falls through to ECS and IMDS.
///
/// The first provider that fails ends resolution with its error. Only
/// providers with nothing configured are skipped, and IMDS counts as not
/// configured when its endpoint can't be reached.
#[derive(Debug)]
pub struct DefaultCredentialProvider {
    profile: Option<ProfileCredentialProvider>,
    chain: ProvideCredentialChain<Credential>,
}

impl Default for DefaultCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultCredentialProvider {
    /// Create a new `DefaultCredentialProvider` using the default chain.
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    /// Create a new `DefaultCredentialProvider` from the given config.
    pub fn from_config(config: &Config) -> Self {
        let mut files = ProfileCredentialProvider::new();
        if let Some(path) = &config.config_file {
            files = files.with_config_file(path);
        }
        if let Some(path) = &config.credentials_file {
            files = files.with_credentials_file(path);
        }

        let imds = Imdsv2CredentialProvider::new().with_disabled(config.ec2_metadata_disabled);
        files = files.with_imds(imds.clone());

        let mut web_identity = AssumeRoleWithWebIdentityCredentialProvider::new();
        if let Some(region) = &config.region {
            files = files.with_region(region);
            web_identity = web_identity.with_region(region);
        }

        match &config.profile {
            Some(profile) => Self {
                profile: Some(files.with_profile(profile)),
                chain: ProvideCredentialChain::new()
                    .push(EcsCredentialProvider::new())
                    .push(imds),
            },
            None => Self {
                profile: None,
                chain: ProvideCredentialChain::new()
                    .push(EnvCredentialProvider::new())
                    .push(web_identity)
                    .push(files)
                    .push(EcsCredentialProvider::new())
                    .push(imds),
            },
        }
    }

    /// Replace the providers tried after the explicit profile.
    pub fn with_chain(mut self, chain: ProvideCredentialChain<Credential>) -> Self {
        self.chain = chain;
        self
    }
}

#[async_trait]
impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        if let Some(profile) = &self.profile {
            if let Some(cred) = profile.provide_credential(ctx).await? {
                return Ok(Some(cred));
            }
            debug!("explicit profile has no credential configured, trying remaining providers");
        }

        self.chain.provide_credential(ctx).await
    }
}
