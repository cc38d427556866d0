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
use crate::provide_credential::assume_role::AssumeRole;
use crate::provide_credential::sts::{is_regional, StsEndpoint};
use crate::provide_credential::{
    AssumeRoleWithWebIdentityCredentialProvider, EcsCredentialProvider, EnvCredentialProvider,
    Imdsv2CredentialProvider, ProcessCredentialProvider,
};
use crate::Credential;
use apisign_core::{Context, Error, ProvideCredential, Result};
use async_trait::async_trait;
use ini::Ini;
use log::debug;
use std::collections::HashMap;

/// Keys of credential sources that can't be resolved without user interaction
/// or a token cache this crate doesn't manage.
const UNSUPPORTED_KEYS: &[&str] = &[
    "sso_start_url",
    "sso_session",
    "sso_account_id",
    "sso_role_name",
    "mfa_serial",
];

/// ProfileCredentialProvider loads AWS credentials from the shared files.
///
/// This provider reads:
/// - `~/.aws/credentials` (or the path specified by `AWS_SHARED_CREDENTIALS_FILE`), section `[name]`
/// - `~/.aws/config` (or the path specified by `AWS_CONFIG_FILE`), section `[profile name]`
///
/// Both sections are merged, values from the credentials file win.
///
/// The profile to use is determined by:
/// 1. The profile specified via `with_profile()`
/// 2. The `AWS_PROFILE` environment variable
/// 3. Default to "default"
///
/// A profile resolves to the first of:
/// 1. `role_arn` with `web_identity_token_file`, `source_profile` or
///    `credential_source`: one `sts:AssumeRole` call per role in the chain.
/// 2. `aws_access_key_id` and `aws_secret_access_key`.
/// 3. `credential_process`.
///
/// A profile with none of these yields `None`. Profiles configured for SSO or
/// MFA, half-configured static keys and broken role chains are
/// [`ErrorKind::CredentialInvalid`](apisign_core::ErrorKind::CredentialInvalid).
/// A profile given via `with_profile()` must exist in one of the files,
/// otherwise resolution fails with [`ErrorKind::CredentialNotFound`](apisign_core::ErrorKind::CredentialNotFound).
#[derive(Debug, Default, Clone)]
pub struct ProfileCredentialProvider {
    profile: Option<String>,
    config_file: Option<String>,
    credentials_file: Option<String>,
    region: Option<String>,
    imds: Imdsv2CredentialProvider,
}

impl ProfileCredentialProvider {
    /// Create a new ProfileCredentialProvider with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the profile name to use.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Set the path to the config file.
    pub fn with_config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Set the path to the credentials file.
    pub fn with_credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Set the region used to pick the STS endpoint for role profiles.
    ///
    /// Falls back to the profile's `region`, then `AWS_REGION`.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the provider used for `credential_source = Ec2InstanceMetadata`.
    pub fn with_imds(mut self, imds: Imdsv2CredentialProvider) -> Self {
        self.imds = imds;
        self
    }

    /// Read and parse an ini file. A file that can't be read yields `None`.
    async fn load_ini(
        &self,
        ctx: &Context,
        configured: Option<&str>,
        env_key: &str,
        default_path: &str,
    ) -> Result<Option<Ini>> {
        let path = configured
            .map(|v| v.to_string())
            .or_else(|| ctx.env_var(env_key))
            .unwrap_or_else(|| default_path.to_string());

        let Some(path) = ctx.expand_home_dir(&path) else {
            debug!("failed to expand homedir for path: {path}");
            return Ok(None);
        };

        let content = match ctx.file_read_as_string(&path).await {
            Ok(content) => content,
            Err(err) => {
                debug!("failed to read profile file {path}: {err:?}");
                return Ok(None);
            }
        };

        Ini::load_from_str(&content).map(Some).map_err(|e| {
            Error::credential_invalid("failed to parse profile file")
                .with_source(e)
                .with_context(format!("path: {path}"))
        })
    }

    async fn load_files(&self, ctx: &Context) -> Result<ProfileFiles> {
        let credentials = self
            .load_ini(
                ctx,
                self.credentials_file.as_deref(),
                AWS_SHARED_CREDENTIALS_FILE,
                "~/.aws/credentials",
            )
            .await?;
        let config = self
            .load_ini(
                ctx,
                self.config_file.as_deref(),
                AWS_CONFIG_FILE,
                "~/.aws/config",
            )
            .await?;

        Ok(ProfileFiles {
            credentials,
            config,
        })
    }

    /// Walk `role_arn` / `source_profile` links down to a base credential,
    /// then assume every role on the way back up.
    async fn resolve(
        &self,
        ctx: &Context,
        files: &ProfileFiles,
        name: &str,
        top: Profile,
    ) -> Result<Option<Credential>> {
        let region = self
            .region
            .clone()
            .or_else(|| top.get("region"))
            .or_else(|| ctx.env_var(AWS_REGION).filter(|v| !v.is_empty()));
        let regional = top
            .get("sts_regional_endpoints")
            .or_else(|| ctx.env_var(AWS_STS_REGIONAL_ENDPOINTS));
        let regional = is_regional(regional.as_deref());

        let mut roles: Vec<AssumeRole> = Vec::new();
        let mut visited = vec![name.to_string()];
        let mut current = name.to_string();
        let mut profile = top;

        let base = loop {
            let top_level = roles.is_empty();
            let role_arn = profile.get("role_arn");

            // Source profiles use their own keys before their own role.
            if role_arn.is_none() || !top_level {
                if let Some(cred) = profile.static_credential(&current)? {
                    break cred;
                }
            }

            if let Some(key) = UNSUPPORTED_KEYS.iter().find(|k| profile.has(k)) {
                return Err(Error::credential_invalid(format!(
                    "profile {current} uses {key}, which is not supported"
                )));
            }

            if let Some(role_arn) = role_arn {
                if let Some(token_file) = profile.get("web_identity_token_file") {
                    let mut provider = AssumeRoleWithWebIdentityCredentialProvider::new()
                        .with_role_arn(&role_arn)
                        .with_web_identity_token_file(token_file)
                        .with_regional_endpoint(regional);
                    if let Some(v) = &region {
                        provider = provider.with_region(v);
                    }
                    if let Some(v) = profile.get("role_session_name") {
                        provider = provider.with_role_session_name(v);
                    }
                    break provider.provide_credential(ctx).await?.ok_or_else(|| {
                        Error::credential_not_found("web identity yielded no credential")
                            .with_context(format!("profile: {current}"))
                    })?;
                }

                roles.push(profile.assume_role(&current, role_arn)?);

                match (profile.get("source_profile"), profile.get("credential_source")) {
                    (Some(_), Some(_)) => {
                        return Err(Error::credential_invalid(format!(
                            "profile {current} sets both source_profile and credential_source"
                        )));
                    }
                    (None, None) => {
                        return Err(Error::credential_invalid(format!(
                            "profile {current} sets role_arn without source_profile or credential_source"
                        )));
                    }
                    (None, Some(source)) => break self.credential_source(ctx, &source).await?,
                    (Some(source), None) if source == current => {
                        match profile.static_credential(&current)? {
                            Some(cred) => break cred,
                            None => {
                                return Err(Error::credential_invalid(format!(
                                    "profile {current} is its own source_profile but has no static keys"
                                )));
                            }
                        }
                    }
                    (Some(source), None) => {
                        if visited.contains(&source) {
                            return Err(Error::credential_invalid(format!(
                                "source_profile loop: {} -> {source}",
                                visited.join(" -> ")
                            )));
                        }
                        profile = files.profile(&source).ok_or_else(|| {
                            Error::credential_invalid(format!(
                                "source_profile {source} of profile {current} not found"
                            ))
                        })?;
                        visited.push(source.clone());
                        current = source;
                        continue;
                    }
                }
            }

            if let Some(command) = profile.get("credential_process") {
                break ProcessCredentialProvider::new(command)
                    .provide_credential(ctx)
                    .await?
                    .ok_or_else(|| {
                        Error::credential_not_found("credential_process yielded no credential")
                            .with_context(format!("profile: {current}"))
                    })?;
            }

            if top_level {
                debug!("profile {current} has no credential configured");
                return Ok(None);
            }
            return Err(Error::credential_invalid(format!(
                "source_profile {current} has no credential configured"
            )));
        };

        if roles.is_empty() {
            return Ok(Some(base));
        }

        let endpoint = StsEndpoint::new(region.as_deref(), regional)?;
        let mut cred = base;
        for role in roles.iter().rev() {
            cred = role.assume(ctx, &endpoint, &cred).await?;
        }
        Ok(Some(cred))
    }

    async fn credential_source(&self, ctx: &Context, source: &str) -> Result<Credential> {
        let cred = match source {
            "Environment" => EnvCredentialProvider::new().provide_credential(ctx).await?,
            "Ec2InstanceMetadata" => self.imds.provide_credential(ctx).await?,
            "EcsContainer" => EcsCredentialProvider::new().provide_credential(ctx).await?,
            _ => {
                return Err(Error::credential_invalid(format!(
                    "unsupported credential_source {source}"
                )));
            }
        };

        cred.ok_or_else(|| {
            Error::credential_not_found(format!("credential_source {source} yielded no credential"))
        })
    }
}

/// The parsed shared files.
struct ProfileFiles {
    credentials: Option<Ini>,
    config: Option<Ini>,
}

impl ProfileFiles {
    /// Merge the profile's sections, `None` if neither file has one.
    fn profile(&self, name: &str) -> Option<Profile> {
        let mut config_sections = vec![format!("profile {name}")];
        if name == "default" {
            config_sections.push("default".to_string());
        }

        let mut found = false;
        let mut props = HashMap::new();
        if let Some(conf) = &self.config {
            for section in config_sections.iter().rev() {
                if let Some(section) = conf.section(Some(section.as_str())) {
                    found = true;
                    props.extend(section.iter().map(|(k, v)| (k.to_string(), v.to_string())));
                }
            }
        }
        if let Some(section) = self
            .credentials
            .as_ref()
            .and_then(|conf| conf.section(Some(name)))
        {
            found = true;
            props.extend(section.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        }

        found.then_some(Profile(props))
    }
}

/// Merged key/value pairs of one profile.
struct Profile(HashMap<String, String>);

impl Profile {
    fn get(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn static_credential(&self, name: &str) -> Result<Option<Credential>> {
        match (self.get("aws_access_key_id"), self.get("aws_secret_access_key")) {
            (Some(access_key_id), Some(secret_access_key)) => Ok(Some(Credential {
                access_key_id,
                secret_access_key,
                session_token: self.get("aws_session_token"),
                expires_in: None,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(Error::credential_invalid(format!(
                "profile {name} sets aws_access_key_id but not aws_secret_access_key"
            ))),
            (None, Some(_)) => Err(Error::credential_invalid(format!(
                "profile {name} sets aws_secret_access_key but not aws_access_key_id"
            ))),
        }
    }

    fn assume_role(&self, name: &str, role_arn: String) -> Result<AssumeRole> {
        let duration_seconds = self
            .get("duration_seconds")
            .map(|v| {
                v.parse::<u32>().map_err(|e| {
                    Error::credential_invalid(format!(
                        "profile {name} has invalid duration_seconds {v}"
                    ))
                    .with_source(e)
                })
            })
            .transpose()?;

        Ok(AssumeRole {
            role_arn,
            role_session_name: self.get("role_session_name"),
            external_id: self.get("external_id"),
            duration_seconds,
        })
    }
}

#[async_trait]
impl ProvideCredential for ProfileCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let (name, explicit) = match &self.profile {
            Some(profile) => (profile.clone(), true),
            None => (
                ctx.env_var(AWS_PROFILE)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| "default".to_string()),
                false,
            ),
        };

        let files = self.load_files(ctx).await?;
        let Some(profile) = files.profile(&name) else {
            if explicit {
                return Err(Error::credential_not_found(format!(
                    "profile {name} not found"
                )));
            }

            debug!("profile {name} not found in credentials or config file");
            return Ok(None);
        };

        self.resolve(ctx, &files, &name, profile).await
    }
}
