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

//! Sign API Gateway (`execute-api`) requests with AWS Signature Version 4.
//!
//! The crate resolves AWS credentials from the ambient credential chain (or a
//! provider you inject) and turns them into an immutable [`Signer`] bound to one
//! region and the fixed `execute-api` service.
//!
//! ## Quick Start
//!
//! ```no_run
//! use apisign_core::{Context, OsEnv};
//! use apisign_execute_api::create_signer;
//! use apisign_file_read_tokio::TokioFileRead;
//! use apisign_http_send_reqwest::ReqwestHttpSend;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = Context::new()
//!         .with_file_read(TokioFileRead)
//!         .with_http_send(ReqwestHttpSend::default())
//!         .with_env(OsEnv);
//!
//!     // `None` uses the default credential scope.
//!     let signer = create_signer(&ctx, "us-east-1", None).await?;
//!
//!     let req = http::Request::get("https://abc123.execute-api.us-east-1.amazonaws.com/prod/pets")
//!         .body(Vec::new())?;
//!     let req = signer.sign_request(req).await?;
//!     println!("{:?}", req.headers());
//!     Ok(())
//! }
//! ```
//!
//! ## Credential Sources
//!
//! [`DefaultCredentialProvider`] tries, in order:
//!
//! - environment variables (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`)
//! - web identity (`AWS_ROLE_ARN`, `AWS_WEB_IDENTITY_TOKEN_FILE`)
//! - shared profile files (`~/.aws/credentials`, `~/.aws/config`), including
//!   `role_arn` chains and `credential_process`
//! - ECS container credentials
//! - EC2 instance metadata (IMDSv2)
//!
//! Naming a profile skips the environment variables and requires the profile to exist.
//! A source that is configured but fails stops resolution with its error.
//! `credential_process` needs a [`CommandExecute`](apisign_core::CommandExecute)
//! in the context, such as `apisign_command_execute_tokio::TokioCommandExecute`.

mod constants;
pub use constants::EMPTY_STRING_SHA256;
pub use constants::EXECUTE_API_SERVICE;

mod config;
pub use config::Config;

mod credential;
pub use credential::Credential;

mod provide_credential;
pub use provide_credential::*;

mod sign_request;

mod signer;
pub use signer::{
    create_signer, create_signer_from_config, create_signer_with, validate_region, Signer,
};
