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

//! Tokio-based command execution for apisign.
//!
//! This crate provides `TokioCommandExecute`, which implements the
//! `CommandExecute` trait from `apisign_core` with `tokio::process`. Profiles
//! carrying `credential_process` need it to run their credential helper.
//!
//! ## Example
//!
//! ```no_run
//! use apisign_command_execute_tokio::TokioCommandExecute;
//! use apisign_core::{Context, OsEnv};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = Context::new()
//!         .with_command_execute(TokioCommandExecute)
//!         .with_env(OsEnv);
//!
//!     match ctx.command_execute("aws-vault", &["export", "--format=json", "dev"]).await {
//!         Ok(output) if output.success() => println!("{} bytes", output.stdout.len()),
//!         Ok(output) => eprintln!("exited with {}", output.status),
//!         Err(e) => eprintln!("failed to run helper: {e}"),
//!     }
//! }
//! ```

use apisign_core::{CommandExecute, CommandOutput, Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Tokio-based implementation of the `CommandExecute` trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandExecute;

#[async_trait]
impl CommandExecute for TokioCommandExecute {
    async fn command_execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                Error::unexpected("failed to execute command")
                    .with_source(e)
                    .with_context(format!("program: {program}"))
            })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
