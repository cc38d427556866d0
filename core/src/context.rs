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

use crate::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::sync::Arc;

/// Context carries the capabilities credential resolution is allowed to use.
///
/// Every file read, HTTP call, child process and environment lookup a
/// provider performs goes through here. Nothing is installed by default: [`Context::new`] starts with
/// no-op implementations that fail (for I/O) or report nothing (for the
/// environment), and callers opt in with the `with_*` methods.
///
/// ```
/// use apisign_core::{Context, OsEnv};
///
/// let ctx = Context::new().with_env(OsEnv);
/// ```
#[derive(Clone)]
pub struct Context {
    file_read: Arc<dyn FileRead>,
    http_send: Arc<dyn HttpSend>,
    command_execute: Arc<dyn CommandExecute>,
    env: Arc<dyn Env>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("file_read", &self.file_read)
            .field("http_send", &self.http_send)
            .field("command_execute", &self.command_execute)
            .field("env", &self.env)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a context where every capability is a no-op.
    ///
    /// ```
    /// use apisign_core::Context;
    ///
    /// let ctx = Context::new();
    /// assert!(ctx.env_var("AWS_ACCESS_KEY_ID").is_none());
    /// ```
    pub fn new() -> Self {
        Self {
            file_read: Arc::new(NoopFileRead),
            http_send: Arc::new(NoopHttpSend),
            command_execute: Arc::new(NoopCommandExecute),
            env: Arc::new(NoopEnv),
        }
    }

    /// Install a file reader.
    pub fn with_file_read(mut self, file_read: impl FileRead) -> Self {
        self.file_read = Arc::new(file_read);
        self
    }

    /// Install an HTTP client.
    pub fn with_http_send(mut self, http_send: impl HttpSend) -> Self {
        self.http_send = Arc::new(http_send);
        self
    }

    /// Install a process runner.
    pub fn with_command_execute(mut self, command_execute: impl CommandExecute) -> Self {
        self.command_execute = Arc::new(command_execute);
        self
    }

    /// Install an environment.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Read a whole file.
    #[inline]
    pub async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        self.file_read.file_read(path).await
    }

    /// Read a whole file that must be valid utf-8.
    pub async fn file_read_as_string(&self, path: &str) -> Result<String> {
        let bytes = self.file_read(path).await?;
        String::from_utf8(bytes).map_err(|e| {
            Error::from(e).with_context(format!("path: {path}"))
        })
    }

    /// Send an HTTP request.
    #[inline]
    pub async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        self.http_send.http_send(req).await
    }

    /// Send an HTTP request and decode the body lossily as utf-8.
    pub async fn http_send_as_string(
        &self,
        req: http::Request<Bytes>,
    ) -> Result<http::Response<String>> {
        let (parts, body) = self.http_send(req).await?.into_parts();
        let body = String::from_utf8_lossy(&body).into_owned();
        Ok(http::Response::from_parts(parts, body))
    }

    /// Run `program` with `args` until it exits.
    #[inline]
    pub async fn command_execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        self.command_execute.command_execute(program, args).await
    }

    /// Home directory reported by the installed environment.
    #[inline]
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.env.home_dir()
    }

    /// Expand a leading `~/` (or `~\`) into the home directory.
    ///
    /// Paths without that prefix are returned unchanged. Returns `None` when
    /// the path needs a home directory and the environment has none.
    pub fn expand_home_dir(&self, path: &str) -> Option<String> {
        let Some(rest) = path
            .strip_prefix("~/")
            .or_else(|| path.strip_prefix("~\\"))
        else {
            return Some(path.to_string());
        };

        let home = self.home_dir()?;
        Some(home.join(rest).to_string_lossy().into_owned())
    }

    /// Look up one environment variable.
    ///
    /// Missing variables and values that are not valid utf-8 both yield `None`.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }

    /// Snapshot of every environment variable.
    #[inline]
    pub fn env_vars(&self) -> HashMap<String, String> {
        self.env.vars()
    }
}

/// FileRead reads a whole file into memory.
///
/// Profile based credential providers read the shared credentials and config files through it.
#[async_trait::async_trait]
pub trait FileRead: Debug + Send + Sync + 'static {
    /// Read the file at `path`.
    async fn file_read(&self, path: &str) -> Result<Vec<u8>>;
}

/// HttpSend sends the HTTP requests credential providers need.
///
/// For example, fetch the IMDS token or the ECS task credentials. It is not
/// meant to carry the requests being signed.
#[async_trait::async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send `req` and buffer the whole response.
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>>;
}

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was killed by a signal.
    pub status: i32,
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// CommandExecute runs external credential helpers such as `credential_process`.
#[async_trait::async_trait]
pub trait CommandExecute: Debug + Send + Sync + 'static {
    /// Run `program` with `args` and capture its output.
    async fn command_execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Env exposes environment variables and the home directory.
pub trait Env: Debug + Send + Sync + 'static {
    /// Look up one variable, `None` if missing or not utf-8.
    fn var(&self, key: &str) -> Option<String>;

    /// Snapshot of all variables.
    fn vars(&self) -> HashMap<String, String>;

    /// Home directory of the current user, if known.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// Env backed by the current process.
#[derive(Debug, Copy, Clone)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key)?.into_string().ok()
    }

    fn vars(&self) -> HashMap<String, String> {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        let keys: &[&str] = if cfg!(windows) {
            &["USERPROFILE", "HOME"]
        } else {
            &["HOME"]
        };

        keys.iter()
            .filter_map(|key| std::env::var_os(key))
            .find(|v| !v.is_empty())
            .map(PathBuf::from)
    }
}

/// Env backed by a fixed map, for tests and sandboxed callers.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    /// Home directory to report.
    pub home_dir: Option<PathBuf>,
    /// Variables to report.
    pub envs: HashMap<String, String>,
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }

    fn vars(&self) -> HashMap<String, String> {
        self.envs.clone()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        self.home_dir.clone()
    }
}

/// FileRead that always fails, installed by [`Context::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFileRead;

#[async_trait::async_trait]
impl FileRead for NoopFileRead {
    async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        Err(Error::unexpected("no file reader configured").with_context(format!("path: {path}")))
    }
}

/// HttpSend that always fails, installed by [`Context::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHttpSend;

#[async_trait::async_trait]
impl HttpSend for NoopHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        Err(Error::unexpected("no http client configured")
            .with_context(format!("uri: {}", req.uri())))
    }
}

/// CommandExecute that always fails, installed by [`Context::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCommandExecute;

#[async_trait::async_trait]
impl CommandExecute for NoopCommandExecute {
    async fn command_execute(&self, program: &str, _: &[&str]) -> Result<CommandOutput> {
        Err(Error::unexpected("no command executor configured")
            .with_context(format!("program: {program}")))
    }
}

/// Env with no variables and no home directory, installed by [`Context::new`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnv;

impl Env for NoopEnv {
    fn var(&self, _: &str) -> Option<String> {
        None
    }

    fn vars(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        None
    }
}
