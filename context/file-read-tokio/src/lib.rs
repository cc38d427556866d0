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

//! Tokio-based file reading implementation for apisign.
//!
//! This crate provides `TokioFileRead`, an async file reader that implements
//! the `FileRead` trait from `apisign_core` using Tokio's file system operations.
//! Profile based credential providers use it to read `~/.aws/credentials`
//! and `~/.aws/config`.
//!
//! ## Example
//!
//! ```no_run
//! use apisign_core::{Context, OsEnv};
//! use apisign_file_read_tokio::TokioFileRead;
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = Context::new()
//!         .with_file_read(TokioFileRead)
//!         .with_env(OsEnv);
//!
//!     match ctx.file_read("/path/to/credentials").await {
//!         Ok(content) => println!("Read {} bytes", content.len()),
//!         Err(e) => eprintln!("Failed to read file: {}", e),
//!     }
//! }
//! ```

use apisign_core::{Error, FileRead, Result};
use async_trait::async_trait;

/// Tokio-based implementation of the `FileRead` trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileRead;

#[async_trait]
impl FileRead for TokioFileRead {
    async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| {
            Error::unexpected("failed to read file")
                .with_source(e)
                .with_context(format!("path: {path}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apisign_core::Context;
    use std::io::Write;

    #[tokio::test]
    async fn test_file_read() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(file, "[default]\naws_access_key_id = AKIDEXAMPLE\n")?;

        let ctx = Context::new().with_file_read(TokioFileRead);
        let content = ctx
            .file_read_as_string(file.path().to_str().expect("path must be utf-8"))
            .await?;
        assert_eq!(content, "[default]\naws_access_key_id = AKIDEXAMPLE\n");
        Ok(())
    }

    #[tokio::test]
    async fn test_file_read_missing() {
        let ctx = Context::new().with_file_read(TokioFileRead);
        let err = ctx
            .file_read("/definitely/not/here/credentials")
            .await
            .unwrap_err();
        assert!(err
            .context()
            .contains(&"path: /definitely/not/here/credentials".to_string()));
    }
}
