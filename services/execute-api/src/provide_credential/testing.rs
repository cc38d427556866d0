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

//! Fakes shared by the provider tests.

use apisign_core::{Error, HttpSend, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::sync::{Arc, Mutex};

/// A request observed by [`MockHttpSend`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
}

/// HttpSend that answers from a fixed routing table and records every request.
#[derive(Debug, Clone, Default)]
pub struct MockHttpSend {
    routes: Vec<(Method, String, StatusCode, String)>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

impl MockHttpSend {
    pub fn route(mut self, method: Method, uri: &str, status: StatusCode, body: &str) -> Self {
        self.routes
            .push((method, uri.to_string(), status, body.to_string()));
        self
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.recorded.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl HttpSend for MockHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let uri = req.uri().to_string();
        self.recorded.lock().expect("lock poisoned").push(Recorded {
            method: req.method().clone(),
            uri: uri.clone(),
            headers: req.headers().clone(),
        });

        let Some((_, _, status, body)) = self
            .routes
            .iter()
            .find(|(method, route, _, _)| method == req.method() && *route == uri)
        else {
            return Err(Error::unexpected("connection refused").with_context(format!("uri: {uri}")));
        };

        Ok(http::Response::builder()
            .status(*status)
            .body(Bytes::from(body.clone()))?)
    }
}
