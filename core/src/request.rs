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
use http::uri::{Authority, PathAndQuery, Scheme};
use http::{HeaderMap, HeaderValue, Method, Uri};
use std::mem;

/// Mutable view of a request while it is being signed.
///
/// [`SigningRequest::build`] moves the URI and headers out of
/// `http::request::Parts`; [`SigningRequest::apply`] moves them back. The path
/// stays exactly as it appears on the wire (percent encoded) while query pairs
/// are decoded until the signer encodes them again.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// URI scheme, `http` when the request has none.
    pub scheme: Scheme,
    /// Host and optional port.
    pub authority: Authority,
    /// Percent-encoded path.
    pub path: String,
    /// Query pairs in request order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Take the signable pieces out of `parts`.
    ///
    /// Requests without an authority (relative URIs) can't be signed.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = mem::take(&mut parts.uri).into_parts();
        let Some(authority) = uri.authority else {
            return Err(Error::request_invalid(
                "request without authority is invalid for signing",
            ));
        };

        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        let query = match paq.query() {
            Some(q) => form_urlencoded::parse(q.as_bytes()).into_owned().collect(),
            None => Vec::new(),
        };

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme.unwrap_or(Scheme::HTTP),
            authority,
            path: paq.path().to_string(),
            query,
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Put the (signed) pieces back into `parts`.
    ///
    /// Query pairs are written verbatim, so they must already be encoded.
    /// Pairs with an empty value are written as a bare key.
    pub fn apply(self, parts: &mut http::request::Parts) -> Result<()> {
        let query_size = self.query_size() + self.query.len() * 2;
        let mut paq = self.path;
        if !self.query.is_empty() {
            paq.reserve(query_size);
            for (i, (k, v)) in self.query.iter().enumerate() {
                paq.push(if i == 0 { '?' } else { '&' });
                paq.push_str(k);
                if !v.is_empty() {
                    paq.push('=');
                    paq.push_str(v);
                }
            }
        }

        let mut uri = mem::take(&mut parts.uri).into_parts();
        uri.scheme = Some(self.scheme);
        uri.authority = Some(self.authority);
        uri.path_and_query = Some(PathAndQuery::try_from(paq)?);

        parts.uri = Uri::from_parts(uri)?;
        parts.method = self.method;
        parts.headers = self.headers;
        Ok(())
    }

    /// Total length of all query keys and values.
    #[inline]
    pub fn query_size(&self) -> usize {
        self.query.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    /// Append a query pair.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Trim leading and trailing spaces and tabs from a header value.
    pub fn header_value_normalize(v: &mut HeaderValue) {
        let bs = v.as_bytes();
        let start = bs.iter().position(|b| !matches!(b, b' ' | b'\t'));
        let end = bs.iter().rposition(|b| !matches!(b, b' ' | b'\t'));

        let trimmed = match (start, end) {
            (Some(start), Some(end)) => &bs[start..=end],
            _ => &[][..],
        };
        if trimmed.len() == bs.len() {
            return;
        }
        // A sub slice of a valid value is always valid.
        if let Ok(value) = HeaderValue::from_bytes(trimmed) {
            let sensitive = v.is_sensitive();
            *v = value;
            v.set_sensitive(sensitive);
        }
    }

    /// Header names in ascending order.
    pub fn header_name_to_vec_sorted(&self) -> Vec<&str> {
        let mut names = self.headers.keys().map(|k| k.as_str()).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}
