//! HTTP client for host agents.
//!
//! Endpoints, relative to the host's `endpoint` base URL:
//! - `POST /v1/servers` with `{group, server}` to launch
//! - `POST /v1/servers/{id}/terminate` with the server record
//! - `POST /v1/servers/{id}/reattach` with the server record
//!
//! Every endpoint answers with the host's view of the server.

use std::time::Duration;

use async_trait::async_trait;
use fleet_model::{Group, HostDescriptor, Server};
use serde::Serialize;
use tracing::{debug, error};

use super::{AgentError, HostAgentClient};

#[derive(Debug, Serialize)]
struct LaunchRequest<'a> {
    group: &'a Group,
    server: &'a Server,
}

/// Talks to host agents over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpHostAgentClient {
    client: reqwest::Client,
}

impl HttpHostAgentClient {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn url(host: &HostDescriptor, path: &str) -> String {
        format!("{}{}", host.endpoint.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        host: &HostDescriptor,
        path: &str,
        body: &B,
    ) -> Result<Server, AgentError> {
        let url = Self::url(host, path);
        debug!(host_id = %host.id, url = %url, "Calling host agent");

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!(host_id = %host.id, status = %status, body = %text, "Host agent rejected request");
            return Err(AgentError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| AgentError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl HostAgentClient for HttpHostAgentClient {
    async fn launch(
        &self,
        host: &HostDescriptor,
        group: &Group,
        server: &Server,
    ) -> Result<Server, AgentError> {
        self.post(host, "/v1/servers", &LaunchRequest { group, server })
            .await
    }

    async fn terminate(&self, host: &HostDescriptor, server: &Server) -> Result<Server, AgentError> {
        self.post(host, &format!("/v1/servers/{}/terminate", server.id), server)
            .await
    }

    async fn reattach(&self, host: &HostDescriptor, server: &Server) -> Result<Server, AgentError> {
        self.post(host, &format!("/v1/servers/{}/reattach", server.id), server)
            .await
    }
}
