use std::time::Duration;

use better_default::Default;
use serde_json::{Map, Value};
use ureq::AgentBuilder;

use super::HttpResponse;
use crate::errors::RvError;

pub const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Default)]
pub struct Client {
    #[default("https://127.0.0.1:8200".into())]
    pub address: String,
    pub token: String,
    #[default(ureq::Agent::new())]
    pub http_client: ureq::Agent,
}

impl Client {
    pub fn new() -> Self {
        Client::default()
    }

    pub fn with_addr(mut self, addr: &str) -> Self {
        self.address = addr.trim_end_matches('/').into();
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = token.into();
        self
    }

    pub fn build(mut self) -> Self {
        let agent = AgentBuilder::new().timeout_connect(Duration::from_secs(10)).timeout(Duration::from_secs(30));

        self.http_client = agent.build();
        self
    }

    pub fn request(&self, method: &str, path: &str, data: Option<Map<String, Value>>) -> Result<HttpResponse, RvError> {
        let url = if path.starts_with('/') {
            format!("{}{}", self.address, path)
        } else {
            format!("{}/{}", self.address, path)
        };
        log::debug!("request url: {}, method: {}", url, method);

        let mut req = self.http_client.request(&method.to_uppercase(), &url);

        req = req.set("Accept", "application/json");
        if !self.token.is_empty() {
            req = req.set(TOKEN_HEADER, &self.token);
        }

        let mut ret = HttpResponse { method: method.to_string(), url, ..Default::default() };

        let response_result = if let Some(send_data) = data { req.send_json(send_data) } else { req.call() };

        match response_result {
            Ok(response) => {
                ret.response_status = response.status();
                if ret.response_status == 204 {
                    return Ok(ret);
                }
                // some endpoints answer 200 with an empty body
                if let Ok(json) = response.into_json::<Value>() {
                    ret.response_data = Some(json);
                }
                Ok(ret)
            }
            Err(ureq::Error::Status(status, response)) => {
                ret.response_status = status;
                if let Ok(response_data) = response.into_json() {
                    ret.response_data = Some(response_data);
                }
                Ok(ret)
            }
            Err(e) => {
                log::error!("Request failed: {}", e);
                Err(RvError::from(e))
            }
        }
    }

    pub fn request_write(&self, path: &str, data: Option<Map<String, Value>>) -> Result<HttpResponse, RvError> {
        self.request("POST", path, data)
    }
}
