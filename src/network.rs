use anyhow::{Context, Result};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// absolute url
    pub url: String,
}

impl Request {
    pub fn get(url: &str) -> Self {
        Self {
            method: Method::GET,
            url: url.to_string(),
        }
    }
}

/// Mirrors the browser's `Response.type`. Only `Basic` (same-origin) responses
/// are eligible for opportunistic caching.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseType {
    Basic,
    Cors,
}

impl ResponseType {
    pub fn classify(origin: &Url, url: &Url) -> ResponseType {
        if origin.origin() == url.origin() {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub response_type: ResponseType,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

pub fn resolve_url(origin: &Url, url: &str) -> Result<Url> {
    origin
        .join(url)
        .with_context(|| format!("invalid url: {url}"))
}

pub trait Network {
    fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Blocking http client bound to the origin of the site it serves.
pub struct HttpNetwork {
    origin: Url,
    client: reqwest::blocking::Client,
}

impl HttpNetwork {
    pub fn new(origin: &str, user_agent: &str) -> Result<Self> {
        let origin = Url::parse(origin).with_context(|| format!("invalid origin: {origin}"))?;
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()?;
        Ok(Self { origin, client })
    }
}

impl Network for HttpNetwork {
    fn fetch(&self, request: &Request) -> Result<Response> {
        let url = resolve_url(&self.origin, &request.url)?;
        debug!("[network] {} {}", request.method, url);
        let response = self
            .client
            .request(request.method.clone(), url)
            .send()
            .with_context(|| format!("failed to fetch {}", request.url))?;

        // redirects may land us on a different origin
        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes()?.to_vec();

        Ok(Response {
            response_type: ResponseType::classify(&self.origin, &final_url),
            url: final_url.to_string(),
            status,
            headers,
            body,
        })
    }
}
