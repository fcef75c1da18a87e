use anyhow::Result;
use outdoor_tracking_core::network::{resolve_url, Network, Request, Response, ResponseType};
use reqwest::Url;
use std::cell::RefCell;
use std::collections::HashMap;

pub const ORIGIN: &str = "http://localhost:8080";

/// A fake network that answers from a fixed table and records every request.
pub struct MockNetwork {
    origin: Url,
    responses: HashMap<String, (u16, Vec<u8>)>,
    pub requests: RefCell<Vec<String>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            origin: Url::parse(ORIGIN).unwrap(),
            responses: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with(mut self, url: &str, status: u16, body: &[u8]) -> Self {
        let url = resolve_url(&self.origin, url).unwrap().to_string();
        self.responses.insert(url, (status, body.to_vec()));
        self
    }

    pub fn calls_to(&self, url: &str) -> usize {
        let url = resolve_url(&self.origin, url).unwrap().to_string();
        self.requests.borrow().iter().filter(|x| **x == url).count()
    }
}

impl Network for MockNetwork {
    fn fetch(&self, request: &Request) -> Result<Response> {
        self.requests.borrow_mut().push(request.url.clone());
        let (status, body) = match self.responses.get(&request.url) {
            Some(x) => x.clone(),
            None => anyhow::bail!("network unreachable: {}", request.url),
        };
        let url = Url::parse(&request.url)?;
        Ok(Response {
            response_type: ResponseType::classify(&self.origin, &url),
            url: request.url.clone(),
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body,
        })
    }
}

/// All of the app shell assets, answering 200.
pub fn network_with_app_shell() -> MockNetwork {
    outdoor_tracking_core::offline_cache::URLS_TO_CACHE
        .iter()
        .fold(MockNetwork::new(), |network, url| {
            network.with(url, 200, url.as_bytes())
        })
}
