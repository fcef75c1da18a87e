use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use anyhow::Result;
use serde::{Deserialize, Serialize};

// https://wiki.openstreetmap.org/wiki/Raster_tile_providers
pub const OSM_TILE_URL_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

pub const TILE_CONTENT_TYPE: &str = "image/png";
pub const TILE_CACHE_CONTROL: &str = "public, max-age=86400";

// these are connection-level and get recomputed by our own server.
const HOP_BY_HOP_HEADERS: [&str; 4] = [
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
];

/// Query of `GET /api/tile`. Missing parameters end up as empty strings, which
/// simply produces a broken upstream url (the upstream will answer with an
/// error that we pass through).
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TileQuery {
    pub s: String,
    pub x: String,
    pub y: String,
    pub z: String,
}

impl TileQuery {
    /// Builds the query from raw `(name, value)` pairs. The first occurrence of
    /// a parameter wins and repeats are ignored, so no query is ever rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut s = None;
        let mut x = None;
        let mut y = None;
        let mut z = None;
        for (name, value) in pairs {
            let slot = match name.as_ref() {
                "s" => &mut s,
                "x" => &mut x,
                "y" => &mut y,
                "z" => &mut z,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        TileQuery {
            s: s.unwrap_or_default(),
            x: x.unwrap_or_default(),
            y: y.unwrap_or_default(),
            z: z.unwrap_or_default(),
        }
    }

    pub fn upstream_url(&self, template: &str) -> String {
        let mut url = String::with_capacity(template.len() + 16);
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            url.push_str(&rest[..start]);
            let after = &rest[start..];
            let value = match after.get(..3) {
                Some("{s}") => Some(&self.s),
                Some("{x}") => Some(&self.x),
                Some("{y}") => Some(&self.y),
                Some("{z}") => Some(&self.z),
                _ => None,
            };
            match value {
                Some(value) => {
                    url.push_str(value);
                    rest = &after[3..];
                }
                None => {
                    url.push('{');
                    rest = &after[1..];
                }
            }
        }
        url.push_str(rest);
        url
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TileResponse {
    Tile(Vec<u8>),
    /// non-success upstream response, forwarded as is. Header values are
    /// kept as raw bytes since they need not be valid utf-8.
    Passthrough {
        status: u16,
        headers: Vec<(String, Vec<u8>)>,
        body: Vec<u8>,
    },
}

impl TileResponse {
    pub fn into_http_response(self) -> HttpResponse {
        match self {
            TileResponse::Tile(bytes) => HttpResponse::Ok()
                .content_type(TILE_CONTENT_TYPE)
                .insert_header(("Cache-Control", TILE_CACHE_CONTROL))
                .body(bytes),
            TileResponse::Passthrough {
                status,
                headers,
                body,
            } => {
                let status =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let mut builder = HttpResponse::build(status);
                for (name, value) in headers {
                    builder.append_header((name, value));
                }
                builder.body(body)
            }
        }
    }
}

pub struct TileProxy {
    url_template: String,
    client: reqwest::Client,
}

impl TileProxy {
    pub fn new(url_template: &str, user_agent: &str) -> Result<Self> {
        // OSM's tile usage policy asks for an identifying user agent.
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            url_template: url_template.to_string(),
            client,
        })
    }

    /// Exactly one upstream request. There is no local tile store: every call
    /// goes to the upstream.
    pub async fn fetch(&self, query: &TileQuery) -> Result<TileResponse> {
        let tile_url = query.upstream_url(&self.url_template);
        info!("fetching tile: {}", tile_url);

        let response = self.client.get(&tile_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("upstream returned {} for {}", status, tile_url);
            let headers = response
                .headers()
                .iter()
                .filter(|(name, _)| !HOP_BY_HOP_HEADERS.contains(&name.as_str()))
                .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
                .collect();
            let body = response.bytes().await?.to_vec();
            return Ok(TileResponse::Passthrough {
                status: status.as_u16(),
                headers,
                body,
            });
        }

        let tile_buffer = response.bytes().await?.to_vec();
        debug!("tile {} has {} bytes", tile_url, tile_buffer.len());
        Ok(TileResponse::Tile(tile_buffer))
    }
}

pub async fn serve_tile(
    pairs: web::Query<Vec<(String, String)>>,
    proxy: web::Data<TileProxy>,
) -> HttpResponse {
    let query = TileQuery::from_pairs(pairs.into_inner());
    match proxy.fetch(&query).await {
        Ok(response) => response.into_http_response(),
        Err(e) => {
            error!("failed to fetch tile {:?}: {:?}", query, e);
            HttpResponse::InternalServerError().finish()
        }
    }
}
