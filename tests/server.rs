use outdoor_tracking_core::config::Settings;
use outdoor_tracking_core::TileServer;
use std::net::TcpStream;

fn settings(upstream_url_template: &str) -> Settings {
    Settings {
        host: "127.0.0.1".to_string(),
        port: 0,
        upstream_url_template: upstream_url_template.to_string(),
        user_agent: "outdoor-tracking-tests".to_string(),
        cache_dir: ".".to_string(),
        origin: "http://localhost:8080".to_string(),
    }
}

#[test]
pub fn tile_server_binds_a_random_port() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = TileServer::new(&settings("http://127.0.0.1:9/{z}/{x}/{y}.png"));
    server.start()?;
    assert_ne!(server.port(), 0);

    // the upstream is unreachable
    let response = reqwest::blocking::get(format!("{}/api/tile?s=a&x=1&y=1&z=1", server.url()))?;
    assert_eq!(response.status().as_u16(), 500);

    // only one route
    let response = reqwest::blocking::get(format!("{}/api/other", server.url()))?;
    assert_eq!(response.status().as_u16(), 404);

    server.stop();
    Ok(())
}

#[test]
pub fn proxies_through_another_tile_server() -> Result<(), Box<dyn std::error::Error>> {
    // the second server uses the first one as its upstream and gets the
    // first one's 500 passed through
    let mut upstream = TileServer::new(&settings("http://127.0.0.1:9/{z}/{x}/{y}.png"));
    upstream.start()?;
    let template = format!("{}/api/tile?s={{s}}&x={{x}}&y={{y}}&z={{z}}", upstream.url());
    let mut server = TileServer::new(&settings(&template));
    server.start()?;

    let response = reqwest::blocking::get(format!("{}/api/tile?s=a&x=1&y=2&z=3", server.url()))?;
    assert_eq!(response.status().as_u16(), 500);
    assert!(response.headers().get("cache-control").is_none());
    Ok(())
}

#[test]
pub fn starting_twice_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = TileServer::new(&settings("http://127.0.0.1:9/{z}/{x}/{y}.png"));
    server.start()?;
    let port = server.port();
    assert!(server.start().is_err());
    // still the same, still serving
    assert_eq!(server.port(), port);
    let response = reqwest::blocking::get(format!("{}/api/other", server.url()))?;
    assert_eq!(response.status().as_u16(), 404);

    server.stop();
    assert!(TcpStream::connect(("127.0.0.1", port)).is_err());
    Ok(())
}

#[actix_web::test]
async fn dropping_a_running_server_inside_an_async_runtime() {
    let mut server = TileServer::new(&settings("http://127.0.0.1:9/{z}/{x}/{y}.png"));
    server.start().unwrap();
    let port = server.port();
    assert!(TcpStream::connect(("127.0.0.1", port)).is_ok());

    drop(server);
    assert!(TcpStream::connect(("127.0.0.1", port)).is_err());
}
