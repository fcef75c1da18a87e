use actix_web::dev::{Service, ServerHandle};
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::sync::mpsc;
use std::thread;
use tokio::runtime::Runtime;

use crate::config::Settings;
use crate::tile_proxy::{serve_tile, TileProxy};

pub const TILE_ROUTE: &str = "/api/tile";

// bounds how long `stop` (and so `drop`) waits for in-flight requests
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route(TILE_ROUTE, web::get().to(serve_tile));
}

/// Serves the tile proxy from its own thread (and tokio runtime), so it can be
/// started from plain sync code.
pub struct TileServer {
    host: String,
    port: u16,
    url_template: String,
    user_agent: String,
    handle: Option<thread::JoinHandle<()>>,
    running: Option<RunningServer>,
}

// what it takes to stop the server from outside its thread
struct RunningServer {
    server_handle: ServerHandle,
    runtime_handle: tokio::runtime::Handle,
}

impl TileServer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            url_template: settings.upstream_url_template.clone(),
            user_agent: settings.user_agent.clone(),
            handle: None,
            running: None,
        }
    }

    /// The actual port, which differs from the configured one when that was 0.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    // Start the server in a separate thread
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            bail!("server already running on {}", self.url());
        }
        let host = self.host.clone();
        let port = self.port;
        let proxy = web::Data::new(TileProxy::new(&self.url_template, &self.user_agent)?);

        // reports the bound port back (or why binding failed)
        let (tx, rx) = mpsc::channel::<Result<(u16, RunningServer)>>();

        let handle = thread::spawn(move || {
            let runtime = match Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = tx.send(Err(e.into()));
                    return;
                }
            };
            let runtime_handle = runtime.handle().clone();
            runtime.block_on(async move {
                info!("Setting up server routes...");
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(proxy.clone())
                        .wrap_fn(|req, srv| {
                            info!("Incoming request: {} {}", req.method(), req.uri());
                            srv.call(req)
                        })
                        .configure(routes)
                })
                .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
                .bind((host.as_str(), port));
                let server = match server {
                    Ok(server) => server,
                    Err(e) => {
                        let _ = tx.send(Err(e.into()));
                        return;
                    }
                };

                // If port was 0, report the one we actually got
                let port = server
                    .addrs()
                    .first()
                    .map(|addr| addr.port())
                    .unwrap_or(port);
                let server = server.run();
                let running = RunningServer {
                    server_handle: server.handle(),
                    runtime_handle,
                };
                let _ = tx.send(Ok((port, running)));

                info!("Server bound successfully to {}:{}", host, port);
                if let Err(e) = server.await {
                    error!("server stopped with error: {:?}", e);
                }
            });
        });

        let (port, running) = rx.recv()??;
        self.port = port;
        self.handle = Some(handle);
        self.running = Some(running);
        Ok(())
    }

    /// Safe to call from any thread, including one that is driving another
    /// async runtime: the stop itself runs on the server's own runtime.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let server_handle = running.server_handle;
            running.runtime_handle.spawn(async move {
                server_handle.stop(true).await;
            });
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("server thread panicked");
            }
            info!("Server on port {} stopped", self.port);
        }
    }
}

impl Drop for TileServer {
    fn drop(&mut self) {
        self.stop();
    }
}
