use outdoor_tracking_core::config::Settings;
use outdoor_tracking_core::TileServer;
use std::sync::mpsc;

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger with info level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_module_path(false)
        .init();

    let settings = Settings::load()?;
    let mut server = TileServer::new(&settings);
    server.start()?;

    println!("================================================");
    println!(
        "[Tile Proxy]:  {}/api/tile?s=a&x=0&y=0&z=0",
        server.url()
    );
    println!("Press Ctrl+C to exit");
    println!("================================================");

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;
    rx.recv()?;

    println!("Stopping server...");
    server.stop();
    Ok(())
}
