use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::load_config,
    transport::{GraphqlApi, HttpIdentityProvider},
    AlbumClient, ClientEvent,
};
use shared::protocol::{CreateAlbumInput, ListAlbumsFilter, Scalar};

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    /// Create an album with this name before watching the feed.
    #[arg(long)]
    create: Option<String>,
    #[arg(long)]
    year: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let mut config = load_config();
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    if let Some(api_key) = args.api_key {
        config.api_key = Some(api_key);
    }

    let api = Arc::new(GraphqlApi::new(config.clone()));
    let identity = Arc::new(HttpIdentityProvider::new(&config));
    let client = AlbumClient::new(api, identity);

    if let Some(name) = args.create {
        let album = client
            .create_album(CreateAlbumInput {
                name,
                year: args.year.map(Scalar::Str),
            })
            .await?;
        println!("created album id={} name={}", album.id, album.name);
    }

    let mut events = client.subscribe_events();
    client.start_feed(ListAlbumsFilter::default()).await;

    while let Ok(event) = events.recv().await {
        match event {
            ClientEvent::AlbumsUpdated { albums } => {
                println!("albums ({}):", albums.len());
                for album in &albums {
                    match &album.year {
                        Some(Scalar::Str(year)) => println!("  {} {} ({year})", album.id, album.name),
                        Some(Scalar::Num(year)) => println!("  {} {} ({year})", album.id, album.name),
                        None => println!("  {} {}", album.id, album.name),
                    }
                }
            }
            ClientEvent::AlbumCreated { album } => {
                println!("new album: {}", album.name);
            }
            ClientEvent::Error(err) => {
                eprintln!("feed error: {err}");
            }
        }
    }

    client.stop_feed().await;
    Ok(())
}
