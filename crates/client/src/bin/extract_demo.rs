use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use client::{HttpImageLookup, HttpTransport, ImageCompanion, Phase, SessionController};
use extract::{Category, Extracted, examples};

/// Stream a structured extraction from the service and print it as it fills in
#[derive(Parser)]
#[command(name = "extract-demo")]
struct Args {
    /// Base URL of the extraction service
    #[arg(long, default_value = "http://localhost:3000")]
    api_url: String,

    /// roadBike, album or recipe
    #[arg(long, default_value = "recipe")]
    category: Category,

    /// Free text to extract from
    #[arg(long, conflicts_with = "example")]
    text: Option<String>,

    /// Use a random built-in example for the category
    #[arg(long)]
    example: bool,

    /// Skip the image lookup after a successful extraction
    #[arg(long)]
    no_image: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let (label, icon) = examples::metadata(args.category);

    let transport = Arc::new(HttpTransport::new(args.api_url.clone()));
    let mut controller = SessionController::new(args.category, transport);

    let text = match args.text {
        Some(text) if !args.example => text,
        _ => controller.session_mut().load_example().to_string(),
    };

    println!("{} {}", icon, label);
    println!("> {}\n", text);

    controller
        .submit(&text)
        .context("Nothing to extract: the input text is empty")?;

    let mut fields_seen = 0;
    while controller.session().is_loading() {
        if controller.next_event().await.is_none() {
            break;
        }
        let fields = controller
            .session()
            .object()
            .and_then(|o| o.as_object())
            .map(|o| o.len())
            .unwrap_or(0);
        if fields != fields_seen {
            fields_seen = fields;
            eprintln!("... {} fields", fields);
        }
    }

    let session = controller.session();
    match session.phase() {
        Phase::Success => {
            if let Some(object) = session.usable_object() {
                println!("{}", serde_json::to_string_pretty(object)?);
                let extracted = Extracted::from_value(session.category(), object)?;
                println!("\n{}", extracted.headline());
            }
        }
        Phase::Empty | Phase::Error => {
            if let Some(object) = session.object() {
                println!("Partial result:\n{}\n", serde_json::to_string_pretty(object)?);
            }
            if let Some(notice) = session.error_notice() {
                print!("{}", notice);
            }
            std::process::exit(1);
        }
        Phase::Idle | Phase::Generating => {}
    }

    if !args.no_image {
        let lookup = HttpImageLookup::new(args.api_url);
        let mut companion = ImageCompanion::new();
        companion.refresh(session, &lookup).await;
        match &companion.state().url {
            Some(url) => println!("Image: {}", url),
            None => println!("Image unavailable"),
        }
    }

    Ok(())
}
