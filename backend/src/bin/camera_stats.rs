use std::{collections::BTreeMap, path::PathBuf};

use clap::Parser;
use flockhopper_backend::{
    cameras::{CameraStore, Facing},
    exposure::{analyze, attribute_label, ExposureConfig},
    geometry::polyline_length_m,
    polyline,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Summarize an ALPR camera dataset and optionally score a route against it"
)]
struct Args {
    /// Camera dataset (JSON array of camera records)
    #[arg(long, default_value = "data/cameras.json")]
    data: PathBuf,

    /// Encoded polyline of a route to analyze against the dataset
    #[arg(long)]
    polyline: Option<String>,

    /// Polyline precision multiplier
    #[arg(long, default_value_t = polyline::DEFAULT_MULTIPLIER)]
    multiplier: f64,

    /// Maximum camera distance from the route, in meters
    #[arg(long)]
    max_distance: Option<f64>,

    /// Facing tolerance, in degrees
    #[arg(long)]
    tolerance: Option<f64>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let store = CameraStore::from_path(&args.data)?;
    tracing::info!("loaded {} cameras from {:?}", store.len(), args.data);

    let mut by_operator: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_brand: BTreeMap<String, usize> = BTreeMap::new();
    let mut facing_known = 0;
    for camera in store.cameras() {
        *by_operator.entry(attribute_label(camera.operator.as_deref())).or_default() += 1;
        *by_brand.entry(attribute_label(camera.brand.as_deref())).or_default() += 1;
        if Facing::of(camera).is_known() {
            facing_known += 1;
        }
    }

    let route = match &args.polyline {
        Some(encoded) => {
            let path = polyline::decode(encoded, args.multiplier, false)?;
            let defaults = ExposureConfig::default();
            let config = ExposureConfig {
                max_distance_m: args.max_distance.unwrap_or(defaults.max_distance_m),
                facing_tolerance_deg: args.tolerance.unwrap_or(defaults.facing_tolerance_deg),
                ..defaults
            };
            let exposure = analyze(&path, &store, &config);
            Some((polyline_length_m(&path), exposure))
        }
        None => None,
    };

    if args.json {
        let mut report = serde_json::json!({
            "cameras": store.len(),
            "facing_known": facing_known,
            "by_operator": by_operator,
            "by_brand": by_brand,
        });
        if let Some((length_m, exposure)) = &route {
            report["route"] = serde_json::json!({
                "length_m": length_m,
                "exposure": exposure.summary,
                "cameras": exposure.cameras,
            });
        }
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("cameras: {}", store.len());
    println!(
        "facing known: {facing_known} ({} unknown)",
        store.len() - facing_known
    );
    print_counts("by operator", &by_operator);
    print_counts("by brand", &by_brand);

    if let Some((length_m, exposure)) = route {
        let summary = &exposure.summary;
        println!();
        println!("route: {:.0} m", length_m);
        println!(
            "cameras on route: {} ({} facing, {} unknown facing)",
            summary.total, summary.facing, summary.facing_unknown
        );
        for entry in &exposure.cameras {
            println!(
                "  {:>8.0} m  osm {:<12} {:>5.1} m off route{}",
                entry.distance_along_m,
                entry.camera.osm_id,
                entry.distance_m,
                if entry.facing { "  facing" } else { "" }
            );
        }
    }

    Ok(())
}

fn print_counts(title: &str, counts: &BTreeMap<String, usize>) {
    println!("{title}:");
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
    for (name, count) in sorted {
        println!("  {count:>6}  {name}");
    }
}
