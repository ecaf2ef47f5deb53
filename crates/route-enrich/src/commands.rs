//! Subcommand implementations. Results are printed to stdout as JSON.

use crate::error::{CliError, Result};
use crate::input;
use crate::settings::{
    Command, DecodeTileArgs, EnrichArgs, MatchCommandArgs, ProfileArgs, SpeedColorArgs,
    pipeline_config,
};
use route_enrich_lib::elevation::GRADE_LOOKAHEAD_M;
use route_enrich_lib::{
    AttributeMatcher, AttributeTag, DEFAULT_MATCH_BATCH, DirectoryTileSource, ElevationSample,
    ElevationSummary, Enricher, GradeClass, Palette, RouteSample, SpeedFeature,
    SpeedOverlayConfig, SpeedStats, decode_tiles, downsample_for_display, grade_series,
    highway_label, load_speed_tile, profile_to_gpx, smoothness_label, speed_color,
    surface_label, write_gpx,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::ControlFlow;
use std::path::Path;

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::DecodeTile(args) => decode_tile(&args),
        Command::SpeedColor(args) => color(&args),
        Command::Match(args) => match_route(&args),
        Command::Profile(args) => profile(&args),
        Command::Enrich(args) => enrich(&args),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

// ============================================================================
// Speed tiles
// ============================================================================

#[derive(Debug, Serialize)]
struct DecodedTile {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    features: Option<Vec<SpeedFeature>>,
    feature_count: usize,
}

#[derive(Debug, Serialize)]
struct DecodeOutput {
    tiles: Vec<DecodedTile>,
    stats: SpeedStats,
    mean_speed: Option<f64>,
}

fn decode_tile(args: &DecodeTileArgs) -> Result<()> {
    if args.files.is_empty() && args.tiles.is_empty() {
        return Err(CliError::InvalidInput(
            "give tile files or --tile-dir with --tile".to_string(),
        ));
    }

    let mut decoded: Vec<(String, Vec<SpeedFeature>)> = Vec::new();

    if !args.files.is_empty() {
        let buffers = args
            .files
            .iter()
            .map(|path| {
                std::fs::read(path).map_err(|source| CliError::File {
                    path: path.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let features = decode_tiles(&buffers);
        decoded.extend(
            args.files
                .iter()
                .map(|p| p.display().to_string())
                .zip(features),
        );
    }

    if let Some(root) = &args.tile_dir {
        let source = DirectoryTileSource::new(root);
        let config = SpeedOverlayConfig {
            min_zoom: args.min_zoom,
            ..Default::default()
        };
        for &coord in &args.tiles {
            decoded.push((coord.to_string(), load_speed_tile(&source, coord, &config)));
        }
    }

    let mut stats = SpeedStats::new();
    for (_, features) in &decoded {
        stats.record_features(features);
    }

    let tiles = decoded
        .into_iter()
        .map(|(source, features)| {
            tracing::info!("{}: {} speed features", source, features.len());
            DecodedTile {
                source,
                feature_count: features.len(),
                features: (!args.stats_only).then_some(features),
            }
        })
        .collect();

    print_json(&DecodeOutput {
        tiles,
        mean_speed: stats.mean(),
        stats,
    })
}

#[derive(Debug, Serialize)]
struct ColorOutput {
    speed: f64,
    color: String,
}

fn color(args: &SpeedColorArgs) -> Result<()> {
    let palette = if args.dark {
        Palette::Dark
    } else {
        Palette::Light
    };
    let color = speed_color(args.speed, args.min, args.max, palette);
    print_json(&ColorOutput {
        speed: args.speed,
        color: color.to_string(),
    })
}

// ============================================================================
// Attributes and elevation
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct ProfilePoint {
    distance_m: f64,
    lat: f64,
    lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    elevation_m: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grade: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grade_class: Option<GradeClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'static str>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    attributes: Option<AttributeTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<AttributeLabels>,
}

/// Display names of a sample's road attributes
#[derive(Debug, Clone, Serialize)]
struct AttributeLabels {
    highway: String,
    surface: String,
    smoothness: String,
}

impl AttributeLabels {
    fn of(tag: &AttributeTag) -> Self {
        Self {
            highway: highway_label(&tag.highway).to_string(),
            surface: surface_label(&tag.surface).to_string(),
            smoothness: smoothness_label(&tag.smoothness).to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PassReport {
    pass: usize,
    stride: usize,
    queried: usize,
    measured: usize,
}

#[derive(Debug, Serialize)]
struct RouteOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ElevationSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    passes: Vec<PassReport>,
    sample_count: usize,
    points: Vec<ProfilePoint>,
}

fn tagged_points(samples: &[RouteSample], tags: &[AttributeTag]) -> Vec<ProfilePoint> {
    samples
        .iter()
        .zip(tags)
        .map(|(sample, tag)| ProfilePoint {
            distance_m: sample.distance_m,
            lat: sample.lat,
            lon: sample.lon,
            elevation_m: None,
            grade: None,
            grade_class: None,
            color: None,
            attributes: Some(tag.clone()),
            labels: Some(AttributeLabels::of(tag)),
        })
        .collect()
}

fn profile_points(samples: &[ElevationSample], tags: Option<&[AttributeTag]>) -> Vec<ProfilePoint> {
    let grades = grade_series(samples, GRADE_LOOKAHEAD_M);
    samples
        .iter()
        .zip(grades)
        .enumerate()
        .map(|(i, (sample, grade))| {
            let class = GradeClass::from_grade(grade);
            let tag = tags.and_then(|t| t.get(i));
            ProfilePoint {
                distance_m: sample.distance_m,
                lat: sample.lat,
                lon: sample.lon,
                elevation_m: sample.elevation_m,
                grade: Some(grade),
                grade_class: Some(class),
                color: Some(class.stroke_color()),
                attributes: tag.cloned(),
                labels: tag.map(AttributeLabels::of),
            }
        })
        .collect()
}

fn export_gpx(samples: &[ElevationSample], route_path: &Path, out: &Path) -> Result<()> {
    let name = route_path.file_stem().and_then(|s| s.to_str());
    let gpx = profile_to_gpx(samples, name);
    let file = File::create(out).map_err(|source| CliError::File {
        path: out.to_path_buf(),
        source,
    })?;
    write_gpx(&gpx, BufWriter::new(file))?;
    tracing::info!("Wrote elevation profile to {}", out.display());
    Ok(())
}

fn match_route(args: &MatchCommandArgs) -> Result<()> {
    let config = pipeline_config(&args.route, Some(&args.matching), None);
    let enricher = Enricher::new(config);

    let route = input::load_route(&args.route.route)?;
    let segments = input::load_segments(args.matching.segments.as_deref())?;
    let samples = enricher.sample(&route)?;

    let matcher = AttributeMatcher::new(&segments, enricher.config().matcher.clone());
    let tags = matcher.match_samples_with_progress(&samples, DEFAULT_MATCH_BATCH, |fraction| {
        tracing::debug!("Matched {:.0}% of samples", fraction * 100.0);
        ControlFlow::Continue(())
    })?;
    let matched = tags.iter().filter(|t| !t.is_unknown()).count();
    tracing::info!("Matched {}/{} samples", matched, samples.len());

    print_json(&RouteOutput {
        summary: None,
        passes: Vec::new(),
        sample_count: samples.len(),
        points: tagged_points(&samples, &tags),
    })
}

fn profile(args: &ProfileArgs) -> Result<()> {
    let config = pipeline_config(&args.route, None, Some(&args.elevation));
    let enricher = Enricher::new(config);

    let route = input::load_route(&args.route.route)?;
    let lookup = input::elevation_lookup(&route, &args.elevation)?;
    let samples = enricher.sample(&route)?;

    let mut passes = Vec::new();
    let mut refiner = enricher.refine_progressively(&samples, &lookup);
    for snapshot in refiner.by_ref() {
        tracing::info!(
            "Pass {} (stride {}): queried {}, {}/{} measured",
            snapshot.pass + 1,
            snapshot.stride,
            snapshot.queried,
            snapshot.measured,
            snapshot.samples.len()
        );
        passes.push(PassReport {
            pass: snapshot.pass,
            stride: snapshot.stride,
            queried: snapshot.queried,
            measured: snapshot.measured,
        });
    }
    let refined = refiner.finish();

    let summary =
        ElevationSummary::from_samples(&refined, enricher.config().gain_loss.threshold_m);
    tracing::info!(
        "Profile: +{} m / -{} m over {:.2} km",
        summary.gain_loss.gain_m,
        summary.gain_loss.loss_m,
        summary.distance_m / 1000.0
    );

    if let Some(out) = &args.elevation.gpx_out {
        export_gpx(&refined, &args.route.route, out)?;
    }

    let points = profile_points(&refined, None);
    print_json(&RouteOutput {
        summary: Some(summary),
        passes,
        sample_count: refined.len(),
        points: downsample_for_display(&points, args.elevation.display_points),
    })
}

fn enrich(args: &EnrichArgs) -> Result<()> {
    let config = pipeline_config(&args.route, Some(&args.matching), Some(&args.elevation));
    let enricher = Enricher::new(config);

    let route = input::load_route(&args.route.route)?;
    let segments = input::load_segments(args.matching.segments.as_deref())?;
    let lookup = input::elevation_lookup(&route, &args.elevation)?;

    let enriched = enricher.enrich(&route, &segments, &lookup)?;
    tracing::info!(
        "Enriched {} samples: +{} m / -{} m",
        enriched.samples.len(),
        enriched.gain_loss.gain_m,
        enriched.gain_loss.loss_m
    );

    if let Some(out) = &args.elevation.gpx_out {
        export_gpx(&enriched.elevations, &args.route.route, out)?;
    }

    let points = profile_points(&enriched.elevations, Some(enriched.tags.as_slice()));
    print_json(&RouteOutput {
        summary: Some(enriched.summary),
        passes: Vec::new(),
        sample_count: enriched.samples.len(),
        points: downsample_for_display(&points, args.elevation.display_points),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn climb(n: usize, grade_percent: f64) -> Vec<ElevationSample> {
        (0..n)
            .map(|i| ElevationSample {
                lat: 48.0,
                lon: 11.0,
                distance_m: i as f64 * 10.0,
                elevation_m: Some(i as f64 * 10.0 * grade_percent / 100.0),
            })
            .collect()
    }

    #[test]
    fn test_profile_points_classify_grade() {
        let points = profile_points(&climb(40, 8.0), None);
        assert_eq!(points.len(), 40);
        assert!((points[0].grade.unwrap() - 8.0).abs() < 1e-9);
        assert_eq!(points[0].grade_class, Some(GradeClass::Steep));
        assert_eq!(points[0].color, Some(GradeClass::Steep.stroke_color()));
        assert!(points.iter().all(|p| p.attributes.is_none() && p.labels.is_none()));
    }

    #[test]
    fn test_profile_points_carry_tags() {
        let samples = climb(3, 0.0);
        let mut tags = vec![AttributeTag::unknown(); 3];
        tags[1].highway = "cycleway".to_string();

        let points = profile_points(&samples, Some(tags.as_slice()));
        assert_eq!(points[1].attributes.as_ref().map(|t| t.highway.as_str()), Some("cycleway"));
        assert_eq!(points[1].labels.as_ref().map(|l| l.highway.as_str()), Some("Cycleway"));
        assert_eq!(points[0].grade_class, Some(GradeClass::Flat));
    }

    #[test]
    fn test_point_json_flattens_attributes() {
        let samples = [RouteSample {
            lat: 48.0,
            lon: 11.0,
            distance_m: 0.0,
        }];
        let mut tag = AttributeTag::unknown();
        tag.surface = "fine_gravel".to_string();
        let points = tagged_points(&samples, &[tag]);
        let json = serde_json::to_value(&points[0]).unwrap();
        assert_eq!(json["highway"], "unknown");
        assert_eq!(json["surface"], "fine_gravel");
        assert_eq!(json["labels"]["surface"], "Fine Gravel");
        assert_eq!(json["labels"]["highway"], "unknown");
        assert!(json.get("elevation_m").is_none());
        assert!(json.get("attributes").is_none());
    }
}
