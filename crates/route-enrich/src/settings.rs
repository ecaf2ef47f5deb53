use clap::{Args, Parser, Subcommand};
use route_enrich_lib::elevation::DISPLAY_TARGET_POINTS;
use route_enrich_lib::{
    DEFAULT_TRACK_LOOKUP_DISTANCE_M, GainLossConfig, MatchConfig, PipelineConfig, PoolConfig,
    RefineConfig, SamplerConfig, SpeedOverlayConfig, TileCoord,
};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Route Enrich - speed tiles, road attributes and elevation profiles for planned routes
pub struct Settings {
    /// Log debug output (RUST_LOG takes precedence)
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Record a Chrome trace of the run into this file
    #[cfg(feature = "profiling")]
    #[clap(long, global = true, value_name = "FILE")]
    pub trace_file: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decode speed tiles and print their features and speed statistics as JSON
    DecodeTile(DecodeTileArgs),

    /// Print the adaptive ramp color of a speed
    SpeedColor(SpeedColorArgs),

    /// Tag every route sample with road type, surface and smoothness
    Match(MatchCommandArgs),

    /// Build a refined elevation profile for a route
    Profile(ProfileArgs),

    /// Sample, tag and profile a route in one go
    Enrich(EnrichArgs),
}

#[derive(Args, Debug, Clone)]
pub struct DecodeTileArgs {
    /// Raw tile files
    #[clap(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Directory laid out as {z}/{x}/{y}.mvt
    #[clap(long, value_name = "DIR", requires = "tiles")]
    pub tile_dir: Option<PathBuf>,

    /// Tiles to load from --tile-dir, as z/x/y
    #[clap(long = "tile", value_name = "Z/X/Y", value_parser = parse_tile_coord)]
    pub tiles: Vec<TileCoord>,

    /// Tiles below this zoom are not loaded from --tile-dir
    #[clap(long, default_value = "15")]
    pub min_zoom: u8,

    /// Only print the speed statistics
    #[clap(long, default_value = "false")]
    pub stats_only: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SpeedColorArgs {
    /// Speed to color in km/h
    pub speed: f64,

    /// Slowest observed speed
    #[clap(long)]
    pub min: f64,

    /// Fastest observed speed
    #[clap(long)]
    pub max: f64,

    /// Use the palette meant for dark map styles
    #[clap(long, default_value = "false")]
    pub dark: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RouteArgs {
    /// Route as GPX, or JSON holding [lon, lat] coordinates
    #[clap(short, long, value_name = "FILE")]
    pub route: PathBuf,

    /// Distance between route samples in meters
    #[clap(long, default_value = "10.0")]
    pub interval: f64,
}

#[derive(Args, Debug, Clone)]
pub struct MatchArgs {
    /// Segment records as {"elements": [{"id", "type", "lat1", "lon1", "lat2", "lon2", "tags"}]}
    #[clap(short, long, value_name = "FILE")]
    pub segments: Option<PathBuf>,

    /// Grid cell size of the segment index in degrees
    #[clap(long, default_value = "0.01")]
    pub cell_size: f64,

    /// Segments further than this from a sample are ignored (meters)
    #[clap(long, default_value = "50.0")]
    pub max_distance: f64,

    /// Score lost per meter of distance to a segment
    #[clap(long, default_value = "35.0")]
    pub distance_penalty: f64,

    /// Bonus for staying on the previous sample's way
    #[clap(long, default_value = "50.0")]
    pub same_way_bonus: f64,

    /// Bonus for staying on the previous sample's road type
    #[clap(long, default_value = "30.0")]
    pub same_highway_bonus: f64,

    /// Penalty for tunnel segments
    #[clap(long, default_value = "60.0")]
    pub tunnel_penalty: f64,

    /// Penalty for segments on a negative layer
    #[clap(long, default_value = "50.0")]
    pub underground_penalty: f64,
}

#[derive(Args, Debug, Clone)]
pub struct ElevationArgs {
    /// GPX file with recorded elevations to look up from (defaults to the route's own)
    #[clap(long, value_name = "FILE")]
    pub elevation_gpx: Option<PathBuf>,

    /// Recorded elevations further than this from a sample are not used (meters)
    #[clap(long, default_value_t = DEFAULT_TRACK_LOOKUP_DISTANCE_M)]
    pub lookup_distance: f64,

    /// Query stride of each refinement pass
    #[clap(long, value_delimiter = ',', default_value = "8,4,2,1")]
    pub strides: Vec<usize>,

    /// Minimum elevation change counted as climb or descent (meters)
    #[clap(long, default_value = "3.0")]
    pub gain_threshold: f64,

    /// Points kept in the printed profile (0 keeps all)
    #[clap(long, default_value_t = DISPLAY_TARGET_POINTS)]
    pub display_points: usize,

    /// Also write the refined profile as a GPX track
    #[clap(long, value_name = "FILE")]
    pub gpx_out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct MatchCommandArgs {
    #[clap(flatten)]
    pub route: RouteArgs,

    #[clap(flatten)]
    pub matching: MatchArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    #[clap(flatten)]
    pub route: RouteArgs,

    #[clap(flatten)]
    pub elevation: ElevationArgs,
}

#[derive(Args, Debug, Clone)]
pub struct EnrichArgs {
    #[clap(flatten)]
    pub route: RouteArgs,

    #[clap(flatten)]
    pub matching: MatchArgs,

    #[clap(flatten)]
    pub elevation: ElevationArgs,
}

impl MatchArgs {
    pub fn config(&self) -> MatchConfig {
        MatchConfig {
            cell_size_deg: self.cell_size,
            max_distance_m: self.max_distance,
            distance_penalty_per_m: self.distance_penalty,
            same_way_bonus: self.same_way_bonus,
            same_highway_bonus: self.same_highway_bonus,
            tunnel_penalty: self.tunnel_penalty,
            underground_penalty: self.underground_penalty,
        }
    }
}

impl ElevationArgs {
    pub fn refine_config(&self) -> RefineConfig {
        RefineConfig {
            strides: self.strides.clone(),
            ..Default::default()
        }
    }

    pub fn gain_loss_config(&self) -> GainLossConfig {
        GainLossConfig {
            threshold_m: self.gain_threshold,
        }
    }
}

/// Engine configuration for the given argument groups, defaults for the rest
pub fn pipeline_config(
    route: &RouteArgs,
    matching: Option<&MatchArgs>,
    elevation: Option<&ElevationArgs>,
) -> PipelineConfig {
    PipelineConfig {
        sampler: SamplerConfig {
            interval_m: route.interval,
        },
        matcher: matching.map(MatchArgs::config).unwrap_or_default(),
        refine: elevation
            .map(ElevationArgs::refine_config)
            .unwrap_or_default(),
        gain_loss: elevation
            .map(ElevationArgs::gain_loss_config)
            .unwrap_or_default(),
        pool: PoolConfig::default(),
        speed: SpeedOverlayConfig::default(),
    }
}

/// Parse `z/x/y`
pub fn parse_tile_coord(s: &str) -> Result<TileCoord, String> {
    let parts: Vec<&str> = s.split('/').collect();
    let [z, x, y] = parts.as_slice() else {
        return Err(format!("expected z/x/y, got '{}'", s));
    };
    let z = z.parse().map_err(|e| format!("invalid zoom '{}': {}", z, e))?;
    let x = x.parse().map_err(|e| format!("invalid x '{}': {}", x, e))?;
    let y = y.parse().map_err(|e| format!("invalid y '{}': {}", y, e))?;
    Ok(TileCoord::new(z, x, y))
}
