use clap::Parser;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use subreg::image::io::load_gray_image;
use subreg::{
    simple_register_point, smart_register_point, Affine2, AffineProjector, ControlPoint,
    CostFunction, GeomConfig, GeometryMode, ImageId, MatcherKind, Measure, MemorySink,
    NoDataRaster, OwnedImage, ParameterSet, PointReport, SimpleConfig, SmartConfig,
};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "subreg CLI: sub-pixel point registration (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum ModeConfig {
    Smart,
    Simple,
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum CostConfig {
    Metric,
    MetricOverShiftSquared,
}

impl From<CostConfig> for CostFunction {
    fn from(value: CostConfig) -> Self {
        match value {
            CostConfig::Metric => CostFunction::Metric,
            CostConfig::MetricOverShiftSquared => CostFunction::MetricOverShiftSquared,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImageConfig {
    id: u64,
    path: String,
    /// Row-major `[a, b, c, d, e, f]` with `lon = a x + b y + c`, `lat = d x + e y + f`.
    pixel_to_ground: [f64; 6],
    #[serde(default)]
    no_data: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct MeasureConfig {
    id: u64,
    image: u64,
    sample: f64,
    line: f64,
    #[serde(default)]
    weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PointConfig {
    id: u64,
    #[serde(default)]
    reference_index: usize,
    measures: Vec<MeasureConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SimpleConfigJson {
    image_size: [usize; 2],
    template_size: [usize; 2],
    cost: CostConfig,
    threshold: f64,
}

impl Default for SimpleConfigJson {
    fn default() -> Self {
        let cfg = SimpleConfig::default();
        let (ix, iy) = cfg.parameters.image_size();
        let (tx, ty) = cfg.parameters.template_size();
        Self {
            image_size: [ix, iy],
            template_size: [tx, ty],
            cost: CostConfig::MetricOverShiftSquared,
            threshold: cfg.threshold,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    images: Vec<ImageConfig>,
    points: Vec<PointConfig>,
    mode: ModeConfig,
    matcher: String,
    geometry: String,
    affine_half: [usize; 2],
    /// `[image_size, template_size]` pairs of square windows.
    parameters: Vec<[usize; 2]>,
    consensus_tolerance: f64,
    validation_tolerance: f64,
    min_validated: usize,
    mi_bins: usize,
    strict: bool,
    chooser: Option<String>,
    simple: SimpleConfigJson,
    output_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let smart = SmartConfig::default();
        Self {
            images: Vec::new(),
            points: Vec::new(),
            mode: ModeConfig::Smart,
            matcher: "template".to_string(),
            geometry: "affine".to_string(),
            affine_half: [smart.geom.affine_half.0, smart.geom.affine_half.1],
            parameters: smart
                .parameters
                .iter()
                .map(|p| [p.image_size().0, p.template_size().0])
                .collect(),
            consensus_tolerance: smart.consensus_tolerance,
            validation_tolerance: smart.validation_tolerance,
            min_validated: smart.min_validated,
            mi_bins: smart.mi_bins,
            strict: smart.strict,
            chooser: None,
            simple: SimpleConfigJson::default(),
            output_path: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct UpdateRecord {
    measure_id: u64,
    sample: f64,
    line: f64,
    weight: f64,
    template_metric: f64,
    template_shift: f64,
}

#[derive(Debug, Serialize)]
struct IgnoredRecord {
    measure_id: u64,
    reason: String,
}

#[derive(Debug, Serialize)]
struct PointOutput {
    point_id: u64,
    updated: Vec<UpdateRecord>,
    ignored: Vec<IgnoredRecord>,
    unchanged: Vec<u64>,
}

impl From<PointReport> for PointOutput {
    fn from(report: PointReport) -> Self {
        Self {
            point_id: report.point_id,
            updated: report
                .updates
                .into_iter()
                .map(|u| UpdateRecord {
                    measure_id: u.measure_id,
                    sample: u.sample,
                    line: u.line,
                    weight: u.weight,
                    template_metric: u.template_metric,
                    template_shift: u.template_shift,
                })
                .collect(),
            ignored: report
                .ignored
                .into_iter()
                .map(|r| IgnoredRecord {
                    measure_id: r.measure_id,
                    reason: r.reason,
                })
                .collect(),
            unchanged: report.unchanged,
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    points: Vec<PointOutput>,
}

type Catalog = HashMap<ImageId, NoDataRaster<OwnedImage>>;

fn load_images(
    images: &[ImageConfig],
) -> Result<(Catalog, AffineProjector), Box<dyn std::error::Error>> {
    let mut catalog = HashMap::new();
    let mut projector = AffineProjector::new();
    for image in images {
        let id = ImageId(image.id);
        let raster = load_gray_image(&image.path)?;
        let (width, height) = raster.shape();
        projector.insert_bounded(
            id,
            Affine2::from_coefficients(image.pixel_to_ground),
            width,
            height,
        )?;
        let no_data = image.no_data.unwrap_or(f32::NAN);
        catalog.insert(id, NoDataRaster::new(raster, no_data));
    }
    Ok((catalog, projector))
}

fn control_point(point: &PointConfig) -> ControlPoint {
    ControlPoint {
        id: point.id,
        reference_index: point.reference_index,
        measures: point
            .measures
            .iter()
            .map(|m| Measure {
                weight: m.weight,
                ..Measure::new(m.id, ImageId(m.image), m.sample, m.line)
            })
            .collect(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("subreg=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.images.is_empty() || config.points.is_empty() {
        return Err("images and points must be set in the config".into());
    }

    let geom = GeomConfig {
        mode: config.geometry.parse::<GeometryMode>()?,
        matcher: config.matcher.parse::<MatcherKind>()?,
        affine_half: (config.affine_half[0], config.affine_half[1]),
    };
    let (catalog, projector) = load_images(&config.images)?;
    let mut sink = MemorySink::new();
    let mut outputs = Vec::with_capacity(config.points.len());

    match config.mode {
        ModeConfig::Smart => {
            let parameters = config
                .parameters
                .iter()
                .map(|&[image, template]| ParameterSet::square(image, template))
                .collect::<Result<Vec<_>, _>>()?;
            if parameters.is_empty() {
                return Err("parameters must list at least one window configuration".into());
            }
            let defaults = SmartConfig::default();
            let cfg = SmartConfig {
                geom,
                parameters,
                consensus_tolerance: config.consensus_tolerance,
                validation_tolerance: config.validation_tolerance,
                min_validated: config.min_validated,
                mi_bins: config.mi_bins,
                chooser: config.chooser.clone().unwrap_or(defaults.chooser),
                strict: config.strict,
            };
            for point in &config.points {
                let report =
                    smart_register_point(&control_point(point), &catalog, &projector, &cfg, &mut sink)?;
                outputs.push(PointOutput::from(report));
            }
        }
        ModeConfig::Simple => {
            let simple = &config.simple;
            let defaults = SimpleConfig::default();
            let cfg = SimpleConfig {
                geom,
                parameters: ParameterSet::new(
                    (simple.image_size[0], simple.image_size[1]),
                    (simple.template_size[0], simple.template_size[1]),
                )?,
                cost: simple.cost.into(),
                threshold: simple.threshold,
                chooser: config.chooser.clone().unwrap_or(defaults.chooser),
            };
            for point in &config.points {
                let report = simple_register_point(
                    &control_point(point),
                    &catalog,
                    &projector,
                    &cfg,
                    &mut sink,
                )?;
                outputs.push(PointOutput::from(report));
            }
        }
    }

    let output = Output { points: outputs };
    let json = serde_json::to_string_pretty(&output)?;
    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
