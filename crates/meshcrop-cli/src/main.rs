//! meshcrop CLI - detect, inspect and crop 3D models
//!
//! Sources are local paths, `http(s)://` URLs or `data:` URLs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use meshcrop::{
    CropBox, CropStrategy, EngineConfig, LoadSummary, ModelEngine, ModelSource, ModelTransform,
    Vec3,
};

mod fetch;

use fetch::HttpFetcher;

#[derive(Parser)]
#[command(name = "meshcrop")]
#[command(about = "Crop GLB/glTF models against an axis-aligned box", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detected model format
    Detect {
        /// Path or URL of the model
        source: String,
    },
    /// Load a model and print its statistics and fitted crop box
    Info {
        /// Path or URL of the model
        source: String,
        /// Engine settings (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Crop a model and write the result as GLB
    Crop(CropArgs),
}

#[derive(clap::Args)]
struct CropArgs {
    /// Path or URL of the model
    source: String,
    /// Output .glb file
    #[arg(short, long)]
    output: PathBuf,
    /// Crop box as minX,maxX,minY,maxY,minZ,maxZ (default: fitted to the model)
    #[arg(long = "box", value_parser = parse_crop_box, allow_hyphen_values = true)]
    crop_box: Option<CropBox>,
    /// Padding around the fitted box, in world units
    #[arg(long)]
    padding: Option<f64>,
    /// centroid, all-vertices or any-vertex
    #[arg(long)]
    strategy: Option<CropStrategy>,
    /// Keep the existing normals instead of recomputing them
    #[arg(long)]
    keep_normals: bool,
    /// Model position as x,y,z
    #[arg(long, value_parser = parse_triple, allow_hyphen_values = true)]
    position: Option<[f64; 3]>,
    /// Model rotation as x,y,z in degrees
    #[arg(long, value_parser = parse_triple, allow_hyphen_values = true)]
    rotation: Option<[f64; 3]>,
    /// Engine settings (TOML); flags override it
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meshcrop=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Detect { source } => detect(&source).await?,
        Commands::Info { source, config } => info(&source, config.as_deref()).await?,
        Commands::Crop(args) => crop(args).await?,
    }
    Ok(())
}

async fn detect(source: &str) -> Result<()> {
    let engine = ModelEngine::new(HttpFetcher);
    let resolved = engine
        .loader()
        .resolver()
        .resolve(read_source(source)?)
        .await
        .with_context(|| format!("failed to read {source}"))?;
    println!("{}", resolved.format);
    Ok(())
}

async fn info(source: &str, config: Option<&Path>) -> Result<()> {
    let config = load_config(config)?;
    let mut engine = ModelEngine::new(HttpFetcher).with_config(&config)?;
    let summary = engine
        .load(read_source(source)?)
        .await
        .with_context(|| format!("failed to load {source}"))?;
    print_summary(&summary);
    Ok(())
}

async fn crop(args: CropArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(padding) = args.padding {
        config.crop_padding = padding;
    }
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if args.keep_normals {
        config.recompute_normals = false;
    }

    let mut engine = ModelEngine::new(HttpFetcher).with_config(&config)?;
    let [px, py, pz] = args.position.unwrap_or_default();
    let rotation = args.rotation.unwrap_or_default();
    engine.set_transform(ModelTransform::from_degrees(Vec3::new(px, py, pz), rotation));

    let summary = engine
        .load(read_source(&args.source)?)
        .await
        .with_context(|| format!("failed to load {}", args.source))?;
    print_summary(&summary);

    if let Some(crop_box) = args.crop_box {
        engine.update_crop_box(crop_box);
    }
    let result = engine.apply_crop();
    println!(
        "Cropped ({}): kept {} triangles, removed {} across {} meshes",
        config.strategy, result.triangles_kept, result.triangles_removed, result.meshes_processed
    );

    let glb = engine.export()?;
    std::fs::write(&args.output, &glb)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!("Exported GLB to {} ({} bytes)", args.output.display(), glb.len());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => Ok(EngineConfig::from_path(path)?),
        None => Ok(EngineConfig::default()),
    }
}

/// URLs pass through; anything else is read from disk.
fn read_source(source: &str) -> Result<ModelSource> {
    if ["http://", "https://", "data:"]
        .iter()
        .any(|scheme| source.starts_with(scheme))
    {
        return Ok(ModelSource::url(source));
    }
    let path = Path::new(source);
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| source.to_string(), |n| n.to_string_lossy().into_owned());
    Ok(ModelSource::file(name, bytes))
}

fn print_summary(summary: &LoadSummary) {
    let b = &summary.bounds;
    let c = &summary.crop_box;
    println!("Format:    {}", summary.format);
    println!("Meshes:    {}", summary.meshes);
    println!("Triangles: {}", summary.triangles);
    if b.is_empty() {
        println!("Bounds:    (empty)");
    } else {
        println!(
            "Bounds:    [{:.4}, {:.4}, {:.4}] .. [{:.4}, {:.4}, {:.4}]",
            b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
        );
    }
    println!(
        "Crop box:  x {:.4}..{:.4}  y {:.4}..{:.4}  z {:.4}..{:.4}",
        c.min_x, c.max_x, c.min_y, c.max_y, c.min_z, c.max_z
    );
}

fn parse_floats<const N: usize>(text: &str) -> std::result::Result<[f64; N], String> {
    let values = text
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("'{}': {e}", part.trim()))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    values
        .try_into()
        .map_err(|v: Vec<f64>| format!("expected {N} comma-separated numbers, got {}", v.len()))
}

fn parse_crop_box(text: &str) -> std::result::Result<CropBox, String> {
    let [min_x, max_x, min_y, max_y, min_z, max_z] = parse_floats::<6>(text)?;
    Ok(CropBox::new(min_x, max_x, min_y, max_y, min_z, max_z))
}

fn parse_triple(text: &str) -> std::result::Result<[f64; 3], String> {
    parse_floats::<3>(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_crop_box() {
        let b = parse_crop_box("-1, 1,0,2,-0.5,0.5").unwrap();
        assert_eq!(b, CropBox::new(-1.0, 1.0, 0.0, 2.0, -0.5, 0.5));
        assert!(parse_crop_box("1,2,3").unwrap_err().contains("expected 6"));
        assert!(parse_crop_box("1,2,3,4,5,x").is_err());
    }

    #[test]
    fn test_crop_args() {
        let cli = Cli::try_parse_from([
            "meshcrop",
            "crop",
            "in.glb",
            "-o",
            "out.glb",
            "--box",
            "-1,1,-1,1,-1,1",
            "--strategy",
            "any-vertex",
            "--rotation",
            "0,90,0",
            "--keep-normals",
        ])
        .unwrap();
        let Commands::Crop(args) = cli.command else {
            panic!("expected crop");
        };
        assert_eq!(args.strategy, Some(CropStrategy::AnyVertex));
        assert_eq!(args.rotation, Some([0.0, 90.0, 0.0]));
        assert!(args.keep_normals);
        assert_eq!(args.crop_box.unwrap().min_x, -1.0);
    }

    #[test]
    fn test_urls_are_not_read_from_disk() {
        assert!(matches!(
            read_source("https://example.com/a.glb").unwrap(),
            ModelSource::Url(_)
        ));
        assert!(read_source("/definitely/not/here.glb").is_err());
    }
}
