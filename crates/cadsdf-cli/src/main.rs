//! cadsdf: export a CAD scene snapshot to an SDF model directory
//!
//! # Commands
//!
//! - `cadsdf export <scene.ron> <output-dir>` - run the export and write the bundle
//! - `cadsdf inspect <model.sdf>` - print the links and joints of an SDF model

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, bail};
use cadsdf_core::{
    ExportOptions, HeadlessHost, LinkCache, Scene, export_scene, parse_sdf, write_bundle,
};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "cadsdf")]
#[command(about = "Export annotated CAD assemblies to SDF robot models", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a scene snapshot into a model directory
    Export {
        /// Scene snapshot (RON)
        scene: PathBuf,

        /// Model directory to write into
        output: PathBuf,

        #[command(flatten)]
        flags: OptionFlags,
    },

    /// Print the structure of a generated model.sdf
    Inspect {
        /// SDF file to read
        sdf: PathBuf,
    },
}

/// Command-line overrides applied on top of the options file
#[derive(Args)]
struct OptionFlags {
    /// Export options (RON); unspecified fields keep their defaults
    #[arg(long)]
    options: Option<PathBuf>,

    /// Model name
    #[arg(long)]
    name: Option<String>,

    /// Do not request mesh files from the host
    #[arg(long)]
    no_meshes: bool,

    /// Resolve via-points, end-effectors and markers
    #[arg(long)]
    via_points: bool,

    /// Emit CASPR cable and body sidecars
    #[arg(long)]
    caspr: bool,

    /// Emit cardsflow.xml
    #[arg(long)]
    cardsflow: bool,

    /// Emit muscles.osim and use the muscle interface plugin
    #[arg(long)]
    opensim: bool,

    /// Emit lighthouse sensor layouts
    #[arg(long)]
    sensors: bool,

    /// Enable self collision on every link
    #[arg(long)]
    self_collide: bool,

    /// Replace computed inertia with the placeholder tensor
    #[arg(long)]
    dummy_inertia: bool,

    /// Drop parts lighter than 1 g
    #[arg(long)]
    remove_small_parts: bool,

    /// Link cache file; enables cache mode
    #[arg(long)]
    cache: Option<PathBuf>,
}

impl OptionFlags {
    fn resolve(&self) -> Result<ExportOptions> {
        let mut options = match &self.options {
            Some(path) => ExportOptions::load(path)
                .with_context(|| format!("loading options from {}", path.display()))?,
            None => ExportOptions::default(),
        };

        if let Some(name) = &self.name {
            options.model_name = name.clone();
        }
        options.export_meshes &= !self.no_meshes;
        options.export_via_points |= self.via_points;
        options.export_caspr |= self.caspr;
        options.export_cardsflow |= self.cardsflow;
        options.export_open_sim_muscles |= self.opensim;
        options.export_lighthouse_sensors |= self.sensors;
        options.self_collide |= self.self_collide;
        options.dummy_inertia |= self.dummy_inertia;
        options.remove_small_parts |= self.remove_small_parts;
        options.cache |= self.cache.is_some();

        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            output,
            flags,
        } => run_export(&scene, &output, &flags),
        Commands::Inspect { sdf } => {
            init_logging(None)?;
            run_inspect(&sdf)
        }
    }
}

/// Console logging, plus a plain-text copy in `log_file` when given
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadsdf_core=info,cadsdf_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(())
}

fn run_export(scene_path: &Path, output: &Path, flags: &OptionFlags) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("creating output directory {}", output.display()))?;
    init_logging(Some(&output.join("logfile.txt")))?;

    let options = flags.resolve()?;
    let scene = Scene::load(scene_path)
        .with_context(|| format!("loading scene {}", scene_path.display()))?;
    tracing::info!(
        "Exporting '{}' from {} ({} occurrences)",
        options.model_name,
        scene_path.display(),
        scene.occurrences.len()
    );

    let mut cache = match &flags.cache {
        Some(path) => Some(
            LinkCache::load_or_default(path)
                .with_context(|| format!("loading link cache {}", path.display()))?,
        ),
        None => None,
    };

    let mut host = HeadlessHost::new();
    let outcome = export_scene(&scene, &options, &mut host, cache.as_mut())?;

    for request in &host.requests {
        tracing::info!(
            "Mesh for '{}' expected at {}",
            request.link,
            output.join(&request.path).display()
        );
    }

    if let (Some(cache), Some(path)) = (&cache, &flags.cache) {
        if cache.is_dirty() {
            cache
                .save(path)
                .with_context(|| format!("saving link cache {}", path.display()))?;
            tracing::info!("Saved {} cached links to {}", cache.len(), path.display());
        }
    }

    let written = write_bundle(&outcome.bundle, output);
    println!("{}", outcome.report.summary());
    println!("Wrote {} files to {}", written.written.len(), output.display());

    if !written.is_complete() {
        for (path, err) in &written.failures {
            eprintln!("  {}: {}", path.display(), err);
        }
        bail!("{} documents could not be written", written.failures.len());
    }
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let summary = parse_sdf(&content).with_context(|| format!("parsing {}", path.display()))?;

    println!("model {}", summary.model_name);
    for link in &summary.links {
        let pose = link.pose.map(|v| v.to_string()).join(" ");
        println!("  link {} mass {} pose {}", link.name, link.mass, pose);
    }
    for joint in &summary.joints {
        println!(
            "  joint {} ({}) {} -> {}",
            joint.name, joint.joint_type, joint.parent, joint.child
        );
    }
    Ok(())
}
