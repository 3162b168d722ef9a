//! sbom-compose: SBOM merge and augmentation engine
//!
//! Combines SBOM documents produced at different stages of a container build
//! into a single, internally consistent SBOM for the final artifact.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use sbom_compose::{
    AnnotateConfig, BaseAugmentConfig, IndexAugmentConfig, MergeConfig, OutputConfig, cli,
};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build long version string with format support info
const fn build_long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        "\n\nInput/Output Format:",
        "\n  CycloneDX-compatible JSON (unknown fields pass through unchanged)",
        "\n\nTransforms:",
        "\n  merge, base-image lineage, multi-arch index assembly, final image annotation"
    )
}

#[derive(Parser)]
#[command(name = "sbom-compose")]
#[command(version, long_version = build_long_version())]
#[command(about = "SBOM merge and augmentation engine", long_about = None)]
#[command(after_help = "EXIT CODES:
    0  Success
    1  IO error
    2  Malformed input document
    3  Component cannot be assigned an identity key
    4  Identity conflict (same key, incompatible kinds)
    5  Dangling relationship after merge
    6  Missing primary component
    7  Empty image index

EXAMPLES:
    # Merge dependency-resolution and filesystem-scan SBOMs (order matters)
    sbom-compose merge cachi2.bom.json syft.bom.json -O merged.bom.json

    # Record base-image lineage from the build's parsed Dockerfile
    sbom-compose augment-base --sbom merged.bom.json \\
        --parsed-dockerfile dockerfile.json --base-images-digests digests.txt

    # Assemble a multi-arch index SBOM
    sbom-compose augment-index --index-ref registry.io/ns/app@sha256:fff \\
        --child amd64=amd64.bom.json --child arm64=arm64.bom.json

    # Stamp the final image reference (last step before publishing)
    sbom-compose annotate --sbom merged.bom.json \\
        --repository registry.io/ns/app --digest sha256:ccc")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Arguments for the `merge` subcommand
#[derive(Parser)]
struct MergeArgs {
    /// Input SBOM paths, in merge order (dependency-resolution document
    /// first, filesystem-scan document second, by convention)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file path (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

/// Arguments for the `augment-base` subcommand
#[derive(Parser)]
struct AugmentBaseArgs {
    /// Path to the SBOM to augment
    #[arg(long)]
    sbom: PathBuf,

    /// File with one digest-pinned ancestor reference per line, nearest
    /// ancestor first (conflicts with --parsed-dockerfile)
    #[arg(long, conflicts_with = "parsed_dockerfile")]
    lineage: Option<PathBuf>,

    /// Parsed Dockerfile in JSON format, as produced by dockerfile-json
    #[arg(long, requires = "base_images_digests")]
    parsed_dockerfile: Option<PathBuf>,

    /// File with '<reference> <pinned-reference>' lines recorded from
    /// 'buildah images' output during the build
    #[arg(long)]
    base_images_digests: Option<PathBuf>,

    /// Output file path (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

/// Arguments for the `augment-index` subcommand
#[derive(Parser)]
struct AugmentIndexArgs {
    /// Digest-pinned reference of the image index manifest
    #[arg(long = "index-ref")]
    index_ref: String,

    /// Child SBOM as 'arch=path'; repeat per architecture
    #[arg(long = "child", value_name = "ARCH=PATH", required = true)]
    children: Vec<String>,

    /// Output file path (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

/// Arguments for the `annotate` subcommand
#[derive(Parser)]
struct AnnotateArgs {
    /// Path to the SBOM to annotate
    #[arg(long)]
    sbom: PathBuf,

    /// Repository of the final output image
    #[arg(long)]
    repository: String,

    /// Resolved digest of the final output image
    #[arg(long)]
    digest: String,

    /// Output file path (stdout if not specified)
    #[arg(short = 'O', long)]
    output_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge SBOM documents into one
    Merge(MergeArgs),
    /// Insert base-image lineage into an SBOM
    AugmentBase(AugmentBaseArgs),
    /// Assemble a top-level SBOM for a multi-architecture image index
    AugmentIndex(AugmentIndexArgs),
    /// Record the final output image reference (run last)
    Annotate(AnnotateArgs),
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let quiet = cli.quiet;
    let result = match cli.command {
        Commands::Merge(args) => cli::run_merge(&MergeConfig {
            inputs: args.inputs,
            output: OutputConfig {
                file: args.output_file,
                quiet,
            },
        }),

        Commands::AugmentBase(args) => cli::run_augment_base(&BaseAugmentConfig {
            sbom: args.sbom,
            lineage: args.lineage,
            parsed_dockerfile: args.parsed_dockerfile,
            base_images_digests: args.base_images_digests,
            output: OutputConfig {
                file: args.output_file,
                quiet,
            },
        }),

        Commands::AugmentIndex(args) => match parse_children(&args.children) {
            Ok(children) => cli::run_augment_index(&IndexAugmentConfig {
                index_reference: args.index_ref,
                children,
                output: OutputConfig {
                    file: args.output_file,
                    quiet,
                },
            }),
            Err(e) => Err(e),
        },

        Commands::Annotate(args) => cli::run_annotate(&AnnotateConfig {
            sbom: args.sbom,
            repository: args.repository,
            digest: args.digest,
            output: OutputConfig {
                file: args.output_file,
                quiet,
            },
        }),

        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "sbom-compose", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(error) = result {
        eprintln!("error: {error}");
        std::process::exit(error.exit_code());
    }
}

/// Split repeated 'arch=path' arguments.
fn parse_children(
    raw: &[String],
) -> sbom_compose::Result<Vec<(String, PathBuf)>> {
    raw.iter()
        .map(|entry| {
            entry
                .split_once('=')
                .map(|(arch, path)| (arch.to_string(), PathBuf::from(path)))
                .ok_or_else(|| {
                    sbom_compose::ComposeError::malformed(format!(
                        "child '{entry}' is not in 'arch=path' form"
                    ))
                })
        })
        .collect()
}
