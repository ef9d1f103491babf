use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde_json::{Map, Value};

use pkgtrace_deps::{DependencyHost, DependencyResolver, EsmDependencyHost, SortedEntryPoints};
use pkgtrace_driver::{project_path_for, report, Project};
use pkgtrace_finder::{DirectoryWalkerFinder, EntryPointManifest, InvalidatingManifest, Manifest, TargetedEntryPointFinder};
use pkgtrace_fs::{paths, FileSystem, OsFileSystem};
use pkgtrace_packages::build_marker::PROCESSED_MARKER_KEY;
use pkgtrace_packages::package_json::parse_package_json_str;
use pkgtrace_packages::{get_entry_point_info, mark_as_processed, EntryPointInfo, FormatProperty, ProjectConfig, PACKAGE_JSON};

type CommandResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(
    name = "pkgtrace",
    version,
    about = "Find package entry points and order them by dependency",
    long_about = "Discovers the entry points of the packages in a node_modules tree\n\
                  (and any path-mapped directories) and lists them dependencies first."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find every entry point under a directory
    Scan {
        /// Directory to scan, usually a node_modules directory
        base_path: PathBuf,

        /// tsconfig.json providing path mappings
        #[arg(long)]
        tsconfig: Option<PathBuf>,

        /// Ignore any stored entry-point manifest and write a fresh one
        #[arg(long)]
        invalidate_manifest: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Find one entry point and everything it depends on
    Target {
        /// Directory holding the dependency cache
        base_path: PathBuf,

        /// Entry point to start from, relative to BASE_PATH or absolute
        target: PathBuf,

        /// tsconfig.json providing path mappings
        #[arg(long)]
        tsconfig: Option<PathBuf>,

        /// Format properties to consider (default: all)
        #[arg(long, value_delimiter = ',')]
        properties: Vec<FormatProperty>,

        /// Only skip the target when every listed format is processed
        #[arg(long)]
        all_formats: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Classify one directory and list its imports (debug)
    Inspect {
        /// Root directory of the package
        package_path: PathBuf,

        /// Entry point inside the package, e.g. `testing`
        entry_point: Option<PathBuf>,
    },

    /// Record formats of an entry point as processed
    Mark {
        /// Directory of the entry point
        entry_point: PathBuf,

        /// Format properties to mark
        #[arg(long, value_delimiter = ',', required = true)]
        properties: Vec<FormatProperty>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Scan {
            base_path,
            tsconfig,
            invalidate_manifest,
            json,
        } => scan_command(&base_path, tsconfig.as_deref(), invalidate_manifest, json),
        Commands::Target {
            base_path,
            target,
            tsconfig,
            properties,
            all_formats,
            json,
        } => target_command(&base_path, &target, tsconfig.as_deref(), properties, all_formats, json),
        Commands::Inspect {
            package_path,
            entry_point,
        } => inspect_command(&package_path, entry_point.as_deref()),
        Commands::Mark {
            entry_point,
            properties,
        } => mark_command(&entry_point, &properties),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

fn canonical(path: &Path) -> Result<PathBuf, Box<dyn Error>> {
    std::fs::canonicalize(path).map_err(|e| format!("cannot resolve {}: {}", path.display(), e).into())
}

fn print_sorted(sorted: &SortedEntryPoints, base_path: &Path, json: bool) -> CommandResult {
    if json {
        println!("{}", serde_json::to_string_pretty(&report::sorted_to_json(sorted))?);
    } else {
        print!("{}", report::render_sorted(sorted, base_path));
    }
    Ok(())
}

fn scan_command(base_path: &Path, tsconfig: Option<&Path>, invalidate_manifest: bool, json: bool) -> CommandResult {
    let fs = OsFileSystem::new();
    let base_path = canonical(base_path)?;
    let project = Project::load(&fs, &base_path, tsconfig)?;
    debug!("Scanning {}", base_path.display());

    let resolver = DependencyResolver::new(EsmDependencyHost::new(&fs, project.path_mappings.as_ref()));
    let manifest: Box<dyn Manifest + '_> = if invalidate_manifest {
        Box::new(InvalidatingManifest::new(&fs, &project.config))
    } else {
        Box::new(EntryPointManifest::new(&fs, &project.config))
    };
    let finder = DirectoryWalkerFinder::new(
        &fs,
        &project.config,
        &resolver,
        manifest.as_ref(),
        &project.base_path,
        project.path_mappings.as_ref(),
    );

    let sorted = finder.find_entry_points()?;
    print_sorted(&sorted, &project.base_path, json)
}

fn target_command(
    base_path: &Path,
    target: &Path,
    tsconfig: Option<&Path>,
    properties: Vec<FormatProperty>,
    all_formats: bool,
    json: bool,
) -> CommandResult {
    let fs = OsFileSystem::new();
    let base_path = canonical(base_path)?;
    let target = canonical(&paths::resolve(&base_path, target))?;
    let project = Project::load(&fs, &base_path, tsconfig)?;

    let resolver = DependencyResolver::new(EsmDependencyHost::new(&fs, project.path_mappings.as_ref()));
    let finder = TargetedEntryPointFinder::new(
        &fs,
        &project.config,
        &resolver,
        project.base_path.clone(),
        project.path_mappings.as_ref(),
        target.clone(),
    );

    let properties = if properties.is_empty() {
        FormatProperty::ALL.to_vec()
    } else {
        properties
    };
    if !finder.target_needs_processing_or_cleaning(&properties, all_formats) {
        if json {
            println!("{}", serde_json::to_string_pretty(&report::sorted_to_json(&SortedEntryPoints::default()))?);
        } else {
            println!("Nothing to process for {}", target.display());
        }
        return Ok(());
    }

    let sorted = finder.find_entry_points()?;
    print_sorted(&sorted, &project.base_path, json)
}

fn inspect_command(package_path: &Path, entry_point: Option<&Path>) -> CommandResult {
    let fs = OsFileSystem::new();
    let package_path = canonical(package_path)?;
    let entry_point_path = match entry_point {
        Some(sub_path) => paths::resolve(&package_path, sub_path),
        None => package_path.clone(),
    };

    let descriptor = entry_point_path.join(PACKAGE_JSON);
    if fs.exists(&descriptor) {
        let source = fs.read_to_string(&descriptor)?;
        if let Err(e) = parse_package_json_str(&source) {
            report_json_error(&descriptor, &source, &e);
            return Err(format!("{} is not a valid package descriptor", descriptor.display()).into());
        }
    }

    let config = ProjectConfig::load(&fs, &project_path_for(&package_path))?;
    let info = get_entry_point_info(&fs, &config, &package_path, &entry_point_path);
    print!("{}", report::render_entry_point_info(&info, &entry_point_path));

    if let EntryPointInfo::Valid(entry_point) = &info {
        let host = EsmDependencyHost::new(&fs, None);
        print!("{}", report::render_dependency_info(&host.collect_dependencies(entry_point)));
    }
    Ok(())
}

fn mark_command(entry_point: &Path, properties: &[FormatProperty]) -> CommandResult {
    let fs = OsFileSystem::new();
    let descriptor = canonical(entry_point)?.join(PACKAGE_JSON);
    let source = fs.read_to_string(&descriptor)?;
    let mut package_json = match parse_package_json_str(&source) {
        Ok(package_json) => package_json,
        Err(e) => {
            report_json_error(&descriptor, &source, &e);
            return Err(format!("{} is not a valid package descriptor", descriptor.display()).into());
        }
    };

    mark_as_processed(&mut package_json, properties);

    // Only the marker is replaced; fields the typed descriptor drops stay as written.
    let mut raw: Map<String, Value> = serde_json::from_str(&source)?;
    raw.insert(
        PROCESSED_MARKER_KEY.to_string(),
        serde_json::to_value(&package_json.processed_by)?,
    );
    fs.write(&descriptor, &serde_json::to_string_pretty(&raw)?)?;
    println!("Marked {} in {}", properties.len(), descriptor.display());
    Ok(())
}

fn report_json_error(path: &Path, source: &str, error: &serde_json::Error) {
    let filename = path.display().to_string();
    let span = (filename.as_str(), report::json_error_span(source, error.line(), error.column()));
    let printed = Report::build(ReportKind::Error, span.clone())
        .with_code("E0001")
        .with_message("Malformed package descriptor")
        .with_label(
            Label::new(span)
                .with_message(error.to_string())
                .with_color(Color::Red),
        )
        .finish()
        .eprint((filename.as_str(), Source::from(source)));
    if let Err(e) = printed {
        eprintln!("{}: {}", filename, error);
        debug!("Failed to render diagnostic: {}", e);
    }
}
