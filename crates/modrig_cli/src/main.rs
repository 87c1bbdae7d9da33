//! modrig CLI
//!
//! Inspect, validate and evaluate modular rig models stored as JSON.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use modrig_core::event;
use modrig_hierarchy::RigHierarchy;
use modrig_model::{ModelValidator, ModularRigModel, ModuleReference};
use modrig_runtime::{ModularRig, ScriptLibrary};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "modrig")]
#[command(about = "modrig - modular rig composition and execution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the module tree of a model
    Inspect {
        /// Path to the model file
        #[arg(short, long)]
        model: PathBuf,
    },
    /// Check a model against a class library
    Validate {
        /// Path to the model file
        #[arg(short, long)]
        model: PathBuf,
        /// Path to the scripted class library
        #[arg(short, long)]
        classes: PathBuf,
    },
    /// Compose a rig and run an event for a number of frames
    Evaluate {
        /// Path to the model file
        #[arg(short, long)]
        model: PathBuf,
        /// Path to the scripted class library
        #[arg(short, long)]
        classes: PathBuf,
        /// Path to a hierarchy snapshot
        #[arg(long)]
        hierarchy: Option<PathBuf>,
        /// Event to run every frame
        #[arg(short, long, default_value = event::FORWARD_SOLVE)]
        event: String,
        /// Number of frames
        #[arg(short, long, default_value_t = 1)]
        frames: u32,
        /// Seconds per frame
        #[arg(short, long, default_value_t = 0.016)]
        delta: f64,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { model } => {
            print!("{}", inspect(&model)?);
            Ok(())
        }
        Commands::Validate { model, classes } => {
            let (report, ok) = validate(&model, &classes)?;
            print!("{report}");
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Evaluate {
            model,
            classes,
            hierarchy,
            event,
            frames,
            delta,
        } => {
            let options = EvaluateOptions {
                event,
                frames,
                delta,
            };
            print!("{}", evaluate(&model, &classes, hierarchy.as_deref(), &options)?);
            Ok(())
        }
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))
}

fn load_model(path: &Path) -> Result<ModularRigModel> {
    ModularRigModel::from_json(&read(path)?).wrap_err_with(|| format!("parsing model {}", path.display()))
}

fn load_library(path: &Path) -> Result<ScriptLibrary> {
    ScriptLibrary::from_json(&read(path)?).wrap_err_with(|| format!("parsing classes {}", path.display()))
}

/// Render the module tree, roots in declaration order, orphans last
fn inspect(path: &Path) -> Result<String> {
    let model = load_model(path)?;
    let mut out = String::new();
    for root in model.root_modules() {
        write_subtree(&model, root, 0, &mut out);
    }
    let orphans = model.orphans();
    if !orphans.is_empty() {
        out.push_str("orphans:\n");
        for module in orphans {
            let parent = module
                .parent
                .as_ref()
                .map(ToString::to_string)
                .or_else(|| module.parent_path.clone())
                .unwrap_or_default();
            let _ = writeln!(out, "  {} ({}) -> missing parent '{}'", module.name, module.class, parent);
        }
    }
    Ok(out)
}

fn write_subtree(model: &ModularRigModel, module: &ModuleReference, depth: usize, out: &mut String) {
    let _ = writeln!(out, "{}{} ({})", "  ".repeat(depth), module.name, module.class);
    if depth >= model.len() {
        return;
    }
    for child in model.children_of(module.name.as_str()) {
        write_subtree(model, child, depth + 1, out);
    }
}

/// Validate a model. Returns the report and whether it is free of errors.
fn validate(model: &Path, classes: &Path) -> Result<(String, bool)> {
    let model = load_model(model)?;
    let registry = load_library(classes)?.into_registry();
    match ModelValidator::new().validate(&model, &registry) {
        Ok(()) => Ok((format!("{} modules, no issues\n", model.len()), true)),
        Err(issues) => {
            let mut out = String::new();
            for issue in &issues {
                let _ = writeln!(out, "{issue}");
            }
            Ok((out, !issues.iter().any(|i| i.is_error())))
        }
    }
}

struct EvaluateOptions {
    event: String,
    frames: u32,
    delta: f64,
}

/// Compose the rig, run construction once if any module supports it, then
/// run the event once per frame and dump module variables
fn evaluate(model: &Path, classes: &Path, hierarchy: Option<&Path>, options: &EvaluateOptions) -> Result<String> {
    let model = load_model(model)?;
    let registry = Arc::new(load_library(classes)?.into_registry());
    let mut rig = ModularRig::new(model, registry);
    if let Some(path) = hierarchy {
        let snapshot = RigHierarchy::from_json(&read(path)?)
            .wrap_err_with(|| format!("parsing hierarchy {}", path.display()))?;
        rig = rig.with_hierarchy(snapshot);
    }
    rig.set_error_handler(|err| tracing::warn!(%err, "rig error"));
    rig.update_module_hierarchy();

    let mut out = String::new();
    if rig.supports_event(event::CONSTRUCTION) {
        let built = rig.evaluate(event::CONSTRUCTION);
        let _ = writeln!(out, "construction: {} modules", built.len());
    }

    for frame in 0..options.frames {
        rig.advance_time(options.delta);
        let executed = rig.evaluate(&options.event);
        let names: Vec<&str> = executed.iter().map(|n| n.as_str()).collect();
        let _ = writeln!(out, "frame {frame}: {}", names.join(", "));
        for name in rig.module_names() {
            let Some(executable) = rig.find_module(name.as_str()).and_then(|m| m.executable()) else {
                continue;
            };
            for variable in executable.variables().iter().filter(|v| v.public) {
                let _ = writeln!(out, "  {}.{} = {:?}", name, variable.name, variable.value);
            }
        }
        for drawing in rig.draw_interface().take() {
            let _ = writeln!(out, "  draw {} '{}'", drawing.module, drawing.label);
        }
    }

    let metrics = rig.metrics();
    info!(
        executed = metrics.modules_executed,
        failed = metrics.modules_failed,
        skipped = metrics.modules_skipped,
        errors = rig.reported_errors(),
        "evaluation finished"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MODEL: &str = r#"{
        "modules": [
            {"name": "Leg", "class": "Limb"},
            {"name": "Foot", "class": "Limb", "parent": "Leg", "bindings": {"Speed": "Leg.Speed"}},
            {"name": "Tail", "class": "Limb", "parent": "Hip"}
        ]
    }"#;

    const CLASSES: &str = r#"{
        "classes": [
            {
                "name": "Limb",
                "variables": [
                    {"name": "Speed", "value": {"type": "Float", "value": 2.0}},
                    {"name": "Time", "value": {"type": "Float", "value": 0.0}}
                ],
                "events": {
                    "Forward": [{"op": "AddTime", "variable": "Time"}]
                }
            }
        ]
    }"#;

    fn file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_inspect_prints_tree_and_orphans() {
        let model = file(MODEL);
        let out = inspect(model.path()).unwrap();
        assert!(out.starts_with("Leg (Limb)\n  Foot (Limb)\n"));
        assert!(out.contains("orphans:\n  Tail (Limb) -> missing parent 'Hip'"));
    }

    #[test]
    fn test_validate_reports_orphan_as_warning() {
        let (model, classes) = (file(MODEL), file(CLASSES));
        let (report, ok) = validate(model.path(), classes.path()).unwrap();
        assert!(ok);
        assert!(report.contains("warning: module 'Tail'"));
    }

    #[test]
    fn test_validate_unknown_class_fails() {
        let model = file(r#"{"modules": [{"name": "Leg", "class": "Wing"}]}"#);
        let classes = file(CLASSES);
        let (report, ok) = validate(model.path(), classes.path()).unwrap();
        assert!(!ok);
        assert!(report.contains("unknown class 'Wing'"));
    }

    #[test]
    fn test_evaluate_runs_frames() {
        let (model, classes) = (file(MODEL), file(CLASSES));
        let options = EvaluateOptions {
            event: "Forward".to_string(),
            frames: 2,
            delta: 0.5,
        };
        let out = evaluate(model.path(), classes.path(), None, &options).unwrap();
        assert!(out.contains("frame 0: Leg, Foot\n"));
        assert!(out.contains("frame 1: Leg, Foot\n"));
        assert!(out.contains("Foot.Time = Float(1.0)"));
        assert!(out.contains("Foot.Speed = Float(2.0)"));
        assert!(!out.contains("Tail."));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let classes = file(CLASSES);
        let missing = classes.path().with_extension("missing");
        assert!(inspect(&missing).is_err());
    }
}
