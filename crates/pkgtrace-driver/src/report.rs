//! Output rendering for the `pkgtrace` subcommands.

use std::fmt::Write;
use std::ops::Range;
use std::path::Path;

use pkgtrace_deps::{DependencyInfo, SortedEntryPoints};
use pkgtrace_fs::paths;
use pkgtrace_packages::{EntryPoint, EntryPointInfo};
use serde_json::{json, Value};

fn display_path(base_path: &Path, path: &Path) -> String {
    if paths::is_path_contained_by(base_path, path) {
        paths::relative(base_path, path).display().to_string()
    } else {
        path.display().to_string()
    }
}

/// Human readable listing of a sort result, paths shown relative to `base_path`.
pub fn render_sorted(sorted: &SortedEntryPoints, base_path: &Path) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Processing order ({} entry points):", sorted.entry_points.len());
    for (i, entry) in sorted.entry_points.iter().enumerate() {
        let entry_point = &entry.entry_point;
        let _ = writeln!(
            out,
            "  {}. {} ({}){}",
            i + 1,
            entry_point.name,
            display_path(base_path, &entry_point.path),
            if entry_point.is_processed() { " [processed]" } else { "" }
        );
    }

    if !sorted.invalid_entry_points.is_empty() {
        let _ = writeln!(out, "Invalid entry points ({}):", sorted.invalid_entry_points.len());
        for invalid in &sorted.invalid_entry_points {
            let _ = writeln!(
                out,
                "  - {} is missing: {}",
                invalid.entry_point.name,
                invalid.missing_dependencies.join(", ")
            );
        }
    }

    if !sorted.cycles.is_empty() {
        let _ = writeln!(out, "Dependency cycles ({}):", sorted.cycles.len());
        for cycle in &sorted.cycles {
            let members: Vec<String> = cycle.iter().map(|path| display_path(base_path, path)).collect();
            let _ = writeln!(out, "  - {}", members.join(" <-> "));
        }
    }

    if !sorted.ignored_dependencies.is_empty() {
        let _ = writeln!(out, "Ignored dependencies ({}):", sorted.ignored_dependencies.len());
        for ignored in &sorted.ignored_dependencies {
            let _ = writeln!(
                out,
                "  - {} -> {}",
                ignored.entry_point.name,
                ignored.dependency_path.display()
            );
        }
    }

    out
}

fn entry_point_json(entry_point: &EntryPoint) -> Value {
    json!({
        "name": entry_point.name,
        "path": entry_point.path,
        "packageName": entry_point.package_name,
        "packagePath": entry_point.package_path,
        "typings": entry_point.typings,
        "processed": entry_point.is_processed(),
    })
}

/// Machine readable form of a sort result.
pub fn sorted_to_json(sorted: &SortedEntryPoints) -> Value {
    json!({
        "entryPoints": sorted
            .entry_points
            .iter()
            .map(|entry| {
                let mut value = entry_point_json(&entry.entry_point);
                value["dependencies"] = json!(entry.dep_info.dependencies);
                value
            })
            .collect::<Vec<_>>(),
        "invalidEntryPoints": sorted
            .invalid_entry_points
            .iter()
            .map(|invalid| {
                let mut value = entry_point_json(&invalid.entry_point);
                value["missingDependencies"] = json!(invalid.missing_dependencies);
                value
            })
            .collect::<Vec<_>>(),
        "ignoredDependencies": sorted
            .ignored_dependencies
            .iter()
            .map(|ignored| json!({ "entryPoint": ignored.entry_point.path, "dependency": ignored.dependency_path }))
            .collect::<Vec<_>>(),
        "cycles": sorted.cycles,
    })
}

/// Describe how a single path was classified.
pub fn render_entry_point_info(info: &EntryPointInfo, path: &Path) -> String {
    let mut out = String::new();
    match info {
        EntryPointInfo::NotAUnit => {
            let _ = writeln!(out, "{} is not an entry point", path.display());
        }
        EntryPointInfo::Incompatible => {
            let _ = writeln!(out, "{} has a package.json that cannot be used", path.display());
        }
        EntryPointInfo::Ignored => {
            let _ = writeln!(out, "{} is ignored by configuration", path.display());
        }
        EntryPointInfo::Valid(entry_point) => {
            let _ = writeln!(out, "Entry point: {}", entry_point.name);
            let _ = writeln!(out, "  package: {} ({})", entry_point.package_name, entry_point.package_path.display());
            let _ = writeln!(out, "  typings: {}", entry_point.typings.display());
            for (property, bundle) in entry_point.declared_formats() {
                let processed = if entry_point.is_format_processed(property) { " [processed]" } else { "" };
                let _ = writeln!(out, "  {}: {}{}", property, bundle, processed);
            }
        }
    }
    out
}

pub fn render_dependency_info(info: &DependencyInfo) -> String {
    let mut out = String::new();
    let sections: [(&str, Vec<String>); 3] = [
        ("Dependencies", info.dependencies.iter().map(|p| p.display().to_string()).collect()),
        ("Missing", info.missing.iter().cloned().collect()),
        ("Deep imports", info.deep_imports.iter().map(|p| p.display().to_string()).collect()),
    ];
    for (title, items) in sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}:", title);
        for item in items {
            let _ = writeln!(out, "  - {}", item);
        }
    }
    out
}

/// Character range covering the position a JSON error points at.
///
/// `line` and `column` are 1-based, as reported by `serde_json`. The range is
/// in characters since that is how diagnostics index their source.
pub fn json_error_span(source: &str, line: usize, column: usize) -> Range<usize> {
    let mut offset = 0;
    for (i, text) in source.split_inclusive('\n').enumerate() {
        if i + 1 == line {
            offset += column.saturating_sub(1).min(text.len());
            break;
        }
        offset += text.len();
    }
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let start = source[..offset].chars().count();
    let end = if offset < source.len() { start + 1 } else { start };
    start..end
}
