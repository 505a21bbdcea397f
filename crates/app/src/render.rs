use std::fmt::Write as _;

use brsr_core::model::Plant;
use brsr_core::progress::{ModuleProgress, Progress};
use services::AssistantReply;

const BAR_WIDTH: usize = 20;

fn bar(progress: Progress) -> String {
    let filled = (progress.ratio() * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn line(out: &mut String, indent: usize, name: &str, progress: Progress) {
    let _ = writeln!(
        out,
        "{:indent$}{} {:>3}% ({}/{}) {}",
        "",
        bar(progress),
        progress.percent(),
        progress.answered,
        progress.total,
        name,
        indent = indent
    );
}

/// Indented progress tree: module, then submodules, then categories.
#[must_use]
pub fn progress_tree(summary: &ModuleProgress) -> String {
    let mut out = String::new();
    line(&mut out, 0, &summary.name, summary.progress);
    for submodule in &summary.submodules {
        line(&mut out, 2, &submodule.name, submodule.progress);
        for category in &submodule.categories {
            line(&mut out, 4, &category.name, category.progress);
        }
    }
    out
}

#[must_use]
pub fn plant_list(plants: &[Plant]) -> String {
    let mut out = String::new();
    for plant in plants {
        let kind = if plant.is_main() { "main" } else { "other" };
        let _ = writeln!(out, "{:<8} {:<6} {} ({})", plant.code, kind, plant.name, plant.id);
    }
    if out.is_empty() {
        out.push_str("no plants\n");
    }
    out
}

#[must_use]
pub fn assistant_reply(reply: &AssistantReply) -> String {
    match reply {
        AssistantReply::Structured(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        AssistantReply::Unstructured { raw, notice } => format!("({notice})\n{raw}"),
    }
}
