//! Text report renderer — indented tree for terminals and logs

use super::SOURCE_DESCRIPTORS;
use crate::source::SourceId;
use crate::store::Accessor;
use crate::FathomResult;
use std::fmt::Write;

pub fn render(store: &dyn Accessor, root: SourceId) -> FathomResult<String> {
    let mut out = String::new();
    let _ = writeln!(out, "fathom characterization report (v{})", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "{}", "─".repeat(64));
    render_source(store, root, 0, &mut out)?;
    Ok(out)
}

fn render_source(
    store: &dyn Accessor,
    id: SourceId,
    depth: usize,
    out: &mut String,
) -> FathomResult<()> {
    let record = store.retrieve_source(id)?;
    let pad = "  ".repeat(depth);

    let _ = writeln!(out, "{pad}• {} [{}]", record.kind.display_name(), id);
    for descriptor in SOURCE_DESCRIPTORS {
        if let Some(value) = (descriptor.fetch)(&record) {
            let _ = writeln!(out, "{pad}    {}: {}", descriptor.name, value);
        }
    }
    for property in &record.properties {
        let _ = writeln!(out, "{pad}    {} = {}", property.name, property.value);
    }
    for &module_id in &record.modules {
        let module = store.retrieve_module(module_id)?;
        let verdict = module
            .validity
            .map(|v| format!(", {v}"))
            .unwrap_or_default();
        let elapsed = module
            .timer
            .duration_ms()
            .map(|ms| format!(" ({ms}ms)"))
            .unwrap_or_default();
        let _ = writeln!(out, "{pad}    ran {} {}{}{}", module.name, module.version, verdict, elapsed);
    }
    for message in &record.messages {
        let _ = writeln!(out, "{pad}    {message}");
    }

    for &child in &record.children {
        render_source(store, child, depth + 1, out)?;
    }
    Ok(())
}
