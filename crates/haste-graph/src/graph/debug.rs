//! Human-readable dump of the module index.

use std::fmt::Write;

use crate::context::GraphContext;

/// Every module with its resolved edges and dependers, sorted by path.
pub(crate) fn render(ctx: &GraphContext) -> String {
    let mut out = String::new();
    let modules = ctx.modules.all_modules();
    let _ = writeln!(out, "modules: {}", modules.len());
    let _ = writeln!(out, "global names: {}", ctx.haste.read().len());

    for module in modules {
        let _ = writeln!(out, "\n{} (generation {})", module.hash(), module.generation());

        let dependencies = ctx.modules.dependencies_of(module.id());
        if !dependencies.is_empty() {
            let _ = writeln!(out, "  dependencies:");
            for (edge, target) in dependencies {
                let _ = writeln!(
                    out,
                    "    {} [{}] -> {}",
                    edge.name,
                    edge.platform.as_deref().unwrap_or("*"),
                    target.path().display()
                );
            }
        }

        let dependers = ctx.modules.dependers_of(module.id());
        if !dependers.is_empty() {
            let _ = writeln!(out, "  dependers:");
            for (source, edge) in dependers {
                let _ = writeln!(out, "    {} ({})", source.path().display(), edge.name);
            }
        }
    }
    out
}
