//! Static extraction of required names from module source.
//!
//! The oxc parser is tried first. Sources it rejects (syntax the transformer
//! will handle later, partial files mid-edit) fall back to a regex scan with
//! comments stripped, which finds the same literal `require`/`import` forms.

use indexmap::IndexSet;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, ArrayExpressionElement, CallExpression, ExportAllDeclaration,
    ExportNamedDeclaration, Expression, ImportDeclaration, ImportExpression,
};
use oxc_ast_visit::{Visit, walk};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Names required by a module, in source order and without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requires {
    pub sync: Vec<String>,
    /// One entry per `import()` / `require.async()` call site.
    pub bundles: Vec<Vec<String>>,
}

pub fn extract_requires(source: &str, path: &Path) -> Requires {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or(SourceType::cjs());
    let parsed = Parser::new(&allocator, source, source_type).parse();

    if !parsed.errors.is_empty() {
        tracing::debug!(
            path = %path.display(),
            errors = parsed.errors.len(),
            "parse failed, scanning requires with patterns"
        );
        return scan_requires(source);
    }

    let mut collector = RequireCollector::default();
    collector.visit_program(&parsed.program);
    collector.finish()
}

#[derive(Default)]
struct RequireCollector {
    sync: IndexSet<String>,
    bundles: Vec<Vec<String>>,
}

impl RequireCollector {
    fn finish(self) -> Requires {
        Requires {
            sync: self.sync.into_iter().collect(),
            bundles: self.bundles,
        }
    }
}

fn is_require_async(callee: &Expression<'_>) -> bool {
    match callee {
        Expression::StaticMemberExpression(member) => {
            member.property.name.as_str() == "async"
                && matches!(&member.object, Expression::Identifier(id) if id.name.as_str() == "require")
        }
        _ => false,
    }
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        match &call.callee {
            Expression::Identifier(id) if id.name.as_str() == "require" => {
                if let Some(Argument::StringLiteral(lit)) = call.arguments.first() {
                    self.sync.insert(lit.value.to_string());
                }
            }
            callee if is_require_async(callee) => {
                let mut bundle = Vec::new();
                for argument in &call.arguments {
                    match argument {
                        Argument::StringLiteral(lit) => bundle.push(lit.value.to_string()),
                        Argument::ArrayExpression(array) => {
                            for element in &array.elements {
                                if let ArrayExpressionElement::StringLiteral(lit) = element {
                                    bundle.push(lit.value.to_string());
                                }
                            }
                        }
                        _ => {}
                    }
                }
                if !bundle.is_empty() {
                    self.bundles.push(bundle);
                }
            }
            _ => {}
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &expr.source {
            self.bundles.push(vec![lit.value.to_string()]);
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        if !decl.import_kind.is_type() {
            self.sync.insert(decl.source.value.to_string());
        }
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            self.sync.insert(source.value.to_string());
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.sync.insert(decl.source.value.to_string());
    }
}

static COMMENTS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s:/\*.*?\*/)|(?m:(?:^|[^:\\])//[^\n]*)").ok());

static SYNC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"\brequire\s*\(\s*(?:'([^']+)'|"([^"]+)")\s*\)"#,
        r#"\bimport\s+(?:[^'";]+?\s+from\s+)?(?:'([^']+)'|"([^"]+)")"#,
        r#"\bexport\s+(?:[^'";]+?\s+from\s+)(?:'([^']+)'|"([^"]+)")"#,
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static ASYNC_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?:\brequire\s*\.\s*async|\bimport)\s*\(\s*(?:'([^']+)'|"([^"]+)")\s*\)"#).ok()
});

fn literal(captures: &regex::Captures<'_>) -> Option<String> {
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str().to_string())
}

/// Pattern-based fallback for sources the parser rejects.
pub fn scan_requires(source: &str) -> Requires {
    let stripped = match COMMENTS.as_ref() {
        Some(re) => re.replace_all(source, ""),
        None => source.into(),
    };

    let mut found: Vec<(usize, String)> = Vec::new();
    for pattern in SYNC_PATTERNS.iter() {
        for captures in pattern.captures_iter(&stripped) {
            if let (Some(whole), Some(name)) = (captures.get(0), literal(&captures)) {
                found.push((whole.start(), name));
            }
        }
    }
    found.sort_by_key(|(offset, _)| *offset);
    let sync: IndexSet<String> = found.into_iter().map(|(_, name)| name).collect();

    let bundles = ASYNC_PATTERN
        .as_ref()
        .map(|re| {
            re.captures_iter(&stripped)
                .filter_map(|c| literal(&c))
                .map(|name| vec![name])
                .collect()
        })
        .unwrap_or_default();

    Requires {
        sync: sync.into_iter().collect(),
        bundles,
    }
}
