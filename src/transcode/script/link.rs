//! Module linking: rewrite one module's import/export syntax into calls
//! against the bundle's module registry.
//!
//! Each module becomes the body of `function (module, exports, require)`.
//!
//! | source                         | rewritten                                   |
//! |--------------------------------|---------------------------------------------|
//! | `import { a as b } from "x"`   | `var m = interop(require(N))`, `b` -> `m.a` |
//! | `import * as ns from "x"`      | `var ns = interop(require(N))`              |
//! | `import "x"`                   | `require(N)`                                |
//! | `export <declaration>`         | declaration plus a getter on `exports`      |
//! | `export { a as b } from "x"`   | getter `b` reading `m.a`                    |
//! | `export * from "x"`            | `star(exports, require(N))`                 |
//! | `export default <expr>`        | `var default_ = <expr>` plus a getter       |
//! | `require("x")`, `import("x")`  | specifier replaced by the module id         |
//!
//! Imported bindings stay live: every reference reads through the
//! namespace object, and exports are getters.

use std::fmt::Write;

use oxc::allocator::Allocator;
use oxc::ast::AstKind;
use oxc::ast::ast::{
    Argument, BindingIdentifier, CallExpression, Declaration, ExportDefaultDeclarationKind,
    Expression, ImportDeclarationSpecifier, ImportExpression, Statement,
};
use oxc::ast_visit::{Visit, walk};
use oxc::parser::Parser;
use oxc::semantic::{Semantic, SemanticBuilder};
use oxc::span::{GetSpan, SourceType, Span};
use rustc_hash::FxHashMap;

use super::join_errors;
use crate::debug;

/// Prefix of every name the bundle runtime introduces.
pub(super) const PREFIX: &str = "__sluice_";

/// A linked module body.
pub(super) struct Linked {
    pub body: String,
    /// Whether the module used ESM syntax.
    pub esm: bool,
    /// Nothing was rewritten: the code has no module syntax or requires.
    pub plain: bool,
}

/// Rewrite transformed (plain JavaScript) module code.
///
/// `require_id` resolves a specifier from this module to a registry id.
pub(super) fn link<F>(code: &str, mut require_id: F) -> Result<Linked, String>
where
    F: FnMut(&str) -> Result<usize, String>,
{
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::unambiguous()).parse();
    if !ret.errors.is_empty() {
        return Err(join_errors(&ret.errors));
    }
    let program = ret.program;
    let ret = SemanticBuilder::new().build(&program);
    if !ret.errors.is_empty() {
        return Err(join_errors(&ret.errors));
    }

    let mut linker = Linker::new(&ret.semantic);
    for stmt in &program.body {
        linker.statement(stmt, &mut require_id)?;
    }

    let mut calls = Calls::default();
    calls.visit_program(&program);
    for (span, specifier) in calls.requires {
        match require_id(specifier) {
            Ok(id) => linker.edits.push(Edit::new(span, id.to_string())),
            // Left to throw at runtime, where optional requires catch it
            Err(err) => debug!("scripts"; "require(\"{specifier}\") left as is: {err}"),
        }
    }
    for (span, specifier) in calls.dynamic {
        let id = require_id(specifier)?;
        linker.edits.push(Edit::new(
            span,
            format!(
                "Promise.resolve().then(function () {{ return {PREFIX}interop(require({id})); }})"
            ),
        ));
    }

    Ok(linker.finish(code))
}

/// Text replacement over a byte range of the module code.
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

impl Edit {
    fn new(span: Span, text: impl Into<String>) -> Self {
        Self::range(span.start, span.end, text)
    }

    fn range(start: u32, end: u32, text: impl Into<String>) -> Self {
        Self {
            start: start as usize,
            end: end as usize,
            text: text.into(),
        }
    }
}

struct Linker<'s, 'a> {
    semantic: &'s Semantic<'a>,
    edits: Vec<Edit>,
    /// Whole statements dropped from the body.
    removed: Vec<Span>,
    /// Registry requires run before the body.
    header: String,
    /// `exports` getters: exported name to expression.
    getters: Vec<(String, String)>,
    /// Import bindings by local name, as rewritten expressions.
    imported: FxHashMap<String, String>,
    namespaces: usize,
    /// Bare `export {}` statements, left behind when only types were imported.
    markers: usize,
    esm: bool,
}

impl<'s, 'a> Linker<'s, 'a> {
    fn new(semantic: &'s Semantic<'a>) -> Self {
        Self {
            semantic,
            edits: Vec::new(),
            removed: Vec::new(),
            header: String::new(),
            getters: Vec::new(),
            imported: FxHashMap::default(),
            namespaces: 0,
            markers: 0,
            esm: false,
        }
    }

    fn statement<F>(&mut self, stmt: &Statement<'a>, require_id: &mut F) -> Result<(), String>
    where
        F: FnMut(&str) -> Result<usize, String>,
    {
        match stmt {
            Statement::ImportDeclaration(decl) => {
                self.esm = true;
                self.remove(decl.span);
                let id = require_id(decl.source.value.as_str())?;
                let Some(specifiers) = &decl.specifiers else {
                    let _ = writeln!(self.header, "require({id});");
                    return Ok(());
                };
                let ns = self.namespace(id);
                for specifier in specifiers {
                    match specifier {
                        ImportDeclarationSpecifier::ImportSpecifier(s) => {
                            self.bind(&s.local, member(&ns, s.imported.name().as_str()));
                        }
                        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                            self.bind(&s.local, format!("{ns}.default"));
                        }
                        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                            let _ = writeln!(self.header, "var {} = {ns};", s.local.name);
                        }
                    }
                }
            }
            Statement::ExportNamedDeclaration(decl)
                if decl.declaration.is_none()
                    && decl.source.is_none()
                    && decl.specifiers.is_empty() =>
            {
                self.markers += 1;
                self.remove(decl.span);
            }
            Statement::ExportNamedDeclaration(decl) => {
                self.esm = true;
                if let Some(declaration) = &decl.declaration {
                    // Drop the `export` keyword, keep the declaration
                    self.edits
                        .push(Edit::range(decl.span.start, declaration.span().start, ""));
                    for name in declared_names(declaration) {
                        self.getters.push((name.clone(), name));
                    }
                    return Ok(());
                }
                self.remove(decl.span);
                let ns = match &decl.source {
                    Some(source) => Some(self.namespace(require_id(source.value.as_str())?)),
                    None => None,
                };
                for spec in &decl.specifiers {
                    let local = spec.local.name();
                    let expr = match &ns {
                        Some(ns) => member(ns, local.as_str()),
                        None => self
                            .imported
                            .get(local.as_str())
                            .cloned()
                            .unwrap_or_else(|| local.to_string()),
                    };
                    self.getters.push((spec.exported.name().to_string(), expr));
                }
            }
            Statement::ExportAllDeclaration(decl) => {
                self.esm = true;
                self.remove(decl.span);
                let id = require_id(decl.source.value.as_str())?;
                match &decl.exported {
                    Some(exported) => {
                        let ns = self.namespace(id);
                        self.getters.push((exported.name().to_string(), ns));
                    }
                    None => {
                        let _ = writeln!(self.header, "{PREFIX}star(exports, require({id}));");
                    }
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                self.esm = true;
                let inner = decl.declaration.span();
                let named = match &decl.declaration {
                    ExportDefaultDeclarationKind::FunctionDeclaration(f) => f.id.as_ref(),
                    ExportDefaultDeclarationKind::ClassDeclaration(c) => c.id.as_ref(),
                    _ => None,
                };
                match named {
                    Some(id) => {
                        self.edits.push(Edit::range(decl.span.start, inner.start, ""));
                        self.getters.push(("default".into(), id.name.to_string()));
                    }
                    None => {
                        let var = format!("{PREFIX}default");
                        self.edits
                            .push(Edit::range(decl.span.start, inner.start, format!("var {var} = ")));
                        self.edits.push(Edit::range(decl.span.end, decl.span.end, ";"));
                        self.getters.push(("default".into(), var));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn remove(&mut self, span: Span) {
        self.removed.push(span);
        self.edits.push(Edit::new(span, ""));
    }

    /// Declare a namespace variable for module `id`.
    fn namespace(&mut self, id: usize) -> String {
        let ns = format!("{PREFIX}m{}", self.namespaces);
        self.namespaces += 1;
        let _ = writeln!(self.header, "var {ns} = {PREFIX}interop(require({id}));");
        ns
    }

    /// Route every reference to an import binding through `expr`.
    fn bind(&mut self, local: &BindingIdentifier<'a>, expr: String) {
        self.imported.insert(local.name.to_string(), expr.clone());
        let Some(symbol) = local.symbol_id.get() else {
            return;
        };
        let scoping = self.semantic.scoping();
        let nodes = self.semantic.nodes();
        for &reference in scoping.get_resolved_reference_ids(symbol) {
            let node = scoping.get_reference(reference).node_id();
            let span = nodes.kind(node).span();
            let text = match nodes.parent_kind(node) {
                AstKind::ObjectProperty(prop) if prop.shorthand => {
                    format!("{}: {expr}", local.name)
                }
                // Imported functions are called without a receiver
                AstKind::CallExpression(call) if call.callee.span() == span => {
                    format!("(0, {expr})")
                }
                _ => expr.clone(),
            };
            self.edits.push(Edit::new(span, text));
        }
    }

    fn finish(self, code: &str) -> Linked {
        let plain = self.edits.len() == self.markers && self.header.is_empty() && !self.esm;

        let mut body = String::with_capacity(code.len() + self.header.len() + 128);
        if self.esm {
            body.push_str("\"use strict\";\n");
            let _ = write!(body, "{PREFIX}export(exports, {{");
            for (i, (name, expr)) in self.getters.iter().enumerate() {
                let sep = if i == 0 { "" } else { "," };
                let _ = write!(
                    body,
                    "{sep}\n  {}: function () {{ return {expr}; }}",
                    quote(name)
                );
            }
            body.push_str("\n});\n");
        }
        body.push_str(&self.header);

        let removed = self.removed;
        let edits = self
            .edits
            .into_iter()
            .filter(|e| {
                e.start == e.end
                    || !removed.iter().any(|r| {
                        let (start, end) = (r.start as usize, r.end as usize);
                        start <= e.start && e.end <= end && (start, end) != (e.start, e.end)
                    })
            })
            .collect();
        body.push_str(&apply(code, edits));

        Linked {
            body,
            esm: self.esm,
            plain,
        }
    }
}

/// Apply non-overlapping edits. Later edits overlapping an earlier one are
/// dropped.
fn apply(code: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| (e.start, e.end));
    let mut out = String::with_capacity(code.len());
    let mut pos = 0;
    for edit in edits {
        if edit.start < pos || edit.end > code.len() {
            continue;
        }
        out.push_str(&code[pos..edit.start]);
        out.push_str(&edit.text);
        pos = edit.end;
    }
    out.push_str(&code[pos..]);
    out
}

/// Names bound by an exported declaration.
fn declared_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|d| d.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(f) => {
            f.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// `ns.name`, or `ns["name"]` when `name` is not an identifier.
fn member(ns: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{ns}.{name}")
    } else {
        format!("{ns}[{}]", quote(name))
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn quote(name: &str) -> String {
    serde_json::Value::from(name).to_string()
}

/// Literal `require("x")` and `import("x")` calls anywhere in a module.
#[derive(Default)]
struct Calls<'a> {
    /// Span of the string argument.
    requires: Vec<(Span, &'a str)>,
    /// Span of the whole `import()` expression.
    dynamic: Vec<(Span, &'a str)>,
}

impl<'a> Visit<'a> for Calls<'a> {
    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if it.is_require_call()
            && let Some(Argument::StringLiteral(lit)) = it.arguments.first()
        {
            self.requires.push((lit.span, lit.value.as_str()));
        }
        walk::walk_call_expression(self, it);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &it.source {
            self.dynamic.push((it.span, lit.value.as_str()));
        }
        walk::walk_import_expression(self, it);
    }
}
