//! ES module to CommonJS rewriting
//!
//! Import and export statements are cut out of the source text. Their
//! `require` bindings and export getters go on a prologue line ahead of the
//! body, and removed statements leave their newlines behind, so body line `n`
//! is line `n` of the source and the per-module source map stays usable.
//!
//! Imported bindings are not copied into locals. Every reference is rewritten
//! to read the exporting module's `exports` object at the time of use, which
//! keeps bindings live and lets import cycles resolve.

use anyhow::{bail, Result};
use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Argument, CallExpression, Declaration, ExportAllDeclaration, ExportDefaultDeclaration,
    ExportDefaultDeclarationKind, ExportNamedDeclaration, Expression, IdentifierReference,
    ImportDeclaration, ImportDeclarationSpecifier, ModuleExportName, ObjectProperty, Statement,
};
use oxc::ast_visit::{walk, Visit};
use oxc::parser::Parser;
use oxc::semantic::{Scoping, SemanticBuilder, SymbolId};
use oxc::span::{GetSpan, SourceType, Span};
use std::collections::HashMap;

/// A module rewritten to run inside a CommonJS-style factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedModule {
    /// Factory body: the prologue line, then the rewritten source
    pub code: String,
    /// Every specifier the module requires, in first-seen order
    pub specifiers: Vec<String>,
}

struct Edit {
    start: usize,
    end: usize,
    text: String,
}

struct Linker {
    scoping: Scoping,
    /// Export getters, defined before any dependency runs
    exports: Vec<String>,
    /// Requires and re-exports, in source order
    imports: Vec<String>,
    edits: Vec<Edit>,
    specifiers: Vec<String>,
    /// Expression that reads each imported binding
    bindings: HashMap<SymbolId, String>,
    modules: usize,
    esm: bool,
}

/// Rewrite a module's import and export statements
pub fn link_module(source: &str, source_type: SourceType) -> Result<LinkedModule> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        bail!("{}", error);
    }
    let program = ret.program;
    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();

    let mut linker = Linker::new(scoping);

    // Imports first so that re-exported imports are known to the export pass
    for statement in &program.body {
        if let Statement::ImportDeclaration(decl) = statement {
            linker.import(source, decl);
        }
    }
    for statement in &program.body {
        match statement {
            Statement::ExportNamedDeclaration(decl) => linker.export_named(source, decl),
            Statement::ExportDefaultDeclaration(decl) => linker.export_default(decl),
            Statement::ExportAllDeclaration(decl) => linker.export_all(source, decl),
            _ => {}
        }
    }

    let mut requires = RequireCollector::default();
    requires.visit_program(&program);
    for specifier in requires.specifiers {
        linker.add_specifier(&specifier);
    }

    if !linker.bindings.is_empty() {
        let mut references = ReferenceRewriter {
            linker: &mut linker,
        };
        references.visit_program(&program);
    }

    Ok(linker.finish(source))
}

impl Linker {
    fn new(scoping: Scoping) -> Self {
        Linker {
            scoping,
            exports: Vec::new(),
            imports: Vec::new(),
            edits: Vec::new(),
            specifiers: Vec::new(),
            bindings: HashMap::new(),
            modules: 0,
            esm: false,
        }
    }

    fn add_specifier(&mut self, specifier: &str) {
        if !self.specifiers.iter().any(|s| s == specifier) {
            self.specifiers.push(specifier.to_string());
        }
    }

    /// Bind `require(specifier)` to a fresh local and return its name
    fn require(&mut self, specifier: &str) -> String {
        self.add_specifier(specifier);
        let local = format!("__sluice_import_{}", self.modules);
        self.modules += 1;
        self.imports
            .push(format!("var {} = require({});", local, quote(specifier)));
        local
    }

    /// Cut a statement out, keeping its line breaks
    fn remove(&mut self, source: &str, start: u32, end: u32) {
        let (start, end) = (start as usize, end as usize);
        let newlines = source[start..end].matches('\n').count();
        self.edits.push(Edit {
            start,
            end,
            text: "\n".repeat(newlines),
        });
    }

    fn replace(&mut self, span: Span, text: String) {
        self.edits.push(Edit {
            start: span.start as usize,
            end: span.end as usize,
            text,
        });
    }

    fn export(&mut self, exported: &str, expression: &str) {
        self.exports.push(format!(
            "__sluice_export(exports, {}, function () {{ return {}; }});",
            quote(exported),
            expression
        ));
    }

    /// The import expression a reference stands for, if it names an import
    fn binding_of(&self, reference: &IdentifierReference) -> Option<&String> {
        let reference_id = reference.reference_id.get()?;
        let symbol_id = self.scoping.get_reference(reference_id).symbol_id()?;
        self.bindings.get(&symbol_id)
    }

    fn import(&mut self, source: &str, decl: &ImportDeclaration) {
        self.esm = true;
        self.remove(source, decl.span.start, decl.span.end);

        let specifier = decl.source.value.as_str();
        let specifiers = match &decl.specifiers {
            Some(specifiers) if !specifiers.is_empty() => specifiers,
            _ => {
                self.add_specifier(specifier);
                self.imports.push(format!("require({});", quote(specifier)));
                return;
            }
        };

        let module = self.require(specifier);
        for item in specifiers {
            let (local, expression) = match item {
                ImportDeclarationSpecifier::ImportSpecifier(spec) => (
                    &spec.local,
                    format!("{}[{}]", module, quote(spec.imported.name().as_str())),
                ),
                ImportDeclarationSpecifier::ImportDefaultSpecifier(spec) => {
                    (&spec.local, format!("__sluice_default({})", module))
                }
                ImportDeclarationSpecifier::ImportNamespaceSpecifier(spec) => {
                    (&spec.local, module.clone())
                }
            };
            if let Some(symbol_id) = local.symbol_id.get() {
                self.bindings.insert(symbol_id, expression);
            }
        }
    }

    fn export_named(&mut self, source: &str, decl: &ExportNamedDeclaration) {
        self.esm = true;

        if let Some(declaration) = &decl.declaration {
            // Keep the declaration, drop the `export` keyword
            self.remove(source, decl.span.start, declaration.span().start);
            for name in declared_names(declaration) {
                self.export(&name, &name);
            }
            return;
        }

        self.remove(source, decl.span.start, decl.span.end);
        match &decl.source {
            Some(from) => {
                let module = self.require(from.value.as_str());
                for spec in &decl.specifiers {
                    let expression = format!("{}[{}]", module, quote(spec.local.name().as_str()));
                    self.export(spec.exported.name().as_str(), &expression);
                }
            }
            None => {
                for spec in &decl.specifiers {
                    let expression = match &spec.local {
                        ModuleExportName::IdentifierReference(local) => self
                            .binding_of(local)
                            .cloned()
                            .unwrap_or_else(|| local.name.to_string()),
                        other => other.name().to_string(),
                    };
                    self.export(spec.exported.name().as_str(), &expression);
                }
            }
        }
    }

    fn export_default(&mut self, decl: &ExportDefaultDeclaration) {
        self.esm = true;
        let value = &decl.declaration;
        let value_start = value.span().start as usize;

        let named = match value {
            ExportDefaultDeclarationKind::FunctionDeclaration(f) => {
                f.id.as_ref().map(|id| id.name.to_string())
            }
            ExportDefaultDeclarationKind::ClassDeclaration(c) => {
                c.id.as_ref().map(|id| id.name.to_string())
            }
            _ => None,
        };

        match named {
            Some(name) => {
                self.edits.push(Edit {
                    start: decl.span.start as usize,
                    end: value_start,
                    text: String::new(),
                });
                self.export("default", &name);
            }
            None => {
                self.edits.push(Edit {
                    start: decl.span.start as usize,
                    end: value_start,
                    text: "exports.default = ".to_string(),
                });
            }
        }
    }

    fn export_all(&mut self, source: &str, decl: &ExportAllDeclaration) {
        self.esm = true;
        self.remove(source, decl.span.start, decl.span.end);

        let module = self.require(decl.source.value.as_str());
        match &decl.exported {
            Some(name) => self.export(name.name().as_str(), &module),
            None => self
                .imports
                .push(format!("__sluice_reexport(exports, {});", module)),
        }
    }

    fn finish(mut self, source: &str) -> LinkedModule {
        self.edits.sort_by_key(|edit| edit.start);

        let mut body = String::with_capacity(source.len());
        let mut cursor = 0;
        for edit in &self.edits {
            if edit.start < cursor {
                continue;
            }
            body.push_str(&source[cursor..edit.start]);
            body.push_str(&edit.text);
            cursor = edit.end;
        }
        body.push_str(&source[cursor..]);

        let mut prologue = Vec::new();
        if self.esm {
            prologue.push("\"use strict\";".to_string());
            prologue.push(
                "Object.defineProperty(exports, \"__esModule\", { value: true });".to_string(),
            );
        }
        prologue.append(&mut self.exports);
        prologue.append(&mut self.imports);

        LinkedModule {
            code: format!("{}\n{}", prologue.join(" "), body),
            specifiers: self.specifiers,
        }
    }
}

/// Names bound by an exported declaration
fn declared_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(var) => var
            .declarations
            .iter()
            .flat_map(|declarator| declarator.id.get_binding_identifiers())
            .map(|id| id.name.to_string())
            .collect(),
        Declaration::FunctionDeclaration(f) => {
            f.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Collects the string arguments of `require(...)` calls
#[derive(Default)]
struct RequireCollector {
    specifiers: Vec<String>,
}

impl<'a> Visit<'a> for RequireCollector {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &call.callee {
            if callee.name.as_str() == "require" && call.arguments.len() == 1 {
                if let Some(Argument::StringLiteral(literal)) = call.arguments.first() {
                    self.specifiers.push(literal.value.to_string());
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

/// Points every reference to an imported binding at the exporting module
struct ReferenceRewriter<'l> {
    linker: &'l mut Linker,
}

impl<'a> Visit<'a> for ReferenceRewriter<'_> {
    fn visit_identifier_reference(&mut self, reference: &IdentifierReference<'a>) {
        if let Some(expression) = self.linker.binding_of(reference).cloned() {
            self.linker.replace(reference.span, expression);
        }
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        // Imported functions are called without the module as `this`
        if let Expression::Identifier(callee) = &call.callee {
            if let Some(expression) = self.linker.binding_of(callee).cloned() {
                self.linker
                    .replace(callee.span, format!("(0, {})", expression));
                self.visit_arguments(&call.arguments);
                return;
            }
        }
        walk::walk_call_expression(self, call);
    }

    fn visit_object_property(&mut self, property: &ObjectProperty<'a>) {
        if property.shorthand {
            if let Expression::Identifier(value) = &property.value {
                if let Some(expression) = self.linker.binding_of(value).cloned() {
                    let text = format!("{}: {}", value.name, expression);
                    self.linker.replace(value.span, text);
                    return;
                }
            }
        }
        walk::walk_object_property(self, property);
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
