//! Script bundling
//!
//! Every module reachable from an entry point is transpiled with oxc to the
//! configured ECMAScript target, rewritten into a CommonJS-style factory and
//! appended to a small module runtime. The entry point is module 0.
//!
//! `process.env.NODE_ENV` is replaced by `"development"` or `"production"`
//! in every module, following the build mode.
//!
//! Development bundles carry an inline indexed source map with one section
//! per module; production bundles are minified and carry no map.

pub mod helpers;
pub mod link;
pub mod resolve;

pub use link::{link_module, LinkedModule};
pub use resolve::resolve;

use crate::config::BuildMode;
use crate::utils::relative_slash_path;
use anyhow::{anyhow, bail, Context as _, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};
use oxc::transformer_plugins::{ReplaceGlobalDefines, ReplaceGlobalDefinesConfig};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

const RUNTIME: &str = include_str!("runtime.js");
const RUNTIME_TAIL: &str = "  __sluice_require(0);\n})();\n";

/// Settings shared by every bundle of a run
#[derive(Debug, Clone, Copy)]
pub struct BundleOptions<'a> {
    pub mode: BuildMode,
    /// ECMAScript target such as `es2015`
    pub target: &'a str,
    /// Project root, used to name modules in source maps
    pub root: &'a Path,
}

/// Where a module's source comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ModuleSource {
    File(PathBuf),
    /// A lowering helper: name and source
    Helper(&'static str, &'static str),
}

struct CompiledModule {
    code: String,
    map: Option<String>,
    specifiers: Vec<String>,
}

struct BundledModule {
    dependencies: BTreeMap<String, usize>,
    code: String,
    map: Option<String>,
}

/// Per-bundle compilation settings
struct ModuleCompiler {
    transform: TransformOptions,
    defines: ReplaceGlobalDefinesConfig,
    with_map: bool,
}

/// Bundle an entry point and everything it imports
pub fn bundle(entry: &Path, output_name: &str, options: &BundleOptions) -> Result<String> {
    let compiler = ModuleCompiler::new(options)?;
    let root = fs::canonicalize(options.root).unwrap_or_else(|_| options.root.to_path_buf());

    let entry = fs::canonicalize(entry)
        .with_context(|| format!("Failed to read {}", entry.display()))?;
    let entry = ModuleSource::File(entry);
    let mut ids: HashMap<ModuleSource, usize> = HashMap::new();
    let mut order: Vec<ModuleSource> = vec![entry.clone()];
    ids.insert(entry, 0);

    let mut modules = Vec::new();
    let mut index = 0;
    while index < order.len() {
        let module = order[index].clone();
        let compiled = compiler.compile(&module, &root)?;

        let mut dependencies = BTreeMap::new();
        for specifier in &compiled.specifiers {
            let resolved = resolve_module(specifier, &module)?;
            let next = order.len();
            let id = *ids.entry(resolved.clone()).or_insert_with(|| {
                order.push(resolved);
                next
            });
            dependencies.insert(specifier.clone(), id);
        }

        modules.push(BundledModule {
            dependencies,
            code: compiled.code,
            map: compiled.map,
        });
        index += 1;
    }

    let (code, map) = assemble(&modules, output_name)?;

    if options.mode.is_production() {
        return minify(&code);
    }

    Ok(format!(
        "{}//# sourceMappingURL=data:application/json;charset=utf-8;base64,{}\n",
        code,
        STANDARD.encode(map)
    ))
}

/// Helpers resolve ahead of files; helpers only import other helpers
fn resolve_module(specifier: &str, importer: &ModuleSource) -> Result<ModuleSource> {
    if let Some((name, source)) = helpers::lookup(specifier) {
        return Ok(ModuleSource::Helper(name, source));
    }
    match importer {
        ModuleSource::File(path) => Ok(ModuleSource::File(resolve(specifier, path)?)),
        ModuleSource::Helper(name, _) => bail!(
            "Cannot resolve '{}' imported from helper {}",
            specifier,
            name
        ),
    }
}

/// Concatenate module factories behind the runtime, building an indexed map
///
/// Each factory opens on a line of its own, followed by the linker prologue
/// line, so a module's map section starts two lines below the factory.
fn assemble(modules: &[BundledModule], output_name: &str) -> Result<(String, String)> {
    let mut code = String::from(RUNTIME);
    let mut line = RUNTIME.lines().count();
    let mut sections = Vec::new();

    for (id, module) in modules.iter().enumerate() {
        let text = format!(
            "__sluice_define({}, {}, function (module, exports, require) {{\n{}\n}});\n",
            id,
            serde_json::to_string(&module.dependencies)?,
            module.code.trim_end()
        );

        if let Some(map) = &module.map {
            let map: serde_json::Value = serde_json::from_str(map)?;
            sections.push(json!({
                "offset": { "line": line + 2, "column": 0 },
                "map": map,
            }));
        }

        line += text.lines().count();
        code.push_str(&text);
    }
    code.push_str(RUNTIME_TAIL);

    let map = json!({
        "version": 3,
        "file": output_name,
        "sections": sections,
    });
    Ok((code, map.to_string()))
}

impl ModuleCompiler {
    fn new(options: &BundleOptions) -> Result<Self> {
        let transform = TransformOptions::from_target(options.target)
            .map_err(|e| anyhow!("Invalid script target '{}': {}", options.target, e))?;
        let node_env = if options.mode.is_production() {
            "\"production\""
        } else {
            "\"development\""
        };
        let defines = ReplaceGlobalDefinesConfig::new(&[("process.env.NODE_ENV", node_env)])
            .map_err(|errors| anyhow!("Invalid global define: {:?}", errors))?;

        Ok(ModuleCompiler {
            transform,
            defines,
            with_map: !options.mode.is_production(),
        })
    }

    fn compile(&self, module: &ModuleSource, root: &Path) -> Result<CompiledModule> {
        match module {
            ModuleSource::Helper(name, source) => {
                let linked = link_module(source, SourceType::cjs())
                    .with_context(|| format!("In helper {}", name))?;
                Ok(CompiledModule {
                    code: linked.code,
                    map: None,
                    specifiers: linked.specifiers,
                })
            }
            ModuleSource::File(path) => {
                let name = relative_slash_path(root, path)
                    .unwrap_or_else(|| path.display().to_string());
                self.compile_file(path, &name)
            }
        }
    }

    fn compile_file(&self, path: &Path, name: &str) -> Result<CompiledModule> {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if extension == "json" {
            serde_json::from_str::<serde_json::Value>(&source)
                .with_context(|| format!("Invalid JSON in {}", name))?;
            return Ok(CompiledModule {
                code: format!("module.exports = {};", source.trim()),
                map: None,
                specifiers: Vec::new(),
            });
        }

        let source_type = if extension == "cjs" {
            SourceType::cjs()
        } else {
            SourceType::mjs()
        };

        let (code, map) = self.transpile(&source, source_type, path, name)?;
        let linked = link_module(&code, source_type).with_context(|| format!("In {}", name))?;

        Ok(CompiledModule {
            code: linked.code,
            map,
            specifiers: linked.specifiers,
        })
    }

    /// Lower a module's syntax to the target, returning code and source map
    fn transpile(
        &self,
        source: &str,
        source_type: SourceType,
        path: &Path,
        name: &str,
    ) -> Result<(String, Option<String>)> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, source_type).parse();
        if let Some(error) = ret.errors.first() {
            bail!("{}: {}", name, error);
        }
        let mut program = ret.program;

        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();
        let ret = Transformer::new(&allocator, path, &self.transform)
            .build_with_scoping(scoping, &mut program);
        if let Some(error) = ret.errors.first() {
            bail!("{}: {}", name, error);
        }

        // The transform leaves scoping out of sync with the program
        let scoping = SemanticBuilder::new()
            .build(&program)
            .semantic
            .into_scoping();
        let _ = ReplaceGlobalDefines::new(&allocator, self.defines.clone())
            .build(scoping, &mut program);

        let output = Codegen::new()
            .with_options(CodegenOptions {
                source_map_path: self.with_map.then(|| PathBuf::from(name)),
                ..CodegenOptions::default()
            })
            .build(&program);

        Ok((output.code, output.map.map(|map| map.to_json_string())))
    }
}

/// Minify a complete bundle
fn minify(code: &str) -> Result<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, SourceType::cjs()).parse();
    if let Some(error) = ret.errors.first() {
        bail!("Failed to minify bundle: {}", error);
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}
