//! Stylesheet compilation
//!
//! Sass is compiled with grass, then the CSS is printed by lightningcss with a
//! source map: expanded with the map inlined in development, minified with the
//! map written beside the output in production.

use crate::config::{BuildMode, Compatibility};
use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::path::Path;

/// Output of a stylesheet compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCss {
    /// CSS text, ending with a `sourceMappingURL` comment
    pub css: String,
    /// External source map (production only)
    pub map: Option<String>,
}

/// Compile a Sass entry point
///
/// `source_name` is the entry's root-relative path, recorded as the source of
/// the map. `output_name` is the file name the CSS will be written under; it
/// names the map file and its reference.
pub fn compile_stylesheet(
    entry: &Path,
    source_name: &str,
    output_name: &str,
    mode: BuildMode,
    compatibility: Compatibility,
) -> Result<CompiledCss> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    if let Some(dir) = entry.parent() {
        options = options.load_path(dir);
    }
    let compiled = grass::from_path(entry, &options).map_err(|e| anyhow!("{}", e))?;

    print_css(&compiled, source_name, output_name, mode, compatibility)
}

/// Print compiled CSS for the given build mode
pub fn print_css(
    css: &str,
    source_name: &str,
    output_name: &str,
    mode: BuildMode,
    compatibility: Compatibility,
) -> Result<CompiledCss> {
    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: source_name.to_string(),
            error_recovery: true,
            ..ParserOptions::default()
        },
    )
    .map_err(|e| anyhow!("{}", e))?;

    let mut source_map = SourceMap::new("/");
    source_map.add_source(source_name);
    source_map
        .set_source_content(0, css)
        .map_err(|e| anyhow!("source map error: {:?}", e))?;

    let production = mode.is_production();
    if production {
        stylesheet
            .minify(MinifyOptions {
                targets: targets_for(compatibility),
                ..MinifyOptions::default()
            })
            .map_err(|e| anyhow!("{}", e))?;
    }

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: production,
            source_map: Some(&mut source_map),
            targets: targets_for(compatibility),
            ..PrinterOptions::default()
        })
        .map_err(|e| anyhow!("{}", e))?;

    let map = source_map
        .to_json(None)
        .map_err(|e| anyhow!("source map error: {:?}", e))?;

    if production {
        Ok(CompiledCss {
            css: format!(
                "{}\n/*# sourceMappingURL={}.map */\n",
                printed.code, output_name
            ),
            map: Some(map),
        })
    } else {
        Ok(CompiledCss {
            css: format!(
                "{}\n/*# sourceMappingURL=data:application/json;base64,{} */\n",
                printed.code,
                STANDARD.encode(map)
            ),
            map: None,
        })
    }
}

/// Browser targets for a compatibility level
fn targets_for(compatibility: Compatibility) -> Targets {
    match compatibility {
        Compatibility::Ie(version) => Targets::from(Browsers {
            ie: Some(u32::from(version) << 16),
            ..Browsers::default()
        }),
        Compatibility::Any => Targets::default(),
    }
}

/// Whether a Sass file is a partial (never compiled on its own)
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('_'))
        .unwrap_or(false)
}
