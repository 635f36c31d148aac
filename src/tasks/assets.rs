//! Generation tasks: styles, scripts, images and copied files

use crate::assets::css::{compile_stylesheet, is_partial};
use crate::assets::images::process_image;
use crate::assets::js::{bundle, BundleOptions};
use crate::assets::{copy_file, write_file, FileSet, Matched};
use crate::config::{parse_compatibility, PathMapping};
use crate::runner::{Context, Runner};
use crate::utils::relative_slash_path;
use anyhow::{Context as _, Result};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Compile every Sass entry point; compile errors are reported, not returned
pub fn styles(runner: &Runner) -> Result<()> {
    let ctx = runner.context();
    let compatibility = parse_compatibility(&ctx.config.styles.compatibility)?;
    let mapping = &ctx.config.paths.styles;
    let destination = ctx.resolve(&mapping.destination);

    for entry in sources(ctx, mapping)? {
        if is_partial(&entry.path) {
            continue;
        }

        let output = destination.join(entry.relative.with_extension("css"));
        let name = file_name(&output);
        let source = relative_slash_path(&ctx.root, &entry.path)
            .unwrap_or_else(|| entry.path.display().to_string());
        match compile_stylesheet(&entry.path, &source, &name, ctx.mode, compatibility) {
            Ok(compiled) => {
                write_file(&output, &compiled.css)?;
                if let Some(map) = compiled.map {
                    write_file(&output.with_file_name(format!("{}.map", name)), map)?;
                }
                ctx.reporter.debug(&format!("Wrote {}", output.display()));
            }
            Err(e) => ctx.reporter.error(&format!(
                "Sass error in {}: {:#}",
                display_path(ctx, &entry.path),
                e
            )),
        }
    }

    Ok(())
}

/// Bundle every script entry point into `<stem>.js`
pub fn scripts(runner: &Runner) -> Result<()> {
    let ctx = runner.context();
    let mapping = &ctx.config.paths.scripts;
    let destination = ctx.resolve(&mapping.destination);
    let options = BundleOptions {
        mode: ctx.mode,
        target: &ctx.config.scripts.target,
        root: &ctx.root,
    };

    for entry in sources(ctx, mapping)? {
        let output = destination.join(entry.relative.with_extension("js"));
        let code = bundle(&entry.path, &file_name(&output), &options)
            .with_context(|| format!("Failed to bundle {}", display_path(ctx, &entry.path)))?;
        write_file(&output, code)?;
        ctx.reporter.debug(&format!("Wrote {}", output.display()));
    }

    Ok(())
}

/// Copy images, optimizing them in production
pub fn images(runner: &Runner) -> Result<()> {
    let ctx = runner.context();
    let mapping = &ctx.config.paths.images;
    let destination = ctx.resolve(&mapping.destination);
    let quality = ctx.config.images.jpeg_quality;

    let files = sources(ctx, mapping)?;
    files.par_iter().try_for_each(|image| {
        process_image(
            &image.path,
            &destination.join(&image.relative),
            ctx.mode,
            quality,
        )
    })?;

    ctx.reporter.debug(&format!("Processed {} image(s)", files.len()));
    Ok(())
}

/// Copy every other source file, mirroring directories
pub fn copy(runner: &Runner) -> Result<()> {
    let ctx = runner.context();
    let mapping = &ctx.config.paths.others;
    let destination = ctx.resolve(&mapping.destination);

    let entries = FileSet::new(&ctx.root, &mapping.source)?.collect()?;
    for entry in &entries {
        let target = destination.join(&entry.relative);
        if entry.is_dir {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            copy_file(&entry.path, &target)?;
        }
    }

    ctx.reporter.debug(&format!("Copied {} entries", entries.len()));
    Ok(())
}

fn sources(ctx: &Context, mapping: &PathMapping) -> Result<Vec<Matched>> {
    Ok(FileSet::new(&ctx.root, &mapping.source)?.collect_files()?)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn display_path(ctx: &Context, path: &Path) -> String {
    path.strip_prefix(&ctx.root)
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildMode;
    use crate::runner::Registry;
    use crate::ui::Verbosity;
    use tempfile::TempDir;

    fn write(dir: &TempDir, file: &str, contents: &str) {
        let path = dir.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn runner(dir: &TempDir, mode: BuildMode) -> Runner {
        let context = Context::new()
            .with_root(dir.path().to_path_buf())
            .with_mode(mode)
            .with_verbosity(Verbosity::Silent);
        Runner::new(Registry::standard(), context)
    }

    #[test]
    fn test_styles_skip_partials_and_write_map_in_production() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/scss/_vars.scss", "$c: red;\n");
        write(&dir, "src/scss/main.scss", "@import 'vars';\nbody { color: $c; }\n");

        styles(&runner(&dir, BuildMode::Production)).unwrap();

        let css = fs::read_to_string(dir.path().join("dist/css/main.css")).unwrap();
        assert!(css.starts_with("body{color:red}"));
        assert!(css.contains("/*# sourceMappingURL=main.css.map */"));
        assert!(dir.path().join("dist/css/main.css.map").exists());
        assert!(!dir.path().join("dist/css/_vars.css").exists());
    }

    #[test]
    fn test_styles_swallow_compile_errors() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/scss/main.scss", "body { color: $missing; }\n");

        assert!(styles(&runner(&dir, BuildMode::Development)).is_ok());
        assert!(!dir.path().join("dist/css/main.css").exists());
    }

    #[test]
    fn test_scripts_write_bundle_named_after_entry() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/js/main.js", "console.log('hi');\n");

        scripts(&runner(&dir, BuildMode::Development)).unwrap();

        let js = fs::read_to_string(dir.path().join("dist/js/main.js")).unwrap();
        assert!(js.contains("console.log(\"hi\")"));
        assert!(js.contains("sourceMappingURL=data:application/json;charset=utf-8;base64,"));
    }

    #[test]
    fn test_scripts_fail_on_unresolved_import() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/js/main.js", "import './nope';\n");

        let err = scripts(&runner(&dir, BuildMode::Development)).unwrap_err();
        assert!(format!("{:#}", err).contains("src/js/main.js"));
    }

    #[test]
    fn test_images_mirror_subdirectories() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/images/icons/star.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
        write(&dir, "src/images/anim.gif", "GIF89a");
        write(&dir, "src/images/readme.txt", "not an image");

        images(&runner(&dir, BuildMode::Development)).unwrap();

        assert!(dir.path().join("dist/images/icons/star.svg").exists());
        assert_eq!(
            fs::read(dir.path().join("dist/images/anim.gif")).unwrap(),
            b"GIF89a"
        );
        assert!(!dir.path().join("dist/images/readme.txt").exists());
    }

    #[test]
    fn test_copy_mirrors_other_files_and_directories() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/index.php", "<?php echo 1;");
        write(&dir, "src/fonts/a.woff2", "font");
        write(&dir, "src/js/main.js", "skip");
        fs::create_dir_all(dir.path().join("src/uploads")).unwrap();

        copy(&runner(&dir, BuildMode::Development)).unwrap();

        assert!(dir.path().join("dist/index.php").exists());
        assert!(dir.path().join("dist/fonts/a.woff2").exists());
        assert!(dir.path().join("dist/uploads").is_dir());
        assert!(!dir.path().join("dist/js").exists());
    }
}
