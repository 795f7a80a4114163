// src/config/validate.rs

//! Defaults resolution and semantic validation of the Path Table.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{
    AssetClass, ClassOptions, ConfigFile, ProjectInfo, RawClassSection, RawConfigFile,
};
use crate::errors::{AssetdagError, Result};
use crate::fs::glob::{compile, glob_base};
use crate::types::{AssetKind, CLEAN_TASK, DEFAULT_TASK, TaskName, canonical_task_name};

const MAX_PRECISION: u32 = 10;
const DEFAULT_JPEG_QUALITY: u8 = 80;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let project = resolve_project(&raw);
        let serve = raw.serve.clone();

        for kind in AssetKind::ALL {
            reject_foreign_options(kind, raw.section(kind))?;
        }

        let classes: Vec<AssetClass> = AssetKind::ALL
            .into_iter()
            .map(|kind| resolve_class(kind, &raw, &project))
            .collect();

        let default_tasks: Vec<TaskName> = match &raw.default.tasks {
            Some(tasks) => tasks.iter().map(|t| canonical_task_name(t)).collect(),
            None => ["html", "images", "fonts", "sass", "js"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        };

        validate_classes(&classes)?;
        validate_default_tasks(&default_tasks, &classes)?;
        validate_task_dependencies(&classes)?;
        validate_dag(&classes, &default_tasks)?;
        validate_disjoint_trees(&classes)?;

        Ok(ConfigFile::new_unchecked(project, serve, default_tasks, classes))
    }
}

fn resolve_project(raw: &RawConfigFile) -> ProjectInfo {
    let defaults = ProjectInfo::default();
    let p = &raw.project;
    ProjectInfo {
        name: p.name.clone().unwrap_or(defaults.name),
        version: p.version.clone().unwrap_or(defaults.version),
        author: p.author.clone().unwrap_or(defaults.author),
        root: defaults.root,
        source: p
            .source
            .as_deref()
            .map(trim_slashes)
            .unwrap_or(defaults.source),
        dest: p.dest.as_deref().map(trim_slashes).unwrap_or(defaults.dest),
    }
}

fn trim_slashes(s: &str) -> String {
    s.trim_end_matches('/').to_string()
}

/// Fill in the layout for one class.
fn resolve_class(kind: AssetKind, file: &RawConfigFile, project: &ProjectInfo) -> AssetClass {
    let raw = file.section(kind);
    let src = &project.source;
    let dest = &project.dest;

    let (input, output) = match kind {
        AssetKind::Html => (format!("{src}/*.html"), dest.clone()),
        AssetKind::Images => (format!("{src}/images/*.*"), format!("{dest}/images")),
        AssetKind::InlineImages => (format!("{src}/images/inline/*"), format!("{src}/scss/images")),
        AssetKind::Styles => (format!("{src}/scss/main.scss"), format!("{dest}/css")),
        AssetKind::Scripts => (format!("{src}/js/**/*"), format!("{dest}/js")),
        AssetKind::Fonts => (format!("{src}/fonts/*.*"), format!("{dest}/css/fonts")),
    };
    let input = raw.input.clone().unwrap_or(input);
    let output = raw.output.as_deref().map(trim_slashes).unwrap_or(output);

    let extra_deps = raw.extra_deps.clone().unwrap_or_else(|| match kind {
        AssetKind::Html => vec![format!("{src}/template/**/*")],
        AssetKind::Styles => vec![format!("{src}/scss/**/*")],
        _ => Vec::new(),
    });

    let watch = raw.watch.clone().unwrap_or_else(|| match kind {
        AssetKind::Html => vec![input.clone(), format!("{src}/template/**/*")],
        AssetKind::Styles => {
            let inline = file
                .inline_images
                .input
                .clone()
                .unwrap_or_else(|| format!("{src}/images/inline/*"));
            vec![format!("{src}/scss/**/*"), inline]
        }
        _ => vec![input.clone()],
    });

    let after = raw
        .after
        .as_ref()
        .map(|deps| deps.iter().map(|d| canonical_task_name(d)).collect())
        .unwrap_or_else(|| match kind {
            AssetKind::Styles => vec![AssetKind::InlineImages.task_name().to_string()],
            _ => Vec::new(),
        });

    let options = match kind {
        AssetKind::Html => {
            let mut context = BTreeMap::new();
            if let Some(extra) = &raw.context {
                context.extend(extra.clone());
            }
            ClassOptions::Html { context }
        }
        AssetKind::Images => ClassOptions::Images {
            jpeg_quality: raw.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
        },
        AssetKind::InlineImages => ClassOptions::InlineImages {
            jpeg_quality: raw.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY),
            filename: raw.filename.clone().unwrap_or_else(|| "_datauri.scss".to_string()),
            namespace: raw.namespace.clone().unwrap_or_else(|| "img".to_string()),
        },
        AssetKind::Styles => ClassOptions::Styles {
            compiler: raw.compiler.clone().unwrap_or_else(|| {
                vec![
                    "sass".to_string(),
                    "--stdin".to_string(),
                    "--no-source-map".to_string(),
                    format!("--load-path={src}/scss"),
                ]
            }),
            image_path: raw.image_path.clone().unwrap_or_else(|| "../images/".to_string()),
            precision: raw.precision.unwrap_or(3),
            browsers: raw
                .browsers
                .clone()
                .unwrap_or_else(|| vec!["last 2 versions".to_string(), "> 2%".to_string()]),
        },
        AssetKind::Scripts => ClassOptions::Scripts {
            bundle: raw.filename.clone().unwrap_or_else(|| "main.js".to_string()),
        },
        AssetKind::Fonts => ClassOptions::Fonts,
    };

    AssetClass {
        kind,
        name: kind.task_name().to_string(),
        input,
        output,
        watch,
        after,
        extra_deps,
        options,
    }
}

fn reject_foreign_options(kind: AssetKind, raw: &RawClassSection) -> Result<()> {
    let present: [(&str, bool, &[AssetKind]); 8] = [
        ("context", raw.context.is_some(), &[AssetKind::Html]),
        (
            "jpeg_quality",
            raw.jpeg_quality.is_some(),
            &[AssetKind::Images, AssetKind::InlineImages],
        ),
        (
            "filename",
            raw.filename.is_some(),
            &[AssetKind::InlineImages, AssetKind::Scripts],
        ),
        ("namespace", raw.namespace.is_some(), &[AssetKind::InlineImages]),
        ("compiler", raw.compiler.is_some(), &[AssetKind::Styles]),
        ("image_path", raw.image_path.is_some(), &[AssetKind::Styles]),
        ("precision", raw.precision.is_some(), &[AssetKind::Styles]),
        ("browsers", raw.browsers.is_some(), &[AssetKind::Styles]),
    ];

    for (option, is_set, allowed) in present {
        if is_set && !allowed.contains(&kind) {
            return Err(AssetdagError::ConfigError(format!(
                "[{}] does not support option `{}`",
                kind.section_name(),
                option
            )));
        }
    }
    Ok(())
}

fn validate_classes(classes: &[AssetClass]) -> Result<()> {
    for class in classes {
        let section = class.kind.section_name();

        let mut globs = vec![&class.input];
        globs.extend(class.watch.iter());
        globs.extend(class.extra_deps.iter());
        for pattern in globs {
            compile(pattern).map_err(|e| {
                AssetdagError::ConfigError(format!("[{section}] {e:#}"))
            })?;
        }

        if class.output.is_empty() {
            return Err(AssetdagError::ConfigError(format!(
                "[{section}].output must not be empty"
            )));
        }

        match &class.options {
            ClassOptions::Images { jpeg_quality } => check_quality(section, *jpeg_quality)?,
            ClassOptions::InlineImages {
                jpeg_quality,
                filename,
                namespace,
            } => {
                check_quality(section, *jpeg_quality)?;
                check_file_name(section, "filename", filename)?;
                if namespace.trim().is_empty() {
                    return Err(AssetdagError::ConfigError(format!(
                        "[{section}].namespace must not be empty"
                    )));
                }
            }
            ClassOptions::Styles {
                compiler,
                precision,
                ..
            } => {
                if compiler.is_empty() || compiler[0].trim().is_empty() {
                    return Err(AssetdagError::ConfigError(format!(
                        "[{section}].compiler must name a program"
                    )));
                }
                if *precision > MAX_PRECISION {
                    return Err(AssetdagError::ConfigError(format!(
                        "[{section}].precision must be <= {MAX_PRECISION} (got {precision})"
                    )));
                }
            }
            ClassOptions::Scripts { bundle } => check_file_name(section, "filename", bundle)?,
            ClassOptions::Html { .. } | ClassOptions::Fonts => {}
        }
    }
    Ok(())
}

fn check_quality(section: &str, quality: u8) -> Result<()> {
    if quality == 0 || quality > 100 {
        return Err(AssetdagError::ConfigError(format!(
            "[{section}].jpeg_quality must be between 1 and 100 (got {quality})"
        )));
    }
    Ok(())
}

fn check_file_name(section: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() || value.contains('/') || value.contains('\\') {
        return Err(AssetdagError::ConfigError(format!(
            "[{section}].{field} must be a plain file name (got {value:?})"
        )));
    }
    Ok(())
}

fn known_tasks(classes: &[AssetClass]) -> BTreeSet<&str> {
    let mut names: BTreeSet<&str> = classes.iter().map(|c| c.name.as_str()).collect();
    names.insert(CLEAN_TASK);
    names
}

fn validate_default_tasks(default_tasks: &[TaskName], classes: &[AssetClass]) -> Result<()> {
    if default_tasks.is_empty() {
        return Err(AssetdagError::ConfigError(
            "[default].tasks must name at least one task".to_string(),
        ));
    }
    for task in default_tasks {
        if !classes.iter().any(|c| &c.name == task) {
            return Err(AssetdagError::ConfigError(format!(
                "[default].tasks has unknown task '{}'",
                task
            )));
        }
    }
    Ok(())
}

fn validate_task_dependencies(classes: &[AssetClass]) -> Result<()> {
    let known = known_tasks(classes);
    for class in classes {
        for dep in class.after.iter() {
            if !known.contains(dep.as_str()) {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    class.name, dep
                )));
            }
            if dep == &class.name {
                return Err(AssetdagError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    class.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(classes: &[AssetClass], default_tasks: &[TaskName]) -> Result<()> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    graph.add_node(CLEAN_TASK);
    graph.add_node(DEFAULT_TASK);
    for class in classes {
        graph.add_node(class.name.as_str());
    }
    for class in classes {
        for dep in class.after.iter() {
            graph.add_edge(dep.as_str(), class.name.as_str(), ());
        }
    }
    for task in default_tasks {
        graph.add_edge(task.as_str(), DEFAULT_TASK, ());
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(AssetdagError::DagCycle(format!(
            "cycle detected in task DAG involving task '{}'",
            cycle.node_id()
        ))),
    }
}

/// No input tree may sit inside an output directory, and no class may write
/// into its own input tree.
fn validate_disjoint_trees(classes: &[AssetClass]) -> Result<()> {
    for reader in classes {
        let input_base = normalize(&glob_base(&reader.input));
        for writer in classes {
            let output = normalize(Path::new(&writer.output));
            if input_base.starts_with(&output) {
                return Err(AssetdagError::ConfigError(format!(
                    "input of [{}] ({}) lies inside the output of [{}] ({})",
                    reader.kind.section_name(),
                    reader.input,
                    writer.kind.section_name(),
                    writer.output
                )));
            }
        }

        let own_output = normalize(Path::new(&reader.output));
        if own_output.starts_with(&input_base) {
            return Err(AssetdagError::ConfigError(format!(
                "[{}] writes into its own input tree ({} -> {})",
                reader.kind.section_name(),
                reader.input,
                reader.output
            )));
        }
    }
    Ok(())
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styles_with(raw: RawClassSection) -> RawConfigFile {
        RawConfigFile {
            styles: raw,
            ..RawConfigFile::default()
        }
    }

    #[test]
    fn empty_config_resolves_the_default_layout() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        let sass = cfg.class(AssetKind::Styles).unwrap();
        assert_eq!(sass.input, "src/scss/main.scss");
        assert_eq!(sass.output, "build/css");
        assert_eq!(sass.after, vec!["imguri".to_string()]);
        assert_eq!(
            sass.watch,
            vec!["src/scss/**/*".to_string(), "src/images/inline/*".to_string()]
        );
        assert_eq!(cfg.default_tasks(), ["html", "images", "fonts", "sass", "js"]);
        let fonts = cfg.class(AssetKind::Fonts).unwrap();
        assert_eq!(fonts.output, "build/css/fonts");
    }

    #[test]
    fn source_and_dest_move_every_default_path() {
        let raw = RawConfigFile {
            project: crate::config::model::ProjectSection {
                source: Some("assets/".into()),
                dest: Some("public".into()),
                ..Default::default()
            },
            ..RawConfigFile::default()
        };
        let cfg = ConfigFile::try_from(raw).unwrap();
        let js = cfg.class(AssetKind::Scripts).unwrap();
        assert_eq!(js.input, "assets/js/**/*");
        assert_eq!(js.output, "public/js");
    }

    #[test]
    fn aliases_in_default_tasks_are_canonicalised() {
        let raw = RawConfigFile {
            default: crate::config::model::DefaultSection {
                tasks: Some(vec!["styles".into(), "scripts".into()]),
            },
            ..RawConfigFile::default()
        };
        let cfg = ConfigFile::try_from(raw).unwrap();
        assert_eq!(cfg.default_tasks(), ["sass", "js"]);
    }

    #[test]
    fn option_on_wrong_section_is_rejected() {
        let raw = RawConfigFile {
            fonts: RawClassSection {
                precision: Some(2),
                ..Default::default()
            },
            ..RawConfigFile::default()
        };
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("precision")));
    }

    #[test]
    fn output_inside_own_recursive_input_is_rejected() {
        let raw = RawConfigFile {
            scripts: RawClassSection {
                output: Some("src/js/out".into()),
                ..Default::default()
            },
            ..RawConfigFile::default()
        };
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("own input")));
    }

    #[test]
    fn input_inside_an_output_is_rejected() {
        let raw = RawConfigFile {
            fonts: RawClassSection {
                input: Some("build/fonts/*.*".into()),
                ..Default::default()
            },
            ..RawConfigFile::default()
        };
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("inside the output")));
    }

    #[test]
    fn precision_out_of_range_is_rejected() {
        let raw = styles_with(RawClassSection {
            precision: Some(42),
            ..Default::default()
        });
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let raw = styles_with(RawClassSection {
            watch: Some(vec!["src/scss/[".into()]),
            ..Default::default()
        });
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("invalid glob")));
    }

    #[test]
    fn self_dependency_is_rejected() {
        let raw = styles_with(RawClassSection {
            after: Some(vec!["styles".into()]),
            ..Default::default()
        });
        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, AssetdagError::ConfigError(msg) if msg.contains("itself")));
    }
}
