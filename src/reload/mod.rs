// src/reload/mod.rs

//! Live-reload notifications.
//!
//! After an HTML, stylesheet or script rebuild that wrote something, every
//! connected browser gets one JSON message:
//!
//! - `{"command":"reload"}` for HTML and scripts
//! - `{"command":"inject","paths":["css/main.css"]}` for stylesheets, which
//!   swaps the stylesheet in place
//!
//! Nothing is queued for clients that connect later.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::model::ConfigFile;
use crate::engine::{TaskName, TaskReport};
use crate::fs::glob::to_match_str;
use crate::types::AssetKind;

pub mod server;

pub use server::ReloadHub;

/// Wire message sent to reload clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum ReloadMessage {
    Reload,
    Inject { paths: Vec<String> },
}

impl ReloadMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"command":"reload"}"#.to_string())
    }
}

/// How a class's rebuild is surfaced in the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStyle {
    FullReload,
    Inject,
}

/// Reload style per asset kind. Images, fonts and inline images are silent.
pub fn reload_style(kind: AssetKind) -> Option<ReloadStyle> {
    match kind {
        AssetKind::Html | AssetKind::Scripts => Some(ReloadStyle::FullReload),
        AssetKind::Styles => Some(ReloadStyle::Inject),
        AssetKind::Images | AssetKind::InlineImages | AssetKind::Fonts => None,
    }
}

/// Decides which completed tasks notify, and with what.
#[derive(Debug, Clone)]
pub struct ReloadPolicy {
    dest: PathBuf,
    styles: BTreeMap<TaskName, ReloadStyle>,
}

impl ReloadPolicy {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            styles: BTreeMap::new(),
        }
    }

    pub fn with_task(mut self, task: impl Into<TaskName>, style: ReloadStyle) -> Self {
        self.styles.insert(task.into(), style);
        self
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        cfg.classes()
            .iter()
            .fold(Self::new(cfg.project.dest_dir()), |policy, class| {
                match reload_style(class.kind) {
                    Some(style) => policy.with_task(class.name.clone(), style),
                    None => policy,
                }
            })
    }

    /// Message for a successful run of `task`, if any.
    pub fn message_for(&self, task: &str, report: &TaskReport) -> Option<ReloadMessage> {
        let style = self.styles.get(task)?;
        let served: Vec<String> = report
            .written
            .iter()
            .filter_map(|p| p.strip_prefix(&self.dest).ok())
            .map(to_match_str)
            .collect();

        match style {
            _ if served.is_empty() => None,
            ReloadStyle::FullReload => Some(ReloadMessage::Reload),
            ReloadStyle::Inject => {
                let paths: Vec<String> = served
                    .into_iter()
                    .filter(|p| Path::new(p).extension().is_some_and(|e| e == "css"))
                    .collect();
                (!paths.is_empty()).then_some(ReloadMessage::Inject { paths })
            }
        }
    }
}

/// Where reload messages go.
pub trait ReloadSink: Send + Sync {
    fn notify(&self, message: &ReloadMessage);
}

/// Sink used when live reload is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReload;

impl ReloadSink for NoReload {
    fn notify(&self, _message: &ReloadMessage) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_serialise_to_the_client_protocol() {
        assert_eq!(ReloadMessage::Reload.to_json(), r#"{"command":"reload"}"#);
        assert_eq!(
            ReloadMessage::Inject {
                paths: vec!["css/main.css".into()]
            }
            .to_json(),
            r#"{"command":"inject","paths":["css/main.css"]}"#
        );
    }

    #[test]
    fn silent_classes_never_notify() {
        let policy = ReloadPolicy::new("/p/build").with_task("html", ReloadStyle::FullReload);
        let report = TaskReport {
            ran: vec!["images".into()],
            written: vec![PathBuf::from("/p/build/images/a.png")],
        };
        assert_eq!(policy.message_for("images", &report), None);
    }

    #[test]
    fn html_write_means_full_reload() {
        let policy = ReloadPolicy::new("/p/build").with_task("html", ReloadStyle::FullReload);
        let report = TaskReport {
            ran: vec!["html".into()],
            written: vec![PathBuf::from("/p/build/index.html")],
        };
        assert_eq!(policy.message_for("html", &report), Some(ReloadMessage::Reload));
    }
}
