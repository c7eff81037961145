//! JSON page fixtures and event scripts

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use veil_core::{Element, FilterKind, HostSignal, VirtualDom};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, FixtureError> {
    let text = fs::read_to_string(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| FixtureError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// Page fixtures
// =============================================================================

/// One element of a page fixture.
///
/// ```json
/// { "tag": "div", "attrs": { "data-test": "search-result" },
///   "children": [ { "tag": "h3", "text": "Tatort" } ] }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

impl From<ElementSpec> for Element {
    fn from(spec: ElementSpec) -> Self {
        let mut element = Element::new(&spec.tag).text(&spec.text);
        for (name, value) in &spec.attrs {
            element = element.attr(name, value);
        }
        if let Some(class) = &spec.class {
            element = element.class(class);
        }
        spec.children
            .into_iter()
            .fold(element, |element, child| element.child(child.into()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageFixture {
    /// Preset the page was captured for, if the fixture names one
    #[serde(default)]
    pub preset: Option<String>,
    pub elements: Vec<ElementSpec>,
}

impl PageFixture {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        read_json(path)
    }

    /// Build a tree with every element appended under the root, then drop
    /// the construction records.
    pub fn to_dom(&self) -> VirtualDom {
        use veil_core::ChangeFeed;

        let mut dom = VirtualDom::new();
        let root = dom.root();
        for spec in &self.elements {
            dom.append(root, spec.clone().into());
        }
        dom.take_records();
        dom
    }
}

// =============================================================================
// Event scripts
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Append an element under the root
    Append { element: ElementSpec },
    /// Remove the n-th current candidate
    Remove { index: usize },
    Signal { signal: HostSignal },
    Edit { kind: FilterKind, text: String },
    QuickAdd { value: String },
    Apply,
    Reset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEvent {
    /// Milliseconds after the script starts
    pub at: u64,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventScript {
    pub events: Vec<ScriptEvent>,
}

impl EventScript {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let mut script: Self = read_json(path)?;
        script.events.sort_by_key(|event| event.at);
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::{CandidateShape, Tree};

    #[test]
    fn test_fixture_builds_tree() {
        let fixture: PageFixture = serde_json::from_str(
            r#"{
                "preset": "search",
                "elements": [
                    { "tag": "div", "attrs": { "data-test": "search-result" },
                      "children": [
                        { "tag": "h3", "text": "Spielfilm: Heat" },
                        { "tag": "p", "text": "18.12.2025 | arte" }
                      ] },
                    { "tag": "div", "class": "ad" }
                ]
            }"#,
        )
        .unwrap();

        let dom = fixture.to_dom();
        let shape = CandidateShape::any().with_attr("data-test", "search-result");
        let nodes = dom.candidates(&shape);
        assert_eq!(nodes.len(), 1);
        assert_eq!(dom.text(nodes[0]), "Spielfilm: Heat18.12.2025 | arte");
        assert_eq!(dom.pending_records(), 0);
    }

    #[test]
    fn test_script_actions() {
        let script: EventScript = serde_json::from_str(
            r#"{ "events": [
                { "at": 20, "type": "signal", "signal": "history-push" },
                { "at": 0, "type": "edit", "kind": "channel", "text": "ZDF" },
                { "at": 30, "type": "remove", "index": 0 },
                { "at": 40, "type": "apply" }
            ] }"#,
        )
        .unwrap();

        assert!(matches!(
            script.events[0].action,
            Action::Signal { signal: HostSignal::HistoryPush }
        ));
        assert!(matches!(
            &script.events[1].action,
            Action::Edit { kind: FilterKind::Channel, text } if text == "ZDF"
        ));
        assert!(matches!(script.events[3].action, Action::Apply));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = PageFixture::load(Path::new("/nonexistent/page.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/page.json"));
    }
}
