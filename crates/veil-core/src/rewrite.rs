//! Idempotent link rewriting
//!
//! Rewrites anchor hrefs in place: paths with a known replacement get the
//! replacement URL, other paths under the configured prefixes get a fragment
//! appended. Rewritten hrefs are stable under a second pass.

use std::collections::BTreeMap;

use crate::tree::{CandidateShape, MutationRecord, NodeId, Tree};
use crate::url::{extract_fragment, extract_host, extract_path};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkRewriter {
    mappings: BTreeMap<String, String>,
    prefixes: Vec<String>,
    /// Hosts absolute hrefs must point at; empty accepts any host
    hosts: Vec<String>,
    fragment: String,
}

impl LinkRewriter {
    pub fn new(fragment: &str) -> Self {
        Self {
            mappings: BTreeMap::new(),
            prefixes: Vec::new(),
            hosts: Vec::new(),
            fragment: fragment.trim_start_matches('#').to_string(),
        }
    }

    pub fn with_mapping(mut self, path: &str, url: &str) -> Self {
        self.mappings.insert(path.to_string(), url.to_string());
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefixes.push(prefix.to_string());
        self
    }

    /// Only rewrite absolute hrefs on `host` or its subdomains.
    pub fn with_host(mut self, host: &str) -> Self {
        self.hosts.push(host.to_ascii_lowercase());
        self
    }

    /// Rewriter for broadcaster overview links: known channels go to their
    /// "everything from" collection, the rest jump to the `#alles` tab.
    pub fn mediatheken() -> Self {
        const COLLECTIONS: [(&str, &str); 7] = [
            ("/mediatheken/sat1", "https://www.joyn.de/collection/alles-von-sat.1?id=976975%3A3790ddef147824b00c4d162b1921d175"),
            ("/mediatheken/prosieben", "https://www.joyn.de/collection/alles-von-prosieben?id=976976%3Aa0152b86ec7d07f4057689c522b45ac5"),
            ("/mediatheken/kabel-eins", "https://www.joyn.de/collection/alles-von-kabel-eins?id=976609%3Ab2be3a74f0cc1edb6d9a4509f0808781"),
            ("/mediatheken/sixx", "https://www.joyn.de/collection/alles-von-sixx?id=960511%3A8dcf2ada87fc14d1a57bd7f7983d210e"),
            ("/mediatheken/sat1-gold", "https://www.joyn.de/collection/alles-von-sat.1-gold?id=946773%3Ad34c2da4a68d2076588dc78b22414d37"),
            ("/mediatheken/prosieben-maxx", "https://www.joyn.de/collection/alles-von-prosieben-maxx?id=946696%3A760d9f081d8e9e872e5ab9051b9f2b1b"),
            ("/mediatheken/kabel-eins-doku", "https://www.joyn.de/collection/alles-von-kabel-eins-doku?id=944507%3Af134730948761944680d33cf85afd0f7"),
        ];

        COLLECTIONS
            .iter()
            .fold(Self::new("alles"), |rewriter, (path, url)| rewriter.with_mapping(path, url))
            .with_prefix("/mediatheken/")
            .with_prefix("/channels/")
            .with_host("joyn.de")
    }

    fn is_relevant(&self, href: &str) -> bool {
        self.prefixes.iter().any(|prefix| href.contains(prefix.as_str()))
    }

    /// Root-relative hrefs stay on the page's own host and always pass.
    fn accepts_host(&self, href: &str) -> bool {
        let Some(host) = extract_host(href) else {
            return true;
        };
        let host = host.to_ascii_lowercase();
        self.hosts.is_empty()
            || self.hosts.iter().any(|allowed| {
                host == *allowed
                    || host
                        .strip_suffix(allowed.as_str())
                        .map_or(false, |sub| sub.ends_with('.'))
            })
    }

    /// New href for `href`, or `None` if it should stay as is.
    pub fn rewrite_href(&self, href: &str) -> Option<String> {
        if !self.is_relevant(href) || !self.accepts_host(href) {
            return None;
        }
        let path = extract_path(href)?;

        if let Some(mapped) = self.mappings.get(path) {
            return (href != mapped).then(|| mapped.clone());
        }

        if !self.prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return None;
        }

        if self.fragment.is_empty() || extract_fragment(href).map_or(false, |f| !f.is_empty()) {
            return None;
        }

        let base = href.strip_suffix('#').unwrap_or(href);
        Some(format!("{}#{}", base, self.fragment))
    }

    /// Rewrite every anchor under `root`, including `root` itself.
    /// Returns the number of hrefs changed.
    pub fn apply<T: Tree + ?Sized>(&self, tree: &mut T, root: NodeId) -> usize {
        let shape = CandidateShape::tag("a").with_attr_present("href");
        let mut anchors = Vec::new();
        if tree.matches(root, &shape) {
            anchors.push(root);
        }
        anchors.extend(tree.query_all(root, &shape));

        let mut changed = 0;
        for anchor in anchors {
            let Some(href) = tree.attribute(anchor, "href") else {
                continue;
            };
            if let Some(next) = self.rewrite_href(&href) {
                if tree.set_attribute(anchor, "href", &next) {
                    changed += 1;
                }
            }
        }
        changed
    }

    /// Rewrite anchors inside the subtrees added by `records`.
    pub fn apply_added<T: Tree + ?Sized>(&self, tree: &mut T, records: &[MutationRecord]) -> usize {
        let mut changed = 0;
        for record in records {
            if let MutationRecord::ChildList { added, .. } = record {
                for &node in added {
                    if tree.contains(node) {
                        changed += self.apply(tree, node);
                    }
                }
            }
        }
        changed
    }
}
