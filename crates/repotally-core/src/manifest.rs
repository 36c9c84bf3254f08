//! Release manifest reader.
//!
//! A manifest is a repo-tool XML file listing `<remote>`s and the
//! `<project>`s fetched from them. Remotes reached over `ssh://` are private;
//! projects on those remotes are the private repositories of the release.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use roxmltree::{Document, Node};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

const PRIVATE_SCHEME: &str = "ssh://";

/// Errors from reading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The file could not be read.
    #[error("unable to read manifest {path}: {source}")]
    Read {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not well-formed XML.
    #[error("invalid manifest {path}: {source}")]
    Parse {
        /// Manifest path.
        path: Utf8PathBuf,
        /// XML parser error.
        source: roxmltree::Error,
    },

    /// A required attribute is absent.
    #[error("manifest {path}: <{element}> at line {line} has no {attribute} attribute")]
    MissingAttribute {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Element name.
        element: String,
        /// Attribute name.
        attribute: &'static str,
        /// 1-based line of the element.
        line: u32,
    },
}

/// Result alias for manifest reads.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// A project fetched from a private remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivateRepo {
    /// Project name, also its key in the category map.
    pub name: String,
    /// Name of the private remote.
    pub remote: String,
    /// Browsable `https://` URL.
    pub url: String,
}

/// Read a manifest file and return its private repositories sorted by name.
#[instrument(skip_all, fields(path = %path))]
pub fn read_private_repos(path: &Utf8Path) -> ManifestResult<Vec<PrivateRepo>> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_private_repos(path, &text)
}

/// Parse manifest text; `path` is only used in diagnostics.
pub fn parse_private_repos(path: &Utf8Path, text: &str) -> ManifestResult<Vec<PrivateRepo>> {
    let doc = Document::parse(text).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    // remote name -> fetch base
    let mut private_remotes: BTreeMap<&str, &str> = BTreeMap::new();
    for remote in doc.descendants().filter(|n| n.has_tag_name("remote")) {
        let name = required(path, &doc, remote, "name")?;
        let fetch = remote.attribute("fetch").unwrap_or(name);
        if fetch.starts_with(PRIVATE_SCHEME) {
            private_remotes.insert(name, fetch);
        }
    }
    debug!(remotes = ?private_remotes.keys().collect::<Vec<_>>(), "private remotes");

    let default_remote = doc
        .descendants()
        .find(|n| n.has_tag_name("default"))
        .and_then(|n| n.attribute("remote"));

    let mut repos: BTreeMap<String, PrivateRepo> = BTreeMap::new();
    for project in doc.descendants().filter(|n| n.has_tag_name("project")) {
        let name = required(path, &doc, project, "name")?;
        let remote = project
            .attribute("remote")
            .or(default_remote)
            .unwrap_or(name);
        if let Some(fetch) = private_remotes.get(remote) {
            repos.insert(
                name.to_string(),
                PrivateRepo {
                    name: name.to_string(),
                    remote: remote.to_string(),
                    url: browse_url(fetch, name),
                },
            );
        }
    }

    debug!(private = repos.len(), "private repos found");
    Ok(repos.into_values().collect())
}

fn required<'a>(
    path: &Utf8Path,
    doc: &Document<'_>,
    node: Node<'a, '_>,
    attribute: &'static str,
) -> ManifestResult<&'a str> {
    node.attribute(attribute)
        .ok_or_else(|| ManifestError::MissingAttribute {
            path: path.to_path_buf(),
            element: node.tag_name().name().to_string(),
            attribute,
            line: doc.text_pos_at(node.range().start).row,
        })
}

/// Turn an `ssh://[user@]host[:port]/path` fetch base and a project name into
/// `https://host/path/name`.
pub fn browse_url(fetch: &str, project: &str) -> String {
    let rest = fetch.strip_prefix(PRIVATE_SCHEME).unwrap_or(fetch);
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split_once(':').map_or(host, |(host, _)| host);

    let path = path.trim_matches('/');
    if path.is_empty() {
        format!("https://{host}/{project}")
    } else {
        format!("https://{host}/{path}/{project}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest>
  <remote name="couchbase" fetch="https://github.com/couchbase/"/>
  <remote name="couchbase-priv" fetch="ssh://git@github.com/couchbase/"/>
  <remote name="blevesearch" fetch="https://github.com/blevesearch/"/>
  <default remote="couchbase" revision="master"/>

  <project name="voltron" remote="couchbase-priv" path="voltron"/>
  <project name="backup" remote="couchbase-priv"/>
  <project name="bleve" remote="blevesearch"/>
  <project name="couchbase-cli"/>
  <project name="cbas-core" remote="couchbase-priv"/>
</manifest>
"#;

    fn parse(text: &str) -> ManifestResult<Vec<PrivateRepo>> {
        parse_private_repos(Utf8Path::new("manifest.xml"), text)
    }

    #[test]
    fn private_repos_are_sorted_with_https_urls() {
        let repos = parse(MANIFEST).unwrap();
        let names: Vec<_> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["backup", "cbas-core", "voltron"]);
        assert_eq!(repos[0].url, "https://github.com/couchbase/backup");
        assert_eq!(repos[0].remote, "couchbase-priv");
    }

    #[test]
    fn default_remote_applies_to_bare_projects() {
        let text = r#"<manifest>
  <remote name="priv" fetch="ssh://git@github.com/couchbase/"/>
  <default remote="priv"/>
  <project name="eventing-ee"/>
</manifest>"#;
        let repos = parse(text).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].url, "https://github.com/couchbase/eventing-ee");
    }

    #[test]
    fn project_name_is_last_resort_remote() {
        // no default; the project shares its name with a private remote
        let text = r#"<manifest>
  <remote name="secret" fetch="ssh://git@example.com/secret/"/>
  <project name="secret"/>
  <project name="public"/>
</manifest>"#;
        let repos = parse(text).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "secret");
    }

    #[test]
    fn browse_url_strips_user_and_port() {
        assert_eq!(
            browse_url("ssh://git@github.com/couchbase/", "backup"),
            "https://github.com/couchbase/backup"
        );
        assert_eq!(
            browse_url("ssh://review.example.com:29418/", "tools"),
            "https://review.example.com/tools"
        );
    }

    #[test]
    fn malformed_xml_is_parse_error() {
        let err = parse("<manifest><remote").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
        assert!(err.to_string().contains("manifest.xml"));
    }

    #[test]
    fn project_without_name_is_rejected() {
        let err = parse("<manifest>\n<project remote=\"x\"/>\n</manifest>").unwrap_err();
        match err {
            ManifestError::MissingAttribute { element, line, .. } => {
                assert_eq!(element, "project");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = read_private_repos(Utf8Path::new("/nope/manifest.xml")).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }
}
