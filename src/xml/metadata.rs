// metadata.rs -- Metadata XML parsing

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::exception::MetadataError;
use crate::xml::tree::{Element, ParseLimits, TreeError};

lazy_static! {
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// One `<longdescription>` block
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Description {
    pub text: Option<String>,
    pub lang: Option<String>,
}

/// One maintainer, either of the package or of an upstream project.
///
/// Every element nested inside `<maintainer>` becomes a field named after
/// its tag, so schema additions such as `<nick>` are kept and reachable
/// through [`Maintainer::get`]. A tag that appears twice keeps its last value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Maintainer {
    fields: Vec<(String, Option<String>)>,
}

impl Maintainer {
    fn from_node(node: &Element) -> Self {
        let mut maintainer = Maintainer {
            fields: vec![
                ("email".to_string(), None),
                ("name".to_string(), None),
                ("description".to_string(), None),
                ("restrict".to_string(), None),
                ("status".to_string(), None),
            ],
        };
        maintainer.set("restrict", node.get("restrict").map(str::to_string));
        maintainer.set("status", node.get("status").map(str::to_string));

        for child in node.descendants() {
            maintainer.set(&child.tag, child.text.clone());
        }
        maintainer
    }

    fn set(&mut self, field: &str, value: Option<String>) {
        match self.fields.iter_mut().find(|(key, _)| key == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    /// Value of any field by name
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == field)
            .and_then(|(_, value)| value.as_deref())
    }

    /// All fields in the order they were first seen
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    pub fn email(&self) -> Option<&str> {
        self.get("email")
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    /// What the maintainer does for the package. Gentoo maintainers only.
    pub fn description(&self) -> Option<&str> {
        self.get("description")
    }

    /// Version range this maintainer applies to, e.g. `>=sys-apps/portage-2.2`
    pub fn restrict(&self) -> Option<&str> {
        self.get("restrict")
    }

    /// `active` or `inactive`. Upstream maintainers only.
    pub fn status(&self) -> Option<&str> {
        self.get("status")
    }
}

impl fmt::Display for Maintainer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.email(), self.name()) {
            (Some(email), Some(name)) => write!(f, "{} ({})", email, name),
            (Some(email), None) => write!(f, "{}", email),
            (None, Some(name)) => write!(f, "{}", name),
            (None, None) => write!(f, "<unknown>"),
        }
    }
}

impl Serialize for Maintainer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// One USE flag declared under `<use>`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Useflag {
    pub name: String,
    pub restrict: Option<String>,
    pub description: String,
}

impl Useflag {
    fn from_node(node: &Element) -> Self {
        let mut desc = node.text.clone().unwrap_or_default();

        // Markup such as <pkg> is flattened into its text; a chunk already
        // present in the description is not appended again.
        for child in node.descendants() {
            for chunk in [child.text.as_deref(), child.tail.as_deref()].into_iter().flatten() {
                if !desc.contains(chunk) {
                    desc.push_str(chunk);
                }
            }
        }

        Useflag {
            name: node.get("name").unwrap_or_default().to_string(),
            restrict: node.get("restrict").map(str::to_string),
            description: WHITESPACE_RE.replace_all(&desc, " ").into_owned(),
        }
    }
}

impl fmt::Display for Useflag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.description.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UpstreamDoc {
    pub url: String,
    pub lang: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RemoteId {
    pub id: String,
    pub site: Option<String>,
}

/// Contact details for the upstream project, from one `<upstream>` block
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Upstream {
    pub maintainers: Vec<Maintainer>,
    pub changelogs: Vec<String>,
    pub docs: Vec<UpstreamDoc>,
    /// URLs, or addresses prefixed with `mailto:`
    pub bugtrackers: Vec<String>,
    pub remoteids: Vec<RemoteId>,
}

impl Upstream {
    fn from_node(node: &Element) -> Self {
        Upstream {
            maintainers: node.find_all("maintainer").map(Maintainer::from_node).collect(),
            changelogs: node.find_all("changelog").map(text_of).collect(),
            docs: node
                .find_all("doc")
                .map(|e| UpstreamDoc {
                    url: text_of(e),
                    lang: e.get("lang").map(str::to_string),
                })
                .collect(),
            bugtrackers: node.find_all("bugs-to").map(text_of).collect(),
            remoteids: node
                .find_all("remote-id")
                .map(|e| RemoteId {
                    id: text_of(e),
                    site: e.get("type").map(str::to_string),
                })
                .collect(),
        }
    }
}

fn text_of(element: &Element) -> String {
    element.text.clone().unwrap_or_default()
}

/// A parsed metadata.xml file.
///
/// The file is read and parsed once, in [`MetaDataXML::new`]. Each accessor
/// builds its result on first use and returns the same cached value from then
/// on; the file is never consulted again.
#[derive(Debug)]
pub struct MetaDataXML {
    pub metadata_xml_path: PathBuf,
    root: Element,
    descriptions: OnceLock<Vec<Description>>,
    maintainers: OnceLock<Vec<Maintainer>>,
    use_flags: OnceLock<Vec<Useflag>>,
    upstream: OnceLock<Vec<Upstream>>,
}

impl MetaDataXML {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, MetadataError> {
        Self::with_limits(path, ParseLimits::default())
    }

    pub fn with_limits<P: AsRef<Path>>(path: P, limits: ParseLimits) -> Result<Self, MetadataError> {
        let path = path.as_ref().to_path_buf();

        let size = fs::metadata(&path)
            .map_err(|e| MetadataError::Read {
                path: path.clone(),
                source: e,
            })?
            .len();
        if size > limits.max_bytes {
            return Err(MetadataError::LimitExceeded {
                path,
                reason: format!("file is {} bytes, limit is {}", size, limits.max_bytes),
            });
        }

        let bytes = fs::read(&path).map_err(|e| MetadataError::Read {
            path: path.clone(),
            source: e,
        })?;
        let content = String::from_utf8(bytes).map_err(|e| MetadataError::Malformed {
            path: path.clone(),
            reason: format!("not valid UTF-8: {}", e),
        })?;

        let root = Element::parse(&content, &limits).map_err(|e| match e {
            TreeError::Malformed(reason) => MetadataError::Malformed {
                path: path.clone(),
                reason,
            },
            TreeError::LimitExceeded(reason) => MetadataError::LimitExceeded {
                path: path.clone(),
                reason,
            },
        })?;
        debug!("parsed {} (root <{}>)", path.display(), root.tag);

        Ok(MetaDataXML {
            metadata_xml_path: path,
            root,
            descriptions: OnceLock::new(),
            maintainers: OnceLock::new(),
            use_flags: OnceLock::new(),
            upstream: OnceLock::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.metadata_xml_path
    }

    /// Text of each top-level `<longdescription>`, in document order.
    ///
    /// The `lang` attribute is recorded but not used for selection.
    pub fn descriptions(&self) -> &[Description] {
        self.descriptions.get_or_init(|| {
            let descriptions: Vec<Description> = self
                .root
                .find_all("longdescription")
                .map(|e| Description {
                    text: e.text.clone(),
                    lang: e.get("lang").map(str::to_string),
                })
                .collect();
            debug!("{}: {} descriptions", self.metadata_xml_path.display(), descriptions.len());
            descriptions
        })
    }

    /// Package maintainers in document order. Upstream maintainers are not included.
    pub fn maintainers(&self) -> &[Maintainer] {
        self.maintainers.get_or_init(|| {
            let maintainers: Vec<Maintainer> = self
                .root
                .find_all("maintainer")
                .map(Maintainer::from_node)
                .collect();
            debug!("{}: {} maintainers", self.metadata_xml_path.display(), maintainers.len());
            maintainers
        })
    }

    /// Every `<flag>` in the document, in depth-first document order
    pub fn use_flags(&self) -> &[Useflag] {
        self.use_flags.get_or_init(|| {
            let flags: Vec<Useflag> = self.root.iter_tag("flag").map(Useflag::from_node).collect();
            debug!("{}: {} USE flags", self.metadata_xml_path.display(), flags.len());
            flags
        })
    }

    pub fn upstream(&self) -> &[Upstream] {
        self.upstream.get_or_init(|| {
            let upstream: Vec<Upstream> = self.root.find_all("upstream").map(Upstream::from_node).collect();
            debug!("{}: {} upstream blocks", self.metadata_xml_path.display(), upstream.len());
            upstream
        })
    }
}

impl fmt::Display for MetaDataXML {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<MetaDataXML {:?}>", self.metadata_xml_path.display().to_string())
    }
}
