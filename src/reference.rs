use std::fmt;

/// A handle to a stored document, identified by its slash-separated path.
///
/// Paths take the fully-qualified form
/// `projects/<project>/databases/<database>/documents/<collection>/<id>(/<collection>/<id>)*`,
/// or the relative form `<collection>/<id>(/<collection>/<id>)*`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    path: String,
}

impl DocumentRef {
    /// Wrap a document path. The path isn't checked until it's used.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// The full path, exactly as given.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The trailing identifier of the path.
    pub fn id(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    /// The segments after the `projects/<p>/databases/<d>/documents` prefix, if it is present.
    fn relative_segments(&self) -> Vec<&str> {
        let segments: Vec<&str> = self.path.trim_matches('/').split('/').collect();
        if segments.len() >= 5
            && segments[0] == "projects"
            && segments[2] == "databases"
            && segments[4] == "documents"
        {
            segments[5..].to_vec()
        } else {
            segments
        }
    }

    /// The document owning this document's collection, or `None` if the collection sits at the
    /// root of the database.
    pub fn parent_document(&self) -> Option<DocumentRef> {
        if self.relative_segments().len() <= 2 {
            return None;
        }
        let trimmed = self.path.trim_end_matches('/');
        let mut cut = trimmed.len();
        for _ in 0..2 {
            cut = trimmed[..cut].rfind('/')?;
        }
        Some(DocumentRef::new(&trimmed[..cut]))
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.path)
    }
}
