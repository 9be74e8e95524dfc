//! Slug discovery and dense slug ids.
//!
//! Workers never create ids: every slug must be known before partitioning.
//! [`SlugCatalog`] gets there in two passes. First it scans a bounded prefix
//! of the input in file order, then it appends every identifier reported by a
//! [`KnownIdentifiers`] collaborator that the sample did not contain. A slug
//! that lives only beyond the sample *and* is missing from the collaborator
//! surfaces later as [`Error::UnknownSlug`].

use crate::layout::RecordLayout;
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Dense identifier of a slug inside a [`SlugCatalog`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlugId(u32);

impl SlugId {
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Source of slugs that must be present in the catalog even when the input
/// sample does not contain them.
pub trait KnownIdentifiers {
    /// Returns slugs in the same representation the log uses, in a stable
    /// order.
    fn list_known_identifiers(&self) -> Result<Vec<String>>;
}

impl KnownIdentifiers for [String] {
    fn list_known_identifiers(&self) -> Result<Vec<String>> {
        Ok(self.to_vec())
    }
}

impl KnownIdentifiers for Vec<String> {
    fn list_known_identifiers(&self) -> Result<Vec<String>> {
        Ok(self.clone())
    }
}

impl KnownIdentifiers for [&str] {
    fn list_known_identifiers(&self) -> Result<Vec<String>> {
        Ok(self.iter().map(|s| (*s).to_owned()).collect())
    }
}

impl<T: KnownIdentifiers + ?Sized> KnownIdentifiers for &T {
    fn list_known_identifiers(&self) -> Result<Vec<String>> {
        (**self).list_known_identifiers()
    }
}

/// Collaborator that knows nothing; the sample alone defines the catalog.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoKnownIdentifiers;

impl KnownIdentifiers for NoKnownIdentifiers {
    fn list_known_identifiers(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Text file of full resource URIs, one per line.
///
/// Each URI carries the same fixed prefix as a log record, which is stripped
/// to obtain the slug.
#[derive(Clone, Debug)]
pub struct UriListFile {
    path: PathBuf,
    strip_prefix_len: usize,
}

impl UriListFile {
    pub fn new(path: impl Into<PathBuf>, strip_prefix_len: usize) -> Self {
        Self {
            path: path.into(),
            strip_prefix_len,
        }
    }
}

impl KnownIdentifiers for UriListFile {
    fn list_known_identifiers(&self) -> Result<Vec<String>> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::io(format!("reading {}", self.path.display()), e))?;

        let mut slugs = Vec::new();
        for (n, line) in raw.lines().enumerate() {
            let uri = line.trim_end_matches('\r');
            if uri.trim().is_empty() {
                continue;
            }
            let slug = uri.get(self.strip_prefix_len..).filter(|s| !s.is_empty());
            match slug {
                Some(slug) => slugs.push(slug.to_owned()),
                None => {
                    return Err(Error::config(format!(
                        "{}:{}: URI {uri:?} is not longer than the {}-byte prefix",
                        self.path.display(),
                        n + 1,
                        self.strip_prefix_len
                    )));
                }
            }
        }
        Ok(slugs)
    }
}

/// Immutable `slug <-> id` tables shared by every worker.
#[derive(Clone, Debug, Default)]
pub struct SlugCatalog {
    ids: FxHashMap<Box<[u8]>, SlugId>,
    slugs: Vec<String>,
}

impl SlugCatalog {
    /// Assigns ids to the slugs in `sample`, then to unseen `known` slugs.
    ///
    /// `sample` must start at a line boundary. A trailing line without `\n`
    /// is ignored since the sample cap may have cut it.
    pub fn build(sample: &[u8], layout: &RecordLayout, known: &[String]) -> Result<Self> {
        Self::from_sample(sample, false, layout, known)
    }

    /// Like [`build`](Self::build), but `input` is the entire file, so a
    /// trailing line without `\n` is a real record and its slug is assigned
    /// an id when the line frames.
    pub fn build_whole(input: &[u8], layout: &RecordLayout, known: &[String]) -> Result<Self> {
        Self::from_sample(input, true, layout, known)
    }

    fn from_sample(
        sample: &[u8],
        reaches_eof: bool,
        layout: &RecordLayout,
        known: &[String],
    ) -> Result<Self> {
        let mut catalog = Self::default();

        let complete = match memchr::memrchr(b'\n', sample) {
            Some(last) => &sample[..=last],
            None => &[][..],
        };

        let mut pos = 0;
        for line in complete.split_inclusive(|&b| b == b'\n') {
            let offset = pos as u64;
            pos += line.len();
            let line = &line[..line.len() - 1];
            let slug = layout.extract_slug(line).map_err(|e| e.at(offset))?;
            if catalog.ids.contains_key(slug) {
                continue;
            }
            let slug = core::str::from_utf8(slug).map_err(|_| Error::MalformedRecord {
                offset,
                reason: "slug is not valid UTF-8",
            })?;
            catalog.insert(slug)?;
        }

        // An unframeable tail is left for the worker to report.
        let tail = &sample[complete.len()..];
        if reaches_eof && !tail.is_empty() {
            let slug = layout
                .extract_slug(tail)
                .ok()
                .and_then(|slug| core::str::from_utf8(slug).ok())
                .filter(|slug| !catalog.ids.contains_key(slug.as_bytes()));
            if let Some(slug) = slug {
                catalog.insert(slug)?;
            }
        }

        #[cfg(feature = "tracing")]
        let sampled = catalog.len();

        for slug in known {
            if !catalog.ids.contains_key(slug.as_bytes()) {
                catalog.insert(slug)?;
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Catalog holds {} slugs ({} from sample, {} from known identifiers)",
            catalog.len(),
            sampled,
            catalog.len() - sampled
        );

        Ok(catalog)
    }

    /// Reads up to `sample_cap` bytes from the start of `path` and builds the
    /// catalog from them plus `known`.
    pub fn discover(
        path: &Path,
        sample_cap: u64,
        layout: &RecordLayout,
        known: &[String],
    ) -> Result<Self> {
        let file =
            File::open(path).map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
        let file_size = file
            .metadata()
            .map_err(|e| Error::io(format!("stat {}", path.display()), e))?
            .len();
        let mut sample = Vec::new();
        file.take(sample_cap)
            .read_to_end(&mut sample)
            .map_err(|e| Error::io(format!("sampling {}", path.display()), e))?;
        Self::from_sample(&sample, sample.len() as u64 >= file_size, layout, known)
    }

    fn insert(&mut self, slug: &str) -> Result<SlugId> {
        let raw = u32::try_from(self.slugs.len())
            .map_err(|_| Error::config("slug count exceeds the u32 id space"))?;
        let id = SlugId(raw);
        self.ids.insert(Box::from(slug.as_bytes()), id);
        self.slugs.push(slug.to_owned());
        Ok(id)
    }

    #[inline]
    pub fn id_of(&self, slug: &[u8]) -> Option<SlugId> {
        self.ids.get(slug).copied()
    }

    /// # Panics
    ///
    /// Panics if `id` was not produced by this catalog.
    pub fn slug(&self, id: SlugId) -> &str {
        &self.slugs[id.index()]
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }

    /// Slugs in id (discovery) order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (SlugId, &str)> {
        self.slugs
            .iter()
            .enumerate()
            .map(|(raw, slug)| (SlugId(raw as u32), slug.as_str()))
    }
}
