use serde::{Deserialize, Deserializer};

/// Page size used when walking every page of a listing.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Cursor and filters for one page of a listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOpt {
    /// Page-size hint sent as `size`.
    pub size: usize,
    /// Opaque continuation token sent as `offset`.
    pub offset: Option<String>,
    /// Tags the listed entities must carry.
    pub tags: Vec<String>,
    /// Requires every tag to match instead of any.
    pub match_all_tags: bool,
}

impl Default for ListOpt {
    fn default() -> Self {
        Self::with_size(DEFAULT_PAGE_SIZE)
    }
}

impl ListOpt {
    /// Creates a first-page cursor with the given page size.
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            offset: None,
            tags: Vec::new(),
            match_all_tags: false,
        }
    }

    /// Returns the query pairs for this cursor.
    ///
    /// Tags are joined with `,` when all must match and with `/` otherwise.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(3);
        if self.size > 0 {
            pairs.push(("size".to_owned(), self.size.to_string()));
        }
        if let Some(offset) = self.offset.as_deref().filter(|offset| !offset.is_empty()) {
            pairs.push(("offset".to_owned(), offset.to_owned()));
        }
        if !self.tags.is_empty() {
            let separator = if self.match_all_tags { "," } else { "/" };
            pairs.push(("tags".to_owned(), self.tags.join(separator)));
        }
        pairs
    }

    /// Returns the cursor for the page after the current one.
    #[must_use]
    pub fn advance(&self, offset: String) -> Self {
        Self {
            offset: Some(offset),
            ..self.clone()
        }
    }
}

/// Decodes a list that the service may send as `null`.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// One page of a listing response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListPage<T> {
    /// Entities on this page.
    #[serde(default = "Vec::new", deserialize_with = "null_as_empty")]
    pub data: Vec<T>,
    /// Relative URL of the next page.
    #[serde(default)]
    pub next: Option<String>,
    /// Continuation token for the next page.
    #[serde(default)]
    pub offset: Option<String>,
}

impl<T> ListPage<T> {
    /// Splits the page into its entities and the cursor for the next page.
    #[must_use]
    pub fn into_parts(self, current: &ListOpt) -> (Vec<T>, Option<ListOpt>) {
        let next = self
            .offset
            .filter(|offset| !offset.is_empty())
            .map(|offset| current.advance(offset));
        (self.data, next)
    }
}
