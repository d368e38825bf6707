//! Lazy iteration over paginated collections
//!
//! A [`Paginator`] fetches one page at a time and only asks for the next page
//! once every item of the current one has been handed out. Two continuation
//! styles are supported behind the same type:
//!
//! - cursor: the server returns the full URL of the next page
//! - numeric: the client advances an offset or page-number query parameter
//!
//! The continuation state alone decides the next request, so a page is never
//! fetched twice. A paginator cannot be rewound; build a new one to start over.

use crate::transport::{ApiRequest, Transport};
use crate::{ClientError, Result};
use futures::Stream;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, instrument};
use url::Url;

/// How a collection continues past its first page
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageStyle {
    /// Follow the `next` URL returned by the server
    Cursor,
    /// Numeric offset starting at 0, advanced by the number of items received
    Offset { param: String },
    /// Page number starting at 1, advanced by one per page
    PageNumber { param: String },
}

impl PageStyle {
    /// `offset=` style
    pub fn offset() -> Self {
        Self::Offset {
            param: "offset".to_string(),
        }
    }

    /// `page=` style
    pub fn page_number() -> Self {
        Self::PageNumber {
            param: "page".to_string(),
        }
    }
}

/// One decoded page
#[derive(Clone, Debug)]
pub struct Page<T> {
    /// Items in server order
    pub items: Vec<T>,
    /// Whether the server reports more pages
    pub has_more: bool,
    /// Next page URL, for cursor-style collections
    pub next: Option<String>,
}

#[derive(Deserialize)]
struct RawPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    pages: Option<u64>,
}

impl<T: DeserializeOwned> Page<T> {
    /// Decode a `{"results": [...], "next": ...}` or
    /// `{"results": [...], "page": n, "pages": m}` body
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let raw: RawPage<T> = serde_json::from_slice(body)?;
        let numeric_more = matches!((raw.page, raw.pages), (Some(page), Some(pages)) if page < pages);
        Ok(Self {
            has_more: raw.next.is_some() || numeric_more,
            next: raw.next,
            items: raw.results,
        })
    }
}

/// Turns one page body into a [`Page`]
pub type PageDecoder<T> = Box<dyn Fn(&[u8]) -> Result<Page<T>> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Continuation {
    /// Nothing fetched yet
    Start,
    /// Next request goes to this URL
    Cursor(Url),
    /// Next request carries this offset or page number
    Number(u64),
    /// No more pages
    Exhausted,
}

/// Lazy, finite sequence of items from a paginated collection
pub struct Paginator<T> {
    transport: Transport,
    base: Url,
    params: Vec<(String, String)>,
    style: PageStyle,
    decode: PageDecoder<T>,
    continuation: Continuation,
    buffer: VecDeque<T>,
    pages_fetched: usize,
}

impl<T: DeserializeOwned + 'static> Paginator<T> {
    /// Paginator that decodes pages with [`Page::from_json`]
    pub fn new(
        transport: Transport,
        base: Url,
        params: Vec<(String, String)>,
        style: PageStyle,
    ) -> Self {
        Self::with_decoder(transport, base, params, style, Box::new(Page::<T>::from_json))
    }
}

impl<T> Paginator<T> {
    /// Paginator with a custom page decoder
    pub fn with_decoder(
        transport: Transport,
        base: Url,
        params: Vec<(String, String)>,
        style: PageStyle,
        decode: PageDecoder<T>,
    ) -> Self {
        Self {
            transport,
            base,
            params,
            style,
            decode,
            continuation: Continuation::Start,
            buffer: VecDeque::new(),
            pages_fetched: 0,
        }
    }

    /// Number of page requests issued so far
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Next item, fetching a page if the current one is used up.
    ///
    /// A failed page fetch is returned once and ends the sequence.
    pub async fn next(&mut self) -> Option<Result<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if self.continuation == Continuation::Exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page().await {
                self.continuation = Continuation::Exhausted;
                return Some(Err(e));
            }
        }
    }

    /// Drain every remaining item
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }

    /// Consume the paginator as a `Stream`
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> {
        futures::stream::unfold(self, |mut paginator| async move {
            paginator.next().await.map(|item| (item, paginator))
        })
    }

    #[instrument(skip(self))]
    async fn fetch_page(&mut self) -> Result<()> {
        let (url, number) = self.page_request()?;
        let body = self
            .transport
            .execute(ApiRequest::api(Method::GET, url))
            .await?;
        self.pages_fetched += 1;

        let page = (self.decode)(&body[..])?;
        let count = page.items.len();
        debug!(items = count, has_more = page.has_more, "page received");

        self.continuation = self.advance(&page, number, count)?;
        self.buffer.extend(page.items);
        Ok(())
    }

    /// URL for the pending request and the numeric value it carries
    fn page_request(&self) -> Result<(Url, u64)> {
        match (&self.continuation, &self.style) {
            (Continuation::Cursor(url), _) => Ok((url.clone(), 0)),
            (Continuation::Start, PageStyle::Cursor) => Ok((self.page_url(None), 0)),
            (Continuation::Start, PageStyle::Offset { param }) => Ok((self.page_url(Some((param, 0))), 0)),
            (Continuation::Start, PageStyle::PageNumber { param }) => {
                Ok((self.page_url(Some((param, 1))), 1))
            }
            (Continuation::Number(n), PageStyle::Offset { param } | PageStyle::PageNumber { param }) => {
                Ok((self.page_url(Some((param, *n))), *n))
            }
            (Continuation::Number(_), PageStyle::Cursor) | (Continuation::Exhausted, _) => Err(
                ClientError::InvalidResponse("pagination continued past its end".to_string()),
            ),
        }
    }

    fn advance(&self, page: &Page<T>, number: u64, count: usize) -> Result<Continuation> {
        if !page.has_more {
            return Ok(Continuation::Exhausted);
        }
        Ok(match &self.style {
            PageStyle::Cursor => match &page.next {
                Some(next) => Continuation::Cursor(self.base.join(next)?),
                None => Continuation::Exhausted,
            },
            // An empty page would repeat the same offset forever.
            PageStyle::Offset { .. } if count == 0 => Continuation::Exhausted,
            PageStyle::Offset { .. } => Continuation::Number(number + count as u64),
            PageStyle::PageNumber { .. } => Continuation::Number(number + 1),
        })
    }

    fn page_url(&self, number: Option<(&String, u64)>) -> Url {
        let mut url = self.base.clone();
        if self.params.is_empty() && number.is_none() {
            return url;
        }
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in &self.params {
                query.append_pair(key, value);
            }
            if let Some((param, n)) = number {
                query.append_pair(param, &n.to_string());
            }
        }
        url
    }
}

impl<T> fmt::Debug for Paginator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Paginator")
            .field("base", &self.base.as_str())
            .field("style", &self.style)
            .field("continuation", &self.continuation)
            .field("buffered", &self.buffer.len())
            .field("pages_fetched", &self.pages_fetched)
            .finish()
    }
}
