// Copyright 2026 The asc-rs Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Follows `links.next` chains.
//!
//! The caller issues the first request and hands the first page to these
//! functions, together with a function to fetch any subsequent page from its
//! opaque `next` URL. Page numbers in errors start at 1, the first page.

use crate::envelope::{Links, Page};
use gax::Result;
use gax::error::Error;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Fetches every page and concatenates their data.
///
/// The aggregate keeps the `meta` of the first page that has one, the
/// `included` resources of all pages, and has no `links.next`.
///
/// # Example
/// ```
/// # use asc_client::envelope::{Links, Page, Resource};
/// # use asc_client::pagination::paginate_all;
/// # use tokio_util::sync::CancellationToken;
/// # tokio_test::block_on(async {
/// let page = |ids: &[&str], next: Option<&str>| Page::<serde_json::Value> {
///     data: ids.iter().map(|id| Resource { id: id.to_string(), kind: "apps".into(), ..Default::default() }).collect(),
///     links: Some(Links { this: None, next: next.map(str::to_string) }),
///     ..Default::default()
/// };
/// let first = page(&["1", "2"], Some("https://example.com/v1/apps?cursor=2"));
/// let all = paginate_all(&CancellationToken::new(), first, async |_next| Ok(page(&["3"], None))).await?;
/// assert_eq!(all.data.len(), 3);
/// # gax::Result::<()>::Ok(()) });
/// ```
pub async fn paginate_all<A, F>(
    cancel: &CancellationToken,
    first: Page<A>,
    fetch_next: F,
) -> Result<Page<A>>
where
    F: AsyncFnMut(String) -> Result<Page<A>>,
{
    let mut aggregate = Page::<A> {
        data: Vec::new(),
        included: None,
        meta: None,
        links: None,
    };
    let mut this = None;
    paginate_each(cancel, first, fetch_next, |page| {
        if this.is_none() {
            this = page.links.as_ref().and_then(|l| l.this.clone());
        }
        if aggregate.meta.is_none() && crate::envelope::has_meta(&page.meta) {
            aggregate.meta = page.meta;
        }
        if let Some(included) = page.included {
            aggregate
                .included
                .get_or_insert_with(Vec::new)
                .extend(included);
        }
        aggregate.data.extend(page.data);
        Ok(())
    })
    .await?;
    aggregate.links = Some(Links { this, next: None });
    Ok(aggregate)
}

/// Visits every page in order without retaining them.
///
/// Fails with a [repeated pagination URL][Error::is_repeated_pagination_url]
/// error if a `next` URL appears twice in the same chain. Errors from
/// `fetch_next` carry the number of the page that failed.
pub async fn paginate_each<A, F, V>(
    cancel: &CancellationToken,
    first: Page<A>,
    mut fetch_next: F,
    mut visit: V,
) -> Result<()>
where
    F: AsyncFnMut(String) -> Result<Page<A>>,
    V: FnMut(Page<A>) -> Result<()>,
{
    let mut seen = HashSet::new();
    let mut page = first;
    let mut number = 1_usize;
    loop {
        let next = page.next_url().map(str::to_string);
        visit(page).map_err(|e| e.with_page(number))?;
        let Some(next) = next else {
            return Ok(());
        };
        number += 1;
        if !seen.insert(next.clone()) {
            return Err(Error::repeated_pagination_url(next).with_page(number));
        }
        if cancel.is_cancelled() {
            return Err(Error::cancelled());
        }
        tracing::debug!(page = number, %next, "fetching next page");
        page = fetch_next(next).await.map_err(|e| e.with_page(number))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Resource;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    fn page(ids: &[u32], next: Option<&str>) -> Page<Value> {
        Page {
            data: ids
                .iter()
                .map(|id| Resource {
                    id: id.to_string(),
                    kind: "items".to_string(),
                    ..Default::default()
                })
                .collect(),
            included: None,
            meta: None,
            links: Some(Links {
                this: None,
                next: next.map(str::to_string),
            }),
        }
    }

    fn ids(page: &Page<Value>) -> Vec<String> {
        page.data.iter().map(|r| r.id.clone()).collect()
    }

    #[tokio::test]
    async fn single_page() -> anyhow::Result<()> {
        let mut calls = 0;
        let got = paginate_all(&CancellationToken::new(), page(&[1, 2], None), async |_| {
            calls += 1;
            Ok(page(&[], None))
        })
        .await?;
        assert_eq!(ids(&got), vec!["1", "2"]);
        assert_eq!(calls, 0);
        Ok(())
    }

    #[tokio::test]
    async fn concatenates_in_order() -> anyhow::Result<()> {
        let mut requested = Vec::new();
        let got = paginate_all(
            &CancellationToken::new(),
            page(&[1, 2], Some("/p?cursor=B")),
            async |next: String| {
                requested.push(next.clone());
                match next.as_str() {
                    "/p?cursor=B" => Ok(page(&[3, 4], Some("/p?cursor=C"))),
                    "/p?cursor=C" => Ok(page(&[5], Some(""))),
                    other => panic!("unexpected cursor {other}"),
                }
            },
        )
        .await?;
        assert_eq!(ids(&got), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(got.next_url(), None);
        assert_eq!(requested, vec!["/p?cursor=B", "/p?cursor=C"]);
        Ok(())
    }

    #[tokio::test]
    async fn meta_from_first_non_empty_page() -> anyhow::Result<()> {
        let mut first = page(&[1], Some("/p?cursor=B"));
        first.meta = Some(json!({}));
        let got = paginate_all(&CancellationToken::new(), first, async |next: String| {
            let mut p = match next.as_str() {
                "/p?cursor=B" => page(&[2], Some("/p?cursor=C")),
                _ => page(&[3], None),
            };
            p.meta = Some(json!({"paging": {"total": 3, "cursor": next}}));
            Ok(p)
        })
        .await?;
        assert_eq!(
            got.meta,
            Some(json!({"paging": {"total": 3, "cursor": "/p?cursor=B"}}))
        );
        Ok(())
    }

    #[tokio::test]
    async fn included_is_concatenated() -> anyhow::Result<()> {
        let mut first = page(&[1], Some("/p?cursor=B"));
        first.included = Some(vec![json!({"id": "a"})]);
        let got = paginate_all(&CancellationToken::new(), first, async |_| {
            let mut p = page(&[2], None);
            p.included = Some(vec![json!({"id": "b"})]);
            Ok(p)
        })
        .await?;
        assert_eq!(got.included, Some(vec![json!({"id": "a"}), json!({"id": "b"})]));
        Ok(())
    }

    #[tokio::test]
    async fn self_referential_cursor() -> anyhow::Result<()> {
        let mut calls = 0;
        let err = paginate_all(
            &CancellationToken::new(),
            page(&[1], Some("/p?cursor=A")),
            async |_| {
                calls += 1;
                Ok(page(&[2], Some("/p?cursor=A")))
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_repeated_pagination_url(), "{err:?}");
        assert_eq!(err.page(), Some(3));
        assert_eq!(calls, 1);
        Ok(())
    }

    #[tokio::test]
    async fn cycle_across_pages() -> anyhow::Result<()> {
        let err = paginate_all(
            &CancellationToken::new(),
            page(&[1], Some("/p?cursor=B")),
            async |next: String| match next.as_str() {
                "/p?cursor=B" => Ok(page(&[2], Some("/p?cursor=C"))),
                _ => Ok(page(&[3], Some("/p?cursor=B"))),
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_repeated_pagination_url(), "{err:?}");
        assert!(err.to_string().contains("/p?cursor=B"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn fetch_error_has_page_number() -> anyhow::Result<()> {
        let err = paginate_all(
            &CancellationToken::new(),
            page(&[1], Some("/p?cursor=B")),
            async |_| Err::<Page<Value>, _>(Error::deser("bad page")),
        )
        .await
        .unwrap_err();
        assert!(err.is_deserialization(), "{err:?}");
        assert_eq!(err.page(), Some(2));
        assert!(err.to_string().starts_with("page 2: "), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn visit_stops_early() -> anyhow::Result<()> {
        let mut visited = Vec::new();
        let err = paginate_each(
            &CancellationToken::new(),
            page(&[1], Some("/p?cursor=B")),
            async |_| Ok(page(&[2], None)),
            |p| {
                visited.push(ids(&p));
                Err(Error::usage("stop"))
            },
        )
        .await
        .unwrap_err();
        assert!(err.is_usage(), "{err:?}");
        assert_eq!(visited, vec![vec!["1".to_string()]]);
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_between_pages() -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = paginate_all(&cancel, page(&[1], Some("/p?cursor=B")), async |_| {
            Ok(page(&[2], None))
        })
        .await
        .unwrap_err();
        assert!(err.is_cancelled(), "{err:?}");
        Ok(())
    }
}
