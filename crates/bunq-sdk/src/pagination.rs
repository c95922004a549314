//! Lazy cursor pagination
//!
//! Pages are fetched on demand while the stream is polled. Dropping the
//! stream stops fetching; a new call starts again from the newest page.

use bunq_types::{ListOptions, ListResponse};
use futures::Stream;
use std::future::Future;

use crate::error::SdkResult;

/// Stream every item of a cursor-paginated listing, newest first
///
/// Follows `older_id` until the server stops reporting one, or reports one
/// that is not strictly older than the cursor just used.
pub fn paginate<T, F, Fut>(page_size: u32, mut fetch_page: F) -> impl Stream<Item = SdkResult<T>>
where
    F: FnMut(ListOptions) -> Fut,
    Fut: Future<Output = SdkResult<ListResponse<T>>>,
{
    async_stream::try_stream! {
        let mut options = ListOptions::first_page(page_size);
        loop {
            let page = fetch_page(options).await?;
            let next = page.older_cursor();

            for item in page.items {
                yield item;
            }

            match (next, options.older_id) {
                (Some(cursor), Some(previous)) if cursor >= previous => {
                    tracing::warn!(cursor, previous, "Pagination cursor did not advance, stopping");
                    break;
                }
                (Some(cursor), _) => options = options.older_than(cursor),
                (None, _) => break,
            }
        }
    }
}
