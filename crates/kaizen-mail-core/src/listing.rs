//! Paging over a mailbox or a search result.
//!
//! The browser keeps the ascending UID universe of the current context (the
//! whole mailbox, or the last search) and the page index into it. Page 0 holds
//! the newest UIDs. Only the summaries of the visible page are fetched.

use std::ops::Range;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::service::{
    Connector, MailServiceError, MailboxSession, MailboxStatus, MessageSummary, SearchCriteria, Uid,
};

/// Messages per page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Number of pages for `total` items; never less than one.
#[must_use]
pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

/// Clamp `page` into `[0, total_pages - 1]`.
#[must_use]
pub fn clamp_page(page: usize, total: usize, page_size: usize) -> usize {
    page.min(total_pages(total, page_size) - 1)
}

/// Index range of page `page` in an ascending universe of `total` items.
///
/// Page `p` covers `[max(0, T - (p+1)S), T - pS)`, after clamping `p`.
#[must_use]
pub fn page_range(total: usize, page: usize, page_size: usize) -> Range<usize> {
    let size = page_size.max(1);
    let page = clamp_page(page, total, size);
    let end = total.saturating_sub(page * size);
    let start = end.saturating_sub(size);
    start..end
}

/// The UIDs on page `page` of `universe`.
#[must_use]
pub fn slice_page(universe: &[Uid], page: usize, page_size: usize) -> &[Uid] {
    &universe[page_range(universe.len(), page, page_size)]
}

/// Current listing context and visible page.
#[derive(Debug, Clone)]
pub struct MailBrowser {
    page_size: usize,
    mailbox: Option<String>,
    filter: Option<SearchCriteria>,
    universe: Arc<[Uid]>,
    page: usize,
    messages: Vec<MessageSummary>,
}

impl Default for MailBrowser {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl MailBrowser {
    /// Browser with no mailbox open.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            mailbox: None,
            filter: None,
            universe: Arc::from(Vec::new()),
            page: 0,
            messages: Vec::new(),
        }
    }

    /// Open mailbox, if any.
    #[must_use]
    pub fn mailbox(&self) -> Option<&str> {
        self.mailbox.as_deref()
    }

    /// Active search, if any.
    #[must_use]
    pub const fn filter(&self) -> Option<&SearchCriteria> {
        self.filter.as_ref()
    }

    /// Zero-based page index.
    #[must_use]
    pub const fn page(&self) -> usize {
        self.page
    }

    /// Pages in the current universe.
    #[must_use]
    pub fn total_pages(&self) -> usize {
        total_pages(self.universe.len(), self.page_size)
    }

    /// UIDs in the current context, ascending.
    #[must_use]
    pub fn universe(&self) -> Arc<[Uid]> {
        Arc::clone(&self.universe)
    }

    /// UIDs on the visible page.
    #[must_use]
    pub fn page_uids(&self) -> &[Uid] {
        slice_page(&self.universe, self.page, self.page_size)
    }

    /// Summaries on the visible page, newest first.
    #[must_use]
    pub fn messages(&self) -> &[MessageSummary] {
        &self.messages
    }

    /// Unseen messages on the visible page.
    #[must_use]
    pub fn unseen_on_page(&self) -> usize {
        self.messages.iter().filter(|m| !m.seen).count()
    }

    /// Open `path` with its full universe on page 0. Any filter is dropped.
    ///
    /// Nothing changes unless the new mailbox is fully listed. When listing
    /// fails after the SELECT, the previous mailbox is selected again.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox cannot be opened or listed.
    pub async fn open_mailbox<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
        path: &str,
    ) -> Result<MailboxStatus, MailServiceError> {
        let status = session.open_mailbox(path).await?;
        let listed = match session.list_uids().await {
            Ok(uids) => self.view(session, uids, 0).await,
            Err(e) => Err(e),
        };
        match listed {
            Ok(view) => {
                self.mailbox = Some(path.to_string());
                self.filter = None;
                self.commit(view);
                Ok(status)
            }
            Err(e) => {
                if let Some(previous) = self.mailbox.as_deref()
                    && let Err(reselect) = session.open_mailbox(previous).await
                {
                    warn!(previous, "Could not reselect mailbox: {reselect}");
                }
                Err(e)
            }
        }
    }

    /// Replace the universe with the result of `criteria` and show page 0.
    /// Empty criteria clear the filter instead.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the search fails.
    pub async fn apply_filter<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
        criteria: SearchCriteria,
    ) -> Result<(), MailServiceError> {
        if criteria.is_empty() {
            return self.clear_filter(session).await;
        }
        let uids = session.search(&criteria).await?;
        debug!(matches = uids.len(), "Filter applied");
        let view = self.view(session, uids, 0).await?;
        self.filter = Some(criteria);
        self.commit(view);
        Ok(())
    }

    /// Back to the whole mailbox on page 0.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the listing fails.
    pub async fn clear_filter<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
    ) -> Result<(), MailServiceError> {
        let uids = session.list_uids().await?;
        let view = self.view(session, uids, 0).await?;
        self.filter = None;
        self.commit(view);
        Ok(())
    }

    /// Recompute the universe for the current context and reload the page,
    /// keeping the page index where possible.
    ///
    /// # Errors
    ///
    /// Returns an error if no mailbox is open or the remote call fails.
    pub async fn refresh<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
    ) -> Result<(), MailServiceError> {
        if self.mailbox.is_none() {
            return Err(MailServiceError::NoMailboxOpen);
        }
        let uids = match &self.filter {
            Some(criteria) => session.search(criteria).await?,
            None => session.list_uids().await?,
        };
        let view = self.view(session, uids, self.page).await?;
        self.commit(view);
        Ok(())
    }

    /// Show page `page`, clamped into range.
    ///
    /// # Errors
    ///
    /// Returns an error if the summaries cannot be fetched.
    pub async fn load_page<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
        page: usize,
    ) -> Result<(), MailServiceError> {
        let page = clamp_page(page, self.universe.len(), self.page_size);
        let uids = slice_page(&self.universe, page, self.page_size).to_vec();
        self.messages = session.list_by_uids(&uids).await?;
        self.page = page;
        Ok(())
    }

    /// Older messages. Stays put on the last page.
    ///
    /// # Errors
    ///
    /// Returns an error if the summaries cannot be fetched.
    pub async fn next_page<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
    ) -> Result<(), MailServiceError> {
        self.load_page(session, self.page + 1).await
    }

    /// Newer messages. Stays put on page 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the summaries cannot be fetched.
    pub async fn prev_page<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
    ) -> Result<(), MailServiceError> {
        self.load_page(session, self.page.saturating_sub(1)).await
    }

    /// Set or clear `\Seen`, then refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the update or the refresh fails.
    pub async fn set_seen<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
        uids: &[Uid],
        seen: bool,
    ) -> Result<(), MailServiceError> {
        session.set_seen(uids, seen).await?;
        self.refresh(session).await
    }

    /// Set or clear `\Flagged`, then refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the update or the refresh fails.
    pub async fn set_flagged<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
        uids: &[Uid],
        flagged: bool,
    ) -> Result<(), MailServiceError> {
        session.set_flagged(uids, flagged).await?;
        self.refresh(session).await
    }

    /// Delete, then refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete or the refresh fails.
    pub async fn delete<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
        uids: &[Uid],
    ) -> Result<(), MailServiceError> {
        session.delete(uids).await?;
        self.refresh(session).await
    }

    /// Move to `destination`, then refresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the move or the refresh fails.
    pub async fn move_to<C: Connector>(
        &mut self,
        session: &mut MailboxSession<C>,
        uids: &[Uid],
        destination: &str,
    ) -> Result<(), MailServiceError> {
        session.move_to(uids, destination).await?;
        self.refresh(session).await
    }

    /// Forget the mailbox, e.g. after it was deleted.
    pub fn close(&mut self) {
        self.mailbox = None;
        self.filter = None;
        self.universe = Arc::from(Vec::new());
        self.page = 0;
        self.messages.clear();
    }

    /// Sort `uids` and fetch page `page` of them, without touching `self`.
    async fn view<C: Connector>(
        &self,
        session: &mut MailboxSession<C>,
        mut uids: Vec<Uid>,
        page: usize,
    ) -> Result<View, MailServiceError> {
        uids.sort_unstable();
        uids.dedup();
        let page = clamp_page(page, uids.len(), self.page_size);
        let messages = session.list_by_uids(slice_page(&uids, page, self.page_size)).await?;
        Ok(View {
            universe: Arc::from(uids),
            page,
            messages,
        })
    }

    fn commit(&mut self, view: View) {
        self.universe = view.universe;
        self.page = view.page;
        self.messages = view.messages;
    }
}

/// A fully fetched listing, applied to the browser in one step.
struct View {
    universe: Arc<[Uid]>,
    page: usize,
    messages: Vec<MessageSummary>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::ServerConfig;
    use crate::service::RetryPolicy;
    use crate::service::testing::{FakeConnector, FakeMessage};
    use proptest::prelude::*;
    use std::time::Duration;

    mod page_math_tests {
        use super::*;

        #[test]
        fn test_total_pages() {
            assert_eq!(total_pages(0, 20), 1);
            assert_eq!(total_pages(1, 20), 1);
            assert_eq!(total_pages(20, 20), 1);
            assert_eq!(total_pages(21, 20), 2);
            assert_eq!(total_pages(45, 20), 3);
        }

        #[test]
        fn test_forty_five_by_twenty() {
            let universe: Vec<Uid> = (1..=45).collect();
            assert_eq!(slice_page(&universe, 0, 20), (26..=45).collect::<Vec<_>>());
            assert_eq!(slice_page(&universe, 1, 20), (6..=25).collect::<Vec<_>>());
            assert_eq!(slice_page(&universe, 2, 20), (1..=5).collect::<Vec<_>>());
        }

        #[test]
        fn test_out_of_range_page_clamps_to_last() {
            let universe: Vec<Uid> = (1..=45).collect();
            assert_eq!(slice_page(&universe, 99, 20), &[1, 2, 3, 4, 5]);
            assert_eq!(clamp_page(99, 45, 20), 2);
        }

        #[test]
        fn test_empty_universe() {
            assert!(slice_page(&[], 0, 20).is_empty());
            assert_eq!(page_range(0, 3, 20), 0..0);
        }

        proptest! {
            #[test]
            fn prop_pages_partition_universe(total in 0usize..500, size in 1usize..50) {
                let universe: Vec<Uid> = (1..=u32::try_from(total).unwrap()).collect();
                let pages = total_pages(total, size);
                let mut seen: Vec<Uid> = Vec::new();
                for page in (0..pages).rev() {
                    let slice = slice_page(&universe, page, size);
                    prop_assert!(slice.len() <= size);
                    seen.extend_from_slice(slice);
                }
                prop_assert_eq!(seen, universe);
            }

            #[test]
            fn prop_page_zero_holds_newest(total in 1usize..500, size in 1usize..50) {
                let universe: Vec<Uid> = (1..=u32::try_from(total).unwrap()).collect();
                let first = slice_page(&universe, 0, size);
                prop_assert_eq!(first.last().copied(), universe.last().copied());
                prop_assert_eq!(first.len(), size.min(total));
            }

            #[test]
            fn prop_clamped_page_in_range(
                total in 0usize..500,
                size in 1usize..50,
                page in 0usize..100,
            ) {
                prop_assert!(clamp_page(page, total, size) < total_pages(total, size));
            }
        }
    }

    fn session(connector: &FakeConnector) -> MailboxSession<FakeConnector> {
        MailboxSession::new(connector.clone(), ServerConfig::default())
            .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
    }

    fn uids(browser: &MailBrowser) -> Vec<Uid> {
        browser.messages().iter().map(|m| m.uid).collect()
    }

    mod browser_tests {
        use super::*;

        #[tokio::test(start_paused = true)]
        async fn test_open_shows_newest_page() {
            let connector = FakeConnector::with_inbox(45);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();

            browser.open_mailbox(&mut session, "INBOX").await.unwrap();
            assert_eq!(browser.mailbox(), Some("INBOX"));
            assert_eq!(browser.total_pages(), 3);
            assert_eq!(uids(&browser), (26..=45).rev().collect::<Vec<_>>());
        }

        #[tokio::test(start_paused = true)]
        async fn test_paging_clamps_at_both_ends() {
            let connector = FakeConnector::with_inbox(45);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();

            browser.prev_page(&mut session).await.unwrap();
            assert_eq!(browser.page(), 0);

            browser.next_page(&mut session).await.unwrap();
            browser.next_page(&mut session).await.unwrap();
            browser.next_page(&mut session).await.unwrap();
            assert_eq!(browser.page(), 2);
            assert_eq!(uids(&browser), vec![5, 4, 3, 2, 1]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_filter_resets_page_and_clear_restores() {
            let connector = FakeConnector::with_inbox(45);
            connector.set_seen(&(1..=40).collect::<Vec<_>>(), true);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();
            browser.load_page(&mut session, 1).await.unwrap();

            browser.apply_filter(&mut session, SearchCriteria::unseen()).await.unwrap();
            assert_eq!(browser.page(), 0);
            assert_eq!(browser.total_pages(), 1);
            assert_eq!(&*browser.universe(), &[41, 42, 43, 44, 45]);
            assert_eq!(connector.last_query().as_deref(), Some("UNSEEN"));

            browser.clear_filter(&mut session).await.unwrap();
            assert!(browser.filter().is_none());
            assert_eq!(browser.universe().len(), 45);
        }

        #[tokio::test(start_paused = true)]
        async fn test_empty_criteria_clears_filter() {
            let connector = FakeConnector::with_inbox(5);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();

            browser.apply_filter(&mut session, SearchCriteria::default()).await.unwrap();
            assert!(browser.filter().is_none());
            assert_eq!(browser.universe().len(), 5);
        }

        #[tokio::test(start_paused = true)]
        async fn test_refresh_reruns_filter() {
            let connector = FakeConnector::with_inbox(10);
            connector.set_seen(&(1..=8).collect::<Vec<_>>(), true);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();
            browser.apply_filter(&mut session, SearchCriteria::unseen()).await.unwrap();
            assert_eq!(&*browser.universe(), &[9, 10]);

            browser.set_seen(&mut session, &[9], true).await.unwrap();
            assert_eq!(&*browser.universe(), &[10]);
            assert!(browser.filter().is_some());
        }

        #[tokio::test(start_paused = true)]
        async fn test_refresh_without_filter_relists() {
            let connector = FakeConnector::with_inbox(3);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();

            connector.add(FakeMessage::new(4).dated(10_000));
            browser.refresh(&mut session).await.unwrap();
            assert_eq!(&*browser.universe(), &[1, 2, 3, 4]);
            assert_eq!(uids(&browser)[0], 4);
        }

        #[tokio::test(start_paused = true)]
        async fn test_delete_on_last_page_clamps() {
            let connector = FakeConnector::with_inbox(21);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();
            browser.next_page(&mut session).await.unwrap();
            assert_eq!(uids(&browser), vec![1]);

            browser.delete(&mut session, &[1]).await.unwrap();
            assert_eq!(browser.page(), 0);
            assert_eq!(browser.total_pages(), 1);
            assert_eq!(browser.messages().len(), 20);
        }

        #[tokio::test(start_paused = true)]
        async fn test_switching_mailbox_clears_filter() {
            let connector = FakeConnector::with_inbox(5);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            session.create_mailbox("Archive").await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();
            browser.apply_filter(&mut session, SearchCriteria::unseen()).await.unwrap();

            browser.move_to(&mut session, &[1, 2], "Archive").await.unwrap();
            assert_eq!(&*browser.universe(), &[3, 4, 5]);

            browser.open_mailbox(&mut session, "Archive").await.unwrap();
            assert!(browser.filter().is_none());
            assert_eq!(&*browser.universe(), &[1, 2]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_failed_switch_keeps_previous_mailbox() {
            let connector = FakeConnector::with_inbox(45);
            connector.set_seen(&(1..=40).collect::<Vec<_>>(), true);
            connector.add_unsearchable("Broken");
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();
            browser.apply_filter(&mut session, SearchCriteria::unseen()).await.unwrap();

            let result = browser.open_mailbox(&mut session, "Broken").await;
            assert!(matches!(result, Err(MailServiceError::Operation(_))));
            assert_eq!(browser.mailbox(), Some("INBOX"));
            assert!(browser.filter().is_some());
            assert_eq!(&*browser.universe(), &[41, 42, 43, 44, 45]);
            assert_eq!(session.current_mailbox(), Some("INBOX"));

            browser.refresh(&mut session).await.unwrap();
            assert_eq!(uids(&browser), vec![45, 44, 43, 42, 41]);
        }

        #[tokio::test(start_paused = true)]
        async fn test_failed_page_fetch_keeps_listing() {
            let connector = FakeConnector::with_inbox(45);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            browser.open_mailbox(&mut session, "INBOX").await.unwrap();
            browser.next_page(&mut session).await.unwrap();
            let shown = uids(&browser);

            connector.fail_fetches(true);
            assert!(browser.apply_filter(&mut session, SearchCriteria::unseen()).await.is_err());
            assert!(browser.next_page(&mut session).await.is_err());
            assert!(browser.filter().is_none());
            assert_eq!(browser.page(), 1);
            assert_eq!(browser.universe().len(), 45);
            assert_eq!(uids(&browser), shown);
        }

        #[tokio::test(start_paused = true)]
        async fn test_refresh_without_mailbox_fails() {
            let connector = FakeConnector::with_inbox(1);
            let mut session = session(&connector);
            session.connect().await.unwrap();
            let mut browser = MailBrowser::default();
            let result = browser.refresh(&mut session).await;
            assert_eq!(result, Err(MailServiceError::NoMailboxOpen));
        }
    }
}
