//! Per-conversation history fetch state machine.
//!
//! `Idle -> FetchingInitial -> Idle | Exhausted` on activation, and
//! `Idle -> FetchingOlder -> Idle | Exhausted` on a scrolled-to-top signal.
//! The in-flight guard is a single flag: a second request while one is
//! outstanding is dropped, never queued.

use serde::{Deserialize, Serialize};

/// Which kind of fetch is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchKind {
    Initial,
    Older,
}

/// Observable phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchPhase {
    Idle,
    FetchingInitial,
    FetchingOlder,
    Exhausted,
}

/// A fetch the controller has authorised. The caller turns this into a
/// fetch-history intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub kind: FetchKind,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    kind: FetchKind,
    page: u32,
}

/// Pagination state for one conversation.
#[derive(Debug, Clone)]
pub struct PaginationController {
    next_page: u32,
    page_size: u32,
    in_flight: Option<InFlight>,
    has_more_older: bool,
    initial_loaded: bool,
}

impl PaginationController {
    pub fn new(page_size: u32) -> Self {
        Self {
            next_page: 1,
            page_size: page_size.max(1),
            in_flight: None,
            has_more_older: true,
            initial_loaded: false,
        }
    }

    /// Back to a fresh token, as on (re)activation.
    pub fn reset(&mut self) {
        *self = Self::new(self.page_size);
    }

    pub fn phase(&self) -> FetchPhase {
        match self.in_flight {
            Some(InFlight {
                kind: FetchKind::Initial,
                ..
            }) => FetchPhase::FetchingInitial,
            Some(InFlight {
                kind: FetchKind::Older,
                ..
            }) => FetchPhase::FetchingOlder,
            None if !self.has_more_older => FetchPhase::Exhausted,
            None => FetchPhase::Idle,
        }
    }

    pub fn is_fetch_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_more_older(&self) -> bool {
        self.has_more_older
    }

    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The page of the outstanding fetch of the given kind.
    pub fn in_flight_page(&self, kind: FetchKind) -> Option<u32> {
        self.in_flight.filter(|f| f.kind == kind).map(|f| f.page)
    }

    /// Authorise the first-page fetch after activation.
    pub fn begin_initial(&mut self) -> Option<FetchRequest> {
        if self.in_flight.is_some() || self.initial_loaded {
            return None;
        }
        Some(self.issue(FetchKind::Initial))
    }

    /// Authorise an older-page fetch (scrolled to top).
    pub fn begin_older(&mut self) -> Option<FetchRequest> {
        if self.in_flight.is_some() || !self.initial_loaded || !self.has_more_older {
            return None;
        }
        Some(self.issue(FetchKind::Older))
    }

    // The token advances at issue time so a re-entrant trigger can never
    // ask for the same page twice.
    fn issue(&mut self, kind: FetchKind) -> FetchRequest {
        let page = self.next_page;
        self.next_page += 1;
        self.in_flight = Some(InFlight { kind, page });
        FetchRequest {
            kind,
            page,
            page_size: self.page_size,
        }
    }

    /// Record the response to the initial fetch.
    pub fn complete_initial(&mut self, known_messages: usize, server_total: u32) {
        self.in_flight = None;
        self.initial_loaded = true;
        self.has_more_older = (known_messages as u64) < u64::from(server_total);
    }

    /// Record the response to an older-page fetch.
    pub fn complete_older(&mut self, returned: usize, known_messages: usize, server_total: u32) {
        self.in_flight = None;
        self.has_more_older = returned > 0
            && returned as u64 >= u64::from(self.page_size)
            && (known_messages as u64) < u64::from(server_total);
    }

    /// Abandon the outstanding fetch without a response (channel failure).
    /// The token is rolled back so the same page is requested next time.
    pub fn abandon(&mut self) -> Option<FetchKind> {
        let flight = self.in_flight.take()?;
        if flight.page + 1 == self.next_page {
            self.next_page = flight.page;
        }
        Some(flight.kind)
    }
}
