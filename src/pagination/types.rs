//! Pagination types

/// Result of the next page computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPage {
    /// Request the window starting at `offset`
    Continue {
        /// Number of records to skip
        offset: usize,
        /// Number of records to request
        limit: usize,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue { .. })
    }
}

/// Why paging stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// A page came back empty or shorter than requested
    ShortPage,
    /// The reported total has been fetched
    TotalReached,
    /// The record cap has been reached
    MaxRecords,
}

/// State tracked across pages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    /// Offset of the next page
    pub offset: usize,
    /// Total records fetched so far
    pub total_fetched: usize,
    /// Total number of matches reported by the backend
    pub total: Option<usize>,
    /// Set once paging is complete
    pub stopped: Option<StopCondition>,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Create state starting at an offset
    pub fn starting_at(offset: usize) -> Self {
        Self {
            offset,
            ..Default::default()
        }
    }

    /// Is pagination complete?
    pub fn is_done(&self) -> bool {
        self.stopped.is_some()
    }

    fn stop(&mut self, condition: StopCondition) -> NextPage {
        self.stopped = Some(condition);
        NextPage::Done
    }
}

/// Offset-based pager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetPager {
    /// Records requested per page
    pub page_size: usize,
    /// Stop after this many records
    pub max_records: Option<usize>,
}

impl OffsetPager {
    /// Create a pager; a zero page size is treated as one
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            max_records: None,
        }
    }

    /// Stop after `max` records
    #[must_use]
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }

    /// The first window to request
    pub fn first_page(&self, state: &mut PaginationState) -> NextPage {
        self.window(state)
    }

    /// Record a received page and compute the next window
    pub fn process_page(
        &self,
        records_count: usize,
        total: Option<usize>,
        state: &mut PaginationState,
    ) -> NextPage {
        let requested = self.limit_for(state);
        state.total_fetched += records_count;
        state.offset += records_count;
        if total.is_some() {
            state.total = total;
        }

        if records_count == 0 || records_count < requested {
            return state.stop(StopCondition::ShortPage);
        }
        self.window(state)
    }

    fn limit_for(&self, state: &PaginationState) -> usize {
        match self.max_records {
            Some(max) => self.page_size.min(max.saturating_sub(state.total_fetched)),
            None => self.page_size,
        }
    }

    fn window(&self, state: &mut PaginationState) -> NextPage {
        if let Some(total) = state.total {
            if state.offset >= total {
                return state.stop(StopCondition::TotalReached);
            }
        }
        match self.limit_for(state) {
            0 => state.stop(StopCondition::MaxRecords),
            limit => NextPage::Continue {
                offset: state.offset,
                limit,
            },
        }
    }
}
