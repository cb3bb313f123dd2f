use serde::Serialize;

/// Which fetch, if any, the listing is waiting on. Being a single tag, the
/// first-page and next-page loads can never be pending at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    #[default]
    Idle,
    LoadingFirst,
    LoadingNext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageState {
    pub current_page: u32,
    pub has_more: bool,
    pub phase: LoadPhase,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: 1,
            has_more: true,
            phase: LoadPhase::Idle,
        }
    }
}

impl PageState {
    pub fn is_loading_first_page(&self) -> bool {
        self.phase == LoadPhase::LoadingFirst
    }

    pub fn is_loading_next_page(&self) -> bool {
        self.phase == LoadPhase::LoadingNext
    }

    pub fn is_loading(&self) -> bool {
        self.phase != LoadPhase::Idle
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn begin(&mut self, page: u32, is_first_page: bool) {
        self.current_page = page.max(1);
        self.phase = if is_first_page {
            LoadPhase::LoadingFirst
        } else {
            LoadPhase::LoadingNext
        };
    }

    pub(crate) fn settle(&mut self, has_more: bool) {
        self.has_more = has_more;
        self.phase = LoadPhase::Idle;
    }

    pub(crate) fn try_advance(&mut self) -> Option<u32> {
        if self.is_loading() || !self.has_more {
            return None;
        }
        self.current_page += 1;
        Some(self.current_page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageCursor {
    pub page: u32,
    pub total_pages: u32,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            page: 1,
            total_pages: 1,
        }
    }
}

impl PageCursor {
    fn last_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    pub fn clamp(&self, page: u32) -> u32 {
        page.clamp(1, self.last_page())
    }

    /// Moves to `page` clamped to `[1, total_pages]`; returns whether it moved.
    pub fn go_to(&mut self, page: u32) -> bool {
        let target = self.clamp(page);
        if target == self.page {
            return false;
        }
        self.page = target;
        true
    }

    pub fn next(&mut self) -> bool {
        self.go_to(self.page.saturating_add(1))
    }

    pub fn previous(&mut self) -> bool {
        self.go_to(self.page.saturating_sub(1))
    }

    pub fn has_next(&self) -> bool {
        self.page < self.last_page()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Records the server's page count, pulling the cursor back if it now overshoots.
    pub(crate) fn set_total_pages(&mut self, total_pages: u32) {
        self.total_pages = total_pages;
        self.page = self.clamp(self.page);
    }
}
