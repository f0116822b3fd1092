//! State for one loaded file.
//!
//! A `Session` owns the parsed store, the bookmarks, the selection and the
//! correlation state. The shell builds a new one for every completed load
//! and drops the old one, so nothing leaks between files.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use csv::{QuoteStyle, WriterBuilder};

use crate::bookmarks::{Bookmarks, sidecar_path};
use crate::config::ViewerConfig;
use crate::correlate::{Highlighter, HighlightTarget, Mark, find_exact, find_nearest};
use crate::error::{Result, ViewerError};
use crate::loader::LoadOutcome;
use crate::record::{Category, Record};
use crate::search::{SearchHit, SearchQuery, search};
use crate::store::{CategoryCounts, RecordStore};
use crate::viewport::ViewportWindow;

pub struct Session {
    config: ViewerConfig,
    store: RecordStore,
    bookmarks: Bookmarks,
    log_path: Option<PathBuf>,
    active: Category,
    selection: BTreeSet<usize>,
    mark: Option<Mark>,
    flash: Option<(Category, usize, Instant)>,
    highlighter: Highlighter,
    scroll_request: Option<usize>,
    hits: Vec<SearchHit>,
    hit_positions: HashSet<usize>,
    last_search: Option<(Category, SearchQuery)>,
}

impl Session {
    pub fn new(config: ViewerConfig) -> Self {
        let highlighter = Highlighter::new(config.highlight_window);
        Self {
            config,
            store: RecordStore::new(),
            bookmarks: Bookmarks::new(),
            log_path: None,
            active: Category::Trace,
            selection: BTreeSet::new(),
            mark: None,
            flash: None,
            highlighter,
            scroll_request: None,
            hits: Vec::new(),
            hit_positions: HashSet::new(),
            last_search: None,
        }
    }

    /// Builds the session for a finished load and pulls in its bookmarks.
    pub fn from_outcome(outcome: LoadOutcome, config: ViewerConfig, active: Category) -> Self {
        let mut session = Self::new(config);
        session.active = active;
        session.store = outcome.store;
        session.log_path = outcome.source_path;

        if let Some(path) = session.bookmark_path() {
            session.bookmarks = Bookmarks::load(&path, &session.store);
        }
        session
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    pub fn bookmark_path(&self) -> Option<PathBuf> {
        self.log_path
            .as_deref()
            .map(|p| sidecar_path(p, &self.config.bookmark_extension))
    }

    pub fn active(&self) -> Category {
        self.active
    }

    pub fn records(&self, category: Category) -> &[Record] {
        match category {
            Category::Bookmarks => self.bookmarks.records(),
            _ => self.store.records(category),
        }
    }

    pub fn headers(&self, category: Category) -> &[String] {
        self.store.headers(category)
    }

    pub fn counts(&self) -> CategoryCounts {
        self.store.counts()
    }

    /// Switches tabs. A fresh mark pulls the new tab to the nearest record.
    pub fn switch_to(&mut self, category: Category, now: Instant) -> Option<usize> {
        self.active = category;
        self.selection.clear();
        self.refresh_hit_positions();

        let mark = self.mark?;
        if !mark.is_fresh(now, self.config.mark_freshness) {
            log::debug!("mark on {} is stale, not syncing", mark.stable_index);
            return None;
        }

        let found = find_nearest(self.records(category), mark.stable_index)?;
        log::debug!(
            "synced {} from {} to {} at row {}",
            mark.stable_index,
            mark.source.id(),
            found.stable_index,
            found.position
        );
        self.focus(category, found.position, found.stable_index, now);
        Some(found.position)
    }

    /// Jumps to the record with exactly `stable_index` in `category`.
    pub fn jump_to_exact(
        &mut self,
        category: Category,
        stable_index: i64,
        now: Instant,
    ) -> Option<usize> {
        if self.active != category {
            self.active = category;
            self.selection.clear();
            self.refresh_hit_positions();
        }
        let found = find_exact(self.records(category), stable_index)?;
        self.focus(category, found.position, found.stable_index, now);
        Some(found.position)
    }

    fn focus(&mut self, category: Category, position: usize, stable_index: i64, now: Instant) {
        self.highlighter.request(
            HighlightTarget {
                category,
                position,
                stable_index,
            },
            now,
        );
        self.scroll_request = Some(position);
    }

    /// Remembers the double-clicked row for syncing the next tab.
    pub fn mark(&mut self, position: usize, now: Instant) -> bool {
        let category = self.active;
        let Some(stable_index) = self
            .records(category)
            .get(position)
            .and_then(|r| r.stable_index)
        else {
            return false;
        };

        self.mark = Some(Mark {
            stable_index,
            source: category,
            marked_at: now,
        });
        self.flash = Some((category, position, now + self.config.mark_flash));
        true
    }

    pub fn current_mark(&self) -> Option<Mark> {
        self.mark
    }

    pub fn take_scroll_request(&mut self) -> Option<usize> {
        self.scroll_request.take()
    }

    pub fn on_rendered(&mut self, window: &ViewportWindow, now: Instant) {
        self.highlighter.on_rendered(self.active, window, now);
        if let Some((_, _, until)) = self.flash {
            if now >= until {
                self.flash = None;
            }
        }
    }

    pub fn highlighter(&self) -> &Highlighter {
        &self.highlighter
    }

    pub fn clear_highlight(&mut self) {
        self.highlighter.clear();
    }

    pub fn is_highlighted(&self, position: usize, now: Instant) -> bool {
        self.highlighter.is_highlighted(self.active, position, now)
    }

    pub fn is_flashing(&self, position: usize, now: Instant) -> bool {
        matches!(self.flash, Some((c, p, until)) if c == self.active && p == position && now < until)
    }

    pub fn select(&mut self, position: usize, additive: bool) {
        if additive {
            if !self.selection.remove(&position) {
                self.selection.insert(position);
            }
        } else {
            self.selection.clear();
            self.selection.insert(position);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, position: usize) -> bool {
        self.selection.contains(&position)
    }

    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    pub fn selected_records(&self) -> Vec<&Record> {
        let records = self.records(self.active);
        self.selection
            .iter()
            .filter_map(|&pos| records.get(pos))
            .collect()
    }

    /// Adds the selection to bookmarks, or removes it on the bookmarks tab.
    /// Changes are written to the sidecar when the session has a file.
    pub fn toggle_bookmarks(&mut self) -> Result<bool> {
        if self.selection.is_empty() {
            return Ok(false);
        }

        let selected: Vec<Record> = self.selected_records().into_iter().cloned().collect();
        let changed = if self.active == Category::Bookmarks {
            self.bookmarks.remove(selected.iter())
        } else {
            self.bookmarks.add(self.active, selected.iter())
        };
        self.selection.clear();

        if changed {
            self.follow_bookmark_rows();
            self.save_bookmarks()?;
        }
        Ok(changed)
    }

    /// Bookmark rows shift on removal; position-keyed state is looked up
    /// again by stable index.
    fn follow_bookmark_rows(&mut self) {
        let rows = self.bookmarks.records();

        if let Some(target) = self.highlighter.target() {
            if target.category == Category::Bookmarks {
                let position = find_exact(rows, target.stable_index).map(|m| m.position);
                self.highlighter.relocate(position);
            }
        }

        // the flashed row is always the marked one
        if let Some((Category::Bookmarks, _, until)) = self.flash {
            let moved = self
                .mark
                .and_then(|m| find_exact(rows, m.stable_index))
                .map(|m| m.position);
            self.flash = moved.map(|position| (Category::Bookmarks, position, until));
        }

        if let Some((Category::Bookmarks, query)) = &self.last_search {
            let columns = self.store.headers(Category::Bookmarks).len();
            self.hits = search(Category::Bookmarks, rows, columns, query);
            self.refresh_hit_positions();
        }
    }

    pub fn save_bookmarks(&self) -> Result<()> {
        match self.bookmark_path() {
            Some(path) => self.bookmarks.save(&path),
            None => {
                log::debug!("no log file behind this session; bookmarks kept in memory");
                Ok(())
            }
        }
    }

    /// Selected rows as tab-separated text, in table order.
    pub fn copy_selection(&self) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .flexible(true)
            .from_writer(Vec::new());
        for record in self.selected_records() {
            writer.write_record(&record.fields)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ViewerError::Io(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn run_search(&mut self, query: &SearchQuery) -> usize {
        let columns = self.headers(self.active).len();
        self.hits = search(self.active, self.records(self.active), columns, query);
        self.last_search = Some((self.active, query.clone()));
        self.refresh_hit_positions();
        log::debug!("search '{}' found {} hits", query.term, self.hits.len());
        self.hits.len()
    }

    pub fn clear_search(&mut self) {
        self.last_search = None;
        self.hits.clear();
        self.hit_positions.clear();
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn is_search_hit(&self, position: usize) -> bool {
        self.hit_positions.contains(&position)
    }

    fn refresh_hit_positions(&mut self) {
        let active = self.active;
        self.hit_positions = self
            .hits
            .iter()
            .filter(|h| h.category == active)
            .map(|h| h.position)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn outcome(lines: &[(&str, &str)]) -> LoadOutcome {
        let mut store = RecordStore::new();
        store.set_file_headers(&[]);
        for (seq, (idx, code)) in lines.iter().enumerate() {
            let fields = vec![idx.to_string(), code.to_string(), "x".to_string()];
            let category = crate::record::classify(&fields);
            store.push(category, Record::new(fields, seq + 1));
        }
        LoadOutcome {
            store,
            elapsed: Duration::ZERO,
            source_path: None,
        }
    }

    fn session() -> Session {
        let data = [
            ("10", "9"),
            ("11", "1"),
            ("20", "9"),
            ("25", "1"),
            ("40", "1"),
            ("41", "2"),
        ];
        Session::from_outcome(outcome(&data), ViewerConfig::default(), Category::Trace)
    }

    #[test]
    fn fresh_mark_syncs_the_next_tab_to_the_nearest_record() {
        let mut s = session();
        let t0 = Instant::now();
        // trace = [10, 20]; mark 20
        assert!(s.mark(1, t0));
        let pos = s.switch_to(Category::Messages, t0 + Duration::from_secs(1));
        // messages = [11, 25, 40]; 20 is closest to 25
        assert_eq!(pos, Some(1));
        assert_eq!(s.take_scroll_request(), Some(1));
        assert_eq!(s.take_scroll_request(), None);
    }

    #[test]
    fn stale_mark_is_ignored() {
        let mut s = session();
        let t0 = Instant::now();
        s.mark(0, t0);
        assert_eq!(s.switch_to(Category::Messages, t0 + Duration::from_secs(31)), None);
        assert_eq!(s.take_scroll_request(), None);
    }

    #[test]
    fn exact_jump_switches_category_and_highlights_after_render() {
        let mut s = session();
        let t0 = Instant::now();
        assert_eq!(s.jump_to_exact(Category::Messages, 40, t0), Some(2));
        assert_eq!(s.active(), Category::Messages);
        assert!(!s.is_highlighted(2, t0));

        let window = ViewportWindow::compute(3, 0.0, 24.0, 240.0);
        s.on_rendered(&window, t0);
        assert!(s.is_highlighted(2, t0));
        assert!(s.jump_to_exact(Category::Messages, 41, t0).is_none());
    }

    #[test]
    fn toggling_bookmarks_adds_then_removes() {
        let mut s = session();
        s.select(0, false);
        s.select(1, true);
        assert!(s.toggle_bookmarks().unwrap());
        assert_eq!(s.records(Category::Bookmarks).len(), 2);
        assert_eq!(s.selection_len(), 0);

        s.select(0, false);
        assert!(!s.toggle_bookmarks().unwrap());

        s.switch_to(Category::Bookmarks, Instant::now());
        s.select(1, false);
        assert!(s.toggle_bookmarks().unwrap());
        let left: Vec<Option<i64>> = s
            .records(Category::Bookmarks)
            .iter()
            .map(|r| r.stable_index)
            .collect();
        assert_eq!(left, vec![Some(10)]);
    }

    #[test]
    fn ctrl_click_toggles_rows() {
        let mut s = session();
        s.select(0, false);
        s.select(1, true);
        s.select(0, true);
        assert!(!s.is_selected(0));
        assert!(s.is_selected(1));
        s.select(0, false);
        assert_eq!(s.selection_len(), 1);
    }

    #[test]
    fn copy_selection_is_tab_separated() {
        let mut s = session();
        s.select(1, false);
        s.select(0, true);
        assert_eq!(s.copy_selection().unwrap(), "10\t9\tx\n20\t9\tx\n");
    }

    fn wide_session(rows: &[(&str, &str, &str)]) -> Session {
        let mut store = RecordStore::new();
        store.set_file_headers(&[]);
        for (seq, (idx, module, context)) in rows.iter().enumerate() {
            let fields: Vec<String> = vec![
                idx.to_string(),
                "9".into(),
                "I".into(),
                module.to_string(),
                "0".into(),
                "t".into(),
                context.to_string(),
            ];
            store.push(Category::Trace, Record::new(fields, seq + 1));
        }
        let outcome = LoadOutcome {
            store,
            elapsed: Duration::ZERO,
            source_path: None,
        };
        Session::from_outcome(outcome, ViewerConfig::default(), Category::Trace)
    }

    #[test]
    fn removing_bookmarks_keeps_highlight_and_hits_on_their_records() {
        let mut s = wide_session(&[("10", "RRC", "a"), ("20", "RRC", "b"), ("30", "MAC", "c")]);
        let t0 = Instant::now();
        s.select(0, false);
        s.select(1, true);
        s.select(2, true);
        assert!(s.toggle_bookmarks().unwrap());

        assert_eq!(s.jump_to_exact(Category::Bookmarks, 30, t0), Some(2));
        s.on_rendered(&ViewportWindow::compute(3, 0.0, 24.0, 240.0), t0);
        assert!(s.is_highlighted(2, t0));
        assert!(s.mark(2, t0));
        let query = SearchQuery {
            term: "mac".into(),
            module: true,
            context: false,
        };
        assert_eq!(s.run_search(&query), 1);

        s.select(0, false);
        assert!(s.toggle_bookmarks().unwrap());

        let left: Vec<Option<i64>> = s
            .records(Category::Bookmarks)
            .iter()
            .map(|r| r.stable_index)
            .collect();
        assert_eq!(left, vec![Some(20), Some(30)]);
        assert!(s.is_highlighted(1, t0));
        assert!(!s.is_highlighted(2, t0));
        assert!(s.is_flashing(1, t0));
        assert!(s.is_search_hit(1));
        assert!(!s.is_search_hit(0));
        assert_eq!(s.hits()[0].stable_index, Some(30));
    }

    #[test]
    fn removing_the_highlighted_bookmark_ends_the_highlight() {
        let mut s = wide_session(&[("10", "RRC", "a"), ("20", "RRC", "b")]);
        let t0 = Instant::now();
        s.select(0, false);
        s.select(1, true);
        s.toggle_bookmarks().unwrap();

        s.jump_to_exact(Category::Bookmarks, 20, t0);
        s.on_rendered(&ViewportWindow::compute(2, 0.0, 24.0, 240.0), t0);
        s.select(1, false);
        assert!(s.toggle_bookmarks().unwrap());

        assert!(s.highlighter().target().is_none());
        assert!(!s.is_highlighted(1, t0));
    }

    #[test]
    fn copied_fields_keep_their_quotes() {
        let mut s = wide_session(&[("10", "MAC", "say \"hi\"")]);
        s.select(0, false);
        assert_eq!(
            s.copy_selection().unwrap(),
            "10\t9\tI\tMAC\t0\tt\tsay \"hi\"\n"
        );
    }

    #[test]
    fn search_hits_follow_the_active_tab() {
        let mut s = session();
        let query = SearchQuery {
            term: "x".into(),
            module: true,
            context: true,
        };
        // column 3 and 6 are missing in these short records
        assert_eq!(s.run_search(&query), 0);

        s.clear_search();
        assert!(s.hits().is_empty());
        assert!(!s.is_search_hit(0));
    }
}
