//! Sheet orchestrator.
//!
//! `DataProxy` owns one sheet's stores (rows, columns, merges, styles,
//! validations, auto-filter) and its session state (selection, scroll,
//! clipboard, history). Every mutation goes through [`DataProxy::change_data`]:
//! snapshot the current state into history, apply the change, bump the
//! revision and notify the subscriber. Rejected operations are checked
//! before the snapshot, so they leave no trace.
//!
//! Geometry queries are pure functions of the current state plus the
//! viewport the caller supplies.

use log::{debug, warn};
use sheetgrid_core::{col_to_letters, CellRange, CellRef};

use crate::auto_filter::{AutoFilter, FilterOperator, RowView, SortOrder};
use crate::cell::{Cell, ClearMode, CopyMode};
use crate::clipboard::Clipboard;
use crate::cols::Cols;
use crate::error::GridError;
use crate::events::{EventCallback, SheetEvent};
use crate::formula::{Evaluator, Function, Value};
use crate::history::History;
use crate::merges::{Axis, Merges};
use crate::rows::Rows;
use crate::selector::Selector;
use crate::settings::SheetSettings;
use crate::snapshot::SheetData;
use crate::style::{Border, BorderEdge, BorderMode, LineStyle, Style, StyleAttr, StyleTable};
use crate::validation::{Validations, Validator, ValidationError};

// ============================================================================
// Public value types
// ============================================================================

/// Whether a text edit is still being typed or has been committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Input,
    Finished,
}

/// An attribute edit applied to every selected cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellAttr {
    Style(StyleAttr),
    Border {
        mode: BorderMode,
        line: LineStyle,
        color: String,
    },
    Merge(bool),
    Editable(bool),
    /// Write `=FN(range)` below or right of the selection.
    Formula(Function),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Rectangle of a range. `left`/`top` are scroll-adjusted unless the range
/// starts inside the frozen pane; `l`/`t` are absolute.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub l: f64,
    pub t: f64,
}

/// Result of a hit test. `None` means the header gutter was hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellHit {
    pub ri: Option<usize>,
    pub ci: Option<usize>,
    pub rect: Rect,
}

/// Scroll position snapped to cell boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scroll {
    pub x: f64,
    pub y: f64,
    pub ri: usize,
    pub ci: usize,
}

/// Visible area available to the grid, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Walk `min..max` accumulating `getv` onto `inits` until the sum passes
/// `ifv`. Returns the stop index, the offset where the last item began, and
/// that item's size.
fn range_reduce_if(
    min: usize,
    max: usize,
    inits: f64,
    initv: f64,
    ifv: f64,
    getv: impl Fn(usize) -> f64,
) -> (usize, f64, f64) {
    let mut s = inits;
    let mut v = initv;
    let mut i = min;
    while i < max {
        if s > ifv {
            break;
        }
        v = getv(i);
        s += v;
        i += 1;
    }
    (i, s - v, v)
}

/// Report a rejected operation through `on_error`.
fn report(result: Result<bool, GridError>, on_error: impl FnOnce(&str)) -> bool {
    match result {
        Ok(applied) => applied,
        Err(e) => {
            warn!("operation rejected: {e}");
            on_error(&e.to_string());
            false
        }
    }
}

// ============================================================================
// DataProxy
// ============================================================================

pub struct DataProxy {
    pub name: String,
    settings: SheetSettings,
    freeze: CellRef,
    styles: StyleTable,
    merges: Merges,
    rows: Rows,
    cols: Cols,
    validations: Validations,
    auto_filter: AutoFilter,

    // Session state, never persisted.
    selector: Selector,
    scroll: Scroll,
    history: History,
    clipboard: Clipboard,
    row_view: RowView,
    /// State before the current run of `EditState::Input` edits.
    edit_snapshot: Option<SheetData>,
    revision: u64,
    on_change: Option<EventCallback>,
}

impl DataProxy {
    pub fn new(name: impl Into<String>, settings: SheetSettings) -> Self {
        let rows = Rows::new(settings.rows.len, settings.rows.height);
        let cols = Cols::new(
            settings.cols.len,
            settings.cols.width,
            settings.cols.index_width,
            settings.cols.min_width,
        );
        Self {
            name: name.into(),
            settings,
            freeze: CellRef::default(),
            styles: StyleTable::new(),
            merges: Merges::new(),
            rows,
            cols,
            validations: Validations::new(),
            auto_filter: AutoFilter::default(),
            selector: Selector::default(),
            scroll: Scroll::default(),
            history: History::new(),
            clipboard: Clipboard::default(),
            row_view: RowView::default(),
            edit_snapshot: None,
            revision: 0,
            on_change: None,
        }
    }

    /// Receive an event after every committed transaction.
    pub fn subscribe(&mut self, callback: impl FnMut(&SheetEvent) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn settings(&self) -> &SheetSettings {
        &self.settings
    }

    pub fn rows(&self) -> &Rows {
        &self.rows
    }

    pub fn cols(&self) -> &Cols {
        &self.cols
    }

    pub fn merges(&self) -> &Merges {
        &self.merges
    }

    pub fn styles(&self) -> &StyleTable {
        &self.styles
    }

    pub fn auto_filter(&self) -> &AutoFilter {
        &self.auto_filter
    }

    pub fn row_view(&self) -> &RowView {
        &self.row_view
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn scroll(&self) -> &Scroll {
        &self.scroll
    }

    pub fn freeze(&self) -> CellRef {
        self.freeze
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    fn writable(&self, op: &str) -> bool {
        if self.settings.is_read_only() {
            warn!("{op}: {}", GridError::ReadOnly);
            return false;
        }
        true
    }

    fn notify(&mut self, make: fn(u64) -> SheetEvent) {
        self.revision += 1;
        let event = make(self.revision);
        if let Some(callback) = self.on_change.as_mut() {
            callback(&event);
        }
    }

    fn changed(revision: u64) -> SheetEvent {
        SheetEvent::Changed { revision }
    }

    fn restored(revision: u64) -> SheetEvent {
        SheetEvent::Restored { revision }
    }

    /// Snapshot, mutate, notify. Returns false when nothing was applied.
    fn change_data(&mut self, op: &str, mutate: impl FnOnce(&mut Self)) -> bool {
        if !self.writable(op) {
            return false;
        }
        let before = self.get_data();
        if let Err(e) = self.history.add(&before) {
            warn!("{op}: snapshot failed: {e}");
            return false;
        }
        debug!("transaction: {op}");
        self.edit_snapshot = None;
        mutate(self);
        self.reset_row_view();
        self.notify(Self::changed);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo(&mut self) -> bool {
        if !self.writable("undo") {
            return false;
        }
        let current = self.get_data();
        match self.history.undo(&current) {
            Ok(Some(data)) => {
                self.set_data(data);
                self.notify(Self::restored);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("undo: could not restore snapshot: {e}");
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        if !self.writable("redo") {
            return false;
        }
        let current = self.get_data();
        match self.history.redo(&current) {
            Ok(Some(data)) => {
                self.set_data(data);
                self.notify(Self::restored);
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("redo: could not restore snapshot: {e}");
                false
            }
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn get_data(&self) -> SheetData {
        SheetData {
            name: self.name.clone(),
            freeze: self.freeze,
            styles: self.styles.clone(),
            merges: self.merges.clone(),
            rows: self.rows.data(),
            cols: self.cols.data(),
            validations: self.validations.data(),
            autofilter: self.auto_filter.clone(),
        }
    }

    /// Replace the sheet state. Not recorded in history.
    pub fn set_data(&mut self, data: SheetData) {
        self.name = data.name;
        self.freeze = data.freeze;
        self.styles = data.styles;
        self.merges = data.merges;
        let mut rows = data.rows;
        if rows.len == 0 {
            rows.len = self.settings.rows.len;
        }
        self.rows.set_data(rows);
        let mut cols = data.cols;
        if cols.len == 0 {
            cols.len = self.settings.cols.len;
        }
        self.cols.set_data(cols);
        self.validations.set_data(data.validations);
        self.auto_filter = data.autofilter;
        self.edit_snapshot = None;
        self.reset_row_view();
    }

    pub fn to_json(&self) -> Result<String, GridError> {
        self.get_data().to_json()
    }

    pub fn load_json(&mut self, input: &str) -> Result<(), GridError> {
        let data = SheetData::from_json(input)?;
        self.set_data(data);
        Ok(())
    }

    /// Rows with formula cells rendered to values.
    pub fn export_rows(&self) -> crate::rows::RowsData {
        self.rows
            .export_data(self.settings.max_eval_depth, self.settings.max_range_cells)
    }

    // ========================================================================
    // Cells, styles and evaluation
    // ========================================================================

    pub fn cell(&self, ri: usize, ci: usize) -> Option<&Cell> {
        self.rows.cell(ri, ci)
    }

    pub fn cell_text(&self, ri: usize, ci: usize) -> &str {
        self.rows.cell_text(ri, ci)
    }

    pub fn cell_style(&self, ri: usize, ci: usize) -> Option<&Style> {
        self.cell(ri, ci)?.style.and_then(|i| self.styles.get(i))
    }

    /// Cell style with unset fields filled from the sheet default.
    pub fn cell_style_or_default(&self, ri: usize, ci: usize) -> Style {
        match self.cell_style(ri, ci) {
            Some(style) => style.resolved(&self.settings.style),
            None => self.settings.style.clone(),
        }
    }

    pub fn selected_cell_style(&self) -> Style {
        self.cell_style_or_default(self.selector.ri, self.selector.ci)
    }

    /// Evaluate a cell's content. Formula errors come back as `Value::Error`.
    pub fn evaluate_cell(&self, ri: usize, ci: usize) -> Value {
        let lookup = |col: usize, row: usize| self.rows.cell_text(row, col).to_string();
        Evaluator::new(&lookup)
            .with_max_depth(self.settings.max_eval_depth)
            .with_max_range_cells(self.settings.max_range_cells)
            .evaluate_cell(ci, ri)
    }

    /// Display text of a cell: formulas evaluated, then the cell's format
    /// applied.
    pub fn render_cell(&self, ri: usize, ci: usize) -> String {
        let text = self.cell_text(ri, ci);
        let value = if text.starts_with('=') {
            self.evaluate_cell(ri, ci).to_text()
        } else {
            text.to_string()
        };
        let format = self.cell_style_or_default(ri, ci).format.unwrap_or_default();
        format.render(&value)
    }

    /// Set a cell's text. `Input` edits notify without touching history;
    /// `Finished` records the state from before the edit began.
    pub fn set_cell_text(&mut self, ri: usize, ci: usize, text: &str, state: EditState) -> bool {
        if !self.writable("set_cell_text") {
            return false;
        }
        match state {
            EditState::Input => {
                if self.edit_snapshot.is_none() {
                    self.edit_snapshot = Some(self.get_data());
                }
                self.rows.set_cell_text(ri, ci, text);
            }
            EditState::Finished => {
                let before = self.edit_snapshot.take().unwrap_or_else(|| self.get_data());
                if let Err(e) = self.history.add(&before) {
                    warn!("set_cell_text: snapshot failed: {e}");
                    return false;
                }
                debug!("transaction: set_cell_text {}", CellRef::new(ci, ri));
                self.rows.set_cell_text(ri, ci, text);
                self.reset_row_view();
            }
        }
        self.validations.validate(ri, ci, text);
        self.notify(Self::changed);
        true
    }

    /// Edit the active cell. The active row is a view row and is mapped to
    /// its storage row; filter values matching the old text follow the edit.
    pub fn set_selected_cell_text(&mut self, text: &str, state: EditState) -> bool {
        let ri = self.row_view.to_storage(self.selector.ri);
        let ci = self.selector.ci;
        let old = self.rows.cell_text(ri, ci).to_string();
        if !self.set_cell_text(ri, ci, text, state) {
            return false;
        }
        if let Some(filter) = self.auto_filter.get_filter_mut(ci) {
            if let Some(v) = filter.value.iter_mut().find(|v| **v == old) {
                *v = text.to_string();
            }
        }
        if state == EditState::Finished {
            self.reset_row_view();
        }
        true
    }

    /// Clear part of every selected cell.
    pub fn delete_cells(&mut self, what: ClearMode) -> bool {
        let Some(range) = self.selector.range else {
            return false;
        };
        self.change_data("delete_cells", |d| {
            d.rows.delete_cells(&range, what);
            if matches!(what, ClearMode::All | ClearMode::Format) {
                d.merges.delete_within(&range);
            }
        })
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn selected_range(&self) -> Option<CellRange> {
        self.selector.range
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Select `range` as-is, with its top-left as the active cell.
    pub fn select(&mut self, range: CellRange) {
        self.selector.set(range, range.sri, range.sci);
    }

    /// Select a cell, widened to the merge covering it.
    pub fn select_cell(&mut self, ri: usize, ci: usize) -> CellRange {
        let range = self
            .merges
            .get_first_includes(ri, ci)
            .copied()
            .unwrap_or_else(|| CellRange::single(ri, ci));
        self.selector.set(range, ri, ci);
        range
    }

    pub fn select_row(&mut self, ri: usize) -> CellRange {
        let range = CellRange::new(ri, 0, ri, self.cols.len.saturating_sub(1));
        self.selector.set(range, ri, 0);
        range
    }

    pub fn select_col(&mut self, ci: usize) -> CellRange {
        let range = CellRange::new(0, ci, self.rows.len.saturating_sub(1), ci);
        self.selector.set(range, 0, ci);
        range
    }

    /// Stretch the selection from the active cell to `(ri, ci)`, growing it
    /// to cover every merge it touches.
    pub fn extend_selection_to(&mut self, ri: usize, ci: usize) -> CellRange {
        let anchor = CellRange::single(self.selector.ri, self.selector.ci);
        let range = self.merges.union(&anchor.union(&CellRange::single(ri, ci)));
        self.selector.range = Some(range);
        range
    }

    /// Storage cell under the active cell.
    pub fn selected_cell(&self) -> Option<&Cell> {
        let ri = self.row_view.to_storage(self.selector.ri);
        self.rows.cell(ri, self.selector.ci)
    }

    /// True when the selection is one cell or exactly one merge.
    pub fn is_single_selected(&self) -> bool {
        let Some(range) = self.selector.range else {
            return true;
        };
        self.is_exact_merge(&range) || !range.is_multiple()
    }

    pub fn can_unmerge(&self) -> bool {
        self.selector.range.is_some_and(|r| self.is_exact_merge(&r))
    }

    fn is_exact_merge(&self, range: &CellRange) -> bool {
        match self.rows.cell(range.sri, range.sci).and_then(|c| c.merge) {
            Some((rn, cn)) => range.sri + rn == range.eri && range.sci + cn == range.eci,
            None => false,
        }
    }

    // ========================================================================
    // Merges
    // ========================================================================

    /// Merge the selection. Merges inside it are absorbed; a merge that
    /// sticks out of it is rejected.
    pub fn merge(&mut self, on_error: impl FnOnce(&str)) -> bool {
        let result = self.try_merge();
        report(result, on_error)
    }

    fn try_merge(&mut self) -> Result<bool, GridError> {
        let range = self.selector.range.ok_or(GridError::NoSelection)?;
        if self.is_single_selected() {
            return Ok(false);
        }
        if let Some(m) = self.merges.iter().find(|m| m.intersects(&range) && !m.within(&range)) {
            return Err(GridError::MergeOverlap(*m));
        }
        let (rn, cn) = range.size();
        Ok(self.change_data("merge", |d| {
            let mut anchor = d.rows.cell(range.sri, range.sci).cloned().unwrap_or_default();
            anchor.merge = Some((rn - 1, cn - 1));
            d.merges.add(range);
            d.rows.delete_cells(&range, ClearMode::All);
            d.rows.set_cell(range.sri, range.sci, anchor, CopyMode::All);
        }))
    }

    pub fn unmerge(&mut self) -> bool {
        let Some(range) = self.selector.range else {
            return false;
        };
        if !self.is_single_selected() {
            return false;
        }
        self.change_data("unmerge", |d| {
            d.rows.delete_cell(range.sri, range.sci, ClearMode::Merge);
            d.merges.delete_within(&range);
        })
    }

    pub fn each_merge_in_view(&self, view: &CellRange, mut f: impl FnMut(&CellRange)) {
        for m in self.merges.filter_intersects(view) {
            f(&m);
        }
    }

    // ========================================================================
    // Cell attributes and styles
    // ========================================================================

    pub fn set_selected_cell_attr(&mut self, attr: CellAttr) -> bool {
        let Some(range) = self.selector.range else {
            return false;
        };
        match attr {
            CellAttr::Merge(true) => self.merge(|_| {}),
            CellAttr::Merge(false) => self.unmerge(),
            CellAttr::Border { mode, line, color } => {
                self.change_data("border", |d| d.set_style_borders(range, mode, line, &color))
            }
            CellAttr::Formula(function) => {
                let (ri, ci) = (self.selector.ri, self.selector.ci);
                self.change_data("formula", |d| d.insert_formula(range, ri, ci, function))
            }
            CellAttr::Style(style_attr) => self.change_data("style", |d| {
                range.each(|ri, ci| d.apply_style(ri, ci, |style| style_attr.apply(style)));
            }),
            CellAttr::Editable(editable) => self.change_data("editable", |d| {
                range.each(|ri, ci| d.rows.cell_or_new(ri, ci).editable = editable);
            }),
        }
    }

    /// Copy-on-write style edit: the cell ends up pointing at the interned
    /// result.
    fn apply_style(&mut self, ri: usize, ci: usize, edit: impl FnOnce(&mut Style)) {
        let cell = self.rows.cell_or_new(ri, ci);
        let mut style = cell
            .style
            .and_then(|i| self.styles.get(i))
            .cloned()
            .unwrap_or_default();
        edit(&mut style);
        cell.style = Some(self.styles.intern(style));
    }

    fn set_border(&mut self, ri: usize, ci: usize, border: Border) {
        self.apply_style(ri, ci, |style| {
            style.border.get_or_insert_with(Border::default).merge(&border);
        });
    }

    fn set_style_borders(&mut self, range: CellRange, mode: BorderMode, line: LineStyle, color: &str) {
        let edge = || Some(BorderEdge(line, color.to_string()));
        let multiple = !self.is_single_selected();
        let CellRange { sri, sci, eri, eci, .. } = range;
        match mode {
            BorderMode::Inside | BorderMode::Horizontal | BorderMode::Vertical if !multiple => {}
            BorderMode::Outside if !multiple => {
                let all = Border { top: edge(), bottom: edge(), left: edge(), right: edge() };
                self.set_border(sri, sci, all);
            }
            BorderMode::None => range.each(|ri, ci| {
                if self.rows.cell(ri, ci).and_then(|c| c.style).is_some() {
                    self.apply_style(ri, ci, |style| style.border = None);
                }
            }),
            BorderMode::All
            | BorderMode::Inside
            | BorderMode::Outside
            | BorderMode::Horizontal
            | BorderMode::Vertical => {
                for ri in sri..=eri {
                    for ci in sci..=eci {
                        // Cells covered by a merge take the anchor's border.
                        if let Some(m) = self.merges.get_first_includes(ri, ci) {
                            if (m.sri, m.sci) != (ri, ci) {
                                continue;
                            }
                        }
                        let (rn, cn) = self.rows.cell_merge(ri, ci);
                        let mut border = Border::default();
                        match mode {
                            BorderMode::All => {
                                border = Border { top: edge(), bottom: edge(), left: edge(), right: edge() };
                            }
                            BorderMode::Inside => {
                                if ci + cn < eci {
                                    border.right = edge();
                                }
                                if ri + rn < eri {
                                    border.bottom = edge();
                                }
                            }
                            BorderMode::Horizontal => {
                                if ri + rn < eri {
                                    border.bottom = edge();
                                }
                            }
                            BorderMode::Vertical => {
                                if ci + cn < eci {
                                    border.right = edge();
                                }
                            }
                            _ => {
                                if ri == sri {
                                    border.top = edge();
                                }
                                if ri + rn == eri {
                                    border.bottom = edge();
                                }
                                if ci == sci {
                                    border.left = edge();
                                }
                                if ci + cn == eci {
                                    border.right = edge();
                                }
                            }
                        }
                        if !border.is_empty() {
                            self.set_border(ri, ci, border);
                        }
                    }
                }
            }
            BorderMode::Top | BorderMode::Bottom => {
                let ri = if mode == BorderMode::Top { sri } else { eri };
                let mut ci = sci;
                while ci <= eci {
                    let border = if mode == BorderMode::Top {
                        Border { top: edge(), ..Border::default() }
                    } else {
                        Border { bottom: edge(), ..Border::default() }
                    };
                    self.set_border(ri, ci, border);
                    ci += self.rows.cell_merge(ri, ci).1 + 1;
                }
            }
            BorderMode::Left | BorderMode::Right => {
                let ci = if mode == BorderMode::Left { sci } else { eci };
                let mut ri = sri;
                while ri <= eri {
                    let border = if mode == BorderMode::Left {
                        Border { left: edge(), ..Border::default() }
                    } else {
                        Border { right: edge(), ..Border::default() }
                    };
                    self.set_border(ri, ci, border);
                    ri += self.rows.cell_merge(ri, ci).0 + 1;
                }
            }
        }
    }

    /// `=FN(col range)` under each column of a tall selection, `=FN(row range)`
    /// right of a wide one, `=FN()` into a single cell.
    fn insert_formula(&mut self, range: CellRange, ri: usize, ci: usize, function: Function) {
        let name = function.name();
        let (rn, cn) = range.size();
        if rn > 1 {
            for col in range.sci..=range.eci {
                let letters = col_to_letters(col);
                let text = format!("={name}({letters}{}:{letters}{})", range.sri + 1, range.eri + 1);
                self.rows.cell_or_new(range.eri + 1, col).text = Some(text);
            }
        } else if cn > 1 {
            let from = CellRef::new(range.sci, ri);
            let to = CellRef::new(range.eci, ri);
            self.rows.cell_or_new(ri, range.eci + 1).text = Some(format!("={name}({from}:{to})"));
        } else {
            self.rows.cell_or_new(ri, ci).text = Some(format!("={name}()"));
        }
    }

    // ========================================================================
    // Clipboard
    // ========================================================================

    pub fn copy(&mut self) -> bool {
        match self.selector.range {
            Some(range) => {
                self.clipboard = Clipboard::Copy(range);
                true
            }
            None => false,
        }
    }

    pub fn cut(&mut self) -> bool {
        match self.selector.range {
            Some(range) => {
                self.clipboard = Clipboard::Cut(range);
                true
            }
            None => false,
        }
    }

    pub fn clear_clipboard(&mut self) {
        self.clipboard.clear();
    }

    /// Cells a paste of `src` at `dst` can write: whole copies of the
    /// source tiled from `dst`'s top-left until `dst` is covered.
    fn paste_footprint(src: &CellRange, dst: &CellRange) -> CellRange {
        let (srn, scn) = src.size();
        let (drn, dcn) = dst.size();
        CellRange::new(
            dst.sri,
            dst.sci,
            dst.sri + drn.div_ceil(srn) * srn - 1,
            dst.sci + dcn.div_ceil(scn) * scn - 1,
        )
    }

    /// A paste may land on a merge only when its footprint is exactly that
    /// merge.
    fn can_paste(&self, src: &CellRange, dst: &CellRange) -> Result<(), GridError> {
        let footprint = Self::paste_footprint(src, dst);
        if self.merges.iter().any(|m| m.intersects(&footprint) && *m != footprint) {
            return Err(GridError::PasteIntoMerge);
        }
        Ok(())
    }

    /// A cut moves whole merges only.
    fn can_cut(&self, src: &CellRange) -> Result<(), GridError> {
        match self.merges.iter().find(|m| m.intersects(src) && !m.within(src)) {
            Some(m) => Err(GridError::CutSplitsMerge(*m)),
            None => Ok(()),
        }
    }

    /// Drop merges inside `footprint` except those inside `keep`, clearing
    /// the anchor markers `rewritten` does not cover.
    fn drop_stale_merges(&mut self, footprint: &CellRange, keep: Option<&CellRange>, rewritten: &[CellRange]) {
        let stale: Vec<CellRange> = self
            .merges
            .iter()
            .filter(|m| m.within(footprint) && !keep.is_some_and(|k| m.within(k)))
            .copied()
            .collect();
        for m in stale {
            self.merges.delete_within(&m);
            if !rewritten.iter().any(|p| (p.sri, p.sci) == (m.sri, m.sci)) {
                self.rows.delete_cell(m.sri, m.sci, ClearMode::Merge);
            }
        }
    }

    fn copy_paste(&mut self, src: CellRange, dst: CellRange, what: CopyMode, autofill: bool) {
        let mut pasted = Vec::new();
        self.rows.copy_paste(&src, &dst, what, autofill, |ri, ci, cell| {
            if let Some((rn, cn)) = cell.merge.filter(|&span| span != (0, 0)) {
                pasted.push(CellRange::new(ri, ci, ri + rn, ci + cn));
            }
        });
        // Text pastes leave formats and merges alone.
        if what == CopyMode::Text {
            return;
        }
        let footprint = Self::paste_footprint(&src, &dst);
        let (srn, scn) = src.size();
        let tile_of = |m: &CellRange| {
            let sri = dst.sri + (m.sri - dst.sri) / srn * srn;
            let sci = dst.sci + (m.sci - dst.sci) / scn * scn;
            CellRange::new(sri, sci, sri + srn - 1, sci + scn - 1)
        };
        // A merge only partly inside the source arrives as a plain cell.
        let (inside, outside): (Vec<_>, Vec<_>) = pasted.into_iter().partition(|m| m.within(&tile_of(m)));
        for m in &outside {
            if let Some(cell) = self.rows.cell_mut(m.sri, m.sci) {
                cell.merge = None;
            }
        }
        self.drop_stale_merges(&footprint, None, &inside);
        for m in inside {
            self.merges.add(m);
        }
    }

    fn cut_paste(&mut self, src: CellRange, dst: CellRange) {
        let footprint = Self::paste_footprint(&src, &CellRange::single(dst.sri, dst.sci));
        self.drop_stale_merges(&footprint, Some(&src), &[]);
        self.rows.cut_paste(&src, &dst);
        let drow = dst.sri as isize - src.sri as isize;
        let dcol = dst.sci as isize - src.sci as isize;
        self.merges.move_within(&src, drow, dcol);
        self.clipboard.clear();
    }

    /// Paste the clipboard at the selection.
    pub fn paste(&mut self, what: CopyMode, on_error: impl FnOnce(&str)) -> bool {
        if self.clipboard.is_clear() {
            return false;
        }
        let result = self.try_paste(what);
        report(result, on_error)
    }

    fn try_paste(&mut self, what: CopyMode) -> Result<bool, GridError> {
        let dst = self.selector.range.ok_or(GridError::NoSelection)?;
        let clipboard = self.clipboard;
        let src = *clipboard.range().ok_or(GridError::EmptyClipboard)?;
        if clipboard.is_cut() {
            self.can_cut(&src)?;
            self.can_paste(&src, &CellRange::single(dst.sri, dst.sci))?;
        } else {
            self.can_paste(&src, &dst)?;
        }
        Ok(self.change_data("paste", |d| match clipboard {
            Clipboard::Copy(_) => d.copy_paste(src, dst, what, false),
            Clipboard::Cut(_) => d.cut_paste(src, dst),
            Clipboard::Clear => {}
        }))
    }

    /// Fill `range` from the selection, continuing numeric series.
    pub fn autofill(&mut self, range: CellRange, what: CopyMode, on_error: impl FnOnce(&str)) -> bool {
        let result = self.try_autofill(range, what);
        report(result, on_error)
    }

    fn try_autofill(&mut self, dst: CellRange, what: CopyMode) -> Result<bool, GridError> {
        let src = self.selector.range.ok_or(GridError::NoSelection)?;
        self.can_paste(&src, &dst)?;
        Ok(self.change_data("autofill", |d| d.copy_paste(src, dst, what, true)))
    }

    /// Paste tab/newline separated text at the selection. Double quotes are
    /// dropped.
    pub fn paste_from_text(&mut self, text: &str) -> bool {
        let Some(range) = self.selector.range else {
            return false;
        };
        let separator = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let block: Vec<Vec<String>> = text
            .split(separator)
            .map(|line| line.replace('"', "").split('\t').map(str::to_string).collect())
            .collect();
        self.change_data("paste_from_text", |d| d.rows.paste_text(&block, &range))
    }

    /// The selection as tab/newline separated text.
    pub fn copy_to_text(&self) -> String {
        let Some(range) = self.selector.range else {
            return String::new();
        };
        (range.sri..=range.eri)
            .map(|ri| {
                (range.sci..=range.eci)
                    .map(|ci| self.rows.cell_text(ri, ci))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    // ========================================================================
    // Structural edits
    // ========================================================================

    /// Insert `n` rows or columns at `index`.
    pub fn insert_at(&mut self, axis: Axis, index: usize, n: usize) -> bool {
        if n == 0 {
            return false;
        }
        self.change_data("insert", |d| {
            match axis {
                Axis::Row => d.rows.insert(index, n),
                Axis::Column => {
                    d.rows.insert_columns(index, n);
                    d.cols.insert(index, n);
                }
            }
            d.shift_merges(axis, index, n as isize);
        })
    }

    /// Delete rows or columns `start..=end`. At least one row and one
    /// column always remain.
    pub fn delete_at(&mut self, axis: Axis, start: usize, end: usize) -> bool {
        let len = match axis {
            Axis::Row => self.rows.len,
            Axis::Column => self.cols.len,
        };
        let (start, end) = (start.min(end), start.max(end).min(len.saturating_sub(1)));
        if start > end || end - start + 1 >= len {
            return false;
        }
        let n = end - start + 1;
        self.change_data("delete", |d| {
            match axis {
                Axis::Row => d.rows.delete(start, end),
                Axis::Column => {
                    d.rows.delete_columns(start, end);
                    d.cols.delete(start, end);
                }
            }
            d.shift_merges(axis, start, -(n as isize));
        })
    }

    fn shift_merges(&mut self, axis: Axis, index: usize, n: isize) {
        let rows = &mut self.rows;
        self.merges.shift(axis, index, n, |ri, ci, drows, dcols| {
            if let Some(cell) = rows.cell_mut(ri, ci) {
                if let Some((rn, cn)) = cell.merge {
                    let span = (rn.saturating_add_signed(drows), cn.saturating_add_signed(dcols));
                    cell.merge = (span != (0, 0)).then_some(span);
                }
            }
        });
    }

    /// Insert `n` rows or columns before the selection.
    pub fn insert(&mut self, axis: Axis, n: usize) -> bool {
        let Some(range) = self.selector.range else {
            return false;
        };
        let index = match axis {
            Axis::Row => range.sri,
            Axis::Column => range.sci,
        };
        self.insert_at(axis, index, n)
    }

    /// Delete the selected rows or columns.
    pub fn delete(&mut self, axis: Axis) -> bool {
        let Some(range) = self.selector.range else {
            return false;
        };
        match axis {
            Axis::Row => self.delete_at(axis, range.sri, range.eri),
            Axis::Column => self.delete_at(axis, range.sci, range.eci),
        }
    }

    pub fn set_row_height(&mut self, ri: usize, height: f64) -> bool {
        self.change_data("row_height", |d| d.rows.set_height(ri, height))
    }

    pub fn set_col_width(&mut self, ci: usize, width: f64) -> bool {
        self.change_data("col_width", |d| d.cols.set_width(ci, width))
    }

    /// Hide the selected columns when whole columns are selected, or the
    /// selected rows when whole rows are.
    pub fn hide_rows_or_cols(&mut self) -> bool {
        let Some(range) = self.selector.range else {
            return false;
        };
        let (rlen, clen) = range.size();
        if rlen == self.rows.len {
            self.change_data("hide_cols", |d| {
                (range.sci..=range.eci).for_each(|ci| d.cols.set_hidden(ci, true));
            })
        } else if clen == self.cols.len {
            self.change_data("hide_rows", |d| {
                (range.sri..=range.eri).for_each(|ri| d.rows.set_hidden(ri, true));
            })
        } else {
            false
        }
    }

    /// Unhide the hidden run just before `index`.
    pub fn unhide(&mut self, axis: Axis, index: usize) -> bool {
        self.change_data("unhide", |d| match axis {
            Axis::Row => d.rows.unhide(index),
            Axis::Column => d.cols.unhide(index),
        })
    }

    // ========================================================================
    // Validation
    // ========================================================================

    pub fn add_validation(&mut self, mode: &str, range: CellRange, validator: Validator) -> bool {
        self.change_data("add_validation", |d| d.validations.add(mode, range, validator))
    }

    /// Remove validation from the selection.
    pub fn remove_validation(&mut self) -> bool {
        let Some(range) = self.selector.range else {
            return false;
        };
        self.change_data("remove_validation", |d| d.validations.remove(&range))
    }

    pub fn selected_validator(&self) -> Option<&Validator> {
        self.validations
            .get(self.selector.ri, self.selector.ci)
            .map(|v| &v.validator)
    }

    pub fn validation_error(&self, ri: usize, ci: usize) -> Option<&ValidationError> {
        self.validations.error_at(ri, ci)
    }

    pub fn validations(&self) -> &Validations {
        &self.validations
    }

    // ========================================================================
    // Auto-filter
    // ========================================================================

    pub fn can_autofilter(&self) -> bool {
        !self.auto_filter.active()
    }

    /// Turn the filter off, or on over the selection.
    pub fn toggle_autofilter(&mut self) -> bool {
        let selection = self.selector.range;
        if !self.auto_filter.active() && selection.is_none() {
            return false;
        }
        self.change_data("autofilter", |d| {
            if d.auto_filter.active() {
                d.auto_filter.clear();
            } else {
                d.auto_filter.range = selection;
            }
            d.reset_row_view();
        })
    }

    pub fn set_autofilter(
        &mut self,
        ci: usize,
        order: Option<SortOrder>,
        operator: FilterOperator,
        value: Vec<String>,
    ) -> bool {
        if !self.auto_filter.active() {
            return false;
        }
        self.change_data("set_autofilter", |d| {
            d.auto_filter.add_filter(ci, operator, value);
            d.auto_filter.set_sort(ci, order);
            d.reset_row_view();
        })
    }

    /// Recompute hidden rows and sort order from the current data.
    pub fn reset_autofilter(&mut self) {
        self.reset_row_view();
    }

    fn reset_row_view(&mut self) {
        let rows = &self.rows;
        self.row_view = self.auto_filter.row_view(|ri, ci| rows.cell_text(ri, ci));
    }

    pub fn filter_items(&self, ci: usize) -> std::collections::BTreeMap<String, usize> {
        self.auto_filter.items(ci, |ri, c| self.rows.cell_text(ri, c))
    }

    // ========================================================================
    // Freeze
    // ========================================================================

    pub fn set_freeze(&mut self, ri: usize, ci: usize) -> bool {
        self.change_data("freeze", |d| d.freeze = CellRef::new(ci, ri))
    }

    pub fn freeze_is_active(&self) -> bool {
        self.freeze.row > 0 || self.freeze.col > 0
    }

    pub fn freeze_total_width(&self) -> f64 {
        self.cols.sum_width(0, self.freeze.col)
    }

    pub fn freeze_total_height(&self) -> f64 {
        self.rows.sum_height(0, self.freeze.row, None)
    }

    /// The frozen top-left block, when a freeze is set.
    pub fn freeze_view_range(&self) -> Option<CellRange> {
        if !self.freeze_is_active() {
            return None;
        }
        let range = CellRange::new(
            0,
            0,
            self.freeze.row.saturating_sub(1),
            self.freeze.col.saturating_sub(1),
        );
        Some(range.with_size(self.freeze_total_width(), self.freeze_total_height()))
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    /// Pixel rectangle of a cell, spanning its merge if it anchors one.
    pub fn cell_rect(&self, ri: usize, ci: usize) -> Rect {
        let (rn, cn) = self.rows.cell_merge(ri, ci);
        Rect {
            left: self.cols.sum_width(0, ci),
            top: self.rows.sum_height(0, ri, None),
            width: self.cols.sum_width(ci, ci + cn + 1),
            height: self.rows.sum_height(ri, ri + rn + 1, None),
        }
    }

    pub fn get_rect(&self, range: &CellRange) -> RangeRect {
        let hidden = Some(self.row_view.hidden());
        let left = self.cols.sum_width(0, range.sci);
        let top = self.rows.sum_height(0, range.sri, hidden);
        let width = self.cols.sum_width(range.sci, range.eci + 1);
        let height = self.rows.sum_height(range.sri, range.eri + 1, hidden);
        let fsw = self.freeze_total_width();
        let fsh = self.freeze_total_height();
        RangeRect {
            left: if fsw > 0.0 && fsw > left { left } else { left - self.scroll.x },
            top: if fsh > 0.0 && fsh > top { top } else { top - self.scroll.y },
            width,
            height,
            l: left,
            t: top,
        }
    }

    pub fn selected_rect(&self) -> Option<RangeRect> {
        self.selector.range.map(|r| self.get_rect(&r))
    }

    pub fn clipboard_rect(&self) -> Option<RangeRect> {
        self.clipboard.range().map(|r| self.get_rect(r))
    }

    /// Is a point (in canvas coordinates) inside the selection?
    pub fn xy_in_selected_rect(&self, x: f64, y: f64) -> bool {
        let Some(rect) = self.selected_rect() else {
            return false;
        };
        let x1 = x - self.cols.index_width;
        let y1 = y - self.rows.default_height;
        x1 > rect.left && x1 < rect.left + rect.width && y1 > rect.top && y1 < rect.top + rect.height
    }

    fn row_by_y(&self, y: f64) -> (Option<usize>, f64, f64) {
        let header = self.rows.default_height;
        let mut top = header;
        if self.freeze_total_height() + header < y {
            top -= self.scroll.y;
        }
        let hidden = self.row_view.hidden();
        let mut height = header;
        let mut ri = 0;
        while ri < self.rows.len {
            if top > y {
                break;
            }
            if !hidden.contains(&ri) {
                height = self.rows.height(ri);
                top += height;
            }
            ri += 1;
        }
        top -= height;
        if top <= 0.0 || ri == 0 {
            (None, 0.0, height)
        } else {
            (Some(ri - 1), top, height)
        }
    }

    fn col_by_x(&self, x: f64) -> (Option<usize>, f64, f64) {
        let gutter = self.cols.index_width;
        let mut inits = gutter;
        if self.freeze_total_width() + gutter < x {
            inits -= self.scroll.x;
        }
        let (ci, left, width) = range_reduce_if(0, self.cols.len, inits, gutter, x, |i| self.cols.width(i));
        if left <= 0.0 || ci == 0 {
            (None, 0.0, gutter)
        } else {
            (Some(ci - 1), left, width)
        }
    }

    /// Hit test in canvas coordinates (header gutters included). A hit on a
    /// merged cell reports the merge anchor and its full rectangle.
    pub fn cell_at_xy(&self, x: f64, y: f64) -> CellHit {
        let (mut ri, top, mut height) = self.row_by_y(y);
        let (mut ci, left, mut width) = self.col_by_x(x);
        if ci.is_none() {
            width = self.cols.total_width();
        }
        if ri.is_none() {
            height = self.rows.total_height();
        }
        let mut rect = Rect { left, top, width, height };
        if let (Some(r), Some(c)) = (ri, ci) {
            if let Some(m) = self.merges.get_first_includes(r, c) {
                ri = Some(m.sri);
                ci = Some(m.sci);
                rect = self.cell_rect(m.sri, m.sci);
            }
        }
        CellHit { ri, ci, rect }
    }

    /// Snap a horizontal scroll offset to a column boundary past the frozen
    /// columns. Returns true when the scroll position changed.
    pub fn scroll_x(&mut self, x: f64) -> bool {
        let (ci, left, width) =
            range_reduce_if(self.freeze.col, self.cols.len, 0.0, 0.0, x, |i| self.cols.width(i));
        let x1 = if x > 0.0 { left + width } else { left };
        if self.scroll.x == x1 {
            return false;
        }
        self.scroll.ci = if x > 0.0 { ci } else { 0 };
        self.scroll.x = x1;
        true
    }

    pub fn scroll_y(&mut self, y: f64) -> bool {
        let (ri, top, height) =
            range_reduce_if(self.freeze.row, self.rows.len, 0.0, 0.0, y, |i| self.rows.height(i));
        let y1 = if y > 0.0 { top + height } else { top };
        if self.scroll.y == y1 {
            return false;
        }
        self.scroll.ri = if y > 0.0 { ri } else { 0 };
        self.scroll.y = y1;
        true
    }

    /// Cells visible from the current scroll position in `viewport`, with
    /// the covered pixel size attached.
    pub fn view_range(&self, viewport: Viewport) -> CellRange {
        let ri = if self.scroll.ri == 0 { self.freeze.row } else { self.scroll.ri };
        let ci = if self.scroll.ci == 0 { self.freeze.col } else { self.scroll.ci };
        let hidden = self.row_view.hidden();
        let (mut x, mut y) = (0.0, 0.0);
        let (mut eri, mut eci) = (ri, ci);
        for i in ri..self.rows.len {
            if !hidden.contains(&i) {
                y += self.rows.height(i);
                eri = i;
            }
            if y > viewport.height {
                break;
            }
        }
        for j in ci..self.cols.len {
            x += self.cols.width(j);
            eci = j;
            if x > viewport.width {
                break;
            }
        }
        CellRange::new(ri, ci, eri, eci).with_size(x, y)
    }

    /// Populated extent of the sheet.
    pub fn content_range(&self) -> CellRange {
        let (ri, ci) = self.rows.max_cell();
        let h = self.rows.sum_height(0, ri + 1, None);
        let w = self.cols.sum_width(0, ci + 1);
        CellRange::new(0, 0, ri, ci).with_size(w, h)
    }

    /// Visit visible rows from `min` to `max` as `(ri, y, height)`, skipping
    /// filtered and hidden rows, until `viewport_height` is filled.
    pub fn row_each(&self, min: usize, max: usize, viewport_height: f64, mut f: impl FnMut(usize, f64, f64)) {
        let hidden = self.row_view.hidden();
        let mut offset = hidden.range(..min).count();
        let mut y = 0.0;
        let mut i = min + offset;
        while i <= max + offset {
            if hidden.contains(&i) {
                offset += 1;
            } else {
                let height = self.rows.height(i);
                if height > 0.0 {
                    f(i, y, height);
                    y += height;
                    if y > viewport_height {
                        break;
                    }
                }
            }
            i += 1;
        }
    }

    pub fn col_each(&self, min: usize, max: usize, viewport_width: f64, mut f: impl FnMut(usize, f64, f64)) {
        let mut x = 0.0;
        for ci in min..=max {
            let width = self.cols.width(ci);
            if width > 0.0 {
                f(ci, x, width);
                x += width;
                if x > viewport_width {
                    break;
                }
            }
        }
    }
}

impl Default for DataProxy {
    fn default() -> Self {
        Self::new("sheet", SheetSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::events::EventCollector;
    use crate::settings::Mode;
    use crate::style::{Align, Format};
    use crate::validation::ValidatorType;

    fn r(text: &str) -> CellRange {
        text.parse().unwrap()
    }

    fn sheet_with(cells: &[(&str, &str)]) -> DataProxy {
        let mut d = DataProxy::default();
        for (at, text) in cells {
            let cell: CellRef = at.parse().unwrap();
            d.rows.set_cell_text(cell.row, cell.col, text);
        }
        d
    }

    fn text(d: &DataProxy, at: &str) -> String {
        let cell: CellRef = at.parse().unwrap();
        d.cell_text(cell.row, cell.col).to_string()
    }

    #[test]
    fn test_scenario_sum_of_two_cells() {
        let d = sheet_with(&[("A1", "10"), ("A2", "20"), ("A3", "=SUM(A1,A2)")]);
        assert_eq!(d.evaluate_cell(2, 0), Value::Number(30.0));
        assert_eq!(d.render_cell(2, 0), "30");
    }

    #[test]
    fn test_scenario_insert_row_rewrites_formula() {
        let mut d = sheet_with(&[("A1", "5"), ("B1", "=A1+1")]);
        assert!(d.insert_at(Axis::Row, 0, 1));
        assert_eq!(text(&d, "B2"), "=A2+1");
        assert_eq!(text(&d, "B1"), "");
        assert_eq!(d.render_cell(1, 1), "6");
    }

    #[test]
    fn test_scenario_paste_into_merge_rejected() {
        let mut d = sheet_with(&[("A1", "x")]);
        d.select(r("B2:C3"));
        assert!(d.merge(|_| {}));
        let before = d.get_data();

        d.select(r("A1"));
        d.copy();
        d.select(r("B2"));
        let mut message = String::new();
        assert!(!d.paste(CopyMode::All, |m| message = m.to_string()));
        assert_eq!(message, "Unable to paste into merged cells");
        assert_eq!(d.get_data(), before);
    }

    #[test]
    fn test_paste_enclosing_merge_rejected() {
        let mut d = sheet_with(&[("A1", "x")]);
        d.select(r("B2:C3"));
        d.merge(|_| {});
        let before = d.get_data();
        d.select(r("A1"));
        d.copy();
        d.select(r("A1:D4"));
        let mut message = String::new();
        assert!(!d.paste(CopyMode::All, |m| message = m.to_string()));
        assert_eq!(message, "Unable to paste into merged cells");
        assert_eq!(d.get_data(), before);
        assert_eq!(d.merges().iter().copied().collect::<Vec<_>>(), vec![r("B2:C3")]);
    }

    #[test]
    fn test_paste_exactly_covering_merge_is_allowed() {
        let mut d = sheet_with(&[("A1", "a"), ("B1", "b"), ("A2", "c"), ("B2", "d")]);
        d.select(r("D4:E5"));
        d.merge(|_| {});
        d.select(r("A1:B2"));
        d.copy();
        d.select(r("D4:E5"));
        let mut message = String::new();
        assert!(d.paste(CopyMode::All, |m| message = m.to_string()));
        assert!(message.is_empty());
        assert_eq!(text(&d, "D4"), "a");
        assert_eq!(text(&d, "E5"), "d");
        assert!(d.merges().is_empty());
    }

    #[test]
    fn test_cut_of_partial_merge_rejected() {
        let mut d = sheet_with(&[("A1", "m")]);
        d.select(r("A1:B2"));
        d.merge(|_| {});
        d.select(r("A1"));
        d.cut();
        d.select(r("E5"));
        let mut message = String::new();
        assert!(!d.paste(CopyMode::All, |m| message = m.to_string()));
        assert_eq!(message, "Unable to cut part of merged cells A1:B2");
        assert_eq!(d.merges().iter().copied().collect::<Vec<_>>(), vec![r("A1:B2")]);
        assert_eq!(d.cell(0, 0).and_then(|c| c.merge), Some((1, 1)));
        assert!(d.cell(4, 4).is_none());
    }

    #[test]
    fn test_undo_redo_exact() {
        let mut d = sheet_with(&[("A1", "1")]);
        let before = d.get_data();
        d.select(r("A1:B2"));
        d.set_selected_cell_attr(CellAttr::Style(StyleAttr::Bold(true)));
        let after = d.get_data();
        assert_ne!(before, after);

        assert!(d.undo());
        assert_eq!(d.get_data(), before);
        assert!(d.redo());
        assert_eq!(d.get_data(), after);

        d.undo();
        d.set_col_width(0, 120.0);
        assert!(!d.can_redo());
        assert!(!d.redo());
    }

    #[test]
    fn test_undo_on_empty_history_is_noop() {
        let mut d = DataProxy::default();
        assert!(!d.undo());
        assert!(!d.redo());
        assert_eq!(d.revision(), 0);
    }

    #[test]
    fn test_edit_session_undoes_to_original_text() {
        let mut d = sheet_with(&[("A1", "old")]);
        d.set_cell_text(0, 0, "n", EditState::Input);
        d.set_cell_text(0, 0, "ne", EditState::Input);
        d.set_cell_text(0, 0, "new", EditState::Finished);
        assert_eq!(text(&d, "A1"), "new");
        d.undo();
        assert_eq!(text(&d, "A1"), "old");
        assert!(!d.can_undo());
    }

    #[test]
    fn test_events_carry_increasing_revisions() {
        let events = Rc::new(RefCell::new(EventCollector::new()));
        let sink = Rc::clone(&events);
        let mut d = DataProxy::default();
        d.subscribe(move |e| sink.borrow_mut().push(*e));
        d.set_row_height(0, 40.0);
        d.set_col_width(0, 150.0);
        d.undo();
        let events = events.borrow();
        assert_eq!(events.revisions(), vec![1, 2, 3]);
        assert_eq!(events.restored().len(), 1);
    }

    #[test]
    fn test_read_mode_refuses_mutations() {
        let settings = SheetSettings {
            mode: Mode::Read,
            ..SheetSettings::default()
        };
        let mut d = DataProxy::new("ro", settings);
        assert!(!d.set_cell_text(0, 0, "x", EditState::Finished));
        assert!(!d.insert_at(Axis::Row, 0, 1));
        assert_eq!(d.cell_text(0, 0), "");
        assert!(!d.can_undo());
    }

    #[test]
    fn test_merge_rejects_partial_overlap() {
        let mut d = DataProxy::default();
        d.select(r("B2:C3"));
        assert!(d.merge(|_| {}));
        d.select(r("C3:D4"));
        let mut message = String::new();
        assert!(!d.merge(|m| message = m.to_string()));
        assert!(message.contains("B2:C3"));
        d.select(r("A1:D4"));
        assert!(d.merge(|_| {}));
        assert_eq!(d.merges().iter().copied().collect::<Vec<_>>(), vec![r("A1:D4")]);
        assert_eq!(d.cell(0, 0).unwrap().merge, Some((3, 3)));
    }

    #[test]
    fn test_merge_keeps_anchor_and_clears_rest() {
        let mut d = sheet_with(&[("A1", "keep"), ("B1", "drop")]);
        d.select(r("A1:B1"));
        d.set_selected_cell_attr(CellAttr::Merge(true));
        assert_eq!(text(&d, "A1"), "keep");
        assert!(d.cell(0, 1).is_none());
        assert!(d.can_unmerge());
        assert!(d.is_single_selected());
        d.set_selected_cell_attr(CellAttr::Merge(false));
        assert!(d.merges().is_empty());
        assert_eq!(d.cell(0, 0).unwrap().merge, None);
    }

    #[test]
    fn test_select_cell_expands_to_merge() {
        let mut d = DataProxy::default();
        d.select(r("B2:C3"));
        d.merge(|_| {});
        assert_eq!(d.select_cell(2, 2), r("B2:C3"));
        d.select_cell(0, 0);
        assert_eq!(d.extend_selection_to(1, 1), r("A1:C3"));
    }

    #[test]
    fn test_delete_rows_shrinks_merge() {
        let mut d = DataProxy::default();
        d.select(r("A1:A4"));
        d.merge(|_| {});
        d.delete_at(Axis::Row, 1, 2);
        assert_eq!(d.merges().iter().copied().collect::<Vec<_>>(), vec![r("A1:A2")]);
        assert_eq!(d.cell(0, 0).unwrap().merge, Some((1, 0)));
        assert_eq!(d.rows().len, 98);
    }

    #[test]
    fn test_insert_columns_moves_width_and_formulas() {
        let mut d = sheet_with(&[("A1", "=B1*2"), ("B1", "3")]);
        d.set_col_width(1, 150.0);
        d.insert_at(Axis::Column, 1, 1);
        assert_eq!(text(&d, "A1"), "=C1*2");
        assert_eq!(d.cols().width(2), 150.0);
        assert_eq!(d.render_cell(0, 0), "6");
    }

    #[test]
    fn test_autofill_series() {
        let mut d = sheet_with(&[("A1", "Item 1")]);
        d.select(r("A1"));
        assert!(d.autofill(r("A2:A3"), CopyMode::All, |_| {}));
        assert_eq!(text(&d, "A3"), "Item 3");
    }

    #[test]
    fn test_cut_paste_moves_merge_and_clears_clipboard() {
        let mut d = sheet_with(&[("A1", "m")]);
        d.select(r("A1:B1"));
        d.merge(|_| {});
        d.cut();
        d.select(r("D5"));
        assert!(d.paste(CopyMode::All, |_| {}));
        assert_eq!(text(&d, "D5"), "m");
        assert_eq!(d.merges().iter().copied().collect::<Vec<_>>(), vec![r("D5:E5")]);
        assert!(d.clipboard().is_clear());
    }

    #[test]
    fn test_text_clipboard_round_trip() {
        let mut d = DataProxy::default();
        d.select(r("B2"));
        d.paste_from_text("a\t\"b\"\r\nc\td");
        assert_eq!(text(&d, "C2"), "b");
        d.select(r("B2:C3"));
        assert_eq!(d.copy_to_text(), "a\tb\nc\td");
    }

    #[test]
    fn test_style_attr_interns() {
        let mut d = DataProxy::default();
        d.select(r("A1:B1"));
        d.set_selected_cell_attr(CellAttr::Style(StyleAttr::Align(Align::Center)));
        assert_eq!(d.styles().len(), 1);
        assert_eq!(d.cell(0, 0).unwrap().style, d.cell(0, 1).unwrap().style);
        assert_eq!(d.cell_style_or_default(0, 0).align, Some(Align::Center));
        assert_eq!(d.cell_style_or_default(5, 5).align, Some(Align::Left));
    }

    #[test]
    fn test_outside_border() {
        let mut d = DataProxy::default();
        d.select(r("A1:B2"));
        d.set_selected_cell_attr(CellAttr::Border {
            mode: BorderMode::Outside,
            line: LineStyle::Thin,
            color: "#000".to_string(),
        });
        let border = |ri, ci| d.cell_style(ri, ci).and_then(|s| s.border.clone()).unwrap_or_default();
        assert!(border(0, 0).top.is_some() && border(0, 0).left.is_some());
        assert!(border(0, 0).right.is_none());
        assert!(border(1, 1).bottom.is_some() && border(1, 1).right.is_some());
    }

    #[test]
    fn test_formula_attr_writes_sum_below() {
        let mut d = DataProxy::default();
        d.select(r("A1:B3"));
        d.set_selected_cell_attr(CellAttr::Formula(Function::Sum));
        assert_eq!(text(&d, "A4"), "=SUM(A1:A3)");
        assert_eq!(text(&d, "B4"), "=SUM(B1:B3)");
    }

    #[test]
    fn test_row_view_follows_edits() {
        let mut d = sheet_with(&[("A1", "h"), ("A2", "x"), ("A3", "y"), ("A4", "x")]);
        d.select(r("A1:A4"));
        d.toggle_autofilter();
        d.set_autofilter(0, None, FilterOperator::In, vec!["x".to_string()]);
        assert!(d.row_view().is_hidden(2));

        d.set_cell_text(2, 0, "x", EditState::Finished);
        assert!(!d.row_view().is_hidden(2));

        d.select(r("A2"));
        d.delete_cells(ClearMode::Text);
        assert!(d.row_view().is_hidden(1));
        assert!(!d.row_view().is_hidden(3));
    }

    #[test]
    fn test_render_cell_applies_format() {
        let mut d = sheet_with(&[("A1", "1234.5"), ("A2", "=A1*2"), ("A3", "note")]);
        d.select(r("A1:A3"));
        d.set_selected_cell_attr(CellAttr::Style(StyleAttr::Format(Format::Usd)));
        assert_eq!(d.render_cell(0, 0), "$1,234.50");
        assert_eq!(d.render_cell(1, 0), "$2,469.00");
        assert_eq!(d.render_cell(2, 0), "note");
        assert_eq!(text(&d, "A1"), "1234.5");
    }

    #[test]
    fn test_autofilter_hides_and_maps_rows() {
        let mut d = sheet_with(&[("A1", "h"), ("A2", "x"), ("A3", "y"), ("A4", "x")]);
        d.select(r("A1:A4"));
        assert!(d.toggle_autofilter());
        d.set_autofilter(0, Some(SortOrder::Desc), FilterOperator::In, vec!["x".to_string()]);
        assert!(d.row_view().is_hidden(2));
        assert_eq!(d.row_view().to_storage(1), 3);
        assert_eq!(d.filter_items(0).get("x"), Some(&2));
        // Hidden row contributes no height.
        assert_eq!(d.get_rect(&r("A4")).t, 25.0 * 2.0);

        d.select_cell(1, 0);
        d.set_selected_cell_text("z", EditState::Finished);
        assert_eq!(text(&d, "A4"), "z");
        assert_eq!(d.auto_filter().get_filter(0).unwrap().value, vec!["z".to_string()]);

        d.toggle_autofilter();
        assert!(d.can_autofilter());
        assert!(d.row_view().is_empty());
    }

    #[test]
    fn test_validation_flags_cell() {
        let mut d = DataProxy::default();
        d.add_validation("cell", r("A1:A5"), Validator::new(ValidatorType::Number, false, "", None));
        d.set_cell_text(1, 0, "abc", EditState::Finished);
        assert!(d.validation_error(1, 0).is_some());
        d.set_cell_text(1, 0, "12", EditState::Finished);
        assert!(d.validation_error(1, 0).is_none());
        d.select(r("A1:A5"));
        d.remove_validation();
        assert!(d.validations().get(1, 0).is_none());
    }

    #[test]
    fn test_hide_and_unhide_rows() {
        let mut d = DataProxy::default();
        d.select(r("A2:Z3"));
        assert!(d.hide_rows_or_cols());
        assert!(d.rows().is_hidden(1) && d.rows().is_hidden(2));
        d.unhide(Axis::Row, 3);
        assert!(!d.rows().is_hidden(1));
    }

    #[test]
    fn test_freeze_and_geometry() {
        let mut d = DataProxy::default();
        assert!(d.freeze_view_range().is_none());
        d.set_freeze(2, 1);
        assert!(d.freeze_is_active());
        assert_eq!(d.freeze_total_height(), 50.0);
        assert_eq!(d.freeze_total_width(), 100.0);
        assert_eq!(d.freeze_view_range(), Some(r("A1:A2")));

        let rect = d.cell_rect(1, 1);
        assert_eq!(rect, Rect { left: 100.0, top: 25.0, width: 100.0, height: 25.0 });

        let view = d.view_range(Viewport { width: 250.0, height: 60.0 });
        assert_eq!((view.sri, view.sci), (2, 1));
        assert_eq!((view.eri, view.eci), (4, 3));
    }

    #[test]
    fn test_cell_at_xy_resolves_merge() {
        let mut d = DataProxy::default();
        d.select(r("B2:C3"));
        d.merge(|_| {});
        // Gutter is 60 wide and 25 high, so B3 spans x 160..260 and y 75..100.
        let hit = d.cell_at_xy(60.0 + 150.0, 25.0 + 60.0);
        assert_eq!((hit.ri, hit.ci), (Some(1), Some(1)));
        assert_eq!(hit.rect.width, 200.0);
        let gutter = d.cell_at_xy(10.0, 10.0);
        assert_eq!((gutter.ri, gutter.ci), (None, None));
    }

    #[test]
    fn test_scroll_snaps_to_boundaries() {
        let mut d = DataProxy::default();
        assert!(d.scroll_x(130.0));
        assert_eq!(d.scroll().x, 200.0);
        assert_eq!(d.scroll().ci, 2);
        assert!(!d.scroll_x(130.0));
        assert!(!d.scroll_y(0.0));
        assert!(d.scroll_y(30.0));
        assert_eq!(d.scroll().y, 50.0);
        assert_eq!(d.scroll().ri, 2);
    }

    #[test]
    fn test_row_each_skips_filtered() {
        let mut d = sheet_with(&[("A1", "h"), ("A2", "x"), ("A3", "y"), ("A4", "x")]);
        d.select(r("A1:A4"));
        d.toggle_autofilter();
        d.set_autofilter(0, None, FilterOperator::In, vec!["x".to_string()]);
        let mut seen = Vec::new();
        d.row_each(0, 2, 1000.0, |ri, y, _| seen.push((ri, y)));
        assert_eq!(seen, vec![(0, 0.0), (1, 25.0), (3, 50.0)]);
    }

    #[test]
    fn test_content_range_and_json() {
        let mut d = sheet_with(&[("C4", "x")]);
        assert_eq!(d.content_range(), r("A1:C4"));
        let json = d.to_json().unwrap();
        let mut other = DataProxy::default();
        other.load_json(&json).unwrap();
        assert_eq!(other.get_data(), d.get_data());
        d.name = "renamed".to_string();
        assert_ne!(other.get_data(), d.get_data());
    }
}
