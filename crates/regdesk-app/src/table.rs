// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::collections::BTreeSet;

use crate::{DetailRow, LinkValue, RowId, RowStatus, SortColumn, SortDirection};

pub const PAGE_SIZES: [usize; 3] = [10, 25, 50];
pub const DEFAULT_PAGE_SIZE: usize = PAGE_SIZES[0];

/// Composable row predicate. Text matches are case-insensitive substring
/// matches; an empty needle matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    NameContains(String),
    DescriptionContains(String),
    AnyText(String),
    StatusIs(RowStatus),
    LinkEquals { key: String, value: LinkValue },
    And(Vec<RowFilter>),
    Or(Vec<RowFilter>),
    Not(Box<RowFilter>),
}

impl RowFilter {
    pub fn matches(&self, row: &DetailRow) -> bool {
        match self {
            Self::NameContains(needle) => contains_folded(&row.display_name, needle),
            Self::DescriptionContains(needle) => contains_folded(&row.description, needle),
            Self::AnyText(needle) => {
                contains_folded(&row.display_name, needle)
                    || contains_folded(&row.description, needle)
                    || contains_folded(row.id.as_str(), needle)
                    || row
                        .links
                        .values()
                        .any(|value| contains_folded(&value.display(), needle))
            }
            Self::StatusIs(status) => row.status == *status,
            Self::LinkEquals { key, value } => row.links.get(key) == Some(value),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(row)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(row)),
            Self::Not(filter) => !filter.matches(row),
        }
    }

    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: SortColumn,
    pub direction: SortDirection,
}

/// Client-side projection over one loaded row set: filter, stable sort,
/// pagination and row selection. Holds no backend handle.
#[derive(Debug, Clone, PartialEq)]
pub struct TableViewModel {
    rows: Vec<DetailRow>,
    filter: Option<RowFilter>,
    sort: Option<SortSpec>,
    page_index: usize,
    page_size: usize,
    selection: BTreeSet<RowId>,
    filtered: Vec<usize>,
    visible: Vec<DetailRow>,
    revision: u64,
}

impl Default for TableViewModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TableViewModel {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            filter: None,
            sort: None,
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            selection: BTreeSet::new(),
            filtered: Vec::new(),
            visible: Vec::new(),
            revision: 0,
        }
    }

    pub fn with_page_size(page_size: usize) -> Result<Self> {
        let mut table = Self::new();
        table.set_page_size(page_size)?;
        Ok(table)
    }

    /// Replaces the backing rows. The page index survives a reload that
    /// keeps the row count, and resets to the first page otherwise.
    pub fn set_source(&mut self, rows: Vec<DetailRow>) {
        let size_changed = rows.len() != self.rows.len();
        self.rows = rows;
        let present: BTreeSet<&RowId> = self.rows.iter().map(|row| &row.id).collect();
        self.selection.retain(|id| present.contains(id));
        if size_changed {
            self.page_index = 0;
        }
        self.recompute();
    }

    pub fn set_filter(&mut self, filter: RowFilter) {
        if self.filter.as_ref() == Some(&filter) {
            return;
        }
        self.filter = Some(filter);
        self.page_index = 0;
        self.recompute();
    }

    pub fn clear_filter(&mut self) {
        if self.filter.take().is_some() {
            self.page_index = 0;
            self.recompute();
        }
    }

    pub fn filter(&self) -> Option<&RowFilter> {
        self.filter.as_ref()
    }

    pub fn set_sort(&mut self, column: SortColumn, direction: SortDirection) {
        self.sort = Some(SortSpec { column, direction });
        self.recompute();
    }

    pub fn clear_sort(&mut self) {
        if self.sort.take().is_some() {
            self.recompute();
        }
    }

    /// asc -> desc -> unsorted for the same column; a new column starts asc.
    pub fn cycle_sort(&mut self, column: SortColumn) -> Option<&SortSpec> {
        match self.sort.take() {
            Some(SortSpec {
                column: current,
                direction: SortDirection::Asc,
            }) if current == column => {
                self.sort = Some(SortSpec {
                    column,
                    direction: SortDirection::Desc,
                });
            }
            Some(SortSpec {
                column: current,
                direction: SortDirection::Desc,
            }) if current == column => {}
            _ => {
                self.sort = Some(SortSpec {
                    column,
                    direction: SortDirection::Asc,
                });
            }
        }
        self.recompute();
        self.sort.as_ref()
    }

    pub fn sort(&self) -> Option<&SortSpec> {
        self.sort.as_ref()
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if !PAGE_SIZES.contains(&page_size) {
            bail!("page size {page_size} is not supported; use one of 10, 25, or 50");
        }
        self.apply_page_size(page_size);
        Ok(())
    }

    pub fn cycle_page_size(&mut self) -> usize {
        let position = PAGE_SIZES
            .iter()
            .position(|size| *size == self.page_size)
            .unwrap_or(0);
        self.apply_page_size(PAGE_SIZES[(position + 1) % PAGE_SIZES.len()]);
        self.page_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Moves to `page_index`, clamped into the valid page range. Returns the
    /// page actually shown.
    pub fn set_page_index(&mut self, page_index: usize) -> usize {
        self.page_index = page_index;
        self.clamp_page();
        self.refresh_visible();
        self.page_index
    }

    pub fn next_page(&mut self) -> usize {
        self.set_page_index(self.page_index.saturating_add(1))
    }

    pub fn prev_page(&mut self) -> usize {
        self.set_page_index(self.page_index.saturating_sub(1))
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_count(&self) -> usize {
        self.filtered.len().div_ceil(self.page_size).max(1)
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn source_len(&self) -> usize {
        self.rows.len()
    }

    pub fn filtered_ids(&self) -> Vec<&RowId> {
        self.filtered
            .iter()
            .map(|index| &self.rows[*index].id)
            .collect()
    }

    pub fn visible_rows(&self) -> &[DetailRow] {
        &self.visible
    }

    /// Bumped only when the visible page changes content.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn row(&self, id: &RowId) -> Option<&DetailRow> {
        self.rows.iter().find(|row| &row.id == id)
    }

    /// Toggles selection of a loaded row. Returns whether the row is now
    /// selected; unknown ids are ignored.
    pub fn toggle_row_selection(&mut self, id: &RowId) -> bool {
        if !self.rows.iter().any(|row| &row.id == id) {
            return false;
        }
        if self.selection.remove(id) {
            false
        } else {
            self.selection.insert(id.clone());
            true
        }
    }

    pub fn selected_ids(&self) -> &BTreeSet<RowId> {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Drops one row locally, keeping the current page when possible.
    pub fn remove_row(&mut self, id: &RowId) -> Option<DetailRow> {
        let position = self.rows.iter().position(|row| &row.id == id)?;
        let removed = self.rows.remove(position);
        self.selection.remove(id);
        self.recompute();
        Some(removed)
    }

    fn recompute(&mut self) {
        let mut order: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.filter.as_ref().is_none_or(|filter| filter.matches(row)))
            .map(|(index, _)| index)
            .collect();

        if let Some(sort) = &self.sort {
            let rows = &self.rows;
            // Vec::sort_by is stable, so equal keys keep source order.
            order.sort_by(|left, right| {
                let ordering = rows[*left].cmp_by(&rows[*right], &sort.column);
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        self.filtered = order;
        self.clamp_page();
        self.refresh_visible();
    }

    /// Keeps the first visible row on screen across the size change.
    fn apply_page_size(&mut self, page_size: usize) {
        let first_row = self.page_index * self.page_size;
        self.page_size = page_size;
        self.page_index = first_row / page_size;
        self.clamp_page();
        self.refresh_visible();
    }

    fn clamp_page(&mut self) {
        let last = self.page_count() - 1;
        if self.page_index > last {
            self.page_index = last;
        }
    }

    fn refresh_visible(&mut self) {
        let start = self.page_index * self.page_size;
        let end = (start + self.page_size).min(self.filtered.len());
        let page: Vec<DetailRow> = self
            .filtered
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|index| self.rows[*index].clone())
            .collect();
        if page != self.visible {
            self.visible = page;
            self.revision = self.revision.wrapping_add(1);
        }
    }
}
