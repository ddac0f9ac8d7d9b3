//! Figures floating over a sheet: charts and images.

use std::any::Any;

use cellgrid_core::{AxisChange, SheetId, Zone};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::command::{CancelledReason, Command};
use crate::formula::Value;
use crate::getters::Getters;
use crate::plugin::{ApplyContext, Plugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
}

/// A chart over a data range.
///
/// With more than one column the first column holds the labels and every
/// other column is one series. With `has_header` the first row names the
/// series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartDefinition {
    pub chart_type: ChartType,
    pub data_range: Zone,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub has_header: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FigureKind {
    Chart(ChartDefinition),
    Image { path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Figure {
    pub id: String,
    pub content: FigureKind,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub name: String,
    /// `None` for non-numeric cells
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub chart_type: ChartType,
    pub title: Option<String>,
    pub labels: Vec<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, Default)]
pub struct FigurePlugin {
    figures: FxHashMap<SheetId, Vec<Figure>>,
}

impl FigurePlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn sheet_figures(&self, sheet: SheetId) -> &[Figure] {
        self.figures.get(&sheet).map_or(&[], Vec::as_slice)
    }

    fn index_of(&self, sheet: SheetId, id: &str) -> Option<usize> {
        self.sheet_figures(sheet).iter().position(|f| f.id == id)
    }

    fn check_figure(figure: &Figure, sheet: SheetId, getters: &Getters<'_>) -> Result<(), CancelledReason> {
        if figure.id.is_empty() || figure.width == 0 || figure.height == 0 {
            return Err(CancelledReason::InvalidFigureGeometry);
        }
        if let FigureKind::Chart(chart) = &figure.content {
            let (rows, cols) = getters.sheet_size(sheet).unwrap_or_default();
            let range = chart.data_range;
            let data_rows = range.rows() - usize::from(chart.has_header);
            let series = if range.cols() > 1 { range.cols() - 1 } else { 1 };
            let fits = range.bottom < rows && range.right < cols;
            if !fits || data_rows == 0 || (chart.chart_type == ChartType::Pie && series > 1) {
                return Err(CancelledReason::InvalidChartDefinition);
            }
        }
        Ok(())
    }

    fn insert(&mut self, sheet: SheetId, figure: Figure, index: Option<usize>, ctx: &mut ApplyContext<'_>) {
        ctx.record_inverse(Command::DeleteFigure { sheet_id: sheet, id: figure.id.clone() });
        let figures = self.figures.entry(sheet).or_default();
        let index = index.unwrap_or(figures.len()).min(figures.len());
        figures.insert(index, figure);
    }

    fn remove(&mut self, sheet: SheetId, index: usize, ctx: &mut ApplyContext<'_>) {
        let Some(figures) = self.figures.get_mut(&sheet) else { return };
        if index >= figures.len() {
            return;
        }
        let figure = figures.remove(index);
        ctx.record_inverse(Command::CreateFigure { sheet_id: sheet, figure, index: Some(index) });
    }

    fn shift(&mut self, sheet: SheetId, change: AxisChange, ctx: &mut ApplyContext<'_>) {
        // Back to front: removals keep earlier indices valid
        for index in (0..self.sheet_figures(sheet).len()).rev() {
            let figure = &self.sheet_figures(sheet)[index];
            let FigureKind::Chart(chart) = &figure.content else { continue };
            match change.map_zone(&chart.data_range) {
                Some(range) if range == chart.data_range => {}
                Some(range) => {
                    let mut updated = figure.clone();
                    if let FigureKind::Chart(c) = &mut updated.content {
                        c.data_range = range;
                    }
                    ctx.record_inverse(Command::UpdateFigure { sheet_id: sheet, figure: figure.clone() });
                    if let Some(slot) = self.figures.get_mut(&sheet).and_then(|f| f.get_mut(index)) {
                        *slot = updated;
                    }
                }
                None => self.remove(sheet, index, ctx),
            }
        }
    }
}

impl Plugin for FigurePlugin {
    fn allow_dispatch(&self, cmd: &Command, getters: &Getters<'_>) -> Result<(), CancelledReason> {
        match cmd {
            Command::CreateFigure { sheet_id, figure, .. } => {
                if self.index_of(*sheet_id, &figure.id).is_some() {
                    return Err(CancelledReason::DuplicateFigureId);
                }
                Self::check_figure(figure, *sheet_id, getters)
            }
            Command::UpdateFigure { sheet_id, figure } => {
                if self.index_of(*sheet_id, &figure.id).is_none() {
                    return Err(CancelledReason::FigureNotFound);
                }
                Self::check_figure(figure, *sheet_id, getters)
            }
            Command::DeleteFigure { sheet_id, id } if self.index_of(*sheet_id, id).is_none() => {
                Err(CancelledReason::FigureNotFound)
            }
            _ => Ok(()),
        }
    }

    fn handle(&mut self, cmd: &Command, ctx: &mut ApplyContext<'_>) {
        match cmd {
            Command::CreateFigure { sheet_id, figure, index } => self.insert(*sheet_id, figure.clone(), *index, ctx),
            Command::UpdateFigure { sheet_id, figure } => {
                let Some(index) = self.index_of(*sheet_id, &figure.id) else { return };
                if let Some(slot) = self.figures.get_mut(sheet_id).and_then(|f| f.get_mut(index)) {
                    let old = std::mem::replace(slot, figure.clone());
                    ctx.record_inverse(Command::UpdateFigure { sheet_id: *sheet_id, figure: old });
                }
            }
            Command::DeleteFigure { sheet_id, id } => {
                if let Some(index) = self.index_of(*sheet_id, id) {
                    self.remove(*sheet_id, index, ctx);
                }
            }
            Command::DeleteSheet { sheet_id } => {
                for (index, figure) in self.figures.remove(sheet_id).unwrap_or_default().into_iter().enumerate() {
                    ctx.record_inverse(Command::CreateFigure { sheet_id: *sheet_id, figure, index: Some(index) });
                }
            }
            _ => {
                if let Some((sheet, change)) = cmd.axis_change() {
                    self.shift(sheet, change, ctx);
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        _ => None,
    }
}

impl<'a> Getters<'a> {
    /// Figures of a sheet, bottom to top.
    pub fn figures(&self, sheet: SheetId) -> Vec<Figure> {
        self.plugin::<FigurePlugin>().map(|p| p.sheet_figures(sheet).to_vec()).unwrap_or_default()
    }

    pub fn figure(&self, sheet: SheetId, id: &str) -> Option<&'a Figure> {
        let plugin = self.plugin::<FigurePlugin>()?;
        plugin.sheet_figures(sheet).iter().find(|f| f.id == id)
    }

    /// Labels and series of a chart, read from evaluated values.
    pub fn chart_data(&self, sheet: SheetId, id: &str) -> Option<ChartData> {
        let FigureKind::Chart(chart) = &self.figure(sheet, id)?.content else { return None };
        let range = chart.data_range;
        let first_data_row = range.top + usize::from(chart.has_header);
        let with_labels = range.cols() > 1;
        let first_series_col = if with_labels { range.left + 1 } else { range.left };
        let value = |row, col| self.evaluated_value(sheet, cellgrid_core::Position::new(row, col));

        let labels = (first_data_row..=range.bottom)
            .enumerate()
            .map(|(i, row)| if with_labels { value(row, range.left).to_text() } else { (i + 1).to_string() })
            .collect();
        let series = (first_series_col..=range.right)
            .enumerate()
            .map(|(i, col)| ChartSeries {
                name: if chart.has_header { value(range.top, col).to_text() } else { format!("Series {}", i + 1) },
                values: (first_data_row..=range.bottom).map(|row| number(&value(row, col))).collect(),
            })
            .collect();
        Some(ChartData { chart_type: chart.chart_type, title: chart.title.clone(), labels, series })
    }
}
