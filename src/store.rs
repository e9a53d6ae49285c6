// Persistence of the product snapshot between runs.
//
// The backend is picked from the snapshot path's extension: `.csv` uses the
// csv crate, anything else is treated as an Excel workbook (calamine to read,
// rust_xlsxwriter to write the styled report).

use crate::{
    error::{TrackerError, TrackerResult},
    models::{
        COLUMNS, NAME_COLUMN, PRICE_COLUMN, ProductRecord, Snapshot, UPDATED_COLUMN,
        parse_timestamp,
    },
};
use calamine::{Data, Reader, open_workbook_auto};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};
use std::path::{Path, PathBuf};

const HEADER_FILL: u32 = 0x366092;
const ALTERNATE_FILL: u32 = 0xE9EDF4;
const COLUMN_WIDTHS: [f64; 3] = [40.0, 20.0, 20.0];

pub trait SnapshotStore {
    fn path(&self) -> &Path;

    /// `Ok(None)` when no snapshot has been written yet.
    fn load(&self) -> TrackerResult<Option<Snapshot>>;

    /// Replaces whatever is stored with `snapshot`.
    fn save(&self, snapshot: &Snapshot) -> TrackerResult<()>;
}

pub fn store_for_path(path: impl Into<PathBuf>) -> Box<dyn SnapshotStore> {
    let path = path.into();
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        Box::new(CsvStore::new(path))
    } else {
        Box::new(XlsxStore::new(path))
    }
}

// Positions of the three snapshot columns within a header row
struct ColumnMap {
    name: usize,
    price: usize,
    updated: usize,
}

impl ColumnMap {
    fn locate(headers: &[&str], path: &Path) -> TrackerResult<Self> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| {
                    TrackerError::parse(path, format!("missing required column '{}'", column))
                })
        };

        Ok(Self {
            name: find(NAME_COLUMN)?,
            price: find(PRICE_COLUMN)?,
            updated: find(UPDATED_COLUMN)?,
        })
    }

    // None for a fully blank row
    fn record(
        &self,
        cells: &[String],
        row: usize,
        path: &Path,
    ) -> TrackerResult<Option<ProductRecord>> {
        if cells.iter().all(|c| c.trim().is_empty()) {
            return Ok(None);
        }

        let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");
        let updated = cell(self.updated);
        let observed_at = parse_timestamp(updated).map_err(|e| {
            let reason = format!("row {}: invalid timestamp '{}': {}", row, updated, e);
            TrackerError::parse(path, reason)
        })?;

        Ok(Some(ProductRecord::new(
            cell(self.name).trim(),
            cell(self.price).trim(),
            observed_at,
        )))
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct XlsxStore {
    path: PathBuf,
}

impl XlsxStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write_sheet(
        worksheet: &mut Worksheet,
        snapshot: &Snapshot,
    ) -> Result<(), rust_xlsxwriter::XlsxError> {
        let header_format = Format::new()
            .set_bold()
            .set_font_size(12.0)
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let body_format = Format::new()
            .set_align(FormatAlign::Right)
            .set_align(FormatAlign::VerticalCenter);
        let shaded_format = body_format.clone().set_background_color(Color::RGB(ALTERNATE_FILL));

        for (col, title) in COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *title, &header_format)?;
        }

        for (idx, record) in snapshot.records().iter().enumerate() {
            let row = idx as u32 + 1;
            // Sheet rows are 1-based in Excel; even ones get the shading
            let format = if (row + 1) % 2 == 0 { &shaded_format } else { &body_format };
            for (col, value) in record.to_row().iter().enumerate() {
                worksheet.write_string_with_format(row, col as u16, value, format)?;
            }
        }

        for (col, width) in COLUMN_WIDTHS.iter().enumerate() {
            worksheet.set_column_width(col as u16, *width)?;
        }
        worksheet.set_right_to_left(true);
        worksheet.set_freeze_panes(1, 0)?;
        Ok(())
    }
}

impl SnapshotStore for XlsxStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> TrackerResult<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut workbook =
            open_workbook_auto(&self.path).map_err(|e| TrackerError::parse(&self.path, e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| TrackerError::parse(&self.path, "workbook contains no sheets"))?
            .map_err(|e| TrackerError::parse(&self.path, e))?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
        let header = rows
            .next()
            .ok_or_else(|| TrackerError::parse(&self.path, "sheet is empty"))?;
        let header: Vec<&str> = header.iter().map(String::as_str).collect();
        let columns = ColumnMap::locate(&header, &self.path)?;

        let mut records = Vec::new();
        for (idx, cells) in rows.enumerate() {
            if let Some(record) = columns.record(&cells, idx + 2, &self.path)? {
                records.push(record);
            }
        }

        Ok(Some(Snapshot::from_rows(records)))
    }

    fn save(&self, snapshot: &Snapshot) -> TrackerResult<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        Self::write_sheet(worksheet, snapshot).map_err(|e| TrackerError::report(&self.path, e))?;
        workbook.save(&self.path).map_err(|e| TrackerError::report(&self.path, e))?;
        Ok(())
    }
}

pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for CsvStore {
    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> TrackerResult<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| TrackerError::parse(&self.path, e))?;
        let headers = reader.headers().map_err(|e| TrackerError::parse(&self.path, e))?.clone();
        let headers: Vec<&str> = headers.iter().collect();
        let columns = ColumnMap::locate(&headers, &self.path)?;

        let mut records = Vec::new();
        for (idx, row) in reader.records().enumerate() {
            let row = row.map_err(|e| TrackerError::parse(&self.path, e))?;
            let cells: Vec<String> = row.iter().map(str::to_owned).collect();
            if let Some(record) = columns.record(&cells, idx + 2, &self.path)? {
                records.push(record);
            }
        }

        Ok(Some(Snapshot::from_rows(records)))
    }

    fn save(&self, snapshot: &Snapshot) -> TrackerResult<()> {
        let mut writer =
            csv::Writer::from_path(&self.path).map_err(|e| TrackerError::report(&self.path, e))?;
        writer.write_record(COLUMNS).map_err(|e| TrackerError::report(&self.path, e))?;
        for record in snapshot.records() {
            writer
                .write_record(record.to_row())
                .map_err(|e| TrackerError::report(&self.path, e))?;
        }
        writer.flush()?;
        Ok(())
    }
}
