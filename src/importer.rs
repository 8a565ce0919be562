use std::path::Path;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::db;
use crate::error::{Result, ShopfloorError};
use crate::ledger::ReportBook;
use crate::lifecycle;
use crate::models::{parse_day, split_participants, Draft, Participant, Report, Stage};
use crate::table::{self, TableApi, TableOp};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_date(serial: f64) -> String {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    let base = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    let date = base + chrono::Duration::days(serial as i64);
    date.format("%Y-%m-%d").to_string()
}

pub fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Reading files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub fn read_sheet(file_path: &Path) -> Result<Sheet> {
    let ext = file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => read_csv(file_path),
        #[cfg(feature = "xlsx")]
        "xlsx" | "xls" | "xlsm" | "ods" => read_workbook(file_path),
        other => Err(ShopfloorError::Parse(format!(
            "unsupported file type '.{other}' (expected .csv or .xlsx)"
        ))),
    }
}

fn read_csv(file_path: &Path) -> Result<Sheet> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut records = rdr.records();
    let headers = match records.next() {
        Some(record) => record?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect(),
        None => return Err(ShopfloorError::Parse("file is empty".to_string())),
    };
    let mut rows = Vec::new();
    for result in records {
        let record = result?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(Sheet { headers, rows })
}

#[cfg(feature = "xlsx")]
fn read_workbook(file_path: &Path) -> Result<Sheet> {
    use calamine::{Data, Reader};

    use crate::fmt::plain_number;

    let mut workbook = calamine::open_workbook_auto(file_path)
        .map_err(|e| ShopfloorError::Parse(format!("failed to open workbook: {e}")))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ShopfloorError::Parse("workbook has no sheets".to_string()))?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| ShopfloorError::Parse(format!("failed to read sheet '{first}': {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Err(ShopfloorError::Parse("sheet is empty".to_string())),
    };
    let date_col = headers.iter().position(|h| Field::Date.matches(h));

    let body = rows
        .map(|cells| {
            cells
                .iter()
                .enumerate()
                .map(|(i, cell)| match cell {
                    Data::Empty => String::new(),
                    Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()),
                    Data::Float(f) if Some(i) == date_col => excel_serial_to_date(*f),
                    Data::Int(n) if Some(i) == date_col => excel_serial_to_date(*n as f64),
                    Data::Float(f) => plain_number(*f),
                    other => other.to_string(),
                })
                .collect()
        })
        .collect();
    Ok(Sheet { headers, rows: body })
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Date,
    Stage,
    Quantity,
    Participants,
    EnteredBy,
    Note,
}

impl Field {
    const REQUIRED: [Field; 5] = [
        Field::Date,
        Field::Stage,
        Field::Quantity,
        Field::Participants,
        Field::EnteredBy,
    ];

    fn names(&self) -> (&'static str, &'static str) {
        match self {
            Self::Date => ("Date", "NGÀY"),
            Self::Stage => ("Stage", "CÔNG ĐOẠN"),
            Self::Quantity => ("Quantity", "KHỐI LƯỢNG"),
            Self::Participants => ("Participants", "NHÂN SỰ THAM GIA"),
            Self::EnteredBy => ("EnteredBy", "NGƯỜI NHẬP"),
            Self::Note => ("Note", "GHI CHÚ"),
        }
    }

    fn matches(&self, header: &str) -> bool {
        let (en, vi) = self.names();
        let header = header.trim();
        header == vi || header.eq_ignore_ascii_case(en)
    }
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    date: usize,
    stage: usize,
    quantity: usize,
    participants: usize,
    entered_by: usize,
    note: Option<usize>,
}

impl Columns {
    fn locate(headers: &[String]) -> Result<Self> {
        let find = |field: Field| headers.iter().position(|h| field.matches(h));
        let missing: Vec<&str> = Field::REQUIRED
            .iter()
            .filter(|f| find(**f).is_none())
            .map(|f| f.names().0)
            .collect();
        if !missing.is_empty() {
            return Err(ShopfloorError::Parse(format!(
                "missing required columns: {}",
                missing.join(", ")
            )));
        }
        // every required column was found above
        let at = |field: Field| find(field).unwrap_or_default();
        Ok(Self {
            date: at(Field::Date),
            stage: at(Field::Stage),
            quantity: at(Field::Quantity),
            participants: at(Field::Participants),
            entered_by: at(Field::EnteredBy),
            note: find(Field::Note),
        })
    }
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ImportPlan {
    pub reports: Vec<Report>,
    /// Spreadsheet row numbers (header is row 1).
    pub invalid_rows: Vec<usize>,
}

pub fn plan_import(
    sheet: &Sheet,
    existing_ids: &[String],
    stages: &[Stage],
    actor: &str,
    at: NaiveDateTime,
) -> Result<ImportPlan> {
    let cols = Columns::locate(&sheet.headers)?;
    let mut next = lifecycle::max_id_number(existing_ids) + 1;
    let mut plan = ImportPlan::default();

    for (i, row) in sheet.rows.iter().enumerate() {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let date = cell(row, cols.date);
        let stage = cell(row, cols.stage);
        let quantity = cell(row, cols.quantity);
        if date.is_empty() || stage.is_empty() || quantity.is_empty() || parse_day(date).is_none() {
            plan.invalid_rows.push(i + 2);
            continue;
        }
        let entered_by = match cell(row, cols.entered_by) {
            "" => actor,
            name => name,
        };
        let draft = Draft {
            date: date.to_string(),
            stage: stage.to_string(),
            quantity: quantity.to_string(),
            unit_price: String::new(),
            participants: split_participants(cell(row, cols.participants))
                .iter()
                .map(|n| Participant::new(n))
                .collect(),
            note: cols.note.map(|n| cell(row, n)).unwrap_or("").to_string(),
            entered_by: entered_by.to_string(),
        };
        let draft = lifecycle::with_stage_price(draft, stages);
        plan.reports
            .push(lifecycle::imported(&draft, lifecycle::format_id(next), actor, at));
        next += 1;
    }
    Ok(plan)
}

// ---------------------------------------------------------------------------
// Sending
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BatchOutcome {
    pub imported: usize,
    pub failed_rows: usize,
    pub failed_batches: usize,
}

/// Send records to `Add` in fixed-size batches. A failed batch is logged and
/// counted; the remaining batches are still sent.
pub fn send_batches<T: TableApi>(
    api: &T,
    reports: &[Report],
    batch_size: usize,
    progress: &mut dyn FnMut(usize, usize),
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    let total = reports.len();
    let mut sent = 0;
    for (n, batch) in reports.chunks(batch_size.max(1)).enumerate() {
        let rows = batch.iter().map(Report::to_row).collect();
        match api.request(table::REPORTS, TableOp::Add, table::Payload::rows(rows)) {
            Ok(_) => outcome.imported += batch.len(),
            Err(e) => {
                warn!(batch = n + 1, rows = batch.len(), "import batch failed: {e}");
                outcome.failed_rows += batch.len();
                outcome.failed_batches += 1;
            }
        }
        sent += batch.len();
        progress(sent, total);
    }
    outcome
}

// ---------------------------------------------------------------------------
// import_file
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub batch_size: usize,
    pub force: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub failed_rows: usize,
    pub failed_batches: usize,
    pub invalid_rows: Vec<usize>,
    pub duplicate_file: bool,
}

/// Parse, validate and send one file. `log` is the local import log used
/// for the duplicate-file guard, whichever backend `book` writes to.
pub fn import_file<T: TableApi>(
    book: &mut ReportBook<T>,
    log: &Connection,
    file_path: &Path,
    actor: &str,
    at: NaiveDateTime,
    options: &ImportOptions,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<ImportResult> {
    let checksum = compute_checksum(file_path)?;
    if !options.force && db::import_seen(log, &checksum)? {
        return Ok(ImportResult {
            duplicate_file: true,
            ..Default::default()
        });
    }

    let sheet = read_sheet(file_path)?;
    book.refresh()?;
    let stages = book.stages()?;
    let plan = plan_import(&sheet, book.ids(), &stages, actor, at)?;
    if plan.reports.is_empty() {
        return Ok(ImportResult {
            invalid_rows: plan.invalid_rows,
            ..Default::default()
        });
    }

    let batch_size = if options.batch_size == 0 { 25 } else { options.batch_size };
    let outcome = send_batches(book.api(), &plan.reports, batch_size, progress);
    book.refresh()?;

    let filename = file_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if outcome.imported > 0 {
        db::record_import(log, filename, &checksum, outcome.imported)?;
    }
    info!(
        file = filename,
        imported = outcome.imported,
        failed_batches = outcome.failed_batches,
        invalid = plan.invalid_rows.len(),
        "import finished"
    );

    Ok(ImportResult {
        imported: outcome.imported,
        failed_rows: outcome.failed_rows,
        failed_batches: outcome.failed_batches,
        invalid_rows: plan.invalid_rows,
        duplicate_file: false,
    })
}

pub fn preview_file<T: TableApi>(
    book: &mut ReportBook<T>,
    file_path: &Path,
    actor: &str,
    at: NaiveDateTime,
) -> Result<ImportPlan> {
    let sheet = read_sheet(file_path)?;
    book.refresh()?;
    let stages = book.stages()?;
    plan_import(&sheet, book.ids(), &stages, actor, at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteTable;
    use crate::models::{Row, ReportStatus};
    use crate::table::Payload;
    use chrono::NaiveDate;
    use std::cell::Cell;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 22)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn test_book(dir: &Path) -> ReportBook<SqliteTable> {
        let store = SqliteTable::open(&dir.join("test.db")).unwrap();
        ReportBook::load(store).unwrap()
    }

    fn log_conn(dir: &Path) -> Connection {
        let conn = db::get_connection(&dir.join("log.db")).unwrap();
        db::init_db(&conn).unwrap();
        conn
    }

    fn write_csv(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn options(batch_size: usize) -> ImportOptions {
        ImportOptions {
            batch_size,
            force: false,
        }
    }

    const FOUR_ROWS: &str = "\
Date,Stage,Quantity,Participants,Note,EnteredBy
2025-03-22,Cắt thô,50,\"An, Bình\",,Lê Văn C
2025-03-22,Trám trít,,Dũng,,Lê Văn C
2025-03-23,Cắt thô,30,Giang,ok,Lê Văn C
2025-03-24,Bào tinh ghép ngang,12,,,
";

    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(excel_serial_to_date(45667.0), "2025-01-10");
    }

    #[test]
    fn test_read_csv_strips_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "a.csv", "\u{feff}Date,Stage\n2025-01-01,Cắt thô\n");
        let sheet = read_sheet(&path).unwrap();
        assert_eq!(sheet.headers, vec!["Date", "Stage"]);
        assert_eq!(sheet.rows.len(), 1);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "a.pdf", "x");
        assert!(matches!(read_sheet(&path), Err(ShopfloorError::Parse(_))));
    }

    #[test]
    fn test_import_valid_rows_and_report_invalid_ones() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = test_book(dir.path());
        let log = log_conn(dir.path());
        let path = write_csv(dir.path(), "bao-cao.csv", FOUR_ROWS);

        let result =
            import_file(&mut book, &log, &path, "An", at(), &options(25), &mut |_, _| {}).unwrap();
        assert_eq!(result.imported, 3);
        assert_eq!(result.invalid_rows, vec![3]);
        assert_eq!(result.failed_batches, 0);

        let ids: Vec<&str> = book.reports().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["BC001", "BC002", "BC003"]);
        for r in book.reports() {
            assert_eq!(r.status, ReportStatus::Pending);
            assert_eq!(r.history_lines().count(), 1);
            assert!(r.history.ends_with("An - imported"));
        }
        assert_eq!(book.reports()[0].participants, vec!["An", "Bình"]);
        assert_eq!(book.reports()[2].entered_by, "An");
    }

    #[test]
    fn test_import_ids_continue_from_max() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = test_book(dir.path());
        let log = log_conn(dir.path());
        book.save(
            table::REPORTS,
            TableOp::Add,
            vec![Report {
                id: "BC041".to_string(),
                ..Default::default()
            }
            .to_row()],
        )
        .unwrap();
        let path = write_csv(dir.path(), "a.csv", FOUR_ROWS);
        import_file(&mut book, &log, &path, "An", at(), &options(25), &mut |_, _| {}).unwrap();
        assert!(book.get("BC042").is_ok());
        assert!(book.get("BC044").is_ok());
    }

    #[test]
    fn test_import_fills_unit_price_from_stage_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = test_book(dir.path());
        book.set_stage_price("Cắt thô", "10000").unwrap();
        let log = log_conn(dir.path());
        let path = write_csv(dir.path(), "a.csv", FOUR_ROWS);
        import_file(&mut book, &log, &path, "An", at(), &options(25), &mut |_, _| {}).unwrap();
        assert_eq!(book.get("BC001").unwrap().unit_price, "10000");
    }

    #[test]
    fn test_missing_columns_abort_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = test_book(dir.path());
        let log = log_conn(dir.path());
        let path = write_csv(dir.path(), "a.csv", "Date,Stage\n2025-03-22,Cắt thô\n");
        let err = import_file(&mut book, &log, &path, "An", at(), &options(25), &mut |_, _| {})
            .unwrap_err();
        match err {
            ShopfloorError::Parse(msg) => {
                assert!(msg.contains("Quantity"));
                assert!(msg.contains("EnteredBy"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(book.reports().is_empty());
    }

    #[test]
    fn test_vietnamese_headers_accepted() {
        let sheet = Sheet {
            headers: ["NGÀY", "CÔNG ĐOẠN", "KHỐI LƯỢNG", "NHÂN SỰ THAM GIA", "GHI CHÚ", "NGƯỜI NHẬP"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: vec![["22/03/2025", "Cưa gỗ", "50 khối", "Nguyễn Văn A", "", "Lê Văn C"]
                .iter()
                .map(|s| s.to_string())
                .collect()],
        };
        let plan = plan_import(&sheet, &[], &[], "An", at()).unwrap();
        assert_eq!(plan.reports.len(), 1);
        assert_eq!(plan.reports[0].date, "2025-03-22");
        assert_eq!(plan.reports[0].quantity, "50 khối");
    }

    #[test]
    fn test_duplicate_file_guard() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = test_book(dir.path());
        let log = log_conn(dir.path());
        let path = write_csv(dir.path(), "a.csv", FOUR_ROWS);
        import_file(&mut book, &log, &path, "An", at(), &options(25), &mut |_, _| {}).unwrap();
        let again =
            import_file(&mut book, &log, &path, "An", at(), &options(25), &mut |_, _| {}).unwrap();
        assert!(again.duplicate_file);
        assert_eq!(book.reports().len(), 3);

        let forced = ImportOptions {
            batch_size: 25,
            force: true,
        };
        let r = import_file(&mut book, &log, &path, "An", at(), &forced, &mut |_, _| {}).unwrap();
        assert_eq!(r.imported, 3);
        assert_eq!(book.reports().len(), 6);
    }

    struct FailSecondAdd {
        inner: SqliteTable,
        adds: Cell<usize>,
    }

    impl TableApi for FailSecondAdd {
        fn request(&self, table: &str, op: TableOp, payload: Payload) -> Result<Vec<Row>> {
            if op == TableOp::Add {
                self.adds.set(self.adds.get() + 1);
                if self.adds.get() == 2 {
                    return Err(ShopfloorError::Transport("timeout".to_string()));
                }
            }
            self.inner.request(table, op, payload)
        }
    }

    #[test]
    fn test_failed_batch_does_not_stop_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let inner = SqliteTable::open(&dir.path().join("test.db")).unwrap();
        let mut book = ReportBook::load(FailSecondAdd {
            inner,
            adds: Cell::new(0),
        })
        .unwrap();
        let log = log_conn(dir.path());
        let mut content = String::from("Date,Stage,Quantity,Participants,EnteredBy\n");
        for _ in 0..5 {
            content.push_str("2025-03-22,Cắt thô,1,An,An\n");
        }
        let path = write_csv(dir.path(), "a.csv", &content);

        let mut calls = Vec::new();
        let result = import_file(&mut book, &log, &path, "An", at(), &options(2), &mut |sent, total| {
            calls.push((sent, total))
        })
        .unwrap();
        assert_eq!(result.imported, 3);
        assert_eq!(result.failed_batches, 1);
        assert_eq!(result.failed_rows, 2);
        assert_eq!(calls, vec![(2, 5), (4, 5), (5, 5)]);
        assert_eq!(book.reports().len(), 3);
    }

    #[test]
    fn test_preview_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut book = test_book(dir.path());
        let path = write_csv(dir.path(), "a.csv", FOUR_ROWS);
        let plan = preview_file(&mut book, &path, "An", at()).unwrap();
        assert_eq!(plan.reports.len(), 3);
        assert_eq!(plan.invalid_rows, vec![3]);
        book.refresh().unwrap();
        assert!(book.reports().is_empty());
    }
}
