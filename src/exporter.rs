use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::models::Report;

pub const EXPORT_COLUMNS: [&str; 11] = [
    "ID",
    "Date",
    "Stage",
    "Quantity",
    "UnitPrice",
    "Amount",
    "Participants",
    "Note",
    "EnteredBy",
    "Status",
    "ApprovedBy",
];

const TEMPLATE_HEADER: [&str; 6] = [
    "NGÀY",
    "CÔNG ĐOẠN",
    "KHỐI LƯỢNG",
    "NHÂN SỰ THAM GIA",
    "GHI CHÚ",
    "NGƯỜI NHẬP",
];

const TEMPLATE_ROWS: [[&str; 6]; 2] = [
    [
        "2025-03-22",
        "Cưa gỗ",
        "50 khối",
        "Nguyễn Văn A, Trần Văn B",
        "Hoàn thành đúng tiến độ",
        "Lê Văn C",
    ],
    [
        "2025-03-22",
        "Đóng thùng",
        "30 khối",
        "Phạm Văn D, Ngô Văn E",
        "Cần bổ sung nhân lực",
        "Lê Văn C",
    ],
];

pub const TEMPLATE_FILE: &str = "mau_nhap_bao_cao.csv";

pub fn export_filename(day: chrono::NaiveDate) -> String {
    format!("bao-cao-{}.csv", day.format("%Y-%m-%d"))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub fn write_reports<W: Write>(writer: W, reports: &[Report]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(EXPORT_COLUMNS)?;
    for r in reports {
        wtr.write_record([
            r.id.as_str(),
            r.date.as_str(),
            r.stage.as_str(),
            r.quantity.as_str(),
            r.unit_price.as_str(),
            r.amount.as_str(),
            r.participants_joined().as_str(),
            r.note.as_str(),
            r.entered_by.as_str(),
            r.status.label(),
            r.approved_by.as_str(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `reports` to a CSV file. Returns the number of rows written.
pub fn export_reports(path: &Path, reports: &[Report]) -> Result<usize> {
    ensure_parent(path)?;
    let file = std::fs::File::create(path)?;
    write_reports(file, reports)?;
    Ok(reports.len())
}

pub fn write_template(path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(TEMPLATE_HEADER)?;
    for row in TEMPLATE_ROWS {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportStatus;

    #[test]
    fn test_export_columns_and_values() {
        let reports = vec![Report {
            id: "BC007".to_string(),
            date: "2025-03-22".to_string(),
            stage: "Cắt thô".to_string(),
            quantity: "50".to_string(),
            unit_price: "10000".to_string(),
            amount: "500000".to_string(),
            participants: vec!["An".to_string(), "Bình".to_string()],
            entered_by: "An".to_string(),
            status: ReportStatus::Approved,
            approved_by: "Dũng".to_string(),
            ..Default::default()
        }];
        let mut buf = Vec::new();
        write_reports(&mut buf, &reports).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Date,Stage,Quantity,UnitPrice,Amount,Participants,Note,EnteredBy,Status,ApprovedBy"
        );
        assert_eq!(
            lines.next().unwrap(),
            "BC007,2025-03-22,Cắt thô,50,10000,500000,\"An, Bình\",,An,Approved,Dũng"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_export_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("out.csv");
        assert_eq!(export_reports(&path, &[]).unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_export_filename() {
        let day = chrono::NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert_eq!(export_filename(day), "bao-cao-2025-03-02.csv");
    }

    #[test]
    fn test_template_is_importable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TEMPLATE_FILE);
        write_template(&path).unwrap();
        let sheet = crate::importer::read_sheet(&path).unwrap();
        assert_eq!(sheet.headers.len(), 6);
        assert_eq!(sheet.rows.len(), 2);
        let at = chrono::NaiveDate::from_ymd_opt(2025, 3, 22)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let plan = crate::importer::plan_import(&sheet, &[], &[], "An", at).unwrap();
        assert_eq!(plan.reports.len(), 2);
        assert!(plan.invalid_rows.is_empty());
    }
}
