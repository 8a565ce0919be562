use std::fmt;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type Row = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum ReportStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [Self::Pending, Self::Approved, Self::Rejected];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn wire(&self) -> &'static str {
        match self {
            Self::Pending => "Chờ duyệt",
            Self::Approved => "Đã duyệt",
            Self::Rejected => "Từ chối",
        }
    }

    /// Accepts either the sheet value or the English label, in any case.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|s| s.wire().to_lowercase() == raw || s.label().to_lowercase() == raw)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ReportStatus {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.wire())
    }
}

impl<'de> Deserialize<'de> for ReportStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = lenient_string(d)?;
        if raw.trim().is_empty() {
            return Ok(Self::Pending);
        }
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown report status: {raw}")))
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

pub const FIELD_ID: &str = "ID";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "ID", default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(rename = "NGÀY", alias = "Date", default, deserialize_with = "lenient_string")]
    pub date: String,
    #[serde(rename = "CÔNG ĐOẠN", alias = "Stage", default, deserialize_with = "lenient_string")]
    pub stage: String,
    #[serde(rename = "KHỐI LƯỢNG", alias = "Quantity", default, deserialize_with = "lenient_string")]
    pub quantity: String,
    #[serde(rename = "ĐƠN GIÁ", alias = "UnitPrice", default, deserialize_with = "lenient_string")]
    pub unit_price: String,
    #[serde(rename = "THÀNH TIỀN", alias = "Amount", default, deserialize_with = "lenient_string")]
    pub amount: String,
    #[serde(rename = "NHÂN SỰ THAM GIA", alias = "Participants", default, with = "participants_wire")]
    pub participants: Vec<String>,
    #[serde(rename = "GHI CHÚ", alias = "Note", default, deserialize_with = "lenient_string")]
    pub note: String,
    #[serde(rename = "NGƯỜI NHẬP", alias = "EnteredBy", default, deserialize_with = "lenient_string")]
    pub entered_by: String,
    #[serde(rename = "TRẠNG THÁI", alias = "Status", default)]
    pub status: ReportStatus,
    #[serde(rename = "NGƯỜI DUYỆT", alias = "ApprovedBy", default, deserialize_with = "lenient_string")]
    pub approved_by: String,
    #[serde(rename = "LỊCH SỬ", alias = "History", default, deserialize_with = "lenient_string")]
    pub history: String,
}

impl Report {
    pub fn from_row(row: Row) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::Value::Object(row))
    }

    pub fn to_row(&self) -> Row {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Row::new(),
        }
    }

    pub fn day(&self) -> Option<NaiveDate> {
        parse_day(&self.date)
    }

    pub fn quantity_value(&self) -> f64 {
        parse_number(&self.quantity)
    }

    pub fn unit_price_value(&self) -> f64 {
        parse_number(&self.unit_price)
    }

    pub fn participants_joined(&self) -> String {
        self.participants.join(", ")
    }

    pub fn history_lines(&self) -> impl Iterator<Item = &str> {
        self.history.lines().filter(|l| !l.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Draft (form state)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub value: String,
    pub label: String,
}

impl Participant {
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_string();
        Self {
            value: name.clone(),
            label: name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    pub date: String,
    pub stage: String,
    pub quantity: String,
    pub unit_price: String,
    pub participants: Vec<Participant>,
    pub note: String,
    pub entered_by: String,
}

impl Draft {
    pub fn participant_names(&self) -> Vec<String> {
        self.participants
            .iter()
            .map(|p| p.value.clone())
            .filter(|v| !v.is_empty())
            .collect()
    }

    pub fn from_report(report: &Report) -> Self {
        Self {
            date: report.date.clone(),
            stage: report.stage.clone(),
            quantity: report.quantity.clone(),
            unit_price: report.unit_price.clone(),
            participants: report.participants.iter().map(|n| Participant::new(n)).collect(),
            note: report.note.clone(),
            entered_by: report.entered_by.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reference entities
// ---------------------------------------------------------------------------

pub const STAGE_KEY: &str = "Tên công đoạn";
pub const STAFF_KEY: &str = "Họ và Tên";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(rename = "Tên công đoạn", alias = "Name", default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "Đơn giá", alias = "UnitPrice", default, deserialize_with = "lenient_string")]
    pub unit_price: String,
    #[serde(rename = "Ghi chú", alias = "Note", default, deserialize_with = "lenient_string")]
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Staff {
    #[serde(rename = "Họ và Tên", alias = "Name", default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(rename = "Chức vụ", alias = "Position", default, deserialize_with = "lenient_string")]
    pub position: String,
}

pub fn find_stage<'a>(stages: &'a [Stage], name: &str) -> Option<&'a Stage> {
    let name = name.trim();
    stages.iter().find(|s| s.name.trim() == name)
}

// ---------------------------------------------------------------------------
// Loose parsing helpers
// ---------------------------------------------------------------------------

fn non_numeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.\-]").expect("static regex"))
}

/// Parse a decimal typed by hand: "50 khối" -> 50, "1,234.5" -> 1234.5.
/// Dots followed by exactly three digits are thousands grouping, the way
/// `fmt::money` prints them ("500.000" -> 500000), unless the leading group
/// is zero ("0.250" -> 0.25) or a comma is present. Anything unparseable is 0.
pub fn parse_number(raw: &str) -> f64 {
    let cleaned = non_numeric().replace_all(raw, "").to_string();
    let negative = cleaned.starts_with('-');
    let digits = cleaned.replace('-', "");
    let normalized = if is_dot_grouped(&digits) && !raw.contains(',') {
        digits.replace('.', "")
    } else if digits.matches('.').count() > 1 {
        digits.replace('.', "")
    } else {
        digits
    };
    match normalized.parse::<f64>() {
        Ok(v) if negative => -v,
        Ok(v) => v,
        Err(_) => 0.0,
    }
}

fn is_dot_grouped(digits: &str) -> bool {
    let mut groups = digits.split('.');
    let lead = groups.next().unwrap_or("");
    let rest: Vec<&str> = groups.collect();
    !rest.is_empty()
        && !lead.is_empty()
        && lead.len() <= 3
        && lead.trim_start_matches('0') == lead
        && rest.iter().all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}

/// Parse a calendar day. Any time-of-day part is ignored so the written
/// day is kept regardless of timezone.
pub fn parse_day(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let day_part = raw.split(['T', ' ']).next().unwrap_or(raw);
    NaiveDate::parse_from_str(day_part, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(day_part, "%d/%m/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(day_part, "%Y/%m/%d"))
        .ok()
}

pub fn split_participants(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

mod participants_wire {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(names: &[String], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&names.join(", "))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        let raw = super::lenient_string(d)?;
        Ok(super::split_participants(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: serde_json::Value) -> Row {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_status_parse_accepts_both_vocabularies() {
        assert_eq!(ReportStatus::parse("Đã duyệt"), Some(ReportStatus::Approved));
        assert_eq!(ReportStatus::parse("approved"), Some(ReportStatus::Approved));
        assert_eq!(ReportStatus::parse(" Từ chối "), Some(ReportStatus::Rejected));
        assert_eq!(ReportStatus::parse("Chờ duyệt"), Some(ReportStatus::Pending));
        assert_eq!(ReportStatus::parse("Đã Duyệt"), Some(ReportStatus::Approved));
        assert_eq!(ReportStatus::parse("CHỜ DUYỆT"), Some(ReportStatus::Pending));
        assert_eq!(ReportStatus::parse("maybe"), None);
    }

    #[test]
    fn test_report_from_sheet_row() {
        let r = Report::from_row(row(json!({
            "ID": "BC012",
            "NGÀY": "2025-03-22",
            "CÔNG ĐOẠN": "Cắt thô",
            "KHỐI LƯỢNG": 50,
            "NHÂN SỰ THAM GIA": "An, Bình ,",
            "TRẠNG THÁI": "Đã duyệt",
            "NGƯỜI DUYỆT": null
        })))
        .unwrap();
        assert_eq!(r.id, "BC012");
        assert_eq!(r.quantity, "50");
        assert_eq!(r.participants, vec!["An", "Bình"]);
        assert_eq!(r.status, ReportStatus::Approved);
        assert_eq!(r.approved_by, "");
        assert_eq!(r.note, "");
    }

    #[test]
    fn test_report_from_english_row() {
        let r = Report::from_row(row(json!({
            "ID": "BC001",
            "Date": "2025-01-02",
            "Stage": "Trám trít",
            "Status": "Rejected"
        })))
        .unwrap();
        assert_eq!(r.stage, "Trám trít");
        assert_eq!(r.status, ReportStatus::Rejected);
    }

    #[test]
    fn test_missing_status_defaults_to_pending() {
        let r = Report::from_row(row(json!({"ID": "BC001", "TRẠNG THÁI": ""}))).unwrap();
        assert_eq!(r.status, ReportStatus::Pending);
    }

    #[test]
    fn test_to_row_uses_sheet_names() {
        let r = Report {
            id: "BC003".to_string(),
            participants: vec!["An".to_string(), "Bình".to_string()],
            status: ReportStatus::Rejected,
            ..Default::default()
        };
        let row = r.to_row();
        assert_eq!(row["ID"], json!("BC003"));
        assert_eq!(row["NHÂN SỰ THAM GIA"], json!("An, Bình"));
        assert_eq!(row["TRẠNG THÁI"], json!("Từ chối"));
    }

    #[test]
    fn test_parse_number_strips_units() {
        assert_eq!(parse_number("50 khối"), 50.0);
        assert_eq!(parse_number("1,234.5"), 1234.5);
        assert_eq!(parse_number("1.000.000"), 1_000_000.0);
        assert_eq!(parse_number("10.000"), 10_000.0);
        assert_eq!(parse_number("500.000 ₫"), 500_000.0);
        assert_eq!(parse_number("0.250"), 0.25);
        assert_eq!(parse_number("12.5"), 12.5);
        assert_eq!(parse_number("1.25"), 1.25);
        assert_eq!(parse_number("-12"), -12.0);
        assert_eq!(parse_number("abc"), 0.0);
        assert_eq!(parse_number(""), 0.0);
    }

    #[test]
    fn test_parse_day_formats() {
        let d = NaiveDate::from_ymd_opt(2025, 3, 22);
        assert_eq!(parse_day("2025-03-22"), d);
        assert_eq!(parse_day("2025-03-22T17:00:00.000Z"), d);
        assert_eq!(parse_day("22/03/2025"), d);
        assert_eq!(parse_day("2025-03-22 12:00:00"), d);
        assert_eq!(parse_day("not a date"), None);
        assert_eq!(parse_day(""), None);
    }

    #[test]
    fn test_stage_lookup_trims() {
        let stages = vec![Stage {
            name: "Cắt thô".to_string(),
            unit_price: "10000".to_string(),
            note: String::new(),
        }];
        assert!(find_stage(&stages, " Cắt thô ").is_some());
        assert!(find_stage(&stages, "cắt thô").is_none());
    }

    #[test]
    fn test_draft_roundtrips_participants() {
        let r = Report {
            participants: vec!["An".to_string()],
            ..Default::default()
        };
        let d = Draft::from_report(&r);
        assert_eq!(d.participants, vec![Participant::new("An")]);
        assert_eq!(d.participant_names(), vec!["An"]);
    }
}
