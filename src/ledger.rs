use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::error::{Result, ShopfloorError};
use crate::lifecycle;
use crate::models::{find_stage, Draft, Report, Row, Staff, Stage};
use crate::table::{self, Payload, TableApi, TableOp};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct BulkOutcome {
    pub deleted: usize,
    pub locked: Vec<String>,
    pub missing: Vec<String>,
    pub failed: Vec<String>,
}

/// Every mutation reads the table, applies one transition, writes it back and
/// reads the whole table again.
pub struct ReportBook<T: TableApi> {
    api: T,
    reports: Vec<Report>,
    ids: Vec<String>,
    unreadable: Vec<String>,
}

impl<T: TableApi> ReportBook<T> {
    pub fn new(api: T) -> Self {
        Self {
            api,
            reports: Vec::new(),
            ids: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    pub fn load(api: T) -> Result<Self> {
        let mut book = Self::new(api);
        book.refresh()?;
        Ok(book)
    }

    pub fn api(&self) -> &T {
        &self.api
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    /// Keys of every stored row, including rows that failed to parse.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn unreadable(&self) -> &[String] {
        &self.unreadable
    }

    pub fn save(&self, table: &str, op: TableOp, rows: Vec<Row>) -> Result<Vec<Row>> {
        self.api.request(table, op, Payload::rows(rows))
    }

    pub fn refresh(&mut self) -> Result<&[Report]> {
        let rows = self.api.find(table::REPORTS)?;
        let mut reports = Vec::with_capacity(rows.len());
        let mut ids = Vec::with_capacity(rows.len());
        let mut unreadable = Vec::new();
        for row in rows {
            let key = table::row_key(table::REPORTS, &row);
            if let Some(k) = &key {
                ids.push(k.clone());
            }
            match Report::from_row(row) {
                Ok(r) => reports.push(r),
                Err(e) => {
                    warn!(id = key.as_deref().unwrap_or("?"), "unreadable report row: {e}");
                    unreadable.extend(key);
                }
            }
        }
        self.reports = reports;
        self.ids = ids;
        self.unreadable = unreadable;
        Ok(&self.reports)
    }

    pub fn get(&self, id: &str) -> Result<&Report> {
        let id = id.trim();
        if let Some(r) = self.reports.iter().find(|r| r.id.eq_ignore_ascii_case(id)) {
            return Ok(r);
        }
        if self.unreadable.iter().any(|u| u.eq_ignore_ascii_case(id)) {
            return Err(ShopfloorError::Parse(format!(
                "report {id} is stored but its row can't be read; correct it in the sheet"
            )));
        }
        Err(ShopfloorError::NotFound(format!("report {id}")))
    }

    fn refreshed(&mut self, id: &str, fallback: Report) -> Result<Report> {
        self.refresh()?;
        Ok(self.get(id).cloned().unwrap_or(fallback))
    }

    fn write_transition(&mut self, next: Report) -> Result<Report> {
        self.save(table::REPORTS, TableOp::Edit, vec![next.to_row()])?;
        let id = next.id.clone();
        self.refreshed(&id, next)
    }

    // -----------------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------------

    pub fn create(&mut self, draft: Draft, actor: &str, at: NaiveDateTime) -> Result<Report> {
        self.refresh()?;
        let stages = self.stages()?;
        let draft = lifecycle::with_stage_price(draft, &stages);
        let report = lifecycle::create(&draft, &self.ids, actor, at)?;
        self.save(table::REPORTS, TableOp::Add, vec![report.to_row()])?;
        info!(id = %report.id, stage = %report.stage, "report created");
        let id = report.id.clone();
        self.refreshed(&id, report)
    }

    pub fn update(&mut self, id: &str, draft: Draft, actor: &str, at: NaiveDateTime) -> Result<Report> {
        self.refresh()?;
        let current = self.get(id)?.clone();
        let stages = self.stages()?;
        let draft = if draft.stage != current.stage || draft.unit_price.trim().is_empty() {
            lifecycle::with_stage_price(draft, &stages)
        } else {
            draft
        };
        let next = lifecycle::update(&current, &draft, actor, at)?;
        info!(id = %next.id, "report updated");
        self.write_transition(next)
    }

    pub fn approve(&mut self, id: &str, approver: &str, at: NaiveDateTime) -> Result<Report> {
        self.refresh()?;
        let next = lifecycle::approve(self.get(id)?, approver, at)?;
        info!(id = %next.id, amount = %next.amount, "report approved");
        self.write_transition(next)
    }

    pub fn reject(&mut self, id: &str, approver: &str, at: NaiveDateTime) -> Result<Report> {
        self.refresh()?;
        let next = lifecycle::reject(self.get(id)?, approver, at)?;
        info!(id = %next.id, "report rejected");
        self.write_transition(next)
    }

    pub fn unapprove(&mut self, id: &str, actor: &str, at: NaiveDateTime) -> Result<Report> {
        self.refresh()?;
        let next = lifecycle::unapprove(self.get(id)?, actor, at)?;
        info!(id = %next.id, "report unapproved");
        self.write_transition(next)
    }

    pub fn resubmit(&mut self, id: &str, actor: &str, at: NaiveDateTime) -> Result<Report> {
        self.refresh()?;
        let next = lifecycle::resubmit(self.get(id)?, actor, at)?;
        info!(id = %next.id, "report resubmitted");
        self.write_transition(next)
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.refresh()?;
        let report = self.get(id)?;
        lifecycle::check_delete(report)?;
        let key = report.id.clone();
        self.api
            .request(table::REPORTS, TableOp::Delete, Payload::keys(table::REPORTS, &[key.clone()]))?;
        info!(id = %key, "report deleted");
        self.refresh()?;
        Ok(())
    }

    /// Delete each id with its own call. One failure never stops the rest.
    pub fn bulk_delete(&mut self, ids: &[String]) -> Result<BulkOutcome> {
        self.refresh()?;
        let mut outcome = BulkOutcome::default();
        for id in ids {
            let report = match self.get(id) {
                Ok(r) => r,
                Err(_) => {
                    outcome.missing.push(id.clone());
                    continue;
                }
            };
            if lifecycle::check_delete(report).is_err() {
                outcome.locked.push(report.id.clone());
                continue;
            }
            let key = report.id.clone();
            match self.api.request(
                table::REPORTS,
                TableOp::Delete,
                Payload::keys(table::REPORTS, &[key.clone()]),
            ) {
                Ok(_) => outcome.deleted += 1,
                Err(e) => {
                    warn!(id = %key, "delete failed: {e}");
                    outcome.failed.push(key);
                }
            }
        }
        self.refresh()?;
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // Reference tables
    // -----------------------------------------------------------------------

    pub fn stages(&self) -> Result<Vec<Stage>> {
        self.api
            .find(table::STAGES)?
            .into_iter()
            .map(|row| {
                serde_json::from_value::<Stage>(serde_json::Value::Object(row)).map_err(ShopfloorError::from)
            })
            .collect()
    }

    pub fn staff(&self) -> Result<Vec<Staff>> {
        self.api
            .find(table::STAFF)?
            .into_iter()
            .map(|row| {
                serde_json::from_value::<Staff>(serde_json::Value::Object(row)).map_err(ShopfloorError::from)
            })
            .collect()
    }

    pub fn add_stage(&self, name: &str, unit_price: &str, note: &str) -> Result<Stage> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShopfloorError::Validation(vec!["stage name is required".to_string()]));
        }
        if find_stage(&self.stages()?, name).is_some() {
            return Err(ShopfloorError::Validation(vec![format!("stage '{name}' already exists")]));
        }
        let stage = Stage {
            name: name.to_string(),
            unit_price: unit_price.trim().to_string(),
            note: note.trim().to_string(),
        };
        self.save(table::STAGES, TableOp::Add, vec![to_row(&stage)?])?;
        Ok(stage)
    }

    pub fn set_stage_price(&self, name: &str, unit_price: &str) -> Result<Stage> {
        let mut stage = find_stage(&self.stages()?, name)
            .cloned()
            .ok_or_else(|| ShopfloorError::NotFound(format!("stage {name}")))?;
        stage.unit_price = unit_price.trim().to_string();
        self.save(table::STAGES, TableOp::Edit, vec![to_row(&stage)?])?;
        Ok(stage)
    }

    pub fn remove_stage(&self, name: &str) -> Result<()> {
        let stage = find_stage(&self.stages()?, name)
            .cloned()
            .ok_or_else(|| ShopfloorError::NotFound(format!("stage {name}")))?;
        self.api.request(
            table::STAGES,
            TableOp::Delete,
            Payload::keys(table::STAGES, &[stage.name]),
        )?;
        Ok(())
    }

    pub fn add_staff(&self, name: &str, position: &str) -> Result<Staff> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ShopfloorError::Validation(vec!["staff name is required".to_string()]));
        }
        if self.staff()?.iter().any(|s| s.name.trim() == name) {
            return Err(ShopfloorError::Validation(vec![format!("staff '{name}' already exists")]));
        }
        let staff = Staff {
            name: name.to_string(),
            position: position.trim().to_string(),
        };
        self.save(table::STAFF, TableOp::Add, vec![to_row(&staff)?])?;
        Ok(staff)
    }

    pub fn remove_staff(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if !self.staff()?.iter().any(|s| s.name.trim() == name) {
            return Err(ShopfloorError::NotFound(format!("staff {name}")));
        }
        self.api.request(
            table::STAFF,
            TableOp::Delete,
            Payload::keys(table::STAFF, &[name.to_string()]),
        )?;
        Ok(())
    }
}

fn to_row<S: serde::Serialize>(value: &S) -> Result<Row> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ShopfloorError::Other(format!("expected an object, got {other}"))),
    }
}

pub fn unknown_participants(names: &[String], staff: &[Staff]) -> Vec<String> {
    names
        .iter()
        .filter(|n| !staff.iter().any(|s| s.name.trim() == n.trim()))
        .cloned()
        .collect()
}
