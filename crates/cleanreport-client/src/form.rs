//! Report form state machine.
//!
//! [`FormState`] is plain data: every transition is a method, and the presentation
//! layer re-renders from the returned [`FieldView`]s and [`FormState::is_submit_eligible`].

use std::collections::HashMap;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{Local, NaiveDate};
use cleanreport_core::{catalog, find_field, CategoryField, SubmissionMetadata, WorkType};
use cleanreport_processing::CompressionError;

use crate::config::ResetPolicy;
use crate::error::{Requirement, ValidationError};

/// Where a selected photo's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Path(PathBuf),
    Bytes(Bytes),
}

/// One file picked in a photo field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub source: FileSource,
}

impl SelectedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            source: FileSource::Path(path),
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Bytes(bytes.into()),
        }
    }

    /// Read the file contents. Unreadable files surface as [`CompressionError::Read`].
    pub async fn read(&self) -> Result<Bytes, CompressionError> {
        match &self.source {
            FileSource::Bytes(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| CompressionError::Read {
                    name: self.name.clone(),
                    message: e.to_string(),
                }),
        }
    }
}

/// Render state of one photo field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldView {
    pub id: &'static str,
    pub label: &'static str,
    pub enabled: bool,
    pub required: bool,
    pub count: usize,
    pub max_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    staff: String,
    site: String,
    report_date: Option<NaiveDate>,
    work_type: WorkType,
    work_time: Option<u32>,
    selections: HashMap<&'static str, Vec<SelectedFile>>,
}

impl FormState {
    /// Empty form with the normal work type selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty form dated `today`, as the page shows on load.
    pub fn dated(today: NaiveDate) -> Self {
        Self {
            report_date: Some(today),
            ..Self::default()
        }
    }

    pub fn staff(&self) -> &str {
        &self.staff
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn report_date(&self) -> Option<NaiveDate> {
        self.report_date
    }

    pub fn work_type(&self) -> WorkType {
        self.work_type
    }

    pub fn work_time(&self) -> Option<u32> {
        self.work_time
    }

    pub fn set_staff(&mut self, staff: impl Into<String>) {
        self.staff = staff.into();
    }

    pub fn set_site(&mut self, site: impl Into<String>) {
        self.site = site.into();
    }

    pub fn set_report_date(&mut self, date: Option<NaiveDate>) {
        self.report_date = date;
    }

    /// Set the work time in minutes. Only allowed when the work type asks for it.
    pub fn set_work_time(&mut self, minutes: Option<u32>) -> Result<(), ValidationError> {
        if minutes.is_some() && !self.work_time_enabled() {
            return Err(ValidationError::WorkTimeDisabled);
        }
        self.work_time = minutes;
        Ok(())
    }

    pub fn work_time_enabled(&self) -> bool {
        self.work_type.requires_work_time()
    }

    /// Switch work type. Fields that become inactive are cleared, and so is the
    /// work time unless the new type asks for one.
    pub fn set_work_type(&mut self, work_type: WorkType) -> Vec<FieldView> {
        self.work_type = work_type;
        self.selections
            .retain(|id, _| find_field(id).is_some_and(|f| f.is_active(work_type)));
        if !work_type.requires_work_time() {
            self.work_time = None;
        }
        self.field_views()
    }

    pub fn field_views(&self) -> Vec<FieldView> {
        catalog()
            .iter()
            .map(|field| FieldView {
                id: field.id,
                label: field.label,
                enabled: field.is_active(self.work_type),
                required: field.required,
                count: self.count(field.id),
                max_count: field.max_count,
            })
            .collect()
    }

    /// Replace the selection of `field_id`, like re-picking in a file input.
    ///
    /// A selection over the field's limit is rejected whole and leaves the field empty.
    pub fn select_files(
        &mut self,
        field_id: &str,
        files: Vec<SelectedFile>,
    ) -> Result<usize, ValidationError> {
        let field = find_field(field_id)
            .ok_or_else(|| ValidationError::UnknownField(field_id.to_string()))?;

        if !field.is_active(self.work_type) {
            return Err(ValidationError::FieldInactive {
                field_id: field.id.to_string(),
                label: field.label.to_string(),
            });
        }

        if files.len() > field.max_count {
            self.selections.remove(field.id);
            tracing::debug!(
                field = field.id,
                selected = files.len(),
                max = field.max_count,
                "Selection over field limit discarded"
            );
            return Err(ValidationError::TooManyFiles {
                field_id: field.id.to_string(),
                max: field.max_count,
                selected: files.len(),
            });
        }

        let count = files.len();
        if files.is_empty() {
            self.selections.remove(field.id);
        } else {
            self.selections.insert(field.id, files);
        }
        Ok(count)
    }

    pub fn files(&self, field_id: &str) -> &[SelectedFile] {
        self.selections
            .get(field_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn count(&self, field_id: &str) -> usize {
        self.files(field_id).len()
    }

    /// Active fields with at least one file, in catalog order.
    pub fn populated_fields(&self) -> Vec<(&'static CategoryField, &[SelectedFile])> {
        catalog()
            .iter()
            .filter(|field| field.is_active(self.work_type))
            .map(|field| (field, self.files(field.id)))
            .filter(|(_, files)| !files.is_empty())
            .collect()
    }

    pub fn total_files(&self) -> usize {
        self.populated_fields()
            .iter()
            .map(|(_, files)| files.len())
            .sum()
    }

    /// Every unmet submit condition, in form order.
    pub fn missing_requirements(&self) -> Vec<Requirement> {
        let mut missing = Vec::new();
        if self.staff.trim().is_empty() {
            missing.push(Requirement::Staff);
        }
        if self.site.trim().is_empty() {
            missing.push(Requirement::Site);
        }
        if self.report_date.is_none() {
            missing.push(Requirement::ReportDate);
        }
        if self.work_time_enabled() && self.work_time.unwrap_or(0) == 0 {
            missing.push(Requirement::WorkTime);
        }
        for field in catalog() {
            if field.required && field.is_active(self.work_type) && self.count(field.id) == 0 {
                missing.push(Requirement::Photos {
                    field_id: field.id,
                    label: field.label,
                });
            }
        }
        missing
    }

    pub fn is_submit_eligible(&self) -> bool {
        self.missing_requirements().is_empty()
    }

    /// Metadata for a submission, or `None` while the form is not eligible.
    pub fn snapshot_metadata(&self) -> Option<SubmissionMetadata> {
        if !self.is_submit_eligible() {
            return None;
        }
        Some(SubmissionMetadata {
            staff: self.staff.trim().to_string(),
            site: self.site.trim().to_string(),
            report_date: self.report_date?,
            work_type: self.work_type,
            work_time: self.work_time.filter(|_| self.work_time_enabled()),
        })
    }

    /// Clear the form for the next report. A blank reset starts over dated today,
    /// like a freshly loaded page.
    pub fn reset_after_success(&mut self, policy: ResetPolicy) {
        self.reset_after_success_on(policy, Local::now().date_naive());
    }

    pub fn reset_after_success_on(&mut self, policy: ResetPolicy, today: NaiveDate) {
        let kept = match policy {
            ResetPolicy::Blank => Self::dated(today),
            ResetPolicy::KeepStaffAndDate => Self {
                staff: std::mem::take(&mut self.staff),
                report_date: self.report_date,
                ..Self::new()
            },
        };
        *self = kept;
    }
}
