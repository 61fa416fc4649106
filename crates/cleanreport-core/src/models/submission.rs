//! Submission payload types shared by the client, the relay and the sinks.
//!
//! [`UploadRequest`] is the JSON body of `POST /upload`. It carries either every image
//! (`allImages`) or one image (`singleImage`); [`TransferPayload::from_request`] normalizes
//! both shapes and checks the catalog invariants.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::catalog::{find_field, CategoryField};
use super::work_type::WorkType;
use crate::error::AppError;
use crate::sink_types::ForwardMode;

/// Job metadata. Immutable once a submission begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetadata {
    pub staff: String,
    pub site: String,
    pub report_date: NaiveDate,
    pub work_type: WorkType,
    /// Work time in minutes. Only meaningful for filter and full work types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_time: Option<u32>,
}

impl SubmissionMetadata {
    /// Deterministic per-submission folder name: `{site}_({reportDate})_{staff}`.
    pub fn folder_name(&self) -> String {
        format!(
            "{}_({})_{}",
            sanitize_component(&self.site),
            self.report_date.format("%Y-%m-%d"),
            sanitize_component(&self.staff)
        )
    }

    /// Human-readable image name, `{folder}_{label}_{sequence}`.
    pub fn image_display_name(&self, label: &str, sequence: u32) -> String {
        format!(
            "{}_{}_{}",
            self.folder_name(),
            sanitize_component(label),
            sequence
        )
    }
}

/// Replace characters that are unsafe in file or folder names with `_`.
///
/// Empty values and dot-only values (`.`, `..`) collapse to `_` so a name can never
/// address a parent directory.
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        cleaned
    }
}

/// A compressed photo. Also the wire shape of one entry of `allImages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    /// Catalog field the photo was selected in. Optional on the wire for older clients.
    #[serde(rename = "id", default, skip_serializing_if = "Option::is_none")]
    pub source_field_id: Option<String>,
    #[serde(default)]
    pub label: String,
    /// `data:image/jpeg;base64,...`
    pub data: String,
    #[serde(default)]
    pub is_extra: bool,
    /// 1-based position within its field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ImageAsset {
    pub fn new(field: &CategoryField, sequence: u32, data: String) -> Self {
        Self {
            source_field_id: Some(field.id.to_string()),
            label: field.label.to_string(),
            data,
            is_extra: field.is_extra(),
            sequence: Some(sequence),
            name: None,
        }
    }

    /// File name used by file-store sinks: `{label}_{sequence}.jpg`.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.jpg",
            sanitize_component(&self.label),
            self.sequence.unwrap_or(1)
        )
    }
}

fn is_image_data_url(data: &str) -> bool {
    data.starts_with("data:image/") && data.contains(";base64,")
}

/// Everything one submission sends: metadata plus ordered images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferPayload {
    pub submission_id: Uuid,
    pub metadata: SubmissionMetadata,
    pub images: Vec<ImageAsset>,
    /// Images of the whole submission when this payload carries only part of it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_images: Option<usize>,
}

impl TransferPayload {
    pub fn new(metadata: SubmissionMetadata, images: Vec<ImageAsset>) -> Self {
        Self {
            submission_id: Uuid::new_v4(),
            metadata,
            images,
            submission_images: None,
        }
    }

    /// Number of images the submission holds across every request sent for it.
    pub fn submission_image_count(&self) -> usize {
        self.submission_images.unwrap_or(0).max(self.images.len())
    }

    /// Request carrying the whole payload in `allImages`.
    pub fn batch_request(&self) -> UploadRequest {
        UploadRequest {
            all_images: Some(self.images.clone()),
            total_images: Some(self.submission_image_count()),
            ..UploadRequest::metadata_only(self.submission_id, &self.metadata)
        }
    }

    /// Request carrying the image at `index` in `singleImage`.
    pub fn single_request(&self, index: usize) -> Option<UploadRequest> {
        let image = self.images.get(index)?;
        Some(UploadRequest {
            single_image: Some(image.clone()),
            total_images: Some(self.submission_image_count()),
            ..UploadRequest::metadata_only(self.submission_id, &self.metadata)
        })
    }

    /// Split the payload into the sink calls the relay performs.
    ///
    /// A payload without images still produces one metadata-only unit so the report
    /// itself reaches the sink.
    pub fn forward_units(&self, mode: ForwardMode) -> Vec<ForwardUnit> {
        match mode {
            ForwardMode::PerImage if !self.images.is_empty() => {
                let total = self.images.len();
                self.images
                    .iter()
                    .enumerate()
                    .map(|(index, image)| ForwardUnit {
                        submission_id: self.submission_id,
                        index,
                        total,
                        shape: UnitShape::PerImage,
                        metadata: self.metadata.clone(),
                        images: vec![image.clone()],
                    })
                    .collect()
            }
            _ => vec![ForwardUnit {
                submission_id: self.submission_id,
                index: 0,
                total: 1,
                shape: UnitShape::Batch,
                metadata: self.metadata.clone(),
                images: self.images.clone(),
            }],
        }
    }

    /// Normalize and validate a request received by the relay.
    ///
    /// - `workType` falls back to the work type named by `workTypeLabel`
    /// - images must be base64 image data URLs
    /// - images naming a field must name a field active under the work type
    /// - missing sequences are assigned per label in arrival order
    pub fn from_request(req: UploadRequest) -> Result<Self, AppError> {
        let staff = req.staff.trim().to_string();
        let site = req.site.trim().to_string();
        if staff.is_empty() {
            return Err(AppError::InvalidInput("staff is required".to_string()));
        }
        if site.is_empty() {
            return Err(AppError::InvalidInput("site is required".to_string()));
        }

        let work_type = match req.work_type {
            Some(work_type) => work_type,
            None => WorkType::from_label(&req.work_type_label).ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Unknown work type label: {}",
                    req.work_type_label
                ))
            })?,
        };

        let mut images = req.all_images.unwrap_or_default();
        images.extend(req.single_image);

        let mut per_label: HashMap<String, u32> = HashMap::new();
        for image in images.iter_mut() {
            if !is_image_data_url(&image.data) {
                return Err(AppError::InvalidInput(format!(
                    "Image '{}' is not a base64 image data URL",
                    image.label
                )));
            }

            if let Some(id) = image.source_field_id.as_deref() {
                let field = find_field(id)
                    .ok_or_else(|| AppError::InvalidInput(format!("Unknown photo field: {}", id)))?;
                if !field.is_active(work_type) {
                    return Err(AppError::InvalidInput(format!(
                        "Photo field {} is not enabled for work type {}",
                        id, work_type
                    )));
                }
                if image.label.trim().is_empty() {
                    image.label = field.label.to_string();
                }
                image.is_extra = field.is_extra();
            }

            if image.label.trim().is_empty() {
                return Err(AppError::InvalidInput("Image label is required".to_string()));
            }

            let counter = per_label.entry(image.label.clone()).or_insert(0);
            match image.sequence {
                Some(0) => {
                    return Err(AppError::InvalidInput(
                        "Image sequence numbers start at 1".to_string(),
                    ))
                }
                Some(sequence) => *counter = (*counter).max(sequence),
                None => {
                    *counter += 1;
                    image.sequence = Some(*counter);
                }
            }
        }

        Ok(TransferPayload {
            submission_id: req.submission_id.unwrap_or_else(Uuid::new_v4),
            metadata: SubmissionMetadata {
                staff,
                site,
                report_date: req.report_date,
                work_type,
                work_time: req.work_time,
            },
            images,
            submission_images: req.total_images,
        })
    }
}

/// Whether a forward unit carries one image or the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitShape {
    PerImage,
    Batch,
}

/// One sink call, identified by `(submission_id, index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardUnit {
    pub submission_id: Uuid,
    pub index: usize,
    pub total: usize,
    pub shape: UnitShape,
    pub metadata: SubmissionMetadata,
    pub images: Vec<ImageAsset>,
}

impl ForwardUnit {
    /// Wire body for script-style sinks.
    pub fn to_request(&self) -> UploadRequest {
        let base = UploadRequest::metadata_only(self.submission_id, &self.metadata);
        match self.shape {
            UnitShape::PerImage => UploadRequest {
                single_image: self.images.first().cloned(),
                ..base
            },
            UnitShape::Batch => UploadRequest {
                all_images: Some(self.images.clone()),
                ..base
            },
        }
    }
}

/// JSON body of `POST /upload`, and of each script-sink call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<Uuid>,
    pub staff: String,
    pub site: String,
    pub report_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<WorkType>,
    #[serde(default)]
    pub work_type_label: String,
    #[serde(
        default,
        deserialize_with = "deserialize_work_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub work_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_images: Option<Vec<ImageAsset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_image: Option<ImageAsset>,
    /// Images in the whole submission. Lets the relay track progress across
    /// per-image requests sharing one `submissionId`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_images: Option<usize>,
}

impl UploadRequest {
    pub fn metadata_only(submission_id: Uuid, metadata: &SubmissionMetadata) -> Self {
        Self {
            submission_id: Some(submission_id),
            staff: metadata.staff.clone(),
            site: metadata.site.clone(),
            report_date: metadata.report_date,
            work_type: Some(metadata.work_type),
            work_type_label: metadata.work_type.label().to_string(),
            work_time: metadata.work_time,
            all_images: None,
            single_image: None,
            total_images: None,
        }
    }

    pub fn image_count(&self) -> usize {
        self.all_images.as_ref().map_or(0, Vec::len) + usize::from(self.single_image.is_some())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WorkTimeRepr {
    Minutes(u32),
    Text(String),
}

/// Work time arrives as a number, a numeric string, or `""` from a select box left empty.
fn deserialize_work_time<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<WorkTimeRepr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(WorkTimeRepr::Minutes(minutes)) => Ok(Some(minutes)),
        Some(WorkTimeRepr::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                Ok(None)
            } else {
                text.parse::<u32>()
                    .map(Some)
                    .map_err(|_| D::Error::custom(format!("invalid workTime: {}", text)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::catalog;
    use serde_json::json;

    const DATA: &str = "data:image/jpeg;base64,/9j/4AAQ";

    fn metadata(work_type: WorkType) -> SubmissionMetadata {
        SubmissionMetadata {
            staff: "A".to_string(),
            site: "B".to_string(),
            report_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            work_type,
            work_time: None,
        }
    }

    fn field(id: &str) -> &'static CategoryField {
        find_field(id).unwrap()
    }

    #[test]
    fn test_folder_name_is_deterministic_and_sanitized() {
        let mut m = metadata(WorkType::Normal);
        assert_eq!(m.folder_name(), "B_(2024-01-01)_A");
        m.site = "Tower 1/2F".to_string();
        m.staff = "..".to_string();
        assert_eq!(m.folder_name(), "Tower 1_2F_(2024-01-01)__");
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("  a:b*c  "), "a_b_c");
        assert_eq!(sanitize_component(""), "_");
        assert_eq!(sanitize_component("."), "_");
        assert_eq!(sanitize_component("x\ny"), "x_y");
    }

    #[test]
    fn test_image_file_name() {
        let image = ImageAsset::new(field("regular_after"), 3, DATA.to_string());
        assert_eq!(image.file_name(), "定期清掃_作業後_3.jpg");
        assert!(image.is_extra);
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let payload = TransferPayload::new(
            metadata(WorkType::Normal),
            vec![ImageAsset::new(field("normal_photos"), 1, DATA.to_string())],
        );
        let value = serde_json::to_value(payload.batch_request()).unwrap();
        assert_eq!(value["reportDate"], "2024-01-01");
        assert_eq!(value["workTypeLabel"], "通常清掃のみ");
        assert_eq!(value["allImages"][0]["id"], "normal_photos");
        assert_eq!(value["allImages"][0]["isExtra"], false);
        assert!(value.get("singleImage").is_none());
        assert!(value.get("workTime").is_none());
    }

    #[test]
    fn test_work_time_accepts_string_number_and_empty() {
        let base = json!({"staff": "A", "site": "B", "reportDate": "2024-01-01"});

        let mut v = base.clone();
        v["workTime"] = json!("90");
        let req: UploadRequest = serde_json::from_value(v).unwrap();
        assert_eq!(req.work_time, Some(90));

        let mut v = base.clone();
        v["workTime"] = json!(45);
        let req: UploadRequest = serde_json::from_value(v).unwrap();
        assert_eq!(req.work_time, Some(45));

        let mut v = base.clone();
        v["workTime"] = json!("");
        let req: UploadRequest = serde_json::from_value(v).unwrap();
        assert_eq!(req.work_time, None);

        let req: UploadRequest = serde_json::from_value(base.clone()).unwrap();
        assert_eq!(req.work_time, None);

        let mut v = base;
        v["workTime"] = json!("abc");
        assert!(serde_json::from_value::<UploadRequest>(v).is_err());
    }

    #[test]
    fn test_from_request_resolves_label_and_assigns_sequences() {
        let req: UploadRequest = serde_json::from_value(json!({
            "staff": " A ",
            "site": "B",
            "reportDate": "2024-01-01",
            "workTypeLabel": "定期清掃＋フィルター清掃",
            "workTime": "30",
            "allImages": [
                {"label": "photo", "data": DATA},
                {"label": "photo", "data": DATA},
                {"id": "filter", "data": DATA}
            ]
        }))
        .unwrap();

        let payload = TransferPayload::from_request(req).unwrap();
        assert_eq!(payload.metadata.staff, "A");
        assert_eq!(payload.metadata.work_type, WorkType::Full);
        assert_eq!(payload.metadata.work_time, Some(30));
        let seqs: Vec<_> = payload.images.iter().map(|i| i.sequence).collect();
        assert_eq!(seqs, vec![Some(1), Some(2), Some(1)]);
        assert_eq!(payload.images[2].label, "フィルター清掃");
        assert!(payload.images[2].is_extra);
    }

    #[test]
    fn test_from_request_accepts_single_image() {
        let payload = TransferPayload::new(
            metadata(WorkType::Normal),
            vec![ImageAsset::new(field("normal_photos"), 1, DATA.to_string())],
        );
        let req = payload.single_request(0).unwrap();
        assert!(req.all_images.is_none());
        assert_eq!(req.image_count(), 1);

        let parsed = TransferPayload::from_request(req).unwrap();
        assert_eq!(parsed.submission_id, payload.submission_id);
        assert_eq!(parsed.images, payload.images);
        assert!(payload.single_request(1).is_none());
    }

    #[test]
    fn test_single_requests_carry_submission_image_count() {
        let images = (1..=3)
            .map(|seq| ImageAsset::new(field("normal_photos"), seq, DATA.to_string()))
            .collect();
        let payload = TransferPayload::new(metadata(WorkType::Normal), images);

        let req = payload.single_request(1).unwrap();
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["totalImages"], 3);

        let parsed = TransferPayload::from_request(req).unwrap();
        assert_eq!(parsed.images.len(), 1);
        assert_eq!(parsed.submission_image_count(), 3);

        let mut legacy = payload.single_request(0).unwrap();
        legacy.total_images = None;
        let parsed = TransferPayload::from_request(legacy).unwrap();
        assert_eq!(parsed.submission_image_count(), 1);
    }

    #[test]
    fn test_from_request_rejects_inactive_field() {
        let payload = TransferPayload::new(
            metadata(WorkType::Regular),
            vec![ImageAsset::new(field("filter"), 1, DATA.to_string())],
        );
        let err = TransferPayload::from_request(payload.batch_request()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_from_request_rejects_bad_input() {
        let mut req = TransferPayload::new(metadata(WorkType::Normal), vec![]).batch_request();
        req.staff = "  ".to_string();
        assert!(TransferPayload::from_request(req).is_err());

        let mut req = TransferPayload::new(metadata(WorkType::Normal), vec![]).batch_request();
        req.work_type = None;
        req.work_type_label = "その他".to_string();
        assert!(TransferPayload::from_request(req).is_err());

        let req = TransferPayload::new(
            metadata(WorkType::Normal),
            vec![ImageAsset::new(field("normal_photos"), 1, "not-a-data-url".to_string())],
        )
        .batch_request();
        assert!(TransferPayload::from_request(req).is_err());

        let req = TransferPayload::new(
            metadata(WorkType::Normal),
            vec![ImageAsset::new(field("normal_photos"), 0, DATA.to_string())],
        )
        .batch_request();
        assert!(TransferPayload::from_request(req).is_err());
    }

    #[test]
    fn test_forward_units_per_image_and_single() {
        let images: Vec<_> = catalog()
            .iter()
            .filter(|f| f.is_active(WorkType::Full))
            .map(|f| ImageAsset::new(f, 1, DATA.to_string()))
            .collect();
        let payload = TransferPayload::new(metadata(WorkType::Full), images);

        let units = payload.forward_units(ForwardMode::PerImage);
        assert_eq!(units.len(), payload.images.len());
        assert!(units.iter().enumerate().all(|(i, u)| u.index == i
            && u.total == payload.images.len()
            && u.images.len() == 1));
        let req = units[1].to_request();
        assert_eq!(req.single_image.as_ref(), Some(&payload.images[1]));
        assert!(req.all_images.is_none());

        let units = payload.forward_units(ForwardMode::Single);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].to_request().image_count(), payload.images.len());
    }

    #[test]
    fn test_forward_units_without_images_sends_metadata() {
        let payload = TransferPayload::new(metadata(WorkType::Normal), vec![]);
        let units = payload.forward_units(ForwardMode::PerImage);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].shape, UnitShape::Batch);
        assert_eq!(units[0].to_request().image_count(), 0);
    }
}
