//! Client-side errors.

use cleanreport_processing::CompressionError;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Message shown whenever sending to the relay fails.
pub const SEND_FAILED_MESSAGE: &str = "送信中にエラーが発生しました。\n通信環境を確認してください。";

/// Message shown when a submit is attempted with required inputs missing.
pub const MISSING_FIELDS_MESSAGE: &str = "必須項目をすべて入力してください";

/// A condition that keeps the form from being submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Staff,
    Site,
    ReportDate,
    WorkTime,
    Photos { field_id: &'static str, label: &'static str },
}

impl Display for Requirement {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Requirement::Staff => write!(f, "担当者を入力してください"),
            Requirement::Site => write!(f, "現場名を入力してください"),
            Requirement::ReportDate => write!(f, "作業日を選択してください"),
            Requirement::WorkTime => write!(f, "作業時間を選択してください"),
            Requirement::Photos { label, .. } => write!(f, "{}の写真を選択してください", label),
        }
    }
}

/// One photo that could not be compressed.
#[derive(Debug)]
pub struct CompressionFailure {
    pub file: String,
    pub error: CompressionError,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("一度に選択できるのは{max}枚までです")]
    TooManyFiles {
        field_id: String,
        max: usize,
        selected: usize,
    },

    #[error("{label}は現在の清掃区分では選択できません")]
    FieldInactive { field_id: String, label: String },

    #[error("Unknown photo field: {0}")]
    UnknownField(String),

    #[error("作業時間はフィルター清掃を含む区分でのみ入力できます")]
    WorkTimeDisabled,

    #[error("必須項目をすべて入力してください")]
    MissingField(Vec<Requirement>),

    #[error("画像の圧縮に失敗しました: {}", file_list(.0))]
    Compression(Vec<CompressionFailure>),
}

fn file_list(failures: &[CompressionFailure]) -> String {
    failures
        .iter()
        .map(|f| f.file.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure talking to the relay.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Relay responded with status {0}")]
    Status(u16),

    #[error("Relay unreachable: {0}")]
    Network(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SubmitError {
    /// Text for the user. Transport failures all map to one generic retry prompt.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Validation(e) => e.to_string(),
            SubmitError::Transport(_) => SEND_FAILED_MESSAGE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_files_message() {
        let err = ValidationError::TooManyFiles {
            field_id: "normal_photos".to_string(),
            max: 10,
            selected: 11,
        };
        assert_eq!(err.to_string(), "一度に選択できるのは10枚までです");
    }

    #[test]
    fn test_transport_errors_share_one_message() {
        let status = SubmitError::from(TransportError::Status(502));
        let network = SubmitError::from(TransportError::Network("reset".into()));
        assert_eq!(status.user_message(), SEND_FAILED_MESSAGE);
        assert_eq!(network.user_message(), SEND_FAILED_MESSAGE);
    }

    #[test]
    fn test_compression_failure_lists_files() {
        let err = ValidationError::Compression(vec![
            CompressionFailure {
                file: "a.heic".to_string(),
                error: CompressionError::Decode("unsupported".into()),
            },
            CompressionFailure {
                file: "b.txt".to_string(),
                error: CompressionError::Decode("unsupported".into()),
            },
        ]);
        assert_eq!(err.to_string(), "画像の圧縮に失敗しました: a.heic, b.txt");
    }
}
