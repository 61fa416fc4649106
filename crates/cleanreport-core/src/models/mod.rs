pub mod catalog;
pub mod submission;
pub mod work_type;

pub use catalog::{catalog, find_field, Category, CategoryField};
pub use submission::{
    sanitize_component, ForwardUnit, ImageAsset, SubmissionMetadata, TransferPayload, UnitShape,
    UploadRequest,
};
pub use work_type::WorkType;
