use serde_json::{json, Value};
use uuid::Uuid;

/// Smallest payload the relay accepts as a JPEG data URL.
pub const TEST_IMAGE: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";

/// Upload body for a normal cleaning report with `images` photos.
pub fn normal_report(images: usize) -> Value {
    let all_images: Vec<Value> = (0..images)
        .map(|_| {
            json!({
                "id": "normal_photos",
                "label": "通常清掃",
                "data": TEST_IMAGE,
            })
        })
        .collect();

    json!({
        "staff": "山田",
        "site": "本社ビル",
        "reportDate": "2024-05-01",
        "workTypeLabel": "通常清掃のみ",
        "allImages": all_images,
    })
}

/// One `singleImage` request of a per-image submission holding `total` photos.
pub fn single_image_report(submission_id: Uuid, sequence: usize, total: usize) -> Value {
    json!({
        "submissionId": submission_id,
        "staff": "山田",
        "site": "本社ビル",
        "reportDate": "2024-05-01",
        "workTypeLabel": "通常清掃のみ",
        "totalImages": total,
        "singleImage": {
            "id": "normal_photos",
            "label": "通常清掃",
            "data": TEST_IMAGE,
            "sequence": sequence,
        },
    })
}

/// Normal report whose photos each carry `image_bytes` of base64 text.
pub fn large_report(images: usize, image_bytes: usize) -> Value {
    let data = format!("data:image/jpeg;base64,{}", "A".repeat(image_bytes));
    let mut report = normal_report(0);
    report["allImages"] = Value::Array(
        (0..images)
            .map(|_| {
                json!({
                    "id": "normal_photos",
                    "label": "通常清掃",
                    "data": data,
                })
            })
            .collect(),
    );
    report
}
