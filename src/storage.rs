use std::path::Path;

use uuid::Uuid;

/// Doctor profile photos live under `{media_dir}/doctor-photos/` and are
/// served statically at `/media/doctor-photos/`.
const PHOTO_SUBDIR: &str = "doctor-photos";

pub const MAX_PHOTO_BYTES: usize = 1024 * 1024; // 1 MiB

pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Media-relative path a doctor's photo is stored at. One file per doctor,
/// so the path only changes when the image type does.
pub fn photo_rel(doctor_id: Uuid, ext: &str) -> String {
    format!("{PHOTO_SUBDIR}/{doctor_id}.{ext}")
}

/// Write the photo, overwriting any previous upload for this doctor.
/// Returns the path relative to the media dir.
pub async fn save_doctor_photo(
    media_dir: &str,
    doctor_id: Uuid,
    ext: &str,
    bytes: &[u8],
) -> std::io::Result<String> {
    let dir = Path::new(media_dir).join(PHOTO_SUBDIR);
    tokio::fs::create_dir_all(&dir).await?;
    let rel = photo_rel(doctor_id, ext);
    tokio::fs::write(Path::new(media_dir).join(&rel), bytes).await?;
    Ok(rel)
}

/// Best-effort removal; a missing file is not an error.
pub async fn delete_doctor_photo(media_dir: &str, rel: &str) {
    let _ = tokio::fs::remove_file(Path::new(media_dir).join(rel)).await;
}

pub fn photo_url(public_base_url: &str, rel: &str) -> String {
    format!("{}/media/{rel}", public_base_url.trim_end_matches('/'))
}

/// Extract the media-relative path from a stored public URL.
pub fn path_from_url(url: &str) -> Option<&str> {
    url.split_once("/media/").map(|(_, rel)| rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/webp"), Some("webp"));
        assert_eq!(extension_for("image/gif"), None);
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn test_photo_rel_changes_with_image_type() {
        let id = Uuid::nil();
        assert_eq!(photo_rel(id, "jpg"), format!("doctor-photos/{id}.jpg"));
        // jpg -> png re-upload must land at a different path, and the stored
        // URL must map back to the old path so it can be removed
        assert_ne!(photo_rel(id, "jpg"), photo_rel(id, "png"));
        let old_url = photo_url("http://localhost:8080", &photo_rel(id, "jpg"));
        assert_eq!(path_from_url(&old_url), Some(photo_rel(id, "jpg").as_str()));
    }

    #[test]
    fn test_photo_url_and_back() {
        let url = photo_url("http://localhost:8080/", "doctor-photos/x.jpg");
        assert_eq!(url, "http://localhost:8080/media/doctor-photos/x.jpg");
        assert_eq!(path_from_url(&url), Some("doctor-photos/x.jpg"));
        assert_eq!(path_from_url("not a url"), None);
    }
}
