//! Where downloaded images land on disk.

use std::path::{Component, Path, PathBuf};

/// `<dest_dir>/<encoded_title>.<ext>`, with relative directories anchored at `./`.
///
/// Path separators in the title are replaced so a title can never escape
/// the destination directory.
///
/// ```
/// use marquee_scrape::store::image_path;
/// use std::path::Path;
///
/// let p = image_path(Path::new("ShowsImages"), "The+Wire", "jpg");
/// assert_eq!(p.to_string_lossy(), "./ShowsImages/The+Wire.jpg");
/// ```
pub fn image_path(dest_dir: &Path, encoded_title: &str, extension: &str) -> PathBuf {
    let file_name = format!("{}.{extension}", sanitize_file_stem(encoded_title));
    anchor(dest_dir).join(file_name)
}

fn anchor(dest_dir: &Path) -> PathBuf {
    match dest_dir.components().next() {
        Some(Component::Normal(_)) => Path::new(".").join(dest_dir),
        _ => dest_dir.to_path_buf(),
    }
}

fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
