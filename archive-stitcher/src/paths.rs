/// Inserts `-norm` immediately before the file extension:
/// `archive/2A-1.mp3` -> `archive/2A-1-norm.mp3`.
pub fn with_norm_suffix(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-norm.{ext}"),
        None => format!("{filename}-norm"),
    }
}
