use super::Result;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Opens SAM text input for streaming.
///
/// `None` or `-` reads from stdin. Paths ending in `.gz`/`.gzip` are decompressed on the fly.
pub fn open_sam_reader(path: Option<&Path>) -> Result<Box<dyn BufRead + Send>> {
    fn is_gzipped(path: &Path) -> bool {
        let path_str = path.to_string_lossy().to_lowercase();
        path_str.ends_with(".gz") || path_str.ends_with(".gzip")
    }

    let path = match path {
        Some(path) if path != Path::new("-") => path,
        _ => return Ok(Box::new(BufReader::new(io::stdin()))),
    };

    let file =
        File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    if is_gzipped(path) {
        let gz_decoder = MultiGzDecoder::new(file);
        if gz_decoder.header().is_some() {
            Ok(Box::new(BufReader::new(gz_decoder)))
        } else {
            Err(format!("Invalid gzip header: {}", path.to_string_lossy()))
        }
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}
