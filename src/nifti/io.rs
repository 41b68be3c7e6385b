//! Header-only NIfTI reading.
//!
//! Only the header is ever touched: uncompressed files are memory-mapped and
//! gzipped files are decompressed just far enough to cover the header.

use super::header::NiftiHeader;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "gz")
}

/// True if `path` names a NIfTI image (`.nii` or `.nii.gz`).
pub fn is_nifti_path(path: &Path) -> bool {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

/// Load only the header from a `.nii` or `.nii.gz` file.
///
/// # Example
/// ```ignore
/// let header = dwimeta::nifti::load_header("DWI_Tra_Asc_LR.nii")?;
/// let transform = header.orientation()?;
/// ```
pub fn load_header<P: AsRef<Path>>(path: P) -> Result<NiftiHeader> {
    let path = path.as_ref();

    if is_gzipped(path) {
        let file = File::open(path)?;
        let decoder = GzDecoder::new(BufReader::new(file));
        // Enough for either header version; from_bytes checks the length it needs
        let mut header_buf = Vec::with_capacity(NiftiHeader::SIZE_V2);
        decoder
            .take(NiftiHeader::SIZE_V2 as u64)
            .read_to_end(&mut header_buf)?;
        NiftiHeader::from_bytes(&header_buf)
    } else {
        let file = File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(Error::InvalidFileFormat(format!(
                "\"{}\" is empty",
                path.display()
            )));
        }
        // SAFETY: Memory mapping is safe - file just opened, read-only access
        let mmap = unsafe { Mmap::map(&file)? };
        NiftiHeader::from_bytes(&mmap)
    }
}

/// Write a header-only NIfTI file (gzipped if the name ends in `.gz`).
///
/// The result carries no voxel data; it exists so orientation fixtures can be
/// produced without an imaging toolkit.
pub fn save_header<P: AsRef<Path>>(header: &NiftiHeader, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = header.to_bytes();
    if is_gzipped(path) {
        let file = File::create(path)?;
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
        encoder.write_all(&bytes)?;
        encoder.finish()?;
    } else {
        std::fs::write(path, bytes)?;
    }
    Ok(())
}
