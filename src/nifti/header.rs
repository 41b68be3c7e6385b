//! `NIfTI` header parsing, restricted to the fields that define orientation.
//!
//! Supports both NIfTI-1 (348-byte header) and NIfTI-2 (540-byte header) formats
//! with automatic version detection and endianness handling.

use crate::error::{Error, Result};
use crate::orientation::OrientationTransform;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// NIfTI format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NiftiVersion {
    /// NIfTI-1 format (348-byte header, 16-bit dimensions)
    #[default]
    Nifti1,
    /// NIfTI-2 format (540-byte header, 64-bit dimensions)
    Nifti2,
}

impl NiftiVersion {
    /// Header size in bytes for this version.
    pub const fn header_size(self) -> usize {
        match self {
            Self::Nifti1 => 348,
            Self::Nifti2 => 540,
        }
    }

    /// Default vox_offset for this version (header size + extension flag).
    pub const fn default_vox_offset(self) -> i64 {
        match self {
            Self::Nifti1 => 352,
            Self::Nifti2 => 544,
        }
    }
}

/// NIfTI-1 header field byte offsets.
mod offsets_v1 {
    pub const SIZEOF_HDR: usize = 0;
    pub const DIM: usize = 40;
    pub const DATATYPE: usize = 70;
    pub const BITPIX: usize = 72;
    pub const PIXDIM: usize = 76;
    pub const VOX_OFFSET: usize = 108;
    pub const QFORM_CODE: usize = 252;
    pub const SFORM_CODE: usize = 254;
    pub const QUATERN_B: usize = 256;
    pub const QOFFSET_X: usize = 268;
    pub const SROW_X: usize = 280;
    pub const SROW_Y: usize = 296;
    pub const SROW_Z: usize = 312;
    pub const MAGIC: usize = 344;
}

/// NIfTI-2 header field byte offsets.
mod offsets_v2 {
    pub const SIZEOF_HDR: usize = 0;
    pub const MAGIC: usize = 4;
    pub const DATATYPE: usize = 12;
    pub const BITPIX: usize = 14;
    pub const DIM: usize = 16;
    pub const PIXDIM: usize = 104;
    pub const VOX_OFFSET: usize = 168;
    pub const QFORM_CODE: usize = 344;
    pub const SFORM_CODE: usize = 348;
    pub const QUATERN_B: usize = 352;
    pub const QOFFSET_X: usize = 376;
    pub const SROW_X: usize = 400;
    pub const SROW_Y: usize = 432;
    pub const SROW_Z: usize = 464;
}

/// Float32 datatype code and bit width, written into fixture headers.
const FLOAT32_CODE: i16 = 16;
const FLOAT32_BITPIX: i16 = 32;

/// Orientation-relevant subset of a NIfTI header.
///
/// Internally uses 64-bit dimensions and f64 precision to accommodate NIfTI-2.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// NIfTI format version.
    pub version: NiftiVersion,
    /// Number of dimensions (1-7).
    pub ndim: u8,
    /// Size along each dimension.
    pub dim: [i64; 7],
    /// Voxel sizes (pixdim[1..=ndim]) and qfac at index 0.
    pub pixdim: [f64; 8],
    /// Data offset in file.
    pub vox_offset: i64,
    /// qform transform code.
    pub qform_code: i32,
    /// sform transform code.
    pub sform_code: i32,
    /// Quaternion parameters b, c, d of the qform.
    pub quatern: [f64; 3],
    /// Offset parameters of the qform.
    pub qoffset: [f64; 3],
    /// First row of the sform affine matrix.
    pub srow_x: [f64; 4],
    /// Second row of the sform affine matrix.
    pub srow_y: [f64; 4],
    /// Third row of the sform affine matrix.
    pub srow_z: [f64; 4],
    /// File endianness (true = little endian).
    pub(crate) little_endian: bool,
}

impl Default for NiftiHeader {
    fn default() -> Self {
        Self {
            version: NiftiVersion::Nifti1,
            ndim: 4,
            dim: [1, 1, 1, 1, 1, 1, 1],
            pixdim: [1.0; 8],
            vox_offset: 352,
            qform_code: 0,
            sform_code: 1,
            quatern: [0.0; 3],
            qoffset: [0.0; 3],
            srow_x: [1.0, 0.0, 0.0, 0.0],
            srow_y: [0.0, 1.0, 0.0, 0.0],
            srow_z: [0.0, 0.0, 1.0, 0.0],
            little_endian: true,
        }
    }
}

impl NiftiHeader {
    /// Size of NIfTI-1 header in bytes.
    pub const SIZE: usize = 348;

    /// Size of NIfTI-2 header in bytes.
    pub const SIZE_V2: usize = 540;

    /// Header with the given 4x4 affine stored as sform.
    pub fn with_affine(affine: [[f64; 4]; 4]) -> Self {
        let mut header = Self::default();
        header.set_affine_f64(affine);
        header
    }

    /// Read header from bytes with automatic version and endianness detection.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "header too short to detect version",
            )));
        }

        // Detect version and endianness from sizeof_hdr field
        let sizeof_hdr_le = LittleEndian::read_i32(&bytes[0..4]);
        let sizeof_hdr_be = BigEndian::read_i32(&bytes[0..4]);

        let (version, little_endian) = if sizeof_hdr_le == 348 {
            (NiftiVersion::Nifti1, true)
        } else if sizeof_hdr_be == 348 {
            (NiftiVersion::Nifti1, false)
        } else if sizeof_hdr_le == 540 {
            (NiftiVersion::Nifti2, true)
        } else if sizeof_hdr_be == 540 {
            (NiftiVersion::Nifti2, false)
        } else {
            return Err(Error::InvalidMagic([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]));
        };

        let required_size = version.header_size();
        if bytes.len() < required_size {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "header too short: got {} bytes, need {} for {:?}",
                    bytes.len(),
                    required_size,
                    version
                ),
            )));
        }

        match (version, little_endian) {
            (NiftiVersion::Nifti1, true) => Self::parse_v1::<LittleEndian>(bytes, true),
            (NiftiVersion::Nifti1, false) => Self::parse_v1::<BigEndian>(bytes, false),
            (NiftiVersion::Nifti2, true) => Self::parse_v2::<LittleEndian>(bytes, true),
            (NiftiVersion::Nifti2, false) => Self::parse_v2::<BigEndian>(bytes, false),
        }
    }

    /// Parse NIfTI-1 header.
    #[allow(clippy::wildcard_imports)]
    fn parse_v1<E: ByteOrder>(bytes: &[u8], little_endian: bool) -> Result<Self> {
        use offsets_v1::*;

        let magic = &bytes[MAGIC..MAGIC + 4];
        if magic != b"n+1\0" && magic != b"ni1\0" {
            return Err(Error::InvalidMagic([
                magic[0], magic[1], magic[2], magic[3],
            ]));
        }

        let ndim_raw = E::read_i16(&bytes[DIM..DIM + 2]);
        if !(1..=7).contains(&ndim_raw) {
            return Err(Error::InvalidDimensions(format!(
                "ndim must be 1..=7, got {}",
                ndim_raw
            )));
        }

        let mut dim = [0i64; 7];
        for (i, dim_val) in dim.iter_mut().enumerate() {
            let offset = DIM + 2 + i * 2;
            *dim_val = E::read_i16(&bytes[offset..offset + 2]) as i64;
        }

        let mut pixdim = [0.0f64; 8];
        for (i, pix_val) in pixdim.iter_mut().enumerate() {
            let offset = PIXDIM + i * 4;
            *pix_val = E::read_f32(&bytes[offset..offset + 4]) as f64;
        }

        let read_f32_array = |start: usize, out: &mut [f64]| {
            for (i, v) in out.iter_mut().enumerate() {
                let offset = start + i * 4;
                *v = E::read_f32(&bytes[offset..offset + 4]) as f64;
            }
        };
        let mut quatern = [0.0; 3];
        let mut qoffset = [0.0; 3];
        let mut srow_x = [0.0; 4];
        let mut srow_y = [0.0; 4];
        let mut srow_z = [0.0; 4];
        read_f32_array(QUATERN_B, &mut quatern);
        read_f32_array(QOFFSET_X, &mut qoffset);
        read_f32_array(SROW_X, &mut srow_x);
        read_f32_array(SROW_Y, &mut srow_y);
        read_f32_array(SROW_Z, &mut srow_z);

        let header = Self {
            version: NiftiVersion::Nifti1,
            ndim: ndim_raw as u8,
            dim,
            pixdim,
            vox_offset: E::read_f32(&bytes[VOX_OFFSET..VOX_OFFSET + 4]) as i64,
            qform_code: E::read_i16(&bytes[QFORM_CODE..QFORM_CODE + 2]) as i32,
            sform_code: E::read_i16(&bytes[SFORM_CODE..SFORM_CODE + 2]) as i32,
            quatern,
            qoffset,
            srow_x,
            srow_y,
            srow_z,
            little_endian,
        };

        header.validate()?;
        Ok(header)
    }

    /// Parse NIfTI-2 header.
    #[allow(clippy::wildcard_imports)]
    fn parse_v2<E: ByteOrder>(bytes: &[u8], little_endian: bool) -> Result<Self> {
        use offsets_v2::*;

        let magic = &bytes[MAGIC..MAGIC + 8];
        if magic != b"n+2\0\r\n\x1a\n" && magic != b"ni2\0\r\n\x1a\n" {
            return Err(Error::InvalidMagic([
                magic[0], magic[1], magic[2], magic[3],
            ]));
        }

        let ndim_raw = E::read_i64(&bytes[DIM..DIM + 8]);
        if !(1..=7).contains(&ndim_raw) {
            return Err(Error::InvalidDimensions(format!(
                "ndim must be 1..=7, got {}",
                ndim_raw
            )));
        }

        let mut dim = [0i64; 7];
        for (i, dim_val) in dim.iter_mut().enumerate() {
            let offset = DIM + 8 + i * 8;
            *dim_val = E::read_i64(&bytes[offset..offset + 8]);
        }

        let read_f64_array = |start: usize, out: &mut [f64]| {
            for (i, v) in out.iter_mut().enumerate() {
                let offset = start + i * 8;
                *v = E::read_f64(&bytes[offset..offset + 8]);
            }
        };
        let mut pixdim = [0.0; 8];
        let mut quatern = [0.0; 3];
        let mut qoffset = [0.0; 3];
        let mut srow_x = [0.0; 4];
        let mut srow_y = [0.0; 4];
        let mut srow_z = [0.0; 4];
        read_f64_array(PIXDIM, &mut pixdim);
        read_f64_array(QUATERN_B, &mut quatern);
        read_f64_array(QOFFSET_X, &mut qoffset);
        read_f64_array(SROW_X, &mut srow_x);
        read_f64_array(SROW_Y, &mut srow_y);
        read_f64_array(SROW_Z, &mut srow_z);

        let header = Self {
            version: NiftiVersion::Nifti2,
            ndim: ndim_raw as u8,
            dim,
            pixdim,
            vox_offset: E::read_i64(&bytes[VOX_OFFSET..VOX_OFFSET + 8]),
            qform_code: E::read_i32(&bytes[QFORM_CODE..QFORM_CODE + 4]),
            sform_code: E::read_i32(&bytes[SFORM_CODE..SFORM_CODE + 4]),
            quatern,
            qoffset,
            srow_x,
            srow_y,
            srow_z,
            little_endian,
        };

        header.validate()?;
        Ok(header)
    }

    /// Write header to bytes (little endian), followed by an empty
    /// extension flag so the result is a complete single-file header.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.version {
            NiftiVersion::Nifti1 => self.to_bytes_v1(),
            NiftiVersion::Nifti2 => self.to_bytes_v2(),
        }
    }

    #[allow(clippy::wildcard_imports)]
    fn to_bytes_v1(&self) -> Vec<u8> {
        use offsets_v1::*;

        let mut buf = vec![0u8; Self::SIZE + 4];

        LittleEndian::write_i32(&mut buf[SIZEOF_HDR..SIZEOF_HDR + 4], 348);

        LittleEndian::write_i16(&mut buf[DIM..DIM + 2], self.ndim as i16);
        for i in 0..7 {
            let offset = DIM + 2 + i * 2;
            let dim_val = self.dim[i].min(i16::MAX as i64) as i16;
            LittleEndian::write_i16(&mut buf[offset..offset + 2], dim_val);
        }

        LittleEndian::write_i16(&mut buf[DATATYPE..DATATYPE + 2], FLOAT32_CODE);
        LittleEndian::write_i16(&mut buf[BITPIX..BITPIX + 2], FLOAT32_BITPIX);

        for (i, &value) in self.pixdim.iter().enumerate() {
            let offset = PIXDIM + i * 4;
            LittleEndian::write_f32(&mut buf[offset..offset + 4], value as f32);
        }
        LittleEndian::write_f32(&mut buf[VOX_OFFSET..VOX_OFFSET + 4], self.vox_offset as f32);

        LittleEndian::write_i16(&mut buf[QFORM_CODE..QFORM_CODE + 2], self.qform_code as i16);
        LittleEndian::write_i16(&mut buf[SFORM_CODE..SFORM_CODE + 2], self.sform_code as i16);

        let mut write_f32_array = |start: usize, values: &[f64]| {
            for (i, &v) in values.iter().enumerate() {
                let offset = start + i * 4;
                LittleEndian::write_f32(&mut buf[offset..offset + 4], v as f32);
            }
        };
        write_f32_array(QUATERN_B, &self.quatern);
        write_f32_array(QOFFSET_X, &self.qoffset);
        write_f32_array(SROW_X, &self.srow_x);
        write_f32_array(SROW_Y, &self.srow_y);
        write_f32_array(SROW_Z, &self.srow_z);

        buf[MAGIC..MAGIC + 4].copy_from_slice(b"n+1\0");

        buf
    }

    #[allow(clippy::wildcard_imports)]
    fn to_bytes_v2(&self) -> Vec<u8> {
        use offsets_v2::*;

        let mut buf = vec![0u8; Self::SIZE_V2 + 4];

        LittleEndian::write_i32(&mut buf[SIZEOF_HDR..SIZEOF_HDR + 4], 540);
        buf[MAGIC..MAGIC + 8].copy_from_slice(b"n+2\0\r\n\x1a\n");

        LittleEndian::write_i16(&mut buf[DATATYPE..DATATYPE + 2], FLOAT32_CODE);
        LittleEndian::write_i16(&mut buf[BITPIX..BITPIX + 2], FLOAT32_BITPIX);

        LittleEndian::write_i64(&mut buf[DIM..DIM + 8], self.ndim as i64);
        for i in 0..7 {
            let offset = DIM + 8 + i * 8;
            LittleEndian::write_i64(&mut buf[offset..offset + 8], self.dim[i]);
        }

        LittleEndian::write_i64(&mut buf[VOX_OFFSET..VOX_OFFSET + 8], self.vox_offset);
        LittleEndian::write_i32(&mut buf[QFORM_CODE..QFORM_CODE + 4], self.qform_code);
        LittleEndian::write_i32(&mut buf[SFORM_CODE..SFORM_CODE + 4], self.sform_code);

        let mut write_f64_array = |start: usize, values: &[f64]| {
            for (i, &v) in values.iter().enumerate() {
                let offset = start + i * 8;
                LittleEndian::write_f64(&mut buf[offset..offset + 8], v);
            }
        };
        write_f64_array(PIXDIM, &self.pixdim);
        write_f64_array(QUATERN_B, &self.quatern);
        write_f64_array(QOFFSET_X, &self.qoffset);
        write_f64_array(SROW_X, &self.srow_x);
        write_f64_array(SROW_Y, &self.srow_y);
        write_f64_array(SROW_Z, &self.srow_z);

        buf
    }

    /// Get the 4x4 affine transformation matrix: sform if set, else qform,
    /// else identity scaled by pixdim.
    pub fn affine_f64(&self) -> [[f64; 4]; 4] {
        if self.sform_code > 0 {
            [self.srow_x, self.srow_y, self.srow_z, [0.0, 0.0, 0.0, 1.0]]
        } else if self.qform_code > 0 {
            self.qform_to_affine_f64()
        } else {
            [
                [self.pixdim[1], 0.0, 0.0, 0.0],
                [0.0, self.pixdim[2], 0.0, 0.0],
                [0.0, 0.0, self.pixdim[3], 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ]
        }
    }

    /// Store a 4x4 affine as sform and derive voxel spacing from its columns.
    pub fn set_affine_f64(&mut self, affine: [[f64; 4]; 4]) {
        self.srow_x = affine[0];
        self.srow_y = affine[1];
        self.srow_z = affine[2];
        self.sform_code = 1;

        for axis in 0..3 {
            self.pixdim[axis + 1] = (0..3)
                .map(|row| affine[row][axis] * affine[row][axis])
                .sum::<f64>()
                .sqrt();
        }
    }

    /// Integer orientation of the voxel grid, voxel sizes removed.
    pub fn orientation(&self) -> Result<OrientationTransform> {
        let affine = self.affine_f64();
        let mut linear = [[0.0f64; 3]; 3];
        for (row, src) in linear.iter_mut().zip(affine.iter()) {
            row.copy_from_slice(&src[..3]);
        }
        OrientationTransform::from_scaled_linear(linear)
    }

    /// Convert quaternion representation to affine matrix (f64 precision).
    #[allow(clippy::many_single_char_names)]
    fn qform_to_affine_f64(&self) -> [[f64; 4]; 4] {
        let [b, c, d] = self.quatern;
        let a = (1.0 - b * b - c * c - d * d).max(0.0).sqrt();

        let qfac = if self.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        let [i, j, k] = [self.pixdim[1].abs(), self.pixdim[2], self.pixdim[3] * qfac];

        [
            [
                (a * a + b * b - c * c - d * d) * i,
                2.0 * (b * c - a * d) * j,
                2.0 * (b * d + a * c) * k,
                self.qoffset[0],
            ],
            [
                2.0 * (b * c + a * d) * i,
                (a * a - b * b + c * c - d * d) * j,
                2.0 * (c * d - a * b) * k,
                self.qoffset[1],
            ],
            [
                2.0 * (b * d - a * c) * i,
                2.0 * (c * d + a * b) * j,
                (a * a - b * b - c * c + d * d) * k,
                self.qoffset[2],
            ],
            [0.0, 0.0, 0.0, 1.0],
        ]
    }

    /// Returns true if file is little endian.
    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    /// Validate the fields orientation depends on.
    pub fn validate(&self) -> Result<()> {
        if self.ndim < 3 || self.ndim > 7 {
            return Err(Error::InvalidDimensions(format!(
                "orientation needs at least 3 spatial dimensions, got ndim {}",
                self.ndim
            )));
        }

        for i in 0..3 {
            if self.dim[i] <= 0 {
                return Err(Error::InvalidDimensions(format!(
                    "dimension {} must be positive, got {}",
                    i, self.dim[i]
                )));
            }
            let spacing = self.pixdim[i + 1];
            if self.sform_code <= 0 && (!spacing.is_finite() || spacing <= 0.0) {
                return Err(Error::InvalidDimensions(format!(
                    "pixdim[{}] must be finite and > 0, got {}",
                    i + 1,
                    spacing
                )));
            }
        }

        let min_offset = self.version.header_size() as i64;
        if self.vox_offset < min_offset {
            return Err(Error::InvalidDimensions(format!(
                "vox_offset {} before header end ({})",
                self.vox_offset, min_offset
            )));
        }

        Ok(())
    }
}
