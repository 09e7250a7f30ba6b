//! On-disk asset format.
//!
//! Fixed header (little endian), then `dependency_count` u32 names, then
//! the body: `compressed_size` bytes when nonzero, `original_size` bytes
//! otherwise.
//!
//! ```text
//! offset size field
//! 0      8    magic "cageAss\0"
//! 8      4    version (= 1)
//! 12     4    flags
//! 16     2    scheme index
//! 18     4    dependency count
//! 22     4    compressed size
//! 26     4    original size
//! 30     4    internationalized name
//! 34     64   text name, NUL terminated
//! ```

use crate::AssetsError;

pub const ASSET_MAGIC: &[u8; 8] = b"cageAss\0";
pub const ASSET_VERSION: u32 = 1;
pub const TEXT_NAME_LENGTH: usize = 64;
pub const HEADER_SIZE: usize = 8 + 4 + 4 + 2 + 4 + 4 + 4 + 4 + TEXT_NAME_LENGTH;

/// Parsed asset file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHeader {
    pub flags: u32,
    pub scheme: u16,
    pub dependency_count: u32,
    pub compressed_size: u32,
    pub original_size: u32,
    pub internationalized_name: u32,
    pub text_name: String,
}

impl AssetHeader {
    pub fn new(text_name: &str, scheme: u16) -> Self {
        let mut text_name = text_name.to_string();
        if text_name.len() >= TEXT_NAME_LENGTH {
            // keep the tail, it carries the file name
            let tail = &text_name[text_name.len() - (TEXT_NAME_LENGTH - 3)..];
            text_name = format!("..{tail}");
        }
        Self {
            flags: 0,
            scheme,
            dependency_count: 0,
            compressed_size: 0,
            original_size: 0,
            internationalized_name: 0,
            text_name,
        }
    }

    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..8].copy_from_slice(ASSET_MAGIC);
        out[8..12].copy_from_slice(&ASSET_VERSION.to_le_bytes());
        out[12..16].copy_from_slice(&self.flags.to_le_bytes());
        out[16..18].copy_from_slice(&self.scheme.to_le_bytes());
        out[18..22].copy_from_slice(&self.dependency_count.to_le_bytes());
        out[22..26].copy_from_slice(&self.compressed_size.to_le_bytes());
        out[26..30].copy_from_slice(&self.original_size.to_le_bytes());
        out[30..34].copy_from_slice(&self.internationalized_name.to_le_bytes());
        let name = self.text_name.as_bytes();
        debug_assert!(name.len() < TEXT_NAME_LENGTH);
        out[34..34 + name.len()].copy_from_slice(name);
        out
    }

    /// Parses and validates a header against the scheme table size.
    pub fn parse(data: &[u8], scheme_count: usize) -> Result<Self, AssetsError> {
        if data.len() < HEADER_SIZE {
            return Err(AssetsError::Format("asset is missing the required header".into()));
        }
        if &data[0..8] != ASSET_MAGIC {
            return Err(AssetsError::Format("file is not an asset".into()));
        }
        let u32_at = |o: usize| u32::from_le_bytes(data[o..o + 4].try_into().unwrap());
        let version = u32_at(8);
        if version != ASSET_VERSION {
            return Err(AssetsError::Format(format!(
                "asset version mismatch: {version}, expected {ASSET_VERSION}"
            )));
        }
        let scheme = u16::from_le_bytes(data[16..18].try_into().unwrap());
        if (scheme as usize) >= scheme_count {
            return Err(AssetsError::Format(format!("asset scheme {scheme} out of range")));
        }
        let name_field = &data[34..34 + TEXT_NAME_LENGTH];
        if name_field[TEXT_NAME_LENGTH - 1] != 0 {
            return Err(AssetsError::Format("asset text name not bounded".into()));
        }
        let nul = name_field.iter().position(|&b| b == 0).unwrap();
        let text_name = String::from_utf8_lossy(&name_field[..nul]).into_owned();
        Ok(Self {
            flags: u32_at(12),
            scheme,
            dependency_count: u32_at(18),
            compressed_size: u32_at(22),
            original_size: u32_at(26),
            internationalized_name: u32_at(30),
            text_name,
        })
    }

    /// Bytes the body occupies in the file.
    pub fn stored_size(&self) -> usize {
        if self.compressed_size > 0 {
            self.compressed_size as usize
        } else {
            self.original_size as usize
        }
    }
}

/// Splits a full asset file into header, dependency names and body,
/// validating the declared sizes against the actual length.
pub fn parse_file(data: &[u8], scheme_count: usize) -> Result<(AssetHeader, Vec<u32>, &[u8]), AssetsError> {
    let header = AssetHeader::parse(data, scheme_count)?;
    let deps_bytes = header.dependency_count as usize * 4;
    if data.len() < HEADER_SIZE + deps_bytes {
        return Err(AssetsError::Format("asset file dependencies truncated".into()));
    }
    let deps: Vec<u32> = data[HEADER_SIZE..HEADER_SIZE + deps_bytes]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    let body_start = HEADER_SIZE + deps_bytes;
    let body_len = header.stored_size();
    if data.len() < body_start + body_len {
        return Err(AssetsError::Format("asset file content truncated".into()));
    }
    Ok((header, deps, &data[body_start..body_start + body_len]))
}

/// Builds a complete asset file, used by the offline packer and tests.
pub fn write_file(header: &AssetHeader, dependencies: &[u32], body: &[u8]) -> Vec<u8> {
    let mut h = header.clone();
    h.dependency_count = dependencies.len() as u32;
    debug_assert_eq!(h.stored_size(), body.len());
    let mut out = Vec::with_capacity(HEADER_SIZE + dependencies.len() * 4 + body.len());
    out.extend_from_slice(&h.serialize());
    for d in dependencies {
        out.extend_from_slice(&d.to_le_bytes());
    }
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut h = AssetHeader::new("models/crate.obj", 3);
        h.flags = 7;
        h.original_size = 100;
        h.internationalized_name = 99;
        let bytes = h.serialize();
        let parsed = AssetHeader::parse(&bytes, 10).unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn long_names_keep_their_tail() {
        let long = "a/".repeat(60) + "file.obj";
        let h = AssetHeader::new(&long, 0);
        assert!(h.text_name.len() < TEXT_NAME_LENGTH);
        assert!(h.text_name.starts_with(".."));
        assert!(h.text_name.ends_with("file.obj"));
    }

    #[test]
    fn bad_magic_and_version() {
        let h = AssetHeader::new("x", 0);
        let mut bytes = h.serialize();
        bytes[0] = b'X';
        assert!(AssetHeader::parse(&bytes, 1).is_err());
        let mut bytes = h.serialize();
        bytes[8] = 99;
        assert!(AssetHeader::parse(&bytes, 1).is_err());
    }

    #[test]
    fn scheme_out_of_range() {
        let h = AssetHeader::new("x", 5);
        assert!(AssetHeader::parse(&h.serialize(), 5).is_err());
        assert!(AssetHeader::parse(&h.serialize(), 6).is_ok());
    }

    #[test]
    fn file_truncation_checks() {
        let mut h = AssetHeader::new("x", 0);
        h.original_size = 4;
        let file = write_file(&h, &[11, 22], &[1, 2, 3, 4]);
        assert!(parse_file(&file, 1).is_ok());
        // cut into the body
        assert!(parse_file(&file[..file.len() - 1], 1).is_err());
        // cut into the dependency list
        assert!(parse_file(&file[..HEADER_SIZE + 4], 1).is_err());
        let (header, deps, body) = parse_file(&file, 1).unwrap();
        assert_eq!(header.dependency_count, 2);
        assert_eq!(deps, vec![11, 22]);
        assert_eq!(body, &[1, 2, 3, 4]);
    }
}
