//! Asset schemes: the decoder identity of an asset.
//!
//! A scheme picks the worker thread its `load`/`done` callbacks run on and
//! supplies the format-specific decode step. The published payload type is
//! fixed at registration; publications of a different type are rejected.

use std::any::TypeId;

use flate2::read::ZlibDecoder;
use std::io::Read;

use crate::record::Payload;
use crate::AssetsError;

/// Reserved scheme indices. The index is part of the ABI between the
/// offline packer and the runtime.
pub mod scheme_index {
    pub const PACK: u16 = 0;
    pub const RAW: u16 = 1;
    pub const TEXT_PACK: u16 = 2;
    pub const COLLIDER: u16 = 3;
    pub const SHADER: u16 = 10;
    pub const TEXTURE: u16 = 11;
    pub const MODEL: u16 = 12;
    pub const SKELETON: u16 = 13;
    pub const ANIMATION: u16 = 14;
    pub const OBJECT: u16 = 15;
    pub const FONT: u16 = 16;
    pub const SOUND: u16 = 20;
}

/// View of a record handed to scheme callbacks.
pub struct AssetContext<'a> {
    pub real_name: u32,
    pub text_name: &'a str,
    pub flags: u32,
    /// compressed body; empty when the asset was stored uncompressed
    pub compressed: &'a [u8],
    /// decoded body; `decompress` writes it, `load` reads it
    pub original: &'a mut Vec<u8>,
    /// declared size of the decoded body, from the file header
    pub original_size: u32,
}

pub type LoadFn = dyn Fn(&mut AssetContext) -> Result<Payload, AssetsError> + Send + Sync;
pub type DecompressFn = dyn Fn(&mut AssetContext) -> Result<(), AssetsError> + Send + Sync;
pub type DoneFn = dyn Fn(Payload) + Send + Sync;

/// One entry of the scheme table.
pub struct AssetScheme {
    /// worker-thread index whose queue runs `load` and `done`
    pub thread_index: usize,
    pub(crate) load: Box<LoadFn>,
    pub(crate) decompress: Option<Box<DecompressFn>>,
    pub(crate) done: Option<Box<DoneFn>>,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
}

impl AssetScheme {
    /// Scheme publishing values of type `T`.
    pub fn new<T, F>(thread_index: usize, load: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut AssetContext) -> Result<T, AssetsError> + Send + Sync + 'static,
    {
        Self {
            thread_index,
            load: Box::new(move |ctx| Ok(std::sync::Arc::new(load(ctx)?) as Payload)),
            decompress: None,
            done: None,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn with_decompress<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut AssetContext) -> Result<(), AssetsError> + Send + Sync + 'static,
    {
        self.decompress = Some(Box::new(f));
        self
    }

    pub fn with_done<F>(mut self, f: F) -> Self
    where
        F: Fn(Payload) + Send + Sync + 'static,
    {
        self.done = Some(Box::new(f));
        self
    }
}

/// zlib inflate of the compressed body, validated against the declared
/// decoded size.
pub fn zlib_decompress(ctx: &mut AssetContext) -> Result<(), AssetsError> {
    let mut out = Vec::with_capacity(ctx.original_size as usize);
    ZlibDecoder::new(ctx.compressed)
        .read_to_end(&mut out)
        .map_err(|e| AssetsError::Format(format!("asset decompression failed: {e}")))?;
    if out.len() != ctx.original_size as usize {
        return Err(AssetsError::Format(format!(
            "decompressed size {} does not match declared size {}",
            out.len(),
            ctx.original_size
        )));
    }
    *ctx.original = out;
    Ok(())
}

/// Built-in scheme for opaque pack containers: the asset exists only for
/// its dependency list and publishes a unit payload.
pub fn pack_scheme(thread_index: usize) -> AssetScheme {
    AssetScheme::new::<(), _>(thread_index, |_ctx| Ok(()))
}

/// Built-in scheme for raw byte assets, zlib-decompressed when stored
/// compressed.
pub fn raw_scheme(thread_index: usize) -> AssetScheme {
    AssetScheme::new::<Vec<u8>, _>(thread_index, |ctx| Ok(std::mem::take(ctx.original)))
        .with_decompress(zlib_decompress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn zlib_round_trip() {
        let payload = b"some asset bytes some asset bytes".to_vec();
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&payload).unwrap();
        let compressed = enc.finish().unwrap();

        let mut original = Vec::new();
        let mut ctx = AssetContext {
            real_name: 1,
            text_name: "t",
            flags: 0,
            compressed: &compressed,
            original: &mut original,
            original_size: payload.len() as u32,
        };
        zlib_decompress(&mut ctx).unwrap();
        assert_eq!(original, payload);
    }

    #[test]
    fn zlib_size_mismatch_is_rejected() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"abc").unwrap();
        let compressed = enc.finish().unwrap();
        let mut original = Vec::new();
        let mut ctx = AssetContext {
            real_name: 1,
            text_name: "t",
            flags: 0,
            compressed: &compressed,
            original: &mut original,
            original_size: 99,
        };
        assert!(zlib_decompress(&mut ctx).is_err());
    }

    #[test]
    fn raw_scheme_takes_the_bytes() {
        let s = raw_scheme(0);
        let mut original = vec![1, 2, 3];
        let mut ctx = AssetContext {
            real_name: 1,
            text_name: "t",
            flags: 0,
            compressed: &[],
            original: &mut original,
            original_size: 3,
        };
        let payload = (s.load)(&mut ctx).unwrap();
        let bytes = payload.downcast::<Vec<u8>>().unwrap();
        assert_eq!(*bytes, vec![1, 2, 3]);
    }
}
