//! Codec construction.
//!
//! [`Compressor`] is the configuration-level view of a compression codec; it is
//! what the compressor checker passes around and what gets turned into real
//! `zarrs` codecs when an array is built. [`build_codec`] is the name-based
//! factory over the fixed allow-list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zarrs::array::ArrayBuilder;
use zarrs::array::codec::{
    BloscCodec, BloscCompressionLevel, BloscCompressor, BloscShuffleMode, Bz2Codec,
    Bz2CompressionLevel, GzipCodec, ZstdCodec,
};
use zarrs_codec::BytesToBytesCodecTraits;

use crate::{Error, Result};

/// Codec names accepted by [`build_codec`].
pub const VALID_CODECS: &[&str] = &["blosc", "bz2", "gzip", "zstd", "zfp"];

/// Compression algorithms available inside the blosc container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BloscAlgorithm {
    BloscLZ,
    Lz4,
    Lz4hc,
    Snappy,
    Zlib,
    Zstd,
}

impl BloscAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloscAlgorithm::BloscLZ => "blosclz",
            BloscAlgorithm::Lz4 => "lz4",
            BloscAlgorithm::Lz4hc => "lz4hc",
            BloscAlgorithm::Snappy => "snappy",
            BloscAlgorithm::Zlib => "zlib",
            BloscAlgorithm::Zstd => "zstd",
        }
    }

    fn to_zarrs(self) -> BloscCompressor {
        match self {
            BloscAlgorithm::BloscLZ => BloscCompressor::BloscLZ,
            BloscAlgorithm::Lz4 => BloscCompressor::LZ4,
            BloscAlgorithm::Lz4hc => BloscCompressor::LZ4HC,
            BloscAlgorithm::Snappy => BloscCompressor::Snappy,
            BloscAlgorithm::Zlib => BloscCompressor::Zlib,
            BloscAlgorithm::Zstd => BloscCompressor::Zstd,
        }
    }
}

/// All blosc algorithms, in the order used by the benchmark grid.
pub fn valid_blosc_algorithms() -> &'static [BloscAlgorithm] {
    &[
        BloscAlgorithm::BloscLZ,
        BloscAlgorithm::Lz4,
        BloscAlgorithm::Lz4hc,
        BloscAlgorithm::Snappy,
        BloscAlgorithm::Zlib,
        BloscAlgorithm::Zstd,
    ]
}

/// Blosc pre-compression shuffle mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BloscShuffle {
    NoShuffle,
    #[default]
    Shuffle,
    BitShuffle,
}

impl BloscShuffle {
    fn to_zarrs(self) -> BloscShuffleMode {
        match self {
            BloscShuffle::NoShuffle => BloscShuffleMode::NoShuffle,
            BloscShuffle::Shuffle => BloscShuffleMode::Shuffle,
            BloscShuffle::BitShuffle => BloscShuffleMode::BitShuffle,
        }
    }
}

/// Mode of the lossy zfp floating-point codec.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ZfpMode {
    /// Absolute error tolerance.
    FixedAccuracy { tolerance: f64 },
    /// Bits per value.
    FixedRate { rate: f64 },
    /// Bit-plane precision.
    FixedPrecision { precision: u32 },
    Reversible,
}

/// A compression codec configuration.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "id")]
pub enum Compressor {
    Blosc {
        #[serde(default = "default_blosc_algorithm")]
        algorithm: BloscAlgorithm,
        #[serde(default = "default_clevel")]
        clevel: u8,
        #[serde(default)]
        shuffle: BloscShuffle,
        #[serde(default)]
        blocksize: usize,
    },
    Bz2 {
        /// Must be in the range 1..=9; bz2 has no level 0.
        #[serde(default = "default_clevel")]
        level: u32,
    },
    Gzip {
        #[serde(default = "default_clevel")]
        level: u32,
    },
    Zstd {
        #[serde(default = "default_zstd_level")]
        level: i32,
        #[serde(default)]
        checksum: bool,
    },
    Zfp {
        #[serde(flatten)]
        mode: ZfpMode,
    },
}

fn default_blosc_algorithm() -> BloscAlgorithm {
    BloscAlgorithm::Lz4
}

fn default_clevel<T: From<u8>>() -> T {
    T::from(1)
}

fn default_zstd_level() -> i32 {
    1
}

impl Compressor {
    /// Attach this codec to an array builder.
    ///
    /// `typesize` is the element size in bytes of the array's data type; blosc
    /// needs it when shuffling is enabled.
    pub fn apply_to_builder(&self, builder: &mut ArrayBuilder, typesize: usize) -> Result<()> {
        match self {
            Compressor::Zfp { mode } => {
                builder.array_to_bytes_codec(zfp_codec(mode)?);
            }
            lossless => {
                builder.bytes_to_bytes_codecs(vec![lossless.to_bytes_to_bytes_codec(typesize)?]);
            }
        }
        Ok(())
    }

    fn to_bytes_to_bytes_codec(
        &self,
        typesize: usize,
    ) -> Result<Arc<dyn BytesToBytesCodecTraits>> {
        match self {
            Compressor::Blosc {
                algorithm,
                clevel,
                shuffle,
                blocksize,
            } => {
                let clevel = BloscCompressionLevel::try_from(*clevel)
                    .map_err(|l| Error::CompressorSpec(format!("invalid blosc clevel {l}")))?;
                let blocksize = if *blocksize == 0 {
                    None
                } else {
                    Some(*blocksize)
                };
                let codec = BloscCodec::new(
                    algorithm.to_zarrs(),
                    clevel,
                    blocksize,
                    shuffle.to_zarrs(),
                    Some(typesize),
                )
                .map_err(Error::wrap)?;
                Ok(Arc::new(codec))
            }
            Compressor::Bz2 { level } => {
                let level = Bz2CompressionLevel::new(*level)
                    .map_err(|n| Error::CompressorSpec(format!("invalid bz2 level {n}")))?;
                Ok(Arc::new(Bz2Codec::new(level)))
            }
            Compressor::Gzip { level } => {
                Ok(Arc::new(GzipCodec::new(*level).map_err(Error::wrap)?))
            }
            Compressor::Zstd { level, checksum } => {
                Ok(Arc::new(ZstdCodec::new(*level, *checksum)))
            }
            Compressor::Zfp { .. } => Err(Error::CompressorSpec(
                "zfp is an array-to-bytes codec, not a bytes-to-bytes codec".into(),
            )),
        }
    }
}

#[cfg(feature = "zfp")]
fn zfp_codec(mode: &ZfpMode) -> Result<Arc<dyn zarrs_codec::ArrayToBytesCodecTraits>> {
    use zarrs::array::codec::ZfpCodec;
    let codec = match mode {
        ZfpMode::FixedAccuracy { tolerance } => ZfpCodec::new_fixed_accuracy(*tolerance),
        ZfpMode::FixedRate { rate } => ZfpCodec::new_fixed_rate(*rate),
        ZfpMode::FixedPrecision { precision } => ZfpCodec::new_fixed_precision(*precision),
        ZfpMode::Reversible => ZfpCodec::new_reversible(),
    };
    Ok(Arc::new(codec))
}

#[cfg(not(feature = "zfp"))]
fn zfp_codec(_mode: &ZfpMode) -> Result<Arc<dyn zarrs_codec::ArrayToBytesCodecTraits>> {
    Err(Error::CompressorSpec(
        "zfp codec support is not enabled; rebuild with the `zfp` feature".into(),
    ))
}

/// Options understood by [`build_codec`]. Unset fields fall back to per-codec
/// defaults; fields irrelevant to the requested codec are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecParams {
    /// Compression level (blosc, bz2, gzip, zstd).
    pub clevel: Option<u32>,
    /// Blosc inner algorithm.
    pub algorithm: Option<BloscAlgorithm>,
    /// Blosc shuffle mode.
    pub shuffle: Option<BloscShuffle>,
    /// Blosc block size; 0 means automatic.
    pub blocksize: Option<usize>,
    /// Zstd checksum flag.
    pub checksum: Option<bool>,
    /// Zfp mode name: `fixed_accuracy`, `fixed_rate`, `fixed_precision` or
    /// `reversible`.
    pub mode: Option<String>,
    /// Zfp fixed-accuracy tolerance.
    pub tolerance: Option<f64>,
    /// Zfp fixed-rate bits per value.
    pub rate: Option<f64>,
    /// Zfp fixed-precision bit planes.
    pub precision: Option<u32>,
}

/// Build a codec configuration from a codec name and options.
///
/// The name must be one of [`VALID_CODECS`]. Returns `None` for option
/// combinations that degrade to "no compression" (bz2 at level 0, which the
/// codec does not accept; this is warned about rather than rejected).
pub fn build_codec(name: &str, params: &CodecParams) -> Result<Option<Compressor>> {
    let clevel = params.clevel.unwrap_or(1);
    let compressor = match name {
        "blosc" => {
            if clevel > 9 {
                return Err(Error::CompressorSpec(format!(
                    "blosc clevel must be <= 9, got {clevel}"
                )));
            }
            Compressor::Blosc {
                algorithm: params.algorithm.unwrap_or(BloscAlgorithm::Lz4),
                clevel: clevel as u8,
                shuffle: params.shuffle.unwrap_or_default(),
                blocksize: params.blocksize.unwrap_or(0),
            }
        }
        "bz2" => {
            if clevel == 0 {
                log::warn!("bz2 does not accept clevel=0; disabling compression");
                return Ok(None);
            }
            if clevel > 9 {
                return Err(Error::CompressorSpec(format!(
                    "bz2 clevel must be <= 9, got {clevel}"
                )));
            }
            Compressor::Bz2 { level: clevel }
        }
        "gzip" => {
            if clevel > 9 {
                return Err(Error::CompressorSpec(format!(
                    "gzip clevel must be <= 9, got {clevel}"
                )));
            }
            Compressor::Gzip { level: clevel }
        }
        "zstd" => {
            if clevel > 22 {
                return Err(Error::CompressorSpec(format!(
                    "zstd clevel must be <= 22, got {clevel}"
                )));
            }
            Compressor::Zstd {
                level: clevel as i32,
                checksum: params.checksum.unwrap_or(false),
            }
        }
        "zfp" => {
            let mode = match params.mode.as_deref().unwrap_or("fixed_accuracy") {
                "fixed_accuracy" => ZfpMode::FixedAccuracy {
                    tolerance: params.tolerance.unwrap_or(-1.0),
                },
                "fixed_rate" => ZfpMode::FixedRate {
                    rate: params.rate.unwrap_or(-1.0),
                },
                "fixed_precision" => ZfpMode::FixedPrecision {
                    precision: params.precision.unwrap_or(0),
                },
                "reversible" => ZfpMode::Reversible,
                other => {
                    return Err(Error::CompressorSpec(format!(
                        "unknown zfp mode {other:?}"
                    )));
                }
            };
            Compressor::Zfp { mode }
        }
        _ => {
            return Err(Error::UnknownCodec {
                name: name.to_string(),
                valid: VALID_CODECS,
            });
        }
    };
    Ok(Some(compressor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codec_names_the_valid_set() {
        let err = build_codec("lzma", &CodecParams::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("lzma"));
        for name in VALID_CODECS {
            assert!(message.contains(name));
        }
    }

    #[test]
    fn bz2_level_zero_disables_compression() {
        let params = CodecParams {
            clevel: Some(0),
            ..Default::default()
        };
        assert_eq!(build_codec("bz2", &params).unwrap(), None);
        // Other codecs accept level 0.
        assert!(build_codec("gzip", &params).unwrap().is_some());
    }

    #[test]
    fn factory_defaults() {
        let codec = build_codec("blosc", &CodecParams::default()).unwrap().unwrap();
        assert_eq!(
            codec,
            Compressor::Blosc {
                algorithm: BloscAlgorithm::Lz4,
                clevel: 1,
                shuffle: BloscShuffle::Shuffle,
                blocksize: 0,
            }
        );
    }

    #[test]
    fn out_of_range_levels_error() {
        let params = CodecParams {
            clevel: Some(10),
            ..Default::default()
        };
        assert!(build_codec("gzip", &params).is_err());
        assert!(build_codec("bz2", &params).is_err());
        assert!(build_codec("blosc", &params).is_err());
        assert!(build_codec("zstd", &params).is_ok());
    }

    #[test]
    fn compressor_json_round_trip() {
        let codec = Compressor::Gzip { level: 5 };
        let json = serde_json::to_value(&codec).unwrap();
        assert_eq!(json["id"], "gzip");
        assert_eq!(json["level"], 5);
        let back: Compressor = serde_json::from_value(json).unwrap();
        assert_eq!(back, codec);
    }

    #[test]
    fn zfp_mode_is_flattened_in_json() {
        let codec = Compressor::Zfp {
            mode: ZfpMode::FixedPrecision { precision: 19 },
        };
        let json = serde_json::to_value(&codec).unwrap();
        assert_eq!(json["id"], "zfp");
        assert_eq!(json["mode"], "fixed_precision");
        assert_eq!(json["precision"], 19);
    }

    #[test]
    fn blosc_algorithm_grid_is_complete() {
        assert_eq!(valid_blosc_algorithms().len(), 6);
    }
}
