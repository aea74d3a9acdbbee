//! Flat-text cache of calibrated hyperparameter vectors.
//!
//! The file is whitespace-separated floats: row 0 is the Fermi (spread)
//! vector, row 1 the Bose (total) vector, four values per row in
//! `k bias regress smooth` order. The reader splits on any whitespace and
//! only checks the total count, so hand-edited layouts load fine; the
//! writer always produces the two-row form.

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::rating::{HyperParams, Mode};

/// Spread-mode parameters used when no cache exists.
pub const DEFAULT_FERMI: HyperParams = HyperParams {
    k: 0.13,
    bias: 0.23,
    regress: 0.65,
    smooth: 9.18,
};

/// Total-mode parameters used when no cache exists.
pub const DEFAULT_BOSE: HyperParams = HyperParams {
    k: 0.12,
    bias: 0.0,
    regress: 0.68,
    smooth: 5.02,
};

/// Values per mode row.
const ROW_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to read parameter cache {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write parameter cache {path}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid float {token:?} in parameter cache")]
    BadFloat { token: String },
    #[error("parameter cache holds {found} values, expected {expected}")]
    Shape { found: usize, expected: usize },
}

/// One calibrated hyperparameter vector per mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamCache {
    pub fermi: HyperParams,
    pub bose: HyperParams,
}

impl Default for ParamCache {
    fn default() -> Self {
        Self {
            fermi: DEFAULT_FERMI,
            bose: DEFAULT_BOSE,
        }
    }
}

impl ParamCache {
    pub fn for_mode(&self, mode: Mode) -> HyperParams {
        match mode {
            Mode::Fermi => self.fermi,
            Mode::Bose => self.bose,
        }
    }

    pub fn set_mode(&mut self, mode: Mode, params: HyperParams) {
        match mode {
            Mode::Fermi => self.fermi = params,
            Mode::Bose => self.bose = params,
        }
    }

    /// Load from the flat-text format.
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let text = fs::read_to_string(path).map_err(|source| CacheError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let values = text
            .split_whitespace()
            .map(|token| {
                token.parse::<f64>().map_err(|_| CacheError::BadFloat {
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<f64>, CacheError>>()?;
        if values.len() != 2 * ROW_LEN {
            return Err(CacheError::Shape {
                found: values.len(),
                expected: 2 * ROW_LEN,
            });
        }
        Ok(Self {
            fermi: HyperParams::from_array([values[0], values[1], values[2], values[3]]),
            bose: HyperParams::from_array([values[4], values[5], values[6], values[7]]),
        })
    }

    /// Load the cache, falling back to the built-in defaults when the file
    /// is missing. A malformed file is still an error: silently replacing a
    /// corrupted cache would hide the corruption.
    pub fn load_or_default(path: &Path) -> Result<Self, CacheError> {
        match Self::load(path) {
            Ok(cache) => Ok(cache),
            Err(CacheError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!("No parameter cache at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err),
        }
    }

    /// Write the two-row flat-text form, creating parent directories as
    /// needed. Values are printed with Rust's shortest round-trip float
    /// formatting, so load(store(x)) == x exactly.
    pub fn store(&self, path: &Path) -> Result<(), CacheError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| CacheError::Write {
                    path: path.display().to_string(),
                    source,
                })?;
            }
        }
        let row = |p: &HyperParams| {
            let v = p.as_array();
            format!("{} {} {} {}", v[0], v[1], v[2], v[3])
        };
        let text = format!("{}\n{}\n", row(&self.fermi), row(&self.bose));
        fs::write(path, text).map_err(|source| CacheError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}
