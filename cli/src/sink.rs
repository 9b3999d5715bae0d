//! JSON-lines dataset writer.
//!
//! `DatasetWriter` writes one JSON bundle per line and folds every line it
//! writes into a running SHA-256 digest. The digest equals the SHA-256 of the
//! dataset file, so `sha256sum` on the output reproduces it. No bundle is
//! retained after it is written.

use std::{
    io::Write,
    sync::{Arc, Mutex, MutexGuard},
};

use sha2::{Digest, Sha256};
use tracing::debug;

use oncosynth_contracts::{
    bundle::PatientBundle,
    error::{SynthError, SynthResult},
};
use oncosynth_core::traits::RecordSink;

struct Output {
    out: Box<dyn Write + Send>,
    hasher: Sha256,
    lines: u64,
}

/// Cloning shares the underlying output, so a clone kept by the caller can
/// read the digest after the writer has been handed to an `Assembler`.
#[derive(Clone)]
pub struct DatasetWriter {
    inner: Arc<Mutex<Output>>,
}

impl DatasetWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Output {
                out,
                hasher: Sha256::new(),
                lines: 0,
            })),
        }
    }

    /// Lowercase hex SHA-256 of everything written so far.
    pub fn digest(&self) -> SynthResult<String> {
        let inner = self.inner()?;
        Ok(hex::encode(inner.hasher.clone().finalize()))
    }

    /// Number of bundles written so far.
    pub fn lines(&self) -> SynthResult<u64> {
        Ok(self.inner()?.lines)
    }

    fn inner(&self) -> SynthResult<MutexGuard<'_, Output>> {
        self.inner.lock().map_err(|e| SynthError::SinkWriteFailed {
            reason: format!("output lock poisoned: {}", e),
        })
    }
}

impl RecordSink for DatasetWriter {
    fn write(&self, bundle: &PatientBundle) -> SynthResult<()> {
        let mut line = serde_json::to_vec(bundle).map_err(|e| SynthError::SinkWriteFailed {
            reason: format!("failed to serialize patient {}: {}", bundle.patient_id(), e),
        })?;
        line.push(b'\n');

        let mut inner = self.inner()?;
        inner
            .out
            .write_all(&line)
            .map_err(|e| SynthError::SinkWriteFailed {
                reason: format!("failed to write patient {}: {}", bundle.patient_id(), e),
            })?;
        inner.hasher.update(&line);
        inner.lines += 1;
        Ok(())
    }

    fn finalize(&self, dataset_id: &str) -> SynthResult<()> {
        let mut inner = self.inner()?;
        inner.out.flush().map_err(|e| SynthError::SinkWriteFailed {
            reason: format!("failed to flush dataset '{}': {}", dataset_id, e),
        })?;
        debug!(dataset_id, bundles = inner.lines, "dataset output flushed");
        Ok(())
    }
}
