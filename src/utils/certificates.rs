use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::anyhow;
use chrono::{DateTime, TimeZone, Utc};
use rustls::pki_types::{pem::PemObject, CertificateDer, PrivateKeyDer};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::errors::TlsError;

/// Metadata extracted from the leaf certificate for logging and validation.
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

/// Loaded certificate materials used for configuring the HTTPS listener.
#[derive(Debug)]
pub struct CertificateBundle {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub leaf: CertificateDer<'static>,
    pub intermediates: Vec<CertificateDer<'static>>,
    pub private_key: PrivateKeyDer<'static>,
    pub info: CertificateInfo,
}

impl CertificateBundle {
    /// Leaf first, then any intermediates found in the same file.
    pub fn chain(&self) -> Vec<CertificateDer<'static>> {
        let mut chain = Vec::with_capacity(1 + self.intermediates.len());
        chain.push(self.leaf.clone());
        chain.extend(self.intermediates.iter().cloned());
        chain
    }
}

/// Load and validate certificate materials from disk.
pub fn load_certificate_bundle(
    cert_path: &Path,
    key_path: &Path,
) -> Result<CertificateBundle, TlsError> {
    let cert_bytes = fs::read(cert_path)
        .map_err(|e| TlsError::CertificateReadError { path: cert_path.to_path_buf(), source: e })?;

    let mut chain: Vec<CertificateDer<'static>> = CertificateDer::pem_slice_iter(&cert_bytes)
        .map(|result| {
            result.map_err(|err| TlsError::InvalidCertificatePem {
                path: cert_path.to_path_buf(),
                source: anyhow!(err),
            })
        })
        .collect::<Result<_, _>>()?;

    if chain.is_empty() {
        return Err(TlsError::EmptyCertificateChain { path: cert_path.to_path_buf() });
    }

    let leaf = chain.remove(0);

    let key_bytes = fs::read(key_path)
        .map_err(|e| TlsError::PrivateKeyReadError { path: key_path.to_path_buf(), source: e })?;

    let private_key = PrivateKeyDer::from_pem_slice(&key_bytes).map_err(|err| {
        TlsError::InvalidPrivateKey { path: key_path.to_path_buf(), source: Some(anyhow!(err)) }
    })?;

    let info = parse_certificate_metadata(&leaf, cert_path)?;
    validate_certificate_dates(&info, cert_path)?;

    Ok(CertificateBundle {
        cert_path: cert_path.to_path_buf(),
        key_path: key_path.to_path_buf(),
        leaf,
        intermediates: chain,
        private_key,
        info,
    })
}

fn parse_certificate_metadata(
    cert: &CertificateDer<'static>,
    path: &Path,
) -> Result<CertificateInfo, TlsError> {
    let metadata_error =
        |source: anyhow::Error| TlsError::CertificateMetadata { path: path.to_path_buf(), source };

    let (_, parsed) =
        X509Certificate::from_der(cert.as_ref()).map_err(|err| metadata_error(anyhow!(err)))?;

    let validity = parsed.validity();
    let not_before = to_utc(validity.not_before.timestamp())
        .ok_or_else(|| metadata_error(anyhow!("notBefore out of range")))?;
    let not_after = to_utc(validity.not_after.timestamp())
        .ok_or_else(|| metadata_error(anyhow!("notAfter out of range")))?;

    Ok(CertificateInfo {
        subject: parsed.subject().to_string(),
        issuer: parsed.issuer().to_string(),
        not_before,
        not_after,
    })
}

fn to_utc(timestamp: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0).single()
}

fn validate_certificate_dates(info: &CertificateInfo, path: &Path) -> Result<(), TlsError> {
    if info.not_after <= Utc::now() {
        return Err(TlsError::CertificateExpired {
            path: path.to_path_buf(),
            not_after: info.not_after,
        });
    }
    Ok(())
}
