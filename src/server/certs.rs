/*
 *  server/certs.rs
 *
 *  spotify-ish - now playing, on the wall
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use chrono::{DateTime, Datelike, Duration, Utc};
use log::info;
use rcgen::{date_time_ymd, CertificateParams, DistinguishedName, DnType, KeyPair};

use crate::constants::CERTIFICATE_VALIDITY_DAYS;
use crate::store::{CertificateRecord, CredentialStore};
use super::ServerError;

/// Self-signed certificate for `hostname`, valid from `now` for a year.
pub fn generate(hostname: &str, now: DateTime<Utc>) -> Result<CertificateRecord, ServerError> {
    let expires = now + Duration::days(CERTIFICATE_VALIDITY_DAYS);

    let mut params = CertificateParams::new(vec![hostname.to_string()])?;
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, hostname);
    params.distinguished_name = name;
    params.not_before = date_time_ymd(now.year(), now.month() as u8, now.day() as u8);
    params.not_after = date_time_ymd(expires.year(), expires.month() as u8, expires.day() as u8);

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    Ok(CertificateRecord {
        common_name: hostname.to_string(),
        cert: cert.pem(),
        key: key_pair.serialize_pem(),
        expires,
    })
}

/// The cached certificate for `hostname`, or a fresh one written back to the store.
pub fn load_or_generate(
    store: &CredentialStore,
    hostname: &str,
    now: DateTime<Utc>,
) -> Result<CertificateRecord, ServerError> {
    if let Some(record) = store.certificate(hostname, now) {
        info!("Using cached certificate for {} (expires {})", hostname, record.expires);
        return Ok(record);
    }

    info!("Generating self-signed certificate for {}", hostname);
    let record = generate(hostname, now)?;
    store.put_certificate(record.clone())?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_generate_pem_pair() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let record = generate("matrix.local", now).unwrap();
        assert_eq!(record.common_name, "matrix.local");
        assert!(record.cert.starts_with("-----BEGIN CERTIFICATE-----"));
        assert!(record.key.contains("PRIVATE KEY-----"));
        assert_eq!(record.expires, now + Duration::days(365));
    }

    #[test]
    fn test_cached_certificate_reused() {
        let dir = tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("config.json")).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let first = load_or_generate(&store, "localhost", now).unwrap();
        let second = load_or_generate(&store, "localhost", now + Duration::days(10)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expired_certificate_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = CredentialStore::open(&path).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let first = load_or_generate(&store, "localhost", now).unwrap();
        let later = now + Duration::days(400);
        let second = load_or_generate(&store, "localhost", later).unwrap();
        assert_ne!(first.cert, second.cert);

        // the replacement is what survives a reopen
        let reopened = CredentialStore::open(&path).unwrap();
        assert_eq!(reopened.certificate("localhost", later), Some(second));
    }
}
