//! Credential loaders
//!
//! Two sources feed the pool:
//! - `KIRO_AUTH_TOKEN`: a JSON array of credential objects, a single object,
//!   or a filesystem path to a file containing either.
//! - An accounts CSV: header row, then `enabled,refreshToken,clientId,clientSecret`
//!   rows. Every CSV credential is IdC.
//!
//! Both loaders drop invalid and disabled entries before returning, so the
//! pool only ever sees usable configurations, in source order.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::constants::{AUTH_TOKEN_ENV, AUTH_TOKEN_EXAMPLE, DEPRECATED_TOKEN_ENVS};
use crate::credentials::{Credential, CredentialRecord};
use crate::error::{Error, Result};

/// Load credentials from the raw value of `KIRO_AUTH_TOKEN`.
///
/// If the value names an existing file, the file contents are parsed;
/// otherwise the value itself is parsed as JSON.
pub fn load_from_source(value: Option<&str>) -> Result<Vec<Credential>> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(Error::Config(format!(
            "{AUTH_TOKEN_ENV} is not set. Set it to a JSON credential list, e.g. \
             {AUTH_TOKEN_EXAMPLE}, or to the path of a JSON file. Supported auth methods: Social, IdC"
        )));
    }

    let path = Path::new(value);
    let data = if path.is_file() {
        info!(path = %path.display(), "loading credentials from file");
        std::fs::read_to_string(path).map_err(|e| {
            Error::Io(format!("reading credential file {}: {e}", path.display()))
        })?
    } else {
        debug!("loading credentials from inline JSON");
        value.to_string()
    };

    let records = parse_records(&data).map_err(|e| {
        Error::Config(format!(
            "failed to parse {AUTH_TOKEN_ENV}: {e}. Expected e.g. {AUTH_TOKEN_EXAMPLE}"
        ))
    })?;
    if records.is_empty() {
        return Err(Error::Config(format!(
            "{AUTH_TOKEN_ENV} contains no credentials; provide at least one"
        )));
    }

    let total = records.len();
    let credentials = validate_records(records);
    if credentials.is_empty() {
        return Err(Error::Config(
            "no valid credentials: Social requires refreshToken; \
             IdC requires refreshToken, clientId and clientSecret"
                .into(),
        ));
    }

    info!(total, valid = credentials.len(), "loaded credentials");
    Ok(credentials)
}

/// Parse credential JSON that is either an array of objects or one object.
pub fn parse_records(data: &str) -> Result<Vec<CredentialRecord>> {
    if let Ok(records) = serde_json::from_str::<Vec<CredentialRecord>>(data) {
        return Ok(records);
    }
    serde_json::from_str::<CredentialRecord>(data)
        .map(|record| vec![record])
        .map_err(|e| Error::CredentialParse(format!("invalid JSON: {e}")))
}

/// Validate records in order, dropping invalid and disabled entries.
pub fn validate_records(records: Vec<CredentialRecord>) -> Vec<Credential> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match record.into_credential() {
            Ok(credential) if credential.is_disabled() => {
                debug!(index, "skipping disabled credential");
                None
            }
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!(index, error = %e, "skipping invalid credential");
                None
            }
        })
        .collect()
}

/// Load IdC credentials from an accounts CSV.
///
/// Rows whose first column is not `true` (case-insensitive) are skipped.
/// Rows with fewer than four columns, blank required fields, or bytes that
/// are not UTF-8 are skipped with a warning and do not stop the remaining rows.
pub fn load_csv(path: &Path) -> Result<Vec<Credential>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::Io(format!("opening CSV {}: {e}", path.display())))?;

    let mut rows = 0;
    let mut credentials = Vec::new();
    // Row 1 is the header; report 1-based row numbers.
    for (index, result) in reader.records().enumerate() {
        rows += 1;
        let line = index + 1;
        let row = match result {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                return Err(Error::Io(format!("reading CSV {}: {e}", path.display())));
            }
            Err(e) => {
                warn!(line, error = %e, "skipping unreadable CSV row");
                continue;
            }
        };
        if index == 0 {
            continue;
        }
        if row.len() < 4 {
            warn!(line, columns = row.len(), "skipping CSV row with fewer than 4 columns");
            continue;
        }
        if !row[0].eq_ignore_ascii_case("true") {
            continue;
        }
        match Credential::idc(&row[1], &row[2], &row[3]) {
            Ok(credential) => credentials.push(credential),
            Err(e) => warn!(line, error = %e, "skipping invalid CSV row"),
        }
    }

    if rows < 2 {
        return Err(Error::CredentialParse(format!(
            "CSV {} is empty or has no data rows",
            path.display()
        )));
    }

    info!(path = %path.display(), count = credentials.len(), "loaded accounts from CSV");
    Ok(credentials)
}

/// Warn about each deprecated credential variable that is set.
pub fn warn_deprecated_env() {
    for var in DEPRECATED_TOKEN_ENVS {
        if std::env::var(var).is_ok_and(|v| !v.is_empty()) {
            warn!(
                variable = *var,
                migrate_to = AUTH_TOKEN_ENV,
                example = AUTH_TOKEN_EXAMPLE,
                "deprecated credential variable is ignored"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AuthMethod;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_json_array() {
        let creds = load_from_source(Some(
            r#"[{"auth":"Social","refreshToken":"a"},{"auth":"IdC","refreshToken":"b","clientId":"c","clientSecret":"d"}]"#,
        ))
        .unwrap();
        assert_eq!(creds.len(), 2);
        assert_eq!(creds[0].refresh_token().expose(), "a");
        assert_eq!(creds[1].method().label(), "IdC");
    }

    #[test]
    fn parses_single_object() {
        let creds = load_from_source(Some(r#"{"refreshToken":"solo"}"#)).unwrap();
        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].refresh_token().expose(), "solo");
    }

    #[test]
    fn reads_json_from_file_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "auth.json", r#"[{"refreshToken":"from-file"}]"#);
        let creds = load_from_source(path.to_str()).unwrap();
        assert_eq!(creds[0].refresh_token().expose(), "from-file");
    }

    #[test]
    fn missing_source_is_config_error_with_example() {
        let err = load_from_source(None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains(AUTH_TOKEN_ENV), "got: {err}");

        assert!(matches!(load_from_source(Some("   ")), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_json_is_config_error() {
        let err = load_from_source(Some("[{not json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_array_is_config_error() {
        let err = load_from_source(Some("[]")).unwrap_err();
        assert!(err.to_string().contains("no credentials"), "got: {err}");
    }

    #[test]
    fn filters_invalid_and_disabled_preserving_order() {
        let creds = load_from_source(Some(
            r#"[
                {"refreshToken":"keep-1"},
                {"auth":"IdC","refreshToken":"no-client"},
                {"refreshToken":"off","disabled":true},
                {"auth":"Social"},
                {"refreshToken":"keep-2"}
            ]"#,
        ))
        .unwrap();
        let tokens: Vec<&str> = creds
            .iter()
            .map(|c| c.refresh_token().expose().as_str())
            .collect();
        assert_eq!(tokens, vec!["keep-1", "keep-2"]);
    }

    #[test]
    fn all_invalid_is_config_error() {
        let err = load_from_source(Some(r#"[{"auth":"IdC","refreshToken":"x"}]"#)).unwrap_err();
        assert!(err.to_string().contains("no valid credentials"), "got: {err}");
    }

    #[test]
    fn csv_enabled_row_yields_idc_credential() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "accounts.csv",
            "enabled,refresh_token,client_id,client_secret\ntrue,rt1,cid1,csec1\n",
        );
        let creds = load_csv(&path).unwrap();
        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].refresh_token().expose(), "rt1");
        match creds[0].method() {
            AuthMethod::IdC {
                client_id,
                client_secret,
            } => {
                assert_eq!(client_id, "cid1");
                assert_eq!(client_secret.expose(), "csec1");
            }
            other => panic!("expected IdC, got {other:?}"),
        }
    }

    #[test]
    fn csv_skips_disabled_and_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "accounts.csv",
            "enabled,refresh_token,client_id,client_secret\n\
             false,rt0,cid0,csec0\n\
             true,rt-short,cid-short\n\
             TRUE, rt2 , cid2 , csec2 \n",
        );
        let creds = load_csv(&path).unwrap();
        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].refresh_token().expose(), "rt2");
    }

    #[test]
    fn csv_row_with_blank_client_secret_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "accounts.csv",
            "enabled,refresh_token,client_id,client_secret\ntrue,rt1,cid1,\ntrue,rt2,cid2,csec2\n",
        );
        let creds = load_csv(&path).unwrap();
        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].refresh_token().expose(), "rt2");
    }

    #[test]
    fn csv_row_with_invalid_utf8_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.csv");
        let mut contents = b"enabled,refresh_token,client_id,client_secret\ntrue,rt-".to_vec();
        contents.extend_from_slice(&[0xff, 0xfe]);
        contents.extend_from_slice(b",cid1,csec1\ntrue,rt2,cid2,csec2\n");
        std::fs::write(&path, contents).unwrap();

        let creds = load_csv(&path).unwrap();
        assert_eq!(creds.len(), 1);
        assert_eq!(creds[0].refresh_token().expose(), "rt2");
    }

    #[test]
    fn csv_header_only_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "accounts.csv", "enabled,refresh_token,client_id,client_secret\n");
        assert!(matches!(load_csv(&path), Err(Error::CredentialParse(_))));
    }

    #[test]
    fn csv_missing_file_is_io_error() {
        let err = load_csv(Path::new("/nonexistent/accounts.csv")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
