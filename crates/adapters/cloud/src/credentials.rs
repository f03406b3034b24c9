//! Credential files of the cloud account.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// Logged-in user, as persisted in `<mode>_auth.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    /// MQTT client id and topic prefix of this installation.
    pub thing_name: String,
}

/// Device certificate issued by the account API.
#[derive(Debug, Clone, Deserialize)]
pub struct IotCertificate {
    pub certificate_pem: String,
    pub secret_key: String,
    pub thing_name: String,
}

/// Files under the cloud config directory, one set per mode.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
    mode: String,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>, mode: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            mode: mode.into(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn certificate_path(&self) -> PathBuf {
        self.dir.join(format!("{}_iot_certificate.pem", self.mode))
    }

    #[must_use]
    pub fn secret_key_path(&self) -> PathBuf {
        self.dir.join(format!("{}_iot_secret.key", self.mode))
    }

    #[must_use]
    pub fn user_info_path(&self) -> PathBuf {
        self.dir.join(format!("{}_auth.json", self.mode))
    }

    /// Create the config directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Io`] if the directory cannot be created.
    pub fn ensure_dir(&self) -> Result<(), CredentialError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Stored user, or `None` when nobody is logged in.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] if the file exists but cannot be read or
    /// decoded.
    pub fn load(&self) -> Result<Option<UserInfo>, CredentialError> {
        match std::fs::read(self.user_info_path()) {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Store the certificate, the secret key and the user info.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Io`] if any file cannot be written.
    pub fn write(&self, email: &str, certificate: &IotCertificate) -> Result<UserInfo, CredentialError> {
        self.ensure_dir()?;
        std::fs::write(self.certificate_path(), &certificate.certificate_pem)?;
        write_owner_only(&self.secret_key_path(), certificate.secret_key.as_bytes())?;

        let user = UserInfo {
            email: email.to_string(),
            thing_name: certificate.thing_name.clone(),
        };
        std::fs::write(self.user_info_path(), serde_json::to_vec_pretty(&user)?)?;
        tracing::debug!(dir = %self.dir.display(), "cloud credentials written");
        Ok(user)
    }

    /// Remove every credential file, ignoring the ones already missing.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Io`] for any failure other than a missing file.
    pub fn clear(&self) -> Result<(), CredentialError> {
        for path in [
            self.certificate_path(),
            self.secret_key_path(),
            self.user_info_path(),
        ] {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

/// Write `contents` to `path`, readable and writable by the owner only.
fn write_owner_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // `mode` only applies on creation; tighten a key left by an older login.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)
}
