//! Transient local storage: one file per key under `<state_dir>/local/`.
//!
//! Plays the role browser local storage plays for the web dashboard. The
//! pairing flow reads the QR image and instance name from here and never
//! clears them.

use std::io;
use std::path::{Path, PathBuf};

use splia_core::{PairingImage, SessionHandle};

/// Key the onboarding step writes the base64 QR image under.
pub const PAIRING_IMAGE_KEY: &str = "whatsapp_qr_code";

/// Key holding the gateway instance name returned by onboarding.
pub const INSTANCE_NAME_KEY: &str = "whatsapp_instance";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("local"),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        // Keys are internal constants, but keep them from escaping the dir.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(safe)
    }

    pub fn get(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.key_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn set(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.key_path(key);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)
    }

    pub fn remove(&self, key: &str) -> io::Result<()> {
        match std::fs::remove_file(self.key_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// What onboarding left behind for the pairing screen.
pub trait PairingImageSource: Send + Sync {
    fn load_pairing_image(&self) -> Option<PairingImage>;

    /// Instance name to poll while the account record has none yet.
    fn load_session_handle(&self) -> Option<SessionHandle> {
        None
    }
}

impl PairingImageSource for LocalStorage {
    fn load_pairing_image(&self) -> Option<PairingImage> {
        match self.get(PAIRING_IMAGE_KEY) {
            Ok(Some(raw)) => match PairingImage::new(raw) {
                Ok(image) => Some(image),
                Err(e) => {
                    tracing::warn!("stored pairing image unusable: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("cannot read pairing image: {e}");
                None
            }
        }
    }

    fn load_session_handle(&self) -> Option<SessionHandle> {
        match self.get(INSTANCE_NAME_KEY) {
            Ok(raw) => raw.and_then(SessionHandle::new),
            Err(e) => {
                tracing::warn!("cannot read instance name: {e}");
                None
            }
        }
    }
}

impl PairingImageSource for Option<PairingImage> {
    fn load_pairing_image(&self) -> Option<PairingImage> {
        self.clone()
    }
}
