//! The pack manifest: one consistent snapshot of everything a server offers.

use crate::error::ProtocolResult;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Current manifest schema version.
pub const MANIFEST_SCHEMA_VERSION: &str = "3.0";

/// Path the manifest is served under.
pub const MANIFEST_PATH: &str = "/manifest.json";

/// Cipher name advertised in the encryption block.
pub const ENCRYPTION_ALGORITHM: &str = "AES-256-CFB8";

/// What a descriptor points at: one pack, or an archive bundling several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackKind {
    /// A single pack archive.
    Pack,
    /// An archive carrying several packs with a combined identity.
    Bundle,
}

impl Default for PackKind {
    fn default() -> Self {
        PackKind::Pack
    }
}

/// One pack as offered by the server.
///
/// Immutable once part of a published manifest snapshot. Identity is the
/// `uuid` when present; `name` is a human label and the filename to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePackDescriptor {
    /// Pack filename, also the human-readable label.
    pub name: String,
    /// Single pack or bundle.
    #[serde(rename = "type", default)]
    pub kind: PackKind,
    /// Stable identity, absent for legacy content.
    #[serde(
        default,
        deserialize_with = "lenient_uuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub uuid: Option<Uuid>,
    /// Semantic version, absent for legacy content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Content hash of the served bytes, lowercase hex.
    pub md5: String,
    /// Size of the served bytes.
    pub size: u64,
    /// Download path relative to the server root.
    pub url: String,
    /// True when the served bytes are ciphertext.
    #[serde(default)]
    pub encrypted: bool,
}

impl RemotePackDescriptor {
    /// Creates a descriptor for an unencrypted legacy pack (no identity).
    pub fn new(name: impl Into<String>, md5: impl Into<String>, size: u64) -> Self {
        let name = name.into();
        let url = format!("/packs/{name}");
        Self {
            name,
            kind: PackKind::Pack,
            uuid: None,
            version: None,
            md5: md5.into(),
            size,
            url,
            encrypted: false,
        }
    }

    /// Sets the pack identity.
    #[must_use]
    pub fn with_identity(mut self, uuid: Uuid, version: impl Into<String>) -> Self {
        self.uuid = Some(uuid);
        self.version = Some(version.into());
        self
    }

    /// Marks the descriptor as a bundle.
    #[must_use]
    pub fn with_kind(mut self, kind: PackKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the served bytes as ciphertext.
    #[must_use]
    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }
}

/// Encryption block, present in the manifest only when encryption is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionInfo {
    /// Whether served packs are ciphertext.
    pub enabled: bool,
    /// Cipher name, informational.
    pub algorithm: String,
    /// Public token clients feed into the shared-secret derivation.
    pub server_token: String,
}

impl EncryptionInfo {
    /// Creates the block for an encrypting server.
    pub fn new(server_token: impl Into<String>) -> Self {
        Self {
            enabled: true,
            algorithm: ENCRYPTION_ALGORITHM.to_string(),
            server_token: server_token.into(),
        }
    }
}

/// Snapshot of every pack a server currently offers.
///
/// A value object: one manifest equals one consistent snapshot, and pack
/// order is preserved as published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteManifest {
    /// Manifest schema version.
    pub version: String,
    /// When the snapshot was generated, Unix millis.
    pub generated_at: u64,
    /// Server software version, informational.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
    /// Offered packs, in publication order.
    pub packs: Vec<RemotePackDescriptor>,
    /// Present only when served packs are encrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionInfo>,
}

impl RemoteManifest {
    /// Creates a manifest snapshot for the given packs.
    pub fn new(generated_at: u64, packs: Vec<RemotePackDescriptor>) -> Self {
        Self {
            version: MANIFEST_SCHEMA_VERSION.to_string(),
            generated_at,
            server_version: None,
            packs,
            encryption: None,
        }
    }

    /// Sets the server software version.
    #[must_use]
    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = Some(version.into());
        self
    }

    /// Attaches the encryption block.
    #[must_use]
    pub fn with_encryption(mut self, info: EncryptionInfo) -> Self {
        self.encryption = Some(info);
        self
    }

    /// True when served packs are ciphertext.
    #[must_use]
    pub fn is_encrypted(&self) -> bool {
        self.encryption.as_ref().map(|e| e.enabled).unwrap_or(false)
    }

    /// Number of offered packs.
    #[must_use]
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Sum of all offered pack sizes in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.packs.iter().map(|p| p.size).sum()
    }

    /// Finds a pack by its filename.
    #[must_use]
    pub fn find_pack(&self, name: &str) -> Option<&RemotePackDescriptor> {
        self.packs.iter().find(|p| p.name == name)
    }

    /// Encodes to JSON.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decodes from JSON.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Accepts a missing, null or blank uuid as absent; anything else must
/// parse as a real UUID.
fn lenient_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => Uuid::parse_str(s.trim())
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> RemoteManifest {
        let packs = vec![
            RemotePackDescriptor::new("world.zip", "aabbccddeeff00112233445566778899", 1024)
                .with_identity(Uuid::new_v4(), "1.2.0"),
            RemotePackDescriptor::new("legacy.mcpack", "00112233445566778899aabbccddeeff", 2048),
        ];
        RemoteManifest::new(1_700_000_000_000, packs).with_server_version("0.3.0")
    }

    #[test]
    fn json_roundtrip() {
        let manifest = sample_manifest();
        let bytes = manifest.to_json().unwrap();
        let decoded = RemoteManifest::from_json(&bytes).unwrap();
        assert_eq!(decoded, manifest);
    }

    #[test]
    fn wire_field_names() {
        let manifest = sample_manifest();
        let json = String::from_utf8(manifest.to_json().unwrap()).unwrap();

        assert!(json.contains("\"version\": \"3.0\""));
        assert!(json.contains("\"generated_at\""));
        assert!(json.contains("\"server_version\""));
        assert!(json.contains("\"type\": \"pack\""));
        assert!(json.contains("\"md5\""));
        assert!(json.contains("\"url\": \"/packs/world.zip\""));
        // No encryption block unless enabled
        assert!(!json.contains("\"encryption\""));
    }

    #[test]
    fn encryption_block_serialized_when_present() {
        let manifest = sample_manifest().with_encryption(EncryptionInfo::new("token123"));
        assert!(manifest.is_encrypted());

        let json = String::from_utf8(manifest.to_json().unwrap()).unwrap();
        assert!(json.contains("\"server_token\": \"token123\""));
        assert!(json.contains("\"algorithm\": \"AES-256-CFB8\""));
    }

    #[test]
    fn blank_uuid_reads_as_absent() {
        let json = br#"{
            "version": "3.0",
            "generated_at": 1,
            "packs": [
                {"name": "a.zip", "uuid": "", "md5": "aa", "size": 1, "url": "/packs/a.zip"},
                {"name": "b.zip", "uuid": "  ", "md5": "bb", "size": 2, "url": "/packs/b.zip"},
                {"name": "c.zip", "md5": "cc", "size": 3, "url": "/packs/c.zip"}
            ]
        }"#;

        let manifest = RemoteManifest::from_json(json).unwrap();
        assert!(manifest.packs.iter().all(|p| p.uuid.is_none()));
    }

    #[test]
    fn garbage_uuid_is_an_error() {
        let json = br#"{
            "version": "3.0",
            "generated_at": 1,
            "packs": [
                {"name": "a.zip", "uuid": "not-a-uuid", "md5": "aa", "size": 1, "url": "/x"}
            ]
        }"#;

        assert!(RemoteManifest::from_json(json).is_err());
    }

    #[test]
    fn missing_optional_fields_default() {
        // Minimal legacy descriptor: no type, uuid, version or encrypted flag
        let json = br#"{
            "version": "3.0",
            "generated_at": 1,
            "packs": [{"name": "a.zip", "md5": "aa", "size": 1, "url": "/packs/a.zip"}]
        }"#;

        let manifest = RemoteManifest::from_json(json).unwrap();
        let pack = &manifest.packs[0];
        assert_eq!(pack.kind, PackKind::Pack);
        assert!(pack.uuid.is_none());
        assert!(pack.version.is_none());
        assert!(!pack.encrypted);
        assert!(!manifest.is_encrypted());
    }

    #[test]
    fn helpers() {
        let manifest = sample_manifest();
        assert_eq!(manifest.pack_count(), 2);
        assert_eq!(manifest.total_size(), 3072);
        assert!(manifest.find_pack("world.zip").is_some());
        assert!(manifest.find_pack("absent.zip").is_none());
    }

    #[test]
    fn bundle_kind_roundtrip() {
        let descriptor = RemotePackDescriptor::new("multi.mcaddon", "ff", 10)
            .with_kind(PackKind::Bundle)
            .with_encrypted(true);
        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"type\":\"bundle\""));
        assert!(json.contains("\"encrypted\":true"));

        let back: RemotePackDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, descriptor);
    }
}
